//! WAV persistence for prompt recordings via `hound`.

use std::path::Path;

use thiserror::Error;

use crate::audio::stereo_to_mono;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV I/O failed: {0}")]
    Hound(#[from] hound::Error),

    #[error("unsupported WAV sample format: {bits}-bit {format:?}")]
    Unsupported {
        bits: u16,
        format: hound::SampleFormat,
    },
}

/// Write mono `samples` as 16-bit PCM.
///
/// Samples outside `[-1.0, 1.0]` are clipped.
pub fn save_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        let clipped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clipped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    log::info!("Audio saved as {}", path.display());
    Ok(())
}

/// Read a WAV file as mono `f32` samples plus its sample rate.
///
/// Accepts 16/24/32-bit integer and 32-bit float files with any channel
/// count.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = (1_i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => return Err(WavError::Unsupported { bits, format }),
    };

    Ok((stereo_to_mono(&interleaved, spec.channels), spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn written_prompt_reads_back_at_the_same_rate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("response.wav");
        let tone: Vec<f32> = (0..441).map(|i| (i as f32 / 441.0) - 0.5).collect();

        save_wav(&path, &tone, 44_100).unwrap();
        let (samples, rate) = read_wav(&path).unwrap();

        assert_eq!(rate, 44_100);
        assert_eq!(samples.len(), tone.len());
        for (a, b) in tone.iter().zip(&samples) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn stereo_files_are_downmixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0.2_f32, 0.4, -0.2, -0.4] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 48_000);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.3).abs() < 1e-6);
        assert!((samples[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_samples_are_clipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loud.wav");
        save_wav(&path, &[2.0, -2.0], 16_000).unwrap();

        let (samples, _) = read_wav(&path).unwrap();
        assert!(samples[0] <= 1.0 && samples[0] > 0.99);
        assert!(samples[1] >= -1.0 && samples[1] < -0.99);
    }
}
