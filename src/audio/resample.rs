//! Channel mixing and sample-rate conversion.
//!
//! The prompt is recorded at the device's native rate (usually 44.1 or
//! 48 kHz, often stereo) while Whisper wants 16 kHz mono.  Both helpers here
//! are pure functions over `f32` slices.

/// Sample rate expected by the Whisper engine.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved frames down to one channel.
///
/// `channels == 0` yields an empty vector; a trailing partial frame is
/// dropped.
///
/// ```rust
/// use drawbot::audio::stereo_to_mono;
///
/// let mono = stereo_to_mono(&[0.25_f32, 0.75, -1.0, 1.0], 2);
/// assert_eq!(mono, vec![0.5, 0.0]);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Linear-interpolation resampler from `from_rate` to `to_rate`.
///
/// Output length is `ceil(len * to_rate / from_rate)`.  Equal rates return
/// a copy of the input.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return Vec::new();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            match samples.get(idx + 1) {
                Some(&next) => samples[idx] * (1.0 - frac) + next * frac,
                None => samples[idx],
            }
        })
        .collect()
}

/// Resample to the 16 kHz Whisper rate.
pub fn resample_to_16k(samples: &[f32], source_rate: u32) -> Vec<f32> {
    resample(samples, source_rate, WHISPER_SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_input_is_copied() {
        let input = [0.1_f32, -0.2, 0.3];
        assert_eq!(stereo_to_mono(&input, 1), input.to_vec());
    }

    #[test]
    fn partial_trailing_frame_is_dropped() {
        let out = stereo_to_mono(&[1.0_f32, 1.0, 0.5], 2);
        assert_eq!(out, vec![1.0]);
    }

    #[test]
    fn zero_channels_yield_nothing() {
        assert!(stereo_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    #[test]
    fn prompt_rate_downsamples_to_whisper_rate() {
        // One second at 44.1 kHz becomes one second at 16 kHz.
        let out = resample_to_16k(&vec![0.0_f32; 44_100], 44_100);
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let out = resample(&[0.0_f32, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dc_level_survives_resampling() {
        let out = resample(&vec![0.25_f32; 960], 48_000, 16_000);
        assert_eq!(out.len(), 320);
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn same_rate_and_empty_input_are_passthrough() {
        assert_eq!(resample(&[0.5_f32; 3], 16_000, 16_000).len(), 3);
        assert!(resample(&[], 48_000, 16_000).is_empty());
    }
}
