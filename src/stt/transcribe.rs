//! Whisper run parameters.

use whisper_rs::{FullParams, SamplingStrategy};

use crate::config::SpeechSettings;

/// How Whisper decodes one prompt.
///
/// ```
/// use drawbot::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "auto".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.whisper_language(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"` to let Whisper detect it.
    pub language: String,
    /// Beam width; greedy decoding when `None`.
    pub beam_size: Option<i32>,
    pub n_threads: i32,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "en".into(),
            beam_size: None,
            n_threads: default_threads(),
        }
    }
}

impl From<&SpeechSettings> for TranscribeParams {
    fn from(settings: &SpeechSettings) -> Self {
        Self {
            language: settings.language.clone(),
            ..Self::default()
        }
    }
}

impl TranscribeParams {
    pub fn whisper_language(&self) -> Option<&str> {
        match self.language.trim() {
            "" | "auto" => None,
            code => Some(code),
        }
    }

    fn strategy(&self) -> SamplingStrategy {
        match self.beam_size {
            Some(beam_size) if beam_size > 1 => SamplingStrategy::BeamSearch {
                beam_size,
                patience: -1.0,
            },
            _ => SamplingStrategy::Greedy { best_of: 1 },
        }
    }

    /// Whisper parameters with console output silenced.
    pub fn full_params(&self) -> FullParams<'_, '_> {
        let mut fp = FullParams::new(self.strategy());
        fp.set_language(self.whisper_language());
        fp.set_n_threads(self.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
        fp.set_print_special(false);
        fp.set_print_timestamps(false);
        fp
    }
}

/// Available cores, at most 8.
fn default_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_follows_speech_settings() {
        let settings = SpeechSettings {
            language: "de".into(),
            ..SpeechSettings::default()
        };
        let params = TranscribeParams::from(&settings);
        assert_eq!(params.whisper_language(), Some("de"));
        assert_eq!(params.beam_size, None);
    }

    #[test]
    fn blank_language_means_detect() {
        let params = TranscribeParams {
            language: "  ".into(),
            ..TranscribeParams::default()
        };
        assert_eq!(params.whisper_language(), None);
    }

    #[test]
    fn beam_of_one_is_greedy() {
        let params = TranscribeParams {
            beam_size: Some(1),
            ..TranscribeParams::default()
        };
        assert!(matches!(params.strategy(), SamplingStrategy::Greedy { best_of: 1 }));

        let params = TranscribeParams {
            beam_size: Some(5),
            ..TranscribeParams::default()
        };
        assert!(matches!(params.strategy(), SamplingStrategy::BeamSearch { beam_size: 5, .. }));
    }

    #[test]
    fn thread_count_is_capped() {
        assert!((1..=8).contains(&default_threads()));
    }
}
