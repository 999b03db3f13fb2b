//! drawbot: ask for a subject, generate line art, and draw it.
//!
//! ```text
//! speech / text ─► image API ─► contours ─► canvas (mm) ─► G-code ─► simulator | OctoPrint
//!                                                              narration (TTS) ◄─┘
//! ```

pub mod audio;
pub mod config;
pub mod drawing;
pub mod logging;
pub mod pipeline;
pub mod printer;
pub mod recorder;
pub mod robot;
pub mod stt;
pub mod voice;

#[cfg(test)]
mod test_support;
