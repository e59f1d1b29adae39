use std::time::Duration;

use thiserror::Error;

/// Result alias for canceller operations.
pub type Result<T> = std::result::Result<T, LmsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LmsError {
    /// Filter duration was requested at a zero sample rate.
    #[error("invalid sample rate: {rate}Hz")]
    InvalidSampleRate { rate: u32 },

    /// Filter duration must be strictly positive.
    #[error("invalid filter duration: {duration:?}")]
    InvalidDuration { duration: Duration },

    /// Output, feedback and microphone buffers must share one length.
    #[error(
        "buffer length mismatch: output {output}, feedback {feedback}, microphone {microphone}"
    )]
    LengthMismatch {
        output: usize,
        feedback: usize,
        microphone: usize,
    },
}
