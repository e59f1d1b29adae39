//! LMS-based acoustic echo canceller.
//!
//! [`Lms`] models the echo path between a reference (feedback) signal and a
//! microphone signal with an adaptive FIR filter and emits the residual. The
//! same engine accepts normalized `f32` buffers and 16-bit integer buffers.

pub mod convert;
mod error;
pub mod levels;
mod lms;

pub use error::{LmsError, Result};
pub use lms::{Lms, MAX_FILTER_LEN};
