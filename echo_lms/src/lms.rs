use std::time::Duration;

use tracing::{debug, trace};

use crate::convert::{f32_to_i16, i16_to_f32};
use crate::error::{LmsError, Result};

/// Longest filter [`Lms::set_filter_duration`] accepts, about five minutes of
/// 48 kHz audio.
pub const MAX_FILTER_LEN: usize = 1 << 24;

/// Adaptive filter implementing a Least Mean Squares echo canceller.
///
/// For every sample the reference `x(n)` enters the history window, the echo
/// estimate `y(n) = Σ w[k]·x(n-k)` is subtracted from the microphone sample
/// `d(n)`, and the taps move along the error gradient:
///
/// ```text
/// e(n)  = d(n) - y(n)
/// w[k] += 2·mu·e(n)·x(n-k)
/// ```
///
/// The filter is stable while `0 < 2·mu·N·P < 2`, with `N` the filter length
/// and `P` the mean power of the normalized reference. Divergence is not
/// detected; pick `mu` well inside that bound.
#[derive(Debug, Clone)]
pub struct Lms {
    filter: Vec<f32>,
    history: Vec<f32>,
    history_pos: usize,
    mu: f32,
}

impl Lms {
    /// Creates a canceller modeling `filter_len` samples of the echo path.
    pub fn new(filter_len: usize, mu: f32) -> Self {
        Self {
            filter: vec![0.0; filter_len],
            history: vec![0.0; filter_len],
            history_pos: 0,
            mu,
        }
    }

    /// Resizes the filter to `sample_count` taps. All taps and the reference
    /// history are zeroed, as after [`Lms::reset`].
    pub fn set_filter_size(&mut self, sample_count: usize) {
        debug!(taps = sample_count, "resizing LMS filter");
        self.filter.clear();
        self.filter.resize(sample_count, 0.0);
        self.history.clear();
        self.history.resize(sample_count, 0.0);
        self.history_pos = 0;
    }

    /// Resizes the filter to cover `duration` of audio at `sample_rate`.
    ///
    /// Both values must be non-zero and the result must not exceed
    /// [`MAX_FILTER_LEN`] taps; on error the filter is left untouched.
    pub fn set_filter_duration(&mut self, sample_rate: u32, duration: Duration) -> Result<()> {
        if sample_rate == 0 {
            return Err(LmsError::InvalidSampleRate { rate: sample_rate });
        }
        if duration.is_zero() {
            return Err(LmsError::InvalidDuration { duration });
        }

        let taps = (f64::from(sample_rate) * duration.as_secs_f64()).round();
        if !taps.is_finite() || taps > MAX_FILTER_LEN as f64 {
            return Err(LmsError::InvalidDuration { duration });
        }
        let sample_count = taps as usize;
        debug!(
            sample_rate,
            ?duration,
            taps = sample_count,
            "filter length from duration"
        );
        self.set_filter_size(sample_count);
        Ok(())
    }

    /// Sets the adaptation step. Stored as given.
    pub fn set_mu(&mut self, mu: f32) {
        self.mu = mu;
    }

    /// Current adaptation step.
    pub fn mu(&self) -> f32 {
        self.mu
    }

    /// Zeroes the taps and the reference history without reallocating.
    pub fn reset(&mut self) {
        trace!(taps = self.filter.len(), "resetting LMS filter");
        self.filter.fill(0.0);
        self.history.fill(0.0);
        self.history_pos = 0;
    }

    /// Current echo-path estimate, tap 0 first.
    pub fn filter(&self) -> &[f32] {
        &self.filter
    }

    /// Number of taps.
    pub fn len(&self) -> usize {
        self.filter.len()
    }

    /// True for a zero-length, pass-through filter.
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    /// Cancels the echo of `feedback` from `microphone`, writing the residual
    /// into `output`. Samples are expected in [-1, 1]; the residual is clamped
    /// to it, except that a zero-length filter copies `microphone` verbatim.
    ///
    /// All three slices must share the same length. A mismatch is rejected
    /// before any state changes.
    pub fn process_f32(
        &mut self,
        output: &mut [f32],
        feedback: &[f32],
        microphone: &[f32],
    ) -> Result<()> {
        check_lengths(output.len(), feedback.len(), microphone.len())?;

        for ((out, &x), &d) in output.iter_mut().zip(feedback).zip(microphone) {
            *out = self.process_value(x, d);
        }
        Ok(())
    }

    /// 16-bit variant of [`Lms::process_f32`]. Samples are normalized by
    /// 32768 on the way in and rounded and saturated on the way out.
    pub fn process_i16(
        &mut self,
        output: &mut [i16],
        feedback: &[i16],
        microphone: &[i16],
    ) -> Result<()> {
        check_lengths(output.len(), feedback.len(), microphone.len())?;

        for ((out, &x), &d) in output.iter_mut().zip(feedback).zip(microphone) {
            let error = self.process_value(i16_to_f32(x), i16_to_f32(d));
            *out = f32_to_i16(error);
        }
        Ok(())
    }

    fn process_value(&mut self, feedback: f32, microphone: f32) -> f32 {
        // Without taps there is nothing to estimate: e(n) = d(n), unchanged.
        if self.history.is_empty() {
            return microphone;
        }

        self.history[self.history_pos] = feedback;
        self.history_pos = (self.history_pos + 1) % self.history.len();

        let estimate = self.estimate_echo();
        let error = microphone - estimate;
        self.update_taps(error);

        error.clamp(-1.0, 1.0)
    }

    fn estimate_echo(&self) -> f32 {
        let len = self.history.len();
        let mut idx = self.history_pos;
        let mut acc = 0.0;
        for weight in &self.filter {
            idx = dec_idx(len, idx);
            acc += weight * self.history[idx];
        }
        acc
    }

    fn update_taps(&mut self, error: f32) {
        let scale = 2.0 * self.mu * error;

        let len = self.history.len();
        let mut idx = self.history_pos;
        for weight in &mut self.filter {
            idx = dec_idx(len, idx);
            *weight += scale * self.history[idx];
        }
    }
}

fn check_lengths(output: usize, feedback: usize, microphone: usize) -> Result<()> {
    if output != feedback || output != microphone {
        return Err(LmsError::LengthMismatch {
            output,
            feedback,
            microphone,
        });
    }
    Ok(())
}

fn dec_idx(len: usize, idx: usize) -> usize {
    if idx == 0 { len - 1 } else { idx - 1 }
}
