//! Conversion between 16-bit PCM and normalized `f32` samples.

/// Full-scale magnitude of a 16-bit sample.
pub const I16_SCALE: f32 = 32768.0;

/// Maps a 16-bit sample onto [-1, 1).
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / I16_SCALE
}

/// Re-quantizes a normalized sample, rounding and saturating at the 16-bit
/// limits. NaN maps to zero.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * I16_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}
