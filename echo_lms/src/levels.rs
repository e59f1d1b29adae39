//! Level measurements used to judge how much echo was removed.

use crate::convert::I16_SCALE;

const LEVEL_FLOOR: f32 = 1e-9;

/// Root-mean-square level of normalized samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum = samples.iter().map(|&s| s * s).sum::<f32>();
    (sum / samples.len() as f32).sqrt()
}

/// Root-mean-square level of 16-bit samples, normalized to [0, 1].
pub fn rms_i16(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum = samples
        .iter()
        .map(|&s| {
            let v = s as f32;
            v * v
        })
        .sum::<f32>();
    let rms = (sum / samples.len() as f32).sqrt();
    (rms / I16_SCALE).min(1.0)
}

/// Level reduction from `before` to `after` in dB. Positive means quieter.
pub fn attenuation_db(before: f32, after: f32) -> f32 {
    20.0 * (before.max(LEVEL_FLOOR) / after.max(LEVEL_FLOOR)).log10()
}

/// Index of the strongest coefficient, i.e. the bulk delay of the modeled
/// echo path in samples.
pub fn peak_tap(filter: &[f32]) -> Option<usize> {
    filter
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(idx, _)| idx)
}
