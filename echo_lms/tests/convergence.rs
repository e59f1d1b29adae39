use echo_lms::Lms;
use echo_lms::convert::{f32_to_i16, i16_to_f32};
use echo_lms::levels::{attenuation_db, peak_tap, rms};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ECHO_PATH: [f32; 4] = [0.6, -0.3, 0.2, 0.1];

fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

fn convolve(signal: &[f32], path: &[f32]) -> Vec<f32> {
    (0..signal.len())
        .map(|n| {
            path.iter()
                .enumerate()
                .filter(|(k, _)| *k <= n)
                .map(|(k, w)| w * signal[n - k])
                .sum()
        })
        .collect()
}

#[test]
fn identifies_fir_echo_path() {
    let feedback = white_noise(20_000, 0.5, 7);
    let microphone = convolve(&feedback, &ECHO_PATH);
    let mut output = vec![0.0; feedback.len()];

    let mut lms = Lms::new(8, 0.01);
    for ((out, x), d) in output
        .chunks_mut(160)
        .zip(feedback.chunks(160))
        .zip(microphone.chunks(160))
    {
        lms.process_f32(out, x, d).unwrap();
    }

    let filter = lms.filter();
    for (k, expected) in ECHO_PATH.iter().enumerate() {
        assert!(
            (filter[k] - expected).abs() < 1e-3,
            "tap {k}: {} vs {expected}",
            filter[k]
        );
    }
    for (k, w) in filter.iter().enumerate().skip(ECHO_PATH.len()) {
        assert!(w.abs() < 1e-3, "tap {k}: {w}");
    }
    assert_eq!(peak_tap(filter), Some(0));

    // Error energy falls block after block on average.
    let block_energy: Vec<f32> = output.chunks(2_000).map(rms).collect();
    for pair in block_energy.windows(2).take(3) {
        assert!(pair[1] < pair[0], "energy = {block_energy:?}");
    }
    let head = rms(&output[..1_000]);
    let tail = rms(&output[output.len() - 1_000..]);
    assert!(attenuation_db(head, tail) > 40.0, "{head} -> {tail}");
}

#[test]
fn cancels_echo_under_near_end_speech() {
    let feedback = white_noise(40_000, 0.4, 11);
    let echo = convolve(&feedback, &ECHO_PATH);
    let near_end: Vec<f32> = (0..feedback.len())
        .map(|n| 0.05 * (n as f32 * 0.05).sin())
        .collect();
    let microphone: Vec<f32> = echo.iter().zip(&near_end).map(|(e, s)| e + s).collect();

    let mut lms = Lms::new(16, 0.002);
    let mut output = vec![0.0; feedback.len()];
    lms.process_f32(&mut output, &feedback, &microphone).unwrap();

    let tail = output.len() - 4_000..;
    let residual: Vec<f32> = output[tail.clone()]
        .iter()
        .zip(&near_end[tail.clone()])
        .map(|(out, s)| out - s)
        .collect();
    assert!(rms(&residual) < 0.1 * rms(&echo[tail]));
}

#[test]
fn fixed_point_tracks_floating_point() {
    let feedback = white_noise(8_000, 0.3, 3);
    let microphone: Vec<f32> = convolve(&feedback, &ECHO_PATH)
        .iter()
        .enumerate()
        .map(|(n, e)| e + 0.05 * (n as f32 * 0.01).sin())
        .collect();

    let feedback_i16: Vec<i16> = feedback.iter().map(|&x| f32_to_i16(x)).collect();
    let microphone_i16: Vec<i16> = microphone.iter().map(|&x| f32_to_i16(x)).collect();

    let mut float_lms = Lms::new(8, 0.01);
    let mut fixed_lms = float_lms.clone();

    let mut float_out = vec![0.0; feedback.len()];
    let mut fixed_out = vec![0i16; feedback.len()];
    float_lms
        .process_f32(&mut float_out, &feedback, &microphone)
        .unwrap();
    fixed_lms
        .process_i16(&mut fixed_out, &feedback_i16, &microphone_i16)
        .unwrap();

    let total: f64 = float_out
        .iter()
        .zip(&fixed_out)
        .map(|(&f, &i)| f64::from((f32_to_i16(f) as i32 - i as i32).abs()))
        .sum();
    let mean_lsb = total / float_out.len() as f64;
    assert!(mean_lsb <= 1.0, "mean difference {mean_lsb} LSB");

    for (a, b) in float_lms.filter().iter().zip(fixed_lms.filter()) {
        assert!((a - b).abs() < 1e-3);
    }
}

#[test]
fn identical_samples_give_identical_output() {
    let feedback_i16: Vec<i16> = white_noise(2_000, 0.5, 5)
        .iter()
        .map(|&x| f32_to_i16(x))
        .collect();
    let microphone_i16: Vec<i16> = feedback_i16.iter().map(|&x| x / 2).collect();
    let feedback: Vec<f32> = feedback_i16.iter().map(|&x| i16_to_f32(x)).collect();
    let microphone: Vec<f32> = microphone_i16.iter().map(|&x| i16_to_f32(x)).collect();

    let mut float_lms = Lms::new(4, 0.02);
    let mut fixed_lms = Lms::new(4, 0.02);
    let mut float_out = vec![0.0; feedback.len()];
    let mut fixed_out = vec![0i16; feedback.len()];
    float_lms
        .process_f32(&mut float_out, &feedback, &microphone)
        .unwrap();
    fixed_lms
        .process_i16(&mut fixed_out, &feedback_i16, &microphone_i16)
        .unwrap();

    let requantized: Vec<i16> = float_out.iter().map(|&x| f32_to_i16(x)).collect();
    assert_eq!(requantized, fixed_out);
    assert_eq!(float_lms.filter(), fixed_lms.filter());
}

#[test]
fn residual_saturates_instead_of_wrapping() {
    let mut lms = Lms::new(1, 0.25);
    let mut sink = [0i16; 64];
    // Converge w[0] toward -1 so the estimate opposes the next microphone sample.
    lms.process_i16(&mut sink, &[i16::MAX; 64], &[i16::MIN; 64])
        .unwrap();
    assert!(sink.iter().all(|&s| s <= 0));

    let mut out = [0i16; 1];
    lms.process_i16(&mut out, &[i16::MAX], &[i16::MAX]).unwrap();
    assert_eq!(out[0], i16::MAX);

    let mut lms = Lms::new(1, 0.25);
    lms.process_i16(&mut sink, &[i16::MAX; 64], &[i16::MAX; 64])
        .unwrap();
    lms.process_i16(&mut out, &[i16::MAX], &[i16::MIN]).unwrap();
    assert_eq!(out[0], i16::MIN);
}

#[test]
fn alternating_full_scale_stays_in_range() {
    let feedback: Vec<i16> = (0..4_096)
        .map(|n| if n % 2 == 0 { i16::MAX } else { i16::MIN })
        .collect();
    let microphone: Vec<i16> = feedback.iter().rev().copied().collect();

    let mut lms = Lms::new(32, 0.001);
    let mut out = vec![0i16; feedback.len()];
    lms.process_i16(&mut out, &feedback, &microphone).unwrap();

    // The alternating reference is fully predictable, so the residual must
    // shrink rather than flip sign through overflow.
    let head = echo_lms::levels::rms_i16(&out[..256]);
    let tail = echo_lms::levels::rms_i16(&out[out.len() - 256..]);
    assert!(tail < head, "{head} -> {tail}");
    assert!(lms.filter().iter().all(|w| w.is_finite()));
}
