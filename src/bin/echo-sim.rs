use std::f32::consts::PI;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use echo_lms::Lms;
use echo_lms::levels::{attenuation_db, peak_tap, rms};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const REFERENCE_LEVEL: f32 = 0.5;
const NEAR_END_LEVEL: f32 = 0.1;
const REPORT_EVERY: usize = 25;

/// Runs the canceller against a simulated loudspeaker-to-microphone path:
/// white noise is played, delayed and attenuated, and removed again.
#[derive(Parser, Debug)]
#[command(name = "echo-sim")]
struct Args {
    /// Disable adaptive echo cancellation (zero-length filter).
    #[arg(long)]
    disable_echo: bool,

    #[arg(long, default_value_t = 16_000)]
    rate: u32,

    /// Length of the simulation in seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f32,

    /// Bulk delay of the echo path.
    #[arg(long, default_value_t = 20)]
    delay_ms: u32,

    /// Gain of the echo path.
    #[arg(long, default_value_t = 0.6)]
    echo_gain: f32,

    #[arg(long, default_value_t = 32)]
    filter_ms: u64,

    #[arg(long, default_value_t = 0.001)]
    mu: f32,

    /// Mix a near-end tone of this frequency into the microphone.
    #[arg(long)]
    near_end_hz: Option<f32>,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Frames per processing block.
    #[arg(long, default_value_t = 160)]
    block: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(&args)
}

fn run(args: &Args) -> Result<()> {
    if args.block == 0 {
        bail!("--block must be positive");
    }

    let delay_frames = ((args.rate as u64 * args.delay_ms as u64) / 1000).max(1) as usize;
    let mut delay_line = vec![0.0f32; delay_frames];
    let mut delay_pos = 0usize;

    let mut canceller = Lms::new(0, args.mu);
    if !args.disable_echo {
        canceller
            .set_filter_duration(args.rate, Duration::from_millis(args.filter_ms))
            .context("invalid filter length")?;
    }
    if !canceller.is_empty() && delay_frames >= canceller.len() {
        warn!(
            delay_frames,
            taps = canceller.len(),
            "echo delay exceeds the filter span, cancellation will be poor"
        );
    }
    info!(
        taps = canceller.len(),
        delay_frames,
        mu = args.mu,
        "starting simulation"
    );

    let total = (args.rate as f32 * args.seconds).max(0.0) as usize;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut phase = 0.0f32;

    let mut render = vec![0.0f32; args.block];
    let mut echo = vec![0.0f32; args.block];
    let mut capture = vec![0.0f32; args.block];
    let mut cleaned = vec![0.0f32; args.block];

    let mut processed = 0usize;
    let mut block_idx = 0usize;
    let mut last_attenuation = 0.0f32;
    while processed < total {
        let len = args.block.min(total - processed);
        let (render, echo, capture, cleaned) = (
            &mut render[..len],
            &mut echo[..len],
            &mut capture[..len],
            &mut cleaned[..len],
        );

        render.fill_with(|| rng.gen_range(-REFERENCE_LEVEL..REFERENCE_LEVEL));
        process_delay(render, echo, &mut delay_line, &mut delay_pos);
        for (mic, &e) in capture.iter_mut().zip(echo.iter()) {
            *mic = e * args.echo_gain;
        }
        if let Some(freq) = args.near_end_hz {
            add_tone(capture, freq, args.rate, &mut phase);
        }

        canceller.process_f32(cleaned, render, capture)?;

        last_attenuation = attenuation_db(rms(capture), rms(cleaned));
        if block_idx % REPORT_EVERY == 0 {
            println!(
                "{:>7.3}s  attenuation {:>6.1} dB",
                processed as f32 / args.rate as f32,
                last_attenuation
            );
        }
        debug!(block = block_idx, attenuation = last_attenuation);

        processed += len;
        block_idx += 1;
    }

    println!("Final attenuation: {:.1} dB", last_attenuation);
    match peak_tap(canceller.filter()) {
        Some(tap) => println!(
            "Estimated echo delay: {:.1} ms (simulated {} ms)",
            tap as f32 * 1000.0 / args.rate as f32,
            args.delay_ms
        ),
        None => println!("Echo cancellation disabled"),
    }
    Ok(())
}

fn process_delay(input: &[f32], output: &mut [f32], delay_line: &mut [f32], delay_pos: &mut usize) {
    for (idx, &sample) in input.iter().enumerate() {
        let delayed = delay_line[*delay_pos];
        delay_line[*delay_pos] = sample;
        *delay_pos += 1;
        if *delay_pos == delay_line.len() {
            *delay_pos = 0;
        }

        output[idx] = delayed;
    }
}

fn add_tone(buffer: &mut [f32], freq: f32, sample_rate: u32, phase: &mut f32) {
    let phase_step = 2.0 * PI * freq / sample_rate as f32;
    for sample in buffer.iter_mut() {
        *sample += NEAR_END_LEVEL * phase.sin();
        *phase += phase_step;
        if *phase > 2.0 * PI {
            *phase -= 2.0 * PI;
        }
    }
}
