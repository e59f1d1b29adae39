use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use echo_lms::Lms;
use echo_lms::levels::{attenuation_db, peak_tap, rms};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_SAMPLE_RATE: u32 = 16_000;
const DEFAULT_FILTER_MS: u64 = 64;
const DEFAULT_CHUNK_SIZE: usize = 160;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SampleFormat {
    /// Signed 16-bit little-endian.
    S16,
    /// 32-bit float little-endian, normalized to [-1, 1].
    F32,
}

impl SampleFormat {
    fn width(self) -> usize {
        match self {
            SampleFormat::S16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// Removes the echo of a reference recording from a microphone recording.
///
/// Inputs and output are raw mono PCM.
#[derive(Parser, Debug)]
#[command(name = "drain")]
struct Args {
    /// Reference signal played out by the speaker.
    #[arg(long)]
    feedback: PathBuf,

    /// Microphone capture containing the echo.
    #[arg(long)]
    microphone: PathBuf,

    /// Where to write the echo-cancelled signal.
    #[arg(long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = SampleFormat::S16)]
    format: SampleFormat,

    /// Sample rate of all streams in Hz.
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    rate: u32,

    /// Filter length in samples.
    #[arg(long, conflicts_with = "filter_ms")]
    taps: Option<usize>,

    /// Filter length in milliseconds of audio.
    #[arg(long, default_value_t = DEFAULT_FILTER_MS)]
    filter_ms: u64,

    /// Adaptation step. Keep 2·mu·taps·power well below 2.
    #[arg(long)]
    mu: f32,

    /// Frames handed to the canceller per call.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk: usize,
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
    if args.chunk == 0 {
        bail!("--chunk must be positive");
    }

    let mut canceller = Lms::new(0, args.mu);
    match args.taps {
        Some(taps) => canceller.set_filter_size(taps),
        None => canceller
            .set_filter_duration(args.rate, Duration::from_millis(args.filter_ms))
            .context("invalid filter length")?,
    }
    info!(taps = canceller.len(), mu = args.mu, "canceller configured");

    let (before, after) = match args.format {
        SampleFormat::S16 => {
            let feedback = decode_s16(&read_samples(&args.feedback, args.format)?);
            let microphone = decode_s16(&read_samples(&args.microphone, args.format)?);
            let (feedback, microphone) = align(&feedback, &microphone);
            let mut output = vec![0i16; feedback.len()];

            for ((out, x), d) in output
                .chunks_mut(args.chunk)
                .zip(feedback.chunks(args.chunk))
                .zip(microphone.chunks(args.chunk))
            {
                canceller.process_i16(out, x, d)?;
            }

            write_samples(&args.output, &encode_s16(&output))?;
            (
                echo_lms::levels::rms_i16(microphone),
                echo_lms::levels::rms_i16(&output),
            )
        }
        SampleFormat::F32 => {
            let feedback = decode_f32(&read_samples(&args.feedback, args.format)?);
            let microphone = decode_f32(&read_samples(&args.microphone, args.format)?);
            let (feedback, microphone) = align(&feedback, &microphone);
            let mut output = vec![0.0f32; feedback.len()];

            for ((out, x), d) in output
                .chunks_mut(args.chunk)
                .zip(feedback.chunks(args.chunk))
                .zip(microphone.chunks(args.chunk))
            {
                canceller.process_f32(out, x, d)?;
            }

            write_samples(&args.output, &encode_f32(&output))?;
            (rms(microphone), rms(&output))
        }
    };

    println!(
        "Attenuation: {:.1} dB ({:.4} -> {:.4} RMS)",
        attenuation_db(before, after),
        before,
        after
    );
    if let Some(tap) = peak_tap(canceller.filter()) {
        println!(
            "Echo delay estimate: {:.1} ms (tap {})",
            tap as f32 * 1000.0 / args.rate as f32,
            tap
        );
    }
    Ok(())
}

fn read_samples(path: &Path, format: SampleFormat) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if bytes.len() % format.width() != 0 {
        warn!(
            path = %path.display(),
            "trailing {} bytes ignored",
            bytes.len() % format.width()
        );
    }
    Ok(bytes)
}

fn write_samples(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

fn align<'a, T>(feedback: &'a [T], microphone: &'a [T]) -> (&'a [T], &'a [T]) {
    if feedback.len() != microphone.len() {
        warn!(
            feedback = feedback.len(),
            microphone = microphone.len(),
            "stream lengths differ, truncating to the shorter"
        );
    }
    let len = feedback.len().min(microphone.len());
    (&feedback[..len], &microphone[..len])
}

fn decode_s16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

fn encode_s16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn encode_f32(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
