//! Tone demo (mvoc-tone) - plays a sine wave through the output driver
//!
//! Acts as a minimal mixing engine: pre-fills the mix buffer, refills each
//! division from the pump thread as it drains, and logs the read cursor
//! while playing. Runs until `--seconds` elapse or Ctrl+C.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use mvoc_common::config::load_config;
use mvoc_common::format::NativeFormat;
use mvoc_out::audio::{NullPlatform, Platform};
use mvoc_out::{DivisionSource, MixBuffer, NextDivision, PcmDriver};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Discard samples at real-time pace
    Null,
    /// Host audio device (requires the host-audio feature)
    Host,
}

/// Command-line arguments for mvoc-tone
#[derive(Parser, Debug)]
#[command(name = "mvoc-tone")]
#[command(about = "Play a test tone through the mvoc PCM output driver")]
#[command(version)]
struct Args {
    /// Configuration file (overrides MVOC_CONFIG and the user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds to play before stopping
    #[arg(short, long, default_value = "5")]
    seconds: u64,

    /// Tone frequency in Hz
    #[arg(short, long, default_value = "440")]
    frequency: f32,

    /// Mix buffer division size in bytes
    #[arg(long, default_value = "4096")]
    division_size: usize,

    /// Number of mix buffer divisions
    #[arg(long, default_value = "4")]
    divisions: usize,

    /// Output backend
    #[arg(short, long, value_enum, default_value = "null", env = "MVOC_BACKEND")]
    backend: Backend,

    /// Host output device name (host backend only)
    #[arg(long)]
    device: Option<String>,

    /// Print the host's output devices and exit
    #[arg(long)]
    list_devices: bool,
}

/// Sine generator writing interleaved native-endian i16 stereo
struct ToneSource {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl ToneSource {
    fn new(frequency: f32, sample_rate: u32) -> Self {
        Self {
            phase: 0.0,
            step: frequency * std::f32::consts::TAU / sample_rate as f32,
            amplitude: i16::MAX as f32 * 0.25,
        }
    }

    fn render(&mut self, bytes: &mut [u8]) {
        for frame in bytes.chunks_exact_mut(4) {
            let sample = (self.phase.sin() * self.amplitude) as i16;
            let encoded = sample.to_ne_bytes();
            for channel in frame.chunks_exact_mut(2) {
                channel.copy_from_slice(&encoded);
            }
            self.phase = (self.phase + self.step) % std::f32::consts::TAU;
        }
    }
}

impl DivisionSource for ToneSource {
    fn refill(&mut self, mut next: NextDivision<'_>) {
        self.render(&mut next);
    }
}

fn select_platform(args: &Args) -> Result<Arc<dyn Platform>> {
    match args.backend {
        Backend::Null => Ok(Arc::new(NullPlatform::new())),
        #[cfg(feature = "host-audio")]
        Backend::Host => Ok(Arc::new(mvoc_out::audio::HostPlatform::new(
            args.device.clone(),
        ))),
        #[cfg(not(feature = "host-audio"))]
        Backend::Host => bail!("mvoc-tone was built without the host-audio feature"),
    }
}

/// Why the playback wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Elapsed,
    Interrupted,
}

/// Log the read cursor every `report_every` until `duration` passes or
/// `interrupt` resolves
///
/// `interrupt` is polled as one future across all report ticks.
async fn play_until<F>(
    driver: &PcmDriver,
    duration: Duration,
    report_every: Duration,
    interrupt: F,
) -> Result<StopReason>
where
    F: Future<Output = std::io::Result<()>>,
{
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline, interrupt);
    let mut report = tokio::time::interval(report_every);

    loop {
        tokio::select! {
            _ = &mut deadline => return Ok(StopReason::Elapsed),
            result = &mut interrupt => {
                result.context("Failed to listen for Ctrl+C")?;
                return Ok(StopReason::Interrupted);
            }
            _ = report.tick() => {
                let guard = driver.lock()?;
                if let Some(cursor) = guard.cursor() {
                    info!(
                        division = cursor.division,
                        used = cursor.used,
                        refills = guard.refill_count(),
                        "Read cursor"
                    );
                }
            }
        }
    }
}

#[cfg(feature = "host-audio")]
fn list_devices() -> Result<()> {
    let devices = mvoc_out::audio::HostPlatform::list_devices()
        .context("Failed to list output devices")?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(not(feature = "host-audio"))]
fn list_devices() -> Result<()> {
    bail!("mvoc-tone was built without the host-audio feature")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.list_devices {
        return list_devices();
    }
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let default_filter = format!("mvoc_out={0},mvoc_tone={0}", config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let format = NativeFormat::native();
    if args.division_size == 0 || args.division_size % format.frame_bytes() != 0 {
        bail!(
            "Division size must be a non-zero multiple of {} bytes",
            format.frame_bytes()
        );
    }
    if args.device.is_some() && args.backend != Backend::Host {
        warn!("--device ignored for the {:?} backend", args.backend);
    }

    info!(
        "Starting mvoc-tone: {} Hz for {}s on {:?} backend",
        args.frequency, args.seconds, args.backend
    );

    let platform = select_platform(&args)?;
    let mut driver = PcmDriver::with_params(platform, config.output)
        .context("Invalid output parameters")?;

    let (mut sample_rate, mut channels) = (format.sample_rate, format.channels);
    driver
        .init(&mut sample_rate, &mut channels)
        .context("Failed to initialize output driver")?;

    // Every division starts with tone; the source keeps it going from there
    let mut tone = ToneSource::new(args.frequency, sample_rate);
    let mut buffer = MixBuffer::new(args.division_size, args.divisions)
        .context("Invalid mix buffer geometry")?;
    tone.render(buffer.as_bytes_mut());

    driver
        .begin_playback(buffer, tone)
        .context("Failed to begin playback")?;

    let reason = play_until(
        &driver,
        Duration::from_secs(args.seconds),
        Duration::from_secs(1),
        signal::ctrl_c(),
    )
    .await?;
    match reason {
        StopReason::Elapsed => info!("Playback time elapsed"),
        StopReason::Interrupted => info!("Received Ctrl+C, stopping"),
    }

    let submissions = driver.submissions();
    if driver.stop_playback().is_none() {
        warn!("Driver was not playing at stop");
    }
    driver.shutdown();

    info!("Stopped after {} hardware submissions", submissions);
    Ok(())
}
