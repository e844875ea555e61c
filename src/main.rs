use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

mod audio;
mod config;
mod engine;
mod error;
mod publish;
mod rt;

use audio::SampleFormat;
use config::{BandPolicy, Config, WindowKind};

#[derive(Parser, Debug)]
#[command(name = "bandscope")]
#[command(author, version, about = "Real-time ALSA capture with FFT band levels published to shared memory")]
pub struct Args {
    /// Capture PCM device, e.g. "plughw:0,0" or "default"
    #[arg(short = 'D', long)]
    device: Option<String>,

    /// Sample rate in Hz; the device must accept it exactly
    #[arg(short, long)]
    rate: Option<u32>,

    /// Channel count, e.g. 2 for stereo
    #[arg(short, long)]
    channels: Option<u32>,

    /// Hardware ring buffer size in frames (accepted but not used)
    #[arg(short, long)]
    buffer_size: Option<usize>,

    /// Period size in frames, e.g. 1024
    #[arg(short, long)]
    period_size: Option<usize>,

    /// Sample format: S16_LE S16_BE S24_LE S24_BE S24_3LE S24_3BE S32_LE S32_BE
    #[arg(short = 'o', long)]
    format: Option<SampleFormat>,

    /// Shared memory name for a raw channel 0 dump
    #[arg(short = 'f', long)]
    dumpfile: Option<String>,

    /// Dump the PCM setup instead of the negotiated parameter summary
    #[arg(short, long)]
    verbose: bool,

    /// Shared memory name of the band magnitude region
    #[arg(long)]
    band_region: Option<String>,

    /// FFT window
    #[arg(long, value_enum)]
    window: Option<WindowKind>,

    /// Band magnitude policy
    #[arg(long, value_enum)]
    policy: Option<BandPolicy>,

    /// Skip SCHED_FIFO and memory locking
    #[arg(long)]
    no_realtime: bool,

    /// Config file path
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Write a default config file to the XDG config directory and exit
    #[arg(long)]
    init_config: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bandscope=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.init_config {
        let path = Config::init_default_config()?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_args(&args);
    if let Some(frames) = args.buffer_size {
        debug!("Ignoring requested ring buffer size of {} frames", frames);
    }

    if let Err(e) = rt::install_shutdown_handler() {
        warn!("sigaction: {}", e);
    }

    info!("Capture device is: \"{}\"", config.capture.device);
    run(&config)
}

#[cfg(feature = "alsa")]
fn run(config: &Config) -> Result<()> {
    // Fail fast on bad settings before touching the device
    config.validate()?;

    let device = audio::AlsaDevice::open(&config.capture.device)?;
    info!("PCM stream state: {}", device.state());

    engine::start(device, config, rt::shutdown_flag())?;
    if let Some(signal) = rt::received_signal() {
        info!("Received signal {}", signal);
    }
    Ok(())
}

#[cfg(not(feature = "alsa"))]
fn run(_config: &Config) -> Result<()> {
    anyhow::bail!("bandscope was built without the `alsa` feature; no capture backend available")
}
