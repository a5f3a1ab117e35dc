use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use ptloc_rs::compass_sensor::CompassSensor;
use ptloc_rs::config::Config;

/// Run the compass module's built-in calibration cycle
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file (missing keys take their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Calibration time in seconds (defaults to the configured value)
    #[arg(short, long)]
    seconds: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let duration = Duration::from_secs(args.seconds.unwrap_or(config.compass.calibration_secs));

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║     Compass Calibration Tool                         ║");
    println!("╚══════════════════════════════════════════════════════╝\n");

    println!("Instructions:");
    println!("1. Slowly rotate the station through a FULL 360° circle");
    println!("2. Tilt it forwards, backwards and to both sides while rotating");
    println!("3. Keep going until the countdown ends\n");

    println!("Starting in 5 seconds...\n");
    thread::sleep(Duration::from_secs(5));

    let mut compass = CompassSensor::new(&config.compass).context("opening compass")?;
    compass.start_calibration().context("starting calibration")?;

    let start = Instant::now();
    let mut last_report = 0;
    while start.elapsed() < duration {
        let remaining = (duration - start.elapsed()).as_secs();
        if remaining / 10 != last_report {
            last_report = remaining / 10;
            match compass.read_heading() {
                Ok(heading) => info!("{:>4}s left  heading {:.1}°", remaining, heading),
                Err(e) => warn!("{:>4}s left  heading unavailable: {}", remaining, e),
            }
        }
        thread::sleep(Duration::from_millis(100));
    }

    compass.end_calibration().context("ending calibration")?;
    println!("\n✓ Calibration done");
    Ok(())
}
