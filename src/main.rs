use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ptloc_rs::config::Config;
use ptloc_rs::controller::ActuationController;
use ptloc_rs::gpio_input::{Buttons, Role};
use ptloc_rs::hardware::{Hardware, SystemClock};
use ptloc_rs::indicator::LogIndicator;
use ptloc_rs::node::{Command, Mount, Pointer};
use ptloc_rs::observation::Observation;
use ptloc_rs::pi::PiHardware;
use ptloc_rs::sim::SimulatedRig;
use ptloc_rs::transport::SerialTransport;
use ptloc_rs::triangulate::triangulate;

/// Point a servo mount at a remote location from two range/bearing readings
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file (missing keys take their defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Handheld station: button 1 sends the mount reading, button 2 the destination
    Pointer,
    /// Servo station: wait for a reading pair and point at the destination
    Mount {
        /// Use the simulated rig instead of the Pi sensors and servos
        #[arg(long)]
        simulate: bool,
    },
    /// Drive the mount to a bearing directly
    #[command(allow_negative_numbers = true)]
    Goto {
        /// Compass angle in degrees [0, 360]
        #[arg(short, long)]
        angle: f64,

        /// Tilt in [-1, 1]; negative points upwards
        #[arg(short, long)]
        tilt: f64,

        #[arg(long)]
        simulate: bool,
    },
    /// Print the bearing for a mount reading and a destination reading
    #[command(allow_negative_numbers = true)]
    Solve {
        /// Mount reading distance
        d1: f64,
        /// Mount reading angle
        a1: f64,
        /// Mount reading tilt
        t1: f64,
        /// Destination reading distance
        d2: f64,
        /// Destination reading angle
        a2: f64,
        /// Destination reading tilt
        t2: f64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    match args.command {
        Mode::Pointer => run_pointer(&config),
        Mode::Mount { simulate: true } => run_mount(SimulatedRig::new(), &config),
        Mode::Mount { simulate: false } => {
            let hardware = PiHardware::mount(&config).context("initializing mount hardware")?;
            run_mount(hardware, &config)
        }
        Mode::Goto {
            angle,
            tilt,
            simulate: true,
        } => goto(SimulatedRig::new(), &config, angle, tilt),
        Mode::Goto {
            angle,
            tilt,
            simulate: false,
        } => {
            let hardware = PiHardware::mount(&config).context("initializing mount hardware")?;
            goto(hardware, &config, angle, tilt)
        }
        Mode::Solve {
            d1,
            a1,
            t1,
            d2,
            a2,
            t2,
        } => solve(
            &config,
            Observation::new(d1, a1, t1),
            Observation::new(d2, a2, t2),
        ),
    }
}

fn run_pointer(config: &Config) -> Result<()> {
    let hardware = PiHardware::pointer(config).context("initializing pointer hardware")?;
    let transport = SerialTransport::open(&config.radio).context("opening radio")?;

    let (tx, rx) = mpsc::channel::<Command>();
    let buttons = Buttons::new(&config.pins, Role::Pointer, config.control.jog_step)
        .context("initializing buttons")?;
    let _poller = buttons.spawn(tx);

    let mut pointer = Pointer::new(hardware, transport, LogIndicator, config.control.clone());
    pointer.run(&rx).context("pointer stopped")?;
    Ok(())
}

fn run_mount<H: Hardware>(hardware: H, config: &Config) -> Result<()> {
    let transport = SerialTransport::open(&config.radio).context("opening radio")?;
    let controller = ActuationController::new(hardware, SystemClock, config.control.clone())
        .context("centring servos")?;

    let (tx, rx) = mpsc::channel::<Command>();
    // a simulated rig has no buttons, but the channel must stay open
    let _keepalive = tx.clone();
    match Buttons::new(&config.pins, Role::Mount, config.control.jog_step) {
        Ok(buttons) => {
            buttons.spawn(tx);
        }
        Err(e) => info!("no buttons: {}", e),
    }

    let mut mount = Mount::new(controller, transport, LogIndicator);
    mount.run(&rx).context("mount stopped")?;
    Ok(())
}

fn goto<H: Hardware>(hardware: H, config: &Config, angle: f64, tilt: f64) -> Result<()> {
    let mut controller = ActuationController::new(hardware, SystemClock, config.control.clone())
        .context("centring servos")?;
    let report = controller
        .drive_to(tilt, angle)
        .with_context(|| format!("driving to angle {} tilt {}", angle, tilt))?;
    info!("angle: {:?}", report.angle);
    info!("tilt: {:?}", report.tilt);
    Ok(())
}

fn solve(config: &Config, mount: Observation, destination: Observation) -> Result<()> {
    let bearing = triangulate(&mount, &destination, config.control.asin)
        .context("triangulating")?;
    println!("{}", bearing);
    Ok(())
}
