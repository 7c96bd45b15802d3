//! Strobe Rig CLI
//!
//! Starts the capture rig and runs until Ctrl-C or an overlay `q`.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strobe_rig::{
    app::{App, Hardware, StartupError},
    capture::{Camera, FileConfig, AviWriter, SimulatedCamera},
    hardware::{Clock, Gpio, MonotonicClock, SimulatedGpio},
    rig::ChannelDisplay,
};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "strobe-rig", version, about = "Button-driven strobe capture rig")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory for session folders (overrides [output].base_dir)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Use simulated GPIO and camera even when hardware support is built in
    #[arg(long)]
    simulate: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Strobe Rig v{}", strobe_rig::VERSION);

    if let Err(e) = run(&args) {
        error!(error = %e, "Startup failed");
        eprintln!("Failed to start rig: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), StartupError> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output.base_dir = output.clone();
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Release))
            .map_err(|e| StartupError::Signal(e.to_string()))?;
    }

    let gpio = open_gpio(args.simulate)?;
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    #[cfg(feature = "camera")]
    if !args.simulate {
        let camera = strobe_rig::capture::DeviceCamera::new();
        return launch(&config, gpio, clock, camera, &shutdown);
    }
    if !args.simulate {
        warn!("Built without camera support, using a simulated camera");
    }
    launch(&config, gpio, clock, SimulatedCamera::new(), &shutdown)
}

fn launch<C: Camera>(
    config: &FileConfig,
    gpio: Arc<dyn Gpio>,
    clock: Arc<dyn Clock>,
    camera: C,
    shutdown: &AtomicBool,
) -> Result<(), StartupError> {
    let hardware = Hardware {
        gpio,
        clock,
        camera,
        writer: AviWriter::new(config.capture.jpeg_quality),
    };
    let mut app = App::init(config, hardware, Box::new(ChannelDisplay::console()))?;
    app.run(shutdown);
    info!(
        pictures = app.rig().counters().picture(),
        videos = app.rig().counters().video(),
        "Done"
    );
    Ok(())
}

#[cfg(feature = "rpi")]
fn open_gpio(simulate: bool) -> Result<Arc<dyn Gpio>, StartupError> {
    if simulate {
        return Ok(Arc::new(SimulatedGpio::new()));
    }
    Ok(Arc::new(strobe_rig::hardware::RpiGpio::new()?))
}

#[cfg(not(feature = "rpi"))]
fn open_gpio(simulate: bool) -> Result<Arc<dyn Gpio>, StartupError> {
    if !simulate {
        warn!("Built without GPIO support, using simulated lines");
    }
    Ok(Arc::new(SimulatedGpio::new()))
}
