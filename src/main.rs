use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use scancam::{
    PreviewSurface, Resolution, ScancamConfig, SessionControllerBuilder, SimulatedDevice,
    SimulatedSurface, SurfaceEvent,
};

#[derive(Parser, Debug)]
#[command(name = "scancam")]
#[command(about = "Camera session control for real-time barcode and QR scanning")]
#[command(version)]
#[command(long_about = "Drives a scripted camera scanning session against the built-in \
simulated capture backend: attach, surface lifecycle, touch-to-focus, zoom, and flashlight \
control. Useful for exercising the session state machine without camera hardware.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "scancam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without running")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("# Scancam configuration file");
        println!("# Default values for all available options");
        println!();
        println!("{}", ScancamConfig::default().to_toml()?);
        return Ok(());
    }

    init_logging(&args);

    info!("Starting scancam v{}", env!("CARGO_PKG_VERSION"));

    let config = match ScancamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    run_smoke_session(config)
}

/// Scripted session against the simulated backend: the full control
/// surface, end to end, without hardware.
fn run_smoke_session(config: ScancamConfig) -> Result<()> {
    let device = SimulatedDevice::barcode_reference();
    let surface = SimulatedSurface::new(Resolution::new(1080, 1920));

    let controller = SessionControllerBuilder::new().config(config).build()?;
    controller.attach(Some(device.clone()), surface.clone());

    controller.handle_surface_event(SurfaceEvent::Created);
    controller.start_preview();

    let resolution = controller
        .camera_resolution()
        .ok_or_else(|| anyhow::anyhow!("no resolution negotiated"))?;
    info!("Previewing at {} ({:?})", resolution, controller.state());

    // Touch-to-focus in the viewport center, then let the device report
    controller.request_focus_at(540.0, 960.0, 200.0, 200.0);
    device.complete_focus(true);

    for _ in 0..3 {
        controller.zoom_in();
    }
    info!("Zoom level now {}", controller.zoom_level());

    controller.open_flashlight();
    controller.close_flashlight();

    surface.finish_construction();
    controller.handle_surface_event(SurfaceEvent::Changed {
        width: 1080,
        height: 1920,
        target: surface.drawable_target(),
    });

    controller.stop_preview();
    controller.release();

    println!(
        "✓ Smoke session completed: negotiated {}, final state {:?}",
        resolution,
        controller.state()
    );
    Ok(())
}

fn init_logging(args: &Args) {
    use tracing_subscriber::EnvFilter;

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scancam={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(args.debug)
        .init();
}
