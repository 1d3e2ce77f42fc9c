//! Camera Preview CLI
//!
//! Drives a preview controller over the mock camera backend to
//! demonstrate the open / preview / swap / close lifecycle.

use camera_preview::{
    controller::{FileConfig, PreviewController},
    device::{MockBackend, MockCameraConfig},
    host::{ChannelListener, PreviewHost, PreviewSurface, PreviewTarget},
    metrics::MetricsRegistry,
    negotiation::Size,
    CameraSelector,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "camera-preview", version, about = "Camera preview lifecycle demo")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preview surface width (overrides the config file).
    #[arg(long)]
    width: Option<u32>,

    /// Preview surface height (overrides the config file).
    #[arg(long)]
    height: Option<u32>,

    /// Camera to open first.
    #[arg(long, value_enum)]
    selector: Option<CameraSelector>,

    /// Swap to the other camera after the first preview.
    #[arg(long)]
    swap: bool,

    /// How long to keep each preview running, in milliseconds.
    #[arg(long, default_value_t = 500)]
    hold_ms: u64,

    /// Simulated device open latency, in milliseconds.
    #[arg(long)]
    open_delay_ms: Option<u64>,

    /// Keep previewing until Ctrl-C.
    #[arg(long)]
    wait: bool,

    /// Print metrics in Prometheus text format before exiting.
    #[arg(long)]
    print_metrics: bool,
}

/// Surface that only logs the buffer size it is given.
struct ConsoleSurface;

impl PreviewSurface for ConsoleSurface {
    fn is_available(&self) -> bool {
        true
    }

    fn set_default_buffer_size(&self, size: Size) {
        info!(size = %size, "Surface buffer size set");
    }
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
    info!("Camera Preview v{}", camera_preview::VERSION);

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(selector) = args.selector {
        config.controller.default_selector = selector;
    }
    let width = args.width.unwrap_or(config.target.width);
    let height = args.height.unwrap_or(config.target.height);

    let cameras = if config.cameras.is_empty() {
        vec![MockCameraConfig::new("0"), MockCameraConfig::new("1")]
    } else {
        config.cameras.clone()
    };
    let mut backend = MockBackend::new(cameras);
    if let Some(delay) = args.open_delay_ms {
        backend = backend.with_open_delay(Duration::from_millis(delay));
    }

    let metrics = match MetricsRegistry::new() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    if config.metrics.port != 0 {
        spawn_metrics_server(config.metrics.port, Arc::clone(&metrics));
    }

    let (listener, events) = ChannelListener::new();
    let printer = std::thread::spawn(move || {
        for event in events {
            println!(
                "{} preview {:?} success={}",
                event.at.format("%H:%M:%S%.3f"),
                event.kind,
                event.success
            );
        }
    });

    let controller = PreviewController::with_metrics(
        backend,
        config.controller.clone(),
        Arc::new(listener),
        Arc::clone(&metrics),
    );
    let hold = Duration::from_millis(args.hold_ms);

    if let Err(e) = run(&controller, &args, width, height, hold) {
        warn!("Preview run aborted: {}", e);
    }

    info!(
        state = %controller.state(),
        preview_size = ?controller.preview_size(),
        video_size = ?controller.video_size(),
        "Shutting down"
    );
    controller.shutdown();
    if printer.join().is_err() {
        warn!("Event printer panicked");
    }

    if args.print_metrics {
        match metrics.encode() {
            Ok(output) => print!("{}", output),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
}

fn run(
    controller: &PreviewController<MockBackend>,
    args: &Args,
    width: u32,
    height: u32,
    hold: Duration,
) -> Result<(), camera_preview::ControllerError> {
    let mut host = PreviewHost::new(controller);
    host.surface_available(PreviewTarget::new(Arc::new(ConsoleSurface), width, height))?;
    std::thread::sleep(hold);

    if args.swap {
        host.swap_camera()?;
        info!(selector = %controller.selector(), "Swapped camera");
        std::thread::sleep(hold);
    }

    if args.wait {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        } else {
            info!("Previewing until Ctrl-C");
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    host.surface_destroyed()
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, registry: Arc<MetricsRegistry>) {
    use camera_preview::metrics::{MetricsServer, MetricsServerConfig};

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(port: u16, _registry: Arc<MetricsRegistry>) {
    warn!(port, "Metrics port configured but the `metrics` feature is disabled");
}
