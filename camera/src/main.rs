mod capture;
mod control;
mod notify;
mod overlay;
mod screen;
mod storage;
mod trigger;

use std::path::PathBuf;
use std::sync::Arc;

use capture::Capturer;
use control::ControlState;
use notify::{Notifier, StatusBoard};
use overlay::CircleMarker;
use screen::CameraScreen;
use snapcam_common::config::Config;
use snapcam_common::frame::Frame;
use snapcam_source::FrameSource;
use tokio::sync::watch;
use tracing::{debug, error, info};
use trigger::CaptureTrigger;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = ?config.source.kind,
        fps = config.source.fps,
        width = config.source.width,
        height = config.source.height,
        storage_root = %config.storage.root.display(),
        layout = ?config.storage.layout,
        control = config.control.enabled,
        "starting snapcam"
    );

    // Storage gate: nothing is shown until the shared store is usable.
    let storage = match storage::open(&config.storage) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "storage unavailable, not starting the camera");
            std::process::exit(1);
        }
    };

    let source = match FrameSource::from_config(&config.source) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "invalid frame source");
            std::process::exit(1);
        }
    };

    let board = Arc::new(StatusBoard::new());
    let trigger = CaptureTrigger::new();
    let capturer = Arc::new(Capturer::new(
        Arc::clone(&storage),
        config.capture.file_prefix.clone(),
        Some(config.storage.collection.clone()),
    ));
    let notifier: Arc<dyn Notifier> = board.clone();
    let mut screen = CameraScreen::new(
        CircleMarker::from_config(&config.overlay),
        trigger.clone(),
        capturer,
        notifier,
        tokio::runtime::Handle::current(),
    );

    if config.control.enabled {
        let state = Arc::new(ControlState {
            trigger: trigger.clone(),
            board: Arc::clone(&board),
            storage: Arc::clone(&storage),
        });
        let app = control::router(state);
        let bind = config.control.bind.clone();
        tokio::spawn(async move {
            if let Err(e) = control::serve(&bind, app).await {
                error!(error = %e, addr = bind, "control surface stopped");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutting down");
        let _ = shutdown_tx.send(true);
    });

    let mut shown: u64 = 0;
    let mut preview = |frame: &Frame| {
        shown += 1;
        if shown % 300 == 0 {
            debug!(shown, seq = frame.seq, "preview");
        }
    };

    info!("entering preview loop");
    if let Err(e) = source.run(&mut screen, &mut preview, shutdown_rx).await {
        error!(error = %e, "frame source failed");
        std::process::exit(1);
    }

    let status = board.snapshot();
    info!(
        saved = status.saved,
        failed = status.failed,
        "snapcam stopped"
    );
}
