//! proctord - exam proctoring daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by --config or PROCTOR_CONFIG, then env)
//! 2. Loads the object-detection and face-landmark capabilities
//! 3. Opens the camera and starts a monitoring session
//! 4. Drives the session timers until Ctrl-C or --duration elapses
//! 5. Stops the session, releases the camera and prints the final snapshot

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use proctor_kernel::{
    Camera, Capability, CycleOutcome, PerceptionAdapter, ProctorConfig, ReplayScript,
    SessionController, StubFaceLandmarker, StubObjectDetector,
};

#[path = "../ui.rs"]
mod ui;

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a JSON or TOML config file.
    #[arg(long, env = "PROCTOR_CONFIG")]
    config: Option<PathBuf>,
    /// Replay script driving the perception backends instead of the stubs.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Stop monitoring after this many seconds.
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,
    /// Print the final session snapshot as JSON on stdout.
    #[arg(long)]
    json: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load configuration");
        ProctorConfig::load_from(args.config.as_deref())?
    };
    log::info!(
        "camera={} {}x{} analysis_interval={}s debounce={:?}",
        cfg.camera.url,
        cfg.camera.width,
        cfg.camera.height,
        cfg.analysis_interval.as_secs(),
        cfg.debounce_policy
    );

    let perception = match &args.script {
        Some(path) => {
            let script = ReplayScript::from_path(path)?;
            log::info!("replaying {} scripted cycles from {}", script.len(), path.display());
            let (objects, faces) = script.into_backends();
            PerceptionAdapter::new(objects, faces)
        }
        None => PerceptionAdapter::new(StubObjectDetector::new(), StubFaceLandmarker::new()),
    };
    let camera = Camera::new(cfg.camera.clone())?;
    let mut session = SessionController::new(cfg.session_settings(), perception, Box::new(camera));

    for (capability, label) in [
        (Capability::ObjectDetection, "Load object detection model"),
        (Capability::FaceLandmarks, "Load face landmark model"),
    ] {
        let stage = ui.stage(label);
        if let Err(e) = session.load_capability(capability) {
            stage.fail();
            return Err(anyhow!("failed to load AI models: {}", e));
        }
    }
    log::info!("{}", session.loading_progress());

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let started = Instant::now();
    {
        let _stage = ui.stage("Start monitoring");
        session.start(started)?;
    }
    let stop_at = args.duration.map(|secs| started + Duration::from_secs(secs));
    let status = ui.status_line();
    let mut last_status_log = started;

    log::info!("proctord monitoring. press Ctrl-C to stop");

    loop {
        let now = Instant::now();
        if stop_at.is_some_and(|deadline| now >= deadline) {
            log::info!("monitoring duration elapsed");
            break;
        }

        match session.poll(now) {
            Some(CycleOutcome::Failed(e)) => log::warn!("analysis cycle failed: {}", e),
            Some(CycleOutcome::Skipped) => log::debug!("analysis tick skipped"),
            _ => {}
        }
        if session.next_deadline().is_none() {
            log::error!(
                "monitoring halted: {}",
                session.last_error().unwrap_or("session stopped")
            );
            break;
        }

        let snapshot = session.snapshot();
        status.update(&snapshot);
        if now.duration_since(last_status_log) >= STATUS_LOG_INTERVAL {
            log::info!(
                "uptime={} scans={} violations={} looking_away={} skipped={}",
                snapshot.uptime,
                snapshot.stats.scans,
                snapshot.stats.violations,
                snapshot.stats.looking_away_events,
                snapshot.stats.skipped_cycles
            );
            last_status_log = now;
        }

        let wake = [session.next_deadline(), stop_at]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(now);
        match rx.recv_timeout(wake.saturating_duration_since(Instant::now())) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received, stopping session...");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    session.stop();
    let snapshot = session.snapshot();
    status.finish(&snapshot);
    for event in &snapshot.violations {
        log::info!("[{}] {} ({})", event.timestamp, event.kind, event.severity);
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    Ok(())
}
