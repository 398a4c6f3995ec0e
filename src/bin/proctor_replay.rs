//! proctor_replay - run a monitoring session against a scene script
//!
//! The session clock is simulated: timers fire back to back without
//! sleeping, so a ten-minute exam replays instantly. The final session
//! snapshot is printed as JSON on stdout.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use proctor_kernel::{
    Camera, CycleOutcome, PerceptionAdapter, ProctorConfig, ReplayScript, SessionController,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scene script (JSON) listing what each analysis cycle sees.
    #[arg(long)]
    script: PathBuf,
    /// Optional JSON or TOML config file.
    #[arg(long, env = "PROCTOR_CONFIG")]
    config: Option<PathBuf>,
    /// Simulated monitoring time. Defaults to one analysis interval per
    /// scripted cycle, plus the initial delay.
    #[arg(long, value_name = "SECS")]
    seconds: Option<u64>,
    /// Emit compact JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let cfg = ProctorConfig::load_from(args.config.as_deref())?;
    let script = ReplayScript::from_path(&args.script)?;
    if script.is_empty() {
        return Err(anyhow!("replay script {} has no cycles", args.script.display()));
    }

    let simulated = match args.seconds {
        Some(secs) => Duration::from_secs(secs),
        None => script_duration(&cfg, script.len())?,
    };

    let (objects, faces) = script.into_backends();
    let perception = PerceptionAdapter::new(objects, faces);
    let camera = Camera::new(cfg.camera.clone())?;
    let mut session = SessionController::new(cfg.session_settings(), perception, Box::new(camera));
    session.load_capabilities()?;

    let t0 = Instant::now();
    let end = t0 + simulated;
    session.start(t0)?;

    while let Some(deadline) = session.next_deadline() {
        if deadline > end {
            break;
        }
        match session.poll(deadline) {
            Some(CycleOutcome::Completed { scan, status, events }) => {
                log::info!("scan {} {:?} events={}", scan, status, events.len());
            }
            Some(CycleOutcome::Failed(e)) => log::warn!("cycle failed: {}", e),
            _ => {}
        }
    }
    session.stop();

    let snapshot = session.snapshot();
    let out = if args.compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{}", out);
    Ok(())
}

/// Simulated time that covers every scripted cycle once: the kickoff runs
/// the first, each analysis interval one more.
fn script_duration(cfg: &ProctorConfig, cycles: usize) -> Result<Duration> {
    let intervals = u32::try_from(cycles.saturating_sub(1))
        .map_err(|_| anyhow!("replay script has too many cycles ({})", cycles))?;
    cfg.analysis_interval
        .checked_mul(intervals)
        .and_then(|d| d.checked_add(cfg.initial_delay))
        .ok_or_else(|| anyhow!("simulated duration for {} cycles overflows", cycles))
}
