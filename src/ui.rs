use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use proctor_kernel::SessionSnapshot;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    /// A named startup step, e.g. loading one perception capability.
    /// Completion is reported when the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// One-line monitoring status, redrawn in place on a terminal.
    pub fn status_line(&self) -> StatusLine {
        let spinner = self.use_pretty().then(|| spinner("{spinner} {msg}"));
        StatusLine { spinner }
    }
}

fn spinner(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style =
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Report the stage as failed instead of done.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!("{} {} ({})", mark, self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct StatusLine {
    spinner: Option<ProgressBar>,
}

impl StatusLine {
    pub fn update(&self, snapshot: &SessionSnapshot) {
        if let Some(spinner) = &self.spinner {
            spinner.set_message(render_status(snapshot));
        }
    }

    pub fn finish(&self, snapshot: &SessionSnapshot) {
        let message = render_status(snapshot);
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn render_status(snapshot: &SessionSnapshot) -> String {
    let status = match &snapshot.latest {
        Some(result) if result.is_violation() => "VIOLATION",
        Some(_) => "clear",
        None => "waiting",
    };
    let mut line = format!(
        "{:?} {} scans={} violations={} frame={}",
        snapshot.state,
        snapshot.uptime,
        snapshot.stats.scans,
        snapshot.stats.violations,
        status
    );
    if let Some(pose) = snapshot.latest.as_ref().and_then(|r| r.head_pose.as_ref()) {
        line.push_str(&format!(" gaze=\"{}\"", pose.direction));
    }
    if let Some(err) = &snapshot.last_error {
        line.push_str(&format!(" error=\"{}\"", err));
    }
    line
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
