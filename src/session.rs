//! Session controller.
//!
//! Owns the perception adapter, the camera, the timers and all mutable
//! session state (debounce accumulator, violation log, stats). The
//! controller is clock-driven: a driver calls `poll(now)` and sleeps until
//! `next_deadline()`. Nothing here spawns threads.
//!
//! State machine:
//!
//! ```text
//! Idle -> Loading -> Ready -> Monitoring <-> Stopped
//! ```
//!
//! Analysis cycles never overlap. `begin_cycle` hands out a `CycleTicket`
//! and sets the in-flight guard; ticks that arrive while a ticket is out are
//! skipped. Stop bumps the generation, so a ticket issued before Stop is
//! discarded when it completes.

use std::time::{Duration, Instant};

use chrono::Local;
use serde::Serialize;

use crate::analyzer::{AnalyzerSettings, DetectionResult, FrameAnalyzer, FrameStatus};
use crate::camera::CameraSource;
use crate::classifier::{ClassifierSettings, DebounceState, ViolationClassifier, ViolationEvent};
use crate::error::{ProctorError, ProctorResult};
use crate::head_pose::{HeadPoseEstimator, HeadPoseThresholds};
use crate::perception::{Capability, PerceptionAdapter};
use crate::violation_log::{ViolationLog, DEFAULT_LOG_CAPACITY};

pub const DEFAULT_ANALYSIS_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_UPTIME_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

const PROGRESS_INITIALIZING: &str = "Initializing...";
const PROGRESS_READY: &str = "All models loaded! Ready to start.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Ready,
    Monitoring,
    Stopped,
}

/// Lifetime counters. Only a fresh Start resets them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub scans: u64,
    pub violations: u64,
    pub uptime_seconds: u64,
    pub looking_away_events: u64,
    /// Analysis ticks that did not start a cycle of their own: ticks dropped
    /// while a cycle was in flight, ticks coalesced after a stall, and a
    /// kickoff landing on the same poll as an analysis tick.
    pub skipped_cycles: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub analysis_interval: Duration,
    pub uptime_tick: Duration,
    /// Delay before the one-shot first cycle after Start.
    pub initial_delay: Duration,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            analysis_interval: DEFAULT_ANALYSIS_INTERVAL,
            uptime_tick: DEFAULT_UPTIME_TICK,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSettings {
    pub schedule: ScheduleSettings,
    pub analyzer: AnalyzerSettings,
    pub head_pose: HeadPoseThresholds,
    pub classifier: ClassifierSettings,
    pub log_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            schedule: ScheduleSettings::default(),
            analyzer: AnalyzerSettings::default(),
            head_pose: HeadPoseThresholds::default(),
            classifier: ClassifierSettings::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

/// Proof that the holder owns the current analysis cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleTicket {
    id: u64,
    generation: u64,
}

impl CycleTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    Completed {
        scan: u64,
        status: FrameStatus,
        events: Vec<ViolationEvent>,
    },
    /// The cycle failed; session state is unchanged apart from the error.
    Failed(ProctorError),
    /// A previous cycle was still in flight.
    Skipped,
    /// The session stopped (or restarted) while the cycle ran.
    Discarded,
}

/// Everything the presentation layer renders.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub stats: SessionStats,
    pub uptime: String,
    pub analyzing: bool,
    pub latest: Option<DetectionResult>,
    pub violations: Vec<ViolationEvent>,
    pub last_error: Option<String>,
    pub loading_progress: String,
}

/// A scheduled task: periodic or one-shot.
#[derive(Clone, Copy, Debug)]
struct Ticker {
    next_due: Instant,
    period: Option<Duration>,
}

impl Ticker {
    fn periodic(start: Instant, period: Duration) -> Self {
        Self {
            next_due: start + period,
            period: Some(period),
        }
    }

    fn once(at: Instant) -> Self {
        Self {
            next_due: at,
            period: None,
        }
    }

    /// Number of firings due by `now`. Advances past them.
    fn fire(&mut self, now: Instant) -> u64 {
        if now < self.next_due {
            return 0;
        }
        let Some(period) = self.period.filter(|p| !p.is_zero()) else {
            return 1;
        };
        let mut fired = 0;
        while self.next_due <= now {
            self.next_due += period;
            fired += 1;
        }
        fired
    }

    fn is_one_shot(&self) -> bool {
        self.period.is_none()
    }
}

/// Independently cancellable timers.
#[derive(Debug, Default)]
struct Timers {
    uptime: Option<Ticker>,
    kickoff: Option<Ticker>,
    analysis: Option<Ticker>,
}

impl Timers {
    fn arm(schedule: &ScheduleSettings, now: Instant) -> Self {
        Self {
            uptime: Some(Ticker::periodic(now, schedule.uptime_tick)),
            kickoff: Some(Ticker::once(now + schedule.initial_delay)),
            analysis: Some(Ticker::periodic(now, schedule.analysis_interval)),
        }
    }

    fn cancel_all(&mut self) {
        self.uptime = None;
        self.kickoff = None;
        self.analysis = None;
    }

    fn next_deadline(&self) -> Option<Instant> {
        [self.uptime, self.kickoff, self.analysis]
            .iter()
            .flatten()
            .map(|t| t.next_due)
            .min()
    }
}

fn fire_slot(slot: &mut Option<Ticker>, now: Instant) -> u64 {
    let Some(ticker) = slot.as_mut() else {
        return 0;
    };
    let fired = ticker.fire(now);
    if fired > 0 && ticker.is_one_shot() {
        *slot = None;
    }
    fired
}

pub struct SessionController {
    schedule: ScheduleSettings,
    perception: PerceptionAdapter,
    camera: Box<dyn CameraSource>,
    analyzer: FrameAnalyzer,
    classifier: ViolationClassifier,

    state: SessionState,
    stats: SessionStats,
    log: ViolationLog,
    debounce: DebounceState,
    latest: Option<DetectionResult>,
    last_error: Option<String>,
    loading_progress: String,

    timers: Timers,
    started_at: Option<Instant>,
    in_flight: Option<CycleTicket>,
    generation: u64,
    next_cycle_id: u64,
}

impl SessionController {
    /// Build a controller and begin acquiring the perception capabilities.
    pub fn new(
        settings: SessionSettings,
        perception: PerceptionAdapter,
        camera: Box<dyn CameraSource>,
    ) -> Self {
        let estimator = HeadPoseEstimator::new(settings.head_pose);
        let mut controller = Self {
            schedule: settings.schedule,
            perception,
            camera,
            analyzer: FrameAnalyzer::new(settings.analyzer, estimator),
            classifier: ViolationClassifier::new(settings.classifier),
            state: SessionState::Idle,
            stats: SessionStats::default(),
            log: ViolationLog::new(settings.log_capacity),
            debounce: DebounceState::default(),
            latest: None,
            last_error: None,
            loading_progress: PROGRESS_INITIALIZING.to_string(),
            timers: Timers::default(),
            started_at: None,
            in_flight: None,
            generation: 0,
            next_cycle_id: 0,
        };
        controller.transition(SessionState::Loading);
        controller.refresh_readiness();
        controller
    }

    // -------------------- Loading --------------------

    /// Load both capabilities in order. Stops at the first failure.
    pub fn load_capabilities(&mut self) -> ProctorResult<()> {
        self.load_capability(Capability::ObjectDetection)?;
        self.load_capability(Capability::FaceLandmarks)
    }

    /// Load a single capability. May complete the Loading -> Ready step.
    pub fn load_capability(&mut self, capability: Capability) -> ProctorResult<()> {
        if self.perception.is_capability_ready(capability) {
            return Ok(());
        }
        self.loading_progress = match capability {
            Capability::ObjectDetection => "Loading object detection model...".to_string(),
            Capability::FaceLandmarks => "Loading face landmark model...".to_string(),
        };
        if let Err(e) = self.perception.load(capability) {
            self.last_error = Some(format!("Failed to load AI models: {}", e));
            return Err(e);
        }
        self.refresh_readiness();
        Ok(())
    }

    /// Record a capability that finished loading outside the controller.
    pub fn capability_ready(&mut self, capability: Capability) {
        self.perception.mark_ready(capability);
        self.refresh_readiness();
    }

    fn refresh_readiness(&mut self) {
        if self.state == SessionState::Loading && self.perception.is_ready() {
            self.loading_progress = PROGRESS_READY.to_string();
            self.last_error = None;
            self.transition(SessionState::Ready);
        }
    }

    // -------------------- Start / Stop --------------------

    /// Begin monitoring. Starting while already monitoring is a no-op.
    pub fn start(&mut self, now: Instant) -> ProctorResult<()> {
        match self.state {
            SessionState::Monitoring => return Ok(()),
            SessionState::Ready | SessionState::Stopped => {}
            SessionState::Idle | SessionState::Loading => {
                log::warn!("session: start rejected, models still loading");
                return Err(ProctorError::CapabilityUnavailable(
                    "AI models are still loading".to_string(),
                ));
            }
        }
        if !self.perception.is_ready() || !self.perception.is_healthy() {
            log::warn!("session: start rejected, perception unavailable");
            return Err(ProctorError::CapabilityUnavailable(
                "perception backends are not ready".to_string(),
            ));
        }

        if let Err(e) = self.camera.open() {
            log::warn!("session: camera unavailable: {}", e);
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        self.stats = SessionStats::default();
        self.log.clear();
        self.latest = None;
        self.last_error = None;
        self.debounce.reset();
        self.in_flight = None;
        self.generation += 1;
        self.started_at = Some(now);
        self.timers = Timers::arm(&self.schedule, now);
        self.transition(SessionState::Monitoring);
        Ok(())
    }

    /// Stop monitoring. A no-op unless monitoring.
    pub fn stop(&mut self) {
        if self.state != SessionState::Monitoring {
            return;
        }
        self.timers.cancel_all();
        self.camera.release();
        self.started_at = None;
        self.debounce.reset();
        self.in_flight = None;
        self.generation += 1;
        self.transition(SessionState::Stopped);
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::info!("session: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    // -------------------- Scheduling --------------------

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire every timer due by `now`. Runs at most one analysis cycle.
    pub fn poll(&mut self, now: Instant) -> Option<CycleOutcome> {
        if self.state != SessionState::Monitoring {
            return None;
        }

        let ticks = fire_slot(&mut self.timers.uptime, now);
        self.stats.uptime_seconds += ticks * self.schedule.uptime_tick.as_secs();

        let due = fire_slot(&mut self.timers.kickoff, now)
            + fire_slot(&mut self.timers.analysis, now);
        if due == 0 {
            return None;
        }

        let Some(ticket) = self.begin_cycle() else {
            self.stats.skipped_cycles += due;
            log::debug!("session: analysis tick skipped, cycle in flight");
            return Some(CycleOutcome::Skipped);
        };
        self.stats.skipped_cycles += due - 1;

        let analysis = self.analyze_current_frame();
        Some(self.complete_cycle(ticket, analysis))
    }

    /// Run one cycle immediately, outside the timers.
    pub fn run_cycle_now(&mut self) -> CycleOutcome {
        let Some(ticket) = self.begin_cycle() else {
            return CycleOutcome::Skipped;
        };
        let analysis = self.analyze_current_frame();
        self.complete_cycle(ticket, analysis)
    }

    // -------------------- Cycles --------------------

    /// Claim the next analysis cycle. `None` while not monitoring or while
    /// another cycle is in flight.
    pub fn begin_cycle(&mut self) -> Option<CycleTicket> {
        if self.state != SessionState::Monitoring || self.in_flight.is_some() {
            return None;
        }
        self.next_cycle_id += 1;
        let ticket = CycleTicket {
            id: self.next_cycle_id,
            generation: self.generation,
        };
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Capture the current frame and run the analyzer. Touches no session
    /// state.
    pub fn analyze_current_frame(&mut self) -> ProctorResult<DetectionResult> {
        let frame = self.camera.capture()?;
        let view = frame.inference_view();
        self.analyzer.analyze(&view, &mut self.perception)
    }

    /// Apply a cycle's result. This is the only place session state changes
    /// during monitoring.
    pub fn complete_cycle(
        &mut self,
        ticket: CycleTicket,
        analysis: ProctorResult<DetectionResult>,
    ) -> CycleOutcome {
        if self.in_flight != Some(ticket) || ticket.generation != self.generation {
            log::debug!("session: discarding result of stale cycle {}", ticket.id);
            return CycleOutcome::Discarded;
        }
        self.in_flight = None;

        let result = match analysis {
            Ok(result) => result,
            Err(e) => {
                log::warn!("session: cycle {} failed: {}", ticket.id, e);
                self.last_error = Some(format!("Analysis failed: {}", e));
                if !self.perception.is_healthy() || !self.camera.is_healthy() {
                    log::error!("session: capability lost, stopping monitoring");
                    self.stop();
                }
                return CycleOutcome::Failed(e);
            }
        };

        let classification = self
            .classifier
            .classify(&result, &mut self.debounce, Local::now());
        self.stats.scans += 1;
        self.stats.violations += classification.events.len() as u64;
        if classification.looking_away_fired {
            self.stats.looking_away_events += 1;
        }
        self.log.record(&classification.events);
        self.last_error = None;

        log::debug!(
            "session: scan {} people={} prohibited={} status={:?} events={}",
            self.stats.scans,
            result.people_count,
            result.prohibited_objects.len(),
            result.status,
            classification.events.len()
        );
        for event in &classification.events {
            log::info!("violation [{}] {} at {}", event.severity, event.kind, event.timestamp);
        }

        let status = result.status;
        self.latest = Some(result);
        CycleOutcome::Completed {
            scan: self.stats.scans,
            status,
            events: classification.events,
        }
    }

    // -------------------- Accessors --------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn violation_log(&self) -> &ViolationLog {
        &self.log
    }

    pub fn debounce(&self) -> DebounceState {
        self.debounce
    }

    pub fn latest_result(&self) -> Option<&DetectionResult> {
        self.latest.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn loading_progress(&self) -> &str {
        &self.loading_progress
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn camera(&self) -> &dyn CameraSource {
        self.camera.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            stats: self.stats,
            uptime: format_uptime(self.stats.uptime_seconds),
            analyzing: self.in_flight.is_some(),
            latest: self.latest.clone(),
            violations: self.log.to_vec(),
            last_error: self.last_error.clone(),
            loading_progress: self.loading_progress.clone(),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.camera.release();
    }
}

/// `HH:MM:SS`, hours unbounded.
pub fn format_uptime(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
