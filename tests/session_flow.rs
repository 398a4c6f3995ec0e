//! End-to-end monitoring sessions driven by scene scripts.
//!
//! Each test builds a session over the synthetic camera and replay
//! backends, then drives it with simulated instants.

use std::time::{Duration, Instant};

use proctor_kernel::{
    Camera, CameraConfig, ClassifierSettings, CycleOutcome, DebouncePolicy, FrameStatus,
    GazeDirection, ObjectDetector, PerceptionAdapter, Prediction, ProctorError, ProctorResult,
    ReplayScript, SessionController, SessionSettings, SessionState, Severity, StubFaceLandmarker,
};

fn camera(url: &str) -> Box<Camera> {
    Box::new(
        Camera::new(CameraConfig {
            url: url.to_string(),
            width: 8,
            height: 6,
        })
        .expect("synthetic camera"),
    )
}

fn session_with(script: &str, settings: SessionSettings) -> SessionController {
    let (objects, faces) = ReplayScript::from_json(script)
        .expect("valid script")
        .into_backends();
    let mut session = SessionController::new(
        settings,
        PerceptionAdapter::new(objects, faces),
        camera("stub://webcam"),
    );
    session.load_capabilities().expect("load capabilities");
    assert_eq!(session.state(), SessionState::Ready);
    session
}

fn session(script: &str) -> SessionController {
    session_with(script, SessionSettings::default())
}

fn secs(start: Instant, s: u64) -> Instant {
    start + Duration::from_secs(s)
}

const EMPTY_ROOM: &str = r#"{ "cycles": [{ "objects": [], "faces": [] }] }"#;

const LOOKING_RIGHT: &str = r#"{
    "cycles": [{
        "objects": [{ "label": "person", "score": 0.93 }],
        "faces": [{ "horizontal": 0.5 }]
    }]
}"#;

#[test]
fn empty_frame_emits_one_high_severity_event() {
    let mut session = session(EMPTY_ROOM);
    session.start(Instant::now()).unwrap();

    let outcome = session.run_cycle_now();
    let CycleOutcome::Completed {
        scan,
        status,
        events,
    } = outcome
    else {
        panic!("expected a completed cycle, got {:?}", outcome);
    };
    assert_eq!(scan, 1);
    assert_eq!(status, FrameStatus::Violation);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, "No student detected in frame");
    assert_eq!(events[0].severity, Severity::High);

    let stats = session.stats();
    assert_eq!(stats.scans, 1);
    assert_eq!(stats.violations, 1);
    assert_eq!(session.violation_log().len(), 1);

    // No face: looking away, but below the debounce threshold.
    let pose = session.latest_result().unwrap().head_pose.clone().unwrap();
    assert!(!pose.face_detected);
    assert_eq!(pose.direction, GazeDirection::NoFaceDetected);
    assert_eq!(session.debounce().consecutive_looking_away_secs, 3);
}

#[test]
fn one_cycle_batch_is_prepended_in_emission_order() {
    let mut session = session(
        r#"{ "cycles": [{
            "objects": [
                { "label": "person", "score": 0.9 },
                { "label": "person", "score": 0.8 },
                { "label": "cell phone", "score": 0.7 },
                { "label": "book", "score": 0.35 }
            ],
            "faces": [{ "confidence": 0.9 }]
        }] }"#,
    );
    session.start(Instant::now()).unwrap();
    session.run_cycle_now();

    let kinds: Vec<&str> = session
        .violation_log()
        .iter()
        .map(|e| e.kind.as_str())
        .collect();
    assert_eq!(
        kinds,
        vec!["Multiple people detected (2)", "Prohibited object: cell phone"]
    );
    assert_eq!(session.violation_log().latest().unwrap().severity, Severity::Critical);
    assert_eq!(session.stats().violations, 2);

    // The next cycle's batch lands in front.
    session.run_cycle_now();
    assert_eq!(session.violation_log().len(), 4);
    assert_eq!(
        session.violation_log().latest().unwrap().kind,
        "Multiple people detected (2)"
    );
}

#[test]
fn attentive_student_produces_no_events() {
    let mut session = session(
        r#"{ "cycles": [{
            "objects": [{ "label": "person", "score": 0.95 }, { "label": "chair", "score": 0.6 }],
            "faces": [{ "horizontal": 0.1, "vertical": -0.2 }]
        }] }"#,
    );
    let t0 = Instant::now();
    session.start(t0).unwrap();
    for s in 1..=12 {
        session.poll(secs(t0, s));
    }
    let stats = session.stats();
    assert_eq!(stats.scans, 5);
    assert_eq!(stats.violations, 0);
    assert!(session.violation_log().is_empty());
    let latest = session.latest_result().unwrap();
    assert!(latest.student_visible);
    assert_eq!(latest.raw_detections.len(), 2);
}

#[test]
fn neutral_frontal_face_never_accumulates_looking_away() {
    let mut session = session(
        r#"{ "cycles": [{ "objects": [{ "label": "person", "score": 0.9 }], "faces": [{}] }] }"#,
    );
    let t0 = Instant::now();
    session.start(t0).unwrap();
    for s in 1..=30 {
        session.poll(secs(t0, s));
    }
    assert_eq!(session.stats().scans, 11);
    assert_eq!(session.stats().violations, 0);
    assert_eq!(session.debounce().consecutive_looking_away_secs, 0);
    let pose = session.latest_result().unwrap().head_pose.clone().unwrap();
    assert_eq!(pose.direction, GazeDirection::LookingAtScreen);
    assert!((pose.vertical_deviation - 0.35).abs() < 1e-3);
}

#[test]
fn continuous_looking_away_repeats_every_cycle_after_threshold() {
    let mut session = session(LOOKING_RIGHT);
    let t0 = Instant::now();
    session.start(t0).unwrap();

    let mut fired = Vec::new();
    for s in [1, 3, 6, 9] {
        if let Some(CycleOutcome::Completed { events, .. }) = session.poll(secs(t0, s)) {
            fired.push(events.len());
        }
    }
    assert_eq!(fired, vec![0, 1, 1, 1]);
    assert_eq!(session.stats().looking_away_events, 3);
    let event = session.violation_log().latest().unwrap();
    assert_eq!(event.kind, "Student looking away: Looking right");
    assert_eq!(event.severity, Severity::Medium);
}

#[test]
fn reset_on_fire_requires_a_fresh_away_period() {
    let settings = SessionSettings {
        classifier: ClassifierSettings {
            debounce_policy: DebouncePolicy::ResetOnFire,
            ..ClassifierSettings::default()
        },
        ..SessionSettings::default()
    };
    let mut session = session_with(LOOKING_RIGHT, settings);
    let t0 = Instant::now();
    session.start(t0).unwrap();

    let mut fired = Vec::new();
    for s in [1, 3, 6, 9] {
        if let Some(CycleOutcome::Completed { events, .. }) = session.poll(secs(t0, s)) {
            fired.push(events.len());
        }
    }
    assert_eq!(fired, vec![0, 1, 0, 1]);
    assert_eq!(session.stats().looking_away_events, 2);
}

#[test]
fn glancing_back_resets_the_accumulator() {
    let mut session = session(
        r#"{ "cycles": [
            { "objects": [{ "label": "person", "score": 0.9 }], "faces": [{ "horizontal": -0.6 }] },
            { "objects": [{ "label": "person", "score": 0.9 }], "faces": [{ "horizontal": 0.0 }] },
            { "objects": [{ "label": "person", "score": 0.9 }], "faces": [{ "vertical": 0.8 }] },
            { "objects": [{ "label": "person", "score": 0.9 }], "faces": [{ "vertical": 0.8 }] }
        ] }"#,
    );
    session.start(Instant::now()).unwrap();

    session.run_cycle_now();
    assert_eq!(session.debounce().consecutive_looking_away_secs, 3);
    session.run_cycle_now();
    assert_eq!(session.debounce().consecutive_looking_away_secs, 0);
    session.run_cycle_now();
    assert_eq!(session.stats().violations, 0);
    session.run_cycle_now();
    assert_eq!(
        session.violation_log().latest().unwrap().kind,
        "Student looking away: Looking down"
    );
}

#[test]
fn violation_log_keeps_the_newest_twenty() {
    let mut session = session(EMPTY_ROOM);
    session.start(Instant::now()).unwrap();
    for _ in 0..25 {
        session.run_cycle_now();
    }
    assert_eq!(session.stats().scans, 25);
    // No face also counts as looking away: from the second cycle on, each
    // cycle adds the looking-away event after the empty-frame one.
    assert_eq!(session.stats().violations, 49);
    assert_eq!(session.stats().looking_away_events, 24);
    assert_eq!(session.violation_log().len(), 20);
    let newest: Vec<&str> = session
        .violation_log()
        .iter()
        .take(2)
        .map(|e| e.kind.as_str())
        .collect();
    assert_eq!(
        newest,
        vec![
            "No student detected in frame",
            "Student looking away: No face detected"
        ]
    );
}

#[test]
fn denied_camera_leaves_the_session_ready() {
    let (objects, faces) = ReplayScript::from_json(EMPTY_ROOM).unwrap().into_backends();
    let mut session = SessionController::new(
        SessionSettings::default(),
        PerceptionAdapter::new(objects, faces),
        camera("stub://denied"),
    );
    session.load_capabilities().unwrap();

    let err = session.start(Instant::now()).unwrap_err();
    assert!(matches!(err, ProctorError::CameraAccessDenied(_)));
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.next_deadline().is_none());
    assert!(session.last_error().unwrap().contains("permission denied"));
    assert_eq!(session.run_cycle_now(), CycleOutcome::Skipped);
}

#[test]
fn landmark_failure_abandons_only_that_cycle() {
    let mut session = session(
        r#"{ "cycles": [
            { "objects": [{ "label": "person", "score": 0.9 }], "fail": "face_landmarks" },
            { "objects": [{ "label": "person", "score": 0.9 }], "faces": [{}] }
        ] }"#,
    );
    session.start(Instant::now()).unwrap();

    let outcome = session.run_cycle_now();
    assert!(matches!(
        outcome,
        CycleOutcome::Failed(ProctorError::InferenceFailure(_))
    ));
    assert_eq!(session.stats().scans, 0);
    assert!(session.latest_result().is_none());
    assert!(session.last_error().unwrap().starts_with("Analysis failed"));
    assert_eq!(session.state(), SessionState::Monitoring);

    let outcome = session.run_cycle_now();
    assert!(matches!(
        outcome,
        CycleOutcome::Completed {
            status: FrameStatus::Clear,
            ..
        }
    ));
    assert!(session.last_error().is_none());
}

#[test]
fn detector_failure_does_not_desynchronise_the_script() {
    let mut session = session(
        r#"{ "cycles": [
            { "fail": "object_detection" },
            { "objects": [{ "label": "person", "score": 0.9 }], "faces": [{ "horizontal": 0.7 }] }
        ] }"#,
    );
    session.start(Instant::now()).unwrap();
    assert!(matches!(session.run_cycle_now(), CycleOutcome::Failed(_)));
    session.run_cycle_now();
    let pose = session.latest_result().unwrap().head_pose.clone().unwrap();
    assert_eq!(pose.direction, GazeDirection::LookingRight);
}

/// Healthy until its first call, then reports the device as lost.
struct FlakyDetector {
    healthy: bool,
}

impl ObjectDetector for FlakyDetector {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn detect(&mut self, _: &[u8], _: u32, _: u32) -> ProctorResult<Vec<Prediction>> {
        self.healthy = false;
        Err(ProctorError::InferenceFailure("device lost".to_string()))
    }

    fn is_healthy(&self) -> bool {
        self.healthy
    }
}

#[test]
fn lost_backend_halts_monitoring() {
    let mut session = SessionController::new(
        SessionSettings::default(),
        PerceptionAdapter::new(FlakyDetector { healthy: true }, StubFaceLandmarker::new()),
        camera("stub://webcam"),
    );
    session.load_capabilities().unwrap();
    let t0 = Instant::now();
    session.start(t0).unwrap();

    let outcome = session.poll(secs(t0, 1));
    assert!(matches!(outcome, Some(CycleOutcome::Failed(_))));
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(session.next_deadline().is_none());
    assert!(!session.camera().is_open());
    assert!(session.last_error().unwrap().contains("device lost"));

    // Start re-checks backend health.
    let err = session.start(secs(t0, 2)).unwrap_err();
    assert!(matches!(err, ProctorError::CapabilityUnavailable(_)));
}

#[test]
fn snapshot_serialises_for_presentation() {
    let mut session = session(EMPTY_ROOM);
    let t0 = Instant::now();
    session.start(t0).unwrap();
    session.poll(secs(t0, 1));

    let snapshot = session.snapshot();
    assert_eq!(snapshot.state, SessionState::Monitoring);
    assert_eq!(snapshot.uptime, "00:00:01");
    assert!(!snapshot.analyzing);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["state"], "monitoring");
    assert_eq!(json["stats"]["scans"], 1);
    assert_eq!(json["violations"][0]["type"], "No student detected in frame");
    assert_eq!(json["violations"][0]["severity"], "high");
    assert_eq!(json["latest"]["status"], "violation");
}

#[test]
fn stop_then_start_begins_a_fresh_session() {
    let mut session = session(EMPTY_ROOM);
    let t0 = Instant::now();
    session.start(t0).unwrap();
    session.poll(secs(t0, 1));
    session.poll(secs(t0, 3));
    session.stop();
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(session.violation_log().len(), 3);
    assert!(!session.camera().is_open());

    let t1 = secs(t0, 60);
    session.start(t1).unwrap();
    assert!(session.camera().is_open());
    assert_eq!(session.stats().scans, 0);
    assert!(session.violation_log().is_empty());
    assert!(session.latest_result().is_none());
    assert_eq!(session.debounce().consecutive_looking_away_secs, 0);
}
