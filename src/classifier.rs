//! Violation classifier.
//!
//! Turns one `DetectionResult` into zero or more `ViolationEvent`s. All rules
//! are evaluated independently every cycle. The only state carried between
//! cycles is the looking-away accumulator in `DebounceState`.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::analyzer::DetectionResult;

pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_LOOKING_AWAY_THRESHOLD_SECS: u64 = 6;

const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Medium => f.write_str("medium"),
            Severity::High => f.write_str("high"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEvent {
    /// Wall-clock time of classification, `HH:MM:SS`.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
}

impl ViolationEvent {
    fn new(timestamp: &str, kind: String, severity: Severity) -> Self {
        Self {
            timestamp: timestamp.to_string(),
            kind,
            severity,
        }
    }
}

/// What happens to the looking-away accumulator once it fires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebouncePolicy {
    /// Keep accumulating: the event repeats every cycle while the student
    /// keeps looking away.
    #[default]
    Continuous,
    /// Reset to zero after firing: a fresh full away-period is required
    /// before the next event.
    ResetOnFire,
}

impl std::str::FromStr for DebouncePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(DebouncePolicy::Continuous),
            "reset_on_fire" | "reset-on-fire" => Ok(DebouncePolicy::ResetOnFire),
            other => Err(format!("unknown debounce policy '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebounceState {
    pub consecutive_looking_away_secs: u64,
}

impl DebounceState {
    pub fn reset(&mut self) {
        self.consecutive_looking_away_secs = 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Nominal seconds added to the accumulator per looking-away cycle.
    pub cycle_interval_secs: u64,
    pub looking_away_threshold_secs: u64,
    pub debounce_policy: DebouncePolicy,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            cycle_interval_secs: DEFAULT_CYCLE_INTERVAL_SECS,
            looking_away_threshold_secs: DEFAULT_LOOKING_AWAY_THRESHOLD_SECS,
            debounce_policy: DebouncePolicy::Continuous,
        }
    }
}

/// Events emitted for one cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub events: Vec<ViolationEvent>,
    /// The looking-away rule fired this cycle.
    pub looking_away_fired: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ViolationClassifier {
    settings: ClassifierSettings,
}

impl ViolationClassifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> ClassifierSettings {
        self.settings
    }

    pub fn classify(
        &self,
        result: &DetectionResult,
        debounce: &mut DebounceState,
        now: DateTime<Local>,
    ) -> Classification {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let mut classification = Classification::default();
        let events = &mut classification.events;

        if result.people_count == 0 {
            events.push(ViolationEvent::new(
                &timestamp,
                "No student detected in frame".to_string(),
                Severity::High,
            ));
        }
        if result.people_count > 1 {
            events.push(ViolationEvent::new(
                &timestamp,
                format!("Multiple people detected ({})", result.people_count),
                Severity::Critical,
            ));
        }

        for label in &result.prohibited_objects {
            events.push(ViolationEvent::new(
                &timestamp,
                format!("Prohibited object: {}", label),
                Severity::High,
            ));
        }

        match &result.head_pose {
            Some(pose) if pose.looking_away => {
                debounce.consecutive_looking_away_secs = debounce
                    .consecutive_looking_away_secs
                    .saturating_add(self.settings.cycle_interval_secs);
                if debounce.consecutive_looking_away_secs
                    >= self.settings.looking_away_threshold_secs
                {
                    events.push(ViolationEvent::new(
                        &timestamp,
                        format!("Student looking away: {}", pose.direction),
                        Severity::Medium,
                    ));
                    classification.looking_away_fired = true;
                    if self.settings.debounce_policy == DebouncePolicy::ResetOnFire {
                        debounce.reset();
                    }
                }
            }
            _ => debounce.reset(),
        }

        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FrameStatus;
    use crate::head_pose::{GazeDirection, HeadPoseResult};
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 14, h, m, s)
            .earliest()
            .unwrap()
    }

    fn pose(looking_away: bool, direction: GazeDirection) -> HeadPoseResult {
        HeadPoseResult {
            face_detected: direction != GazeDirection::NoFaceDetected,
            looking_away,
            direction,
            horizontal_deviation: 0.0,
            vertical_deviation: 0.0,
            confidence: 0.9,
        }
    }

    fn result(
        people: u32,
        prohibited: &[&str],
        head_pose: Option<HeadPoseResult>,
    ) -> DetectionResult {
        DetectionResult {
            people_count: people,
            student_visible: people == 1,
            prohibited_objects: prohibited.iter().map(|s| s.to_string()).collect(),
            raw_detections: Vec::new(),
            head_pose,
            status: FrameStatus::Violation,
        }
    }

    fn away() -> Option<HeadPoseResult> {
        Some(pose(true, GazeDirection::LookingRight))
    }

    #[test]
    fn empty_frame_emits_high_severity_event() {
        let mut debounce = DebounceState::default();
        let out = ViolationClassifier::default().classify(
            &result(0, &[], None),
            &mut debounce,
            at(10, 4, 5),
        );
        assert_eq!(
            out.events,
            vec![ViolationEvent {
                timestamp: "10:04:05".to_string(),
                kind: "No student detected in frame".to_string(),
                severity: Severity::High,
            }]
        );
    }

    #[test]
    fn every_applicable_rule_fires() {
        let mut debounce = DebounceState::default();
        let out = ViolationClassifier::default().classify(
            &result(3, &["cell phone", "book"], None),
            &mut debounce,
            at(9, 0, 0),
        );
        let kinds: Vec<(&str, Severity)> = out
            .events
            .iter()
            .map(|e| (e.kind.as_str(), e.severity))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Multiple people detected (3)", Severity::Critical),
                ("Prohibited object: cell phone", Severity::High),
                ("Prohibited object: book", Severity::High),
            ]
        );
    }

    #[test]
    fn single_looking_away_cycle_is_debounced() {
        let mut debounce = DebounceState::default();
        let out = ViolationClassifier::default().classify(
            &result(1, &[], away()),
            &mut debounce,
            at(9, 0, 0),
        );
        assert!(out.events.is_empty());
        assert!(!out.looking_away_fired);
        assert_eq!(debounce.consecutive_looking_away_secs, 3);
    }

    #[test]
    fn continuous_policy_fires_on_second_cycle_and_keeps_firing() {
        let classifier = ViolationClassifier::default();
        let mut debounce = DebounceState::default();
        let fired: Vec<bool> = (0..3)
            .map(|_| {
                classifier
                    .classify(&result(1, &[], away()), &mut debounce, at(9, 0, 0))
                    .looking_away_fired
            })
            .collect();
        assert_eq!(fired, vec![false, true, true]);
        assert_eq!(debounce.consecutive_looking_away_secs, 9);
    }

    #[test]
    fn looking_away_event_names_the_direction() {
        let classifier = ViolationClassifier::default();
        let mut debounce = DebounceState {
            consecutive_looking_away_secs: 3,
        };
        let out = classifier.classify(
            &result(1, &[], Some(pose(true, GazeDirection::LookingDown))),
            &mut debounce,
            at(9, 0, 0),
        );
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].kind, "Student looking away: Looking down");
        assert_eq!(out.events[0].severity, Severity::Medium);
    }

    #[test]
    fn reset_on_fire_requires_a_fresh_away_period() {
        let classifier = ViolationClassifier::new(ClassifierSettings {
            debounce_policy: DebouncePolicy::ResetOnFire,
            ..ClassifierSettings::default()
        });
        let mut debounce = DebounceState::default();
        let fired: Vec<bool> = (0..4)
            .map(|_| {
                classifier
                    .classify(&result(1, &[], away()), &mut debounce, at(9, 0, 0))
                    .looking_away_fired
            })
            .collect();
        assert_eq!(fired, vec![false, true, false, true]);
        assert_eq!(debounce.consecutive_looking_away_secs, 0);
    }

    #[test]
    fn attentive_cycle_resets_the_accumulator() {
        let classifier = ViolationClassifier::default();
        let mut debounce = DebounceState::default();
        classifier.classify(&result(1, &[], away()), &mut debounce, at(9, 0, 0));
        classifier.classify(
            &result(1, &[], Some(pose(false, GazeDirection::LookingAtScreen))),
            &mut debounce,
            at(9, 0, 3),
        );
        assert_eq!(debounce.consecutive_looking_away_secs, 0);
        let out = classifier.classify(&result(1, &[], away()), &mut debounce, at(9, 0, 6));
        assert!(!out.looking_away_fired);
    }

    #[test]
    fn missing_head_pose_resets_the_accumulator() {
        let classifier = ViolationClassifier::default();
        let mut debounce = DebounceState {
            consecutive_looking_away_secs: 3,
        };
        let out = classifier.classify(&result(1, &[], None), &mut debounce, at(9, 0, 0));
        assert!(out.events.is_empty());
        assert_eq!(debounce.consecutive_looking_away_secs, 0);
    }

    #[test]
    fn absent_face_accumulates_like_looking_away() {
        let classifier = ViolationClassifier::default();
        let mut debounce = DebounceState::default();
        let no_face = Some(HeadPoseResult::no_face());
        classifier.classify(&result(0, &[], no_face.clone()), &mut debounce, at(9, 0, 0));
        let out = classifier.classify(&result(0, &[], no_face), &mut debounce, at(9, 0, 3));
        let kinds: Vec<&str> = out.events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                "No student detected in frame",
                "Student looking away: No face detected"
            ]
        );
    }

    #[test]
    fn debounce_policy_parses_from_config_strings() {
        assert_eq!("continuous".parse::<DebouncePolicy>(), Ok(DebouncePolicy::Continuous));
        assert_eq!("Reset_On_Fire".parse::<DebouncePolicy>(), Ok(DebouncePolicy::ResetOnFire));
        assert!("sometimes".parse::<DebouncePolicy>().is_err());
    }

    #[test]
    fn events_serialise_with_type_field() {
        let event =
            ViolationEvent::new("12:00:00", "Prohibited object: book".into(), Severity::High);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Prohibited object: book");
        assert_eq!(json["severity"], "high");
    }
}
