use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use crate::analyzer::{
    AnalyzerSettings, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_PROHIBITED_KEYWORDS,
    DEFAULT_RAW_DETECTION_LIMIT,
};
use crate::camera::{CameraConfig, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_URL, DEFAULT_CAMERA_WIDTH};
use crate::classifier::{ClassifierSettings, DebouncePolicy, DEFAULT_LOOKING_AWAY_THRESHOLD_SECS};
use crate::head_pose::{
    HeadPoseThresholds, DEFAULT_HORIZONTAL_THRESHOLD, DEFAULT_VERTICAL_THRESHOLD,
};
use crate::session::{ScheduleSettings, SessionSettings};
use crate::violation_log::DEFAULT_LOG_CAPACITY;

const DEFAULT_ANALYSIS_INTERVAL_SECS: u64 = 3;
const DEFAULT_UPTIME_TICK_SECS: u64 = 1;
const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

pub const CONFIG_ENV: &str = "PROCTOR_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProctorConfigFile {
    camera: Option<CameraConfigFile>,
    schedule: Option<ScheduleConfigFile>,
    analysis: Option<AnalysisConfigFile>,
    head_pose: Option<HeadPoseConfigFile>,
    violations: Option<ViolationsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleConfigFile {
    analysis_interval_secs: Option<u64>,
    uptime_tick_secs: Option<u64>,
    initial_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AnalysisConfigFile {
    confidence_threshold: Option<f32>,
    raw_detection_limit: Option<usize>,
    prohibited_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct HeadPoseConfigFile {
    horizontal_threshold: Option<f32>,
    vertical_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ViolationsConfigFile {
    looking_away_threshold_secs: Option<u64>,
    log_capacity: Option<usize>,
    debounce_policy: Option<DebouncePolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProctorConfig {
    pub camera: CameraConfig,
    pub analysis_interval: Duration,
    pub uptime_tick: Duration,
    pub initial_delay: Duration,
    pub confidence_threshold: f32,
    pub raw_detection_limit: usize,
    pub prohibited_keywords: Vec<String>,
    pub horizontal_threshold: f32,
    pub vertical_threshold: f32,
    pub looking_away_threshold_secs: u64,
    pub log_capacity: usize,
    pub debounce_policy: DebouncePolicy,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self::from_file(ProctorConfigFile::default())
    }
}

impl ProctorConfig {
    /// Defaults, then the file named by `PROCTOR_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit file taking the place of `PROCTOR_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProctorConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let schedule = file.schedule.unwrap_or_default();
        let analysis = file.analysis.unwrap_or_default();
        let head_pose = file.head_pose.unwrap_or_default();
        let violations = file.violations.unwrap_or_default();

        Self {
            camera: CameraConfig {
                url: camera.url.unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            },
            analysis_interval: Duration::from_secs(
                schedule
                    .analysis_interval_secs
                    .unwrap_or(DEFAULT_ANALYSIS_INTERVAL_SECS),
            ),
            uptime_tick: Duration::from_secs(
                schedule.uptime_tick_secs.unwrap_or(DEFAULT_UPTIME_TICK_SECS),
            ),
            initial_delay: Duration::from_millis(
                schedule.initial_delay_ms.unwrap_or(DEFAULT_INITIAL_DELAY_MS),
            ),
            confidence_threshold: analysis
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            raw_detection_limit: analysis
                .raw_detection_limit
                .unwrap_or(DEFAULT_RAW_DETECTION_LIMIT),
            prohibited_keywords: analysis.prohibited_keywords.unwrap_or_else(|| {
                DEFAULT_PROHIBITED_KEYWORDS
                    .iter()
                    .map(|k| k.to_string())
                    .collect()
            }),
            horizontal_threshold: head_pose
                .horizontal_threshold
                .unwrap_or(DEFAULT_HORIZONTAL_THRESHOLD),
            vertical_threshold: head_pose
                .vertical_threshold
                .unwrap_or(DEFAULT_VERTICAL_THRESHOLD),
            looking_away_threshold_secs: violations
                .looking_away_threshold_secs
                .unwrap_or(DEFAULT_LOOKING_AWAY_THRESHOLD_SECS),
            log_capacity: violations.log_capacity.unwrap_or(DEFAULT_LOG_CAPACITY),
            debounce_policy: violations.debounce_policy.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PROCTOR_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(interval) = std::env::var("PROCTOR_ANALYSIS_INTERVAL_SECS") {
            let seconds: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("PROCTOR_ANALYSIS_INTERVAL_SECS must be an integer number of seconds")
            })?;
            self.analysis_interval = Duration::from_secs(seconds);
        }
        if let Ok(threshold) = std::env::var("PROCTOR_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCTOR_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        if let Ok(capacity) = std::env::var("PROCTOR_LOG_CAPACITY") {
            self.log_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("PROCTOR_LOG_CAPACITY must be an integer"))?;
        }
        if let Ok(policy) = std::env::var("PROCTOR_DEBOUNCE_POLICY") {
            self.debounce_policy = policy
                .parse()
                .map_err(|e| anyhow!("PROCTOR_DEBOUNCE_POLICY: {}", e))?;
        }
        if let Ok(keywords) = std::env::var("PROCTOR_PROHIBITED_KEYWORDS") {
            let parsed = split_csv(&keywords);
            if !parsed.is_empty() {
                self.prohibited_keywords = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.analysis_interval.as_secs() == 0 {
            return Err(anyhow!("analysis interval must be at least one second"));
        }
        if self.uptime_tick.as_secs() == 0 {
            return Err(anyhow!("uptime tick must be at least one second"));
        }
        if !(self.confidence_threshold.is_finite()
            && self.confidence_threshold > 0.0
            && self.confidence_threshold <= 1.0)
        {
            return Err(anyhow!("confidence threshold must be in (0, 1]"));
        }
        for (name, value) in [
            ("horizontal", self.horizontal_threshold),
            ("vertical", self.vertical_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(anyhow!("{} head-pose threshold must be positive", name));
            }
        }
        if self.looking_away_threshold_secs == 0 {
            return Err(anyhow!("looking-away threshold must be greater than zero"));
        }
        if self.log_capacity == 0 {
            return Err(anyhow!("violation log capacity must be at least 1"));
        }

        self.prohibited_keywords = self
            .prohibited_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .collect();
        if self.prohibited_keywords.is_empty() {
            return Err(anyhow!("at least one prohibited keyword is required"));
        }
        for keyword in &self.prohibited_keywords {
            validate_keyword(keyword)?;
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            schedule: ScheduleSettings {
                analysis_interval: self.analysis_interval,
                uptime_tick: self.uptime_tick,
                initial_delay: self.initial_delay,
            },
            analyzer: AnalyzerSettings {
                confidence_threshold: self.confidence_threshold,
                raw_detection_limit: self.raw_detection_limit,
                prohibited_keywords: self.prohibited_keywords.clone(),
            },
            head_pose: HeadPoseThresholds {
                horizontal: self.horizontal_threshold,
                vertical: self.vertical_threshold,
            },
            classifier: ClassifierSettings {
                cycle_interval_secs: self.analysis_interval.as_secs(),
                looking_away_threshold_secs: self.looking_away_threshold_secs,
                debounce_policy: self.debounce_policy,
            },
            log_capacity: self.log_capacity,
        }
    }
}

pub fn validate_keyword(keyword: &str) -> Result<()> {
    static KEYWORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = KEYWORD_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9 _-]{0,31}$").expect("keyword pattern is valid")
    });
    if !re.is_match(keyword) {
        return Err(anyhow!(
            "invalid prohibited keyword '{}' (expected 1-32 chars of a-z, 0-9, space, '_' or '-')",
            keyword
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<ProctorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_pipeline() {
        let cfg = ProctorConfig::default();
        assert_eq!(cfg.camera.url, "stub://webcam");
        assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
        assert_eq!(cfg.analysis_interval, Duration::from_secs(3));
        assert_eq!(cfg.initial_delay, Duration::from_millis(1000));
        assert_eq!(cfg.confidence_threshold, 0.4);
        assert_eq!(cfg.prohibited_keywords.len(), 11);
        assert_eq!(cfg.log_capacity, 20);
        assert_eq!(cfg.debounce_policy, DebouncePolicy::Continuous);

        let settings = cfg.session_settings();
        assert_eq!(settings, SessionSettings::default());
    }

    #[test]
    fn keyword_validation() {
        assert!(validate_keyword("cell phone").is_ok());
        assert!(validate_keyword("smart-watch").is_ok());
        assert!(validate_keyword("").is_err());
        assert!(validate_keyword(" phone").is_err());
        assert!(validate_keyword("Phone").is_err());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = ProctorConfig {
            confidence_threshold: 0.0,
            ..ProctorConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = ProctorConfig {
            log_capacity: 0,
            ..ProctorConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = ProctorConfig {
            vertical_threshold: f32::NAN,
            ..ProctorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_normalises_keywords() {
        let mut cfg = ProctorConfig {
            prohibited_keywords: vec!["  Smart Watch ".to_string()],
            ..ProctorConfig::default()
        };
        cfg.validate().unwrap();
        assert_eq!(cfg.prohibited_keywords, vec!["smart watch"]);
    }

    #[test]
    fn classifier_interval_follows_analysis_interval() {
        let cfg = ProctorConfig {
            analysis_interval: Duration::from_secs(5),
            ..ProctorConfig::default()
        };
        let settings = cfg.session_settings();
        assert_eq!(settings.classifier.cycle_interval_secs, 5);
        assert_eq!(settings.schedule.analysis_interval, Duration::from_secs(5));
    }
}
