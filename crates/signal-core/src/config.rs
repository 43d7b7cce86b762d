use crate::error::{Result, SignalError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "signal.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig (seconds, as written in YAML)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Full phase duration.
    #[serde(default = "default_cycle_time")]
    pub cycle_time: f64,
    /// Trailing part of the phase during which the oracle is polled.
    #[serde(default = "default_check_window")]
    pub check_window: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay: f64,
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout: f64,
    /// Upper bound on a single actuator command.
    #[serde(default = "default_actuator_timeout")]
    pub actuator_timeout: f64,
    /// Extra attempts after a failed actuator command.
    #[serde(default = "default_actuator_retries")]
    pub actuator_retries: u32,
}

fn default_cycle_time() -> f64 {
    60.0
}

fn default_check_window() -> f64 {
    30.0
}

fn default_poll_interval() -> f64 {
    1.0
}

fn default_settle_delay() -> f64 {
    5.0
}

fn default_oracle_timeout() -> f64 {
    10.0
}

fn default_actuator_timeout() -> f64 {
    2.0
}

fn default_actuator_retries() -> u32 {
    2
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycle_time: default_cycle_time(),
            check_window: default_check_window(),
            poll_interval: default_poll_interval(),
            settle_delay: default_settle_delay(),
            oracle_timeout: default_oracle_timeout(),
            actuator_timeout: default_actuator_timeout(),
            actuator_retries: default_actuator_retries(),
        }
    }
}

impl TimingConfig {
    /// Convert to [`Timing`], rejecting values the controller cannot run with.
    pub fn resolve(&self) -> Result<Timing> {
        let timing = Timing {
            cycle_time: secs("cycle_time", self.cycle_time)?,
            check_window: secs("check_window", self.check_window)?,
            poll_interval: secs("poll_interval", self.poll_interval)?,
            settle_delay: secs("settle_delay", self.settle_delay)?,
            oracle_timeout: secs("oracle_timeout", self.oracle_timeout)?,
            actuator_timeout: secs("actuator_timeout", self.actuator_timeout)?,
            actuator_retries: self.actuator_retries,
        };
        timing.check()?;
        Ok(timing)
    }
}

/// Upper bound for every configured duration. Deadlines are computed as
/// `Instant + Duration`, which must not overflow.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

fn secs(name: &str, value: f64) -> Result<Duration> {
    let d = Duration::try_from_secs_f64(value).map_err(|_| {
        SignalError::InvalidConfig(format!(
            "{name} must be a finite, non-negative number of seconds (got {value})"
        ))
    })?;
    if d > MAX_DURATION {
        return Err(SignalError::InvalidConfig(format!(
            "{name} must be at most {}s (got {value})",
            MAX_DURATION.as_secs()
        )));
    }
    Ok(d)
}

// ---------------------------------------------------------------------------
// Timing (resolved)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub cycle_time: Duration,
    pub check_window: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub oracle_timeout: Duration,
    pub actuator_timeout: Duration,
    pub actuator_retries: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            cycle_time: Duration::from_secs(60),
            check_window: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(5),
            oracle_timeout: Duration::from_secs(10),
            actuator_timeout: Duration::from_secs(2),
            actuator_retries: 2,
        }
    }
}

impl Timing {
    pub fn check(&self) -> Result<()> {
        for (name, d) in [
            ("cycle_time", self.cycle_time),
            ("check_window", self.check_window),
            ("poll_interval", self.poll_interval),
            ("settle_delay", self.settle_delay),
            ("oracle_timeout", self.oracle_timeout),
            ("actuator_timeout", self.actuator_timeout),
        ] {
            if d > MAX_DURATION {
                return Err(SignalError::InvalidConfig(format!(
                    "{name} must be at most {}s (got {d:?})",
                    MAX_DURATION.as_secs()
                )));
            }
        }
        if self.cycle_time.is_zero() {
            return Err(SignalError::InvalidConfig(
                "cycle_time must be greater than zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(SignalError::InvalidConfig(
                "poll_interval must be greater than zero".into(),
            ));
        }
        if self.oracle_timeout.is_zero() {
            return Err(SignalError::InvalidConfig(
                "oracle_timeout must be greater than zero".into(),
            ));
        }
        if self.actuator_timeout.is_zero() {
            return Err(SignalError::InvalidConfig(
                "actuator_timeout must be greater than zero".into(),
            ));
        }
        if self.check_window > self.cycle_time {
            return Err(SignalError::InvalidConfig(format!(
                "check_window ({:?}) must not exceed cycle_time ({:?})",
                self.check_window, self.cycle_time
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// An external program plus its argument template. `{image}` and `{lane}`
/// placeholders are substituted at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// DetectorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_capture")]
    pub capture: CommandSpec,
    #[serde(default = "default_detect")]
    pub detect: CommandSpec,
    #[serde(default = "default_image_path")]
    pub image_path: String,
    /// Detection labels that count as a waiting vehicle.
    #[serde(default = "default_vehicle_labels")]
    pub vehicle_labels: Vec<String>,
    /// Minimum detector confidence, in percent.
    #[serde(default)]
    pub min_confidence: u8,
    /// Pause between capture and detection, in seconds.
    #[serde(default)]
    pub capture_settle: f64,
}

fn default_capture() -> CommandSpec {
    CommandSpec::new(
        "fswebcam",
        &["-r", "640x480", "--jpeg", "85", "--no-banner", "{image}"],
    )
}

fn default_detect() -> CommandSpec {
    CommandSpec::new(
        "./darknet",
        &[
            "detect",
            "cfg/yolov3-tiny.cfg",
            "yolov3-tiny.weights",
            "{image}",
        ],
    )
}

fn default_image_path() -> String {
    "lane_pic.jpg".to_string()
}

fn default_vehicle_labels() -> Vec<String> {
    vec!["car".to_string()]
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            capture: default_capture(),
            detect: default_detect(),
            image_path: default_image_path(),
            vehicle_labels: default_vehicle_labels(),
            min_confidence: 0,
            capture_settle: 0.0,
        }
    }
}

impl DetectorConfig {
    pub fn capture_settle(&self) -> Result<Duration> {
        secs("detector.capture_settle", self.capture_settle)
    }
}

// ---------------------------------------------------------------------------
// ActuatorConfig
// ---------------------------------------------------------------------------

/// Hardware driver invoked as `<program> <args..> signal <lane> <go|stop>`
/// and `<program> <args..> orient <lane>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActuatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<CommandSpec>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub actuator: ActuatorConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            timing: TimingConfig::default(),
            detector: DetectorConfig::default(),
            actuator: ActuatorConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SignalError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` when given, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Config::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let t = &self.timing;

        // 1. Every duration must convert; resolve() reports the first bad one
        //    so check them individually here.
        for (name, value) in [
            ("cycle_time", t.cycle_time),
            ("check_window", t.check_window),
            ("poll_interval", t.poll_interval),
            ("settle_delay", t.settle_delay),
            ("oracle_timeout", t.oracle_timeout),
            ("actuator_timeout", t.actuator_timeout),
            ("detector.capture_settle", self.detector.capture_settle),
        ] {
            if let Err(e) = secs(name, value) {
                warnings.push(ConfigWarning::error(e.to_string()));
            }
        }

        // 2. Relationships between durations
        if let Err(SignalError::InvalidConfig(msg)) = t.resolve() {
            if !warnings.iter().any(|w| w.message.contains(&msg)) {
                warnings.push(ConfigWarning::error(msg));
            }
        }

        if t.check_window == 0.0 {
            warnings.push(ConfigWarning::warning(
                "check_window is 0: the oracle is never polled and early exit is disabled",
            ));
        }

        if t.poll_interval > t.check_window && t.check_window > 0.0 {
            warnings.push(ConfigWarning::warning(format!(
                "poll_interval ({}s) is longer than check_window ({}s): at most one poll per phase",
                t.poll_interval, t.check_window
            )));
        }

        if t.oracle_timeout > t.check_window && t.check_window > 0.0 {
            warnings.push(ConfigWarning::warning(format!(
                "oracle_timeout ({}s) exceeds check_window ({}s): slow detections will be cut at phase end",
                t.oracle_timeout, t.check_window
            )));
        }

        // 3. Detector
        if self.detector.vehicle_labels.iter().all(|l| l.trim().is_empty()) {
            warnings.push(ConfigWarning::warning(
                "detector.vehicle_labels is empty: every lane will read as empty",
            ));
        }

        if self.detector.min_confidence > 100 {
            warnings.push(ConfigWarning::error(format!(
                "detector.min_confidence is {}, must be 0-100",
                self.detector.min_confidence
            )));
        }

        // 4. External programs
        let mut programs = vec![
            ("detector.capture", &self.detector.capture),
            ("detector.detect", &self.detector.detect),
        ];
        if let Some(driver) = &self.actuator.driver {
            programs.push(("actuator.driver", driver));
        }
        for (key, spec) in programs {
            if spec.program.trim().is_empty() {
                warnings.push(ConfigWarning::error(format!("{key} has an empty program")));
            } else if !program_exists(&spec.program) {
                warnings.push(ConfigWarning::warning(format!(
                    "{key} program '{}' not found",
                    spec.program
                )));
            }
        }

        warnings
    }
}

fn program_exists(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        Path::new(program).exists()
    } else {
        which::which(program).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
