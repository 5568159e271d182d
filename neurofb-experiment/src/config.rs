use neurofb_stream::{DEFAULT_RESOLVE_TIMEOUT, StreamIdentity};
use rand::Rng;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Rejected configuration, trial script or timing.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid timing: {0}")]
    InvalidTiming(String),

    #[error("no stream name configured for {0}")]
    MissingStream(&'static str),

    #[error("invalid feedback settings: {0}")]
    InvalidFeedback(String),

    #[error("trial script is empty")]
    EmptyScript,

    #[error("line {line}: unknown condition token '{token}'")]
    UnknownCondition { line: usize, token: String },
}

/// Phase durations of one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub reference: Duration,
    pub cue: Duration,
    pub feedback: Duration,
    /// Inclusive bounds of the randomized inter-trial break.
    pub break_range: (Duration, Duration),
}

impl TimingConfig {
    /// Builds the timing from seconds, as they appear in the configuration.
    pub fn from_secs(
        reference: f64,
        cue: f64,
        feedback: f64,
        break_range: (f64, f64),
    ) -> Result<Self, ConfigError> {
        let timing = Self {
            reference: secs("duration-ref", reference)?,
            cue: secs("duration-cue", cue)?,
            feedback: secs("duration-task", feedback)?,
            break_range: (
                secs("duration-break[0]", break_range.0)?,
                secs("duration-break[1]", break_range.1)?,
            ),
        };
        if timing.break_range.0 > timing.break_range.1 {
            return Err(ConfigError::InvalidTiming(format!(
                "break minimum {:?} exceeds maximum {:?}",
                timing.break_range.0, timing.break_range.1
            )));
        }
        Ok(timing)
    }

    /// Draws an inter-trial break uniformly from the closed break range.
    pub fn sample_break<R: Rng>(&self, rng: &mut R) -> Duration {
        let (min, max) = self.break_range;
        if min == max {
            return min;
        }
        let ns = rng.random_range(min.as_nanos() as u64..=max.as_nanos() as u64);
        Duration::from_nanos(ns)
    }
}

fn secs(field: &str, value: f64) -> Result<Duration, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidTiming(format!(
            "{field} must be a finite, non-negative number of seconds (got {value})"
        )));
    }
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| d.as_nanos() <= u128::from(u64::MAX))
        .ok_or_else(|| ConfigError::InvalidTiming(format!("{field} is too large (got {value})")))
}

/// Streams the session writes to or reads from.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    pub marker: StreamIdentity,
    /// Classifier output: `[predicted condition, magnitude]`.
    pub classifier: StreamIdentity,
    /// Derived per-region values.
    pub values: StreamIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSettings {
    pub show_feedback: bool,
    /// Forward one value-update out of this many samples.
    pub value_decimation: NonZeroU32,
    pub resolve_timeout: Duration,
    pub tick_interval: Duration,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            show_feedback: true,
            value_decimation: NonZeroU32::MIN,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            tick_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub timing: TimingConfig,
    pub streams: StreamSettings,
    pub feedback: FeedbackSettings,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig {
                reference: Duration::from_secs(3),
                cue: Duration::from_millis(1250),
                feedback: Duration::from_secs(4),
                break_range: (Duration::from_millis(1500), Duration::from_millis(3000)),
            },
            streams: StreamSettings {
                marker: StreamIdentity::with_source_id("VRFeedbackMarkers", "vrfb-markers"),
                classifier: StreamIdentity::named("fb-lda"),
                values: StreamIdentity::named("fb-erds"),
            },
            feedback: FeedbackSettings::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        raw.general.try_into()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

// On-disk layout

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "general-settings")]
    general: RawGeneral,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawGeneral {
    timing: RawTiming,
    lsl_streams: RawStreams,
    #[serde(default)]
    feedback: RawFeedback,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawTiming {
    duration_ref: f64,
    duration_cue: f64,
    duration_task: f64,
    duration_break: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawStreams {
    marker: RawStream,
    fb_lda: RawStream,
    fb_erds: RawStream,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    #[serde(default)]
    name: String,
    #[serde(default)]
    id: Option<String>,
}

impl RawStream {
    fn into_identity(self, what: &'static str) -> Result<StreamIdentity, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingStream(what));
        }
        Ok(StreamIdentity {
            name: self.name,
            source_id: self.id.filter(|id| !id.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct RawFeedback {
    show_feedback: bool,
    value_decimation: u32,
    resolve_timeout: f64,
    tick_interval: f64,
}

impl Default for RawFeedback {
    fn default() -> Self {
        let defaults = FeedbackSettings::default();
        Self {
            show_feedback: defaults.show_feedback,
            value_decimation: defaults.value_decimation.get(),
            resolve_timeout: defaults.resolve_timeout.as_secs_f64(),
            tick_interval: defaults.tick_interval.as_secs_f64(),
        }
    }
}

impl TryFrom<RawGeneral> for ExperimentConfig {
    type Error = ConfigError;

    fn try_from(raw: RawGeneral) -> Result<Self, Self::Error> {
        let t = raw.timing;
        let timing = TimingConfig::from_secs(
            t.duration_ref,
            t.duration_cue,
            t.duration_task,
            (t.duration_break[0], t.duration_break[1]),
        )?;

        let streams = StreamSettings {
            marker: raw.lsl_streams.marker.into_identity("marker")?,
            classifier: raw.lsl_streams.fb_lda.into_identity("fb-lda")?,
            values: raw.lsl_streams.fb_erds.into_identity("fb-erds")?,
        };

        let f = raw.feedback;
        let value_decimation = NonZeroU32::new(f.value_decimation).ok_or_else(|| {
            ConfigError::InvalidFeedback("value-decimation must be at least 1".into())
        })?;
        if !f.resolve_timeout.is_finite() || f.resolve_timeout < 0.0 {
            return Err(ConfigError::InvalidFeedback(format!(
                "resolve-timeout must be non-negative (got {})",
                f.resolve_timeout
            )));
        }
        if !f.tick_interval.is_finite() || f.tick_interval <= 0.0 {
            return Err(ConfigError::InvalidFeedback(format!(
                "tick-interval must be positive (got {})",
                f.tick_interval
            )));
        }
        let resolve_timeout = feedback_secs("resolve-timeout", f.resolve_timeout)?;
        let tick_interval = feedback_secs("tick-interval", f.tick_interval)?;

        Ok(Self {
            timing,
            streams,
            feedback: FeedbackSettings {
                show_feedback: f.show_feedback,
                value_decimation,
                resolve_timeout,
                tick_interval,
            },
        })
    }
}

fn feedback_secs(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigError::InvalidFeedback(format!("{field} is too large (got {value})")))
}
