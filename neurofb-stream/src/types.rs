// Common types for stream resolution, ingestion and marker output

use std::time::Duration;
use thiserror::Error;

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Nominal rate advertised by event streams without a fixed sampling rate.
pub const IRREGULAR_RATE: f64 = 0.0;

/// Name (and optional source id) of a stream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentity {
    pub name: String,
    pub source_id: Option<String>,
}

impl StreamIdentity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_id: None,
        }
    }

    pub fn with_source_id(name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_id: Some(source_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFormat {
    Float32,
    String,
}

/// Metadata a stream advertises on the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub name: String,
    pub stream_type: String,
    pub channel_count: usize,
    pub nominal_srate: f64,
    pub channel_format: ChannelFormat,
    pub source_id: String,
}

impl StreamInfo {
    pub fn numeric(name: impl Into<String>, channel_count: usize, nominal_srate: f64) -> Self {
        Self {
            name: name.into(),
            stream_type: "Feedback".to_string(),
            channel_count,
            nominal_srate,
            channel_format: ChannelFormat::Float32,
            source_id: String::new(),
        }
    }

    pub fn marker(identity: &StreamIdentity) -> Self {
        Self {
            name: identity.name.clone(),
            stream_type: "Marker".to_string(),
            channel_count: 1,
            nominal_srate: IRREGULAR_RATE,
            channel_format: ChannelFormat::String,
            source_id: identity.source_id.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    Float32(Vec<f32>),
    Text(Vec<String>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::Float32(v) => v.len(),
            SampleData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> ChannelFormat {
        match self {
            SampleData::Float32(_) => ChannelFormat::Float32,
            SampleData::Text(_) => ChannelFormat::String,
        }
    }
}

/// A sample as it travels on the transport, before typing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub data: SampleData,
    pub timestamp: f64,
}

/// Failures reported by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("resolution timed out")]
    Timeout,

    #[error("stream lost")]
    Lost,

    #[error("rejected: {0}")]
    Rejected(String),
}

/// Errors that can occur while resolving, pulling or writing streams
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("no stream name was provided")]
    MissingName,

    #[error("timed out after {timeout:?} resolving stream '{name}'")]
    ResolutionTimeout { name: String, timeout: Duration },

    #[error("stream '{name}' could not be resolved")]
    ResolutionNotFound { name: String },

    #[error("stream '{name}' was pulled before it was resolved")]
    PullBeforeResolve { name: String },

    #[error("stream '{name}' disconnected")]
    Disconnected { name: String },

    #[error("stream '{name}' carries {found:?} samples, expected numeric")]
    UnexpectedFormat { name: String, found: ChannelFormat },

    #[error("stream '{name}' delivered {got} channels, expected {expected}")]
    ChannelMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("transport error on stream '{name}': {source}")]
    Transport {
        name: String,
        #[source]
        source: TransportError,
    },
}

impl StreamError {
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            StreamError::MissingName
                | StreamError::ResolutionTimeout { .. }
                | StreamError::ResolutionNotFound { .. }
        )
    }
}
