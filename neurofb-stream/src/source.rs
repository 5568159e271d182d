// Named numeric stream with non-blocking pull access

use neurofb_core::Sample;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::{Inlet, Transport};
use crate::types::{
    ChannelFormat, SampleData, StreamError, StreamIdentity, StreamInfo, StreamResult,
    TransportError,
};

/// Default time to wait for a stream to show up during resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SampleSource {
    identity: StreamIdentity,
    transport: Arc<dyn Transport>,
    inlet: Option<Box<dyn Inlet>>,
}

impl SampleSource {
    pub fn new(identity: StreamIdentity, transport: Arc<dyn Transport>) -> Self {
        Self {
            identity,
            transport,
            inlet: None,
        }
    }

    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn is_resolved(&self) -> bool {
        self.inlet.is_some()
    }

    /// Width of every sample, fixed once the stream is resolved.
    pub fn channel_count(&self) -> Option<usize> {
        self.inlet.as_ref().map(|i| i.info().channel_count)
    }

    /// Resolves the stream and opens an inlet on it.
    ///
    /// Calling this again on a resolved source returns the existing stream
    /// info without touching the transport.
    pub fn resolve(&mut self, timeout: Duration) -> StreamResult<&StreamInfo> {
        let inlet: &Box<dyn Inlet> = match self.inlet {
            Some(ref inlet) => {
                log::debug!("Stream '{}' is already resolved", self.identity.name);
                inlet
            }
            None => {
                let opened = self.open(timeout)?;
                &*self.inlet.insert(opened)
            }
        };
        Ok(inlet.info())
    }

    fn open(&self, timeout: Duration) -> StreamResult<Box<dyn Inlet>> {
        let name = &self.identity.name;
        if name.is_empty() {
            return Err(StreamError::MissingName);
        }

        log::info!("Resolving stream '{}' (timeout {:?})", name, timeout);

        let candidates = match self.transport.resolve(name, timeout) {
            Ok(found) => found,
            Err(TransportError::Timeout) => {
                return Err(StreamError::ResolutionTimeout {
                    name: name.clone(),
                    timeout,
                });
            }
            Err(source) => {
                return Err(StreamError::Transport {
                    name: name.clone(),
                    source,
                });
            }
        };

        let mut candidates: Vec<StreamInfo> = match &self.identity.source_id {
            Some(id) => candidates
                .into_iter()
                .filter(|info| &info.source_id == id)
                .collect(),
            None => candidates,
        };

        if candidates.is_empty() {
            return Err(StreamError::ResolutionNotFound { name: name.clone() });
        }
        if candidates.len() > 1 {
            log::warn!(
                "Multiple streams named '{}' found ({}), using first match",
                name,
                candidates.len()
            );
        }

        let info = candidates.swap_remove(0);
        if info.channel_format != ChannelFormat::Float32 {
            return Err(StreamError::UnexpectedFormat {
                name: name.clone(),
                found: info.channel_format,
            });
        }

        let inlet = self
            .transport
            .open_inlet(&info)
            .map_err(|source| StreamError::Transport {
                name: name.clone(),
                source,
            })?;

        log::info!(
            "Resolved stream '{}': type='{}', channels={}, rate={} Hz",
            info.name,
            info.stream_type,
            info.channel_count,
            info.nominal_srate
        );
        Ok(inlet)
    }

    /// Pulls the oldest sample that arrived since the previous call.
    ///
    /// Never blocks. Callers drain a tick's backlog by looping until `None`.
    pub fn pull_latest(&mut self) -> StreamResult<Option<Sample>> {
        let name = &self.identity.name;
        let inlet = self
            .inlet
            .as_mut()
            .ok_or_else(|| StreamError::PullBeforeResolve { name: name.clone() })?;
        let expected = inlet.info().channel_count;

        let raw = match inlet.try_pull() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(TransportError::Lost) => {
                return Err(StreamError::Disconnected { name: name.clone() });
            }
            Err(source) => {
                return Err(StreamError::Transport {
                    name: name.clone(),
                    source,
                });
            }
        };

        match raw.data {
            SampleData::Float32(values) if values.len() == expected => {
                Ok(Some(Sample::new(values, raw.timestamp)))
            }
            SampleData::Float32(values) => Err(StreamError::ChannelMismatch {
                name: name.clone(),
                expected,
                got: values.len(),
            }),
            SampleData::Text(_) => Err(StreamError::UnexpectedFormat {
                name: name.clone(),
                found: ChannelFormat::String,
            }),
        }
    }

    /// Drops the inlet; the next `resolve` looks the stream up again.
    pub fn close(&mut self) {
        if self.inlet.take().is_some() {
            log::info!("Closed stream '{}'", self.identity.name);
        }
    }
}
