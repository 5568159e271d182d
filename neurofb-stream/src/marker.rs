// Outbound marker stream
//
// Markers are single strings stamped with the transport clock. A sink that
// failed to open stays usable: every write becomes a no-op, so trial timing
// never depends on the logging stream being healthy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::transport::{Outlet, Transport};
use crate::types::{SampleData, StreamError, StreamIdentity, StreamInfo, StreamResult};

pub struct MarkerSink {
    identity: StreamIdentity,
    transport: Arc<dyn Transport>,
    outlet: Option<Box<dyn Outlet>>,
    write_failed: AtomicBool,
}

impl MarkerSink {
    /// Opens the marker outlet, reporting why it could not be created.
    pub fn try_open(transport: Arc<dyn Transport>, identity: StreamIdentity) -> StreamResult<Self> {
        if identity.name.is_empty() {
            return Err(StreamError::MissingName);
        }
        let outlet = transport
            .open_outlet(StreamInfo::marker(&identity))
            .map_err(|source| StreamError::Transport {
                name: identity.name.clone(),
                source,
            })?;
        log::info!(
            "Marker stream '{}' open (source id '{}')",
            identity.name,
            identity.source_id.as_deref().unwrap_or("")
        );
        Ok(Self {
            identity,
            transport,
            outlet: Some(outlet),
            write_failed: AtomicBool::new(false),
        })
    }

    /// Opens the marker outlet; on failure logs the error and returns an
    /// inactive sink.
    pub fn open(transport: Arc<dyn Transport>, identity: StreamIdentity) -> Self {
        match Self::try_open(Arc::clone(&transport), identity.clone()) {
            Ok(sink) => sink,
            Err(e) => {
                log::error!("Marker stream unavailable: {}", e);
                Self::disabled(transport, identity)
            }
        }
    }

    pub fn disabled(transport: Arc<dyn Transport>, identity: StreamIdentity) -> Self {
        Self {
            identity,
            transport,
            outlet: None,
            write_failed: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.outlet.is_some()
    }

    pub fn identity(&self) -> &StreamIdentity {
        &self.identity
    }

    /// Pushes `marker` stamped with the current transport clock.
    pub fn write(&self, marker: &str) {
        let Some(outlet) = &self.outlet else {
            return;
        };
        let timestamp = self.transport.local_clock();
        match outlet.push(SampleData::Text(vec![marker.to_string()]), timestamp) {
            Ok(()) => log::info!("marker {} @ {:.6}", marker, timestamp),
            Err(e) => {
                // Report the first failure only; a broken outlet would flood the log.
                if !self.write_failed.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "Dropping markers on '{}' after write failure: {}",
                        self.identity.name,
                        e
                    );
                }
            }
        }
    }
}
