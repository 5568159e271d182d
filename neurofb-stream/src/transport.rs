// Opaque stream discovery and transfer capability.
//
// The session only needs four things from the real-time network: find
// streams by name, open an inlet on one, open an outlet for markers, and read
// the transport clock. Any binding (a Lab Streaming Layer wrapper, a test
// double, the in-process `LocalNetwork`) plugs in behind this trait.

use std::time::Duration;

use crate::types::{RawSample, SampleData, StreamInfo, TransportError};

pub trait Transport: Send + Sync {
    /// Looks up streams advertising `name`.
    ///
    /// A zero `timeout` takes a single snapshot and may return an empty list.
    /// A non-zero timeout waits for at least one match and reports
    /// `TransportError::Timeout` when none shows up in time.
    fn resolve(&self, name: &str, timeout: Duration) -> Result<Vec<StreamInfo>, TransportError>;

    fn open_inlet(&self, info: &StreamInfo) -> Result<Box<dyn Inlet>, TransportError>;

    fn open_outlet(&self, info: StreamInfo) -> Result<Box<dyn Outlet>, TransportError>;

    /// High-resolution transport clock in seconds.
    fn local_clock(&self) -> f64;
}

pub trait Inlet: Send {
    fn info(&self) -> &StreamInfo;

    /// Non-blocking pull of the oldest pending sample.
    fn try_pull(&mut self) -> Result<Option<RawSample>, TransportError>;
}

pub trait Outlet: Send + Sync {
    fn info(&self) -> &StreamInfo;

    fn push(&self, data: SampleData, timestamp: f64) -> Result<(), TransportError>;
}
