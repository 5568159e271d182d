pub mod local;
pub mod marker;
pub mod source;
pub mod transport;
pub mod types;

pub use local::LocalNetwork;
pub use marker::MarkerSink;
pub use source::{DEFAULT_RESOLVE_TIMEOUT, SampleSource};
pub use transport::{Inlet, Outlet, Transport};
pub use types::{
    ChannelFormat, IRREGULAR_RATE, RawSample, SampleData, StreamError, StreamIdentity, StreamInfo,
    StreamResult, TransportError,
};
