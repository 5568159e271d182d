pub mod condition;
pub mod event;
pub mod phase;
pub mod sample;
pub mod trial;

pub use condition::Condition;
pub use event::{Event, Topic};
pub use phase::TrialPhase;
pub use sample::Sample;
pub use trial::{RunStatus, TrialState, TrialSummary};
