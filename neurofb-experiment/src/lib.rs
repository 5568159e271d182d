pub mod bus;
pub mod config;
pub mod markers;
pub mod report;
pub mod router;
pub mod script;
pub mod session;
pub mod shared;
pub mod state;
pub mod trial;

pub use bus::{EventBus, EventBusBuilder, HandlerError, PublishError};
pub use config::{ConfigError, ExperimentConfig, FeedbackSettings, StreamSettings, TimingConfig};
pub use markers::{marker_for, subscribe_markers};
pub use report::{FeedbackTally, SessionReport};
pub use router::{ChannelPolicy, FeedbackRouter, IngestionChannel, SampleRouter, ValueRouter};
pub use script::{TrialScript, generate_sequence};
pub use session::{ControlCommand, Session, SessionError, SessionOutcome};
pub use shared::{ConditionReader, CurrentCondition};
pub use state::{ExperimentEvent, OrchestratorState, TrialOrchestrator};
pub use trial::{Trial, TrialDurations, TrialTimestamps};
