use crate::Condition;

/// Fixed set of bus topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    SessionStarted,
    SessionFinished,
    TrialStarted,
    Reference,
    Cue,
    Feedback,
    TrialEnd,
    Reset,
    GlowUpdate,
    ValueUpdate,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::SessionStarted,
        Topic::SessionFinished,
        Topic::TrialStarted,
        Topic::Reference,
        Topic::Cue,
        Topic::Feedback,
        Topic::TrialEnd,
        Topic::Reset,
        Topic::GlowUpdate,
        Topic::ValueUpdate,
    ];

    /// Dense index, used for table lookup.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A published event; the payload shape is fixed by its topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionStarted,
    SessionFinished,
    /// Carries the condition label (`"l"`, `"r"`).
    TrialStarted(&'static str),
    Reference,
    Cue(Condition),
    Feedback(Condition),
    TrialEnd,
    Reset,
    GlowUpdate { intensity: f32, correct: bool },
    ValueUpdate(Vec<f32>),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SessionStarted => Topic::SessionStarted,
            Event::SessionFinished => Topic::SessionFinished,
            Event::TrialStarted(_) => Topic::TrialStarted,
            Event::Reference => Topic::Reference,
            Event::Cue(_) => Topic::Cue,
            Event::Feedback(_) => Topic::Feedback,
            Event::TrialEnd => Topic::TrialEnd,
            Event::Reset => Topic::Reset,
            Event::GlowUpdate { .. } => Topic::GlowUpdate,
            Event::ValueUpdate(_) => Topic::ValueUpdate,
        }
    }

    pub fn trial_started(condition: Condition) -> Self {
        Event::TrialStarted(condition.label())
    }
}
