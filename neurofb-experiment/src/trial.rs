use neurofb_core::Condition;
use std::time::Duration;

/// One scheduled trial and the moments its phases began.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial<T> {
    pub id: usize,
    pub condition: Condition,
    pub durations: TrialDurations,
    pub timestamps: TrialTimestamps<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialDurations {
    /// Randomized break drawn for this trial.
    pub pause: Duration,
    pub reference: Duration,
    pub cue: Duration,
    pub feedback: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialTimestamps<T> {
    pub break_start: T,
    pub reference_start: Option<T>,
    pub cue_start: Option<T>,
    pub feedback_start: Option<T>,
    pub end: Option<T>,
}

impl<T> TrialTimestamps<T> {
    pub fn new(break_start: T) -> Self {
        Self {
            break_start,
            reference_start: None,
            cue_start: None,
            feedback_start: None,
            end: None,
        }
    }
}
