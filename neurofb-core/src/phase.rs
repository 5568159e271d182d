/// Timed segments of a single trial, in the order they run.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum TrialPhase {
    #[default]
    Break,
    Reference,
    Cue,
    Feedback,
}

impl TrialPhase {
    pub fn next(&self) -> Option<Self> {
        use TrialPhase::*;
        Some(match self {
            Break => Reference,
            Reference => Cue,
            Cue => Feedback,
            Feedback => return None,
        })
    }

    /// Whether the participant is receiving closed-loop feedback.
    pub fn is_feedback(&self) -> bool {
        matches!(self, TrialPhase::Feedback)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrialPhase::Break => "break",
            TrialPhase::Reference => "reference",
            TrialPhase::Cue => "cue",
            TrialPhase::Feedback => "feedback",
        }
    }
}
