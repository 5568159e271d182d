use serde::{Deserialize, Serialize};

use crate::Condition;

/// Coarse run status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Finished,
}

/// Per-run trial bookkeeping owned by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialState {
    pub trial_index: usize,
    pub condition: Condition,
    pub status: RunStatus,
}

impl TrialState {
    pub fn new(first: Condition) -> Self {
        Self {
            trial_index: 0,
            condition: first,
            status: RunStatus::Idle,
        }
    }
}

/// Recorded feedback outcome per trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub trial_id: usize,
    pub condition: Condition,
    pub feedback_samples: u64,
    pub correct_samples: u64,
    pub mean_intensity: Option<f32>,
}

impl TrialSummary {
    pub fn new(trial_id: usize, condition: Condition) -> Self {
        Self {
            trial_id,
            condition,
            feedback_samples: 0,
            correct_samples: 0,
            mean_intensity: None,
        }
    }

    /// Fraction of feedback samples the classifier got right.
    pub fn accuracy(&self) -> Option<f64> {
        if self.feedback_samples == 0 {
            None
        } else {
            Some(self.correct_samples as f64 / self.feedback_samples as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_undefined_without_samples() {
        let mut summary = TrialSummary::new(0, Condition::LeftHand);
        assert_eq!(summary.accuracy(), None);

        summary.feedback_samples = 4;
        summary.correct_samples = 3;
        assert_eq!(summary.accuracy(), Some(0.75));
    }

    #[test]
    fn summary_serializes_with_condition_name() {
        let summary = TrialSummary::new(2, Condition::RightHand);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["condition"], "right-hand");
        assert_eq!(json["trial_id"], 2);
    }
}
