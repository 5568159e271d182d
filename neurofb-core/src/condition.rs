use serde::{Deserialize, Serialize};
use std::fmt;

/// Experimental class assigned to a trial.
///
/// The numeric code is what travels on the wire (classifier predictions,
/// cue payloads); the label is the short suffix used in trial scripts and
/// marker strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    LeftHand,
    RightHand,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::LeftHand, Condition::RightHand];

    pub fn code(self) -> u32 {
        match self {
            Condition::LeftHand => 0,
            Condition::RightHand => 1,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Condition::LeftHand),
            1 => Some(Condition::RightHand),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Condition::LeftHand => "l",
            Condition::RightHand => "r",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "l" => Some(Condition::LeftHand),
            "r" => Some(Condition::RightHand),
            _ => None,
        }
    }

    /// Parses a script token such as `MI_l` or `cond_r`.
    ///
    /// Only the part after the last underscore is significant, so a bare
    /// label (`l`) is accepted as well.
    pub fn from_token(token: &str) -> Option<Self> {
        let suffix = token.trim().rsplit('_').next()?;
        Self::from_label(suffix)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
