use neurofb_core::Condition;
use rand::Rng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Ordered, non-empty list of trial conditions for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialScript {
    trials: Vec<Condition>,
}

impl TrialScript {
    pub fn new(trials: Vec<Condition>) -> Result<Self, ConfigError> {
        if trials.is_empty() {
            return Err(ConfigError::EmptyScript);
        }
        Ok(Self { trials })
    }

    /// Parses one condition token per line; blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let trials = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                Condition::from_token(line).ok_or_else(|| ConfigError::UnknownCondition {
                    line: i + 1,
                    token: line.trim().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(trials)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// `<dir>/<prefix>_run_<run>.txt`
    pub fn run_path(dir: impl AsRef<Path>, prefix: &str, run: u32) -> PathBuf {
        dir.as_ref().join(format!("{prefix}_run_{run}.txt"))
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Condition> {
        self.trials.get(index).copied()
    }

    pub fn first(&self) -> Condition {
        self.trials[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = Condition> + '_ {
        self.trials.iter().copied()
    }

    pub fn count(&self, condition: Condition) -> usize {
        self.iter().filter(|c| *c == condition).count()
    }
}

/// Builds a shuffled token sequence with `trials` repetitions of every task.
pub fn generate_sequence<R: Rng>(tasks: &[String], trials: usize, rng: &mut R) -> Vec<String> {
    let mut sequence: Vec<String> = (0..trials)
        .flat_map(|_| tasks.iter().cloned())
        .collect();
    sequence.shuffle(rng);
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parses_tokens_in_order_and_skips_blank_lines() {
        let script = TrialScript::parse("MI_l\nMI_r\n\nMI_r\n").unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(
            script.iter().collect::<Vec<_>>(),
            vec![
                Condition::LeftHand,
                Condition::RightHand,
                Condition::RightHand
            ]
        );
        assert_eq!(script.first(), Condition::LeftHand);
        assert_eq!(script.get(3), None);
    }

    #[test]
    fn empty_script_is_a_configuration_error() {
        assert!(matches!(
            TrialScript::parse("\n  \n"),
            Err(ConfigError::EmptyScript)
        ));
        assert!(matches!(
            TrialScript::new(Vec::new()),
            Err(ConfigError::EmptyScript)
        ));
    }

    #[test]
    fn unknown_token_reports_its_line() {
        match TrialScript::parse("MI_l\nMI_x\n") {
            Err(ConfigError::UnknownCondition { line, token }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "MI_x");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn run_path_follows_naming_scheme() {
        assert_eq!(
            TrialScript::run_path("seq", "MI", 2),
            PathBuf::from("seq/MI_run_2.txt")
        );
    }

    #[test]
    fn generated_sequence_is_balanced_and_parsable() {
        let tasks = vec!["MI_r".to_string(), "MI_l".to_string()];
        let mut rng = StdRng::seed_from_u64(3);
        let sequence = generate_sequence(&tasks, 10, &mut rng);
        assert_eq!(sequence.len(), 20);

        let script = TrialScript::parse(&sequence.join("\n")).unwrap();
        assert_eq!(script.count(Condition::LeftHand), 10);
        assert_eq!(script.count(Condition::RightHand), 10);
    }

    #[test]
    fn generation_is_reproducible_for_a_seed() {
        let tasks = vec!["ME_r".to_string(), "ME_l".to_string()];
        let a = generate_sequence(&tasks, 5, &mut StdRng::seed_from_u64(11));
        let b = generate_sequence(&tasks, 5, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
