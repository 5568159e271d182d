// Per-trial feedback tally and the session report written after a run

use neurofb_core::{Condition, Event, Topic, TrialSummary};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bus::EventBusBuilder;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub completed_trials: usize,
    pub aborted: bool,
    pub trials: Vec<TrialSummary>,
}

impl SessionReport {
    /// Mean accuracy over trials that received any feedback.
    pub fn overall_accuracy(&self) -> Option<f64> {
        let (correct, total) = self.trials.iter().fold((0u64, 0u64), |(c, t), s| {
            (c + s.correct_samples, t + s.feedback_samples)
        });
        (total > 0).then(|| correct as f64 / total as f64)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

#[derive(Debug, Default)]
struct TallyState {
    trials: Vec<TrialSummary>,
    completed: usize,
    in_feedback: bool,
    intensity_sum: f64,
}

/// Counts glow updates that arrive while a trial is in its feedback phase.
#[derive(Debug, Clone, Default)]
pub struct FeedbackTally {
    state: Arc<Mutex<TallyState>>,
}

impl FeedbackTally {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TallyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, builder: &mut EventBusBuilder) {
        for topic in [
            Topic::TrialStarted,
            Topic::Feedback,
            Topic::GlowUpdate,
            Topic::TrialEnd,
        ] {
            let tally = self.clone();
            builder.subscribe(topic, move |event| {
                tally.record(event);
                Ok(())
            });
        }
    }

    fn record(&self, event: &Event) {
        let mut state = self.lock();
        match event {
            Event::TrialStarted(label) => {
                if let Some(condition) = Condition::from_label(label) {
                    let id = state.trials.len();
                    state.trials.push(TrialSummary::new(id, condition));
                    state.intensity_sum = 0.0;
                }
            }
            Event::Feedback(_) => state.in_feedback = true,
            Event::GlowUpdate { intensity, correct } if state.in_feedback => {
                state.intensity_sum += f64::from(*intensity);
                if let Some(summary) = state.trials.last_mut() {
                    summary.feedback_samples += 1;
                    if *correct {
                        summary.correct_samples += 1;
                    }
                }
            }
            Event::TrialEnd => {
                state.in_feedback = false;
                state.completed += 1;
                let sum = state.intensity_sum;
                if let Some(summary) = state.trials.last_mut() {
                    if summary.feedback_samples > 0 {
                        summary.mean_intensity = Some((sum / summary.feedback_samples as f64) as f32);
                    }
                }
            }
            _ => {}
        }
    }

    pub fn summaries(&self) -> Vec<TrialSummary> {
        self.lock().trials.clone()
    }

    pub fn report(&self, aborted: bool) -> SessionReport {
        let state = self.lock();
        SessionReport {
            completed_trials: state.completed,
            aborted,
            trials: state.trials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glow(intensity: f32, correct: bool) -> Event {
        Event::GlowUpdate { intensity, correct }
    }

    fn tally_bus() -> (FeedbackTally, crate::bus::EventBus) {
        let tally = FeedbackTally::new();
        let mut builder = EventBusBuilder::new();
        tally.subscribe(&mut builder);
        (tally, builder.build())
    }

    #[test]
    fn counts_only_glow_during_feedback() {
        let (tally, bus) = tally_bus();
        bus.publish(Event::trial_started(Condition::LeftHand)).unwrap();
        bus.publish(glow(0.9, true)).unwrap();
        bus.publish(Event::Feedback(Condition::LeftHand)).unwrap();
        bus.publish(glow(0.5, true)).unwrap();
        bus.publish(glow(1.0, false)).unwrap();
        bus.publish(Event::TrialEnd).unwrap();
        bus.publish(glow(0.7, true)).unwrap();

        let summaries = tally.summaries();
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.condition, Condition::LeftHand);
        assert_eq!(s.feedback_samples, 2);
        assert_eq!(s.correct_samples, 1);
        assert_eq!(s.mean_intensity, Some(0.75));
    }

    #[test]
    fn report_reflects_completed_trials() {
        let (tally, bus) = tally_bus();
        for condition in [Condition::RightHand, Condition::LeftHand] {
            bus.publish(Event::trial_started(condition)).unwrap();
            bus.publish(Event::Feedback(condition)).unwrap();
            bus.publish(glow(1.0, true)).unwrap();
            bus.publish(Event::TrialEnd).unwrap();
        }
        bus.publish(Event::trial_started(Condition::RightHand)).unwrap();

        let report = tally.report(true);
        assert_eq!(report.completed_trials, 2);
        assert_eq!(report.trials.len(), 3);
        assert_eq!(report.trials[2].mean_intensity, None);
        assert_eq!(report.trials[0].accuracy(), Some(1.0));
        assert_eq!(report.trials[2].accuracy(), None);
        assert_eq!(report.overall_accuracy(), Some(1.0));
        assert!(report.aborted);
    }

    #[test]
    fn report_is_written_as_json() {
        let (tally, bus) = tally_bus();
        bus.publish(Event::trial_started(Condition::RightHand)).unwrap();
        bus.publish(Event::TrialEnd).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        tally.report(false).write_json(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["completed_trials"], 1);
        assert_eq!(json["aborted"], false);
        assert_eq!(json["trials"][0]["condition"], "right-hand");
    }
}
