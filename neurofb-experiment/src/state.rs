use super::bus::EventBus;
use super::config::TimingConfig;
use super::script::TrialScript;
use super::shared::{ConditionReader, CurrentCondition};
use super::trial::{Trial, TrialDurations, TrialTimestamps};
use neurofb_core::{Event, RunStatus, TrialState};
use neurofb_timing::Timer;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    AwaitingStart,
    RunningBreak,
    RunningReference,
    RunningCue,
    RunningFeedback,
    TrialDone,
    SessionFinished,
}

impl OrchestratorState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::RunningBreak
                | Self::RunningReference
                | Self::RunningCue
                | Self::RunningFeedback
                | Self::TrialDone
        )
    }
}

/// External signals the orchestrator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExperimentEvent {
    StartRequested,
    AbortRequested,
}

/// Sequences timed trial phases and publishes every transition on the bus.
///
/// Phase waits are deadlines on `timer`; `update` must be called regularly
/// and performs every transition that has come due, including several in a
/// row when phases have zero length. A cascade always stops once feedback
/// starts, so the caller can route feedback samples before the trial ends.
pub struct TrialOrchestrator<T, R>
where
    T: Timer,
    R: Rng,
{
    pub timer: T,
    pub rng: R,
    state: OrchestratorState,
    script: TrialScript,
    timing: TimingConfig,
    bus: Arc<EventBus>,
    condition: CurrentCondition,
    trial: TrialState,
    current: Option<Trial<T::Timestamp>>,
    history: Vec<Trial<T::Timestamp>>,
    deadline: Option<T::Timestamp>,
    session_started: bool,
    aborted: bool,
}

impl<T, R> TrialOrchestrator<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(
        script: TrialScript,
        timing: TimingConfig,
        bus: Arc<EventBus>,
        timer: T,
        rng: R,
    ) -> Self {
        let trial = TrialState::new(script.first());
        Self {
            timer,
            rng,
            state: OrchestratorState::Idle,
            script,
            timing,
            bus,
            condition: CurrentCondition::new(),
            trial,
            current: None,
            history: Vec::new(),
            deadline: None,
            session_started: false,
            aborted: false,
        }
    }

    /// Read access to the running trial's condition for sample routers.
    pub fn condition_reader(&self) -> ConditionReader {
        self.condition.reader()
    }

    /// Idle -> AwaitingStart. Publishes a reset so consumers start clean.
    pub fn begin_run(&mut self) -> bool {
        if self.state != OrchestratorState::Idle {
            return false;
        }
        self.state = OrchestratorState::AwaitingStart;
        log::info!(
            "Waiting for session start ({} trials scripted)",
            self.script.len()
        );
        self.publish(Event::Reset);
        true
    }

    pub fn handle_event(&mut self, event: ExperimentEvent) -> bool {
        match (self.state, event) {
            (OrchestratorState::AwaitingStart, ExperimentEvent::StartRequested) => {
                self.start_session();
                true
            }
            (OrchestratorState::SessionFinished, _) => false,
            (_, ExperimentEvent::AbortRequested) => {
                self.abort();
                true
            }
            _ => false,
        }
    }

    /// Performs every transition whose deadline has passed.
    pub fn update(&mut self) -> bool {
        let mut advanced = false;
        while let Some(deadline) = self.deadline {
            let now = self.timer.now();
            if now < deadline {
                break;
            }
            self.advance(now);
            advanced = true;
            if self.state == OrchestratorState::RunningFeedback {
                break;
            }
        }
        advanced
    }

    fn start_session(&mut self) {
        let now = self.timer.now();
        let first = self.script.first();
        self.trial = TrialState {
            trial_index: 0,
            condition: first,
            status: RunStatus::Running,
        };
        self.condition.set(first);
        self.session_started = true;
        log::info!("Session started");
        self.publish(Event::SessionStarted);
        self.enter_break(now);
    }

    fn enter_break(&mut self, now: u64) {
        let pause = self.timing.sample_break(&mut self.rng);
        self.current = Some(Trial {
            id: self.trial.trial_index,
            condition: self.trial.condition,
            durations: TrialDurations {
                pause,
                reference: self.timing.reference,
                cue: self.timing.cue,
                feedback: self.timing.feedback,
            },
            timestamps: TrialTimestamps::new(now),
        });
        self.state = OrchestratorState::RunningBreak;
        self.deadline = Some(after(now, pause));
        log::debug!(
            "Trial {} break of {:.3} s",
            self.trial.trial_index + 1,
            pause.as_secs_f64()
        );
    }

    fn advance(&mut self, now: u64) {
        let condition = self.trial.condition;
        match self.state {
            OrchestratorState::RunningBreak => {
                log::info!(
                    "Trial {}/{} started ({})",
                    self.trial.trial_index + 1,
                    self.script.len(),
                    condition
                );
                self.publish(Event::trial_started(condition));
                self.state = OrchestratorState::RunningReference;
                if let Some(trial) = self.current.as_mut() {
                    trial.timestamps.reference_start = Some(now);
                }
                self.publish(Event::Reference);
                self.deadline = Some(after(now, self.timing.reference));
            }
            OrchestratorState::RunningReference => {
                self.state = OrchestratorState::RunningCue;
                if let Some(trial) = self.current.as_mut() {
                    trial.timestamps.cue_start = Some(now);
                }
                self.publish(Event::Cue(condition));
                self.deadline = Some(after(now, self.timing.cue));
            }
            OrchestratorState::RunningCue => {
                self.state = OrchestratorState::RunningFeedback;
                if let Some(trial) = self.current.as_mut() {
                    trial.timestamps.feedback_start = Some(now);
                }
                self.publish(Event::Feedback(condition));
                self.deadline = Some(after(now, self.timing.feedback));
            }
            OrchestratorState::RunningFeedback => {
                self.state = OrchestratorState::TrialDone;
                self.end_trial(now);
            }
            _ => self.deadline = None,
        }
    }

    fn end_trial(&mut self, now: u64) {
        self.publish(Event::TrialEnd);
        if let Some(mut trial) = self.current.take() {
            trial.timestamps.end = Some(now);
            self.history.push(trial);
        }

        self.trial.trial_index += 1;
        match self.script.get(self.trial.trial_index) {
            Some(next) => {
                self.trial.condition = next;
                self.condition.set(next);
                self.enter_break(now);
            }
            None => self.finish_session(),
        }
    }

    fn abort(&mut self) {
        log::warn!(
            "Session aborted during {:?} after {} of {} trials",
            self.state,
            self.history.len(),
            self.script.len()
        );
        self.aborted = true;
        self.current = None;
        self.finish_session();
    }

    fn finish_session(&mut self) {
        self.state = OrchestratorState::SessionFinished;
        self.deadline = None;
        self.trial.status = RunStatus::Finished;
        self.condition.clear();
        if self.session_started {
            self.publish(Event::SessionFinished);
        }
        log::info!("Session finished ({} trials completed)", self.history.len());
    }

    fn publish(&self, event: Event) {
        if let Err(e) = self.bus.publish(event) {
            log::warn!("{}", e);
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn trial_state(&self) -> &TrialState {
        &self.trial
    }

    pub fn current_trial(&self) -> Option<&Trial<u64>> {
        self.current.as_ref()
    }

    /// Completed trials, in order.
    pub fn history(&self) -> &[Trial<u64>] {
        &self.history
    }

    pub fn script(&self) -> &TrialScript {
        &self.script
    }

    pub fn is_finished(&self) -> bool {
        self.state == OrchestratorState::SessionFinished
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted
    }

    /// Time left until the next scheduled transition.
    pub fn time_to_deadline(&self) -> Option<Duration> {
        self.deadline
            .map(|d| Duration::from_nanos(d.saturating_sub(self.timer.now())))
    }
}

fn after(now: u64, d: Duration) -> u64 {
    now.saturating_add(d.as_nanos() as u64)
}
