// Cooperative session loop
//
// One thread drives everything: control commands, orchestrator deadlines
// and stream ingestion are serviced once per tick, then the loop sleeps on
// the orchestrator's timer for the rest of the tick interval.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use neurofb_stream::StreamError;
use neurofb_timing::{TickStats, Timer};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::bus::EventBus;
use crate::config::FeedbackSettings;
use crate::router::IngestionChannel;
use crate::state::{ExperimentEvent, TrialOrchestrator};

/// Operator commands delivered to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Quit,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("stream resolution failed before the first trial: {0}")]
    Resolve(#[source] StreamError),

    #[error("required stream failed during the run: {0}")]
    Ingestion(#[source] StreamError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub completed_trials: usize,
    pub aborted: bool,
    pub ticks: TickStats,
}

pub struct Session<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    orchestrator: TrialOrchestrator<T, R>,
    bus: Arc<EventBus>,
    channels: Vec<IngestionChannel>,
    control: Receiver<ControlCommand>,
    tick: Duration,
    resolve_timeout: Duration,
}

impl<T, R> Session<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    pub fn new(
        orchestrator: TrialOrchestrator<T, R>,
        bus: Arc<EventBus>,
        control: Receiver<ControlCommand>,
        settings: &FeedbackSettings,
    ) -> Self {
        Self {
            orchestrator,
            bus,
            channels: Vec::new(),
            control,
            tick: settings.tick_interval,
            resolve_timeout: settings.resolve_timeout,
        }
    }

    pub fn add_channel(&mut self, channel: IngestionChannel) {
        self.channels.push(channel);
    }

    pub fn orchestrator(&self) -> &TrialOrchestrator<T, R> {
        &self.orchestrator
    }

    pub fn channels(&self) -> &[IngestionChannel] {
        &self.channels
    }

    /// Runs the session to completion, abort, or failure.
    ///
    /// Every stream is resolved before the session waits for its start
    /// command; any resolution failure ends the run before the first trial.
    pub fn run(&mut self) -> Result<SessionOutcome, SessionError> {
        for channel in &mut self.channels {
            if let Err(e) = channel.resolve(self.resolve_timeout) {
                log::error!("Cannot start session: {}", e);
                self.orchestrator.handle_event(ExperimentEvent::AbortRequested);
                return Err(SessionError::Resolve(e));
            }
        }

        self.orchestrator.begin_run();
        if !self.wait_for_start()? {
            self.orchestrator.handle_event(ExperimentEvent::AbortRequested);
            return Ok(self.outcome());
        }

        while !self.orchestrator.is_finished() {
            let tick_start = self.orchestrator.timer.now();

            // Samples are routed before `update` can end the trial they
            // belong to.
            self.drain_control();
            self.poll_channels()?;
            self.orchestrator.update();

            self.orchestrator.timer.sleep(self.tick);
            let elapsed = self.orchestrator.timer.elapsed(tick_start);
            self.orchestrator.timer.record_tick(elapsed);
        }

        let outcome = self.outcome();
        log::info!(
            "Tick stats: {} ticks, avg {:.3} ms, jitter {:.3} ms, min {:.3} ms, max {:.3} ms ({:.1} Hz)",
            outcome.ticks.samples,
            outcome.ticks.average_tick_ns / 1e6,
            outcome.ticks.jitter_ns / 1e6,
            outcome.ticks.min_tick_ns / 1e6,
            outcome.ticks.max_tick_ns / 1e6,
            outcome.ticks.effective_rate_hz
        );
        Ok(outcome)
    }

    /// Keeps ingesting while waiting; `false` when the operator quits first.
    fn wait_for_start(&mut self) -> Result<bool, SessionError> {
        loop {
            match self.control.recv_timeout(self.tick) {
                Ok(ControlCommand::Start) => {
                    self.poll_channels()?;
                    return Ok(self
                        .orchestrator
                        .handle_event(ExperimentEvent::StartRequested));
                }
                Ok(ControlCommand::Quit) => {
                    log::info!("Quit before session start");
                    return Ok(false);
                }
                Err(RecvTimeoutError::Timeout) => self.poll_channels()?,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Control channel closed before session start");
                    return Ok(false);
                }
            }
        }
    }

    fn drain_control(&mut self) {
        loop {
            match self.control.try_recv() {
                Ok(ControlCommand::Quit) => {
                    self.orchestrator.handle_event(ExperimentEvent::AbortRequested);
                }
                Ok(ControlCommand::Start) => log::debug!("Session already running"),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn poll_channels(&mut self) -> Result<(), SessionError> {
        for channel in &mut self.channels {
            if let Err(e) = channel.poll(&self.bus) {
                log::error!("Aborting session: {}", e);
                self.orchestrator.handle_event(ExperimentEvent::AbortRequested);
                return Err(SessionError::Ingestion(e));
            }
        }
        Ok(())
    }

    fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            completed_trials: self.orchestrator.history().len(),
            aborted: self.orchestrator.was_aborted(),
            ticks: self.orchestrator.timer.tick_stats(),
        }
    }
}
