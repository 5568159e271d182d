// In-process stand-in for the acquisition and classification pipeline
//
// Follows the session through its marker stream the way the real feedback
// model does: it learns the cued hand from `Start_of_Trial_<label>` and only
// emits classifier and region values while the trial is in feedback.

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use neurofb_core::{Condition, TrialPhase};
use neurofb_experiment::StreamSettings;
use neurofb_stream::{
    IRREGULAR_RATE, Inlet, Outlet, SampleData, StreamIdentity, StreamInfo, Transport,
    TransportError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulatorOptions {
    pub rate_hz: f64,
    pub hit_rate: f64,
    pub regions: usize,
    pub seed: u64,
}

/// Trial tracking and sample synthesis, independent of any thread.
#[derive(Debug)]
struct SimulatedModel {
    phase: TrialPhase,
    condition: Option<Condition>,
    hit_rate: f64,
    regions: usize,
    rng: StdRng,
}

impl SimulatedModel {
    fn new(options: &SimulatorOptions) -> Self {
        Self {
            phase: TrialPhase::Break,
            condition: None,
            hit_rate: options.hit_rate.clamp(0.0, 1.0),
            regions: options.regions,
            rng: StdRng::seed_from_u64(options.seed),
        }
    }

    fn apply_marker(&mut self, marker: &str) {
        if let Some(label) = marker.strip_prefix("Start_of_Trial_") {
            self.condition = Condition::from_label(label);
            return;
        }
        self.phase = match marker {
            "Reference" => TrialPhase::Reference,
            "Cue" => TrialPhase::Cue,
            "Feedback" => TrialPhase::Feedback,
            "End_of_Trial" | "Session_End" => TrialPhase::Break,
            _ => return,
        };
        log::trace!("simulator phase {}", self.phase.name());
    }

    /// `[predicted, magnitude]` while feedback is running.
    fn classifier_sample(&mut self) -> Option<Vec<f32>> {
        if !self.phase.is_feedback() {
            return None;
        }
        let cued = self.condition?;
        let predicted = if self.rng.random_bool(self.hit_rate) {
            cued
        } else {
            opposite(cued)
        };
        let magnitude: f32 = self.rng.random_range(0.2..1.0);
        Some(vec![predicted.code() as f32, magnitude])
    }

    /// Relative band-power change per region; the hemisphere opposite the
    /// imagined hand desynchronizes.
    fn region_sample(&mut self) -> Option<Vec<f32>> {
        if !self.phase.is_feedback() {
            return None;
        }
        let cued = self.condition?;
        let values = (0..self.regions)
            .map(|region| {
                let right_hemisphere = region % 2 == 1;
                let active = right_hemisphere == (cued == Condition::LeftHand);
                let noise: f32 = self.rng.random_range(-0.15..0.15);
                if active { noise - 0.4 } else { noise }
            })
            .collect();
        Some(values)
    }
}

fn opposite(condition: Condition) -> Condition {
    match condition {
        Condition::LeftHand => Condition::RightHand,
        Condition::RightHand => Condition::LeftHand,
    }
}

fn sample_period(rate_hz: f64) -> Result<Duration> {
    if !rate_hz.is_finite() || rate_hz <= 0.0 {
        bail!("sample rate must be positive (got {rate_hz})");
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .with_context(|| format!("sample rate {rate_hz} Hz is too low"))
}

fn outlet_info(identity: &StreamIdentity, channels: usize) -> StreamInfo {
    let mut info = StreamInfo::numeric(identity.name.clone(), channels, IRREGULAR_RATE);
    info.source_id = identity.source_id.clone().unwrap_or_default();
    info
}

/// Background thread publishing simulated feedback streams.
pub struct FeedbackSimulator {
    stop_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl FeedbackSimulator {
    /// Advertises the classifier and region streams and starts following the
    /// marker stream, which must already be open.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        streams: &StreamSettings,
        options: SimulatorOptions,
    ) -> Result<Self> {
        let period = sample_period(options.rate_hz)?;
        let marker_info = transport
            .resolve(&streams.marker.name, Duration::ZERO)?
            .into_iter()
            .next()
            .with_context(|| format!("marker stream '{}' is not open", streams.marker.name))?;
        let markers = transport.open_inlet(&marker_info)?;
        let classifier = transport.open_outlet(outlet_info(&streams.classifier, 2))?;
        let regions = transport.open_outlet(outlet_info(&streams.values, options.regions.max(1)))?;

        let model = SimulatedModel::new(&options);
        let (stop_tx, stop_rx) = bounded(1);

        let join = thread::Builder::new()
            .name("neurofb-simulator".to_string())
            .spawn(move || run_simulator(model, markers, classifier, regions, stop_rx, period))
            .context("failed to spawn simulator thread")?;

        log::info!(
            "Simulating '{}' and '{}' at {:.1} Hz (hit rate {:.2})",
            streams.classifier.name,
            streams.values.name,
            options.rate_hz,
            options.hit_rate
        );
        Ok(Self {
            stop_tx,
            join: Some(join),
        })
    }
}

impl Drop for FeedbackSimulator {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_simulator(
    mut model: SimulatedModel,
    mut markers: Box<dyn Inlet>,
    classifier: Box<dyn Outlet>,
    regions: Box<dyn Outlet>,
    stop_rx: Receiver<()>,
    period: Duration,
) {
    loop {
        match stop_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        loop {
            match markers.try_pull() {
                Ok(Some(raw)) => {
                    if let SampleData::Text(text) = raw.data {
                        text.iter().for_each(|m| model.apply_marker(m));
                    }
                }
                Ok(None) => break,
                Err(TransportError::Lost) => {
                    log::debug!("Marker stream closed, simulator stopping");
                    return;
                }
                Err(e) => {
                    log::warn!("Simulator marker pull failed: {}", e);
                    break;
                }
            }
        }

        if let Some(values) = model.classifier_sample() {
            push(classifier.as_ref(), values);
        }
        if let Some(values) = model.region_sample() {
            push(regions.as_ref(), values);
        }
    }
}

fn push(outlet: &dyn Outlet, values: Vec<f32>) {
    if let Err(e) = outlet.push(SampleData::Float32(values), 0.0) {
        log::warn!("Simulator push to '{}' failed: {}", outlet.info().name, e);
    }
}
