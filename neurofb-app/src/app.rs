use anyhow::{Context, Result, bail};
use neurofb_core::Condition;
use neurofb_experiment::{
    ChannelPolicy, ControlCommand, EventBusBuilder, ExperimentConfig, FeedbackRouter,
    FeedbackTally, IngestionChannel, Session, TrialOrchestrator, TrialScript, ValueRouter,
    subscribe_markers,
};
use neurofb_stream::{LocalNetwork, MarkerSink, SampleSource, Transport};
use neurofb_timing::HighPrecisionTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::control;
use crate::renderer::ConsoleRenderer;
use crate::simulate::{FeedbackSimulator, SimulatorOptions};

pub struct App {
    args: RunArgs,
    config: ExperimentConfig,
    script: TrialScript,
}

impl App {
    pub fn new(args: RunArgs) -> Result<Self> {
        let config = ExperimentConfig::from_path(&args.config)
            .with_context(|| format!("loading config {}", args.config.display()))?;

        let script_path = args
            .script
            .clone()
            .unwrap_or_else(|| TrialScript::run_path(&args.sequence_dir, &args.prefix, args.run));
        let script = TrialScript::from_path(&script_path)
            .with_context(|| format!("loading trial script {}", script_path.display()))?;

        if !(0.0..=1.0).contains(&args.hit_rate) {
            bail!("--hit-rate must lie in [0, 1] (got {})", args.hit_rate);
        }
        if !args.sample_rate.is_finite() || args.sample_rate <= 0.0 {
            bail!("--sample-rate must be positive (got {})", args.sample_rate);
        }

        log::info!(
            "Loaded {} trials from {} ({} left, {} right)",
            script.len(),
            script_path.display(),
            script.count(Condition::LeftHand),
            script.count(Condition::RightHand)
        );
        Ok(Self {
            args,
            config,
            script,
        })
    }

    pub fn run(self) -> Result<()> {
        let App {
            args,
            config,
            script,
        } = self;
        let feedback = &config.feedback;
        let streams = &config.streams;
        let total = script.len();

        println!("=== NEUROFEEDBACK SESSION ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Trials: {}", total);
        println!(
            "Feedback: {}",
            if feedback.show_feedback { "shown" } else { "hidden" }
        );

        let transport: Arc<dyn Transport> = Arc::new(LocalNetwork::new());
        let markers = MarkerSink::try_open(Arc::clone(&transport), streams.marker.clone())
            .context("opening marker stream")?;
        let markers = Arc::new(markers);

        let renderer = ConsoleRenderer::new(feedback.show_feedback);
        let tally = FeedbackTally::new();
        let mut builder = EventBusBuilder::new();
        subscribe_markers(&mut builder, markers, feedback.show_feedback);
        renderer.subscribe(&mut builder);
        tally.subscribe(&mut builder);
        let bus = Arc::new(builder.build());
        log::debug!("Subscribers: {:?}", bus);

        let seed = args.seed.unwrap_or_else(rand::random);
        log::info!("Seed {}", seed);
        let orchestrator = TrialOrchestrator::new(
            script,
            config.timing.clone(),
            Arc::clone(&bus),
            HighPrecisionTimer::new(),
            StdRng::seed_from_u64(seed),
        );
        let condition = orchestrator.condition_reader();

        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let mut session = Session::new(orchestrator, Arc::clone(&bus), control_rx, feedback);

        // Feedback streams exist only while the simulator runs; keep it alive
        // for the whole session.
        let _simulator = if feedback.show_feedback {
            let simulator = FeedbackSimulator::spawn(
                Arc::clone(&transport),
                streams,
                SimulatorOptions {
                    rate_hz: args.sample_rate,
                    hit_rate: args.hit_rate,
                    regions: args.regions,
                    seed,
                },
            )?;
            session.add_channel(IngestionChannel::new(
                SampleSource::new(streams.classifier.clone(), Arc::clone(&transport)),
                FeedbackRouter::new(condition),
                ChannelPolicy::Required,
            ));
            session.add_channel(IngestionChannel::new(
                SampleSource::new(streams.values.clone(), Arc::clone(&transport)),
                ValueRouter::new(feedback.value_decimation),
                ChannelPolicy::Optional,
            ));
            Some(simulator)
        } else {
            None
        };

        if args.autostart {
            control_tx.send(ControlCommand::Start)?;
        } else {
            println!("Type START to begin or QUIT to abort.");
        }
        control::spawn_stdin_reader(control_tx).context("failed to spawn stdin reader")?;

        let outcome = session.run()?;
        let report = tally.report(outcome.aborted);

        println!(
            "Completed {} of {} trials{}",
            outcome.completed_trials,
            total,
            if outcome.aborted { " (aborted)" } else { "" }
        );
        for trial in &report.trials {
            if let Some(accuracy) = trial.accuracy() {
                println!(
                    "  Trial {} ({}): {:.1}% of {} samples correct",
                    trial.trial_id + 1,
                    trial.condition,
                    accuracy * 100.0,
                    trial.feedback_samples
                );
            }
        }
        if let Some(accuracy) = report.overall_accuracy() {
            println!("Feedback accuracy: {:.1}%", accuracy * 100.0);
        }
        if let Some(path) = &args.report {
            report
                .write_json(path)
                .with_context(|| format!("writing report {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        Ok(())
    }
}
