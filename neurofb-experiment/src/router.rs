// Stream ingestion
//
// An `IngestionChannel` pairs a resolved `SampleSource` with the router that
// turns its samples into bus events. `poll` drains whatever arrived since the
// previous tick and never blocks.

use neurofb_core::{Condition, Event, Sample};
use neurofb_stream::{SampleSource, StreamError, StreamResult};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::bus::{EventBus, PublishError};
use crate::shared::ConditionReader;

/// Turns incoming samples into bus events.
pub trait SampleRouter: Send {
    fn route(&mut self, sample: Sample, bus: &EventBus) -> Result<(), PublishError>;

    /// Narrowest sample this router can interpret.
    fn min_channels(&self) -> usize;
}

/// Whether the classifier's prediction matches the condition being performed.
///
/// Predictions are rounded half to even. Non-finite predictions and samples
/// arriving outside a running trial are never correct.
pub fn is_correct(predicted: f32, condition: Option<Condition>) -> bool {
    let Some(condition) = condition else {
        return false;
    };
    if !predicted.is_finite() {
        return false;
    }
    let rounded = predicted.round_ties_even();
    rounded >= 0.0 && rounded == condition.code() as f32
}

/// Classifier output `[predicted, magnitude, ..]` to glow updates.
pub struct FeedbackRouter {
    condition: ConditionReader,
}

impl FeedbackRouter {
    pub fn new(condition: ConditionReader) -> Self {
        Self { condition }
    }
}

impl SampleRouter for FeedbackRouter {
    fn route(&mut self, sample: Sample, bus: &EventBus) -> Result<(), PublishError> {
        let (Some(predicted), Some(magnitude)) = (sample.get(0), sample.get(1)) else {
            return Ok(());
        };
        let correct = is_correct(predicted, self.condition.get());
        log::trace!(
            "glow {:.3} (predicted {}, correct {})",
            magnitude,
            predicted,
            correct
        );
        bus.publish(Event::GlowUpdate {
            intensity: magnitude,
            correct,
        })
    }

    fn min_channels(&self) -> usize {
        2
    }
}

/// Forwards derived per-region values, one sample out of every `decimation`.
pub struct ValueRouter {
    decimation: NonZeroU32,
    seen: u64,
}

impl ValueRouter {
    pub fn new(decimation: NonZeroU32) -> Self {
        Self {
            decimation,
            seen: 0,
        }
    }
}

impl SampleRouter for ValueRouter {
    fn route(&mut self, sample: Sample, bus: &EventBus) -> Result<(), PublishError> {
        let forward = self.seen % u64::from(self.decimation.get()) == 0;
        self.seen += 1;
        if !forward {
            return Ok(());
        }
        log::trace!("values {:?}", sample.values);
        bus.publish(Event::ValueUpdate(sample.values))
    }

    fn min_channels(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// A failure aborts the run.
    Required,
    /// A failure disables this channel only.
    Optional,
}

pub struct IngestionChannel {
    source: SampleSource,
    router: Box<dyn SampleRouter>,
    policy: ChannelPolicy,
    degraded: bool,
    routed: u64,
}

impl IngestionChannel {
    pub fn new<R>(source: SampleSource, router: R, policy: ChannelPolicy) -> Self
    where
        R: SampleRouter + 'static,
    {
        Self {
            source,
            router: Box::new(router),
            policy,
            degraded: false,
            routed: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn policy(&self) -> ChannelPolicy {
        self.policy
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Samples handed to the router so far.
    pub fn routed(&self) -> u64 {
        self.routed
    }

    /// Resolves the stream and checks it is wide enough for the router.
    pub fn resolve(&mut self, timeout: Duration) -> StreamResult<()> {
        let got = self.source.resolve(timeout)?.channel_count;
        let expected = self.router.min_channels();
        if got < expected {
            self.source.close();
            return Err(StreamError::ChannelMismatch {
                name: self.source.name().to_string(),
                expected,
                got,
            });
        }
        Ok(())
    }

    /// Routes every pending sample and returns how many there were.
    ///
    /// Stream failures are returned for required channels. Optional
    /// channels log them, close the stream and stay silent from then on.
    pub fn poll(&mut self, bus: &EventBus) -> StreamResult<usize> {
        if self.degraded {
            return Ok(0);
        }
        let mut count = 0;
        loop {
            match self.source.pull_latest() {
                Ok(Some(sample)) => {
                    count += 1;
                    if let Err(e) = self.router.route(sample, bus) {
                        log::warn!("{}", e);
                    }
                }
                Ok(None) => break,
                Err(e) if self.policy == ChannelPolicy::Required => return Err(e),
                Err(e) => {
                    log::error!(
                        "Disabling optional stream '{}': {}",
                        self.source.name(),
                        e
                    );
                    self.degraded = true;
                    self.source.close();
                    break;
                }
            }
        }
        self.routed += count as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBusBuilder;
    use crate::shared::CurrentCondition;
    use neurofb_core::Topic;
    use neurofb_stream::{LocalNetwork, Outlet, SampleData, StreamIdentity, StreamInfo, Transport};
    use std::sync::{Arc, Mutex};

    fn recording_bus(topic: Topic) -> (EventBus, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut builder = EventBusBuilder::new();
        builder.subscribe(topic, move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        (builder.build(), seen)
    }

    fn channel(
        net: &LocalNetwork,
        name: &str,
        router: impl SampleRouter + 'static,
        policy: ChannelPolicy,
    ) -> IngestionChannel {
        let source = SampleSource::new(StreamIdentity::named(name), Arc::new(net.clone()));
        IngestionChannel::new(source, router, policy)
    }

    fn push(outlet: &dyn Outlet, values: &[f32]) {
        outlet
            .push(SampleData::Float32(values.to_vec()), 0.0)
            .unwrap();
    }

    #[test]
    fn correctness_over_conditions_and_predictions() {
        let cases = [
            (Condition::LeftHand, 0.0, true),
            (Condition::LeftHand, 1.0, false),
            (Condition::LeftHand, 2.0, false),
            (Condition::RightHand, 0.0, false),
            (Condition::RightHand, 1.0, true),
            (Condition::RightHand, 2.0, false),
        ];
        for (condition, predicted, expected) in cases {
            assert_eq!(
                is_correct(predicted, Some(condition)),
                expected,
                "{condition:?} vs {predicted}"
            );
        }
    }

    #[test]
    fn correctness_edge_cases() {
        assert!(is_correct(0.4, Some(Condition::LeftHand)));
        assert!(is_correct(0.5, Some(Condition::LeftHand)));
        assert!(!is_correct(1.5, Some(Condition::RightHand)));
        assert!(is_correct(0.6, Some(Condition::RightHand)));
        assert!(!is_correct(-0.4, Some(Condition::RightHand)));
        assert!(!is_correct(f32::NAN, Some(Condition::LeftHand)));
        assert!(!is_correct(0.0, None));
    }

    #[test]
    fn feedback_router_publishes_magnitude_and_flag() {
        let (bus, seen) = recording_bus(Topic::GlowUpdate);
        let current = CurrentCondition::new();
        current.set(Condition::RightHand);
        let mut router = FeedbackRouter::new(current.reader());

        router.route(Sample::new(vec![1.0, 0.8], 0.0), &bus).unwrap();
        router.route(Sample::new(vec![0.0, 0.3, 9.0], 0.0), &bus).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Event::GlowUpdate {
                    intensity: 0.8,
                    correct: true
                },
                Event::GlowUpdate {
                    intensity: 0.3,
                    correct: false
                },
            ]
        );
    }

    #[test]
    fn value_router_forwards_verbatim_by_default() {
        let (bus, seen) = recording_bus(Topic::ValueUpdate);
        let mut router = ValueRouter::new(NonZeroU32::MIN);
        for i in 0..3 {
            router
                .route(Sample::new(vec![i as f32, -1.0], 0.0), &bus)
                .unwrap();
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Event::ValueUpdate(vec![0.0, -1.0]),
                Event::ValueUpdate(vec![1.0, -1.0]),
                Event::ValueUpdate(vec![2.0, -1.0]),
            ]
        );
    }

    #[test]
    fn value_router_decimates_by_configured_factor() {
        let (bus, seen) = recording_bus(Topic::ValueUpdate);
        let mut router = ValueRouter::new(NonZeroU32::new(3).unwrap());
        for i in 0..7 {
            router.route(Sample::new(vec![i as f32], 0.0), &bus).unwrap();
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Event::ValueUpdate(vec![0.0]),
                Event::ValueUpdate(vec![3.0]),
                Event::ValueUpdate(vec![6.0]),
            ]
        );
    }

    #[test]
    fn poll_drains_every_pending_sample() {
        let net = LocalNetwork::new();
        let outlet = net
            .open_outlet(StreamInfo::numeric("erds", 2, 10.0))
            .unwrap();
        let (bus, seen) = recording_bus(Topic::ValueUpdate);
        let mut ch = channel(&net, "erds", ValueRouter::new(NonZeroU32::MIN), ChannelPolicy::Required);
        ch.resolve(Duration::ZERO).unwrap();

        assert_eq!(ch.poll(&bus).unwrap(), 0);
        for i in 0..4 {
            push(outlet.as_ref(), &[i as f32, 0.0]);
        }
        assert_eq!(ch.poll(&bus).unwrap(), 4);
        assert_eq!(ch.poll(&bus).unwrap(), 0);
        assert_eq!(ch.routed(), 4);
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn narrow_stream_is_rejected_at_resolve() {
        let net = LocalNetwork::new();
        let _outlet = net.open_outlet(StreamInfo::numeric("lda", 1, 10.0)).unwrap();
        let reader = CurrentCondition::new().reader();
        let mut ch = channel(&net, "lda", FeedbackRouter::new(reader), ChannelPolicy::Required);
        assert!(matches!(
            ch.resolve(Duration::ZERO),
            Err(StreamError::ChannelMismatch {
                expected: 2,
                got: 1,
                ..
            })
        ));
    }

    #[test]
    fn optional_channel_degrades_on_disconnect() {
        let net = LocalNetwork::new();
        let outlet = net.open_outlet(StreamInfo::numeric("erds", 1, 10.0)).unwrap();
        let (bus, seen) = recording_bus(Topic::ValueUpdate);
        let mut ch = channel(&net, "erds", ValueRouter::new(NonZeroU32::MIN), ChannelPolicy::Optional);
        ch.resolve(Duration::ZERO).unwrap();

        push(outlet.as_ref(), &[1.0]);
        drop(outlet);
        assert_eq!(ch.poll(&bus).unwrap(), 1);
        assert!(ch.is_degraded());
        assert_eq!(ch.poll(&bus).unwrap(), 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn required_channel_reports_disconnect() {
        let net = LocalNetwork::new();
        let outlet = net.open_outlet(StreamInfo::numeric("lda", 2, 10.0)).unwrap();
        let bus = EventBus::empty();
        let reader = CurrentCondition::new().reader();
        let mut ch = channel(&net, "lda", FeedbackRouter::new(reader), ChannelPolicy::Required);
        ch.resolve(Duration::ZERO).unwrap();

        drop(outlet);
        assert!(matches!(
            ch.poll(&bus),
            Err(StreamError::Disconnected { .. })
        ));
        assert!(!ch.is_degraded());
    }

    #[test]
    fn publish_failures_do_not_stop_draining() {
        let net = LocalNetwork::new();
        let outlet = net.open_outlet(StreamInfo::numeric("erds", 1, 10.0)).unwrap();
        let mut builder = EventBusBuilder::new();
        builder.subscribe(Topic::ValueUpdate, |_| Err("plot closed".into()));
        let bus = builder.build();
        let mut ch = channel(&net, "erds", ValueRouter::new(NonZeroU32::MIN), ChannelPolicy::Required);
        ch.resolve(Duration::ZERO).unwrap();

        push(outlet.as_ref(), &[1.0]);
        push(outlet.as_ref(), &[2.0]);
        assert_eq!(ch.poll(&bus).unwrap(), 2);
    }
}
