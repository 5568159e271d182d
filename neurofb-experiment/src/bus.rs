// In-process publish/subscribe broker
//
// Subscriptions are collected on an `EventBusBuilder` during setup; `build`
// freezes them into an `EventBus` that can only publish. Delivery is
// synchronous on the publisher's thread, in registration order.

use neurofb_core::{Event, Topic};
use std::fmt;
use thiserror::Error;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Box<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

const TOPIC_COUNT: usize = Topic::ALL.len();

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("subscriber #{index} on {topic:?} failed: {source}")]
    Subscriber {
        topic: Topic,
        index: usize,
        #[source]
        source: HandlerError,
    },
}

#[derive(Default)]
pub struct EventBusBuilder {
    table: [Vec<Handler>; TOPIC_COUNT],
}

impl EventBusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` on `topic`. Duplicates are not detected.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> &mut Self
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.table[topic.index()].push(Box::new(handler));
        self
    }

    pub fn build(self) -> EventBus {
        EventBus { table: self.table }
    }
}

/// Closed subscriber table.
pub struct EventBus {
    table: [Vec<Handler>; TOPIC_COUNT],
}

impl EventBus {
    /// A bus with no subscribers at all.
    pub fn empty() -> Self {
        EventBusBuilder::new().build()
    }

    /// Delivers `event` to every subscriber of its topic.
    ///
    /// The first failing subscriber stops delivery and its error is returned.
    pub fn publish(&self, event: Event) -> Result<(), PublishError> {
        let topic = event.topic();
        for (index, handler) in self.table[topic.index()].iter().enumerate() {
            handler(&event).map_err(|source| PublishError::Subscriber {
                topic,
                index,
                source,
            })?;
        }
        Ok(())
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.table[topic.index()].len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for topic in Topic::ALL {
            map.entry(&topic, &self.subscriber_count(topic));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurofb_core::Condition;
    use std::sync::{Arc, Mutex};

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::empty();
        for topic_event in [
            Event::SessionStarted,
            Event::Cue(Condition::LeftHand),
            Event::ValueUpdate(vec![1.0, 2.0]),
        ] {
            assert!(bus.publish(topic_event).is_ok());
        }
    }

    #[test]
    fn subscribers_run_once_each_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventBusBuilder::new();
        for id in ["first", "second"] {
            let calls = Arc::clone(&calls);
            builder.subscribe(Topic::Reference, move |_| {
                calls.lock().unwrap().push(id);
                Ok(())
            });
        }
        let bus = builder.build();

        bus.publish(Event::Reference).unwrap();
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(bus.subscriber_count(Topic::Reference), 2);
        assert_eq!(bus.subscriber_count(Topic::Cue), 0);
    }

    #[test]
    fn subscribers_only_see_their_topic_and_payload() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = EventBusBuilder::new();
        let sink = Arc::clone(&seen);
        builder.subscribe(Topic::Cue, move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        let bus = builder.build();

        bus.publish(Event::Feedback(Condition::LeftHand)).unwrap();
        bus.publish(Event::Cue(Condition::RightHand)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Event::Cue(Condition::RightHand)]);
    }

    #[test]
    fn failing_subscriber_aborts_the_publish() {
        let later = Arc::new(Mutex::new(0));
        let mut builder = EventBusBuilder::new();
        builder.subscribe(Topic::TrialEnd, |_| Err("renderer gone".into()));
        let counter = Arc::clone(&later);
        builder.subscribe(Topic::TrialEnd, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        let bus = builder.build();

        let err = bus.publish(Event::TrialEnd).unwrap_err();
        let PublishError::Subscriber { topic, index, .. } = err;
        assert_eq!(topic, Topic::TrialEnd);
        assert_eq!(index, 0);
        assert_eq!(*later.lock().unwrap(), 0);
    }

    #[test]
    fn bus_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventBus>();
    }
}
