use neurofb_core::{Event, Topic};
use neurofb_stream::MarkerSink;
use std::sync::Arc;

use crate::bus::EventBusBuilder;

/// Topics that leave a marker in the recording.
pub const MARKER_TOPICS: [Topic; 7] = [
    Topic::SessionStarted,
    Topic::SessionFinished,
    Topic::TrialStarted,
    Topic::Reference,
    Topic::Cue,
    Topic::Feedback,
    Topic::TrialEnd,
];

/// Marker string recorded for `event`, if any.
pub fn marker_for(event: &Event, show_feedback: bool) -> Option<String> {
    let marker = match event {
        Event::SessionStarted => "Session_Start".to_string(),
        Event::SessionFinished => "Session_End".to_string(),
        Event::TrialStarted(label) => format!("Start_of_Trial_{label}"),
        Event::Reference => "Reference".to_string(),
        Event::Cue(_) => "Cue".to_string(),
        Event::Feedback(_) if show_feedback => "Feedback".to_string(),
        Event::TrialEnd => "End_of_Trial".to_string(),
        _ => return None,
    };
    Some(marker)
}

/// Writes a marker to `sink` for every phase event published on the bus.
pub fn subscribe_markers(builder: &mut EventBusBuilder, sink: Arc<MarkerSink>, show_feedback: bool) {
    for topic in MARKER_TOPICS {
        let sink = Arc::clone(&sink);
        builder.subscribe(topic, move |event| {
            if let Some(marker) = marker_for(event, show_feedback) {
                sink.write(&marker);
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurofb_core::Condition;
    use neurofb_stream::{LocalNetwork, SampleData, StreamIdentity, Transport};
    use std::time::Duration;

    #[test]
    fn phase_events_map_to_marker_vocabulary() {
        let cases = [
            (Event::SessionStarted, Some("Session_Start")),
            (Event::trial_started(Condition::LeftHand), Some("Start_of_Trial_l")),
            (Event::trial_started(Condition::RightHand), Some("Start_of_Trial_r")),
            (Event::Reference, Some("Reference")),
            (Event::Cue(Condition::RightHand), Some("Cue")),
            (Event::Feedback(Condition::RightHand), Some("Feedback")),
            (Event::TrialEnd, Some("End_of_Trial")),
            (Event::SessionFinished, Some("Session_End")),
            (Event::Reset, None),
            (Event::ValueUpdate(vec![1.0]), None),
        ];
        for (event, expected) in cases {
            assert_eq!(marker_for(&event, true).as_deref(), expected, "{event:?}");
        }
    }

    #[test]
    fn feedback_marker_is_suppressed_without_feedback() {
        assert_eq!(marker_for(&Event::Feedback(Condition::LeftHand), false), None);
        assert_eq!(marker_for(&Event::Cue(Condition::LeftHand), false).as_deref(), Some("Cue"));
    }

    #[test]
    fn subscribed_sink_records_published_phases() {
        let net = LocalNetwork::new();
        let transport: Arc<dyn Transport> = Arc::new(net.clone());
        let sink = Arc::new(MarkerSink::open(transport, StreamIdentity::named("markers")));
        let info = net.resolve("markers", Duration::ZERO).unwrap().remove(0);
        let mut inlet = net.open_inlet(&info).unwrap();

        let mut builder = EventBusBuilder::new();
        subscribe_markers(&mut builder, sink, true);
        let bus = builder.build();
        bus.publish(Event::trial_started(Condition::RightHand)).unwrap();
        bus.publish(Event::GlowUpdate { intensity: 1.0, correct: true }).unwrap();
        bus.publish(Event::TrialEnd).unwrap();

        let mut written = Vec::new();
        while let Some(raw) = inlet.try_pull().unwrap() {
            written.push(raw.data);
        }
        assert_eq!(
            written,
            vec![
                SampleData::Text(vec!["Start_of_Trial_r".into()]),
                SampleData::Text(vec!["End_of_Trial".into()]),
            ]
        );
    }
}
