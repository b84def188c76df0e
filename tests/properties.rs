//! Property tests for registry upserts and envelope fan-out.

use connector_events::{
    EventRecord, EventRegistry, InMemoryBroker, Message, State, StatusEvent, TransportConfig,
    TransportProvider,
};
use crossbeam_channel::unbounded;
use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

fn status(id: &str, stream_id: &str, message: &str) -> EventRecord {
    EventRecord::Status(StatusEvent {
        id: id.to_string(),
        stream_id: stream_id.to_string(),
        message: message.to_string(),
        state: State::Unhealthy,
        metadata: None,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The registry holds exactly the last record written per (id, stream).
    #[test]
    fn prop_registry_keeps_latest_per_key(
        writes in prop::collection::vec(("[a-c]", "[x-z]?", "[a-z]{1,8}"), 0..64)
    ) {
        let registry = EventRegistry::new();
        let mut expected: HashMap<(String, String), String> = HashMap::new();

        for (id, stream, message) in &writes {
            registry.record_event(status(id, stream, message));
            expected.insert((id.clone(), stream.clone()), message.clone());
        }

        let events = registry.list_events();
        prop_assert_eq!(events.len(), expected.len());
        for event in events {
            match event {
                EventRecord::Status(s) => {
                    prop_assert_eq!(Some(&s.message), expected.get(&(s.id.clone(), s.stream_id.clone())));
                }
                EventRecord::Alert(a) => prop_assert!(false, "unexpected alert {:?}", a),
            }
        }
    }

    /// A batch reaches the handler as one call per payload, in order.
    #[test]
    fn prop_batch_delivered_in_order(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..16)
    ) {
        let provider = TransportProvider::new(InMemoryBroker::new(), TransportConfig::default());
        let client = provider.client().unwrap();
        let (tx, rx) = unbounded();
        let sub = client
            .subscribe("batch", move |m: Message| tx.send(m.payload).unwrap())
            .unwrap();

        client
            .publish_batch("batch", payloads.iter().cloned().map(Message::new).collect())
            .unwrap();

        let received: Vec<Vec<u8>> = (0..payloads.len())
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        prop_assert_eq!(received, payloads);
        prop_assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());

        sub.unsubscribe().unwrap();
    }
}
