//! Dead-letter routing of failed messages.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::helpers::{HEADER_KEY, broker, header_limit_verifier, observer, produce, routing_endpoint};
use message_link::endpoint::{
    adapters::{RecordingObserver, memory::InMemoryBroker},
    domain::{
        ChannelSpec, DESTINATION_CHANNEL_PROPERTY, ENDPOINT_NAME_PROPERTY, FAILURE_REASON_PROPERTY,
        Message, ORIGINAL_MESSAGE_KIND_PROPERTY, Priority, SOURCE_CHANNEL_PROPERTY,
        SOURCE_SUBSCRIPTION_PROPERTY, SendOptions,
    },
    ports::EventLevel,
    services::RoutingEndpoint,
};
use rstest::{fixture, rstest};

const DEAD_LETTER_QUEUE: &str = "DLQ";

struct Channels {
    source: ChannelSpec,
    destination: ChannelSpec,
    dead_letters: ChannelSpec,
}

#[fixture]
fn channels() -> Channels {
    Channels {
        source: ChannelSpec::queue("InputQueue"),
        destination: ChannelSpec::queue("OutputQueue"),
        dead_letters: ChannelSpec::queue(DEAD_LETTER_QUEUE),
    }
}

fn link_with_dead_letters(observer: &RecordingObserver, channels: &Channels) -> RoutingEndpoint {
    let mut link = routing_endpoint(
        observer,
        "VerifiedLink",
        channels.source.clone(),
        channels.destination.clone(),
    );
    link.set_dead_letter_channel(Some(DEAD_LETTER_QUEUE.to_owned()))
        .expect("endpoint should be editable");
    link
}

#[rstest]
fn input_verifier_sends_failures_to_dead_letter_queue(
    broker: InMemoryBroker,
    observer: RecordingObserver,
    channels: Channels,
) {
    let mut link = link_with_dead_letters(&observer, &channels);
    link.set_input_verifier(Some(header_limit_verifier(3)))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &channels.source, 5);

    assert_eq!(broker.queue_depth(&channels.destination), 4);
    let dead = broker.collect(&channels.dead_letters).expect("collector").messages();
    assert_eq!(dead.len(), 1);
    let Some(envelope) = dead.first() else {
        panic!("expected one dead-lettered message");
    };
    assert_eq!(envelope.int_property(HEADER_KEY), Some(4));
    assert_eq!(envelope.expect_text().ok(), Some("Message 4"));
    assert_eq!(envelope.string_property(ENDPOINT_NAME_PROPERTY), Some("VerifiedLink"));
    assert_eq!(
        envelope.string_property(SOURCE_CHANNEL_PROPERTY),
        Some("queue://InputQueue")
    );
    assert_eq!(
        envelope.string_property(DESTINATION_CHANNEL_PROPERTY),
        Some("queue://OutputQueue")
    );
    assert_eq!(envelope.string_property(ORIGINAL_MESSAGE_KIND_PROPERTY), Some("Text"));
    assert_eq!(envelope.string_property(SOURCE_SUBSCRIPTION_PROPERTY), None);
    let reason = envelope
        .string_property(FAILURE_REASON_PROPERTY)
        .unwrap_or_default();
    assert!(reason.starts_with("Incoming message failed precondition check. Error: Message with ID = "));
    assert!(reason.ends_with("HEADER_KEY 4 exceeds limit 3"));
    assert!(observer.contains(EventLevel::Info, "exceeds limit 3"));
}

#[rstest]
fn missing_dead_letter_queue_escalates_to_the_broker(
    broker: InMemoryBroker,
    observer: RecordingObserver,
    channels: Channels,
) {
    let escalations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&escalations);
    broker.set_error_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let mut link = routing_endpoint(
        &observer,
        "UnguardedLink",
        channels.source.clone(),
        channels.destination.clone(),
    );
    link.set_input_verifier(Some(header_limit_verifier(3)))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &channels.source, 5);

    assert_eq!(broker.queue_depth(&channels.destination), 4);
    assert_eq!(escalations.load(Ordering::SeqCst), 1);
    let failures = broker.listener_failures();
    assert_eq!(failures.len(), 1);
    assert!(
        failures
            .first()
            .is_some_and(|failure| failure.contains("UnguardedLink") && failure.contains("no dead-letter channel"))
    );
    assert!(link.is_active());
}

#[rstest]
fn output_verifier_failures_are_dead_lettered(
    broker: InMemoryBroker,
    observer: RecordingObserver,
    channels: Channels,
) {
    let mut link = link_with_dead_letters(&observer, &channels);
    link.set_output_verifier(Some(header_limit_verifier(2)))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &channels.source, 5);

    let dead = broker.collect(&channels.dead_letters).expect("collector").messages();
    let keys: Vec<i64> = dead
        .iter()
        .filter_map(|message| message.int_property(HEADER_KEY))
        .collect();
    assert_eq!(keys, vec![3, 4]);
    assert!(dead.iter().all(|message| {
        message
            .string_property(FAILURE_REASON_PROPERTY)
            .is_some_and(|reason| reason.starts_with("Generated message failed send precondition check"))
    }));
    assert_eq!(broker.queue_depth(&channels.destination), 5);
}

#[rstest]
fn output_verifier_without_dead_letter_queue_blocks_the_send(
    broker: InMemoryBroker,
    observer: RecordingObserver,
    channels: Channels,
) {
    let mut link = routing_endpoint(
        &observer,
        "UnguardedLink",
        channels.source.clone(),
        channels.destination.clone(),
    );
    link.set_output_verifier(Some(header_limit_verifier(3)))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &channels.source, 5);

    assert_eq!(broker.queue_depth(&channels.destination), 4);
    assert_eq!(broker.listener_failures().len(), 1);
}

#[rstest]
fn dead_letters_keep_the_original_delivery_options(
    broker: InMemoryBroker,
    observer: RecordingObserver,
    channels: Channels,
) {
    let mut link = link_with_dead_letters(&observer, &channels);
    link.set_input_verifier(Some(header_limit_verifier(0)))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    let options = SendOptions {
        priority: Priority::new(9),
        ..SendOptions::default()
    };
    let rejected = Message::bytes(vec![1, 2, 3])
        .with_property(HEADER_KEY, 5)
        .with_send_options(options);
    broker.publish(&channels.source, &rejected).expect("publish");

    let dead = broker.collect(&channels.dead_letters).expect("collector").messages();
    let Some(envelope) = dead.first() else {
        panic!("expected one dead-lettered message");
    };
    assert_eq!(SendOptions::from_message(envelope), options);
    assert_eq!(envelope.expect_bytes().ok(), Some([1_u8, 2, 3].as_slice()));
    assert_eq!(envelope.string_property(ORIGINAL_MESSAGE_KIND_PROPERTY), Some("Bytes"));
}

#[rstest]
fn durable_source_is_recorded_on_dead_letters(broker: InMemoryBroker, observer: RecordingObserver) {
    let source = ChannelSpec::topic("Events");
    let mut link = routing_endpoint(&observer, "DurableLink", source.clone(), ChannelSpec::queue("Out"));
    link.set_subscription_name(Some("durable-link".to_owned()))
        .and_then(|endpoint| endpoint.set_dead_letter_channel(Some(DEAD_LETTER_QUEUE.to_owned())))
        .and_then(|endpoint| endpoint.set_input_verifier(Some(header_limit_verifier(-1))))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &source, 1);

    let dead = broker
        .collect(&ChannelSpec::queue(DEAD_LETTER_QUEUE))
        .expect("collector")
        .messages();
    let Some(envelope) = dead.first() else {
        panic!("expected one dead-lettered message");
    };
    assert_eq!(
        envelope.string_property(SOURCE_SUBSCRIPTION_PROPERTY),
        Some("durable-link")
    );
    assert_eq!(envelope.string_property(SOURCE_CHANNEL_PROPERTY), Some("topic://Events"));
}

#[rstest]
fn stopped_endpoint_leaves_messages_queued(
    broker: InMemoryBroker,
    observer: RecordingObserver,
    channels: Channels,
) {
    let mut link = link_with_dead_letters(&observer, &channels);
    link.set_input_verifier(Some(header_limit_verifier(0)))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");
    link.stop();

    produce(&broker, &channels.source, 2);

    assert!(broker.listener_failures().is_empty());
    assert_eq!(broker.queue_depth(&channels.source), 2);
}
