//! Routing between queues and topics.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use super::helpers::{
    HEADER_KEY, SteppingClock, Ticks, broker, header_limit_verifier, observer, produce,
    routing_endpoint,
};
use chrono::TimeDelta;
use message_link::endpoint::{
    adapters::{RecordingObserver, memory::InMemoryBroker},
    domain::{
        ChannelSpec, DeliveryMode, Message, Priority, SendOptions, TransformationError,
        VerificationError,
    },
    ports::MessageTransformer,
};
use rstest::rstest;

#[rstest]
fn transfers_from_input_queue_to_output_queue(broker: InMemoryBroker, observer: RecordingObserver) {
    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::queue("OutputQueue");
    let mut link = routing_endpoint(&observer, "QueueLink", source.clone(), destination.clone());
    link.start(broker.create_session())
        .expect("endpoint should start");

    let sent = produce(&broker, &source, 5);
    let collector = broker.collect(&destination).expect("collector");

    let received = collector.messages();
    assert_eq!(received.len(), 5);
    let bodies: Vec<&str> = received
        .iter()
        .filter_map(|message| message.expect_text().ok())
        .collect();
    let expected: Vec<&str> = sent
        .iter()
        .filter_map(|message| message.expect_text().ok())
        .collect();
    assert_eq!(bodies, expected);
    assert_eq!(broker.queue_depth(&source), 0);
}

#[rstest]
fn transfers_from_topic_to_queue(broker: InMemoryBroker, observer: RecordingObserver) {
    let source = ChannelSpec::topic("InputTopic");
    let destination = ChannelSpec::queue("OutputQueue");
    let mut link = routing_endpoint(&observer, "TopicLink", source.clone(), destination.clone());
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &source, 5);

    assert_eq!(broker.queue_depth(&destination), 5);
}

#[rstest]
fn transfers_from_queue_to_topic(broker: InMemoryBroker, observer: RecordingObserver) {
    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::topic("OutputTopic");
    let collector = broker.collect(&destination).expect("collector");
    let mut link = routing_endpoint(&observer, "FanOutLink", source.clone(), destination);
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &source, 5);

    assert_eq!(collector.len(), 5);
}

#[rstest]
fn selector_limits_what_the_endpoint_consumes(broker: InMemoryBroker, observer: RecordingObserver) {
    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::queue("OutputQueue");
    let mut link = routing_endpoint(&observer, "SelectiveLink", source.clone(), destination.clone());
    link.set_selector(Some(format!("{HEADER_KEY} <= 2")))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &source, 5);

    assert_eq!(broker.queue_depth(&destination), 3);
    assert_eq!(broker.queue_depth(&source), 2);
}

#[rstest]
fn queued_messages_are_drained_when_the_endpoint_starts(
    broker: InMemoryBroker,
    observer: RecordingObserver,
) {
    let source = ChannelSpec::queue("Backlog");
    let destination = ChannelSpec::queue("Drained");
    produce(&broker, &source, 3);

    let mut link = routing_endpoint(&observer, "BacklogLink", source.clone(), destination.clone());
    link.start(broker.create_session())
        .expect("endpoint should start");

    assert_eq!(broker.queue_depth(&source), 0);
    assert_eq!(broker.queue_depth(&destination), 3);
}

#[rstest]
fn stages_run_input_then_transform_then_output(broker: InMemoryBroker, observer: RecordingObserver) {
    let ticks = Arc::new(Ticks::default());
    let input_tick = Arc::new(AtomicU64::new(0));
    let transform_tick = Arc::new(AtomicU64::new(0));
    let output_tick = Arc::new(AtomicU64::new(0));

    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::queue("OutputQueue");
    let mut link = routing_endpoint(&observer, "TimedLink", source.clone(), destination.clone());

    let (clock, slot) = (Arc::clone(&ticks), Arc::clone(&input_tick));
    link.set_input_verifier(Some(Arc::new(move |_: &Message| -> Result<(), VerificationError> {
        slot.store(clock.next(), Ordering::SeqCst);
        Ok(())
    })))
    .expect("endpoint should be editable");

    let (clock, slot) = (Arc::clone(&ticks), Arc::clone(&transform_tick));
    let transformer: Arc<dyn MessageTransformer> = Arc::new(
        move |message: &Message| -> Result<Option<Message>, TransformationError> {
            slot.store(clock.next(), Ordering::SeqCst);
            Ok(Some(message.clone()))
        },
    );
    link.set_transformer(Some(transformer))
        .expect("endpoint should be editable");

    let (clock, slot) = (Arc::clone(&ticks), Arc::clone(&output_tick));
    link.set_output_verifier(Some(Arc::new(move |_: &Message| -> Result<(), VerificationError> {
        slot.store(clock.next(), Ordering::SeqCst);
        Ok(())
    })))
    .expect("endpoint should be editable");

    link.start(broker.create_session())
        .expect("endpoint should start");
    produce(&broker, &source, 1);

    let input = input_tick.load(Ordering::SeqCst);
    let transform = transform_tick.load(Ordering::SeqCst);
    let output = output_tick.load(Ordering::SeqCst);
    assert!(input > 0);
    assert!(input < transform);
    assert!(transform < output);
    assert_eq!(broker.queue_depth(&destination), 1);
}

#[rstest]
fn generated_messages_use_inbound_delivery_options(
    broker: InMemoryBroker,
    observer: RecordingObserver,
) {
    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::queue("OutputQueue");
    let mut link = routing_endpoint(&observer, "OptionsLink", source.clone(), destination.clone());
    let transformer: Arc<dyn MessageTransformer> = Arc::new(
        |message: &Message| -> Result<Option<Message>, TransformationError> {
            let mut generated = Message::text(message.expect_text()?.to_uppercase());
            generated.copy_headers_from(message);
            Ok(Some(generated))
        },
    );
    link.set_transformer(Some(transformer))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    let options = SendOptions {
        delivery_mode: DeliveryMode::NonPersistent,
        priority: Priority::new(7),
        expiration: None,
    };
    let inbound = Message::text("urgent order")
        .with_correlation_id("order-17")
        .with_property(HEADER_KEY, 1)
        .with_send_options(options);
    broker.publish(&source, &inbound).expect("publish");

    let delivered = broker.collect(&destination).expect("collector").messages();
    let Some(generated) = delivered.first() else {
        panic!("expected a generated message");
    };
    assert_eq!(generated.expect_text().ok(), Some("URGENT ORDER"));
    assert_eq!(generated.headers().correlation_id.as_deref(), Some("order-17"));
    assert_eq!(generated.int_property(HEADER_KEY), Some(1));
    assert_eq!(SendOptions::from_message(generated), options);
    assert_eq!(generated.headers().destination.as_ref(), Some(&destination));
}

#[rstest]
fn expired_messages_are_not_routed(observer: RecordingObserver) {
    let clock = Arc::new(SteppingClock::new());
    let broker = InMemoryBroker::with_clock(clock.clone());
    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::queue("OutputQueue");

    let short_lived = Message::text("stale").with_send_options(SendOptions {
        expiration: Some(Duration::from_secs(1)),
        ..SendOptions::default()
    });
    broker.publish(&source, &short_lived).expect("publish");
    produce(&broker, &source, 1);
    clock.advance(TimeDelta::seconds(2));

    let mut link = routing_endpoint(&observer, "ExpiryLink", source, destination.clone());
    link.start(broker.create_session())
        .expect("endpoint should start");

    let delivered = broker.collect(&destination).expect("collector").messages();
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered.first().and_then(|message| message.expect_text().ok()),
        Some("Message 0")
    );
}

#[rstest]
fn verifier_rejection_does_not_stop_the_endpoint(
    broker: InMemoryBroker,
    observer: RecordingObserver,
) {
    let source = ChannelSpec::queue("InputQueue");
    let destination = ChannelSpec::queue("OutputQueue");
    let mut link = routing_endpoint(&observer, "SteadyLink", source.clone(), destination.clone());
    link.set_input_verifier(Some(header_limit_verifier(1)))
        .and_then(|endpoint| endpoint.set_dead_letter_channel(Some("SteadyDLQ".to_owned())))
        .expect("endpoint should be editable");
    link.start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &source, 4);

    assert!(link.is_active());
    assert_eq!(broker.queue_depth(&destination), 2);
    assert_eq!(broker.queue_depth(&ChannelSpec::queue("SteadyDLQ")), 2);
}
