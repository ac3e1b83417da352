//! Pass-through endpoints handing messages to application handlers.

use std::sync::{Arc, Mutex, PoisonError};

use super::helpers::{HEADER_KEY, broker, header_limit_verifier, observer, produce};
use message_link::endpoint::{
    adapters::{RecordingObserver, memory::InMemoryBroker},
    domain::{
        ChannelSpec, DESTINATION_CHANNEL_PROPERTY, FAILURE_REASON_PROPERTY, HandlerError, Message,
        SendOptions,
    },
    ports::{BrokerSession, MessageHandler},
    services::PassThroughEndpoint,
};
use rstest::rstest;

/// Replies to every message on its reply-to channel and remembers the keys.
#[derive(Default)]
struct ReplyingHandler {
    seen: Mutex<Vec<i64>>,
}

impl MessageHandler for ReplyingHandler {
    fn handle(&self, session: &dyn BrokerSession, message: &Message) -> Result<(), HandlerError> {
        let key = message
            .int_property(HEADER_KEY)
            .ok_or_else(|| HandlerError::new("missing HEADER_KEY"))?;
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);

        let Some(reply_to) = &message.headers().reply_to else {
            return Ok(());
        };
        let destination = session
            .resolve_destination(reply_to)
            .map_err(|err| HandlerError::new(err.to_string()))?;
        let producer = session
            .create_producer(&destination)
            .map_err(|err| HandlerError::new(err.to_string()))?;
        let reply = Message::text(format!("ack {key}")).with_correlation_id(message.id().to_string());
        let sent = producer
            .send(&reply, SendOptions::default())
            .map_err(|err| HandlerError::new(err.to_string()));
        producer
            .close()
            .map_err(|err| HandlerError::new(err.to_string()))?;
        sent
    }
}

fn pass_through(
    observer: &RecordingObserver,
    handler: Arc<dyn MessageHandler>,
) -> PassThroughEndpoint {
    let mut endpoint = PassThroughEndpoint::pass_through(handler, Arc::new(observer.clone()));
    endpoint
        .set_name("Worker")
        .and_then(|link| link.set_source(ChannelSpec::queue("Work")))
        .and_then(|link| link.set_dead_letter_channel(Some("WorkDLQ".to_owned())))
        .expect("endpoint should be editable");
    endpoint
}

#[rstest]
fn verified_messages_reach_the_handler(broker: InMemoryBroker, observer: RecordingObserver) {
    let handler = Arc::new(ReplyingHandler::default());
    let mut endpoint = pass_through(&observer, handler.clone());
    endpoint
        .set_input_verifier(Some(header_limit_verifier(2)))
        .expect("endpoint should be editable");
    endpoint
        .start(broker.create_session())
        .expect("endpoint should start");

    produce(&broker, &ChannelSpec::queue("Work"), 4);

    let seen = handler
        .seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(broker.queue_depth(&ChannelSpec::queue("WorkDLQ")), 1);
}

#[rstest]
fn handler_can_reply_through_the_session(broker: InMemoryBroker, observer: RecordingObserver) {
    let mut endpoint = pass_through(&observer, Arc::new(ReplyingHandler::default()));
    endpoint
        .start(broker.create_session())
        .expect("endpoint should start");

    let replies = ChannelSpec::queue("Replies");
    let mut request = Message::text("ping").with_property(HEADER_KEY, 9);
    request.headers_mut().reply_to = Some(replies.clone());
    broker
        .publish(&ChannelSpec::queue("Work"), &request)
        .expect("publish");

    let received = broker.collect(&replies).expect("collector").messages();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received.first().and_then(|reply| reply.expect_text().ok()),
        Some("ack 9")
    );
}

#[rstest]
fn handler_errors_are_dead_lettered(broker: InMemoryBroker, observer: RecordingObserver) {
    let mut endpoint = pass_through(&observer, Arc::new(ReplyingHandler::default()));
    endpoint
        .start(broker.create_session())
        .expect("endpoint should start");

    broker
        .publish(&ChannelSpec::queue("Work"), &Message::text("no key"))
        .expect("publish");

    let dead = broker
        .collect(&ChannelSpec::queue("WorkDLQ"))
        .expect("collector")
        .messages();
    let Some(envelope) = dead.first() else {
        panic!("expected a dead-lettered message");
    };
    assert_eq!(
        envelope.string_property(FAILURE_REASON_PROPERTY),
        Some("Error handling message. Error: missing HEADER_KEY")
    );
    assert_eq!(envelope.string_property(DESTINATION_CHANNEL_PROPERTY), None);
}
