//! Durable topic subscriptions across endpoint restarts.

use super::helpers::{broker, observer, produce, routing_endpoint};
use message_link::endpoint::{
    adapters::{RecordingObserver, memory::InMemoryBroker},
    domain::ChannelSpec,
    ports::{BrokerError, BrokerSession},
    services::RoutingEndpoint,
};
use rstest::rstest;

const SUBSCRIPTION: &str = "audit-link";

fn durable_link(observer: &RecordingObserver) -> RoutingEndpoint {
    let mut link = routing_endpoint(
        observer,
        "AuditLink",
        ChannelSpec::topic("Audit"),
        ChannelSpec::queue("AuditArchive"),
    );
    link.set_subscription_name(Some(SUBSCRIPTION.to_owned()))
        .expect("endpoint should be editable");
    link
}

#[rstest]
fn messages_published_while_stopped_are_delivered_on_restart(
    broker: InMemoryBroker,
    observer: RecordingObserver,
) {
    let topic = ChannelSpec::topic("Audit");
    let archive = ChannelSpec::queue("AuditArchive");
    let mut link = durable_link(&observer);

    link.start(broker.create_session())
        .expect("endpoint should start");
    produce(&broker, &topic, 2);
    link.stop();

    produce(&broker, &topic, 3);
    assert_eq!(broker.subscription_depth(SUBSCRIPTION), Some(3));
    assert_eq!(broker.queue_depth(&archive), 2);

    link.start(broker.create_session())
        .expect("endpoint should restart");

    assert_eq!(broker.queue_depth(&archive), 5);
    assert_eq!(broker.subscription_depth(SUBSCRIPTION), Some(0));
}

#[rstest]
fn unsubscribing_twice_fails(broker: InMemoryBroker, observer: RecordingObserver) {
    let mut link = durable_link(&observer);
    link.start(broker.create_session())
        .expect("endpoint should start");
    link.stop();

    let session = broker.create_session();
    session
        .unsubscribe(SUBSCRIPTION)
        .expect("first unsubscribe should succeed");
    assert!(!broker.has_subscription(SUBSCRIPTION));

    let second = session.unsubscribe(SUBSCRIPTION);
    assert!(matches!(second, Err(BrokerError::UnknownSubscription(name)) if name == SUBSCRIPTION));
}

#[rstest]
fn active_subscription_cannot_be_removed(broker: InMemoryBroker, observer: RecordingObserver) {
    let mut link = durable_link(&observer);
    link.start(broker.create_session())
        .expect("endpoint should start");

    let result = broker.create_session().unsubscribe(SUBSCRIPTION);

    assert!(matches!(result, Err(BrokerError::SubscriptionInUse(_))));
}

#[rstest]
fn second_endpoint_on_same_subscription_fails_to_start(
    broker: InMemoryBroker,
    observer: RecordingObserver,
) {
    let mut first = durable_link(&observer);
    first
        .start(broker.create_session())
        .expect("first endpoint should start");

    let mut second = durable_link(&observer);
    let result = second.start(broker.create_session());

    assert!(result.is_err());
    assert!(first.is_active());
    assert!(!second.is_active());
}
