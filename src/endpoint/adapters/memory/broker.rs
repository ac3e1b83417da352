//! Broker state, sessions, consumers and producers.

use super::{MessageCollector, Selector};
use crate::endpoint::{
    domain::{ChannelKind, ChannelSpec, Message, SendOptions},
    ports::{
        BrokerError, BrokerResult, BrokerSession, Destination, ListenerError, MessageConsumer,
        MessageListener, MessageProducer,
    },
};
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Session identifier owning consumers created by the broker itself.
const BROKER_OWNED: u64 = 0;

type ErrorListener = Arc<dyn Fn(&ListenerError) + Send + Sync>;
type Dispatch = Vec<(Arc<dyn MessageListener>, Message)>;

/// Broker operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerOperation {
    /// [`BrokerSession::resolve_destination`].
    ResolveDestination,
    /// [`BrokerSession::create_consumer`].
    CreateConsumer,
    /// [`BrokerSession::create_durable_consumer`].
    CreateDurableConsumer,
    /// [`BrokerSession::create_producer`].
    CreateProducer,
    /// [`BrokerSession::unsubscribe`].
    Unsubscribe,
    /// [`BrokerSession::close`].
    CloseSession,
    /// [`MessageConsumer::set_listener`].
    SetListener,
    /// [`MessageConsumer::close`].
    CloseConsumer,
    /// [`MessageProducer::send`].
    Send,
    /// [`MessageProducer::close`].
    CloseProducer,
}

impl BrokerOperation {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolveDestination => "resolve_destination",
            Self::CreateConsumer => "create_consumer",
            Self::CreateDurableConsumer => "create_durable_consumer",
            Self::CreateProducer => "create_producer",
            Self::Unsubscribe => "unsubscribe",
            Self::CloseSession => "close_session",
            Self::SetListener => "set_listener",
            Self::CloseConsumer => "close_consumer",
            Self::Send => "send",
            Self::CloseProducer => "close_producer",
        }
    }
}

impl fmt::Display for BrokerOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Counts of broker resources opened through sessions and not yet closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenResources {
    /// Open sessions.
    pub sessions: usize,
    /// Open consumers.
    pub consumers: usize,
    /// Open producers.
    pub producers: usize,
}

impl OpenResources {
    /// Returns `true` when nothing is open.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sessions == 0 && self.consumers == 0 && self.producers == 0
    }
}

struct ConsumerEntry {
    session: u64,
    channel: ChannelSpec,
    selector: Option<Selector>,
    subscription: Option<String>,
    listener: Option<Arc<dyn MessageListener>>,
    inbox: VecDeque<Message>,
}

impl ConsumerEntry {
    fn accepts(&self, message: &Message) -> bool {
        self.selector
            .as_ref()
            .is_none_or(|selector| selector.matches(message))
    }
}

struct DurableSubscription {
    topic: String,
    selector: Option<Selector>,
    consumer: Option<u64>,
    pending: VecDeque<Message>,
}

impl DurableSubscription {
    fn accepts(&self, message: &Message) -> bool {
        self.selector
            .as_ref()
            .is_none_or(|selector| selector.matches(message))
    }
}

#[derive(Default)]
struct BrokerState {
    next_id: u64,
    sessions: BTreeSet<u64>,
    producers: BTreeMap<u64, u64>,
    consumers: BTreeMap<u64, ConsumerEntry>,
    subscriptions: BTreeMap<String, DurableSubscription>,
    queues: HashMap<String, VecDeque<Message>>,
    cursors: HashMap<String, u64>,
    faults: Vec<BrokerOperation>,
    failing_channels: HashSet<ChannelSpec>,
    listener_failures: Vec<String>,
    error_listener: Option<ErrorListener>,
}

impl BrokerState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.saturating_add(1);
        self.next_id
    }

    fn take_fault(&mut self, operation: BrokerOperation) -> BrokerResult<()> {
        let Some(position) = self.faults.iter().position(|armed| *armed == operation) else {
            return Ok(());
        };
        self.faults.remove(position);
        Err(BrokerError::transport(io::Error::other(format!(
            "injected {operation} failure"
        ))))
    }

    fn ensure_session(&self, session: u64) -> BrokerResult<()> {
        if self.sessions.contains(&session) {
            Ok(())
        } else {
            Err(BrokerError::Closed("session"))
        }
    }

    fn route(&mut self, channel: &ChannelSpec, message: Message, now: DateTime<Utc>) -> Dispatch {
        if message.is_expired_at(now) {
            return Vec::new();
        }
        match channel.kind() {
            ChannelKind::Queue => self.route_to_queue(channel, message).into_iter().collect(),
            ChannelKind::Topic => self.route_to_topic(channel, &message),
        }
    }

    fn route_to_queue(
        &mut self,
        channel: &ChannelSpec,
        message: Message,
    ) -> Option<(Arc<dyn MessageListener>, Message)> {
        let ready: Vec<(u64, Arc<dyn MessageListener>)> = self
            .consumers
            .iter()
            .filter(|(_, entry)| entry.channel == *channel && entry.accepts(&message))
            .filter_map(|(id, entry)| entry.listener.clone().map(|listener| (*id, listener)))
            .collect();

        let last = self.cursors.get(channel.name()).copied().unwrap_or(0);
        let chosen = ready
            .iter()
            .find(|(id, _)| *id > last)
            .or_else(|| ready.first())
            .cloned();

        let Some((id, listener)) = chosen else {
            self.queues
                .entry(channel.name().to_owned())
                .or_default()
                .push_back(message);
            return None;
        };
        self.cursors.insert(channel.name().to_owned(), id);
        Some((listener, message))
    }

    fn route_to_topic(&mut self, channel: &ChannelSpec, message: &Message) -> Dispatch {
        let mut dispatch = Dispatch::new();

        for entry in self.consumers.values_mut() {
            if entry.subscription.is_some() || entry.channel != *channel || !entry.accepts(message) {
                continue;
            }
            match &entry.listener {
                Some(listener) => dispatch.push((Arc::clone(listener), message.clone())),
                None => entry.inbox.push_back(message.clone()),
            }
        }

        for subscription in self.subscriptions.values_mut() {
            if subscription.topic != channel.name() || !subscription.accepts(message) {
                continue;
            }
            let listener = subscription
                .consumer
                .and_then(|id| self.consumers.get(&id))
                .and_then(|entry| entry.listener.clone());
            match listener {
                Some(active) => dispatch.push((active, message.clone())),
                None => subscription.pending.push_back(message.clone()),
            }
        }

        dispatch
    }

    fn attach(
        &mut self,
        consumer: u64,
        listener: Arc<dyn MessageListener>,
        now: DateTime<Utc>,
    ) -> BrokerResult<Dispatch> {
        let entry = self
            .consumers
            .get_mut(&consumer)
            .ok_or(BrokerError::Closed("consumer"))?;
        entry.listener = Some(Arc::clone(&listener));

        let backlog: VecDeque<Message> = if let Some(name) = &entry.subscription {
            self.subscriptions
                .get_mut(name)
                .map(|subscription| std::mem::take(&mut subscription.pending))
                .unwrap_or_default()
        } else if entry.channel.is_topic() {
            std::mem::take(&mut entry.inbox)
        } else {
            let queued = self
                .queues
                .get_mut(entry.channel.name())
                .map(std::mem::take)
                .unwrap_or_default();
            let (matching, rest): (VecDeque<Message>, VecDeque<Message>) =
                queued.into_iter().partition(|message| entry.accepts(message));
            if !rest.is_empty() {
                self.queues.insert(entry.channel.name().to_owned(), rest);
            }
            matching
        };

        Ok(backlog
            .into_iter()
            .filter(|message| !message.is_expired_at(now))
            .map(|message| (Arc::clone(&listener), message))
            .collect())
    }

    fn detach(&mut self, consumer: u64) {
        let Some(entry) = self.consumers.remove(&consumer) else {
            return;
        };
        if let Some(subscription) = entry
            .subscription
            .and_then(|name| self.subscriptions.get_mut(&name))
        {
            subscription.consumer = None;
        }
    }

    fn open_consumer(
        &mut self,
        session: u64,
        channel: ChannelSpec,
        selector: Option<Selector>,
        subscription: Option<String>,
    ) -> u64 {
        let id = self.allocate_id();
        self.consumers.insert(
            id,
            ConsumerEntry {
                session,
                channel,
                selector,
                subscription,
                listener: None,
                inbox: VecDeque::new(),
            },
        );
        id
    }
}

struct Shared {
    state: Mutex<BrokerState>,
    clock: Arc<dyn Clock + Send + Sync>,
}

/// A process-local message broker.
///
/// Queues deliver each message to one consumer, rotating between consumers
/// that have a listener; messages nobody can take stay queued until a
/// matching listener attaches. Topics deliver to every subscriber, and
/// durable subscriptions retain messages while no consumer is attached.
/// Delivery happens inline on the sending thread, after the broker's
/// internal lock is released, so listeners may send in turn.
///
/// # Examples
///
/// ```
/// use message_link::endpoint::adapters::memory::InMemoryBroker;
/// use message_link::endpoint::domain::{ChannelSpec, Message};
///
/// let broker = InMemoryBroker::new();
/// let orders = ChannelSpec::queue("orders");
/// broker.publish(&orders, &Message::text("one")).expect("publish");
/// assert_eq!(broker.queue_depth(&orders), 1);
///
/// let collector = broker.collect(&orders).expect("collector");
/// assert_eq!(collector.len(), 1);
/// assert_eq!(broker.queue_depth(&orders), 0);
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates a broker using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }

    /// Creates a broker stamping and expiring messages with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BrokerState::default()),
                clock,
            }),
        }
    }

    /// Opens a session.
    #[must_use]
    pub fn create_session(&self) -> Arc<InMemorySession> {
        let mut state = self.state();
        let id = state.allocate_id();
        state.sessions.insert(id);
        Arc::new(InMemorySession {
            broker: self.clone(),
            id,
        })
    }

    /// Sends `message` to `channel` using the delivery options recorded on
    /// the message.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] for injected send failures or a poisoned
    /// broker lock.
    pub fn publish(&self, channel: &ChannelSpec, message: &Message) -> BrokerResult<()> {
        self.send_to(channel, message, SendOptions::from_message(message))
    }

    /// Attaches a recording consumer to `channel`.
    ///
    /// Queued messages are drained into the collector immediately. Topic
    /// collectors only see messages published after they attach.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] for a poisoned broker lock.
    pub fn collect(&self, channel: &ChannelSpec) -> BrokerResult<Arc<MessageCollector>> {
        let collector = Arc::new(MessageCollector::new());
        let dispatch = {
            let mut state = self.lock()?;
            let id = state.open_consumer(BROKER_OWNED, channel.clone(), None, None);
            state.attach(id, Arc::clone(&collector) as Arc<dyn MessageListener>, self.now())?
        };
        self.deliver(dispatch);
        Ok(collector)
    }

    /// Returns the number of messages waiting in a queue.
    #[must_use]
    pub fn queue_depth(&self, channel: &ChannelSpec) -> usize {
        self.state().queues.get(channel.name()).map_or(0, VecDeque::len)
    }

    /// Returns the number of messages retained for a durable subscription.
    #[must_use]
    pub fn subscription_depth(&self, subscription_name: &str) -> Option<usize> {
        self.state()
            .subscriptions
            .get(subscription_name)
            .map(|subscription| subscription.pending.len())
    }

    /// Returns `true` when a durable subscription with this name exists.
    #[must_use]
    pub fn has_subscription(&self, subscription_name: &str) -> bool {
        self.state().subscriptions.contains_key(subscription_name)
    }

    /// Returns the resources opened through sessions that are still open.
    #[must_use]
    pub fn open_resources(&self) -> OpenResources {
        let state = self.state();
        OpenResources {
            sessions: state.sessions.len(),
            consumers: state
                .consumers
                .values()
                .filter(|entry| entry.session != BROKER_OWNED)
                .count(),
            producers: state.producers.len(),
        }
    }

    /// Makes the next call of `operation` fail with a transport error.
    ///
    /// Calling this repeatedly arms several failures.
    pub fn fail_next(&self, operation: BrokerOperation) {
        self.state().faults.push(operation);
    }

    /// Makes every send to `channel` fail with a transport error.
    pub fn fail_sends_to(&self, channel: ChannelSpec) {
        self.state().failing_channels.insert(channel);
    }

    /// Stops failing sends to `channel`.
    pub fn restore_sends_to(&self, channel: &ChannelSpec) {
        self.state().failing_channels.remove(channel);
    }

    /// Returns the rendered errors listeners reported back to the broker.
    #[must_use]
    pub fn listener_failures(&self) -> Vec<String> {
        self.state().listener_failures.clone()
    }

    /// Registers a callback invoked with every listener error.
    pub fn set_error_listener(&self, listener: impl Fn(&ListenerError) + Send + Sync + 'static) {
        self.state().error_listener = Some(Arc::new(listener));
    }

    fn now(&self) -> DateTime<Utc> {
        self.shared.clock.utc()
    }

    fn lock(&self) -> BrokerResult<MutexGuard<'_, BrokerState>> {
        self.shared.state.lock().map_err(|_| {
            BrokerError::transport(io::Error::other("in-memory broker state lock poisoned"))
        })
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn send_to(
        &self,
        channel: &ChannelSpec,
        message: &Message,
        options: SendOptions,
    ) -> BrokerResult<()> {
        let now = self.now();
        let mut stamped = message.clone();
        let headers = stamped.headers_mut();
        headers.delivery_mode = options.delivery_mode;
        headers.priority = options.priority;
        headers.expiration = options.expiration;
        headers.destination = Some(channel.clone());
        headers.timestamp = Some(now);

        let dispatch = {
            let mut state = self.lock()?;
            state.take_fault(BrokerOperation::Send)?;
            if state.failing_channels.contains(channel) {
                return Err(BrokerError::transport(io::Error::other(format!(
                    "delivery to {channel} refused"
                ))));
            }
            state.route(channel, stamped, now)
        };
        self.deliver(dispatch);
        Ok(())
    }

    fn deliver(&self, dispatch: Dispatch) {
        for (listener, message) in dispatch {
            let Err(err) = listener.on_message(&message) else {
                continue;
            };
            let callback = {
                let mut state = self.state();
                state.listener_failures.push(err.to_string());
                state.error_listener.clone()
            };
            if let Some(callback) = callback {
                callback(&err);
            }
        }
    }
}

/// A session on an [`InMemoryBroker`].
///
/// Closing the session closes every consumer and producer it created.
pub struct InMemorySession {
    broker: InMemoryBroker,
    id: u64,
}

impl InMemorySession {
    fn open_consumer(
        &self,
        operation: BrokerOperation,
        destination: &Destination,
        selector: Option<&str>,
        subscription_name: Option<&str>,
    ) -> BrokerResult<Box<dyn MessageConsumer>> {
        let parsed = selector.map(Selector::parse).transpose()?;
        let mut state = self.broker.lock()?;
        state.ensure_session(self.id)?;
        state.take_fault(operation)?;

        let channel = destination.channel().clone();
        if let Some(name) = subscription_name {
            if !channel.is_topic() {
                return Err(BrokerError::NotATopic(channel));
            }
            if state
                .subscriptions
                .get(name)
                .is_some_and(|existing| existing.consumer.is_some())
            {
                return Err(BrokerError::SubscriptionInUse(name.to_owned()));
            }
        }

        let id = state.open_consumer(
            self.id,
            channel.clone(),
            parsed.clone(),
            subscription_name.map(str::to_owned),
        );

        if let Some(name) = subscription_name {
            let subscription = state
                .subscriptions
                .entry(name.to_owned())
                .or_insert_with(|| DurableSubscription {
                    topic: channel.name().to_owned(),
                    selector: parsed.clone(),
                    consumer: None,
                    pending: VecDeque::new(),
                });
            if subscription.topic != channel.name() || subscription.selector != parsed {
                subscription.topic = channel.name().to_owned();
                subscription.selector = parsed;
                subscription.pending.clear();
            }
            subscription.consumer = Some(id);
        }

        Ok(Box::new(InMemoryConsumer {
            broker: self.broker.clone(),
            id,
        }))
    }
}

impl BrokerSession for InMemorySession {
    fn resolve_destination(&self, channel: &ChannelSpec) -> BrokerResult<Destination> {
        let mut state = self.broker.lock()?;
        state.ensure_session(self.id)?;
        state.take_fault(BrokerOperation::ResolveDestination)?;
        Ok(Destination::new(channel.clone()))
    }

    fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<&str>,
    ) -> BrokerResult<Box<dyn MessageConsumer>> {
        self.open_consumer(BrokerOperation::CreateConsumer, destination, selector, None)
    }

    fn create_durable_consumer(
        &self,
        destination: &Destination,
        subscription_name: &str,
        selector: Option<&str>,
    ) -> BrokerResult<Box<dyn MessageConsumer>> {
        self.open_consumer(
            BrokerOperation::CreateDurableConsumer,
            destination,
            selector,
            Some(subscription_name),
        )
    }

    fn create_producer(&self, destination: &Destination) -> BrokerResult<Box<dyn MessageProducer>> {
        let mut state = self.broker.lock()?;
        state.ensure_session(self.id)?;
        state.take_fault(BrokerOperation::CreateProducer)?;
        let id = state.allocate_id();
        state.producers.insert(id, self.id);
        Ok(Box::new(InMemoryProducer {
            broker: self.broker.clone(),
            id,
            channel: destination.channel().clone(),
        }))
    }

    fn unsubscribe(&self, subscription_name: &str) -> BrokerResult<()> {
        let mut state = self.broker.lock()?;
        state.ensure_session(self.id)?;
        state.take_fault(BrokerOperation::Unsubscribe)?;
        match state.subscriptions.get(subscription_name) {
            None => Err(BrokerError::UnknownSubscription(subscription_name.to_owned())),
            Some(subscription) if subscription.consumer.is_some() => {
                Err(BrokerError::SubscriptionInUse(subscription_name.to_owned()))
            }
            Some(_) => {
                state.subscriptions.remove(subscription_name);
                Ok(())
            }
        }
    }

    fn close(&self) -> BrokerResult<()> {
        let mut state = self.broker.lock()?;
        state.take_fault(BrokerOperation::CloseSession)?;
        if !state.sessions.remove(&self.id) {
            return Ok(());
        }
        let owned: Vec<u64> = state
            .consumers
            .iter()
            .filter(|(_, entry)| entry.session == self.id)
            .map(|(id, _)| *id)
            .collect();
        for consumer in owned {
            state.detach(consumer);
        }
        state.producers.retain(|_, session| *session != self.id);
        Ok(())
    }
}

struct InMemoryConsumer {
    broker: InMemoryBroker,
    id: u64,
}

impl MessageConsumer for InMemoryConsumer {
    fn set_listener(&self, listener: Arc<dyn MessageListener>) -> BrokerResult<()> {
        let now = self.broker.now();
        let dispatch = {
            let mut state = self.broker.lock()?;
            state.take_fault(BrokerOperation::SetListener)?;
            state.attach(self.id, listener, now)?
        };
        self.broker.deliver(dispatch);
        Ok(())
    }

    fn close(&self) -> BrokerResult<()> {
        let mut state = self.broker.lock()?;
        state.take_fault(BrokerOperation::CloseConsumer)?;
        state.detach(self.id);
        Ok(())
    }
}

struct InMemoryProducer {
    broker: InMemoryBroker,
    id: u64,
    channel: ChannelSpec,
}

impl MessageProducer for InMemoryProducer {
    fn send(&self, message: &Message, options: SendOptions) -> BrokerResult<()> {
        if !self.broker.lock()?.producers.contains_key(&self.id) {
            return Err(BrokerError::Closed("producer"));
        }
        self.broker.send_to(&self.channel, message, options)
    }

    fn close(&self) -> BrokerResult<()> {
        let mut state = self.broker.lock()?;
        state.take_fault(BrokerOperation::CloseProducer)?;
        state.producers.remove(&self.id);
        Ok(())
    }
}
