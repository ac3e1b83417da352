//! Endpoint lifecycle: configuration, start-up, and shutdown.

use super::{DeadLetterRouter, Delivery, EndpointResult, EndpointSettings, MessagePipeline};
use crate::endpoint::{
    domain::{
        ChannelSpec, ConfigurationError, DeadLetterEnvelope, EndpointDefinition, EndpointState,
        LifecycleCell, Message,
    },
    ports::{
        BrokerError, BrokerResult, BrokerSession, EndpointEvent, EndpointObserver, EventLevel,
        MessageConsumer, MessageProducer, MessageVerifier,
    },
};
use std::sync::Arc;

/// A broker resource that failed to close during shutdown.
pub type CleanupFailure = (&'static str, BrokerError);

/// Variant-specific behaviour plugged into [`Endpoint`].
///
/// The endpoint owns the source side (session, consumer, dead-letter
/// producer, input verification). A kind supplies its own outbound
/// resources and the handling step that follows input verification.
pub trait EndpointKind: Clone + Send + Sync + 'static {
    /// Broker resources the kind opens before the consumer is attached.
    type Outbound: Send + Sync + 'static;

    /// Checks kind-specific configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when required settings are missing.
    fn validate(&self, endpoint: &str) -> Result<(), ConfigurationError>;

    /// Applies kind-specific fields of a declarative definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] when the definition sets fields the
    /// kind does not support.
    fn apply_definition(
        &mut self,
        endpoint: &str,
        definition: &EndpointDefinition,
    ) -> Result<(), ConfigurationError>;

    /// Opens outbound resources after the dead-letter producer and before
    /// the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the broker refuses the resources.
    fn open_outbound(&self, session: &dyn BrokerSession) -> BrokerResult<Self::Outbound>;

    /// Closes outbound resources before the session is closed, reporting
    /// each failure instead of stopping at the first.
    fn close_outbound(&self, outbound: &Self::Outbound) -> Vec<CleanupFailure>;

    /// Handles a message that passed input verification.
    ///
    /// # Errors
    ///
    /// Returns an [`EndpointError`](super::EndpointError) only when a failed
    /// message could not be dead-lettered.
    fn handle_message(
        &self,
        delivery: &Delivery<'_, Self::Outbound>,
        message: &Message,
    ) -> EndpointResult<()>;

    /// Adds kind-specific diagnostics to a dead-letter envelope.
    fn annotate_dead_letter(&self, _envelope: &mut DeadLetterEnvelope) {}
}

struct Runtime<O> {
    session: Arc<dyn BrokerSession>,
    dead_letter_producer: Option<Arc<dyn MessageProducer>>,
    outbound: Option<Arc<O>>,
    consumer: Option<Box<dyn MessageConsumer>>,
}

/// A broker-attached message endpoint.
///
/// Configured through setters while [`EndpointState::Editable`], started
/// with a session it then owns, and stopped to release every broker
/// resource. `stop()` returns the endpoint to the editable state.
pub struct Endpoint<K: EndpointKind> {
    settings: EndpointSettings,
    kind: K,
    lifecycle: Arc<LifecycleCell>,
    observer: Arc<dyn EndpointObserver>,
    runtime: Option<Runtime<K::Outbound>>,
}

impl<K: EndpointKind> Endpoint<K> {
    /// Creates an editable endpoint reporting to `observer`.
    #[must_use]
    pub fn new(kind: K, observer: Arc<dyn EndpointObserver>) -> Self {
        Self {
            settings: EndpointSettings::default(),
            kind,
            lifecycle: Arc::new(LifecycleCell::new()),
            observer,
            runtime: None,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EndpointState {
        self.lifecycle.load()
    }

    /// Returns `true` once the consumer is attached.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == EndpointState::Active
    }

    /// Returns the endpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.settings.name()
    }

    /// Returns the source-side settings.
    #[must_use]
    pub const fn settings(&self) -> &EndpointSettings {
        &self.settings
    }

    /// Returns the variant-specific configuration.
    #[must_use]
    pub const fn kind(&self) -> &K {
        &self.kind
    }

    /// Sets the diagnostic name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        self.settings.set_name(Some(name.into()));
        Ok(self)
    }

    /// Sets the source channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_source(&mut self, source: ChannelSpec) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        self.settings.set_source(Some(source));
        Ok(self)
    }

    /// Sets or clears the durable subscription name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_subscription_name(
        &mut self,
        subscription_name: Option<String>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        self.settings.set_subscription_name(subscription_name);
        Ok(self)
    }

    /// Sets or clears the broker-side selector.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_selector(&mut self, selector: Option<String>) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        self.settings.set_selector(selector);
        Ok(self)
    }

    /// Sets or clears the dead-letter queue name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_dead_letter_channel(
        &mut self,
        dead_letter_channel: Option<String>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        self.settings.set_dead_letter_channel(dead_letter_channel);
        Ok(self)
    }

    /// Sets or clears the input verifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable.
    pub fn set_input_verifier(
        &mut self,
        verifier: Option<Arc<dyn MessageVerifier>>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        self.settings.set_input_verifier(verifier);
        Ok(self)
    }

    /// Applies a declarative definition.
    ///
    /// A name present in the definition replaces the current one; the
    /// remaining source-side fields are taken as given, so absent fields
    /// clear earlier values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotEditable`] unless editable, or a
    /// kind-specific error for unsupported fields.
    pub fn apply_definition(
        &mut self,
        definition: &EndpointDefinition,
    ) -> Result<&mut Self, ConfigurationError> {
        self.ensure_editable()?;
        if let Some(name) = &definition.name {
            self.settings.set_name(Some(name.clone()));
        }
        self.kind
            .apply_definition(self.settings.name(), definition)?;
        self.settings.set_source(definition.source.clone());
        self.settings
            .set_subscription_name(definition.subscription_name.clone());
        self.settings.set_selector(definition.selector.clone());
        self.settings
            .set_dead_letter_channel(definition.dead_letter_channel.clone());
        Ok(self)
    }

    /// Validates configuration, acquires broker resources, and attaches the
    /// consumer.
    ///
    /// The endpoint owns `session` from here on. When validation or a
    /// broker call fails, every resource acquired so far is released, the
    /// session is closed, and the endpoint stays editable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AlreadyStarted`] unless editable, a
    /// [`ConfigurationError`] for invalid settings, or
    /// [`EndpointError::Broker`](super::EndpointError::Broker) when the broker
    /// refuses a resource.
    pub fn start(&mut self, session: Arc<dyn BrokerSession>) -> EndpointResult<()> {
        let state = self.lifecycle.load();
        if !state.is_editable() {
            return Err(self
                .configuration_failure(ConfigurationError::AlreadyStarted {
                    endpoint: self.name().to_owned(),
                    state,
                })
                .into());
        }

        let source = match self.validate() {
            Ok(source) => source,
            Err(err) => {
                self.report_cleanup("session", session.close());
                return Err(self.configuration_failure(err).into());
            }
        };

        self.lifecycle
            .transition(EndpointState::Editable, EndpointState::Starting)
            .map_err(|observed| {
                self.configuration_failure(ConfigurationError::AlreadyStarted {
                    endpoint: self.name().to_owned(),
                    state: observed,
                })
            })?;

        self.runtime = Some(Runtime {
            session: Arc::clone(&session),
            dead_letter_producer: None,
            outbound: None,
            consumer: None,
        });

        if let Err(err) = self.acquire(&session, &source) {
            self.lifecycle.store(EndpointState::StartFailed);
            self.emit(
                EndpointEvent::new(EventLevel::Warning, self.name(), "Error starting endpoint")
                    .with_cause(&err),
            );
            self.stop();
            return Err(err.into());
        }

        self.emit(EndpointEvent::new(
            EventLevel::Info,
            self.name(),
            format!("Endpoint started on {source}"),
        ));
        Ok(())
    }

    /// Releases every broker resource and returns to the editable state.
    ///
    /// Each close is attempted independently; failures are reported as
    /// warnings. Calling `stop()` on an editable endpoint does nothing.
    pub fn stop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if self.lifecycle.load() != EndpointState::StartFailed {
            self.lifecycle.store(EndpointState::Stopping);
        }

        if let Some(consumer) = runtime.consumer {
            self.report_cleanup("consumer", consumer.close());
        }
        if let Some(producer) = runtime.dead_letter_producer {
            self.report_cleanup("producer for dead-letter channel", producer.close());
        }
        if let Some(outbound) = runtime.outbound {
            for (resource, err) in self.kind.close_outbound(&outbound) {
                self.report_cleanup(resource, Err(err));
            }
        }
        self.report_cleanup("session", runtime.session.close());

        self.lifecycle.store(EndpointState::Editable);
        self.emit(EndpointEvent::new(
            EventLevel::Info,
            self.name(),
            "Endpoint stopped",
        ));
    }

    /// Returns the kind for mutation after checking the endpoint is
    /// editable.
    pub(crate) fn kind_mut(&mut self) -> Result<&mut K, ConfigurationError> {
        self.ensure_editable()?;
        Ok(&mut self.kind)
    }

    fn validate(&self) -> Result<ChannelSpec, ConfigurationError> {
        let source = self.settings.validate()?.clone();
        self.kind.validate(self.settings.name())?;
        Ok(source)
    }

    fn acquire(&mut self, session: &Arc<dyn BrokerSession>, source: &ChannelSpec) -> BrokerResult<()> {
        let Some(runtime) = self.runtime.as_mut() else {
            return Err(BrokerError::Closed("endpoint runtime"));
        };

        let source_destination = session.resolve_destination(source)?;

        if let Some(name) = self.settings.dead_letter_channel() {
            let destination = session.resolve_destination(&ChannelSpec::queue(name))?;
            let producer: Arc<dyn MessageProducer> =
                Arc::from(session.create_producer(&destination)?);
            runtime.dead_letter_producer = Some(producer);
        }

        let outbound = Arc::new(self.kind.open_outbound(session.as_ref())?);
        runtime.outbound = Some(Arc::clone(&outbound));

        let selector = self.settings.selector();
        let opened = self.settings.subscription_name().map_or_else(
            || session.create_consumer(&source_destination, selector),
            |subscription| {
                session.create_durable_consumer(&source_destination, subscription, selector)
            },
        )?;
        let consumer = runtime.consumer.insert(opened);

        let router = DeadLetterRouter::new(
            self.settings.name(),
            source.clone(),
            self.settings.subscription_name().map(str::to_owned),
            runtime.dead_letter_producer.clone(),
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.observer),
        );
        let pipeline = MessagePipeline::new(
            Arc::new(self.settings.clone()),
            Arc::new(self.kind.clone()),
            outbound,
            Arc::clone(session),
            router,
            Arc::clone(&self.observer),
        );
        consumer.set_listener(Arc::new(pipeline))?;

        self.lifecycle.store(EndpointState::Active);
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), ConfigurationError> {
        let state = self.lifecycle.load();
        if state.is_editable() {
            return Ok(());
        }
        Err(self.configuration_failure(ConfigurationError::NotEditable {
            endpoint: self.name().to_owned(),
            state,
        }))
    }

    fn configuration_failure(&self, err: ConfigurationError) -> ConfigurationError {
        self.emit(
            EndpointEvent::new(EventLevel::Warning, self.name(), "Invalid endpoint configuration")
                .with_cause(&err),
        );
        err
    }

    fn report_cleanup(&self, resource: &str, result: BrokerResult<()>) {
        if let Err(err) = result {
            self.emit(
                EndpointEvent::new(
                    EventLevel::Warning,
                    self.name(),
                    format!("Error closing {resource}"),
                )
                .with_cause(&err),
            );
        }
    }

    fn emit(&self, event: EndpointEvent) {
        self.observer.record(event);
    }
}

impl<K: EndpointKind + Default> Endpoint<K> {
    /// Creates an editable endpoint with a default kind.
    #[must_use]
    pub fn with_observer(observer: Arc<dyn EndpointObserver>) -> Self {
        Self::new(K::default(), observer)
    }
}

impl<K: EndpointKind> Drop for Endpoint<K> {
    fn drop(&mut self) {
        self.stop();
    }
}
