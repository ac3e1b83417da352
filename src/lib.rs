//! Message Link: verified routing between message-broker channels.
//!
//! This crate connects a source queue or topic to application logic or to a
//! destination channel. Each inbound message passes through an optional
//! input verifier; routing endpoints then transform it, verify the result,
//! and forward it. Failures never stop the endpoint: the inbound message is
//! copied, annotated with the failure reason, and sent to a dead-letter
//! queue.
//!
//! # Architecture
//!
//! Message Link follows hexagonal architecture principles:
//!
//! - **Domain**: Channel specifications, messages, lifecycle states and
//!   dead-letter envelopes
//! - **Ports**: Broker session, verifier, transformer, handler and observer
//!   contracts
//! - **Adapters**: An in-memory broker and `tracing`-backed diagnostics
//! - **Services**: Endpoint lifecycle and the per-message pipeline
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use message_link::endpoint::{
//!     adapters::{TracingObserver, memory::InMemoryBroker},
//!     domain::{ChannelSpec, Message},
//!     services::RoutingEndpoint,
//! };
//!
//! let broker = InMemoryBroker::new();
//! let mut link = RoutingEndpoint::with_observer(Arc::new(TracingObserver));
//! link.set_name("OrderLink")
//!     .and_then(|link| link.set_source(ChannelSpec::queue("orders.in")))
//!     .and_then(|link| link.set_destination(ChannelSpec::queue("orders.out")))
//!     .expect("endpoint is editable");
//! link.start(broker.create_session()).expect("endpoint starts");
//!
//! let delivered = broker.collect(&ChannelSpec::queue("orders.out")).expect("collector");
//! broker
//!     .publish(&ChannelSpec::queue("orders.in"), &Message::text("order 1"))
//!     .expect("publish");
//!
//! assert_eq!(delivered.len(), 1);
//! link.stop();
//! ```

pub mod endpoint;
