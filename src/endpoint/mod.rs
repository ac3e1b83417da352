//! Broker-attached message endpoints.
//!
//! An endpoint consumes from a queue or topic, verifies each message, and
//! either hands it to application logic (pass-through) or transforms and
//! forwards it to a destination channel (routing). Messages that fail any
//! step are annotated and sent to a dead-letter queue. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
