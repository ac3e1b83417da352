//! Endpoint orchestration services.
//!
//! [`Endpoint`] owns the lifecycle and the source side of the broker
//! connection; [`Routing`] and [`PassThrough`] plug in the handling step.

mod dead_letter;
mod error;
mod lifecycle;
mod pass_through;
mod pipeline;
mod routing;
mod settings;

pub use dead_letter::DeadLetterRouter;
pub use error::{EndpointError, EndpointResult};
pub use lifecycle::{CleanupFailure, Endpoint, EndpointKind};
pub use pass_through::{PassThrough, PassThroughEndpoint};
pub use pipeline::{Delivery, MessagePipeline};
pub use routing::{Routing, RoutingEndpoint};
pub use settings::{EndpointSettings, UNNAMED_ENDPOINT};
