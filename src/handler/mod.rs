//! # Handler Module
//!
//! Interceptors the dispatcher runs around the wire exchange.
//!
//! - [`HandlerChain`] - the user pipeline; [`HandlerList`] is the standard
//!   ordered implementation
//! - [`PlatformHandler`] - a cross-cutting handler configured per binding
//!   (see [`AddressingHandler`])
//! - [`HandlerContext`] - the per-exchange view both kinds operate on
//!
//! Built-in chain handlers: [`TracingHandler`] and [`MetricsHandler`].

mod addressing;
mod context;
mod core;
mod metrics;
pub(crate) mod must_understand;
mod tracing;

pub use self::addressing::{
    AddressingHandler, PROP_MESSAGE_ID, PROP_RELATES_TO, WSA_ANONYMOUS, WSA_NS,
};
pub use self::context::HandlerContext;
pub use self::core::{
    Direction, HandlerChain, HandlerList, Leg, MessageHandler, PlatformHandler,
};
pub use self::metrics::MetricsHandler;
pub use self::tracing::TracingHandler;
