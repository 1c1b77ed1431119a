//! # Dispatcher Module
//!
//! Drives one [`Exchange`](crate::exchange::Exchange) through encoding, the
//! handler chain, the transport and back.
//!
//! ## Entry points
//!
//! - [`Dispatcher::send`] - the full contract: synchronous patterns complete
//!   in place, async patterns return [`Dispatched::Scheduled`]
//! - [`Dispatcher::invoke`] - blocking call returning the response or error
//! - [`Dispatcher::invoke_async`] - always returns a [`ResponseFuture`]
//!
//! ## Synchronous path
//!
//! 1. Encode the payload (or normalize a caller-supplied envelope)
//! 2. Outbound handler chain; a veto short-circuits without transmitting
//! 3. Bind the codec, run the platform handler outbound
//! 4. Compute transport headers, open and assign the connection
//! 5. Transmit, then receive (request-response) or check the acknowledgement (one-way)
//!
//! Every error is classified into the exchange's response slot.
//!
//! ## Asynchronous path
//!
//! Steps 1-4 run on the caller's thread and fail fast. Transmit and receive
//! run on a forked copy of the exchange inside a lazily created `may`
//! coroutine pool; the result reaches the caller through a
//! [`ResponseFuture`] and, for async-callback exchanges, a
//! [`ResponseCallback`] (routed through a [`CallbackRegistry`] when one is
//! configured).

mod async_send;
mod core;
mod future;

pub use self::core::Dispatcher;
pub use self::future::{
    CallResult, CallbackRegistry, Dispatched, ResponseCallback, ResponseFuture,
};
