//! # Exchange Module
//!
//! One [`Exchange`] per remote call. It carries the payload, the message
//! exchange [`Pattern`], typed [`CallMetadata`], the bound codec, the
//! handler context, the transport connection and the set-once response slot
//! through every dispatcher stage.
//!
//! ## Lifecycle
//!
//! ```text
//! New -> Encoded -> OutboundHandled -> Transmitted -> Decoded -> InboundHandled -> Done
//! ```
//!
//! Any stage may jump straight to `Done` carrying a fault or error. No stage
//! can be re-entered.

mod core;
mod metadata;
mod response;

pub use self::core::{DispatchMode, Exchange, ExchangeState, Pattern, Payload};
pub use metadata::{CallMetadata, NegotiationCell, Property, PropertyBag, RequestContext, Scope};
pub use response::{Outcome, Response};
