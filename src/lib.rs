//! # wsdispatch
//!
//! **wsdispatch** is the client-side dispatch engine of a SOAP web-services
//! stack. It takes one remote call (a payload plus per-call metadata), runs it
//! through a pluggable handler chain, hands the encoded envelope to a
//! transport, and turns what comes back into a response, a fault or an error.
//!
//! ## Architecture
//!
//! - **[`exchange`]** - the per-call [`Exchange`]: payload, pattern, metadata,
//!   forward-only state and the set-once response slot
//! - **[`dispatcher`]** - [`Dispatcher`] driving exchanges, synchronously or on
//!   the async task pool
//! - **[`handler`]** - user [`MessageHandler`]s, the [`HandlerChain`], the
//!   must-understand check and the WS-Addressing platform handler
//! - **[`codec`]** - the [`WireCodec`] boundary and the reference [`SoapCodec`]
//! - **[`headers`]** - transport header computation (credentials, `Accept`, action)
//! - **[`transport`]** - the [`Transport`]/[`Connection`] boundary and debug dumps
//! - **[`binding`]** - SOAP 1.1/1.2 descriptors and content negotiation
//! - **[`worker_pool`]** - `may` coroutine pool for async exchanges
//! - **[`runtime_config`]** / **[`logging`]** - environment-driven configuration
//!
//! ### Request/response flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant D as Dispatcher
//!     participant C as WireCodec
//!     participant H as HandlerChain
//!     participant P as PlatformHandler
//!     participant T as Transport
//!
//!     Caller->>D: send(&mut exchange)
//!     D->>C: encode(payload)
//!     D->>H: invoke(Outbound)
//!     alt vetoed
//!         H-->>D: false
//!         D-->>Caller: slot = handler-composed response
//!     else proceed
//!         D->>P: outbound (WS-Addressing headers)
//!         D->>D: headers::compute
//!         D->>T: connect + send
//!         T-->>D: status, headers, envelope
//!         D->>C: decode
//!         D->>P: inbound
//!         D->>D: must-understand check
//!         D->>H: invoke(Inbound) or fault path
//!         D->>C: classify
//!         D-->>Caller: slot = Ok / Fault / Error
//!     end
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsdispatch::{Binding, CallMetadata, Dispatcher, Exchange, Pattern, Payload, Transport};
//!
//! fn run(transport: Arc<dyn Transport>) -> Result<(), wsdispatch::DispatchError> {
//!     let dispatcher = Dispatcher::new(transport);
//!     let exchange = Exchange::new(
//!         Binding::Soap11,
//!         Pattern::RequestResponse,
//!         Payload::Structured(serde_json::json!({"getQuote": {"symbol": "ACME"}})),
//!     )
//!     .with_metadata(CallMetadata::new().with_action("urn:getQuote"));
//!     let response = dispatcher.invoke(exchange)?;
//!     println!("{response:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime Considerations
//!
//! Async exchanges run on `may` coroutines, not tokio. The pool is created on
//! the first async call and sized by `WSD_ASYNC_WORKERS` and `WSD_STACK_SIZE`
//! (see [`DispatchConfig`]).

pub mod binding;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod headers;
pub mod ids;
pub mod logging;
pub mod message;
pub mod runtime_config;
pub mod transport;
pub mod worker_pool;

pub use binding::{Binding, BindingId, ContentNegotiation, WireEncoding};
pub use codec::{SoapCodec, WireCodec};
pub use dispatcher::{
    CallResult, CallbackRegistry, Dispatched, Dispatcher, ResponseCallback, ResponseFuture,
};
pub use error::{DispatchError, FaultDetail, TransportError};
pub use exchange::{
    CallMetadata, DispatchMode, Exchange, ExchangeState, Outcome, Pattern, Payload,
    RequestContext, Response, Scope,
};
pub use handler::{
    AddressingHandler, Direction, HandlerChain, HandlerContext, HandlerList, Leg,
    MessageHandler, PlatformHandler,
};
pub use ids::CallId;
pub use message::{Attachment, Body, Envelope, HeaderBlock, Message, QName};
pub use runtime_config::DispatchConfig;
pub use transport::{Connection, Transport, TransportContext};
