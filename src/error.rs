//! # Error Taxonomy
//!
//! - [`TransportError`] - I/O and connection failures; always wrapped into
//!   [`DispatchError::Runtime`] before it reaches a caller
//! - [`FaultDetail`] - a protocol fault, either returned by the peer or raised
//!   locally (must-understand); surfaces as [`DispatchError::Protocol`]
//! - handler errors - `anyhow::Error` from handler code, converted by
//!   [`DispatchError::from_handler`]
//!
//! [`Outcome`](crate::exchange::Outcome) is the tagged result stored in an
//! exchange's response slot.

use crate::binding::Binding;
use crate::exchange::ExchangeState;
use crate::ids::CallId;
use crate::message::QName;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Detail of a protocol fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {reason}")]
pub struct FaultDetail {
    pub code: QName,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    /// Header blocks that triggered a must-understand fault.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_understood: Vec<QName>,
}

impl FaultDetail {
    pub fn new(code: QName, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            detail: None,
            not_understood: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Binding-specific `MustUnderstand` fault listing the offending headers.
    #[must_use]
    pub fn must_understand(binding: Binding, not_understood: Vec<QName>) -> Self {
        let names = not_understood
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            code: QName::new(binding.envelope_namespace(), "MustUnderstand"),
            reason: format!("One or more mandatory SOAP header blocks not understood: {names}"),
            detail: None,
            not_understood,
        }
    }

    #[must_use]
    pub fn is_must_understand(&self) -> bool {
        self.code.local == "MustUnderstand"
    }
}

/// Failure reported by a transport connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before a response was received")]
    Closed,

    #[error("invalid endpoint address '{address}': {reason}")]
    InvalidEndpoint { address: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Error surfaced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Fault returned by the peer or raised during inbound processing.
    #[error("protocol fault: {0}")]
    Protocol(FaultDetail),

    /// Generic platform runtime fault.
    #[error("{message}")]
    Runtime {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("codec error: {0}")]
    Codec(String),

    #[error("no codec registered for binding {0}")]
    NoCodec(Binding),

    #[error("illegal exchange state transition from {from:?} to {to:?}")]
    IllegalState {
        from: ExchangeState,
        to: ExchangeState,
    },

    #[error("connection already assigned for call {0}")]
    ConnectionAlreadyAssigned(CallId),

    #[error("async task pool unavailable: {0}")]
    PoolUnavailable(String),
}

impl DispatchError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            source: None,
        }
    }

    /// Convert an error raised by handler code.
    ///
    /// Faults and dispatcher errors are passed through unchanged; anything
    /// else becomes a runtime fault with the original as its source.
    pub fn from_handler(err: anyhow::Error) -> Self {
        let err = match err.downcast::<FaultDetail>() {
            Ok(fault) => return Self::Protocol(fault),
            Err(err) => err,
        };
        match err.downcast::<DispatchError>() {
            Ok(dispatch) => dispatch,
            Err(err) => Self::Runtime {
                message: format!("handler failed: {err}"),
                source: Some(err.into()),
            },
        }
    }

    #[must_use]
    pub fn fault(&self) -> Option<&FaultDetail> {
        match self {
            Self::Protocol(fault) => Some(fault),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl From<FaultDetail> for DispatchError {
    fn from(fault: FaultDetail) -> Self {
        Self::Protocol(fault)
    }
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        Self::Runtime {
            message: format!("transport failure: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transport_error_is_wrapped_as_runtime() {
        let err: DispatchError = TransportError::Closed.into();
        match &err {
            DispatchError::Runtime { message, source } => {
                assert!(message.starts_with("transport failure"));
                assert!(source.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.source().is_some());
    }

    #[test]
    fn test_handler_fault_passes_through() {
        let fault = FaultDetail::new(QName::new("urn:x", "Client"), "bad input");
        let err = DispatchError::from_handler(anyhow::Error::new(fault.clone()));
        assert_eq!(err.fault(), Some(&fault));
    }

    #[test]
    fn test_handler_dispatch_error_passes_through() {
        let err = DispatchError::from_handler(anyhow::Error::new(DispatchError::Codec(
            "broken".into(),
        )));
        assert!(matches!(err, DispatchError::Codec(ref m) if m == "broken"));
    }

    #[test]
    fn test_other_handler_errors_become_runtime() {
        let err = DispatchError::from_handler(anyhow::anyhow!("disk full"));
        match err {
            DispatchError::Runtime { message, source } => {
                assert_eq!(message, "handler failed: disk full");
                assert!(source.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_must_understand_fault_per_binding() {
        let names = vec![QName::new("urn:sec", "Security")];
        let f11 = FaultDetail::must_understand(Binding::Soap11, names.clone());
        let f12 = FaultDetail::must_understand(Binding::Soap12, names);
        assert!(f11.is_must_understand());
        assert_eq!(f11.code.namespace, crate::binding::SOAP11_ENVELOPE_NS);
        assert_eq!(f12.code.namespace, crate::binding::SOAP12_ENVELOPE_NS);
        assert!(f12.reason.contains("{urn:sec}Security"));
    }
}
