use crate::error::{DispatchError, FaultDetail};
use crate::message::Envelope;
use serde_json::Value;

/// Normal result of an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Structured payload decoded from the response body.
    Structured(Value),
    /// Raw response envelope, for callers dispatching whole envelopes.
    Envelope(Envelope),
    /// No response body (one-way, or an empty acknowledgement).
    Empty,
}

impl Response {
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Response::Structured(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_envelope(&self) -> Option<&Envelope> {
        match self {
            Response::Envelope(e) => Some(e),
            _ => None,
        }
    }
}

/// Terminal value of an exchange.
#[derive(Debug)]
pub enum Outcome {
    Ok(Response),
    Fault(FaultDetail),
    Error(DispatchError),
}

impl Outcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Outcome::Fault(_))
    }

    pub fn into_result(self) -> Result<Response, DispatchError> {
        match self {
            Outcome::Ok(response) => Ok(response),
            Outcome::Fault(fault) => Err(DispatchError::Protocol(fault)),
            Outcome::Error(err) => Err(err),
        }
    }
}

/// The one place errors are classified into the response slot.
impl From<DispatchError> for Outcome {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Protocol(fault) => Outcome::Fault(fault),
            other => Outcome::Error(other),
        }
    }
}

impl From<Result<Response, DispatchError>> for Outcome {
    fn from(result: Result<Response, DispatchError>) -> Self {
        match result {
            Ok(response) => Outcome::Ok(response),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::QName;

    #[test]
    fn test_protocol_errors_classify_as_faults() {
        let fault = FaultDetail::new(QName::new("urn:x", "Server"), "boom");
        let outcome = Outcome::from(DispatchError::Protocol(fault.clone()));
        assert!(outcome.is_fault());
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.fault(), Some(&fault));
    }

    #[test]
    fn test_other_errors_classify_as_errors() {
        let outcome = Outcome::from(DispatchError::runtime("nope"));
        assert!(matches!(outcome, Outcome::Error(DispatchError::Runtime { .. })));
    }
}
