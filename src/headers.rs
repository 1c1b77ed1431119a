//! # Header Computation
//!
//! Translates [`CallMetadata`] into the [`TransportContext`] for one call:
//!
//! - **Credentials** - `Authorization: Basic base64(user:password)` when both are set
//! - **Accept** - binding × negotiation mode, see [`Binding::accept_header`]
//! - **Action** - SOAP 1.1 `SOAPAction` header (`"action"` or exactly `""`);
//!   SOAP 1.2 inline envelope attribute, only when non-empty
//! - **Content-Type** - binding × wire encoding (+ SOAP 1.2 action parameter)
//! - **One-way** - `expect_response = false`
//! - **Passthrough** - transport- and application-scoped properties, unchanged

use crate::binding::{ActionStrategy, Binding};
use crate::error::{DispatchError, TransportError};
use crate::exchange::{CallMetadata, Pattern, Scope};
use crate::message::Envelope;
use crate::transport::TransportContext;
use base64::{engine::general_purpose, Engine as _};
use http::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::HeaderMap;

/// Legacy action header.
pub const SOAP_ACTION: &str = "soapaction";

/// Value of the legacy action header when no action is configured.
pub const EMPTY_ACTION: &str = "\"\"";

/// `Authorization` value for a principal/secret pair.
#[must_use]
pub fn basic_auth_value(username: &str, password: &str) -> String {
    let token = general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {token}")
}

/// Build the transport context and apply envelope-level action attributes.
pub fn compute(
    metadata: &CallMetadata,
    binding: Binding,
    pattern: Pattern,
    envelope: &mut Envelope,
) -> Result<TransportContext, DispatchError> {
    let mut headers = HeaderMap::new();

    if let (Some(user), Some(password)) = (&metadata.username, &metadata.password) {
        headers.insert(AUTHORIZATION, header_value(&basic_auth_value(user, password))?);
    }

    headers.insert(
        ACCEPT,
        HeaderValue::from_static(binding.accept_header(metadata.content_negotiation)),
    );

    let action = metadata.action.as_deref().unwrap_or_default();
    match binding.action_strategy() {
        ActionStrategy::QuotedHeader => {
            let value = if action.is_empty() {
                EMPTY_ACTION.to_string()
            } else {
                format!("\"{action}\"")
            };
            headers.insert(HeaderName::from_static(SOAP_ACTION), header_value(&value)?);
        }
        ActionStrategy::EnvelopeAttribute => {
            if !action.is_empty() {
                envelope.action = Some(action.to_string());
            }
        }
    }

    headers.insert(CONTENT_TYPE, header_value(&envelope.content_type())?);

    for (name, value) in &metadata.http_headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            DispatchError::runtime(format!("invalid request header name '{name}': {e}"))
        })?;
        headers.append(name, header_value(value)?);
    }

    let endpoint = match &metadata.endpoint_address {
        Some(address) => Some(url::Url::parse(address).map_err(|e| {
            DispatchError::from(TransportError::InvalidEndpoint {
                address: address.clone(),
                reason: e.to_string(),
            })
        })?),
        None => None,
    };

    let mut properties = crate::exchange::PropertyBag::new();
    for prop in metadata.properties.visible_at(Scope::Transport) {
        properties.set(prop.key.clone(), prop.value.clone(), prop.scope);
    }

    Ok(TransportContext {
        endpoint,
        headers,
        properties,
        expect_response: pattern.expects_response(),
    })
}

fn header_value(value: &str) -> Result<HeaderValue, DispatchError> {
    HeaderValue::from_str(value)
        .map_err(|e| DispatchError::runtime(format!("invalid header value '{value}': {e}")))
}
