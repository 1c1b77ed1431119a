//! # Binding Descriptors
//!
//! A [`Binding`] names one protocol-binding version and carries everything
//! the dispatcher needs to know about it: the `Accept` literal for each
//! content-negotiation mode, where the action goes, the default negotiation
//! mode, the content type per wire encoding, and the envelope namespace used
//! for locally generated faults.
//!
//! Two versions are supported:
//!
//! | Binding | Action                             | Envelope namespace                          |
//! |---------|------------------------------------|---------------------------------------------|
//! | SOAP 1.1 | `SOAPAction` header, quoted        | `http://schemas.xmlsoap.org/soap/envelope/` |
//! | SOAP 1.2 | `action` parameter on the envelope | `http://www.w3.org/2003/05/soap-envelope`   |

use serde::{Deserialize, Serialize};
use std::fmt;

const SOAP11_ACCEPT: &str =
    "text/xml, multipart/related, text/html, image/gif, image/jpeg, *; q=.2, */*; q=.2";
const SOAP11_ACCEPT_FI: &str = "application/fastinfoset, text/xml, multipart/related, text/html, image/gif, image/jpeg, *; q=.2, */*; q=.2";
const SOAP12_ACCEPT: &str =
    "application/soap+xml, multipart/related, text/html, image/gif, image/jpeg, *; q=.2, */*; q=.2";
const SOAP12_ACCEPT_FI: &str = "application/soap+fastinfoset, application/soap+xml, multipart/related, text/html, image/gif, image/jpeg, *; q=.2, */*; q=.2";

pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Protocol-binding version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    Soap11,
    Soap12,
}

/// Where the action URI travels for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStrategy {
    /// `SOAPAction` transport header holding the quoted action, or `""`.
    QuotedHeader,
    /// `action` attribute on the envelope, only when non-empty.
    EnvelopeAttribute,
}

/// Client-driven choice between verbose XML and the compact encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentNegotiation {
    /// Never offer or send the compact encoding.
    #[default]
    None,
    /// Offer the compact encoding in `Accept`, send XML until the peer answers compactly.
    Pessimistic,
    /// Send the compact encoding directly.
    Optimistic,
}

impl ContentNegotiation {
    /// Parse a negotiation mode from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" => Some(Self::None),
            "pessimistic" => Some(Self::Pessimistic),
            "optimistic" => Some(Self::Optimistic),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pessimistic => "pessimistic",
            Self::Optimistic => "optimistic",
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Pessimistic => 1,
            Self::Optimistic => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Pessimistic,
            2 => Self::Optimistic,
            _ => Self::None,
        }
    }
}

impl fmt::Display for ContentNegotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of an envelope on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WireEncoding {
    #[default]
    Xml,
    FastInfoset,
}

impl WireEncoding {
    /// Classify a `Content-Type` header value.
    ///
    /// Returns `None` when the media type is neither XML nor Fast Infoset
    /// (for example an HTML error page).
    pub fn from_content_type(value: &str) -> Option<Self> {
        let media = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media.as_str() {
            "application/fastinfoset" | "application/soap+fastinfoset" => Some(Self::FastInfoset),
            "text/xml" | "application/soap+xml" | "application/xop+xml" | "multipart/related" => {
                Some(Self::Xml)
            }
            _ => None,
        }
    }
}

/// Closed set of protocol-binding identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingId {
    Soap11Http,
    Soap11HttpMtom,
    Soap12Http,
    Soap12HttpMtom,
}

impl BindingId {
    #[must_use]
    pub fn new(binding: Binding, mtom: bool) -> Self {
        match (binding, mtom) {
            (Binding::Soap11, false) => Self::Soap11Http,
            (Binding::Soap11, true) => Self::Soap11HttpMtom,
            (Binding::Soap12, false) => Self::Soap12Http,
            (Binding::Soap12, true) => Self::Soap12HttpMtom,
        }
    }

    #[must_use]
    pub fn binding(&self) -> Binding {
        match self {
            Self::Soap11Http | Self::Soap11HttpMtom => Binding::Soap11,
            Self::Soap12Http | Self::Soap12HttpMtom => Binding::Soap12,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Soap11Http => "http://schemas.xmlsoap.org/wsdl/soap/http",
            Self::Soap11HttpMtom => "http://schemas.xmlsoap.org/wsdl/soap/http?mtom=true",
            Self::Soap12Http => "http://www.w3.org/2003/05/soap/bindings/HTTP/",
            Self::Soap12HttpMtom => "http://www.w3.org/2003/05/soap/bindings/HTTP/?mtom=true",
        }
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Binding {
    /// `Accept` header literal for this binding and negotiation mode.
    ///
    /// Pessimistic and optimistic both advertise the compact encoding; they
    /// differ only in what the request itself is encoded with.
    #[must_use]
    pub fn accept_header(&self, mode: ContentNegotiation) -> &'static str {
        let negotiated = mode != ContentNegotiation::None;
        match (self, negotiated) {
            (Binding::Soap11, false) => SOAP11_ACCEPT,
            (Binding::Soap11, true) => SOAP11_ACCEPT_FI,
            (Binding::Soap12, false) => SOAP12_ACCEPT,
            (Binding::Soap12, true) => SOAP12_ACCEPT_FI,
        }
    }

    #[must_use]
    pub fn action_strategy(&self) -> ActionStrategy {
        match self {
            Binding::Soap11 => ActionStrategy::QuotedHeader,
            Binding::Soap12 => ActionStrategy::EnvelopeAttribute,
        }
    }

    #[must_use]
    pub fn negotiation_default(&self) -> ContentNegotiation {
        ContentNegotiation::None
    }

    /// Request encoding implied by a negotiation mode.
    #[must_use]
    pub fn request_encoding(&self, mode: ContentNegotiation) -> WireEncoding {
        if mode == ContentNegotiation::Optimistic {
            WireEncoding::FastInfoset
        } else {
            WireEncoding::Xml
        }
    }

    /// Base media type (without the `action` parameter).
    #[must_use]
    pub fn content_type(&self, encoding: WireEncoding) -> &'static str {
        match (self, encoding) {
            (Binding::Soap11, WireEncoding::Xml) => "text/xml; charset=utf-8",
            (Binding::Soap11, WireEncoding::FastInfoset) => "application/fastinfoset",
            (Binding::Soap12, WireEncoding::Xml) => "application/soap+xml; charset=utf-8",
            (Binding::Soap12, WireEncoding::FastInfoset) => "application/soap+fastinfoset",
        }
    }

    #[must_use]
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Binding::Soap11 => SOAP11_ENVELOPE_NS,
            Binding::Soap12 => SOAP12_ENVELOPE_NS,
        }
    }

    /// Role URIs that address the receiving node.
    #[must_use]
    pub fn targets_this_node(&self, role: Option<&str>) -> bool {
        match role {
            None | Some("") => true,
            Some(role) => match self {
                Binding::Soap11 => role == "http://schemas.xmlsoap.org/soap/actor/next",
                Binding::Soap12 => matches!(
                    role,
                    "http://www.w3.org/2003/05/soap-envelope/role/next"
                        | "http://www.w3.org/2003/05/soap-envelope/role/ultimateReceiver"
                ),
            },
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Soap11 => f.write_str("soap11"),
            Binding::Soap12 => f.write_str("soap12"),
        }
    }
}
