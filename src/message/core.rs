use crate::error::FaultDetail;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Namespace-qualified name of a header block or fault code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// One envelope header block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderBlock {
    pub name: QName,
    pub value: Value,
    #[serde(default)]
    pub must_understand: bool,
    /// SOAP 1.1 `actor` / SOAP 1.2 `role`; `None` targets the ultimate receiver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl HeaderBlock {
    pub fn new(name: QName, value: Value) -> Self {
        Self {
            name,
            value,
            must_understand: false,
            role: None,
        }
    }

    #[must_use]
    pub fn must_understand(mut self) -> Self {
        self.must_understand = true;
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Envelope body content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Body {
    #[default]
    Empty,
    Content(Value),
    Fault(FaultDetail),
}

impl Body {
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Body::Fault(_))
    }
}

/// A MIME attachment travelling with a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub content_id: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(
        content_id: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Attachments keyed by content id.
pub type AttachmentMap = BTreeMap<String, Attachment>;

/// Internal generic message form.
///
/// This is what handlers mutate. The codec turns it into an
/// [`Envelope`](super::Envelope) for the wire and back.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub headers: Vec<HeaderBlock>,
    pub body: Body,
    #[serde(default)]
    pub attachments: AttachmentMap,
}

impl Message {
    pub fn new(body: Body) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.body.is_fault()
    }

    #[must_use]
    pub fn header(&self, name: &QName) -> Option<&HeaderBlock> {
        self.headers.iter().find(|h| &h.name == name)
    }

    /// Add a header block, replacing any block with the same name.
    pub fn set_header(&mut self, block: HeaderBlock) {
        self.headers.retain(|h| h.name != block.name);
        self.headers.push(block);
    }
}
