use super::{AttachmentMap, Body, HeaderBlock};
use crate::binding::{ActionStrategy, Binding, WireEncoding};
use serde::{Deserialize, Serialize};

/// Wire envelope as handed to and received from the transport.
///
/// Byte-level XML/Fast Infoset serialization belongs to the transport; this
/// type holds the parsed header blocks, body and the envelope-level
/// attributes the dispatcher manipulates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub binding: Binding,
    pub headers: Vec<HeaderBlock>,
    pub body: Body,
    #[serde(default)]
    pub encoding: WireEncoding,
    /// SOAP 1.2 inline action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// MIME-level headers of the envelope part (`Content-Type`, ...).
    #[serde(default)]
    pub mime_headers: Vec<(String, String)>,
    #[serde(default)]
    pub attachments: AttachmentMap,
}

impl Envelope {
    pub fn new(binding: Binding, body: Body) -> Self {
        Self {
            binding,
            headers: Vec::new(),
            body,
            encoding: WireEncoding::Xml,
            action: None,
            mime_headers: Vec::new(),
            attachments: AttachmentMap::new(),
        }
    }

    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.body.is_fault()
    }

    /// Full `Content-Type` value, including the SOAP 1.2 `action` parameter.
    #[must_use]
    pub fn content_type(&self) -> String {
        let base = self.binding.content_type(self.encoding);
        match (&self.action, self.binding.action_strategy()) {
            (Some(action), ActionStrategy::EnvelopeAttribute) if !action.is_empty() => {
                format!("{base}; action=\"{action}\"")
            }
            _ => base.to_string(),
        }
    }

    #[must_use]
    pub fn mime_header(&self, name: &str) -> Option<&str> {
        self.mime_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_mime_header(&mut self, name: &str, value: String) {
        self.mime_headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.mime_headers.push((name.to_string(), value));
    }

    /// Bring the MIME headers of a caller-supplied envelope in line with its
    /// binding and encoding before it is sent as-is.
    pub fn normalize_transfer_encoding(&mut self) {
        self.mime_headers.retain(|(k, _)| {
            !k.eq_ignore_ascii_case("content-length")
                && !k.eq_ignore_ascii_case("content-transfer-encoding")
        });
        if self.encoding == WireEncoding::FastInfoset {
            self.set_mime_header("Content-Transfer-Encoding", "binary".to_string());
        }
        let content_type = self.content_type();
        self.set_mime_header("Content-Type", content_type);
    }

    /// Body rendered for debug dumps.
    #[must_use]
    pub fn body_text(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_else(|e| format!("<unprintable body: {e}>"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_soap12_action_goes_into_content_type() {
        let mut env = Envelope::new(Binding::Soap12, Body::Content(json!({})));
        env.action = Some("urn:ping".to_string());
        assert_eq!(
            env.content_type(),
            "application/soap+xml; charset=utf-8; action=\"urn:ping\""
        );
    }

    #[test]
    fn test_soap11_ignores_inline_action() {
        let mut env = Envelope::new(Binding::Soap11, Body::Empty);
        env.action = Some("urn:ping".to_string());
        assert_eq!(env.content_type(), "text/xml; charset=utf-8");
    }

    #[test]
    fn test_normalize_transfer_encoding() {
        let mut env = Envelope::new(Binding::Soap11, Body::Empty);
        env.encoding = WireEncoding::FastInfoset;
        env.mime_headers = vec![
            ("Content-Length".to_string(), "999".to_string()),
            ("content-type".to_string(), "text/plain".to_string()),
            ("X-Trace".to_string(), "1".to_string()),
        ];
        env.normalize_transfer_encoding();
        assert_eq!(env.mime_header("content-length"), None);
        assert_eq!(env.mime_header("Content-Type"), Some("application/fastinfoset"));
        assert_eq!(env.mime_header("Content-Transfer-Encoding"), Some("binary"));
        assert_eq!(env.mime_header("x-trace"), Some("1"));
    }
}
