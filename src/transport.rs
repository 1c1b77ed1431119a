//! # Transport Boundary
//!
//! The dispatcher never touches sockets. It computes a [`TransportContext`]
//! (headers, endpoint, passthrough properties), asks a [`Transport`] for a
//! [`Connection`], and then drives that connection:
//!
//! 1. `send` - write the request envelope
//! 2. `status` / `headers` - inspect the response line and headers
//! 3. `response` - read the parsed response envelope, if any
//!
//! A connection may expose a debug sink. Both legs then write a bracketed
//! dump of headers followed by the body; failures writing the dump are
//! ignored.

use crate::error::TransportError;
use crate::exchange::PropertyBag;
use crate::message::Envelope;
use http::HeaderMap;
use std::io::Write;
use tracing::debug;

/// Statuses accepted as success or one-way acknowledgement.
pub const ACCEPTED_STATUSES: [u16; 2] = [200, 202];

#[inline]
#[must_use]
pub fn is_accepted(status: u16) -> bool {
    ACCEPTED_STATUSES.contains(&status)
}

/// Everything the transport layer receives about one call.
#[derive(Debug, Clone, Default)]
pub struct TransportContext {
    pub endpoint: Option<url::Url>,
    pub headers: HeaderMap,
    /// Metadata passed through unchanged.
    pub properties: PropertyBag,
    /// `false` for one-way calls: no response body is expected.
    pub expect_response: bool,
}

impl TransportContext {
    /// First value of a request header, if it is valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Opens connections.
pub trait Transport: Send + Sync {
    fn connect(&self, ctx: &TransportContext) -> Result<Box<dyn Connection>, TransportError>;
}

/// One request/response conversation with the peer.
pub trait Connection: Send {
    fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError>;

    fn status(&self) -> u16;

    fn headers(&self) -> &HeaderMap;

    /// Parsed response envelope; `None` when the peer sent no body.
    fn response(&mut self) -> Result<Option<Envelope>, TransportError>;

    fn debug_sink(&mut self) -> Option<&mut dyn Write> {
        None
    }
}

pub(crate) fn dump_request(conn: &mut dyn Connection, ctx: &TransportContext, envelope: &Envelope) {
    if let Some(sink) = conn.debug_sink() {
        write_dump(sink, "---[HTTP request]---", &ctx.headers, Some(envelope));
    }
}

pub(crate) fn dump_response(
    conn: &mut dyn Connection,
    status: u16,
    headers: &HeaderMap,
    envelope: Option<&Envelope>,
) {
    if let Some(sink) = conn.debug_sink() {
        let title = format!("---[HTTP response {status}]---");
        write_dump(sink, &title, headers, envelope);
    }
}

fn write_dump(sink: &mut dyn Write, title: &str, headers: &HeaderMap, envelope: Option<&Envelope>) {
    let result = (|| -> std::io::Result<()> {
        writeln!(sink, "{title}")?;
        for (name, value) in headers {
            writeln!(sink, "{}: {}", name, value.to_str().unwrap_or("<binary>"))?;
        }
        if let Some(envelope) = envelope {
            writeln!(sink, "{}", envelope.body_text())?;
        }
        writeln!(sink, "{}", "-".repeat(title.len()))?;
        sink.flush()
    })();
    if let Err(e) = result {
        debug!(error = %e, "Debug dump failed - ignored");
    }
}
