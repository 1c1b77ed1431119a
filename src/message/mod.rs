//! # Message Module
//!
//! The two shapes a message takes inside the dispatcher:
//!
//! - [`Message`] - the internal generic form that handlers inspect and mutate
//! - [`Envelope`] - the wire envelope handed to the transport
//!
//! A [`WireCodec`](crate::codec::WireCodec) converts between them. The
//! handler context only ever holds one of the two at a time.

mod core;
mod envelope;

pub use self::core::{Attachment, AttachmentMap, Body, HeaderBlock, Message, QName};
pub use envelope::Envelope;
