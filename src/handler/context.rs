use super::Direction;
use crate::binding::{BindingId, WireEncoding};
use crate::codec::WireCodec;
use crate::error::DispatchError;
use crate::exchange::{CallMetadata, PropertyBag};
use crate::message::{AttachmentMap, Envelope, Message};
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum MessageState {
    Envelope(Envelope),
    Message(Message),
}

/// Envelope-level attributes that have no place in the internal form and
/// survive a round trip through it.
#[derive(Clone, Default)]
struct WireAttrs {
    encoding: WireEncoding,
    action: Option<String>,
    mime_headers: Vec<(String, String)>,
}

impl WireAttrs {
    fn of(envelope: &Envelope) -> Self {
        Self {
            encoding: envelope.encoding,
            action: envelope.action.clone(),
            mime_headers: envelope.mime_headers.clone(),
        }
    }
}

/// Per-exchange view handed to handlers.
///
/// Holds exactly one message representation at a time: asking for the
/// internal form discards the envelope and vice versa.
#[derive(Clone)]
pub struct HandlerContext {
    codec: Arc<dyn WireCodec>,
    state: MessageState,
    wire: WireAttrs,
    direction: Direction,
    binding_id: BindingId,
    properties: PropertyBag,
    attachments: AttachmentMap,
    status: Option<u16>,
    response_headers: HeaderMap,
    mtom_enabled: bool,
}

impl HandlerContext {
    pub(crate) fn from_message(
        codec: Arc<dyn WireCodec>,
        message: Message,
        metadata: &CallMetadata,
    ) -> Self {
        Self::build(codec, MessageState::Message(message), WireAttrs::default(), metadata)
    }

    pub(crate) fn from_envelope(
        codec: Arc<dyn WireCodec>,
        envelope: Envelope,
        metadata: &CallMetadata,
    ) -> Self {
        Self::build(codec, MessageState::Envelope(envelope), WireAttrs::default(), metadata)
    }

    fn build(
        codec: Arc<dyn WireCodec>,
        state: MessageState,
        wire: WireAttrs,
        metadata: &CallMetadata,
    ) -> Self {
        let binding_id = codec.binding_id(metadata);
        Self {
            codec,
            state,
            wire,
            direction: Direction::Outbound,
            binding_id,
            properties: metadata.properties.clone(),
            attachments: AttachmentMap::new(),
            status: None,
            response_headers: HeaderMap::new(),
            mtom_enabled: metadata.mtom_enabled,
        }
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Fill the attachment map for the current direction. Outbound contexts
    /// take the caller's outbound attachments; inbound ones are filled from
    /// the response in [`reset_for_inbound`](Self::reset_for_inbound).
    pub(crate) fn populate_attachments(&mut self, metadata: &CallMetadata) {
        if self.is_outbound() {
            self.attachments = metadata.outbound_attachments.clone();
        }
    }

    #[must_use]
    pub fn attachments(&self) -> &AttachmentMap {
        &self.attachments
    }

    pub fn attachments_mut(&mut self) -> &mut AttachmentMap {
        &mut self.attachments
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    #[must_use]
    pub fn binding_id(&self) -> BindingId {
        self.binding_id
    }

    /// Transport status; set on the inbound leg only.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    #[must_use]
    pub fn mtom_enabled(&self) -> bool {
        self.mtom_enabled
    }

    /// Turn binary optimization off while handlers run; returns the previous flag.
    pub(crate) fn suspend_mtom(&mut self) -> bool {
        std::mem::replace(&mut self.mtom_enabled, false)
    }

    pub(crate) fn restore_mtom(&mut self, previous: bool) {
        self.mtom_enabled = previous;
    }

    #[must_use]
    pub fn holds_envelope(&self) -> bool {
        matches!(self.state, MessageState::Envelope(_))
    }

    /// Internal form, decoding (and discarding) the envelope if needed.
    pub fn message(&mut self) -> Result<&Message, DispatchError> {
        self.message_mut().map(|m| &*m)
    }

    pub fn message_mut(&mut self) -> Result<&mut Message, DispatchError> {
        if let MessageState::Envelope(envelope) = &self.state {
            let message = self.codec.decode(envelope)?;
            self.wire = WireAttrs::of(envelope);
            self.state = MessageState::Message(message);
        }
        match &mut self.state {
            MessageState::Message(message) => Ok(message),
            MessageState::Envelope(_) => Err(DispatchError::runtime(
                "handler context lost its internal message",
            )),
        }
    }

    /// Wire envelope, materializing (and discarding) the internal form if needed.
    pub fn envelope(&mut self) -> Result<&Envelope, DispatchError> {
        self.envelope_mut().map(|e| &*e)
    }

    pub(crate) fn envelope_mut(&mut self) -> Result<&mut Envelope, DispatchError> {
        if let MessageState::Message(message) = &self.state {
            let mut envelope = self.codec.to_envelope(message)?;
            envelope.encoding = self.wire.encoding;
            envelope.action = self.wire.action.clone();
            envelope.mime_headers = self.wire.mime_headers.clone();
            self.state = MessageState::Envelope(envelope);
        }
        match &mut self.state {
            MessageState::Envelope(envelope) => Ok(envelope),
            MessageState::Message(_) => Err(DispatchError::runtime(
                "handler context lost its envelope",
            )),
        }
    }

    /// Replace the current message state with a new internal form.
    pub fn replace_message(&mut self, message: Message) {
        self.state = MessageState::Message(message);
    }

    /// Start the inbound leg: new status, headers and message; outbound
    /// attachments are cleared before the response's are copied in. The
    /// received envelope's wire attributes are kept so the raw response can
    /// be rebuilt unchanged.
    pub(crate) fn reset_for_inbound(
        &mut self,
        status: u16,
        headers: HeaderMap,
        message: Message,
        received: Option<&Envelope>,
    ) {
        self.direction = Direction::Inbound;
        self.status = Some(status);
        self.response_headers = headers;
        self.attachments.clear();
        self.attachments.extend(
            message
                .attachments
                .iter()
                .map(|(id, a)| (id.clone(), a.clone())),
        );
        self.wire = received.map(WireAttrs::of).unwrap_or_default();
        self.state = MessageState::Message(message);
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("direction", &self.direction)
            .field("binding_id", &self.binding_id)
            .field("holds_envelope", &self.holds_envelope())
            .field("status", &self.status)
            .field("attachments", &self.attachments.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::codec::SoapCodec;
    use crate::message::{Attachment, Body, HeaderBlock, QName};
    use serde_json::json;

    fn ctx() -> HandlerContext {
        HandlerContext::from_message(
            SoapCodec::shared(Binding::Soap11),
            Message::new(Body::Content(json!({"v": 1}))),
            &CallMetadata::default(),
        )
    }

    #[test]
    fn test_single_source_of_truth() {
        let mut ctx = ctx();
        assert!(!ctx.holds_envelope());
        ctx.envelope().unwrap();
        assert!(ctx.holds_envelope());
        ctx.message_mut()
            .unwrap()
            .set_header(HeaderBlock::new(QName::new("urn:h", "X"), json!(1)));
        assert!(!ctx.holds_envelope());
        let env = ctx.envelope().unwrap();
        assert_eq!(env.headers.len(), 1);
    }

    #[test]
    fn test_wire_attributes_survive_round_trip() {
        let mut env = Envelope::new(Binding::Soap11, Body::Empty);
        env.encoding = WireEncoding::FastInfoset;
        env.mime_headers.push(("X-Part".into(), "1".into()));
        let mut ctx = HandlerContext::from_envelope(
            SoapCodec::shared(Binding::Soap11),
            env,
            &CallMetadata::default(),
        );
        ctx.message_mut().unwrap().body = Body::Content(json!("changed"));
        let env = ctx.envelope().unwrap();
        assert_eq!(env.encoding, WireEncoding::FastInfoset);
        assert_eq!(env.mime_header("x-part"), Some("1"));
        assert_eq!(env.body, Body::Content(json!("changed")));
    }

    #[test]
    fn test_attachments_depend_on_direction() {
        let mut md = CallMetadata::default();
        md.add_attachment(Attachment::new("cid:1", "text/plain", b"hello".to_vec()));
        let mut ctx = ctx();
        ctx.set_direction(Direction::Inbound);
        ctx.populate_attachments(&md);
        assert!(ctx.attachments().is_empty());
        ctx.set_direction(Direction::Outbound);
        ctx.populate_attachments(&md);
        assert!(ctx.attachments().contains_key("cid:1"));
    }

    #[test]
    fn test_reset_for_inbound_clears_outbound_attachments() {
        let mut md = CallMetadata::default();
        md.add_attachment(Attachment::new("cid:out", "text/plain", b"o".to_vec()));
        let mut ctx = ctx();
        ctx.populate_attachments(&md);

        let mut response = Message::new(Body::Content(json!("ok")));
        response.attachments.insert(
            "cid:in".into(),
            Attachment::new("cid:in", "image/png", vec![1, 2, 3]),
        );
        ctx.reset_for_inbound(200, HeaderMap::new(), response, None);
        assert_eq!(ctx.direction(), Direction::Inbound);
        assert_eq!(ctx.status(), Some(200));
        assert!(!ctx.attachments().contains_key("cid:out"));
        assert!(ctx.attachments().contains_key("cid:in"));
    }

    #[test]
    fn test_reset_for_inbound_keeps_received_wire_attributes() {
        let mut received = Envelope::new(Binding::Soap12, Body::Content(json!("ok")));
        received.encoding = WireEncoding::FastInfoset;
        received.action = Some("urn:quoteResponse".into());
        received.mime_headers.push(("X-Part".into(), "1".into()));
        let message = SoapCodec::new(Binding::Soap12).decode(&received).unwrap();

        let mut ctx = HandlerContext::from_message(
            SoapCodec::shared(Binding::Soap12),
            Message::empty(),
            &CallMetadata::default(),
        );
        ctx.reset_for_inbound(200, HeaderMap::new(), message, Some(&received));
        assert_eq!(ctx.envelope().unwrap(), &received);
    }

    #[test]
    fn test_mtom_suspend_restore() {
        let md = CallMetadata {
            mtom_enabled: true,
            ..CallMetadata::default()
        };
        let mut ctx = HandlerContext::from_message(
            SoapCodec::shared(Binding::Soap12),
            Message::empty(),
            &md,
        );
        assert_eq!(ctx.binding_id(), BindingId::Soap12HttpMtom);
        let prev = ctx.suspend_mtom();
        assert!(prev);
        assert!(!ctx.mtom_enabled());
        ctx.restore_mtom(prev);
        assert!(ctx.mtom_enabled());
    }
}
