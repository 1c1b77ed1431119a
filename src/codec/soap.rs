use super::WireCodec;
use crate::binding::Binding;
use crate::error::{DispatchError, FaultDetail};
use crate::exchange::{CallMetadata, Outcome, Payload, Response};
use crate::message::{Body, Envelope, Message, QName};
use std::sync::Arc;

/// Reference codec for SOAP 1.1 and SOAP 1.2 envelopes.
#[derive(Debug, Clone, Copy)]
pub struct SoapCodec {
    binding: Binding,
}

impl SoapCodec {
    #[must_use]
    pub fn new(binding: Binding) -> Self {
        Self { binding }
    }

    #[must_use]
    pub fn shared(binding: Binding) -> Arc<dyn WireCodec> {
        Arc::new(Self::new(binding))
    }

    fn check_version(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        if envelope.binding == self.binding {
            return Ok(());
        }
        Err(DispatchError::Protocol(FaultDetail::new(
            QName::new(self.binding.envelope_namespace(), "VersionMismatch"),
            format!(
                "envelope version {} does not match binding {}",
                envelope.binding, self.binding
            ),
        )))
    }
}

impl WireCodec for SoapCodec {
    fn binding(&self) -> Binding {
        self.binding
    }

    fn encode(
        &self,
        payload: &Payload,
        _metadata: &CallMetadata,
    ) -> Result<Message, DispatchError> {
        match payload {
            Payload::Structured(value) => Ok(Message::new(Body::Content(value.clone()))),
            Payload::Envelope(envelope) => self.decode(envelope),
        }
    }

    fn to_envelope(&self, message: &Message) -> Result<Envelope, DispatchError> {
        let mut envelope = Envelope::new(self.binding, message.body.clone());
        envelope.headers = message.headers.clone();
        envelope.attachments = message.attachments.clone();
        Ok(envelope)
    }

    fn decode(&self, envelope: &Envelope) -> Result<Message, DispatchError> {
        self.check_version(envelope)?;
        Ok(Message {
            headers: envelope.headers.clone(),
            body: envelope.body.clone(),
            attachments: envelope.attachments.clone(),
        })
    }

    fn classify(&self, message: Message) -> Outcome {
        match message.body {
            Body::Content(value) => Outcome::Ok(Response::Structured(value)),
            Body::Fault(fault) => Outcome::Fault(fault),
            Body::Empty => Outcome::Ok(Response::Empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HeaderBlock;
    use serde_json::json;

    #[test]
    fn test_encode_structured_payload() {
        let codec = SoapCodec::new(Binding::Soap11);
        let msg = codec
            .encode(&Payload::Structured(json!({"a": 1})), &CallMetadata::default())
            .unwrap();
        assert_eq!(msg.body, Body::Content(json!({"a": 1})));
        assert!(msg.headers.is_empty());
    }

    #[test]
    fn test_envelope_keeps_headers() {
        let codec = SoapCodec::new(Binding::Soap12);
        let mut msg = Message::new(Body::Content(json!("x")));
        msg.set_header(HeaderBlock::new(QName::new("urn:h", "Trace"), json!("t-1")));
        let env = codec.to_envelope(&msg).unwrap();
        assert_eq!(env.binding, Binding::Soap12);
        assert_eq!(codec.decode(&env).unwrap(), msg);
    }

    #[test]
    fn test_version_mismatch_is_a_protocol_fault() {
        let codec = SoapCodec::new(Binding::Soap12);
        let env = Envelope::new(Binding::Soap11, Body::Empty);
        let err = codec.decode(&env).unwrap_err();
        assert_eq!(err.fault().unwrap().code.local, "VersionMismatch");
    }

    #[test]
    fn test_classify() {
        let codec = SoapCodec::new(Binding::Soap11);
        let fault = FaultDetail::new(QName::new("urn:x", "Server"), "down");
        assert!(codec.classify(Message::new(Body::Fault(fault))).is_fault());
        assert!(matches!(
            codec.classify(Message::empty()),
            Outcome::Ok(Response::Empty)
        ));
    }
}
