//! # Codec Module
//!
//! The [`WireCodec`] trait is the boundary between the dispatcher and the
//! envelope format. One implementation exists per binding version;
//! [`SoapCodec`] is the reference one.
//!
//! The dispatcher uses a codec for four things:
//!
//! 1. `encode` - caller payload into the internal [`Message`] form
//! 2. `to_envelope` - internal form into the wire [`Envelope`]
//! 3. `decode` - wire envelope back into the internal form
//! 4. `classify` - final internal form into an [`Outcome`]

mod soap;

pub use soap::SoapCodec;

use crate::binding::{Binding, BindingId};
use crate::error::DispatchError;
use crate::exchange::{CallMetadata, Outcome, Payload};
use crate::message::{Envelope, Message};

pub trait WireCodec: Send + Sync {
    fn binding(&self) -> Binding;

    fn binding_id(&self, metadata: &CallMetadata) -> BindingId {
        BindingId::new(self.binding(), metadata.mtom_enabled)
    }

    fn encode(&self, payload: &Payload, metadata: &CallMetadata) -> Result<Message, DispatchError>;

    fn to_envelope(&self, message: &Message) -> Result<Envelope, DispatchError>;

    fn decode(&self, envelope: &Envelope) -> Result<Message, DispatchError>;

    fn classify(&self, message: Message) -> Outcome;
}
