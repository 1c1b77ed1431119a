use super::{CallMetadata, Outcome, RequestContext, Response};
use crate::binding::{Binding, BindingId};
use crate::codec::WireCodec;
use crate::dispatcher::ResponseCallback;
use crate::error::DispatchError;
use crate::handler::HandlerContext;
use crate::ids::CallId;
use crate::message::Envelope;
use crate::transport::{Connection, TransportContext};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Message exchange pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    RequestResponse,
    OneWay,
    AsyncPoll,
    AsyncCallback,
}

impl Pattern {
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Pattern::AsyncPoll | Pattern::AsyncCallback)
    }

    #[must_use]
    pub fn expects_response(&self) -> bool {
        !matches!(self, Pattern::OneWay)
    }
}

/// What the caller handed over as payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Structured payload; the codec builds the envelope.
    Payload,
    /// Raw envelope source; the codec re-reads it.
    Envelope,
    /// Already-encoded message; sent as-is after normalization.
    Message,
}

impl DispatchMode {
    /// Whether the caller gets the raw response envelope back.
    #[must_use]
    pub fn wants_envelope(&self) -> bool {
        !matches!(self, DispatchMode::Payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(Value),
    Envelope(Envelope),
}

/// Stage reached by an exchange. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExchangeState {
    New,
    Encoded,
    OutboundHandled,
    Transmitted,
    Decoded,
    InboundHandled,
    Done,
}

/// One remote call and everything threaded through its stages.
pub struct Exchange {
    id: CallId,
    binding: Binding,
    pattern: Pattern,
    mode: DispatchMode,
    payload: Payload,
    metadata: CallMetadata,
    codec: Option<Arc<dyn WireCodec>>,
    context: Option<HandlerContext>,
    transport: Option<TransportContext>,
    connection: Option<Box<dyn Connection>>,
    callback: Option<Arc<dyn ResponseCallback>>,
    response: Option<Outcome>,
    state: ExchangeState,
}

impl Exchange {
    pub fn new(binding: Binding, pattern: Pattern, payload: Payload) -> Self {
        let mode = match payload {
            Payload::Structured(_) => DispatchMode::Payload,
            Payload::Envelope(_) => DispatchMode::Envelope,
        };
        Self {
            id: CallId::new(),
            binding,
            pattern,
            mode,
            payload,
            metadata: CallMetadata::default(),
            codec: None,
            context: None,
            transport: None,
            connection: None,
            callback: None,
            response: None,
            state: ExchangeState::New,
        }
    }

    /// Exchange whose metadata is a snapshot of `ctx`.
    pub fn from_request_context(ctx: &RequestContext, pattern: Pattern, payload: Payload) -> Self {
        Self::new(ctx.binding(), pattern, payload).with_metadata(ctx.metadata())
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: CallMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_callback(mut self, callback: Arc<dyn ResponseCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn WireCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn id(&self) -> CallId {
        self.id
    }

    #[must_use]
    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Binding id derived from the bound codec, or from the binding alone
    /// before a codec is bound.
    #[must_use]
    pub fn binding_id(&self) -> BindingId {
        match &self.codec {
            Some(codec) => codec.binding_id(&self.metadata),
            None => BindingId::new(self.binding, self.metadata.mtom_enabled),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    #[must_use]
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut CallMetadata {
        &mut self.metadata
    }

    #[must_use]
    pub fn codec(&self) -> Option<&Arc<dyn WireCodec>> {
        self.codec.as_ref()
    }

    pub(crate) fn bind_codec(&mut self, codec: Arc<dyn WireCodec>) {
        self.codec = Some(codec);
    }

    #[must_use]
    pub fn context(&self) -> Option<&HandlerContext> {
        self.context.as_ref()
    }

    pub(crate) fn context_slot(&mut self) -> &mut Option<HandlerContext> {
        &mut self.context
    }

    /// Split borrow used while handlers run against the call metadata.
    pub(crate) fn stage_parts(&mut self) -> (&CallMetadata, &mut Option<HandlerContext>) {
        (&self.metadata, &mut self.context)
    }

    #[must_use]
    pub fn transport_context(&self) -> Option<&TransportContext> {
        self.transport.as_ref()
    }

    pub(crate) fn set_transport_context(&mut self, ctx: TransportContext) {
        self.transport = Some(ctx);
    }

    /// Assign the transport connection. Only one assignment per exchange.
    pub(crate) fn assign_connection(
        &mut self,
        connection: Box<dyn Connection>,
    ) -> Result<(), DispatchError> {
        if self.connection.is_some() {
            return Err(DispatchError::ConnectionAlreadyAssigned(self.id));
        }
        self.connection = Some(connection);
        Ok(())
    }

    #[must_use]
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Status reported by the assigned connection.
    #[must_use]
    pub fn connection_status(&self) -> Option<u16> {
        self.connection.as_ref().map(|c| c.status())
    }

    /// Split borrow used by the transmit and receive stages.
    pub(crate) fn io_parts(
        &mut self,
    ) -> (
        Option<&mut Box<dyn Connection>>,
        Option<&mut HandlerContext>,
        Option<&TransportContext>,
    ) {
        (
            self.connection.as_mut(),
            self.context.as_mut(),
            self.transport.as_ref(),
        )
    }

    #[must_use]
    pub fn callback(&self) -> Option<&Arc<dyn ResponseCallback>> {
        self.callback.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Move to `next`. Re-entering the current or an earlier stage is refused.
    pub(crate) fn advance(&mut self, next: ExchangeState) -> Result<(), DispatchError> {
        if next <= self.state {
            return Err(DispatchError::IllegalState {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn finish(&mut self) {
        if self.state != ExchangeState::Done {
            self.state = ExchangeState::Done;
        }
    }

    #[must_use]
    pub fn response(&self) -> Option<&Outcome> {
        self.response.as_ref()
    }

    /// Fill the response slot. The first value wins; later ones are dropped.
    pub(crate) fn complete(&mut self, outcome: Outcome) {
        if let Some(existing) = &self.response {
            warn!(
                call_id = %self.id,
                existing = ?existing,
                dropped = ?outcome,
                "Response slot already set - ignoring second outcome"
            );
            return;
        }
        self.response = Some(outcome);
    }

    pub(crate) fn fail(&mut self, err: DispatchError) {
        self.complete(err.into());
    }

    pub fn take_outcome(&mut self) -> Option<Outcome> {
        self.response.take()
    }

    /// Result as seen by a synchronous caller. An empty slot is an empty response.
    pub fn into_result(mut self) -> Result<Response, DispatchError> {
        match self.response.take() {
            Some(outcome) => outcome.into_result(),
            None => Ok(Response::Empty),
        }
    }

    /// Private copy for the async worker.
    ///
    /// The connection and handler context move to the copy; everything else
    /// is cloned so the caller's exchange is never touched from the worker.
    pub(crate) fn fork(&mut self) -> Exchange {
        Exchange {
            id: self.id,
            binding: self.binding,
            pattern: self.pattern,
            mode: self.mode,
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            codec: self.codec.clone(),
            context: self.context.take(),
            transport: self.transport.clone(),
            connection: self.connection.take(),
            callback: self.callback.clone(),
            response: None,
            state: self.state,
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("binding", &self.binding)
            .field("pattern", &self.pattern)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("has_connection", &self.connection.is_some())
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exchange() -> Exchange {
        Exchange::new(
            Binding::Soap11,
            Pattern::RequestResponse,
            Payload::Structured(json!({"op": "ping"})),
        )
    }

    #[test]
    fn test_state_only_moves_forward() {
        let mut ex = exchange();
        ex.advance(ExchangeState::Encoded).unwrap();
        ex.advance(ExchangeState::Transmitted).unwrap();
        let err = ex.advance(ExchangeState::Encoded).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::IllegalState {
                from: ExchangeState::Transmitted,
                to: ExchangeState::Encoded
            }
        ));
        assert!(ex.advance(ExchangeState::Transmitted).is_err());
        ex.advance(ExchangeState::Done).unwrap();
    }

    #[test]
    fn test_response_slot_is_set_once() {
        let mut ex = exchange();
        ex.complete(Outcome::Ok(Response::Structured(json!(1))));
        ex.fail(DispatchError::runtime("late"));
        assert_eq!(ex.into_result().unwrap(), Response::Structured(json!(1)));
    }

    #[test]
    fn test_mode_follows_payload() {
        assert_eq!(exchange().mode(), DispatchMode::Payload);
        let ex = Exchange::new(
            Binding::Soap12,
            Pattern::OneWay,
            Payload::Envelope(Envelope::new(Binding::Soap12, crate::message::Body::Empty)),
        );
        assert_eq!(ex.mode(), DispatchMode::Envelope);
        assert!(ex.mode().wants_envelope());
        assert!(!ex.pattern().expects_response());
    }

    #[test]
    fn test_fork_clones_call_data() {
        let mut ex = exchange();
        ex.metadata_mut().action = Some("urn:ping".into());
        ex.complete(Outcome::Ok(Response::Empty));
        let copy = ex.fork();
        assert_eq!(copy.id(), ex.id());
        assert_eq!(copy.metadata().action.as_deref(), Some("urn:ping"));
        assert!(copy.response().is_none());
        assert!(ex.response().is_some());
    }

    #[test]
    fn test_empty_slot_is_empty_response() {
        assert_eq!(exchange().into_result().unwrap(), Response::Empty);
    }
}
