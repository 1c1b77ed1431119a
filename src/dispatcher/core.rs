use super::future::{Dispatched, ResponseFuture};
use super::CallbackRegistry;
use crate::binding::{Binding, ContentNegotiation, WireEncoding};
use crate::codec::{SoapCodec, WireCodec};
use crate::error::DispatchError;
use crate::exchange::{
    CallMetadata, DispatchMode, Exchange, ExchangeState, Outcome, Pattern, Payload, Response,
};
use crate::handler::{
    must_understand, Direction, HandlerChain, HandlerContext, HandlerList, Leg, PlatformHandler,
};
use crate::headers;
use crate::message::{Envelope, Message};
use crate::runtime_config::DispatchConfig;
use crate::transport::{dump_request, dump_response, is_accepted, Transport};
use crate::worker_pool::AsyncTaskPool;
use http::header::CONTENT_TYPE;
use http::HeaderMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Message state produced by step 1, before a handler context exists.
enum Encoded {
    Message(Message),
    Envelope(Envelope),
}

/// Result of the preparation phase.
pub(crate) enum Prepared {
    /// Connection assigned; ready to transmit.
    Ready,
    /// The outbound chain vetoed; the response slot is already filled.
    ShortCircuit,
}

/// The shared stages of one exchange: everything the caller thread and an
/// async worker both need.
#[derive(Clone)]
pub(crate) struct Pipeline {
    pub(crate) chain: Arc<dyn HandlerChain>,
    pub(crate) platform: Option<Arc<dyn PlatformHandler>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) dump_messages: bool,
}

/// Client-side dispatcher.
///
/// Cheap to clone: clones share the handler chain, transport, callback
/// registry and async task pool.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) pipeline: Pipeline,
    codecs: HashMap<Binding, Arc<dyn WireCodec>>,
    pub(crate) config: DispatchConfig,
    pub(crate) callbacks: Option<Arc<CallbackRegistry>>,
    pub(crate) pool: Arc<Mutex<Option<Arc<AsyncTaskPool>>>>,
}

impl Dispatcher {
    /// Dispatcher with an empty handler chain and the reference SOAP codecs.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let mut codecs: HashMap<Binding, Arc<dyn WireCodec>> = HashMap::new();
        codecs.insert(Binding::Soap11, SoapCodec::shared(Binding::Soap11));
        codecs.insert(Binding::Soap12, SoapCodec::shared(Binding::Soap12));
        let config = DispatchConfig::default();
        Self {
            pipeline: Pipeline {
                chain: Arc::new(HandlerList::new()),
                platform: None,
                transport,
                dump_messages: config.dump_messages,
            },
            codecs,
            config,
            callbacks: None,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn with_chain(mut self, chain: Arc<dyn HandlerChain>) -> Self {
        self.pipeline.chain = chain;
        self
    }

    #[must_use]
    pub fn with_platform_handler(mut self, handler: Arc<dyn PlatformHandler>) -> Self {
        self.pipeline.platform = Some(handler);
        self
    }

    /// Register (or replace) the codec for its binding.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn WireCodec>) -> Self {
        self.codecs.insert(codec.binding(), codec);
        self
    }

    #[must_use]
    pub fn with_callbacks(mut self, registry: Arc<CallbackRegistry>) -> Self {
        self.callbacks = Some(registry);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.pipeline.dump_messages = config.dump_messages;
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    #[must_use]
    pub fn callbacks(&self) -> Option<&Arc<CallbackRegistry>> {
        self.callbacks.as_ref()
    }

    /// Drive `exchange` to completion, or schedule it for async patterns.
    ///
    /// Synchronous patterns never return `Err`: the outcome is in the
    /// exchange's response slot. Async patterns return preparation errors
    /// directly.
    pub fn send(&self, exchange: &mut Exchange) -> Result<Dispatched, DispatchError> {
        info!(
            call_id = %exchange.id(),
            pattern = ?exchange.pattern(),
            binding = %exchange.binding(),
            mode = ?exchange.mode(),
            "Dispatching exchange"
        );
        if exchange.pattern().is_async() {
            self.send_async(exchange)
        } else {
            self.do_send(exchange);
            Ok(Dispatched::Completed)
        }
    }

    /// Blocking call: the response, or the error, of one exchange.
    pub fn invoke(&self, mut exchange: Exchange) -> Result<Response, DispatchError> {
        match self.send(&mut exchange)? {
            Dispatched::Completed => exchange.into_result(),
            Dispatched::Scheduled(future) => future.wait(),
        }
    }

    /// Schedule an async exchange and return its future.
    pub fn invoke_async(&self, mut exchange: Exchange) -> Result<ResponseFuture, DispatchError> {
        let id = exchange.id();
        match self.send(&mut exchange)? {
            Dispatched::Scheduled(future) => Ok(future),
            Dispatched::Completed => Ok(ResponseFuture::ready(id, exchange.into_result())),
        }
    }

    pub(crate) fn resolve_codec(
        &self,
        exchange: &Exchange,
    ) -> Result<Arc<dyn WireCodec>, DispatchError> {
        if let Some(codec) = exchange.codec() {
            return Ok(Arc::clone(codec));
        }
        self.codecs
            .get(&exchange.binding())
            .map(Arc::clone)
            .ok_or(DispatchError::NoCodec(exchange.binding()))
    }

    fn run_sync(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let codec = self.resolve_codec(exchange)?;
        match self.pipeline.prepare(exchange, codec)? {
            Prepared::ShortCircuit => Ok(()),
            Prepared::Ready => self.pipeline.complete_sync(exchange),
        }
    }

    /// Synchronous path: every error lands in the response slot.
    fn do_send(&self, exchange: &mut Exchange) {
        if let Err(err) = self.run_sync(exchange) {
            warn!(
                call_id = %exchange.id(),
                state = ?exchange.state(),
                error = %err,
                "Exchange failed"
            );
            exchange.fail(err);
        }
        exchange.finish();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bindings", &self.codecs.keys().collect::<Vec<_>>())
            .field("has_handlers", &self.pipeline.chain.has_handlers())
            .field("platform", &self.pipeline.platform.is_some())
            .field("config", &self.config)
            .field("async_pool", &self.pool.lock().is_some())
            .finish()
    }
}

fn new_context(
    codec: &Arc<dyn WireCodec>,
    encoded: Encoded,
    metadata: &CallMetadata,
) -> HandlerContext {
    match encoded {
        Encoded::Message(message) => {
            HandlerContext::from_message(Arc::clone(codec), message, metadata)
        }
        Encoded::Envelope(envelope) => {
            HandlerContext::from_envelope(Arc::clone(codec), envelope, metadata)
        }
    }
}

/// The exchange's context, created from `encoded` if still absent.
fn ensure_context<'a>(
    slot: &'a mut Option<HandlerContext>,
    encoded: &mut Option<Encoded>,
    codec: &Arc<dyn WireCodec>,
    metadata: &CallMetadata,
) -> Result<&'a mut HandlerContext, DispatchError> {
    if slot.is_none() {
        let encoded = encoded
            .take()
            .ok_or_else(|| DispatchError::runtime("no encoded message for the handler context"))?;
        *slot = Some(new_context(codec, encoded, metadata));
    }
    slot.as_mut()
        .ok_or_else(|| DispatchError::runtime("handler context missing"))
}

fn missing(what: &str) -> DispatchError {
    DispatchError::runtime(format!("exchange has no {what}"))
}

impl Pipeline {
    fn platform_for(&self, exchange: &Exchange) -> Option<&Arc<dyn PlatformHandler>> {
        self.platform
            .as_ref()
            .filter(|p| p.applies_to(exchange.binding_id()))
    }

    /// Encode, run the outbound chain and platform handler, compute the
    /// transport context and assign a connection.
    pub(crate) fn prepare(
        &self,
        exchange: &mut Exchange,
        codec: Arc<dyn WireCodec>,
    ) -> Result<Prepared, DispatchError> {
        let call_id = exchange.id();
        let binding = exchange.binding();
        let pattern = exchange.pattern();
        let mode = exchange.mode();
        let response_expected = pattern.expects_response();

        let mut encoded = Some(match (mode, exchange.payload()) {
            (DispatchMode::Message, Payload::Envelope(envelope)) => {
                let mut envelope = envelope.clone();
                envelope.normalize_transfer_encoding();
                Encoded::Envelope(envelope)
            }
            (DispatchMode::Message, Payload::Structured(_)) => {
                return Err(DispatchError::Codec(
                    "message mode requires an envelope payload".into(),
                ));
            }
            (_, payload) => Encoded::Message(codec.encode(payload, exchange.metadata())?),
        });
        exchange.advance(ExchangeState::Encoded)?;
        debug!(call_id = %call_id, "Payload encoded");

        if self.chain.has_handlers() {
            let (metadata, slot) = exchange.stage_parts();
            let ctx = ensure_context(slot, &mut encoded, &codec, metadata)?;
            ctx.set_direction(Direction::Outbound);
            ctx.populate_attachments(metadata);

            let mtom = ctx.suspend_mtom();
            let proceed = self
                .chain
                .invoke(Direction::Outbound, Leg::Request, ctx, response_expected);
            ctx.restore_mtom(mtom);
            let proceed = proceed.map_err(DispatchError::from_handler)?;
            ctx.envelope_mut()?;

            if !proceed {
                info!(call_id = %call_id, response_expected, "Outbound chain vetoed transmission");
                let outcome = if response_expected {
                    let envelope = ctx.envelope()?.clone();
                    let message = codec.decode(&envelope)?;
                    classify(&codec, mode, message, envelope)
                } else {
                    Outcome::Ok(Response::Empty)
                };
                exchange.bind_codec(codec);
                exchange.complete(outcome);
                return Ok(Prepared::ShortCircuit);
            }
        }
        exchange.advance(ExchangeState::OutboundHandled)?;

        exchange.bind_codec(Arc::clone(&codec));

        if let Some(platform) = self.platform_for(exchange).cloned() {
            let (metadata, slot) = exchange.stage_parts();
            let ctx = ensure_context(slot, &mut encoded, &codec, metadata)?;
            ctx.set_direction(Direction::Outbound);
            platform
                .outbound(ctx, metadata, call_id)
                .map_err(DispatchError::from_handler)?;
            debug!(call_id = %call_id, "Platform handler ran outbound");
        }

        let (metadata, slot) = exchange.stage_parts();
        let ctx = ensure_context(slot, &mut encoded, &codec, metadata)?;
        let envelope = ctx.envelope_mut()?;
        if mode != DispatchMode::Message {
            envelope.encoding = binding.request_encoding(metadata.content_negotiation);
        }
        let transport_ctx = headers::compute(metadata, binding, pattern, envelope)?;
        if mode == DispatchMode::Message {
            // compute may have set the inline action
            envelope.normalize_transfer_encoding();
        }
        if self.dump_messages {
            trace!(call_id = %call_id, body = %envelope.body_text(), "Request envelope");
        }

        let connection = self.transport.connect(&transport_ctx)?;
        exchange.set_transport_context(transport_ctx);
        exchange.assign_connection(connection)?;
        debug!(call_id = %call_id, "Connection assigned");
        Ok(Prepared::Ready)
    }

    /// Steps 7 and 8 of the synchronous path.
    fn complete_sync(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        self.transmit(exchange)?;
        match exchange.pattern() {
            Pattern::RequestResponse => self.receive(exchange),
            Pattern::OneWay => {
                let status = exchange.connection_status().unwrap_or_default();
                if is_accepted(status) {
                    debug!(call_id = %exchange.id(), status, "One-way message acknowledged");
                } else {
                    warn!(
                        call_id = %exchange.id(),
                        status,
                        "One-way message not acknowledged - ignoring"
                    );
                }
                exchange.complete(Outcome::Ok(Response::Empty));
                Ok(())
            }
            Pattern::AsyncPoll | Pattern::AsyncCallback => Ok(()),
        }
    }

    pub(crate) fn transmit(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let call_id = exchange.id();
        let (connection, ctx, transport_ctx) = exchange.io_parts();
        let connection = connection.ok_or_else(|| missing("connection"))?;
        let envelope = ctx.ok_or_else(|| missing("handler context"))?.envelope()?;
        if let Some(transport_ctx) = transport_ctx {
            dump_request(&mut **connection, transport_ctx, envelope);
        }
        connection.send(envelope)?;
        debug!(call_id = %call_id, "Request transmitted");
        exchange.advance(ExchangeState::Transmitted)
    }

    /// Read, decode and classify the response. Runs exactly once per exchange.
    pub(crate) fn receive(&self, exchange: &mut Exchange) -> Result<(), DispatchError> {
        let call_id = exchange.id();
        let binding = exchange.binding();
        let mode = exchange.mode();
        let codec = exchange
            .codec()
            .map(Arc::clone)
            .ok_or_else(|| missing("codec"))?;

        let (connection, _, _) = exchange.io_parts();
        let connection = connection.ok_or_else(|| missing("connection"))?;
        let status = connection.status();
        let response_headers = connection.headers().clone();
        let response = connection.response()?;
        dump_response(&mut **connection, status, &response_headers, response.as_ref());
        info!(call_id = %call_id, status, has_body = response.is_some(), "Response received");
        if self.dump_messages {
            if let Some(envelope) = &response {
                trace!(call_id = %call_id, body = %envelope.body_text(), "Response envelope");
            }
        }

        let message = match &response {
            Some(envelope) => codec.decode(envelope)?,
            None => Message::empty(),
        };
        exchange.advance(ExchangeState::Decoded)?;

        adapt_negotiation(exchange, &response_headers, response.as_ref());

        let platform = self.platform_for(exchange).cloned();
        let (metadata, slot) = exchange.stage_parts();
        let ctx = slot.get_or_insert_with(|| {
            HandlerContext::from_message(Arc::clone(&codec), Message::empty(), metadata)
        });
        ctx.reset_for_inbound(status, response_headers, message, response.as_ref());

        if let Some(platform) = &platform {
            platform.inbound(ctx).map_err(DispatchError::from_handler)?;
        }

        let mut understood = self.chain.understood_headers();
        if let Some(platform) = &platform {
            understood.extend(platform.understood_headers());
        }
        let verdict = must_understand::check(ctx.message()?, binding, &understood);
        if let Err(fault) = verdict {
            warn!(
                call_id = %call_id,
                not_understood = ?fault.not_understood,
                "Must-understand violation - closing handler chain"
            );
            self.chain.force_close_all(ctx);
            return Err(DispatchError::Protocol(fault));
        }

        if self.chain.has_handlers() {
            let is_fault = ctx.message()?.is_fault();
            if !is_accepted(status) && is_fault {
                debug!(call_id = %call_id, status, "Routing fault response to the fault path");
                self.chain
                    .invoke_fault_path(ctx)
                    .map_err(DispatchError::from_handler)?;
            } else {
                self.chain
                    .invoke(Direction::Inbound, Leg::Response, ctx, true)
                    .map_err(DispatchError::from_handler)?;
            }
        }

        let message = ctx.message()?.clone();
        let envelope = if mode.wants_envelope() {
            Some(ctx.envelope()?.clone())
        } else {
            None
        };
        exchange.advance(ExchangeState::InboundHandled)?;

        let outcome = match envelope {
            Some(envelope) => Outcome::Ok(Response::Envelope(envelope)),
            None => codec.classify(message),
        };
        if outcome.is_fault() {
            info!(call_id = %call_id, status, "Peer returned a fault");
        }
        exchange.complete(outcome);
        Ok(())
    }
}

fn classify(
    codec: &Arc<dyn WireCodec>,
    mode: DispatchMode,
    message: Message,
    envelope: Envelope,
) -> Outcome {
    if mode.wants_envelope() {
        Outcome::Ok(Response::Envelope(envelope))
    } else {
        codec.classify(message)
    }
}

/// Pessimistic negotiation that got a compact response switches the
/// originating context to optimistic. Best effort; nothing here can fail
/// the exchange.
fn adapt_negotiation(exchange: &Exchange, headers: &HeaderMap, response: Option<&Envelope>) {
    let metadata = exchange.metadata();
    if metadata.content_negotiation != ContentNegotiation::Pessimistic {
        return;
    }
    let encoding = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(WireEncoding::from_content_type)
        .or_else(|| response.map(|e| e.encoding));
    if encoding != Some(WireEncoding::FastInfoset) {
        return;
    }
    match metadata.origin() {
        Some(origin) => {
            if origin.upgrade(ContentNegotiation::Pessimistic, ContentNegotiation::Optimistic) {
                info!(
                    call_id = %exchange.id(),
                    "Peer answered with Fast Infoset - switching to optimistic negotiation"
                );
            }
        }
        None => debug!(
            call_id = %exchange.id(),
            "Compact response but no originating context to update"
        ),
    }
}
