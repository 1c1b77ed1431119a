use criterion::{criterion_group, criterion_main, Criterion};
use http::HeaderMap;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use wsdispatch::handler::{MetricsHandler, TracingHandler};
use wsdispatch::{
    AddressingHandler, Binding, Body, CallMetadata, Connection, Dispatcher, Envelope, Exchange,
    HandlerList, Pattern, Payload, Transport, TransportContext, TransportError,
};

/// Answers every request with the same envelope.
struct Loopback {
    reply: Envelope,
}

struct LoopbackConnection {
    reply: Option<Envelope>,
    headers: HeaderMap,
}

impl Transport for Loopback {
    fn connect(&self, _ctx: &TransportContext) -> Result<Box<dyn Connection>, TransportError> {
        Ok(Box::new(LoopbackConnection {
            reply: Some(self.reply.clone()),
            headers: HeaderMap::new(),
        }))
    }
}

impl Connection for LoopbackConnection {
    fn send(&mut self, _envelope: &Envelope) -> Result<(), TransportError> {
        Ok(())
    }

    fn status(&self) -> u16 {
        200
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn response(&mut self) -> Result<Option<Envelope>, TransportError> {
        Ok(self.reply.take())
    }
}

fn loopback() -> Arc<dyn Transport> {
    Arc::new(Loopback {
        reply: Envelope::new(Binding::Soap11, Body::Content(json!({"price": 42.5}))),
    })
}

fn quote() -> Exchange {
    Exchange::new(
        Binding::Soap11,
        Pattern::RequestResponse,
        Payload::Structured(json!({"getQuote": {"symbol": "ACME"}})),
    )
    .with_metadata(
        CallMetadata::new()
            .with_action("urn:getQuote")
            .with_credentials("alice", "secret"),
    )
}

fn bench_dispatch(c: &mut Criterion) {
    let bare = Dispatcher::new(loopback());
    c.bench_function("dispatch_no_handlers", |b| {
        b.iter(|| black_box(bare.invoke(quote())))
    });

    let chain = HandlerList::new()
        .with(Arc::new(TracingHandler))
        .with(Arc::new(MetricsHandler::new()));
    let full = Dispatcher::new(loopback())
        .with_chain(Arc::new(chain))
        .with_platform_handler(Arc::new(AddressingHandler::new()));
    c.bench_function("dispatch_chain_and_addressing", |b| {
        b.iter(|| black_box(full.invoke(quote())))
    });
}

fn bench_async_dispatch(c: &mut Criterion) {
    let dispatcher = Dispatcher::new(loopback());
    c.bench_function("dispatch_async_poll", |b| {
        b.iter(|| {
            let ex = Exchange::new(
                Binding::Soap11,
                Pattern::AsyncPoll,
                Payload::Structured(json!({"getQuote": {"symbol": "ACME"}})),
            );
            let future = dispatcher.invoke_async(ex);
            black_box(future.map(|f| f.wait()))
        })
    });
    dispatcher.shutdown_async_pool();
}

criterion_group!(benches, bench_dispatch, bench_async_dispatch);
criterion_main!(benches);
