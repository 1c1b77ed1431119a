//! Content negotiation across calls sharing one `RequestContext`

mod common;

use common::fixtures::{quote_request, quote_response};
use common::transport::{Reply, ScriptedTransport};
use std::sync::Arc;
use wsdispatch::{
    Binding, ContentNegotiation, DispatchConfig, Dispatcher, Exchange, Pattern, Payload,
    RequestContext, WireEncoding,
};

fn call(dispatcher: &Dispatcher, ctx: &RequestContext) {
    let ex = Exchange::from_request_context(
        ctx,
        Pattern::RequestResponse,
        Payload::Structured(quote_request()),
    );
    dispatcher.invoke(ex).unwrap();
}

#[test]
fn test_compact_response_switches_context_to_optimistic() {
    let transport = ScriptedTransport::new(
        Reply::ok(quote_response()).with_content_type("application/fastinfoset"),
    );
    let dispatcher = Dispatcher::new(Arc::clone(&transport) as _);
    let ctx = RequestContext::new(Binding::Soap11);
    ctx.set_negotiation(ContentNegotiation::Pessimistic);

    call(&dispatcher, &ctx);
    assert_eq!(
        transport.last_context().unwrap().header("content-type"),
        Some("text/xml; charset=utf-8")
    );
    assert_eq!(ctx.negotiation(), ContentNegotiation::Optimistic);

    call(&dispatcher, &ctx);
    assert_eq!(
        transport.last_context().unwrap().header("content-type"),
        Some("application/fastinfoset")
    );
    assert_eq!(
        transport.last_sent().unwrap().encoding,
        WireEncoding::FastInfoset
    );
}

#[test]
fn test_xml_response_keeps_pessimistic() {
    let transport = ScriptedTransport::new(
        Reply::ok(quote_response()).with_content_type("text/xml; charset=utf-8"),
    );
    let dispatcher = Dispatcher::new(Arc::clone(&transport) as _);
    let ctx = RequestContext::new(Binding::Soap11);
    ctx.set_negotiation(ContentNegotiation::Pessimistic);

    call(&dispatcher, &ctx);
    call(&dispatcher, &ctx);
    assert_eq!(ctx.negotiation(), ContentNegotiation::Pessimistic);
}

#[test]
fn test_envelope_encoding_is_used_without_content_type() {
    let mut response = quote_response();
    response.encoding = WireEncoding::FastInfoset;
    let transport = ScriptedTransport::new(Reply::ok(response));
    let dispatcher = Dispatcher::new(Arc::clone(&transport) as _);
    let ctx = RequestContext::new(Binding::Soap11);
    ctx.set_negotiation(ContentNegotiation::Pessimistic);

    call(&dispatcher, &ctx);
    assert_eq!(ctx.negotiation(), ContentNegotiation::Optimistic);
}

#[test]
fn test_mode_none_is_never_upgraded() {
    let transport = ScriptedTransport::new(
        Reply::ok(quote_response()).with_content_type("application/fastinfoset"),
    );
    let dispatcher = Dispatcher::new(Arc::clone(&transport) as _);
    let ctx = RequestContext::new(Binding::Soap11);

    call(&dispatcher, &ctx);
    assert_eq!(ctx.negotiation(), ContentNegotiation::None);
}

#[test]
fn test_context_from_config_seeds_the_mode() {
    let config = DispatchConfig {
        content_negotiation: Some(ContentNegotiation::Optimistic),
        ..DispatchConfig::default()
    };
    let transport = ScriptedTransport::new(Reply::status(202));
    let dispatcher = Dispatcher::new(Arc::clone(&transport) as _).with_config(config);
    let ctx = RequestContext::from_config(Binding::Soap12, dispatcher.config());

    let ex = Exchange::from_request_context(
        &ctx,
        Pattern::OneWay,
        Payload::Structured(quote_request()),
    );
    dispatcher.invoke(ex).unwrap();
    assert_eq!(
        transport.last_context().unwrap().header("content-type"),
        Some("application/soap+fastinfoset")
    );
}
