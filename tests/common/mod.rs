#![allow(dead_code)]

pub mod transport {
    use http::header::CONTENT_TYPE;
    use http::{HeaderMap, HeaderValue};
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wsdispatch::{Connection, Envelope, Transport, TransportContext, TransportError};

    /// What a scripted connection answers with.
    #[derive(Debug, Clone)]
    pub struct Reply {
        pub status: u16,
        pub headers: HeaderMap,
        pub envelope: Option<Envelope>,
        pub fail_send: bool,
    }

    impl Reply {
        pub fn ok(envelope: Envelope) -> Self {
            Self {
                status: 200,
                headers: HeaderMap::new(),
                envelope: Some(envelope),
                fail_send: false,
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                headers: HeaderMap::new(),
                envelope: None,
                fail_send: false,
            }
        }

        pub fn with_status(mut self, status: u16) -> Self {
            self.status = status;
            self
        }

        pub fn with_content_type(mut self, value: &'static str) -> Self {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
            self
        }

        pub fn failing_send() -> Self {
            Self {
                fail_send: true,
                ..Self::status(200)
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct Stats {
        pub connects: AtomicUsize,
        pub sends: AtomicUsize,
        pub reads: AtomicUsize,
    }

    impl Stats {
        pub fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub fn sends(&self) -> usize {
            self.sends.load(Ordering::SeqCst)
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    /// Shared in-memory debug sink.
    #[derive(Debug, Clone, Default)]
    pub struct SharedSink(pub Arc<Mutex<Vec<u8>>>);

    impl SharedSink {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Transport answering every connection with the same [`Reply`] and
    /// recording what was sent.
    #[derive(Debug)]
    pub struct ScriptedTransport {
        reply: Mutex<Reply>,
        pub stats: Arc<Stats>,
        pub contexts: Mutex<Vec<TransportContext>>,
        pub sent: Arc<Mutex<Vec<Envelope>>>,
        pub sink: Option<SharedSink>,
    }

    impl ScriptedTransport {
        pub fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self::build(reply, None))
        }

        pub fn with_sink(reply: Reply, sink: SharedSink) -> Arc<Self> {
            Arc::new(Self::build(reply, Some(sink)))
        }

        fn build(reply: Reply, sink: Option<SharedSink>) -> Self {
            Self {
                reply: Mutex::new(reply),
                stats: Arc::new(Stats::default()),
                contexts: Mutex::new(Vec::new()),
                sent: Arc::new(Mutex::new(Vec::new())),
                sink,
            }
        }

        pub fn set_reply(&self, reply: Reply) {
            *self.reply.lock() = reply;
        }

        pub fn last_context(&self) -> Option<TransportContext> {
            self.contexts.lock().last().cloned()
        }

        pub fn last_sent(&self) -> Option<Envelope> {
            self.sent.lock().last().cloned()
        }
    }

    impl Transport for ScriptedTransport {
        fn connect(&self, ctx: &TransportContext) -> Result<Box<dyn Connection>, TransportError> {
            self.stats.connects.fetch_add(1, Ordering::SeqCst);
            self.contexts.lock().push(ctx.clone());
            Ok(Box::new(ScriptedConnection {
                reply: self.reply.lock().clone(),
                stats: Arc::clone(&self.stats),
                sent: Arc::clone(&self.sent),
                sink: self.sink.clone(),
            }))
        }
    }

    struct ScriptedConnection {
        reply: Reply,
        stats: Arc<Stats>,
        sent: Arc<Mutex<Vec<Envelope>>>,
        sink: Option<SharedSink>,
    }

    impl Connection for ScriptedConnection {
        fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
            self.stats.sends.fetch_add(1, Ordering::SeqCst);
            if self.reply.fail_send {
                return Err(TransportError::Closed);
            }
            self.sent.lock().push(envelope.clone());
            Ok(())
        }

        fn status(&self) -> u16 {
            self.reply.status
        }

        fn headers(&self) -> &HeaderMap {
            &self.reply.headers
        }

        fn response(&mut self) -> Result<Option<Envelope>, TransportError> {
            self.stats.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.envelope.clone())
        }

        fn debug_sink(&mut self) -> Option<&mut dyn Write> {
            self.sink.as_mut().map(|s| s as &mut dyn Write)
        }
    }
}

pub mod handlers {
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;
    use wsdispatch::{Body, Direction, HandlerContext, Message, MessageHandler, QName};

    pub type Log = Arc<Mutex<Vec<String>>>;

    /// Handler recording each call as `name:event`.
    pub struct Recorder {
        pub name: &'static str,
        pub log: Log,
        pub veto_outbound: bool,
        /// Body written into the context when vetoing.
        pub compose: Option<Value>,
        pub understood: Vec<QName>,
        pub fail_inbound: bool,
        pub fail_outbound: bool,
        pub panic_inbound: bool,
    }

    impl Recorder {
        pub fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                veto_outbound: false,
                compose: None,
                understood: Vec::new(),
                fail_inbound: false,
                fail_outbound: false,
                panic_inbound: false,
            }
        }

        pub fn vetoing(mut self, compose: Option<Value>) -> Self {
            self.veto_outbound = true;
            self.compose = compose;
            self
        }

        pub fn understanding(mut self, name: QName) -> Self {
            self.understood.push(name);
            self
        }

        pub fn failing_inbound(mut self) -> Self {
            self.fail_inbound = true;
            self
        }

        pub fn failing_outbound(mut self) -> Self {
            self.fail_outbound = true;
            self
        }

        pub fn panicking_inbound(mut self) -> Self {
            self.panic_inbound = true;
            self
        }

        fn record(&self, event: &str) {
            self.log.lock().push(format!("{}:{event}", self.name));
        }
    }

    impl MessageHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn handle_message(&self, ctx: &mut HandlerContext) -> anyhow::Result<bool> {
            match ctx.direction() {
                Direction::Outbound => {
                    self.record("out");
                    if self.fail_outbound {
                        anyhow::bail!("{} rejected the request", self.name);
                    }
                    if self.veto_outbound {
                        if let Some(body) = &self.compose {
                            ctx.replace_message(Message::new(Body::Content(body.clone())));
                        }
                        return Ok(false);
                    }
                }
                Direction::Inbound => {
                    self.record("in");
                    if self.fail_inbound {
                        anyhow::bail!("{} rejected the response", self.name);
                    }
                    if self.panic_inbound {
                        panic!("{} blew up on the response", self.name);
                    }
                }
            }
            Ok(true)
        }

        fn handle_fault(&self, _ctx: &mut HandlerContext) -> anyhow::Result<bool> {
            self.record("fault");
            Ok(true)
        }

        fn close(&self, _ctx: &HandlerContext) {
            self.record("close");
        }

        fn understood_headers(&self) -> Vec<QName> {
            self.understood.clone()
        }
    }

    pub fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn entries(log: &Log) -> Vec<String> {
        log.lock().clone()
    }
}

pub mod fixtures {
    use serde_json::{json, Value};
    use std::sync::Once;
    use wsdispatch::{Binding, Body, Envelope, Exchange, FaultDetail, Pattern, Payload, QName};

    static MAY_INIT: Once = Once::new();

    /// Configure `may` once per test binary.
    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x8000);
        });
    }

    pub fn quote_request() -> Value {
        json!({"getQuote": {"symbol": "ACME"}})
    }

    pub fn quote_response() -> Envelope {
        Envelope::new(Binding::Soap11, Body::Content(json!({"price": 42.5})))
    }

    pub fn fault_envelope(binding: Binding) -> Envelope {
        Envelope::new(
            binding,
            Body::Fault(FaultDetail::new(
                QName::new(binding.envelope_namespace(), "Server"),
                "quote service unavailable",
            )),
        )
    }

    pub fn exchange(pattern: Pattern) -> Exchange {
        Exchange::new(Binding::Soap11, pattern, Payload::Structured(quote_request()))
    }
}
