use super::{Direction, HandlerContext, MessageHandler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Handler collecting message counters.
///
/// All counters use relaxed atomics; values are eventually consistent.
/// With [`veto_outbound`](Self::veto_outbound) set, the handler stops every
/// outbound leg and counts it as a veto.
#[derive(Debug, Default)]
pub struct MetricsHandler {
    outbound: AtomicUsize,
    inbound: AtomicUsize,
    faults: AtomicUsize,
    vetoes: AtomicUsize,
    closes: AtomicUsize,
    veto: AtomicBool,
}

impl MetricsHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop (or stop stopping) outbound messages.
    pub fn veto_outbound(&self, veto: bool) {
        self.veto.store(veto, Ordering::Relaxed);
    }

    #[must_use]
    pub fn outbound_count(&self) -> usize {
        self.outbound.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn inbound_count(&self) -> usize {
        self.inbound.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn fault_count(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn veto_count(&self) -> usize {
        self.vetoes.load(Ordering::Relaxed)
    }

    /// Times the chain was force-closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Relaxed)
    }
}

impl MessageHandler for MetricsHandler {
    fn name(&self) -> &str {
        "metrics"
    }

    fn handle_message(&self, ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        match ctx.direction() {
            Direction::Outbound => {
                self.outbound.fetch_add(1, Ordering::Relaxed);
                if self.veto.load(Ordering::Relaxed) {
                    self.vetoes.fetch_add(1, Ordering::Relaxed);
                    return Ok(false);
                }
            }
            Direction::Inbound => {
                self.inbound.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(true)
    }

    fn handle_fault(&self, _ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        self.faults.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn close(&self, _ctx: &HandlerContext) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }
}
