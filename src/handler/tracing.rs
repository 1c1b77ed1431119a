use super::{HandlerContext, MessageHandler};
use tracing::{info, info_span, warn};

/// Logs one structured event per leg inside a `soap_message` span.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHandler;

impl TracingHandler {
    fn record(ctx: &mut HandlerContext, fault: bool) {
        let span = info_span!(
            "soap_message",
            direction = ?ctx.direction(),
            binding = %ctx.binding_id(),
            status = ctx.status().unwrap_or_default(),
        );
        let _guard = span.enter();
        let attachments = ctx.attachments().len();
        match ctx.message() {
            Ok(message) if fault => warn!(
                headers = message.headers.len(),
                attachments,
                "Fault received"
            ),
            Ok(message) => info!(
                headers = message.headers.len(),
                attachments,
                is_fault = message.is_fault(),
                "Message"
            ),
            Err(e) => warn!(error = %e, "Message not readable"),
        }
    }
}

impl MessageHandler for TracingHandler {
    fn name(&self) -> &str {
        "tracing"
    }

    fn handle_message(&self, ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        Self::record(ctx, false);
        Ok(true)
    }

    fn handle_fault(&self, ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        Self::record(ctx, true);
        Ok(true)
    }
}
