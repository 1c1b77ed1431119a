use super::HandlerContext;
use crate::binding::BindingId;
use crate::exchange::CallMetadata;
use crate::ids::CallId;
use crate::message::QName;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Direction a message travels through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Which half of the exchange a leg belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    Request,
    Response,
}

/// A single interceptor.
///
/// Returning `Ok(false)` from [`handle_message`](Self::handle_message) stops
/// the remaining handlers on that leg; on the outbound leg it also vetoes
/// transmission.
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle_message(&self, _ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn handle_fault(&self, _ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn close(&self, _ctx: &HandlerContext) {}

    /// Header blocks this handler processes for must-understand purposes.
    fn understood_headers(&self) -> Vec<QName> {
        Vec::new()
    }
}

/// The interceptor pipeline the dispatcher drives.
pub trait HandlerChain: Send + Sync {
    fn has_handlers(&self) -> bool;

    /// Run one leg. `false` means a handler stopped the leg; only the
    /// outbound leg treats that as a veto.
    fn invoke(
        &self,
        direction: Direction,
        leg: Leg,
        ctx: &mut HandlerContext,
        response_expected: bool,
    ) -> anyhow::Result<bool>;

    /// Inbound leg for a fault response.
    fn invoke_fault_path(&self, ctx: &mut HandlerContext) -> anyhow::Result<bool>;

    /// Notify every handler that the exchange is being torn down.
    fn force_close_all(&self, ctx: &HandlerContext);

    fn understood_headers(&self) -> HashSet<QName>;
}

/// Cross-cutting handler owned by the platform rather than the caller.
///
/// Invoked around the user chain for the bindings it applies to, and
/// present even when the user chain is empty.
pub trait PlatformHandler: Send + Sync {
    fn applies_to(&self, _binding_id: BindingId) -> bool {
        true
    }

    fn outbound(
        &self,
        ctx: &mut HandlerContext,
        metadata: &CallMetadata,
        call_id: CallId,
    ) -> anyhow::Result<()>;

    fn inbound(&self, ctx: &mut HandlerContext) -> anyhow::Result<()>;

    fn understood_headers(&self) -> Vec<QName> {
        Vec::new()
    }
}

/// Ordered list of handlers.
///
/// Outbound legs run in registration order; inbound legs and the fault path
/// run in reverse, so the first handler registered is the outermost one.
#[derive(Clone, Default)]
pub struct HandlerList {
    handlers: SmallVec<[Arc<dyn MessageHandler>; 4]>,
}

impl HandlerList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handler: Arc<dyn MessageHandler>) {
        self.handlers.push(handler);
    }

    #[must_use]
    pub fn with(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.add(handler);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn ordered(
        &self,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = &Arc<dyn MessageHandler>> + '_> {
        match direction {
            Direction::Outbound => Box::new(self.handlers.iter()),
            Direction::Inbound => Box::new(self.handlers.iter().rev()),
        }
    }
}

impl HandlerChain for HandlerList {
    fn has_handlers(&self) -> bool {
        !self.handlers.is_empty()
    }

    fn invoke(
        &self,
        direction: Direction,
        leg: Leg,
        ctx: &mut HandlerContext,
        response_expected: bool,
    ) -> anyhow::Result<bool> {
        ctx.set_direction(direction);
        for handler in self.ordered(direction) {
            if !handler.handle_message(ctx)? {
                debug!(
                    handler = handler.name(),
                    ?direction,
                    ?leg,
                    response_expected,
                    "Handler stopped the chain"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn invoke_fault_path(&self, ctx: &mut HandlerContext) -> anyhow::Result<bool> {
        ctx.set_direction(Direction::Inbound);
        for handler in self.ordered(Direction::Inbound) {
            if !handler.handle_fault(ctx)? {
                debug!(handler = handler.name(), "Fault path stopped");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn force_close_all(&self, ctx: &HandlerContext) {
        warn!(handlers = self.handlers.len(), "Force-closing handler chain");
        for handler in self.ordered(Direction::Inbound) {
            handler.close(ctx);
        }
    }

    fn understood_headers(&self) -> HashSet<QName> {
        self.handlers
            .iter()
            .flat_map(|h| h.understood_headers())
            .collect()
    }
}

impl fmt::Debug for HandlerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| h.name().to_string()))
            .finish()
    }
}
