use super::{HandlerContext, PlatformHandler};
use crate::binding::BindingId;
use crate::exchange::{CallMetadata, Scope};
use crate::ids::CallId;
use crate::message::{HeaderBlock, QName};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
pub const WSA_ANONYMOUS: &str = "http://www.w3.org/2005/08/addressing/anonymous";

/// Property holding the `MessageID` sent on the request.
pub const PROP_MESSAGE_ID: &str = "wsa.message_id";
/// Property holding the `RelatesTo` value of the response.
pub const PROP_RELATES_TO: &str = "wsa.relates_to";

const UNDERSTOOD: [&str; 7] = [
    "To",
    "Action",
    "MessageID",
    "RelatesTo",
    "ReplyTo",
    "FaultTo",
    "From",
];

fn wsa(local: &str) -> QName {
    QName::new(WSA_NS, local)
}

/// WS-Addressing platform handler.
///
/// Outbound it stamps `To`, `Action`, `MessageID` and an anonymous `ReplyTo`;
/// inbound it claims the addressing headers for must-understand checks and
/// records `RelatesTo` in the context properties.
#[derive(Debug, Clone, Default)]
pub struct AddressingHandler {
    bindings: Option<Vec<BindingId>>,
}

impl AddressingHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the handler to the given binding ids.
    #[must_use]
    pub fn for_bindings(bindings: impl IntoIterator<Item = BindingId>) -> Self {
        Self {
            bindings: Some(bindings.into_iter().collect()),
        }
    }
}

impl PlatformHandler for AddressingHandler {
    fn applies_to(&self, binding_id: BindingId) -> bool {
        self.bindings
            .as_ref()
            .map_or(true, |ids| ids.contains(&binding_id))
    }

    fn outbound(
        &self,
        ctx: &mut HandlerContext,
        metadata: &CallMetadata,
        call_id: CallId,
    ) -> anyhow::Result<()> {
        let message_id = call_id.as_message_id();
        let message = ctx.message_mut()?;
        if let Some(to) = &metadata.endpoint_address {
            message.set_header(HeaderBlock::new(wsa("To"), json!(to)));
        }
        if let Some(action) = metadata.action.as_deref().filter(|a| !a.is_empty()) {
            message.set_header(HeaderBlock::new(wsa("Action"), json!(action)).must_understand());
        }
        message.set_header(HeaderBlock::new(wsa("MessageID"), json!(message_id)));
        message.set_header(HeaderBlock::new(
            wsa("ReplyTo"),
            json!({ "Address": WSA_ANONYMOUS }),
        ));
        ctx.properties_mut()
            .set(PROP_MESSAGE_ID, Value::String(message_id), Scope::Local);
        Ok(())
    }

    fn inbound(&self, ctx: &mut HandlerContext) -> anyhow::Result<()> {
        let relates_to = ctx
            .message()?
            .header(&wsa("RelatesTo"))
            .map(|h| h.value.clone());
        let Some(relates_to) = relates_to else {
            return Ok(());
        };
        if let Some(sent) = ctx.properties().get(PROP_MESSAGE_ID) {
            if sent != &relates_to {
                warn!(sent = %sent, relates_to = %relates_to, "RelatesTo does not match MessageID");
            }
        }
        debug!(relates_to = %relates_to, "Response correlated");
        ctx.properties_mut()
            .set(PROP_RELATES_TO, relates_to, Scope::Application);
        Ok(())
    }

    fn understood_headers(&self) -> Vec<QName> {
        UNDERSTOOD.iter().copied().map(wsa).collect()
    }
}
