use crate::binding::{Binding, ContentNegotiation};
use crate::message::{Attachment, AttachmentMap};
use crate::runtime_config::DispatchConfig;
use serde_json::Value;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Visibility of a passthrough property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Stays on the call; never leaves the dispatcher.
    Local,
    /// Propagated to the transport context.
    Transport,
    /// Propagated to the transport and visible to handlers and on the response.
    Application,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Value,
    pub scope: Scope,
}

/// Ordered key/value bag for properties without a dedicated field.
///
/// Insertion order is preserved; setting an existing key replaces it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: Vec<Property>,
}

impl PropertyBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value, scope: Scope) {
        let key = key.into();
        if let Some(existing) = self.entries.iter_mut().find(|p| p.key == key) {
            existing.value = value;
            existing.scope = scope;
        } else {
            self.entries.push(Property { key, value, scope });
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|p| p.key == key)?;
        Some(self.entries.remove(idx).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    /// Entries visible at `scope` or wider.
    pub fn visible_at(&self, scope: Scope) -> impl Iterator<Item = &Property> {
        self.entries.iter().filter(move |p| match scope {
            Scope::Local => true,
            Scope::Transport => p.scope != Scope::Local,
            Scope::Application => p.scope == Scope::Application,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Negotiation mode shared between a [`RequestContext`] and the calls made from it.
#[derive(Debug, Clone)]
pub struct NegotiationCell(Arc<AtomicU8>);

impl NegotiationCell {
    #[must_use]
    pub fn new(mode: ContentNegotiation) -> Self {
        Self(Arc::new(AtomicU8::new(mode.to_u8())))
    }

    #[must_use]
    pub fn get(&self) -> ContentNegotiation {
        ContentNegotiation::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: ContentNegotiation) {
        self.0.store(mode.to_u8(), Ordering::Release);
    }

    /// Move from `from` to `to` only if the current mode is still `from`.
    pub fn upgrade(&self, from: ContentNegotiation, to: ContentNegotiation) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Typed per-call metadata.
#[derive(Debug, Clone, Default)]
pub struct CallMetadata {
    pub endpoint_address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub action: Option<String>,
    pub content_negotiation: ContentNegotiation,
    /// Binary payload optimization (MTOM).
    pub mtom_enabled: bool,
    /// Extra HTTP request headers supplied by the caller.
    pub http_headers: Vec<(String, String)>,
    pub outbound_attachments: AttachmentMap,
    pub properties: PropertyBag,
    pub(crate) origin: Option<NegotiationCell>,
}

impl CallMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, address: &str) -> Self {
        self.endpoint_address = Some(address.to_string());
        self
    }

    #[must_use]
    pub fn with_negotiation(mut self, mode: ContentNegotiation) -> Self {
        self.content_negotiation = mode;
        self
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.outbound_attachments
            .insert(attachment.content_id.clone(), attachment);
    }

    /// Cell of the originating request context, if the call came from one.
    #[must_use]
    pub fn origin(&self) -> Option<&NegotiationCell> {
        self.origin.as_ref()
    }
}

/// Originating metadata bag for a logical binding (one per client proxy).
///
/// Each call takes a snapshot through [`RequestContext::metadata`]; the
/// negotiation mode stays shared so that what one response teaches is seen
/// by the next call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    binding: Binding,
    template: CallMetadata,
    negotiation: NegotiationCell,
}

impl RequestContext {
    #[must_use]
    pub fn new(binding: Binding) -> Self {
        Self::with_mode(binding, binding.negotiation_default())
    }

    /// Context whose negotiation mode comes from the runtime configuration.
    #[must_use]
    pub fn from_config(binding: Binding, config: &DispatchConfig) -> Self {
        Self::with_mode(
            binding,
            config
                .content_negotiation
                .unwrap_or_else(|| binding.negotiation_default()),
        )
    }

    fn with_mode(binding: Binding, mode: ContentNegotiation) -> Self {
        Self {
            binding,
            template: CallMetadata::default(),
            negotiation: NegotiationCell::new(mode),
        }
    }

    #[must_use]
    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// Mutable access to the per-call defaults.
    pub fn template_mut(&mut self) -> &mut CallMetadata {
        &mut self.template
    }

    #[must_use]
    pub fn negotiation(&self) -> ContentNegotiation {
        self.negotiation.get()
    }

    pub fn set_negotiation(&self, mode: ContentNegotiation) {
        self.negotiation.set(mode);
    }

    /// Snapshot of the bag for one outgoing call.
    #[must_use]
    pub fn metadata(&self) -> CallMetadata {
        let mut metadata = self.template.clone();
        metadata.content_negotiation = self.negotiation.get();
        metadata.origin = Some(self.negotiation.clone());
        metadata
    }
}
