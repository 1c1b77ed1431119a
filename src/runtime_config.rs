//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the dispatcher.
//!
//! ## Environment Variables
//!
//! ### `WSD_ASYNC_WORKERS`
//!
//! Number of coroutines in the async task pool. Default: `5`.
//!
//! ### `WSD_STACK_SIZE`
//!
//! Stack size for async worker coroutines. Accepts values in:
//! - Decimal: `65536`
//! - Hexadecimal: `0x10000`
//!
//! Default: `0x10000` (64 KB). Handler chains run inside the worker for the
//! receive leg, so this is larger than a bare request handler would need.
//!
//! ### `WSD_CONTENT_NEGOTIATION`
//!
//! `none`, `pessimistic` or `optimistic`. Unset keeps the binding default.
//!
//! ### `WSD_DUMP_MESSAGES`
//!
//! `1`/`true` logs every request and response envelope at `trace` level.
//! Connections that expose a debug sink get their dump regardless.
//!
//! ## Usage
//!
//! ```rust
//! use wsdispatch::runtime_config::DispatchConfig;
//!
//! let config = DispatchConfig::from_env();
//! println!("async workers: {}", config.async_workers);
//! ```

use crate::binding::ContentNegotiation;
use std::env;

const DEFAULT_WORKERS: usize = 5;
const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Dispatcher configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Coroutines in the async task pool
    pub async_workers: usize,
    /// Stack size for async worker coroutines in bytes
    pub stack_size: usize,
    /// Process-wide negotiation override; `None` keeps the binding default
    pub content_negotiation: Option<ContentNegotiation>,
    /// Log request/response envelopes at `trace`
    pub dump_messages: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            async_workers: DEFAULT_WORKERS,
            stack_size: DEFAULT_STACK_SIZE,
            content_negotiation: None,
            dump_messages: false,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let async_workers = get("WSD_ASYNC_WORKERS")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_WORKERS);

        let stack_size = get("WSD_STACK_SIZE")
            .and_then(|v| parse_size(&v))
            .unwrap_or(DEFAULT_STACK_SIZE);

        let content_negotiation = get("WSD_CONTENT_NEGOTIATION").and_then(|v| {
            let parsed = ContentNegotiation::parse(&v);
            if parsed.is_none() {
                tracing::warn!(
                    value = %v,
                    "Unknown WSD_CONTENT_NEGOTIATION - using binding default"
                );
            }
            parsed
        });

        let dump_messages = get("WSD_DUMP_MESSAGES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        DispatchConfig {
            async_workers,
            stack_size,
            content_negotiation,
            dump_messages,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
