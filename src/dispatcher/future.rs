use crate::error::DispatchError;
use crate::exchange::Response;
use crate::ids::CallId;
use dashmap::DashMap;
use may::sync::mpsc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Final result of one asynchronous exchange.
pub type CallResult = Result<Response, DispatchError>;

/// Receives the result of an async-callback exchange.
pub trait ResponseCallback: Send + Sync {
    fn on_response(&self, call_id: CallId, result: &CallResult);
}

/// What [`Dispatcher::send`](super::Dispatcher::send) did with an exchange.
#[derive(Debug)]
pub enum Dispatched {
    /// The response slot of the exchange holds the outcome.
    Completed,
    /// Transmit and receive run in the background.
    Scheduled(ResponseFuture),
}

impl Dispatched {
    #[must_use]
    pub fn into_future(self) -> Option<ResponseFuture> {
        match self {
            Dispatched::Completed => None,
            Dispatched::Scheduled(future) => Some(future),
        }
    }
}

/// Handle to an exchange running on the async task pool.
///
/// Dropping the handle discards the result; the task still runs.
pub struct ResponseFuture {
    call_id: CallId,
    rx: mpsc::Receiver<CallResult>,
    done: Arc<AtomicBool>,
    taken: bool,
}

/// Completing half of a [`ResponseFuture`].
pub(crate) struct Completer {
    call_id: CallId,
    tx: mpsc::Sender<CallResult>,
    done: Arc<AtomicBool>,
}

impl ResponseFuture {
    pub(crate) fn pair(call_id: CallId) -> (Completer, ResponseFuture) {
        let (tx, rx) = mpsc::channel();
        let done = Arc::new(AtomicBool::new(false));
        (
            Completer {
                call_id,
                tx,
                done: Arc::clone(&done),
            },
            ResponseFuture {
                call_id,
                rx,
                done,
                taken: false,
            },
        )
    }

    /// Future that already holds `result`.
    pub(crate) fn ready(call_id: CallId, result: CallResult) -> ResponseFuture {
        let (completer, future) = Self::pair(call_id);
        completer.complete(result);
        future
    }

    #[must_use]
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Whether the result is available.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Take the result if it is available. Returns `None` before completion
    /// and after the result was taken.
    pub fn try_take(&mut self) -> Option<CallResult> {
        if self.taken {
            return None;
        }
        let result = self.rx.try_recv().ok()?;
        self.taken = true;
        Some(result)
    }

    /// Block until the result is available.
    pub fn wait(self) -> CallResult {
        if self.taken {
            return Err(DispatchError::runtime("response already taken"));
        }
        self.rx.recv().map_err(|_| {
            DispatchError::runtime("async task terminated before completing")
        })?
    }
}

impl std::fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("call_id", &self.call_id)
            .field("done", &self.is_done())
            .field("taken", &self.taken)
            .finish()
    }
}

impl Completer {
    pub(crate) fn complete(self, result: CallResult) {
        if self.tx.send(result).is_err() {
            debug!(call_id = %self.call_id, "Response future dropped - result discarded");
        }
        self.done.store(true, Ordering::Release);
    }
}

/// Registry that routes async-callback results by call id.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: DashMap<CallId, Arc<dyn ResponseCallback>>,
}

impl CallbackRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, call_id: CallId, callback: Arc<dyn ResponseCallback>) {
        if self.callbacks.insert(call_id, callback).is_some() {
            warn!(call_id = %call_id, "Replaced callback registered for the same call");
        }
    }

    /// Invoke and remove the callback for `call_id`. Returns `false` when none
    /// was registered.
    pub fn dispatch(&self, call_id: CallId, result: &CallResult) -> bool {
        match self.callbacks.remove(&call_id) {
            Some((_, callback)) => {
                callback.on_response(call_id, result);
                true
            }
            None => false,
        }
    }

    /// Drop the callback for `call_id` without invoking it.
    pub fn unregister(&self, call_id: CallId) -> bool {
        self.callbacks.remove(&call_id).is_some()
    }

    /// Callbacks still waiting for their result.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("pending", &self.pending())
            .finish()
    }
}
