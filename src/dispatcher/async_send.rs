use super::core::Prepared;
use super::future::{CallResult, Dispatched, ResponseCallback, ResponseFuture};
use super::{CallbackRegistry, Dispatcher};
use crate::error::DispatchError;
use crate::exchange::{Exchange, Outcome, Response};
use crate::ids::CallId;
use crate::worker_pool::{AsyncTaskPool, PoolMetrics};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl Dispatcher {
    /// Asynchronous path.
    ///
    /// Encoding and the outbound chain run here, on the caller's thread, so
    /// their errors are returned directly. Transmit and receive run on a
    /// private copy of the exchange inside the async task pool.
    pub(crate) fn send_async(&self, exchange: &mut Exchange) -> Result<Dispatched, DispatchError> {
        let call_id = exchange.id();
        let codec = self.resolve_codec(exchange)?;
        let prepared = match self.pipeline.prepare(exchange, codec) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(call_id = %call_id, error = %err, "Async preparation failed");
                exchange.finish();
                return Err(err);
            }
        };

        if let Prepared::ShortCircuit = prepared {
            exchange.finish();
            let result = exchange
                .take_outcome()
                .map_or(Ok(Response::Empty), Outcome::into_result);
            deliver(self.callbacks.as_deref(), exchange.callback(), call_id, &result);
            return Ok(Dispatched::Scheduled(ResponseFuture::ready(call_id, result)));
        }

        match self.schedule(exchange) {
            Ok(future) => {
                debug!(call_id = %call_id, "Exchange scheduled");
                Ok(Dispatched::Scheduled(future))
            }
            Err(err) => {
                error!(call_id = %call_id, error = %err, "Failed to schedule async exchange");
                exchange.fail(err);
                exchange.finish();
                Ok(Dispatched::Completed)
            }
        }
    }

    fn schedule(&self, exchange: &mut Exchange) -> Result<ResponseFuture, DispatchError> {
        let pool = self.async_pool()?;
        let mut copy = exchange.fork();
        let call_id = copy.id();
        let (completer, future) = ResponseFuture::pair(call_id);

        let callback = copy.callback().cloned();
        let registry = self.callbacks.clone();
        if let (Some(registry), Some(callback)) = (&registry, &callback) {
            registry.register(call_id, Arc::clone(callback));
        }
        let pending = PendingCallback {
            registry: registry.clone(),
            call_id,
        };

        let pipeline = self.pipeline.clone();
        let task = Box::new(move || {
            let _pending = pending;
            let outcome = pipeline
                .transmit(&mut copy)
                .and_then(|()| pipeline.receive(&mut copy));
            if let Err(err) = outcome {
                warn!(call_id = %call_id, error = %err, "Async exchange failed");
                copy.fail(err);
            }
            copy.finish();
            let result = copy.into_result();
            deliver(registry.as_deref(), callback.as_ref(), call_id, &result);
            completer.complete(result);
        });

        // a rejected task is dropped, and its guard unregisters the callback
        pool.submit(task)?;
        Ok(future)
    }

    /// The pool, created on first use.
    fn async_pool(&self) -> Result<Arc<AsyncTaskPool>, DispatchError> {
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(AsyncTaskPool::new(&self.config)?);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Release the async task pool. Queued tasks still run; the next async
    /// call creates a fresh pool. Returns `false` if no pool existed.
    pub fn shutdown_async_pool(&self) -> bool {
        let released = self.pool.lock().take().is_some();
        if released {
            info!("Async task pool released");
        }
        released
    }

    /// Metrics of the async task pool, once it exists.
    #[must_use]
    pub fn async_pool_metrics(&self) -> Option<Arc<PoolMetrics>> {
        self.pool.lock().as_ref().map(|pool| Arc::clone(pool.metrics()))
    }
}

/// Removes a registered callback when its task ends without delivering,
/// which happens when the task panics.
struct PendingCallback {
    registry: Option<Arc<CallbackRegistry>>,
    call_id: CallId,
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        if let Some(registry) = &self.registry {
            if registry.unregister(self.call_id) {
                warn!(
                    call_id = %self.call_id,
                    "Async task ended without a result - callback dropped"
                );
            }
        }
    }
}

/// Route a finished async result: the registry when it holds the call,
/// otherwise the exchange's own callback.
fn deliver(
    registry: Option<&CallbackRegistry>,
    callback: Option<&Arc<dyn ResponseCallback>>,
    call_id: CallId,
    result: &CallResult,
) {
    if registry.is_some_and(|r| r.dispatch(call_id, result)) {
        return;
    }
    if let Some(callback) = callback {
        callback.on_response(call_id, result);
    }
}
