//! Batched call proxy for one remote drawing context.
//!
//! Every crossing of the call channel is expensive, so the proxy coalesces mutating calls
//! into `callBatch` transmissions while keeping a strict global FIFO order:
//!
//! - The first operation registers the remote context (`add`), exactly once.
//! - [`enqueue`](BatchedContextProxy::enqueue) appends to the queue and flushes the whole
//!   queue immediately, unless a batch scope is open or a flush is already in flight. In
//!   those cases the call waits for the next flush.
//! - Read-backs drain the queue (waiting for an in-flight flush first) before their own
//!   request, so they observe every mutation enqueued before them.
//! - At most one transmission is in flight at a time.
//!
//! One mutex guards the lifecycle, the queue and both flags. It is only held for
//! bookkeeping; every channel round trip happens with the lock released. Callers that need
//! to wait for another caller's round trip park on a [`Notify`] instead.
//!
//! # Example
//!
//! ```ignore
//! let proxy = BatchedContextProxy::new(handle, ContextDescriptor::new("Canvas2d"), channel);
//!
//! proxy.begin_batch().await?;
//! proxy.enqueue("fillStyle", false, vec![json!("red")]).await?;
//! proxy.enqueue("fillRect", true, vec![json!(0), json!(0), json!(10), json!(10)]).await?;
//! proxy.end_batch().await?; // one transmission
//!
//! let fill: String = proxy.get_property("fillStyle").await?;
//! ```

use crate::call::{encode_batch, PendingCall};
use crate::channel::{OperationPath, RemoteAction, RemoteCallChannel};
use crate::config::ProxyConfig;
use crate::context::{ContextDescriptor, ContextHandle, RenderSize};
use crate::error::{ChannelError, ProxyError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Lifecycle stage of a proxy. Transitions are linear; `Disposed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// No registration attempted yet, or the last attempt failed.
    Uninitialized,
    /// A caller is waiting for the `add` round trip.
    Initializing,
    /// Registered; calls may reach the channel.
    Ready,
    /// Disposed; every operation fails.
    Disposed,
}

#[derive(Debug)]
struct ProxyState {
    lifecycle: Lifecycle,
    queue: Vec<PendingCall>,
    batch_scope_open: bool,
    flush_in_flight: bool,
}

impl ProxyState {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            queue: Vec::new(),
            batch_scope_open: false,
            flush_in_flight: false,
        }
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Disposed => Err(ProxyError::AlreadyDisposed),
            _ => Ok(()),
        }
    }

    /// Snapshot and clear the queue in one step, marking the flush in flight.
    fn begin_flush(&mut self) -> Vec<PendingCall> {
        self.flush_in_flight = true;
        std::mem::take(&mut self.queue)
    }
}

/// Client-side proxy for one remote drawing context.
///
/// Share it between concurrent callers behind an `Arc`; every operation takes `&self`.
/// Dropping the proxy disposes it.
pub struct BatchedContextProxy {
    handle: ContextHandle,
    descriptor: ContextDescriptor,
    channel: Arc<dyn RemoteCallChannel>,
    config: ProxyConfig,
    state: Mutex<ProxyState>,
    /// Signalled on lifecycle changes and whenever a flush finishes.
    changed: Notify,
}

impl BatchedContextProxy {
    /// Bind a proxy to a surface with the default configuration.
    pub fn new(
        handle: ContextHandle,
        descriptor: ContextDescriptor,
        channel: Arc<dyn RemoteCallChannel>,
    ) -> Self {
        Self::with_config(handle, descriptor, channel, ProxyConfig::default())
    }

    /// Bind a proxy to a surface.
    pub fn with_config(
        handle: ContextHandle,
        descriptor: ContextDescriptor,
        channel: Arc<dyn RemoteCallChannel>,
        config: ProxyConfig,
    ) -> Self {
        Self {
            handle,
            descriptor,
            channel,
            config,
            state: Mutex::new(ProxyState::new()),
            changed: Notify::new(),
        }
    }

    pub fn handle(&self) -> &ContextHandle {
        &self.handle
    }

    pub fn descriptor(&self) -> &ContextDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    pub fn is_batch_scope_open(&self) -> bool {
        self.state.lock().batch_scope_open
    }

    pub fn is_flush_in_flight(&self) -> bool {
        self.state.lock().flush_in_flight
    }

    /// Number of calls waiting for the next flush.
    pub fn pending_calls(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn path(&self, action: RemoteAction) -> OperationPath {
        OperationPath::new(&self.config.namespace, self.descriptor.type_name(), action)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Register the remote context if that has not happened yet.
    ///
    /// Callers arriving while another caller's registration is in flight wait for its
    /// outcome. If that attempt fails, the next waiter makes its own attempt; nothing is
    /// retried on the failing caller's behalf.
    pub async fn ensure_initialized(&self) -> Result<()> {
        loop {
            let changed = self.changed.notified();
            {
                let mut state = self.state.lock();
                match state.lifecycle {
                    Lifecycle::Ready => return Ok(()),
                    Lifecycle::Disposed => return Err(ProxyError::AlreadyDisposed),
                    Lifecycle::Initializing => {}
                    Lifecycle::Uninitialized => {
                        state.lifecycle = Lifecycle::Initializing;
                        break;
                    }
                }
            }
            changed.await;
        }

        self.register().await
    }

    async fn register(&self) -> Result<()> {
        let mut registering = RegistrationGuard {
            proxy: self,
            settled: false,
        };
        let path = self.path(RemoteAction::Add);
        let parameters = self.descriptor.parameters().cloned().unwrap_or(Value::Null);
        tracing::debug!("registering {} for surface {}", path, self.handle);

        let outcome = with_timeout(
            self.config.call_timeout(),
            self.channel.invoke(&self.handle, &path, vec![parameters]),
        )
        .await;

        let disposed = {
            let mut state = self.state.lock();
            match state.lifecycle {
                Lifecycle::Disposed => true,
                _ => {
                    if outcome.is_ok() {
                        state.lifecycle = Lifecycle::Ready;
                    }
                    false
                }
            }
        };
        registering.settled = true;
        drop(registering);

        match outcome {
            Ok(_) if disposed => {
                // Disposal raced the `add`; the registration we just completed is ours to undo.
                self.deregistration().spawn();
                Err(ProxyError::AlreadyDisposed)
            }
            Ok(_) => {
                tracing::debug!("{} context ready for surface {}", self.descriptor.type_name(), self.handle);
                Ok(())
            }
            Err(source) => {
                tracing::debug!("registration of surface {} failed: {}", self.handle, source);
                Err(ProxyError::RegistrationFailed {
                    context: self.descriptor.type_name().to_string(),
                    source,
                })
            }
        }
    }

    /// Mark the proxy disposed and deregister the remote context in the background.
    ///
    /// Idempotent and infallible. Calls still queued are discarded. Deregistration errors
    /// are ignored since the remote side may already be gone. Requires a Tokio runtime to
    /// schedule the `remove` call; without one the deregistration is skipped.
    pub fn dispose(&self) {
        if let Some(deregistration) = self.begin_dispose() {
            deregistration.spawn();
        }
    }

    /// Like [`dispose`](Self::dispose), but waits for the `remove` round trip.
    pub async fn dispose_async(&self) {
        if let Some(deregistration) = self.begin_dispose() {
            deregistration.run().await;
        }
    }

    fn begin_dispose(&self) -> Option<Deregistration> {
        let (previous, discarded) = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.lifecycle, Lifecycle::Disposed);
            let discarded = state.queue.len();
            state.queue.clear();
            state.batch_scope_open = false;
            (previous, discarded)
        };
        if previous == Lifecycle::Disposed {
            return None;
        }
        self.changed.notify_waiters();

        if discarded > 0 {
            tracing::debug!(
                "disposing surface {} with {} unsent call(s)",
                self.handle,
                discarded
            );
        }

        // An in-flight registration deregisters itself once its `add` returns.
        (previous == Lifecycle::Ready).then(|| self.deregistration())
    }

    fn deregistration(&self) -> Deregistration {
        Deregistration {
            channel: Arc::clone(&self.channel),
            handle: self.handle.clone(),
            path: self.path(RemoteAction::Remove),
            timeout: self.config.call_timeout(),
        }
    }

    // =========================================================================
    // Batching
    // =========================================================================

    /// Queue a mutating call.
    ///
    /// Flushes immediately unless a batch scope is open or another flush is in flight.
    /// When this call triggers the flush, the returned future resolves once the batch has
    /// been acknowledged and reports its failure. When the call rides along in somebody
    /// else's flush, this returns `Ok` as soon as the call is queued.
    pub async fn enqueue(
        &self,
        name: impl Into<String>,
        is_method_call: bool,
        args: Vec<Value>,
    ) -> Result<()> {
        self.enqueue_call(PendingCall::new(name, is_method_call, args))
            .await
    }

    /// Queue a prepared [`PendingCall`].
    pub async fn enqueue_call(&self, call: PendingCall) -> Result<()> {
        self.ensure_initialized().await?;

        let batch = {
            let mut state = self.state.lock();
            state.ensure_not_disposed()?;
            state.queue.push(call);
            if state.batch_scope_open || state.flush_in_flight {
                tracing::trace!("deferred call, {} queued", state.queue.len());
                return Ok(());
            }
            state.begin_flush()
        };

        self.transmit(batch).await
    }

    /// Suppress auto-flush until [`end_batch`](Self::end_batch).
    ///
    /// The scope is global to the proxy: calls from every caller accumulate.
    pub async fn begin_batch(&self) -> Result<()> {
        self.ensure_initialized().await?;

        let mut state = self.state.lock();
        state.ensure_not_disposed()?;
        state.batch_scope_open = true;
        Ok(())
    }

    /// Close the batch scope and send everything accumulated as one transmission.
    ///
    /// Sends nothing when the queue is empty.
    pub async fn end_batch(&self) -> Result<()> {
        self.drain(true).await
    }

    /// Send whatever is queued, after any in-flight transmission has finished.
    pub async fn flush(&self) -> Result<()> {
        self.drain(false).await
    }

    async fn drain(&self, close_scope: bool) -> Result<()> {
        loop {
            let changed = self.changed.notified();
            let batch = {
                let mut state = self.state.lock();
                state.ensure_not_disposed()?;
                if state.flush_in_flight {
                    None
                } else if state.queue.is_empty() {
                    if close_scope {
                        state.batch_scope_open = false;
                    }
                    return Ok(());
                } else {
                    Some(state.begin_flush())
                }
            };

            match batch {
                Some(batch) => return self.transmit(batch).await,
                None => changed.await,
            }
        }
    }

    /// Transmit a snapshot taken by [`ProxyState::begin_flush`].
    async fn transmit(&self, batch: Vec<PendingCall>) -> Result<()> {
        let in_flight = FlushGuard { proxy: self };
        let calls = batch.len();
        let path = self.path(RemoteAction::CallBatch);
        tracing::trace!("flushing {} call(s) to {}", calls, path);

        let outcome = with_timeout(
            self.config.call_timeout(),
            self.channel
                .invoke_void(&self.handle, &path, vec![encode_batch(batch)]),
        )
        .await;
        drop(in_flight);

        outcome.map_err(|source| {
            tracing::debug!("batch of {} call(s) for surface {} failed: {}", calls, self.handle, source);
            ProxyError::FlushFailed { calls, source }
        })
    }

    // =========================================================================
    // Read-back
    // =========================================================================

    /// Invoke a remote method and decode its result.
    ///
    /// Every call enqueued before this one reaches the remote side first.
    pub async fn invoke_with_result<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T> {
        self.ensure_initialized().await?;
        self.drain(false).await?;

        let mut call_args = vec![Value::String(method.to_string())];
        if !args.is_empty() {
            call_args.push(Value::Array(args));
        }
        let value = self.request(RemoteAction::Call, method, call_args).await?;
        decode(method, value)
    }

    /// Read a remote property after draining the queue.
    pub async fn get_property<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.ensure_initialized().await?;
        self.drain(false).await?;

        let value = self
            .request(RemoteAction::GetProperty, name, vec![Value::String(name.to_string())])
            .await?;
        decode(name, value)
    }

    /// Query the surface's actual render size.
    ///
    /// Registers first if needed, but skips the queue: pending calls are not drained.
    pub async fn resize_query(&self) -> Result<RenderSize> {
        self.ensure_initialized().await?;

        let action = RemoteAction::GetActualRenderSize;
        let value = self.request(action, action.as_str(), Vec::new()).await?;
        decode::<[f32; 2]>(action.as_str(), value).map(RenderSize::from)
    }

    async fn request(&self, action: RemoteAction, operation: &str, args: Vec<Value>) -> Result<Value> {
        self.state.lock().ensure_not_disposed()?;

        let path = self.path(action);
        with_timeout(
            self.config.call_timeout(),
            self.channel.invoke(&self.handle, &path, args),
        )
        .await
        .map_err(|source| ProxyError::ReadBackFailed {
            operation: operation.to_string(),
            source,
        })
    }
}

impl Drop for BatchedContextProxy {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for BatchedContextProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedContextProxy")
            .field("handle", &self.handle)
            .field("descriptor", &self.descriptor)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight flag and the batch scope when a transmission ends, including when
/// the transmitting future is dropped mid-flight.
struct FlushGuard<'a> {
    proxy: &'a BatchedContextProxy,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.proxy.state.lock();
            state.flush_in_flight = false;
            state.batch_scope_open = false;
        }
        self.proxy.changed.notify_waiters();
    }
}

/// Returns an unfinished registration to `Uninitialized` so a later caller can retry.
///
/// When the registering future is dropped before the `add` settles and the proxy was
/// disposed meanwhile, the `add` may still have reached the host, so a `remove` is sent.
struct RegistrationGuard<'a> {
    proxy: &'a BatchedContextProxy,
    settled: bool,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        let abandoned_after_dispose = {
            let mut state = self.proxy.state.lock();
            match state.lifecycle {
                Lifecycle::Initializing => {
                    state.lifecycle = Lifecycle::Uninitialized;
                    false
                }
                Lifecycle::Disposed => !self.settled,
                _ => false,
            }
        };
        self.proxy.changed.notify_waiters();

        if abandoned_after_dispose {
            tracing::debug!(
                "registration of surface {} abandoned after dispose",
                self.proxy.handle
            );
            self.proxy.deregistration().spawn();
        }
    }
}

/// A pending `remove` call, detached from the proxy so it can outlive it.
struct Deregistration {
    channel: Arc<dyn RemoteCallChannel>,
    handle: ContextHandle,
    path: OperationPath,
    timeout: Option<Duration>,
}

impl Deregistration {
    async fn run(self) {
        let outcome = with_timeout(
            self.timeout,
            self.channel.invoke(&self.handle, &self.path, Vec::new()),
        )
        .await;
        match outcome {
            Ok(_) => tracing::debug!("deregistered surface {}", self.handle),
            Err(error) => {
                tracing::debug!("ignoring failed deregistration of surface {}: {}", self.handle, error)
            }
        }
    }

    fn spawn(self) {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(self.run());
            }
            Err(_) => tracing::warn!(
                "no async runtime to deregister surface {}; remote context left registered",
                self.handle
            ),
        }
    }
}

async fn with_timeout<T, F>(limit: Option<Duration>, call: F) -> std::result::Result<T, ChannelError>
where
    F: Future<Output = std::result::Result<T, ChannelError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(ChannelError::Timeout(limit))),
        None => call.await,
    }
}

fn decode<T: DeserializeOwned>(operation: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| ProxyError::Decode {
        operation: operation.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingChannel;
    use serde_json::json;

    fn proxy_on(channel: &Arc<RecordingChannel>) -> BatchedContextProxy {
        BatchedContextProxy::new(
            ContextHandle::new("surface"),
            ContextDescriptor::new("Canvas2d"),
            channel.clone(),
        )
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = proxy_on(&channel);
        assert_eq!(proxy.lifecycle(), Lifecycle::Uninitialized);

        proxy.ensure_initialized().await.unwrap();
        assert_eq!(proxy.lifecycle(), Lifecycle::Ready);

        proxy.dispose_async().await;
        assert_eq!(proxy.lifecycle(), Lifecycle::Disposed);
        assert_eq!(channel.count(RemoteAction::Remove), 1);
    }

    #[tokio::test]
    async fn test_registration_passes_descriptor_parameters() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = BatchedContextProxy::new(
            ContextHandle::new("gl"),
            ContextDescriptor::new("WebGL").with_parameters(json!({ "depth": false })),
            channel.clone(),
        );

        proxy.ensure_initialized().await.unwrap();

        let adds = channel.calls_for(RemoteAction::Add);
        let add = &adds[0];
        assert_eq!(add.target, ContextHandle::new("gl"));
        assert_eq!(add.path.to_string(), "Easel.WebGL.add");
        assert_eq!(add.args, vec![json!({ "depth": false })]);
    }

    #[tokio::test]
    async fn test_dispose_before_registration_sends_nothing() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = proxy_on(&channel);

        proxy.dispose_async().await;

        assert!(channel.calls().is_empty());
        assert!(matches!(
            proxy.ensure_initialized().await,
            Err(ProxyError::AlreadyDisposed)
        ));
    }

    #[tokio::test]
    async fn test_resize_query_registers_first() {
        let channel = Arc::new(RecordingChannel::new());
        channel.set_render_size(640.0, 480.0);
        let proxy = proxy_on(&channel);

        let size = proxy.resize_query().await.unwrap();

        assert_eq!(size, RenderSize::new(640.0, 480.0));
        let actions: Vec<RemoteAction> = channel.calls().iter().map(|c| c.action()).collect();
        assert_eq!(actions, vec![RemoteAction::Add, RemoteAction::GetActualRenderSize]);
    }

    #[tokio::test]
    async fn test_resize_query_skips_the_queue() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = proxy_on(&channel);

        proxy.begin_batch().await.unwrap();
        proxy.enqueue("save", true, vec![]).await.unwrap();
        proxy.resize_query().await.unwrap();

        assert_eq!(proxy.pending_calls(), 1);
        assert_eq!(channel.count(RemoteAction::CallBatch), 0);
    }

    #[tokio::test]
    async fn test_resize_query_surfaces_registration_failure() {
        let channel = Arc::new(RecordingChannel::new());
        channel.fail_next(RemoteAction::Add, ChannelError::Transport("down".into()));
        let proxy = proxy_on(&channel);

        let result = proxy.resize_query().await;

        assert!(matches!(result, Err(ProxyError::RegistrationFailed { .. })));
        assert_eq!(channel.count(RemoteAction::GetActualRenderSize), 0);
    }

    #[tokio::test]
    async fn test_invoke_with_result_argument_shapes() {
        let channel = Arc::new(RecordingChannel::new());
        channel.respond_to("isPointInPath", json!(true));
        let proxy = proxy_on(&channel);

        let hit: bool = proxy
            .invoke_with_result("isPointInPath", vec![json!(1.0), json!(2.0)])
            .await
            .unwrap();
        let _: Value = proxy.invoke_with_result("getLineDash", vec![]).await.unwrap();

        assert!(hit);
        let calls = channel.calls_for(RemoteAction::Call);
        assert_eq!(calls[0].args, vec![json!("isPointInPath"), json!([1.0, 2.0])]);
        assert_eq!(calls[1].args, vec![json!("getLineDash")]);
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_reported() {
        let channel = Arc::new(RecordingChannel::new());
        channel.respond_to("measureText", json!("not a number"));
        let proxy = proxy_on(&channel);

        let result = proxy.invoke_with_result::<f64>("measureText", vec![json!("x")]).await;

        match result {
            Err(ProxyError::Decode { operation, .. }) => assert_eq!(operation, "measureText"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_end_batch_without_calls_closes_scope() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = proxy_on(&channel);

        proxy.begin_batch().await.unwrap();
        assert!(proxy.is_batch_scope_open());
        proxy.end_batch().await.unwrap();

        assert!(!proxy.is_batch_scope_open());
        assert_eq!(channel.count(RemoteAction::CallBatch), 0);
    }

    #[tokio::test]
    async fn test_dispose_discards_queued_calls() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = proxy_on(&channel);

        proxy.begin_batch().await.unwrap();
        proxy.enqueue("save", true, vec![]).await.unwrap();
        assert_eq!(proxy.pending_calls(), 1);

        proxy.dispose_async().await;

        assert_eq!(proxy.pending_calls(), 0);
        assert_eq!(channel.count(RemoteAction::CallBatch), 0);
    }

    #[test]
    fn test_dispose_without_runtime_does_not_panic() {
        let channel = Arc::new(RecordingChannel::new());
        let proxy = proxy_on(&channel);
        proxy.state.lock().lifecycle = Lifecycle::Ready;

        proxy.dispose();
        proxy.dispose();

        assert_eq!(proxy.lifecycle(), Lifecycle::Disposed);
        assert!(channel.calls().is_empty());
    }
}
