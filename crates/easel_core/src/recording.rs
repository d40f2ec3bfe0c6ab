//! In-memory call channel that records traffic and simulates a surface host.
//!
//! [`RecordingChannel`] stands in for the real transport in tests and in the `easel`
//! script runner. Besides recording every call it behaves like a minimal host:
//!
//! - property writes inside `callBatch` are stored per surface and answered by `getProperty`
//! - `call` answers with canned responses registered through [`RecordingChannel::respond_to`]
//! - `getActualRenderSize` reports the size set with [`RecordingChannel::set_render_size`]
//!
//! Failures can be injected per action, and calls of an action can be held in flight to
//! exercise concurrent callers deterministically.

use crate::call::{decode_batch, PendingCall};
use crate::channel::{OperationPath, RemoteAction, RemoteCallChannel};
use crate::context::ContextHandle;
use crate::error::ChannelError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// One call as it reached the channel.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub target: ContextHandle,
    pub path: OperationPath,
    pub args: Vec<Value>,
}

impl RecordedCall {
    pub fn action(&self) -> RemoteAction {
        self.path.action()
    }

    /// Decoded entries of a `callBatch` call; `None` for other actions.
    pub fn batch(&self) -> Option<Vec<PendingCall>> {
        match self.action() {
            RemoteAction::CallBatch => Some(self.args.first().map(decode_batch).unwrap_or_default()),
            _ => None,
        }
    }
}

/// Keeps calls of one action waiting until dropped.
#[derive(Debug)]
pub struct CallHold {
    _permit: OwnedSemaphorePermit,
}

impl CallHold {
    /// Let held calls proceed.
    pub fn release(self) {}
}

#[derive(Default)]
struct HostState {
    calls: Vec<RecordedCall>,
    registered: HashSet<ContextHandle>,
    properties: HashMap<(ContextHandle, String), Value>,
    responses: HashMap<String, Value>,
    render_size: [f32; 2],
    failures: HashMap<RemoteAction, VecDeque<ChannelError>>,
}

impl HostState {
    fn apply(&mut self, target: &ContextHandle, action: RemoteAction, args: &[Value]) -> Value {
        match action {
            RemoteAction::Add => {
                self.registered.insert(target.clone());
                Value::Null
            }
            RemoteAction::Remove => {
                self.registered.remove(target);
                self.properties.retain(|(handle, _), _| handle != target);
                Value::Null
            }
            RemoteAction::CallBatch => {
                let batch = args.first().map(decode_batch).unwrap_or_default();
                for call in batch.into_iter().filter(|call| !call.is_method_call()) {
                    let value = call.args().first().cloned().unwrap_or(Value::Null);
                    self.properties
                        .insert((target.clone(), call.name().to_string()), value);
                }
                Value::Null
            }
            RemoteAction::GetProperty => first_str(args)
                .and_then(|name| self.properties.get(&(target.clone(), name.to_string())))
                .cloned()
                .unwrap_or(Value::Null),
            RemoteAction::Call => first_str(args)
                .and_then(|method| self.responses.get(method))
                .cloned()
                .unwrap_or(Value::Null),
            RemoteAction::GetActualRenderSize => json!(self.render_size),
        }
    }
}

fn first_str(args: &[Value]) -> Option<&str> {
    args.first().and_then(Value::as_str)
}

/// Recording, host-simulating [`RemoteCallChannel`].
#[derive(Default)]
pub struct RecordingChannel {
    host: Mutex<HostState>,
    holds: Mutex<HashMap<RemoteAction, Arc<Semaphore>>>,
    recorded: Notify,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `call` requests for `method` with `value`.
    pub fn respond_to(&self, method: impl Into<String>, value: Value) {
        self.host.lock().responses.insert(method.into(), value);
    }

    /// Size reported by `getActualRenderSize`.
    pub fn set_render_size(&self, width: f32, height: f32) {
        self.host.lock().render_size = [width, height];
    }

    /// Fail the next call of `action` with `error`. Failures queue up in order.
    pub fn fail_next(&self, action: RemoteAction, error: ChannelError) {
        self.host
            .lock()
            .failures
            .entry(action)
            .or_default()
            .push_back(error);
    }

    /// Hold calls of `action` in flight until the returned guard is dropped.
    ///
    /// Held calls are recorded as soon as they arrive. Returns `None` if the action is
    /// already held.
    pub fn hold(&self, action: RemoteAction) -> Option<CallHold> {
        let gate = Arc::clone(
            self.holds
                .lock()
                .entry(action)
                .or_insert_with(|| Arc::new(Semaphore::new(1))),
        );
        gate.try_acquire_owned()
            .ok()
            .map(|permit| CallHold { _permit: permit })
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.host.lock().calls.clone()
    }

    /// Calls of one action, in arrival order.
    pub fn calls_for(&self, action: RemoteAction) -> Vec<RecordedCall> {
        self.host
            .lock()
            .calls
            .iter()
            .filter(|call| call.action() == action)
            .cloned()
            .collect()
    }

    pub fn count(&self, action: RemoteAction) -> usize {
        self.host
            .lock()
            .calls
            .iter()
            .filter(|call| call.action() == action)
            .count()
    }

    /// Entries of every `callBatch` transmission, one vector per transmission.
    pub fn batches(&self) -> Vec<Vec<PendingCall>> {
        self.calls_for(RemoteAction::CallBatch)
            .iter()
            .filter_map(RecordedCall::batch)
            .collect()
    }

    /// Whether `handle` currently has a registered context.
    pub fn is_registered(&self, handle: &ContextHandle) -> bool {
        self.host.lock().registered.contains(handle)
    }

    /// Current value of a simulated remote property.
    pub fn property(&self, handle: &ContextHandle, name: &str) -> Option<Value> {
        self.host
            .lock()
            .properties
            .get(&(handle.clone(), name.to_string()))
            .cloned()
    }

    /// Wait until at least `count` calls of `action` have arrived.
    pub async fn wait_for(&self, action: RemoteAction, count: usize) {
        loop {
            let recorded = self.recorded.notified();
            if self.count(action) >= count {
                return;
            }
            recorded.await;
        }
    }

    async fn dispatch(
        &self,
        target: &ContextHandle,
        path: &OperationPath,
        args: Vec<Value>,
    ) -> Result<Value, ChannelError> {
        let action = path.action();
        let gate = self.holds.lock().get(&action).cloned();

        self.host.lock().calls.push(RecordedCall {
            target: target.clone(),
            path: path.clone(),
            args: args.clone(),
        });
        self.recorded.notify_waiters();
        tracing::trace!("recorded {} for surface {}", path, target);

        if let Some(gate) = gate {
            let _permit = gate.acquire().await.map_err(|_| ChannelError::Closed)?;
        }

        let mut host = self.host.lock();
        if let Some(error) = host.failures.get_mut(&action).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        Ok(host.apply(target, action, &args))
    }
}

#[async_trait]
impl RemoteCallChannel for RecordingChannel {
    async fn invoke(
        &self,
        target: &ContextHandle,
        path: &OperationPath,
        args: Vec<Value>,
    ) -> Result<Value, ChannelError> {
        self.dispatch(target, path, args).await
    }

    async fn invoke_void(
        &self,
        target: &ContextHandle,
        path: &OperationPath,
        args: Vec<Value>,
    ) -> Result<(), ChannelError> {
        self.dispatch(target, path, args).await.map(|_| ())
    }
}
