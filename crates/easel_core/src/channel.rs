//! Call channel contract between the proxy and the process hosting the drawing surface.

use crate::context::ContextHandle;
use crate::error::ChannelError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Remote actions understood by the surface host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteAction {
    /// Register a context for a surface.
    Add,
    /// Deregister the context.
    Remove,
    /// Read a single property.
    GetProperty,
    /// Invoke one method and return its result.
    Call,
    /// Apply an ordered list of property writes and method calls.
    CallBatch,
    /// Query the surface's actual pixel size.
    GetActualRenderSize,
}

impl RemoteAction {
    /// All actions, in declaration order.
    pub const ALL: [RemoteAction; 6] = [
        RemoteAction::Add,
        RemoteAction::Remove,
        RemoteAction::GetProperty,
        RemoteAction::Call,
        RemoteAction::CallBatch,
        RemoteAction::GetActualRenderSize,
    ];

    /// Wire name of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteAction::Add => "add",
            RemoteAction::Remove => "remove",
            RemoteAction::GetProperty => "getProperty",
            RemoteAction::Call => "call",
            RemoteAction::CallBatch => "callBatch",
            RemoteAction::GetActualRenderSize => "getActualRenderSize",
        }
    }
}

impl fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured remote operation name: `{namespace}.{context}.{action}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationPath {
    namespace: String,
    context: String,
    action: RemoteAction,
}

impl OperationPath {
    pub fn new(namespace: impl Into<String>, context: impl Into<String>, action: RemoteAction) -> Self {
        Self {
            namespace: namespace.into(),
            context: context.into(),
            action,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn action(&self) -> RemoteAction {
        self.action
    }
}

impl fmt::Display for OperationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.namespace, self.context, self.action)
    }
}

/// Transport able to reach the process that hosts drawing surfaces.
///
/// Implementations must deliver calls for one target in the order they are issued.
/// The proxy never issues two transmissions for the same target concurrently, so a
/// request/response transport satisfies this naturally.
#[async_trait]
pub trait RemoteCallChannel: Send + Sync {
    /// Invoke a remote operation and wait for its result.
    async fn invoke(
        &self,
        target: &ContextHandle,
        path: &OperationPath,
        args: Vec<Value>,
    ) -> Result<Value, ChannelError>;

    /// Invoke a remote operation whose result is not needed, waiting for acknowledgement.
    async fn invoke_void(
        &self,
        target: &ContextHandle,
        path: &OperationPath,
        args: Vec<Value>,
    ) -> Result<(), ChannelError>;
}
