//! Easel Core
//!
//! Client-side proxy for driving a remote, stateful drawing context (a 2D canvas or a 3D
//! context living in another process) through an expensive call channel.
//!
//! - **Batching**: mutating calls are coalesced into `callBatch` transmissions
//! - **Ordering**: one global FIFO across every caller and every transmission
//! - **Read-back**: value-returning calls drain the queue first
//! - **Lifecycle**: lazy one-time registration, exactly-once deregistration
//!
//! # Example
//!
//! ```rust
//! use easel_core::{BatchedContextProxy, ContextDescriptor, ContextHandle, RecordingChannel};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let channel = Arc::new(RecordingChannel::new());
//! let proxy = BatchedContextProxy::new(
//!     ContextHandle::new("main-canvas"),
//!     ContextDescriptor::new("Canvas2d"),
//!     channel.clone(),
//! );
//!
//! proxy.enqueue("fillStyle", false, vec![json!("red")]).await?;
//! let fill: String = proxy.get_property("fillStyle").await?;
//! assert_eq!(fill, "red");
//! # Ok::<(), easel_core::ProxyError>(())
//! # }).unwrap();
//! ```

pub mod call;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod proxy;
pub mod recording;

pub use call::PendingCall;
pub use channel::{OperationPath, RemoteAction, RemoteCallChannel};
pub use config::ProxyConfig;
pub use context::{ContextDescriptor, ContextHandle, RenderSize};
pub use error::{ChannelError, ConfigError, ProxyError, Result};
pub use proxy::{BatchedContextProxy, Lifecycle};
pub use recording::{CallHold, RecordedCall, RecordingChannel};
