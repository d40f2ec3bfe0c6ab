//! Easel Canvas
//!
//! Drawing surfaces on top of [`easel_core`]'s batched proxy.
//!
//! - [`Canvas2dContext`]: the 2D drawing API with a locally cached drawing state
//! - [`create_webgl`]: registration of 3D contexts with their creation attributes
//!
//! # Example
//!
//! ```rust
//! use easel_canvas::create_canvas_2d;
//! use easel_core::{ContextHandle, ProxyConfig, RecordingChannel};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let channel = Arc::new(RecordingChannel::new());
//! let canvas = create_canvas_2d(ContextHandle::new("c"), channel.clone(), ProxyConfig::default()).await?;
//!
//! canvas.begin_batch().await?;
//! canvas.set_fill_style("tomato").await?;
//! canvas.fill_rect(0.0, 0.0, 32.0, 32.0).await?;
//! canvas.end_batch().await?;
//!
//! assert_eq!(channel.batches().len(), 1);
//! # Ok::<(), easel_core::ProxyError>(())
//! # }).unwrap();
//! ```

pub mod context2d;
pub mod image_data;
pub mod metrics;
pub mod style;
pub mod webgl;

pub use context2d::{Canvas2dContext, DrawingState, CONTEXT_NAME};
pub use image_data::ImageData;
pub use metrics::TextMetrics;
pub use style::{LineCap, LineJoin, RepeatPattern, TextAlign, TextBaseline, TextDirection};
pub use webgl::{webgl_descriptor, PowerPreference, WebGlContextAttributes, WebGlVersion};

use easel_core::{BatchedContextProxy, ContextHandle, ProxyConfig, RemoteCallChannel, Result};
use std::sync::Arc;

/// Create a 2D context and register it right away.
pub async fn create_canvas_2d(
    handle: ContextHandle,
    channel: Arc<dyn RemoteCallChannel>,
    config: ProxyConfig,
) -> Result<Canvas2dContext> {
    let canvas = Canvas2dContext::with_config(handle, channel, config);
    canvas.proxy().ensure_initialized().await?;
    tracing::debug!("created 2d context for {}", canvas.proxy().handle());
    Ok(canvas)
}

/// Create a WebGL context and register it right away.
pub async fn create_webgl(
    handle: ContextHandle,
    channel: Arc<dyn RemoteCallChannel>,
    config: ProxyConfig,
    version: WebGlVersion,
    attributes: Option<WebGlContextAttributes>,
) -> Result<BatchedContextProxy> {
    let descriptor = webgl_descriptor(version, attributes.as_ref())?;
    let proxy = BatchedContextProxy::with_config(handle, descriptor, channel, config);
    proxy.ensure_initialized().await?;
    tracing::debug!(
        "created {} context for {}",
        version.context_name(),
        proxy.handle()
    );
    Ok(proxy)
}
