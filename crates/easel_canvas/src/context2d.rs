//! 2D drawing context on top of the batched proxy.
//!
//! Property setters and drawing methods become batched calls; queries (`measureText`,
//! hit tests, pixel reads) are read-backs that drain the queue first. Every property set
//! through this context is also cached locally, so reading it back costs no round trip.

use crate::image_data::ImageData;
use crate::metrics::TextMetrics;
use crate::style::{LineCap, LineJoin, RepeatPattern, TextAlign, TextBaseline, TextDirection};
use easel_core::{
    BatchedContextProxy, ContextDescriptor, ContextHandle, ProxyConfig, ProxyError,
    RemoteCallChannel, RenderSize, Result,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Context type name of 2D contexts.
pub const CONTEXT_NAME: &str = "Canvas2d";

/// Locally cached drawing state, initialised with the remote defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingState {
    pub fill_style: String,
    pub stroke_style: String,
    pub font: String,
    pub text_align: TextAlign,
    pub direction: TextDirection,
    pub text_baseline: TextBaseline,
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f32,
    pub line_dash_offset: f32,
    pub shadow_blur: f32,
    pub shadow_color: String,
    pub shadow_offset_x: f32,
    pub shadow_offset_y: f32,
    pub global_alpha: f32,
    pub global_composite_operation: String,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            fill_style: "#000".to_string(),
            stroke_style: "#000".to_string(),
            font: "10px sans-serif".to_string(),
            text_align: TextAlign::default(),
            direction: TextDirection::default(),
            text_baseline: TextBaseline::default(),
            line_width: 1.0,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
            miter_limit: 10.0,
            line_dash_offset: 0.0,
            shadow_blur: 0.0,
            shadow_color: "black".to_string(),
            shadow_offset_x: 0.0,
            shadow_offset_y: 0.0,
            global_alpha: 1.0,
            global_composite_operation: "source-over".to_string(),
        }
    }
}

/// A remote 2D canvas context.
pub struct Canvas2dContext {
    proxy: BatchedContextProxy,
    state: Mutex<DrawingState>,
}

impl Canvas2dContext {
    /// Bind to a surface. Registration happens on first use.
    pub fn new(handle: ContextHandle, channel: Arc<dyn RemoteCallChannel>) -> Self {
        Self::with_config(handle, channel, ProxyConfig::default())
    }

    pub fn with_config(
        handle: ContextHandle,
        channel: Arc<dyn RemoteCallChannel>,
        config: ProxyConfig,
    ) -> Self {
        let proxy = BatchedContextProxy::with_config(
            handle,
            ContextDescriptor::new(CONTEXT_NAME),
            channel,
            config,
        );
        Self {
            proxy,
            state: Mutex::new(DrawingState::default()),
        }
    }

    /// The underlying proxy, for calls this type does not wrap.
    pub fn proxy(&self) -> &BatchedContextProxy {
        &self.proxy
    }

    /// Snapshot of the locally cached drawing state.
    pub fn state(&self) -> DrawingState {
        self.state.lock().clone()
    }

    /// Cache and queue a property write.
    ///
    /// The cache is left alone when the proxy is disposed or cannot register, since the
    /// write never gets queued. Once queued, the value stays cached even if the batch that
    /// carries it fails.
    async fn set_property(
        &self,
        name: &str,
        value: Value,
        update: impl FnOnce(&mut DrawingState),
    ) -> Result<()> {
        self.proxy.ensure_initialized().await?;
        update(&mut self.state.lock());
        self.proxy.enqueue(name, false, vec![value]).await
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.proxy.enqueue(method, true, args).await
    }

    // =========================================================================
    // Batching and lifecycle
    // =========================================================================

    pub async fn begin_batch(&self) -> Result<()> {
        self.proxy.begin_batch().await
    }

    pub async fn end_batch(&self) -> Result<()> {
        self.proxy.end_batch().await
    }

    pub async fn flush(&self) -> Result<()> {
        self.proxy.flush().await
    }

    /// Actual pixel size of the canvas.
    pub async fn render_size(&self) -> Result<RenderSize> {
        self.proxy.resize_query().await
    }

    pub fn dispose(&self) {
        self.proxy.dispose();
    }

    pub async fn dispose_async(&self) {
        self.proxy.dispose_async().await;
    }

    // =========================================================================
    // Property setters
    // =========================================================================

    pub async fn set_fill_style(&self, value: &str) -> Result<()> {
        self.set_property("fillStyle", json!(value), |s| s.fill_style = value.to_string())
            .await
    }

    pub async fn set_stroke_style(&self, value: &str) -> Result<()> {
        self.set_property("strokeStyle", json!(value), |s| s.stroke_style = value.to_string())
            .await
    }

    pub async fn set_font(&self, value: &str) -> Result<()> {
        self.set_property("font", json!(value), |s| s.font = value.to_string())
            .await
    }

    pub async fn set_text_align(&self, value: TextAlign) -> Result<()> {
        self.set_property("textAlign", json!(value.as_str()), |s| s.text_align = value)
            .await
    }

    pub async fn set_direction(&self, value: TextDirection) -> Result<()> {
        self.set_property("direction", json!(value.as_str()), |s| s.direction = value)
            .await
    }

    pub async fn set_text_baseline(&self, value: TextBaseline) -> Result<()> {
        self.set_property("textBaseline", json!(value.as_str()), |s| s.text_baseline = value)
            .await
    }

    pub async fn set_line_width(&self, value: f32) -> Result<()> {
        self.set_property("lineWidth", json!(value), |s| s.line_width = value)
            .await
    }

    pub async fn set_line_cap(&self, value: LineCap) -> Result<()> {
        self.set_property("lineCap", json!(value.as_str()), |s| s.line_cap = value)
            .await
    }

    pub async fn set_line_join(&self, value: LineJoin) -> Result<()> {
        self.set_property("lineJoin", json!(value.as_str()), |s| s.line_join = value)
            .await
    }

    pub async fn set_miter_limit(&self, value: f32) -> Result<()> {
        self.set_property("miterLimit", json!(value), |s| s.miter_limit = value)
            .await
    }

    pub async fn set_line_dash_offset(&self, value: f32) -> Result<()> {
        self.set_property("lineDashOffset", json!(value), |s| s.line_dash_offset = value)
            .await
    }

    pub async fn set_shadow_blur(&self, value: f32) -> Result<()> {
        self.set_property("shadowBlur", json!(value), |s| s.shadow_blur = value)
            .await
    }

    pub async fn set_shadow_color(&self, value: &str) -> Result<()> {
        self.set_property("shadowColor", json!(value), |s| s.shadow_color = value.to_string())
            .await
    }

    pub async fn set_shadow_offset_x(&self, value: f32) -> Result<()> {
        self.set_property("shadowOffsetX", json!(value), |s| s.shadow_offset_x = value)
            .await
    }

    pub async fn set_shadow_offset_y(&self, value: f32) -> Result<()> {
        self.set_property("shadowOffsetY", json!(value), |s| s.shadow_offset_y = value)
            .await
    }

    pub async fn set_global_alpha(&self, value: f32) -> Result<()> {
        self.set_property("globalAlpha", json!(value), |s| s.global_alpha = value)
            .await
    }

    pub async fn set_global_composite_operation(&self, value: &str) -> Result<()> {
        self.set_property("globalCompositeOperation", json!(value), |s| {
            s.global_composite_operation = value.to_string()
        })
        .await
    }

    // =========================================================================
    // Rectangles and text
    // =========================================================================

    pub async fn fill_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.call("fillRect", vec![json!(x), json!(y), json!(width), json!(height)])
            .await
    }

    pub async fn clear_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.call("clearRect", vec![json!(x), json!(y), json!(width), json!(height)])
            .await
    }

    pub async fn stroke_rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.call("strokeRect", vec![json!(x), json!(y), json!(width), json!(height)])
            .await
    }

    pub async fn fill_text(&self, text: &str, x: f64, y: f64, max_width: Option<f64>) -> Result<()> {
        self.call("fillText", text_args(text, x, y, max_width)).await
    }

    pub async fn stroke_text(
        &self,
        text: &str,
        x: f64,
        y: f64,
        max_width: Option<f64>,
    ) -> Result<()> {
        self.call("strokeText", text_args(text, x, y, max_width)).await
    }

    pub async fn measure_text(&self, text: &str) -> Result<TextMetrics> {
        self.proxy
            .invoke_with_result("measureText", vec![json!(text)])
            .await
    }

    // =========================================================================
    // Line styles
    // =========================================================================

    pub async fn get_line_dash(&self) -> Result<Vec<f32>> {
        self.proxy.invoke_with_result("getLineDash", Vec::new()).await
    }

    pub async fn set_line_dash(&self, segments: &[f32]) -> Result<()> {
        self.call("setLineDash", vec![json!(segments)]).await
    }

    // =========================================================================
    // Paths
    // =========================================================================

    pub async fn begin_path(&self) -> Result<()> {
        self.call("beginPath", Vec::new()).await
    }

    pub async fn close_path(&self) -> Result<()> {
        self.call("closePath", Vec::new()).await
    }

    pub async fn move_to(&self, x: f64, y: f64) -> Result<()> {
        self.call("moveTo", vec![json!(x), json!(y)]).await
    }

    pub async fn line_to(&self, x: f64, y: f64) -> Result<()> {
        self.call("lineTo", vec![json!(x), json!(y)]).await
    }

    pub async fn bezier_curve_to(
        &self,
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    ) -> Result<()> {
        self.call(
            "bezierCurveTo",
            vec![json!(cp1x), json!(cp1y), json!(cp2x), json!(cp2y), json!(x), json!(y)],
        )
        .await
    }

    pub async fn quadratic_curve_to(&self, cpx: f64, cpy: f64, x: f64, y: f64) -> Result<()> {
        self.call("quadraticCurveTo", vec![json!(cpx), json!(cpy), json!(x), json!(y)])
            .await
    }

    /// Circular arc. `anticlockwise` is omitted from the call when `None`.
    pub async fn arc(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: Option<bool>,
    ) -> Result<()> {
        let mut args = vec![json!(x), json!(y), json!(radius), json!(start_angle), json!(end_angle)];
        if let Some(anticlockwise) = anticlockwise {
            args.push(json!(anticlockwise));
        }
        self.call("arc", args).await
    }

    pub async fn arc_to(&self, x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> Result<()> {
        self.call(
            "arcTo",
            vec![json!(x1), json!(y1), json!(x2), json!(y2), json!(radius)],
        )
        .await
    }

    pub async fn rect(&self, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        self.call("rect", vec![json!(x), json!(y), json!(width), json!(height)])
            .await
    }

    pub async fn fill(&self) -> Result<()> {
        self.call("fill", Vec::new()).await
    }

    pub async fn stroke(&self) -> Result<()> {
        self.call("stroke", Vec::new()).await
    }

    pub async fn draw_focus_if_needed(&self, element: &ContextHandle) -> Result<()> {
        self.call("drawFocusIfNeeded", vec![json!(element)]).await
    }

    pub async fn scroll_path_into_view(&self) -> Result<()> {
        self.call("scrollPathIntoView", Vec::new()).await
    }

    pub async fn clip(&self) -> Result<()> {
        self.call("clip", Vec::new()).await
    }

    pub async fn is_point_in_path(&self, x: f64, y: f64) -> Result<bool> {
        self.proxy
            .invoke_with_result("isPointInPath", vec![json!(x), json!(y)])
            .await
    }

    pub async fn is_point_in_stroke(&self, x: f64, y: f64) -> Result<bool> {
        self.proxy
            .invoke_with_result("isPointInStroke", vec![json!(x), json!(y)])
            .await
    }

    // =========================================================================
    // Transformations and state stack
    // =========================================================================

    pub async fn rotate(&self, angle: f32) -> Result<()> {
        self.call("rotate", vec![json!(angle)]).await
    }

    pub async fn scale(&self, x: f64, y: f64) -> Result<()> {
        self.call("scale", vec![json!(x), json!(y)]).await
    }

    pub async fn translate(&self, x: f64, y: f64) -> Result<()> {
        self.call("translate", vec![json!(x), json!(y)]).await
    }

    pub async fn transform(&self, m11: f64, m12: f64, m21: f64, m22: f64, dx: f64, dy: f64) -> Result<()> {
        self.call("transform", matrix_args(m11, m12, m21, m22, dx, dy))
            .await
    }

    pub async fn set_transform(
        &self,
        m11: f64,
        m12: f64,
        m21: f64,
        m22: f64,
        dx: f64,
        dy: f64,
    ) -> Result<()> {
        self.call("setTransform", matrix_args(m11, m12, m21, m22, dx, dy))
            .await
    }

    pub async fn save(&self) -> Result<()> {
        self.call("save", Vec::new()).await
    }

    pub async fn restore(&self) -> Result<()> {
        self.call("restore", Vec::new()).await
    }

    // =========================================================================
    // Images and pixels
    // =========================================================================

    /// Draw `image` with its top-left corner at (`dx`, `dy`).
    pub async fn draw_image(&self, image: &ContextHandle, dx: f64, dy: f64) -> Result<()> {
        self.call("drawImage", vec![json!(image), json!(dx), json!(dy)])
            .await
    }

    /// Draw `image` scaled into the destination rectangle.
    pub async fn draw_image_scaled(
        &self,
        image: &ContextHandle,
        dx: f64,
        dy: f64,
        width: f64,
        height: f64,
    ) -> Result<()> {
        self.call(
            "drawImage",
            vec![json!(image), json!(dx), json!(dy), json!(width), json!(height)],
        )
        .await
    }

    /// Draw the source rectangle of `image` into the destination rectangle.
    #[allow(clippy::too_many_arguments)]
    pub async fn draw_image_region(
        &self,
        image: &ContextHandle,
        sx: f64,
        sy: f64,
        s_width: f64,
        s_height: f64,
        dx: f64,
        dy: f64,
        d_width: f64,
        d_height: f64,
    ) -> Result<()> {
        self.call(
            "drawImage",
            vec![
                json!(image),
                json!(sx),
                json!(sy),
                json!(s_width),
                json!(s_height),
                json!(dx),
                json!(dy),
                json!(d_width),
                json!(d_height),
            ],
        )
        .await
    }

    pub async fn create_pattern(&self, image: &ContextHandle, repeat: RepeatPattern) -> Result<Value> {
        self.proxy
            .invoke_with_result("createPattern", vec![json!(image), json!(repeat.as_str())])
            .await
    }

    pub async fn get_image_data(&self, sx: f64, sy: f64, sw: f64, sh: f64) -> Result<ImageData> {
        self.proxy
            .invoke_with_result("getImageData", vec![json!(sx), json!(sy), json!(sw), json!(sh)])
            .await
    }

    /// Write pixels back. Sent as a request/response call so the write is acknowledged
    /// before this returns.
    pub async fn put_image_data(&self, image: &ImageData, dx: f64, dy: f64) -> Result<()> {
        let data = serde_json::to_value(image).map_err(|source| ProxyError::Encode {
            operation: "putImageData".to_string(),
            source,
        })?;
        self.proxy
            .invoke_with_result::<Value>("putImageData", vec![data, json!(dx), json!(dy)])
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for Canvas2dContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas2dContext")
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

fn text_args(text: &str, x: f64, y: f64, max_width: Option<f64>) -> Vec<Value> {
    let mut args = vec![json!(text), json!(x), json!(y)];
    if let Some(max_width) = max_width {
        args.push(json!(max_width));
    }
    args
}

fn matrix_args(m11: f64, m12: f64, m21: f64, m22: f64, dx: f64, dy: f64) -> Vec<Value> {
    vec![json!(m11), json!(m12), json!(m21), json!(m22), json!(dx), json!(dy)]
}
