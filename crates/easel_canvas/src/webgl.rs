//! Descriptors for 3D (WebGL) contexts.
//!
//! Only registration is covered here: the attributes travel as the creation parameters of
//! the `add` call. Drawing on a 3D context goes through the proxy's generic `enqueue` and
//! `invoke_with_result`.

use easel_core::{ContextDescriptor, ProxyError, Result};
use serde::{Deserialize, Serialize};

/// GPU selection hint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    Default,
    HighPerformance,
    LowPower,
}

/// Capability flags requested when the context is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebGlContextAttributes {
    pub alpha: bool,
    pub depth: bool,
    pub stencil: bool,
    pub antialias: bool,
    pub premultiplied_alpha: bool,
    pub preserve_drawing_buffer: bool,
    pub fail_if_major_performance_caveat: bool,
    pub power_preference: PowerPreference,
}

impl Default for WebGlContextAttributes {
    fn default() -> Self {
        Self {
            alpha: true,
            depth: true,
            stencil: false,
            antialias: true,
            premultiplied_alpha: true,
            preserve_drawing_buffer: false,
            fail_if_major_performance_caveat: false,
            power_preference: PowerPreference::Default,
        }
    }
}

/// WebGL API level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WebGlVersion {
    #[default]
    WebGl1,
    WebGl2,
}

impl WebGlVersion {
    /// Context type name used in operation paths.
    pub fn context_name(self) -> &'static str {
        match self {
            WebGlVersion::WebGl1 => "WebGL",
            WebGlVersion::WebGl2 => "WebGL2",
        }
    }
}

/// Descriptor for a WebGL context, with optional creation attributes.
pub fn webgl_descriptor(
    version: WebGlVersion,
    attributes: Option<&WebGlContextAttributes>,
) -> Result<ContextDescriptor> {
    let descriptor = ContextDescriptor::new(version.context_name());
    let Some(attributes) = attributes else {
        return Ok(descriptor);
    };

    let parameters = serde_json::to_value(attributes).map_err(|source| ProxyError::Encode {
        operation: "add".to_string(),
        source,
    })?;
    Ok(descriptor.with_parameters(parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_use_remote_field_names() {
        let attributes = WebGlContextAttributes {
            antialias: false,
            power_preference: PowerPreference::HighPerformance,
            ..Default::default()
        };

        let descriptor = webgl_descriptor(WebGlVersion::WebGl2, Some(&attributes)).unwrap();

        assert_eq!(descriptor.type_name(), "WebGL2");
        assert_eq!(
            descriptor.parameters(),
            Some(&json!({
                "alpha": true,
                "depth": true,
                "stencil": false,
                "antialias": false,
                "premultipliedAlpha": true,
                "preserveDrawingBuffer": false,
                "failIfMajorPerformanceCaveat": false,
                "powerPreference": "high-performance"
            }))
        );
    }

    #[test]
    fn test_descriptor_without_attributes() {
        let descriptor = webgl_descriptor(WebGlVersion::WebGl1, None).unwrap();
        assert_eq!(descriptor.type_name(), "WebGL");
        assert!(descriptor.parameters().is_none());
    }
}
