//! Identity of the remote drawing context a proxy is bound to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque reference to a rendering surface owned by the host.
///
/// The proxy keeps a copy of the identifier for its whole lifetime but never owns the
/// surface itself. Serializes as the bare identifier so it can also travel as a call
/// argument, e.g. as the image source of `drawImage`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextHandle(String);

impl ContextHandle {
    /// Wrap a host-supplied surface identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which kind of remote context to register, and with which creation parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextDescriptor {
    type_name: String,
    parameters: Option<Value>,
}

impl ContextDescriptor {
    /// Descriptor for a context kind without creation parameters.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            parameters: None,
        }
    }

    /// Attach creation parameters (e.g. 3D capability flags).
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Context type discriminator used in operation paths.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Creation parameters, if any.
    pub fn parameters(&self) -> Option<&Value> {
        self.parameters.as_ref()
    }
}

/// Actual render size of a surface in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderSize {
    pub width: f32,
    pub height: f32,
}

impl RenderSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl From<[f32; 2]> for RenderSize {
    fn from([width, height]: [f32; 2]) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handle_serializes_as_bare_id() {
        let handle = ContextHandle::new("surface-1");
        assert_eq!(serde_json::to_value(&handle).unwrap(), json!("surface-1"));
        assert_eq!(handle.to_string(), "surface-1");
    }

    #[test]
    fn test_descriptor_parameters() {
        let plain = ContextDescriptor::new("Canvas2d");
        assert_eq!(plain.type_name(), "Canvas2d");
        assert!(plain.parameters().is_none());

        let with = ContextDescriptor::new("WebGL").with_parameters(json!({ "alpha": false }));
        assert_eq!(with.parameters(), Some(&json!({ "alpha": false })));
    }
}
