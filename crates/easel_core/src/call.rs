//! Queued calls and their batch wire form.

use serde_json::Value;

/// A mutating call waiting in the proxy queue.
///
/// Arguments are owned values: transmission may happen long after the call site returns.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCall {
    name: String,
    is_method_call: bool,
    args: Vec<Value>,
}

impl PendingCall {
    pub fn new(name: impl Into<String>, is_method_call: bool, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            is_method_call,
            args,
        }
    }

    /// Property setter (`isMethodCall = false`) with its single value.
    pub fn property(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, false, vec![value])
    }

    /// Method invocation (`isMethodCall = true`).
    pub fn method(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::new(name, true, args)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_method_call(&self) -> bool {
        self.is_method_call
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Flat wire tuple `[name, isMethodCall, ...args]`.
    pub fn into_wire(self) -> Value {
        let mut tuple = Vec::with_capacity(self.args.len() + 2);
        tuple.push(Value::String(self.name));
        tuple.push(Value::Bool(self.is_method_call));
        tuple.extend(self.args);
        Value::Array(tuple)
    }

    /// Parse a wire tuple back into a call. Returns `None` for malformed tuples.
    pub fn from_wire(value: &Value) -> Option<Self> {
        let tuple = value.as_array()?;
        let name = tuple.first()?.as_str()?;
        let is_method_call = tuple.get(1)?.as_bool()?;
        Some(Self::new(name, is_method_call, tuple[2..].to_vec()))
    }
}

/// Encode an ordered batch as the single argument of a `callBatch` transmission.
pub fn encode_batch(batch: Vec<PendingCall>) -> Value {
    Value::Array(batch.into_iter().map(PendingCall::into_wire).collect())
}

/// Decode a `callBatch` argument, skipping malformed entries.
pub fn decode_batch(value: &Value) -> Vec<PendingCall> {
    value
        .as_array()
        .map(|entries| entries.iter().filter_map(PendingCall::from_wire).collect())
        .unwrap_or_default()
}
