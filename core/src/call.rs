//! Transport-level request and reply types.
//!
//! A host sends one [`MethodCall`] per command: a method name plus a
//! string-keyed argument bag with loosely typed values. The bridge answers
//! with a [`Reply`] (or a fatal error, see [`BridgeError`](crate::error::BridgeError)).

use crate::error::DecodeError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// A named command with its argument bag, as delivered by the host.
///
/// # Example
///
/// ```
/// use apm_bridge_core::call::MethodCall;
///
/// let call = MethodCall::new("startComponent")
///     .arg("transactionName", "checkout")
///     .arg("componentName", "payment");
///
/// assert_eq!(call.method(), "startComponent");
/// assert_eq!(call.arguments()["componentName"], "payment");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    method: String,
    #[serde(default)]
    arguments: Value,
}

impl MethodCall {
    /// Create a call with no arguments
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Value::Null,
        }
    }

    /// Create a call with a pre-built argument bag
    #[must_use]
    pub fn with_arguments(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// Add one argument.
    ///
    /// A null or non-object bag is replaced by an empty object first.
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if !self.arguments.is_object() {
            self.arguments = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.arguments {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Method name
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw argument bag
    #[must_use]
    pub const fn arguments(&self) -> &Value {
        &self.arguments
    }

    /// Deserialize the argument bag into a typed argument struct.
    pub(crate) fn decode_arguments<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        T::deserialize(&self.arguments).map_err(|source| DecodeError::InvalidArguments {
            method: self.method.clone(),
            source,
        })
    }
}

/// Acknowledgement sent back for a non-fatal command.
///
/// Lifecycle and record commands are fire-and-forget: `Handled` means the
/// command was understood and run to completion, not that the engine call
/// succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reply {
    /// The command was recognized and executed
    Handled,
    /// The method is not part of the command surface
    NotImplemented,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arg_turns_null_bag_into_object() {
        let call = MethodCall::new("setUserId").arg("userId", "u-1");
        assert_eq!(call.arguments(), &json!({ "userId": "u-1" }));
    }

    #[test]
    fn arg_overwrites_existing_key() {
        let call = MethodCall::new("addScreen")
            .arg("loadTime", 10)
            .arg("loadTime", 20);
        assert_eq!(call.arguments()["loadTime"], 20);
    }

    #[test]
    fn missing_arguments_deserialize_as_null() {
        let call: Result<MethodCall, _> = serde_json::from_value(json!({ "method": "flush" }));
        assert!(matches!(call, Ok(c) if c.arguments().is_null()));
    }
}
