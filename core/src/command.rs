//! The command surface, decoded once at the boundary.
//!
//! [`Command::decode`] turns a [`MethodCall`] into one variant of a tagged
//! union. Each variant carries its strongly typed required fields, so a
//! missing, null or mistyped argument is a decode error for every command
//! alike and the dispatcher never touches the raw argument bag.
//!
//! # Example
//!
//! ```
//! use apm_bridge_core::call::MethodCall;
//! use apm_bridge_core::command::Command;
//!
//! let call = MethodCall::new("stopTransaction").arg("name", "checkout");
//! let Ok(Command::StopTransaction(args)) = Command::decode(&call) else {
//!     unreachable!("stopTransaction with a name always decodes");
//! };
//! assert_eq!(args.name, "checkout");
//!
//! // A missing field is a contract violation, not a silent no-op
//! assert!(Command::decode(&MethodCall::new("stopTransaction")).is_err());
//! ```

use crate::call::MethodCall;
use crate::error::DecodeError;
use crate::key::ComponentKey;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::fmt;
use url::Url;

/// Every command the bridge understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `startMonitoring`
    StartMonitoring(StartMonitoring),
    /// `startMonitoringWithEndPoint`
    StartMonitoringWithEndPoint(StartMonitoringWithEndPoint),
    /// `trackNativeExceptions`
    TrackNativeExceptions,
    /// `startTransaction`
    StartTransaction(TransactionArgs),
    /// `stopTransaction`
    StopTransaction(TransactionArgs),
    /// `startComponent`
    StartComponent(ComponentArgs),
    /// `stopComponent`
    StopComponent(ComponentArgs),
    /// `addBreadcrumb`
    AddBreadcrumb(Breadcrumb),
    /// `addScreen`
    AddScreen(Screen),
    /// `addHttpCall`
    AddHttpCall(HttpCall),
    /// `captureException`
    CaptureException(CapturedError),
    /// `setUserId`
    SetUserId(UserId),
    /// `flush`
    Flush,
    /// `crashNative`
    CrashNative,
}

impl Command {
    /// Decode a method call into a typed command.
    ///
    /// Commands without fields ignore their argument bag entirely.
    ///
    /// # Errors
    ///
    /// - [`DecodeError::UnknownMethod`] if the method is not part of the surface
    /// - [`DecodeError::InvalidArguments`] if a required field is missing,
    ///   null, or has the wrong type
    /// - [`DecodeError::InvalidEndpoint`] if `endPoint` is not an upload URL
    pub fn decode(call: &MethodCall) -> Result<Self, DecodeError> {
        match call.method() {
            "startMonitoring" => call.decode_arguments().map(Self::StartMonitoring),
            "startMonitoringWithEndPoint" => call
                .decode_arguments::<RawStartMonitoringWithEndPoint>()
                .and_then(StartMonitoringWithEndPoint::try_from)
                .map(Self::StartMonitoringWithEndPoint),
            "trackNativeExceptions" => Ok(Self::TrackNativeExceptions),
            "startTransaction" => call.decode_arguments().map(Self::StartTransaction),
            "stopTransaction" => call.decode_arguments().map(Self::StopTransaction),
            "startComponent" => call.decode_arguments().map(Self::StartComponent),
            "stopComponent" => call.decode_arguments().map(Self::StopComponent),
            "addBreadcrumb" => call.decode_arguments().map(Self::AddBreadcrumb),
            "addScreen" => call.decode_arguments().map(Self::AddScreen),
            "addHttpCall" => call.decode_arguments().map(Self::AddHttpCall),
            "captureException" => call.decode_arguments().map(Self::CaptureException),
            "setUserId" => call.decode_arguments().map(Self::SetUserId),
            "flush" => Ok(Self::Flush),
            "crashNative" => Ok(Self::CrashNative),
            other => Err(DecodeError::UnknownMethod(other.to_owned())),
        }
    }

    /// Wire name of the command, used for logging and metric labels
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::StartMonitoring(_) => "startMonitoring",
            Self::StartMonitoringWithEndPoint(_) => "startMonitoringWithEndPoint",
            Self::TrackNativeExceptions => "trackNativeExceptions",
            Self::StartTransaction(_) => "startTransaction",
            Self::StopTransaction(_) => "stopTransaction",
            Self::StartComponent(_) => "startComponent",
            Self::StopComponent(_) => "stopComponent",
            Self::AddBreadcrumb(_) => "addBreadcrumb",
            Self::AddScreen(_) => "addScreen",
            Self::AddHttpCall(_) => "addHttpCall",
            Self::CaptureException(_) => "captureException",
            Self::SetUserId(_) => "setUserId",
            Self::Flush => "flush",
            Self::CrashNative => "crashNative",
        }
    }
}

/// Arguments of `startMonitoring`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMonitoring {
    /// Application key issued by the monitoring service
    pub app_key: String,
    /// Upload interval in seconds
    #[serde(deserialize_with = "lenient_i32")]
    pub upload_interval: i32,
}

/// Arguments of `startMonitoringWithEndPoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartMonitoringWithEndPoint {
    /// Application key issued by the monitoring service
    pub app_key: String,
    /// Upload interval in seconds
    pub upload_interval: i32,
    /// Collector endpoint
    pub end_point: Endpoint,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStartMonitoringWithEndPoint {
    app_key: String,
    #[serde(deserialize_with = "lenient_i32")]
    upload_interval: i32,
    end_point: String,
}

impl TryFrom<RawStartMonitoringWithEndPoint> for StartMonitoringWithEndPoint {
    type Error = DecodeError;

    fn try_from(raw: RawStartMonitoringWithEndPoint) -> Result<Self, Self::Error> {
        Ok(Self {
            app_key: raw.app_key,
            upload_interval: raw.upload_interval,
            end_point: Endpoint::parse(&raw.end_point)?,
        })
    }
}

/// A validated collector endpoint.
///
/// Must be non-empty, parse as a URL, and use `http` or `https`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Validate an endpoint string.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidEndpoint`] if the string is empty, does
    /// not parse, or uses a scheme other than `http`/`https`.
    pub fn parse(endpoint: &str) -> Result<Self, DecodeError> {
        let invalid = |reason: String| DecodeError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason,
        };

        if endpoint.trim().is_empty() {
            return Err(invalid("endpoint should not be empty".into()));
        }
        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }

    /// The parsed URL
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.0
    }

    /// The endpoint as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of `startTransaction` / `stopTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionArgs {
    /// Transaction name (the registry key)
    pub name: String,
}

/// Arguments of `startComponent` / `stopComponent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentArgs {
    /// Owning transaction
    pub transaction_name: String,
    /// Component name within that transaction
    pub component_name: String,
}

impl ComponentArgs {
    /// Registry key for this component
    #[must_use]
    pub fn key(&self) -> ComponentKey {
        ComponentKey::new(self.transaction_name.as_str(), self.component_name.as_str())
    }
}

/// Arguments of `addBreadcrumb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Breadcrumb name (usually the screen)
    pub name: String,
    /// User action that was taken
    pub action: String,
}

/// Arguments of `addScreen`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    /// Screen (route) name
    pub name: String,
    /// Time taken to render, in milliseconds
    pub load_time: i32,
    /// Epoch milliseconds when loading started
    pub start_time: i64,
}

/// Arguments of `addHttpCall`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpCall {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub request_method: String,
    /// Epoch milliseconds when the request started
    pub start_time: i64,
    /// Round-trip time in milliseconds
    pub load_time: i32,
    /// HTTP response status
    pub status_code: i32,
    /// Screen the request was made from
    pub current_route: String,
}

/// Arguments of `captureException`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedError {
    /// Error message
    pub msg: String,
    /// Error type / class name
    #[serde(rename = "type")]
    pub error_type: String,
    /// Source file
    pub file: String,
    /// Function the error was raised in
    pub function: String,
    /// Stack trace
    pub stack: String,
    /// Screen the error happened on
    pub current_route: String,
    /// Epoch milliseconds when the error happened
    pub start_time: i64,
    /// Whether the application already handled the error
    #[serde(default)]
    pub is_handled: bool,
}

/// Arguments of `setUserId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserId {
    /// Application-level user identifier
    pub user_id: String,
}

/// Accept an integer or a string holding a decimal integer.
fn lenient_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => i32::try_from(value)
            .map_err(|_| de::Error::custom(format!("integer {value} out of range"))),
        IntOrString::Str(text) => text
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("'{text}' is not an integer: {e}"))),
    }
}

#[cfg(test)]
#[allow(clippy::panic)] // Test code can panic
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(call: &MethodCall) -> Command {
        match Command::decode(call) {
            Ok(command) => command,
            Err(e) => panic!("expected {} to decode: {e}", call.method()),
        }
    }

    fn invalid_field(call: &MethodCall, field: &str) {
        match Command::decode(call) {
            Err(DecodeError::InvalidArguments { method, source }) => {
                assert_eq!(method, call.method());
                assert!(
                    source.to_string().contains(field),
                    "error should name `{field}`: {source}"
                );
            },
            other => panic!("expected InvalidArguments for {field}, got {other:?}"),
        }
    }

    #[test]
    fn start_monitoring_accepts_numeric_string_interval() {
        let call = MethodCall::new("startMonitoring")
            .arg("appKey", "key")
            .arg("uploadInterval", "60");
        assert_eq!(
            decode(&call),
            Command::StartMonitoring(StartMonitoring {
                app_key: "key".into(),
                upload_interval: 60,
            })
        );
    }

    #[test]
    fn start_monitoring_rejects_non_numeric_interval() {
        let call = MethodCall::new("startMonitoring")
            .arg("appKey", "key")
            .arg("uploadInterval", "soon");
        assert!(matches!(
            Command::decode(&call),
            Err(DecodeError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn start_monitoring_requires_app_key() {
        invalid_field(&MethodCall::new("startMonitoring").arg("uploadInterval", 60), "appKey");
    }

    #[test]
    fn endpoint_must_be_an_upload_url() {
        for bad in ["", "   ", "not a url", "ftp://collector.example.com"] {
            let call = MethodCall::new("startMonitoringWithEndPoint")
                .arg("appKey", "key")
                .arg("uploadInterval", 60)
                .arg("endPoint", bad);
            assert!(
                matches!(Command::decode(&call), Err(DecodeError::InvalidEndpoint { .. })),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn endpoint_decodes_when_valid() {
        let call = MethodCall::new("startMonitoringWithEndPoint")
            .arg("appKey", "key")
            .arg("uploadInterval", 60)
            .arg("endPoint", "https://collector.example.com/upload");
        let Command::StartMonitoringWithEndPoint(args) = decode(&call) else {
            panic!("wrong variant");
        };
        assert_eq!(args.end_point.url().host_str(), Some("collector.example.com"));
    }

    #[test]
    fn null_required_field_is_invalid() {
        let call = MethodCall::with_arguments("stopTransaction", json!({ "name": null }));
        assert!(matches!(
            Command::decode(&call),
            Err(DecodeError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn start_transaction_requires_name() {
        invalid_field(&MethodCall::new("startTransaction").arg("other", 1), "name");
    }

    #[test]
    fn component_commands_require_both_names() {
        invalid_field(
            &MethodCall::new("startComponent").arg("transactionName", "t"),
            "componentName",
        );
        invalid_field(
            &MethodCall::new("stopComponent").arg("componentName", "c"),
            "transactionName",
        );
    }

    #[test]
    fn http_call_requires_url() {
        let call = MethodCall::new("addHttpCall")
            .arg("requestMethod", "GET")
            .arg("startTime", 1_700_000_000_000_i64)
            .arg("loadTime", 120)
            .arg("statusCode", 200)
            .arg("currentRoute", "/home");
        invalid_field(&call, "url");
    }

    #[test]
    fn screen_rejects_fractional_load_time() {
        let call = MethodCall::new("addScreen")
            .arg("name", "home")
            .arg("loadTime", 1.5)
            .arg("startTime", 1_700_000_000_000_i64);
        assert!(Command::decode(&call).is_err());
    }

    #[test]
    fn captured_error_defaults_to_unhandled() {
        let call = MethodCall::new("captureException")
            .arg("msg", "boom")
            .arg("type", "StateError")
            .arg("file", "main.dart")
            .arg("function", "build")
            .arg("stack", "#0 build")
            .arg("currentRoute", "/home")
            .arg("startTime", 1_700_000_000_000_i64);
        let Command::CaptureException(error) = decode(&call) else {
            panic!("wrong variant");
        };
        assert_eq!(error.error_type, "StateError");
        assert!(!error.is_handled);
    }

    #[test]
    fn commands_without_fields_ignore_arguments() {
        for (method, expected) in [
            ("flush", Command::Flush),
            ("crashNative", Command::CrashNative),
            ("trackNativeExceptions", Command::TrackNativeExceptions),
        ] {
            assert_eq!(decode(&MethodCall::new(method)), expected);
            assert_eq!(decode(&MethodCall::new(method).arg("extra", true)), expected);
        }
    }

    #[test]
    fn unknown_method_is_reported_by_name() {
        match Command::decode(&MethodCall::new("teleport")) {
            Err(DecodeError::UnknownMethod(method)) => assert_eq!(method, "teleport"),
            other => panic!("expected UnknownMethod, got {other:?}"),
        }
    }

    #[test]
    fn method_name_matches_wire_name() {
        let call = MethodCall::new("setUserId").arg("userId", "u-1");
        assert_eq!(decode(&call).method_name(), "setUserId");
    }
}
