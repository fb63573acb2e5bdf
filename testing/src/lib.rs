//! # APM Bridge Testing
//!
//! Testing utilities and helpers for the APM bridge.
//!
//! This crate provides:
//! - A recording implementation of the monitoring engine
//! - Builders for every command the host can send
//! - Property-based testing strategies for lifecycle scripts
//! - A Given-When-Then harness for the dispatcher
//!
//! ## Example
//!
//! ```
//! use apm_bridge_runtime::Dispatcher;
//! use apm_bridge_testing::{EngineOp, RecordingEngine, calls};
//!
//! let engine = RecordingEngine::new();
//! let dispatcher = Dispatcher::new(engine.clone());
//!
//! assert!(dispatcher.handle(&calls::start_transaction("checkout")).is_ok());
//! assert!(dispatcher.handle(&calls::start_component("checkout", "payment")).is_ok());
//!
//! assert_eq!(engine.calls_to(EngineOp::StartComponent).len(), 1);
//! assert_eq!(dispatcher.registry().live_components(), 1);
//! ```

/// Recording monitoring engine
pub mod recording_engine;


/// Method calls for every command, shaped the way a host sends them.
///
/// Numeric fields are sent as JSON numbers, except where a builder says
/// otherwise.
pub mod calls {
    use apm_bridge_core::MethodCall;
    use serde_json::json;

    /// `startMonitoring`
    #[must_use]
    pub fn start_monitoring(app_key: &str, upload_interval: i32) -> MethodCall {
        MethodCall::new("startMonitoring")
            .arg("appKey", app_key)
            .arg("uploadInterval", upload_interval)
    }

    /// `startMonitoringWithEndPoint`
    #[must_use]
    pub fn start_monitoring_with_endpoint(
        app_key: &str,
        upload_interval: i32,
        end_point: &str,
    ) -> MethodCall {
        MethodCall::new("startMonitoringWithEndPoint")
            .arg("appKey", app_key)
            .arg("uploadInterval", upload_interval)
            .arg("endPoint", end_point)
    }

    /// `trackNativeExceptions`
    #[must_use]
    pub fn track_native_exceptions() -> MethodCall {
        MethodCall::new("trackNativeExceptions")
    }

    /// `startTransaction`
    #[must_use]
    pub fn start_transaction(name: &str) -> MethodCall {
        MethodCall::new("startTransaction").arg("name", name)
    }

    /// `stopTransaction`
    #[must_use]
    pub fn stop_transaction(name: &str) -> MethodCall {
        MethodCall::new("stopTransaction").arg("name", name)
    }

    /// `startComponent`
    #[must_use]
    pub fn start_component(transaction: &str, component: &str) -> MethodCall {
        MethodCall::new("startComponent")
            .arg("transactionName", transaction)
            .arg("componentName", component)
    }

    /// `stopComponent`
    #[must_use]
    pub fn stop_component(transaction: &str, component: &str) -> MethodCall {
        MethodCall::new("stopComponent")
            .arg("transactionName", transaction)
            .arg("componentName", component)
    }

    /// `addBreadcrumb`
    #[must_use]
    pub fn add_breadcrumb(name: &str, action: &str) -> MethodCall {
        MethodCall::new("addBreadcrumb")
            .arg("name", name)
            .arg("action", action)
    }

    /// `addScreen` with a fixed start time
    #[must_use]
    pub fn add_screen(name: &str, load_time: i32) -> MethodCall {
        MethodCall::with_arguments(
            "addScreen",
            json!({ "name": name, "loadTime": load_time, "startTime": 1_700_000_000_000_i64 }),
        )
    }

    /// `addHttpCall` for a `GET` from the `home` screen
    #[must_use]
    pub fn add_http_call(url: &str, status_code: i32) -> MethodCall {
        MethodCall::with_arguments(
            "addHttpCall",
            json!({
                "url": url,
                "requestMethod": "GET",
                "startTime": 1_700_000_000_000_i64,
                "loadTime": 120,
                "statusCode": status_code,
                "currentRoute": "home",
            }),
        )
    }

    /// `captureException` without `isHandled`
    #[must_use]
    pub fn capture_exception(error_type: &str, msg: &str) -> MethodCall {
        MethodCall::with_arguments(
            "captureException",
            json!({
                "msg": msg,
                "type": error_type,
                "file": "main.dart",
                "function": "build",
                "stack": "#0 build (main.dart:10)",
                "currentRoute": "home",
                "startTime": 1_700_000_000_000_i64,
            }),
        )
    }

    /// `setUserId`
    #[must_use]
    pub fn set_user_id(user_id: &str) -> MethodCall {
        MethodCall::new("setUserId").arg("userId", user_id)
    }

    /// `flush`
    #[must_use]
    pub fn flush() -> MethodCall {
        MethodCall::new("flush")
    }

    /// `crashNative`
    #[must_use]
    pub fn crash_native() -> MethodCall {
        MethodCall::new("crashNative")
    }
}

/// Property-based testing utilities using proptest.
///
/// Names are drawn from small pools so generated scripts revisit the same
/// transactions and components often.
pub mod properties {
    use super::calls;
    use apm_bridge_core::MethodCall;
    use proptest::prelude::*;

    /// A lifecycle step, before it is turned into a [`MethodCall`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LifecycleStep {
        /// `startTransaction`
        StartTransaction(String),
        /// `stopTransaction`
        StopTransaction(String),
        /// `startComponent`
        StartComponent(String, String),
        /// `stopComponent`
        StopComponent(String, String),
    }

    impl LifecycleStep {
        /// The method call for this step
        #[must_use]
        pub fn to_call(&self) -> MethodCall {
            match self {
                Self::StartTransaction(t) => calls::start_transaction(t),
                Self::StopTransaction(t) => calls::stop_transaction(t),
                Self::StartComponent(t, c) => calls::start_component(t, c),
                Self::StopComponent(t, c) => calls::stop_component(t, c),
            }
        }
    }

    /// Transaction names; includes pairs that collide when concatenated
    /// with component names (`"a"`+`"bc"` vs `"ab"`+`"c"`).
    pub fn transaction_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["a", "ab", "t1", "t2"]).prop_map(String::from)
    }

    /// Component names
    pub fn component_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["bc", "c", "c1", "c2"]).prop_map(String::from)
    }

    /// One lifecycle step
    pub fn lifecycle_step() -> impl Strategy<Value = LifecycleStep> {
        prop_oneof![
            transaction_name().prop_map(LifecycleStep::StartTransaction),
            transaction_name().prop_map(LifecycleStep::StopTransaction),
            (transaction_name(), component_name())
                .prop_map(|(t, c)| LifecycleStep::StartComponent(t, c)),
            (transaction_name(), component_name())
                .prop_map(|(t, c)| LifecycleStep::StopComponent(t, c)),
        ]
    }

    /// A script of up to `max_len` lifecycle steps
    pub fn lifecycle_script(max_len: usize) -> impl Strategy<Value = Vec<LifecycleStep>> {
        prop::collection::vec(lifecycle_step(), 0..=max_len)
    }

    /// Methods that are not part of the command surface
    pub fn unknown_method() -> impl Strategy<Value = String> {
        "[a-zA-Z]{1,24}".prop_filter("must not be a known command", |method| {
            !KNOWN_METHODS.contains(&method.as_str())
        })
    }

    /// Every method the bridge understands
    pub const KNOWN_METHODS: [&str; 14] = [
        "startMonitoring",
        "startMonitoringWithEndPoint",
        "trackNativeExceptions",
        "startTransaction",
        "stopTransaction",
        "startComponent",
        "stopComponent",
        "addBreadcrumb",
        "addScreen",
        "addHttpCall",
        "captureException",
        "setUserId",
        "flush",
        "crashNative",
    ];
}

// Re-export commonly used items
pub use dispatch_test::DispatchTest;
pub use recording_engine::{EngineCall, EngineOp, RecordedComponent, RecordedTransaction, RecordingEngine};

#[cfg(test)]
mod tests {
    use super::*;
    use apm_bridge_core::Command;

    #[test]
    fn every_fixture_decodes() {
        let fixtures = [
            calls::start_monitoring("key", 60),
            calls::start_monitoring_with_endpoint("key", 60, "https://collector.example.com"),
            calls::track_native_exceptions(),
            calls::start_transaction("t"),
            calls::stop_transaction("t"),
            calls::start_component("t", "c"),
            calls::stop_component("t", "c"),
            calls::add_breadcrumb("home", "tap"),
            calls::add_screen("home", 250),
            calls::add_http_call("https://api.example.com", 200),
            calls::capture_exception("StateError", "boom"),
            calls::set_user_id("u-1"),
            calls::flush(),
            calls::crash_native(),
        ];

        for call in &fixtures {
            assert!(Command::decode(call).is_ok(), "{} should decode", call.method());
        }
        let methods: Vec<&str> = fixtures.iter().map(apm_bridge_core::MethodCall::method).collect();
        assert_eq!(methods, properties::KNOWN_METHODS);
    }
}
