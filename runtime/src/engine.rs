//! A monitoring engine that records everything as `tracing` events.
//!
//! Useful for development hosts and for running the bridge without a real
//! monitoring SDK: every facade call becomes a structured log line, and
//! handles are sequential ids.

use apm_bridge_core::command::{Breadcrumb, CapturedError, Endpoint, HttpCall, Screen};
use apm_bridge_core::{EngineError, MonitoringEngine, TransactionHandle};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Engine that logs every call and mints sequential handles.
///
/// Empty transaction and component names are rejected, as a real engine
/// would.
#[derive(Debug, Clone, Default)]
pub struct LoggingEngine {
    next_id: Arc<AtomicU64>,
    monitoring: Arc<AtomicBool>,
}

impl LoggingEngine {
    /// Create a new engine
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `start_monitoring` has succeeded
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Transaction handle minted by [`LoggingEngine`]
#[derive(Debug)]
pub struct LoggedTransaction {
    id: u64,
    name: String,
    next_id: Arc<AtomicU64>,
}

impl LoggedTransaction {
    /// Handle id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Transaction name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Component handle minted by [`LoggingEngine`]
#[derive(Debug)]
pub struct LoggedComponent {
    id: u64,
    name: String,
}

impl LoggedComponent {
    /// Handle id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Component name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TransactionHandle for LoggedTransaction {
    type Component = LoggedComponent;

    fn start_component(&self, name: &str) -> Result<LoggedComponent, EngineError> {
        if name.is_empty() {
            return Err(EngineError::rejected("start_component", "component name is empty"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(transaction = %self.name, component = name, id, "apm: component started");
        Ok(LoggedComponent {
            id,
            name: name.to_string(),
        })
    }

    fn stop_component(&self, component: LoggedComponent) -> Result<(), EngineError> {
        tracing::info!(
            transaction = %self.name,
            component = %component.name,
            id = component.id,
            "apm: component stopped"
        );
        Ok(())
    }
}

impl MonitoringEngine for LoggingEngine {
    type Transaction = LoggedTransaction;

    fn start_monitoring(
        &self,
        app_key: &str,
        upload_interval: i32,
        endpoint: Option<&Endpoint>,
    ) -> Result<(), EngineError> {
        if app_key.is_empty() {
            return Err(EngineError::rejected("start_monitoring", "app key is empty"));
        }
        if upload_interval <= 0 {
            return Err(EngineError::rejected(
                "start_monitoring",
                format!("upload interval must be positive, got {upload_interval}"),
            ));
        }
        self.monitoring.store(true, Ordering::Release);
        tracing::info!(
            upload_interval,
            endpoint = endpoint.map(Endpoint::as_str),
            "apm: monitoring started"
        );
        Ok(())
    }

    fn enable_error_reporting(&self) -> Result<(), EngineError> {
        tracing::info!("apm: error reporting enabled");
        Ok(())
    }

    fn start_transaction(&self, name: &str) -> Result<LoggedTransaction, EngineError> {
        if name.is_empty() {
            return Err(EngineError::rejected("start_transaction", "transaction name is empty"));
        }
        let id = self.next_id();
        tracing::info!(transaction = name, id, "apm: transaction started");
        Ok(LoggedTransaction {
            id,
            name: name.to_string(),
            next_id: Arc::clone(&self.next_id),
        })
    }

    fn stop_transaction(&self, transaction: LoggedTransaction) -> Result<(), EngineError> {
        tracing::info!(
            transaction = %transaction.name,
            id = transaction.id,
            "apm: transaction stopped"
        );
        Ok(())
    }

    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) -> Result<(), EngineError> {
        tracing::info!(name = %breadcrumb.name, action = %breadcrumb.action, "apm: breadcrumb");
        Ok(())
    }

    fn add_screen(&self, screen: &Screen) -> Result<(), EngineError> {
        tracing::info!(
            name = %screen.name,
            load_time_ms = screen.load_time,
            started_at = %format_epoch_millis(screen.start_time),
            "apm: screen"
        );
        Ok(())
    }

    fn add_http_call(&self, call: &HttpCall) -> Result<(), EngineError> {
        tracing::info!(
            url = %call.url,
            method = %call.request_method,
            status = call.status_code,
            load_time_ms = call.load_time,
            started_at = %format_epoch_millis(call.start_time),
            screen = %call.current_route,
            "apm: http call"
        );
        Ok(())
    }

    fn add_error(&self, error: &CapturedError) -> Result<(), EngineError> {
        tracing::info!(
            error_type = %error.error_type,
            message = %error.msg,
            file = %error.file,
            function = %error.function,
            screen = %error.current_route,
            handled = error.is_handled,
            occurred_at = %format_epoch_millis(error.start_time),
            "apm: error"
        );
        Ok(())
    }

    fn set_user_id(&self, user_id: &str) -> Result<(), EngineError> {
        tracing::info!(user_id, "apm: user id set");
        Ok(())
    }

    fn flush(&self) -> Result<(), EngineError> {
        if !self.is_monitoring() {
            return Err(EngineError::Unavailable("monitoring has not been started".into()));
        }
        tracing::info!("apm: flushed");
        Ok(())
    }
}

/// Render epoch milliseconds as RFC 3339, falling back to the raw number.
fn format_epoch_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |time| time.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_sequential_across_transactions_and_components() {
        let engine = LoggingEngine::new();
        let Ok(first) = engine.start_transaction("first") else {
            unreachable!("non-empty name is accepted");
        };
        let Ok(component) = first.start_component("db") else {
            unreachable!("non-empty name is accepted");
        };
        let Ok(second) = engine.start_transaction("second") else {
            unreachable!("non-empty name is accepted");
        };

        assert_eq!((first.id(), component.id(), second.id()), (1, 2, 3));
        assert_eq!(component.name(), "db");
        assert_eq!(second.name(), "second");
    }

    #[test]
    fn empty_names_are_rejected() {
        let engine = LoggingEngine::new();
        assert!(matches!(
            engine.start_transaction(""),
            Err(EngineError::Rejected { operation: "start_transaction", .. })
        ));

        let Ok(transaction) = engine.start_transaction("t") else {
            unreachable!("non-empty name is accepted");
        };
        assert!(transaction.start_component("").is_err());
    }

    #[test]
    fn flush_requires_monitoring() {
        let engine = LoggingEngine::new();
        assert!(matches!(engine.flush(), Err(EngineError::Unavailable(_))));

        assert_eq!(engine.start_monitoring("key", 60, None), Ok(()));
        assert!(engine.is_monitoring());
        assert_eq!(engine.flush(), Ok(()));
    }

    #[test]
    fn start_monitoring_validates_interval() {
        let engine = LoggingEngine::new();
        assert!(engine.start_monitoring("key", 0, None).is_err());
        assert!(!engine.is_monitoring());
    }

    #[test]
    fn epoch_millis_render_as_rfc3339() {
        assert_eq!(format_epoch_millis(0), "1970-01-01T00:00:00.000Z");
    }
}
