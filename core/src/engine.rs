//! The monitoring engine facade.
//!
//! The bridge never talks to a monitoring SDK directly. It is generic over a
//! [`MonitoringEngine`], which hands out opaque transaction handles, and a
//! [`TransactionHandle`], which hands out opaque component handles scoped to
//! that transaction. Every operation returns an explicit [`EngineError`]
//! instead of throwing; the dispatcher decides per command whether a failure
//! is fatal or merely logged.
//!
//! # Example
//!
//! ```
//! use apm_bridge_core::command::{Breadcrumb, CapturedError, Endpoint, HttpCall, Screen};
//! use apm_bridge_core::engine::{MonitoringEngine, TransactionHandle};
//! use apm_bridge_core::error::EngineError;
//!
//! struct NoopEngine;
//! struct NoopTransaction;
//!
//! impl TransactionHandle for NoopTransaction {
//!     type Component = ();
//!
//!     fn start_component(&self, _name: &str) -> Result<(), EngineError> {
//!         Ok(())
//!     }
//!
//!     fn stop_component(&self, _component: ()) -> Result<(), EngineError> {
//!         Ok(())
//!     }
//! }
//!
//! impl MonitoringEngine for NoopEngine {
//!     type Transaction = NoopTransaction;
//!
//!     fn start_monitoring(&self, _: &str, _: i32, _: Option<&Endpoint>) -> Result<(), EngineError> { Ok(()) }
//!     fn enable_error_reporting(&self) -> Result<(), EngineError> { Ok(()) }
//!     fn start_transaction(&self, _: &str) -> Result<NoopTransaction, EngineError> { Ok(NoopTransaction) }
//!     fn stop_transaction(&self, _: NoopTransaction) -> Result<(), EngineError> { Ok(()) }
//!     fn add_breadcrumb(&self, _: &Breadcrumb) -> Result<(), EngineError> { Ok(()) }
//!     fn add_screen(&self, _: &Screen) -> Result<(), EngineError> { Ok(()) }
//!     fn add_http_call(&self, _: &HttpCall) -> Result<(), EngineError> { Ok(()) }
//!     fn add_error(&self, _: &CapturedError) -> Result<(), EngineError> { Ok(()) }
//!     fn set_user_id(&self, _: &str) -> Result<(), EngineError> { Ok(()) }
//!     fn flush(&self) -> Result<(), EngineError> { Ok(()) }
//! }
//! ```

use crate::command::{Breadcrumb, CapturedError, Endpoint, HttpCall, Screen};
use crate::error::EngineError;

/// Handle for a running transaction.
///
/// Components can only be started and stopped through the transaction that
/// owns them.
pub trait TransactionHandle: Send {
    /// Opaque handle for a running component
    type Component: Send;

    /// Start a component within this transaction.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine refuses the component.
    fn start_component(&self, name: &str) -> Result<Self::Component, EngineError>;

    /// Stop a component previously started on this transaction.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine fails to finalize it.
    fn stop_component(&self, component: Self::Component) -> Result<(), EngineError>;
}

/// The monitoring engine's call surface.
///
/// Implementations must be shareable across threads: the dispatcher may be
/// driven from several origins at once.
pub trait MonitoringEngine: Send + Sync {
    /// Opaque handle for a running transaction
    type Transaction: TransactionHandle;

    /// Start monitoring, optionally against a custom collector endpoint.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if monitoring cannot be started.
    fn start_monitoring(
        &self,
        app_key: &str,
        upload_interval: i32,
        endpoint: Option<&Endpoint>,
    ) -> Result<(), EngineError>;

    /// Turn on crash and error reporting.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if reporting cannot be enabled.
    fn enable_error_reporting(&self) -> Result<(), EngineError>;

    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the transaction cannot be started.
    fn start_transaction(&self, name: &str) -> Result<Self::Transaction, EngineError>;

    /// End a transaction, consuming its handle.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the transaction cannot be finalized.
    fn stop_transaction(&self, transaction: Self::Transaction) -> Result<(), EngineError>;

    /// Record a breadcrumb.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine rejects the record.
    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) -> Result<(), EngineError>;

    /// Record a screen load.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine rejects the record.
    fn add_screen(&self, screen: &Screen) -> Result<(), EngineError>;

    /// Record an HTTP call.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine rejects the record.
    fn add_http_call(&self, call: &HttpCall) -> Result<(), EngineError>;

    /// Record an application error.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine rejects the record.
    fn add_error(&self, error: &CapturedError) -> Result<(), EngineError>;

    /// Associate subsequent data with a user.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine rejects the id.
    fn set_user_id(&self, user_id: &str) -> Result<(), EngineError>;

    /// Push buffered data to the collector now.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the flush fails.
    fn flush(&self) -> Result<(), EngineError>;
}

/// Component handle type of an engine.
pub type ComponentHandle<E> =
    <<E as MonitoringEngine>::Transaction as TransactionHandle>::Component;
