//! In-memory monitoring engine that records every call
//!
//! Provides deterministic engine doubles for dispatcher tests:
//! - [`RecordingEngine`]: records accepted calls in order, mints sequential handles
//! - [`EngineOp`]: names an engine operation, for failure injection and filtering
//! - [`EngineCall`]: one recorded call with the handles it touched

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Only panics on a poisoned lock

use apm_bridge_core::command::{Breadcrumb, CapturedError, Endpoint, HttpCall, Screen};
use apm_bridge_core::{EngineError, MonitoringEngine, TransactionHandle};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Engine operation names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// `start_monitoring`
    StartMonitoring,
    /// `enable_error_reporting`
    EnableErrorReporting,
    /// `start_transaction`
    StartTransaction,
    /// `stop_transaction`
    StopTransaction,
    /// `TransactionHandle::start_component`
    StartComponent,
    /// `TransactionHandle::stop_component`
    StopComponent,
    /// `add_breadcrumb`
    AddBreadcrumb,
    /// `add_screen`
    AddScreen,
    /// `add_http_call`
    AddHttpCall,
    /// `add_error`
    AddError,
    /// `set_user_id`
    SetUserId,
    /// `flush`
    Flush,
}

impl EngineOp {
    const fn name(self) -> &'static str {
        match self {
            Self::StartMonitoring => "start_monitoring",
            Self::EnableErrorReporting => "enable_error_reporting",
            Self::StartTransaction => "start_transaction",
            Self::StopTransaction => "stop_transaction",
            Self::StartComponent => "start_component",
            Self::StopComponent => "stop_component",
            Self::AddBreadcrumb => "add_breadcrumb",
            Self::AddScreen => "add_screen",
            Self::AddHttpCall => "add_http_call",
            Self::AddError => "add_error",
            Self::SetUserId => "set_user_id",
            Self::Flush => "flush",
        }
    }
}

/// One call the engine accepted.
///
/// Handles are identified by the sequential id they were minted with, so a
/// test can tell which `start` a `stop` belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// Monitoring started
    StartMonitoring {
        /// Application key
        app_key: String,
        /// Upload interval
        upload_interval: i32,
        /// Custom upload endpoint, if any
        endpoint: Option<String>,
    },
    /// Error reporting enabled
    EnableErrorReporting,
    /// Transaction started
    StartTransaction {
        /// Transaction name
        name: String,
        /// Minted handle id
        handle: u64,
    },
    /// Transaction stopped
    StopTransaction {
        /// Transaction name
        name: String,
        /// Handle id being stopped
        handle: u64,
    },
    /// Component started on a transaction handle
    StartComponent {
        /// Owning transaction handle id
        transaction: u64,
        /// Component name
        name: String,
        /// Minted handle id
        handle: u64,
    },
    /// Component stopped through a transaction handle
    StopComponent {
        /// Transaction handle id the stop went through
        transaction: u64,
        /// Component name
        name: String,
        /// Handle id being stopped
        handle: u64,
    },
    /// Breadcrumb recorded
    AddBreadcrumb(Breadcrumb),
    /// Screen recorded
    AddScreen(Screen),
    /// HTTP call recorded
    AddHttpCall(HttpCall),
    /// Error recorded
    AddError(CapturedError),
    /// User id set
    SetUserId(String),
    /// Buffered data flushed
    Flush,
}

impl EngineCall {
    /// The operation this call went through
    #[must_use]
    pub const fn op(&self) -> EngineOp {
        match self {
            Self::StartMonitoring { .. } => EngineOp::StartMonitoring,
            Self::EnableErrorReporting => EngineOp::EnableErrorReporting,
            Self::StartTransaction { .. } => EngineOp::StartTransaction,
            Self::StopTransaction { .. } => EngineOp::StopTransaction,
            Self::StartComponent { .. } => EngineOp::StartComponent,
            Self::StopComponent { .. } => EngineOp::StopComponent,
            Self::AddBreadcrumb(_) => EngineOp::AddBreadcrumb,
            Self::AddScreen(_) => EngineOp::AddScreen,
            Self::AddHttpCall(_) => EngineOp::AddHttpCall,
            Self::AddError(_) => EngineOp::AddError,
            Self::SetUserId(_) => EngineOp::SetUserId,
            Self::Flush => EngineOp::Flush,
        }
    }
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<EngineCall>,
    rejected: Vec<EngineOp>,
    failing: HashSet<EngineOp>,
    last_handle: u64,
}

impl Recording {
    fn check(&mut self, op: EngineOp) -> Result<(), EngineError> {
        if self.failing.contains(&op) {
            self.rejected.push(op);
            return Err(EngineError::rejected(op.name(), "failure injected by test"));
        }
        Ok(())
    }

    const fn mint(&mut self) -> u64 {
        self.last_handle += 1;
        self.last_handle
    }
}

/// Monitoring engine double.
///
/// Clones share the same recording, so a test can keep one clone and hand
/// the other to a dispatcher.
///
/// # Example
///
/// ```
/// use apm_bridge_core::MonitoringEngine;
/// use apm_bridge_testing::{EngineCall, EngineOp, RecordingEngine};
///
/// let engine = RecordingEngine::new().failing_on(EngineOp::Flush);
///
/// assert!(engine.set_user_id("u-1").is_ok());
/// assert!(engine.flush().is_err());
///
/// assert_eq!(engine.calls(), vec![EngineCall::SetUserId("u-1".into())]);
/// assert_eq!(engine.rejected(), vec![EngineOp::Flush]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingEngine {
    /// Create an engine that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `op` fail from now on
    #[must_use]
    pub fn failing_on(self, op: EngineOp) -> Self {
        self.fail(op);
        self
    }

    /// Make every call to `op` fail from now on
    pub fn fail(&self, op: EngineOp) {
        self.recording.lock().unwrap().failing.insert(op);
    }

    /// Let calls to `op` succeed again
    pub fn recover(&self, op: EngineOp) {
        self.recording.lock().unwrap().failing.remove(&op);
    }

    /// Every accepted call so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.recording.lock().unwrap().calls.clone()
    }

    /// Accepted calls through one operation
    #[must_use]
    pub fn calls_to(&self, op: EngineOp) -> Vec<EngineCall> {
        self.recording
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .cloned()
            .collect()
    }

    /// Drain the accepted calls recorded so far
    #[must_use]
    pub fn take_calls(&self) -> Vec<EngineCall> {
        std::mem::take(&mut self.recording.lock().unwrap().calls)
    }

    /// Operations that failed because of injection, in order
    #[must_use]
    pub fn rejected(&self) -> Vec<EngineOp> {
        self.recording.lock().unwrap().rejected.clone()
    }

    fn record(&self, op: EngineOp, call: EngineCall) -> Result<(), EngineError> {
        let mut recording = self.recording.lock().unwrap();
        recording.check(op)?;
        recording.calls.push(call);
        Ok(())
    }
}

/// Transaction handle minted by [`RecordingEngine`]
#[derive(Debug)]
pub struct RecordedTransaction {
    id: u64,
    name: String,
    recording: Arc<Mutex<Recording>>,
}

impl RecordedTransaction {
    /// Minted handle id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Component handle minted by [`RecordingEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedComponent {
    id: u64,
    name: String,
}

impl RecordedComponent {
    /// Minted handle id
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl TransactionHandle for RecordedTransaction {
    type Component = RecordedComponent;

    fn start_component(&self, name: &str) -> Result<RecordedComponent, EngineError> {
        let mut recording = self.recording.lock().unwrap();
        recording.check(EngineOp::StartComponent)?;
        let handle = recording.mint();
        recording.calls.push(EngineCall::StartComponent {
            transaction: self.id,
            name: name.to_string(),
            handle,
        });
        Ok(RecordedComponent {
            id: handle,
            name: name.to_string(),
        })
    }

    fn stop_component(&self, component: RecordedComponent) -> Result<(), EngineError> {
        let mut recording = self.recording.lock().unwrap();
        recording.check(EngineOp::StopComponent)?;
        recording.calls.push(EngineCall::StopComponent {
            transaction: self.id,
            name: component.name,
            handle: component.id,
        });
        Ok(())
    }
}

impl MonitoringEngine for RecordingEngine {
    type Transaction = RecordedTransaction;

    fn start_monitoring(
        &self,
        app_key: &str,
        upload_interval: i32,
        endpoint: Option<&Endpoint>,
    ) -> Result<(), EngineError> {
        self.record(
            EngineOp::StartMonitoring,
            EngineCall::StartMonitoring {
                app_key: app_key.to_string(),
                upload_interval,
                endpoint: endpoint.map(|e| e.as_str().to_string()),
            },
        )
    }

    fn enable_error_reporting(&self) -> Result<(), EngineError> {
        self.record(EngineOp::EnableErrorReporting, EngineCall::EnableErrorReporting)
    }

    fn start_transaction(&self, name: &str) -> Result<RecordedTransaction, EngineError> {
        let mut recording = self.recording.lock().unwrap();
        recording.check(EngineOp::StartTransaction)?;
        let handle = recording.mint();
        recording.calls.push(EngineCall::StartTransaction {
            name: name.to_string(),
            handle,
        });
        Ok(RecordedTransaction {
            id: handle,
            name: name.to_string(),
            recording: Arc::clone(&self.recording),
        })
    }

    fn stop_transaction(&self, transaction: RecordedTransaction) -> Result<(), EngineError> {
        self.record(
            EngineOp::StopTransaction,
            EngineCall::StopTransaction {
                name: transaction.name,
                handle: transaction.id,
            },
        )
    }

    fn add_breadcrumb(&self, breadcrumb: &Breadcrumb) -> Result<(), EngineError> {
        self.record(EngineOp::AddBreadcrumb, EngineCall::AddBreadcrumb(breadcrumb.clone()))
    }

    fn add_screen(&self, screen: &Screen) -> Result<(), EngineError> {
        self.record(EngineOp::AddScreen, EngineCall::AddScreen(screen.clone()))
    }

    fn add_http_call(&self, call: &HttpCall) -> Result<(), EngineError> {
        self.record(EngineOp::AddHttpCall, EngineCall::AddHttpCall(call.clone()))
    }

    fn add_error(&self, error: &CapturedError) -> Result<(), EngineError> {
        self.record(EngineOp::AddError, EngineCall::AddError(error.clone()))
    }

    fn set_user_id(&self, user_id: &str) -> Result<(), EngineError> {
        self.record(EngineOp::SetUserId, EngineCall::SetUserId(user_id.to_string()))
    }

    fn flush(&self) -> Result<(), EngineError> {
        self.record(EngineOp::Flush, EngineCall::Flush)
    }
}
