//! Command dispatcher: decode, resolve against the registry, call the engine.
//!
//! # Failure policy
//!
//! | Situation | Outcome |
//! |---|---|
//! | Unknown method | `Ok(Reply::NotImplemented)` |
//! | Missing / malformed field | `Err(BridgeError::ContractViolation)` |
//! | Engine failure in a start-up command | `Err(BridgeError::StartupFailed)` |
//! | Stop / component for something not live | `Ok(Reply::Handled)`, logged at `debug` |
//! | `stopTransaction` with components still live | they are stopped first, logged at `warn` |
//! | Engine failure anywhere else | `Ok(Reply::Handled)`, logged at `warn` |
//! | `crashNative` | `Err(BridgeError::CrashRequested)` |
//!
//! Nothing is retried.

use crate::config::{BridgeConfig, SupersedePolicy};
use crate::metrics::BridgeMetrics;
use crate::registry::LifecycleRegistry;
use apm_bridge_core::command::{ComponentArgs, Endpoint};
use apm_bridge_core::{
    BridgeError, Command, ComponentHandle, ComponentKey, EngineError, MethodCall,
    MonitoringEngine, Reply, TransactionHandle,
};
use std::fmt;
use std::time::Instant;

/// Registry type used by a dispatcher over engine `E`
pub type EngineRegistry<E> =
    LifecycleRegistry<<E as MonitoringEngine>::Transaction, ComponentHandle<E>>;

/// Executes commands against a [`MonitoringEngine`], tracking lifecycle
/// handles in a [`LifecycleRegistry`].
///
/// `handle` takes `&self`; share the dispatcher behind an `Arc` to drive it
/// from several threads.
///
/// # Example
///
/// ```ignore
/// let dispatcher = Dispatcher::new(LoggingEngine::new());
///
/// dispatcher.handle(&MethodCall::new("startTransaction").arg("name", "checkout"))?;
/// assert_eq!(dispatcher.registry().live_transactions(), 1);
/// ```
pub struct Dispatcher<E: MonitoringEngine> {
    engine: E,
    registry: EngineRegistry<E>,
    supersede_policy: SupersedePolicy,
}

impl<E: MonitoringEngine> Dispatcher<E> {
    /// Create a dispatcher with the default configuration
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, &BridgeConfig::default())
    }

    /// Create a dispatcher with a custom configuration
    #[must_use]
    pub fn with_config(engine: E, config: &BridgeConfig) -> Self {
        Self {
            engine,
            registry: LifecycleRegistry::new(),
            supersede_policy: config.supersede_policy,
        }
    }

    /// The engine commands are forwarded to
    #[must_use]
    pub const fn engine(&self) -> &E {
        &self.engine
    }

    /// The lifecycle registry
    #[must_use]
    pub const fn registry(&self) -> &EngineRegistry<E> {
        &self.registry
    }

    /// Decode and execute one method call.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ContractViolation`] if a required field is missing or malformed
    /// - [`BridgeError::StartupFailed`] if the engine fails to start monitoring or
    ///   enable error reporting
    /// - [`BridgeError::CrashRequested`] for `crashNative`, always
    #[tracing::instrument(skip(self, call), fields(method = %call.method()), name = "bridge_handle")]
    pub fn handle(&self, call: &MethodCall) -> Result<Reply, BridgeError> {
        let command = match Command::decode(call) {
            Ok(command) => command,
            Err(e) if e.is_unknown_method() => {
                tracing::debug!("Method not implemented");
                BridgeMetrics::record_not_implemented();
                return Ok(Reply::NotImplemented);
            },
            Err(e) => {
                tracing::error!(error = %e, "Rejecting malformed command");
                BridgeMetrics::record_contract_violation(call.method());
                return Err(BridgeError::ContractViolation(e));
            },
        };

        self.execute(command).map(|()| Reply::Handled)
    }

    /// Execute an already decoded command.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::handle`]; decoding errors cannot occur here.
    pub fn execute(&self, command: Command) -> Result<(), BridgeError> {
        let method = command.method_name();
        let started = Instant::now();

        let result = match command {
            Command::StartMonitoring(args) => {
                self.start_monitoring(method, &args.app_key, args.upload_interval, None)
            },
            Command::StartMonitoringWithEndPoint(args) => self.start_monitoring(
                method,
                &args.app_key,
                args.upload_interval,
                Some(&args.end_point),
            ),
            Command::TrackNativeExceptions => self
                .engine
                .enable_error_reporting()
                .map_err(|source| startup_failed(method, source)),
            Command::StartTransaction(args) => {
                self.start_transaction(args.name);
                Ok(())
            },
            Command::StopTransaction(args) => {
                self.stop_transaction(&args.name);
                Ok(())
            },
            Command::StartComponent(args) => {
                self.start_component(&args);
                Ok(())
            },
            Command::StopComponent(args) => {
                self.stop_component(&args);
                Ok(())
            },
            Command::AddBreadcrumb(breadcrumb) => {
                best_effort(method, self.engine.add_breadcrumb(&breadcrumb));
                Ok(())
            },
            Command::AddScreen(screen) => {
                best_effort(method, self.engine.add_screen(&screen));
                Ok(())
            },
            Command::AddHttpCall(call) => {
                best_effort(method, self.engine.add_http_call(&call));
                Ok(())
            },
            Command::CaptureException(error) => {
                best_effort(method, self.engine.add_error(&error));
                Ok(())
            },
            Command::SetUserId(args) => {
                best_effort(method, self.engine.set_user_id(&args.user_id));
                Ok(())
            },
            Command::Flush => {
                best_effort(method, self.engine.flush());
                Ok(())
            },
            Command::CrashNative => {
                tracing::error!("Crash requested by host");
                Err(BridgeError::CrashRequested)
            },
        };

        BridgeMetrics::record_dispatch(method, started.elapsed());
        BridgeMetrics::record_registry(
            self.registry.live_transactions(),
            self.registry.live_components(),
        );
        result
    }

    fn start_monitoring(
        &self,
        method: &'static str,
        app_key: &str,
        upload_interval: i32,
        endpoint: Option<&Endpoint>,
    ) -> Result<(), BridgeError> {
        self.engine
            .start_monitoring(app_key, upload_interval, endpoint)
            .map_err(|source| startup_failed(method, source))?;

        tracing::info!(
            upload_interval,
            endpoint = endpoint.map(Endpoint::as_str),
            "Monitoring started"
        );
        Ok(())
    }

    fn start_transaction(&self, name: String) {
        let transaction = match self.engine.start_transaction(&name) {
            Ok(transaction) => transaction,
            Err(e) => {
                engine_failure("startTransaction", &e);
                return;
            },
        };

        let mut registry = self.registry.lock();
        let Some(previous) = registry.insert_transaction(name.clone(), transaction) else {
            tracing::debug!(transaction = %name, "Transaction started");
            return;
        };

        tracing::warn!(
            transaction = %name,
            policy = %self.supersede_policy,
            "Transaction restarted while live"
        );
        BridgeMetrics::record_superseded("transaction");

        // Components of the old handle never carry over to the new one
        let orphans = registry.remove_components_of(&name);
        drop(registry);

        if self.supersede_policy == SupersedePolicy::Replace {
            if !orphans.is_empty() {
                let keys: Vec<&ComponentKey> = orphans.iter().map(|(key, _)| key).collect();
                tracing::warn!(components = ?keys, "Dropping components of the replaced transaction");
            }
            return;
        }

        for (key, component) in orphans {
            if let Err(e) = previous.stop_component(component) {
                tracing::warn!(component = %key, error = %e, "Failed to stop superseded component");
                BridgeMetrics::record_engine_failure("startTransaction");
            }
        }
        best_effort("startTransaction", self.engine.stop_transaction(previous));
    }

    fn stop_transaction(&self, name: &str) {
        let mut registry = self.registry.lock();
        let Some(transaction) = registry.remove_transaction(name) else {
            drop(registry);
            sequencing_noop("stopTransaction", name, None);
            return;
        };
        let orphans = registry.remove_components_of(name);
        drop(registry);

        // Components die with their transaction, through its own handle
        for (key, component) in orphans {
            tracing::warn!(component = %key, "Component still live at transaction stop");
            if let Err(e) = transaction.stop_component(component) {
                engine_failure("stopTransaction", &e);
            }
        }

        match self.engine.stop_transaction(transaction) {
            Ok(()) => tracing::debug!(transaction = %name, "Transaction stopped"),
            Err(e) => engine_failure("stopTransaction", &e),
        }
    }

    fn start_component(&self, args: &ComponentArgs) {
        let key = args.key();
        let mut registry = self.registry.lock();

        let Some(transaction) = registry.transaction(key.transaction()) else {
            sequencing_noop("startComponent", key.transaction(), Some(key.component()));
            return;
        };

        let component = match transaction.start_component(key.component()) {
            Ok(component) => component,
            Err(e) => {
                engine_failure("startComponent", &e);
                return;
            },
        };

        let Some(previous) = registry.insert_component(key.clone(), component) else {
            tracing::debug!(component = %key, "Component started");
            return;
        };

        tracing::warn!(
            component = %key,
            policy = %self.supersede_policy,
            "Component restarted while live"
        );
        BridgeMetrics::record_superseded("component");

        if self.supersede_policy == SupersedePolicy::Finalize {
            if let Some(transaction) = registry.transaction(key.transaction()) {
                best_effort("startComponent", transaction.stop_component(previous));
            }
        }
    }

    fn stop_component(&self, args: &ComponentArgs) {
        let key = args.key();
        let mut registry = self.registry.lock();

        let Some((transaction, component)) = registry.take_component(&key) else {
            sequencing_noop("stopComponent", key.transaction(), Some(key.component()));
            return;
        };

        match transaction.stop_component(component) {
            Ok(()) => tracing::debug!(component = %key, "Component stopped"),
            Err(e) => engine_failure("stopComponent", &e),
        }
    }
}

impl<E: MonitoringEngine> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("supersede_policy", &self.supersede_policy)
            .finish_non_exhaustive()
    }
}

const fn startup_failed(command: &'static str, source: EngineError) -> BridgeError {
    BridgeError::StartupFailed { command, source }
}

fn best_effort(command: &'static str, result: Result<(), EngineError>) {
    if let Err(e) = result {
        engine_failure(command, &e);
    }
}

fn engine_failure(command: &'static str, error: &EngineError) {
    tracing::warn!(command, error = %error, "Engine call failed, continuing");
    BridgeMetrics::record_engine_failure(command);
}

fn sequencing_noop(command: &'static str, transaction: &str, component: Option<&str>) {
    tracing::debug!(command, transaction, component, "Nothing live to act on, ignoring");
    BridgeMetrics::record_sequencing_noop(command);
}
