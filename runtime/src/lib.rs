//! # APM Bridge Runtime
//!
//! Runtime implementation for the APM command bridge.
//!
//! This crate executes decoded commands against a monitoring engine and keeps
//! track of the transaction and component handles that are in flight.
//!
//! ## Core Components
//!
//! - **Dispatcher**: decodes a `MethodCall`, applies the failure policy and
//!   forwards to the engine
//! - **Lifecycle Registry**: live transaction handles by name, live component
//!   handles by `(transaction, component)`
//! - **Method Channel**: an async transport that serializes calls from the host
//!   onto a single worker and sends each reply back
//! - **Logging Engine**: an engine that turns every call into a `tracing` event
//!
//! ## Example
//!
//! ```ignore
//! use apm_bridge_core::MethodCall;
//! use apm_bridge_runtime::{BridgeConfig, Dispatcher, LoggingEngine, MethodChannel};
//! use std::sync::Arc;
//!
//! let config = BridgeConfig::from_env()?;
//! let dispatcher = Arc::new(Dispatcher::with_config(LoggingEngine::new(), &config));
//! let channel = MethodChannel::attach(&config, dispatcher);
//!
//! let reply = channel
//!     .handle()
//!     .invoke(MethodCall::new("startTransaction").arg("name", "checkout"))
//!     .await?;
//!
//! channel.detach().await;
//! ```

/// Async method-channel transport
pub mod channel;

/// Environment-driven configuration
pub mod config;

/// Command execution and failure policy
pub mod dispatcher;

/// A `tracing`-backed monitoring engine
pub mod engine;

/// Prometheus metrics for observability
pub mod metrics;

/// Live transaction and component handles
pub mod registry;

/// Error types for the method channel
pub mod error {
    use apm_bridge_core::BridgeError;
    use thiserror::Error;

    /// Errors returned by [`ChannelHandle::invoke`](crate::channel::ChannelHandle::invoke)
    #[derive(Error, Debug)]
    pub enum ChannelError {
        /// The channel was detached and no longer accepts calls
        #[error("Method channel is detached")]
        Detached,

        /// The worker went away before replying
        ///
        /// This happens after `crashNative` took the worker down, or if the
        /// worker panicked for any other reason.
        #[error("Method channel worker stopped before replying")]
        WorkerLost,

        /// The dispatcher rejected the call
        #[error(transparent)]
        Fatal(#[from] BridgeError),
    }

    impl ChannelError {
        /// The bridge error behind a fatal reply, if any
        #[must_use]
        pub const fn bridge_error(&self) -> Option<&BridgeError> {
            match self {
                Self::Fatal(e) => Some(e),
                Self::Detached | Self::WorkerLost => None,
            }
        }
    }
}

pub use channel::{ChannelHandle, MethodChannel};
pub use config::{BridgeConfig, ConfigError, SupersedePolicy};
pub use dispatcher::Dispatcher;
pub use engine::LoggingEngine;
pub use error::ChannelError;
pub use metrics::MetricsServer;
pub use registry::{LifecycleRegistry, RegistrySnapshot};
