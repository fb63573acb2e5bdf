//! # APM Bridge Core
//!
//! Core types for a command-dispatch bridge between an application runtime and
//! an application-performance-monitoring engine.
//!
//! The host sends named commands with loosely-typed argument bags. This crate
//! defines what those commands mean; the runtime crate executes them.
//!
//! ## Core Concepts
//!
//! - **`MethodCall`**: one named command plus its argument bag, as delivered
//!   by the host transport
//! - **`Command`**: the tagged union a `MethodCall` is decoded into, one
//!   variant per command with strongly typed fields
//! - **`MonitoringEngine`**: the injected facade over the monitoring engine
//! - **`ComponentKey`**: identity of a component inside its transaction
//! - **Errors**: contract violations (`DecodeError`), engine failures
//!   (`EngineError`) and what crosses the boundary (`BridgeError`)
//!
//! ## Example
//!
//! ```
//! use apm_bridge_core::{Command, MethodCall};
//!
//! let call = MethodCall::new("startComponent")
//!     .arg("transactionName", "checkout")
//!     .arg("componentName", "payment");
//!
//! match Command::decode(&call) {
//!     Ok(Command::StartComponent(args)) => {
//!         assert_eq!(args.key().transaction(), "checkout");
//!     },
//!     other => unreachable!("unexpected decode result: {other:?}"),
//! }
//! ```

/// Transport-level request and reply types
pub mod call;

/// Tagged-union command surface and per-command arguments
pub mod command;

/// Monitoring engine facade traits
pub mod engine;

/// Error taxonomy
pub mod error;

/// Component registry key
pub mod key;

pub use call::{MethodCall, Reply};
pub use command::Command;
pub use engine::{ComponentHandle, MonitoringEngine, TransactionHandle};
pub use error::{BridgeError, DecodeError, EngineError};
pub use key::ComponentKey;
