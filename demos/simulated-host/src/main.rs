//! Simulated host session
//!
//! Plays the part of an application runtime: attaches the bridge's method
//! channel and sends the calls a typical app session would make, including a
//! malformed one and a method the bridge does not know.
//!
//! # Running the Example
//!
//! ```bash
//! APM_BRIDGE_METRICS_ADDR=127.0.0.1:9000 cargo run -p simulated-host
//! ```
//!
//! Configuration comes from the environment (or a `.env` file), see
//! `BridgeConfig::from_env`.

use anyhow::Context;
use apm_bridge_core::MethodCall;
use apm_bridge_runtime::{
    BridgeConfig, ChannelError, ChannelHandle, Dispatcher, LoggingEngine, MethodChannel,
    MetricsServer,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = BridgeConfig::from_env().context("Invalid bridge configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics = match config.metrics_addr {
        Some(addr) => {
            let mut server = MetricsServer::new(addr);
            server.start().context("Failed to install metrics recorder")?;
            Some(server)
        },
        None => None,
    };

    let dispatcher = Arc::new(Dispatcher::with_config(LoggingEngine::new(), &config));
    let channel = MethodChannel::attach(&config, dispatcher);
    let handle = channel.handle();

    println!("=== Simulated host session on '{}' ===\n", channel.name());

    for call in session(now_millis()) {
        send(&handle, call).await;
    }

    let live = channel.detach().await;
    tracing::info!(
        transactions = live.transactions.len(),
        components = live.components.len(),
        "Session finished"
    );

    if let Some(text) = metrics.as_ref().and_then(MetricsServer::render) {
        println!("\n=== Metrics ===\n{text}");
    }

    Ok(())
}

async fn send(handle: &ChannelHandle, call: MethodCall) {
    let method = call.method().to_string();
    match handle.invoke(call).await {
        Ok(reply) => println!(">>> {method}: {reply:?}"),
        Err(ChannelError::Fatal(e)) => println!(">>> {method}: rejected ({e})"),
        Err(e) => println!(">>> {method}: channel error ({e})"),
    }
}

fn session(started: i64) -> Vec<MethodCall> {
    vec![
        MethodCall::new("startMonitoringWithEndPoint")
            .arg("appKey", "demo-app-key")
            .arg("uploadInterval", "60")
            .arg("endPoint", "https://collector.example.com/upload"),
        MethodCall::new("trackNativeExceptions"),
        MethodCall::new("setUserId").arg("userId", "user-42"),
        MethodCall::new("startTransaction").arg("name", "checkout"),
        MethodCall::new("startComponent")
            .arg("transactionName", "checkout")
            .arg("componentName", "payment"),
        MethodCall::with_arguments(
            "addScreen",
            json!({ "name": "cart", "loadTime": 180, "startTime": started }),
        ),
        MethodCall::with_arguments(
            "addHttpCall",
            json!({
                "url": "https://api.example.com/cart",
                "requestMethod": "POST",
                "startTime": started + 200,
                "loadTime": 95,
                "statusCode": 201,
                "currentRoute": "cart",
            }),
        ),
        MethodCall::new("addBreadcrumb").arg("name", "cart").arg("action", "tap pay"),
        MethodCall::new("stopComponent")
            .arg("transactionName", "checkout")
            .arg("componentName", "payment"),
        // Rejected by the engine, logged and swallowed
        MethodCall::new("startTransaction").arg("name", ""),
        // Missing componentName: a contract violation
        MethodCall::new("stopComponent").arg("transactionName", "checkout"),
        MethodCall::with_arguments(
            "captureException",
            json!({
                "msg": "Bad state: no element",
                "type": "StateError",
                "file": "cart.dart",
                "function": "checkout",
                "stack": "#0 checkout (cart.dart:42)",
                "currentRoute": "cart",
                "startTime": started + 400,
                "isHandled": true,
            }),
        ),
        MethodCall::new("stopTransaction").arg("name", "checkout"),
        MethodCall::new("startTransaction").arg("name", "browse"),
        MethodCall::new("getPlatformVersion"),
        MethodCall::new("flush"),
    ]
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default()
}
