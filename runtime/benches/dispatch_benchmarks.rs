//! Dispatch Performance Benchmarks
//!
//! These benchmarks measure the cost of the bridge on the host's call path:
//! - Decoding: `MethodCall` to `Command` per command shape
//! - Dispatch: decode, registry update and engine call against a no-op engine
//! - Channel round trip: queue, dispatch and reply through the worker
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use apm_bridge_core::command::{Breadcrumb, CapturedError, Endpoint, HttpCall, Screen};
use apm_bridge_core::{Command, EngineError, MethodCall, MonitoringEngine, TransactionHandle};
use apm_bridge_runtime::{BridgeConfig, Dispatcher, MethodChannel};
use apm_bridge_testing::calls;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

// Engine that accepts everything and does nothing
#[derive(Clone, Debug)]
struct NullEngine;

struct NullTransaction;

impl TransactionHandle for NullTransaction {
    type Component = ();

    fn start_component(&self, _name: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn stop_component(&self, _component: ()) -> Result<(), EngineError> {
        Ok(())
    }
}

impl MonitoringEngine for NullEngine {
    type Transaction = NullTransaction;

    fn start_monitoring(&self, _: &str, _: i32, _: Option<&Endpoint>) -> Result<(), EngineError> {
        Ok(())
    }

    fn enable_error_reporting(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn start_transaction(&self, _: &str) -> Result<NullTransaction, EngineError> {
        Ok(NullTransaction)
    }

    fn stop_transaction(&self, _: NullTransaction) -> Result<(), EngineError> {
        Ok(())
    }

    fn add_breadcrumb(&self, _: &Breadcrumb) -> Result<(), EngineError> {
        Ok(())
    }

    fn add_screen(&self, _: &Screen) -> Result<(), EngineError> {
        Ok(())
    }

    fn add_http_call(&self, _: &HttpCall) -> Result<(), EngineError> {
        Ok(())
    }

    fn add_error(&self, _: &CapturedError) -> Result<(), EngineError> {
        Ok(())
    }

    fn set_user_id(&self, _: &str) -> Result<(), EngineError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Benchmark decoding alone
fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    for (label, call) in [
        ("start_transaction", calls::start_transaction("checkout")),
        ("start_component", calls::start_component("checkout", "payment")),
        ("add_http_call", calls::add_http_call("https://api.example.com/items", 200)),
        ("capture_exception", calls::capture_exception("StateError", "boom")),
        ("flush", calls::flush()),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| Command::decode(black_box(&call)));
        });
    }

    group.finish();
}

/// Benchmark full dispatch against a no-op engine
fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    group.throughput(Throughput::Elements(4));
    group.bench_function("lifecycle", |b| {
        let dispatcher = Dispatcher::new(NullEngine);
        let script = [
            calls::start_transaction("checkout"),
            calls::start_component("checkout", "payment"),
            calls::stop_component("checkout", "payment"),
            calls::stop_transaction("checkout"),
        ];
        b.iter(|| {
            for call in &script {
                let _ = dispatcher.handle(black_box(call));
            }
        });
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("record", |b| {
        let dispatcher = Dispatcher::new(NullEngine);
        let call = calls::add_screen("home", 250);
        b.iter(|| dispatcher.handle(black_box(&call)));
    });

    group.bench_function("not_implemented", |b| {
        let dispatcher = Dispatcher::new(NullEngine);
        let call = MethodCall::new("getPlatformVersion");
        b.iter(|| dispatcher.handle(black_box(&call)));
    });

    group.finish();
}

/// Benchmark a round trip through the channel worker
fn benchmark_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("invoke", |b| {
        let config = BridgeConfig::default();
        let channel = runtime.block_on(async {
            MethodChannel::attach(&config, Arc::new(Dispatcher::new(NullEngine)))
        });
        let handle = channel.handle();
        let call = calls::set_user_id("user-1");

        b.to_async(&runtime).iter(|| async {
            let _ = handle.invoke(black_box(call.clone())).await;
        });

        runtime.block_on(channel.detach());
    });

    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_dispatch, benchmark_channel);
criterion_main!(benches);
