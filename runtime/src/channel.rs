//! Async method-channel transport.
//!
//! A [`MethodChannel`] owns one worker task that pulls calls off a bounded
//! queue and runs them through a [`Dispatcher`] one at a time, in arrival
//! order. Callers hold cheap [`ChannelHandle`] clones and await a reply per
//! call.
//!
//! `crashNative` is honoured literally: the caller gets its
//! [`BridgeError::CrashRequested`] reply, then the worker panics. Calls still
//! queued behind it fail with [`ChannelError::WorkerLost`].

use crate::config::BridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ChannelError;
use crate::registry::RegistrySnapshot;
use apm_bridge_core::{BridgeError, MethodCall, MonitoringEngine, Reply};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct Invocation {
    call: MethodCall,
    reply: oneshot::Sender<Result<Reply, BridgeError>>,
}

/// A dispatcher attached to an async call queue.
pub struct MethodChannel<E: MonitoringEngine> {
    name: String,
    dispatcher: Arc<Dispatcher<E>>,
    handle: ChannelHandle,
    shutdown: oneshot::Sender<()>,
    worker: JoinHandle<()>,
}

impl<E: MonitoringEngine + 'static> MethodChannel<E> {
    /// Spawn the worker and start accepting calls.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn attach(config: &BridgeConfig, dispatcher: Arc<Dispatcher<E>>) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let detached = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(run_worker(
            config.channel_name.clone(),
            Arc::clone(&dispatcher),
            receiver,
            shutdown_rx,
        ));

        tracing::info!(
            channel = %config.channel_name,
            capacity,
            policy = %config.supersede_policy,
            "Method channel attached"
        );

        Self {
            name: config.channel_name.clone(),
            dispatcher,
            handle: ChannelHandle { sender, detached },
            shutdown,
            worker,
        }
    }

    /// Name the channel was attached under
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle for sending calls
    #[must_use]
    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    /// The dispatcher behind the channel
    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<Dispatcher<E>> {
        &self.dispatcher
    }

    /// Stop accepting calls, let the worker drain what is already queued and
    /// wait for it to exit.
    ///
    /// Transactions and components still live at this point are never
    /// stopped; they are logged at `warn` and returned.
    pub async fn detach(self) -> RegistrySnapshot {
        self.handle.detached.store(true, Ordering::Release);
        // The worker may already be gone after a crash
        let _ = self.shutdown.send(());

        match self.worker.await {
            Ok(()) => tracing::info!(channel = %self.name, "Method channel detached"),
            Err(e) if e.is_panic() => {
                tracing::error!(channel = %self.name, "Method channel worker had crashed");
            },
            Err(e) => tracing::error!(channel = %self.name, error = %e, "Method channel worker failed"),
        }

        let live = self.dispatcher.registry().snapshot();
        if !live.is_empty() {
            tracing::warn!(
                channel = %self.name,
                transactions = ?live.transactions,
                components = ?live.components,
                "Detached with live handles that were never stopped"
            );
        }
        live
    }
}

impl<E: MonitoringEngine> fmt::Debug for MethodChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodChannel")
            .field("name", &self.name)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Cloneable sender side of a [`MethodChannel`].
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    sender: mpsc::Sender<Invocation>,
    detached: Arc<AtomicBool>,
}

impl ChannelHandle {
    /// Queue one call and wait for its reply.
    ///
    /// Waits for queue space if the channel is at capacity.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Fatal`] if the dispatcher rejected the call
    /// - [`ChannelError::Detached`] if the channel no longer accepts calls
    /// - [`ChannelError::WorkerLost`] if the worker stopped before replying
    pub async fn invoke(&self, call: MethodCall) -> Result<Reply, ChannelError> {
        let (reply, response) = oneshot::channel();

        if self.sender.send(Invocation { call, reply }).await.is_err() {
            return Err(self.closed());
        }

        match response.await {
            Ok(result) => result.map_err(ChannelError::Fatal),
            Err(_) => Err(ChannelError::WorkerLost),
        }
    }

    /// Whether the channel still accepts calls
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    fn closed(&self) -> ChannelError {
        if self.detached.load(Ordering::Acquire) {
            ChannelError::Detached
        } else {
            ChannelError::WorkerLost
        }
    }
}

async fn run_worker<E: MonitoringEngine>(
    name: String,
    dispatcher: Arc<Dispatcher<E>>,
    mut receiver: mpsc::Receiver<Invocation>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut closing = false;

    loop {
        tokio::select! {
            biased;

            invocation = receiver.recv() => match invocation {
                Some(invocation) => serve(&dispatcher, invocation),
                None => break,
            },

            _ = &mut shutdown, if !closing => {
                tracing::debug!(channel = %name, "Closing method channel queue");
                receiver.close();
                closing = true;
            },
        }
    }

    tracing::debug!(channel = %name, "Method channel worker exiting");
}

#[allow(clippy::panic)] // crashNative takes the worker down on purpose
fn serve<E: MonitoringEngine>(dispatcher: &Dispatcher<E>, invocation: Invocation) {
    let Invocation { call, reply } = invocation;

    let result = dispatcher.handle(&call);
    let crash = matches!(&result, Err(e) if e.is_crash());

    if reply.send(result).is_err() {
        tracing::debug!(method = %call.method(), "Caller went away before the reply");
    }

    if crash {
        panic!("{}", BridgeError::CrashRequested);
    }
}
