// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Asynchronous message distributor.
//!
//! Submitting a message only enqueues it. One worker thread drains the
//! queue, resolves each message's destinations, runs the link filters and
//! delivers. The worker parks while the queue is empty and keeps a minimum
//! cycle time between messages so a chatty source cannot monopolize it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::core::Result;
use crate::core::diagnostics::Diagnostics;
use crate::core::endpoint::{EndpointName, LoadedEndpoint};
use crate::core::error::describe_panic;
use crate::core::link::Link;
use crate::core::message::Message;
use crate::core::relay::Shutdownable;
use crate::core::targeted_message::TargetedMessage;

/// Default minimum time per distribution cycle.
pub const DEFAULT_MIN_CYCLE: Duration = Duration::from_millis(50);

/// One resolved destination: the link a message travels and the endpoint at
/// its end.
pub type Destination = (Arc<Link>, Arc<LoadedEndpoint>);

/// Looks up where messages from a source go. Called on the worker thread
/// once per message.
pub trait DestinationResolver: Send + Sync + 'static {
    fn destinations(&self, source: &EndpointName) -> Vec<Destination>;
}

#[derive(Debug, Clone)]
pub struct DistributorConfig {
    /// Minimum time per cycle. Zero disables throttling.
    pub min_cycle: Duration,
    pub thread_name: String,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            min_cycle: DEFAULT_MIN_CYCLE,
            thread_name: "chatrelay-distributor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DistributorState {
    /// Queue empty, worker parked.
    Idle = 0,
    /// Worker processing messages.
    Draining = 1,
    /// Worker exited or exiting; new messages are dropped.
    ShuttingDown = 2,
}

impl DistributorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DistributorState::Idle,
            1 => DistributorState::Draining,
            _ => DistributorState::ShuttingDown,
        }
    }
}

/// Cloneable submit handle for the distributor queue.
#[derive(Clone)]
pub struct MessageSender {
    tx: Sender<Arc<Message>>,
}

impl MessageSender {
    /// Enqueue a message. After shutdown the message is dropped.
    pub fn send(&self, message: Message) {
        if self.tx.send(Arc::new(message)).is_err() {
            tracing::trace!("Distributor gone, dropping message");
        }
    }
}

pub struct MessageDistributor {
    diagnostics: Diagnostics,
    sender: MessageSender,
    state: Arc<AtomicU8>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageDistributor {
    /// Start the worker thread.
    pub fn spawn(
        diagnostics: Diagnostics,
        config: DistributorConfig,
        resolver: Arc<dyn DestinationResolver>,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let state = Arc::new(AtomicU8::new(DistributorState::Idle as u8));

        let worker = Worker {
            diagnostics: diagnostics.clone(),
            ingress: rx,
            shutdown_rx,
            resolver,
            state: Arc::clone(&state),
            min_cycle: config.min_cycle,
        };
        let handle = std::thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker.run())?;

        Ok(Self {
            diagnostics,
            sender: MessageSender { tx },
            state,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Enqueue a message for distribution. Returns immediately.
    pub fn add_message(&self, message: Message) {
        if self.state() == DistributorState::ShuttingDown {
            return;
        }
        self.sender.send(message);
    }

    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    pub fn state(&self) -> DistributorState {
        DistributorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Messages waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.tx.len()
    }

    /// Stop the worker. A delivery in progress finishes; queued messages are
    /// discarded. Idempotent.
    pub fn shutdown(&self) {
        self.state
            .store(DistributorState::ShuttingDown as u8, Ordering::Release);
        if let Some(shutdown_tx) = self.shutdown_tx.lock().take() {
            let _ = shutdown_tx.try_send(());
        }

        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        // Shutdown requested from inside a delivery: the worker exits on its
        // own once the delivery returns.
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            let _scope = self.diagnostics.enter();
            tracing::error!("[{}] Distributor thread panicked", self.diagnostics.scope());
        }
    }
}

impl Shutdownable for MessageDistributor {
    fn shutdown(&self) {
        MessageDistributor::shutdown(self);
    }
}

impl Drop for MessageDistributor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    diagnostics: Diagnostics,
    ingress: Receiver<Arc<Message>>,
    shutdown_rx: Receiver<()>,
    resolver: Arc<dyn DestinationResolver>,
    state: Arc<AtomicU8>,
    min_cycle: Duration,
}

impl Worker {
    fn run(self) {
        let _scope = self.diagnostics.enter();
        tracing::info!(
            "[{}] Distributor started (min cycle {:?})",
            self.diagnostics.scope(),
            self.min_cycle
        );

        let mut next: Option<Arc<Message>> = None;
        loop {
            if self.shutdown_requested() {
                break;
            }
            let started = Instant::now();

            if let Some(message) = next.take().or_else(|| self.ingress.try_recv().ok()) {
                self.set_state(DistributorState::Draining);
                self.distribute(&message);
            }

            if self.ingress.is_empty() {
                self.set_state(DistributorState::Idle);
                let (shutdown_rx, ingress) = (&self.shutdown_rx, &self.ingress);
                crossbeam_channel::select! {
                    recv(shutdown_rx) -> _ => break,
                    recv(ingress) -> msg => match msg {
                        Ok(message) => next = Some(message),
                        Err(_) => break,
                    },
                }
            }

            let elapsed = started.elapsed();
            if !elapsed.is_zero() && elapsed < self.min_cycle {
                match self.shutdown_rx.recv_timeout(self.min_cycle - elapsed) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
        }

        self.set_state(DistributorState::ShuttingDown);
        let dropped = self.ingress.len() + usize::from(next.is_some());
        tracing::debug!(
            "[{}] Distributor stopped ({} queued message(s) dropped)",
            self.diagnostics.scope(),
            dropped
        );
    }

    fn shutdown_requested(&self) -> bool {
        !matches!(self.shutdown_rx.try_recv(), Err(TryRecvError::Empty))
    }

    fn set_state(&self, state: DistributorState) {
        // Never leave ShuttingDown once the owner has set it.
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != DistributorState::ShuttingDown as u8).then_some(state as u8)
            });
    }

    fn distribute(&self, message: &Arc<Message>) {
        let destinations = self.resolver.destinations(message.source());
        tracing::trace!(
            "[{}] Message from '{}' has {} destination(s)",
            self.diagnostics.scope(),
            message.source(),
            destinations.len()
        );

        for (link, endpoint) in destinations {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut targeted = TargetedMessage::new(endpoint.name().clone(), Arc::clone(message));
                link.filter_message(&mut targeted);
                if targeted.is_rejected() {
                    tracing::trace!(
                        "[{}] Rejected on {}",
                        self.diagnostics.scope(),
                        link
                    );
                    return Ok(());
                }
                endpoint.deliver(&targeted, &link)
            }));

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::warn!("[{}] {}", self.diagnostics.scope(), error),
                Err(payload) => tracing::warn!(
                    "[{}] Distribution over {} panicked: {}",
                    self.diagnostics.scope(),
                    link,
                    describe_panic(payload.as_ref())
                ),
            }
        }
    }
}
