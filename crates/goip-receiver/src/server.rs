// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver core implementation.

use crate::config::ReceiverConfig;
use crate::notifier::Notifier;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, error, info, warn};

pub mod auth;
pub mod buffer;
pub mod dispatch;
pub mod protocol;
pub mod stats;

pub use auth::Credentials;
pub use buffer::{ConversationKey, FlushedMessage, ReassemblyBuffer};
use dispatch::NotificationQueue;
use protocol::{Ack, DataMessage, Datagram};
pub use stats::{ReceiverStats, StatsSnapshot};

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bind error: {0}")]
    Bind(String),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// GoIP SMS receiver.
///
/// One listener task owns the socket and handles each datagram to
/// completion; a timer task sweeps the buffer independently of traffic;
/// a dispatcher task delivers flushed messages. The buffer is the only
/// shared state and sits behind a mutex that is never held across
/// socket or notifier I/O.
#[derive(Clone)]
pub struct ReceiverServer {
    config: Arc<ReceiverConfig>,
    credentials: Arc<Credentials>,
    buffer: Arc<Mutex<ReassemblyBuffer>>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<ReceiverStats>,
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl ReceiverServer {
    /// Create a new receiver.
    pub fn new(config: ReceiverConfig, notifier: Arc<dyn Notifier>) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let credentials = Credentials::new(
            config.device_id.clone(),
            config.password.clone().unwrap_or_default(),
        );

        Ok(Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            buffer: Arc::new(Mutex::new(ReassemblyBuffer::new())),
            notifier,
            stats: Arc::new(ReceiverStats::new()),
            shutdown: Arc::new(Notify::new()),
            stopping: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let socket = self.bind().await?;
        self.serve(socket).await
    }

    /// Bind the UDP socket for the configured address.
    pub async fn bind(&self) -> Result<UdpSocket, ServerError> {
        let addr = SocketAddr::new(self.config.bind_address, self.config.port);
        UdpSocket::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))
    }

    /// Serve datagrams on an already bound socket until shutdown.
    pub async fn serve(&self, socket: UdpSocket) -> Result<(), ServerError> {
        let local_addr = socket.local_addr()?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyRunning);
        }

        info!("GoIP SMS receiver listening on {}", local_addr);

        let (queue, dispatcher) = dispatch::channel(
            self.notifier.clone(),
            self.config.notify_queue_depth,
            self.stats.clone(),
        );
        let (stop_dispatcher, stop_rx) = oneshot::channel();
        let dispatcher_task = tokio::spawn(dispatcher.run(stop_rx));

        let purge_task = self.config.purge_interval().map(|period| {
            let server = self.clone();
            let queue = queue.clone();
            tokio::spawn(async move { server.purge_loop(period, queue).await })
        });

        self.listen(&socket, &queue).await;

        if let Some(task) = purge_task {
            task.await.ok();
        }

        // Nothing more will arrive; hand over whatever is still buffered.
        let remaining = self.buffer.lock().await.drain_all();
        if !remaining.is_empty() {
            info!("Flushing {} pending conversations", remaining.len());
        }
        self.forward(remaining, &queue);
        drop(queue);
        stop_dispatcher.send(()).ok();
        dispatcher_task.await.ok();

        let stats = self.stats.snapshot();
        info!(
            received = stats.datagrams_received,
            accepted = stats.messages_accepted,
            rejected = stats.credential_rejections,
            flushed = stats.messages_flushed,
            delivered = stats.notifications_sent,
            failed = stats.notification_failures,
            "Receiver stopped"
        );

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Listener loop: receive, handle, repeat.
    async fn listen(&self, socket: &UdpSocket, queue: &NotificationQueue) {
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        if self.stopping.load(Ordering::SeqCst) {
            return;
        }

        let mut buf = vec![0u8; self.config.max_datagram_size];
        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, peer)) => {
                            self.handle_datagram(socket, &buf[..n], peer, queue).await;
                        }
                        Err(e) => {
                            warn!("recv_from failed: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    debug!("Listener shutting down");
                    break;
                }
            }
        }
    }

    /// Periodic sweep, independent of traffic.
    async fn purge_loop(&self, period: std::time::Duration, queue: NotificationQueue) {
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        if self.stopping.load(Ordering::SeqCst) {
            return;
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.purge(&queue).await,
                _ = &mut shutdown => {
                    debug!("Purge timer shutting down");
                    break;
                }
            }
        }
    }

    /// Handle one datagram: reply if needed, then sweep.
    async fn handle_datagram(
        &self,
        socket: &UdpSocket,
        payload: &[u8],
        peer: SocketAddr,
        queue: &NotificationQueue,
    ) {
        if self.config.is_debug() {
            debug!(
                peer = %peer,
                "Received {}",
                String::from_utf8_lossy(payload).trim_end()
            );
        }

        if let Some(reply) = self.respond(payload).await {
            if self.config.is_debug() {
                debug!(peer = %peer, "Sending {}", reply);
            }
            if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
                warn!("Failed to send reply to {}: {}", peer, e);
            }
        }

        self.purge(queue).await;
    }

    /// Classify a payload, buffer valid parts, and build the reply.
    ///
    /// Returns `None` for datagrams that get no answer.
    pub async fn respond(&self, payload: &[u8]) -> Option<String> {
        self.stats.datagram_received();

        let datagram = Datagram::parse(payload);
        debug!(kind = datagram.kind(), "Classified datagram");
        match datagram {
            Datagram::Data(msg) => Some(self.accept(msg).await.to_string()),
            Datagram::Keepalive(keepalive) => {
                self.stats.keepalive_answered();
                self.stats
                    .malformed_segments(keepalive.fields.malformed_segments());
                Some(keepalive.response())
            }
            Datagram::Unrecognized => {
                self.stats.unrecognized();
                None
            }
        }
    }

    async fn accept(&self, msg: DataMessage) -> Ack {
        self.stats
            .malformed_segments(msg.fields.malformed_segments());

        if !self.credentials.validate(&msg.device_id, &msg.password) {
            self.stats.credential_rejected();
            warn!(
                "Invalid credentials for RECEIVE {} from device {:?}",
                msg.receive_id, msg.device_id
            );
            return Ack::InvalidCredentials {
                receive_id: msg.receive_id,
            };
        }

        let key = ConversationKey::new(msg.device_id, msg.srcnum);
        debug!("Buffered part from {}: {:?}", key, msg.msg);
        self.buffer
            .lock()
            .await
            .append(key, msg.msg, Instant::now());
        self.stats.message_accepted();

        Ack::Ok {
            receive_id: msg.receive_id,
        }
    }

    /// Sweep the buffer and queue the flushed messages.
    pub async fn purge(&self, queue: &NotificationQueue) {
        let flushed = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return;
            }
            buffer.sweep(Instant::now(), self.config.wait())
        };
        self.forward(flushed, queue);
    }

    fn forward(&self, flushed: Vec<FlushedMessage>, queue: &NotificationQueue) {
        if flushed.is_empty() {
            return;
        }
        self.stats.messages_flushed(flushed.len());
        for msg in flushed {
            info!(
                parts = msg.part_count,
                "Sending message {} : {}",
                msg.subject(),
                msg.body
            );
            if !queue.submit(msg) {
                error!("Message lost, notification queue unavailable");
            }
        }
    }

    /// Signal the server to shutdown.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Number of conversations waiting in the buffer.
    pub async fn pending_conversations(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Check if server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
