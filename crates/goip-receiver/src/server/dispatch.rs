// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Notification dispatch.
//!
//! Flushed messages go through a bounded queue to a single dispatcher task,
//! so a slow or hung mail server never holds the buffer lock or stalls the
//! listener. When the queue is full the message is dropped and counted.

use super::buffer::FlushedMessage;
use super::stats::ReceiverStats;
use crate::notifier::Notifier;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Sending side of the notification queue.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<FlushedMessage>,
    stats: Arc<ReceiverStats>,
}

impl NotificationQueue {
    /// Queue a message for delivery without waiting.
    ///
    /// Returns `false` if the message was dropped.
    pub fn submit(&self, msg: FlushedMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                error!(
                    "Notification queue full, dropping message from {} ({} bytes)",
                    msg.key,
                    msg.body.len()
                );
                self.stats.notification_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(msg)) => {
                error!("Dispatcher stopped, dropping message from {}", msg.key);
                self.stats.notification_dropped();
                false
            }
        }
    }
}

/// Receiving side; drives the [`Notifier`].
pub struct Dispatcher {
    rx: mpsc::Receiver<FlushedMessage>,
    notifier: Arc<dyn Notifier>,
    stats: Arc<ReceiverStats>,
}

/// Create a queue of `depth` slots and its dispatcher.
pub fn channel(
    notifier: Arc<dyn Notifier>,
    depth: usize,
    stats: Arc<ReceiverStats>,
) -> (NotificationQueue, Dispatcher) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (
        NotificationQueue {
            tx,
            stats: stats.clone(),
        },
        Dispatcher {
            rx,
            notifier,
            stats,
        },
    )
}

impl Dispatcher {
    /// Deliver queued messages until `stop` fires (or its sender is dropped),
    /// then deliver whatever is still queued and return.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.deliver(msg).await,
                    None => break,
                },
                _ = &mut stop => {
                    self.rx.close();
                    while let Some(msg) = self.rx.recv().await {
                        self.deliver(msg).await;
                    }
                    break;
                }
            }
        }
        debug!("Dispatcher stopped");
    }

    async fn deliver(&self, msg: FlushedMessage) {
        let notifier = self.notifier.clone();
        let subject = msg.subject();
        let key = msg.key.clone();
        let body = msg.body;

        let result =
            tokio::task::spawn_blocking(move || notifier.notify(&subject, &body)).await;

        match result {
            Ok(Ok(())) => {
                self.stats.notification_sent();
                info!("Delivered message from {} via {}", key, self.notifier.name());
            }
            Ok(Err(e)) => {
                self.stats.notification_failed();
                warn!("Notification for {} failed: {}", key, e);
            }
            Err(e) => {
                self.stats.notification_failed();
                warn!("Notifier task for {} panicked: {}", key, e);
            }
        }
    }
}
