// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared between the listener, purge and dispatch tasks.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    datagrams_received: AtomicU64,
    messages_accepted: AtomicU64,
    credential_rejections: AtomicU64,
    keepalives_answered: AtomicU64,
    unrecognized: AtomicU64,
    malformed_segments: AtomicU64,
    messages_flushed: AtomicU64,
    notifications_sent: AtomicU64,
    notification_failures: AtomicU64,
    notifications_dropped: AtomicU64,
}

/// Point-in-time copy of [`ReceiverStats`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Datagrams read from the socket.
    pub datagrams_received: u64,
    /// Data messages with valid credentials, buffered.
    pub messages_accepted: u64,
    /// Data messages answered with the ERROR ack.
    pub credential_rejections: u64,
    pub keepalives_answered: u64,
    pub unrecognized: u64,
    /// Field segments skipped for lacking a colon.
    pub malformed_segments: u64,
    /// Conversations removed from the buffer.
    pub messages_flushed: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    /// Flushed messages lost because the notification queue was full.
    pub notifications_dropped: u64,
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl ReceiverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datagram_received(&self) {
        bump(&self.datagrams_received, 1);
    }

    pub fn message_accepted(&self) {
        bump(&self.messages_accepted, 1);
    }

    pub fn credential_rejected(&self) {
        bump(&self.credential_rejections, 1);
    }

    pub fn keepalive_answered(&self) {
        bump(&self.keepalives_answered, 1);
    }

    pub fn unrecognized(&self) {
        bump(&self.unrecognized, 1);
    }

    pub fn malformed_segments(&self, n: usize) {
        bump(&self.malformed_segments, n as u64);
    }

    pub fn messages_flushed(&self, n: usize) {
        bump(&self.messages_flushed, n as u64);
    }

    pub fn notification_sent(&self) {
        bump(&self.notifications_sent, 1);
    }

    pub fn notification_failed(&self) {
        bump(&self.notification_failures, 1);
    }

    pub fn notification_dropped(&self) {
        bump(&self.notifications_dropped, 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            datagrams_received: get(&self.datagrams_received),
            messages_accepted: get(&self.messages_accepted),
            credential_rejections: get(&self.credential_rejections),
            keepalives_answered: get(&self.keepalives_answered),
            unrecognized: get(&self.unrecognized),
            malformed_segments: get(&self.malformed_segments),
            messages_flushed: get(&self.messages_flushed),
            notifications_sent: get(&self.notifications_sent),
            notification_failures: get(&self.notification_failures),
            notifications_dropped: get(&self.notifications_dropped),
        }
    }
}
