// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-part SMS reassembly.
//!
//! The gateway splits a long SMS into several `RECEIVE` datagrams without
//! any sequence number, and parts may arrive tens of seconds apart. Parts
//! are grouped per (device id, source number) in arrival order and released
//! by [`ReassemblyBuffer::sweep`] once the conversation has been quiet for
//! longer than the idle threshold.
//!
//! The buffer is unbounded: every distinct key stays until a sweep flushes it.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Identifies one in-flight message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey {
    pub device_id: String,
    pub srcnum: String,
}

impl ConversationKey {
    pub fn new(device_id: impl Into<String>, srcnum: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            srcnum: srcnum.into(),
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.device_id, self.srcnum)
    }
}

/// Parts collected so far for one key.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// When the most recent part was appended
    pub last_received_at: Instant,

    /// Parts in arrival order
    pub parts: Vec<String>,
}

impl ConversationState {
    fn new(part: String, now: Instant) -> Self {
        Self {
            last_received_at: now,
            parts: vec![part],
        }
    }

    /// Strictly longer than `threshold` since the last part.
    pub fn is_idle(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_received_at) > threshold
    }

    fn into_body(self) -> String {
        self.parts.concat()
    }
}

/// A finished message, removed from the buffer and ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedMessage {
    pub key: ConversationKey,
    pub body: String,
    pub part_count: usize,
}

impl FlushedMessage {
    /// Notification subject, e.g. `SMS Message from goip01|+358401234567`.
    pub fn subject(&self) -> String {
        format!("SMS Message from {}", self.key)
    }
}

/// Keyed store of in-flight conversations.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    conversations: HashMap<ConversationKey, ConversationState>,
}

impl ReassemblyBuffer {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self {
            conversations: HashMap::new(),
        }
    }

    /// Append a part, creating the conversation on first use.
    pub fn append(&mut self, key: ConversationKey, part: impl Into<String>, now: Instant) {
        let part = part.into();
        match self.conversations.get_mut(&key) {
            Some(state) => {
                state.parts.push(part);
                state.last_received_at = now;
            }
            None => {
                self.conversations
                    .insert(key, ConversationState::new(part, now));
            }
        }
    }

    /// Remove every conversation idle for longer than `idle_threshold` and
    /// return the joined messages, oldest first.
    pub fn sweep(&mut self, now: Instant, idle_threshold: Duration) -> Vec<FlushedMessage> {
        let idle: Vec<ConversationKey> = self
            .conversations
            .iter()
            .filter(|(_, state)| state.is_idle(now, idle_threshold))
            .map(|(key, _)| key.clone())
            .collect();

        self.take(idle)
    }

    /// Remove every conversation regardless of age (used at shutdown).
    pub fn drain_all(&mut self) -> Vec<FlushedMessage> {
        let keys: Vec<ConversationKey> = self.conversations.keys().cloned().collect();
        self.take(keys)
    }

    fn take(&mut self, keys: Vec<ConversationKey>) -> Vec<FlushedMessage> {
        let mut removed: Vec<(ConversationKey, ConversationState)> = keys
            .into_iter()
            .filter_map(|key| self.conversations.remove_entry(&key))
            .collect();
        removed.sort_by(|(ka, a), (kb, b)| {
            a.last_received_at
                .cmp(&b.last_received_at)
                .then_with(|| ka.cmp(kb))
        });

        removed
            .into_iter()
            .map(|(key, state)| FlushedMessage {
                key,
                part_count: state.parts.len(),
                body: state.into_body(),
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &ConversationKey) -> Option<&ConversationState> {
        self.conversations.get(key)
    }

    /// Number of conversations waiting for parts or for a sweep.
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
