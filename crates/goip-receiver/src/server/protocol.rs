// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GoIP SMS wire protocol.
//!
//! One ASCII datagram per message, fields separated by `;`, each field a
//! `key:value` pair split on the first colon.
//!
//! ```text
//! RECEIVE:<id>;id:<device>;password:<pw>;srcnum:<number>;msg:<text>
//! req:<seq>;id:<device>;pass:<pw>;...telemetry...
//! ```
//!
//! Replies:
//!
//! ```text
//! RECEIVE <id> OK
//! RECEIVE <id> ERROR invalid credentials
//! reg:<seq>;status:200;
//! ```

use std::fmt;
use tracing::warn;

/// Prefix of the first segment of an SMS data message.
pub const RECEIVE_PREFIX: &str = "RECEIVE:";

/// Prefix of the first segment of a keepalive.
pub const KEEPALIVE_PREFIX: &str = "req:";

/// Suffix appended to the keepalive reply.
const KEEPALIVE_STATUS: &str = ";status:200;";

/// Field names, ordered as received. Keys are lowercased; a repeated key
/// keeps its first position and takes the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    fields: Vec<(String, String)>,
    malformed: usize,
}

impl ParsedFields {
    /// Split a payload into fields.
    ///
    /// Empty segments are ignored. Segments without a colon are skipped
    /// with a warning.
    pub fn parse(payload: &str) -> Self {
        let mut parsed = Self::default();
        for segment in payload.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            match segment.split_once(':') {
                Some((key, value)) => parsed.insert(key.to_lowercase(), value.to_string()),
                None => {
                    warn!("Skipping malformed segment without ':': {:?}", segment);
                    parsed.malformed += 1;
                }
            }
        }
        parsed
    }

    fn insert(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Value of a field, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a field, empty when missing.
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    #[cfg(test)]
    fn keys(&self) -> Vec<&str> {
        self.fields.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Number of segments skipped for lacking a colon.
    pub fn malformed_segments(&self) -> usize {
        self.malformed
    }
}

/// An SMS data message (`RECEIVE:` datagram).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMessage {
    /// Receive id, echoed back in the ack.
    pub receive_id: String,
    pub device_id: String,
    pub password: String,
    pub srcnum: String,
    pub msg: String,
    pub fields: ParsedFields,
}

impl DataMessage {
    fn from_fields(fields: ParsedFields) -> Self {
        Self {
            receive_id: fields.get_or_empty("receive"),
            device_id: fields.get_or_empty("id"),
            password: fields.get_or_empty("password"),
            srcnum: fields.get_or_empty("srcnum"),
            msg: fields.get_or_empty("msg"),
            fields,
        }
    }
}

/// A keepalive (`req:` datagram).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keepalive {
    first_segment: String,
    pub fields: ParsedFields,
}

impl Keepalive {
    /// Reply for the gateway: the first segment with `req` replaced by
    /// `reg`, followed by `;status:200;`.
    pub fn response(&self) -> String {
        format!("{}{}", self.first_segment.replace("req", "reg"), KEEPALIVE_STATUS)
    }
}

/// Classified inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    Data(DataMessage),
    Keepalive(Keepalive),
    /// Anything else (CELLINFO, STATE, garbage). Only triggers a purge.
    Unrecognized,
}

impl Datagram {
    /// Classify and decode a raw payload. Never fails.
    pub fn parse(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        let first = text.split(';').next().unwrap_or_default();

        if first.starts_with(RECEIVE_PREFIX) {
            Self::Data(DataMessage::from_fields(ParsedFields::parse(&text)))
        } else if first.starts_with(KEEPALIVE_PREFIX) {
            Self::Keepalive(Keepalive {
                first_segment: first.to_string(),
                fields: ParsedFields::parse(&text),
            })
        } else {
            Self::Unrecognized
        }
    }

    /// Short label for logs and stats.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Keepalive(_) => "keepalive",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Acknowledgment for a data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok { receive_id: String },
    InvalidCredentials { receive_id: String },
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok { receive_id } => write!(f, "RECEIVE {} OK", receive_id),
            Self::InvalidCredentials { receive_id } => {
                write!(f, "RECEIVE {} ERROR invalid credentials", receive_id)
            }
        }
    }
}
