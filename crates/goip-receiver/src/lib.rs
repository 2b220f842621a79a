// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GoIP SMS Receiver
//!
//! Receives SMS notifications that a GoIP GSM gateway pushes over UDP,
//! acknowledges every datagram so the gateway stops retransmitting,
//! reassembles multi-part messages and forwards finished messages to a
//! [`Notifier`] (email by default).
//!
//! # Wire format
//!
//! ```text
//! RECEIVE:1734804704;id:goip01;password:xxxxxx;srcnum:+358401234567;msg:Hello
//! req:19;id:goip01;pass:xxxxxx;num:;signal:15;gsm_status:LOGIN;...
//! ```
//!
//! Parts of one long SMS arrive as separate `RECEIVE` datagrams, sometimes
//! tens of seconds apart. Parts sharing the same `id|srcnum` pair are
//! buffered and joined once no new part has arrived for `wait_secs`.
//!
//! # Quick Start
//!
//! ```bash
//! RECEIVE_PASSWORD=secret goip-receiver
//!
//! # Forward by email
//! RECEIVE_PASSWORD=secret SMTP_HOST=mail.example.com \
//!     SMTP_FROM=goip@example.com SMTP_TO=me@example.com goip-receiver
//! ```

pub mod config;
pub mod notifier;
pub mod server;

pub use config::{ConfigError, ReceiverConfig, SmtpConfig, SmtpSecurity};
pub use notifier::{LogNotifier, Notifier, NotifyError, SmtpNotifier};
pub use server::{ReceiverServer, ServerError, StatsSnapshot};
