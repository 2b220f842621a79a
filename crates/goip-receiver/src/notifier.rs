// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Delivery of finished SMS messages.
//!
//! The receiver hands every flushed message to a [`Notifier`]. Delivery is
//! at-most-once: a failure is logged by the caller and the message is gone.
//!
//! Implementations are synchronous and may block; the server runs them on
//! the blocking thread pool.

use crate::config::{SmtpConfig, SmtpSecurity};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::info;

/// Notification errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Message build error: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Sink for finished messages.
pub trait Notifier: Send + Sync {
    /// Deliver one message.
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Writes messages to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(subject = %subject, "{}", body);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Sends each message as a plain-text email.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
    preface: String,
}

impl SmtpNotifier {
    /// Build a notifier. Does not connect to the server.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox("from", &config.from)?;
        let to = parse_mailbox("to", &config.to)?;

        let mut builder = SmtpTransport::builder_dangerous(config.host.as_str()).port(config.port);

        builder = match config.security {
            SmtpSecurity::None => builder,
            SmtpSecurity::Tls => {
                builder.tls(Tls::Required(TlsParameters::new(config.host.clone())?))
            }
            SmtpSecurity::Ssl => builder.tls(Tls::Wrapper(TlsParameters::new(config.host.clone())?)),
        };

        if config.has_credentials() {
            builder = builder.credentials(Credentials::new(
                config.username.clone().unwrap_or_default(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            preface: config.preface.clone(),
        })
    }

    /// Assemble the email for one SMS.
    pub fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(format!("{}{}", self.preface, body))?)
    }
}

fn parse_mailbox(field: &str, value: &str) -> Result<Mailbox, NotifyError> {
    value
        .parse()
        .map_err(|e| NotifyError::Address(format!("{} {:?}: {}", field, value, e)))
}

impl Notifier for SmtpNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = self.build_message(subject, body)?;
        let response = self.transport.send(&email)?;
        if !response.is_positive() {
            return Err(NotifyError::Rejected(format!("{:?}", response.code())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
