// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receiver configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Receiver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// UDP port the gateway sends to (default: 44444)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Expected gateway identifier (default: goip01)
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Expected gateway password. Required.
    #[serde(default)]
    pub password: Option<String>,

    /// Log verbosity; "debug" logs every datagram and reply
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds without a new part before a conversation is flushed
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Period of the independent purge timer in seconds (0 = purge only on traffic)
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// Receive buffer size in bytes
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    /// Capacity of the outbound notification queue
    #[serde(default = "default_notify_queue_depth")]
    pub notify_queue_depth: usize,

    /// SMTP settings; messages are only logged when absent
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    44444
}

fn default_device_id() -> String {
    "goip01".to_string()
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_wait_secs() -> u64 {
    60
}

fn default_purge_interval() -> u64 {
    5
}

fn default_max_datagram_size() -> usize {
    2048
}

fn default_notify_queue_depth() -> usize {
    64
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            device_id: default_device_id(),
            password: None,
            log_level: default_log_level(),
            wait_secs: default_wait_secs(),
            purge_interval_secs: default_purge_interval(),
            max_datagram_size: default_max_datagram_size(),
            notify_queue_depth: default_notify_queue_depth(),
            smtp: None,
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Idle threshold after which a conversation is flushed.
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    /// Purge timer period, `None` when the timer is disabled.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }

    /// Whether per-datagram debug logging was requested.
    pub fn is_debug(&self) -> bool {
        self.log_level == "debug"
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port cannot be 0".into()));
        }
        match self.password.as_deref() {
            None | Some("") => {
                return Err(ConfigError::InvalidValue(
                    "password is required (RECEIVE_PASSWORD)".into(),
                ));
            }
            Some(_) => {}
        }
        if self.max_datagram_size == 0 {
            return Err(ConfigError::InvalidValue(
                "max_datagram_size cannot be 0".into(),
            ));
        }
        if self.notify_queue_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "notify_queue_depth cannot be 0".into(),
            ));
        }
        if let Some(smtp) = &self.smtp {
            smtp.validate()?;
        }
        Ok(())
    }
}

/// Transport security for the SMTP connection.
///
/// Values follow the gateway tooling convention: `tls` means STARTTLS on a
/// plain connection, `ssl` means TLS from the first byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    #[default]
    None,
    Tls,
    Ssl,
}

impl FromStr for SmtpSecurity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "tls" | "starttls" => Ok(Self::Tls),
            "ssl" | "smtps" => Ok(Self::Ssl),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown SMTP security mode '{}'",
                other
            ))),
        }
    }
}

/// Outbound email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server host name or IP
    pub host: String,

    /// SMTP port (default: 25)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Login user; unauthenticated when empty
    #[serde(default)]
    pub username: Option<String>,

    /// Login password
    #[serde(default)]
    pub password: Option<String>,

    /// Connection security
    #[serde(default)]
    pub security: SmtpSecurity,

    /// Sender address
    pub from: String,

    /// Recipient address
    pub to: String,

    /// Text prepended to every message body
    #[serde(default)]
    pub preface: String,
}

fn default_smtp_port() -> u16 {
    25
}

impl SmtpConfig {
    /// Validate SMTP settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue("smtp.host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("smtp.port cannot be 0".into()));
        }
        if self.from.is_empty() {
            return Err(ConfigError::InvalidValue("smtp.from is required".into()));
        }
        if self.to.is_empty() {
            return Err(ConfigError::InvalidValue("smtp.to is required".into()));
        }
        Ok(())
    }

    /// Whether a login should be attempted.
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ReceiverConfig {
        ReceiverConfig {
            password: Some("secret".into()),
            ..Default::default()
        }
    }

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "mail.example.com".into(),
            port: 587,
            username: None,
            password: None,
            security: SmtpSecurity::Tls,
            from: "goip@example.com".into(),
            to: "me@example.com".into(),
            preface: String::new(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = ReceiverConfig::default();
        assert_eq!(config.port, 44444);
        assert_eq!(config.device_id, "goip01");
        assert_eq!(config.wait_secs, 60);
        assert!(config.password.is_none());
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_password_required() {
        let config = ReceiverConfig::default();
        assert!(config.validate().is_err());

        let config = ReceiverConfig {
            password: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_port_zero() {
        let config = ReceiverConfig {
            port: 0,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wait_and_purge_interval() {
        let config = ReceiverConfig {
            wait_secs: 30,
            purge_interval_secs: 0,
            ..valid_config()
        };
        assert_eq!(config.wait(), Duration::from_secs(30));
        assert_eq!(config.purge_interval(), None);

        let config = ReceiverConfig {
            purge_interval_secs: 2,
            ..valid_config()
        };
        assert_eq!(config.purge_interval(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_is_debug() {
        assert!(valid_config().is_debug());
        let config = ReceiverConfig {
            log_level: "info".into(),
            ..valid_config()
        };
        assert!(!config.is_debug());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ReceiverConfig =
            serde_json::from_str(r#"{"password": "x", "wait_secs": 10}"#).unwrap();
        assert_eq!(config.port, 44444);
        assert_eq!(config.wait_secs, 10);
        assert_eq!(config.password.as_deref(), Some("x"));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receiver.json");

        let config = ReceiverConfig {
            port: 45000,
            smtp: Some(smtp()),
            ..valid_config()
        };
        config.to_file(&path).unwrap();

        let loaded = ReceiverConfig::from_file(&path).unwrap();
        assert_eq!(loaded.port, 45000);
        assert_eq!(loaded.smtp.unwrap().security, SmtpSecurity::Tls);
    }

    #[test]
    fn test_from_file_missing() {
        let result = ReceiverConfig::from_file(Path::new("/nonexistent/receiver.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_smtp_security_parse() {
        assert_eq!("".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::None);
        assert_eq!("tls".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::Tls);
        assert_eq!("SSL".parse::<SmtpSecurity>().unwrap(), SmtpSecurity::Ssl);
        assert!("bogus".parse::<SmtpSecurity>().is_err());
    }

    #[test]
    fn test_smtp_validation() {
        assert!(smtp().validate().is_ok());
        assert!(!smtp().has_credentials());

        let missing_to = SmtpConfig {
            to: String::new(),
            ..smtp()
        };
        assert!(missing_to.validate().is_err());

        let config = ReceiverConfig {
            smtp: Some(missing_to),
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let with_login = SmtpConfig {
            username: Some("user".into()),
            ..smtp()
        };
        assert!(with_login.has_credentials());
    }
}
