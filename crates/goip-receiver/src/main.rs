// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GoIP SMS Receiver
//!
//! Listens for SMS datagrams from a GoIP GSM gateway and forwards complete
//! messages by email (or to the log when no SMTP server is configured).
//!
//! # Usage
//!
//! ```bash
//! # Default port (44444) and device id (goip01)
//! RECEIVE_PASSWORD=secret goip-receiver
//!
//! # Wait 30s for further parts, purge timer every 2s
//! goip-receiver --password secret --wait 30 --purge-interval 2
//!
//! # Email delivery
//! goip-receiver --password secret --smtp-host mail.example.com \
//!     --smtp-from goip@example.com --smtp-to me@example.com --smtp-secure tls
//!
//! # JSON configuration file
//! goip-receiver --config receiver.json
//! ```

use clap::{Parser, Subcommand};
use goip_receiver::{
    LogNotifier, Notifier, ReceiverConfig, ReceiverServer, SmtpConfig, SmtpNotifier, SmtpSecurity,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// GoIP SMS Receiver - reassembles SMS from a GoIP gateway and forwards them
#[derive(Parser, Debug)]
#[command(name = "goip-receiver")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// UDP port to listen on
    #[arg(short, long, env = "RECEIVE_PORT", default_value = "44444")]
    port: u16,

    /// Bind address (0.0.0.0 for all interfaces)
    #[arg(short, long, env = "RECEIVE_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Expected gateway id
    #[arg(long, env = "RECEIVE_ID", default_value = "goip01")]
    id: String,

    /// Expected gateway password
    #[arg(long, env = "RECEIVE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Log verbosity ("debug" logs every datagram)
    #[arg(long, env = "RECEIVE_LOG", default_value = "debug")]
    log_level: String,

    /// Seconds to wait for further parts before forwarding a message
    #[arg(short, long, env = "RECEIVE_WAIT", default_value = "60")]
    wait: u64,

    /// Seconds between timer-driven purges (0 = purge only on traffic)
    #[arg(long, env = "RECEIVE_PURGE_INTERVAL", default_value = "5")]
    purge_interval: u64,

    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SMTP server; email delivery is disabled when unset
    #[arg(long, env = "SMTP_HOST")]
    smtp_host: Option<String>,

    /// SMTP port
    #[arg(long, env = "SMTP_PORT", default_value = "25")]
    smtp_port: u16,

    /// SMTP login user (unauthenticated when unset)
    #[arg(long, env = "SMTP_USERNAME")]
    smtp_username: Option<String>,

    /// SMTP login password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// SMTP security: empty, "tls" (STARTTLS) or "ssl"
    #[arg(long, env = "SMTP_SECURE", default_value = "")]
    smtp_secure: String,

    /// Sender address
    #[arg(long, env = "SMTP_FROM")]
    smtp_from: Option<String>,

    /// Recipient address
    #[arg(long, env = "SMTP_TO")]
    smtp_to: Option<String>,

    /// Text added to the beginning of every message body
    #[arg(long, env = "SMTP_PREFACE", default_value = "")]
    smtp_preface: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "receiver.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over RECEIVE_LOG
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.log_level == "debug" {
            EnvFilter::new("goip_receiver=debug")
        } else {
            EnvFilter::new("goip_receiver=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = &args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;

    info!("+----------------------------------------------------+");
    info!(
        "|       GoIP SMS Receiver v{}                     |",
        env!("CARGO_PKG_VERSION")
    );
    info!("+----------------------------------------------------+");
    info!(
        "|  Bind:   {:40} |",
        format!("{}:{}", config.bind_address, config.port)
    );
    info!("|  Device: {:40} |", config.device_id);
    info!("|  Wait:   {:40} |", format!("{}s", config.wait_secs));
    info!(
        "|  Purge:  {:40} |",
        match config.purge_interval() {
            Some(period) => format!("every {}s", period.as_secs()),
            None => "on traffic only".to_string(),
        }
    );
    info!(
        "|  Notify: {:40} |",
        match &config.smtp {
            Some(smtp) => format!("smtp {}:{}", smtp.host, smtp.port),
            None => "log".to_string(),
        }
    );
    info!("+----------------------------------------------------+");

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
        None => Arc::new(LogNotifier),
    };

    let server = ReceiverServer::new(config, notifier)?;

    // Handle shutdown signals
    let server_handle = server.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping receiver...");
        server_handle.shutdown();
    });

    if let Err(e) = server.run().await {
        error!("{}", e);
        return Err(e.into());
    }

    info!("GoIP SMS receiver stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

fn build_config(args: &Args) -> Result<ReceiverConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &args.config {
        info!("Loading config from {:?}", path);
        return Ok(ReceiverConfig::from_file(path)?);
    }

    let smtp = match &args.smtp_host {
        Some(host) if !host.is_empty() => Some(SmtpConfig {
            host: host.clone(),
            port: args.smtp_port,
            username: args.smtp_username.clone(),
            password: args.smtp_password.clone(),
            security: args.smtp_secure.parse::<SmtpSecurity>()?,
            from: args.smtp_from.clone().unwrap_or_default(),
            to: args.smtp_to.clone().unwrap_or_default(),
            preface: args.smtp_preface.clone(),
        }),
        _ => None,
    };

    Ok(ReceiverConfig {
        bind_address: args.bind,
        port: args.port,
        device_id: args.id.clone(),
        password: args.password.clone(),
        log_level: args.log_level.clone(),
        wait_secs: args.wait,
        purge_interval_secs: args.purge_interval,
        smtp,
        ..Default::default()
    })
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ReceiverConfig {
        password: Some("change-me".to_string()),
        smtp: Some(SmtpConfig {
            host: "mail.example.com".to_string(),
            port: 587,
            username: Some("goip@example.com".to_string()),
            password: Some("change-me".to_string()),
            security: SmtpSecurity::Tls,
            from: "goip@example.com".to_string(),
            to: "me@example.com".to_string(),
            preface: String::new(),
        }),
        ..Default::default()
    };
    config.to_file(output)?;
    println!("Generated example configuration: {}", output.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ReceiverConfig::from_file(path)?;
    config.validate()?;
    if let Some(smtp) = &config.smtp {
        SmtpNotifier::new(smtp)?;
    }
    println!("Configuration is valid: {}", path.display());
    Ok(())
}
