// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests against a receiver bound on localhost.

use goip_receiver::{Notifier, NotifyError, ReceiverConfig, ReceiverServer};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

#[derive(Default)]
struct Recording {
    sent: Mutex<Vec<(String, String)>>,
}

impl Recording {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for Recording {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    server: ReceiverServer,
    task: JoinHandle<()>,
    addr: SocketAddr,
    gateway: UdpSocket,
    notifier: Arc<Recording>,
}

impl Harness {
    async fn start(wait_secs: u64, purge_interval_secs: u64) -> Self {
        let config = ReceiverConfig {
            password: Some("secret".into()),
            wait_secs,
            purge_interval_secs,
            ..Default::default()
        };
        let notifier = Arc::new(Recording::default());
        let server = ReceiverServer::new(config, notifier.clone()).unwrap();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let serving = server.clone();
        let task = tokio::spawn(async move {
            serving.serve(socket).await.unwrap();
        });

        let gateway = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        Self {
            server,
            task,
            addr,
            gateway,
            notifier,
        }
    }

    async fn send(&self, payload: &str) {
        self.gateway
            .send_to(payload.as_bytes(), self.addr)
            .await
            .unwrap();
    }

    async fn exchange(&self, payload: &str) -> String {
        self.send(payload).await;
        let mut buf = [0u8; 512];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), self.gateway.recv_from(&mut buf))
            .await
            .expect("no reply from receiver")
            .unwrap();
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    async fn stop(self) -> Arc<Recording> {
        self.server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("receiver did not stop")
            .unwrap();
        self.notifier
    }
}

async fn wait_for_delivery(notifier: &Recording, count: usize) {
    for _ in 0..250 {
        if notifier.sent().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_ack_ok() {
    let h = Harness::start(60, 0).await;

    let reply = h
        .exchange("RECEIVE:1734804704;id:goip01;password:secret;srcnum:+358401234567;msg:Hello")
        .await;

    assert_eq!(reply, "RECEIVE 1734804704 OK");
    assert_eq!(h.server.pending_conversations().await, 1);
    h.stop().await;
}

#[tokio::test]
async fn test_ack_invalid_credentials() {
    let h = Harness::start(60, 0).await;

    let reply = h
        .exchange("RECEIVE:55;id:goip01;password:nope;srcnum:+358401234567;msg:Hello")
        .await;

    assert_eq!(reply, "RECEIVE 55 ERROR invalid credentials");
    assert_eq!(h.server.pending_conversations().await, 0);

    let notifier = h.stop().await;
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_keepalive_reply() {
    let h = Harness::start(60, 0).await;

    let reply = h
        .exchange("req:19;id:goip01;pass:secret;num:;signal:15;gsm_status:LOGIN;pro:dna;")
        .await;

    assert_eq!(reply, "reg:19;status:200;");
    h.stop().await;
}

#[tokio::test]
async fn test_unrelated_datagram_triggers_flush() {
    let h = Harness::start(1, 0).await;

    h.exchange("RECEIVE:1;id:goip01;password:secret;srcnum:+358401234567;msg:Hel")
        .await;
    h.exchange("RECEIVE:2;id:goip01;password:secret;srcnum:+358401234567;msg:lo")
        .await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // No reply for unrecognized datagrams; the purge still runs.
    h.send("CELLINFO:3;id:goip01;lac:1234").await;
    wait_for_delivery(&h.notifier, 1).await;

    assert_eq!(h.server.pending_conversations().await, 0);
    let notifier = h.stop().await;
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "SMS Message from goip01|+358401234567");
    assert_eq!(sent[0].1, "Hello");
}

#[tokio::test]
async fn test_keepalive_triggers_flush() {
    let h = Harness::start(1, 0).await;

    h.exchange("RECEIVE:1;id:goip01;password:secret;srcnum:+358401234567;msg:ping")
        .await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Only the first segment is rewritten; "pro:req" stays out of the reply.
    let reply = h.exchange("req:7;id:goip01;pass:x;pro:req").await;
    assert_eq!(reply, "reg:7;status:200;");
    wait_for_delivery(&h.notifier, 1).await;

    assert_eq!(h.server.pending_conversations().await, 0);
    let notifier = h.stop().await;
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "SMS Message from goip01|+358401234567");
    assert_eq!(sent[0].1, "ping");
}

#[tokio::test]
async fn test_purge_timer_flushes_without_traffic() {
    let h = Harness::start(1, 1).await;

    h.exchange("RECEIVE:9;id:goip01;password:secret;srcnum:123;msg:quiet link")
        .await;
    assert_eq!(h.server.pending_conversations().await, 1);
    wait_for_delivery(&h.notifier, 1).await;

    let notifier = h.stop().await;
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "quiet link");
}

#[tokio::test]
async fn test_shutdown_flushes_pending() {
    let h = Harness::start(3600, 0).await;

    h.exchange("RECEIVE:1;id:goip01;password:secret;srcnum:111;msg:first")
        .await;
    h.exchange("RECEIVE:2;id:goip01;password:secret;srcnum:111;msg: second")
        .await;

    let stats = h.server.stats();
    assert_eq!(stats.messages_accepted, 2);

    let notifier = h.stop().await;
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "first second");
}
