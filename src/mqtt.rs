// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT bus subscriber.
//!
//! Bridges the broker's event loop into the forwarder's inbound message
//! channel. Delivery rate is whatever the broker pushes; backpressure is
//! absorbed downstream by the bounded queue, never here.

use crate::buffer::Message;
use crate::config::MqttConf;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Subscriber errors.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// MQTT subscription source feeding the forwarder.
pub struct MqttSource {
    conf: MqttConf,
}

impl MqttSource {
    pub fn new(conf: MqttConf) -> Self {
        Self { conf }
    }

    /// Effective client identifier: the configured one, or one derived
    /// from the process id.
    fn client_id(&self) -> String {
        if self.conf.client_id.is_empty() {
            format!("mqflux-{}", std::process::id())
        } else {
            self.conf.client_id.clone()
        }
    }

    /// Poll the broker until the forwarder side goes away.
    ///
    /// Publishes are forwarded as [`Message`] values. Connection errors
    /// are logged and retried after a short delay; the subscription is
    /// re-established on every connect acknowledgement.
    pub async fn run(self, tx: mpsc::UnboundedSender<Message>) -> Result<(), MqttError> {
        let mut options = MqttOptions::new(self.client_id(), self.conf.host.clone(), self.conf.port);
        options.set_keep_alive(KEEP_ALIVE);
        if !self.conf.username.is_empty() {
            options.set_credentials(self.conf.username.clone(), self.conf.password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(
                        "mqtt connected: {}:{}, subscribing to {}",
                        self.conf.host,
                        self.conf.port,
                        self.conf.topic
                    );
                    client
                        .subscribe(self.conf.topic.clone(), QoS::AtMostOnce)
                        .await?;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let msg = Message::new(publish.topic.clone(), publish.payload.to_vec());
                    if tx.send(msg).is_err() {
                        // Forwarder loop is gone; nothing left to feed.
                        tracing::info!("message channel closed, mqtt source exiting");
                        return Ok(());
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("mqtt connection error: {}, retrying", err);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}
