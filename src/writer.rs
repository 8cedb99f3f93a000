// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB write transport.
//!
//! The forwarder only sees the [`PointWriter`] trait: an opaque, fallible,
//! possibly slow batched write. [`HttpWriter`] implements it against the
//! InfluxDB 1.x HTTP API (`POST /write?db=...` with a Line Protocol body)
//! and verifies connectivity with `GET /ping` at construction time.

use crate::config::{expand_path, InfluxDbConf};
use crate::line::{render_batch, Point};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Connectivity check timeout at construction.
pub const PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Write transport errors.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("invalid InfluxDB endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("UDP transport is not supported")]
    UdpUnsupported,

    #[error("CA certificate error: {0}")]
    Certificate(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("InfluxDB not reachable: {0}")]
    Unreachable(String),

    #[error("InfluxDB rejected write: HTTP {0}")]
    Rejected(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Batched point writer.
#[async_trait]
pub trait PointWriter: Send + Sync {
    /// Write one batch of points. The batch is already off the queue;
    /// callers do not retry on failure.
    async fn write(&self, points: &[Point]) -> Result<(), WriteError>;
}

/// HTTP(S) writer for InfluxDB 1.x.
#[derive(Debug)]
pub struct HttpWriter {
    client: reqwest::Client,
    write_url: String,
    username: String,
    password: String,
}

impl HttpWriter {
    /// Build the client and verify the endpoint responds to `/ping`.
    ///
    /// Fails fast on an unsupported transport, an unloadable CA bundle,
    /// or an unreachable endpoint, so the forwarder never starts against
    /// a dead destination.
    pub async fn connect(conf: &InfluxDbConf) -> Result<Self, WriteError> {
        if conf.udp {
            return Err(WriteError::UdpUnsupported);
        }

        if conf.url.is_empty() && conf.hostname.is_empty() {
            return Err(WriteError::InvalidEndpoint(
                "no url or hostname configured".into(),
            ));
        }
        let base = conf.base_url();

        let mut builder = reqwest::Client::builder().use_rustls_tls();
        if conf.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        for path in &conf.ca_certs {
            let pem = std::fs::read(expand_path(path))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| WriteError::Certificate(format!("{}: {}", path, e)))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder.build()?;

        let writer = Self {
            client,
            write_url: format!("{}/write?db={}", base, conf.db),
            username: conf.username.clone(),
            password: conf.password.clone(),
        };
        writer.ping(&base).await?;
        tracing::info!("influxdb connected: {}", base);
        Ok(writer)
    }

    async fn ping(&self, base: &str) -> Result<(), WriteError> {
        let url = format!("{}/ping", base);
        let resp = self
            .client
            .get(&url)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .map_err(|e| WriteError::Unreachable(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(WriteError::Unreachable(format!(
                "ping returned HTTP {}",
                resp.status().as_u16()
            )))
        }
    }
}

#[async_trait]
impl PointWriter for HttpWriter {
    async fn write(&self, points: &[Point]) -> Result<(), WriteError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = render_batch(points);
        let mut request = self.client.post(&self.write_url).body(body);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WriteError::Rejected(status.as_u16()));
        }
        tracing::debug!("wrote {} points", points.len());
        Ok(())
    }
}
