// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mqflux - MQTT to InfluxDB forwarding bridge.
//!
//! Subscribes to an MQTT broker, buffers incoming topic/payload messages
//! in a bounded queue, and flushes them once per tick as a single batched
//! Line Protocol write to InfluxDB.
//!
//! ```text
//! MQTT broker --> MqttSource --> channel --> Forwarder --> SeriesEncoder --> HttpWriter
//! ```
//!
//! The pipeline is deliberately best-effort: a full queue evicts the
//! oldest message, and a failed write drops the batch. Durability belongs
//! to the broker and the database, not to this bridge.
//!
//! # Configuration
//!
//! ```toml
//! [general]
//! debug = false
//!
//! [mqtt]
//! host = "localhost"
//! port = 1883
//! topic = "sensors/#"
//!
//! [influxdb]
//! hostname = "localhost"
//! port = 8086
//! db = "telemetry"
//! tags_attributes = ["loc", "sensor"]
//! topic_map = ["weather/{loc}/{sensor}"]
//! ```

pub mod buffer;
pub mod config;
pub mod forwarder;
pub mod line;
pub mod mapping;
pub mod mqtt;
pub mod writer;

pub use buffer::{BoundedQueue, Message};
pub use config::{Config, ConfigError};
pub use forwarder::{ClientState, Command, Forwarder, ForwarderError, MAX_BATCH_SIZE};
pub use line::{FieldValue, Point};
pub use mapping::SeriesEncoder;
pub use mqtt::MqttSource;
pub use writer::{HttpWriter, PointWriter, WriteError};
