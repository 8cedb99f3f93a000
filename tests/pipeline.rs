// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end pipeline tests: messages in, one batched write out.

use async_trait::async_trait;
use mqflux::config::InfluxDbConf;
use mqflux::{
    Command, Forwarder, ForwarderError, Message, Point, PointWriter, SeriesEncoder, WriteError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

struct RecordingWriter {
    batches: Mutex<Vec<Vec<Point>>>,
    fail: bool,
}

impl RecordingWriter {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
            fail,
        })
    }

    fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PointWriter for RecordingWriter {
    async fn write(&self, points: &[Point]) -> Result<(), WriteError> {
        self.batches.lock().expect("lock").push(points.to_vec());
        if self.fail {
            Err(WriteError::Rejected(503))
        } else {
            Ok(())
        }
    }
}

fn encoder() -> SeriesEncoder {
    SeriesEncoder::new(&InfluxDbConf {
        tags_attributes: vec!["loc".to_string(), "sensor".to_string()],
        topic_map: vec!["weather/{loc}/{sensor}".to_string()],
        ..Default::default()
    })
}

#[tokio::test(start_paused = true)]
async fn three_messages_one_tick_one_batch_in_order() {
    let writer = RecordingWriter::new(false);
    let forwarder = Forwarder::with_batch_size(
        encoder(),
        writer.clone(),
        Duration::from_secs(1),
        5,
    );

    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(forwarder.run(msg_rx, cmd_rx));

    msg_tx
        .send(Message::new("weather/paris/temp", b"21.5".to_vec()))
        .expect("send");
    msg_tx
        .send(Message::new("weather/lyon/temp", b"19.0".to_vec()))
        .expect("send");
    msg_tx
        .send(Message::new("weather/nice/hum", b"60".to_vec()))
        .expect("send");

    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let batches = writer.batches();
    assert_eq!(batches.len(), 1, "exactly one batched write");
    assert_eq!(batches[0].len(), 3);
    assert_eq!(batches[0][0].series, "weather/paris/temp");
    assert_eq!(batches[0][1].series, "weather/lyon/temp");
    assert_eq!(batches[0][2].series, "weather/nice/hum");

    // Structured tags extracted from the topic pattern.
    assert!(batches[0][0]
        .tags
        .contains(&("loc".to_string(), "paris".to_string())));
    assert!(batches[0][0]
        .tags
        .contains(&("sensor".to_string(), "temp".to_string())));

    // Queue is empty afterward: the next tick writes nothing.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(writer.batches().len(), 1);

    cmd_tx.send(Command::Stop).expect("send stop");
    tokio::time::sleep(Duration::from_secs(2)).await;
    let result = handle.await.expect("join");
    assert!(matches!(result, Err(ForwarderError::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn write_failure_discards_batch_and_loop_continues() {
    let writer = RecordingWriter::new(true);
    let forwarder = Forwarder::with_batch_size(
        encoder(),
        writer.clone(),
        Duration::from_secs(1),
        5,
    );

    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(forwarder.run(msg_rx, cmd_rx));

    msg_tx
        .send(Message::new("weather/paris/temp", b"21.5".to_vec()))
        .expect("send");

    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // The write failed, the batch is gone, and the loop keeps ticking.
    assert_eq!(writer.batches().len(), 1);

    msg_tx
        .send(Message::new("weather/lyon/temp", b"19.0".to_vec()))
        .expect("send");
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let batches = writer.batches();
    assert_eq!(batches.len(), 2, "next tick flushes fresh data");
    assert_eq!(batches[1].len(), 1);
    assert_eq!(batches[1][0].series, "weather/lyon/temp");

    cmd_tx.send(Command::Stop).expect("send stop");
    tokio::time::sleep(Duration::from_secs(2)).await;
    let result = handle.await.expect("join");
    assert!(matches!(result, Err(ForwarderError::Stopped)));
}

#[tokio::test(start_paused = true)]
async fn stop_before_first_tick_never_writes() {
    let writer = RecordingWriter::new(false);
    let forwarder = Forwarder::with_batch_size(
        encoder(),
        writer.clone(),
        Duration::from_secs(1),
        5,
    );

    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(forwarder.run(msg_rx, cmd_rx));

    msg_tx
        .send(Message::new("weather/paris/temp", b"21.5".to_vec()))
        .expect("send");
    cmd_tx.send(Command::Stop).expect("send stop");

    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let result = handle.await.expect("join");
    assert!(matches!(result, Err(ForwarderError::Stopped)));
    // Buffered data was discarded, never flushed.
    assert!(writer.batches().is_empty());
}
