// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic-to-tag mapping.
//!
//! Matches '/'-delimited topics against placeholder templates like
//! `weather/{loc}/{sensor}` and binds the matched segments to tag keys.
//! The bound tags, together with an optional full-topic tag, label the
//! point produced for each message.

use crate::buffer::Message;
use crate::config::InfluxDbConf;
use crate::line::{FieldValue, Point};
use std::collections::HashMap;

/// One parsed topic template.
///
/// Segments are either literals that must match the topic verbatim or
/// `{name}` placeholders that capture the topic segment at that position.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    segments: Vec<PatternSegment>,
}

#[derive(Debug, Clone)]
enum PatternSegment {
    Literal(String),
    Placeholder(String),
}

impl TopicPattern {
    /// Parse a template string. `{x}` segments become placeholders,
    /// everything else is a literal.
    pub fn parse(template: &str) -> Self {
        let segments = template
            .split('/')
            .map(|seg| {
                if seg.starts_with('{') && seg.ends_with('}') && seg.len() > 2 {
                    PatternSegment::Placeholder(seg[1..seg.len() - 1].to_string())
                } else {
                    PatternSegment::Literal(seg.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    /// Bind placeholder names to the topic's segments.
    ///
    /// Literal segments must match the topic for the pattern to contribute
    /// at all. A topic with fewer segments than the template yields a
    /// partial binding; extra topic segments are ignored.
    pub fn bind(&self, topic: &str) -> Option<Vec<(String, String)>> {
        let parts: Vec<&str> = topic.split('/').collect();
        let mut bound = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            let part = match parts.get(i) {
                Some(p) => *p,
                None => break, // topic exhausted: partial binding
            };
            match segment {
                PatternSegment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                PatternSegment::Placeholder(name) => {
                    bound.push((name.clone(), part.to_string()));
                }
            }
        }

        Some(bound)
    }
}

/// Maps one bus message to one data point.
///
/// Pure and stateless: the same message and configuration always produce
/// the same point.
pub struct SeriesEncoder {
    /// Ordered tag keys; placeholders not listed here emit no tag.
    tag_names: Vec<String>,
    patterns: Vec<TopicPattern>,
    /// Suppress the full-topic tag.
    no_topic_tag: bool,
    /// Series override; empty means "use the message topic".
    series: String,
}

/// Tag key carrying the full original topic, unless suppressed.
const TOPIC_TAG: &str = "topic";

impl SeriesEncoder {
    /// Build an encoder from the InfluxDB section of the configuration.
    pub fn new(conf: &InfluxDbConf) -> Self {
        Self {
            tag_names: conf.tags_attributes.clone(),
            patterns: conf.topic_map.iter().map(|t| TopicPattern::parse(t)).collect(),
            no_topic_tag: conf.no_topic_tag,
            series: conf.series.clone(),
        }
    }

    /// Encode a single message into a point at the given timestamp.
    pub fn encode(&self, msg: &Message, timestamp_ns: u64) -> Point {
        // All matching patterns contribute, in configuration order; a later
        // binding for the same key overwrites an earlier one.
        let mut bindings: HashMap<String, String> = HashMap::new();
        for pattern in &self.patterns {
            if let Some(bound) = pattern.bind(&msg.topic) {
                for (key, value) in bound {
                    bindings.insert(key, value);
                }
            }
        }

        // Emit tags in tags_attributes order; unbound names produce no tag.
        let mut tags: Vec<(String, String)> = Vec::new();
        for name in &self.tag_names {
            if let Some(value) = bindings.get(name) {
                tags.push((name.clone(), value.clone()));
            }
        }

        if !self.no_topic_tag && !tags.iter().any(|(k, _)| k == TOPIC_TAG) {
            tags.push((TOPIC_TAG.to_string(), msg.topic.clone()));
        }

        let series = if self.series.is_empty() {
            msg.topic.clone()
        } else {
            self.series.clone()
        };

        // Payload is carried verbatim as the measurement value.
        let value = String::from_utf8_lossy(&msg.payload).into_owned();

        Point {
            series,
            tags,
            fields: vec![("value".to_string(), FieldValue::String(value))],
            timestamp_ns,
        }
    }

    /// Encode a batch of messages, preserving order, all stamped with the
    /// same timestamp.
    pub fn encode_batch(&self, msgs: &[Message], timestamp_ns: u64) -> Vec<Point> {
        msgs.iter().map(|m| self.encode(m, timestamp_ns)).collect()
    }
}
