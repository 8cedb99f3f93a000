// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Loaded from a TOML file with `[general]`, `[mqtt]`, and `[influxdb]`
//! sections. `~` in paths expands against `$HOME`.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Flush tick period in seconds used when the config leaves it at zero.
pub const DEFAULT_TICK_SECS: u64 = 1;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Process-wide settings.
    #[serde(default)]
    pub general: GeneralConf,

    /// MQTT broker connection.
    #[serde(default)]
    pub mqtt: MqttConf,

    /// InfluxDB connection and topic mapping.
    #[serde(default)]
    pub influxdb: InfluxDbConf,
}

/// `[general]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConf {
    /// Force debug-level logging.
    #[serde(default)]
    pub debug: bool,
}

/// `[mqtt]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConf {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Subscription filter, e.g. `sensors/#`.
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,

    /// Client identifier; empty means derive one from the process id.
    #[serde(default)]
    pub client_id: String,
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "#".to_string()
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: String::new(),
            password: String::new(),
            topic: default_mqtt_topic(),
            client_id: String::new(),
        }
    }
}

/// `[influxdb]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxDbConf {
    #[serde(default)]
    pub hostname: String,

    #[serde(default = "default_influx_port")]
    pub port: u16,

    /// Full endpoint URL; overrides `scheme`/`hostname`/`port` when set.
    #[serde(default)]
    pub url: String,

    /// Database to write into.
    #[serde(default)]
    pub db: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Flush tick period in seconds; 0 means the 1 s default.
    #[serde(default)]
    pub tick: u64,

    /// UDP transport flag, carried through from the original surface.
    /// Rejected at writer construction (HTTP-only transport).
    #[serde(default)]
    pub udp: bool,

    /// Transport debug flag, passed through and not interpreted here.
    #[serde(default)]
    pub debug: String,

    /// Ordered tag keys the topic patterns may bind.
    #[serde(default)]
    pub tags_attributes: Vec<String>,

    /// Placeholder templates mapping topic segments to tags,
    /// e.g. `weather/{loc}/{sensor}`.
    #[serde(default)]
    pub topic_map: Vec<String>,

    /// Do not attach the full topic as a tag.
    #[serde(default)]
    pub no_topic_tag: bool,

    /// Series name override; empty means "use the message topic".
    #[serde(default)]
    pub series: String,

    /// Extra CA certificate paths (PEM), `~` expanded.
    #[serde(default)]
    pub ca_certs: Vec<String>,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Skip TLS certificate validation.
    #[serde(default)]
    pub insecure: bool,
}

fn default_influx_port() -> u16 {
    8086
}

fn default_scheme() -> String {
    "http".to_string()
}

impl Default for InfluxDbConf {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: default_influx_port(),
            url: String::new(),
            db: String::new(),
            username: String::new(),
            password: String::new(),
            tick: 0,
            udp: false,
            debug: String::new(),
            tags_attributes: Vec::new(),
            topic_map: Vec::new(),
            no_topic_tag: false,
            series: String::new(),
            ca_certs: Vec::new(),
            scheme: default_scheme(),
            insecure: false,
        }
    }
}

impl InfluxDbConf {
    /// Tick period with the zero-means-default rule applied.
    pub fn tick_or_default(&self) -> u64 {
        if self.tick == 0 {
            DEFAULT_TICK_SECS
        } else {
            self.tick
        }
    }

    /// Endpoint base URL: explicit `url` wins, otherwise assembled from
    /// `scheme`, `hostname`, and `port`.
    pub fn base_url(&self) -> String {
        if !self.url.is_empty() {
            self.url.trim_end_matches('/').to_string()
        } else {
            format!("{}://{}:{}", self.scheme, self.hostname, self.port)
        }
    }
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, expanding `~` in the path.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(expand_path(path))?;
        Self::from_toml(&content)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.influxdb.url.is_empty() && self.influxdb.hostname.is_empty() {
            return Err(ConfigError::Invalid(
                "influxdb: either url or hostname is required".into(),
            ));
        }
        if self.influxdb.db.is_empty() {
            return Err(ConfigError::Invalid("influxdb: db is required".into()));
        }
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::Invalid("mqtt: topic must not be empty".into()));
        }
        Ok(())
    }
}

/// Expand a leading `~` against `$HOME`.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(format!("{}{}", home, rest));
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[influxdb]
hostname = "localhost"
db = "metrics"
"#;

    const FULL_TOML: &str = r#"
[general]
debug = true

[mqtt]
host = "broker.example.com"
port = 8883
username = "mq"
password = "secret"
topic = "sensors/#"
client_id = "bridge-1"

[influxdb]
hostname = "influx.example.com"
port = 8086
db = "telemetry"
username = "writer"
password = "hunter2"
tick = 5
tags_attributes = ["loc", "sensor"]
topic_map = ["weather/{loc}/{sensor}"]
no_topic_tag = true
series = "weather"
ca_certs = ["~/certs/ca.pem"]
scheme = "https"
insecure = true
"#;

    #[test]
    fn test_parse_minimal_with_defaults() {
        let config = Config::from_toml(MINIMAL_TOML).expect("parse minimal");

        assert!(!config.general.debug);
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "#");

        assert_eq!(config.influxdb.hostname, "localhost");
        assert_eq!(config.influxdb.port, 8086);
        assert_eq!(config.influxdb.db, "metrics");
        assert_eq!(config.influxdb.scheme, "http");
        assert_eq!(config.influxdb.tick, 0);
        assert_eq!(config.influxdb.tick_or_default(), DEFAULT_TICK_SECS);
        assert!(config.influxdb.topic_map.is_empty());
        assert!(!config.influxdb.no_topic_tag);
    }

    #[test]
    fn test_parse_all_fields() {
        let config = Config::from_toml(FULL_TOML).expect("parse full");

        assert!(config.general.debug);
        assert_eq!(config.mqtt.host, "broker.example.com");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.topic, "sensors/#");

        let influx = &config.influxdb;
        assert_eq!(influx.db, "telemetry");
        assert_eq!(influx.tick, 5);
        assert_eq!(influx.tick_or_default(), 5);
        assert_eq!(influx.tags_attributes, vec!["loc", "sensor"]);
        assert_eq!(influx.topic_map, vec!["weather/{loc}/{sensor}"]);
        assert!(influx.no_topic_tag);
        assert_eq!(influx.series, "weather");
        assert_eq!(influx.scheme, "https");
        assert!(influx.insecure);
    }

    #[test]
    fn test_base_url_explicit_url_wins() {
        let conf = InfluxDbConf {
            url: "https://influx.example.com:9999/".to_string(),
            hostname: "ignored".to_string(),
            ..Default::default()
        };
        assert_eq!(conf.base_url(), "https://influx.example.com:9999");
    }

    #[test]
    fn test_base_url_assembled_from_parts() {
        let conf = InfluxDbConf {
            hostname: "db1".to_string(),
            port: 8087,
            scheme: "https".to_string(),
            ..Default::default()
        };
        assert_eq!(conf.base_url(), "https://db1:8087");
    }

    #[test]
    fn test_validate_requires_endpoint_and_db() {
        let err = Config::from_toml("[influxdb]\ndb = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml("[influxdb]\nhostname = \"h\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(MINIMAL_TOML.as_bytes()).expect("write");

        let config = Config::load(file.path().to_str().expect("utf-8 path")).expect("load");
        assert_eq!(config.influxdb.db, "metrics");
    }

    #[test]
    fn test_expand_path_home() {
        std::env::set_var("HOME", "/home/test");
        assert_eq!(
            expand_path("~/mqflux.toml"),
            PathBuf::from("/home/test/mqflux.toml")
        );
        assert_eq!(expand_path("/etc/mqflux.toml"), PathBuf::from("/etc/mqflux.toml"));
    }
}
