//! Startup configuration.
//!
//! Every flag can also be supplied through an environment variable, and the
//! whole struct is validated once before the server binds its socket. The
//! config is passed by reference into the HTTP layer; there is no ambient
//! global state.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::kafka::ClientConfig;

/// Configuration errors that abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("port must be between 1 and 65535, got {0}")]
    PortInvalid(i32),

    #[error("kafka brokers missing")]
    BrokersMissing,
}

/// Process configuration, parsed from flags or environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "kafka-status", about = "Plain-text status reporter for a Kafka cluster")]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 9003)]
    pub port: i32,

    /// Comma-separated list of Kafka broker addresses (host:port).
    #[arg(long = "kafka-brokers", env = "KAFKA_BROKERS", default_value = "")]
    pub kafka_brokers: String,

    /// Timeout in seconds applied to each Kafka query.
    #[arg(long = "kafka-timeout", env = "KAFKA_TIMEOUT", default_value_t = 10)]
    pub kafka_timeout_secs: u64,
}

impl Config {
    /// Check that all required parameters are set.
    ///
    /// Called once at startup; a failure here is fatal and the process
    /// exits before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port <= 0 || self.port > i32::from(u16::MAX) {
            return Err(ConfigError::PortInvalid(self.port));
        }
        if self.kafka_brokers.is_empty() {
            return Err(ConfigError::BrokersMissing);
        }
        Ok(())
    }

    /// The broker list split into individual addresses.
    pub fn broker_list(&self) -> Vec<String> {
        self.kafka_brokers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Kafka client configuration derived from this process config.
    pub fn kafka(&self) -> ClientConfig {
        ClientConfig {
            brokers: self.broker_list(),
            timeout: Duration::from_secs(self.kafka_timeout_secs),
            ..ClientConfig::default()
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
