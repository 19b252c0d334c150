//! Minimal metadata-only Kafka client.
//!
//! Only the queries the status pipeline needs are implemented: cluster
//! metadata (brokers, controller, topics, partitions) and earliest
//! offsets. The wire exchange lives in [`connection`], the query logic in
//! [`client`]. The pipeline consumes the [`ClusterClient`] trait so tests
//! can substitute a mock cluster.

mod client;
mod connection;

pub use client::KafkaClient;

use std::time::Duration;

use async_trait::async_trait;
use kafka_protocol::error::ResponseError;
use thiserror::Error;

/// Client identifier sent in every request header.
pub const CLIENT_ID: &str = "kafka-status";

/// Metadata API version used for all metadata queries.
///
/// Non-flexible encoding, carries the controller id, and is accepted by
/// every broker from 0.11 up (the deployment baseline is 2.0).
pub(crate) const METADATA_VERSION: i16 = 4;

/// ListOffsets API version used for oldest-offset queries.
pub(crate) const LIST_OFFSETS_VERSION: i16 = 1;

/// Sentinel timestamp asking for the earliest retained offset.
pub(crate) const EARLIEST_TIMESTAMP: i64 = -2;

/// A single broker of the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub id: i32,
    pub host: String,
    pub port: i32,
}

impl Broker {
    /// The broker's network address as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection settings for [`KafkaClient`].
///
/// `required_acks` and `produce_retries` only matter on a produce path,
/// which this reporter never takes; they are kept as configuration
/// defaults for compatibility with the original deployment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bootstrap broker addresses, tried in order.
    pub brokers: Vec<String>,
    /// Timeout applied to the initial connect and to each query.
    pub timeout: Duration,
    /// Client id reported to the brokers.
    pub client_id: String,
    /// Producer acknowledgment mode; -1 waits for all replicas.
    pub required_acks: i16,
    /// Producer retry budget.
    pub produce_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            timeout: Duration::from_secs(10),
            client_id: CLIENT_ID.to_string(),
            required_acks: -1,
            produce_retries: 10,
        }
    }
}

/// Errors from the Kafka client.
///
/// The `Display` output of these values ends up verbatim in the report
/// body as the `<cause>` of a failed step.
#[derive(Debug, Error)]
pub enum KafkaError {
    #[error("no broker reachable in [{0}]")]
    NoBrokerReachable(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("broker returned error: {0:?}")]
    Server(ResponseError),

    #[error("broker returned unknown error code {0}")]
    UnknownServerCode(i16),

    #[error("cluster reported no controller")]
    ControllerUnavailable,

    #[error("broker id {0} not present in cluster metadata")]
    UnknownBroker(i32),

    #[error("topic {0} not present in cluster metadata")]
    UnknownTopic(String),

    #[error("no leader known for topic {topic} partition {partition}")]
    NoLeader { topic: String, partition: i32 },

    #[error("partition {partition} missing from offsets response for topic {topic}")]
    MissingOffset { topic: String, partition: i32 },
}

/// Map a Kafka wire error code to a [`KafkaError`].
pub(crate) fn server_error(code: i16) -> KafkaError {
    match ResponseError::try_from_code(code) {
        Some(err) => KafkaError::Server(err),
        None => KafkaError::UnknownServerCode(code),
    }
}

/// The cluster queries the status pipeline issues, in the order it issues
/// them. Implemented by [`KafkaClient`] against a live cluster and by the
/// mock cluster in the pipeline tests.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Brokers known to the client, in the order the cluster returned
    /// them. Infallible once connected.
    async fn brokers(&self) -> Vec<Broker>;

    /// The current controller broker.
    async fn controller(&self) -> Result<Broker, KafkaError>;

    /// All topic names, unsorted, internal topics included.
    async fn topics(&self) -> Result<Vec<String>, KafkaError>;

    /// Partition ids of a topic in cluster-returned order.
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, KafkaError>;

    /// Oldest retained offset of a partition.
    async fn oldest_offset(&self, topic: &str, partition: i32) -> Result<i64, KafkaError>;
}
