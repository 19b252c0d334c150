//! Metadata queries against a live cluster.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use kafka_protocol::messages::list_offsets_request::{ListOffsetsPartition, ListOffsetsTopic};
use kafka_protocol::messages::metadata_request::MetadataRequestTopic;
use kafka_protocol::messages::{
    ApiKey, BrokerId, ListOffsetsRequest, ListOffsetsResponse, MetadataRequest, MetadataResponse,
    TopicName,
};
use kafka_protocol::protocol::StrBytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::connection::BrokerConnection;
use super::{
    server_error, Broker, ClientConfig, ClusterClient, KafkaError, EARLIEST_TIMESTAMP,
    LIST_OFFSETS_VERSION, METADATA_VERSION,
};

/// Client for one report generation.
///
/// Opened at pipeline entry, dropped on every exit path; dropping closes
/// the bootstrap connection and any per-broker connections. Queries run
/// sequentially, so a single async mutex over the connection state is
/// uncontended in practice.
pub struct KafkaClient {
    inner: Mutex<Inner>,
}

struct Inner {
    config: ClientConfig,
    /// Connection to the bootstrap broker; serves all metadata queries.
    bootstrap: BrokerConnection,
    /// Broker table from the most recent metadata response, in response
    /// order.
    brokers: Vec<Broker>,
    /// Connections to individual brokers, for leader-routed queries.
    conns: HashMap<i32, BrokerConnection>,
    /// Partition ids per topic, in the order the cluster listed them.
    partition_order: HashMap<String, Vec<i32>>,
    /// Partition leadership learned from metadata responses.
    leaders: HashMap<(String, i32), i32>,
}

impl KafkaClient {
    /// Connect to the first reachable bootstrap broker and prime the
    /// broker table with an initial metadata query.
    pub async fn connect(config: ClientConfig) -> Result<Self, KafkaError> {
        let client_id = StrBytes::from_string(config.client_id.clone());

        let mut last_err = None;
        let mut bootstrap = None;
        for addr in &config.brokers {
            match BrokerConnection::connect(addr, client_id.clone(), config.timeout).await {
                Ok(conn) => {
                    bootstrap = Some(conn);
                    break;
                }
                Err(err) => {
                    warn!(addr = %addr, error = %err, "bootstrap broker unreachable");
                    last_err = Some(err);
                }
            }
        }
        let mut bootstrap = match bootstrap {
            Some(conn) => conn,
            None => {
                return Err(last_err
                    .unwrap_or_else(|| KafkaError::NoBrokerReachable(config.brokers.join(","))))
            }
        };

        let metadata = fetch_metadata(&mut bootstrap, None).await?;
        let brokers = brokers_from(&metadata);
        debug!(
            bootstrap = %bootstrap.addr(),
            brokers = brokers.len(),
            "kafka client connected"
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                config,
                bootstrap,
                brokers,
                conns: HashMap::new(),
                partition_order: HashMap::new(),
                leaders: HashMap::new(),
            }),
        })
    }
}

#[async_trait]
impl ClusterClient for KafkaClient {
    async fn brokers(&self) -> Vec<Broker> {
        self.inner.lock().await.brokers.clone()
    }

    async fn controller(&self) -> Result<Broker, KafkaError> {
        let mut inner = self.inner.lock().await;
        let metadata = fetch_metadata(&mut inner.bootstrap, None).await?;
        inner.brokers = brokers_from(&metadata);

        let id = metadata.controller_id.0;
        if id < 0 {
            return Err(KafkaError::ControllerUnavailable);
        }
        inner
            .brokers
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(KafkaError::UnknownBroker(id))
    }

    async fn topics(&self) -> Result<Vec<String>, KafkaError> {
        let mut inner = self.inner.lock().await;
        let metadata = fetch_metadata(&mut inner.bootstrap, None).await?;
        inner.brokers = brokers_from(&metadata);

        let mut names = Vec::with_capacity(metadata.topics.len());
        for topic in &metadata.topics {
            if let Some(name) = &topic.name {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, KafkaError> {
        let mut inner = self.inner.lock().await;
        inner.refresh_topic(topic).await?;
        inner.partition_ids(topic)
    }

    async fn oldest_offset(&self, topic: &str, partition: i32) -> Result<i64, KafkaError> {
        let mut inner = self.inner.lock().await;

        let key = (topic.to_string(), partition);
        let leader = match inner.leaders.get(&key) {
            Some(&leader) => leader,
            None => {
                // Leadership may have moved or was never fetched.
                inner.refresh_topic(topic).await?;
                match inner.leaders.get(&key) {
                    Some(&leader) => leader,
                    None => {
                        return Err(KafkaError::NoLeader {
                            topic: topic.to_string(),
                            partition,
                        })
                    }
                }
            }
        };

        let conn = inner.leader_connection(leader).await?;
        let request = ListOffsetsRequest::default()
            .with_replica_id(BrokerId(-1))
            .with_topics(vec![ListOffsetsTopic::default()
                .with_name(TopicName(StrBytes::from_string(topic.to_string())))
                .with_partitions(vec![ListOffsetsPartition::default()
                    .with_partition_index(partition)
                    .with_timestamp(EARLIEST_TIMESTAMP)])]);
        let response: ListOffsetsResponse = conn
            .request(ApiKey::ListOffsets, LIST_OFFSETS_VERSION, &request)
            .await?;

        for topic_response in &response.topics {
            if topic_response.name.as_str() != topic {
                continue;
            }
            for partition_response in &topic_response.partitions {
                if partition_response.partition_index != partition {
                    continue;
                }
                if partition_response.error_code != 0 {
                    return Err(server_error(partition_response.error_code));
                }
                return Ok(partition_response.offset);
            }
        }
        Err(KafkaError::MissingOffset {
            topic: topic.to_string(),
            partition,
        })
    }
}

impl Inner {
    /// Fetch metadata for one topic and fold brokers, partition order and
    /// leadership into the local caches.
    async fn refresh_topic(&mut self, topic: &str) -> Result<(), KafkaError> {
        let metadata = fetch_metadata(&mut self.bootstrap, Some(topic)).await?;
        self.brokers = brokers_from(&metadata);

        let entry = metadata
            .topics
            .iter()
            .find(|t| t.name.as_ref().is_some_and(|n| n.as_str() == topic))
            .ok_or_else(|| KafkaError::UnknownTopic(topic.to_string()))?;
        if entry.error_code != 0 {
            return Err(server_error(entry.error_code));
        }

        let mut order = Vec::with_capacity(entry.partitions.len());
        for partition in &entry.partitions {
            order.push(partition.partition_index);
            if partition.leader_id.0 >= 0 {
                self.leaders.insert(
                    (topic.to_string(), partition.partition_index),
                    partition.leader_id.0,
                );
            }
        }
        self.partition_order.insert(topic.to_string(), order);
        Ok(())
    }

    /// Partition ids of `topic` in the order of the last refresh.
    fn partition_ids(&self, topic: &str) -> Result<Vec<i32>, KafkaError> {
        self.partition_order
            .get(topic)
            .cloned()
            .ok_or_else(|| KafkaError::UnknownTopic(topic.to_string()))
    }

    /// Connection to `leader`, dialing it on first use.
    async fn leader_connection(
        &mut self,
        leader: i32,
    ) -> Result<&mut BrokerConnection, KafkaError> {
        let addr = self
            .brokers
            .iter()
            .find(|b| b.id == leader)
            .map(Broker::addr)
            .ok_or(KafkaError::UnknownBroker(leader))?;

        let client_id = StrBytes::from_string(self.config.client_id.clone());
        let timeout = self.config.timeout;
        match self.conns.entry(leader) {
            Entry::Occupied(conn) => Ok(conn.into_mut()),
            Entry::Vacant(slot) => {
                let conn = BrokerConnection::connect(&addr, client_id, timeout).await?;
                Ok(slot.insert(conn))
            }
        }
    }
}

/// One metadata round trip; `topic` of `None` asks for every topic.
async fn fetch_metadata(
    conn: &mut BrokerConnection,
    topic: Option<&str>,
) -> Result<MetadataResponse, KafkaError> {
    let topics = topic.map(|name| {
        vec![MetadataRequestTopic::default()
            .with_name(Some(TopicName(StrBytes::from_string(name.to_string()))))]
    });
    let request = MetadataRequest::default()
        .with_topics(topics)
        .with_allow_auto_topic_creation(false);
    conn.request(ApiKey::Metadata, METADATA_VERSION, &request)
        .await
}

/// Broker table of a metadata response, in response order.
fn brokers_from(metadata: &MetadataResponse) -> Vec<Broker> {
    metadata
        .brokers
        .iter()
        .map(|b| Broker {
            id: b.node_id.0,
            host: b.host.to_string(),
            port: b.port,
        })
        .collect()
}
