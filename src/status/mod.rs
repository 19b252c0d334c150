//! The status-collection pipeline.
//!
//! One call renders one plain-text cluster report: connect, list brokers,
//! find the controller, list topics, then walk every topic's partitions
//! and their oldest offsets. The pipeline is a straight line; each stage
//! runs only if the previous one succeeded, and the first failure writes
//! a single error line and stops. Output already handed to the sink is
//! never retracted.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::SinkExt;
use tracing::debug;

use crate::kafka::{ClientConfig, ClusterClient, KafkaClient};

/// Where report text goes, chunk by chunk, as it is produced.
#[async_trait]
pub trait ReportSink: Send {
    async fn write(&mut self, chunk: String);
}

/// Sink backed by a bounded channel, feeding a streaming HTTP body.
///
/// Send errors are ignored: they mean the client hung up, and the
/// pipeline simply runs out its remaining writes into the void.
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ReportSink for ChannelSink {
    async fn write(&mut self, chunk: String) {
        let _ = self.tx.send(chunk).await;
    }
}

/// How a report generation ended; labels the outcome metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Complete,
    ConnectFailed,
    ControllerFailed,
    TopicsFailed,
    PartitionsFailed,
    OffsetFailed,
}

impl ReportOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::ConnectFailed => "connect_failed",
            Self::ControllerFailed => "controller_failed",
            Self::TopicsFailed => "topics_failed",
            Self::PartitionsFailed => "partitions_failed",
            Self::OffsetFailed => "offset_failed",
        }
    }
}

/// Generate one report: connect with a fresh client, stream the report,
/// release the client on every path out (drop closes its connections).
pub async fn run_status_report<S: ReportSink>(config: ClientConfig, sink: &mut S) -> ReportOutcome {
    let client = match KafkaClient::connect(config).await {
        Ok(client) => client,
        Err(err) => {
            sink.write(format!("create kafka client failed: {err}")).await;
            return ReportOutcome::ConnectFailed;
        }
    };
    write_report(&client, sink).await
}

/// Stream the report for an already-connected cluster client.
///
/// Error lines name the failed step and its cause, and carry no trailing
/// newline; nothing is written after them.
pub async fn write_report<C, S>(client: &C, sink: &mut S) -> ReportOutcome
where
    C: ClusterClient,
    S: ReportSink,
{
    sink.write("Brokers:\n".to_string()).await;
    for broker in client.brokers().await {
        sink.write(format!("- ID: {} Addr: {}\n", broker.id, broker.addr()))
            .await;
    }
    sink.write("\n".to_string()).await;

    sink.write("Controller:\n".to_string()).await;
    let controller = match client.controller().await {
        Ok(controller) => controller,
        Err(err) => {
            sink.write(format!("get kafka controller failed: {err}")).await;
            return ReportOutcome::ControllerFailed;
        }
    };
    sink.write(format!("- ID: {}\n", controller.id)).await;
    sink.write(format!("- Addr: {}\n", controller.addr())).await;
    sink.write("\n".to_string()).await;

    let mut topics = match client.topics().await {
        Ok(topics) => topics,
        Err(err) => {
            sink.write(format!("get kafka topics failed: {err}")).await;
            return ReportOutcome::TopicsFailed;
        }
    };
    sink.write("Topics:\n".to_string()).await;

    topics.sort_unstable();
    debug!(topics = topics.len(), "rendering topic list");

    for topic in &topics {
        sink.write(format!("- {topic} (")).await;
        let partitions = match client.partitions(topic).await {
            Ok(partitions) => partitions,
            Err(err) => {
                sink.write(format!("get partitions for topic {topic} failed: {err}"))
                    .await;
                return ReportOutcome::PartitionsFailed;
            }
        };
        for (i, partition) in partitions.iter().enumerate() {
            let offset = match client.oldest_offset(topic, *partition).await {
                Ok(offset) => offset,
                Err(err) => {
                    sink.write(format!(
                        "get offset for topic {topic} and partition {partition} failed: {err}"
                    ))
                    .await;
                    return ReportOutcome::OffsetFailed;
                }
            };
            if i == 0 {
                sink.write(format!("{partition}={offset}")).await;
            } else {
                sink.write(format!(",{partition}={offset}")).await;
            }
        }
        sink.write(")\n".to_string()).await;
    }
    sink.write("\n".to_string()).await;

    ReportOutcome::Complete
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
