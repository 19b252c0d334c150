//! Tests for the status pipeline against a mock cluster.

use std::collections::HashMap;

use async_trait::async_trait;

use super::*;
use crate::kafka::{Broker, KafkaError};

/// Sink that collects the report into a string.
#[derive(Default)]
struct StringSink(String);

#[async_trait]
impl ReportSink for StringSink {
    async fn write(&mut self, chunk: String) {
        self.0.push_str(&chunk);
    }
}

fn broker(id: i32, host: &str, port: i32) -> Broker {
    Broker {
        id,
        host: host.to_string(),
        port,
    }
}

/// Scriptable cluster: `Err` strings surface as protocol errors so the
/// report shows `protocol error: <msg>` as the cause.
struct MockCluster {
    brokers: Vec<Broker>,
    controller: Result<Broker, String>,
    topics: Result<Vec<String>, String>,
    partitions: HashMap<String, Result<Vec<i32>, String>>,
    offsets: HashMap<(String, i32), Result<i64, String>>,
}

impl MockCluster {
    fn healthy() -> Self {
        Self {
            brokers: vec![broker(1, "b1", 9092)],
            controller: Ok(broker(1, "b1", 9092)),
            topics: Ok(vec![]),
            partitions: HashMap::new(),
            offsets: HashMap::new(),
        }
    }

    fn with_topic(mut self, name: &str, partitions: &[(i32, i64)]) -> Self {
        self.topics
            .as_mut()
            .expect("topics must be Ok")
            .push(name.to_string());
        self.partitions.insert(
            name.to_string(),
            Ok(partitions.iter().map(|(p, _)| *p).collect()),
        );
        for (partition, offset) in partitions {
            self.offsets
                .insert((name.to_string(), *partition), Ok(*offset));
        }
        self
    }
}

fn fail(msg: &str) -> KafkaError {
    KafkaError::Protocol(msg.to_string())
}

#[async_trait]
impl crate::kafka::ClusterClient for MockCluster {
    async fn brokers(&self) -> Vec<Broker> {
        self.brokers.clone()
    }

    async fn controller(&self) -> Result<Broker, KafkaError> {
        self.controller.clone().map_err(|m| fail(&m))
    }

    async fn topics(&self) -> Result<Vec<String>, KafkaError> {
        self.topics.clone().map_err(|m| fail(&m))
    }

    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, KafkaError> {
        self.partitions
            .get(topic)
            .expect("unexpected partitions query")
            .clone()
            .map_err(|m| fail(&m))
    }

    async fn oldest_offset(&self, topic: &str, partition: i32) -> Result<i64, KafkaError> {
        self.offsets
            .get(&(topic.to_string(), partition))
            .expect("unexpected offset query")
            .clone()
            .map_err(|m| fail(&m))
    }
}

async fn render(cluster: &MockCluster) -> (String, ReportOutcome) {
    let mut sink = StringSink::default();
    let outcome = write_report(cluster, &mut sink).await;
    (sink.0, outcome)
}

/// Test the full report for a one-topic cluster, byte for byte
#[tokio::test]
async fn test_full_report_layout() {
    let cluster = MockCluster::healthy().with_topic("orders", &[(0, 10), (1, 20)]);
    let (report, outcome) = render(&cluster).await;

    assert_eq!(outcome, ReportOutcome::Complete);
    assert_eq!(
        report,
        "Brokers:\n\
         - ID: 1 Addr: b1:9092\n\
         \n\
         Controller:\n\
         - ID: 1\n\
         - Addr: b1:9092\n\
         \n\
         Topics:\n\
         - orders (0=10,1=20)\n\
         \n"
    );
}

/// Test that topics render in lexicographic order regardless of listing order
#[tokio::test]
async fn test_topics_sorted_lexicographically() {
    let cluster = MockCluster::healthy()
        .with_topic("b-topic", &[(0, 1)])
        .with_topic("a-topic", &[(0, 2)]);
    let (report, outcome) = render(&cluster).await;

    assert_eq!(outcome, ReportOutcome::Complete);
    let a = report.find("- a-topic (").expect("a-topic missing");
    let b = report.find("- b-topic (").expect("b-topic missing");
    assert!(a < b, "a-topic must render before b-topic:\n{report}");
}

/// Test that partition order is preserved and only later pairs get commas
#[tokio::test]
async fn test_partition_order_and_comma_layout() {
    let cluster = MockCluster::healthy().with_topic("t", &[(3, 7), (1, 8), (2, 9)]);
    let (report, _) = render(&cluster).await;
    assert!(report.contains("- t (3=7,1=8,2=9)\n"), "got:\n{report}");
}

/// Test that a topic with no partitions renders an empty pair list
#[tokio::test]
async fn test_empty_topic_renders_empty_parens() {
    let cluster = MockCluster::healthy().with_topic("empty", &[]);
    let (report, outcome) = render(&cluster).await;
    assert_eq!(outcome, ReportOutcome::Complete);
    assert!(report.contains("- empty ()\n"), "got:\n{report}");
}

/// Test that a controller failure stops the report after the broker section
#[tokio::test]
async fn test_controller_failure_stops_report() {
    let mut cluster = MockCluster::healthy().with_topic("orders", &[(0, 10)]);
    cluster.controller = Err("boom".to_string());
    let (report, outcome) = render(&cluster).await;

    assert_eq!(outcome, ReportOutcome::ControllerFailed);
    assert!(report.contains("- ID: 1 Addr: b1:9092\n"));
    assert!(
        report.ends_with("Controller:\nget kafka controller failed: protocol error: boom"),
        "got:\n{report}"
    );
    assert!(!report.contains("Topics:"));
}

/// Test that a topic-listing failure keeps the broker and controller
/// sections and emits no topic data
#[tokio::test]
async fn test_topics_failure_stops_report() {
    let mut cluster = MockCluster::healthy();
    cluster.topics = Err("boom".to_string());
    let (report, outcome) = render(&cluster).await;

    assert_eq!(outcome, ReportOutcome::TopicsFailed);
    assert!(report.contains("Brokers:\n"));
    assert!(report.contains("Controller:\n- ID: 1\n- Addr: b1:9092\n"));
    assert!(
        report.ends_with("get kafka topics failed: protocol error: boom"),
        "got:\n{report}"
    );
    assert!(!report.contains("Topics:"));
}

/// Test that a partition-listing failure abandons all remaining topics
#[tokio::test]
async fn test_partitions_failure_abandons_remaining_topics() {
    let mut cluster = MockCluster::healthy()
        .with_topic("a", &[(0, 5)])
        .with_topic("c", &[(0, 6)]);
    cluster.topics.as_mut().expect("ok").push("b".to_string());
    cluster.partitions.insert("b".to_string(), Err("boom".to_string()));
    let (report, outcome) = render(&cluster).await;

    assert_eq!(outcome, ReportOutcome::PartitionsFailed);
    assert!(report.contains("- a (0=5)\n"), "earlier topic must remain");
    assert!(
        report.ends_with("- b (get partitions for topic b failed: protocol error: boom"),
        "got:\n{report}"
    );
    assert!(!report.contains("- c ("), "later topics must be abandoned");
}

/// Test that an offset failure stops mid-pair-list, keeping pairs already
/// written
#[tokio::test]
async fn test_offset_failure_stops_mid_topic() {
    let mut cluster = MockCluster::healthy().with_topic("orders", &[(0, 10), (1, 20)]);
    cluster
        .offsets
        .insert(("orders".to_string(), 1), Err("boom".to_string()));
    let (report, outcome) = render(&cluster).await;

    assert_eq!(outcome, ReportOutcome::OffsetFailed);
    assert!(
        report.ends_with(
            "- orders (0=10get offset for topic orders and partition 1 failed: protocol error: boom"
        ),
        "got:\n{report}"
    );
}

/// Test the outcome labels used for the metrics counter
#[test]
fn test_outcome_labels() {
    assert_eq!(ReportOutcome::Complete.label(), "complete");
    assert_eq!(ReportOutcome::ConnectFailed.label(), "connect_failed");
    assert_eq!(ReportOutcome::OffsetFailed.label(), "offset_failed");
}
