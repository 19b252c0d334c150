//! kafka-status: read-only status reporter for a Kafka cluster.
//!
//! Every request to `/` connects to the configured brokers, walks the
//! cluster metadata (brokers, controller, topics, partitions, oldest
//! offsets) and streams the result as a plain-text report. Liveness and
//! readiness probes plus a Prometheus metrics endpoint round out the
//! operational surface.

pub mod config;
pub mod kafka;
pub mod server;
pub mod status;
