/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Per-session metrics handles and the node-level Prometheus collector that
//! aggregates them.

use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const NODE_ID: &str = "node_id";
const LIFETIME_BUCKETS: [f64; 9] = [1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 21600.0, 86400.0];

/// Metrics handle allocated for every session.
#[derive(Debug)]
pub struct SessionMetrics {
    node_id: String,
    created_at: Instant,
    retired: AtomicBool,
    // Set once the collector has counted this handle as active.
    counted: AtomicBool,
}

impl SessionMetrics {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            created_at: Instant::now(),
            retired: AtomicBool::new(false),
            counted: AtomicBool::new(false),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Marks the session deleted; the next [`SessionCollector::save`] records it.
    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of one remote node's series.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeSessionStats {
    pub active: u64,
    pub created_total: u64,
    pub deleted_total: u64,
    /// Number of session lifetimes observed.
    pub lifetimes_observed: u64,
}

/// Node-level aggregation of [`SessionMetrics`] handles, labelled by remote node id.
#[derive(Clone)]
pub struct SessionCollector {
    active: IntGaugeVec,
    created: IntCounterVec,
    deleted: IntCounterVec,
    lifetime: HistogramVec,
}

impl SessionCollector {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            active: IntGaugeVec::new(
                Opts::new("pfcp_sessions_active", "PFCP sessions currently stored"),
                &[NODE_ID],
            )?,
            created: IntCounterVec::new(
                Opts::new("pfcp_sessions_created_total", "PFCP sessions created"),
                &[NODE_ID],
            )?,
            deleted: IntCounterVec::new(
                Opts::new("pfcp_sessions_deleted_total", "PFCP sessions deleted"),
                &[NODE_ID],
            )?,
            lifetime: HistogramVec::new(
                HistogramOpts::new(
                    "pfcp_session_lifetime_seconds",
                    "Lifetime of deleted PFCP sessions",
                )
                .buckets(LIFETIME_BUCKETS.to_vec()),
                &[NODE_ID],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.active.clone()))?;
        registry.register(Box::new(self.created.clone()))?;
        registry.register(Box::new(self.deleted.clone()))?;
        registry.register(Box::new(self.lifetime.clone()))
    }

    /// Folds the current state of `metrics` into the per-node series.
    ///
    /// Saving the same live handle twice counts it once; saving a retired handle
    /// that was counted decrements the active gauge exactly once.
    pub fn save(&self, metrics: &SessionMetrics) {
        let labels = [metrics.node_id.as_str()];

        if metrics.is_retired() {
            if metrics.counted.swap(false, Ordering::SeqCst) {
                self.active.with_label_values(&labels).dec();
                self.deleted.with_label_values(&labels).inc();
                self.lifetime
                    .with_label_values(&labels)
                    .observe(metrics.age().as_secs_f64());
            }
        } else if !metrics.counted.swap(true, Ordering::SeqCst) {
            self.active.with_label_values(&labels).inc();
            self.created.with_label_values(&labels).inc();
        }
    }

    /// Reads the node's series without creating them.
    pub fn node_stats(&self, node_id: &str) -> NodeSessionStats {
        let mut stats = NodeSessionStats::default();
        for metric in node_series(&self.active, node_id) {
            stats.active = metric.get_gauge().get_value().max(0.0) as u64;
        }
        for metric in node_series(&self.created, node_id) {
            stats.created_total = metric.get_counter().get_value() as u64;
        }
        for metric in node_series(&self.deleted, node_id) {
            stats.deleted_total = metric.get_counter().get_value() as u64;
        }
        for metric in node_series(&self.lifetime, node_id) {
            stats.lifetimes_observed = metric.get_histogram().get_sample_count();
        }
        stats
    }

    pub fn total_active(&self) -> u64 {
        self.active
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| metric.get_gauge().get_value().max(0.0) as u64)
            .sum()
    }
}

fn node_series(collector: &dyn Collector, node_id: &str) -> Vec<prometheus::proto::Metric> {
    collector
        .collect()
        .into_iter()
        .flat_map(|family| family.get_metric().to_vec())
        .filter(|metric| {
            metric
                .get_label()
                .iter()
                .any(|label| label.get_name() == NODE_ID && label.get_value() == node_id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{SessionCollector, SessionMetrics};
    use prometheus::{Encoder, Registry, TextEncoder};

    #[test]
    fn save_counts_live_handle_once() {
        let collector = SessionCollector::new().unwrap();
        let metrics = SessionMetrics::new("smf-1");

        collector.save(&metrics);
        collector.save(&metrics);

        let stats = collector.node_stats("smf-1");
        assert_eq!(stats.active, 1);
        assert_eq!(stats.created_total, 1);
    }

    #[test]
    fn retired_handle_decrements_once_and_records_lifetime() {
        let collector = SessionCollector::new().unwrap();
        let metrics = SessionMetrics::new("smf-1");
        collector.save(&metrics);

        metrics.retire();
        collector.save(&metrics);
        collector.save(&metrics);

        let stats = collector.node_stats("smf-1");
        assert_eq!(stats.active, 0);
        assert_eq!(stats.deleted_total, 1);
        assert_eq!(stats.lifetimes_observed, 1);
    }

    #[test]
    fn nodes_are_tracked_independently() {
        let collector = SessionCollector::new().unwrap();
        collector.save(&SessionMetrics::new("smf-1"));
        collector.save(&SessionMetrics::new("smf-2"));
        collector.save(&SessionMetrics::new("smf-2"));

        assert_eq!(collector.node_stats("smf-1").active, 1);
        assert_eq!(collector.node_stats("smf-2").active, 2);
        assert_eq!(collector.total_active(), 3);
        assert_eq!(collector.node_stats("unknown").active, 0);
    }

    #[test]
    fn registered_series_are_exported_with_node_label() {
        let registry = Registry::new();
        let collector = SessionCollector::new().unwrap();
        collector.register(&registry).unwrap();
        collector.save(&SessionMetrics::new("smf-1"));

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains(r#"pfcp_sessions_active{node_id="smf-1"} 1"#));
        assert!(text.contains(r#"pfcp_sessions_created_total{node_id="smf-1"} 1"#));
    }

    #[test]
    fn registering_twice_is_rejected() {
        let registry = Registry::new();
        let collector = SessionCollector::new().unwrap();

        collector.register(&registry).unwrap();
        assert!(collector.register(&registry).is_err());
    }
}
