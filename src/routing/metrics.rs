//! Dispatch metrics: atomic counters plus an in-flight dispatch table
//!
//! The counters are the only mutable state shared between concurrent
//! dispatch threads, so every update is atomic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Counters updated while the router is dispatching
#[derive(Debug, Default)]
pub struct RouterMetrics {
    dispatches: AtomicU64,
    completed: AtomicU64,
    node_invocations: AtomicU64,
    records_discarded: AtomicU64,
    faults_routed: AtomicU64,
    handler_faults_ignored: AtomicU64,
    total_dispatch_micros: AtomicU64,
    in_flight: DashMap<Uuid, Instant>,
}

/// Point-in-time view of the metrics, serializable for reporting
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub dispatches: u64,
    pub completed: u64,
    pub in_flight: usize,
    pub node_invocations: u64,
    pub records_discarded: u64,
    pub faults_routed: u64,
    pub handler_faults_ignored: u64,
    pub total_dispatch_micros: u64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch_started(&self, message_id: Uuid) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        self.in_flight.insert(message_id, Instant::now());
    }

    pub fn dispatch_finished(&self, message_id: Uuid) {
        if let Some((_, started)) = self.in_flight.remove(&message_id) {
            let micros = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
            self.total_dispatch_micros.fetch_add(micros, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn node_invoked(&self) {
        self.node_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_discarded(&self, count: usize) {
        self.records_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn fault_routed(&self) {
        self.faults_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_fault_ignored(&self) {
        self.handler_faults_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: Utc::now(),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            in_flight: self.in_flight.len(),
            node_invocations: self.node_invocations.load(Ordering::Relaxed),
            records_discarded: self.records_discarded.load(Ordering::Relaxed),
            faults_routed: self.faults_routed.load(Ordering::Relaxed),
            handler_faults_ignored: self.handler_faults_ignored.load(Ordering::Relaxed),
            total_dispatch_micros: self.total_dispatch_micros.load(Ordering::Relaxed),
        }
    }
}
