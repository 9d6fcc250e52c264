//! Router metrics.
//!
//! Counters maintained by the [`ExtractRouter`](crate::router::ExtractRouter)
//! across reads. Updated with relaxed atomics; read through
//! [`RouterMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::router::ExecutionBranch;

/// Metrics tracked by the router.
#[derive(Debug)]
pub struct RouterMetrics {
    /// Number of reads started.
    pub reads_total: AtomicU64,

    /// Streams routed to the concurrent engine.
    pub concurrent_streams_total: AtomicU64,

    /// Streams routed to the sequential engine.
    pub sequential_streams_total: AtomicU64,

    /// Catalog entries with no declared stream.
    pub unknown_streams_total: AtomicU64,

    /// Messages produced by the concurrent engine.
    pub concurrent_messages_total: AtomicU64,

    /// Messages produced by the sequential engine.
    pub sequential_messages_total: AtomicU64,

    /// Errors surfaced through the output stream.
    pub errors_total: AtomicU64,
}

impl RouterMetrics {
    /// Creates zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reads_total: AtomicU64::new(0),
            concurrent_streams_total: AtomicU64::new(0),
            sequential_streams_total: AtomicU64::new(0),
            unknown_streams_total: AtomicU64::new(0),
            concurrent_messages_total: AtomicU64::new(0),
            sequential_messages_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
        }
    }

    /// Records a planned read.
    pub fn record_plan(&self, concurrent: usize, sequential: usize, unknown: usize) {
        self.reads_total.fetch_add(1, Ordering::Relaxed);
        self.concurrent_streams_total
            .fetch_add(concurrent as u64, Ordering::Relaxed);
        self.sequential_streams_total
            .fetch_add(sequential as u64, Ordering::Relaxed);
        self.unknown_streams_total
            .fetch_add(unknown as u64, Ordering::Relaxed);
    }

    /// Records a message produced by `branch`.
    pub fn record_message(&self, branch: ExecutionBranch) {
        let counter = match branch {
            ExecutionBranch::Concurrent => &self.concurrent_messages_total,
            ExecutionBranch::Sequential => &self.sequential_messages_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an error.
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            reads_total: self.reads_total.load(Ordering::Relaxed),
            concurrent_streams_total: self.concurrent_streams_total.load(Ordering::Relaxed),
            sequential_streams_total: self.sequential_streams_total.load(Ordering::Relaxed),
            unknown_streams_total: self.unknown_streams_total.load(Ordering::Relaxed),
            concurrent_messages_total: self.concurrent_messages_total.load(Ordering::Relaxed),
            sequential_messages_total: self.sequential_messages_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of router metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterMetricsSnapshot {
    /// Number of reads started.
    pub reads_total: u64,
    /// Streams routed to the concurrent engine.
    pub concurrent_streams_total: u64,
    /// Streams routed to the sequential engine.
    pub sequential_streams_total: u64,
    /// Catalog entries with no declared stream.
    pub unknown_streams_total: u64,
    /// Messages produced by the concurrent engine.
    pub concurrent_messages_total: u64,
    /// Messages produced by the sequential engine.
    pub sequential_messages_total: u64,
    /// Errors surfaced through the output stream.
    pub errors_total: u64,
}

impl RouterMetricsSnapshot {
    /// Total messages across both branches.
    #[must_use]
    pub fn messages_total(&self) -> u64 {
        self.concurrent_messages_total + self.sequential_messages_total
    }
}
