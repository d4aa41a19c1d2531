use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Counters for one workflow engine
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub generations: AtomicU64,
    pub generation_failures: AtomicU64,
    pub tool_calls: AtomicU64,
    pub tool_failures: AtomicU64,
    pub suspensions: AtomicU64,
    pub revisions: AtomicU64,
    pub publish_successes: AtomicU64,
    pub publish_failures: AtomicU64,
    pub abandonments: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generation(&self) {
        self.generations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_generation_failure(&self) {
        self.generation_failures.fetch_add(1, Ordering::Relaxed);
        warn!("Generation step failed");
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tool_failure(&self) {
        self.tool_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suspension(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revision(&self) {
        self.revisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self, published: bool) {
        if published {
            self.publish_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_abandonment(&self) {
        self.abandonments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            generations: self.generations.load(Ordering::Relaxed),
            generation_failures: self.generation_failures.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_failures: self.tool_failures.load(Ordering::Relaxed),
            suspensions: self.suspensions.load(Ordering::Relaxed),
            revisions: self.revisions.load(Ordering::Relaxed),
            publish_successes: self.publish_successes.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            abandonments: self.abandonments.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            generations = stats.generations,
            generation_failures = stats.generation_failures,
            tool_calls = stats.tool_calls,
            tool_failures = stats.tool_failures,
            suspensions = stats.suspensions,
            revisions = stats.revisions,
            publish_successes = stats.publish_successes,
            publish_failures = stats.publish_failures,
            abandonments = stats.abandonments,
            "Workflow metrics"
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowStats {
    pub generations: u64,
    pub generation_failures: u64,
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub suspensions: u64,
    pub revisions: u64,
    pub publish_successes: u64,
    pub publish_failures: u64,
    pub abandonments: u64,
}

/// Logs how long a step took when finished
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Log completion and return the elapsed milliseconds
    pub fn finish(self) -> u64 {
        let duration_ms = self.elapsed_ms();
        info!(
            operation = self.operation,
            duration_ms = duration_ms,
            "Operation completed"
        );
        duration_ms
    }
}
