// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for session lifecycle and custom commands.
//!
//! Provides lightweight metrics collection without external dependencies.
//! Counters track the session lifecycle; per-prefix command metrics track the
//! tool layer; operation histograms track startup and teardown latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Session lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    StartFailed,
    Restarted,
    RestartFailed,
    Disposed,
    TeardownFailed,
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    sessions: SessionCounters,

    /// Custom command metrics by command prefix.
    commands: RwLock<HashMap<String, CommandMetrics>>,

    /// Timed operations (e.g. "session.startup").
    operations: RwLock<HashMap<String, OperationMetrics>>,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            sessions: SessionCounters::default(),
            commands: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a session lifecycle event.
    pub fn record_session(&self, event: SessionEvent) {
        self.sessions.counter(event).fetch_add(1, Ordering::Relaxed);
    }

    /// Number of recorded events of a kind.
    pub fn session_count(&self, event: SessionEvent) -> u64 {
        self.sessions.counter(event).load(Ordering::Relaxed)
    }

    /// Record a custom command invocation.
    pub fn record_command(&self, prefix: &str, duration: Duration, success: bool) {
        if let Ok(mut commands) = self.commands.write() {
            commands
                .entry(prefix.to_string())
                .or_insert_with(CommandMetrics::new)
                .record(duration, success);
        }
    }

    /// Record a timed operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        if let Ok(mut ops) = self.operations.write() {
            ops.entry(name.to_string())
                .or_insert_with(OperationMetrics::new)
                .record(duration);
        }
    }

    /// Get metrics for a command prefix.
    pub fn command_metrics(&self, prefix: &str) -> Option<CommandMetrics> {
        self.commands.read().ok()?.get(prefix).cloned()
    }

    /// Get metrics for an operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations.read().ok()?.get(name).cloned()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let commands = self.commands.read().map(|c| c.clone()).unwrap_or_default();
        let operations = self.operations.read().map(|o| o.clone()).unwrap_or_default();

        MetricsSnapshot {
            sessions_started: self.session_count(SessionEvent::Started),
            start_failures: self.session_count(SessionEvent::StartFailed),
            restarts: self.session_count(SessionEvent::Restarted),
            restart_failures: self.session_count(SessionEvent::RestartFailed),
            sessions_disposed: self.session_count(SessionEvent::Disposed),
            teardown_failures: self.session_count(SessionEvent::TeardownFailed),
            commands,
            operations,
            uptime: self.start_time.elapsed(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        self.sessions.reset();
        if let Ok(mut commands) = self.commands.write() {
            commands.clear();
        }
        if let Ok(mut ops) = self.operations.write() {
            ops.clear();
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct SessionCounters {
    started: AtomicU64,
    start_failed: AtomicU64,
    restarted: AtomicU64,
    restart_failed: AtomicU64,
    disposed: AtomicU64,
    teardown_failed: AtomicU64,
}

impl SessionCounters {
    fn counter(&self, event: SessionEvent) -> &AtomicU64 {
        match event {
            SessionEvent::Started => &self.started,
            SessionEvent::StartFailed => &self.start_failed,
            SessionEvent::Restarted => &self.restarted,
            SessionEvent::RestartFailed => &self.restart_failed,
            SessionEvent::Disposed => &self.disposed,
            SessionEvent::TeardownFailed => &self.teardown_failed,
        }
    }

    fn reset(&self) {
        for counter in [
            &self.started,
            &self.start_failed,
            &self.restarted,
            &self.restart_failed,
            &self.disposed,
            &self.teardown_failed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Metrics for one custom command prefix.
#[derive(Debug, Clone)]
pub struct CommandMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl CommandMetrics {
    /// Create new empty command metrics.
    pub fn new() -> Self {
        Self {
            invocations: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
        }
    }

    /// Record an invocation.
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    /// Calculate success rate (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            1.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}

impl Default for CommandMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Generic operation metrics with histogram.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    /// Create new operation metrics.
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    /// Record an operation.
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    /// Calculate average duration.
    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Histogram with fixed buckets for latency tracking.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Bucket boundaries in milliseconds.
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in milliseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    /// Record a duration value.
    pub fn record(&mut self, duration: Duration) {
        let millis = duration.as_millis() as u64;
        let bucket_idx = self
            .buckets
            .iter()
            .position(|&b| millis <= b)
            .unwrap_or(self.buckets.len());
        self.counts[bucket_idx] += 1;
    }

    /// Get counts for each bucket.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Calculate approximate percentile (p50, p90, p99, etc.).
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;

        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let millis = if i < self.buckets.len() {
                    self.buckets[i]
                } else {
                    self.buckets.last().copied().unwrap_or(0) * 10
                };
                return Duration::from_millis(millis);
            }
        }

        Duration::ZERO
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Server startups range from a warm restart to a cold dependency compile.
        Self::with_buckets(vec![100, 500, 1_000, 5_000, 15_000, 60_000])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub sessions_started: u64,
    pub start_failures: u64,
    pub restarts: u64,
    pub restart_failures: u64,
    pub sessions_disposed: u64,
    pub teardown_failures: u64,
    pub commands: HashMap<String, CommandMetrics>,
    pub operations: HashMap<String, OperationMetrics>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Sessions: {} started ({} failed), {} restarts ({} failed), {} disposed ({} teardown errors)\n\n",
            self.sessions_started,
            self.start_failures,
            self.restarts,
            self.restart_failures,
            self.sessions_disposed,
            self.teardown_failures
        ));

        if !self.commands.is_empty() {
            report.push_str("Commands:\n");
            for (prefix, metrics) in &self.commands {
                report.push_str(&format!(
                    "  {}: {} calls, {:.1}% success\n",
                    prefix,
                    metrics.invocations,
                    metrics.success_rate() * 100.0
                ));
            }
            report.push('\n');
        }

        if !self.operations.is_empty() {
            report.push_str("Operations:\n");
            for (name, metrics) in &self.operations {
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p90 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.histogram.percentile(90.0)
                ));
            }
        }

        report
    }
}
