//! Thread-safe run metrics
//!
//! Atomic counters for task outcomes and a mutex-protected map of per-purpose
//! LLM call statistics (classification, routing, each processor call).

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// How a task left the task loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    ForcedComplete,
    Failed,
}

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    tasks_fetched: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_forced_complete: AtomicU64,
    tasks_failed: AtomicU64,
    classifications_defaulted: AtomicU64,
    routing_fallbacks: AtomicU64,
    search_calls: AtomicU64,
    search_failures: AtomicU64,
    files_written: AtomicU64,
    file_write_failures: AtomicU64,
    run_started: AtomicU64,

    task_durations: Mutex<Vec<u64>>, // milliseconds
    llm_stats: Mutex<BTreeMap<String, LlmCallStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tasks_fetched: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_forced_complete: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            classifications_defaulted: AtomicU64::new(0),
            routing_fallbacks: AtomicU64::new(0),
            search_calls: AtomicU64::new(0),
            search_failures: AtomicU64::new(0),
            files_written: AtomicU64::new(0),
            file_write_failures: AtomicU64::new(0),
            run_started: AtomicU64::new(current_timestamp()),
            task_durations: Mutex::new(Vec::new()),
            llm_stats: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn run_started(&self) {
        self.run_started
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn tasks_fetched(&self, count: usize) {
        self.tasks_fetched
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn task_finished(&self, outcome: TaskOutcome, duration: Duration) {
        let counter = match outcome {
            TaskOutcome::Completed => &self.tasks_completed,
            TaskOutcome::ForcedComplete => &self.tasks_forced_complete,
            TaskOutcome::Failed => &self.tasks_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut durations) = self.task_durations.lock() {
            durations.push(duration.as_millis() as u64);
        }
    }

    pub fn classification_defaulted(&self) {
        self.classifications_defaulted
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn routing_fallback_used(&self) {
        self.routing_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn search_performed(&self, success: bool) {
        self.search_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.search_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn file_written(&self, success: bool) {
        let counter = if success {
            &self.files_written
        } else {
            &self.file_write_failures
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one logical LLM call (after retries) for the given purpose
    pub fn llm_call(&self, call: LlmCallRecord<'_>) {
        if let Ok(mut stats) = self.llm_stats.lock() {
            let entry = stats
                .entry(call.purpose.to_string())
                .or_insert_with(|| LlmCallStats::new(call.purpose));
            entry.record(&call);
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.tasks_fetched,
            &self.tasks_completed,
            &self.tasks_forced_complete,
            &self.tasks_failed,
            &self.classifications_defaulted,
            &self.routing_fallbacks,
            &self.search_calls,
            &self.search_failures,
            &self.files_written,
            &self.file_write_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.run_started();
        if let Ok(mut durations) = self.task_durations.lock() {
            durations.clear();
        }
        if let Ok(mut stats) = self.llm_stats.lock() {
            stats.clear();
        }
    }

    /// Task duration statistics: (avg, p50, p95)
    fn task_duration_statistics(&self) -> (f64, f64, f64) {
        let Ok(durations) = self.task_durations.lock() else {
            return (0.0, 0.0, 0.0);
        };
        if durations.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut sorted = durations.clone();
        sorted.sort_unstable();
        let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        (avg, percentile(&sorted, 50.0), percentile(&sorted, 95.0))
    }

    fn llm_snapshot(&self) -> LlmMetrics {
        let Ok(stats) = self.llm_stats.lock() else {
            return LlmMetrics::default();
        };

        let by_purpose: Vec<LlmCallStatsSnapshot> =
            stats.values().map(LlmCallStats::snapshot).collect();
        let total_calls = by_purpose.iter().map(|s| s.calls).sum();
        let total_failures = by_purpose.iter().map(|s| s.failures).sum();
        let total_duration_ms = stats.values().map(|s| s.total_duration_ms).sum();

        LlmMetrics {
            total_calls,
            total_failures,
            total_duration_ms,
            by_purpose,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg, p50, p95) = self.task_duration_statistics();

        MetricsSnapshot {
            tasks: TaskMetrics {
                fetched: self.tasks_fetched.load(Ordering::Relaxed),
                completed: self.tasks_completed.load(Ordering::Relaxed),
                forced_complete: self.tasks_forced_complete.load(Ordering::Relaxed),
                failed: self.tasks_failed.load(Ordering::Relaxed),
                classifications_defaulted: self.classifications_defaulted.load(Ordering::Relaxed),
                routing_fallbacks: self.routing_fallbacks.load(Ordering::Relaxed),
                avg_task_time_ms: avg,
                task_time_p50_ms: p50,
                task_time_p95_ms: p95,
            },
            llm: self.llm_snapshot(),
            search: SearchMetrics {
                calls: self.search_calls.load(Ordering::Relaxed),
                failures: self.search_failures.load(Ordering::Relaxed),
            },
            files: FileMetrics {
                written: self.files_written.load(Ordering::Relaxed),
                failed: self.file_write_failures.load(Ordering::Relaxed),
            },
            run_seconds: now.saturating_sub(self.run_started.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// One LLM call as seen by the client
#[derive(Debug, Clone)]
pub struct LlmCallRecord<'a> {
    pub purpose: &'a str,
    pub model: &'a str,
    pub duration: Duration,
    pub prompt_chars: usize,
    pub response_chars: usize,
    pub success: bool,
}

#[derive(Debug)]
struct LlmCallStats {
    purpose: String,
    models: Vec<String>,
    calls: u64,
    failures: u64,
    total_duration_ms: u64,
    prompt_chars: u64,
    response_chars: u64,
}

impl LlmCallStats {
    fn new(purpose: &str) -> Self {
        Self {
            purpose: purpose.to_string(),
            models: Vec::new(),
            calls: 0,
            failures: 0,
            total_duration_ms: 0,
            prompt_chars: 0,
            response_chars: 0,
        }
    }

    fn record(&mut self, call: &LlmCallRecord<'_>) {
        self.calls += 1;
        if !call.success {
            self.failures += 1;
        }
        self.total_duration_ms += call.duration.as_millis() as u64;
        self.prompt_chars += call.prompt_chars as u64;
        self.response_chars += call.response_chars as u64;
        if !self.models.iter().any(|m| m == call.model) {
            self.models.push(call.model.to_string());
        }
    }

    fn snapshot(&self) -> LlmCallStatsSnapshot {
        let avg_duration_ms = if self.calls == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.calls as f64
        };

        LlmCallStatsSnapshot {
            purpose: self.purpose.clone(),
            models: self.models.clone(),
            calls: self.calls,
            failures: self.failures,
            avg_duration_ms,
            prompt_chars: self.prompt_chars,
            response_chars: self.response_chars,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub tasks: TaskMetrics,
    pub llm: LlmMetrics,
    pub search: SearchMetrics,
    pub files: FileMetrics,
    pub run_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct TaskMetrics {
    pub fetched: u64,
    pub completed: u64,
    pub forced_complete: u64,
    pub failed: u64,
    pub classifications_defaulted: u64,
    pub routing_fallbacks: u64,
    pub avg_task_time_ms: f64,
    pub task_time_p50_ms: f64,
    pub task_time_p95_ms: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct LlmMetrics {
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_duration_ms: u64,
    pub by_purpose: Vec<LlmCallStatsSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct LlmCallStatsSnapshot {
    pub purpose: String,
    pub models: Vec<String>,
    pub calls: u64,
    pub failures: u64,
    pub avg_duration_ms: f64,
    pub prompt_chars: u64,
    pub response_chars: u64,
}

#[derive(Debug, Serialize)]
pub struct SearchMetrics {
    pub calls: u64,
    pub failures: u64,
}

#[derive(Debug, Serialize)]
pub struct FileMetrics {
    pub written: u64,
    pub failed: u64,
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = sorted_data[index.floor() as usize] as f64;
    let upper = sorted_data[index.ceil() as usize] as f64;

    lower + (upper - lower) * index.fract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn call(purpose: &str, success: bool, ms: u64) -> LlmCallRecord<'_> {
        LlmCallRecord {
            purpose,
            model: "deepseek-r1:8b",
            duration: Duration::from_millis(ms),
            prompt_chars: 120,
            response_chars: 40,
            success,
        }
    }

    #[test]
    fn test_task_outcomes_are_counted_separately() {
        let collector = MetricsCollector::new();
        collector.tasks_fetched(3);
        collector.task_finished(TaskOutcome::Completed, Duration::from_millis(100));
        collector.task_finished(TaskOutcome::ForcedComplete, Duration::from_millis(300));
        collector.task_finished(TaskOutcome::Failed, Duration::from_millis(200));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.tasks.fetched, 3);
        assert_eq!(snapshot.tasks.completed, 1);
        assert_eq!(snapshot.tasks.forced_complete, 1);
        assert_eq!(snapshot.tasks.failed, 1);
        assert!((snapshot.tasks.avg_task_time_ms - 200.0).abs() < f64::EPSILON);
        assert!((snapshot.tasks.task_time_p50_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_llm_calls_grouped_by_purpose() {
        let collector = MetricsCollector::new();
        collector.llm_call(call("classification", true, 100));
        collector.llm_call(call("classification", false, 300));
        collector.llm_call(call("learning_curriculum", true, 1000));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.llm.total_calls, 3);
        assert_eq!(snapshot.llm.total_failures, 1);
        assert_eq!(snapshot.llm.by_purpose.len(), 2);

        let classification = &snapshot.llm.by_purpose[0];
        assert_eq!(classification.purpose, "classification");
        assert_eq!(classification.calls, 2);
        assert_eq!(classification.failures, 1);
        assert!((classification.avg_duration_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(classification.models, vec!["deepseek-r1:8b".to_string()]);
    }

    #[test]
    fn test_thread_safety() {
        let collector = Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let collector = collector.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        collector.llm_call(call("routing", true, 1));
                        collector.routing_fallback_used();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.llm.total_calls, 400);
        assert_eq!(snapshot.tasks.routing_fallbacks, 400);
    }

    #[test]
    fn test_percentile_calculation() {
        let data = vec![10, 20, 30, 40, 50];
        assert_eq!(percentile(&data, 0.0), 10.0);
        assert_eq!(percentile(&data, 50.0), 30.0);
        assert_eq!(percentile(&data, 100.0), 50.0);
        assert_eq!(percentile(&data, 25.0), 20.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_reset_functionality() {
        let collector = MetricsCollector::new();
        collector.search_performed(false);
        collector.file_written(true);
        collector.classification_defaulted();
        collector.llm_call(call("planning", true, 5));

        collector.reset();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.search.calls, 0);
        assert_eq!(snapshot.search.failures, 0);
        assert_eq!(snapshot.files.written, 0);
        assert_eq!(snapshot.tasks.classifications_defaulted, 0);
        assert_eq!(snapshot.llm.total_calls, 0);
    }
}
