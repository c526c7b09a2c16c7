//! In-memory generation statistics
//!
//! A [`GenerationMetrics`] store is created once and shared by handle with
//! everything that records outcomes. Counters are atomic; the recent log
//! and per-template timings sit behind mutexes.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Number of generation attempts kept in the recent log
pub const RECENT_CAPACITY: usize = 10;

/// One generation attempt
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationLogEntry {
    /// UUIDv7, time-sortable
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub template: String,
    pub success: bool,
    pub message: String,
    pub duration_ms: u64,
}

/// Aggregated render timings for one template
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTiming {
    pub renders: u64,
    pub failures: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

impl TemplateTiming {
    pub fn average_ms(&self) -> f64 {
        let attempts = self.renders + self.failures;
        if attempts == 0 {
            0.0
        } else {
            self.total_ms as f64 / attempts as f64
        }
    }

    fn record(&mut self, success: bool, duration_ms: u64) {
        if success {
            self.renders += 1;
        } else {
            self.failures += 1;
        }
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecentSnapshot {
    /// Oldest first
    pub entries: Vec<GenerationLogEntry>,
    pub last_success: Option<OffsetDateTime>,
    pub last_status: Option<String>,
}

#[derive(Debug, Default)]
struct LastStatus {
    last_success: Option<OffsetDateTime>,
    last_status: Option<String>,
}

#[derive(Debug)]
pub struct GenerationMetrics {
    generated: AtomicU64,
    errors: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    status: Mutex<LastStatus>,
    recent: Mutex<VecDeque<GenerationLogEntry>>,
    timings: Mutex<HashMap<String, TemplateTiming>>,
    created: Instant,
}

impl GenerationMetrics {
    pub fn new() -> Self {
        Self {
            generated: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            status: Mutex::new(LastStatus::default()),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY + 1)),
            timings: Mutex::new(HashMap::new()),
            created: Instant::now(),
        }
    }

    /// Count a request entering the pipeline
    pub fn request_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful generation and return its log entry
    pub fn record_success(
        &self,
        template: &str,
        duration: Duration,
        message: impl Into<String>,
    ) -> GenerationLogEntry {
        self.generated.fetch_add(1, Ordering::Relaxed);
        self.finish(template, true, duration, message.into())
    }

    /// Record a failed generation and return its log entry
    pub fn record_failure(
        &self,
        template: &str,
        duration: Duration,
        message: impl Into<String>,
    ) -> GenerationLogEntry {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.finish(template, false, duration, message.into())
    }

    fn finish(&self, template: &str, success: bool, duration: Duration, message: String) -> GenerationLogEntry {
        self.completed.fetch_add(1, Ordering::Relaxed);
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

        let entry = GenerationLogEntry {
            id: Uuid::now_v7().to_string(),
            timestamp: OffsetDateTime::now_utc(),
            template: template.to_string(),
            success,
            message,
            duration_ms,
        };

        {
            // The last status always describes the newest log entry
            let mut recent = lock(&self.recent);
            let mut status = lock(&self.status);
            if success {
                status.last_success = Some(entry.timestamp);
                status.last_status = Some(format!("Success: {}", entry.message));
            } else {
                status.last_status = Some(format!("Failed: {}", entry.message));
            }
            recent.push_back(entry.clone());
            while recent.len() > RECENT_CAPACITY {
                recent.pop_front();
            }
        }

        lock(&self.timings)
            .entry(template.to_string())
            .or_default()
            .record(success, duration_ms);

        entry
    }

    pub fn pdfs_generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn errors_logged(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn requests_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn requests_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> u64 {
        self.requests_started()
            .saturating_sub(self.requests_completed())
    }

    pub fn last_generation_time(&self) -> Option<OffsetDateTime> {
        lock(&self.status).last_success
    }

    pub fn last_generation_status(&self) -> Option<String> {
        lock(&self.status).last_status.clone()
    }

    /// The most recent attempts, oldest first
    pub fn recent(&self) -> Vec<GenerationLogEntry> {
        lock(&self.recent).iter().cloned().collect()
    }

    /// Recent log and last status, read together so they agree
    pub fn recent_snapshot(&self) -> RecentSnapshot {
        let recent = lock(&self.recent);
        let status = lock(&self.status);
        RecentSnapshot {
            entries: recent.iter().cloned().collect(),
            last_success: status.last_success,
            last_status: status.last_status.clone(),
        }
    }

    pub fn template_timings(&self) -> BTreeMap<String, TemplateTiming> {
        lock(&self.timings)
            .iter()
            .map(|(template, timing)| (template.clone(), timing.clone()))
            .collect()
    }

    pub fn uptime(&self) -> Duration {
        self.created.elapsed()
    }
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// A panic while holding one of these locks cannot leave the data half-written
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn recent_log_keeps_the_last_ten_in_order() {
        let metrics = GenerationMetrics::new();
        for i in 0..25 {
            metrics.record_success("Invoice", Duration::from_millis(i), format!("attempt {i}"));
        }

        let recent = metrics.recent();
        assert_eq!(recent.len(), RECENT_CAPACITY);
        let messages: Vec<&str> = recent.iter().map(|e| e.message.as_str()).collect();
        let expected: Vec<String> = (15..25).map(|i| format!("attempt {i}")).collect();
        assert_eq!(messages, expected);
        assert!(recent.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn success_and_failure_update_separate_counters() {
        let metrics = GenerationMetrics::new();
        metrics.request_started();
        metrics.request_started();
        metrics.record_success("Invoice", Duration::from_millis(40), "ok");
        assert_eq!(metrics.in_flight(), 1);
        metrics.record_failure("Receipt", Duration::from_millis(10), "boom");

        assert_eq!(metrics.pdfs_generated(), 1);
        assert_eq!(metrics.errors_logged(), 1);
        assert_eq!(metrics.in_flight(), 0);
        assert!(metrics.last_generation_time().is_some());
        assert_eq!(metrics.last_generation_status().as_deref(), Some("Failed: boom"));

        let timings = metrics.template_timings();
        assert_eq!(timings["Invoice"].renders, 1);
        assert_eq!(timings["Invoice"].max_ms, 40);
        assert_eq!(timings["Receipt"].failures, 1);
        assert_eq!(timings["Receipt"].average_ms(), 10.0);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let metrics = Arc::new(GenerationMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..50 {
                        metrics.record_success("Invoice", Duration::ZERO, "ok");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.pdfs_generated(), 400);
        assert_eq!(metrics.recent().len(), RECENT_CAPACITY);
        assert_eq!(metrics.template_timings()["Invoice"].renders, 400);
    }

    #[test]
    fn last_status_agrees_with_newest_entry_under_contention() {
        let metrics = Arc::new(GenerationMetrics::new());
        let writers: Vec<_> = (0..4)
            .map(|worker| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for i in 0..200 {
                        let message = format!("worker {worker} attempt {i}");
                        if (worker + i) % 2 == 0 {
                            metrics.record_success("Invoice", Duration::ZERO, message);
                        } else {
                            metrics.record_failure("Invoice", Duration::ZERO, message);
                        }
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let snapshot = metrics.recent_snapshot();
            if let Some(newest) = snapshot.entries.last() {
                let prefix = if newest.success { "Success" } else { "Failed" };
                assert_eq!(
                    snapshot.last_status,
                    Some(format!("{prefix}: {}", newest.message))
                );
            }
        }
        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = metrics.recent_snapshot();
        let newest = snapshot.entries.last().unwrap();
        assert!(snapshot.last_status.unwrap().ends_with(&newest.message));
    }
}
