//! # Worker Pool Module
//!
//! Runs a [`Dispatcher`] on a fixed set of `may` coroutines so a transport
//! can hand requests off its accept loop and wait for the response.
//!
//! ## Features
//!
//! - **Shared queue**: every worker receives from one channel, so load
//!   balances itself
//! - **Bounded admission**: at most `queue_bound` requests are queued or
//!   running at once
//! - **Backpressure**: `block` waits up to `backpressure_timeout_ms` for a
//!   slot before shedding, `shed` answers `503` with `Retry-After` at once
//! - **Metrics**: dispatched, completed and shed counts plus queue depth
//!
//! ## Configuration
//!
//! Settings live under `[worker_pool]` in the runtime config and can be
//! overridden with `JAXR_HANDLER_WORKERS`, `JAXR_HANDLER_QUEUE_BOUND`,
//! `JAXR_BACKPRESSURE_MODE`, `JAXR_BACKPRESSURE_TIMEOUT_MS` and
//! `JAXR_STACK_SIZE`. See [`crate::runtime_config`].

use crate::dispatcher::Dispatcher;
use crate::ids::RequestId;
use crate::server::{Request, ServerResponse};
use http::header::{HeaderValue, CONTENT_LENGTH, RETRY_AFTER};
use http::StatusCode;
use may::sync::mpsc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What to do with a request when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressureMode {
    /// Wait for a free slot up to the configured timeout, then shed
    #[default]
    Block,
    /// Answer `503 Service Unavailable` immediately
    Shed,
}

impl BackpressureMode {
    /// Parse backpressure mode from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "block" => Some(Self::Block),
            "shed" => Some(Self::Shed),
            _ => None,
        }
    }
}

/// Configuration for a worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines
    pub num_workers: usize,
    /// Maximum number of queued or running requests
    pub queue_bound: usize,
    /// Backpressure mode
    pub backpressure_mode: BackpressureMode,
    /// Timeout for block mode in milliseconds
    pub backpressure_timeout_ms: u64,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    /// Create a custom configuration
    #[must_use]
    pub fn new(
        num_workers: usize,
        queue_bound: usize,
        backpressure_mode: BackpressureMode,
        backpressure_timeout_ms: u64,
        stack_size: usize,
    ) -> Self {
        Self {
            num_workers,
            queue_bound,
            backpressure_mode,
            backpressure_timeout_ms,
            stack_size,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_bound: 1024,
            backpressure_mode: BackpressureMode::Block,
            backpressure_timeout_ms: 50,
            stack_size: 0x10000, // 64KB
        }
    }
}

/// Metrics for a worker pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    shed_count: AtomicU64,
    queue_depth: AtomicUsize,
    dispatched_count: AtomicU64,
    completed_count: AtomicU64,
}

/// Point-in-time copy of [`WorkerPoolMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub shed: u64,
    pub queue_depth: usize,
}

impl WorkerPoolMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a queue slot when fewer than `bound` are in use.
    fn try_reserve(&self, bound: usize) -> bool {
        self.queue_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                (depth < bound).then_some(depth + 1)
            })
            .is_ok()
    }

    fn release_slot(&self) {
        self.queue_depth.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn record_shed(&self) {
        self.shed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get_shed_count(&self) -> u64 {
        self.shed_count.load(Ordering::Relaxed)
    }

    /// Requests currently queued or running.
    #[must_use]
    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.get_dispatched_count(),
            completed: self.get_completed_count(),
            shed: self.get_shed_count(),
            queue_depth: self.get_queue_depth(),
        }
    }
}

struct Job {
    request: Request,
    reply: mpsc::Sender<ServerResponse>,
}

/// Fixed pool of dispatcher coroutines behind a bounded queue.
///
/// Clones share the same workers, queue and metrics.
#[derive(Clone)]
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: mpsc::Sender<Job>,
    metrics: Arc<WorkerPoolMetrics>,
}

impl WorkerPool {
    /// Spawn `config.num_workers` coroutines that dispatch queued requests.
    ///
    /// # Safety
    ///
    /// Spawns coroutines with `may::coroutine::Builder::spawn()`, which is
    /// unsafe in the `may` runtime. Resource methods run on these coroutines
    /// and must not block the carrier thread with thread-local state.
    pub unsafe fn new(dispatcher: Dispatcher, config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(rx);
        let metrics = Arc::new(WorkerPoolMetrics::new());

        info!(
            num_workers = config.num_workers,
            queue_bound = config.queue_bound,
            backpressure_mode = ?config.backpressure_mode,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        for worker_id in 0..config.num_workers {
            let rx = Arc::clone(&rx);
            let dispatcher = dispatcher.clone();
            let metrics = Arc::clone(&metrics);

            let spawn_result = may::coroutine::Builder::new()
                .stack_size(config.stack_size)
                .spawn(move || {
                    debug!(worker_id, "Worker coroutine started");
                    while let Ok(job) = rx.recv() {
                        let response = run_job(&dispatcher, job.request, worker_id);
                        metrics.release_slot();
                        metrics.record_completion();
                        // The caller may have gone away; nothing to do then.
                        let _ = job.reply.send(response);
                    }
                    debug!(worker_id, "Worker coroutine exiting");
                });

            if let Err(e) = spawn_result {
                error!(worker_id, error = %e, "Failed to spawn worker coroutine");
            }
        }

        Self {
            config,
            sender: tx,
            metrics,
        }
    }

    /// Queue `request` and wait for its response.
    ///
    /// Returns `503` with `Retry-After` when no slot frees up in time or the
    /// workers are gone.
    pub fn dispatch(&self, request: Request) -> ServerResponse {
        if !self.admit() {
            self.metrics.record_shed();
            warn!(
                path = %request.path(),
                queue_depth = self.metrics.get_queue_depth(),
                mode = ?self.config.backpressure_mode,
                "Worker pool full, shedding request"
            );
            return self.unavailable();
        }

        self.metrics.record_dispatch();
        let (reply, response) = mpsc::channel();
        if let Err(e) = self.sender.send(Job { request, reply }) {
            self.metrics.release_slot();
            error!(error = %e, "Worker pool channel disconnected");
            return self.unavailable();
        }

        match response.recv() {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Worker dropped the reply channel");
                self.unavailable()
            }
        }
    }

    fn admit(&self) -> bool {
        let bound = self.config.queue_bound;
        if self.metrics.try_reserve(bound) {
            return true;
        }
        if self.config.backpressure_mode == BackpressureMode::Shed {
            return false;
        }
        let deadline = Instant::now() + Duration::from_millis(self.config.backpressure_timeout_ms);
        while Instant::now() < deadline {
            may::coroutine::sleep(Duration::from_millis(1));
            if self.metrics.try_reserve(bound) {
                return true;
            }
        }
        false
    }

    fn unavailable(&self) -> ServerResponse {
        let retry_after = self.config.backpressure_timeout_ms.div_ceil(1000).max(1);
        let mut response = ServerResponse::new(StatusCode::SERVICE_UNAVAILABLE);
        response
            .headers
            .insert(RETRY_AFTER, HeaderValue::from(retry_after));
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        response
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

fn run_job(dispatcher: &Dispatcher, request: Request, worker_id: usize) -> ServerResponse {
    let request_id = RequestId::from_header_or_new(request.header("x-request-id"));
    debug!(%request_id, worker_id, path = %request.path(), "Worker processing request");
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dispatcher.dispatch(request))) {
        Ok(response) => response,
        Err(panic) => {
            error!(%request_id, worker_id, panic_message = ?panic, "Dispatch panicked");
            let mut response = ServerResponse::new(StatusCode::INTERNAL_SERVER_ERROR);
            response
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_mode_from_str() {
        assert_eq!(
            BackpressureMode::from_str("block"),
            Some(BackpressureMode::Block)
        );
        assert_eq!(
            BackpressureMode::from_str("BLOCK"),
            Some(BackpressureMode::Block)
        );
        assert_eq!(
            BackpressureMode::from_str("Shed"),
            Some(BackpressureMode::Shed)
        );
        assert_eq!(BackpressureMode::from_str("invalid"), None);
    }

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.queue_bound, 1024);
        assert_eq!(config.backpressure_mode, BackpressureMode::Block);
        assert_eq!(config.backpressure_timeout_ms, 50);
        assert_eq!(config.stack_size, 0x10000);
    }

    #[test]
    fn test_config_deserializes_lowercase_mode() {
        let config: WorkerPoolConfig =
            toml::from_str("backpressure_mode = \"shed\"\nqueue_bound = 8").unwrap();
        assert_eq!(config.backpressure_mode, BackpressureMode::Shed);
        assert_eq!(config.queue_bound, 8);
        assert_eq!(config.num_workers, 4);
    }

    #[test]
    fn test_worker_pool_metrics() {
        let metrics = WorkerPoolMetrics::new();
        assert_eq!(metrics.snapshot().queue_depth, 0);

        assert!(metrics.try_reserve(1));
        assert!(!metrics.try_reserve(1));
        metrics.record_dispatch();
        assert_eq!(metrics.get_queue_depth(), 1);
        assert_eq!(metrics.get_dispatched_count(), 1);

        metrics.release_slot();
        metrics.record_completion();
        metrics.record_shed();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                dispatched: 1,
                completed: 1,
                shed: 1,
                queue_depth: 0
            }
        );
    }
}
