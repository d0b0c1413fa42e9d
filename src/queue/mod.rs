//! URL queue and worker pool
//!
//! Owns the work items for a run and drives them through a processor under
//! a concurrency cap. The dispatcher is the single writer of item state
//! and the only invoker of event subscribers; workers report back over a
//! channel. Transient failures retry with exponential backoff; every item
//! ends in exactly one terminal state.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::audit::result::{PageResult, PageStatus, ResultFactory};
use crate::backpressure::BackpressureController;
use crate::error::Result;

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum workers running at once
    pub max_concurrent: usize,
    /// Retries per item for transient failures
    pub max_retries: u32,
    /// First retry backoff; doubles per attempt
    pub base_retry_delay: Duration,
    /// Backoff cap
    pub max_retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_retries: 2,
            base_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

/// Lifecycle state of one work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkStatus {
    Pending,
    InFlight,
    Retrying,
    Completed,
    Failed,
    Skipped,
}

impl WorkStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkStatus::Completed | WorkStatus::Failed | WorkStatus::Skipped
        )
    }
}

/// One URL's lifecycle record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub url: String,
    pub priority: u8,
    pub status: WorkStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Resolves a URL to its dispatch priority: home pages first, then
/// top-level landing pages, then deeper content, then everything else.
/// Ties break FIFO on insertion order.
#[derive(Debug, Clone, Default)]
pub struct PriorityTable;

impl PriorityTable {
    pub const HOME: u8 = 100;
    pub const LANDING: u8 = 80;
    pub const CONTENT: u8 = 60;
    pub const OTHER: u8 = 40;

    pub fn classify(&self, url: &str) -> u8 {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            // Bare paths are accepted as-is.
            Err(_) if url.starts_with('/') => url.to_string(),
            Err(_) => return Self::OTHER,
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Self::HOME,
            [first] if *first == "home" || *first == "index" => Self::HOME,
            [_] => Self::LANDING,
            _ => Self::CONTENT,
        }
    }
}

/// Events emitted per item, strictly ordered within an item:
/// `Started → Retrying* → exactly one of Completed | Failed | Skipped`.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Started {
        id: u64,
        url: String,
    },
    Retrying {
        id: u64,
        url: String,
        attempt: u32,
        delay_ms: u64,
    },
    Completed {
        id: u64,
        url: String,
    },
    Failed {
        id: u64,
        url: String,
        reason: String,
    },
    Skipped {
        id: u64,
        url: String,
    },
    Progress(ProgressSnapshot),
}

/// Periodic progress information
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    pub eta_secs: f64,
    pub active_workers: usize,
}

/// Subscriber invoked serially by the dispatcher.
pub type EventSubscriber = Box<dyn Fn(&QueueEvent) + Send + Sync>;

/// The audit work a queue drives for each URL.
///
/// `attempt` is 1-based. A transient error (see
/// [`AuditError::is_transient`](crate::error::AuditError::is_transient))
/// triggers a retry; anything else is terminal for the item.
pub trait UrlProcessor: Send + Sync {
    fn process<'a>(&'a self, url: &'a str, attempt: u32) -> BoxFuture<'a, Result<PageResult>>;
}

/// Outcome of a whole queue run
#[derive(Debug)]
pub struct QueueResults {
    /// Page results in completion order (one per enqueued item)
    pub results: Vec<PageResult>,
    /// Final work item records
    pub items: Vec<WorkItem>,
    /// Run statistics
    pub statistics: QueueStatistics,
}

/// Statistics for one queue run
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStatistics {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: u64,
    pub average_item_ms: u64,
}

/// Pending heap entry: higher priority first, then insertion order.
struct PendingRef {
    priority: u8,
    seq: u64,
    index: usize,
}

impl PartialEq for PendingRef {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for PendingRef {}
impl PartialOrd for PendingRef {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for PendingRef {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// What a worker sends back mid-flight.
enum WorkerMessage {
    Retrying {
        index: usize,
        attempt: u32,
        delay_ms: u64,
    },
}

/// A worker's final word on its item.
struct WorkerDone {
    index: usize,
    attempts: u32,
    outcome: Result<PageResult>,
    duration: Duration,
}

/// The URL queue. Single-writer: only [`process`](AuditQueue::process)
/// mutates items once dispatch begins.
pub struct AuditQueue {
    config: QueueConfig,
    items: Vec<WorkItem>,
    pending: BinaryHeap<PendingRef>,
    subscribers: Vec<EventSubscriber>,
    backpressure: Option<Arc<BackpressureController>>,
    cancelled: Option<Arc<AtomicBool>>,
    next_id: u64,
}

impl AuditQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
            pending: BinaryHeap::new(),
            subscribers: Vec::new(),
            backpressure: None,
            cancelled: None,
            next_id: 1,
        }
    }

    /// Let the backpressure controller advise dispatch pacing.
    pub fn with_backpressure(mut self, controller: Arc<BackpressureController>) -> Self {
        self.backpressure = Some(controller);
        self
    }

    /// A flag that, once set, stops new dispatches; in-flight items run to
    /// completion and pending items are recorded as failed.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    /// Register an event subscriber. Subscribers run on the dispatcher,
    /// one event at a time.
    pub fn subscribe(&mut self, subscriber: impl Fn(&QueueEvent) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Add URLs as pending work items with computed priorities.
    pub fn enqueue(&mut self, urls: &[String], table: &PriorityTable) {
        for url in urls {
            let id = self.next_id;
            self.next_id += 1;
            let priority = table.classify(url);
            let index = self.items.len();
            self.items.push(WorkItem {
                id,
                url: url.clone(),
                priority,
                status: WorkStatus::Pending,
                attempts: 0,
                created_at: Utc::now(),
                started_at: None,
                finished_at: None,
                last_error: None,
            });
            self.pending.push(PendingRef {
                priority,
                seq: id,
                index,
            });
        }
        if let Some(bp) = &self.backpressure {
            bp.note_queue_len(self.pending.len());
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn emit(&self, event: QueueEvent) {
        for subscriber in &self.subscribers {
            subscriber(&event);
        }
    }

    /// Drive every pending item to a terminal state.
    pub async fn process<P>(&mut self, processor: Arc<P>) -> QueueResults
    where
        P: UrlProcessor + 'static,
    {
        let run_start = Instant::now();
        let total = self.items.len();
        let mut results: Vec<PageResult> = Vec::with_capacity(total);
        let mut join_set: JoinSet<WorkerDone> = JoinSet::new();
        let (worker_tx, mut worker_rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let mut active = 0usize;
        let mut finished = 0usize;
        let mut duration_ema_ms = 0.0f64;

        info!(
            "Processing {} items with {} workers",
            total, self.config.max_concurrent
        );

        loop {
            // A cancelled run or unrelieved critical pressure ends the run
            // gracefully: pending items fail, in-flight items finish.
            if !self.pending.is_empty() {
                if self.cancelled.as_ref().is_some_and(|c| c.load(Ordering::SeqCst)) {
                    self.abort_pending("run cancelled", &mut results);
                } else if self.backpressure.as_ref().is_some_and(|bp| bp.should_abort()) {
                    self.abort_pending("critical resource pressure unrelieved", &mut results);
                }
            }

            // Dispatch up to the concurrency cap, pacing by backpressure.
            while active < self.config.max_concurrent && !self.pending.is_empty() {
                if let Some(bp) = &self.backpressure {
                    let delay = bp.current_delay();
                    if !delay.is_zero() {
                        debug!("Backpressure delay {:?} before dispatch", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
                let Some(next) = self.pending.pop() else { break };
                let item = &mut self.items[next.index];
                item.status = WorkStatus::InFlight;
                item.started_at = Some(Utc::now());
                item.attempts = 1;
                let (id, url) = (item.id, item.url.clone());
                self.emit(QueueEvent::Started {
                    id,
                    url: url.clone(),
                });

                let processor = Arc::clone(&processor);
                let config = self.config.clone();
                let tx = worker_tx.clone();
                let index = next.index;
                join_set.spawn(async move {
                    run_item(processor, index, url, config, tx).await
                });
                active += 1;

                if let Some(bp) = &self.backpressure {
                    bp.note_queue_len(self.pending.len());
                }
            }

            if active == 0 {
                break;
            }

            tokio::select! {
                biased;
                Some(message) = worker_rx.recv() => {
                    self.handle_worker_message(message);
                }
                Some(joined) = join_set.join_next() => {
                    active -= 1;
                    finished += 1;
                    match joined {
                        Ok(done) => {
                            duration_ema_ms = if finished == 1 {
                                done.duration.as_millis() as f64
                            } else {
                                0.7 * duration_ema_ms + 0.3 * done.duration.as_millis() as f64
                            };
                            let result = self.finalize(done);
                            results.push(result);
                        }
                        Err(join_err) => {
                            // A panicked worker still must not lose its item;
                            // there is no index though, so log loudly.
                            warn!("Worker task panicked: {}", join_err);
                        }
                    }
                    let remaining = total - finished;
                    let eta_secs = if self.config.max_concurrent > 0 {
                        duration_ema_ms * remaining as f64
                            / (1000.0 * self.config.max_concurrent as f64)
                    } else {
                        0.0
                    };
                    self.emit(QueueEvent::Progress(ProgressSnapshot {
                        completed: finished,
                        total,
                        percentage: if total > 0 {
                            finished as f64 * 100.0 / total as f64
                        } else {
                            100.0
                        },
                        eta_secs,
                        active_workers: active,
                    }));
                }
            }
        }

        // Late messages from workers that finished in the last round.
        while let Ok(message) = worker_rx.try_recv() {
            self.handle_worker_message(message);
        }

        let statistics = QueueStatistics {
            total,
            completed: results
                .iter()
                .filter(|r| matches!(r.status, PageStatus::Passed | PageStatus::Failed))
                .count(),
            failed: results
                .iter()
                .filter(|r| r.status == PageStatus::Crashed)
                .count(),
            skipped: results
                .iter()
                .filter(|r| r.status == PageStatus::Skipped)
                .count(),
            total_duration_ms: run_start.elapsed().as_millis() as u64,
            average_item_ms: duration_ema_ms as u64,
        };

        info!(
            "Queue finished: {}/{} analyzed, {} crashed, {} skipped in {} ms",
            statistics.completed,
            total,
            statistics.failed,
            statistics.skipped,
            statistics.total_duration_ms
        );

        QueueResults {
            results,
            items: self.items.clone(),
            statistics,
        }
    }

    /// Fail every pending item without dispatching it. In-flight items
    /// are untouched; each aborted item still gets exactly one terminal
    /// event and a crashed result so the summary stays consistent.
    fn abort_pending(&mut self, reason: &str, results: &mut Vec<PageResult>) {
        warn!("Aborting {} pending items: {}", self.pending.len(), reason);
        while let Some(next) = self.pending.pop() {
            let item = &mut self.items[next.index];
            item.status = WorkStatus::Failed;
            item.finished_at = Some(Utc::now());
            item.last_error = Some(reason.to_string());
            let (id, url) = (item.id, item.url.clone());
            results.push(ResultFactory::crashed(&url, 0, reason));
            self.emit(QueueEvent::Failed {
                id,
                url,
                reason: reason.to_string(),
            });
        }
        if let Some(bp) = &self.backpressure {
            bp.note_queue_len(0);
        }
    }

    fn handle_worker_message(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Retrying {
                index,
                attempt,
                delay_ms,
            } => {
                let item = &mut self.items[index];
                item.status = WorkStatus::Retrying;
                item.attempts = attempt;
                let (id, url) = (item.id, item.url.clone());
                self.emit(QueueEvent::Retrying {
                    id,
                    url,
                    attempt,
                    delay_ms,
                });
            }
        }
    }

    /// Record a worker's terminal outcome. The work item mirrors the page
    /// result's terminal status; processor errors become crashed results.
    fn finalize(&mut self, done: WorkerDone) -> PageResult {
        let item = &mut self.items[done.index];
        item.attempts = done.attempts;
        item.finished_at = Some(Utc::now());
        let (id, url) = (item.id, item.url.clone());

        let result = match done.outcome {
            Ok(result) => result,
            Err(e) => {
                item.last_error = Some(e.to_string());
                ResultFactory::crashed(&url, done.duration.as_millis() as u64, &e.to_string())
            }
        };

        match result.status {
            PageStatus::Skipped => {
                item.status = WorkStatus::Skipped;
                self.emit(QueueEvent::Skipped { id, url });
            }
            PageStatus::Crashed => {
                item.status = WorkStatus::Failed;
                let reason = item
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "analysis crashed".to_string());
                if let Some(bp) = &self.backpressure {
                    bp.note_item(true);
                }
                self.emit(QueueEvent::Failed { id, url, reason });
                return result;
            }
            PageStatus::Passed | PageStatus::Failed => {
                item.status = WorkStatus::Completed;
                self.emit(QueueEvent::Completed { id, url });
            }
        }
        if let Some(bp) = &self.backpressure {
            bp.note_item(false);
        }
        result
    }
}

/// One item's attempt loop, run on a worker task. Retries transient
/// failures with capped exponential backoff; each attempt gets a fresh
/// lease from whatever the processor acquires internally.
async fn run_item<P: UrlProcessor>(
    processor: Arc<P>,
    index: usize,
    url: String,
    config: QueueConfig,
    tx: mpsc::UnboundedSender<WorkerMessage>,
) -> WorkerDone {
    let started = Instant::now();
    let mut attempt = 1u32;

    loop {
        match processor.process(&url, attempt).await {
            Ok(result) => {
                return WorkerDone {
                    index,
                    attempts: attempt,
                    outcome: Ok(result),
                    duration: started.elapsed(),
                };
            }
            Err(e) if e.is_transient() && attempt <= config.max_retries => {
                let exponent = (attempt - 1).min(16);
                let delay = config
                    .base_retry_delay
                    .saturating_mul(1u32 << exponent)
                    .min(config.max_retry_delay);
                debug!(
                    "Transient failure for {} (attempt {}): {}; retrying in {:?}",
                    url, attempt, e, delay
                );
                attempt += 1;
                let _ = tx.send(WorkerMessage::Retrying {
                    index,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                });
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return WorkerDone {
                    index,
                    attempts: attempt,
                    outcome: Err(e),
                    duration: started.elapsed(),
                };
            }
        }
    }
}
