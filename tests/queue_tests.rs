//! Queue and worker pool tests
//!
//! Exercises dispatch ordering, retry semantics, and per-item event
//! guarantees with a scripted processor (no browser involved).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use siteaudit::audit::{PageResult, PageStatus, ResultFactory};
use siteaudit::error::{AuditError, Result};
use siteaudit::queue::{
    AuditQueue, PriorityTable, QueueConfig, QueueEvent, UrlProcessor, WorkStatus,
};
use siteaudit::redirect::{RedirectClassification, RedirectDecision};

type Behavior = dyn Fn(&str, u32) -> Result<PageResult> + Send + Sync;

/// Processor scripted per test; records every (url, attempt) call.
struct ScriptedProcessor {
    calls: Mutex<Vec<(String, u32)>>,
    active: AtomicUsize,
    max_active_seen: AtomicUsize,
    behavior: Box<Behavior>,
}

impl ScriptedProcessor {
    fn new(behavior: impl Fn(&str, u32) -> Result<PageResult> + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active_seen: AtomicUsize::new(0),
            behavior: Box::new(behavior),
        }
    }

    fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

impl UrlProcessor for ScriptedProcessor {
    fn process<'a>(&'a self, url: &'a str, attempt: u32) -> BoxFuture<'a, Result<PageResult>> {
        Box::pin(async move {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active_seen.fetch_max(now_active, Ordering::SeqCst);
            self.calls.lock().unwrap().push((url.to_string(), attempt));

            tokio::time::sleep(Duration::from_millis(5)).await;

            let result = (self.behavior)(url, attempt);
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

fn passed(url: &str) -> Result<PageResult> {
    Ok(ResultFactory::probe_passed(url, 5))
}

fn skipped(url: &str) -> Result<PageResult> {
    Ok(ResultFactory::skipped(
        url,
        5,
        RedirectDecision {
            original_url: url.to_string(),
            final_url: format!("{}/moved", url),
            classification: RedirectClassification::HttpRedirect,
            status_chain: vec![301, 200],
            follow: false,
        },
    ))
}

fn network_error(url: &str) -> Result<PageResult> {
    Err(AuditError::NavigationFailed {
        url: url.to_string(),
        reason: "connection reset".to_string(),
    })
}

fn collect_events(queue: &mut AuditQueue) -> Arc<Mutex<Vec<QueueEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    queue.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

fn urls(paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|p| format!("https://example.com{}", p))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_priority_dispatch_order() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 1,
        ..Default::default()
    });
    let events = collect_events(&mut queue);

    queue.enqueue(
        &urls(&["/blog/a", "/home", "/", "/about", "/blog/b", "/contact"]),
        &PriorityTable,
    );

    let processor = Arc::new(ScriptedProcessor::new(|url, _| passed(url)));
    queue.process(processor).await;

    let started: Vec<String> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            QueueEvent::Started { url, .. } => Some(url.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(
        started,
        urls(&["/home", "/", "/about", "/contact", "/blog/a", "/blog/b"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_records_crashed() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 1,
        max_retries: 2,
        ..Default::default()
    });
    let events = collect_events(&mut queue);
    queue.enqueue(&urls(&["/flaky"]), &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, _| network_error(url)));
    let outcome = queue.process(Arc::clone(&processor)).await;

    // maxRetries=2 means exactly 3 attempts.
    assert_eq!(processor.calls().len(), 3);
    assert_eq!(
        processor.calls().iter().map(|(_, a)| *a).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let item = &outcome.items[0];
    assert_eq!(item.status, WorkStatus::Failed);
    assert_eq!(item.attempts, 3);
    assert!(item.last_error.as_ref().unwrap().contains("connection reset"));

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].status, PageStatus::Crashed);

    let events = events.lock().unwrap();
    let retries = events
        .iter()
        .filter(|e| matches!(e, QueueEvent::Retrying { .. }))
        .count();
    assert_eq!(retries, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, QueueEvent::Failed { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_error_is_not_retried() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 2,
        max_retries: 5,
        ..Default::default()
    });
    queue.enqueue(&urls(&["/bad"]), &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, _| {
        Err(AuditError::ValidationFailed {
            url: url.to_string(),
            reason: "score out of range".to_string(),
        })
    }));
    let outcome = queue.process(Arc::clone(&processor)).await;

    assert_eq!(processor.calls().len(), 1);
    assert_eq!(outcome.items[0].status, WorkStatus::Failed);
    assert_eq!(outcome.items[0].attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_terminal_event_per_item() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 3,
        max_retries: 1,
        ..Default::default()
    });
    let events = collect_events(&mut queue);

    queue.enqueue(
        &urls(&["/a", "/b/x", "/c", "/d/y", "/e", "/f/z", "/g", "/h"]),
        &PriorityTable,
    );

    // Mixed outcomes: skip some, crash some, pass the rest.
    let processor = Arc::new(ScriptedProcessor::new(|url, _| {
        if url.ends_with("/c") || url.ends_with("/g") {
            skipped(url)
        } else if url.contains("/b/") {
            network_error(url)
        } else {
            passed(url)
        }
    }));
    let outcome = queue.process(processor).await;

    assert_eq!(outcome.results.len(), 8);

    let mut terminals: HashMap<u64, usize> = HashMap::new();
    for event in events.lock().unwrap().iter() {
        let id = match event {
            QueueEvent::Completed { id, .. }
            | QueueEvent::Failed { id, .. }
            | QueueEvent::Skipped { id, .. } => *id,
            _ => continue,
        };
        *terminals.entry(id).or_default() += 1;
    }

    assert_eq!(terminals.len(), 8);
    assert!(terminals.values().all(|&count| count == 1));

    // Work items all reached a terminal status too.
    assert!(outcome.items.iter().all(|item| item.status.is_terminal()));
}

#[tokio::test(start_paused = true)]
async fn test_per_item_event_order() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 2,
        max_retries: 1,
        ..Default::default()
    });
    let events = collect_events(&mut queue);
    queue.enqueue(&urls(&["/flaky", "/ok"]), &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, attempt| {
        if url.ends_with("/flaky") && attempt == 1 {
            network_error(url)
        } else {
            passed(url)
        }
    }));
    queue.process(processor).await;

    // Per item: Started first, Retrying in between, terminal last.
    let mut order: HashMap<u64, Vec<&'static str>> = HashMap::new();
    for event in events.lock().unwrap().iter() {
        match event {
            QueueEvent::Started { id, .. } => order.entry(*id).or_default().push("started"),
            QueueEvent::Retrying { id, .. } => order.entry(*id).or_default().push("retrying"),
            QueueEvent::Completed { id, .. } => order.entry(*id).or_default().push("completed"),
            QueueEvent::Failed { id, .. } => order.entry(*id).or_default().push("failed"),
            QueueEvent::Skipped { id, .. } => order.entry(*id).or_default().push("skipped"),
            QueueEvent::Progress(_) => {}
        }
    }

    for sequence in order.values() {
        assert_eq!(sequence[0], "started");
        let terminal = sequence.last().unwrap();
        assert!(matches!(*terminal, "completed" | "failed" | "skipped"));
        // Nothing after the terminal, nothing before started.
        assert_eq!(
            sequence
                .iter()
                .filter(|s| matches!(**s, "completed" | "failed" | "skipped"))
                .count(),
            1
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_sequential_processing_never_overlaps() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 1,
        ..Default::default()
    });
    queue.enqueue(&urls(&["/a", "/b", "/c", "/d"]), &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, _| passed(url)));
    queue.process(Arc::clone(&processor)).await;

    assert_eq!(processor.max_active_seen.load(Ordering::SeqCst), 1);
    assert_eq!(processor.calls().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_cap_respected() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 3,
        ..Default::default()
    });
    let many: Vec<String> = (0..20).map(|i| format!("https://example.com/p/{}", i)).collect();
    queue.enqueue(&many, &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, _| passed(url)));
    queue.process(Arc::clone(&processor)).await;

    assert!(processor.max_active_seen.load(Ordering::SeqCst) <= 3);
    assert_eq!(processor.calls().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_empty_queue_completes_with_zero_counts() {
    let mut queue = AuditQueue::new(QueueConfig::default());
    let processor = Arc::new(ScriptedProcessor::new(|url, _| passed(url)));
    let outcome = queue.process(processor).await;

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.statistics.total, 0);
    assert_eq!(outcome.statistics.completed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_skipped_results_emit_skipped_events() {
    let mut queue = AuditQueue::new(QueueConfig::default());
    let events = collect_events(&mut queue);
    queue.enqueue(&urls(&["/moved"]), &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, _| skipped(url)));
    let outcome = queue.process(processor).await;

    assert_eq!(outcome.items[0].status, WorkStatus::Skipped);
    assert_eq!(outcome.results[0].status, PageStatus::Skipped);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, QueueEvent::Skipped { .. })));
    assert_eq!(outcome.statistics.skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_fails_pending_and_finishes_in_flight() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 1,
        ..Default::default()
    })
    .with_cancellation(Arc::clone(&flag));
    queue.enqueue(&urls(&["/a", "/b", "/c"]), &PriorityTable);

    // The first in-flight item requests cancellation; it still completes.
    let cancel = Arc::clone(&flag);
    let processor = Arc::new(ScriptedProcessor::new(move |url, _| {
        cancel.store(true, Ordering::SeqCst);
        passed(url)
    }));
    let outcome = queue.process(processor).await;

    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.items.iter().all(|item| item.status.is_terminal()));
    let completed = outcome
        .items
        .iter()
        .filter(|i| i.status == WorkStatus::Completed)
        .count();
    let failed = outcome
        .items
        .iter()
        .filter(|i| i.status == WorkStatus::Failed)
        .count();
    assert_eq!(completed, 1);
    assert_eq!(failed, 2);
    assert!(outcome
        .items
        .iter()
        .filter(|i| i.status == WorkStatus::Failed)
        .all(|i| i.last_error.as_deref() == Some("run cancelled")));
}

#[tokio::test(start_paused = true)]
async fn test_progress_snapshots_count_up() {
    let mut queue = AuditQueue::new(QueueConfig {
        max_concurrent: 2,
        ..Default::default()
    });
    let events = collect_events(&mut queue);
    queue.enqueue(&urls(&["/a", "/b", "/c"]), &PriorityTable);

    let processor = Arc::new(ScriptedProcessor::new(|url, _| passed(url)));
    queue.process(processor).await;

    let snapshots: Vec<(usize, usize)> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            QueueEvent::Progress(p) => Some((p.completed, p.total)),
            _ => None,
        })
        .collect();

    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots.last().unwrap(), &(3, 3));
    assert!(snapshots.windows(2).all(|w| w[0].0 < w[1].0));
}
