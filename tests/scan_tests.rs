//! End-to-end scan tests against in-memory graph and feed clients.

mod common;

use chrono::TimeDelta;
use common::{FakeFeed, FakeGraph, Reply, Script, days_ago, members};
use ghostscan::engine::progress::ProgressRelay;
use ghostscan::pipeline::{EnumOutcome, EnumerationTarget, GraphEnumerator};
use ghostscan::{
    ActivityStatus, CancelToken, ClientError, DaysInactive, Direction, EdgePage, ProgressEvent,
    ProgressSink, RetryPolicy, ScanOpts, scan,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn fast_opts() -> ScanOpts {
    ScanOpts {
        probe_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: 2,
            backoff_base: Duration::from_millis(1),
            backoff_max: Duration::from_millis(5),
        },
        ..ScanOpts::default()
    }
}

fn run(graph: &Arc<FakeGraph>, feed: &Arc<FakeFeed>, opts: &ScanOpts) -> ghostscan::ScanResult {
    scan(
        graph.clone(),
        feed.clone(),
        "target.test",
        opts,
        &CancelToken::new(),
        None,
    )
    .unwrap()
}

// --- the five-member scenario ---

#[test]
fn test_scan_mixed_members() {
    let m = members(5);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(
        FakeFeed::new()
            .with(&m[0], Script::posted_days_ago(10))
            .with(&m[1], Script::posted_days_ago(120))
            .with(&m[2], Script::reply(Reply::Never))
            .with(
                &m[3],
                Script::reply(Reply::Fail(ClientError::Authorization("private".into()))),
            )
            .with(&m[4], Script::posted_days_ago(91)),
    );
    let opts = ScanOpts {
        threshold: TimeDelta::days(90),
        ..fast_opts()
    };

    let result = run(&graph, &feed, &opts);

    assert_eq!(result.scanned_count, 5);
    assert_eq!(result.ghost_count, 3);
    assert!((result.inactivity_rate - 60.0).abs() < 1e-9);
    assert!(!result.is_partial());
    let statuses: Vec<_> = result.records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            ActivityStatus::Active,
            ActivityStatus::Inactive,
            ActivityStatus::NeverPosted,
            ActivityStatus::Unknown,
            ActivityStatus::Inactive,
        ]
    );
    assert_eq!(result.records[0].days_inactive, DaysInactive::Days(10));
    assert_eq!(result.records[2].days_inactive, DaysInactive::Never);
    assert_eq!(result.records[3].days_inactive, DaysInactive::Unknown);
    assert!(result.records[3].last_post_at.is_none());
}

#[test]
fn test_scan_excluding_never_posted_from_ghosts() {
    let m = members(2);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(
        FakeFeed::new()
            .with(&m[0], Script::reply(Reply::Never))
            .with(&m[1], Script::posted_days_ago(200)),
    );
    let opts = ScanOpts {
        count_never_posted: false,
        ..fast_opts()
    };
    let result = run(&graph, &feed, &opts);
    assert_eq!(result.ghost_count, 1);
    assert!((result.inactivity_rate - 50.0).abs() < 1e-9);
}

#[test]
fn test_scan_no_members() {
    let graph = Arc::new(FakeGraph::paged(&[], 100));
    let feed = Arc::new(FakeFeed::new());
    let result = run(&graph, &feed, &fast_opts());
    assert_eq!(result.scanned_count, 0);
    assert_eq!(result.ghost_count, 0);
    assert_eq!(result.inactivity_rate, 0.0);
    assert!(result.records.is_empty());
    assert_eq!(feed.total_calls(), 0);
}

#[test]
fn test_scan_record_count_matches_members() {
    for n in [1, 7, 100, 101, 250] {
        let m = members(n);
        let graph = Arc::new(FakeGraph::paged(&m, 100));
        let feed = Arc::new(FakeFeed::new());
        let opts = ScanOpts {
            max_members: 1_000,
            concurrency: 4,
            ..fast_opts()
        };
        let result = run(&graph, &feed, &opts);
        assert_eq!(result.scanned_count, n, "member count {n}");
        assert_eq!(result.records.len(), n);
    }
}

// --- ordering ---

#[test]
fn test_scan_preserves_enumeration_order_under_concurrency() {
    let m = members(12);
    let graph = Arc::new(FakeGraph::paged(&m, 5));
    // Earlier members answer slower, so completion order is roughly reversed.
    let mut feed = FakeFeed::new();
    for (i, mem) in m.iter().enumerate() {
        let delay = Duration::from_millis(((m.len() - i) * 8) as u64);
        feed = feed.with(mem, Script::posted_days_ago(i as i64).delayed(delay));
    }
    let feed = Arc::new(feed);
    let opts = ScanOpts {
        concurrency: 6,
        ..fast_opts()
    };

    let result = run(&graph, &feed, &opts);

    assert_eq!(result.records.len(), m.len());
    for (i, record) in result.records.iter().enumerate() {
        assert_eq!(record.member, m[i]);
        assert_eq!(record.days_inactive, DaysInactive::Days(i as u64));
    }
}

// --- probe failures, retries, timeouts ---

#[test]
fn test_probe_timeout_gives_unknown_after_all_attempts() {
    let m = members(1);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::posted_days_ago(1).delayed(Duration::from_millis(400)),
    ));
    let opts = ScanOpts {
        probe_timeout: Duration::from_millis(30),
        ..fast_opts()
    };

    let result = run(&graph, &feed, &opts);

    assert_eq!(result.records[0].status, ActivityStatus::Unknown);
    assert_eq!(feed.calls_for(&m[0]), opts.retry.max_retries as usize + 1);
}

#[test]
fn test_transient_failure_then_never_posted() {
    let m = members(1);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::sequence(vec![
            Reply::Fail(ClientError::Connection("reset".into())),
            Reply::Fail(ClientError::Timeout),
            Reply::Never,
        ]),
    ));
    let result = run(&graph, &feed, &fast_opts());
    assert_eq!(result.records[0].status, ActivityStatus::NeverPosted);
    assert_eq!(feed.calls_for(&m[0]), 3);
}

#[test]
fn test_retries_exhausted_is_unknown() {
    let m = members(1);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::reply(Reply::Fail(ClientError::Connection("down".into()))),
    ));
    let opts = ScanOpts {
        retry: RetryPolicy {
            max_retries: 4,
            ..fast_opts().retry
        },
        ..fast_opts()
    };
    let result = run(&graph, &feed, &opts);
    assert_eq!(result.records[0].status, ActivityStatus::Unknown);
    assert_eq!(feed.calls_for(&m[0]), 5);
}

#[test]
fn test_authorization_failure_not_retried() {
    let m = members(1);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::reply(Reply::Fail(ClientError::Authorization("blocked".into()))),
    ));
    let result = run(&graph, &feed, &fast_opts());
    assert_eq!(result.records[0].status, ActivityStatus::Unknown);
    assert_eq!(feed.calls_for(&m[0]), 1);
}

#[test]
fn test_malformed_timestamp_not_retried() {
    let m = members(1);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::reply(Reply::PostAt("last tuesday".into())),
    ));
    let result = run(&graph, &feed, &fast_opts());
    assert_eq!(result.records[0].status, ActivityStatus::Unknown);
    assert_eq!(feed.calls_for(&m[0]), 1);
}

#[test]
fn test_rate_limit_waits_for_server_delay() {
    let m = members(1);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::sequence(vec![
            Reply::Fail(ClientError::RateLimited {
                retry_after: Some(Duration::from_millis(60)),
            }),
            Reply::PostAt(days_ago(3)),
        ]),
    ));
    let start = Instant::now();
    let result = run(&graph, &feed, &fast_opts());
    assert!(start.elapsed() >= Duration::from_millis(60));
    assert_eq!(result.records[0].status, ActivityStatus::Active);
    assert_eq!(feed.calls_for(&m[0]), 2);
}

#[test]
fn test_one_failing_member_does_not_affect_siblings() {
    let m = members(4);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[1],
        Script::reply(Reply::Fail(ClientError::Malformed("garbage".into()))),
    ));
    let opts = ScanOpts {
        concurrency: 2,
        ..fast_opts()
    };
    let result = run(&graph, &feed, &opts);
    assert_eq!(result.scanned_count, 4);
    let unknown: Vec<_> = result
        .records
        .iter()
        .filter(|r| r.status == ActivityStatus::Unknown)
        .map(|r| r.member.clone())
        .collect();
    assert_eq!(unknown, vec![m[1].clone()]);
}

// --- enumeration ---

#[test]
fn test_first_page_failure_is_enumeration_error() {
    let graph = Arc::new(FakeGraph::new(vec![Err(ClientError::Authorization(
        "suspended".into(),
    ))]));
    let feed = Arc::new(FakeFeed::new());
    let err = scan(
        graph.clone(),
        feed.clone(),
        "target.test",
        &fast_opts(),
        &CancelToken::new(),
        None,
    )
    .unwrap_err();
    assert_eq!(err.account, "target.test");
    assert_eq!(err.direction, Direction::Followers);
    assert!(matches!(err.source, ClientError::Authorization(_)));
    assert_eq!(feed.total_calls(), 0);
}

#[test]
fn test_later_page_failure_keeps_collected_members() {
    let m = members(3);
    let graph = Arc::new(FakeGraph::new(vec![
        Ok(EdgePage {
            members: m.clone(),
            next_cursor: Some("1".into()),
        }),
        Err(ClientError::Malformed("bad page".into())),
    ]));
    let feed = Arc::new(FakeFeed::new());
    let result = run(&graph, &feed, &fast_opts());
    assert_eq!(result.scanned_count, 3);
    assert!(result.enumeration_truncated);
    assert!(!result.cancelled);
    assert!(result.is_partial());
}

#[test]
fn test_transient_page_failure_is_retried() {
    let m = members(2);
    let graph = Arc::new(FakeGraph::paged(&m, 100).flaky(2));
    let feed = Arc::new(FakeFeed::new());
    let result = run(&graph, &feed, &fast_opts());
    assert_eq!(result.scanned_count, 2);
    assert!(!result.is_partial());
    assert_eq!(graph.calls(), 3);
}

#[test]
fn test_page_failures_past_retry_budget_are_fatal() {
    let m = members(2);
    let graph = Arc::new(FakeGraph::paged(&m, 100).flaky(10));
    let feed = Arc::new(FakeFeed::new());
    let err = scan(
        graph.clone(),
        feed,
        "target.test",
        &fast_opts(),
        &CancelToken::new(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err.source, ClientError::Connection(_)));
    assert_eq!(graph.calls(), 3);
}

#[test]
fn test_overlapping_pages_are_deduplicated() {
    let m = members(4);
    let graph = Arc::new(FakeGraph::new(vec![
        Ok(EdgePage {
            members: vec![m[0].clone(), m[1].clone(), m[2].clone()],
            next_cursor: Some("1".into()),
        }),
        Ok(EdgePage {
            members: vec![m[2].clone(), m[1].clone(), m[3].clone()],
            next_cursor: None,
        }),
    ]));
    let feed = Arc::new(FakeFeed::new());
    let result = run(&graph, &feed, &fast_opts());
    let seen: Vec<_> = result.records.iter().map(|r| r.member.clone()).collect();
    assert_eq!(seen, m);
}

#[test]
fn test_max_members_stops_pagination() {
    let m = members(250);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new());
    let opts = ScanOpts {
        max_members: 120,
        concurrency: 8,
        ..fast_opts()
    };
    let result = run(&graph, &feed, &opts);
    assert_eq!(result.scanned_count, 120);
    assert_eq!(graph.calls(), 2);
    assert_eq!(result.records.last().map(|r| &r.member), Some(&m[119]));
    assert!(!result.is_partial());
}

#[test]
fn test_enumerator_is_lazy() {
    let m = members(30);
    let graph = Arc::new(FakeGraph::paged(&m, 10));
    let target = EnumerationTarget {
        account: "target.test".into(),
        direction: Direction::Followers,
        max_members: 100,
    };
    let mut enumerator = GraphEnumerator::new(graph.clone(), &target);
    assert!(matches!(enumerator.next(), Some(EnumOutcome::Member(ref x)) if *x == m[0]));
    assert_eq!(graph.calls(), 1);
    assert_eq!(enumerator.pages_fetched(), 1);
    let rest: Vec<_> = enumerator.collect();
    assert_eq!(rest.len(), 29);
    assert_eq!(graph.calls(), 3);
}

#[test]
fn test_repeated_cursor_ends_enumeration() {
    let m = members(2);
    let graph = Arc::new(FakeGraph::new(vec![Ok(EdgePage {
        members: m.clone(),
        next_cursor: Some("0".into()),
    })]));
    let target = EnumerationTarget {
        account: "target.test".into(),
        direction: Direction::Following,
        max_members: 100,
    };
    let all: Vec<_> = GraphEnumerator::new(graph.clone(), &target).collect();
    assert_eq!(all.len(), 2);
    assert!(graph.calls() <= 2);
}

// --- cancellation ---

#[test]
fn test_cancel_after_two_members() {
    let m = members(5);
    let cancel = CancelToken::new();
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(
        FakeFeed::new().with(&m[1], Script::posted_days_ago(5).cancelling(&cancel)),
    );
    let opts = ScanOpts {
        concurrency: 1,
        ..fast_opts()
    };

    let result = scan(graph.clone(), feed.clone(), "target.test", &opts, &cancel, None).unwrap();

    assert_eq!(result.records.len(), 2);
    assert_eq!(result.scanned_count, 2);
    assert!(result.cancelled);
    assert!(result.is_partial());
    assert_eq!(result.records[0].member, m[0]);
    assert_eq!(result.records[1].member, m[1]);
    assert_eq!(feed.calls_for(&m[2]), 0);
}

#[test]
fn test_cancel_before_start_scans_nothing() {
    let m = members(3);
    let cancel = CancelToken::new();
    cancel.cancel();
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new());
    let result = scan(graph, feed.clone(), "target.test", &fast_opts(), &cancel, None).unwrap();
    assert_eq!(result.scanned_count, 0);
    assert!(result.cancelled);
    assert_eq!(feed.total_calls(), 0);
}

#[test]
fn test_cancel_during_retry_marks_result_cancelled() {
    let m = members(1);
    let cancel = CancelToken::new();
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::sequence(vec![
            Reply::Fail(ClientError::Connection("reset".into())),
            Reply::PostAt(days_ago(3)),
        ])
        .cancelling(&cancel),
    ));

    let result = scan(graph, feed.clone(), "target.test", &fast_opts(), &cancel, None).unwrap();

    assert_eq!(feed.calls_for(&m[0]), 1);
    assert_eq!(result.records[0].status, ActivityStatus::Unknown);
    assert!(result.cancelled);
    assert!(result.is_partial());
}

#[test]
fn test_cancel_interrupts_rate_limit_wait() {
    let m = members(1);
    let cancel = CancelToken::new();
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(
        &m[0],
        Script::sequence(vec![
            Reply::Fail(ClientError::RateLimited {
                retry_after: Some(Duration::from_secs(3)),
            }),
            Reply::PostAt(days_ago(3)),
        ]),
    ));
    let trigger = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        trigger.cancel();
    });

    let start = Instant::now();
    let result = scan(graph, feed.clone(), "target.test", &fast_opts(), &cancel, None).unwrap();
    let elapsed = start.elapsed();
    canceller.join().unwrap();

    assert!(elapsed < Duration::from_secs(1), "scan took {elapsed:?}");
    assert_eq!(feed.calls_for(&m[0]), 1);
    assert_eq!(result.records[0].status, ActivityStatus::Unknown);
    assert!(result.cancelled);
}

#[test]
fn test_cancel_before_start_fetches_no_page() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let graph = Arc::new(FakeGraph::paged(&members(3), 100));
    let feed = Arc::new(FakeFeed::new());
    let result = scan(graph.clone(), feed, "target.test", &fast_opts(), &cancel, None).unwrap();
    assert!(result.cancelled);
    assert_eq!(graph.calls(), 0);
}

// --- worker failure ---

#[test]
fn test_panicking_feed_client_gives_truncated_result() {
    let m = members(3);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new().with(&m[1], Script::reply(Reply::Panic)));
    // No per-attempt timeout, so the client runs on the worker thread itself.
    let opts = ScanOpts {
        probe_timeout: Duration::ZERO,
        concurrency: 1,
        ..fast_opts()
    };

    let result = run(&graph, &feed, &opts);

    assert!(result.enumeration_truncated);
    assert!(result.is_partial());
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].member, m[0]);
    assert_eq!(feed.calls_for(&m[2]), 0);
}

// --- progress ---

#[test]
fn test_progress_reports_final_count() {
    let m = members(5);
    let graph = Arc::new(FakeGraph::paged(&m, 2));
    let feed = Arc::new(FakeFeed::new());
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let sink: Box<dyn ProgressSink> = Box::new(move |event: ProgressEvent| {
        sink_events.lock().unwrap().push(event);
    });

    let result = scan(
        graph,
        feed,
        "target.test",
        &fast_opts(),
        &CancelToken::new(),
        Some(sink),
    )
    .unwrap();

    assert_eq!(result.scanned_count, 5);
    let events = events.lock().unwrap();
    assert_eq!(
        events.last().copied(),
        Some(ProgressEvent {
            completed: 5,
            total: 5
        })
    );
    assert!(events.windows(2).all(|w| w[0].completed < w[1].completed));
    assert!(events.iter().all(|e| e.completed <= e.total));
}

#[test]
fn test_slow_progress_sink_still_sees_final_event() {
    let m = members(40);
    let graph = Arc::new(FakeGraph::paged(&m, 100));
    let feed = Arc::new(FakeFeed::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: Box<dyn ProgressSink> = Box::new(move |event: ProgressEvent| {
        std::thread::sleep(Duration::from_millis(5));
        sink_seen.lock().unwrap().push(event.completed);
    });
    let opts = ScanOpts {
        concurrency: 4,
        ..fast_opts()
    };

    let result = scan(graph, feed, "target.test", &opts, &CancelToken::new(), Some(sink)).unwrap();

    assert_eq!(result.scanned_count, 40);
    assert_eq!(seen.lock().unwrap().last().copied(), Some(40));
}

#[test]
fn test_progress_relay_drops_oldest_when_sink_is_stuck() {
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink_seen = Arc::clone(&seen);
    let sink: Box<dyn ProgressSink> = Box::new(move |event: ProgressEvent| {
        if event.completed == 1 {
            let _ = release_rx.recv();
        }
        sink_seen.lock().unwrap().push(event.completed);
    });
    let relay = ProgressRelay::spawn(sink, 4);

    relay.emit(ProgressEvent {
        completed: 1,
        total: 1000,
    });
    // Give the sink thread time to pick up the first event and block on it.
    std::thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    for completed in 2..=1000 {
        relay.emit(ProgressEvent {
            completed,
            total: 1000,
        });
    }
    assert!(start.elapsed() < Duration::from_secs(2));

    release_tx.send(()).unwrap();
    relay.finish();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().copied(), Some(1));
    assert_eq!(seen.last().copied(), Some(1000));
    assert!(seen.len() <= 6, "buffered {} events", seen.len());
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}
