use cascade_logs::InMemoryAggregator;
use cascade_protocol::logs::{
    GroupBy, LevelFilter, LevelRetentionPolicy, LogAggregator, LogEntry, LogLevel, OutputChannel,
    QueryFilter, RetentionPolicy, SearchOptions, StructuredCondition, StructuredOp,
    SubscribeOptions,
};
use cascade_protocol::id::LogEntryId;
use cascade_protocol::DurationMs;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn entry(function_id: &str, level: LogLevel, message: &str, timestamp: i64) -> LogEntry {
    LogEntry {
        id: LogEntryId::new(""),
        function_id: function_id.into(),
        timestamp,
        level,
        message: message.into(),
        metadata: serde_json::Value::Null,
        request_id: None,
        duration_ms: None,
    }
}

#[tokio::test]
async fn capture_assigns_monotonic_seq_prefixed_ids() {
    let agg = InMemoryAggregator::new();
    let id1 = agg.capture(entry("fn-1", LogLevel::Info, "one", 0)).await.unwrap();
    let id2 = agg.capture(entry("fn-1", LogLevel::Info, "two", 1)).await.unwrap();
    assert!(id1.as_str().starts_with("0-"));
    assert!(id2.as_str().starts_with("1-"));
}

#[tokio::test]
async fn capture_rejects_empty_function_id() {
    let agg = InMemoryAggregator::new();
    let err = agg.capture(entry("", LogLevel::Info, "x", 0)).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn query_filters_by_function_and_level() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "a", 0)).await.unwrap();
    agg.capture(entry("fn-1", LogLevel::Error, "b", 1)).await.unwrap();
    agg.capture(entry("fn-2", LogLevel::Error, "c", 2)).await.unwrap();

    let page = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            level: Some(LevelFilter::Exact(LogLevel::Error)),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].message, "b");
}

#[tokio::test]
async fn query_paginates_with_cursor() {
    let agg = InMemoryAggregator::new();
    for i in 0..5 {
        agg.capture(entry("fn-1", LogLevel::Info, &format!("m{i}"), i))
            .await
            .unwrap();
    }
    let page1 = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page1.items.len(), 2);
    let cursor = page1.next_cursor.clone().unwrap();

    let page2 = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            limit: Some(2),
            cursor: Some(cursor),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page2.items.len(), 2);
    assert_eq!(page2.items[0].message, "m2");
}

#[tokio::test]
async fn search_is_case_insensitive_when_requested() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "Connection RESET by peer", 0))
        .await
        .unwrap();

    let hits = agg
        .search(
            "reset",
            SearchOptions {
                case_insensitive: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hits.items.len(), 1);

    let misses = agg
        .search(
            "reset",
            SearchOptions {
                case_insensitive: false,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(misses.items.len(), 0);
}

#[tokio::test]
async fn search_supports_regex_mode() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "request id abc-123 failed", 0))
        .await
        .unwrap();

    let hits = agg
        .search(
            r"abc-\d+",
            SearchOptions {
                regex: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hits.items.len(), 1);
}

#[tokio::test]
async fn full_text_search_ranks_by_term_frequency() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "timeout timeout timeout", 0))
        .await
        .unwrap();
    agg.capture(entry("fn-1", LogLevel::Info, "timeout occurred once", 1))
        .await
        .unwrap();

    let results = agg
        .full_text_search("timeout", SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(results.items.len(), 2);
    assert_eq!(results.items[0].message, "timeout timeout timeout");
}

#[tokio::test]
async fn structured_query_matches_metadata_field() {
    let agg = InMemoryAggregator::new();
    let mut e = entry("fn-1", LogLevel::Info, "deployed", 0);
    e.metadata = serde_json::json!({"version": "2.0.0"});
    agg.capture(e).await.unwrap();

    let matches = agg
        .structured_query(&[StructuredCondition {
            field: "metadata.version".into(),
            op: StructuredOp::Eq,
            value: serde_json::json!("2.0.0"),
        }])
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
}

#[tokio::test]
async fn aggregate_computes_error_rate_per_function() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "ok", 0)).await.unwrap();
    agg.capture(entry("fn-1", LogLevel::Error, "boom", 1)).await.unwrap();

    let buckets = agg.aggregate(GroupBy::FunctionId).await.unwrap();
    let fn1 = buckets.iter().find(|b| b.group == "fn-1").unwrap();
    assert_eq!(fn1.count, 2);
    assert_eq!(fn1.error_rate, 0.5);
}

#[tokio::test]
async fn apply_retention_honors_max_count_per_function() {
    let agg = InMemoryAggregator::new();
    for i in 0..5 {
        agg.capture(entry("fn-1", LogLevel::Info, &format!("m{i}"), i))
            .await
            .unwrap();
    }
    let deleted = agg
        .apply_retention(&RetentionPolicy {
            max_count: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(deleted, 3);

    let remaining = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(remaining.items.len(), 2);
    assert_eq!(remaining.items[0].message, "m3");
}

#[tokio::test]
async fn apply_retention_honors_per_level_max_age_override() {
    let agg = InMemoryAggregator::new();
    let two_hours_ago = now_ms() - 2 * 60 * 60 * 1000;
    agg.capture(entry("fn-1", LogLevel::Debug, "stale debug", two_hours_ago))
        .await
        .unwrap();
    agg.capture(entry("fn-1", LogLevel::Error, "stale error", two_hours_ago))
        .await
        .unwrap();

    let mut level_policies = std::collections::HashMap::new();
    level_policies.insert(
        LogLevel::Debug,
        LevelRetentionPolicy {
            max_age: DurationMs::from_millis(60 * 60 * 1000),
        },
    );
    level_policies.insert(
        LogLevel::Error,
        LevelRetentionPolicy {
            max_age: DurationMs::from_millis(7 * 24 * 60 * 60 * 1000),
        },
    );

    let deleted = agg
        .apply_retention(&RetentionPolicy {
            level_policies,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let remaining = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            level: Some(LevelFilter::Exact(LogLevel::Error)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(remaining.items.len(), 1);
    assert_eq!(remaining.items[0].message, "stale error");
}

#[tokio::test]
async fn delete_function_logs_removes_only_that_function() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "a", 0)).await.unwrap();
    agg.capture(entry("fn-2", LogLevel::Info, "b", 1)).await.unwrap();

    let deleted = agg.delete_function_logs("fn-1").await.unwrap();
    assert_eq!(deleted, 1);

    let remaining = agg
        .query(QueryFilter {
            function_id: Some("fn-2".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(remaining.items.len(), 1);
}

#[tokio::test]
async fn subscribe_replays_tail_then_streams_new_entries() {
    let agg = InMemoryAggregator::new();
    agg.capture(entry("fn-1", LogLevel::Info, "before-1", 0)).await.unwrap();
    agg.capture(entry("fn-1", LogLevel::Info, "before-2", 1)).await.unwrap();

    let mut rx = agg
        .subscribe(
            "fn-1",
            SubscribeOptions {
                tail: Some(1),
                ..Default::default()
            },
        )
        .await;

    let replayed = rx.recv().await.unwrap();
    assert_eq!(replayed.message, "before-2");

    agg.capture(entry("fn-1", LogLevel::Info, "after", 2)).await.unwrap();
    let live = rx.recv().await.unwrap();
    assert_eq!(live.message, "after");
}

#[tokio::test]
async fn subscribe_filters_by_level() {
    let agg = InMemoryAggregator::new();
    let mut rx = agg
        .subscribe(
            "fn-1",
            SubscribeOptions {
                level: Some(LevelFilter::MinSeverity(LogLevel::Error)),
                ..Default::default()
            },
        )
        .await;

    agg.capture(entry("fn-1", LogLevel::Info, "ignored", 0)).await.unwrap();
    agg.capture(entry("fn-1", LogLevel::Error, "boom", 1)).await.unwrap();

    let delivered = rx.recv().await.unwrap();
    assert_eq!(delivered.message, "boom");
}

#[tokio::test]
async fn drain_closes_subscribers_and_reports_counts() {
    let agg = InMemoryAggregator::new();
    let mut rx = agg.subscribe("fn-1", SubscribeOptions::default()).await;

    let report = agg.drain().await;
    assert_eq!(report.subscribers_closed, 1);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn subscribe_with_heartbeat_delivers_a_marker_when_idle() {
    let agg = InMemoryAggregator::new();
    let mut rx = agg
        .subscribe(
            "fn-1",
            SubscribeOptions {
                heartbeat_interval: Some(DurationMs::from_millis(10)),
                ..Default::default()
            },
        )
        .await;

    let beat = rx.recv().await.unwrap();
    assert_eq!(beat.function_id, "fn-1");
    assert_eq!(beat.metadata["heartbeat"], serde_json::Value::Bool(true));
}

#[tokio::test]
async fn drain_cancels_heartbeat_tasks() {
    let agg = InMemoryAggregator::new();
    let _rx = agg
        .subscribe(
            "fn-1",
            SubscribeOptions {
                heartbeat_interval: Some(DurationMs::from_millis(10)),
                ..Default::default()
            },
        )
        .await;

    let report = agg.drain().await;
    assert_eq!(report.subscribers_closed, 1);
    assert_eq!(report.heartbeats_cancelled, 1);
}

#[derive(Debug)]
struct SandboxTimeout {
    seconds: u64,
}

impl fmt::Display for SandboxTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sandbox timed out after {}s", self.seconds)
    }
}

impl std::error::Error for SandboxTimeout {}

#[tokio::test]
async fn capture_error_derives_name_from_debug_and_sets_error_level() {
    let agg = InMemoryAggregator::new();
    let err = SandboxTimeout { seconds: 30 };
    agg.capture_error("fn-1", None, &err).await.unwrap();

    let page = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    let logged = &page.items[0];
    assert_eq!(logged.level, LogLevel::Error);
    assert_eq!(logged.message, "sandbox timed out after 30s");
    assert_eq!(logged.metadata["errorName"], "SandboxTimeout");
    assert!(logged.metadata["stack"].as_str().unwrap().contains("seconds"));
}

#[tokio::test]
async fn capture_execution_classifies_lines_by_channel() {
    let agg = InMemoryAggregator::new();
    agg.capture_execution("fn-1", None, |writer| async move {
        writer.write_line(OutputChannel::Stdout, "starting up");
        writer.write_line(OutputChannel::Stderr, "warning: slow path");
        Ok::<_, std::convert::Infallible>(())
    })
    .await
    .unwrap();

    let page = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            order: None,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].level, LogLevel::Info);
    assert_eq!(page.items[0].message, "starting up");
    assert_eq!(page.items[1].level, LogLevel::Error);
    assert_eq!(page.items[1].message, "warning: slow path");
}

#[tokio::test]
async fn capture_execution_flushes_lines_even_when_the_closure_fails() {
    let agg = InMemoryAggregator::new();
    let result = agg
        .capture_execution("fn-1", None, |writer| async move {
            writer.write_line(OutputChannel::Stdout, "about to crash");
            Err::<(), _>("boom")
        })
        .await;

    assert_eq!(result, Err("boom"));

    let page = agg
        .query(QueryFilter {
            function_id: Some("fn-1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].message, "about to crash");
}
