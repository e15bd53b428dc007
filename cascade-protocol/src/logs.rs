//! The log aggregator protocol — component C.

use crate::duration::DurationMs;
use crate::error::LogError;
use crate::id::{LogEntryId, RequestId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Log severity, spec §3 "Log entry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Fine-grained diagnostic detail.
    Debug,
    /// Informational messages.
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
    /// Unrecoverable errors.
    Fatal,
}

impl LogLevel {
    /// Whether this level counts toward an error rate (spec §4.C `aggregate`):
    /// `error` and `fatal` do, everything else doesn't.
    pub fn is_error(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Fatal)
    }
}

/// The maximum stored message length before truncation (spec §3, §8).
pub const MAX_MESSAGE_LEN: usize = 100_000;

/// One structured log entry, spec §3 "Log entry".
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique id for this entry.
    pub id: LogEntryId,
    /// The function this entry belongs to.
    pub function_id: String,
    /// When the entry was captured (epoch ms).
    pub timestamp: i64,
    /// Severity.
    pub level: LogLevel,
    /// The log message, truncated to [`MAX_MESSAGE_LEN`] if longer.
    pub message: String,
    /// Arbitrary structured context; `truncated: true` is added here
    /// when `message` was shortened.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// The inbound request this entry is associated with, if any.
    pub request_id: Option<RequestId>,
    /// Duration associated with the logged event, if any.
    pub duration_ms: Option<DurationMs>,
}

impl LogEntry {
    /// Truncate `message` to [`MAX_MESSAGE_LEN`] and flag `metadata.truncated`
    /// if it was longer; returns whether truncation occurred.
    pub fn truncate_if_needed(&mut self) -> bool {
        if self.message.chars().count() <= MAX_MESSAGE_LEN {
            return false;
        }
        self.message = self.message.chars().take(MAX_MESSAGE_LEN).collect();
        if !self.metadata.is_object() {
            self.metadata = serde_json::Value::Object(serde_json::Map::new());
        }
        self.metadata
            .as_object_mut()
            .expect("just normalized to an object above")
            .insert("truncated".into(), serde_json::Value::Bool(true));
        true
    }
}

/// Level filter for `query`/`subscribe`: an exact single level, a set
/// of levels, or a minimum severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelFilter {
    /// Exactly this level.
    Exact(LogLevel),
    /// Any of these levels.
    AnyOf(Vec<LogLevel>),
    /// This level or more severe.
    MinSeverity(LogLevel),
}

impl LevelFilter {
    /// Whether `level` passes this filter.
    pub fn matches(&self, level: LogLevel) -> bool {
        match self {
            LevelFilter::Exact(l) => *l == level,
            LevelFilter::AnyOf(ls) => ls.contains(&level),
            LevelFilter::MinSeverity(min) => level >= *min,
        }
    }
}

/// Sort order for `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Oldest first.
    Asc,
    /// Newest first.
    Desc,
}

/// The hard maximum for `query`'s `limit` (spec §4.C).
pub const QUERY_MAX_LIMIT: usize = 1_000;
/// The default `limit` for `query` when unspecified.
pub const QUERY_DEFAULT_LIMIT: usize = 100;

/// Filter for `query`/`queryAll`, spec §4.C.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    /// Restrict to one function. Required for `query`, optional for
    /// `queryAll` (enforced by the caller, not this type).
    pub function_id: Option<String>,
    /// Inclusive lower timestamp bound (epoch ms).
    pub since: Option<i64>,
    /// Inclusive upper timestamp bound (epoch ms).
    pub until: Option<i64>,
    /// Level filter.
    pub level: Option<LevelFilter>,
    /// Sort order; defaults to ascending when `None`.
    pub order: Option<SortOrder>,
    /// Page size; defaults to [`QUERY_DEFAULT_LIMIT`], capped at
    /// [`QUERY_MAX_LIMIT`].
    pub limit: Option<usize>,
    /// Opaque pagination cursor from a previous page.
    pub cursor: Option<String>,
}

impl QueryFilter {
    /// The effective page size after applying the default and cap.
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(QUERY_DEFAULT_LIMIT).min(QUERY_MAX_LIMIT)
    }
}

/// A page of log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPage {
    /// Entries in this page.
    pub items: Vec<LogEntry>,
    /// Opaque cursor for the next page, `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// Options for `search`, spec §4.C.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Restrict to one function.
    pub function_id: Option<String>,
    /// Case-insensitive matching.
    #[serde(default)]
    pub case_insensitive: bool,
    /// Treat the query as a regular expression.
    #[serde(default)]
    pub regex: bool,
    /// Also search the stringified `metadata` field.
    #[serde(default)]
    pub include_metadata: bool,
    /// Maximum results to return.
    pub limit: Option<usize>,
}

/// Result of `search`/`fullTextSearch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultPage {
    /// Matching entries, scored descending for `fullTextSearch`, in
    /// timestamp order for `search`.
    pub items: Vec<LogEntry>,
    /// Whether more results exist beyond this page.
    pub has_more: bool,
}

/// A single condition in a `structuredQuery`, spec §4.C.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredCondition {
    /// Field name: a top-level attribute or `metadata.<name>`.
    pub field: String,
    /// Comparison operator.
    pub op: StructuredOp,
    /// The value to compare against.
    pub value: serde_json::Value,
}

/// Operators supported by `structuredQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than (numeric operands only).
    Lt,
    /// Less than or equal (numeric operands only).
    Le,
    /// Greater than (numeric operands only).
    Gt,
    /// Greater than or equal (numeric operands only).
    Ge,
    /// Substring containment.
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
}

/// Per-level retention override, spec §8 scenario 6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelRetentionPolicy {
    /// Maximum age before deletion for entries at this level.
    pub max_age: DurationMs,
}

/// A retention policy for `applyRetention`/`scheduleRetention`, spec §4.C.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Delete entries older than this, unless overridden per-level.
    pub max_age: Option<DurationMs>,
    /// Keep only the most recent `maxCount` entries (per scope).
    pub max_count: Option<usize>,
    /// Restrict this policy to one function; `None` applies globally.
    pub function_id: Option<String>,
    /// Per-level overrides of `max_age`.
    #[serde(default)]
    pub level_policies: HashMap<LogLevel, LevelRetentionPolicy>,
}

/// Options for `subscribe`, spec §4.C.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeOptions {
    /// Only deliver entries matching this filter.
    pub level: Option<LevelFilter>,
    /// Send a heartbeat at this interval if no entries are delivered.
    pub heartbeat_interval: Option<DurationMs>,
    /// Immediately deliver the last N matching entries.
    pub tail: Option<usize>,
    /// Deliver only entries after this id (for resuming a stream).
    pub after_id: Option<LogEntryId>,
}

/// Per-group result of `aggregate`, spec §4.C.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateBucket {
    /// The group key (e.g. a function id or level name).
    pub group: String,
    /// Number of entries in this group.
    pub count: usize,
    /// Fraction of entries in this group at `error` or `fatal` level.
    pub error_rate: f64,
}

/// What to group `aggregate` by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Group by function id.
    FunctionId,
    /// Group by level.
    Level,
}

/// Which standard channel a line was emitted on while a tier handler
/// ran under [`LogAggregator::capture_execution`]; classifies the line
/// into a [`LogLevel`] (spec §4.C `captureExecution`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    /// Ordinary output, classified as `info`.
    Stdout,
    /// Error output, classified as `error`.
    Stderr,
}

impl OutputChannel {
    fn level(self) -> LogLevel {
        match self {
            OutputChannel::Stdout => LogLevel::Info,
            OutputChannel::Stderr => LogLevel::Error,
        }
    }
}

/// The scoped writer handle passed into the closure run by
/// [`LogAggregator::capture_execution`] — spec §9's explicit
/// replacement for "ambient console interception": the closure emits
/// lines here instead of a global stdout/stderr, and every line is
/// flushed to the aggregator once the closure returns.
#[derive(Default)]
pub struct ExecutionWriter {
    lines: Mutex<Vec<(OutputChannel, String)>>,
}

impl ExecutionWriter {
    /// Emit one line on `channel`, to be captured when the enclosing
    /// `capture_execution` call finishes.
    pub fn write_line(&self, channel: OutputChannel, line: impl Into<String>) {
        self.lines
            .lock()
            .expect("execution writer mutex poisoned")
            .push((channel, line.into()));
    }

    fn take(&self) -> Vec<(OutputChannel, String)> {
        std::mem::take(&mut self.lines.lock().expect("execution writer mutex poisoned"))
    }
}

/// Result of `drain()`, spec §5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrainReport {
    /// Number of subscriber channels closed.
    pub subscribers_closed: usize,
    /// Number of heartbeat tasks cancelled.
    pub heartbeats_cancelled: usize,
    /// Number of retention tasks cancelled.
    pub retention_tasks_cancelled: usize,
}

/// The log aggregator protocol, component C.
#[async_trait]
pub trait LogAggregator: Send + Sync {
    /// Validate, id-assign, truncate, store, and notify subscribers.
    async fn capture(&self, entry: LogEntry) -> Result<LogEntryId, LogError>;

    /// Equivalent to N `capture` calls; no atomicity beyond per-entry.
    async fn capture_batch(&self, entries: Vec<LogEntry>) -> Vec<Result<LogEntryId, LogError>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            out.push(self.capture(entry).await);
        }
        out
    }

    /// A page of entries matching `filter`. `filter.function_id` is
    /// required by convention (the untyped `queryAll` path omits it).
    async fn query(&self, filter: QueryFilter) -> Result<LogPage, LogError>;

    /// Substring (optionally regex / case-insensitive / metadata-inclusive) search.
    async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResultPage, LogError>;

    /// Score entries by summed whitespace-tokenized term frequency,
    /// descending.
    async fn full_text_search(&self, query: &str, options: SearchOptions) -> Result<SearchResultPage, LogError>;

    /// Conjunction of field/operator/value conditions.
    async fn structured_query(
        &self,
        conditions: &[StructuredCondition],
    ) -> Result<Vec<LogEntry>, LogError>;

    /// Per-group `{count, errorRate}`.
    async fn aggregate(&self, group_by: GroupBy) -> Result<Vec<AggregateBucket>, LogError>;

    /// Shorthand producing an `error`-level entry with stack and
    /// error-name metadata (spec §4.C `captureError`). Default-delegates
    /// to [`Self::capture`]; `errorName` is derived from the leading
    /// token of the error's `Debug` output (the enum variant name, by
    /// Rust's derive convention) since `std::error::Error` has no
    /// `.name()` of its own.
    async fn capture_error(
        &self,
        function_id: &str,
        request_id: Option<RequestId>,
        error: &(dyn std::error::Error + Send + Sync),
    ) -> Result<LogEntryId, LogError> {
        let debug = format!("{error:?}");
        let name_end = debug
            .find(|c: char| c == '(' || c == '{' || c.is_whitespace())
            .unwrap_or(debug.len());
        self.capture(LogEntry {
            id: LogEntryId::new(""),
            function_id: function_id.to_string(),
            timestamp: now_ms(),
            level: LogLevel::Error,
            message: error.to_string(),
            metadata: serde_json::json!({
                "errorName": &debug[..name_end],
                "stack": debug,
            }),
            request_id,
            duration_ms: None,
        })
        .await
    }

    /// Run `f` with a scoped [`ExecutionWriter`] substituting the
    /// standard output channel for its duration (spec §4.C
    /// `captureExecution`, spec §9): every line `f` emits through the
    /// writer is captured as a log entry, classified by
    /// [`OutputChannel`], and the writer is flushed whether `f`
    /// returns `Ok` or `Err` — the "always-restore" property (spec
    /// §4.C). Requires `Self: Sized` (a generic method isn't
    /// dyn-compatible); callers holding a `dyn LogAggregator` use
    /// `capture`/`capture_batch` directly instead.
    async fn capture_execution<T, E, F, Fut>(
        &self,
        function_id: &str,
        request_id: Option<RequestId>,
        f: F,
    ) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(Arc<ExecutionWriter>) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, E>> + Send,
        T: Send,
        E: Send,
    {
        let writer = Arc::new(ExecutionWriter::default());
        let result = f(Arc::clone(&writer)).await;
        for (channel, line) in writer.take() {
            let _ = self
                .capture(LogEntry {
                    id: LogEntryId::new(""),
                    function_id: function_id.to_string(),
                    timestamp: now_ms(),
                    level: channel.level(),
                    message: line,
                    metadata: serde_json::Value::Null,
                    request_id: request_id.clone(),
                    duration_ms: None,
                })
                .await;
        }
        result
    }

    /// Delete entries violating `policy`; returns the deletion count.
    async fn apply_retention(&self, policy: &RetentionPolicy) -> Result<usize, LogError>;

    /// Remove every entry, index, and subscriber-replay-base entry for `function_id`.
    async fn delete_function_logs(&self, function_id: &str) -> Result<usize, LogError>;

    /// Close all subscribers, cancel all timers, and report counts.
    async fn drain(&self) -> DrainReport;
}
