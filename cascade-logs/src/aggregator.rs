//! The in-memory log aggregator, spec §4.C.

use async_trait::async_trait;
use cascade_protocol::id::LogEntryId;
use cascade_protocol::logs::{
    AggregateBucket, DrainReport, GroupBy, LevelFilter, LogAggregator, LogEntry, LogPage,
    QueryFilter, RetentionPolicy, SearchOptions, SearchResultPage, SortOrder, StructuredCondition,
    StructuredOp,
};
use cascade_protocol::LogError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// A live streaming subscriber (spec §4.C `subscribe`).
///
/// Both streaming contracts named as an open question in spec §9 are
/// backed by this single registration: `mpsc::Receiver<LogEntry>` for
/// in-process consumers, and [`crate::sse::to_sse_stream`] as a thin
/// byte-framing adapter over the same channel for the externally-owned
/// HTTP layer — one live-subscriber bookkeeping path, not two.
struct Subscriber {
    function_id: String,
    level: Option<LevelFilter>,
    sender: mpsc::Sender<LogEntry>,
    heartbeat_task: Option<JoinHandle<()>>,
}

/// Synthesize a heartbeat entry for `function_id`: a marker, not a
/// captured log — `metadata.heartbeat` distinguishes it from real
/// entries for a consumer that only wants to detect a live stream.
fn heartbeat_entry(function_id: &str) -> LogEntry {
    LogEntry {
        id: LogEntryId::new("heartbeat"),
        function_id: function_id.to_string(),
        timestamp: now_ms(),
        level: cascade_protocol::logs::LogLevel::Info,
        message: "heartbeat".into(),
        metadata: serde_json::json!({ "heartbeat": true }),
        request_id: None,
        duration_ms: None,
    }
}

#[derive(Default)]
struct State {
    entries: Vec<LogEntry>,
    subscribers: HashMap<u64, Subscriber>,
}

/// In-memory log aggregator: append, query, search, retention, and
/// subscription, all behind a single `RwLock<Vec<LogEntry>>` plus a
/// subscriber table.
pub struct InMemoryAggregator {
    state: RwLock<State>,
    seq: AtomicU64,
    next_sub_id: AtomicU64,
    retention_task: RwLock<Option<JoinHandle<()>>>,
}

impl InMemoryAggregator {
    /// Create a new, empty aggregator.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            seq: AtomicU64::new(0),
            next_sub_id: AtomicU64::new(0),
            retention_task: RwLock::new(None),
        }
    }

    /// Assign a log entry id: a monotonic sequence number plus a
    /// random suffix (`{seq}-{rand:08x}`), resolving the open question
    /// in spec §9 — the in-memory aggregator can cheaply guarantee
    /// the sequence component is unique per process, so collisions
    /// cannot occur here (see `DESIGN.md`).
    fn next_id(&self) -> LogEntryId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let suffix: u32 = rand::random();
        LogEntryId::new(format!("{seq}-{suffix:08x}"))
    }

    /// Register a streaming subscriber for `function_id`. Delivers the
    /// last `options.tail` matching entries immediately (or only
    /// entries after `options.after_id` when set), then streams future
    /// captures until the receiver is dropped or `drain()` closes it.
    pub async fn subscribe(
        &self,
        function_id: &str,
        options: cascade_protocol::logs::SubscribeOptions,
    ) -> mpsc::Receiver<LogEntry> {
        let (tx, rx) = mpsc::channel(256);
        let mut state = self.state.write().await;

        let matches = |e: &LogEntry| {
            e.function_id == function_id
                && options.level.as_ref().is_none_or(|f| f.matches(e.level))
        };

        let replay: Vec<LogEntry> = if let Some(after_id) = &options.after_id {
            let pos = state.entries.iter().position(|e| &e.id == after_id);
            match pos {
                Some(pos) => state.entries[pos + 1..]
                    .iter()
                    .filter(|e| matches(e))
                    .cloned()
                    .collect(),
                None => vec![],
            }
        } else if let Some(n) = options.tail {
            let mut matched: Vec<LogEntry> =
                state.entries.iter().filter(|e| matches(e)).cloned().collect();
            if matched.len() > n {
                matched = matched.split_off(matched.len() - n);
            }
            matched
        } else {
            vec![]
        };

        for entry in replay {
            let _ = tx.try_send(entry);
        }

        let heartbeat_task = options.heartbeat_interval.map(|interval| {
            let tx = tx.clone();
            let function_id = function_id.to_string();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval.to_std());
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    if tx.send(heartbeat_entry(&function_id)).await.is_err() {
                        break;
                    }
                }
            })
        });

        let id = self.next_sub_id.fetch_add(1, Ordering::Relaxed);
        state.subscribers.insert(
            id,
            Subscriber {
                function_id: function_id.to_string(),
                level: options.level,
                sender: tx,
                heartbeat_task,
            },
        );

        rx
    }

    async fn notify(&self, entry: &LogEntry) {
        let mut state = self.state.write().await;
        let mut dead = Vec::new();
        for (id, sub) in state.subscribers.iter() {
            if sub.function_id != entry.function_id {
                continue;
            }
            if let Some(filter) = &sub.level {
                if !filter.matches(entry.level) {
                    continue;
                }
            }
            if sub.sender.try_send(entry.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            if let Some(sub) = state.subscribers.remove(&id) {
                if let Some(handle) = sub.heartbeat_task {
                    handle.abort();
                }
            }
        }
    }

    /// Install a periodic retention task; installing a new one cancels
    /// the previous one (spec §4.C "one-at-a-time invariant").
    pub async fn schedule_retention(
        self: &Arc<Self>,
        policy: RetentionPolicy,
        interval: cascade_protocol::DurationMs,
    ) {
        if let Some(handle) = self.retention_task.write().await.take() {
            handle.abort();
        }
        let agg = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.to_std());
            loop {
                ticker.tick().await;
                let _ = agg.apply_retention(&policy).await;
            }
        });
        *self.retention_task.write().await = Some(handle);
    }
}

impl Default for InMemoryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn matches_structured(entry: &LogEntry, cond: &StructuredCondition) -> bool {
    let value = field_value(entry, &cond.field);
    let Some(value) = value else { return false };
    compare(&value, cond.op, &cond.value)
}

fn field_value(entry: &LogEntry, field: &str) -> Option<serde_json::Value> {
    if let Some(name) = field.strip_prefix("metadata.") {
        return entry.metadata.get(name).cloned();
    }
    match field {
        "functionId" => Some(serde_json::Value::String(entry.function_id.clone())),
        "level" => Some(serde_json::to_value(entry.level).ok()?),
        "message" => Some(serde_json::Value::String(entry.message.clone())),
        "timestamp" => Some(serde_json::json!(entry.timestamp)),
        "requestId" => entry
            .request_id
            .as_ref()
            .map(|r| serde_json::Value::String(r.to_string())),
        _ => None,
    }
}

fn compare(lhs: &serde_json::Value, op: StructuredOp, rhs: &serde_json::Value) -> bool {
    match op {
        StructuredOp::Eq => lhs == rhs,
        StructuredOp::Ne => lhs != rhs,
        StructuredOp::Lt | StructuredOp::Le | StructuredOp::Gt | StructuredOp::Ge => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return false;
            };
            match op {
                StructuredOp::Lt => a < b,
                StructuredOp::Le => a <= b,
                StructuredOp::Gt => a > b,
                StructuredOp::Ge => a >= b,
                _ => unreachable!(),
            }
        }
        StructuredOp::Contains | StructuredOp::StartsWith | StructuredOp::EndsWith => {
            let (Some(a), Some(b)) = (lhs.as_str(), rhs.as_str()) else {
                return false;
            };
            match op {
                StructuredOp::Contains => a.contains(b),
                StructuredOp::StartsWith => a.starts_with(b),
                StructuredOp::EndsWith => a.ends_with(b),
                _ => unreachable!(),
            }
        }
    }
}

#[async_trait]
impl LogAggregator for InMemoryAggregator {
    async fn capture(&self, mut entry: LogEntry) -> Result<LogEntryId, LogError> {
        if entry.function_id.is_empty() {
            return Err(LogError::InvalidEntry("functionId must not be empty".into()));
        }
        entry.id = self.next_id();
        entry.truncate_if_needed();

        {
            let mut state = self.state.write().await;
            state.entries.push(entry.clone());
        }
        self.notify(&entry).await;
        Ok(entry.id)
    }

    async fn query(&self, filter: QueryFilter) -> Result<LogPage, LogError> {
        let state = self.state.read().await;
        let mut matched: Vec<&LogEntry> = state
            .entries
            .iter()
            .filter(|e| {
                filter
                    .function_id
                    .as_deref()
                    .is_none_or(|fid| fid == e.function_id)
                    && filter.since.is_none_or(|s| e.timestamp >= s)
                    && filter.until.is_none_or(|u| e.timestamp <= u)
                    && filter.level.as_ref().is_none_or(|lf| lf.matches(e.level))
            })
            .collect();

        match filter.order {
            Some(SortOrder::Desc) => matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            _ => matched.sort_by_key(|e| e.timestamp),
        }

        let offset: usize = match &filter.cursor {
            Some(c) => c.parse().map_err(|_| LogError::InvalidCursor)?,
            None => 0,
        };
        let limit = filter.effective_limit();

        let items: Vec<LogEntry> = matched
            .iter()
            .skip(offset)
            .take(limit)
            .map(|e| (*e).clone())
            .collect();

        let next_offset = offset + items.len();
        let next_cursor = if next_offset < matched.len() {
            Some(next_offset.to_string())
        } else {
            None
        };

        Ok(LogPage { items, next_cursor })
    }

    async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResultPage, LogError> {
        let state = self.state.read().await;
        let regex = if options.regex {
            Some(
                regex::RegexBuilder::new(query)
                    .case_insensitive(options.case_insensitive)
                    .build()
                    .map_err(|e| LogError::InvalidCondition(e.to_string()))?,
            )
        } else {
            None
        };
        let needle = if options.case_insensitive {
            query.to_lowercase()
        } else {
            query.to_string()
        };

        let is_match = |entry: &LogEntry| -> bool {
            let haystacks: Vec<String> = if options.include_metadata {
                vec![entry.message.clone(), entry.metadata.to_string()]
            } else {
                vec![entry.message.clone()]
            };
            haystacks.iter().any(|h| {
                if let Some(re) = &regex {
                    re.is_match(h)
                } else if options.case_insensitive {
                    h.to_lowercase().contains(&needle)
                } else {
                    h.contains(&needle)
                }
            })
        };

        let mut matched: Vec<&LogEntry> = state
            .entries
            .iter()
            .filter(|e| {
                options
                    .function_id
                    .as_deref()
                    .is_none_or(|fid| fid == e.function_id)
            })
            .filter(|e| is_match(e))
            .collect();
        matched.sort_by_key(|e| e.timestamp);

        let limit = options.limit.unwrap_or(100);
        let has_more = matched.len() > limit;
        let items = matched.into_iter().take(limit).cloned().collect();
        Ok(SearchResultPage { items, has_more })
    }

    async fn full_text_search(&self, query: &str, options: SearchOptions) -> Result<SearchResultPage, LogError> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let state = self.state.read().await;

        let score = |entry: &LogEntry| -> usize {
            let tokens: Vec<&str> = entry.message.split_whitespace().collect();
            terms
                .iter()
                .map(|term| {
                    tokens
                        .iter()
                        .filter(|t| t.to_lowercase() == *term)
                        .count()
                })
                .sum()
        };

        let mut scored: Vec<(usize, &LogEntry)> = state
            .entries
            .iter()
            .filter(|e| {
                options
                    .function_id
                    .as_deref()
                    .is_none_or(|fid| fid == e.function_id)
            })
            .map(|e| (score(e), e))
            .filter(|(s, _)| *s > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let limit = options.limit.unwrap_or(100);
        let has_more = scored.len() > limit;
        let items = scored.into_iter().take(limit).map(|(_, e)| e.clone()).collect();
        Ok(SearchResultPage { items, has_more })
    }

    async fn structured_query(&self, conditions: &[StructuredCondition]) -> Result<Vec<LogEntry>, LogError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| conditions.iter().all(|c| matches_structured(e, c)))
            .cloned()
            .collect())
    }

    async fn aggregate(&self, group_by: GroupBy) -> Result<Vec<AggregateBucket>, LogError> {
        let state = self.state.read().await;
        let mut groups: HashMap<String, (usize, usize)> = HashMap::new();
        for entry in &state.entries {
            let key = match group_by {
                GroupBy::FunctionId => entry.function_id.clone(),
                GroupBy::Level => format!("{:?}", entry.level).to_lowercase(),
            };
            let bucket = groups.entry(key).or_insert((0, 0));
            bucket.0 += 1;
            if entry.level.is_error() {
                bucket.1 += 1;
            }
        }
        let mut buckets: Vec<AggregateBucket> = groups
            .into_iter()
            .map(|(group, (count, errors))| AggregateBucket {
                group,
                count,
                error_rate: if count == 0 { 0.0 } else { errors as f64 / count as f64 },
            })
            .collect();
        buckets.sort_by(|a, b| a.group.cmp(&b.group));
        Ok(buckets)
    }

    async fn apply_retention(&self, policy: &RetentionPolicy) -> Result<usize, LogError> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        let now = now_ms();

        if let Some(max_count) = policy.max_count {
            let mut per_scope: HashMap<String, Vec<usize>> = HashMap::new();
            for (idx, entry) in state.entries.iter().enumerate() {
                if policy
                    .function_id
                    .as_deref()
                    .is_some_and(|fid| fid != entry.function_id)
                {
                    continue;
                }
                per_scope.entry(entry.function_id.clone()).or_default().push(idx);
            }
            let mut keep = vec![true; state.entries.len()];
            for (_, mut indices) in per_scope {
                indices.sort_by_key(|&i| state.entries[i].timestamp);
                if indices.len() > max_count {
                    for &idx in &indices[..indices.len() - max_count] {
                        keep[idx] = false;
                    }
                }
            }
            let mut iter = keep.into_iter();
            state.entries.retain(|_| iter.next().unwrap_or(true));
        }

        state.entries.retain(|entry| {
            if policy
                .function_id
                .as_deref()
                .is_some_and(|fid| fid != entry.function_id)
            {
                return true;
            }
            let max_age = policy
                .level_policies
                .get(&entry.level)
                .map(|p| p.max_age)
                .or(policy.max_age);
            match max_age {
                Some(max_age) => now - entry.timestamp <= max_age.as_millis() as i64,
                None => true,
            }
        });

        Ok(before - state.entries.len())
    }

    async fn delete_function_logs(&self, function_id: &str) -> Result<usize, LogError> {
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|e| e.function_id != function_id);
        let removed: Vec<u64> = state
            .subscribers
            .iter()
            .filter(|(_, sub)| sub.function_id == function_id)
            .map(|(id, _)| *id)
            .collect();
        for id in removed {
            if let Some(sub) = state.subscribers.remove(&id) {
                if let Some(handle) = sub.heartbeat_task {
                    handle.abort();
                }
            }
        }
        Ok(before - state.entries.len())
    }

    async fn drain(&self) -> DrainReport {
        let mut state = self.state.write().await;
        let subscribers_closed = state.subscribers.len();
        let mut heartbeats_cancelled = 0;
        for (_, sub) in state.subscribers.drain() {
            if let Some(handle) = sub.heartbeat_task {
                handle.abort();
                heartbeats_cancelled += 1;
            }
        }

        let retention_tasks_cancelled = if let Some(handle) = self.retention_task.write().await.take() {
            handle.abort();
            1
        } else {
            0
        };

        DrainReport {
            subscribers_closed,
            heartbeats_cancelled,
            retention_tasks_cancelled,
        }
    }
}
