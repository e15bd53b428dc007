//! Server-sent-event framing over a subscriber channel.
//!
//! This is a thin adapter over [`crate::InMemoryAggregator::subscribe`]'s
//! `mpsc::Receiver<LogEntry>` — the same underlying registration backs
//! both this byte stream and a consumer that reads the channel directly,
//! resolving the "one contract, not two" open question.

use cascade_protocol::logs::LogEntry;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Frame one [`LogEntry`] as an `event: log` SSE message.
fn to_sse_frame(entry: &LogEntry) -> String {
    let payload = serde_json::to_string(entry).unwrap_or_else(|_| "{}".into());
    format!("event: log\ndata: {payload}\n\n")
}

/// Adapt a subscriber channel into a stream of SSE-framed byte chunks.
pub fn sse_stream(rx: mpsc::Receiver<LogEntry>) -> impl Stream<Item = Vec<u8>> {
    ReceiverStream::new(rx).map(|entry| to_sse_frame(&entry).into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_protocol::id::LogEntryId;
    use cascade_protocol::logs::LogLevel;

    fn entry() -> LogEntry {
        LogEntry {
            id: LogEntryId::new("1-deadbeef"),
            function_id: "fn-1".into(),
            timestamp: 0,
            level: LogLevel::Info,
            message: "hi".into(),
            metadata: serde_json::Value::Null,
            request_id: None,
            duration_ms: None,
        }
    }

    #[tokio::test]
    async fn frames_entries_as_sse() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(entry()).await.unwrap();
        drop(tx);

        let mut stream = Box::pin(sse_stream(rx));
        let chunk = stream.next().await.unwrap();
        let text = String::from_utf8(chunk).unwrap();
        assert!(text.starts_with("event: log\ndata: "));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains("\"functionId\":\"fn-1\""));
    }
}
