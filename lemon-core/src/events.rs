//! Server-sent-event framing shared by the install and model-download
//! progress streams (C11).
//!
//! The producer side is just these plain types — `lemon-server` renders them
//! with `axum::response::sse::{Event, Sse}` exactly as the predecessor's
//! `/v1/chat/completions` streaming path does. The consumer-side parser below
//! has no equivalent in the retrieved corpus (nothing there consumes SSE) and
//! is modeled directly on the framing rules in §4.8.

use crate::error::RuntimeError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressPayload {
    pub bytes_received: u64,
    pub total_bytes: u64,
    pub percent: f32,
    pub display_name: String,
}

impl ProgressPayload {
    pub fn new(bytes_received: u64, total_bytes: u64, display_name: impl Into<String>) -> Self {
        let percent = if total_bytes == 0 {
            0.0
        } else {
            (bytes_received as f32 / total_bytes as f32) * 100.0
        };
        Self {
            bytes_received,
            total_bytes,
            percent,
            display_name: display_name.into(),
        }
    }
}

/// One parsed frame off an install/pull event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Progress(ProgressPayload),
    Complete,
    Error(String),
}

impl Frame {
    /// The event name half of the `event:<name>\ndata:<json>\n\n` framing,
    /// for callers building an `axum::response::sse::Event` directly rather
    /// than emitting raw frame text (only the `consume` parser above and its
    /// test fixtures deal in the raw text form).
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::Progress(_) => "progress",
            Frame::Complete => "complete",
            Frame::Error(_) => "error",
        }
    }

    /// The `data:` payload, as a JSON value rather than a pre-rendered frame.
    pub fn payload_json(&self) -> serde_json::Value {
        match self {
            Frame::Progress(p) => serde_json::to_value(p).unwrap_or(serde_json::json!({})),
            Frame::Complete => serde_json::json!({}),
            Frame::Error(message) => serde_json::json!({ "error": message }),
        }
    }
}

/// Read framed `event:`/`data:` pairs off `reader`, invoking `on_frame` for
/// each successfully parsed non-error frame, and returning once a `complete`
/// or `error` frame (terminal) is seen or the stream ends.
///
/// - A blank line resets the current event name to `progress`.
/// - Malformed JSON on a non-`error` frame is logged and skipped.
/// - An `error` frame raises as `RuntimeError::StreamAborted`.
/// - Transport errors after a terminal `complete` was already observed are
///   swallowed (the completion race rule in §4.6/§8).
pub async fn consume<R: AsyncBufRead + Unpin>(
    reader: R,
    mut on_frame: impl FnMut(Frame),
) -> Result<(), RuntimeError> {
    let mut lines = reader.lines();
    let mut current_event = "progress".to_string();
    let mut completed = false;

    loop {
        let next = lines.next_line().await;
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                if completed {
                    return Ok(());
                }
                return Err(RuntimeError::Io(e));
            }
        };

        if line.is_empty() {
            current_event = "progress".to_string();
            continue;
        }

        if let Some(name) = line.strip_prefix("event:") {
            current_event = name.trim().to_string();
            continue;
        }

        if let Some(data) = line.strip_prefix("data:") {
            match current_event.as_str() {
                "error" => {
                    let message = serde_json::from_str::<serde_json::Value>(data)
                        .ok()
                        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                        .unwrap_or_else(|| data.to_string());
                    return Err(RuntimeError::StreamAborted { message });
                }
                "complete" => {
                    completed = true;
                    on_frame(Frame::Complete);
                }
                "progress" => match serde_json::from_str::<ProgressPayload>(data) {
                    Ok(payload) => on_frame(Frame::Progress(payload)),
                    Err(e) => warn!(error = %e, frame = data, "skipping malformed progress frame"),
                },
                other => warn!(event = other, "skipping frame of unrecognized event type"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_progress_then_complete() {
        let text = "event:progress\ndata:{\"bytes_received\":10,\"total_bytes\":100,\"percent\":10.0,\"display_name\":\"x\"}\n\nevent:complete\ndata:{}\n\n";
        let mut frames = Vec::new();
        consume(Cursor::new(text.as_bytes()), |f| frames.push(f))
            .await
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[1], Frame::Complete));
    }

    #[tokio::test]
    async fn error_frame_raises() {
        let text = "event:error\ndata:{\"error\":\"boom\"}\n\n";
        let result = consume(Cursor::new(text.as_bytes()), |_| {}).await;
        assert!(matches!(result, Err(RuntimeError::StreamAborted { .. })));
    }

    #[tokio::test]
    async fn malformed_progress_is_skipped_not_fatal() {
        let text = "event:progress\ndata:not json\n\nevent:complete\ndata:{}\n\n";
        let mut frames = Vec::new();
        consume(Cursor::new(text.as_bytes()), |f| frames.push(f))
            .await
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Frame::Complete));
    }

    #[tokio::test]
    async fn blank_line_resets_event_to_progress() {
        let text = "event:complete\n\ndata:{\"bytes_received\":1,\"total_bytes\":1,\"percent\":100.0,\"display_name\":\"x\"}\n\n";
        let mut frames = Vec::new();
        consume(Cursor::new(text.as_bytes()), |f| frames.push(f))
            .await
            .unwrap();
        assert!(matches!(frames[0], Frame::Progress(_)));
    }
}
