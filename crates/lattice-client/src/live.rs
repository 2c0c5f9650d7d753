use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tracing::warn;

use lattice_types::events::PushEvent;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
}

/// Open the live channel for `user_id` and yield push events as they
/// arrive. The stream ends when the server closes the connection;
/// reconnecting (and re-fetching history) is the caller's concern.
pub async fn connect(
    base_url: &str,
    user_id: &str,
) -> Result<impl Stream<Item = PushEvent>, FeedError> {
    let url = format!("{}/messages/{}", base_url.trim_end_matches('/'), user_id);
    let resp = reqwest::Client::new().get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(FeedError::Status(resp.status()));
    }

    let mut body = resp.bytes_stream();
    let stream = async_stream::stream! {
        let mut parser = FrameParser::default();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("live feed read error: {}", e);
                    break;
                }
            };
            for payload in parser.feed(&String::from_utf8_lossy(&chunk)) {
                match serde_json::from_str::<PushEvent>(&payload) {
                    Ok(event) => yield event,
                    Err(e) => warn!("unparseable push event: {}", e),
                }
            }
        }
    };

    Ok(stream)
}

/// Incremental parser for SSE frames: buffers partial chunks and
/// returns the data payload of each completed event.
#[derive(Default)]
struct FrameParser {
    buffer: String,
}

impl FrameParser {
    fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut payloads = Vec::new();
        while let Some(idx) = self.buffer.find("\n\n") {
            let frame = self.buffer[..idx].to_string();
            self.buffer.drain(..idx + 2);
            if let Some(data) = parse_frame(&frame) {
                payloads.push(data);
            }
        }
        payloads
    }
}

/// Data payload of one SSE frame. Keep-alive comments and frames
/// without a data field yield `None`.
fn parse_frame(frame: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in frame.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lattice_types::models::{Message, MessageKind};
    use uuid::Uuid;

    #[test]
    fn single_frame_yields_payload() {
        let mut parser = FrameParser::default();
        let payloads = parser.feed("data: {\"hello\":1}\n\n");
        assert_eq!(payloads, vec!["{\"hello\":1}"]);
    }

    #[test]
    fn partial_chunks_are_reassembled() {
        let mut parser = FrameParser::default();
        assert!(parser.feed("data: {\"hel").is_empty());
        assert!(parser.feed("lo\":1}").is_empty());
        let payloads = parser.feed("\n\n");
        assert_eq!(payloads, vec!["{\"hello\":1}"]);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut parser = FrameParser::default();
        let payloads = parser.feed("data: one\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[test]
    fn keep_alive_comments_are_skipped() {
        let mut parser = FrameParser::default();
        let payloads = parser.feed(": keep-alive\n\ndata: real\n\n");
        assert_eq!(payloads, vec!["real"]);
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let mut parser = FrameParser::default();
        let payloads = parser.feed("data: one\r\n\ndata: two\n\n");
        assert_eq!(payloads, vec!["one", "two"]);
    }

    #[test]
    fn push_event_payload_round_trips() {
        let message = Message {
            id: Uuid::new_v4(),
            from_user_id: "a".to_string(),
            to_user_id: "b".to_string(),
            message_type: MessageKind::Text,
            text: Some("yo".to_string()),
            media_url: None,
            seen: false,
            created_at: Utc::now(),
        };
        let frame = format!(
            "data: {}\n\n",
            serde_json::to_string(&PushEvent::MessageCreate(message.clone())).unwrap()
        );

        let mut parser = FrameParser::default();
        let payloads = parser.feed(&frame);
        assert_eq!(payloads.len(), 1);

        let PushEvent::MessageCreate(decoded) =
            serde_json::from_str::<PushEvent>(&payloads[0]).unwrap();
        assert_eq!(decoded.id, message.id);
        assert_eq!(decoded.text.as_deref(), Some("yo"));
    }
}
