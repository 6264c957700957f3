//! Line framing for `text/event-stream` response bodies.

use futures_util::StreamExt;
use rust_mcp_schema::schema_utils::ServerMessage;
use tracing::debug;

use super::McpError;

/// Accumulates body chunks and hands back complete, non-blank lines.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    /// Returns whatever is left, including a final unterminated line.
    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(offset) = memchr::memchr(b'\n', &self.buffer[start..]) {
            let newline = start + offset;
            push_line(&mut lines, &self.buffer[start..newline]);
            start = newline + 1;
        }

        if flush {
            push_line(&mut lines, &self.buffer[start..]);
            self.buffer.clear();
        } else if start > 0 {
            self.buffer.drain(..start);
        }

        lines
    }
}

fn push_line(lines: &mut Vec<String>, bytes: &[u8]) {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

fn decode_line(line: &str) -> Result<Option<ServerMessage>, McpError> {
    match sse_data_payload(line) {
        Some(payload) if !payload.is_empty() => Ok(Some(serde_json::from_str(payload)?)),
        _ => Ok(None),
    }
}

fn is_reply(message: &ServerMessage) -> bool {
    matches!(message, ServerMessage::Response(_) | ServerMessage::Error(_))
}

/// Reads the stream until the first response or error message. Server
/// notifications and requests seen on the way are skipped.
pub async fn next_sse_server_message(response: reqwest::Response) -> Result<ServerMessage, McpError> {
    let mut stream = response.bytes_stream();
    let mut buffer = SseLineBuffer::default();

    while let Some(chunk) = stream.next().await {
        for line in buffer.push(&chunk?) {
            if let Some(message) = decode_line(&line)? {
                if is_reply(&message) {
                    return Ok(message);
                }
                debug!("skipping non-reply event-stream message");
            }
        }
    }

    for line in buffer.finish() {
        if let Some(message) = decode_line(&line)? {
            if is_reply(&message) {
                return Ok(message);
            }
        }
    }

    Err(McpError::Protocol("Empty event-stream response.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_waits_for_complete_lines() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: {\"id\"").is_empty());
        assert_eq!(buffer.push(b":1}\r\n\r\nevent: ping\n"), vec!["data: {\"id\":1}", "event: ping"]);
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: tail").is_empty());
        assert_eq!(buffer.finish(), vec!["data: tail"]);
    }

    #[test]
    fn detects_event_stream_content_type() {
        assert!(is_event_stream_content_type("text/event-stream"));
        assert!(is_event_stream_content_type("Text/Event-Stream; charset=UTF-8"));
        assert!(!is_event_stream_content_type("application/json"));
        assert!(!is_event_stream_content_type(""));
    }

    #[test]
    fn extracts_data_payload() {
        assert_eq!(sse_data_payload("data: {\"id\":1}"), Some("{\"id\":1}"));
        assert_eq!(sse_data_payload("data:"), Some(""));
        assert_eq!(sse_data_payload("event: message"), None);
    }

    #[test]
    fn decodes_replies_and_ignores_other_fields() {
        let reply = decode_line(r#"data: {"jsonrpc":"2.0","id":3,"result":{}}"#)
            .expect("decode")
            .expect("message");
        assert!(is_reply(&reply));

        let notification =
            decode_line(r#"data: {"jsonrpc":"2.0","method":"notifications/progress","params":{"progressToken":1,"progress":0.5}}"#)
                .expect("decode")
                .expect("message");
        assert!(!is_reply(&notification));

        assert!(decode_line("id: 7").expect("decode").is_none());
        assert!(decode_line("data: {broken").is_err());
    }
}
