//! Incremental SSE line-protocol parser.
//!
//! Feed raw body chunks in, get dispatched events out. Chunks may split
//! lines (and UTF-8 sequences) arbitrarily, so the parser buffers bytes and
//! only consumes complete lines. Comment lines (`:`) are dropped, `event:`
//! sets the pending event type, `data:` lines accumulate, and a blank line
//! dispatches the accumulated event. Default event type is `message`.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Stateful parser for one SSE stream.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a body chunk, returning any events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    events.push(SseEvent {
                        event: self
                            .event_type
                            .take()
                            .unwrap_or_else(|| "message".to_string()),
                        data: self.data_lines.join("\n"),
                    });
                    self.data_lines.clear();
                }
                self.event_type = None;
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("event:") {
                self.event_type = Some(rest.trim().to_string());
                continue;
            }

            if let Some(rest) = line.strip_prefix("data:") {
                self.data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
                continue;
            }

            // Unknown field names are ignored per the SSE spec.
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: endpoint\ndata: /messages/?session_id=abc\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "endpoint".to_string(),
                data: "/messages/?session_id=abc".to_string(),
            }]
        );
    }

    #[test]
    fn test_default_event_type_is_message() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"id\":1}\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "{\"id\":1}");
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: mess").is_empty());
        assert!(parser.push(b"age\ndata: hel").is_empty());
        let events = parser.push(b"lo\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_comments_and_pings_ignored() {
        let mut parser = SseParser::new();
        let events = parser.push(b": ping\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = SseParser::new();
        let events = parser.push(b"event: endpoint\r\ndata: /m\r\n\r\n");
        assert_eq!(events[0].event, "endpoint");
        assert_eq!(events[0].data, "/m");
    }

    #[test]
    fn test_blank_line_without_data_dispatches_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"\n\n\n").is_empty());
    }

    #[test]
    fn test_two_events_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\n\ndata: b\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a");
        assert_eq!(events[1].data, "b");
    }
}
