//! Streamed response framing.
//!
//! Commands stream newline-delimited JSON frames `{"type": "system"|"log",
//! "data": {...}}`. Log frames are forwarded in arrival order; a system
//! frame with `data.status == "finished"` carries the command result and
//! ends the command. Stream end without a terminal frame is a protocol
//! error.

use grounder_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Receives forwarded log frames, in transport order.
pub type LogSink = Arc<dyn Fn(Value) + Send + Sync>;

/// One decoded stream frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Log(Value),
    Finished(Value),
    Error(String),
    /// Unknown frame kinds are tolerated and skipped.
    Other,
}

/// Decode one line into a frame. Blank lines yield `None`. An SSE-style
/// `data: ` prefix is tolerated.
pub fn parse_frame(line: &str) -> Result<Option<Frame>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let line = line.strip_prefix("data: ").unwrap_or(line);

    let value: Value = serde_json::from_str(line)
        .map_err(|e| Error::Protocol(format!("malformed stream frame: {} ({})", line, e)))?;
    let data = value.get("data").cloned().unwrap_or(Value::Null);

    match value.get("type").and_then(|v| v.as_str()) {
        Some("log") => Ok(Some(Frame::Log(data))),
        Some("system") => match data.get("status").and_then(|v| v.as_str()) {
            Some("finished") => Ok(Some(Frame::Finished(
                data.get("result").cloned().unwrap_or(Value::Null),
            ))),
            Some("error") => Ok(Some(Frame::Error(
                data.get("error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("remote command failed")
                    .to_string(),
            ))),
            _ => Ok(Some(Frame::Other)),
        },
        _ => Ok(Some(Frame::Other)),
    }
}

/// Splits arriving byte chunks into complete lines, carrying partial lines
/// across chunk boundaries.
///
/// Buffers raw bytes and decodes only complete lines: transport chunk
/// boundaries fall anywhere, including inside a multi-byte UTF-8 character.
#[derive(Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// Drain whatever is left after the stream closes.
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buf);
        let rest = rest.trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }
}

/// Consumes frames for one command: forwards logs, captures the terminal
/// result, and fails on error frames or a missing terminal frame.
pub struct FrameCollector {
    sink: Option<LogSink>,
    result: Option<Value>,
}

impl FrameCollector {
    pub fn new(sink: Option<LogSink>) -> Self {
        Self { sink, result: None }
    }

    /// Feed one line. Returns an error on a remote error frame.
    pub fn feed(&mut self, line: &str) -> Result<()> {
        match parse_frame(line)? {
            None | Some(Frame::Other) => Ok(()),
            Some(Frame::Log(data)) => {
                if let Some(sink) = &self.sink {
                    sink(data);
                }
                Ok(())
            }
            Some(Frame::Finished(result)) => {
                debug!("received terminal frame");
                self.result = Some(result);
                Ok(())
            }
            Some(Frame::Error(message)) => Err(Error::Protocol(message)),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// Close the command. A stream that ended without a terminal frame is a
    /// protocol violation.
    pub fn finish(self) -> Result<Value> {
        self.result.ok_or_else(|| {
            Error::Protocol("stream closed before a terminal frame arrived".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_sink() -> (LogSink, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink: LogSink = Arc::new(move |data| {
            seen_clone.lock().unwrap().push(data);
        });
        (sink, seen)
    }

    #[test]
    fn test_log_log_finished_yields_result_and_ordered_logs() {
        let (sink, seen) = recording_sink();
        let mut collector = FrameCollector::new(Some(sink));
        collector
            .feed(r#"{"type":"log","data":{"message":"first"}}"#)
            .unwrap();
        collector
            .feed(r#"{"type":"log","data":{"message":"second"}}"#)
            .unwrap();
        collector
            .feed(r#"{"type":"system","data":{"status":"finished","result":42}}"#)
            .unwrap();

        assert!(collector.is_finished());
        assert_eq!(collector.finish().unwrap(), json!(42));
        let logs = seen.lock().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0]["message"], json!("first"));
        assert_eq!(logs[1]["message"], json!("second"));
    }

    #[test]
    fn test_missing_terminal_frame_is_protocol_error() {
        let mut collector = FrameCollector::new(None);
        collector.feed(r#"{"type":"log","data":{}}"#).unwrap();
        let err = collector.finish().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_error_frame_is_fatal() {
        let mut collector = FrameCollector::new(None);
        let err = collector
            .feed(r#"{"type":"system","data":{"status":"error","error":"boom"}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(msg) if msg == "boom"));
    }

    #[test]
    fn test_sse_data_prefix_tolerated() {
        let frame = parse_frame(r#"data: {"type":"system","data":{"status":"finished","result":"ok"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(frame, Frame::Finished(json!("ok")));
    }

    #[test]
    fn test_blank_and_unknown_lines_skipped() {
        assert_eq!(parse_frame("").unwrap(), None);
        assert_eq!(parse_frame("   ").unwrap(), None);
        assert_eq!(
            parse_frame(r#"{"type":"heartbeat"}"#).unwrap(),
            Some(Frame::Other)
        );
    }

    #[test]
    fn test_malformed_json_is_protocol_error() {
        assert!(matches!(
            parse_frame("not json"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_line_buffer_carries_partials_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"{\"type\":\"lo").is_empty());
        let lines = buffer.push(b"g\",\"data\":{}}\n{\"type\":");
        assert_eq!(lines, vec![r#"{"type":"log","data":{}}"#.to_string()]);
        let lines = buffer.push(b"\"system\"}\n");
        assert_eq!(lines, vec![r#"{"type":"system"}"#.to_string()]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks_survives() {
        let frame = "{\"type\":\"system\",\"data\":{\"status\":\"finished\",\"result\":\"\u{20ac}42\"}}\n";
        let bytes = frame.as_bytes();
        // Cut inside the three-byte euro sign
        let cut = frame.find('\u{20ac}').unwrap() + 1;

        let mut buffer = LineBuffer::new();
        assert!(buffer.push(&bytes[..cut]).is_empty());
        let lines = buffer.push(&bytes[cut..]);
        assert_eq!(lines.len(), 1);
        let parsed = parse_frame(&lines[0]).unwrap().unwrap();
        assert_eq!(parsed, Frame::Finished(json!("\u{20ac}42")));
    }

    #[test]
    fn test_line_buffer_finish_returns_trailing_line() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"{\"type\":\"log\",\"data\":{}}");
        assert_eq!(
            buffer.finish(),
            Some(r#"{"type":"log","data":{}}"#.to_string())
        );
    }
}
