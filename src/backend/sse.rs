//! Incremental framing for streamed response bodies.
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until a
//! full line is available. Two body formats are understood: server-sent events
//! (`event:` / `data:` lines, blank-line separated) and NDJSON (one JSON
//! document per line).

use super::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    EventStream,
    Ndjson,
}

impl FrameFormat {
    /// Anything that is not explicitly NDJSON is treated as an event stream.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(value) if value.contains("ndjson") || value.contains("jsonl") => {
                FrameFormat::Ndjson
            }
            _ => FrameFormat::EventStream,
        }
    }
}

/// One complete frame. NDJSON frames never carry an event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: Option<String>,
    pub data: String,
}

pub struct FrameDecoder {
    format: FrameFormat,
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            buffer: Vec::new(),
            event: None,
            data: Vec::new(),
        }
    }

    /// Feeds a chunk and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, TransportError> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8(line)
                .map_err(|err| TransportError::Decode(err.to_string()))?;
            if let Some(frame) = self.accept_line(&line) {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Flushes a trailing line or a frame that was not blank-line terminated.
    pub fn finish(&mut self) -> Result<Vec<Frame>, TransportError> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8(rest)
                .map_err(|err| TransportError::Decode(err.to_string()))?;
            if let Some(frame) = self.accept_line(line.trim_end_matches('\r')) {
                frames.push(frame);
            }
        }
        if let Some(frame) = self.dispatch() {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn accept_line(&mut self, line: &str) -> Option<Frame> {
        match self.format {
            FrameFormat::Ndjson => {
                let trimmed = line.trim();
                (!trimmed.is_empty()).then(|| Frame {
                    event: None,
                    data: trimmed.to_string(),
                })
            }
            FrameFormat::EventStream => {
                if line.is_empty() {
                    return self.dispatch();
                }
                if line.starts_with(':') {
                    return None;
                }
                let (field, value) = match line.split_once(':') {
                    Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                    None => (line, ""),
                };
                match field {
                    "event" => self.event = Some(value.to_string()),
                    "data" => self.data.push(value.to_string()),
                    _ => {}
                }
                None
            }
        }
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(Frame { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_stream_frames_survive_arbitrary_chunking() {
        let body = "event: metadata\ndata: {\"run_id\":\"r1\"}\n\n: keep-alive\nevent: updates\r\ndata: {\"reflection\":{}}\r\n\r\n";
        let mut decoder = FrameDecoder::new(FrameFormat::EventStream);
        let mut frames = Vec::new();
        for chunk in body.as_bytes().chunks(5) {
            frames.extend(decoder.push(chunk).unwrap());
        }
        frames.extend(decoder.finish().unwrap());
        assert_eq!(
            frames,
            vec![
                Frame {
                    event: Some(String::from("metadata")),
                    data: String::from("{\"run_id\":\"r1\"}"),
                },
                Frame {
                    event: Some(String::from("updates")),
                    data: String::from("{\"reflection\":{}}"),
                },
            ]
        );
    }

    #[test]
    fn multi_byte_characters_split_across_chunks() {
        let body = "data: {\"q\":\"研究\"}\n\n".as_bytes();
        let mut decoder = FrameDecoder::new(FrameFormat::EventStream);
        let mut frames = decoder.push(&body[..13]).unwrap();
        frames.extend(decoder.push(&body[13..]).unwrap());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"q\":\"研究\"}");
    }

    #[test]
    fn ndjson_lines_and_unterminated_tail() {
        let mut decoder = FrameDecoder::new(FrameFormat::Ndjson);
        let frames = decoder.push(b"{\"a\":1}\n\n{\"b\":").unwrap();
        assert_eq!(frames.len(), 1);
        assert!(decoder.push(b"2}").unwrap().is_empty());
        let tail = decoder.finish().unwrap();
        assert_eq!(tail[0].data, "{\"b\":2}");
    }

    #[test]
    fn content_type_detection() {
        assert_eq!(
            FrameFormat::from_content_type(Some("application/x-ndjson")),
            FrameFormat::Ndjson
        );
        assert_eq!(
            FrameFormat::from_content_type(Some("text/event-stream; charset=utf-8")),
            FrameFormat::EventStream
        );
        assert_eq!(FrameFormat::from_content_type(None), FrameFormat::EventStream);
    }
}
