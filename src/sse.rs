//! Server-sent-event record reassembly.
//!
//! Transport chunks do not line up with SSE records: a `data:` line may be cut anywhere,
//! including inside a multi-byte character. [`SseDecoder`] buffers raw bytes and only
//! hands out records once their blank-line delimiter has arrived.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};

/// One complete SSE record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk, returning every record it completes (in order).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseRecord> {
        // CR only ever appears as part of a CRLF delimiter; JSON payloads escape it.
        self.buf.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut records = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(record) = parse_record(&String::from_utf8_lossy(&raw[..end])) {
                records.push(record);
            }
        }
        records
    }

    /// Flush whatever is left once the transport has ended.
    pub fn finish(&mut self) -> Option<SseRecord> {
        let rest = std::mem::take(&mut self.buf);
        parse_record(&String::from_utf8_lossy(&rest))
    }
}

fn parse_record(block: &str) -> Option<SseRecord> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    if event.is_none() && data.is_none() {
        return None;
    }
    Some(SseRecord {
        event,
        data: data.unwrap_or_default(),
    })
}

/// Read an HTTP response body as a stream of SSE records.
///
/// The stream ends after the body does; a transport error is yielded once and ends it.
pub fn record_stream(
    response: reqwest::Response,
) -> BoxStream<'static, Result<SseRecord, reqwest::Error>> {
    let state = Some((response, SseDecoder::new(), VecDeque::new()));
    stream::unfold(state, |state| async move {
        let (mut response, mut decoder, mut pending) = state?;
        loop {
            if let Some(record) = pending.pop_front() {
                return Some((Ok(record), Some((response, decoder, pending))));
            }
            match response.chunk().await {
                Ok(Some(bytes)) => pending.extend(decoder.push(&bytes)),
                Ok(None) => return decoder.finish().map(|record| (Ok(record), None)),
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> SseRecord {
        SseRecord {
            event: None,
            data: s.to_string(),
        }
    }

    #[test]
    fn decodes_complete_records() {
        let mut d = SseDecoder::new();
        let records = d.push(b"data: {\"text\":\"a\"}\n\ndata: {\"text\":\"b\"}\n\n");
        assert_eq!(records, vec![data(r#"{"text":"a"}"#), data(r#"{"text":"b"}"#)]);
    }

    #[test]
    fn holds_truncated_json_until_delimiter() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: {\"text\":\"Hel").is_empty());
        assert!(d.push(b"lo\"}\n").is_empty());
        let records = d.push(b"\ndata: {\"done\":true}");
        assert_eq!(records, vec![data(r#"{"text":"Hello"}"#)]);
        assert_eq!(d.push(b"\n\n"), vec![data(r#"{"done":true}"#)]);
    }

    #[test]
    fn reassembles_multibyte_char_split_across_chunks() {
        let bytes = "data: Curie é\n\n".as_bytes();
        let split = bytes.len() - 3; // inside the two-byte 'é'
        let mut d = SseDecoder::new();
        assert!(d.push(&bytes[..split]).is_empty());
        assert_eq!(d.push(&bytes[split..]), vec![data("Curie é")]);
    }

    #[test]
    fn accepts_crlf_delimiters() {
        let mut d = SseDecoder::new();
        let records = d.push(b"event: ping\r\ndata: {}\r\n\r");
        assert!(records.is_empty());
        let records = d.push(b"\n");
        assert_eq!(
            records,
            vec![SseRecord {
                event: Some("ping".into()),
                data: "{}".into()
            }]
        );
    }

    #[test]
    fn joins_multiline_data_and_skips_comments() {
        let mut d = SseDecoder::new();
        let records = d.push(b": keep-alive\n\ndata: line one\ndata: line two\n\n");
        assert_eq!(records, vec![data("line one\nline two")]);
    }

    #[test]
    fn finish_flushes_undelimited_tail() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"data: tail").is_empty());
        assert_eq!(d.finish(), Some(data("tail")));
        assert_eq!(d.finish(), None);
    }

    #[test]
    fn byte_at_a_time_matches_whole_input() {
        let input = "event: content_block_delta\ndata: {\"a\":1}\n\ndata: {\"b\":\"ü\"}\n\n";
        let mut whole = SseDecoder::new();
        let expected = whole.push(input.as_bytes());

        let mut d = SseDecoder::new();
        let mut got = Vec::new();
        for b in input.as_bytes() {
            got.extend(d.push(std::slice::from_ref(b)));
        }
        assert_eq!(got, expected);
        assert_eq!(got.len(), 2);
    }
}
