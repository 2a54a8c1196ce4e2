//! Incremental server-sent-event decoding for token streams.
//!
//! Network reads split frames at arbitrary byte boundaries, including in
//! the middle of a multi-byte UTF-8 sequence. [`SseDecoder`] buffers raw
//! bytes and only decodes complete lines, so no increment is ever cut or
//! corrupted.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};

use crate::api::RemoteApiError;
use crate::messages::{parse_stream_data, StreamFrame};
use crate::transport::ChunkStream;

/// Buffers bytes and yields the payload of each complete `data:` line.
///
/// A payload that is not valid UTF-8 once complete is reported as an error.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns the `data:` payloads completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String, RemoteApiError>> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(data) = data_payload(&line[..line.len() - 1]) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a trailing line that arrived without a final newline.
    pub fn finish(&mut self) -> Option<Result<String, RemoteApiError>> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

/// Extract the payload of a `data:` line; other SSE fields are skipped.
fn data_payload(line: &[u8]) -> Option<Result<String, RemoteApiError>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let rest = line.strip_prefix(b"data:")?;
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    Some(
        String::from_utf8(rest.to_vec())
            .map_err(|e| RemoteApiError::Stream(format!("frame is not valid UTF-8: {e}"))),
    )
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, RemoteApiError>>,
    eof: bool,
    finished: bool,
}

/// Turn a byte stream carrying SSE into a stream of text increments.
///
/// The returned stream yields each `{"text"}` payload in arrival order and
/// ends after `[DONE]`, after the first error, or when the body ends.
pub fn decode_sse_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<RemoteApiError> + Send + 'static,
{
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        eof: false,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }
            if let Some(data) = st.pending.pop_front() {
                let data = match data {
                    Ok(data) => data,
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                };
                match parse_stream_data(&data) {
                    Ok(StreamFrame::Text(text)) => return Some((Ok(text), st)),
                    Ok(StreamFrame::Done) => return None,
                    Ok(StreamFrame::Error(message)) => {
                        st.finished = true;
                        return Some((Err(RemoteApiError::Stream(message)), st));
                    }
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(RemoteApiError::Decode(e)), st));
                    }
                }
            }
            if st.eof {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = st.decoder.push(chunk.as_ref());
                    st.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.eof = true;
                    st.pending.extend(st.decoder.finish());
                }
            }
        }
    })
    .boxed()
}
