use futures::{Stream, StreamExt};
use tracing::debug;

use crate::error::DecodeError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Incremental UTF-8 decoder.
///
/// Bytes of a character split across chunk boundaries are held back until the
/// rest of the sequence arrives, so chunks may be cut anywhere. A leading
/// byte-order mark is dropped once, at the start of the stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
    consumed: u64,
    bom_checked: bool,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_chunk(&mut self, chunk: &[u8]) -> Result<String, DecodeError> {
        let mut buffer = std::mem::take(&mut self.pending);
        buffer.extend_from_slice(chunk);

        if !self.bom_checked {
            if buffer.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&buffer) {
                self.pending = buffer;
                return Ok(String::new());
            }
            self.bom_checked = true;
            if buffer.starts_with(UTF8_BOM) {
                buffer.drain(..UTF8_BOM.len());
                self.consumed += UTF8_BOM.len() as u64;
            }
        }

        match std::str::from_utf8(&buffer) {
            Ok(text) => {
                let decoded = text.to_string();
                self.consumed += buffer.len() as u64;
                Ok(decoded)
            }
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if err.error_len().is_some() {
                    return Err(DecodeError::Malformed {
                        offset: self.consumed + valid_up_to as u64,
                    });
                }
                let tail = buffer.split_off(valid_up_to);
                self.consumed += valid_up_to as u64;
                self.pending = tail;
                String::from_utf8(buffer).map_err(|_| DecodeError::Malformed {
                    offset: self.consumed,
                })
            }
        }
    }

    /// Flushes the decoder at end of stream.
    pub fn finish(self) -> Result<String, DecodeError> {
        if self.pending.is_empty() {
            Ok(String::new())
        } else {
            Err(DecodeError::Truncated {
                pending: self.pending.len(),
            })
        }
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }
}

/// Drains `stream` in arrival order and returns the assembled text.
///
/// Nothing is returned until the source reports completion; a source error or
/// a decoding error discards everything accumulated so far.
pub async fn read_to_string<S, B, E>(stream: S) -> Result<String, DecodeError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    futures::pin_mut!(stream);

    let mut decoder = Utf8StreamDecoder::new();
    let mut assembled = String::new();
    let mut chunks = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| DecodeError::Source(Box::new(err)))?;
        assembled.push_str(&decoder.decode_chunk(chunk.as_ref())?);
        chunks += 1;
    }

    let bytes = decoder.bytes_consumed();
    assembled.push_str(&decoder.finish()?);
    debug!(chunks, bytes, chars = assembled.chars().count(), "response stream drained");
    Ok(assembled)
}

#[cfg(test)]
#[path = "tests/stream_decoder_tests.rs"]
mod tests;
