//! # Frame Codec
//!
//! Every wire message is a single-line JSON object terminated by `\n`. The
//! decoder is purely a buffer splitter plus a parse step — it owns no
//! socket and performs no I/O, so it is trivial to drive with synthetic
//! byte chunks in tests.

use thiserror::Error;
use tracing::warn;

use super::message::Message;
use crate::config::MAX_MESSAGE_BYTES;

/// An error produced while decoding one line of the frame stream.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("malformed JSON on line: {0}")]
    MalformedJson(String),
    #[error("message exceeded {limit} bytes, connection must be dropped")]
    MessageTooLarge { limit: usize },
}

/// Incremental newline-delimited JSON decoder for one connection.
///
/// Feed raw bytes via [`FrameDecoder::push`]; it returns the messages
/// decoded so far (malformed lines are reported as `Err` but do not stop
/// the stream) along with any partial trailing fragment retained for the
/// next push.
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_message_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_message_bytes,
        }
    }

    /// Appends newly-read bytes and drains every complete line, returning
    /// one `Result` per line. A [`FrameError::MessageTooLarge`] means the
    /// caller must close the connection; the decoder does not try to
    /// recover mid-oversized-frame.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<Message, FrameError>> {
        self.buffer.extend_from_slice(bytes);
        let mut results = Vec::new();

        loop {
            let newline_pos = match self.buffer.iter().position(|&b| b == b'\n') {
                Some(pos) => pos,
                None => break,
            };

            if newline_pos > self.max_message_bytes {
                results.push(Err(FrameError::MessageTooLarge {
                    limit: self.max_message_bytes,
                }));
                self.buffer.clear();
                return results;
            }

            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = &line[..line.len() - 1];

            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<Message>(line) {
                Ok(msg) => results.push(Ok(msg)),
                Err(_) if unknown_message_type(line) => {
                    // Unknown `type` tag: ignored per protocol, not a framing
                    // error — no warning, no entry in the result stream.
                }
                Err(_) => {
                    let text = String::from_utf8_lossy(line).to_string();
                    warn!(line = %text, "malformed JSON frame, skipping");
                    results.push(Err(FrameError::MalformedJson(text)));
                }
            }
        }

        if self.buffer.len() > self.max_message_bytes {
            results.push(Err(FrameError::MessageTooLarge {
                limit: self.max_message_bytes,
            }));
            self.buffer.clear();
        }

        results
    }
}

/// Encodes a message as a single `\n`-terminated JSON line.
pub fn encode(msg: &Message) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(msg)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Whether `line` is valid JSON carrying a `type` field whose value isn't
/// one of [`Message`]'s known tags. Distinguishes "unknown message type —
/// ignore" from genuinely malformed JSON or a message missing its tag
/// entirely, both of which are still reported as [`FrameError::MalformedJson`].
fn unknown_message_type(line: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(line) {
        Ok(serde_json::Value::Object(fields)) => match fields.get("type") {
            Some(serde_json::Value::String(tag)) => !Message::is_known_type(tag),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeId;

    #[test]
    fn decodes_single_complete_message() {
        let mut dec = FrameDecoder::default();
        let results = dec.push(b"{\"type\":\"PING\"}\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &Message::Ping);
    }

    #[test]
    fn retains_partial_fragment_across_pushes() {
        let mut dec = FrameDecoder::default();
        let first = dec.push(b"{\"type\":\"PI");
        assert!(first.is_empty());
        let second = dec.push(b"NG\"}\n");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].as_ref().unwrap(), &Message::Ping);
    }

    #[test]
    fn decodes_multiple_messages_in_one_push() {
        let mut dec = FrameDecoder::default();
        let results = dec.push(b"{\"type\":\"PING\"}\n{\"type\":\"PONG\"}\n");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), &Message::Ping);
        assert_eq!(results[1].as_ref().unwrap(), &Message::Pong);
    }

    #[test]
    fn malformed_json_reports_error_and_keeps_stream_alive() {
        let mut dec = FrameDecoder::default();
        let results = dec.push(b"not json at all\n{\"type\":\"PING\"}\n");
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(FrameError::MalformedJson(_))));
        assert_eq!(results[1].as_ref().unwrap(), &Message::Ping);
    }

    #[test]
    fn unknown_type_is_silently_ignored_not_reported_as_an_error() {
        let mut dec = FrameDecoder::default();
        let results = dec.push(b"{\"type\":\"NOT_A_REAL_TYPE\"}\n{\"type\":\"PING\"}\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &Message::Ping);
    }

    #[test]
    fn missing_type_field_is_still_reported_as_malformed() {
        let mut dec = FrameDecoder::default();
        let results = dec.push(b"{\"not_type\":1}\n");
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FrameError::MalformedJson(_))));
    }

    #[test]
    fn oversized_line_yields_message_too_large_and_clears_buffer() {
        let mut dec = FrameDecoder::new(16);
        let oversized = vec![b'a'; 64];
        let mut line = oversized.clone();
        line.push(b'\n');
        let results = dec.push(&line);
        assert_eq!(
            results,
            vec![Err(FrameError::MessageTooLarge { limit: 16 })]
        );
    }

    #[test]
    fn blank_lines_are_skipped_without_producing_a_result() {
        let mut dec = FrameDecoder::default();
        let results = dec.push(b"\n\n{\"type\":\"PING\"}\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &Message::Ping);
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let msg = Message::RegisterRequest {
            peer: NodeId::new("127.0.0.1", 7000),
        };
        let bytes = encode(&msg).unwrap();
        assert!(bytes.ends_with(b"\n"));
        let mut dec = FrameDecoder::default();
        let results = dec.push(&bytes);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &msg);
    }
}
