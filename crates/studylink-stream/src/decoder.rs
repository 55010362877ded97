//! Evaluation stream decoder with line buffering.
//!
//! Frames can span multiple TCP packets, so bytes are buffered until a
//! complete line is available before parsing.

use studylink_core::StreamEvent;
use tracing::warn;

/// Prefix marking a data-bearing line; everything else is keep-alive noise.
const DATA_PREFIX: &str = "data: ";

/// Stateful decoder turning raw transport bytes into stream events.
///
/// One decoder serves one connection. After the terminal marker has been
/// observed, all further input is dropped unparsed.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Buffer for incomplete lines
    buffer: String,
    /// Latched once the terminal marker has been seen
    finished: bool,
}

impl StreamDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the decoder and return any complete events.
    ///
    /// Call this for each chunk received from the transport. Events come
    /// out one at a time, in arrival order, never reordered. The terminal
    /// marker is included as the last event it will ever return.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        self.drain_complete_lines()
    }

    /// Whether the terminal marker has been observed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Parse complete lines out of the buffer.
    fn drain_complete_lines(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        while !self.finished {
            let newline_pos = match self.buffer.find('\n') {
                Some(pos) => pos,
                None => break, // No complete line yet
            };

            let line = self.buffer[..newline_pos].to_string();
            self.buffer = self.buffer[newline_pos + 1..].to_string();

            // Tolerate \r\n line endings
            let line = line.trim_end_matches('\r');

            if let Some(event) = self.parse_line(line) {
                let terminal = event.is_terminal();
                events.push(event);
                if terminal {
                    self.finished = true;
                    self.buffer.clear();
                }
            }
        }

        events
    }

    /// Parse a single complete line.
    ///
    /// Returns `None` for keep-alive noise and for payloads that are not
    /// valid event JSON - a malformed single frame never aborts the stream.
    fn parse_line(&self, line: &str) -> Option<StreamEvent> {
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        if payload.is_empty() {
            return None;
        }

        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(%err, payload, "skipping malformed stream frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studylink_core::Stage;

    #[test]
    fn test_simple_event() {
        let mut decoder = StreamDecoder::new();
        let events =
            decoder.feed(b"data: {\"event\":\"node\",\"node\":\"classify_initial\",\"message\":\"working\"}\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage(), Some(Stage::ClassifyInitial));
        assert_eq!(events[0].message.as_deref(), Some("working"));
        assert!(!decoder.is_finished());
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = StreamDecoder::new();

        let events = decoder.feed(b"data: {\"event\":\"node\",\"no");
        assert!(events.is_empty());

        let events = decoder.feed(b"de\":\"summarize_evaluation\"}\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage(), Some(Stage::SummarizeEvaluation));
    }

    #[test]
    fn test_noise_lines_ignored() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b": keep-alive\n\ndata: {\"event\":\"node\",\"node\":\"load_next_initial\"}\n",
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage(), Some(Stage::LoadNextInitial));
    }

    #[test]
    fn test_empty_payload_ignored() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: \n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_malformed_frame_skipped_stream_continues() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b"data: {not json\ndata: {\"event\":\"node\",\"node\":\"classify_initial\",\"details\":{\"study_id\":7,\"decision\":\"match\"}}\n",
        );

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage(), Some(Stage::ClassifyInitial));
    }

    #[test]
    fn test_terminal_marker_stops_decoding() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b"data: {\"event\":\"complete\"}\ndata: {\"event\":\"node\",\"node\":\"classify_initial\"}\n",
        );

        // The frame after the terminal marker is never parsed.
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
        assert!(decoder.is_finished());

        let events = decoder.feed(b"data: {\"event\":\"node\",\"node\":\"classify_unsure\"}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: {\"event\":\"node\",\"node\":\"prepare_report_pdf\"}\r\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stage(), Some(Stage::PrepareReportPdf));
    }

    #[test]
    fn test_multiple_events_one_chunk() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b"data: {\"event\":\"node\",\"node\":\"load_next_initial\"}\ndata: {\"event\":\"node\",\"node\":\"classify_initial\"}\n",
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stage(), Some(Stage::LoadNextInitial));
        assert_eq!(events[1].stage(), Some(Stage::ClassifyInitial));
    }

    #[test]
    fn test_unknown_event_kind_still_decoded() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b"data: {\"event\":\"unknown\",\"message\":\"odd frame\"}\n");

        // Anything that is not the terminal marker is an ordinary record.
        assert_eq!(events.len(), 1);
        assert!(!events[0].is_terminal());
        assert_eq!(events[0].message.as_deref(), Some("odd frame"));
    }
}
