//! Git pkt-line framing.
//!
//! Every packet is a 4-char hex length prefix (covering itself) followed
//! by the payload. `0000` is a flush packet. Malformed input poisons the
//! parser: no further packets are produced, but the transport carrying the
//! bytes is never failed from here.

/// the flush packet
pub const FLUSH_PKT: &[u8] = b"0000";

/// Frame `data` as a single pkt-line.
pub fn pkt_line(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:04x}", data.len() + 4).into_bytes();
    out.extend_from_slice(data);
    out
}

/// one parsed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktEvent {
    /// a data packet's payload
    Packet(Vec<u8>),
    /// a `0000` flush packet
    Flush,
}

/// Incremental pkt-line parser.
///
/// Feed byte chunks as they arrive; complete frames come back as events.
/// Partial frames are buffered until the rest shows up.
#[derive(Debug, Default)]
pub struct PktLineParser {
    buf: Vec<u8>,
    skip_newline: bool,
    poisoned: bool,
}

impl PktLineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a protocol error has disabled this parser.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Consume a chunk and return every complete frame it finished.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<PktEvent> {
        let mut events = Vec::new();
        if self.poisoned {
            return events;
        }
        self.buf.extend_from_slice(bytes);

        loop {
            if self.skip_newline {
                if self.buf.is_empty() {
                    break;
                }
                if self.buf[0] == b'\n' {
                    self.buf.remove(0);
                }
                self.skip_newline = false;
            }

            if self.buf.len() < 4 {
                break;
            }

            let len = match parse_length(&self.buf[..4]) {
                Some(len) => len,
                None => {
                    self.poisoned = true;
                    break;
                }
            };

            if len == 0 {
                self.buf.drain(..4);
                self.skip_newline = true;
                events.push(PktEvent::Flush);
                continue;
            }

            // 1..=4 cannot frame any payload
            if len <= 4 {
                self.poisoned = true;
                break;
            }

            if self.buf.len() < len {
                break;
            }

            let payload = self.buf[4..len].to_vec();
            self.buf.drain(..len);
            events.push(PktEvent::Packet(payload));
        }

        events
    }
}

fn parse_length(prefix: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(prefix).ok()?;
    usize::from_str_radix(text, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkt_line_framing() {
        assert_eq!(pkt_line(b"# service=git-upload-pack\n").len(), 4 + 26);
        assert_eq!(&pkt_line(b"hi")[..4], b"0006");
    }

    #[test]
    fn test_single_packet() {
        let mut parser = PktLineParser::new();
        let events = parser.push(&pkt_line(b"hello\n"));
        assert_eq!(events, vec![PktEvent::Packet(b"hello\n".to_vec())]);
    }

    #[test]
    fn test_flush_packet() {
        let mut parser = PktLineParser::new();
        let events = parser.push(b"0000");
        assert_eq!(events, vec![PktEvent::Flush]);
    }

    #[test]
    fn test_flush_swallows_following_newline() {
        let mut parser = PktLineParser::new();
        let mut input = Vec::new();
        input.extend_from_slice(b"0000");
        input.push(b'\n');
        input.extend_from_slice(&pkt_line(b"after"));

        let events = parser.push(&input);
        assert_eq!(
            events,
            vec![PktEvent::Flush, PktEvent::Packet(b"after".to_vec())]
        );
    }

    #[test]
    fn test_split_across_chunks() {
        let mut parser = PktLineParser::new();
        let frame = pkt_line(b"split payload");

        let events = parser.push(&frame[..5]);
        assert!(events.is_empty());

        let events = parser.push(&frame[5..]);
        assert_eq!(events, vec![PktEvent::Packet(b"split payload".to_vec())]);
    }

    #[test]
    fn test_multiple_packets_one_chunk() {
        let mut parser = PktLineParser::new();
        let mut input = pkt_line(b"one");
        input.extend_from_slice(&pkt_line(b"two"));
        input.extend_from_slice(FLUSH_PKT);

        let events = parser.push(&input);
        assert_eq!(
            events,
            vec![
                PktEvent::Packet(b"one".to_vec()),
                PktEvent::Packet(b"two".to_vec()),
                PktEvent::Flush,
            ]
        );
    }

    #[test]
    fn test_malformed_hex_poisons() {
        let mut parser = PktLineParser::new();
        let events = parser.push(b"zzzz");
        assert!(events.is_empty());
        assert!(parser.is_poisoned());

        // further input is ignored, not a crash
        let events = parser.push(&pkt_line(b"ignored"));
        assert!(events.is_empty());
    }

    #[test]
    fn test_undersized_length_poisons() {
        let mut parser = PktLineParser::new();
        let events = parser.push(b"0003");
        assert!(events.is_empty());
        assert!(parser.is_poisoned());
    }

    #[test]
    fn test_events_before_poison_are_kept() {
        let mut parser = PktLineParser::new();
        let mut input = pkt_line(b"good");
        input.extend_from_slice(b"0002");

        let events = parser.push(&input);
        assert_eq!(events, vec![PktEvent::Packet(b"good".to_vec())]);
        assert!(parser.is_poisoned());
    }
}
