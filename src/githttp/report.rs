//! Ref-update extraction from the receive-pack report stream.
//!
//! The post-receive hook echoes its stdin (one `<before> <after> <ref>`
//! line per updated ref) into the stream receive-pack sends back to the
//! client. The tee collects the pkt-line payloads of that stream, drops
//! the first packet (the per-push status header) and scans the remainder
//! for ref-update lines.

use regex::Regex;
use std::sync::OnceLock;

use crate::events::{RefChange, RefKind};
use crate::githttp::pktline::{PktEvent, PktLineParser};

fn ref_update_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([0-9a-f]{40}) ([0-9a-f]{40}) refs/(heads|tags)/(\S+)")
            .expect("ref update regex")
    })
}

/// Accumulates the server-to-client receive-pack stream and turns it into
/// ref changes once the child exits.
#[derive(Debug, Default)]
pub struct ReceiveReport {
    parser: PktLineParser,
    packets: Vec<Vec<u8>>,
}

impl ReceiveReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the child's stdout.
    pub fn feed(&mut self, bytes: &[u8]) {
        for event in self.parser.push(bytes) {
            if let PktEvent::Packet(payload) = event {
                self.packets.push(payload);
            }
        }
    }

    /// Extract the ref updates reported by the push.
    pub fn into_changes(self) -> Vec<RefChange> {
        if self.packets.len() < 2 {
            return Vec::new();
        }

        // first packet is the status header; the rest carry the hook echo
        let body: Vec<u8> = self.packets[1..].concat();
        let text = String::from_utf8_lossy(&body);

        let mut changes = Vec::new();
        for line in text.lines() {
            if let Some(caps) = ref_update_re().captures(line) {
                let kind = match &caps[3] {
                    "heads" => RefKind::Head,
                    _ => RefKind::Tag,
                };
                changes.push(RefChange {
                    kind,
                    ref_name: caps[4].to_string(),
                    before: caps[1].to_string(),
                    after: caps[2].to_string(),
                });
            }
        }
        changes
    }
}
