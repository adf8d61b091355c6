//! Per-line parse result for the live stream

use crate::traits::IncomingPost;

/// Top-level keys of the stream's non-post notices
const CONTROL_KINDS: &[&str] = &[
    "delete",
    "scrub_geo",
    "limit",
    "status_withheld",
    "user_withheld",
    "disconnect",
    "warning",
    "friends",
    "event",
];

/// One line read off the live connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// Blank line sent to keep the connection open
    KeepAlive,
    /// A post record
    Post(Box<IncomingPost>),
    /// Routine control traffic (deletion notices, limit notices, ...)
    Control {
        /// Top-level key naming the notice, e.g. `delete`
        kind: String,
    },
    /// Anything else that is not a post record
    Malformed {
        /// The line as received
        raw: String,
        /// Why it was rejected
        reason: String,
    },
}

impl StreamMessage {
    /// Parse one raw line
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return StreamMessage::KeepAlive;
        }

        let value: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(e) => return Self::malformed(line, e.to_string()),
        };

        if let Some(kind) = control_kind(&value) {
            return StreamMessage::Control {
                kind: kind.to_string(),
            };
        }

        match serde_json::from_value::<IncomingPost>(value) {
            Ok(post) => StreamMessage::Post(Box::new(post)),
            Err(e) => Self::malformed(line, e.to_string()),
        }
    }

    fn malformed(line: &str, reason: String) -> Self {
        StreamMessage::Malformed {
            raw: line.to_string(),
            reason,
        }
    }
}

/// Notice kind, if `value` is a control message rather than a post
fn control_kind(value: &serde_json::Value) -> Option<&'static str> {
    let object = value.as_object()?;
    if object.contains_key("id_str") {
        return None;
    }
    CONTROL_KINDS.iter().copied().find(|kind| object.contains_key(*kind))
}
