//! Payloads exchanged by the framenet command line tool

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A short text note sent from one host to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Human-readable name of the sending host
    pub sender: String,
    /// Note body
    pub text: String,
    /// Milliseconds since the Unix epoch when the note was written
    pub sent_at_ms: u64,
}

impl Note {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        let sent_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            sender: sender.into(),
            text: text.into(),
            sent_at_ms,
        }
    }
}
