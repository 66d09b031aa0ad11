//! Chunks delivered to log subscribers.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// One unit of log output delivered to a subscriber.
///
/// Content within one file arrives in file order; a `Reset` always precedes
/// the replay of a truncated or rotated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LogChunk {
    /// The file does not exist yet; content follows once it is created.
    Waiting,
    /// New bytes read from the file.
    Data(Vec<u8>),
    /// The file shrank. Discard everything shown so far; a replay follows.
    Reset,
    /// Reading the file failed. Repeats of the same error are suppressed.
    Error(String),
}

impl LogChunk {
    /// Lossy UTF-8 view of a `Data` chunk.
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Data(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }

    pub const fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }
}
