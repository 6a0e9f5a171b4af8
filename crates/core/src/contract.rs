//! Validation and repair of the model's structured output.
//!
//! This is the boundary between an untrusted text generator and the typed
//! internal contract: whatever the model returns, the caller gets a
//! well-formed [`ModelReply`]. Degradations are repaired locally and reported
//! as a signal next to the reply, never as an error.

use serde::{Deserialize, Serialize};

/// Upper bound on the number of suggestion pairs kept from one reply.
pub const MAX_SUGGESTIONS: usize = 8;

/// The validated structured output of one model call.
///
/// Invariant: `text_suggestions` and `emoji_suggestions` have the same
/// length whenever both are non-empty, and the pairing is positional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    #[serde(default)]
    pub assistant_reply: String,
    #[serde(default)]
    pub text_suggestions: Vec<String>,
    #[serde(default)]
    pub emoji_suggestions: Vec<String>,
}

/// Why a raw model response needed repair. Surfaced for observability only;
/// the repaired reply is always usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// The raw text was not a JSON object; it was wrapped verbatim as the
    /// assistant reply.
    InvalidJson,
    /// Both suggestion lists were non-empty but their lengths differed; the
    /// longer one was truncated.
    PairingMismatch { text: usize, emoji: usize },
}

impl ModelReply {
    /// Parses raw model text, repairing it where necessary.
    ///
    /// Non-JSON text is never discarded: it becomes the assistant reply with
    /// empty suggestion lists. Missing keys take their defaults. A pairing
    /// mismatch between the two lists is repaired by truncating the longer
    /// list; positional pairing takes precedence over completeness, so no
    /// entry is ever fabricated.
    pub fn parse(raw: &str) -> (Self, Option<Degradation>) {
        let mut reply: Self = match serde_json::from_str(raw) {
            Ok(reply) => reply,
            Err(_) => {
                return (
                    Self {
                        assistant_reply: raw.to_string(),
                        ..Self::default()
                    },
                    Some(Degradation::InvalidJson),
                );
            }
        };

        let text_len = reply.text_suggestions.len();
        let emoji_len = reply.emoji_suggestions.len();
        let mut degradation = None;
        if text_len > 0 && emoji_len > 0 && text_len != emoji_len {
            let keep = text_len.min(emoji_len);
            reply.text_suggestions.truncate(keep);
            reply.emoji_suggestions.truncate(keep);
            degradation = Some(Degradation::PairingMismatch {
                text: text_len,
                emoji: emoji_len,
            });
        }

        reply.text_suggestions.truncate(MAX_SUGGESTIONS);
        reply.emoji_suggestions.truncate(MAX_SUGGESTIONS);

        (reply, degradation)
    }
}
