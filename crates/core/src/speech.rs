//! Speech collaborator boundaries: best-effort playback out, transcript
//! events in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speaks text to the user. Best-effort: implementations swallow their own
/// errors (after logging) and must operate on the copy of the text they are
/// given, never on live session state.
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str);
}

/// One event from the inbound speech-transcription feed. Only a non-empty
/// `final` text drives a turn; partials are display-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    pub final_text: Option<String>,
}

impl TranscriptEvent {
    /// The final transcript, if this event carries a usable one.
    pub fn final_transcript(&self) -> Option<&str> {
        self.final_text
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
