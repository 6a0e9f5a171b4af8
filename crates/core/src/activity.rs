//! Session event recording for later review by caregivers and managers.

use crate::identity::Identity;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    UserMessage,
    AssistantReply,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::SessionStart => "session_start",
            EventType::UserMessage => "user_message",
            EventType::AssistantReply => "assistant_reply",
        }
    }
}

/// Where a piece of user input came from. Recorded with every event so the
/// review views can distinguish typed, spoken, and tapped interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Typed,
    Spoken,
    TappedOption,
    MetaIntent,
    SessionStart,
}

impl InputSource {
    pub fn as_str(self) -> &'static str {
        match self {
            InputSource::Typed => "typed",
            InputSource::Spoken => "spoken",
            InputSource::TappedOption => "tapped_option",
            InputSource::MetaIntent => "meta_intent",
            InputSource::SessionStart => "session_start",
        }
    }
}

/// Sink for session events. Implementations persist; callers treat recording
/// as best-effort and never fail a turn over it.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    async fn record_event(
        &self,
        identity: &Identity,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_use_snake_case_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::SessionStart).unwrap(),
            "\"session_start\""
        );
        assert_eq!(EventType::AssistantReply.as_str(), "assistant_reply");
    }

    #[test]
    fn input_sources_cover_all_entry_points() {
        let sources = [
            InputSource::Typed,
            InputSource::Spoken,
            InputSource::TappedOption,
            InputSource::MetaIntent,
            InputSource::SessionStart,
        ];
        let names: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec!["typed", "spoken", "tapped_option", "meta_intent", "session_start"]
        );
    }
}
