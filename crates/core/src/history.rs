//! The append-only dialogue log of one session.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged message. Immutable once appended; the order of turns is
/// conversational order and is replayed verbatim to the model on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// Ordered sequence of turns, owned exclusively by one session's
/// orchestrator. Grows monotonically within a session; cleared only on
/// explicit reset or scenario switch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueHistory {
    turns: Vec<Turn>,
}

impl DialogueHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: TurnRole::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: TurnRole::Assistant,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_conversational_order() {
        let mut history = DialogueHistory::new();
        history.push_assistant("Hej!");
        history.push_user("Hej, jeg vil gerne købe mælk.");
        history.push_assistant("Selvfølgelig, andet?");

        let roles: Vec<TurnRole> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::Assistant, TurnRole::User, TurnRole::Assistant]
        );
        assert_eq!(history.turns()[1].text, "Hej, jeg vil gerne købe mælk.");
    }

    #[test]
    fn clear_empties_the_log() {
        let mut history = DialogueHistory::new();
        history.push_user("hej");
        assert!(!history.is_empty());
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn role_display_matches_wire_names() {
        assert_eq!(TurnRole::User.to_string(), "user");
        assert_eq!(TurnRole::Assistant.to_string(), "assistant");
    }
}
