//! Samtale Core
//!
//! This library contains the conversation-turn orchestration core of the
//! Samtale trainer: scenario framing, policy prompt composition, the dialogue
//! history, the model gateway contract, strict-JSON response validation, and
//! the derivation of the interactive option tiles shown after every turn.
//! Everything that talks to the outside world (HTTP, database, speech
//! synthesis) lives behind the traits defined here and is implemented by the
//! service crate.

pub mod activity;
pub mod contract;
pub mod gateway;
pub mod history;
pub mod identity;
pub mod intent;
pub mod options;
pub mod orchestrator;
pub mod prompt;
pub mod scenario;
pub mod speech;

/// Represents commands that the core logic issues to an external runtime.
///
/// This enum decouples the orchestrator's decision-making from the runtime's
/// execution of side effects. Playback must operate on the carried copy of
/// the text, never on live session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Command the runtime to speak the given text to the user.
    Speak(String),
}
