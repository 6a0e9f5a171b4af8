//! The per-session turn state machine.
//!
//! One orchestrator owns one session's scenario, dialogue history, and
//! current suggestion lists. Exactly one model round-trip is in flight at a
//! time; the machine forbids re-entry while a reply is awaited, and every
//! failure path still returns the machine to `Idle` with a usable reply, so
//! a conversation can never get stuck.

use crate::Command;
use crate::activity::InputSource;
use crate::contract::{Degradation, ModelReply};
use crate::gateway::ModelGateway;
use crate::history::{DialogueHistory, Turn};
use crate::intent::UniversalIntent;
use crate::options::{InputModality, OptionTile, build_options};
use crate::prompt::build_system_prompt;
use crate::scenario::{SESSION_START, ScenarioContext};
use crate::speech::TranscriptEvent;
use anyhow::{Result, bail};
use tracing::warn;

/// Fixed reply substituted when the model call or its response fails.
pub const FALLBACK_REPLY: &str = "Der opstod en fejl.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next input.
    Idle,
    /// A model call is in flight.
    AwaitingReply,
}

/// One unit of user input, tagged with where it came from. All entry points
/// (typed text, speech, tapped tiles, meta intents) funnel through this one
/// type so the orchestrator is the single writer of the history.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Typed(String),
    Spoken(String),
    TappedOption(String),
    Meta(UniversalIntent),
}

impl UserInput {
    pub fn source(&self) -> InputSource {
        match self {
            UserInput::Typed(_) => InputSource::Typed,
            UserInput::Spoken(_) => InputSource::Spoken,
            UserInput::TappedOption(_) => InputSource::TappedOption,
            UserInput::Meta(_) => InputSource::MetaIntent,
        }
    }

    /// The single string recorded in the history and sent to the model.
    /// Meta intents become their tagged escape-hatch form.
    pub fn to_model_text(&self) -> String {
        match self {
            UserInput::Typed(text)
            | UserInput::Spoken(text)
            | UserInput::TappedOption(text) => text.clone(),
            UserInput::Meta(intent) => intent.to_model_text(),
        }
    }
}

/// The result of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub assistant_reply: String,
    /// Set when the model output needed repair; observability only.
    pub degradation: Option<Degradation>,
    /// True when the reply is the fixed fallback after a gateway failure.
    pub fallback: bool,
    /// Playback command for the runtime, carrying its own copy of the text.
    pub command: Option<Command>,
}

pub struct TurnOrchestrator {
    scenario: ScenarioContext,
    history: DialogueHistory,
    suggestions: ModelReply,
    state: SessionState,
    listening: bool,
}

impl TurnOrchestrator {
    pub fn new(scenario: ScenarioContext) -> Self {
        Self {
            scenario,
            history: DialogueHistory::new(),
            suggestions: ModelReply::default(),
            state: SessionState::Idle,
            listening: false,
        }
    }

    pub fn scenario(&self) -> &ScenarioContext {
        &self.scenario
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the automatic opening turn still has to run.
    pub fn needs_seeding(&self) -> bool {
        self.history.is_empty()
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Toggles the one-shot speech listening flag. Turning it off is the
    /// only cancellation primitive for the transcript feed; it stops further
    /// history mutation from that source but does not interrupt an in-flight
    /// model call.
    pub fn set_listening(&mut self, enabled: bool) {
        self.listening = enabled;
    }

    /// Runs the automatic seeding turn on an empty history: the scenario's
    /// opening line (or the session-start sentinel) is sent through the
    /// model exactly like a normal turn, but only the resulting assistant
    /// turn is stored, so the greeting is not double-counted as a user
    /// message.
    pub async fn seed(&mut self, gateway: &dyn ModelGateway) -> Result<TurnOutcome> {
        if self.state != SessionState::Idle {
            bail!("seed called while a reply is awaited");
        }
        if !self.history.is_empty() {
            bail!("seed called on a non-empty history");
        }
        let opening = self
            .scenario
            .opening_line()
            .unwrap_or(SESSION_START)
            .to_string();
        Ok(self.round_trip(&opening, gateway).await)
    }

    /// Handles one external input event: normalize, append the user turn,
    /// drive one model round-trip, append the assistant turn, and replace
    /// the current suggestions.
    pub async fn submit(
        &mut self,
        input: UserInput,
        gateway: &dyn ModelGateway,
    ) -> Result<TurnOutcome> {
        if self.state != SessionState::Idle {
            bail!("input received while a reply is awaited");
        }
        let text = input.to_model_text();
        self.history.push_user(text.clone());
        Ok(self.round_trip(&text, gateway).await)
    }

    /// Feeds one transcript event through the same pipeline as typed input.
    ///
    /// Partials never touch the history. A final transcript drives at most
    /// one turn per enable: the listening flag is cleared before the model
    /// call so a racing duplicate cannot submit twice.
    pub async fn handle_transcript(
        &mut self,
        event: &TranscriptEvent,
        gateway: &dyn ModelGateway,
    ) -> Result<Option<TurnOutcome>> {
        if !self.listening {
            return Ok(None);
        }
        let Some(text) = event.final_transcript() else {
            return Ok(None);
        };
        let text = text.to_string();
        self.listening = false;
        self.submit(UserInput::Spoken(text), gateway).await.map(Some)
    }

    async fn round_trip(&mut self, user_input: &str, gateway: &dyn ModelGateway) -> TurnOutcome {
        self.state = SessionState::AwaitingReply;
        let system_prompt = build_system_prompt(&self.scenario);
        // The just-appended user turn travels as the separate new input.
        let prior = match self.history.turns() {
            [] => &[][..],
            [prior @ .., _last] => prior,
        };

        let outcome = match gateway.complete(&system_prompt, prior, user_input).await {
            Ok(raw) => {
                let (reply, degradation) = ModelReply::parse(&raw);
                if let Some(degradation) = degradation {
                    warn!(?degradation, "model reply needed repair");
                }
                self.history.push_assistant(reply.assistant_reply.clone());
                let assistant_reply = reply.assistant_reply.clone();
                self.suggestions = ModelReply {
                    assistant_reply: String::new(),
                    ..reply
                };
                TurnOutcome {
                    command: speak_command(&assistant_reply),
                    assistant_reply,
                    degradation,
                    fallback: false,
                }
            }
            Err(error) => {
                warn!(%error, "model call failed; substituting fallback reply");
                self.history.push_assistant(FALLBACK_REPLY);
                self.suggestions = ModelReply::default();
                TurnOutcome {
                    assistant_reply: FALLBACK_REPLY.to_string(),
                    degradation: None,
                    fallback: true,
                    command: speak_command(FALLBACK_REPLY),
                }
            }
        };
        self.state = SessionState::Idle;
        outcome
    }

    /// The current option tiles under the given modality.
    pub fn options(&self, modality: InputModality) -> Vec<OptionTile> {
        build_options(&self.suggestions, modality)
    }

    /// Clears the history and suggestions; the next render triggers the
    /// seeding turn again.
    pub fn reset(&mut self) {
        self.history.clear();
        self.suggestions = ModelReply::default();
        self.state = SessionState::Idle;
        self.listening = false;
    }

    /// Replaces the active scenario. The history is never carried across
    /// scenarios.
    pub fn switch_scenario(&mut self, scenario: ScenarioContext) {
        self.scenario = scenario;
        self.reset();
    }
}

fn speak_command(text: &str) -> Option<Command> {
    if text.is_empty() {
        None
    } else {
        Some(Command::Speak(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockModelGateway;
    use crate::history::TurnRole;
    use crate::options::{DEFAULT_GREETING_GLYPH, FALLBACK_GLYPH};
    use anyhow::anyhow;

    fn scenario(first_message: Option<&str>) -> ScenarioContext {
        ScenarioContext {
            title: "Supermarked".to_string(),
            description: "Køb ind til et måltid.".to_string(),
            prompt_addition: "Du er ekspedient i et supermarked.".to_string(),
            first_message: first_message.map(str::to_string),
        }
    }

    fn gateway_returning(raw: &str) -> MockModelGateway {
        let raw = raw.to_string();
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .returning(move |_, _, _| Ok(raw.clone()));
        gateway
    }

    const GREETING: &str = r#"{"assistant_reply":"Hej og velkommen!",
        "text_suggestions":["Hej","Jeg vil købe mælk","Farvel"],
        "emoji_suggestions":["👋","🥛","🚪"]}"#;

    #[tokio::test]
    async fn seeding_uses_first_message_and_stores_only_the_assistant_turn() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .withf(|_, history, input| history.is_empty() && input == "Velkommen!")
            .returning(|_, _, _| Ok(GREETING.to_string()));

        let mut orchestrator = TurnOrchestrator::new(scenario(Some("Velkommen!")));
        assert!(orchestrator.needs_seeding());
        let outcome = orchestrator.seed(&gateway).await.unwrap();

        assert_eq!(outcome.assistant_reply, "Hej og velkommen!");
        assert_eq!(orchestrator.history().len(), 1);
        assert_eq!(orchestrator.history()[0].role, TurnRole::Assistant);
        assert!(!orchestrator.needs_seeding());
        assert_eq!(
            outcome.command,
            Some(Command::Speak("Hej og velkommen!".to_string()))
        );
    }

    #[tokio::test]
    async fn seeding_without_first_message_sends_the_sentinel() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .withf(|_, _, input| input == SESSION_START)
            .returning(|_, _, _| Ok(GREETING.to_string()));

        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
        assert_eq!(orchestrator.history().len(), 1);
    }

    #[tokio::test]
    async fn seeding_twice_is_rejected() {
        let gateway = gateway_returning(GREETING);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
        assert!(orchestrator.seed(&gateway).await.is_err());
    }

    #[tokio::test]
    async fn successful_turn_grows_history_by_two() {
        let gateway = gateway_returning(GREETING);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
        let before = orchestrator.history().len();

        orchestrator
            .submit(UserInput::Typed("Jeg vil købe mælk".to_string()), &gateway)
            .await
            .unwrap();

        assert_eq!(orchestrator.history().len(), before + 2);
        let turns = orchestrator.history();
        assert_eq!(turns[turns.len() - 2].role, TurnRole::User);
        assert_eq!(turns[turns.len() - 1].role, TurnRole::Assistant);
        assert_eq!(orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn system_prompt_carries_policy_and_scenario_addition() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .withf(|system, _, _| {
                system.contains("Svar altid på dansk")
                    && system.ends_with("Du er ekspedient i et supermarked.")
            })
            .returning(|_, _, _| Ok(GREETING.to_string()));

        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
    }

    #[tokio::test]
    async fn meta_intent_is_sent_as_tagged_string_and_recorded_verbatim() {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .withf(|_, _, input| input.contains("<meta:HELP>") && input.contains("Hjælp"))
            .returning(|_, _, _| Ok(GREETING.to_string()));

        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator
            .submit(UserInput::Meta(UniversalIntent::Help), &gateway)
            .await
            .unwrap();

        let user_turn = &orchestrator.history()[0];
        assert_eq!(user_turn.role, TurnRole::User);
        assert_eq!(user_turn.text, "<meta:HELP> Hjælp");
    }

    #[tokio::test]
    async fn prior_history_excludes_the_turn_being_submitted() {
        let gateway = gateway_returning(GREETING);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();

        let mut gateway = MockModelGateway::new();
        gateway
            .expect_complete()
            .withf(|_, history, input| {
                history.len() == 1
                    && history[0].role == TurnRole::Assistant
                    && input == "Hej"
            })
            .returning(|_, _, _| Ok(GREETING.to_string()));
        orchestrator
            .submit(UserInput::TappedOption("Hej".to_string()), &gateway)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn gateway_failure_substitutes_fallback_and_returns_to_idle() {
        let gateway = gateway_returning(GREETING);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
        let before = orchestrator.history().len();

        let mut failing = MockModelGateway::new();
        failing
            .expect_complete()
            .returning(|_, _, _| Err(anyhow!("connection timed out")));

        let outcome = orchestrator
            .submit(UserInput::Typed("Hej".to_string()), &failing)
            .await
            .unwrap();

        assert!(outcome.fallback);
        assert_eq!(outcome.assistant_reply, FALLBACK_REPLY);
        assert_eq!(orchestrator.state(), SessionState::Idle);
        // one user turn plus exactly one fallback assistant turn
        assert_eq!(orchestrator.history().len(), before + 2);
        assert_eq!(
            orchestrator.history().last().unwrap().text,
            FALLBACK_REPLY
        );
        // suggestions are cleared, so only the default greeting tile remains
        let tiles = orchestrator.options(InputModality::Pictorial);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].display, DEFAULT_GREETING_GLYPH);
    }

    #[tokio::test]
    async fn degraded_reply_still_completes_the_turn() {
        let gateway = gateway_returning("not json");
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        let outcome = orchestrator.seed(&gateway).await.unwrap();

        assert_eq!(outcome.assistant_reply, "not json");
        assert_eq!(outcome.degradation, Some(Degradation::InvalidJson));
        assert!(!outcome.fallback);
        assert_eq!(orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn options_follow_the_latest_reply_and_modality() {
        let raw = r#"{"assistant_reply":"Hvad vil du købe?",
            "text_suggestions":["Mælk","Brød","Ost"],
            "emoji_suggestions":[]}"#;
        let gateway = gateway_returning(raw);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();

        let text_tiles = orchestrator.options(InputModality::Text);
        assert_eq!(text_tiles.len(), 3);
        assert!(text_tiles.iter().all(|t| t.display == t.meaning));

        let emoji_tiles = orchestrator.options(InputModality::Pictorial);
        assert_eq!(emoji_tiles.len(), 3);
        assert!(emoji_tiles.iter().all(|t| t.display == FALLBACK_GLYPH));
        assert_eq!(emoji_tiles[1].meaning, "Brød");
    }

    #[tokio::test]
    async fn final_transcript_drives_one_turn_and_disables_listening() {
        let gateway = gateway_returning(GREETING);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
        orchestrator.set_listening(true);

        let partial = TranscriptEvent {
            partial: Some("jeg vil".to_string()),
            final_text: None,
        };
        assert!(
            orchestrator
                .handle_transcript(&partial, &gateway)
                .await
                .unwrap()
                .is_none()
        );

        let done = TranscriptEvent {
            partial: None,
            final_text: Some("jeg vil gerne købe mælk".to_string()),
        };
        let outcome = orchestrator
            .handle_transcript(&done, &gateway)
            .await
            .unwrap();
        assert!(outcome.is_some());
        assert!(!orchestrator.is_listening());

        // a second final transcript without re-enabling is ignored
        assert!(
            orchestrator
                .handle_transcript(&done, &gateway)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn transcripts_are_ignored_while_not_listening() {
        let gateway = MockModelGateway::new();
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        let done = TranscriptEvent {
            partial: None,
            final_text: Some("hej".to_string()),
        };
        assert!(
            orchestrator
                .handle_transcript(&done, &gateway)
                .await
                .unwrap()
                .is_none()
        );
        assert!(orchestrator.history().is_empty());
    }

    #[tokio::test]
    async fn reset_and_scenario_switch_clear_session_state() {
        let gateway = gateway_returning(GREETING);
        let mut orchestrator = TurnOrchestrator::new(scenario(None));
        orchestrator.seed(&gateway).await.unwrap();
        orchestrator.set_listening(true);

        orchestrator.reset();
        assert!(orchestrator.needs_seeding());
        assert!(!orchestrator.is_listening());
        assert!(orchestrator.options(InputModality::Text).is_empty());
        assert_eq!(orchestrator.options(InputModality::Pictorial).len(), 1);

        orchestrator.seed(&gateway).await.unwrap();
        orchestrator.switch_scenario(scenario(Some("Goddag!")));
        assert!(orchestrator.needs_seeding());
        assert_eq!(orchestrator.scenario().opening_line(), Some("Goddag!"));
    }
}
