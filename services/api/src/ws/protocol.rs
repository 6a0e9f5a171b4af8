//! Defines the WebSocket message protocol between the browser client and the API server.

use samtale_core::intent::UniversalIntent;
use samtale_core::options::{InputModality, OptionTile};
use samtale_core::scenario::ScenarioContext;
use samtale_core::speech::TranscriptEvent;
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Starts a training session. This must be the first message.
    #[serde(rename = "init")]
    Init {
        /// The account the client authenticated as.
        username: String,
        /// A predefined scenario, looked up by title.
        scenario_title: Option<String>,
        /// A free-form scenario entered by a therapist.
        custom_scenario: Option<ScenarioContext>,
    },
    /// A typed message from the user.
    #[serde(rename = "user_message")]
    UserMessage { text: String },
    /// The user tapped one of the suggested option tiles.
    #[serde(rename = "tap_option")]
    TapOption { meaning: String },
    /// The user tapped one of the four universal quick-response tiles.
    #[serde(rename = "meta_intent")]
    MetaIntent { intent: UniversalIntent },
    /// One event relayed from the speech transcriber.
    #[serde(rename = "transcript")]
    Transcript {
        #[serde(flatten)]
        event: TranscriptEvent,
    },
    /// Arms or disarms the one-shot speech listening flag.
    #[serde(rename = "set_listening")]
    SetListening { enabled: bool },
    /// Switches between text and pictorial option tiles.
    #[serde(rename = "set_modality")]
    SetModality { modality: InputModality },
    /// Switches to a different scenario, discarding the history.
    #[serde(rename = "select_scenario")]
    SelectScenario {
        scenario_title: Option<String>,
        custom_scenario: Option<ScenarioContext>,
    },
    /// Restarts the current scenario from an empty history.
    #[serde(rename = "reset")]
    Reset,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session is running under the given scenario.
    SessionStarted {
        scenario: ScenarioContext,
        /// The four always-available quick-response tiles.
        universal_options: Vec<OptionTile>,
    },
    /// One completed turn: the roleplay partner's reply and the new tiles.
    AssistantReply {
        text: String,
        options: Vec<OptionTile>,
        /// True when the model output needed repair before display.
        degraded: bool,
        /// True when the reply is the fixed error fallback.
        fallback: bool,
    },
    /// The option tiles rebuilt after a modality switch.
    Options { options: Vec<OptionTile> },
    /// Confirms the current state of the listening flag.
    Listening { enabled: bool },
    /// A synthesized reading of the reply (base64 encoded WAV).
    Audio { data: String },
    /// Reports a fatal error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_message_parses() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"init","username":"lars","scenario_title":"Supermarked"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Init {
                username,
                scenario_title,
                custom_scenario,
            } => {
                assert_eq!(username, "lars");
                assert_eq!(scenario_title.as_deref(), Some("Supermarked"));
                assert!(custom_scenario.is_none());
            }
            _ => panic!("expected init"),
        }
    }

    #[test]
    fn transcript_message_flattens_the_event() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"transcript","final":"jeg vil købe mælk"}"#).unwrap();
        match msg {
            ClientMessage::Transcript { event } => {
                assert_eq!(event.final_transcript(), Some("jeg vil købe mælk"));
            }
            _ => panic!("expected transcript"),
        }
    }

    #[test]
    fn meta_intent_uses_uppercase_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"meta_intent","intent":"HELP"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::MetaIntent {
                intent: UniversalIntent::Help
            }
        ));
    }

    #[test]
    fn server_messages_are_tagged_snake_case() {
        let json = serde_json::to_string(&ServerMessage::Listening { enabled: true }).unwrap();
        assert_eq!(json, r#"{"type":"listening","enabled":true}"#);

        let json = serde_json::to_string(&ServerMessage::AssistantReply {
            text: "Hej!".to_string(),
            options: vec![],
            degraded: false,
            fallback: false,
        })
        .unwrap();
        assert!(json.starts_with(r#"{"type":"assistant_reply""#));
    }
}
