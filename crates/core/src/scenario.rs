use serde::{Deserialize, Serialize};

/// Reserved token sent as the user input of the automatic seeding turn when
/// the scenario has no opening line. The policy prompt instructs the model to
/// open the conversation with a greeting when it sees this token.
pub const SESSION_START: &str = "<session_start>";

/// The fixed framing of the active roleplay.
///
/// A `ScenarioContext` is immutable for the lifetime of a session. Selecting
/// a different scenario, or editing an ad-hoc one, produces a new instance
/// and resets the dialogue history: turns are never produced under more than
/// one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioContext {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Appended below the fixed policy prompt on every model call.
    #[serde(default, rename = "system_prompt_addition")]
    pub prompt_addition: String,
    /// Optional opening replica used as the input of the seeding turn.
    #[serde(default, rename = "first_message")]
    pub first_message: Option<String>,
}

impl ScenarioContext {
    /// Builds an ad-hoc scenario from free-form fields, as entered by a
    /// therapist. Blank titles get a placeholder so the scenario stays
    /// addressable in the UI.
    pub fn ad_hoc(
        title: &str,
        description: &str,
        prompt_addition: &str,
        first_message: &str,
    ) -> Self {
        let title = title.trim();
        Self {
            title: if title.is_empty() {
                "Mit ad-hoc scenarie".to_string()
            } else {
                title.to_string()
            },
            description: description.trim().to_string(),
            prompt_addition: prompt_addition.trim().to_string(),
            first_message: Some(first_message.trim().to_string()),
        }
    }

    /// The opening line of the seeding turn, if the scenario provides one.
    /// Whitespace-only values count as absent.
    pub fn opening_line(&self) -> Option<&str> {
        self.first_message
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Read-only access to the available predefined scenarios.
pub trait ScenarioStore: Send + Sync {
    /// All scenarios, ordered by title.
    fn list(&self) -> Vec<ScenarioContext>;

    /// Looks a scenario up by its title.
    fn get(&self, title: &str) -> Option<ScenarioContext>;
}
