//! The outbound model-call boundary.

use crate::history::{Turn, TurnRole};
use anyhow::{Context, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
};
use async_trait::async_trait;
use std::time::Duration;

/// Low temperature keeps the replies short and close to deterministic.
pub const TEMPERATURE: f32 = 0.2;
/// Replies are one or two short sentences plus suggestion lists.
pub const MAX_REPLY_TOKENS: u32 = 400;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A client for one conversation round-trip against a language model.
///
/// The request is the system prompt, every prior turn in order, then the new
/// user input as a final user-role entry. Implementations must bound the
/// wait and surface every failure (network, auth, backend, timeout) as an
/// error; the orchestrator recovers with a fallback reply and the session
/// continues.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_input: &str,
    ) -> Result<String>;
}

/// `ModelGateway` implementation for any OpenAI-compatible chat endpoint,
/// requesting the backend's strict-JSON response mode.
pub struct OpenAIChatGateway {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAIChatGateway {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_messages(
        system_prompt: &str,
        history: &[Turn],
        user_input: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()?
                .into(),
        ];
        for turn in history {
            match turn.role {
                TurnRole::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
                TurnRole::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()?
                .into(),
        );
        Ok(messages)
    }
}

#[async_trait]
impl ModelGateway for OpenAIChatGateway {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_input: &str,
    ) -> Result<String> {
        let messages = Self::build_messages(system_prompt, history, user_input)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_tokens(MAX_REPLY_TOKENS)
            .response_format(ResponseFormat::JsonObject)
            .build()?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .context("Model call timed out")??;

        let content = response
            .choices
            .first()
            .context("No response choice from model")?
            .message
            .content
            .clone()
            .context("Model response had no content")?;
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DialogueHistory;

    #[test]
    fn request_replays_history_in_order_then_new_input() {
        let mut history = DialogueHistory::new();
        history.push_assistant("Hej!");
        history.push_user("Hej, jeg vil købe mælk.");

        let messages =
            OpenAIChatGateway::build_messages("policy", history.turns(), "Hvor er mælken?")
                .unwrap();

        // system + two prior turns + the new user input
        assert_eq!(messages.len(), 4);
        assert!(matches!(
            messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            messages[1],
            ChatCompletionRequestMessage::Assistant(_)
        ));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }
}
