//! services/api/src/adapters/advisory_llm.rs
//!
//! This module contains the adapter for the advisory text generator.
//! It implements the `AdvisoryService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use bitacora_core::ports::{
    AdvisoryKind, AdvisoryPrompt, AdvisoryService, PortError, PortResult,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AdvisoryService` using an OpenAI-compatible LLM.
/// The fleet summary goes to a heavier model than the short per-trip texts.
#[derive(Clone)]
pub struct OpenAiAdvisoryAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    summary_model: String,
}

impl OpenAiAdvisoryAdapter {
    /// Creates a new `OpenAiAdvisoryAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, summary_model: String) -> Self {
        Self {
            client,
            model,
            summary_model,
        }
    }

    fn model_for(&self, kind: AdvisoryKind) -> &str {
        match kind {
            AdvisoryKind::FleetSummary => &self.summary_model,
            _ => &self.model,
        }
    }
}

//=========================================================================================
// `AdvisoryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AdvisoryService for OpenAiAdvisoryAdapter {
    async fn generate(&self, prompt: &AdvisoryPrompt) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system_instruction.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.prompt.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.model_for(prompt.kind))
            .messages(messages)
            .n(1);
        if let Some(temperature) = prompt.temperature {
            builder.temperature(temperature);
        }
        let request = builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unexpected("Advisory LLM response contained no text content.".to_string())
            })
    }
}

/// Stands in for the provider when no API key is configured. Every call
/// fails, so callers show their fallback text.
#[derive(Clone, Copy, Default)]
pub struct DisabledAdvisory;

#[async_trait]
impl AdvisoryService for DisabledAdvisory {
    async fn generate(&self, _prompt: &AdvisoryPrompt) -> PortResult<String> {
        Err(PortError::Unexpected(
            "No advisory provider is configured.".to_string(),
        ))
    }
}
