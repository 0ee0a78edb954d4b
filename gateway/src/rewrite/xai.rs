//! Client for the xAI chat-completions API.

use common::{Config, GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "You are a professional writing assistant. Rewrite the given text to make it more professional, polished, and appropriate for business communication while maintaining the original meaning and intent.

Guidelines:
- Use formal language and proper grammar
- Replace casual expressions with professional alternatives
- Maintain the original tone and message
- Keep the same length approximately
- Do not add extra content or change the core message
- If asked to translate to French, first rewrite professionally in English, then provide an accurate French translation with proper grammar and natural language
- Return only the final rewritten text (in French if translation was requested) without explanations";

pub fn build_prompt(text: &str, translate_to_french: bool) -> String {
    if translate_to_french {
        format!(
            "Please rewrite the following text professionally and then translate it to French: \"{}\"",
            text
        )
    } else {
        format!("Please rewrite the following text professionally: \"{}\"", text)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct XaiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl XaiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        match &config.xai_api_key {
            Some(key) => Ok(Some(Self::new(
                key.clone(),
                config.xai_model.clone(),
                config.xai_base_url.clone(),
                config.rewrite_timeout,
            )?)),
            None => Ok(None),
        }
    }

    pub async fn generate(&self, text: &str, translate_to_french: bool) -> Result<String> {
        let prompt = build_prompt(text, translate_to_french);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
        };

        let response = self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::RewriteError(e.to_string()))?
            .error_for_status()
            .map_err(|e| GatewayError::RewriteError(e.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::RewriteError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| GatewayError::RewriteError("Model returned no text".to_string()))
    }
}
