use super::{Translator, TranslatorBuilder, with_backoff};
use crate::BackendError;
use crate::utils::preview;
use anyhow::anyhow;
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use std::error::Error;

/// Builder for OpenAI-compatible chat completion APIs
pub struct OpenAiTranslatorBuilder {
    model: String,
    api_key: String,
    temperature: f32,
    tone: String,
}

impl OpenAiTranslatorBuilder {
    pub fn new(model: String, api_key: String) -> Self {
        OpenAiTranslatorBuilder {
            model,
            api_key,
            temperature: 0.2,
            tone: "neutral".to_owned(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_tone(mut self, tone: String) -> Self {
        self.tone = tone;
        self
    }
}

impl TranslatorBuilder for OpenAiTranslatorBuilder {
    type Built = OpenAiTranslator;

    async fn build(&self) -> Result<Self::Built, BackendError> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::OtherError(anyhow!(
                "OpenAI API key is not configured"
            )));
        }

        let config = OpenAIConfig::new().with_api_key(&self.api_key);

        Ok(OpenAiTranslator {
            client: Client::with_config(config),
            model: self.model.clone(),
            temperature: self.temperature,
            tone: self.tone.clone(),
        })
    }
}

pub struct OpenAiTranslator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    tone: String,
}

impl Translator for OpenAiTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<Vec<String>, BackendError> {
        let payload =
            serde_json::to_string(texts).map_err(|e| BackendError::OtherError(e.into()))?;
        let reply = self
            .complete(batch_prompt(src_lang, dst_lang, &self.tone), payload)
            .await?;

        let translated: Vec<String> =
            serde_json::from_str(strip_code_fence(&reply)).map_err(|e| {
                BackendError::InteractionError(anyhow!(
                    "Response is not a JSON array of strings ({e}): {}",
                    preview(&reply, 80)
                ))
            })?;

        if translated.len() != texts.len() {
            return Err(BackendError::InteractionError(anyhow!(
                "Expected {} translations, got {}",
                texts.len(),
                translated.len()
            )));
        }
        Ok(translated)
    }

    async fn translate(
        &self,
        text: &str,
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<String, BackendError> {
        let reply = self
            .complete(single_prompt(src_lang, dst_lang, &self.tone), text.to_owned())
            .await?;
        Ok(reply.trim().to_owned())
    }
}

impl OpenAiTranslator {
    async fn complete(&self, instructions: String, content: String) -> Result<String, BackendError> {
        log::debug!(r#"Sending message "{}""#, preview(&content, 20));
        with_backoff(|| self.request(&instructions, &content)).await
    }

    async fn request(&self, instructions: &str, content: &str) -> Result<String, BackendError> {
        let req = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .temperature(self.temperature)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(instructions)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(content)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(req).await?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            BackendError::InteractionError(anyhow!("Response contained no choices"))
        })?;
        choice.message.content.ok_or_else(|| {
            BackendError::InteractionError(anyhow!("Response message has no content"))
        })
    }
}

fn single_prompt(src_lang: &str, dst_lang: &str, tone: &str) -> String {
    format!(
        r#"
You are a professional translator from {} language to {}.
The text is a fragment of a web page: a paragraph, a label or a tooltip.
Make sure this translation is accurate and natural, keep HTML entities and punctuation as they are.
Use {} tone when in doubt.
Output just the translation and nothing else.
"#,
        src_lang, dst_lang, tone
    )
    .trim()
    .to_owned()
}

fn batch_prompt(src_lang: &str, dst_lang: &str, tone: &str) -> String {
    format!(
        r#"
{}
The message is a JSON array of independent fragments.
Reply with a JSON array of the same length holding their translations in the same order, and nothing else.
"#,
        single_prompt(src_lang, dst_lang, tone)
            .trim_end_matches("Output just the translation and nothing else.")
            .trim_end()
    )
    .trim()
    .to_owned()
}

/// Models sometimes wrap JSON in a Markdown code fence.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    match inner.find('\n') {
        Some(idx) if !inner[..idx].trim_start().starts_with('[') => inner[idx + 1..].trim(),
        _ => inner.trim(),
    }
}

impl From<OpenAIError> for BackendError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::Reqwest(e) => BackendError::ConnectionError(if let Some(e) = e.source() {
                anyhow!("{e}")
            } else {
                e.into()
            }),
            OpenAIError::ApiError(e) if e.message.to_lowercase().contains("rate limit") => {
                BackendError::RateLimited(e.message)
            }
            OpenAIError::ApiError(e) => BackendError::ApiError(anyhow!("{e}")),
            OpenAIError::JSONDeserialize(e) => BackendError::InteractionError(e.into()),
            OpenAIError::FileSaveError(e) => BackendError::OtherError(anyhow!("{e}")),
            OpenAIError::FileReadError(e) => BackendError::OtherError(anyhow!("{e}")),
            OpenAIError::StreamError(e) => BackendError::ConnectionError(anyhow!("{e}")),
            OpenAIError::InvalidArgument(e) => BackendError::OtherError(anyhow!("{e}")),
        }
    }
}
