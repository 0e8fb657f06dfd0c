use super::{Translator, TranslatorBuilder, with_backoff};
use crate::BackendError;
use crate::utils::preview;
use anyhow::anyhow;
use reqwest::StatusCode;
use serde_json::Value;
use std::error::Error;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Builder for the public Google Translate web endpoint.
pub struct GoogleTranslatorBuilder {
    endpoint: String,
}

impl GoogleTranslatorBuilder {
    pub fn new() -> Self {
        GoogleTranslatorBuilder {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
        }
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        GoogleTranslatorBuilder {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for GoogleTranslatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslatorBuilder for GoogleTranslatorBuilder {
    type Built = GoogleTranslator;

    async fn build(&self) -> Result<Self::Built, BackendError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(GoogleTranslator {
            client,
            endpoint: self.endpoint.clone(),
        })
    }
}

pub struct GoogleTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl Translator for GoogleTranslator {
    const NATIVE_BATCHES: bool = false;

    /// The endpoint has no batch mode, so items go out one request each.
    async fn translate_batch(
        &self,
        texts: &[String],
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<Vec<String>, BackendError> {
        let mut translated = Vec::with_capacity(texts.len());
        for text in texts {
            translated.push(self.translate(text, src_lang, dst_lang).await?);
        }
        Ok(translated)
    }

    async fn translate(
        &self,
        text: &str,
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<String, BackendError> {
        log::debug!(r#"Sending "{}""#, preview(text, 20));
        with_backoff(|| self.request(text, src_lang, dst_lang)).await
    }
}

impl GoogleTranslator {
    async fn request(
        &self,
        text: &str,
        src_lang: &str,
        dst_lang: &str,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", src_lang),
                ("tl", dst_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError(anyhow!(
                "HTTP {}: {}",
                status,
                preview(&body, 200)
            )));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

/// The response is a nested array: `[[["translated", "original", ...], ...], ...]`.
fn parse_response(body: &str) -> Result<String, BackendError> {
    let json: Value =
        serde_json::from_str(body).map_err(|e| BackendError::InteractionError(e.into()))?;

    let sentences = json
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::InteractionError(anyhow!("No sentences in response")))?;

    let translated = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect::<String>();

    if translated.is_empty() {
        return Err(BackendError::InteractionError(anyhow!(
            "Empty translation in response"
        )));
    }
    Ok(translated)
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return BackendError::InteractionError(err.into());
        }
        BackendError::ConnectionError(if let Some(e) = err.source() {
            anyhow!("{err}: {e}")
        } else {
            err.into()
        })
    }
}
