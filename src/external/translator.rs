use crate::config::TranslationConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Produces the `{lang: text}` object stored next to catalog names.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> AppResult<Value>;
}

/// Copies the source text into every configured language.
pub struct IdentityTranslator {
    languages: Vec<String>,
}

impl IdentityTranslator {
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }
}

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str) -> AppResult<Value> {
        let map: Map<String, Value> = self
            .languages
            .iter()
            .map(|lang| (lang.clone(), Value::String(text.to_string())))
            .collect();
        Ok(Value::Object(map))
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    targets: &'a [String],
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Map<String, Value>,
}

pub struct HttpTranslator {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    languages: Vec<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: String, api_key: Option<String>, languages: Vec<String>) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("fitsub-backend/translator")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            languages,
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> AppResult<Value> {
        let mut request = self.http.post(&self.endpoint).json(&TranslateRequest {
            text,
            targets: &self.languages,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::ExternalApiError(format!(
                "translation service returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: TranslateResponse = resp.json().await?;
        Ok(Value::Object(body.translations))
    }
}

/// HTTP-backed when an endpoint is configured, identity otherwise.
pub fn build_translator(cfg: &TranslationConfig) -> AppResult<Box<dyn Translator>> {
    match &cfg.endpoint {
        Some(endpoint) => Ok(Box::new(HttpTranslator::new(
            endpoint.clone(),
            cfg.api_key.clone(),
            cfg.languages.clone(),
        )?)),
        None => Ok(Box::new(IdentityTranslator::new(cfg.languages.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identity_translator_fills_every_language() {
        let translator = IdentityTranslator::new(vec!["uz".into(), "ru".into()]);
        let value = translator.translate("Push day").await.unwrap();
        assert_eq!(value["uz"], "Push day");
        assert_eq!(value["ru"], "Push day");
        assert!(value.get("en").is_none());
    }
}
