//! Generative-AI categorization adapter
//!
//! The hosted model is asked for a strict-JSON answer but does not always
//! give one; the parser tolerates prose around the JSON by extracting the
//! first balanced object. On any failure the category service falls back
//! to keyword matching, so errors here are soft.

use crate::error::{AppError, Result};
use crate::external::types::CategorySuggestion;
use crate::external::Categorizer;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const PROMPT_TEMPLATE: &str = "Jestes asystentem serwisu uslug lokalnych. Przypisz opis zlecenia \
do jednej kategorii (Hydraulik, Elektryk, Malarz, Stolarz, Sprzatanie, Ogrodnik, Zlota raczka), \
oszacuj widelki cenowe w PLN i pilnosc (low/normal/high). Odpowiedz wylacznie JSON: \
{\"category\":...,\"price_min\":...,\"price_max\":...,\"urgency\":...,\"confidence\":...}. Opis: ";

/// HTTP adapter for the hosted language model
pub struct HttpCategorizer {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpCategorizer {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
            api_key,
        }
    }

    /// Configured from `ASSISTANT_API_URL` / `ASSISTANT_API_KEY`
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("ASSISTANT_API_URL").ok()?;
        let api_key = std::env::var("ASSISTANT_API_KEY").ok()?;
        Some(Self::new(base_url, api_key))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Extract the first balanced `{...}` block from model output.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_suggestion(text: &str) -> Result<CategorySuggestion> {
    let raw = extract_json_object(text).ok_or_else(|| {
        AppError::ExternalService("assistant response contains no JSON".to_string())
    })?;
    let suggestion: CategorySuggestion = serde_json::from_str(raw).map_err(|e| {
        AppError::ExternalService(format!("malformed assistant response: {}", e))
    })?;
    Ok(suggestion)
}

#[async_trait]
impl Categorizer for HttpCategorizer {
    fn id(&self) -> &'static str {
        "assistant-http"
    }

    async fn categorize(&self, description: &str) -> Result<CategorySuggestion> {
        let response = self
            .client
            .post(format!("{}/v1/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "prompt": format!("{}{}", PROMPT_TEMPLATE, description),
                "max_tokens": 200,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "assistant returned {}",
                response.status()
            )));
        }

        let body: CompletionResponse = response.json().await?;
        parse_suggestion(&body.text)
    }
}

/// Stand-in used when no assistant is configured
pub struct OfflineCategorizer;

#[async_trait]
impl Categorizer for OfflineCategorizer {
    fn id(&self) -> &'static str {
        "assistant-offline"
    }

    async fn categorize(&self, _description: &str) -> Result<CategorySuggestion> {
        Err(AppError::ExternalService(
            "assistant is not configured".to_string(),
        ))
    }
}
