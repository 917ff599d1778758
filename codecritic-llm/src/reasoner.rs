//! Tier 3: the LLM reasoner.
//!
//! Packages the question and both tiers of evidence into a structured
//! request, delivers it to an external model through two providers tried
//! in order (two attempts each with exponential back-off), and parses the
//! JSON verdict. A reply that does not match the declared schema is a
//! failed call; no attempt is made to repair model output.

use crate::{LlmError, LlmResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// The reply schema the model must produce, shipped inside every request.
pub fn reply_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "found": {"type": "boolean"},
            "issues": {"type": "array", "items": {"type": "string"}},
            "severity": {"type": "integer", "minimum": 0, "maximum": 10},
            "summary": {"type": "string"}
        },
        "required": ["found", "issues", "severity", "summary"]
    })
}

/// One external model endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    pub model: String,
}

/// Reasoner configuration: providers in fallback order.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    pub providers: Vec<ProviderConfig>,
    pub request_timeout: Duration,
    pub attempts_per_provider: u32,
    pub backoff: Duration,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            request_timeout: Duration::from_secs(30),
            attempts_per_provider: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

impl ReasonerConfig {
    /// Builds the provider list from the environment. Credentials are
    /// supplied out-of-band; with none set the linguistic layer runs in
    /// fallback mode for every request.
    pub fn from_env() -> Self {
        let mut providers = Vec::new();
        for (name, url_var, key_var, model_var) in [
            (
                "primary",
                "CODECRITIC_PRIMARY_URL",
                "CODECRITIC_PRIMARY_KEY",
                "CODECRITIC_PRIMARY_MODEL",
            ),
            (
                "fallback",
                "CODECRITIC_FALLBACK_URL",
                "CODECRITIC_FALLBACK_KEY",
                "CODECRITIC_FALLBACK_MODEL",
            ),
        ] {
            if let (Ok(url), Ok(api_key)) = (std::env::var(url_var), std::env::var(key_var)) {
                providers.push(ProviderConfig {
                    name: name.to_string(),
                    url,
                    api_key,
                    model: std::env::var(model_var).unwrap_or_else(|_| "default".to_string()),
                });
            }
        }
        Self {
            providers,
            ..Self::default()
        }
    }
}

/// The structured question a detector sends to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ReasonerQuestion {
    pub prompt: String,
    pub code: String,
    /// The detector's semantic question, posed explicitly.
    pub question: String,
    pub tier1_evidence: Vec<String>,
    pub tier2_evidence: Vec<String>,
    pub reply_schema: serde_json::Value,
}

/// The verdict the model must return.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReasonerVerdict {
    pub found: bool,
    pub issues: Vec<String>,
    pub severity: u8,
    pub summary: String,
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    model: &'a str,
    question: &'a ReasonerQuestion,
}

pub struct Reasoner {
    config: ReasonerConfig,
    client: Client,
}

impl Reasoner {
    pub fn new(config: ReasonerConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    pub fn has_providers(&self) -> bool {
        !self.config.providers.is_empty()
    }

    /// Asks the providers in order until one returns a schema-conforming
    /// verdict. Transient failures retry with exponential back-off.
    pub async fn ask(&self, question: &ReasonerQuestion) -> LlmResult<ReasonerVerdict> {
        if self.config.providers.is_empty() {
            return Err(LlmError::NoProviders);
        }
        let mut last_error = String::new();
        for provider in &self.config.providers {
            for attempt in 0..self.config.attempts_per_provider {
                if attempt > 0 {
                    tokio::time::sleep(self.config.backoff * 2u32.pow(attempt - 1)).await;
                }
                match self.ask_provider(provider, question).await {
                    Ok(verdict) => {
                        debug!(provider = %provider.name, "model verdict received");
                        return Ok(verdict);
                    }
                    Err(e) => {
                        warn!(provider = %provider.name, attempt, error = %e, "provider call failed");
                        last_error = e.to_string();
                    }
                }
            }
        }
        Err(LlmError::AllProvidersFailed(last_error))
    }

    async fn ask_provider(
        &self,
        provider: &ProviderConfig,
        question: &ReasonerQuestion,
    ) -> LlmResult<ReasonerVerdict> {
        let response = self
            .client
            .post(&provider.url)
            .bearer_auth(&provider.api_key)
            .json(&ProviderRequest {
                model: &provider.model,
                question,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::MalformedReply(format!(
                "{} returned {status}: {body}",
                provider.name
            )));
        }
        parse_verdict(&body)
    }
}

/// Parses the provider reply. The body must be the verdict JSON, either
/// directly or as a JSON-encoded string of it; anything else fails the
/// call.
fn parse_verdict(body: &str) -> LlmResult<ReasonerVerdict> {
    let direct = serde_json::from_str::<ReasonerVerdict>(body);
    let mut verdict = match direct {
        Ok(verdict) => verdict,
        Err(_) => {
            let inner: String = serde_json::from_str(body)
                .map_err(|_| LlmError::MalformedReply(truncate(body)))?;
            serde_json::from_str::<ReasonerVerdict>(&inner)
                .map_err(|_| LlmError::MalformedReply(truncate(body)))?
        }
    };
    verdict.severity = verdict.severity.min(10);
    Ok(verdict)
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}
