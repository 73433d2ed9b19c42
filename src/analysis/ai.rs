//! AI-assisted evidence analysis
//!
//! Feature-gated behind `ai-assistant`. Two providers are supported: Google
//! Gemini (`generateContent`) and a local Ollama server (`/api/generate`).
//!
//! # Security
//!
//! - Custom endpoints must be HTTPS, or plain HTTP to a loopback host
//! - The Gemini key travels in the `x-goog-api-key` header, never in the URL
//! - Every request and response is logged on the `ai_audit` target

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AiConfig, AiProviderKind, GOOGLE_API_KEY_ENV};

/// Base URL of the public Gemini API
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Base URL of a default local Ollama install
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Errors raised while talking to a provider
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI assistant is not configured: {0}")]
    NotConfigured(String),

    #[error("endpoint rejected: {0}")]
    InvalidEndpoint(String),

    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned an error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("{0} returned no text")]
    EmptyResponse(&'static str),

    #[error("cannot start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Check a provider URL before any request is made.
///
/// HTTPS is accepted for any host. HTTP only for loopback hosts.
pub fn validate_endpoint(endpoint: &str) -> Result<url::Url, AiError> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| AiError::InvalidEndpoint(format!("'{}': {}", endpoint, e)))?;
    let host = parsed.host_str().unwrap_or("");

    match parsed.scheme() {
        "https" => {
            info!(target: "ai_audit", host, "AI connection to HTTPS endpoint");
            Ok(parsed)
        }
        "http" => {
            let is_loopback = matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]");
            if is_loopback {
                info!(target: "ai_audit", endpoint, "AI connection to local endpoint");
                Ok(parsed)
            } else {
                warn!(target: "ai_audit", endpoint, "SECURITY: Blocked plain HTTP to remote AI endpoint");
                Err(AiError::InvalidEndpoint(format!(
                    "plain HTTP is only allowed for localhost; use HTTPS for {}",
                    endpoint
                )))
            }
        }
        scheme => {
            warn!(target: "ai_audit", scheme, "SECURITY: Blocked AI endpoint scheme");
            Err(AiError::InvalidEndpoint(format!(
                "scheme '{}' is not allowed; use https (or http for localhost)",
                scheme
            )))
        }
    }
}

fn log_ai_request(provider: &str, model: &str, analysis: &str, prompt_chars: usize) {
    info!(
        target: "ai_audit",
        provider,
        model,
        analysis,
        prompt_chars,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "AI analysis requested"
    );
}

fn log_ai_response(provider: &str, model: &str, outcome: Result<usize, &AiError>) {
    match outcome {
        Ok(response_chars) => info!(
            target: "ai_audit",
            provider,
            model,
            response_chars,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "AI analysis completed"
        ),
        Err(error) => warn!(
            target: "ai_audit",
            provider,
            model,
            error = %error,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "AI analysis failed"
        ),
    }
}

/// A configured provider
#[derive(Debug, Clone)]
pub enum AiProvider {
    Gemini {
        model: String,
        api_key: String,
        base_url: url::Url,
    },
    Ollama {
        model: String,
        base_url: url::Url,
    },
}

impl AiProvider {
    /// Resolve the provider from configuration, validating its endpoint
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        if config.model.trim().is_empty() {
            return Err(AiError::NotConfigured("no model name set".to_string()));
        }
        match config.provider {
            AiProviderKind::Gemini => {
                let api_key = config
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        AiError::NotConfigured(format!(
                            "set {} to use Gemini",
                            GOOGLE_API_KEY_ENV
                        ))
                    })?;
                let base = config.endpoint.as_deref().unwrap_or(GEMINI_BASE_URL);
                Ok(AiProvider::Gemini {
                    model: config.model.clone(),
                    api_key,
                    base_url: validate_endpoint(base)?,
                })
            }
            AiProviderKind::Ollama => {
                let base = config.endpoint.as_deref().unwrap_or(OLLAMA_BASE_URL);
                Ok(AiProvider::Ollama {
                    model: config.model.clone(),
                    base_url: validate_endpoint(base)?,
                })
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AiProvider::Gemini { .. } => "gemini",
            AiProvider::Ollama { .. } => "ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            AiProvider::Gemini { model, .. } | AiProvider::Ollama { model, .. } => model,
        }
    }

    /// Full request URL for this provider
    pub fn request_url(&self) -> String {
        match self {
            AiProvider::Gemini { model, base_url, .. } => format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.as_str().trim_end_matches('/'),
                model
            ),
            AiProvider::Ollama { base_url, .. } => {
                format!("{}/api/generate", base_url.as_str().trim_end_matches('/'))
            }
        }
    }
}

// Gemini generateContent wire types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// Ollama /api/generate wire types

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: Option<String>,
    error: Option<String>,
}

/// Extract the generated text from a Gemini response body
pub(crate) fn parse_gemini_response(body: &str) -> Result<String, AiError> {
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| AiError::Api {
        provider: "gemini",
        message: format!("unreadable response: {}", e),
    })?;
    if let Some(error) = parsed.error {
        return Err(AiError::Api {
            provider: "gemini",
            message: error.message,
        });
    }
    let text: String = parsed
        .candidates
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse("gemini"));
    }
    Ok(text)
}

/// Extract the generated text from a non-streaming Ollama response body
pub(crate) fn parse_ollama_response(body: &str) -> Result<String, AiError> {
    let parsed: OllamaResponse = serde_json::from_str(body).map_err(|e| AiError::Api {
        provider: "ollama",
        message: format!("unreadable response: {}", e),
    })?;
    if let Some(message) = parsed.error {
        return Err(AiError::Api {
            provider: "ollama",
            message,
        });
    }
    match parsed.response {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AiError::EmptyResponse("ollama")),
    }
}

/// Sends analysis prompts to the configured provider
#[derive(Debug, Clone)]
pub struct AiAssistant {
    provider: AiProvider,
    timeout: Duration,
}

impl AiAssistant {
    pub fn new(provider: AiProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        Ok(Self::new(
            AiProvider::from_config(config)?,
            Duration::from_secs(config.timeout_secs.max(1)),
        ))
    }

    pub fn provider(&self) -> &AiProvider {
        &self.provider
    }

    /// Run one request to completion on a private current-thread runtime
    pub fn analyze_blocking(&self, analysis: &str, prompt: &str) -> Result<String, AiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.analyze(analysis, prompt))
    }

    /// Send `prompt` and return the generated text
    pub async fn analyze(&self, analysis: &str, prompt: &str) -> Result<String, AiError> {
        let provider = self.provider.name();
        let model = self.provider.model().to_string();
        log_ai_request(provider, &model, analysis, prompt.chars().count());

        let result = self.send(prompt).await;
        log_ai_response(
            provider,
            &model,
            result.as_ref().map(|text| text.chars().count()),
        );
        result
    }

    async fn send(&self, prompt: &str) -> Result<String, AiError> {
        let provider = self.provider.name();
        let http_err = |source| AiError::Http { provider, source };

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(http_err)?;
        let url = self.provider.request_url();
        debug!(%url, "Sending AI request");

        let request = match &self.provider {
            AiProvider::Gemini { api_key, .. } => client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&GeminiRequest {
                    contents: vec![GeminiContent {
                        parts: vec![GeminiPart {
                            text: Some(prompt.to_string()),
                        }],
                    }],
                    generation_config: GeminiGenerationConfig {
                        temperature: 0.2,
                        max_output_tokens: 4096,
                    },
                }),
            AiProvider::Ollama { model, .. } => client.post(&url).json(&OllamaRequest {
                model,
                prompt,
                stream: false,
            }),
        };

        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        let body = response.text().await.map_err(http_err)?;

        let parsed = match &self.provider {
            AiProvider::Gemini { .. } => parse_gemini_response(&body),
            AiProvider::Ollama { .. } => parse_ollama_response(&body),
        };
        match parsed {
            Err(error @ AiError::Api { .. }) => Err(error),
            _ if !status.is_success() => Err(AiError::Api {
                provider,
                message: format!("HTTP {}", status),
            }),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("https://generativelanguage.googleapis.com").is_ok());
        assert!(validate_endpoint("http://localhost:11434").is_ok());
        assert!(validate_endpoint("http://127.0.0.1:11434").is_ok());
        assert!(validate_endpoint("http://[::1]:11434").is_ok());

        assert!(matches!(
            validate_endpoint("http://192.168.1.20:11434"),
            Err(AiError::InvalidEndpoint(_))
        ));
        assert!(validate_endpoint("ftp://localhost").is_err());
        assert!(validate_endpoint("not a url").is_err());
    }

    #[test]
    fn test_provider_from_config() {
        let mut config = AiConfig {
            api_key: None,
            ..AiConfig::default()
        };
        assert!(matches!(
            AiProvider::from_config(&config),
            Err(AiError::NotConfigured(_))
        ));

        config.api_key = Some("k".to_string());
        let provider = AiProvider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(
            provider.request_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro-latest:generateContent"
        );
        assert!(!provider.request_url().contains("key="));

        let config = AiConfig {
            provider: AiProviderKind::Ollama,
            model: "llama3.2".to_string(),
            ..AiConfig::default()
        };
        let provider = AiProvider::from_config(&config).unwrap();
        assert_eq!(provider.request_url(), "http://localhost:11434/api/generate");

        let config = AiConfig {
            provider: AiProviderKind::Ollama,
            endpoint: Some("http://10.0.0.5:11434".to_string()),
            ..AiConfig::default()
        };
        assert!(AiProvider::from_config(&config).is_err());
    }

    #[test]
    fn test_parse_gemini_response() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"SELECT * "},{"text":"FROM messages;"}]}}]}"#;
        assert_eq!(parse_gemini_response(body).unwrap(), "SELECT * FROM messages;");

        let error = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        match parse_gemini_response(error) {
            Err(AiError::Api { message, .. }) => assert_eq!(message, "API key not valid"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            parse_gemini_response(r#"{"candidates":[]}"#),
            Err(AiError::EmptyResponse("gemini"))
        ));
    }

    #[test]
    fn test_parse_ollama_response() {
        let body = r#"{"model":"llama3.2","response":"Looks like WhatsApp.","done":true}"#;
        assert_eq!(parse_ollama_response(body).unwrap(), "Looks like WhatsApp.");
        assert!(matches!(
            parse_ollama_response(r#"{"error":"model not found"}"#),
            Err(AiError::Api { .. })
        ));
        assert!(parse_ollama_response("<html>").is_err());
    }

    #[test]
    fn test_gemini_request_shape() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some("hi".to_string()),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.2,
                max_output_tokens: 10,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 10);
    }
}
