//! Generation client — one backend call per credential, with bounded failover.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::keys::KeyRotationPool;
use crate::types::{GenerationRequest, Role};

/// What the vendor says when the backend answered but produced no text.
pub const NEUTRAL_LINE: &str = "Hmm... no sé qué decir.";

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// A text-generation service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce one reply using `credential`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] on transport failure or a non-success
    /// status.
    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &SecretString,
    ) -> Result<String, GenerationError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Settings for [`GeminiBackend`].
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// API root, e.g. `https://generativelanguage.googleapis.com`.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per reply.
    pub max_output_tokens: u32,
}

/// Google Gemini `generateContent` backend.
pub struct GeminiBackend {
    http: Client,
    endpoint: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// Create a backend.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Config`] if the HTTP client cannot be built.
    pub fn new(settings: GeminiSettings) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .build()
            .map_err(|e| GenerationError::Config(e.to_string()))?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            settings.base_url.trim_end_matches('/'),
            settings.model
        );
        Ok(Self {
            http,
            endpoint,
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }

    /// Full URL requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// JSON body for a request.
    #[must_use]
    pub fn request_body(&self, request: &GenerationRequest) -> Value {
        let contents: Vec<Value> = request
            .contents
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                json!({ "role": role, "parts": [{ "text": turn.text }] })
            })
            .collect();

        json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
                "thinkingConfig": { "thinkingBudget": 0 },
            },
        })
    }
}

/// Pull the reply text out of a `generateContent` response, falling back to
/// [`NEUTRAL_LINE`] when the first candidate has no text.
#[must_use]
pub fn extract_candidate_text(body: &Value) -> String {
    body["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .filter(|text| !text.is_empty())
        .unwrap_or(NEUTRAL_LINE)
        .to_string()
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &SecretString,
    ) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", credential.expose_secret())
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::ParseError(e.to_string()))?;
        Ok(extract_candidate_text(&body))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ---------------------------------------------------------------------------
// GenerationClient
// ---------------------------------------------------------------------------

/// Routes requests through the credential pool to a backend.
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    pool: KeyRotationPool,
    attempt_timeout: Duration,
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("backend", &self.backend.name())
            .field("pool", &self.pool)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl GenerationClient {
    /// Create a client.
    #[must_use]
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        pool: KeyRotationPool,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            pool,
            attempt_timeout,
        }
    }

    /// The credential pool.
    #[must_use]
    pub fn pool(&self) -> &KeyRotationPool {
        &self.pool
    }

    /// Whether every turn will be served by the fallback path.
    #[must_use]
    pub fn is_fallback_only(&self) -> bool {
        self.pool.is_empty()
    }

    /// One backend call with one credential, bounded by the attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Timeout`] if the deadline passes, or the
    /// backend's own error.
    pub async fn attempt(
        &self,
        request: &GenerationRequest,
        credential: &SecretString,
    ) -> Result<String, GenerationError> {
        let start = Instant::now();
        let result = tokio::time::timeout(
            self.attempt_timeout,
            self.backend.generate(request, credential),
        )
        .await
        .map_err(|_| {
            GenerationError::Timeout(
                u64::try_from(self.attempt_timeout.as_millis()).unwrap_or(u64::MAX),
            )
        })?;

        debug!(
            backend = self.backend.name(),
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "Generation attempt finished"
        );
        result
    }

    /// Try up to `max(pool size, 1)` attempts, each with the next credential,
    /// and return the first reply.
    ///
    /// Attempts are sequential. The caller is expected to fall back to a
    /// canned reply on any error.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::PoolEmpty`] immediately when there are no
    /// credentials, or [`GenerationError::AttemptsExhausted`] when every
    /// attempt failed.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let attempts = self.pool.len().max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let credential = self.pool.next()?;
            match self.attempt(request, credential).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        attempts,
                        error = %err,
                        "Generation attempt failed, rotating credential"
                    );
                    last_error = err.to_string();
                }
            }
        }

        Err(GenerationError::AttemptsExhausted {
            attempts,
            last_error,
        })
    }
}
