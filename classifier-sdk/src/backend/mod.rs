//! Language-model backends
//!
//! A backend turns one rendered instruction into raw response text. It knows
//! nothing about the taxonomy or the response format; parsing belongs to the
//! classifier client.

mod gemini;
mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};

use crate::config::{BackendConfig, ProviderKind, ServiceConfig};
use crate::error::{ClassifierError, Result};

/// Application identifier sent with every request
const USER_AGENT: &str = concat!("complaint-classifier/", env!("CARGO_PKG_VERSION"), " (classifier-sdk)");

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Optional system instruction
    pub system: Option<String>,

    /// Rendered user instruction
    pub prompt: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Output token limit
    pub max_tokens: u32,

    /// Timeout for this call
    pub timeout: Duration,
}

/// A text-completion capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Submit `request` and return the raw response text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

impl fmt::Debug for dyn CompletionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompletionBackend({})", self.name())
    }
}

/// Build the shared HTTP client
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(USER_AGENT),
    );

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| ClassifierError::configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Join an API root and a path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Build the backend named in `config`
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn CompletionBackend>> {
    config.validate()?;

    let backend: Arc<dyn CompletionBackend> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAiBackend::new(config)?),
        ProviderKind::Gemini => Arc::new(GeminiBackend::new(config)?),
    };

    log::info!(
        "Using {} backend with model {} at {}",
        backend.name(),
        config.model,
        config.base_url
    );
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        assert_eq!(
            endpoint("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(endpoint("http://localhost:1234", "x"), "http://localhost:1234/x");
    }

    #[test]
    fn test_build_backend_picks_provider() {
        let mut config = BackendConfig::for_provider(ProviderKind::Gemini);
        config.api_key = "key".to_string();
        assert_eq!(build_backend(&config).unwrap().name(), "gemini");

        config.provider = ProviderKind::OpenAi;
        assert_eq!(build_backend(&config).unwrap().name(), "openai");
    }

    #[test]
    fn test_build_backend_validates_config() {
        let config = BackendConfig::for_provider(ProviderKind::OpenAi);
        assert!(matches!(
            build_backend(&config),
            Err(ClassifierError::Configuration(_))
        ));
    }
}
