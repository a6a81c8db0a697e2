//! Classifier client
//!
//! Wraps a `CompletionBackend` with the classification instructions and the
//! response parsers. Failures of a single call never escape `classify_one`;
//! they come back as sentinel results.

pub mod parser;
pub mod prompt;

pub use parser::{BatchItem, LabeledFields};

use std::sync::Arc;

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::config::BackendConfig;
use crate::error::{ClassifierError, Result};
use crate::model::ClassificationResult;
use crate::resilience::RetryPolicy;
use crate::taxonomy::TAXONOMY;
use crate::util::{sanitize_for_logging, truncate_string};

/// Output token ceiling for a batched call
const MAX_BATCH_TOKENS: u32 = 8192;

/// Characters of complaint text shown in log lines
const LOG_PREVIEW_CHARS: usize = 50;

/// Classifies complaint text against the taxonomy
#[derive(Debug, Clone)]
pub struct ClassifierClient {
    backend: Arc<dyn CompletionBackend>,
    config: BackendConfig,
    retry: Option<RetryPolicy>,
}

impl ClassifierClient {
    /// Create a client without retry
    pub fn new(backend: Arc<dyn CompletionBackend>, config: BackendConfig) -> Self {
        Self {
            backend,
            config,
            retry: None,
        }
    }

    /// Wrap every backend call in `policy`
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Call the backend exactly once per request
    pub fn without_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    /// The installed retry policy, if any
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// Backend configuration
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn request(&self, prompt: String, max_tokens: u32) -> CompletionRequest {
        CompletionRequest {
            system: Some(prompt::SYSTEM_PROMPT.to_string()),
            prompt,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens,
            timeout: self.config.timeout(),
        }
    }

    async fn call(&self, request: &CompletionRequest) -> (Result<String>, u32) {
        match &self.retry {
            Some(policy) => {
                policy
                    .execute_counted(|| self.backend.complete(request))
                    .await
            }
            None => (self.backend.complete(request).await, 1),
        }
    }

    async fn classify_one_counted(&self, text: &str) -> (Result<(&'static str, String)>, u32) {
        let request = self.request(prompt::render_single(text), self.config.max_tokens);
        let (response, attempts) = self.call(&request).await;

        let result = response.and_then(|raw| {
            let fields = parser::parse_labeled(&raw);
            if fields.category.is_empty() {
                return Err(ClassifierError::format(format!(
                    "Response has no category line: {}",
                    truncate_string(&raw, 200)
                )));
            }
            match TAXONOMY.resolve(&fields.category) {
                Some(label) => Ok((label, fields.reason)),
                None => Err(ClassifierError::format(format!(
                    "Category outside the taxonomy: {}",
                    fields.category
                ))),
            }
        });

        (result, attempts)
    }

    /// Classify one complaint, surfacing failures as errors
    pub async fn try_classify_one(&self, text: &str) -> Result<(&'static str, String)> {
        self.classify_one_counted(text).await.0
    }

    /// Classify one complaint; failures become sentinel results
    pub async fn classify_one(&self, text: &str) -> ClassificationResult {
        let (result, attempts) = self.classify_one_counted(text).await;

        match result {
            Ok((label, reason)) => ClassificationResult::classified(label, reason),
            Err(err) => {
                let message = if err.is_transient() {
                    format!("failed after {} attempt(s): {}", attempts, err)
                } else {
                    err.to_string()
                };
                log::warn!(
                    "Could not classify '{}': {}",
                    truncate_string(text, LOG_PREVIEW_CHARS),
                    sanitize_for_logging(&message)
                );
                ClassificationResult::sentinel(err.sentinel(), message)
            }
        }
    }

    /// Classify a chunk of `(local id, text)` pairs in one call
    pub async fn classify_many(&self, items: &[(usize, &str)]) -> Result<Vec<BatchItem>> {
        let max_tokens = self
            .config
            .max_tokens
            .saturating_mul(items.len().max(1) as u32)
            .min(MAX_BATCH_TOKENS);
        let request = self.request(prompt::render_batch(items), max_tokens);

        let (response, attempts) = self.call(&request).await;
        let raw = response.map_err(|err| {
            log::warn!(
                "Batch call for {} item(s) failed after {} attempt(s): {}",
                items.len(),
                attempts,
                sanitize_for_logging(&err.to_string())
            );
            err
        })?;

        parser::parse_batch(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockCompletionBackend;
    use crate::config::{ProviderKind, RetryConfig};
    use crate::error::TransientKind;
    use crate::taxonomy::Sentinel;

    fn config() -> BackendConfig {
        BackendConfig {
            api_key: "test".to_string(),
            ..BackendConfig::for_provider(ProviderKind::OpenAi)
        }
    }

    fn client_with(mock: MockCompletionBackend) -> ClassifierClient {
        ClassifierClient::new(Arc::new(mock), config())
    }

    #[tokio::test]
    async fn test_classify_one_parses_answer() {
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete()
            .withf(|req| req.prompt.contains("Texto: rude driver") && req.max_tokens == 256)
            .times(1)
            .returning(|_| Ok("Categoría: personal y desempeño laboral\nRazón: trato del chofer".to_string()));

        let result = client_with(mock).classify_one("rude driver").await;
        assert_eq!(
            result,
            ClassificationResult::classified("Personal y Desempeño Laboral", "trato del chofer")
        );
    }

    #[tokio::test]
    async fn test_unknown_category_is_format_error() {
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete()
            .returning(|_| Ok("Categoría: Clima\nRazón: llovía".to_string()));

        let client = client_with(mock);
        assert!(matches!(
            client.try_classify_one("x").await,
            Err(ClassifierError::Format(_))
        ));
        assert_eq!(client.classify_one("x").await.sentinel_kind(), Some(Sentinel::Format));
    }

    #[tokio::test]
    async fn test_missing_reason_is_accepted() {
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete()
            .returning(|_| Ok("Categoría: Otros".to_string()));

        let (label, reason) = client_with(mock).try_classify_one("x").await.unwrap();
        assert_eq!(label, "Otros");
        assert_eq!(reason, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_calls_five_times() {
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete()
            .times(5)
            .returning(|_| Err(ClassifierError::transient(TransientKind::QuotaExceeded, "429")));

        let client = client_with(mock).with_retry(RetryPolicy::new(RetryConfig::default()));
        let started = tokio::time::Instant::now();
        let result = client.classify_one("x").await;

        assert_eq!(result.sentinel_kind(), Some(Sentinel::Api));
        assert!(result.reason.starts_with("failed after 5 attempt(s)"));
        let waited = started.elapsed();
        assert!(waited >= std::time::Duration::from_secs(60));
        assert!(waited < std::time::Duration::from_secs(61));
    }

    #[tokio::test]
    async fn test_without_retry_calls_once() {
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(ClassifierError::transient(TransientKind::ServiceUnavailable, "503")));

        let client = client_with(mock).with_retry(RetryPolicy::default()).without_retry();
        assert!(client.retry_policy().is_none());
        let result = client.classify_one("x").await;
        assert_eq!(result.category, "ERROR_API");
    }

    #[tokio::test]
    async fn test_classify_many_scales_token_limit() {
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete()
            .withf(|req| req.max_tokens == 512 && req.prompt.contains("1: \"b\""))
            .returning(|_| {
                Ok(r#"[{"id":0,"categoria":"Otros","razon":"a"},{"id":1,"categoria":"Otros","razon":"b"}]"#.to_string())
            });

        let items = client_with(mock).classify_many(&[(0, "a"), (1, "b")]).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, Some(1));
    }
}
