//! Full pipeline tests: runner, client, retry and an HTTP backend together

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    use crate::backend::{build_backend, MockCompletionBackend};
    use crate::client::ClassifierClient;
    use crate::config::{BackendConfig, ProviderKind, RetryConfig, RunConfig};
    use crate::error::{ClassifierError, TransientKind};
    use crate::model::NoProgress;
    use crate::resilience::RetryPolicy;
    use crate::runner::{BatchRunner, ChunkSizing, RunOutcome};
    use crate::table::{CATEGORY_COLUMN, REASON_COLUMN};
    use crate::tests::fake_backend::{complaint_of, test_config};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            min_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(40),
            ..RetryConfig::default()
        })
    }

    /// Answers chat completions by looking at the complaint in the prompt
    struct ComplaintResponder;

    impl Respond for ComplaintResponder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
            let prompt = body["messages"][1]["content"].as_str().unwrap_or("");
            let answer = match complaint_of(prompt) {
                "wait 20 min for bus" => "Categoría: Servicio Operativo y Frecuencia\nRazón: demora",
                "rude driver" => "Categoría: Personal y Desempeño Laboral\nRazón: maltrato",
                "broken seat" => "Categoría: Infraestructura y Mantenimiento\nRazón: asiento",
                _ => "No entiendo la consulta",
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": answer}}]
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_through_runner_with_mock() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut mock = MockCompletionBackend::new();
        mock.expect_complete().times(6).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < 5 {
                Err(ClassifierError::transient(TransientKind::InternalServerError, "500"))
            } else {
                Ok("Categoría: Otros\nRazón: ok".to_string())
            }
        });

        let client = ClassifierClient::new(Arc::new(mock), test_config())
            .with_retry(RetryPolicy::new(RetryConfig::default()));
        let runner = BatchRunner::new(client, RunConfig::per_row());

        let report = runner
            .run(&vec!["uno", "dos"], &NoProgress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.results[0].category, "ERROR_API");
        assert_eq!(report.results[1].category, "Otros");
        assert_eq!(report.state.consecutive_failures, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_openai_pipeline_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ComplaintResponder)
            .mount(&server)
            .await;

        let config = BackendConfig {
            api_key: "sk-test".to_string(),
            base_url: server.uri(),
            ..BackendConfig::for_provider(ProviderKind::OpenAi)
        };
        let backend = build_backend(&config).unwrap();
        let client = ClassifierClient::new(backend, config).with_retry(fast_retry());
        let runner = BatchRunner::new(client, RunConfig::per_row());

        let rows = vec!["wait 20 min for bus", "rude driver", "broken seat", "???"];
        let report = runner.run(&rows, &NoProgress, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.results[0].category, "Servicio Operativo y Frecuencia");
        assert_eq!(report.results[3].category, "ERROR_FORMATO");
        assert_eq!(report.state.consecutive_failures, 1);

        let table = report.into_table("Queja", &rows).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.cell(1, CATEGORY_COLUMN), Some("Personal y Desempeño Laboral"));
        assert_eq!(table.cell(2, REASON_COLUMN), Some("asiento"));
        assert_eq!(table.failed_rows(), vec![3]);
    }

    #[tokio::test]
    async fn test_gemini_chunked_pipeline() {
        let server = MockServer::start().await;
        let answer = "```json\n[{\"id\": 0, \"categoria\": \"Tarifas y Boletos\", \"razon\": \"cobro doble\"},\
                      {\"id\": 1, \"categoria\": \"Ambiente y Confort\", \"razon\": \"calor\"}]\n```";
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": answer}]}}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let config = BackendConfig {
            api_key: "key".to_string(),
            base_url: server.uri(),
            ..BackendConfig::for_provider(ProviderKind::Gemini)
        };
        let backend = build_backend(&config).unwrap();
        let client = ClassifierClient::new(backend, config);
        let runner = BatchRunner::new(client, RunConfig::chunked(ChunkSizing::Fixed(2)));

        let rows = vec!["me cobraron dos veces", "hacía calor", "tarjeta rechazada", "sin aire"];
        let report = runner.run(&rows, &NoProgress, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.results[2].category, "Tarifas y Boletos");
        assert_eq!(report.results[3].reason, "calor");
        assert_eq!(report.stats.classified, 4);

        let requests = server.received_requests().await.unwrap_or_default();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 512);
    }
}
