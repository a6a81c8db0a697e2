//! Scripted in-process backend for runner scenarios

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::client::ClassifierClient;
use crate::config::{BackendConfig, ProviderKind};
use crate::error::Result;

type Responder = Box<dyn Fn(usize, &CompletionRequest) -> Result<String> + Send + Sync>;

/// Answers every request through a closure receiving the 0-based call number
pub struct ScriptedBackend {
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(usize, &CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());
        (self.responder)(call, request)
    }
}

pub fn test_config() -> BackendConfig {
    BackendConfig {
        api_key: "test-key".to_string(),
        ..BackendConfig::for_provider(ProviderKind::OpenAi)
    }
}

/// Client over `backend`, without retry
pub fn client_for(backend: &Arc<ScriptedBackend>) -> ClassifierClient {
    let backend: Arc<dyn CompletionBackend> = backend.clone();
    ClassifierClient::new(backend, test_config())
}

/// Complaint text of a single-item prompt
pub fn complaint_of(prompt: &str) -> &str {
    prompt
        .rsplit_once("Texto: ")
        .map(|(_, text)| text.trim())
        .unwrap_or("")
}

/// `(id, text)` pairs listed in a batch prompt
pub fn listed_items(prompt: &str) -> Vec<(usize, String)> {
    let listing = prompt
        .split_once("Comentarios a clasificar:\n")
        .map(|(_, rest)| rest)
        .unwrap_or("");

    listing
        .lines()
        .filter_map(|line| {
            let (id, text) = line.split_once(": ")?;
            Some((id.parse().ok()?, text.trim_matches('"').to_string()))
        })
        .collect()
}

/// Labelled single-item answer
pub fn labeled(category: &str, reason: &str) -> String {
    format!("Categoría: {}\nRazón: {}\n", category, reason)
}

/// JSON batch answer labelling every listed item with `category`
pub fn batch_answer(items: &[(usize, String)], category: &str) -> String {
    let entries: Vec<serde_json::Value> = items
        .iter()
        .map(|(id, text)| serde_json::json!({"id": id, "categoria": category, "razon": format!("sobre {}", text)}))
        .collect();
    serde_json::Value::Array(entries).to_string()
}
