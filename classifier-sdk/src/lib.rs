//! # Classifier SDK
//!
//! Batch classification of passenger complaints into a fixed taxonomy of
//! root causes, using a generative language model as the backend.
//!
//! This crate provides:
//!
//! - The taxonomy and the sentinel codes used for failed rows
//! - OpenAI and Gemini completion backends behind one trait
//! - A classifier client for single complaints and chunks of complaints
//! - Bounded exponential-backoff retry for transient backend failures
//! - A batch runner with early stop, backfill and cancellation
//! - Configuration management utilities
//!
//! ## Architecture
//!
//! Data flows one way:
//!
//! - `BatchRunner` pulls rows from a `RowSource` in order
//! - `ClassifierClient` renders the instruction and parses the answer
//! - `RetryPolicy` wraps each backend call when installed
//! - `CompletionBackend` performs the HTTP call
//! - `reconcile` maps chunk answers back onto absolute rows
//! - `ResultTable` carries the appended columns to the export layer

pub mod taxonomy;
pub use taxonomy::{Sentinel, Taxonomy, TAXONOMY};

pub mod model;
pub use model::{
    ClassificationResult, ComplaintRow, LogProgress, NoProgress, Progress, ProgressSink,
    RowSource, RunState,
};

// Re-export error handling
pub mod error;
pub use error::{ClassifierError, Result, TransientKind};

// Re-export configuration management
pub mod config;
pub use config::{
    BackendConfig, ConfigProvider, ProviderKind, RetryConfig, RunConfig, RunMode, ServiceConfig,
};

pub mod backend;
pub use backend::{build_backend, CompletionBackend, CompletionRequest};

pub mod client;
pub use client::{BatchItem, ClassifierClient};

pub mod resilience;
pub use resilience::RetryPolicy;

pub mod runner;
pub use runner::{BatchRunner, ChunkSizing, RunOutcome, RunReport, RunStats};

pub mod table;
pub use table::ResultTable;

// Utility module for common functionality
pub mod util;

#[cfg(test)]
mod tests;
