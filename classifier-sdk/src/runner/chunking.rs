//! Chunk sizing for batched calls
//!
//! Token counts are estimated from word counts. The estimate only has to be
//! good enough to keep a request under the provider's limit.

use crate::client::prompt::batch_header;
use crate::error::{ClassifierError, Result};

/// Tokens per whitespace-separated word
const TOKENS_PER_WORD: f64 = 1.5;

/// Words in an average complaint
const AVERAGE_COMPLAINT_WORDS: f64 = 30.0;

/// Words in an average justification
const AVERAGE_REASON_WORDS: f64 = 15.0;

/// Shape of one answer entry, counted towards the per-item cost
const RESULT_SKELETON: &str = r#"{"id": 0, "categoria": "", "razon": ""},"#;

/// Approximate token count of `text`
pub fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * TOKENS_PER_WORD
}

/// Estimated tokens of the fixed batch instruction
pub fn default_prompt_overhead() -> f64 {
    estimate_tokens(&batch_header())
}

/// Estimated tokens one complaint adds to a request and its answer
pub fn default_per_item_cost() -> f64 {
    (AVERAGE_COMPLAINT_WORDS + AVERAGE_REASON_WORDS) * TOKENS_PER_WORD
        + RESULT_SKELETON.split_whitespace().count() as f64
}

/// How many rows go into one batched call
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSizing {
    /// A constant number of rows
    Fixed(usize),

    /// As many rows as fit in a token budget
    TokenBudget {
        /// Tokens allowed per request, prompt and answer together
        budget: usize,
        /// Fixed instruction cost; estimated from the batch header when unset
        prompt_overhead: Option<f64>,
        /// Cost of one row; estimated from average complaint length when unset
        per_item_cost: Option<f64>,
        /// Upper bound on rows per chunk
        cap: usize,
    },
}

impl ChunkSizing {
    /// Token-budget sizing with estimated overhead and per-item cost
    pub fn token_budget(budget: usize, cap: usize) -> Self {
        ChunkSizing::TokenBudget {
            budget,
            prompt_overhead: None,
            per_item_cost: None,
            cap,
        }
    }

    /// Rows per chunk, or a configuration error when no sane size exists
    pub fn resolve(&self) -> Result<usize> {
        match *self {
            ChunkSizing::Fixed(0) => Err(ClassifierError::configuration(
                "Chunk size must be at least 1",
            )),
            ChunkSizing::Fixed(size) => Ok(size),
            ChunkSizing::TokenBudget {
                budget,
                prompt_overhead,
                per_item_cost,
                cap,
            } => {
                if cap == 0 {
                    return Err(ClassifierError::configuration("Chunk cap must be at least 1"));
                }

                let overhead = prompt_overhead.unwrap_or_else(default_prompt_overhead);
                let cost = per_item_cost.unwrap_or_else(default_per_item_cost);
                let available = budget as f64 - overhead;

                if !(available > 0.0) {
                    return Err(ClassifierError::configuration(format!(
                        "Token budget {} does not cover the prompt overhead of {:.0} tokens",
                        budget, overhead
                    )));
                }
                if !(cost > 0.0) || !cost.is_finite() {
                    return Err(ClassifierError::configuration(format!(
                        "Per-item token cost must be positive, got {}",
                        cost
                    )));
                }

                let fitting = (available / cost).floor() as usize;
                Ok(fitting.min(cap).max(1))
            }
        }
    }
}
