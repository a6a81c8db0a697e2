//! Data model shared by the client, the runner and the result table

use serde::{Deserialize, Serialize};

use crate::taxonomy::Sentinel;

/// One unit of work: a complaint and its position in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintRow {
    /// 0-based position in the original input
    pub index: usize,

    /// Complaint body
    pub text: String,
}

impl ComplaintRow {
    /// Whether the row has nothing worth submitting
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Category and justification for one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// A taxonomy label or a sentinel code
    pub category: String,

    /// Justification, or an error message when `category` is a sentinel
    pub reason: String,
}

impl ClassificationResult {
    /// A successful classification
    pub fn classified(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            category: label.into(),
            reason: reason.into(),
        }
    }

    /// A sentinel outcome
    pub fn sentinel(sentinel: Sentinel, reason: impl Into<String>) -> Self {
        Self {
            category: sentinel.as_str().to_string(),
            reason: reason.into(),
        }
    }

    /// The sentinel in `category`, if it is one
    pub fn sentinel_kind(&self) -> Option<Sentinel> {
        Sentinel::parse(&self.category)
    }

    /// Whether this result counts as a failure
    pub fn is_error(&self) -> bool {
        self.sentinel_kind().map(|s| s.is_error()).unwrap_or(false)
    }

    /// Whether this result carries a real label
    pub fn is_classified(&self) -> bool {
        self.sentinel_kind().is_none()
    }
}

/// An ordered, indexable collection of complaint cells
pub trait RowSource {
    /// Number of rows
    fn len(&self) -> usize;

    /// Text of the row at `index`, coerced to a string
    fn text_at(&self, index: usize) -> String;

    /// Whether the source has no rows
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RowSource for [String] {
    fn len(&self) -> usize {
        <[String]>::len(self)
    }

    fn text_at(&self, index: usize) -> String {
        self[index].clone()
    }
}

impl RowSource for Vec<String> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn text_at(&self, index: usize) -> String {
        self[index].clone()
    }
}

impl RowSource for [&str] {
    fn len(&self) -> usize {
        <[&str]>::len(self)
    }

    fn text_at(&self, index: usize) -> String {
        self[index].to_string()
    }
}

impl RowSource for Vec<&str> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn text_at(&self, index: usize) -> String {
        self[index].to_string()
    }
}

/// Materialize every row of a source
pub fn rows<S: RowSource + ?Sized>(source: &S) -> Vec<ComplaintRow> {
    (0..source.len())
        .map(|index| ComplaintRow {
            index,
            text: source.text_at(index),
        })
        .collect()
}

/// Consecutive-failure bookkeeping for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunState {
    /// Failed units since the last success
    pub consecutive_failures: usize,

    /// Consecutive failures that abort the run
    pub stop_threshold: usize,
}

impl RunState {
    /// Fresh state for a new run
    pub fn new(stop_threshold: usize) -> Self {
        Self {
            consecutive_failures: 0,
            stop_threshold,
        }
    }

    /// A unit succeeded
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// A unit failed
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Whether the threshold has been reached
    pub fn should_stop(&self) -> bool {
        self.consecutive_failures >= self.stop_threshold
    }
}

/// A progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Rows completed so far
    pub completed: usize,

    /// Rows in the run
    pub total: usize,

    /// Optional status line
    pub status: Option<String>,
}

impl Progress {
    /// Completion ratio in `[0, 1]`; an empty run is complete
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Receives progress notifications; may be called up to `total + 1` times per run
pub trait ProgressSink: Send + Sync {
    /// Report progress
    fn report(&self, progress: Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(Progress) + Send + Sync,
{
    fn report(&self, progress: Progress) {
        self(progress)
    }
}

/// Sink that writes progress to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, progress: Progress) {
        match &progress.status {
            Some(status) => log::info!(
                "[{:>5.1}%] {}/{} {}",
                progress.fraction() * 100.0,
                progress.completed,
                progress.total,
                status
            ),
            None => log::info!(
                "[{:>5.1}%] {}/{}",
                progress.fraction() * 100.0,
                progress.completed,
                progress.total
            ),
        }
    }
}

/// Sink that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Progress) {}
}
