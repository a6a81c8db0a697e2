//! Batch runner
//!
//! Drives a whole classification job: rows are processed strictly in order,
//! one backend call outstanding at a time, either row by row or in chunks.
//! Consecutive failed units are counted and stop the run at the configured
//! threshold. However the run ends, every row leaves with a result.

mod chunking;
mod reconcile;

pub use chunking::{default_per_item_cost, default_prompt_overhead, estimate_tokens, ChunkSizing};
pub use reconcile::{reconcile, ChunkTally, MISSING_FROM_BATCH};

use std::any::Any;
use std::ops::Range;
use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::ClassifierClient;
use crate::config::{RunConfig, RunMode, ServiceConfig};
use crate::error::Result;
use crate::model::{rows, ClassificationResult, ComplaintRow, Progress, ProgressSink, RowSource, RunState};
use crate::table::ResultTable;
use crate::taxonomy::Sentinel;
use crate::util::generate_run_id;

/// Reason written into rows left behind by an early stop
pub const STOPPED_REASON: &str = "not processed due to consecutive errors";

/// Reason written into rows left behind by a cancellation
pub const CANCELLED_REASON: &str = "not processed: run cancelled";

/// Reason written into blank rows
pub const EMPTY_REASON: &str = "empty complaint, not submitted";

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every unit was processed
    Completed,
    /// The consecutive-failure threshold was reached
    StoppedEarly {
        consecutive_failures: usize,
        /// First row that was not processed
        at_row: usize,
    },
    /// The cancellation token fired
    Cancelled {
        /// First row that was not processed
        at_row: usize,
    },
}

impl RunOutcome {
    fn backfill_reason(&self) -> &'static str {
        match self {
            RunOutcome::Cancelled { .. } => CANCELLED_REASON,
            _ => STOPPED_REASON,
        }
    }
}

/// Row counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Rows carrying a taxonomy label
    pub classified: usize,
    /// Rows carrying an error sentinel, backfilled rows excluded
    pub errors: usize,
    /// Blank rows
    pub skipped: usize,
    /// Rows never reached
    pub backfilled: usize,
    /// Units (rows or chunks) processed
    pub units: usize,
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One result per input row, in input order
    pub results: Vec<ClassificationResult>,
    pub outcome: RunOutcome,
    pub state: RunState,
    pub stats: RunStats,
}

impl RunReport {
    /// Whether the failure threshold ended the run
    pub fn stopped_early(&self) -> bool {
        matches!(self.outcome, RunOutcome::StoppedEarly { .. })
    }

    /// Whether the run was cancelled
    pub fn was_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }

    /// Append the results to the source rows as a table
    pub fn into_table<S: RowSource + ?Sized>(self, column: &str, source: &S) -> Result<ResultTable> {
        let mut table = ResultTable::from_texts(column, rows(source).into_iter().map(|row| row.text));
        table.append_classification(self.results)?;
        Ok(table)
    }
}

/// Per-unit verdict fed into the run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitOutcome {
    Success,
    Failure,
    /// Nothing was submitted; the failure counter is left alone
    Skipped,
    Cancelled,
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs classification jobs with one client and one configuration
#[derive(Debug, Clone)]
pub struct BatchRunner {
    client: ClassifierClient,
    config: RunConfig,
}

impl BatchRunner {
    /// Create a runner
    pub fn new(client: ClassifierClient, config: RunConfig) -> Self {
        Self { client, config }
    }

    /// Run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Classify every row of `source`.
    ///
    /// Only a configuration problem found before any work starts is an
    /// error; everything after that ends up in the report.
    pub async fn run<S: RowSource + ?Sized>(
        &self,
        source: &S,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        self.config.validate()?;
        let chunk_size = match &self.config.mode {
            RunMode::PerRow => 1,
            RunMode::Chunked(sizing) => sizing.resolve()?,
        };

        let run_id = generate_run_id();
        let started_at = Utc::now();
        let rows = rows(source);
        let total = rows.len();

        let units: Vec<Range<usize>> = (0..total)
            .step_by(chunk_size)
            .map(|start| start..(start + chunk_size).min(total))
            .collect();

        log::info!(
            "Run {} started: {} rows in {} unit(s) of up to {} row(s), stop after {} consecutive failures",
            run_id,
            total,
            units.len(),
            chunk_size,
            self.config.stop_threshold
        );

        let mut results: Vec<Option<ClassificationResult>> = vec![None; total];
        let mut state = RunState::new(self.config.stop_threshold);
        let mut outcome = RunOutcome::Completed;
        let mut processed_units = 0;

        for (position, window) in units.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled { at_row: window.start };
                break;
            }

            let unit = &rows[window.clone()];
            let verdict = match self.config.mode {
                RunMode::PerRow => self.process_row(&unit[0], &mut results, cancel).await,
                RunMode::Chunked(_) => self.process_chunk(unit, &mut results, cancel).await,
            };

            match verdict {
                UnitOutcome::Success => state.record_success(),
                UnitOutcome::Failure => state.record_failure(),
                UnitOutcome::Skipped => {}
                UnitOutcome::Cancelled => {
                    outcome = RunOutcome::Cancelled { at_row: window.start };
                    break;
                }
            }
            processed_units += 1;

            sink.report(Progress {
                completed: window.end,
                total,
                status: Some(format!("rows {}-{} of {}", window.start + 1, window.end, total)),
            });

            if state.should_stop() {
                log::error!(
                    "Run {} stopping early after {} consecutive failed unit(s) at row {}",
                    run_id,
                    state.consecutive_failures,
                    window.end
                );
                outcome = RunOutcome::StoppedEarly {
                    consecutive_failures: state.consecutive_failures,
                    at_row: window.end,
                };
                break;
            }

            let is_last = position + 1 == units.len();
            if !is_last && verdict != UnitOutcome::Skipped && !self.config.inter_call_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        outcome = RunOutcome::Cancelled { at_row: window.end };
                        break;
                    }
                    _ = tokio::time::sleep(self.config.inter_call_delay) => {}
                }
            }
        }

        let mut stats = RunStats {
            units: processed_units,
            ..RunStats::default()
        };
        let reason = outcome.backfill_reason();
        let results: Vec<ClassificationResult> = results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| {
                    stats.backfilled += 1;
                    ClassificationResult::sentinel(Sentinel::NotClassified, reason)
                })
            })
            .collect();

        for result in &results {
            match result.sentinel_kind() {
                None => stats.classified += 1,
                Some(Sentinel::Empty) => stats.skipped += 1,
                Some(_) => stats.errors += 1,
            }
        }
        stats.errors -= stats.backfilled;

        sink.report(Progress {
            completed: total,
            total,
            status: Some(match outcome {
                RunOutcome::Completed => "done".to_string(),
                RunOutcome::StoppedEarly { .. } => format!("stopped early, {} row(s) backfilled", stats.backfilled),
                RunOutcome::Cancelled { .. } => format!("cancelled, {} row(s) backfilled", stats.backfilled),
            }),
        });

        log::info!(
            "Run {} finished ({:?}): {} classified, {} errors, {} blank, {} backfilled",
            run_id,
            outcome,
            stats.classified,
            stats.errors,
            stats.skipped,
            stats.backfilled
        );

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            results,
            outcome,
            state,
            stats,
        })
    }

    async fn process_row(
        &self,
        row: &ComplaintRow,
        results: &mut [Option<ClassificationResult>],
        cancel: &CancellationToken,
    ) -> UnitOutcome {
        if row.is_blank() {
            results[row.index] = Some(ClassificationResult::sentinel(Sentinel::Empty, EMPTY_REASON));
            return UnitOutcome::Skipped;
        }

        let call = AssertUnwindSafe(self.client.classify_one(&row.text)).catch_unwind();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return UnitOutcome::Cancelled,
            caught = call => match caught {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic);
                    log::error!("Row {} panicked: {}", row.index, message);
                    ClassificationResult::sentinel(Sentinel::General, format!("unexpected failure: {}", message))
                }
            },
        };

        let verdict = if result.is_error() {
            UnitOutcome::Failure
        } else {
            UnitOutcome::Success
        };
        results[row.index] = Some(result);
        verdict
    }

    async fn process_chunk(
        &self,
        unit: &[ComplaintRow],
        results: &mut [Option<ClassificationResult>],
        cancel: &CancellationToken,
    ) -> UnitOutcome {
        let start = match unit.first() {
            Some(row) => row.index,
            None => return UnitOutcome::Skipped,
        };

        let mut items: Vec<(usize, &str)> = Vec::with_capacity(unit.len());
        let mut requested: Vec<usize> = Vec::with_capacity(unit.len());
        for row in unit {
            if row.is_blank() {
                results[row.index] = Some(ClassificationResult::sentinel(Sentinel::Empty, EMPTY_REASON));
            } else {
                items.push((row.index - start, row.text.as_str()));
                requested.push(row.index);
            }
        }

        if items.is_empty() {
            return UnitOutcome::Skipped;
        }

        let call = AssertUnwindSafe(self.client.classify_many(&items)).catch_unwind();
        let caught = tokio::select! {
            biased;
            _ = cancel.cancelled() => return UnitOutcome::Cancelled,
            caught = call => caught,
        };

        let (sentinel, message) = match caught {
            Ok(Ok(answer)) => {
                let tally = reconcile(start, &requested, answer, results);
                log::debug!(
                    "Chunk at row {}: {} written, {} error(s)",
                    start,
                    tally.written,
                    tally.errors
                );
                return if tally.is_failure() {
                    UnitOutcome::Failure
                } else {
                    UnitOutcome::Success
                };
            }
            Ok(Err(err)) => {
                log::warn!("Chunk at row {} failed: {}", start, err);
                (err.batch_sentinel(), err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic);
                log::error!("Chunk at row {} panicked: {}", start, message);
                (Sentinel::Batch, format!("unexpected failure: {}", message))
            }
        };

        for index in requested {
            results[index] = Some(ClassificationResult::sentinel(sentinel, message.clone()));
        }
        UnitOutcome::Failure
    }
}
