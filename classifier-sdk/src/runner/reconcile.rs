//! Mapping batch answers back onto absolute row positions

use crate::client::BatchItem;
use crate::model::ClassificationResult;
use crate::taxonomy::Sentinel;

/// Reason written into rows the backend left out of its answer
pub const MISSING_FROM_BATCH: &str = "missing from batch response";

/// What reconciling one chunk produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkTally {
    /// Rows written from the answer, sentinels included
    pub written: usize,

    /// Discarded entries, error results and rows swept as missing
    pub errors: usize,
}

impl ChunkTally {
    /// Whether the chunk counts as a failed unit
    pub fn is_failure(&self) -> bool {
        self.errors > 0
    }
}

/// Write a chunk's answer into `results`.
///
/// `requested` holds the absolute indexes submitted for this chunk, in
/// ascending order; an entry's absolute index is `chunk_start + id`. Entries
/// without an id, outside the requested set, or repeating an id already
/// written are dropped and counted as errors; the first entry for an id wins.
/// Every requested row still unset afterwards gets `NO_CLASIFICADO`.
pub fn reconcile(
    chunk_start: usize,
    requested: &[usize],
    items: Vec<BatchItem>,
    results: &mut [Option<ClassificationResult>],
) -> ChunkTally {
    let mut tally = ChunkTally::default();
    let mut written = vec![false; requested.len()];

    for item in items {
        let id = match item.id {
            Some(id) => id,
            None => {
                log::warn!("Dropping batch entry without a usable id: {}", item.result.reason);
                tally.errors += 1;
                continue;
            }
        };

        let slot = chunk_start
            .checked_add(id)
            .and_then(|absolute| requested.binary_search(&absolute).ok());

        let slot = match slot {
            Some(slot) => slot,
            None => {
                log::warn!(
                    "Dropping batch entry with id {} outside chunk starting at row {}",
                    id,
                    chunk_start
                );
                tally.errors += 1;
                continue;
            }
        };

        if written[slot] {
            log::warn!("Dropping duplicate batch entry for row {}", requested[slot]);
            tally.errors += 1;
            continue;
        }

        if item.result.is_error() {
            tally.errors += 1;
        }
        written[slot] = true;
        results[requested[slot]] = Some(item.result);
        tally.written += 1;
    }

    for (slot, &absolute) in requested.iter().enumerate() {
        if !written[slot] {
            results[absolute] = Some(ClassificationResult::sentinel(
                Sentinel::NotClassified,
                MISSING_FROM_BATCH,
            ));
            tally.errors += 1;
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: usize, label: &str, reason: &str) -> BatchItem {
        BatchItem {
            id: Some(id),
            result: ClassificationResult::classified(label, reason),
        }
    }

    #[test]
    fn test_writes_at_absolute_positions() {
        let mut results = vec![None; 6];
        let tally = reconcile(
            3,
            &[3, 4, 5],
            vec![item(2, "Otros", "c"), item(0, "Otros", "a"), item(1, "Otros", "b")],
            &mut results,
        );

        assert_eq!(tally, ChunkTally { written: 3, errors: 0 });
        assert!(results[..3].iter().all(Option::is_none));
        assert_eq!(results[3].as_ref().unwrap().reason, "a");
        assert_eq!(results[5].as_ref().unwrap().reason, "c");
    }

    #[test]
    fn test_out_of_window_id_is_not_written() {
        // chunk of size 3 at row 2; id 4 would land on row 6
        let mut results = vec![None; 8];
        let tally = reconcile(
            2,
            &[2, 3, 4],
            vec![item(0, "Otros", "a"), item(1, "Otros", "b"), item(2, "Otros", "c"), item(4, "Otros", "bogus")],
            &mut results,
        );

        assert_eq!(tally.written, 3);
        assert_eq!(tally.errors, 1);
        assert!(tally.is_failure());
        assert!(results[6].is_none());
        assert!(results[5].is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first_answer() {
        let mut results = vec![None; 2];
        let tally = reconcile(
            0,
            &[0, 1],
            vec![item(0, "Otros", "first"), item(0, "Tarifas y Boletos", "second"), item(1, "Otros", "b")],
            &mut results,
        );

        assert_eq!(tally, ChunkTally { written: 2, errors: 1 });
        assert_eq!(results[0], Some(ClassificationResult::classified("Otros", "first")));
    }

    #[test]
    fn test_omitted_rows_are_swept() {
        let mut results = vec![None; 3];
        let tally = reconcile(0, &[0, 1, 2], vec![item(1, "Otros", "b")], &mut results);

        assert_eq!(tally, ChunkTally { written: 1, errors: 2 });
        for index in [0, 2] {
            let result = results[index].as_ref().unwrap();
            assert_eq!(result.sentinel_kind(), Some(Sentinel::NotClassified));
            assert_eq!(result.reason, MISSING_FROM_BATCH);
        }
    }

    #[test]
    fn test_unrequested_and_anonymous_entries_are_errors() {
        // row 1 was blank and never submitted
        let mut results = vec![None, Some(ClassificationResult::sentinel(Sentinel::Empty, "blank")), None];
        let anonymous = BatchItem {
            id: None,
            result: ClassificationResult::sentinel(Sentinel::Format, "missing id"),
        };
        let tally = reconcile(
            0,
            &[0, 2],
            vec![item(0, "Otros", "a"), item(1, "Otros", "x"), anonymous, item(2, "Otros", "c")],
            &mut results,
        );

        assert_eq!(tally, ChunkTally { written: 2, errors: 2 });
        assert_eq!(results[1].as_ref().unwrap().sentinel_kind(), Some(Sentinel::Empty));
    }

    #[test]
    fn test_malformed_entry_with_id_is_written_and_counted() {
        let mut results = vec![None; 1];
        let malformed = BatchItem {
            id: Some(0),
            result: ClassificationResult::sentinel(Sentinel::Format, "Category outside the taxonomy: Clima"),
        };
        let tally = reconcile(0, &[0], vec![malformed], &mut results);

        assert_eq!(tally, ChunkTally { written: 1, errors: 1 });
        assert_eq!(results[0].as_ref().unwrap().category, "ERROR_FORMATO");
    }
}
