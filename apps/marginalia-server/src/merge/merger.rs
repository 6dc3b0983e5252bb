//! Annotation merger
//!
//! Combines the stored annotation set of a book with a freshly imported one.
//! Merging is a pure function of its inputs; persistence happens elsewhere.

use std::collections::{BTreeMap, HashSet};

use crate::annotations::{AnnotationRecord, Timestamp};

use super::types::{MergeResult, MergeStats, MergeStrategy};

/// Stored and device versions sharing one timestamp
#[derive(Default)]
struct TimestampSlot {
    stored: Option<AnnotationRecord>,
    device: Option<AnnotationRecord>,
}

/// Merges stored and incoming annotation sets
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationMerger;

impl AnnotationMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge `incoming` into `stored` for the same book
    ///
    /// Incoming records without text are dropped. Missing content hashes are
    /// filled in. The result is sorted by `location_sort` with a stable sort,
    /// and merging the same incoming set again leaves it unchanged.
    pub fn merge(
        &self,
        stored: Vec<AnnotationRecord>,
        incoming: Vec<AnnotationRecord>,
        strategy: MergeStrategy,
    ) -> MergeResult {
        let mut stats = MergeStats {
            stored: stored.len(),
            incoming: incoming.len(),
            ..Default::default()
        };

        let stored = with_hashes(stored);
        let incoming: Vec<AnnotationRecord> = with_hashes(incoming)
            .into_iter()
            .filter(|record| {
                let keep = record.has_content();
                if !keep {
                    tracing::debug!(book_id = %record.book_id, "Dropping annotation without text");
                    stats.discarded += 1;
                }
                keep
            })
            .collect();

        let mut annotations = match strategy {
            MergeStrategy::HashIdentity => merge_by_hash(stored, incoming, &mut stats),
            MergeStrategy::TimestampIdentity => merge_by_timestamp(stored, incoming, &mut stats),
        };

        annotations.sort_by(|a, b| a.location_sort.cmp(&b.location_sort));

        MergeResult { annotations, stats }
    }
}

fn with_hashes(mut records: Vec<AnnotationRecord>) -> Vec<AnnotationRecord> {
    for record in &mut records {
        record.ensure_hash();
    }
    records
}

fn hash_of(record: &AnnotationRecord) -> &str {
    record.content_hash.as_deref().unwrap_or_default()
}

/// Keep the first record for each identity key
fn dedupe<K, F>(records: Vec<AnnotationRecord>, key: F, stats: &mut MergeStats) -> Vec<AnnotationRecord>
where
    K: Eq + std::hash::Hash,
    F: Fn(&AnnotationRecord) -> K,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let first = seen.insert(key(record));
            if !first {
                tracing::debug!(book_id = %record.book_id, "Dropping duplicate annotation");
                stats.duplicates += 1;
            }
            first
        })
        .collect()
}

/// `stored ++ [incoming whose hash is new]`
fn merge_by_hash(
    stored: Vec<AnnotationRecord>,
    incoming: Vec<AnnotationRecord>,
    stats: &mut MergeStats,
) -> Vec<AnnotationRecord> {
    let mut merged = dedupe(stored, |r| hash_of(r).to_string(), stats);
    let incoming = dedupe(incoming, |r| hash_of(r).to_string(), stats);

    let known: HashSet<String> = merged.iter().map(|r| hash_of(r).to_string()).collect();
    let new: Vec<AnnotationRecord> = incoming
        .into_iter()
        .filter(|r| !known.contains(hash_of(r)))
        .collect();

    stats.added = new.len();
    merged.extend(new);
    merged
}

/// One record per timestamp: stored when hashes agree, device otherwise
fn merge_by_timestamp(
    stored: Vec<AnnotationRecord>,
    incoming: Vec<AnnotationRecord>,
    stats: &mut MergeStats,
) -> Vec<AnnotationRecord> {
    let mut slots: BTreeMap<Timestamp, TimestampSlot> = BTreeMap::new();

    for record in dedupe(stored, |r| r.last_modification, stats) {
        let key = record.last_modification;
        slots.entry(key).or_default().stored = Some(record);
    }
    for record in dedupe(incoming, |r| r.last_modification, stats) {
        let key = record.last_modification;
        slots.entry(key).or_default().device = Some(record);
    }

    slots
        .into_values()
        .filter_map(|slot| match (slot.stored, slot.device) {
            (Some(stored), None) => Some(stored),
            (None, Some(device)) => {
                stats.added += 1;
                Some(device)
            }
            (Some(stored), Some(device)) => {
                if hash_of(&stored) == hash_of(&device) {
                    Some(stored)
                } else {
                    tracing::debug!(
                        book_id = %device.book_id,
                        "Device annotation replaces stored version at {}",
                        device.last_modification
                    );
                    stats.replaced += 1;
                    Some(device)
                }
            }
            (None, None) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::HighlightColor;

    fn record(text: &str, sort: &str, ts: f64) -> AnnotationRecord {
        AnnotationRecord::new("b1", Timestamp::from_secs(ts))
            .with_highlight([text])
            .with_location(sort, sort)
    }

    fn hashed(hash: &str, sort: &str) -> AnnotationRecord {
        let mut r = record(hash, sort, 1.0);
        r.content_hash = Some(hash.to_string());
        r
    }

    fn hashes(result: &MergeResult) -> Vec<String> {
        result
            .annotations
            .iter()
            .map(|r| r.content_hash.clone().unwrap_or_default())
            .collect()
    }

    fn is_sorted(records: &[AnnotationRecord]) -> bool {
        records.windows(2).all(|w| w[0].location_sort <= w[1].location_sort)
    }

    #[test]
    fn test_hash_merge_noop() {
        let stored = vec![hashed("abc", "0001")];
        let incoming = vec![hashed("abc", "0001")];
        let result = AnnotationMerger::new().merge(stored.clone(), incoming, MergeStrategy::HashIdentity);
        assert_eq!(result.annotations, stored);
        assert!(result.stats.is_noop());
    }

    #[test]
    fn test_hash_merge_addition() {
        let stored = vec![hashed("abc", "0001")];
        let incoming = vec![hashed("abc", "0001"), hashed("def", "0002")];
        let result = AnnotationMerger::new().merge(stored, incoming, MergeStrategy::HashIdentity);
        assert_eq!(hashes(&result), vec!["abc", "def"]);
        assert_eq!(result.stats.added, 1);
    }

    #[test]
    fn test_hash_merge_ignores_styling_changes() {
        let stored = vec![record("passage", "000010", 100.0).with_color(HighlightColor::Yellow)];
        let restyled = record("passage", "000010", 200.0).with_color(HighlightColor::Blue);
        let result = AnnotationMerger::new().merge(stored.clone(), vec![restyled], MergeStrategy::HashIdentity);
        assert_eq!(result.len(), 1);
        assert_eq!(result.annotations[0].highlight_color, HighlightColor::Yellow);
    }

    #[test]
    fn test_hash_merge_is_append_only() {
        let stored = vec![record("kept", "000005", 1.0), record("also kept", "000001", 2.0)];
        let incoming = vec![record("new", "000003", 3.0)];
        let result = AnnotationMerger::new().merge(stored.clone(), incoming, MergeStrategy::HashIdentity);

        let merged: HashSet<String> = hashes(&result).into_iter().collect();
        for r in &stored {
            assert!(merged.contains(&r.compute_hash()));
        }
        assert_eq!(result.len(), 3);
        assert!(is_sorted(&result.annotations));
    }

    #[test]
    fn test_first_import_is_incoming_sorted() {
        let incoming = vec![record("b", "000002", 2.0), record("a", "000001", 1.0)];
        let result = AnnotationMerger::new().merge(Vec::new(), incoming, MergeStrategy::HashIdentity);
        let texts: Vec<_> = result
            .annotations
            .iter()
            .map(|r| r.highlight_text.clone().unwrap()[0].clone())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_incoming_records_are_discarded() {
        let empty = AnnotationRecord::new("b1", Timestamp::from_secs(5.0)).with_highlight(["  "]);
        let result = AnnotationMerger::new().merge(
            Vec::new(),
            vec![empty, record("real", "000001", 1.0)],
            MergeStrategy::HashIdentity,
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result.stats.discarded, 1);
    }

    #[test]
    fn test_timestamp_conflict_device_wins() {
        let stored = vec![record("old text", "000001", 10.0)];
        let device = vec![record("new text", "000001", 10.0)];
        let result = AnnotationMerger::new().merge(stored, device, MergeStrategy::TimestampIdentity);
        assert_eq!(result.len(), 1);
        assert_eq!(result.annotations[0].highlight_text, Some(vec!["new text".to_string()]));
        assert_eq!(result.stats.replaced, 1);
    }

    #[test]
    fn test_timestamp_equal_hash_keeps_stored() {
        let mut stored = record("same", "000001", 10.0);
        stored.highlight_color = HighlightColor::Purple;
        stored.location = Some("edited display".to_string());
        let device = record("same", "000001", 10.0);

        let result =
            AnnotationMerger::new().merge(vec![stored.clone()], vec![device], MergeStrategy::TimestampIdentity);
        assert_eq!(result.annotations.len(), 1);
        assert_eq!(result.annotations[0].highlight_color, HighlightColor::Purple);
        assert_eq!(result.annotations[0].location.as_deref(), Some("edited display"));
    }

    #[test]
    fn test_timestamp_one_sided_records_survive() {
        let stored = vec![record("stored only", "000003", 1.0)];
        let device = vec![record("device only", "000001", 2.0)];
        let result = AnnotationMerger::new().merge(stored, device, MergeStrategy::TimestampIdentity);
        assert_eq!(result.len(), 2);
        assert_eq!(result.annotations[0].location_sort, "000001");
        assert_eq!(result.stats.added, 1);
    }

    #[test]
    fn test_stable_sort_on_equal_keys() {
        let incoming = vec![
            record("first", "000001", 3.0),
            record("second", "000001", 1.0),
            record("third", "000001", 2.0),
        ];
        let result = AnnotationMerger::new().merge(Vec::new(), incoming, MergeStrategy::HashIdentity);
        let texts: Vec<_> = result
            .annotations
            .iter()
            .map(|r| r.highlight_text.clone().unwrap()[0].clone())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let merger = AnnotationMerger::new();
        let cases: Vec<(Vec<AnnotationRecord>, Vec<AnnotationRecord>)> = vec![
            (Vec::new(), vec![record("a", "000002", 1.0), record("b", "000001", 2.0)]),
            (
                vec![record("a", "000002", 1.0)],
                vec![record("a2", "000002", 1.0), record("c", "000002", 3.0)],
            ),
            (
                vec![record("x", "000009", 5.0), record("y", "000001", 6.0)],
                vec![record("y", "000001", 6.0), record("y", "000004", 7.0)],
            ),
            (vec![record("only", "000001", 1.0)], Vec::new()),
        ];

        for strategy in [MergeStrategy::HashIdentity, MergeStrategy::TimestampIdentity] {
            for (stored, incoming) in &cases {
                let once = merger.merge(stored.clone(), incoming.clone(), strategy);
                let twice = merger.merge(once.annotations.clone(), incoming.clone(), strategy);
                assert_eq!(once.annotations, twice.annotations, "strategy {}", strategy);
                assert!(is_sorted(&once.annotations));
            }
        }
    }
}
