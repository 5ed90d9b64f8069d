// Annotation table model
// Ordered speaker-turn records; insertion order is display order

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected fields on a manually entered record. The store is left
/// unchanged when validation fails.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("start time {0} is negative")]
    NegativeStart(f64),
    #[error("end time {end} is not after start time {start}")]
    NonPositiveDuration { start: f64, end: f64 },
    #[error("speaker id is empty")]
    EmptySpeaker,
}

/// One speaker turn. Overlapping turns are allowed; real diarization is
/// ambiguous and the table does not pretend otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub start_secs: f64,
    pub end_secs: f64,
    pub speaker: String,
}

impl AnnotationRecord {
    pub fn new(start_secs: f64, end_secs: f64, speaker: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            speaker: speaker.into(),
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Field constraints: start >= 0, end > start, non-blank speaker.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.start_secs >= 0.0) {
            return Err(ValidationError::NegativeStart(self.start_secs));
        }
        if !(self.end_secs > self.start_secs) {
            return Err(ValidationError::NonPositiveDuration {
                start: self.start_secs,
                end: self.end_secs,
            });
        }
        if self.speaker.trim().is_empty() {
            return Err(ValidationError::EmptySpeaker);
        }
        Ok(())
    }
}

/// Stable handle for a table row, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(u64);

/// Ordered collection of speaker turns for one editing session.
///
/// Touched only from the UI-driving thread; single-writer by convention,
/// no internal locking.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    rows: Vec<(RecordId, AnnotationRecord)>,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a record. Row order is insertion order.
    pub fn add(&mut self, record: AnnotationRecord) -> Result<RecordId, ValidationError> {
        record.validate()?;
        let id = self.alloc_id();
        self.rows.push((id, record));
        Ok(id)
    }

    /// Remove every row whose id is in `ids`, preserving the relative order
    /// of the remaining rows. An empty selection is a harmless no-op.
    /// Returns the number of rows removed.
    pub fn delete(&mut self, ids: &HashSet<RecordId>) -> usize {
        if ids.is_empty() {
            return 0; // nothing selected
        }
        let before = self.rows.len();
        self.rows.retain(|(id, _)| !ids.contains(id));
        before - self.rows.len()
    }

    /// Remove all rows unconditionally. Any confirmation prompt is the UI's
    /// concern, not enforced here.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Atomic bulk replacement, used by RTTM load. Callers hand over
    /// already-validated records (the codec validates per line).
    pub fn replace_all(&mut self, records: Vec<AnnotationRecord>) {
        let rows = records
            .into_iter()
            .map(|record| {
                let id = self.alloc_id();
                (id, record)
            })
            .collect();
        self.rows = rows;
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&AnnotationRecord> {
        self.rows
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, record)| record)
    }

    /// Rows in display order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &AnnotationRecord)> {
        self.rows.iter().map(|(id, record)| (*id, record))
    }

    fn alloc_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: f64, end: f64, speaker: &str) -> AnnotationRecord {
        AnnotationRecord::new(start, end, speaker)
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut store = AnnotationStore::new();
        store.add(record(0.0, 1.0, "A")).unwrap();
        store.add(record(5.0, 6.5, "B")).unwrap();
        store.add(record(1.0, 2.0, "A")).unwrap();

        let speakers: Vec<&str> = store.iter().map(|(_, r)| r.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["A", "B", "A"]);

        // Last element is the record just added, prior rows untouched
        let (_, last) = store.iter().last().unwrap();
        assert_eq!(*last, record(1.0, 2.0, "A"));
    }

    #[test]
    fn test_add_rejects_negative_start() {
        let mut store = AnnotationStore::new();
        let err = store.add(record(-0.5, 1.0, "A")).unwrap_err();
        assert_eq!(err, ValidationError::NegativeStart(-0.5));
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_rejects_end_not_after_start() {
        let mut store = AnnotationStore::new();
        assert!(store.add(record(2.0, 2.0, "A")).is_err());
        assert!(store.add(record(2.0, 1.0, "A")).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_rejects_blank_speaker() {
        let mut store = AnnotationStore::new();
        let err = store.add(record(0.0, 1.0, "   ")).unwrap_err();
        assert_eq!(err, ValidationError::EmptySpeaker);
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_failure_leaves_existing_rows_unchanged() {
        let mut store = AnnotationStore::new();
        store.add(record(0.0, 1.0, "A")).unwrap();
        assert!(store.add(record(-1.0, 1.0, "B")).is_err());

        assert_eq!(store.len(), 1);
        let (_, only) = store.iter().next().unwrap();
        assert_eq!(only.speaker, "A");
    }

    #[test]
    fn test_overlapping_records_are_allowed() {
        let mut store = AnnotationStore::new();
        store.add(record(0.0, 5.0, "A")).unwrap();
        store.add(record(2.0, 4.0, "B")).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_delete_empty_selection_is_noop() {
        let mut store = AnnotationStore::new();
        store.add(record(0.0, 1.0, "A")).unwrap();

        let removed = store.delete(&HashSet::new());
        assert_eq!(removed, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_removes_only_selected_rows() {
        let mut store = AnnotationStore::new();
        let a = store.add(record(0.0, 1.0, "A")).unwrap();
        let b = store.add(record(1.0, 2.0, "B")).unwrap();
        let c = store.add(record(2.0, 3.0, "C")).unwrap();

        let removed = store.delete(&HashSet::from([b]));
        assert_eq!(removed, 1);

        let remaining: Vec<RecordId> = store.iter().map(|(id, _)| id).collect();
        assert_eq!(remaining, vec![a, c]);
        assert!(store.get(b).is_none());
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let mut store = AnnotationStore::new();
        let a = store.add(record(0.0, 1.0, "A")).unwrap();
        store.delete(&HashSet::from([a]));

        // a is gone; deleting it again removes nothing
        let removed = store.delete(&HashSet::from([a]));
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_clear_always_empties_the_store() {
        let mut store = AnnotationStore::new();
        store.clear();
        assert!(store.is_empty());

        store.add(record(0.0, 1.0, "A")).unwrap();
        store.add(record(1.0, 2.0, "B")).unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_swaps_contents() {
        let mut store = AnnotationStore::new();
        let old = store.add(record(0.0, 1.0, "old")).unwrap();

        store.replace_all(vec![record(3.0, 4.0, "new1"), record(4.0, 5.0, "new2")]);

        assert_eq!(store.len(), 2);
        assert!(store.get(old).is_none());
        let speakers: Vec<&str> = store.iter().map(|(_, r)| r.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["new1", "new2"]);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = AnnotationStore::new();
        let a = store.add(record(0.0, 1.0, "A")).unwrap();
        store.clear();
        let b = store.add(record(0.0, 1.0, "B")).unwrap();
        assert_ne!(a, b);
    }
}
