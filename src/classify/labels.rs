//! Class-index → label table.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;

use crate::classify::{ClassificationError, Labels};

/// Errors loading the label table.
#[derive(Debug, Error)]
pub enum LabelStoreError {
    #[error("failed to read label table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse label table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("label table is empty")]
    Empty,
}

/// Read-only label rows, indexed by classifier output index.
///
/// The on-disk form is a JSON array: `[{"en": "rose", "ko": "장미"}, ...]`.
#[derive(Debug, Clone)]
pub struct LabelStore {
    rows: Vec<Labels>,
}

impl LabelStore {
    /// Load the table once from disk.
    pub fn load(path: &Path) -> Result<Self, LabelStoreError> {
        let file = File::open(path)?;
        let rows: Vec<Labels> = serde_json::from_reader(BufReader::new(file))?;
        let store = Self::from_rows(rows)?;
        tracing::info!(path = ?path, labels = store.len(), "Label table loaded");
        Ok(store)
    }

    /// Parse a table from JSON text.
    pub fn from_json(json: &str) -> Result<Self, LabelStoreError> {
        Self::from_rows(serde_json::from_str(json)?)
    }

    pub fn from_rows(rows: Vec<Labels>) -> Result<Self, LabelStoreError> {
        if rows.is_empty() {
            return Err(LabelStoreError::Empty);
        }
        Ok(Self { rows })
    }

    /// Look up the label pair for a class index.
    pub fn lookup(&self, index: usize) -> Result<Labels, ClassificationError> {
        self.rows
            .get(index)
            .cloned()
            .ok_or(ClassificationError::UnknownIndex {
                index,
                available: self.rows.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"[
        {"en": "daisy", "ko": "데이지"},
        {"en_class": "rose", "ko_class": "장미"}
    ]"#;

    #[test]
    fn lookup_by_index() {
        let store = LabelStore::from_json(TABLE).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup(1).unwrap(), Labels::new("rose", "장미"));
    }

    #[test]
    fn out_of_range_index_is_classification_error() {
        let store = LabelStore::from_json(TABLE).unwrap();
        assert_eq!(
            store.lookup(5),
            Err(ClassificationError::UnknownIndex { index: 5, available: 2 })
        );
    }

    #[test]
    fn empty_table_rejected() {
        assert!(matches!(LabelStore::from_json("[]"), Err(LabelStoreError::Empty)));
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!("petal-labels-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, TABLE).unwrap();

        let store = LabelStore::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(store.lookup(0).unwrap().english, "daisy");
    }
}
