
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{KbError, Result};

/// One known-issue record: a short description paired with its fix text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub short_description: String,
    pub fix_text: String,
}

/// Ordered, immutable collection of knowledge entries. Row order is
/// significant: it is the join key to vector index positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }

    /// Load entries from a CSV export of the knowledge-base spreadsheet.
    ///
    /// Column names are normalized at this boundary: headers are lowercased
    /// and trimmed, `short_desc` is accepted as an alias for
    /// `short_description`, and the fix column is named `text` in the
    /// source export. Missing cells load as empty strings.
    #[inline]
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).map_err(|e| {
            KbError::Dataset(format!("Failed to open dataset {}: {}", path.display(), e))
        })?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| KbError::Dataset(format!("Failed to read dataset headers: {}", e)))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let desc_column = headers
            .iter()
            .position(|h| h == "short_description" || h == "short_desc")
            .ok_or_else(|| {
                KbError::Dataset("Dataset is missing a short_description column".to_string())
            })?;
        let fix_column = headers
            .iter()
            .position(|h| h == "text" || h == "fix_text")
            .ok_or_else(|| KbError::Dataset("Dataset is missing a text column".to_string()))?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record
                .map_err(|e| KbError::Dataset(format!("Failed to read dataset row: {}", e)))?;
            entries.push(KnowledgeEntry {
                short_description: record
                    .get(desc_column)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                fix_text: record.get(fix_column).unwrap_or_default().trim().to_string(),
            });
        }

        info!(
            "Loaded {} knowledge entries from {}",
            entries.len(),
            path.display()
        );

        Ok(Self { entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, position: usize) -> Option<&KnowledgeEntry> {
        self.entries.get(position)
    }

    /// Short descriptions in row order, the texts the index is built from.
    #[inline]
    pub fn short_descriptions(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.short_description.clone())
            .collect()
    }
}
