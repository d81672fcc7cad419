use serde::{Deserialize, Serialize};

use super::creator::Creator;
use super::item::ItemType;

/// Optional bibliographic fields shared by candidates and stored records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstract_note: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// An unvalidated metadata proposal produced by one resolution strategy.
///
/// Never persisted directly; the item store turns an accepted candidate into
/// a [`BibRecord`](super::item::BibRecord).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub item_type: ItemType,
    pub title: String,

    #[serde(default)]
    pub creators: Vec<Creator>,

    #[serde(default)]
    pub fields: RecordFields,

    /// Provenance tag naming where the metadata came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_catalog: Option<String>,
}

impl CandidateRecord {
    pub fn new(item_type: ItemType, title: impl Into<String>) -> Self {
        Self {
            item_type,
            title: title.into(),
            creators: Vec::new(),
            fields: RecordFields::default(),
            library_catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.library_catalog = Some(catalog.into());
        self
    }

    pub fn has_abstract(&self) -> bool {
        self.fields
            .abstract_note
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty())
    }
}
