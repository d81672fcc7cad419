use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::RecordFields;
use super::creator::Creator;
use crate::error::CoreError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Row id of an item in the library database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ItemId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ItemId)
            .map_err(|_| CoreError::ValidationError(format!("invalid item id: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    Attachment,
    JournalArticle,
    Book,
    BookSection,
    ConferencePaper,
    Report,
    Thesis,
    Document,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::JournalArticle => "journalArticle",
            Self::Book => "book",
            Self::BookSection => "bookSection",
            Self::ConferencePaper => "conferencePaper",
            Self::Report => "report",
            Self::Thesis => "thesis",
            Self::Document => "document",
        }
    }

    /// Map a loose type label (CrossRef, CSL or camelCase) onto an item type.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "attachment" => Self::Attachment,
            "journal-article" | "journalarticle" | "article-journal" | "article" => {
                Self::JournalArticle
            }
            "book" | "monograph" | "edited-book" | "reference-book" => Self::Book,
            "book-chapter" | "booksection" | "book-section" | "chapter" => Self::BookSection,
            "proceedings-article" | "conferencepaper" | "conference-paper" | "paper-conference" => {
                Self::ConferencePaper
            }
            "report" => Self::Report,
            "dissertation" | "thesis" => Self::Thesis,
            _ => Self::Document,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored file item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: ItemId,
    pub key: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,

    pub date_added: DateTime<Utc>,
}

impl Attachment {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE)
    }

    /// Only top-level PDFs are eligible for recognition.
    pub fn can_recognize(&self) -> bool {
        self.is_top_level() && self.is_pdf()
    }
}

/// A durable bibliographic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BibRecord {
    pub id: ItemId,
    pub key: String,
    pub item_type: ItemType,
    pub title: String,

    #[serde(default)]
    pub creators: Vec<Creator>,

    #[serde(default)]
    pub fields: RecordFields,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_catalog: Option<String>,

    pub date_added: DateTime<Utc>,
}

/// Lightweight listing row for any item kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub item_type: ItemType,
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Generate a short unique item key.
pub fn new_item_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase()
}
