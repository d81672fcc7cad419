use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use biblioscope_core::CandidateRecord;
use reqwest::Url;

use crate::error::{Result, ScienceError};

pub mod crossref;
pub mod openlibrary;

pub use crossref::CrossRefSource;
pub use openlibrary::OpenLibrarySource;

/// A precise lookup handed to a structured search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Journal article by DOI.
    Doi(String),
    /// Book by ISBN.
    Isbn(String),
    TitleAuthor { title: String, author: String },
    /// Quoted phrases taken from the document body.
    FullText(String),
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Doi(doi) => write!(f, "DOI {doi}"),
            Self::Isbn(isbn) => write!(f, "ISBN {isbn}"),
            Self::TitleAuthor { title, author } => write!(f, "title {title:?} author {author:?}"),
            Self::FullText(text) => write!(f, "full text {text}"),
        }
    }
}

/// Turns a precise query into zero or more candidate records, best first.
#[async_trait]
pub trait StructuredSearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateRecord>>;
}

/// CrossRef for articles, title and full-text queries; Open Library for ISBNs.
pub struct ScholarlySearch {
    crossref: CrossRefSource,
    openlibrary: OpenLibrarySource,
}

impl ScholarlySearch {
    pub fn new(crossref: CrossRefSource, openlibrary: OpenLibrarySource) -> Self {
        Self {
            crossref,
            openlibrary,
        }
    }

    /// Production endpoints, spaced by `min_interval`.
    pub fn with_defaults(min_interval: Duration, polite_email: Option<String>) -> Result<Self> {
        Ok(Self::new(
            CrossRefSource::new(min_interval, polite_email)?,
            OpenLibrarySource::new(min_interval)?,
        ))
    }
}

#[async_trait]
impl StructuredSearch for ScholarlySearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateRecord>> {
        match query {
            SearchQuery::Isbn(_) => self.openlibrary.search(query).await,
            _ => self.crossref.search(query).await,
        }
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| ScienceError::Parse(format!("invalid URL {base_url}: {e}")))
}
