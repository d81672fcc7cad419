use std::time::Duration;

use async_trait::async_trait;
use biblioscope_core::{CandidateRecord, Creator, ItemType};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::{RateLimitedClient, USER_AGENT};
use crate::sources::SearchQuery;

/// Provenance tag of records built directly from a recognition response.
pub const METADATA_SERVICE_CATALOG: &str = "Biblioscope Metadata Service";

/// Looks a document up by content hash and extracted text.
#[async_trait]
pub trait RemoteRecognizer: Send + Sync {
    /// `Ok(None)` when the service knows nothing about the document.
    async fn recognize(&self, hash: &str, text: &str) -> Result<Option<RemoteResponse>>;
}

#[derive(Debug, Clone, Serialize)]
struct RecognitionRequest<'a> {
    hash: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAuthor {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Body returned by the recognition service. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteResponse {
    /// `"doi:…"` / `"isbn:…"` entries.
    pub identifiers: Vec<String>,
    pub doi: Option<String>,
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<RemoteAuthor>,
    #[serde(rename = "abstract")]
    pub abstract_note: Option<String>,
    pub year: Option<String>,
    pub pages: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub issn: Option<String>,
    pub container: Option<String>,
    pub publisher: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl RemoteResponse {
    /// A response with neither a title nor identifiers is no match.
    pub fn is_match(&self) -> bool {
        non_empty(&self.title).is_some()
            || !self.identifiers.is_empty()
            || non_empty(&self.doi).is_some()
            || non_empty(&self.isbn).is_some()
    }

    pub fn title(&self) -> Option<&str> {
        non_empty(&self.title)
    }

    pub fn abstract_note(&self) -> Option<&str> {
        non_empty(&self.abstract_note)
    }

    /// Structured searches for every returned identifier, in response order.
    /// Unknown identifier kinds are skipped.
    pub fn identifier_queries(&self) -> Vec<SearchQuery> {
        let mut queries = Vec::new();
        let mut push = |query: SearchQuery| {
            if !queries.contains(&query) {
                queries.push(query);
            }
        };

        for entry in &self.identifiers {
            let Some((kind, value)) = entry.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match kind.trim().to_ascii_lowercase().as_str() {
                "doi" => push(SearchQuery::Doi(value.to_string())),
                "isbn" => push(SearchQuery::Isbn(value.to_string())),
                other => tracing::debug!(kind = other, "ignoring identifier kind"),
            }
        }
        if let Some(doi) = non_empty(&self.doi) {
            push(SearchQuery::Doi(doi.to_string()));
        }
        if let Some(isbn) = non_empty(&self.isbn) {
            push(SearchQuery::Isbn(isbn.to_string()));
        }
        queries
    }

    /// Last names (first names when absent) of the first two authors.
    pub fn lookup_authors(&self) -> String {
        self.authors
            .iter()
            .take(2)
            .filter_map(|a| {
                let last = a.last_name.trim();
                let first = a.first_name.trim();
                if !last.is_empty() {
                    Some(last)
                } else if !first.is_empty() {
                    Some(first)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build a record straight from the response fields.
    pub fn to_candidate(&self) -> Option<CandidateRecord> {
        let title = self.title()?;
        let item_type = non_empty(&self.item_type)
            .map(ItemType::from_label)
            .filter(|t| !matches!(t, ItemType::Attachment | ItemType::Document))
            .unwrap_or(ItemType::JournalArticle);

        let mut record =
            CandidateRecord::new(item_type, title).with_catalog(METADATA_SERVICE_CATALOG);
        record.creators = self
            .authors
            .iter()
            .map(|a| Creator::author(a.first_name.trim(), a.last_name.trim()))
            .collect();

        let owned = |v: &Option<String>| non_empty(v).map(ToOwned::to_owned);
        let fields = &mut record.fields;
        fields.doi = owned(&self.doi);
        fields.isbn = owned(&self.isbn);
        fields.abstract_note = owned(&self.abstract_note);
        fields.date = owned(&self.year);
        fields.pages = owned(&self.pages);
        fields.volume = owned(&self.volume);
        fields.issue = owned(&self.issue);
        fields.issn = owned(&self.issn);
        fields.publisher = owned(&self.publisher);
        fields.url = owned(&self.url);
        match item_type {
            ItemType::BookSection => fields.book_title = owned(&self.container),
            _ => fields.publication_title = owned(&self.container),
        }
        Some(record)
    }
}

/// JSON client for the recognition service.
pub struct RecognitionServiceClient {
    client: RateLimitedClient,
    url: String,
}

impl RecognitionServiceClient {
    /// A 429 is not retried here; the caller reports it as rate limited.
    pub fn new(url: impl Into<String>, min_interval: Duration) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new("recognition service", min_interval, 0, USER_AGENT)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RemoteRecognizer for RecognitionServiceClient {
    async fn recognize(&self, hash: &str, text: &str) -> Result<Option<RemoteResponse>> {
        let request = RecognitionRequest { hash, text };
        let response: RemoteResponse = self.client.post_json(&self.url, &request).await?;
        if !response.is_match() {
            tracing::debug!(hash, "recognition service returned no match");
            return Ok(None);
        }
        Ok(Some(response))
    }
}
