use std::time::Duration;

use async_trait::async_trait;
use biblioscope_core::{CandidateRecord, Creator, ItemType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::{RateLimitedClient, USER_AGENT};
use crate::identifiers::isbn::Isbn;
use crate::sources::{SearchQuery, StructuredSearch, parse_base_url};

const BASE_URL: &str = "https://openlibrary.org";
const CATALOG: &str = "Open Library";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenLibraryBook {
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub publishers: Vec<String>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<u64>,
    pub url: Option<String>,
}

fn names(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    item.get("name")
                        .and_then(Value::as_str)
                        .or_else(|| item.as_str())
                })
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

impl OpenLibraryBook {
    /// Parse one entry of the `jscmd=data` books API response.
    pub fn from_json(v: &Value) -> Self {
        let text = |key: &str| {
            v.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
        };

        Self {
            title: text("title").unwrap_or_default(),
            subtitle: text("subtitle"),
            authors: names(v.get("authors")),
            publishers: names(v.get("publishers")),
            publish_date: text("publish_date"),
            number_of_pages: v.get("number_of_pages").and_then(Value::as_u64),
            url: text("url"),
        }
    }

    pub fn into_candidate(self, isbn: &Isbn) -> CandidateRecord {
        let title = match &self.subtitle {
            Some(subtitle) => format!("{}: {subtitle}", self.title),
            None => self.title.clone(),
        };
        let mut record = CandidateRecord::new(ItemType::Book, title).with_catalog(CATALOG);
        record.creators = self
            .authors
            .iter()
            .map(|name| Creator::from_display_name(name))
            .collect();
        record.fields.isbn = Some(isbn.isbn13.clone());
        record.fields.publisher = self.publishers.into_iter().next();
        record.fields.date = self.publish_date;
        record.fields.pages = self.number_of_pages.map(|n| n.to_string());
        record.fields.url = self.url;
        record
    }
}

pub struct OpenLibrarySource {
    client: RateLimitedClient,
    base_url: String,
}

impl OpenLibrarySource {
    pub fn new(min_interval: Duration) -> Result<Self> {
        Self::with_params(BASE_URL, min_interval)
    }

    pub fn with_params(base_url: &str, min_interval: Duration) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(CATALOG, min_interval, 3, USER_AGENT)?,
            base_url: base_url.to_string(),
        })
    }

    pub async fn fetch_by_isbn(&self, isbn: &Isbn) -> Result<Option<OpenLibraryBook>> {
        let mut url = parse_base_url(&self.base_url)?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| ScienceError::Parse("invalid Open Library base URL".to_string()))?;
            segs.pop_if_empty();
            segs.push("api");
            segs.push("books");
        }
        let bibkey = format!("ISBN:{}", isbn.isbn13);
        url.query_pairs_mut()
            .append_pair("bibkeys", &bibkey)
            .append_pair("format", "json")
            .append_pair("jscmd", "data");

        let json: Value = self.client.get_json(url.as_str()).await?;
        Ok(json.get(&bibkey).map(OpenLibraryBook::from_json))
    }
}

#[async_trait]
impl StructuredSearch for OpenLibrarySource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateRecord>> {
        let SearchQuery::Isbn(raw) = query else {
            return Ok(Vec::new());
        };
        let isbn = Isbn::parse(raw)?;
        Ok(self
            .fetch_by_isbn(&isbn)
            .await?
            .filter(|book| !book.title.is_empty())
            .map(|book| book.into_candidate(&isbn))
            .into_iter()
            .collect())
    }
}
