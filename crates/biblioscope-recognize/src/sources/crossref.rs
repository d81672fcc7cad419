use std::time::Duration;

use async_trait::async_trait;
use biblioscope_core::{CandidateRecord, Creator, ItemType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScienceError};
use crate::http::{RateLimitedClient, USER_AGENT};
use crate::identifiers::doi::Doi;
use crate::sources::{SearchQuery, StructuredSearch, parse_base_url};

const BASE_URL: &str = "https://api.crossref.org";
const CATALOG: &str = "CrossRef";
const QUERY_ROWS: usize = 5;

static JATS_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));

pub struct CrossRefSource {
    client: RateLimitedClient,
    base_url: String,
}

impl CrossRefSource {
    pub fn new(min_interval: Duration, polite_email: Option<String>) -> Result<Self> {
        Self::with_params(BASE_URL, min_interval, polite_email)
    }

    pub fn with_params(
        base_url: &str,
        min_interval: Duration,
        polite_email: Option<String>,
    ) -> Result<Self> {
        let user_agent = match &polite_email {
            Some(email) => format!("{USER_AGENT} (mailto:{email})"),
            None => USER_AGENT.to_string(),
        };

        Ok(Self {
            client: RateLimitedClient::new(CATALOG, min_interval, 3, &user_agent)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up a single work. A DOI CrossRef does not know yields `None`.
    pub async fn fetch_by_doi(&self, doi: &Doi) -> Result<Option<CrossRefWork>> {
        let mut url = parse_base_url(&self.base_url)?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| ScienceError::Parse("invalid CrossRef base URL".to_string()))?;
            segs.pop_if_empty();
            segs.push("works");
            // The prefix/suffix slash stays a separator; `#`, `?` and `%`
            // inside the suffix are percent-encoded by `push`.
            segs.extend(doi.normalized.split('/'));
        }
        let Some(body) = self.client.get_optional(url.as_str()).await? else {
            return Ok(None);
        };
        let val: Value =
            serde_json::from_str(&body).map_err(|e| ScienceError::Parse(e.to_string()))?;
        CrossRefWork::from_json(&val["message"]).map(Some)
    }

    /// Bibliographic query by title and author string.
    pub async fn query_bibliographic(&self, title: &str, author: &str) -> Result<Vec<CrossRefWork>> {
        let mut url = format!(
            "{}/works?query.bibliographic={}&rows={QUERY_ROWS}",
            self.base_url,
            urlencoding::encode(title)
        );
        if !author.trim().is_empty() {
            url.push_str(&format!("&query.author={}", urlencoding::encode(author.trim())));
        }
        self.query_works(&url).await
    }

    /// Free-text query over everything CrossRef indexes.
    pub async fn query_text(&self, text: &str) -> Result<Vec<CrossRefWork>> {
        let url = format!(
            "{}/works?query={}&rows={QUERY_ROWS}",
            self.base_url,
            urlencoding::encode(text)
        );
        self.query_works(&url).await
    }

    async fn query_works(&self, url: &str) -> Result<Vec<CrossRefWork>> {
        let val: Value = self.client.get_json(url).await?;
        let works = val["message"]["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| CrossRefWork::from_json(item).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(works)
    }
}

#[async_trait]
impl StructuredSearch for CrossRefSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateRecord>> {
        let works = match query {
            SearchQuery::Doi(doi) => {
                let doi = Doi::parse(doi)?;
                self.fetch_by_doi(&doi).await?.into_iter().collect()
            }
            SearchQuery::TitleAuthor { title, author } => {
                self.query_bibliographic(title, author).await?
            }
            SearchQuery::FullText(text) => self.query_text(text).await?,
            SearchQuery::Isbn(_) => Vec::new(),
        };
        Ok(works.into_iter().map(CrossRefWork::into_candidate).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRefWork {
    pub doi: String,
    pub title: Vec<String>,
    pub author: Vec<CrossRefAuthor>,
    pub published: Option<String>,
    pub work_type: String,
    pub container_title: Vec<String>,
    pub publisher: Option<String>,
    pub issn: Vec<String>,
    pub isbn: Vec<String>,
    pub page: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub url: Option<String>,
    pub abstract_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossRefAuthor {
    pub given: Option<String>,
    pub family: Option<String>,
    pub name: Option<String>,
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_array()
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn string_field(v: &Value) -> Option<String> {
    v.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl CrossRefWork {
    pub fn from_json(v: &Value) -> Result<Self> {
        let doi = v["DOI"]
            .as_str()
            .ok_or_else(|| ScienceError::Parse("Missing DOI in CrossRef response".to_string()))?
            .to_string();

        let author = v["author"]
            .as_array()
            .map(|a| a.iter().map(CrossRefAuthor::from_json).collect())
            .unwrap_or_default();

        Ok(Self {
            doi,
            title: string_list(&v["title"]),
            author,
            published: parse_date(v),
            work_type: v["type"].as_str().unwrap_or("journal-article").to_string(),
            container_title: string_list(&v["container-title"]),
            publisher: string_field(&v["publisher"]),
            issn: string_list(&v["ISSN"]),
            isbn: string_list(&v["ISBN"]),
            page: string_field(&v["page"]),
            volume: string_field(&v["volume"]),
            issue: string_field(&v["issue"]),
            url: string_field(&v["URL"]),
            abstract_text: v["abstract"].as_str().map(strip_jats).filter(|s| !s.is_empty()),
        })
    }

    pub fn into_candidate(self) -> CandidateRecord {
        let item_type = ItemType::from_label(&self.work_type);
        let title = self.title.first().cloned().unwrap_or_default();
        let mut record = CandidateRecord::new(item_type, title).with_catalog(CATALOG);

        record.creators = self.author.iter().map(CrossRefAuthor::to_creator).collect();

        let fields = &mut record.fields;
        fields.doi = Some(self.doi);
        fields.date = self.published;
        let container = self.container_title.into_iter().next();
        if item_type == ItemType::BookSection {
            fields.book_title = container;
        } else {
            fields.publication_title = container;
        }
        fields.publisher = self.publisher;
        fields.pages = self.page;
        fields.volume = self.volume;
        fields.issue = self.issue;
        fields.issn = self.issn.into_iter().next();
        fields.isbn = self.isbn.into_iter().next();
        fields.url = self.url;
        fields.abstract_note = self.abstract_text;
        record
    }
}

impl CrossRefAuthor {
    fn from_json(v: &Value) -> Self {
        Self {
            given: string_field(&v["given"]),
            family: string_field(&v["family"]),
            name: string_field(&v["name"]),
        }
    }

    fn to_creator(&self) -> Creator {
        match (&self.given, &self.family, &self.name) {
            (_, None, Some(name)) => Creator::from_display_name(name),
            (given, family, _) => Creator::author(
                given.clone().unwrap_or_default(),
                family.clone().unwrap_or_default(),
            ),
        }
    }
}

/// CrossRef date parts, e.g. `"issued": {"date-parts": [[2017, 6, 12]]}`,
/// rendered as `YYYY[-MM[-DD]]`.
fn parse_date(v: &Value) -> Option<String> {
    ["published-print", "published-online", "issued", "created"]
        .iter()
        .find_map(|key| v[*key]["date-parts"][0].as_array().filter(|p| !p.is_empty()))
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_i64)
                .enumerate()
                .map(|(i, n)| if i == 0 { n.to_string() } else { format!("{n:02}") })
                .collect::<Vec<_>>()
                .join("-")
        })
        .filter(|s| !s.is_empty())
}

fn strip_jats(s: &str) -> String {
    JATS_TAG_RE
        .replace_all(s, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
