use std::path::Path;
use std::sync::Arc;

use biblioscope_core::{BibRecord, CandidateRecord, ItemId, RecognizeConfig};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{DomainFailure, RecognizeError, ScienceError};
use crate::extract::TextExtractor;
use crate::identifiers::find_identifiers;
use crate::recognize::queries::full_text_queries;
use crate::recognize::remote::{RemoteRecognizer, RemoteResponse};
use crate::recognize::validate::TitleValidator;
use crate::sources::{SearchQuery, StructuredSearch};
use crate::store::ItemStore;

/// Limits the resolver applies to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    pub max_pages: u32,
    pub doi_search_lines: usize,
    pub remote_text_limit: usize,
    pub full_text_queries: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from(&RecognizeConfig::default())
    }
}

impl From<&RecognizeConfig> for ResolverSettings {
    fn from(config: &RecognizeConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            doi_search_lines: config.doi_search_lines,
            remote_text_limit: config.remote_text_limit,
            full_text_queries: config.full_text_queries,
        }
    }
}

/// Extracts text from an attachment, resolves it through the lookup chain
/// and stores the winning candidate as the attachment's new parent.
pub struct MetadataResolver {
    store: Arc<dyn ItemStore>,
    extractor: Arc<dyn TextExtractor>,
    search: Arc<dyn StructuredSearch>,
    /// Unset when no recognition service is configured; that step is skipped.
    remote: Option<Arc<dyn RemoteRecognizer>>,
    settings: ResolverSettings,
}

impl MetadataResolver {
    pub fn new(
        store: Arc<dyn ItemStore>,
        extractor: Arc<dyn TextExtractor>,
        search: Arc<dyn StructuredSearch>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            search,
            remote: None,
            settings,
        }
    }

    /// Consult `remote` after the identifier lookups.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteRecognizer>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    /// Recognize one attachment. `Ok(None)` means no lookup produced an
    /// acceptable match.
    pub async fn recognize(&self, id: ItemId) -> Result<Option<BibRecord>, RecognizeError> {
        let attachment = self
            .store
            .get_attachment(id)
            .await?
            .ok_or(DomainFailure::FileNotFound)?;
        if attachment.parent_id.is_some() {
            return Err(DomainFailure::HasParent.into());
        }

        let path = attachment
            .file_path
            .as_deref()
            .map(Path::new)
            .ok_or(DomainFailure::FileNotFound)?;
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DomainFailure::FileNotFound.into());
        }

        let lines = self
            .extractor
            .extract_lines(path, self.settings.max_pages)
            .await
            .map_err(|e| {
                tracing::warn!(item = %id, error = %e, "text extraction failed");
                DomainFailure::UnreadablePdf
            })?;
        if lines.is_empty() {
            return Err(DomainFailure::NoUsableText.into());
        }

        let Some(candidate) = self.resolve(path, &lines).await? else {
            tracing::info!(item = %id, "no matching metadata");
            return Ok(None);
        };

        tracing::info!(
            item = %id,
            title = %candidate.title,
            catalog = candidate.library_catalog.as_deref().unwrap_or("-"),
            "metadata found"
        );
        let record = self.store.materialize(id, candidate).await?;
        Ok(Some(record))
    }

    /// The fallback chain: text identifiers, the recognition service, then
    /// full-text phrase queries. First accepted candidate wins.
    async fn resolve(
        &self,
        path: &Path,
        lines: &[String],
    ) -> Result<Option<CandidateRecord>, RecognizeError> {
        let ids = find_identifiers(lines, self.settings.doi_search_lines);
        tracing::debug!(doi = ?ids.doi, isbns = ?ids.isbns, "identifiers in text");

        // Identifier lookups are precise enough to skip title validation.
        if let Some(doi) = &ids.doi
            && let Some(candidate) = self.first(&SearchQuery::Doi(doi.clone())).await
        {
            return Ok(Some(candidate));
        }
        if let Some(isbn) = ids.isbns.first()
            && let Some(candidate) = self.first(&SearchQuery::Isbn(isbn.clone())).await
        {
            return Ok(Some(candidate));
        }

        let fulltext = truncate_chars(&lines.join("\n"), self.settings.remote_text_limit);
        let validator = TitleValidator::new(&fulltext);

        if let Some(remote) = &self.remote {
            let hash = file_hash(path).await.map_err(|e| {
                tracing::warn!(pdf = %path.display(), error = %e, "hashing failed");
                DomainFailure::UnreadablePdf
            })?;
            if let Some(response) = remote.recognize(&hash, &fulltext).await?
                && let Some(candidate) = self.resolve_remote(&response, &validator).await
            {
                return Ok(Some(candidate));
            }
        }

        if self.settings.full_text_queries > 0 {
            for query in full_text_queries(lines, self.settings.full_text_queries)? {
                let query = SearchQuery::FullText(query);
                if let Some(candidate) = self.first_valid(&query, &validator).await {
                    return Ok(Some(candidate));
                }
            }
        }

        Ok(None)
    }

    /// A validated lookup by the response's identifiers or title, else a
    /// record built from the response itself when it carries a title.
    async fn resolve_remote(
        &self,
        response: &RemoteResponse,
        validator: &TitleValidator,
    ) -> Option<CandidateRecord> {
        let inherit_abstract = |mut candidate: CandidateRecord| {
            if !candidate.has_abstract() {
                candidate.fields.abstract_note = response.abstract_note().map(ToOwned::to_owned);
            }
            candidate
        };

        for query in response.identifier_queries() {
            if let Some(candidate) = self.first(&query).await
                && validator.validate(&candidate.title)
            {
                return Some(inherit_abstract(candidate));
            }
        }

        let title = response.title()?;
        let query = SearchQuery::TitleAuthor {
            title: title.to_string(),
            author: response.lookup_authors(),
        };
        if let Some(candidate) = self.first_valid(&query, validator).await {
            return Some(inherit_abstract(candidate));
        }

        tracing::debug!(title, "using recognition service record");
        response.to_candidate()
    }

    async fn search(&self, query: &SearchQuery) -> Vec<CandidateRecord> {
        match self.search.search(query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(%query, error = %e, "search failed");
                Vec::new()
            }
        }
    }

    /// The top candidate, unless it has no title to show.
    async fn first(&self, query: &SearchQuery) -> Option<CandidateRecord> {
        let candidate = self.search(query).await.into_iter().next()?;
        if candidate.title.trim().is_empty() {
            tracing::debug!(%query, "top candidate has no title");
            return None;
        }
        Some(candidate)
    }

    async fn first_valid(
        &self,
        query: &SearchQuery,
        validator: &TitleValidator,
    ) -> Option<CandidateRecord> {
        self.search(query)
            .await
            .into_iter()
            .find(|candidate| validator.validate(&candidate.title))
    }
}

/// Hex SHA-256 of the file contents.
async fn file_hash(path: &Path) -> Result<String, ScienceError> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
