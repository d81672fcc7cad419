use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

/// Matches a DOI embedded anywhere in free text. The trailing class keeps
/// sentence punctuation out of the match.
static DOI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"10(?:\.[0-9]{4,})?/[^\s]*[^\s.,]").expect("valid regex"));

const DOI_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "doi:",
    "DOI:",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doi {
    pub raw: String,
    pub normalized: String,
    pub url: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let stripped = DOI_PREFIXES
            .iter()
            .find_map(|prefix| input.strip_prefix(prefix))
            .map(str::trim_start)
            .unwrap_or(input);

        let Some((prefix, suffix)) = stripped.split_once('/') else {
            return Err(ScienceError::InvalidDoi(input.to_string()));
        };
        if !prefix.starts_with("10.") || suffix.is_empty() {
            return Err(ScienceError::InvalidDoi(input.to_string()));
        }

        let normalized = stripped.to_lowercase();
        let url = format!("https://doi.org/{normalized}");

        Ok(Self {
            raw: input.to_string(),
            normalized,
            url,
        })
    }
}

/// Return the first DOI-shaped substring of `text`, without trailing
/// punctuation.
pub fn clean_doi(text: &str) -> Option<String> {
    DOI_RE.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        let doi = Doi::parse("10.1000/xyz123").unwrap();
        assert_eq!(doi.normalized, "10.1000/xyz123");
        assert_eq!(doi.url, "https://doi.org/10.1000/xyz123");
    }

    #[test]
    fn doi_with_prefixes() {
        for input in [
            "https://doi.org/10.1000/xyz123",
            "http://dx.doi.org/10.1000/xyz123",
            "doi:10.1000/xyz123",
            "DOI: 10.1000/XYZ123",
        ] {
            assert_eq!(Doi::parse(input).unwrap().normalized, "10.1000/xyz123", "{input}");
        }
    }

    #[test]
    fn reject_malformed() {
        assert!(Doi::parse("not-a-doi").is_err());
        assert!(Doi::parse("10.1000").is_err());
        assert!(Doi::parse("10.1000/").is_err());
        assert!(Doi::parse("").is_err());
    }

    #[test]
    fn clean_doi_strips_trailing_punctuation() {
        assert_eq!(
            clean_doi("see doi:10.1038/nature14539.").as_deref(),
            Some("10.1038/nature14539")
        );
        assert_eq!(
            clean_doi("(10.1145/3313831.3376166, 2020)").as_deref(),
            Some("10.1145/3313831.3376166")
        );
    }

    #[test]
    fn clean_doi_none_without_match() {
        assert!(clean_doi("no identifier on this page").is_none());
        assert!(clean_doi("version 10.5 released").is_none());
    }
}
