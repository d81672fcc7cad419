use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::identifiers::doi::clean_doi;
use crate::identifiers::isbn::Isbn;

static JSTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)www\.jstor\.org/stable/(\S+)").expect("valid regex"));

/// "ISBN", "ISBN-10:", "isbn 13 " and similar, including m/n/figure dashes.
static ISBN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(SBN|sbn)[ \u{2014}\u{2013}\u{2012}-]?(10|13)?[: ]*([0-9X][0-9X \u{2014}\u{2013}\u{2012}-]+)")
        .expect("valid regex")
});

const JSTOR_DOI_PREFIX: &str = "10.2307/";

/// Identifiers found in extracted PDF text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TextIdentifiers {
    pub doi: Option<String>,
    pub isbns: Vec<String>,
}

/// Look for a DOI in the first `max_lines` lines only, so that DOIs of cited
/// works in the bibliography are not picked up. Falls back to a JSTOR stable
/// URL, which maps onto the `10.2307` prefix.
pub fn find_doi(lines: &[String], max_lines: usize) -> Option<String> {
    let first_chunk = lines
        .iter()
        .take(max_lines)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");

    if let Some(doi) = clean_doi(&first_chunk) {
        return Some(doi);
    }

    let segment = JSTOR_RE.captures(&first_chunk)?.get(1)?.as_str();
    if segment.starts_with("10.") {
        clean_doi(segment)
    } else {
        clean_doi(&format!("{JSTOR_DOI_PREFIX}{segment}"))
    }
}

/// Every checksum-valid ISBN in `text`, in order of appearance.
pub fn find_isbns(text: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    for caps in ISBN_RE.captures_iter(text) {
        let Some(run) = caps.get(3) else { continue };
        let isbn: String = run
            .as_str()
            .chars()
            .filter(|c| !matches!(c, ' ' | '\u{2014}' | '\u{2013}' | '\u{2012}' | '-'))
            .collect();

        match isbn.len() {
            // Two ISBNs of the same kind printed together (paperback + hardback).
            20 | 26 => {
                let (first, second) = isbn.split_at(isbn.len() / 2);
                candidates.push(first.to_string());
                candidates.push(second.to_string());
            }
            // An ISBN-10 followed by its ISBN-13.
            23 => {
                let (first, second) = isbn.split_at(10);
                candidates.push(first.to_string());
                candidates.push(second.to_string());
            }
            10 | 13 => candidates.push(isbn),
            _ => {}
        }
    }

    candidates
        .into_iter()
        .filter_map(|candidate| Isbn::parse(&candidate).ok())
        .map(|isbn| isbn.as_found().to_string())
        .collect()
}

pub fn find_identifiers(lines: &[String], doi_search_lines: usize) -> TextIdentifiers {
    TextIdentifiers {
        doi: find_doi(lines, doi_search_lines),
        isbns: find_isbns(&lines.join("\n")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn doi_in_header() {
        let text = lines("A Great Paper\nJ. Doe\ndoi:10.1000/xyz123.\nAbstract");
        assert_eq!(find_doi(&text, 80).as_deref(), Some("10.1000/xyz123"));
    }

    #[test]
    fn doi_beyond_search_window_is_ignored() {
        let mut text: Vec<String> = (0..80).map(|i| format!("line {i}")).collect();
        text.push("10.1000/cited.elsewhere".to_string());
        assert_eq!(find_doi(&text, 80), None);
        assert_eq!(find_doi(&text, 81).as_deref(), Some("10.1000/cited.elsewhere"));
    }

    #[test]
    fn jstor_stable_url_maps_to_doi() {
        let text = lines("Title\nStable URL: http://www.jstor.org/stable/1234567\nAccessed");
        assert_eq!(find_doi(&text, 80).as_deref(), Some("10.2307/1234567"));
    }

    #[test]
    fn jstor_segment_that_is_already_a_doi() {
        let text = lines("Stable URL: https://www.jstor.org/stable/10.1086/123456.");
        assert_eq!(find_doi(&text, 80).as_deref(), Some("10.1086/123456"));
    }

    #[test]
    fn single_isbn() {
        assert_eq!(find_isbns("ISBN: 978-0-306-40615-7"), vec!["9780306406157"]);
    }

    #[test]
    fn isbn10_and_isbn13_printed_together() {
        let isbns = find_isbns("ISBN 0-306-40615-2 978-0-306-40615-7\nPrinted in");
        assert_eq!(isbns, vec!["0306406152", "9780306406157"]);
    }

    #[test]
    fn two_isbn13_printed_together() {
        let isbns = find_isbns("ISBN 978-0-306-40615-7 979-10-323-0569-0");
        assert_eq!(isbns, vec!["9780306406157", "9791032305690"]);
    }

    #[test]
    fn isbn_with_en_dash_label() {
        assert_eq!(find_isbns("ISBN\u{2013}10: 0306406152"), vec!["0306406152"]);
    }

    #[test]
    fn invalid_checksum_is_dropped() {
        assert!(find_isbns("ISBN 978-0-306-40615-8").is_empty());
        assert!(find_isbns("ISBN 12345").is_empty());
    }

    #[test]
    fn identifiers_combined() {
        let text = lines("Header\n10.1000/abc\nISBN 0306406152");
        let ids = find_identifiers(&text, 80);
        assert_eq!(ids.doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(ids.isbns, vec!["0306406152"]);
    }
}
