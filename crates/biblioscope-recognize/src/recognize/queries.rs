use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::DomainFailure;

/// First column of a possibly multi-column layout line.
static FIRST_COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s_]*([^\s]+(?: [^\s_]+)+)").expect("valid regex"));

const SCANNED_BOOK_BOILERPLATE: &str = "This is a digital copy of a book that was preserved for \
     generations on library shelves before it was carefully scanned by Google as part of a project";

const MAX_CANDIDATE_LINES: usize = 100;
const MIN_CANDIDATE_LINES: usize = 20;
const MEDIAN_TOLERANCE: usize = 6;
/// Lines used by one query are this far apart, so the phrases are unlikely
/// to be quoted together by another document.
const LINE_STRIDE: usize = 7;
const WORDS_PER_QUERY: usize = 25;
/// Longer words are most likely extraction garbage.
const MAX_WORD_CHARS: usize = 20;

/// Body lines suitable for phrase queries: first-column text of more than
/// three words whose length is close to the median.
///
/// Fails with [`DomainFailure::NoUsableText`] when the document has too little
/// running text or is a scanned-book copy.
pub fn good_lines(lines: &[String]) -> Result<Vec<String>, DomainFailure> {
    let candidates: Vec<String> = lines
        .iter()
        .filter_map(|line| {
            let line = line.replace('\u{a0}', " ");
            let column = FIRST_COLUMN_RE.captures(&line)?.get(1)?.as_str().to_string();
            (column.split(' ').count() > 3).then_some(column)
        })
        .take(MAX_CANDIDATE_LINES)
        .collect();

    if candidates.len() < MIN_CANDIDATE_LINES
        || candidates.first().map(String::as_str) == Some(SCANNED_BOOK_BOILERPLATE)
    {
        return Err(DomainFailure::NoUsableText);
    }

    let lengths: Vec<usize> = candidates.iter().map(|l| l.chars().count()).collect();
    let mut sorted = lengths.clone();
    sorted.sort_unstable();
    let median = sorted[sorted.len() / 2];

    Ok(candidates
        .iter()
        .zip(&lengths)
        .filter(|(_, len)| len.abs_diff(median) < MEDIAN_TOLERANCE)
        .map(|(line, _)| line.replace('"', ""))
        .collect())
}

/// Build up to `count` quoted phrase queries from the document body.
pub fn full_text_queries(lines: &[String], count: usize) -> Result<Vec<String>, DomainFailure> {
    let mut pool = good_lines(lines)?;
    let mut queries = Vec::with_capacity(count);

    'queries: for _ in 0..count {
        let mut phrases: Vec<String> = Vec::new();
        let mut word_count = 0;
        let mut next_line = 0;

        while word_count < WORDS_PER_QUERY {
            if pool.is_empty() {
                if !phrases.is_empty() {
                    queries.push(phrases.join(" "));
                }
                break 'queries;
            }

            let line = pool.remove(next_line);
            next_line = if pool.is_empty() {
                0
            } else {
                (next_line + LINE_STRIDE) % pool.len()
            };

            let words: Vec<&str> = line.split_whitespace().collect();
            if words.len() < 3 {
                continue;
            }
            let inner = &words[1..words.len() - 1];
            if inner.iter().any(|w| w.chars().count() > MAX_WORD_CHARS) {
                continue;
            }

            word_count += inner.len();
            phrases.push(format!("\"{}\"", inner.join(" ")));
        }

        queries.push(phrases.join(" "));
    }

    Ok(queries)
}
