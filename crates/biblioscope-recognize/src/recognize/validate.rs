use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_LETTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\n]").expect("valid regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("valid regex"));

/// A colon this far into a title usually separates a subtitle the source
/// text may print differently.
const SUBTITLE_COLON_MIN_INDEX: usize = 30;

/// Letters-only, lowercased form of a text plus, for every retained
/// character, whether it started a line in the original.
#[derive(Debug, Clone, Default)]
struct ProcessedText {
    chars: Vec<char>,
    line_starts: Vec<bool>,
}

impl ProcessedText {
    fn new(text: &str) -> Self {
        let letters = NON_LETTER_RE.replace_all(text, "");
        let decomposed: String = letters.nfkd().collect();
        let normalized = NON_LETTER_RE.replace_all(&decomposed, "").to_lowercase();

        let mut chars = Vec::with_capacity(normalized.len());
        let mut line_starts = Vec::with_capacity(normalized.len());
        let mut after_newline = false;
        for c in normalized.chars() {
            if c == '\n' {
                after_newline = true;
            } else {
                chars.push(c);
                line_starts.push(after_newline);
                after_newline = false;
            }
        }

        Self { chars, line_starts }
    }
}

/// Checks that a candidate title actually appears in the document text,
/// starting at the beginning of the text or of a line.
#[derive(Debug, Clone)]
pub struct TitleValidator {
    fulltext: ProcessedText,
}

impl TitleValidator {
    pub fn new(fulltext: &str) -> Self {
        Self {
            fulltext: ProcessedText::new(fulltext),
        }
    }

    pub fn validate(&self, title: &str) -> bool {
        let title = unescape_html(title);
        let title = truncate_at_subtitle_colon(&title);
        let needle = ProcessedText::new(title).chars;
        if needle.is_empty() || needle.len() > self.fulltext.chars.len() {
            tracing::debug!(title, "title is invalid");
            return false;
        }

        let found = self
            .fulltext
            .chars
            .windows(needle.len())
            .enumerate()
            .any(|(idx, window)| {
                window == needle.as_slice() && (idx == 0 || self.fulltext.line_starts[idx])
            });

        if !found {
            tracing::debug!(title, "title is invalid");
        }
        found
    }
}

fn truncate_at_subtitle_colon(title: &str) -> &str {
    match title.char_indices().enumerate().find(|(_, (_, c))| *c == ':') {
        Some((char_idx, (byte_idx, _))) if char_idx >= SUBTITLE_COLON_MIN_INDEX => &title[..byte_idx],
        _ => title,
    }
}

/// Decode the HTML entities titles from bibliographic services carry.
pub fn unescape_html(s: &str) -> String {
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').map(|dec| dec.parse::<u32>().ok()))
                    .flatten()
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
