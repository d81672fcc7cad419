use serde::{Deserialize, Serialize};

use crate::error::{Result, ScienceError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Isbn {
    pub raw: String,
    pub isbn13: String,
    pub isbn10: Option<String>,
}

/// Digits of a candidate, with `X` as 10. Only the final position may be `X`.
fn isbn_digits(stripped: &str) -> Option<Vec<u32>> {
    let last = stripped.len().checked_sub(1)?;
    stripped
        .chars()
        .enumerate()
        .map(|(i, c)| match c {
            'X' if i == last => Some(10),
            c => c.to_digit(10),
        })
        .collect()
}

fn check_isbn10(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| (10 - i as u32) * d)
        .sum();
    sum % 11 == 0
}

fn isbn13_weighted_sum(digits: &[u32]) -> u32 {
    digits
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d } else { d * 3 })
        .sum()
}

fn check_isbn13(digits: &[u32]) -> bool {
    digits.iter().all(|&d| d < 10) && isbn13_weighted_sum(digits) % 10 == 0
}

fn digits_to_string(digits: &[u32]) -> String {
    digits
        .iter()
        .map(|&d| if d == 10 { 'X' } else { char::from_digit(d, 10).unwrap_or('0') })
        .collect()
}

fn isbn10_to_isbn13(digits10: &[u32]) -> String {
    let mut d13 = vec![9, 7, 8];
    d13.extend_from_slice(&digits10[..9]);
    let check = (10 - isbn13_weighted_sum(&d13) % 10) % 10;
    d13.push(check);
    digits_to_string(&d13)
}

fn isbn13_to_isbn10(digits13: &[u32]) -> Option<String> {
    if digits13[..3] != [9, 7, 8] {
        return None;
    }
    let mut d10 = digits13[3..12].to_vec();
    let sum: u32 = d10.iter().enumerate().map(|(i, &d)| (10 - i as u32) * d).sum();
    d10.push((11 - sum % 11) % 11);
    Some(digits_to_string(&d10))
}

impl Isbn {
    /// Parse an ISBN-10 or ISBN-13, ignoring hyphens and spaces, and verify its
    /// check digit.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || ScienceError::InvalidIsbn(input.to_string());
        let stripped: String = input
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        let digits = isbn_digits(&stripped).ok_or_else(invalid)?;

        match digits.len() {
            13 if check_isbn13(&digits) => Ok(Self {
                raw: input.to_string(),
                isbn13: stripped,
                isbn10: isbn13_to_isbn10(&digits),
            }),
            10 if check_isbn10(&digits) => Ok(Self {
                raw: input.to_string(),
                isbn13: isbn10_to_isbn13(&digits),
                isbn10: Some(stripped),
            }),
            _ => Err(invalid()),
        }
    }

    /// The form it was found in: ISBN-10 when it has one and was given as such.
    pub fn as_found(&self) -> &str {
        match &self.isbn10 {
            Some(isbn10) if self.raw_len() == 10 => isbn10,
            _ => &self.isbn13,
        }
    }

    fn raw_len(&self) -> usize {
        self.raw.chars().filter(|c| c.is_ascii_alphanumeric()).count()
    }
}
