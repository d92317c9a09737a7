//! Identity capture
//!
//! Students join with the name printed on their ID card. Reading the card
//! is a collaborator's job ([`IdentityCapture`]); the engine only insists
//! the extracted name is long enough once whitespace is normalized.
//!
//! [`OcrTextCapture`] is the provider used when the card has already been
//! run through OCR: it picks the line that looks most like a person's name.

use crate::error::JoinError;
use crate::orchestrator::join::{normalize_display_name, MIN_NAME_CHARS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name read from an ID image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedName {
    pub name: String,
    /// 0.0 to 1.0
    pub confidence: f64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IdentityError {
    #[error("ID image is empty")]
    EmptyImage,

    #[error("ID image is not readable text")]
    Unreadable,

    #[error("Identity provider failed: {0}")]
    Provider(String),
}

/// Collaborator that reads a display name off an ID image
pub trait IdentityCapture {
    fn extract(&self, image: &[u8]) -> Result<ExtractedName, IdentityError>;
}

/// Accept an extracted name as a display name
///
/// Returns the normalized name, or `NameTooShort`.
pub fn accept_name(extracted: &ExtractedName) -> Result<String, JoinError> {
    let name = normalize_display_name(&extracted.name);
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(JoinError::NameTooShort);
    }
    Ok(name)
}

// ============================================================================
// OCR Text Provider
// ============================================================================

/// Words that mark institutional lines rather than names
const INSTITUTION_WORDS: &[&str] = &[
    "UNIVERSITY",
    "DEEMED",
    "COLLEGE",
    "SCHOOL",
    "VALID",
    "TILL",
    "AUTHORITY",
    "REPUBLIC",
    "GOVT",
    "GOVERNMENT",
    "IDENTITY",
    "CARD",
    "DEPARTMENT",
    "CAMPUS",
    "STUDENT",
    "ISSUE",
    "ENROL",
];

/// Field labels printed next to personal details
const FIELD_WORDS: &[&str] = &["MALE", "FEMALE", "DOB", "YEAR", "MONTH", "DATE", "ID"];

const MAX_LINE_CHARS: usize = 40;
const MIN_LINE_CHARS: usize = 4;

/// Uppercase letters and single spaces only
fn letters_only(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .map(|c| if c.is_ascii_uppercase() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_any(words: &[&str], list: &[&str]) -> bool {
    words.iter().any(|w| list.contains(w))
}

fn line_score(words: &[&str]) -> i32 {
    let mut score = 2;
    if (2..=4).contains(&words.len()) {
        score += 3;
    }
    if contains_any(words, INSTITUTION_WORDS) {
        score -= 8;
    }
    if contains_any(words, FIELD_WORDS) {
        score -= 5;
    }
    score
}

/// Pick the most name-like line out of OCR text
pub fn name_from_text(raw: &str) -> Option<ExtractedName> {
    let best = raw
        .lines()
        .map(letters_only)
        .filter(|line| (MIN_LINE_CHARS..=MAX_LINE_CHARS).contains(&line.len()))
        .filter_map(|line| {
            let words: Vec<&str> = line.split(' ').collect();
            if !(2..=5).contains(&words.len()) {
                return None;
            }
            let score = line_score(&words);
            Some((score, line.clone()))
        })
        // first line wins ties
        .fold(None::<(i32, String)>, |best, candidate| match best {
            Some(b) if b.0 >= candidate.0 => Some(b),
            _ => Some(candidate),
        });

    if let Some((score, line)) = best.filter(|(score, _)| *score > 0) {
        return Some(ExtractedName {
            name: line,
            confidence: if score >= 5 { 0.9 } else { 0.6 },
        });
    }

    // Fallback: the first two plausible words anywhere in the text
    let words: Vec<String> = letters_only(raw)
        .split(' ')
        .filter(|w| (3..=14).contains(&w.len()))
        .filter(|w| !INSTITUTION_WORDS.contains(w) && !FIELD_WORDS.contains(w))
        .take(2)
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(ExtractedName {
        name: words.join(" "),
        confidence: 0.3,
    })
}

/// Provider for ID cards that arrive as OCR'd UTF-8 text
#[derive(Debug, Clone, Copy, Default)]
pub struct OcrTextCapture;

impl IdentityCapture for OcrTextCapture {
    fn extract(&self, image: &[u8]) -> Result<ExtractedName, IdentityError> {
        if image.is_empty() {
            return Err(IdentityError::EmptyImage);
        }
        let text = std::str::from_utf8(image).map_err(|_| IdentityError::Unreadable)?;
        name_from_text(text).ok_or(IdentityError::Unreadable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = "CHRIST UNIVERSITY\nSTUDENT IDENTITY CARD\nAda Lovelace\nDOB 10-12-1815\nValid till 2027";

    #[test]
    fn test_name_line_beats_institution_lines() {
        let extracted = name_from_text(CARD).unwrap();
        assert_eq!(extracted.name, "ADA LOVELACE");
        assert_eq!(extracted.confidence, 0.9);
    }

    #[test]
    fn test_fallback_takes_first_plausible_words() {
        let extracted = name_from_text("UNIVERSITY\nGrace\n\nHopper").unwrap();
        assert_eq!(extracted.name, "GRACE HOPPER");
        assert_eq!(extracted.confidence, 0.3);
    }

    #[test]
    fn test_nothing_readable() {
        assert_eq!(name_from_text("12345\n---"), None);
        assert_eq!(OcrTextCapture.extract(b""), Err(IdentityError::EmptyImage));
        assert_eq!(
            OcrTextCapture.extract(&[0xff, 0xfe]),
            Err(IdentityError::Unreadable)
        );
    }

    #[test]
    fn test_accept_name_normalizes_and_checks_length() {
        let ok = ExtractedName {
            name: "  ADA   LOVELACE ".to_string(),
            confidence: 0.9,
        };
        assert_eq!(accept_name(&ok).unwrap(), "ADA LOVELACE");

        let short = ExtractedName {
            name: " A  ".to_string(),
            confidence: 0.9,
        };
        assert_eq!(accept_name(&short), Err(JoinError::NameTooShort));
    }
}
