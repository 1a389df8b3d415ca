//! Plate-text pipeline: normalization and grammar validation of OCR output.
//!
//! OCR text is noisy — mixed case, stray punctuation, missing separators.
//! Candidates are normalized into the canonical plate shape and validated
//! against the plate grammar before any authorization lookup happens.

use std::sync::LazyLock;

use regex::Regex;

/// Accepted plate shapes: 3 letters + 4 digits or 4 digits + 3 letters,
/// optionally dash-separated.
static PLATE_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{3}-?[0-9]{4}|[0-9]{4}-?[A-Z]{3})$").unwrap());

/// Default minimum OCR confidence for a candidate to qualify (exclusive).
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// One OCR read: raw text plus the recognizer's confidence in [0, 1].
/// Bounding boxes are dropped before the decision logic sees candidates.
#[derive(Debug, Clone)]
pub struct PlateCandidate {
    pub text: String,
    pub confidence: f32,
}

/// A validated plate read selected from the candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateRead {
    pub raw_text: String,
    pub normalized: String,
    pub confidence: f32,
}

/// How to pick among multiple grammar-valid candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Accept the first qualifying candidate in recognizer order and stop
    /// scanning. Sensitive to extractor ordering; kept as the default
    /// behavior of the system this replaces.
    #[default]
    FirstAcceptable,
    /// Scan all candidates and keep the highest-confidence qualifying one.
    /// Ties go to the earlier candidate.
    BestOfConfidence,
}

impl SelectionStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "first" => Some(Self::FirstAcceptable),
            "best" => Some(Self::BestOfConfidence),
            _ => None,
        }
    }
}

/// Normalize raw OCR text into the canonical plate shape.
///
/// Uppercases, strips everything outside `[A-Z0-9-]`, then applies the
/// length-7 heuristic: a dash-less string of 3 letters + 4 digits (or
/// 4 digits + 3 letters) gets the separator inserted. Idempotent.
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    if cleaned.len() == 7 && !cleaned.contains('-') {
        let bytes = cleaned.as_bytes();
        if bytes[..3].iter().all(u8::is_ascii_uppercase)
            && bytes[3..].iter().all(u8::is_ascii_digit)
        {
            return format!("{}-{}", &cleaned[..3], &cleaned[3..]);
        }
        if bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[4..].iter().all(u8::is_ascii_uppercase)
        {
            return format!("{}-{}", &cleaned[..4], &cleaned[4..]);
        }
    }

    cleaned
}

/// Whether a normalized string satisfies the plate grammar.
pub fn is_valid_plate(text: &str) -> bool {
    PLATE_GRAMMAR.is_match(text)
}

/// Run the pipeline over an ordered candidate list.
///
/// A candidate qualifies when its normalized text is grammar-valid and its
/// OCR confidence is strictly greater than `threshold`. Returns `None` when
/// no candidate qualifies ("no plate detected").
pub fn select_plate(
    candidates: &[PlateCandidate],
    threshold: f32,
    strategy: SelectionStrategy,
) -> Option<PlateRead> {
    let mut best: Option<PlateRead> = None;

    for candidate in candidates {
        let normalized = normalize(&candidate.text);
        if !is_valid_plate(&normalized) || candidate.confidence <= threshold {
            continue;
        }

        let read = PlateRead {
            raw_text: candidate.text.clone(),
            normalized,
            confidence: candidate.confidence,
        };

        match strategy {
            SelectionStrategy::FirstAcceptable => return Some(read),
            SelectionStrategy::BestOfConfidence => {
                let better = best
                    .as_ref()
                    .map_or(true, |b| read.confidence > b.confidence);
                if better {
                    best = Some(read);
                }
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_uppercases_and_strips_noise() {
        assert_eq!(normalize("abc 1234!"), "ABC-1234");
        assert_eq!(normalize("a*b.c1_23:4"), "ABC-1234");
    }

    #[test]
    fn normalize_inserts_dash_letters_first() {
        assert_eq!(normalize("ABC1234"), "ABC-1234");
    }

    #[test]
    fn normalize_inserts_dash_digits_first() {
        assert_eq!(normalize("1234XYZ"), "1234-XYZ");
    }

    #[test]
    fn normalize_leaves_mixed_length7_alone() {
        // Seven chars but not in either plate shape.
        assert_eq!(normalize("AB12C34"), "AB12C34");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["abc1234", "ABC-1234", "1234xyz", "??ab-12", "AB12C34"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn grammar_accepts_both_shapes() {
        assert!(is_valid_plate("ABC-1234"));
        assert!(is_valid_plate("ABC1234"));
        assert!(is_valid_plate("1234-XYZ"));
        assert!(is_valid_plate("1234XYZ"));
    }

    #[test]
    fn grammar_rejects_wrong_shapes() {
        assert!(!is_valid_plate("AB-1234"));
        assert!(!is_valid_plate("ABCD-123"));
        assert!(!is_valid_plate("ABC-12345"));
        assert!(!is_valid_plate(""));
    }

    fn cand(text: &str, confidence: f32) -> PlateCandidate {
        PlateCandidate {
            text: text.into(),
            confidence,
        }
    }

    #[test]
    fn first_acceptable_stops_at_first_qualifying_candidate() {
        let candidates = vec![
            cand("garbage", 0.9),
            cand("abc1234", 0.6),
            cand("XYZ-9999", 0.99),
        ];
        let read =
            select_plate(&candidates, DEFAULT_CONFIDENCE_THRESHOLD, SelectionStrategy::FirstAcceptable)
                .unwrap();
        assert_eq!(read.normalized, "ABC-1234");
        assert_eq!(read.raw_text, "abc1234");
    }

    #[test]
    fn best_of_confidence_scans_all_candidates() {
        let candidates = vec![cand("abc1234", 0.6), cand("XYZ-9999", 0.99)];
        let read =
            select_plate(&candidates, DEFAULT_CONFIDENCE_THRESHOLD, SelectionStrategy::BestOfConfidence)
                .unwrap();
        assert_eq!(read.normalized, "XYZ-9999");
    }

    #[test]
    fn confidence_at_threshold_does_not_qualify() {
        let candidates = vec![cand("ABC-1234", 0.5)];
        assert!(select_plate(&candidates, 0.5, SelectionStrategy::FirstAcceptable).is_none());
    }

    #[test]
    fn no_qualifying_candidate_yields_none() {
        let candidates = vec![cand("not a plate", 0.9), cand("AB-1234", 0.9)];
        assert!(
            select_plate(&candidates, DEFAULT_CONFIDENCE_THRESHOLD, SelectionStrategy::FirstAcceptable)
                .is_none()
        );
    }
}
