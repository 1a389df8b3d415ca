use serde::{Deserialize, Serialize};

/// Face embedding vector (dimension fixed by the feature extractor,
/// typically 128 or 512).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance to another embedding of the same
    /// dimension. The distance metric is contracted by the feature
    /// extractor and treated as opaque here.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One enrolled identity in the embedding cache: the active profile's
/// embedding plus the references needed to build a decision.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub profile_id: String,
    pub owner_id: String,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against the gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance of the best candidate. Infinity for an empty gallery.
    pub distance: f32,
    /// `clamp((1 − distance) × 100, 0, 100)` on a match, 0 otherwise.
    pub confidence: f32,
    pub profile_id: Option<String>,
    pub owner_id: Option<String>,
}

impl MatchResult {
    /// The no-match result for an empty gallery.
    pub fn no_match() -> Self {
        Self {
            matched: false,
            distance: f32::INFINITY,
            confidence: 0.0,
            profile_id: None,
            owner_id: None,
        }
    }
}

/// Strategy for comparing a probe embedding against the enrolled gallery.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry]) -> MatchResult;
}

/// Euclidean nearest-neighbor matcher with a distance tolerance.
///
/// A probe matches when the minimum distance is at or below the tolerance
/// (boundary inclusive). Ties at the minimum resolve to the first gallery
/// entry encountered — arbitrary but deterministic given a stable snapshot.
/// Gallery entries whose dimension differs from the probe's are not
/// candidates: a truncated or empty probe must never pass as distance 0.
pub struct DistanceMatcher {
    pub tolerance: f32,
}

/// Default face-match tolerance.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

impl Default for DistanceMatcher {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Matcher for DistanceMatcher {
    fn compare(&self, probe: &Embedding, gallery: &[GalleryEntry]) -> MatchResult {
        let mut best_distance = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in gallery.iter().enumerate() {
            if entry.embedding.dimension() != probe.dimension() {
                continue;
            }
            let d = probe.euclidean_distance(&entry.embedding);
            // Strict `<` keeps the first index on ties.
            if d < best_distance {
                best_distance = d;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_distance <= self.tolerance => MatchResult {
                matched: true,
                distance: best_distance,
                confidence: confidence_from_distance(best_distance),
                profile_id: Some(gallery[idx].profile_id.clone()),
                owner_id: Some(gallery[idx].owner_id.clone()),
            },
            Some(_) => MatchResult {
                matched: false,
                distance: best_distance,
                confidence: 0.0,
                profile_id: None,
                owner_id: None,
            },
            None => MatchResult::no_match(),
        }
    }
}

/// Map a distance to a 0–100 confidence score.
///
/// Monotonically decreasing: distance 0 ⇒ 100, distance ≥ 1 ⇒ 0.
pub fn confidence_from_distance(distance: f32) -> f32 {
    ((1.0 - distance) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(profile_id: &str, owner_id: &str, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            profile_id: profile_id.into(),
            owner_id: owner_id.into(),
            embedding: Embedding::new(values),
        }
    }

    #[test]
    fn identical_embedding_matches_with_full_confidence() {
        let gallery = vec![entry("p1", "u1", vec![0.5, 0.5, 0.5])];
        let probe = Embedding::new(vec![0.5, 0.5, 0.5]);
        let result = DistanceMatcher::default().compare(&probe, &gallery);
        assert!(result.matched);
        assert_eq!(result.distance, 0.0);
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.owner_id.as_deref(), Some("u1"));
    }

    #[test]
    fn distance_at_tolerance_boundary_matches() {
        let gallery = vec![entry("p1", "u1", vec![0.0])];
        let probe = Embedding::new(vec![0.6]);
        let result = DistanceMatcher { tolerance: 0.6 }.compare(&probe, &gallery);
        assert!(result.matched);
        assert!((result.distance - 0.6).abs() < 1e-6);
    }

    #[test]
    fn distance_beyond_tolerance_is_no_match_with_zero_confidence() {
        let gallery = vec![entry("p1", "u1", vec![0.0])];
        let probe = Embedding::new(vec![0.61]);
        let result = DistanceMatcher { tolerance: 0.6 }.compare(&probe, &gallery);
        assert!(!result.matched);
        assert_eq!(result.confidence, 0.0);
        assert!(result.profile_id.is_none());
    }

    #[test]
    fn empty_gallery_is_no_match() {
        let probe = Embedding::new(vec![1.0]);
        let result = DistanceMatcher::default().compare(&probe, &[]);
        assert!(!result.matched);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.distance, f32::INFINITY);
    }

    #[test]
    fn tie_resolves_to_first_gallery_entry() {
        let gallery = vec![
            entry("p1", "u1", vec![0.1, 0.0]),
            entry("p2", "u2", vec![0.1, 0.0]),
        ];
        let probe = Embedding::new(vec![0.1, 0.0]);
        let result = DistanceMatcher::default().compare(&probe, &gallery);
        assert!(result.matched);
        assert_eq!(result.profile_id.as_deref(), Some("p1"));
    }

    #[test]
    fn nearest_entry_wins() {
        let gallery = vec![
            entry("far", "u1", vec![1.0, 1.0]),
            entry("near", "u2", vec![0.1, 0.0]),
        ];
        let probe = Embedding::new(vec![0.0, 0.0]);
        let result = DistanceMatcher::default().compare(&probe, &gallery);
        assert!(result.matched);
        assert_eq!(result.profile_id.as_deref(), Some("near"));
    }

    #[test]
    fn mismatched_dimension_is_not_a_candidate() {
        let gallery = vec![entry("p1", "u1", vec![0.5; 128])];

        // A zero-length probe zips to an empty sum; without the dimension
        // guard it would match everything at distance 0.
        let result = DistanceMatcher::default().compare(&Embedding::new(vec![]), &gallery);
        assert!(!result.matched);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.distance, f32::INFINITY);

        // Truncated probe, same problem.
        let result = DistanceMatcher::default().compare(&Embedding::new(vec![0.5; 64]), &gallery);
        assert!(!result.matched);
        assert!(result.profile_id.is_none());
    }

    #[test]
    fn mismatched_entries_are_skipped_not_fatal() {
        let gallery = vec![
            entry("short", "u1", vec![0.0]),
            entry("full", "u2", vec![0.1, 0.0]),
        ];
        let probe = Embedding::new(vec![0.1, 0.0]);
        let result = DistanceMatcher::default().compare(&probe, &gallery);
        assert!(result.matched);
        assert_eq!(result.profile_id.as_deref(), Some("full"));
    }

    #[test]
    fn confidence_is_monotone_in_distance() {
        assert_eq!(confidence_from_distance(0.0), 100.0);
        assert!(confidence_from_distance(0.3) > confidence_from_distance(0.4));
        assert_eq!(confidence_from_distance(1.0), 0.0);
        assert_eq!(confidence_from_distance(1.5), 0.0);
    }
}
