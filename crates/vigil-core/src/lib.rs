//! vigil-core — Access-control decision logic.
//!
//! Pure, I/O-free building blocks: face-embedding distance matching against
//! an in-memory gallery, and normalization/validation of noisy OCR plate
//! candidates.

pub mod plate;
pub mod types;

pub use plate::{PlateCandidate, PlateRead, SelectionStrategy};
pub use types::{DistanceMatcher, Embedding, GalleryEntry, MatchResult, Matcher};
