//! Core data models for research papers and search operations.

mod identifier;
mod paper;
pub mod record;
mod search;

pub use identifier::{content_hash, CanonicalId, ScholarIdTier, ScholarKey};
pub use paper::{CanonicalPaper, PaperBuilder, SourceType, MISSING_TITLE};
pub use search::{Page, SearchQuery, SearchResponse, DEFAULT_LIMIT};
