//! # Paper Aggregator
//!
//! Searches academic paper metadata across arXiv, PubMed, Semantic Scholar
//! and Google Scholar and normalizes every result into one canonical record
//! with a stable, source-prefixed identifier.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Canonical paper, identifiers, search requests and stored records
//! - [`sources`]: Source adapters with extensible trait-based architecture
//! - [`aggregator`]: Dispatch, post-filtering and per-source error policy
//! - [`utils`]: Shared HTTP client
//! - [`config`]: Configuration management

pub mod aggregator;
pub mod config;
pub mod models;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregator::{Aggregator, AggregatorError};
pub use models::{CanonicalId, CanonicalPaper, SearchQuery, SearchResponse, SourceType};
pub use sources::{Source, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
