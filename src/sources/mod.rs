//! Source adapters with a trait-based plugin architecture.
//!
//! Each adapter implements [`Source`] for one upstream service and maps its
//! native wire format into [`CanonicalPaper`]. Searches are exposed as lazy,
//! finite streams so callers only pull as many records as they need.
//!
//! # Feature Flags
//!
//! Individual sources can be disabled at compile time using Cargo features:
//!
//! - `arxiv` - arXiv Atom API (default: enabled)
//! - `pubmed` - NCBI E-utilities (default: enabled)
//! - `semantic` - Semantic Scholar Graph API (default: enabled)
//! - `google_scholar` - Google Scholar result pages (default: enabled)
//!
//! The `core` group enables the three API-backed sources only.

#[cfg(feature = "arxiv")]
mod arxiv;
#[cfg(feature = "google_scholar")]
pub mod google_scholar;
#[cfg(feature = "pubmed")]
mod pubmed;
mod registry;
#[cfg(feature = "semantic")]
mod semantic;

pub mod mock;

#[cfg(feature = "arxiv")]
pub use arxiv::ArxivSource;
#[cfg(feature = "google_scholar")]
pub use google_scholar::GoogleScholarSource;
pub use mock::MockSource;
#[cfg(feature = "pubmed")]
pub use pubmed::PubMedSource;
pub use registry::{SourceCapabilities, SourceRegistry};
#[cfg(feature = "semantic")]
pub use semantic::SemanticScholarSource;

use std::future::Future;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::models::{CanonicalPaper, SearchQuery, SourceType};

/// A lazy, finite, non-restartable sequence of search results
pub type PaperStream<'a> = BoxStream<'a, Result<CanonicalPaper, SourceError>>;

/// What the aggregator does with a failed call to a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log the failure and report an empty (degraded) result
    DegradeToEmpty,
    /// Return the failure to the caller
    Surface,
}

/// The Source trait defines the interface for all source adapters.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `Source`
/// 2. Implement `kind` and `search_stream`, plus `fetch_one` if the upstream
///    can look up a single record
/// 3. Declare the filters it honours natively in `capabilities`; the
///    aggregator post-filters the rest
/// 4. Register it in `SourceRegistry::from_config`
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which of the supported sources this adapter serves
    fn kind(&self) -> SourceType;

    /// Key used in canonical ids, e.g. "arxiv"
    fn id(&self) -> &'static str {
        self.kind().id()
    }

    /// Human-readable name of this source
    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// How failures from this source reach the caller by default
    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::DegradeToEmpty
    }

    /// Stream search results in source order.
    ///
    /// Consumers stop polling once they have enough records; adapters that
    /// page lazily must not fetch pages nobody asks for.
    fn search_stream<'a>(&'a self, query: &'a SearchQuery) -> PaperStream<'a>;

    /// Collect at most `query.max_results` records
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CanonicalPaper>, SourceError> {
        self.search_stream(query)
            .take(query.max_results)
            .try_collect()
            .await
    }

    /// Fetch a single record by its native id; `None` when the source has no match
    async fn fetch_one(&self, native_id: &str) -> Result<Option<CanonicalPaper>, SourceError> {
        Err(SourceError::InvalidRequest(format!(
            "{} does not support lookup of '{}'",
            self.name(),
            native_id
        )))
    }
}

/// Turn a single eager request into a result stream.
///
/// Used by sources whose API answers a search with one response; the request
/// is only sent once the stream is first polled.
pub(crate) fn eager<'a, F>(fetch: F) -> PaperStream<'a>
where
    F: Future<Output = Result<Vec<CanonicalPaper>, SourceError>> + Send + 'a,
{
    stream::once(fetch)
        .flat_map(|result| {
            let items: Vec<Result<CanonicalPaper, SourceError>> = match result {
                Ok(papers) => papers.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            stream::iter(items)
        })
        .boxed()
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection failure, timeout, or unreadable body
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Parsing error (XML, JSON, HTML, BibTeX)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// Error reported in-band by the source
    #[error("API error: {0}")]
    Api(String),

    /// Source key outside the supported set
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// Transport-class failures (network or HTTP status)
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Network(_) | SourceError::HttpStatus { .. })
    }

    /// Whether the upstream said the record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SourceError::NotFound(_) | SourceError::HttpStatus { status: 404, .. }
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
