//! Dispatches searches and detail lookups to the registered sources.
//!
//! The aggregator owns the per-source error policy: a failure either becomes
//! an empty, degraded [`SearchResponse`] (logged) or is returned to the caller
//! as [`AggregatorError::Source`]. Filters a source cannot apply itself are
//! applied here, before the result limit is counted.

use futures_util::future;
use futures_util::stream::{StreamExt, TryStreamExt};

use crate::config::Config;
use crate::models::{CanonicalId, CanonicalPaper, SearchQuery, SearchResponse, SourceType};
use crate::sources::{ErrorPolicy, Source, SourceCapabilities, SourceError, SourceRegistry};

/// Errors returned to callers of the aggregator
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Please enter a search query")]
    EmptyQuery,

    /// A source failed and its policy surfaces the failure
    #[error("{source} failed: {error}")]
    Source {
        source: SourceType,
        #[source]
        error: SourceError,
    },
}

/// Entry point for searches and detail lookups
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: SourceRegistry,
    strict_errors: bool,
}

impl Aggregator {
    /// Create an aggregator over `registry`.
    ///
    /// With `strict_errors` every source surfaces its failures.
    pub fn new(registry: SourceRegistry, strict_errors: bool) -> Self {
        Self {
            registry,
            strict_errors,
        }
    }

    /// Build every compiled-in source from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        Ok(Self::new(
            SourceRegistry::from_config(config)?,
            config.search.strict_errors,
        ))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search the source named by `source_key`, e.g. `"arxiv"`
    pub async fn search(
        &self,
        source_key: &str,
        query: SearchQuery,
    ) -> Result<SearchResponse, AggregatorError> {
        let kind = source_key
            .trim()
            .parse::<SourceType>()
            .map_err(|_| AggregatorError::UnsupportedSource(source_key.to_string()))?;

        self.search_source(kind, query).await
    }

    /// Search one source and return at most `query.max_results` papers in source order
    pub async fn search_source(
        &self,
        kind: SourceType,
        query: SearchQuery,
    ) -> Result<SearchResponse, AggregatorError> {
        if query.query.trim().is_empty() {
            return Err(AggregatorError::EmptyQuery);
        }

        let source = self.source(kind)?;
        tracing::debug!(
            source = kind.id(),
            query = %query.query,
            limit = query.max_results,
            "Searching"
        );

        match collect_results(source, &query).await {
            Ok(papers) => {
                tracing::debug!(source = kind.id(), found = papers.len(), "Search finished");
                Ok(SearchResponse::new(papers, kind, &query.query))
            }
            Err(error) => match self.policy_for(source) {
                ErrorPolicy::DegradeToEmpty => {
                    tracing::error!(source = kind.id(), error = %error, "Search failed, returning no results");
                    Ok(SearchResponse::degraded(kind, &query.query, error.to_string()))
                }
                ErrorPolicy::Surface => Err(AggregatorError::Source {
                    source: kind,
                    error,
                }),
            },
        }
    }

    /// Fetch one record by canonical id.
    ///
    /// Ids without a source prefix are read as arXiv ids. A failed lookup is
    /// reported as absent unless errors are strict.
    pub async fn fetch_detail(&self, id: &str) -> Result<Option<CanonicalPaper>, AggregatorError> {
        let id = CanonicalId::parse(id).map_err(|err| match err {
            SourceError::UnsupportedSource(source) => AggregatorError::UnsupportedSource(source),
            other => AggregatorError::InvalidIdentifier(other.to_string()),
        })?;

        let source = self.source(id.source)?;
        tracing::debug!(source = id.source.id(), native_id = %id.native_id, "Fetching detail");

        match source.fetch_one(&id.native_id).await {
            Ok(paper) => Ok(paper),
            Err(error) if self.strict_errors => Err(AggregatorError::Source {
                source: id.source,
                error,
            }),
            Err(error) => {
                tracing::error!(id = %id, error = %error, "Detail fetch failed");
                Ok(None)
            }
        }
    }

    fn source(&self, kind: SourceType) -> Result<&dyn Source, AggregatorError> {
        self.registry
            .get(kind)
            .map(|source| source.as_ref())
            .ok_or_else(|| AggregatorError::UnsupportedSource(kind.id().to_string()))
    }

    fn policy_for(&self, source: &dyn Source) -> ErrorPolicy {
        if self.strict_errors {
            ErrorPolicy::Surface
        } else {
            source.error_policy()
        }
    }
}

/// Drain the source stream through the filters it lacks, up to the limit
async fn collect_results(
    source: &dyn Source,
    query: &SearchQuery,
) -> Result<Vec<CanonicalPaper>, SourceError> {
    let capabilities = source.capabilities();
    let author = query
        .author_filter()
        .filter(|_| !capabilities.contains(SourceCapabilities::AUTHOR_FILTER))
        .map(str::to_string);
    let year = query
        .year_filter()
        .filter(|_| !capabilities.contains(SourceCapabilities::YEAR_FILTER))
        .map(str::to_string);

    if author.is_some() || year.is_some() {
        tracing::debug!(source = source.id(), ?author, ?year, "Post-filtering results");
    }

    source
        .search_stream(query)
        .try_filter(move |paper| {
            let keep = author.as_deref().map_or(true, |a| paper.matches_author(a))
                && year.as_deref().map_or(true, |y| paper.matches_year(y));
            future::ready(keep)
        })
        .take(query.max_results)
        .try_collect()
        .await
}
