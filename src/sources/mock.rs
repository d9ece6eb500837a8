//! Mock source for testing purposes.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{CanonicalPaper, PaperBuilder, SearchQuery, SourceType};
use crate::sources::{ErrorPolicy, PaperStream, Source, SourceCapabilities, SourceError};

/// A mock source that serves predefined papers or a predefined failure.
///
/// It applies no filters itself, so the aggregator post-filters whatever
/// its capabilities leave out.
#[derive(Debug)]
pub struct MockSource {
    kind: SourceType,
    papers: Vec<CanonicalPaper>,
    error: Option<String>,
    capabilities: SourceCapabilities,
    policy: Option<ErrorPolicy>,
    pulled: AtomicUsize,
}

impl MockSource {
    /// Create an empty mock standing in for `kind`
    pub fn new(kind: SourceType) -> Self {
        Self {
            kind,
            papers: Vec::new(),
            error: None,
            capabilities: SourceCapabilities::SEARCH | SourceCapabilities::DETAIL,
            policy: None,
            pulled: AtomicUsize::new(0),
        }
    }

    /// Papers served by search and detail lookups, in order
    pub fn with_papers(mut self, papers: Vec<CanonicalPaper>) -> Self {
        self.papers = papers;
        self
    }

    /// Fail every call with an API error carrying `message`
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the error policy of the mocked kind
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Number of papers pulled from search streams so far
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Option<SourceError> {
        self.error.clone().map(SourceError::Api)
    }
}

#[async_trait]
impl Source for MockSource {
    fn kind(&self) -> SourceType {
        self.kind
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    fn error_policy(&self) -> ErrorPolicy {
        self.policy.unwrap_or(match self.kind {
            SourceType::GoogleScholar => ErrorPolicy::Surface,
            _ => ErrorPolicy::DegradeToEmpty,
        })
    }

    fn search_stream<'a>(&'a self, _query: &'a SearchQuery) -> PaperStream<'a> {
        if let Some(err) = self.failure() {
            return stream::once(async move { Err(err) }).boxed();
        }

        stream::iter(self.papers.iter())
            .map(move |paper| {
                self.pulled.fetch_add(1, Ordering::SeqCst);
                Ok(paper.clone())
            })
            .boxed()
    }

    async fn fetch_one(&self, native_id: &str) -> Result<Option<CanonicalPaper>, SourceError> {
        if let Some(err) = self.failure() {
            return Err(err);
        }

        Ok(self
            .papers
            .iter()
            .find(|paper| paper.native_id() == native_id)
            .cloned())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(native_id: &str, title: &str, source: SourceType) -> CanonicalPaper {
    PaperBuilder::new(format!("{}:{}", source.id(), native_id), title, source)
        .url(Some(format!("http://example.com/{}", native_id)))
        .build()
}
