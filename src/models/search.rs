//! Search request and response models.

use serde::{Deserialize, Serialize};

use crate::models::{CanonicalPaper, SourceType};

/// Default number of results requested from a source
pub const DEFAULT_LIMIT: usize = 10;

/// Search query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Main search query string
    pub query: String,

    /// Maximum number of results to return
    pub max_results: usize,

    /// Author name filter
    pub author: Option<String>,

    /// Single publication year, e.g. "2020"
    pub year: Option<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_results: DEFAULT_LIMIT,
            author: None,
            year: None,
        }
    }
}

impl SearchQuery {
    /// Create a new search query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Set maximum results
    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Set author filter; blank values are ignored
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into()).filter(|a: &String| !a.trim().is_empty());
        self
    }

    /// Set year filter; blank values are ignored
    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into()).filter(|y: &String| !y.trim().is_empty());
        self
    }

    /// Author filter, if set and non-blank
    pub fn author_filter(&self) -> Option<&str> {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Year filter, if set and non-blank
    pub fn year_filter(&self) -> Option<&str> {
        self.year.as_deref().map(str::trim).filter(|y| !y.is_empty())
    }
}

/// Search response containing papers and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Papers found, in source order
    pub papers: Vec<CanonicalPaper>,

    /// Source of the results
    pub source: SourceType,

    /// Query that was executed
    pub query: String,

    /// Set when the source failed and the failure was degraded to an empty list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl SearchResponse {
    /// Create a new search response
    pub fn new(papers: Vec<CanonicalPaper>, source: SourceType, query: impl Into<String>) -> Self {
        Self {
            papers,
            source,
            query: query.into(),
            degraded: None,
        }
    }

    /// An empty response that records why the source produced nothing
    pub fn degraded(source: SourceType, query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            papers: Vec::new(),
            source,
            query: query.into(),
            degraded: Some(reason.into()),
        }
    }

    /// Total number of papers returned
    pub fn total_results(&self) -> usize {
        self.papers.len()
    }

    /// Whether the source failed and the result was degraded
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    /// Slice out a 1-based page.
    ///
    /// Page 0 is read as page 1 and pages past the end clamp to the last page.
    pub fn page(&self, number: usize, per_page: usize) -> Page<'_> {
        let per_page = per_page.max(1);
        let num_pages = self.papers.len().div_ceil(per_page).max(1);
        let number = number.clamp(1, num_pages);
        let start = (number - 1) * per_page;
        let end = (start + per_page).min(self.papers.len());

        Page {
            papers: &self.papers[start..end],
            number,
            num_pages,
        }
    }
}

/// One page of a search response
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub papers: &'a [CanonicalPaper],
    pub number: usize,
    pub num_pages: usize,
}

impl Page<'_> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperBuilder;

    fn response_with(count: usize) -> SearchResponse {
        let papers = (0..count)
            .map(|i| PaperBuilder::new(format!("arxiv:{}", i), "T", SourceType::Arxiv).build())
            .collect();
        SearchResponse::new(papers, SourceType::Arxiv, "q")
    }

    #[test]
    fn test_blank_filters_are_ignored() {
        let query = SearchQuery::new("cancer").author("  ").year("");
        assert_eq!(query.author, None);
        assert_eq!(query.year, None);
        assert_eq!(query.max_results, DEFAULT_LIMIT);
    }

    #[test]
    fn test_filters_are_trimmed() {
        let query = SearchQuery::new("cancer").author(" Smith ").year(" 2020");
        assert_eq!(query.author_filter(), Some("Smith"));
        assert_eq!(query.year_filter(), Some("2020"));
    }

    #[test]
    fn test_page_slices_results() {
        let response = response_with(40);
        let page = response.page(2, 18);
        assert_eq!(page.number, 2);
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.papers.len(), 18);
        assert_eq!(page.papers[0].id, "arxiv:18");
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_page_out_of_range_clamps_to_last() {
        let response = response_with(40);
        let page = response.page(99, 18);
        assert_eq!(page.number, 3);
        assert_eq!(page.papers.len(), 4);
        assert!(!page.has_next());
    }

    #[test]
    fn test_page_of_empty_response() {
        let response = SearchResponse::degraded(SourceType::PubMed, "q", "timeout");
        let page = response.page(1, 18);
        assert_eq!(page.num_pages, 1);
        assert!(page.papers.is_empty());
        assert!(response.is_degraded());
    }
}
