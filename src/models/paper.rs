//! Canonical paper model shared by every source adapter.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::sources::SourceError;

/// Placeholder used when a source does not report a title
pub const MISSING_TITLE: &str = "No title";

/// The source/repository where the paper was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "arxiv")]
    Arxiv,
    #[serde(rename = "pubmed")]
    PubMed,
    #[serde(rename = "semantic_scholar")]
    SemanticScholar,
    #[serde(rename = "google_scholar")]
    GoogleScholar,
}

impl SourceType {
    /// Every supported source, in display order
    pub const ALL: [SourceType; 4] = [
        SourceType::Arxiv,
        SourceType::PubMed,
        SourceType::SemanticScholar,
        SourceType::GoogleScholar,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "ArXiv",
            SourceType::PubMed => "PubMed",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::GoogleScholar => "Google Scholar",
        }
    }

    /// Returns the source key used in canonical identifiers
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::Arxiv => "arxiv",
            SourceType::PubMed => "pubmed",
            SourceType::SemanticScholar => "semantic_scholar",
            SourceType::GoogleScholar => "google_scholar",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SourceType {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|source| source.id() == s)
            .ok_or_else(|| SourceError::UnsupportedSource(s.to_string()))
    }
}

/// A research paper in the canonical shape produced by every adapter.
///
/// Fields a source does not provide stay `None` (or empty for lists);
/// `title` is never empty and `abstract` is never null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPaper {
    /// Canonical identifier, `"<source>:<native id or hash>"`
    pub id: String,

    /// Paper title
    pub title: String,

    /// Abstract text, empty when the source has none
    pub r#abstract: String,

    /// Authors in the order the source reported them
    pub authors: Vec<String>,

    /// Source where the paper was found
    pub source: SourceType,

    /// Publication timestamp as reported by the source (arXiv: ISO datetime)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,

    /// Last updated timestamp (arXiv only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    /// Publication year in the source's string form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    /// Paper landing page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Direct PDF URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,

    /// Digital Object Identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    /// PubMed identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,

    /// Journal title or journal reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    /// Publication venue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,

    /// Subject categories (arXiv terms)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Primary subject category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,

    /// Citation count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u32>,

    /// Link to the list of citing works
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citedby_url: Option<String>,

    /// Link to related articles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_articles_url: Option<String>,

    /// Pointer to a full-text copy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text_url: Option<String>,
}

impl CanonicalPaper {
    /// Splits the canonical id into its source key and native component
    pub fn native_id(&self) -> &str {
        self.id
            .split_once(':')
            .map(|(_, native)| native)
            .unwrap_or(&self.id)
    }

    /// First listed author, if any
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(|a| a.as_str())
    }

    /// Authors joined for display
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }

    /// Publication year as a number, falling back to the published date
    pub fn publication_year(&self) -> Option<i32> {
        self.year
            .as_deref()
            .and_then(|y| y.trim().parse().ok())
            .or_else(|| {
                self.published
                    .as_deref()
                    .and_then(|p| p.get(..4))
                    .and_then(|y| y.parse().ok())
            })
    }

    /// Case-insensitive substring match against any author
    pub fn matches_author(&self, author: &str) -> bool {
        let needle = author.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.authors
            .iter()
            .any(|a| a.to_lowercase().contains(&needle))
    }

    /// String match against the reported year; papers without a year pass
    pub fn matches_year(&self, year: &str) -> bool {
        match self.year.as_deref() {
            Some(own) => own.trim() == year.trim(),
            None => true,
        }
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }
}

/// Builder for constructing CanonicalPaper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: CanonicalPaper,
}

impl PaperBuilder {
    /// Create a new builder with the identifying fields
    pub fn new(id: impl Into<String>, title: impl Into<String>, source: SourceType) -> Self {
        Self {
            paper: CanonicalPaper {
                id: id.into(),
                title: title.into(),
                r#abstract: String::new(),
                authors: Vec::new(),
                source,
                published: None,
                updated: None,
                year: None,
                url: None,
                pdf_url: None,
                doi: None,
                pmid: None,
                journal: None,
                venue: None,
                categories: Vec::new(),
                primary_category: None,
                citation_count: None,
                citedby_url: None,
                related_articles_url: None,
                full_text_url: None,
            },
        }
    }

    /// Set authors
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.paper.authors = authors;
        self
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    /// Set publication timestamp
    pub fn published(mut self, published: Option<String>) -> Self {
        self.paper.published = published;
        self
    }

    /// Set updated timestamp
    pub fn updated(mut self, updated: Option<String>) -> Self {
        self.paper.updated = updated;
        self
    }

    /// Set publication year
    pub fn year(mut self, year: Option<String>) -> Self {
        self.paper.year = year;
        self
    }

    /// Set landing page URL
    pub fn url(mut self, url: Option<String>) -> Self {
        self.paper.url = url;
        self
    }

    /// Set PDF URL
    pub fn pdf_url(mut self, url: Option<String>) -> Self {
        self.paper.pdf_url = url;
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: Option<String>) -> Self {
        self.paper.doi = doi;
        self
    }

    /// Set PubMed id
    pub fn pmid(mut self, pmid: impl Into<String>) -> Self {
        self.paper.pmid = Some(pmid.into());
        self
    }

    /// Set journal
    pub fn journal(mut self, journal: Option<String>) -> Self {
        self.paper.journal = journal;
        self
    }

    /// Set venue
    pub fn venue(mut self, venue: Option<String>) -> Self {
        self.paper.venue = venue;
        self
    }

    /// Set categories
    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.paper.categories = categories;
        self
    }

    /// Set primary category
    pub fn primary_category(mut self, category: Option<String>) -> Self {
        self.paper.primary_category = category;
        self
    }

    /// Set citation count
    pub fn citation_count(mut self, count: u32) -> Self {
        self.paper.citation_count = Some(count);
        self
    }

    /// Set the citing-works link
    pub fn citedby_url(mut self, url: Option<String>) -> Self {
        self.paper.citedby_url = url;
        self
    }

    /// Set the related-articles link
    pub fn related_articles_url(mut self, url: Option<String>) -> Self {
        self.paper.related_articles_url = url;
        self
    }

    /// Set the full-text pointer
    pub fn full_text_url(mut self, url: Option<String>) -> Self {
        self.paper.full_text_url = url;
        self
    }

    /// Build the paper, substituting the title placeholder when empty
    pub fn build(mut self) -> CanonicalPaper {
        if self.paper.title.trim().is_empty() {
            self.paper.title = MISSING_TITLE.to_string();
        }
        self.paper
    }
}
