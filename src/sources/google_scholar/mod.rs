//! Google Scholar source implementation.
//!
//! Google Scholar has no public API. Results come from a [`ScholarBackend`],
//! by default [`ScholarScraper`], which pages through result HTML lazily and
//! fills single publications from their BibTeX citation.
//!
//! Search results carry no stable native id, so canonical ids are derived
//! with [`ScholarKey`]. Hash-tier ids cannot be used to re-query the source.

mod scrape;

pub use scrape::ScholarScraper;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;

use crate::config::Config;
use crate::models::{
    CanonicalId, CanonicalPaper, PaperBuilder, ScholarKey, SearchQuery, SourceType,
};
use crate::sources::{ErrorPolicy, PaperStream, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// One Google Scholar result, as scraped or filled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScholarPublication {
    /// Stable Scholar id; only author-profile listings expose one
    pub scholar_id: Option<String>,
    /// Result cluster id, needed to fetch the citation for `fill`
    pub cluster_id: Option<String>,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub pub_year: Option<String>,
    pub venue: Option<String>,
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub pub_url: Option<String>,
    /// Direct link to a full-text copy
    pub eprint_url: Option<String>,
    pub num_citations: u32,
    pub citedby_url: Option<String>,
    pub related_url: Option<String>,
    /// Set once the citation details have been merged in
    pub filled: bool,
}

impl ScholarPublication {
    /// Fields used for id derivation
    pub fn key(&self) -> ScholarKey<'_> {
        ScholarKey {
            scholar_id: self.scholar_id.as_deref(),
            doi: self.doi.as_deref(),
            url: self.pub_url.as_deref(),
            title: self.title.as_deref(),
            authors: &self.authors,
            year: self.pub_year.as_deref(),
        }
    }
}

/// Where Google Scholar results come from
#[async_trait]
pub trait ScholarBackend: Send + Sync + std::fmt::Debug {
    /// Lazily page through results for a free-text query
    fn search_pubs<'a>(
        &'a self,
        query: String,
    ) -> BoxStream<'a, Result<ScholarPublication, SourceError>>;

    /// Fetch extended fields for one publication
    async fn fill(&self, publication: ScholarPublication)
        -> Result<ScholarPublication, SourceError>;
}

/// Google Scholar source
///
/// Failures are surfaced to the caller rather than degraded.
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    backend: Arc<dyn ScholarBackend>,
}

impl GoogleScholarSource {
    /// Create a scraping source from configuration, sharing `client`
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self::with_backend(Arc::new(ScholarScraper::new(
            client,
            config.endpoints.google_scholar.clone(),
        )))
    }

    /// Create with a custom backend
    pub fn with_backend(backend: Arc<dyn ScholarBackend>) -> Self {
        Self { backend }
    }

    /// Free-text query with the author as a quoted `author:` operator
    pub fn build_query(query: &SearchQuery) -> String {
        match query.author_filter() {
            Some(author) => format!("{} author:\"{}\"", query.query, author),
            None => query.query.clone(),
        }
    }

    fn builder(publication: &ScholarPublication, id: String) -> PaperBuilder {
        PaperBuilder::new(
            id,
            publication.title.clone().unwrap_or_default(),
            SourceType::GoogleScholar,
        )
        .authors(publication.authors.clone())
        .abstract_text(publication.abstract_text.clone().unwrap_or_default())
        .year(publication.pub_year.clone())
        .url(publication.pub_url.clone())
        .venue(publication.venue.clone())
        .citation_count(publication.num_citations)
    }

    /// Search-result shape, id derived from the publication fields
    fn to_canonical(publication: ScholarPublication) -> CanonicalPaper {
        let id = publication.key().canonical_id();
        Self::builder(&publication, id).build()
    }

    /// Detail shape: filled fields included, id kept as requested
    fn to_detail(publication: ScholarPublication, native_id: &str) -> CanonicalPaper {
        let id = CanonicalId::new(SourceType::GoogleScholar, native_id).to_string();
        Self::builder(&publication, id)
            .doi(publication.doi.clone())
            .citedby_url(publication.citedby_url.clone())
            .related_articles_url(publication.related_url.clone())
            .full_text_url(publication.eprint_url.clone())
            .build()
    }
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn kind(&self) -> SourceType {
        SourceType::GoogleScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DETAIL
            | SourceCapabilities::AUTHOR_FILTER
            | SourceCapabilities::YEAR_FILTER
    }

    fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::Surface
    }

    fn search_stream<'a>(&'a self, query: &'a SearchQuery) -> PaperStream<'a> {
        let year = query.year_filter().map(str::to_string);

        self.backend
            .search_pubs(Self::build_query(query))
            .try_filter(move |publication| {
                let keep = match (year.as_deref(), publication.pub_year.as_deref()) {
                    (Some(wanted), Some(found)) => found.trim() == wanted,
                    _ => true,
                };
                future::ready(keep)
            })
            .map_ok(Self::to_canonical)
            .boxed()
    }

    /// Re-search with `native_id` as free text and fill the first hit.
    ///
    /// The upstream ranking decides which record comes back, so the result
    /// is not guaranteed to be the record the id was derived from.
    async fn fetch_one(&self, native_id: &str) -> Result<Option<CanonicalPaper>, SourceError> {
        let first = {
            let mut results = self.backend.search_pubs(native_id.to_string());
            results.try_next().await?
        };

        let Some(first) = first else {
            return Ok(None);
        };

        let filled = self.backend.fill(first).await?;
        Ok(Some(Self::to_detail(filled, native_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves fixed publications and counts how many were pulled
    #[derive(Debug, Default)]
    struct FakeBackend {
        publications: Vec<ScholarPublication>,
        pulled: Arc<AtomicUsize>,
        queries: std::sync::Mutex<Vec<String>>,
        fail_fill: bool,
    }

    #[async_trait]
    impl ScholarBackend for FakeBackend {
        fn search_pubs<'a>(
            &'a self,
            query: String,
        ) -> BoxStream<'a, Result<ScholarPublication, SourceError>> {
            self.queries.lock().unwrap().push(query);
            let pulled = Arc::clone(&self.pulled);
            stream::iter(self.publications.clone())
                .map(move |publication| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(publication)
                })
                .boxed()
        }

        async fn fill(
            &self,
            mut publication: ScholarPublication,
        ) -> Result<ScholarPublication, SourceError> {
            if self.fail_fill {
                return Err(SourceError::Api("blocked".to_string()));
            }
            publication.doi = Some("10.1000/filled".to_string());
            publication.citedby_url = Some("https://scholar.google.com/scholar?cites=1".to_string());
            publication.related_url = Some("https://scholar.google.com/scholar?q=related:x".to_string());
            publication.filled = true;
            Ok(publication)
        }
    }

    fn publication(title: &str, year: Option<&str>) -> ScholarPublication {
        ScholarPublication {
            title: Some(title.to_string()),
            authors: vec!["A Author".to_string()],
            pub_year: year.map(str::to_string),
            pub_url: Some(format!("https://example.org/{}", title)),
            eprint_url: Some(format!("https://example.org/{}.pdf", title)),
            num_citations: 7,
            ..Default::default()
        }
    }

    fn source(backend: FakeBackend) -> (GoogleScholarSource, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        (
            GoogleScholarSource::with_backend(Arc::clone(&backend) as Arc<dyn ScholarBackend>),
            backend,
        )
    }

    #[test]
    fn test_build_query_quotes_author() {
        let query = SearchQuery::new("deep learning").author("Y LeCun");
        assert_eq!(
            GoogleScholarSource::build_query(&query),
            "deep learning author:\"Y LeCun\""
        );
    }

    #[tokio::test]
    async fn test_search_stops_at_limit() {
        let (source, backend) = source(FakeBackend {
            publications: (0..5).map(|i| publication(&format!("p{}", i), None)).collect(),
            ..Default::default()
        });

        let papers = source
            .search(&SearchQuery::new("q").max_results(2))
            .await
            .unwrap();

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "p0");
        assert_eq!(backend.pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_year_mismatches_do_not_count_toward_limit() {
        let (source, _) = source(FakeBackend {
            publications: vec![
                publication("old", Some("2015")),
                publication("match", Some("2017")),
                publication("undated", None),
                publication("late", Some("2017")),
            ],
            ..Default::default()
        });

        let papers = source
            .search(&SearchQuery::new("q").year("2017").max_results(2))
            .await
            .unwrap();

        let titles: Vec<&str> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["match", "undated"]);
    }

    #[tokio::test]
    async fn test_search_ids_use_url_tier() {
        let (source, _) = source(FakeBackend {
            publications: vec![publication("x", Some("2020"))],
            ..Default::default()
        });

        let papers = source.search(&SearchQuery::new("q")).await.unwrap();
        let native = papers[0].id.strip_prefix("google_scholar:url_").unwrap();
        assert_eq!(native.len(), 10);
        assert_eq!(papers[0].citation_count, Some(7));
        assert_eq!(papers[0].r#abstract, "");
        assert_eq!(papers[0].doi, None);
    }

    #[tokio::test]
    async fn test_missing_title_gets_placeholder() {
        let (source, _) = source(FakeBackend {
            publications: vec![ScholarPublication::default()],
            ..Default::default()
        });

        let papers = source.search(&SearchQuery::new("q")).await.unwrap();
        assert_eq!(papers[0].title, crate::models::MISSING_TITLE);
        assert!(papers[0].id.starts_with("google_scholar:hash_"));
    }

    #[tokio::test]
    async fn test_fetch_one_fills_first_hit() {
        let (source, backend) = source(FakeBackend {
            publications: vec![publication("first", None), publication("second", None)],
            ..Default::default()
        });

        let paper = source.fetch_one("doi_10.1000_x").await.unwrap().unwrap();

        assert_eq!(paper.id, "google_scholar:doi_10.1000_x");
        assert_eq!(paper.title, "first");
        assert_eq!(paper.doi.as_deref(), Some("10.1000/filled"));
        assert!(paper.citedby_url.is_some());
        assert!(paper.related_articles_url.is_some());
        assert_eq!(
            paper.full_text_url.as_deref(),
            Some("https://example.org/first.pdf")
        );
        assert_eq!(backend.queries.lock().unwrap()[0], "doi_10.1000_x");
    }

    #[tokio::test]
    async fn test_fetch_one_without_hits_is_absent() {
        let (source, _) = source(FakeBackend::default());
        assert_eq!(source.fetch_one("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fill_failure_propagates() {
        let (source, _) = source(FakeBackend {
            publications: vec![publication("first", None)],
            fail_fill: true,
            ..Default::default()
        });

        assert!(matches!(
            source.fetch_one("first").await,
            Err(SourceError::Api(_))
        ));
    }
}
