//! Semantic Scholar source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{CanonicalId, CanonicalPaper, PaperBuilder, SearchQuery, SourceType};
use crate::sources::{eager, PaperStream, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Fields requested for every paper
const PAPER_FIELDS: &str = "paperId,title,abstract,authors,year,citationCount,url,venue";

/// Semantic Scholar source
///
/// Uses the Graph API. The author is folded into the free-text query; the
/// year is sent as the structured `year` parameter.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl SemanticScholarSource {
    /// Create from configuration, sharing `client`
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self::with_client(client, config.endpoints.semantic_scholar.clone())
    }

    /// Create against a custom Graph API root (for testing)
    pub fn with_client(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Free-text query with the author appended
    pub fn build_query(query: &SearchQuery) -> String {
        match query.author_filter() {
            Some(author) => format!("{} author:{}", query.query, author),
            None => query.query.clone(),
        }
    }

    async fn search_papers(&self, query: &SearchQuery) -> Result<Vec<CanonicalPaper>, SourceError> {
        let mut params = vec![
            ("query", Self::build_query(query)),
            ("limit", query.max_results.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];
        if let Some(year) = query.year_filter() {
            params.push(("year", year.to_string()));
        }

        let url = format!("{}/paper/search", self.base_url);
        let response: S2SearchResponse = self.client.get_json(&url, &params, None).await?;

        Ok(response.data.into_iter().map(Self::parse_paper).collect())
    }

    /// Map a Graph API paper, defaulting every missing field
    fn parse_paper(data: S2Paper) -> CanonicalPaper {
        let authors = data
            .authors
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.name.unwrap_or_default())
            .collect();

        PaperBuilder::new(
            CanonicalId::new(SourceType::SemanticScholar, data.paper_id).to_string(),
            data.title.unwrap_or_default(),
            SourceType::SemanticScholar,
        )
        .authors(authors)
        .abstract_text(data.r#abstract.unwrap_or_default())
        .year(data.year.map(|y| y.to_string()))
        .citation_count(data.citation_count.unwrap_or(0))
        .venue(Some(data.venue.unwrap_or_default()))
        .url(Some(data.url.unwrap_or_default()))
        .build()
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn kind(&self) -> SourceType {
        SourceType::SemanticScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DETAIL
            | SourceCapabilities::AUTHOR_FILTER
            | SourceCapabilities::YEAR_FILTER
    }

    fn search_stream<'a>(&'a self, query: &'a SearchQuery) -> PaperStream<'a> {
        eager(self.search_papers(query))
    }

    async fn fetch_one(&self, native_id: &str) -> Result<Option<CanonicalPaper>, SourceError> {
        let url = format!(
            "{}/paper/{}",
            self.base_url,
            urlencoding::encode(native_id)
        );

        match self
            .client
            .get_json::<S2Paper, _>(&url, &[("fields", PAPER_FIELDS)], None)
            .await
        {
            Ok(paper) => Ok(Some(Self::parse_paper(paper))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: String,
    title: Option<String>,
    r#abstract: Option<String>,
    authors: Option<Vec<S2Author>>,
    year: Option<u32>,
    citation_count: Option<u32>,
    url: Option<String>,
    venue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use mockito::Matcher;

    fn client() -> Arc<HttpClient> {
        Arc::new(HttpClient::new(&HttpConfig::default()).unwrap())
    }

    #[test]
    fn test_build_query() {
        assert_eq!(
            SemanticScholarSource::build_query(&SearchQuery::new("transformers")),
            "transformers"
        );
        assert_eq!(
            SemanticScholarSource::build_query(&SearchQuery::new("transformers").author("Vaswani")),
            "transformers author:Vaswani"
        );
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let paper: S2Paper = serde_json::from_str(
            r#"{"paperId": "abc123", "title": "Sparse", "abstract": null, "authors": [{"name": "A. Author"}, {}]}"#,
        )
        .unwrap();
        let paper = SemanticScholarSource::parse_paper(paper);

        assert_eq!(paper.id, "semantic_scholar:abc123");
        assert_eq!(paper.r#abstract, "");
        assert_eq!(paper.authors, ["A. Author", ""]);
        assert_eq!(paper.citation_count, Some(0));
        assert_eq!(paper.venue.as_deref(), Some(""));
        assert_eq!(paper.url.as_deref(), Some(""));
        assert_eq!(paper.year, None);
    }

    #[tokio::test]
    async fn test_search_maps_results_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "graphs author:Kipf".into()),
                Matcher::UrlEncoded("limit".into(), "2".into()),
                Matcher::UrlEncoded("fields".into(), PAPER_FIELDS.into()),
                Matcher::UrlEncoded("year".into(), "2017".into()),
            ]))
            .with_body(
                r#"{"total": 2, "offset": 0, "data": [
                    {"paperId": "p1", "title": "GCN", "abstract": "Graph convolutions.",
                     "authors": [{"authorId": "1", "name": "Thomas Kipf"}], "year": 2017,
                     "citationCount": 20000, "url": "https://www.semanticscholar.org/paper/p1",
                     "venue": "ICLR"},
                    {"paperId": "p2", "title": "Other"}
                ]}"#,
            )
            .create_async()
            .await;

        let source =
            SemanticScholarSource::with_client(client(), format!("{}/graph/v1", server.url()));
        let query = SearchQuery::new("graphs")
            .author("Kipf")
            .year("2017")
            .max_results(2);
        let papers = source.search(&query).await.unwrap();

        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].id, "semantic_scholar:p1");
        assert_eq!(papers[0].year.as_deref(), Some("2017"));
        assert_eq!(papers[0].citation_count, Some(20000));
        assert_eq!(papers[0].venue.as_deref(), Some("ICLR"));
        assert_eq!(papers[1].r#abstract, "");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_without_data_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/graph/v1/paper/search")
            .match_query(Matcher::Any)
            .with_body(r#"{"total": 0, "offset": 0}"#)
            .create_async()
            .await;

        let source =
            SemanticScholarSource::with_client(client(), format!("{}/graph/v1", server.url()));
        assert!(source
            .search(&SearchQuery::new("nothing"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_fetch_one_not_found_is_absent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/graph/v1/paper/missing")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": "Paper with id missing not found"}"#)
            .create_async()
            .await;

        let source =
            SemanticScholarSource::with_client(client(), format!("{}/graph/v1", server.url()));
        assert_eq!(source.fetch_one("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_one() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/graph/v1/paper/p1")
            .match_query(Matcher::UrlEncoded("fields".into(), PAPER_FIELDS.into()))
            .with_body(r#"{"paperId": "p1", "title": "GCN", "year": 2017}"#)
            .create_async()
            .await;

        let source =
            SemanticScholarSource::with_client(client(), format!("{}/graph/v1", server.url()));
        let paper = source.fetch_one("p1").await.unwrap().unwrap();
        assert_eq!(paper.id, "semantic_scholar:p1");
        assert_eq!(paper.title, "GCN");
    }
}
