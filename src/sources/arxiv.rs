//! arXiv source implementation.

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::{CanonicalId, CanonicalPaper, PaperBuilder, SearchQuery, SourceType};
use crate::sources::{eager, PaperStream, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

/// Entries with this id prefix report a query error instead of a paper
const ARXIV_ERROR_ID: &str = "/api/errors";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(38);

/// arXiv source
///
/// Supports:
/// - Search by query, author and submission year
/// - Lookup by arXiv id
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    base_url: String,
    search_timeout: Duration,
}

impl ArxivSource {
    /// Create from configuration, sharing `client`
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            client,
            base_url: config.endpoints.arxiv.clone(),
            search_timeout: config.search.arxiv_timeout(),
        }
    }

    /// Create against a custom endpoint (for testing)
    pub fn with_client(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            search_timeout: SEARCH_TIMEOUT,
        }
    }

    /// Build the boolean `search_query` for the arXiv API
    pub fn build_search_query(query: &SearchQuery) -> String {
        let mut search_query = format!("all:{}", query.query);

        if let Some(author) = query.author_filter() {
            search_query.push_str(&format!(" AND au:{}", author));
        }

        if let Some(year) = query.year_filter() {
            search_query.push_str(&format!(
                " AND submittedDate:[{}0101 TO {}1231]",
                year, year
            ));
        }

        search_query
    }

    async fn search_feed(&self, query: &SearchQuery) -> Result<Vec<CanonicalPaper>, SourceError> {
        let params = [
            ("search_query", Self::build_search_query(query)),
            ("start", "0".to_string()),
            ("max_results", query.max_results.to_string()),
            ("sortBy", "relevance".to_string()),
            ("sortOrder", "descending".to_string()),
        ];

        let xml = self
            .client
            .get_text(&self.base_url, &params, Some(self.search_timeout))
            .await?;

        Self::parse_feed(&xml)
    }

    /// Parse an Atom feed into canonical records, in feed order
    pub fn parse_feed(xml: &str) -> Result<Vec<CanonicalPaper>, SourceError> {
        let feed: AtomFeed = from_str(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse arXiv Atom feed: {}", e)))?;

        feed.entries.into_iter().map(Self::parse_entry).collect()
    }

    fn parse_entry(entry: AtomEntry) -> Result<CanonicalPaper, SourceError> {
        let entry_id = entry.id.trim();

        if entry_id.contains(ARXIV_ERROR_ID) {
            let message = entry
                .summary
                .as_deref()
                .map(clean_text)
                .unwrap_or_else(|| "unknown arXiv API error".to_string());
            return Err(SourceError::Api(message));
        }

        let native_id = entry_id.rsplit('/').next().unwrap_or(entry_id);
        if native_id.is_empty() {
            return Err(SourceError::Parse(format!(
                "arXiv entry id '{}' has no native component",
                entry_id
            )));
        }

        let authors = entry
            .authors
            .into_iter()
            .filter_map(|author| clean_optional(author.name))
            .collect();

        let categories = entry
            .categories
            .into_iter()
            .filter_map(|category| clean_optional(category.term))
            .collect();

        let pdf_url = entry
            .links
            .iter()
            .find(|link| link.link_type.as_deref() == Some("application/pdf"))
            .and_then(|link| link.href.clone());

        let published = clean_optional(entry.published);
        let year = published
            .as_deref()
            .and_then(|p| p.get(..4))
            .map(str::to_string);

        Ok(PaperBuilder::new(
            CanonicalId::new(SourceType::Arxiv, native_id).to_string(),
            entry.title.as_deref().map(clean_text).unwrap_or_default(),
            SourceType::Arxiv,
        )
        .authors(authors)
        .abstract_text(entry.summary.as_deref().map(clean_text).unwrap_or_default())
        .published(published)
        .updated(clean_optional(entry.updated))
        .year(year)
        .url(Some(entry_id.to_string()))
        .pdf_url(pdf_url)
        .doi(clean_optional(entry.doi))
        .journal(clean_optional(entry.journal_ref))
        .categories(categories)
        .primary_category(entry.primary_category.and_then(|c| clean_optional(c.term)))
        .build())
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn kind(&self) -> SourceType {
        SourceType::Arxiv
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
            | SourceCapabilities::DETAIL
            | SourceCapabilities::AUTHOR_FILTER
            | SourceCapabilities::YEAR_FILTER
    }

    fn search_stream<'a>(&'a self, query: &'a SearchQuery) -> PaperStream<'a> {
        eager(self.search_feed(query))
    }

    async fn fetch_one(&self, native_id: &str) -> Result<Option<CanonicalPaper>, SourceError> {
        let params = [("id_list", native_id), ("max_results", "1")];
        let xml = self.client.get_text(&self.base_url, &params, None).await?;

        Ok(Self::parse_feed(&xml)?.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: String,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
    #[serde(rename = "arxiv:primary_category", alias = "primary_category")]
    primary_category: Option<AtomCategory>,
    #[serde(rename = "arxiv:journal_ref", alias = "journal_ref")]
    journal_ref: Option<String>,
    #[serde(rename = "arxiv:doi", alias = "doi")]
    doi: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@type")]
    link_type: Option<String>,
}

fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use futures_util::TryStreamExt;
    use mockito::Matcher;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models
  are based on recurrent networks.  </summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <arxiv:doi>10.48550/arXiv.1706.03762</arxiv:doi>
    <link title="doi" href="http://dx.doi.org/10.48550/arXiv.1706.03762" rel="related"/>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:journal_ref>NeurIPS 2017</arxiv:journal_ref>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/hep-th/9901001v1</id>
    <published>1999-01-01T00:00:00Z</published>
    <title>Strings</title>
    <summary>Old style id.</summary>
    <author><name>Ed Witten</name></author>
    <link href="http://arxiv.org/abs/hep-th/9901001v1" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    fn client() -> Arc<HttpClient> {
        Arc::new(HttpClient::new(&HttpConfig::default()).unwrap())
    }

    #[test]
    fn test_build_search_query() {
        let query = SearchQuery::new("quantum computing");
        assert_eq!(
            ArxivSource::build_search_query(&query),
            "all:quantum computing"
        );

        let query = SearchQuery::new("electron").author("Smith").year("2020");
        assert_eq!(
            ArxivSource::build_search_query(&query),
            "all:electron AND au:Smith AND submittedDate:[20200101 TO 20201231]"
        );
    }

    #[test]
    fn test_parse_feed() {
        let papers = ArxivSource::parse_feed(FEED).unwrap();
        assert_eq!(papers.len(), 2);

        let paper = &papers[0];
        assert_eq!(paper.id, "arxiv:1706.03762v7");
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(
            paper.r#abstract,
            "The dominant sequence transduction models are based on recurrent networks."
        );
        assert_eq!(paper.authors, ["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(paper.published.as_deref(), Some("2017-06-12T17:57:34Z"));
        assert_eq!(paper.updated.as_deref(), Some("2023-08-02T00:41:18Z"));
        assert_eq!(paper.year.as_deref(), Some("2017"));
        assert_eq!(
            paper.pdf_url.as_deref(),
            Some("http://arxiv.org/pdf/1706.03762v7")
        );
        assert_eq!(paper.doi.as_deref(), Some("10.48550/arXiv.1706.03762"));
        assert_eq!(paper.journal.as_deref(), Some("NeurIPS 2017"));
        assert_eq!(paper.categories, ["cs.CL", "cs.LG"]);
        assert_eq!(paper.primary_category.as_deref(), Some("cs.CL"));
        assert_eq!(
            paper.url.as_deref(),
            Some("http://arxiv.org/abs/1706.03762v7")
        );
    }

    #[test]
    fn test_native_id_is_last_path_segment() {
        let papers = ArxivSource::parse_feed(FEED).unwrap();
        assert_eq!(papers[1].id, "arxiv:9901001v1");
        assert_eq!(papers[1].pdf_url, None);
        assert!(papers[1].categories.is_empty());
    }

    #[test]
    fn test_pdf_link_found_regardless_of_order() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <title>Order</title>
    <link title="pdf" href="http://arxiv.org/pdf/2301.00001v1" type="application/pdf"/>
    <link href="http://arxiv.org/abs/2301.00001v1" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;
        let papers = ArxivSource::parse_feed(feed).unwrap();
        assert_eq!(
            papers[0].pdf_url.as_deref(),
            Some("http://arxiv.org/pdf/2301.00001v1")
        );
    }

    #[test]
    fn test_missing_title_gets_placeholder() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry><id>http://arxiv.org/abs/2301.00002v1</id></entry>
</feed>"#;
        let papers = ArxivSource::parse_feed(feed).unwrap();
        assert_eq!(papers[0].title, crate::models::MISSING_TITLE);
        assert_eq!(papers[0].r#abstract, "");
    }

    #[test]
    fn test_error_entry_is_api_error() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_xyz</id>
    <title>Error</title>
    <summary>incorrect id format for xyz</summary>
  </entry>
</feed>"#;
        let err = ArxivSource::parse_feed(feed).unwrap_err();
        assert!(matches!(err, SourceError::Api(msg) if msg == "incorrect id format for xyz"));
    }

    #[test]
    fn test_empty_feed() {
        let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>ArXiv Query</title></feed>"#;
        assert!(ArxivSource::parse_feed(feed).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_sends_expected_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:attention AND au:Vaswani".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("max_results".into(), "2".into()),
                Matcher::UrlEncoded("sortBy".into(), "relevance".into()),
                Matcher::UrlEncoded("sortOrder".into(), "descending".into()),
            ]))
            .with_body(FEED)
            .expect(1)
            .create_async()
            .await;

        let source = ArxivSource::with_client(client(), format!("{}/api/query", server.url()));
        let query = SearchQuery::new("attention").author("Vaswani").max_results(2);
        let papers: Vec<CanonicalPaper> = source.search_stream(&query).try_collect().await.unwrap();

        assert_eq!(papers.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_one() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id_list".into(), "1706.03762v7".into()),
                Matcher::UrlEncoded("max_results".into(), "1".into()),
            ]))
            .with_body(FEED)
            .create_async()
            .await;

        let source = ArxivSource::with_client(client(), format!("{}/api/query", server.url()));
        let paper = source.fetch_one("1706.03762v7").await.unwrap().unwrap();

        assert_eq!(paper.id, "arxiv:1706.03762v7");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_one_without_entry_is_absent() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_body(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#)
            .create_async()
            .await;

        let source = ArxivSource::with_client(client(), format!("{}/api/query", server.url()));
        assert_eq!(source.fetch_one("0000.00000").await.unwrap(), None);
    }
}
