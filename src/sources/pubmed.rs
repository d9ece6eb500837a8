//! PubMed source implementation using the E-utilities API.

use async_trait::async_trait;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{CanonicalId, CanonicalPaper, PaperBuilder, SearchQuery, SourceType};
use crate::sources::{eager, PaperStream, Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const PUBMED_ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Formatting tags that PubMed embeds in titles and abstracts
const INLINE_MARKUP: [&[u8]; 8] = [b"i", b"b", b"u", b"sub", b"sup", b"em", b"strong", b"sc"];

/// PubMed source
///
/// A search is two calls: ESearch resolves the query to PMIDs, then one
/// batched EFetch returns the article records for exactly those ids.
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    esearch_url: String,
    efetch_url: String,
}

impl PubMedSource {
    /// Create from configuration, sharing `client`
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self::with_client(
            client,
            config.endpoints.pubmed_esearch.clone(),
            config.endpoints.pubmed_efetch.clone(),
        )
    }

    /// Create against custom endpoints (for testing)
    pub fn with_client(
        client: Arc<HttpClient>,
        esearch_url: impl Into<String>,
        efetch_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            esearch_url: esearch_url.into(),
            efetch_url: efetch_url.into(),
        }
    }

    /// Build the ESearch `term`: query, author and year joined with AND
    pub fn build_term(query: &SearchQuery) -> String {
        let mut terms = vec![query.query.clone()];

        if let Some(author) = query.author_filter() {
            terms.push(format!("{}[Author]", author));
        }

        if let Some(year) = query.year_filter() {
            terms.push(format!("{}[Publication Date]", year));
        }

        terms.join(" AND ")
    }

    async fn search_ids(&self, query: &SearchQuery) -> Result<Vec<String>, SourceError> {
        let params = [
            ("db", "pubmed".to_string()),
            ("term", Self::build_term(query)),
            ("retmax", query.max_results.to_string()),
            ("retmode", "json".to_string()),
        ];

        let response: ESearchResponse = self
            .client
            .get_json(&self.esearch_url, &params, None)
            .await?;

        Ok(response
            .esearchresult
            .map(|result| result.idlist)
            .unwrap_or_default())
    }

    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<CanonicalPaper>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let params = [
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];

        let xml = self.client.get_text(&self.efetch_url, &params, None).await?;
        Self::parse_articles(&xml)
    }

    async fn search_papers(&self, query: &SearchQuery) -> Result<Vec<CanonicalPaper>, SourceError> {
        let ids = self.search_ids(query).await?;
        tracing::debug!(count = ids.len(), "PubMed ESearch returned ids");
        self.fetch_details(&ids).await
    }

    /// Parse an EFetch article set; articles that cannot be mapped are skipped
    pub fn parse_articles(xml: &str) -> Result<Vec<CanonicalPaper>, SourceError> {
        let papers = Self::split_articles(xml)?
            .iter()
            .filter_map(|fragment| match from_str::<PubmedArticle>(fragment) {
                Ok(article) => Some(article),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable PubMed article");
                    None
                }
            })
            .filter_map(Self::parse_article)
            .collect();

        Ok(papers)
    }

    /// Cut the set into one `<PubmedArticle>` document each, with inline
    /// formatting tags removed so their text joins the surrounding text.
    fn split_articles(xml: &str) -> Result<Vec<String>, SourceError> {
        let mut reader = Reader::from_str(xml);
        let mut articles = Vec::new();
        let mut current: Option<Writer<Vec<u8>>> = None;
        let mut depth = 0usize;

        loop {
            let event = reader.read_event().map_err(parse_error)?;
            let inline = match &event {
                Event::Start(e) | Event::Empty(e) => {
                    INLINE_MARKUP.contains(&e.local_name().as_ref())
                }
                Event::End(e) => INLINE_MARKUP.contains(&e.local_name().as_ref()),
                _ => false,
            };

            match event {
                Event::Eof => break,
                Event::Start(ref e)
                    if current.is_none() && e.local_name().as_ref() == b"PubmedArticle" =>
                {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(event.borrow()).map_err(parse_error)?;
                    current = Some(writer);
                    depth = 1;
                }
                _ if inline => {}
                event => {
                    let Some(writer) = current.as_mut() else {
                        continue;
                    };
                    match &event {
                        Event::Start(_) => depth += 1,
                        Event::End(_) => depth -= 1,
                        _ => {}
                    }
                    writer.write_event(event).map_err(parse_error)?;

                    if depth == 0 {
                        if let Some(writer) = current.take() {
                            let fragment =
                                String::from_utf8(writer.into_inner()).map_err(parse_error)?;
                            articles.push(fragment);
                        }
                    }
                }
            }
        }

        if current.is_some() {
            return Err(parse_error("unterminated PubmedArticle"));
        }

        Ok(articles)
    }

    fn parse_article(article: PubmedArticle) -> Option<CanonicalPaper> {
        let citation = article.citation;

        let pmid = citation
            .pmid
            .map(|p| p.text.trim().to_string())
            .filter(|p| !p.is_empty());
        let Some(pmid) = pmid else {
            tracing::warn!("Skipping PubMed article without a PMID");
            return None;
        };

        let details = citation.article.unwrap_or_default();

        let title = details.title.map(|t| t.text).unwrap_or_default();

        let abstract_text = details
            .r#abstract
            .map(|ab| {
                ab.texts
                    .iter()
                    .map(|t| t.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let authors = details
            .author_list
            .map(|list| {
                list.authors
                    .into_iter()
                    .filter_map(|author| match (author.fore_name, author.last_name) {
                        (Some(fore), Some(last)) => Some(format!("{} {}", fore.text, last.text)),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (journal, year) = match details.journal {
            Some(journal) => {
                let year = journal
                    .issue
                    .and_then(|issue| issue.pub_date)
                    .and_then(|date| {
                        date.year
                            .or_else(|| date.medline_date.and_then(|d| d.get(..4).map(str::to_string)))
                    });
                (journal.title.map(|t| t.text), year)
            }
            None => (None, None),
        };

        let doi = article
            .pubmed_data
            .and_then(|data| data.article_ids)
            .and_then(|list| {
                list.ids
                    .into_iter()
                    .find(|id| id.id_type.as_deref() == Some("doi"))
            })
            .map(|id| id.text)
            .filter(|doi| !doi.is_empty());

        Some(
            PaperBuilder::new(
                CanonicalId::new(SourceType::PubMed, pmid.as_str()).to_string(),
                title,
                SourceType::PubMed,
            )
            .authors(authors)
            .abstract_text(abstract_text)
            .url(Some(format!("{}/{}/", PUBMED_ARTICLE_URL, pmid)))
            .year(year)
            .journal(journal)
            .doi(doi)
            .pmid(pmid)
            .build(),
        )
    }
}

fn parse_error(e: impl std::fmt::Display) -> SourceError {
    SourceError::Parse(format!("Failed to parse PubMed fetch XML: {}", e))
}

#[async_trait]
impl Source for PubMedSource {
    fn kind(&self) -> SourceType {
        SourceType::PubMed
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
        let papers = self.fetch_details(&[native_id.to_string()]).await?;
        Ok(papers.into_iter().next())
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: Option<ESearchResult>,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation", default)]
    citation: MedlineCitation,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Default, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: Option<TextNode>,
    #[serde(rename = "Article")]
    article: Option<Article>,
}

#[derive(Debug, Default, Deserialize)]
struct Article {
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
    #[serde(rename = "ArticleTitle")]
    title: Option<TextNode>,
    #[serde(rename = "Abstract")]
    r#abstract: Option<Abstract>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<TextNode>,
    #[serde(rename = "JournalIssue")]
    issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "MedlineDate")]
    medline_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    texts: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "LastName")]
    last_name: Option<TextNode>,
    #[serde(rename = "ForeName")]
    fore_name: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    article_ids: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: Option<String>,
    #[serde(rename = "$text", default)]
    text: String,
}
