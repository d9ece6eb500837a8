//! HTML scraping backend for Google Scholar.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

use super::{ScholarBackend, ScholarPublication};
use crate::sources::SourceError;
use crate::utils::HttpClient;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Page fragments Google Scholar serves instead of results when it wants a CAPTCHA
const CAPTCHA_MARKERS: [&str; 3] = ["gs_captcha_ccl", "g-recaptcha", "not a robot"];

/// Scrapes Google Scholar result pages
#[derive(Debug, Clone)]
pub struct ScholarScraper {
    client: Arc<HttpClient>,
    base_url: String,
}

/// One parsed result page
#[derive(Debug, Default)]
struct ResultsPage {
    publications: Vec<ScholarPublication>,
    has_next: bool,
}

impl ScholarScraper {
    pub fn new(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_page(&self, url: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let html = self
            .client
            .get_text_with_headers(
                url,
                params,
                &[
                    ("User-Agent", BROWSER_USER_AGENT),
                    ("Accept-Language", "en-US,en;q=0.9"),
                ],
                None,
            )
            .await?;

        if CAPTCHA_MARKERS.iter().any(|marker| html.contains(marker)) {
            return Err(SourceError::Api(
                "Google Scholar is asking for a CAPTCHA".to_string(),
            ));
        }

        Ok(html)
    }

    async fn fetch_results(&self, query: &str, start: usize) -> Result<ResultsPage, SourceError> {
        let url = format!("{}/scholar", self.base_url);
        let params = [
            ("hl", "en".to_string()),
            ("q", query.to_string()),
            ("start", start.to_string()),
        ];

        let html = self.get_page(&url, &params).await?;
        parse_results_page(&html, &self.base_url)
    }
}

#[async_trait]
impl ScholarBackend for ScholarScraper {
    fn search_pubs<'a>(
        &'a self,
        query: String,
    ) -> BoxStream<'a, Result<ScholarPublication, SourceError>> {
        stream::unfold(Some(0usize), move |start| {
            let query = query.clone();
            async move {
                let Some(start) = start else {
                    return None;
                };

                match self.fetch_results(&query, start).await {
                    Ok(page) => {
                        let fetched = page.publications.len();
                        tracing::debug!(start, fetched, has_next = page.has_next, "Google Scholar page");
                        let next = (page.has_next && fetched > 0).then_some(start + fetched);
                        Some((Ok(page.publications), next))
                    }
                    Err(err) => Some((Err(err), None)),
                }
            }
        })
        .flat_map(|page| {
            let items: Vec<Result<ScholarPublication, SourceError>> = match page {
                Ok(publications) => publications.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            stream::iter(items)
        })
        .boxed()
    }

    async fn fill(
        &self,
        mut publication: ScholarPublication,
    ) -> Result<ScholarPublication, SourceError> {
        let Some(cluster_id) = publication.cluster_id.clone() else {
            tracing::debug!("Publication has no cluster id, nothing to fill");
            return Ok(publication);
        };

        let url = format!("{}/scholar", self.base_url);
        let params = [
            ("hl", "en".to_string()),
            ("q", format!("info:{}:scholar.google.com/", cluster_id)),
            ("output", "cite".to_string()),
        ];

        let cite_page = self.get_page(&url, &params).await?;
        let bibtex_url = parse_bibtex_link(&cite_page, &self.base_url)?;
        let bibtex = self.get_page(&bibtex_url, &[]).await?;

        merge_bibtex(&mut publication, &bibtex)?;
        publication.filled = true;
        Ok(publication)
    }
}

struct ResultSelectors {
    result: Selector,
    title: Selector,
    title_link: Selector,
    byline: Selector,
    snippet: Selector,
    eprint: Selector,
    footer_link: Selector,
    next_page: Selector,
}

impl ResultSelectors {
    fn new() -> Result<Self, SourceError> {
        Ok(Self {
            result: selector("div.gs_r[data-cid]")?,
            title: selector("h3.gs_rt")?,
            title_link: selector("h3.gs_rt a")?,
            byline: selector("div.gs_a")?,
            snippet: selector("div.gs_rs")?,
            eprint: selector("div.gs_or_ggsm a, div.gs_ggsd a")?,
            footer_link: selector("div.gs_ri div.gs_fl a")?,
            next_page: selector("a[href] .gs_ico_nav_next")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css)
        .map_err(|e| SourceError::Parse(format!("Invalid selector '{}': {:?}", css, e)))
}

fn parse_results_page(html: &str, base_url: &str) -> Result<ResultsPage, SourceError> {
    let selectors = ResultSelectors::new()?;
    let document = Html::parse_document(html);

    let publications = document
        .select(&selectors.result)
        .map(|result| parse_result(result, &selectors, base_url))
        .collect();

    let has_next = document.select(&selectors.next_page).next().is_some();

    Ok(ResultsPage {
        publications,
        has_next,
    })
}

fn parse_result(result: ElementRef, selectors: &ResultSelectors, base_url: &str) -> ScholarPublication {
    let mut publication = ScholarPublication {
        cluster_id: result.value().attr("data-cid").map(str::to_string),
        ..Default::default()
    };

    let title_link = result.select(&selectors.title_link).next();
    publication.title = title_link
        .map(element_text)
        .or_else(|| result.select(&selectors.title).next().map(element_text))
        .map(|title| strip_markers(&title))
        .filter(|title| !title.is_empty());
    publication.pub_url = title_link
        .and_then(|link| link.value().attr("href"))
        .map(|href| absolute_url(href, base_url));

    if let Some(byline) = result.select(&selectors.byline).next() {
        let (authors, venue, year) = parse_byline(&element_text(byline));
        publication.authors = authors;
        publication.venue = venue;
        publication.pub_year = year;
    }

    publication.abstract_text = result
        .select(&selectors.snippet)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty());

    publication.eprint_url = result
        .select(&selectors.eprint)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(|href| absolute_url(href, base_url));

    for link in result.select(&selectors.footer_link) {
        let text = element_text(link);
        let href = link.value().attr("href").map(|href| absolute_url(href, base_url));

        if let Some(count) = text.strip_prefix("Cited by ") {
            publication.num_citations = count.trim().parse().unwrap_or(0);
            publication.citedby_url = href;
        } else if text == "Related articles" {
            publication.related_url = href;
        }
    }

    publication
}

/// Split `"authors - venue, year - host"` into its parts.
///
/// Without a middle segment venue and year are unknown. A trailing four-digit
/// number in the middle segment is the year; the rest is the venue.
fn parse_byline(byline: &str) -> (Vec<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = byline.split(" - ").collect();

    let authors = parts[0]
        .split(',')
        .map(|author| author.trim().trim_end_matches('…').trim())
        .filter(|author| !author.is_empty())
        .map(str::to_string)
        .collect();

    if parts.len() <= 2 {
        return (authors, None, None);
    }

    let middle: Vec<&str> = parts[1].split(',').collect();
    let last = middle[middle.len() - 1].trim();

    if last.len() == 4 && last.chars().all(|c| c.is_ascii_digit()) {
        let venue = middle[..middle.len() - 1].join(",").trim().to_string();
        (
            authors,
            Some(venue).filter(|v| !v.is_empty()),
            Some(last.to_string()),
        )
    } else {
        (authors, Some(parts[1].trim().to_string()), None)
    }
}

fn parse_bibtex_link(html: &str, base_url: &str) -> Result<String, SourceError> {
    let link_selector = selector("a.gs_citi")?;
    let document = Html::parse_document(html);

    let href = document
        .select(&link_selector)
        .find(|link| element_text(*link) == "BibTeX")
        .and_then(|link| link.value().attr("href"))
        .ok_or_else(|| SourceError::Parse("No BibTeX link on citation page".to_string()))?;

    Ok(absolute_url(href, base_url))
}

/// Merge the fields of a BibTeX record into `publication`
fn merge_bibtex(publication: &mut ScholarPublication, bibtex: &str) -> Result<(), SourceError> {
    if !bibtex.trim_start().starts_with('@') {
        return Err(SourceError::Parse("Citation is not a BibTeX record".to_string()));
    }

    let field_re = regex::Regex::new(r"(?m)^\s*(\w+)\s*=\s*\{(.*)\},?\s*$")
        .map_err(|e| SourceError::Other(format!("Invalid BibTeX pattern: {}", e)))?;

    for caps in field_re.captures_iter(bibtex) {
        let value = clean_text(&caps[2].replace(['{', '}'], ""));
        if value.is_empty() {
            continue;
        }

        match caps[1].to_ascii_lowercase().as_str() {
            "title" => publication.title = Some(value),
            "author" => {
                publication.authors = value
                    .split(" and ")
                    .map(|author| author.trim().to_string())
                    .filter(|author| !author.is_empty())
                    .collect();
            }
            "year" => publication.pub_year = Some(value),
            "journal" | "booktitle" => publication.venue = Some(value),
            "doi" => publication.doi = Some(value),
            "abstract" => publication.abstract_text = Some(value),
            _ => {}
        }
    }

    Ok(())
}

fn element_text(element: ElementRef) -> String {
    clean_text(&element.text().collect::<String>())
}

fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop `[PDF]`, `[HTML]`, `[CITATION]` style markers
fn strip_markers(title: &str) -> String {
    match regex::Regex::new(r"\[[A-Z]+\]") {
        Ok(re) => clean_text(&re.replace_all(title, "")),
        Err(_) => title.to_string(),
    }
}

fn absolute_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url, href)
    } else {
        format!("{}/{}", base_url, href)
    }
}
