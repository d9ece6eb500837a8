//! Canonical identifiers and the Google Scholar fallback id tiers.
//!
//! Every record carries an id of the form `"<source>:<native>"`. Sources with
//! a native id (arXiv, PubMed, Semantic Scholar) use it directly. Google
//! Scholar exposes no stable id for search results, so one is derived from the
//! first available of: scholar id, DOI, URL digest, or a digest of
//! title/first author/year.

use std::fmt;
use std::str::FromStr;

use crate::models::SourceType;
use crate::sources::SourceError;

/// Hex digits kept from the URL digest
const URL_DIGEST_LEN: usize = 10;
/// Hex digits kept from the title/author/year digest
const CONTENT_DIGEST_LEN: usize = 12;

/// A canonical identifier split into its source and native component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalId {
    pub source: SourceType,
    pub native_id: String,
}

impl CanonicalId {
    pub fn new(source: SourceType, native_id: impl Into<String>) -> Self {
        Self {
            source,
            native_id: native_id.into(),
        }
    }

    /// Parse a canonical id by splitting on the first colon.
    ///
    /// Ids without a colon are taken to be bare arXiv ids.
    pub fn parse(id: &str) -> Result<Self, SourceError> {
        let id = id.trim();
        let (source, native) = match id.split_once(':') {
            Some((source, native)) => (source.parse::<SourceType>()?, native),
            None => (SourceType::Arxiv, id),
        };

        if native.is_empty() {
            return Err(SourceError::InvalidRequest(format!(
                "Identifier '{}' has no native component",
                id
            )));
        }

        Ok(Self::new(source, native))
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.id(), self.native_id)
    }
}

impl FromStr for CanonicalId {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which rule produced a Google Scholar id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScholarIdTier {
    ScholarId,
    Doi,
    Url,
    ContentHash,
}

/// The fields of a Google Scholar result that feed id derivation
#[derive(Debug, Clone, Copy, Default)]
pub struct ScholarKey<'a> {
    pub scholar_id: Option<&'a str>,
    pub doi: Option<&'a str>,
    pub url: Option<&'a str>,
    pub title: Option<&'a str>,
    pub authors: &'a [String],
    pub year: Option<&'a str>,
}

impl ScholarKey<'_> {
    /// Derive the id; the first applicable tier wins
    pub fn derive(&self) -> (CanonicalId, ScholarIdTier) {
        let (native, tier) = if let Some(id) = non_empty(self.scholar_id) {
            (id.to_string(), ScholarIdTier::ScholarId)
        } else if let Some(doi) = non_empty(self.doi) {
            (
                format!("doi_{}", doi.replace(['/', ':'], "_")),
                ScholarIdTier::Doi,
            )
        } else if let Some(url) = non_empty(self.url) {
            (
                format!("url_{}", hex_digest(url, URL_DIGEST_LEN)),
                ScholarIdTier::Url,
            )
        } else {
            (
                format!("hash_{}", content_hash(self.title, self.authors, self.year)),
                ScholarIdTier::ContentHash,
            )
        };

        (CanonicalId::new(SourceType::GoogleScholar, native), tier)
    }

    /// The canonical id string
    pub fn canonical_id(&self) -> String {
        self.derive().0.to_string()
    }
}

/// Digest of `"<title>_<first author>_<year>"`, 12 hex characters
pub fn content_hash(title: Option<&str>, authors: &[String], year: Option<&str>) -> String {
    let title = title.unwrap_or("untitled");
    let first_author = authors.first().map(|a| a.as_str()).unwrap_or("unknown");
    let year = year.unwrap_or("");
    hex_digest(
        &format!("{}_{}_{}", title, first_author, year),
        CONTENT_DIGEST_LEN,
    )
}

fn hex_digest(input: &str, len: usize) -> String {
    let mut hex = format!("{:x}", md5::compute(input.as_bytes()));
    hex.truncate(len);
    hex
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_first_colon() {
        let id = CanonicalId::parse("google_scholar:doi_10.1000_x:y").unwrap();
        assert_eq!(id.source, SourceType::GoogleScholar);
        assert_eq!(id.native_id, "doi_10.1000_x:y");
        assert_eq!(id.to_string(), "google_scholar:doi_10.1000_x:y");
    }

    #[test]
    fn test_parse_recovers_every_source() {
        for source in SourceType::ALL {
            let id = CanonicalId::new(source, "abc").to_string();
            assert_eq!(CanonicalId::parse(&id).unwrap().source, source);
        }
    }

    #[test]
    fn test_parse_bare_id_defaults_to_arxiv() {
        let id = CanonicalId::parse("2301.12345").unwrap();
        assert_eq!(id.source, SourceType::Arxiv);
        assert_eq!(id.native_id, "2301.12345");
    }

    #[test]
    fn test_parse_rejects_unknown_source_and_empty_native() {
        assert!(matches!(
            CanonicalId::parse("scopus:123"),
            Err(SourceError::UnsupportedSource(_))
        ));
        assert!(matches!(
            CanonicalId::parse("pubmed:"),
            Err(SourceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_scholar_id_tier_wins() {
        let key = ScholarKey {
            scholar_id: Some("abcXYZ"),
            doi: Some("10.1/2"),
            url: Some("https://example.org"),
            ..Default::default()
        };
        let (id, tier) = key.derive();
        assert_eq!(tier, ScholarIdTier::ScholarId);
        assert_eq!(id.to_string(), "google_scholar:abcXYZ");
    }

    #[test]
    fn test_doi_tier_replaces_separators() {
        let key = ScholarKey {
            doi: Some("10.1145/3292500:3330701"),
            url: Some("https://example.org"),
            ..Default::default()
        };
        let (id, tier) = key.derive();
        assert_eq!(tier, ScholarIdTier::Doi);
        assert_eq!(id.native_id, "doi_10.1145_3292500_3330701");
    }

    #[test]
    fn test_url_tier_uses_ten_hex_chars() {
        let key = ScholarKey {
            doi: Some(""),
            url: Some("https://example.org/paper"),
            ..Default::default()
        };
        let (id, tier) = key.derive();
        assert_eq!(tier, ScholarIdTier::Url);
        let digest = id.native_id.strip_prefix("url_").unwrap();
        assert_eq!(digest.len(), 10);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        let authors = vec!["A Vaswani".to_string(), "N Shazeer".to_string()];
        let key = ScholarKey {
            title: Some("Attention is all you need"),
            authors: &authors,
            year: Some("2017"),
            ..Default::default()
        };

        let (first, tier) = key.derive();
        let (second, _) = key.derive();
        assert_eq!(tier, ScholarIdTier::ContentHash);
        assert_eq!(first, second);

        let digest = first.native_id.strip_prefix("hash_").unwrap();
        assert_eq!(digest.len(), 12);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_hash_matches_md5_of_joined_fields() {
        let expected = format!("{:x}", md5::compute("untitled_unknown_".as_bytes()));
        assert_eq!(content_hash(None, &[], None), expected[..12]);
    }

    #[test]
    fn test_content_hash_depends_on_first_author_only() {
        let one = vec!["Ada Lovelace".to_string()];
        let two = vec!["Ada Lovelace".to_string(), "Charles Babbage".to_string()];
        assert_eq!(
            content_hash(Some("Notes"), &one, Some("1843")),
            content_hash(Some("Notes"), &two, Some("1843"))
        );
        assert_ne!(
            content_hash(Some("Notes"), &one, Some("1843")),
            content_hash(Some("Notes"), &one, Some("1844"))
        );
    }
}
