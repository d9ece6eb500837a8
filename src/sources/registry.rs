//! Registry for managing source adapters.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Source, SourceError};
use crate::config::Config;
use crate::models::SourceType;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        /// Single-record lookup by native id
        const DETAIL = 1 << 1;
        /// Author filter applied upstream or inside the adapter
        const AUTHOR_FILTER = 1 << 2;
        /// Year filter applied upstream or inside the adapter
        const YEAR_FILTER = 1 << 3;
    }
}

impl SourceCapabilities {
    /// Short labels for display
    pub fn labels(&self) -> Vec<&'static str> {
        self.iter_names()
            .map(|(name, _)| match name {
                "SEARCH" => "search",
                "DETAIL" => "detail",
                "AUTHOR_FILTER" => "author filter",
                "YEAR_FILTER" => "year filter",
                _ => "other",
            })
            .collect()
    }
}

/// Registry for all available sources
///
/// Adapters are keyed by [`SourceType`] and iterate in display order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<SourceType, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// A registry with nothing registered
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build every compiled-in adapter around one shared HTTP client
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let mut registry = Self::empty();

        #[cfg(any(
            feature = "arxiv",
            feature = "pubmed",
            feature = "semantic",
            feature = "google_scholar"
        ))]
        {
            let client = Arc::new(crate::utils::HttpClient::new(&config.http)?);

            #[cfg(feature = "arxiv")]
            registry.register(Arc::new(super::ArxivSource::from_config(
                Arc::clone(&client),
                config,
            )));
            #[cfg(feature = "pubmed")]
            registry.register(Arc::new(super::PubMedSource::from_config(
                Arc::clone(&client),
                config,
            )));
            #[cfg(feature = "semantic")]
            registry.register(Arc::new(super::SemanticScholarSource::from_config(
                Arc::clone(&client),
                config,
            )));
            #[cfg(feature = "google_scholar")]
            registry.register(Arc::new(super::GoogleScholarSource::from_config(
                Arc::clone(&client),
                config,
            )));
        }

        #[cfg(not(any(
            feature = "arxiv",
            feature = "pubmed",
            feature = "semantic",
            feature = "google_scholar"
        )))]
        let _ = config;

        tracing::debug!(sources = registry.len(), "Source registry built");
        Ok(registry)
    }

    /// Register a source, replacing any adapter of the same kind
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.kind(), source);
    }

    /// Get a source by kind
    pub fn get(&self, kind: SourceType) -> Option<&Arc<dyn Source>> {
        self.sources.get(&kind)
    }

    /// Get a source by kind, returning an error if it is not compiled in
    pub fn get_required(&self, kind: SourceType) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(kind)
            .ok_or_else(|| SourceError::UnsupportedSource(kind.id().to_string()))
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.values()
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    #[test]
    fn test_registry_from_default_config() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();

        assert_eq!(registry.len(), 4);
        let ids: Vec<&str> = registry.all().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            ["arxiv", "pubmed", "semantic_scholar", "google_scholar"]
        );
    }

    #[test]
    fn test_capabilities() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();

        let semantic = registry.get(SourceType::SemanticScholar).unwrap();
        assert!(semantic.capabilities().contains(SourceCapabilities::YEAR_FILTER));
        assert!(semantic.capabilities().contains(SourceCapabilities::AUTHOR_FILTER));

        assert_eq!(registry.with_capability(SourceCapabilities::DETAIL).len(), 4);
        assert_eq!(
            registry.with_capability(SourceCapabilities::AUTHOR_FILTER).len(),
            4
        );
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut registry = SourceRegistry::empty();
        registry.register(Arc::new(MockSource::new(SourceType::PubMed)));
        registry.register(Arc::new(MockSource::new(SourceType::PubMed)));
        assert_eq!(registry.len(), 1);

        assert!(matches!(
            registry.get_required(SourceType::Arxiv),
            Err(SourceError::UnsupportedSource(id)) if id == "arxiv"
        ));
    }

    #[test]
    fn test_capability_labels() {
        let caps = SourceCapabilities::SEARCH | SourceCapabilities::YEAR_FILTER;
        assert_eq!(caps.labels(), ["search", "year filter"]);
    }
}
