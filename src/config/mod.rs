//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `PAPER_AGGREGATOR_*` environment variables (nested keys use `__`, e.g.
//! `PAPER_AGGREGATOR_SEARCH__STRICT_ERRORS=true`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "paper-aggregator.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PAPER_AGGREGATOR";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Upstream base URLs
    #[serde(default)]
    pub endpoints: Endpoints,

    /// Search defaults and error policy
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Render as TOML, e.g. to seed a config file
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Default per-request deadline
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Base URLs of the upstream services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_arxiv")]
    pub arxiv: String,

    #[serde(default = "default_pubmed_esearch")]
    pub pubmed_esearch: String,

    #[serde(default = "default_pubmed_efetch")]
    pub pubmed_efetch: String,

    /// Graph API root, without a trailing slash
    #[serde(default = "default_semantic_scholar")]
    pub semantic_scholar: String,

    #[serde(default = "default_google_scholar")]
    pub google_scholar: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            arxiv: default_arxiv(),
            pubmed_esearch: default_pubmed_esearch(),
            pubmed_efetch: default_pubmed_efetch(),
            semantic_scholar: default_semantic_scholar(),
            google_scholar: default_google_scholar(),
        }
    }
}

fn default_arxiv() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_pubmed_esearch() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi".to_string()
}

fn default_pubmed_efetch() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi".to_string()
}

fn default_semantic_scholar() -> String {
    "https://api.semanticscholar.org/graph/v1".to_string()
}

fn default_google_scholar() -> String {
    "https://scholar.google.com".to_string()
}

/// Search defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results requested when the caller does not pass a limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Results per page in listings
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// arXiv searches are slower than other calls and get their own deadline
    #[serde(default = "default_arxiv_timeout_secs")]
    pub arxiv_timeout_secs: u64,

    /// Surface every source failure instead of degrading to empty results
    #[serde(default)]
    pub strict_errors: bool,
}

impl SearchConfig {
    pub fn arxiv_timeout(&self) -> Duration {
        Duration::from_secs(self.arxiv_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            page_size: default_page_size(),
            arxiv_timeout_secs: default_arxiv_timeout_secs(),
            strict_errors: false,
        }
    }
}

fn default_limit() -> usize {
    crate::models::DEFAULT_LIMIT
}

fn default_page_size() -> usize {
    18
}

fn default_arxiv_timeout_secs() -> u64 {
    38
}

/// Load configuration from an optional file plus the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Locate a config file: working directory first, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("paper-aggregator").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.search.arxiv_timeout(), Duration::from_secs(38));
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.search.page_size, 18);
        assert!(!config.search.strict_errors);
        assert!(config.endpoints.arxiv.ends_with("/api/query"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[search]
strict_errors = true
page_size = 5

[endpoints]
arxiv = "http://localhost:9999/api/query"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert!(config.search.strict_errors);
        assert_eq!(config.search.page_size, 5);
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.endpoints.arxiv, "http://localhost:9999/api/query");
        assert_eq!(config.endpoints.pubmed_efetch, default_pubmed_efetch());
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[search]"));

        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
