use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use paper_aggregator::config::{find_config_file, load_config};
use paper_aggregator::models::{CanonicalPaper, Page, SearchQuery, SearchResponse};
use paper_aggregator::Aggregator;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Paper Aggregator - Search academic papers across arXiv, PubMed, Semantic Scholar and Google Scholar
#[derive(Parser, Debug)]
#[command(name = "paper-aggregator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search academic papers across arXiv, PubMed, Semantic Scholar and Google Scholar", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Default request timeout in seconds (overrides the config file)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search one source for papers
    #[command(alias = "s")]
    Search {
        /// Search query string
        query: String,

        /// Source key: arxiv, pubmed, semantic_scholar or google_scholar
        #[arg(long, short, default_value = "arxiv")]
        source: String,

        /// Author filter
        #[arg(long, short)]
        author: Option<String>,

        /// Publication year filter (e.g., "2020")
        #[arg(long, short)]
        year: Option<String>,

        /// Maximum number of results (default from config)
        #[arg(long, short)]
        limit: Option<usize>,

        /// Result page to show
        #[arg(long, short, default_value_t = 1)]
        page: usize,
    },

    /// Show a single paper by canonical id, e.g. "pubmed:12345"
    Show {
        /// Canonical id; ids without a prefix are read as arXiv ids
        id: String,
    },

    /// List supported sources and their capabilities
    Sources,

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli);

    // Load configuration from file if specified or found in default locations
    let config_path = cli.config.clone().or_else(find_config_file);
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }
    let mut config = load_config(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(timeout) = cli.timeout {
        config.http.timeout_secs = timeout;
    }

    let format = resolve_format(cli.output);

    match cli.command {
        Some(Commands::Search {
            query,
            source,
            author,
            year,
            limit,
            page,
        }) => {
            let aggregator = Aggregator::from_config(&config)?;

            let mut search_query = SearchQuery::new(query)
                .max_results(limit.unwrap_or(config.search.default_limit));
            if let Some(author) = author {
                search_query = search_query.author(author);
            }
            if let Some(year) = year {
                search_query = search_query.year(year);
            }

            let response = aggregator.search(&source, search_query).await?;
            if let Some(reason) = &response.degraded {
                eprintln!("Warning: {} returned no results: {}", response.source, reason);
            }

            let page = response.page(page, config.search.page_size);
            output_page(&response, &page, format)?;

            if !cli.quiet && format != OutputFormat::Json {
                eprintln!(
                    "Page {} of {} ({} results from {})",
                    page.number,
                    page.num_pages,
                    response.total_results(),
                    response.source
                );
            }
        }

        Some(Commands::Show { id }) => {
            let aggregator = Aggregator::from_config(&config)?;

            match aggregator.fetch_detail(&id).await? {
                Some(paper) => output_paper(&paper, format)?,
                None => bail!("Paper not found: {}", id),
            }
        }

        Some(Commands::Sources) => {
            let aggregator = Aggregator::from_config(&config)?;

            for src in aggregator.registry().all() {
                if format == OutputFormat::Json {
                    let entry = serde_json::json!({
                        "id": src.id(),
                        "name": src.name(),
                        "capabilities": src.capabilities().labels(),
                    });
                    println!("{}", entry);
                } else {
                    println!(
                        "{:<18} {:<18} {}",
                        src.id(),
                        src.name(),
                        src.capabilities().labels().join(", ")
                    );
                }
            }
        }

        Some(Commands::Config) => {
            print!("{}", config.to_toml()?);
        }

        None => {
            eprintln!("No command specified. Use --help for usage information.");
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("paper_aggregator={}", env_filter)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn output_page(response: &SearchResponse, page: &Page<'_>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "source": response.source,
                "query": response.query,
                "total_results": response.total_results(),
                "page": page.number,
                "num_pages": page.num_pages,
                "degraded": response.degraded,
                "papers": page.papers,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Plain => {
            for paper in page.papers {
                println!("{} - {} ({})", paper.title, paper.author_line(), paper.source);
                println!("  ID: {}", paper.id);
                if let Some(ref url) = paper.url {
                    println!("  URL: {}", url);
                }
                if let Some(ref pdf_url) = paper.pdf_url {
                    println!("  PDF: {}", pdf_url);
                }
                println!();
            }
        }
        OutputFormat::Table | OutputFormat::Auto => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Title", "Authors", "Year"]);

            for paper in page.papers {
                table.add_row(vec![
                    Cell::new(&paper.id),
                    Cell::new(truncate(&paper.title, 50)).add_attribute(Attribute::Bold),
                    Cell::new(truncate(&paper.author_line(), 30)),
                    Cell::new(paper.year.as_deref().unwrap_or("Unknown")),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

fn output_paper(paper: &CanonicalPaper, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(paper)?);
        return Ok(());
    }

    let mut fields: Vec<(&str, String)> = vec![
        ("ID", paper.id.clone()),
        ("Title", paper.title.clone()),
        ("Authors", paper.author_line()),
        ("Source", paper.source.to_string()),
    ];
    let optional = [
        ("Published", &paper.published),
        ("Updated", &paper.updated),
        ("Year", &paper.year),
        ("Journal", &paper.journal),
        ("Venue", &paper.venue),
        ("DOI", &paper.doi),
        ("PMID", &paper.pmid),
        ("URL", &paper.url),
        ("PDF", &paper.pdf_url),
        ("Cited by", &paper.citedby_url),
        ("Related", &paper.related_articles_url),
        ("Full text", &paper.full_text_url),
    ];
    fields.extend(
        optional
            .into_iter()
            .filter_map(|(label, value)| value.clone().map(|v| (label, v))),
    );
    if let Some(count) = paper.citation_count {
        fields.push(("Citations", count.to_string()));
    }
    if !paper.categories.is_empty() {
        fields.push(("Categories", paper.categories.join(", ")));
    }

    if format == OutputFormat::Plain {
        for (label, value) in &fields {
            println!("{}: {}", label, value);
        }
        println!("\n{}", paper.r#abstract);
    } else {
        use comfy_table::{Attribute, Cell, Table};
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        for (label, value) in fields {
            table.add_row(vec![Cell::new(label).add_attribute(Attribute::Bold), Cell::new(value)]);
        }
        table.add_row(vec![
            Cell::new("Abstract").add_attribute(Attribute::Bold),
            Cell::new(&paper.r#abstract),
        ]);
        println!("{table}");
    }

    Ok(())
}

/// Shorten to `max` characters, marking the cut with "..."
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
