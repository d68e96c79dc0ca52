//! `mentor`: find catalog solutions similar to a code snippet.

mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mentor_retrieval::config::default_catalog_path;
use mentor_retrieval::{EmbeddingProviderType, PatternCatalog, PatternSearch, RetrievalConfig};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Catalog used when running from a checkout of this repository.
const LOCAL_CATALOG: &str = "data/patterns/algorithm_patterns.json";

#[derive(Debug, Parser)]
#[command(name = "mentor", version, about = "Find known solutions similar to your code")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pattern catalog (JSON array of records).
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Embedding provider, overriding the configuration.
    #[arg(long, global = true, value_enum)]
    provider: Option<ProviderArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank catalog patterns by similarity to a snippet.
    Similar {
        /// File holding the snippet, or `-` for stdin.
        input: PathBuf,

        /// Number of matches (defaults to the configured value).
        #[arg(short, long)]
        k: Option<usize>,

        /// Print matches as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate and index the catalog, then print a summary.
    Catalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    /// OpenAI-compatible embeddings API.
    Openai,
    /// Offline feature hashing.
    Hash,
}

impl From<ProviderArg> for EmbeddingProviderType {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openai => Self::OpenAI,
            ProviderArg::Hash => Self::Hash,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli).await?;
    debug!("Resolved configuration: {config:?}");

    match cli.command {
        Command::Similar { input, k, json } => {
            let snippet = read_snippet(&input).await?;
            let engine = start_engine(config).await?;

            let k = k.unwrap_or(engine.config().query.default_k);
            let results = engine
                .find_similar(&snippet, k)
                .await
                .context("similarity search failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print!("{}", render::matches(&results));
            }
        }
        Command::Catalog => {
            print!("{}", catalog_summary(config).await?);
        }
    }

    Ok(())
}

/// Build the configuration from the file (if any) and command-line overrides.
async fn resolve_config(cli: &Cli) -> Result<RetrievalConfig> {
    let mut config = match &cli.config {
        Some(path) => RetrievalConfig::from_toml_file(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RetrievalConfig::default(),
    };

    if let Some(catalog) = &cli.catalog {
        config.catalog_path = Some(catalog.clone());
    } else if config.catalog_path.is_none() {
        config.catalog_path = Some(fallback_catalog_path());
    }

    if let Some(provider) = cli.provider {
        config.embedding.provider = provider.into();
    }

    Ok(config)
}

fn fallback_catalog_path() -> PathBuf {
    let local = Path::new(LOCAL_CATALOG);
    if local.exists() {
        local.to_path_buf()
    } else {
        default_catalog_path()
    }
}

async fn start_engine(config: RetrievalConfig) -> Result<PatternSearch> {
    let engine = PatternSearch::new(config)
        .await
        .context("failed to initialize embedding provider")?;
    let count = engine
        .warm_up()
        .await
        .context("failed to build the similarity index")?;
    info!("Similarity index ready with {count} patterns");
    Ok(engine)
}

/// Parse the configured catalog once, index it and render a summary.
async fn catalog_summary(config: RetrievalConfig) -> Result<String> {
    let path = config
        .catalog_path
        .clone()
        .context("no catalog configured")?;
    let catalog = PatternCatalog::from_json_file(&path)
        .await
        .with_context(|| format!("invalid catalog {}", path.display()))?;

    let engine = PatternSearch::new(config)
        .await
        .context("failed to initialize embedding provider")?;
    engine
        .load_catalog(catalog.clone())
        .await
        .context("failed to build the similarity index")?;

    Ok(render::catalog(&catalog, &engine.stats().await))
}

async fn read_snippet(input: &Path) -> Result<String> {
    let snippet = if input == Path::new("-") {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .context("failed to read snippet from stdin")?;
        buffer
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("failed to read {}", input.display()))?
    };

    anyhow::ensure!(!snippet.trim().is_empty(), "snippet is empty");
    Ok(snippet)
}
