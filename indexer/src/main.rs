use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use threadseek_core::persist::{load_index, load_meta, save_index, IndexPaths};
use threadseek_core::{Config, Index, QueryEngine, QueryOptions};
use tracing_subscriber::{EnvFilter, fmt};

mod corpus;

use corpus::JsonCorpus;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the forum thread retrieval index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON configuration file
        #[arg(long)]
        config: Option<String>,
        /// Maximum vocabulary size
        #[arg(long)]
        max_terms: Option<usize>,
        /// Skip records whose text is shorter than this many characters
        #[arg(long)]
        min_text_chars: Option<usize>,
        /// Index "title + text" instead of the text alone
        #[arg(long, default_value_t = false)]
        index_title: bool,
    },
    /// Answer a query against a built index and print the JSON response
    Query {
        #[arg(long)]
        index: String,
        #[arg(long)]
        q: String,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        min_confidence: Option<f32>,
        #[arg(long)]
        config: Option<String>,
    },
    /// Print index metadata and statistics
    Inspect {
        #[arg(long)]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, max_terms, min_text_chars, index_title } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(n) = max_terms { config.vocabulary.max_terms = n; }
            if let Some(n) = min_text_chars { config.corpus.min_text_chars = n; }
            if index_title { config.corpus.index_title = true; }
            build_index(&input, &output, &config)
        }
        Commands::Query { index, q, k, min_confidence, config } => {
            let config = load_config(config.as_deref())?;
            query_index(&index, &q, QueryOptions { k, min_confidence }, config)
        }
        Commands::Inspect { index } => inspect_index(&index),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(p) => Config::from_json_file(p).with_context(|| format!("loading config {p}"))?,
        None => Config::default(),
    };
    Ok(config)
}

fn build_index(input: &str, output: &str, config: &Config) -> Result<()> {
    config.validate()?;
    let corpus = JsonCorpus::new(input);
    let index = Index::from_provider(&corpus, config).with_context(|| format!("building index from {input}"))?;
    let meta = save_index(&IndexPaths::new(output), &index)?;
    tracing::info!(output, num_docs = meta.num_docs, num_terms = meta.num_terms, "index build complete");
    Ok(())
}

fn query_index(dir: &str, q: &str, options: QueryOptions, config: Config) -> Result<()> {
    let index = load_index(&IndexPaths::new(dir)).with_context(|| format!("loading index from {dir}"))?;
    let engine = QueryEngine::with_index(config, index)?;
    let response = engine.respond(q, options)?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn inspect_index(dir: &str) -> Result<()> {
    let paths = IndexPaths::new(dir);
    let meta = load_meta(&paths)?;
    let index = load_index(&paths)?;
    let out = serde_json::json!({ "meta": meta, "stats": index.stats() });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
