//! # mentor
//!
//! A journaling mentor that remembers what you wrote.
//!
//! Requires: `OPENAI_API_KEY` (read from the environment or a `.env` file).
//!
//! ```text
//! mentor ingest journal/2024-07.txt journal/2024-08.txt
//! mentor ask "What was I worried about in July?"
//! mentor chat
//! mentor stats
//! ```

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mentor_memory::openai::{OpenAIChatProvider, OpenAIEmbeddingProvider};
use mentor_memory::{MemoryConfig, MemoryEngine, NewDocument};
use tracing::info;

#[derive(Parser)]
#[command(name = "mentor")]
#[command(version)]
#[command(about = "A journaling mentor with long-term retrieval memory")]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the memory snapshots and transcripts
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Number of parent documents retrieved per question
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    top_k: Option<u16>,

    /// Language every answer is written in
    #[arg(long, global = true)]
    language: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, env = "MENTOR_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add plain-text files to the memory
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Value of the `type` metadata tag
        #[arg(long = "type", default_value = "journal")]
        kind: String,
    },
    /// Ask a single question
    Ask {
        /// The question
        question: String,
    },
    /// Start an interactive conversation
    Chat,
    /// Print memory sizes
    Stats,
}

impl Cli {
    fn memory_config(&self) -> anyhow::Result<MemoryConfig> {
        let mut config = MemoryConfig::from_env().context("invalid MENTOR_* configuration")?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(top_k) = self.top_k {
            config.top_k = usize::from(top_k);
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        Ok(config)
    }
}

async fn open_engine(config: MemoryConfig) -> anyhow::Result<MemoryEngine> {
    let embedder = OpenAIEmbeddingProvider::from_env().context("embedding provider")?;
    let chat = OpenAIChatProvider::from_env().context("chat provider")?;

    let engine = MemoryEngine::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .generation_provider(Arc::new(chat))
        .open()
        .await?;
    Ok(engine)
}

async fn ingest(engine: &MemoryEngine, files: &[PathBuf], kind: &str) -> anyhow::Result<()> {
    let date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        documents.push(
            NewDocument::new(text)
                .with_metadata("source", path.display().to_string())
                .with_metadata("date", date.clone())
                .with_metadata("type", kind),
        );
    }

    let report = engine.ingest(&documents).await?;
    println!(
        "Ingested {} file(s): {} parent documents, {} chunks.",
        files.len(),
        report.parent_ids.len(),
        report.child_count
    );
    info!(
        files = files.len(),
        parents = report.parent_ids.len(),
        chunks = report.child_count,
        evicted = report.evicted.len(),
        "ingest command finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    mentor_telemetry::init_telemetry("mentor", cli.json_logs)?;

    let config = cli.memory_config()?;
    let engine = open_engine(config).await?;

    match &cli.command {
        Commands::Ingest { files, kind } => ingest(&engine, files, kind).await?,
        Commands::Ask { question } => {
            let mut session = engine.new_session();
            let answer = engine.ask(&mut session, question).await?;
            info!(
                sources = answer.sources.len(),
                standalone_query = %answer.standalone_query,
                degraded = answer.verdict.is_degraded(),
                "ask command finished"
            );
            println!("{}", answer.text);
        }
        Commands::Chat => console::run_console(&engine).await?,
        Commands::Stats => {
            let stats = engine.stats().await;
            println!("parent documents: {}", stats.parents);
            println!("index entries:    {}", stats.index_entries);
            match stats.dimensions {
                Some(dims) => println!("dimensions:       {dims}"),
                None => println!("dimensions:       (not established)"),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "mentor",
            "--data-dir",
            "/tmp/mentor",
            "--top-k",
            "2",
            "--language",
            "English",
            "stats",
        ]);
        let config = cli.memory_config().unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/mentor"));
        assert_eq!(config.top_k, 2);
        assert_eq!(config.language, "English");
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(Cli::try_parse_from(["mentor", "--top-k", "0", "stats"]).is_err());
    }
}
