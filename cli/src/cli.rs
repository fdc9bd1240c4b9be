use std::env;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::MaragConfig;
use crate::{app, repl};

#[derive(Debug, Parser)]
#[command(name = "marag", about = "Multi-agent question answering over the web and your documents")]
pub struct Cli {
    /// Config file; defaults to `$CONFIG_DIR/marag/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log progress at info level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer questions; interactive unless --question is given
    Ask(AskArgs),
    /// Index markdown or text files, one corpus per file
    Index(IndexArgs),
    /// Search an indexed corpus
    Search(SearchArgs),
}

#[derive(Debug, Args, Clone, Default)]
struct AskArgs {
    /// Answer this question and exit.
    #[arg(long, short)]
    question: Option<String>,
}

#[derive(Debug, Args, Clone)]
struct IndexArgs {
    /// Files or directories to index.
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
struct SearchArgs {
    /// Corpus id: the indexed file name without extension.
    corpus_id: String,

    #[arg(value_name = "QUERY", required = true)]
    query: Vec<String>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        init_tracing(self.verbose);
        let config = MaragConfig::load(self.config.as_deref())?;

        match self.command.unwrap_or(Command::Ask(AskArgs::default())) {
            Command::Ask(args) => match args.question {
                Some(question) => repl::ask_once(&config, &question).await,
                None => repl::run_session(&config).await,
            },
            Command::Index(args) => index(&config, &args.paths).await,
            Command::Search(args) => search(&config, &args.corpus_id, &args.query.join(" ")).await,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = match env::var("RUST_LOG") {
        Ok(directives) if !verbose => EnvFilter::new(directives),
        _ => EnvFilter::new(default),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn index(config: &MaragConfig, paths: &[PathBuf]) -> anyhow::Result<()> {
    let indexer = app::indexer(config);
    for path in paths {
        for report in indexer.index_path(path).await? {
            println!(
                "Indexed {} as corpus '{}' ({} chunks) in {}",
                report.source_id,
                report.corpus_id,
                report.chunks,
                report.directory.display()
            );
        }
    }
    Ok(())
}

async fn search(config: &MaragConfig, corpus_id: &str, query: &str) -> anyhow::Result<()> {
    let llm = app::llm_client(config)?;
    let pipeline = app::query_pipeline(
        config,
        app::index_cache(config),
        app::reranker(config),
        llm,
    );
    let results = pipeline.search(corpus_id, query).await?;
    if results.is_empty() {
        println!("No results.");
    }
    for (i, scored) in results.iter().enumerate() {
        let candidate = &scored.candidate;
        println!(
            "[{}] {} ({}) relevance={:.3}\n{}\n",
            i + 1,
            candidate.chunk_id,
            candidate.source_id,
            scored.relevance,
            candidate.render()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_invocation_asks() {
        let cli = Cli::parse_from(["marag"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_search_joins_query_words() {
        let cli = Cli::parse_from(["marag", "--verbose", "search", "report", "annual", "revenue"]);
        assert!(cli.verbose);
        match cli.command {
            Some(Command::Search(args)) => {
                assert_eq!(args.corpus_id, "report");
                assert_eq!(args.query.join(" "), "annual revenue");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_index_requires_a_path() {
        assert!(Cli::try_parse_from(["marag", "index"]).is_err());
    }
}
