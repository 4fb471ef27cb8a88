use clap::{Parser, Subcommand};
use clap_complete::Shell;
use docvector_cli::commands::{completions, ingest, interactive, reconcile, search, source};
use docvector_cli::AppContext;
use docvector_common::config::DocVectorConfig;

#[derive(Parser)]
#[command(name = "docvector")]
#[command(about = "Self-hosted documentation search for AI agents")]
struct Cli {
    /// Path to a docvector.toml config file; missing file falls back to defaults.
    #[arg(long, default_value = "docvector.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage documentation sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },
    /// Crawl a source's start URL and ingest its pages.
    Ingest {
        source: String,
        #[arg(long, default_value_t = 1000)]
        max_pages: u32,
        #[arg(long, default_value_t = 3)]
        max_depth: u32,
    },
    /// Run a search query against the index.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        no_rerank: bool,
    },
    /// Delete orphan vectors and requeue stale documents.
    Reconcile {
        #[arg(long, default_value_t = 60)]
        stale_after_mins: i64,
    },
    /// Enter a REPL for running repeated search queries.
    Interactive,
    /// Print a shell-completion script for the given shell.
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a new web source.
    Create { name: String, start_url: String },
    /// List known sources.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    docvector_common::init_tracing();

    let cli = Cli::parse();

    let shell = match &cli.command {
        Commands::Completions { shell } => Some(*shell),
        _ => None,
    };
    if let Some(shell) = shell {
        completions::generate(shell);
        return Ok(());
    }

    let config = DocVectorConfig::load(&cli.config)?;
    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Commands::Source { action } => match action {
            SourceAction::Create { name, start_url } => source::create(&ctx, name, start_url).await?,
            SourceAction::List => source::list(&ctx).await?,
        },
        Commands::Ingest { source, max_pages, max_depth } => {
            ingest::run(&ctx, source, max_pages, max_depth).await?
        }
        Commands::Search { query, limit, no_rerank } => search::run(&ctx, query, limit, no_rerank).await?,
        Commands::Reconcile { stale_after_mins } => reconcile::run(&ctx, stale_after_mins).await?,
        Commands::Interactive => interactive::run(&ctx).await?,
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
