//! CLI entry point for semantic ticket matching (for dev and testing).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use ticketmatch_core::report::{render_table, to_json};
use ticketmatch_core::{
    app_data_dir, load_config, rank, set_snapshot_path, status, Config, Corpus, OllamaEmbedder,
    RankedMatch, TicketMatcher,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ticketmatch")]
#[command(about = "Find resolved support tickets similar to a new one")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where ticketmatch stores its config (app data directory).
    DataDir,
    /// Remember the corpus snapshot to use by default.
    SetSnapshot {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Load a corpus snapshot and print its size and dimension.
    Info {
        /// Snapshot file (defaults to the configured one).
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },
    /// Rank the corpus against a raw query vector (no embedding call).
    Rank {
        /// Comma-separated vector, e.g. "1,0,0.5".
        #[arg(value_name = "VECTOR", allow_hyphen_values = true)]
        vector: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Embed a new ticket with Ollama and list the most similar resolved tickets.
    Match {
        /// Issue line of the new ticket.
        #[arg(long)]
        issue: String,
        /// Description of the new ticket.
        #[arg(long, default_value = "")]
        description: String,
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        top_k: Option<i64>,
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
        /// Ollama base URL.
        #[arg(long)]
        url: Option<String>,
        /// Embedding model name.
        #[arg(long)]
        model: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ticketmatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config();

    match run(cli.command.unwrap_or(Commands::Status), &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

async fn run(command: Commands, config: &Config) -> CliResult {
    match command {
        Commands::Status => {
            println!("ticketmatch backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => return Err("could not determine app data directory".into()),
        },
        Commands::SetSnapshot { path } => {
            // Validate before persisting so a broken snapshot is never configured.
            Corpus::load(&path)?;
            set_snapshot_path(&path)?;
            println!("Snapshot set to {}", path.display());
        }
        Commands::Info { snapshot } => {
            let (path, corpus) = load_corpus(snapshot.as_deref(), config)?;
            println!("{}", path.display());
            println!("  records:   {}", corpus.size());
            match corpus.dimension() {
                Some(d) => println!("  dimension: {d}"),
                None => println!("  dimension: (empty corpus)"),
            }
        }
        Commands::Rank {
            vector,
            top_k,
            snapshot,
            json,
        } => {
            let query = parse_vector(&vector)?;
            let (_, corpus) = load_corpus(snapshot.as_deref(), config)?;
            let matches = rank(&corpus, &query, top_k.unwrap_or_else(|| config.top_k()))?;
            print_matches(&matches, config, json)?;
        }
        Commands::Match {
            issue,
            description,
            top_k,
            snapshot,
            url,
            model,
            json,
        } => {
            let (_, corpus) = load_corpus(snapshot.as_deref(), config)?;
            let embedder = OllamaEmbedder::from_url(url.as_deref().unwrap_or(config.ollama_url()))?
                .with_embed_model(model.as_deref().unwrap_or(config.embed_model()))
                .with_timeout(config.embed_timeout());
            let matcher = TicketMatcher::new(Arc::new(corpus), embedder);
            let top_k = top_k.unwrap_or_else(|| i64::try_from(config.top_k()).unwrap_or(i64::MAX));
            let matches = matcher.find_similar(&issue, &description, top_k).await?;
            print_matches(&matches, config, json)?;
        }
    }
    Ok(())
}

/// Load the snapshot given on the command line, else the configured one.
fn load_corpus(snapshot: Option<&Path>, config: &Config) -> Result<(PathBuf, Corpus), Box<dyn std::error::Error>> {
    let path = match snapshot {
        Some(p) => p.to_path_buf(),
        None => config
            .snapshot_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .ok_or("no snapshot given; pass --snapshot or run `ticketmatch set-snapshot <PATH>`")?,
    };
    let corpus = Corpus::load(&path)?;
    Ok((path, corpus))
}

fn parse_vector(s: &str) -> Result<Vec<f32>, String> {
    s.split(',')
        .map(|x| {
            let x = x.trim();
            match x.parse::<f32>() {
                Ok(v) if v.is_finite() => Ok(v),
                Ok(_) => Err(format!("vector component {x:?} is not a finite number")),
                Err(e) => Err(format!("invalid vector component {x:?}: {e}")),
            }
        })
        .collect()
}

fn print_matches(matches: &[RankedMatch<'_>], config: &Config, json: bool) -> CliResult {
    if json {
        println!("{}", to_json(matches)?);
    } else if matches.is_empty() {
        println!("No matching tickets.");
    } else {
        print!("{}", render_table(matches, &config.hidden_fields()));
    }
    Ok(())
}
