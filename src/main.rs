//! # Cricket Q&A CLI (`cricq`)
//!
//! ## Usage
//!
//! ```bash
//! cricq --config ./config/cricq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cricq init` | Create the SQLite database and run schema migrations |
//! | `cricq seed <file>` | Load players from a JSON export |
//! | `cricq ask "<question>" --user <id>` | Answer a question |
//! | `cricq history --user <id>` | Show stored turns |
//! | `cricq summary --user <id>` | Show the running summary |
//! | `cricq clear --user <id>` | Forget a user's turns and summary |
//! | `cricq stats` | Show database statistics |
//! | `cricq serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! cricq init
//! cricq seed ./data/players.json
//! cricq ask "top 5 run scorers in ODIs" --user alice
//! cricq ask "babar azam t20" --user alice --json
//! cricq serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cricket_qa::config;
use cricket_qa::migrate;
use cricket_qa::output::{print_answer, print_history, print_summary};
use cricket_qa::pipeline::QaService;
use cricket_qa::seed;
use cricket_qa::server;
use cricket_qa::stats;

/// Cricket Q&A: ask questions about cricket batting statistics.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cricq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cricq",
    about = "Cricket Q&A: natural-language questions over cricket batting statistics",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cricq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Load players from a JSON array export.
    Seed {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Answer a question.
    Ask {
        /// The question, e.g. "top scorers in tests".
        question: String,

        /// User whose conversation memory is used.
        #[arg(long)]
        user: String,

        /// Print the full JSON response, including the trace.
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent turns for a user, oldest first.
    History {
        #[arg(long)]
        user: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the running summary for a user.
    Summary {
        #[arg(long)]
        user: String,
    },

    /// Delete all turns and the summary for a user.
    Clear {
        #[arg(long)]
        user: String,
    },

    /// Show player and memory counts.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Seed { file } => {
            seed::run_seed(&cfg, &file).await?;
        }
        Commands::Ask {
            question,
            user,
            json,
        } => {
            if let Err(msg) = server::validate_question(&question, &user) {
                anyhow::bail!(msg);
            }
            let service = QaService::open(&cfg).await?;
            let response = service.ask(question.trim(), user.trim()).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_answer(&response);
            }
        }
        Commands::History { user, limit } => {
            let service = QaService::open(&cfg).await?;
            let turns = service.memory().history(&user, limit.max(1)).await?;
            print_history(&user, &turns);
        }
        Commands::Summary { user } => {
            let service = QaService::open(&cfg).await?;
            let summary = service.memory().summary(&user).await?;
            print_summary(&user, summary.as_ref());
        }
        Commands::Clear { user } => {
            let service = QaService::open(&cfg).await?;
            service.memory().clear(&user).await?;
            println!("Cleared conversation memory for {}", user);
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
