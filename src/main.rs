//! # docchat CLI
//!
//! The `docchat` binary serves the HTTP API and exposes every document
//! lifecycle operation from the command line.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and run schema migrations |
//! | `docchat serve` | Start the HTTP server |
//! | `docchat token <user>` | Print a bearer token for a user |
//! | `docchat profile <user>` | Show or update a user's age and interests |
//! | `docchat ingest <file> --user <u>` | Extract a PDF and store it |
//! | `docchat list --user <u>` | List a user's documents |
//! | `docchat show <id> --user <u>` | Print a document |
//! | `docchat summarize <id> --user <u>` | Summarize once, then reuse the stored summary |
//! | `docchat ask <id> "<question>" --user <u>` | Ask about a document |
//! | `docchat history <id> --user <u>` | Print the chat log |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{commands, config, migrate, server};

/// docchat: summarize PDFs once and chat with their text.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat: upload PDFs, summarize them once, and ask questions about their text",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print a signed bearer token for a user.
    ///
    /// The signing secret is read from the environment variable named by
    /// `[auth].secret_env`.
    Token {
        /// User id to embed in the token.
        user: String,
    },

    /// Show or update a user's personalization profile.
    ///
    /// With no flags, prints the stored profile.
    Profile {
        user: String,

        #[arg(long)]
        age: Option<u32>,

        /// Interest to personalize summaries with. Repeatable.
        #[arg(long = "interest")]
        interests: Vec<String>,
    },

    /// Extract a PDF and store it for a user.
    Ingest {
        /// Path to the PDF file.
        path: PathBuf,

        #[arg(long)]
        user: String,
    },

    /// List a user's documents in upload order.
    List {
        #[arg(long)]
        user: String,

        /// Only documents that already have a summary.
        #[arg(long)]
        summarized: bool,
    },

    /// Print a document's metadata, summary, and text.
    Show {
        id: String,

        #[arg(long)]
        user: String,
    },

    /// Summarize a document. Later calls return the stored summary.
    Summarize {
        id: String,

        #[arg(long)]
        user: String,
    },

    /// Ask a question about a document and record the exchange.
    Ask {
        id: String,

        question: String,

        #[arg(long)]
        user: String,
    },

    /// Print a document's chat log.
    History {
        id: String,

        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Token { user } => {
            commands::run_token(&cfg, &user)?;
        }
        Commands::Profile {
            user,
            age,
            interests,
        } => {
            commands::run_profile(&cfg, &user, age, interests).await?;
        }
        Commands::Ingest { path, user } => {
            commands::run_ingest(&cfg, &user, &path).await?;
        }
        Commands::List { user, summarized } => {
            commands::run_list(&cfg, &user, summarized).await?;
        }
        Commands::Show { id, user } => {
            commands::run_show(&cfg, &user, &id).await?;
        }
        Commands::Summarize { id, user } => {
            commands::run_summarize(&cfg, &user, &id).await?;
        }
        Commands::Ask { id, question, user } => {
            commands::run_ask(&cfg, &user, &id, &question).await?;
        }
        Commands::History { id, user } => {
            commands::run_history(&cfg, &user, &id).await?;
        }
    }

    Ok(())
}
