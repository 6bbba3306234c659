//! # Study Harness CLI (`study`)
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study init` | Create the SQLite database and run schema migrations |
//! | `study serve` | Start the study assistant HTTP server |
//! | `study inspect <path-or-url>` | Normalize and chunk a source without loading it |
//! | `study history --user <id>` | List a user's recent answers and quizzes |
//!
//! ## Examples
//!
//! ```bash
//! # Check how a PDF will be chunked, and which chunks a question selects
//! study inspect ./notes/lab-manual.pdf --ask "What is experiment 3 about?"
//!
//! # Preview a web page
//! study inspect https://en.wikipedia.org/wiki/Photosynthesis
//!
//! # Serve the API
//! GEMINI_API_KEY=... study serve --config ./config/study.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use study_harness::config;
use study_harness::history::CreationLog;
use study_harness::normalize::{Normalizer, SourceRequest};
use study_harness::transcript::is_youtube_url;
use study_harness::{db, migrate, server};
use study_harness_core::chunk::chunk_text;
use study_harness_core::select::{classify_query, select_context, QueryClass};

/// Study Harness: load study material, then ask questions or generate quizzes.
#[derive(Parser)]
#[command(
    name = "study",
    about = "Study Harness: study material ingestion and retrieval for an AI study assistant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/study.toml`. Every setting has a default, so
    /// the file may be empty.
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the creation-history table.
    /// Safe to run repeatedly.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Normalize and chunk a local file or a URL, and print what was found.
    ///
    /// YouTube URLs are read as transcripts; other URLs as web pages.
    /// Nothing is stored and the generator is never called.
    Inspect {
        /// Path to a .pdf/.doc/.docx/.txt file, or an http(s) URL.
        source: String,

        /// Show which chunks this question would select.
        #[arg(long)]
        ask: Option<String>,
    },

    /// List a user's recent study answers and quizzes.
    History {
        #[arg(long)]
        user: String,

        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Inspect { source, ask } => {
            run_inspect(&cfg, &source, ask.as_deref()).await?;
        }
        Commands::History { user, limit } => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            let creations = CreationLog::new(pool).recent(&user, limit).await?;
            if creations.is_empty() {
                println!("No creations for {}.", user);
            }
            for c in creations {
                println!(
                    "{}  {:<10}  {}",
                    c.created_at.format("%Y-%m-%d %H:%M:%S"),
                    c.kind,
                    c.prompt
                );
            }
        }
    }

    Ok(())
}

async fn run_inspect(cfg: &config::Config, source: &str, ask: Option<&str>) -> anyhow::Result<()> {
    let normalizer = Normalizer::from_config(cfg)?;
    let is_url = source.starts_with("http://") || source.starts_with("https://");

    let doc = if !is_url {
        normalizer
            .normalize_local_file(std::path::Path::new(source))
            .await?
    } else if is_youtube_url(source) {
        normalizer
            .normalize(SourceRequest::Video {
                url: source.to_string(),
            })
            .await?
    } else {
        normalizer
            .normalize(SourceRequest::WebPage {
                url: source.to_string(),
            })
            .await?
    };

    let chunks = chunk_text(&doc.text, cfg.study.max_chunk_size);
    println!("source:  {}", doc.source_label);
    println!("kind:    {}", doc.kind.as_str());
    println!("length:  {} chars", doc.length);
    println!("chunks:  {}", chunks.len());
    for chunk in &chunks {
        println!("  [{}] {} chars", chunk.index, chunk.text.chars().count());
    }

    if let Some(question) = ask {
        let class = match classify_query(question) {
            QueryClass::Locator { section, number } => format!("locator ({:?} {})", section, number),
            QueryClass::General => "general".to_string(),
        };
        let selection = select_context(question, &chunks, &cfg.selection_params());
        println!();
        println!("question: {}", question.trim());
        println!("class:    {}", class);
        println!("strategy: {}", selection.strategy.as_str());
        println!("selected: {:?}", selection.chunk_indices);
        for s in &selection.top_scores {
            println!("  chunk {} score {:.1}", s.index, s.score);
        }
        println!("context:  {} chars", selection.context.chars().count());
    }

    Ok(())
}
