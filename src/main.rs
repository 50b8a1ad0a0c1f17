//! # ThreatScope CLI (`threatscope`)
//!
//! Thin client over the [`threatscope`] library: builds the index, runs
//! queries, and decodes files for analysis. Results go to stdout; progress,
//! diagnostics and the applied mode go to stderr.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `threatscope build` | Rebuild the vector index from the corpus |
//! | `threatscope query "<text>"` | Analyse a question or pasted log excerpt |
//! | `threatscope analyze <file>` | Analyse a `.txt`, `.log` or `.pdf` file |
//! | `threatscope detect "<text>"` | Print the mode keyword detection picks |
//! | `threatscope status` | Describe the stored index |
//! | `threatscope models` | List the configured generation models |
//!
//! ## Examples
//!
//! ```bash
//! threatscope build --config ./config/threatscope.toml
//! threatscope query "APT29 phishing campaign TTPs" --model llama3.2:1b
//! threatscope analyze ./logs/auth.log --mode ir --summary --output report.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use threatscope::config::{self, Config};
use threatscope::dashboard::Dashboard;
use threatscope::engine::{QueryOutcome, ThreatRag};
use threatscope::extract;
use threatscope::generation::OllamaGenerator;
use threatscope::ingest;
use threatscope::mode::{detect_mode, Mode};
use threatscope::progress::ProgressMode;

const DEFAULT_CONFIG: &str = "./config/threatscope.toml";

/// ThreatScope: retrieval-augmented threat analysis over local reports
/// with a local language model.
#[derive(Parser)]
#[command(
    name = "threatscope",
    about = "ThreatScope: retrieval-augmented threat analysis with local models",
    version,
    long_about = "ThreatScope indexes local threat reports, classifies questions and logs into \
    Incident Response, Threat Intel or Hybrid analysis, retrieves related report passages, and \
    asks a local language model for structured JSON findings (events, IOCs, MITRE mappings, severity)."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/threatscope.toml`; when that file does not exist
    /// built-in defaults are used. An explicitly given file must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector index from the report corpus.
    ///
    /// Loads every eligible report, splits it into overlapping chunks, embeds
    /// them, and replaces the index. Fails without touching the existing index
    /// if the corpus is empty or the embedding service is unavailable.
    Build {
        /// Show document and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr: `human`, `json`, or `off`.
        /// Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Analyse a question or pasted text.
    Query {
        /// The question or text to analyse.
        text: String,

        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Analyse a file (`.txt`, `.log`, or `.pdf`).
    Analyze {
        /// File to analyse.
        file: PathBuf,

        #[command(flatten)]
        opts: QueryOpts,
    },

    /// Print the analysis mode detected for a text.
    Detect {
        /// Text to classify.
        text: String,
    },

    /// Describe the stored index.
    Status,

    /// List the configured generation models.
    Models,
}

#[derive(clap::Args)]
struct QueryOpts {
    /// Generation model. Defaults to `generation.default_model`.
    #[arg(long)]
    model: Option<String>,

    /// Force an analysis mode (`ir`, `threat-intel`, `hybrid`) instead of
    /// detecting it from the text.
    #[arg(long)]
    mode: Option<Mode>,

    /// Print summary metrics after a JSON result.
    #[arg(long)]
    summary: bool,

    /// Also write the result to this file.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Detect { text } = &cli.command {
        println!("{}", detect_mode(text));
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => config::load_config(path, true)?,
        None => config::load_config(Path::new(DEFAULT_CONFIG), false)?,
    };

    match cli.command {
        Commands::Detect { .. } => unreachable!("handled before config loading"),
        Commands::Build { dry_run, progress } => run_build(cfg, dry_run, progress).await?,
        Commands::Query { text, opts } => {
            let rag = ThreatRag::from_config(cfg)?;
            run_query(&rag, &text, &opts).await?;
            rag.close().await;
        }
        Commands::Analyze { file, opts } => {
            let text = extract::extract_file(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            eprintln!("loaded {} ({} chars)", file.display(), text.chars().count());
            let rag = ThreatRag::from_config(cfg)?;
            run_query(&rag, &text, &opts).await?;
            rag.close().await;
        }
        Commands::Status => run_status(cfg).await?,
        Commands::Models => run_models(&cfg).await,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("threatscope={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_build(cfg: Config, dry_run: bool, progress: Option<String>) -> Result<()> {
    if dry_run {
        let plan = ingest::plan_build(&cfg)?;
        println!("build (dry-run)");
        println!("  corpus: {}", cfg.corpus.root.display());
        println!("  documents: {}", plan.documents);
        println!("  estimated chunks: {}", plan.chunks);
        return Ok(());
    }

    let mode = match progress.as_deref() {
        None => ProgressMode::default_for_tty(),
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        Some("off") => ProgressMode::Off,
        Some(other) => anyhow::bail!(
            "Unknown progress mode: '{}'. Use human, json, or off.",
            other
        ),
    };
    let reporter = mode.reporter();

    let rag = ThreatRag::from_config(cfg)?;
    let meta = rag.build_index(reporter.as_ref()).await?;
    rag.close().await;

    println!("build");
    println!("  index: {}", rag.config().index.path.display());
    println!("  documents: {}", meta.documents);
    println!("  chunks: {}", meta.chunks);
    println!("  embedding model: {} ({} dims)", meta.embedding_model, meta.dims);
    println!("ok");
    Ok(())
}

async fn run_query(rag: &ThreatRag, text: &str, opts: &QueryOpts) -> Result<()> {
    if text.trim().is_empty() {
        anyhow::bail!("Nothing to analyse: input is empty.");
    }

    let outcome: QueryOutcome = rag
        .run_query(text, opts.model.as_deref(), opts.mode)
        .await?;

    eprintln!(
        "mode: {} ({})  model: {}  context chunks: {}",
        outcome.mode,
        if outcome.mode_forced { "forced" } else { "detected" },
        outcome.model,
        outcome.context.len()
    );
    if !outcome.analysis.is_json() {
        eprintln!("note: model output contained no JSON; showing raw text");
    }

    let rendered = outcome.analysis.render();
    println!("{}", rendered);

    if opts.summary {
        match outcome.analysis.as_json() {
            Some(value) => {
                println!();
                print!("{}", Dashboard::from_value(value).render());
            }
            None => eprintln!("summary unavailable (no JSON parsed)"),
        }
    }

    if let Some(path) = &opts.output {
        std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("wrote {}", path.display());
    }

    Ok(())
}

async fn run_status(cfg: Config) -> Result<()> {
    let rag = ThreatRag::from_config(cfg)?;
    let status = rag.status().await?;
    rag.close().await;

    let meta = &status.meta;
    println!("ThreatScope Index Status");
    println!("=======================");
    println!();
    println!("  Index:       {}", status.path.display());
    println!("  Size:        {}", format_bytes(status.size_bytes));
    println!("  Built:       {}", meta.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Build ID:    {}", meta.build_id);
    println!();
    println!("  Documents:   {}", meta.documents);
    println!("  Chunks:      {}", status.stored_chunks);
    println!(
        "  Chunking:    {} chars, {} overlap",
        meta.chunk_size, meta.chunk_overlap
    );
    println!("  Embeddings:  {} ({} dims)", meta.embedding_model, meta.dims);
    Ok(())
}

async fn run_models(cfg: &Config) {
    let installed = match OllamaGenerator::new(&cfg.generation) {
        Ok(generator) => generator.installed_models().await.ok(),
        Err(_) => None,
    };

    let default = cfg.generation.default_model();
    let mut listed: Vec<&str> = cfg.generation.models.iter().map(String::as_str).collect();
    if !listed.contains(&default) {
        listed.push(default);
    }

    for model in listed {
        let marker = if model == default { "*" } else { " " };
        let availability = match &installed {
            Some(names) if names.iter().any(|n| n == model) => "installed",
            Some(_) => "not installed",
            None => "unknown",
        };
        println!("{} {}  ({})", marker, model, availability);
    }

    if installed.is_none() {
        eprintln!("note: could not reach {}", cfg.generation.url);
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
