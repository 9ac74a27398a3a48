use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use recog::{config, CorruptPolicy, Embedding, FsStore, IdentityStore, MatchEngine};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "recog")]
#[command(
    version,
    about = "Enroll embeddings under a name and identify unknown embeddings"
)]
struct Cli {
    /// Config file (defaults to the compiled-in path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the acceptance threshold
    #[arg(short, long, global = true)]
    threshold: Option<f32>,

    /// Override the store directory
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a set of sample embeddings under a display name
    Enroll {
        /// Display name to enroll
        #[arg(short, long)]
        name: String,
        /// JSON file with the samples (reads stdin when omitted or "-")
        #[arg(long)]
        samples: Option<PathBuf>,
    },
    /// Identify a query embedding against every enrolled profile
    Match {
        /// JSON file with the query vector (reads stdin when omitted or "-")
        #[arg(short, long)]
        query: Option<PathBuf>,
        /// Skip unreadable profiles instead of failing
        #[arg(long)]
        skip_corrupt: bool,
    },
    /// List enrolled identities
    List,
    /// Print the stored profile of an identity
    Show {
        identifier: String,
    },
    /// Print the effective config, or open the config file in an editor
    Config {
        #[arg(long)]
        edit: bool,
    },
}

/// Samples are either a bare array of vectors or `{"descriptors": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SamplesInput {
    Bare(Vec<Vec<f32>>),
    Wrapped { descriptors: Vec<Vec<f32>> },
}

/// A query is either a bare vector or `{"descriptor": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum QueryInput {
    Bare(Vec<f32>),
    Wrapped { descriptor: Vec<f32> },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(threshold) = cli.threshold {
        cfg.threshold = threshold;
    }
    if let Some(store) = cli.store {
        cfg.store_dir = store;
    }
    cfg.validate()?;

    match cli.command {
        Commands::Enroll { name, samples } => enroll(&cfg, &name, samples.as_deref()),
        Commands::Match {
            query,
            skip_corrupt,
        } => match_query(&cfg, query.as_deref(), skip_corrupt),
        Commands::List => list(&cfg),
        Commands::Show { identifier } => show(&cfg, &identifier),
        Commands::Config { edit } => open_config(&cfg, cli.config.as_deref(), edit),
    }
}

fn open_store(cfg: &config::Config) -> IdentityStore<FsStore> {
    IdentityStore::new(FsStore::new(&cfg.store_dir))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("reading {}", p.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn enroll(cfg: &config::Config, name: &str, samples: Option<&Path>) -> Result<()> {
    let raw = read_input(samples)?;
    let input: SamplesInput =
        serde_json::from_str(&raw).context("samples must be a JSON array of vectors")?;
    let vectors = match input {
        SamplesInput::Bare(v) | SamplesInput::Wrapped { descriptors: v } => v,
    };

    info!("Enrolling {:?} into {}", name, cfg.store_dir.display());
    let store = open_store(cfg);
    let result = store
        .enroll(name, vectors.into_iter().map(Embedding::new).collect())
        .context("Failed to enroll")?;

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn match_query(cfg: &config::Config, query: Option<&Path>, skip_corrupt: bool) -> Result<()> {
    let raw = read_input(query)?;
    let input: QueryInput =
        serde_json::from_str(&raw).context("query must be a JSON array of numbers")?;
    let vector = match input {
        QueryInput::Bare(v) | QueryInput::Wrapped { descriptor: v } => v,
    };

    let policy = if skip_corrupt || cfg.skip_corrupt {
        CorruptPolicy::Skip
    } else {
        CorruptPolicy::Abort
    };
    let store = open_store(cfg);
    let engine = MatchEngine::new(&store, cfg.threshold).with_corrupt_policy(policy);
    let result = engine
        .match_embedding(&Embedding::new(vector))
        .context("Failed to match")?;

    info!(
        "Match score: {:.3} (threshold: {:.3})",
        result.score, cfg.threshold
    );
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

fn list(cfg: &config::Config) -> Result<()> {
    let store = open_store(cfg);
    for identifier in store.list_identities().context("Failed to list identities")? {
        let identifier = identifier?;
        let profile = store
            .load_profile(&identifier)
            .with_context(|| format!("loading profile {identifier}"))?;
        println!(
            "{}\t{}\t{}",
            profile.identifier, profile.display_name, profile.sample_count
        );
    }
    Ok(())
}

fn show(cfg: &config::Config, identifier: &str) -> Result<()> {
    let store = open_store(cfg);
    let profile = store
        .load_profile(identifier)
        .with_context(|| format!("loading profile {identifier}"))?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn open_config(cfg: &config::Config, path: Option<&Path>, edit: bool) -> Result<()> {
    if !edit {
        print!("{}", toml::to_string_pretty(cfg)?);
        return Ok(());
    }

    let config_path = path.unwrap_or(&config::CONFIG_PATH);
    if !config_path.exists() {
        config::save_config(&config::Config::default(), Some(config_path))
            .context("Failed to write default config")?;
    }
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
