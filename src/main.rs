// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use galley::{parse_recipe_file, BuildConfig, FingerprintCache, LogObserver};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "galley")]
#[command(author, version, about = "Build-step executor with fingerprint caching, retries, and environment isolation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a recipe, skipping it when the stored fingerprint matches
    Build {
        /// Path to the recipe TOML file
        recipe: PathBuf,
        /// Working directory (default: a scratch directory)
        #[arg(short, long)]
        workdir: Option<PathBuf>,
        /// Directories searched for patches and templates
        #[arg(short, long = "search-root")]
        search_roots: Vec<PathBuf>,
        /// Fingerprint cache directory (default: .galley-cache)
        #[arg(long, default_value = ".galley-cache")]
        cache_dir: PathBuf,
        /// Retry budget per step
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Rebuild even if the stored fingerprint matches
        #[arg(short, long)]
        force: bool,
    },
    /// Print a recipe's fingerprint
    Fingerprint {
        /// Path to the recipe TOML file
        recipe: PathBuf,
        /// Directories searched for patches and templates
        #[arg(short, long = "search-root")]
        search_roots: Vec<PathBuf>,
    },
}

fn build_config(search_roots: &[PathBuf], recipe_path: &std::path::Path) -> BuildConfig {
    let mut config = BuildConfig::from_env();
    if !search_roots.is_empty() {
        config.search_roots = search_roots.to_vec();
    } else if let Some(parent) = recipe_path.parent() {
        // Default to resolving inputs next to the recipe file
        config.search_roots = vec![parent.to_path_buf()];
    }
    config
}

fn cmd_build(
    recipe_path: PathBuf,
    workdir: Option<PathBuf>,
    search_roots: Vec<PathBuf>,
    cache_dir: PathBuf,
    max_attempts: Option<u32>,
    force: bool,
) -> Result<()> {
    let recipe = parse_recipe_file(&recipe_path)
        .with_context(|| format!("failed to load {}", recipe_path.display()))?;

    let mut config = build_config(&search_roots, &recipe_path);
    if let Some(n) = max_attempts {
        config.max_attempts = n;
    }

    let mut galley = match workdir {
        Some(dir) => recipe.into_galley_at(config, dir)?,
        None => recipe.into_galley(config)?,
    };

    let digest = galley.fingerprint()?;
    let cache = FingerprintCache::open(&cache_dir)?;
    if !force && cache.is_fresh(galley.name(), &digest) {
        println!("{} is up to date ({:.16})", galley.name(), digest);
        return Ok(());
    }

    let report = galley.build(&LogObserver::new())?;
    cache.record(&report.name, &report.fingerprint)?;

    for (description, elapsed) in &report.timings {
        info!("  {:<40} {:.2}s", description, elapsed.as_secs_f64());
    }
    println!(
        "{} built: {} step(s) in {:.2}s (fingerprint {:.16})",
        report.name,
        report.steps_run,
        report.total.as_secs_f64(),
        report.fingerprint
    );
    Ok(())
}

fn cmd_fingerprint(recipe_path: PathBuf, search_roots: Vec<PathBuf>) -> Result<()> {
    let recipe = parse_recipe_file(&recipe_path)
        .with_context(|| format!("failed to load {}", recipe_path.display()))?;
    let config = build_config(&search_roots, &recipe_path);
    let mut galley = recipe.into_galley(config)?;
    println!("{}", galley.fingerprint()?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            recipe,
            workdir,
            search_roots,
            cache_dir,
            max_attempts,
            force,
        } => cmd_build(recipe, workdir, search_roots, cache_dir, max_attempts, force),
        Commands::Fingerprint {
            recipe,
            search_roots,
        } => cmd_fingerprint(recipe, search_roots),
    }
}
