use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use bundlesmith::{
    code_generator::{BundleResult, Builder},
    config::Config,
    pool::DirectoryPool,
};
use clap::Parser;
use log::{LevelFilter, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bundle configuration file (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Directory containing the resources to bundle
    #[arg(short, long)]
    pool: PathBuf,

    /// Directory the generated bundles are written to
    #[arg(short, long)]
    output: PathBuf,

    /// Split every bundle into this many parts
    #[arg(long)]
    parts: Option<usize>,

    /// Minify and normalise embedded resources
    #[arg(long)]
    optimize: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(&cli.config)?;
    if let Some(parts) = cli.parts {
        config.options.number_of_parts = parts;
    }
    if cli.optimize {
        config.options.optimize = true;
    }

    let pool = DirectoryPool::open(&cli.pool)
        .with_context(|| format!("Failed to open resource pool {}", cli.pool.display()))?;
    let builder = Builder::new(&pool);
    info!("Using {:?} bundle format", builder.format());

    for definition in &config.bundles {
        let results = builder
            .create_bundle(definition, &config.options)
            .with_context(|| format!("Failed to build bundle {}", definition.name))?;
        for result in &results {
            write_bundle(&cli.output, result)?;
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG takes precedence over the command line
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn write_bundle(output: &std::path::Path, result: &BundleResult) -> Result<()> {
    let path = output.join(&result.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(&path, &result.content)
        .with_context(|| format!("Failed to write bundle {}", path.display()))?;
    info!(
        "Wrote {} ({} bytes, {} modules)",
        path.display(),
        result.content.len(),
        result.bundle_info.sub_modules.len()
    );
    Ok(())
}
