use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use takeout_fix::config::DEFAULT_WORKERS;
use takeout_fix::{process_files, scan_media_files, Config, ExifToolPool, Summary};

#[derive(Parser, Debug)]
#[command(name = "takeout-fix")]
#[command(version)]
#[command(
    about = "Fix capture dates of a Google Photos Takeout export from its JSON companion files"
)]
struct Cli {
    /// Takeout directory to process
    #[arg(long)]
    source: PathBuf,

    /// Directory organized files are moved to
    #[arg(long)]
    output: PathBuf,

    /// Move files into <output>/ALL_PHOTOS/YYYY/MM/DD and link albums under <output>/ALBUMS
    #[arg(long = "move")]
    organize: bool,

    /// Report what would change without writing or moving anything
    #[arg(long)]
    dry_run: bool,

    /// Number of concurrent workers, each with its own exiftool process
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Path to the exiftool executable
    #[arg(long, default_value = "exiftool")]
    exiftool: PathBuf,

    /// Increase verbosity (-v=DEBUG, -vv=TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    // RUST_LOG wins over the flag.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = Config::new(cli.source, cli.output);
    config.organize = cli.organize;
    config.dry_run = cli.dry_run;
    config.workers = cli.workers;
    config.exiftool = cli.exiftool;
    config.validate().context("Invalid configuration")?;

    if config.dry_run {
        info!("Dry run: no files will be modified");
    }
    info!("Source: {}", config.source_dir.display());
    info!("Output: {}", config.output_dir.display());
    info!("Workers: {}", config.workers);

    let files = scan_media_files(&config.source_dir, &config.media_extensions)
        .with_context(|| format!("Failed to scan {}", config.source_dir.display()))?;
    if files.is_empty() {
        warn!("No media files found");
        return Ok(());
    }

    let pool = ExifToolPool::start(config.workers, &config.exiftool, config.shutdown_grace)
        .context("Failed to start exiftool")?;
    let outcomes = process_files(&config, pool.slots(), files);
    if let Err(e) = pool.close_all() {
        warn!("{}", e);
    }
    let outcomes = outcomes?;

    println!("{}", Summary::from_outcomes(&outcomes));
    Ok(())
}
