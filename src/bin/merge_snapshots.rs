use anyhow::{Context, Result};
use cep_geocoder::core::engine::SNAPSHOT_TIMESTAMP_FORMAT;
use cep_geocoder::utils::logger;
use cep_geocoder::{merge, ResultStore};
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "merge_snapshots")]
#[command(about = "Merge two snapshot files; resolved entries of the primary always win")]
struct Args {
    /// Snapshot whose resolved entries are kept as they are
    primary: PathBuf,

    /// Snapshot used to fill keys the primary could not resolve
    secondary: PathBuf,

    /// Directory for the merge-<timestamp>.json file
    #[arg(short, long, default_value = "merges")]
    output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn load(path: &Path) -> Result<ResultStore> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    ResultStore::load(&content).with_context(|| format!("failed to parse snapshot {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let primary = load(&args.primary)?;
    let secondary = load(&args.secondary)?;
    tracing::info!(
        "📂 Primary: {} entries ({} resolved), secondary: {} entries ({} resolved)",
        primary.len(),
        primary.resolved_count(),
        secondary.len(),
        secondary.resolved_count()
    );

    let merged = merge(&primary, &secondary);

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;
    let output = args.output_dir.join(format!(
        "merge-{}.json",
        chrono::Local::now().format(SNAPSHOT_TIMESTAMP_FORMAT)
    ));
    std::fs::write(&output, merged.dump()?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "✅ Merged {} entries ({} resolved) into {}",
        merged.len(),
        merged.resolved_count(),
        output.display()
    );
    Ok(())
}
