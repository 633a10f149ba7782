// Copyright 2026 the Viewshot Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Xtask utilities for Viewshot: comparing images and managing reference images by hand.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use viewshot::{
    compare, diff_image, reference_key, CompareOptions, DirectoryStore, PixelBuffer,
    ReferenceStore, SnapshotConfig, Tolerance, DIFF_DIR_VAR,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Top-level command line parser for xtask
pub struct Cli {
    /// The possible commands in this CLI.
    #[clap(subcommand)]
    pub command: CliCommand,
}

#[derive(Parser, Debug)]
/// Top-level xtask command
pub enum CliCommand {
    /// Compare a candidate PNG against a reference PNG
    Compare(CompareArgs),
    /// Record a PNG as the reference image for a snapshot
    Record(RecordArgs),
    /// Delete the candidate and diff images left behind by failing snapshots
    Clean(CleanArgs),
}

#[derive(Parser, Debug)]
/// CLI parser for comparisons
pub struct CompareArgs {
    /// The newly rendered image
    pub candidate: PathBuf,
    /// The accepted image
    pub reference: PathBuf,
    /// Maximum fraction of pixels which may differ
    #[arg(long, default_value_t = 0.0)]
    pub tolerance: f64,
    /// Maximum difference per channel before a pixel counts as differing
    #[arg(long, default_value_t = viewshot::DEFAULT_CHANNEL_THRESHOLD)]
    pub channel_threshold: u8,
    /// Write a diff image to this path
    #[arg(long)]
    pub diff: Option<PathBuf>,
}

#[derive(Parser, Debug)]
/// CLI parser for recording
pub struct RecordArgs {
    /// The image to record
    pub image: PathBuf,
    /// Identifier of the snapshot
    #[arg(long)]
    pub identifier: String,
    /// Reference directory suffix
    #[arg(long, default_value = "")]
    pub suffix: String,
    /// Root reference directory. Defaults to `VIEWSHOT_REFERENCE_DIR`
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Recompress the recorded image
    #[arg(long)]
    pub optimize: bool,
}

#[derive(Parser, Debug)]
/// CLI parser for cleaning failure artifacts
pub struct CleanArgs {
    /// Directory of failure artifacts. Defaults to `VIEWSHOT_DIFF_DIR`
    #[arg(long)]
    pub diff_dir: Option<PathBuf>,
}

fn load_png(path: &Path) -> Result<PixelBuffer> {
    let file = File::open(path).with_context(|| format!("Couldn't open {}", path.display()))?;
    PixelBuffer::from_png(BufReader::new(file))
        .with_context(|| format!("Couldn't decode {}", path.display()))
}

fn compare_command(args: CompareArgs) -> Result<()> {
    let candidate = load_png(&args.candidate)?;
    let reference = load_png(&args.reference)?;
    let options = CompareOptions::new(Tolerance::new(args.tolerance)?)
        .with_channel_threshold(args.channel_threshold);

    let result = compare(&candidate, &reference, options);
    println!("{}", result.summary());
    if let Some(diff_path) = &args.diff {
        diff_image(&candidate, &reference, args.channel_threshold)
            .save(diff_path)
            .with_context(|| format!("Couldn't write diff to {}", diff_path.display()))?;
        println!("Wrote diff to {}", diff_path.display());
    }
    if !result.matches {
        bail!(
            "{} doesn't match {}",
            args.candidate.display(),
            args.reference.display()
        );
    }
    Ok(())
}

fn record_command(args: RecordArgs) -> Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => SnapshotConfig::from_env()?.reference_root,
    };
    let image = load_png(&args.image)?;
    let mut store = DirectoryStore::new(root).with_optimize(args.optimize);
    let key = reference_key(&args.suffix, &args.identifier);
    store.record(&key, &image)?;
    println!("Recorded {} to {}", args.image.display(), store.location(&key));
    Ok(())
}

fn clean_command(args: CleanArgs) -> Result<()> {
    let diff_dir = match args.diff_dir {
        Some(dir) => dir,
        None => match std::env::var_os(DIFF_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => bail!("No diff directory given. Pass `--diff-dir` or set `{DIFF_DIR_VAR}`"),
        },
    };
    if !diff_dir.exists() {
        log::info!("{} doesn't exist, nothing to clean", diff_dir.display());
        return Ok(());
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(&diff_dir)? {
        let path = entry?.path();
        let is_artifact = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".new.png") || name.ends_with(".diff.png"));
        if is_artifact {
            log::debug!("Removing {}", path.display());
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    println!("Removed {removed} files from {}", diff_dir.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();
    match args.command {
        CliCommand::Compare(args) => compare_command(args),
        CliCommand::Record(args) => record_command(args),
        CliCommand::Clean(args) => clean_command(args),
    }
}
