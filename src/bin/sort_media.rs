//! sort_media - classify and sort a folder of trail-camera media
//!
//! This tool:
//! 1. Creates the Sorted / Unsorted / No_Animal layout under the output folder
//! 2. Reads each media file's detection sidecar and classifies it
//! 3. Copies the file into its folder (originals are left in place)
//! 4. Writes processing_report.txt (and directory_ranking.txt with --rank)

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wolfvue::report::{write_report, DEFAULT_RANK_TOP_N, REPORT_FILE_NAME};
use wolfvue::{render_ranking, render_report, run_batch, Sorter, SorterConfig};

const RANKING_FILE_NAME: &str = "directory_ranking.txt";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input folders containing media files and their sidecars
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output folder for the sorted layout and reports
    #[arg(long, short, env = "WOLFVUE_OUTPUT", default_value = "wolfvue_out")]
    output: PathBuf,

    /// Config file (TOML); defaults to WOLFVUE_CONFIG when unset
    #[arg(long, env = "WOLFVUE_CONFIG")]
    config: Option<PathBuf>,

    /// Also rank input folders by detections per species
    #[arg(long)]
    rank: bool,

    /// Number of folders listed per species in the ranking
    #[arg(long, default_value_t = DEFAULT_RANK_TOP_N)]
    top: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    for input in &args.inputs {
        if !input.is_dir() {
            return Err(anyhow!("input folder {} does not exist", input.display()));
        }
    }

    let config = SorterConfig::load_from(args.config.as_deref())?;
    let sorter = Sorter::new(args.output.clone(), config.taxonomy.clone());
    sorter.prepare()?;
    log::info!("sorting into {}", sorter.root().display());

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let summary = run_batch(&args.inputs, &config, &sorter, || {
        stop.load(Ordering::SeqCst)
    })?;
    if summary.interrupted {
        log::warn!("interrupted; report covers the files processed so far");
    }

    let report = write_report(
        sorter.root(),
        REPORT_FILE_NAME,
        &render_report(&summary.outcomes),
    )?;
    log::info!(
        "sorted {} files, skipped {}, failed to copy {}; report written to {}",
        summary.outcomes.len(),
        summary.skipped.len(),
        summary.failed.len(),
        report.display()
    );

    if args.rank {
        let ranking = write_report(
            sorter.root(),
            RANKING_FILE_NAME,
            &render_ranking(&summary.detections_by_dir, args.top),
        )?;
        log::info!("directory ranking written to {}", ranking.display());
    }
    Ok(())
}
