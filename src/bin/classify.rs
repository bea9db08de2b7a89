//! classify - classify one media file from its detection sidecar
//!
//! Reads `<media>.detections.json`, runs the engine and prints the result as
//! JSON on stdout. Nothing is copied or moved.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use wolfvue::{MediaFile, MediaKind, SidecarConfig, SidecarSource, SorterConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Media file whose sidecar should be classified
    media: PathBuf,

    /// Config file (TOML); defaults to WOLFVUE_CONFIG when unset
    #[arg(long, env = "WOLFVUE_CONFIG")]
    config: Option<PathBuf>,

    /// Force the media kind instead of guessing from the extension (video|image)
    #[arg(long, value_name = "KIND")]
    kind: Option<String>,

    /// Print compact JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = SorterConfig::load_from(args.config.as_deref())?;
    let kind = match args.kind.as_deref() {
        Some("video") => MediaKind::Video,
        Some("image") => MediaKind::Image,
        Some(other) => return Err(anyhow!("--kind must be video or image (got {})", other)),
        None => MediaFile::from_path(&args.media)?.kind,
    };

    let mut source = SidecarSource::new(
        SidecarConfig {
            media_path: args.media.clone(),
            kind,
            confidence_floor: config.confidence_floor(kind),
        },
        &config.classes,
    );
    let frames = source.read_frames()?;
    let result = config.classifier().classify(&frames);
    log::info!(
        "{}: {} ({})",
        args.media.display(),
        result.classification,
        result.reason
    );

    let json = if args.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", json);
    Ok(())
}
