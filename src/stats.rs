use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::json;
use tracing::debug;

use crate::args::BaseArgs;
use crate::config::Settings;
use crate::ui::{print_command_status, CommandStatus};
use crate::utils::pluralize;

const TCX_NS: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";

#[derive(Debug, Clone, Args)]
pub struct HrArgs {
    /// Samples at or below this bpm count as low (defaults to the configured threshold, 160)
    #[arg(long)]
    pub threshold: Option<u32>,

    /// TCX files to read instead of every `*.tcx` in the artifact directory
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

/// `(timestamp, bpm)` for every trackpoint carrying both a time and a heart
/// rate. Timestamps are returned as written in the file.
pub fn extract_time_hr_pairs(path: &Path) -> Result<Vec<(String, u32)>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_time_hr_pairs(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_time_hr_pairs(text: &str) -> Result<Vec<(String, u32)>> {
    let doc = roxmltree::Document::parse(text)?;

    let pairs = doc
        .descendants()
        .filter(|node| node.has_tag_name((TCX_NS, "Trackpoint")))
        .filter_map(|point| {
            let time = point
                .children()
                .find(|n| n.has_tag_name((TCX_NS, "Time")))?
                .text()?
                .trim();
            let bpm = point
                .children()
                .find(|n| n.has_tag_name((TCX_NS, "HeartRateBpm")))?
                .children()
                .find(|n| n.has_tag_name((TCX_NS, "Value")))?
                .text()?
                .trim()
                .parse::<u32>()
                .ok()?;
            Some((time.to_string(), bpm))
        })
        .collect();
    Ok(pairs)
}

/// Share of samples at or below `threshold`. `None` when there are no samples.
pub fn low_hr_fraction(pairs: &[(String, u32)], threshold: u32) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let low = pairs.iter().filter(|(_, bpm)| *bpm <= threshold).count();
    Some(low as f64 / pairs.len() as f64)
}

fn tcx_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir_str = dir
        .to_str()
        .ok_or_else(|| anyhow!("artifact directory is not valid UTF-8: {}", dir.display()))?;
    let pattern = Path::new(&glob::Pattern::escape(dir_str)).join("*.tcx");
    let pattern = pattern.to_string_lossy();
    let mut files = glob::glob(&pattern)
        .with_context(|| format!("invalid glob pattern {pattern}"))?
        .filter_map(|entry| entry.ok())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}

pub fn run(base: BaseArgs, args: HrArgs) -> Result<()> {
    let settings = Settings::resolve(&base)?;
    let threshold = args.threshold.unwrap_or(settings.hr_threshold);
    let files = if args.files.is_empty() {
        tcx_files(&settings.export_dir)?
    } else {
        args.files
    };

    let mut samples = Vec::new();
    let mut unreadable = 0usize;
    for file in &files {
        match extract_time_hr_pairs(file) {
            Ok(pairs) => {
                debug!(file = %file.display(), samples = pairs.len(), "parsed TCX");
                samples.extend(pairs);
            }
            Err(err) => {
                unreadable += 1;
                print_command_status(CommandStatus::Warning, &format!("Skipping: {err:#}"));
            }
        }
    }

    let fraction = low_hr_fraction(&samples, threshold);

    if base.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "threshold": threshold,
                "files": files.len(),
                "unreadable": unreadable,
                "samples": samples.len(),
                "low_fraction": fraction,
            }))?
        );
        return Ok(());
    }

    match fraction {
        Some(fraction) => {
            debug!(
                samples = samples.len(),
                files = files.len(),
                threshold,
                "computed low heart-rate fraction"
            );
            println!("{fraction:.3}");
        }
        None => print_command_status(
            CommandStatus::Info,
            &format!(
                "No heart-rate samples in {} TCX {}",
                files.len(),
                pluralize(files.len(), "file", None)
            ),
        ),
    }
    Ok(())
}
