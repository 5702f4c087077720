use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use indicatif::ProgressBar;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::args::BaseArgs;
use crate::artifact::{local_activity_ids, record_file_name, scan_local_artifacts, write_artifact};
use crate::config::Settings;
use crate::login::login;
use crate::remote::{ActivityId, ActivityRecord, ArtifactFormat, FitnessApi};
use crate::ui::{print_command_status, progress_spinner, CommandStatus};
use crate::utils::pluralize;

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Artifact format to download (defaults to the configured format, fit)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<ArtifactFormat>,

    /// Re-download and overwrite artifacts that already exist locally
    #[arg(long)]
    pub force: bool,

    /// Activities requested per page
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Pause after each download, in milliseconds (0 disables)
    #[arg(long)]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub local_dir: PathBuf,
    pub page_size: usize,
    pub force: bool,
    pub format: ArtifactFormat,
    pub request_delay: Duration,
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings, args: &SyncArgs) -> Self {
        Self {
            local_dir: settings.export_dir.clone(),
            page_size: args
                .page_size
                .map(|size| usize::try_from(size).unwrap_or(usize::MAX))
                .unwrap_or(settings.page_size),
            force: args.force,
            format: args.format.unwrap_or(settings.format),
            request_delay: args
                .delay_ms
                .map(Duration::from_millis)
                .unwrap_or(settings.request_delay),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Artifacts newly written during this run.
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub skipped_malformed: usize,
    /// Activities the remote had no content for in the requested format.
    pub empty: usize,
    pub failed: usize,
    /// Page fetches, including the final empty page.
    pub pages: usize,
}

enum ActivityOutcome {
    Downloaded,
    AlreadyPresent,
    Malformed,
    Empty,
    Failed,
}

/// Page through the remote activity list and write one artifact per activity
/// not yet present in `options.local_dir`.
///
/// Paging stops only when the remote returns an empty page. A failed page
/// fetch aborts the run; a failed activity is reported and skipped.
pub async fn sync_activities<A: FitnessApi>(api: &A, options: &SyncOptions) -> Result<SyncReport> {
    if options.page_size == 0 {
        bail!("page size must be greater than zero");
    }

    let dir = &options.local_dir;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut known = if options.force {
        HashSet::new()
    } else {
        local_activity_ids(dir, options.format)?
    };
    debug!(known = known.len(), dir = %dir.display(), "scanned local artifacts");

    let pb = progress_spinner("Syncing");
    let mut report = SyncReport::default();
    let mut start = 0usize;

    loop {
        pb.set_message(format!("fetching activities at offset {start}"));
        let page = match api.get_activities(start, options.page_size).await {
            Ok(page) => page,
            Err(err) => {
                pb.finish_and_clear();
                return Err(err)
                    .with_context(|| format!("failed to fetch activities at offset {start}"));
            }
        };
        report.pages += 1;
        if page.is_empty() {
            break;
        }
        info!(count = page.len(), offset = start, "retrieved activities");

        for record in &page {
            let outcome = sync_one(api, options, &known, record, &pb).await;
            match outcome {
                ActivityOutcome::Downloaded => {
                    report.downloaded += 1;
                    if let Some(id) = record.activity_id.clone() {
                        known.insert(id);
                    }
                }
                ActivityOutcome::AlreadyPresent => report.skipped_existing += 1,
                ActivityOutcome::Malformed => report.skipped_malformed += 1,
                ActivityOutcome::Empty => report.empty += 1,
                ActivityOutcome::Failed => report.failed += 1,
            }
            pb.set_message(format!(
                "{} downloaded, {} already present",
                report.downloaded, report.skipped_existing
            ));
        }

        start += options.page_size;
    }

    pb.finish_and_clear();
    Ok(report)
}

async fn sync_one<A: FitnessApi>(
    api: &A,
    options: &SyncOptions,
    known: &HashSet<ActivityId>,
    record: &ActivityRecord,
    pb: &ProgressBar,
) -> ActivityOutcome {
    let Some(id) = record.activity_id.as_ref() else {
        debug!(name = record.name(), "skipping activity without an id");
        return ActivityOutcome::Malformed;
    };
    let Some(file_name) = record_file_name(record, options.format) else {
        warn!(%id, "activity id cannot be encoded in a file name; skipping");
        return ActivityOutcome::Malformed;
    };
    if !options.force && known.contains(id) {
        return ActivityOutcome::AlreadyPresent;
    }

    pb.suspend(|| {
        print_command_status(
            CommandStatus::Info,
            &format!("Downloading: {} (ID: {id})", record.name()),
        )
    });

    let outcome = match api.download_activity(id, options.format).await {
        Ok(Some(bytes)) => match write_artifact(&options.local_dir, &file_name, &bytes) {
            Ok(_) => {
                pb.suspend(|| {
                    print_command_status(CommandStatus::Success, &format!("Saved: {file_name}"))
                });
                ActivityOutcome::Downloaded
            }
            Err(err) => {
                pb.suspend(|| {
                    print_command_status(
                        CommandStatus::Error,
                        &format!("Error saving activity {id}: {err:#}"),
                    )
                });
                ActivityOutcome::Failed
            }
        },
        Ok(None) => {
            pb.suspend(|| {
                print_command_status(
                    CommandStatus::Warning,
                    &format!("No {} content for activity {id}", options.format),
                )
            });
            ActivityOutcome::Empty
        }
        Err(err) => {
            pb.suspend(|| {
                print_command_status(
                    CommandStatus::Error,
                    &format!("Error downloading {id}: {err}"),
                )
            });
            ActivityOutcome::Failed
        }
    };

    if !options.request_delay.is_zero() {
        tokio::time::sleep(options.request_delay).await;
    }
    outcome
}

pub async fn run(base: BaseArgs, args: SyncArgs) -> Result<()> {
    let settings = Settings::resolve(&base)?;
    let options = SyncOptions::from_settings(&settings, &args);
    let ctx = login(&settings).await?;

    if !base.json {
        print_command_status(
            CommandStatus::Info,
            &format!(
                "Syncing {} artifacts into {}{}",
                options.format,
                options.local_dir.display(),
                if options.force { " (force)" } else { "" }
            ),
        );
    }

    let report = sync_activities(&ctx.api, &options).await?;

    if base.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "status": "completed",
                "dir": options.local_dir,
                "format": options.format,
                "force": options.force,
                "report": report,
            }))?
        );
        return Ok(());
    }

    print_command_status(
        CommandStatus::Success,
        &format!(
            "Completed. Downloaded {} new {}.",
            report.downloaded,
            pluralize(report.downloaded, "activity", Some("activities"))
        ),
    );
    println!("  Already present: {}", report.skipped_existing);
    println!("  Pages fetched: {}", report.pages);
    if report.empty > 0 {
        println!("  Without {} content: {}", options.format, report.empty);
    }
    if report.skipped_malformed > 0 {
        println!("  Malformed records: {}", report.skipped_malformed);
    }
    if report.failed > 0 {
        print_command_status(
            CommandStatus::Warning,
            &format!(
                "{} {} failed; rerun to retry",
                report.failed,
                pluralize(report.failed, "download", None)
            ),
        );
    }
    Ok(())
}

/// `fitsync status`: what is on disk, without touching the network.
pub fn run_status(base: BaseArgs) -> Result<()> {
    let settings = Settings::resolve(&base)?;
    let dir = &settings.export_dir;
    let artifacts = scan_local_artifacts(dir)?;

    let mut per_format: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut activities = HashSet::new();
    for artifact in &artifacts {
        debug!(path = %artifact.path.display(), format = %artifact.format, "found artifact");
        *per_format.entry(artifact.format.as_str()).or_insert(0) += 1;
        activities.insert(artifact.id.clone());
    }

    if base.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "dir": dir,
                "artifacts": artifacts.len(),
                "activities": activities.len(),
                "formats": per_format,
            }))?
        );
        return Ok(());
    }

    if artifacts.is_empty() {
        print_command_status(
            CommandStatus::Info,
            &format!("No artifacts in {}", dir.display()),
        );
        return Ok(());
    }
    println!(
        "{} {} for {} {} in {}",
        artifacts.len(),
        pluralize(artifacts.len(), "artifact", None),
        activities.len(),
        pluralize(activities.len(), "activity", Some("activities")),
        dir.display()
    );
    for (format, count) in per_format {
        println!("  {format}: {count}");
    }
    Ok(())
}
