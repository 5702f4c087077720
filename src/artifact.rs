//! Local artifact naming.
//!
//! Every downloaded file is named `{start_time}_{activity_type}_{activity_id}.{ext}`.
//! The activity id is always the last `_`-separated token of the stem, so the
//! set of activities already on disk can be recovered from a directory listing
//! alone.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::remote::{ActivityId, ActivityRecord, ArtifactFormat};

static ARTIFACT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stem>.+)_(?P<id>[A-Za-z0-9-]+)\.(?P<ext>[A-Za-z0-9]+)$")
        .expect("artifact name pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub id: ActivityId,
    pub format: ArtifactFormat,
}

/// Ids that would not survive the round trip through a file name.
pub fn is_filename_safe(id: &ActivityId) -> bool {
    id.as_str()
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

fn sanitize_segment(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| match ch {
            ':' | '/' | '\\' => '-',
            ' ' => '_',
            other => other,
        })
        .collect()
}

/// File name for one (activity, format) pair. `None` if the id cannot be
/// encoded reversibly.
pub fn artifact_file_name(
    start_time: &str,
    activity_type: &str,
    id: &ActivityId,
    format: ArtifactFormat,
) -> Option<String> {
    if !is_filename_safe(id) {
        return None;
    }
    Some(format!(
        "{}_{}_{}.{}",
        sanitize_segment(start_time),
        sanitize_segment(activity_type),
        id,
        format.extension()
    ))
}

pub fn record_file_name(record: &ActivityRecord, format: ArtifactFormat) -> Option<String> {
    let id = record.activity_id.as_ref()?;
    artifact_file_name(record.start_time(), record.type_key(), id, format)
}

/// Recover (id, format) from a file name produced by [`artifact_file_name`].
pub fn parse_artifact_name(file_name: &str) -> Option<(ActivityId, ArtifactFormat)> {
    let captures = ARTIFACT_NAME.captures(file_name)?;
    let format = ArtifactFormat::from_extension(&captures["ext"])?;
    let id = ActivityId::new(&captures["id"])?;
    Some((id, format))
}

pub fn scan_local_artifacts(dir: &Path) -> Result<Vec<LocalArtifact>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("failed to read {}", dir.display())),
    };

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some((id, format)) = parse_artifact_name(file_name) {
            artifacts.push(LocalArtifact {
                path: entry.path(),
                id,
                format,
            });
        }
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

/// Ids already present in `dir` for the given format.
pub fn local_activity_ids(dir: &Path, format: ArtifactFormat) -> Result<HashSet<ActivityId>> {
    Ok(scan_local_artifacts(dir)?
        .into_iter()
        .filter(|artifact| artifact.format == format)
        .map(|artifact| artifact.id)
        .collect())
}

/// Write through a `.part` file and rename, replacing any existing artifact.
pub fn write_artifact(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let tmp = dir.join(format!("{file_name}.part"));

    let written = (|| -> io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)
    })();

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed to write {}", path.display()));
    }
    Ok(path)
}
