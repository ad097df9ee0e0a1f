use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rommend_protocol::ProgressSink;
use rommend_protocol::format::format_eta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::sanitize::{entry_segments, resolve_within, strip_common_root, validate_base_name};
use crate::{ExtractionError, ExtractionJob, ExtractionReport};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// A file entry and where it will land, if anywhere.
struct PlannedEntry {
    index: usize,
    name: String,
    target: Option<PathBuf>,
}

/// Extracts `job.source` into `job.destination`.
///
/// Blocking; run it on a blocking thread from async code. Reports one
/// progress update per processed entry and checks `cancel` between entries.
/// Files already written are left in place when extraction stops early.
pub fn extract(
    job: &ExtractionJob,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<ExtractionReport, ExtractionError> {
    validate_base_name(&job.base_name)?;
    if cancel.is_cancelled() {
        return Err(ExtractionError::Cancelled);
    }

    let file = File::open(&job.source)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut report = ExtractionReport::default();
    let mut files = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            warn!(entry = %name, "skipping symbolic link entry");
            report.skipped.push(name);
            continue;
        }
        files.push((index, name));
    }

    if files.is_empty() {
        return Err(ExtractionError::Empty);
    }

    fs::create_dir_all(&job.destination)?;
    let destination = std::path::absolute(&job.destination)?;

    let plan = if files.len() == 1 {
        plan_single(&destination, &job.base_name, files.remove(0))
    } else {
        plan_multi(&destination, files)
    };

    info!(
        source = %job.source.display(),
        dest = %destination.display(),
        entries = plan.len(),
        "extraction started"
    );

    let total = plan.len();
    let started = Instant::now();
    for (done, entry) in plan.into_iter().enumerate() {
        if cancel.is_cancelled() {
            info!(written = report.written.len(), "extraction cancelled");
            return Err(ExtractionError::Cancelled);
        }

        match entry.target {
            Some(target) => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut reader = archive.by_index(entry.index)?;
                let mut out = File::create(&target)?;
                let bytes = io::copy(&mut reader, &mut out)?;
                debug!(entry = %entry.name, path = %target.display(), bytes, "entry written");
                report.written.push(target);
            }
            None => {
                warn!(entry = %entry.name, "skipping entry outside destination");
                report.skipped.push(entry.name);
            }
        }

        let processed = done + 1;
        let (percentage, status) = entry_progress(processed, total, started.elapsed());
        sink.report(percentage, &status);
    }

    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        "extraction completed"
    );
    Ok(report)
}

/// A lone entry lands directly in the destination, keeping its own file
/// name only when that name carries an extension.
fn plan_single(destination: &Path, base_name: &str, (index, name): (usize, String)) -> Vec<PlannedEntry> {
    let file_name = entry_segments(&name)
        .and_then(|segments| segments.last().cloned())
        .filter(|last| Path::new(last).extension().is_some())
        .unwrap_or_else(|| base_name.to_string());

    let target = resolve_within(destination, &[file_name]);
    vec![PlannedEntry {
        index,
        name,
        target,
    }]
}

fn plan_multi(destination: &Path, files: Vec<(usize, String)>) -> Vec<PlannedEntry> {
    let mut kept = Vec::with_capacity(files.len());
    let mut planned = Vec::with_capacity(files.len());
    for (index, name) in files {
        match entry_segments(&name) {
            Some(segments) => kept.push((index, name, segments)),
            None => planned.push(PlannedEntry {
                index,
                name,
                target: None,
            }),
        }
    }

    let mut segment_lists: Vec<Vec<String>> =
        kept.iter().map(|(_, _, segments)| segments.clone()).collect();
    if let Some(root) = strip_common_root(&mut segment_lists) {
        debug!(root = %root, "stripping shared top-level folder");
    }

    for ((index, name, _), segments) in kept.into_iter().zip(segment_lists) {
        let target = resolve_within(destination, &segments);
        planned.push(PlannedEntry {
            index,
            name,
            target,
        });
    }
    planned.sort_by_key(|entry| entry.index);
    planned
}

fn entry_progress(processed: usize, total: usize, elapsed: std::time::Duration) -> (i32, String) {
    let percentage = (processed * 100 / total.max(1)) as i32;
    let remaining_entries = total.saturating_sub(processed) as u32;
    let eta = elapsed / processed.max(1) as u32 * remaining_entries;
    let status = format!(
        "Extracting: {processed}/{total} files (ETA: {})",
        format_eta(eta)
    );
    (percentage, status)
}
