//! Result files: locating, loading, merging and saving.
//!
//! Results are stored as a pretty-printed JSON array of [`JobResult`]. Every
//! run additionally writes a timestamped copy of its own results into a log
//! directory so earlier runs are never lost when the main file is replaced.

use std::ffi::OsStr;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use alignbench_types::{Job, JobResult};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::error::StoreError;

/// Results file for an experiment: the last `experiments` path component is
/// replaced by `results` and the extension by `.json`.
///
/// `evals/experiments/tools.yaml` maps to `evals/results/tools.json`.
pub fn default_results_path(experiment: &Path) -> PathBuf {
    let components: Vec<Component<'_>> = experiment.components().collect();
    let last = components
        .iter()
        .rposition(|c| matches!(c, Component::Normal(name) if *name == "experiments"));

    let mut path: PathBuf = components
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if Some(i) == last {
                Component::Normal(OsStr::new("results"))
            } else {
                *c
            }
        })
        .collect();
    path.set_extension("json");
    path
}

/// Load results. A missing file holds no results.
pub fn load_results(path: &Path) -> Result<Vec<JobResult>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Drop jobs that do not need to run again.
///
/// A job is done when an earlier result for the same job succeeded. Unless
/// `rerun_failed` is set, it is also done when an earlier attempt failed with
/// at least the same resources.
pub fn retain_pending(jobs: Vec<Job>, existing: &[JobResult], rerun_failed: bool) -> Vec<Job> {
    let before = jobs.len();
    let pending: Vec<Job> = jobs
        .into_iter()
        .filter(|job| {
            !existing.iter().any(|r| {
                r.job.is_same_as(job)
                    && (r.is_ok() || (!rerun_failed && r.job.has_more_resources_than(job)))
            })
        })
        .collect();
    info!(
        pending = pending.len(),
        skipped = before - pending.len(),
        "Incremental run"
    );
    pending
}

/// Combine results; a new result replaces existing results for the same job.
pub fn merge_results(existing: Vec<JobResult>, new: Vec<JobResult>) -> Vec<JobResult> {
    let mut merged: Vec<JobResult> = existing
        .into_iter()
        .filter(|old| !new.iter().any(|r| r.job.is_same_as(&old.job)))
        .collect();
    merged.extend(new);
    merged
}

fn write_atomic(path: &Path, results: &[JobResult]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    serde_json::to_writer_pretty(&mut tmp, results).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.write_all(b"\n").map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

/// Replace the results file.
pub fn save_results(path: &Path, results: &[JobResult]) -> Result<(), StoreError> {
    write_atomic(path, results)?;
    info!(path = %path.display(), results = results.len(), "Saved results");
    Ok(())
}

/// Write `<logs_dir>/<stem>_<timestamp>.json` and return its path.
pub fn write_log(logs_dir: &Path, stem: &str, results: &[JobResult]) -> Result<PathBuf, StoreError> {
    let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let path = logs_dir.join(format!("{stem}_{stamp}.json"));
    write_atomic(&path, results)?;
    debug!(path = %path.display(), "Wrote run log");
    Ok(path)
}
