//! Dataset fetching and caching.
//!
//! `!Download` datasets are zip archives of `.seq` files. Each archive is
//! fetched once into `<data_dir>/download/<dir>` and reused on later runs.
//! Archives are extracted into a staging directory next to the cache and
//! only moved into place once extraction succeeded, so a cache directory is
//! always complete.
//! A `.seq` file holds one sequence pair per two lines: `>a` then `<b`.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub use alignbench_types::SeqStats;
use alignbench_types::{Dataset, DatasetRef};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Subdirectory of the data directory holding extracted downloads.
pub const DOWNLOAD_SUBDIR: &str = "download";

const USER_AGENT: &str = concat!("alignbench/", env!("CARGO_PKG_VERSION"));

/// Download behaviour.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds, covering the whole transfer.
    pub timeout_secs: u64,

    /// Re-download even when an extracted copy exists. Each directory is
    /// refreshed at most once per fetcher.
    pub force: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            force: false,
        }
    }
}

/// Read the statistics of a `.seq` file.
pub fn seq_stats(path: &Path) -> Result<SeqStats, FetchError> {
    let file = File::open(path).map_err(|e| FetchError::io(path, e))?;
    let mut stats = SeqStats::default();
    let mut pending_a: Option<usize> = None;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| FetchError::io(path, e))?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let malformed = |reason: &str| FetchError::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            reason: reason.to_string(),
        };
        match (line.as_bytes()[0], pending_a) {
            (b'>', None) => pending_a = Some(line.len() - 1),
            (b'<', Some(a)) => {
                stats.add_pair(a, line.len() - 1);
                pending_a = None;
            }
            (b'>', Some(_)) => return Err(malformed("expected `<` line")),
            (b'<', None) => return Err(malformed("expected `>` line")),
            _ => return Err(malformed("line must start with `>` or `<`")),
        }
    }

    if pending_a.is_some() {
        return Err(FetchError::Malformed {
            path: path.to_path_buf(),
            line: 0,
            reason: "last pair is missing its `<` line".to_string(),
        });
    }
    Ok(stats)
}

/// Statistics of a resolved dataset.
pub fn dataset_stats(dataset: &Dataset) -> Result<SeqStats, FetchError> {
    match dataset {
        Dataset::File(path) => seq_stats(path),
        Dataset::Data(pairs) => Ok(SeqStats::of_pairs(pairs)),
    }
}

/// All `.seq` files below `dir`, sorted by path.
pub fn find_seq_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = fs::read_dir(&current).map_err(|e| FetchError::io(&current, e))?;
        for entry in entries {
            let path = entry.map_err(|e| FetchError::io(&current, e))?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "seq") {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Extract a zip archive into `dest`, returning the number of files written.
///
/// Entries whose names would resolve outside `dest` are rejected before
/// anything is written for them.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize, FetchError> {
    let zip_err = |e: zip::result::ZipError| FetchError::Zip {
        path: archive.to_path_buf(),
        message: e.to_string(),
    };

    let file = File::open(archive).map_err(|e| FetchError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(zip_err)?;
    fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(zip_err)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(FetchError::UnsafeEntry(entry.name().to_string()));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| FetchError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| FetchError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| FetchError::io(&target, e))?;
        written += 1;
    }
    Ok(written)
}

/// Extract `archive` into a staging directory beside `target`, then replace
/// `target` with it. On any error `target` is left untouched and the staging
/// directory is removed.
fn install_archive(archive: &Path, target: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let parent = match target.parent() {
        Some(p) => p,
        None => return Err(FetchError::NoSeqFiles(target.to_path_buf())),
    };
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parent)
        .map_err(|e| FetchError::io(parent, e))?;

    let extracted = extract_zip(archive, staging.path())?;
    debug!(dir = %target.display(), files = extracted, "Extracted archive");
    if find_seq_files(staging.path())?.is_empty() {
        return Err(FetchError::NoSeqFiles(target.to_path_buf()));
    }

    if target.exists() {
        fs::remove_dir_all(target).map_err(|e| FetchError::io(target, e))?;
    }
    let staged = staging.into_path();
    if let Err(e) = fs::rename(&staged, target) {
        warn!(dir = %staged.display(), error = %e, "Could not move extracted dataset into place");
        let _ = fs::remove_dir_all(&staged);
        return Err(FetchError::io(target, e));
    }
    find_seq_files(target)
}

/// Fetches and caches datasets below a data directory.
pub struct DatasetFetcher {
    data_dir: PathBuf,
    client: reqwest::Client,
    config: FetchConfig,
    refreshed: Mutex<HashSet<PathBuf>>,
}

impl DatasetFetcher {
    /// Create a fetcher rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>, config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            data_dir: data_dir.into(),
            client,
            config,
            refreshed: Mutex::new(HashSet::new()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory a `!Download` dataset is extracted into.
    pub fn download_dir(&self, dir: &Path) -> PathBuf {
        self.data_dir.join(DOWNLOAD_SUBDIR).join(dir)
    }

    /// Resolve a dataset reference into concrete datasets, downloading if
    /// needed. A download yields one dataset per `.seq` file.
    pub async fn fetch(&self, dataset: &DatasetRef) -> Result<Vec<Dataset>, FetchError> {
        match dataset {
            DatasetRef::Download { url, dir } => {
                let files = self.fetch_download(url, dir).await?;
                Ok(files.into_iter().map(Dataset::File).collect())
            }
            DatasetRef::File(path) => {
                if !path.is_file() {
                    return Err(FetchError::MissingFile(path.clone()));
                }
                Ok(vec![Dataset::File(path.clone())])
            }
            DatasetRef::Data(pairs) => Ok(vec![Dataset::Data(pairs.clone())]),
        }
    }

    fn already_refreshed(&self, target: &Path) -> bool {
        self.refreshed
            .lock()
            .map(|done| done.contains(target))
            .unwrap_or(false)
    }

    async fn fetch_download(&self, url: &str, dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let target = self.download_dir(dir);
        let force = self.config.force && !self.already_refreshed(&target);

        if !force && target.is_dir() {
            let cached = find_seq_files(&target)?;
            if !cached.is_empty() {
                info!(dir = %target.display(), files = cached.len(), "Using cached dataset");
                return Ok(cached);
            }
        }

        let mut archive = target.clone().into_os_string();
        archive.push(".zip");
        let archive = PathBuf::from(archive);
        if let Err(err) = self.download(url, &archive).await {
            let _ = fs::remove_file(&archive);
            return Err(err);
        }

        let staged_from = archive.clone();
        let staged_to = target.clone();
        let installed = tokio::task::spawn_blocking(move || install_archive(&staged_from, &staged_to))
            .await
            .map_err(|e| FetchError::Zip {
                path: archive.clone(),
                message: format!("extraction task failed: {e}"),
            })?;
        let _ = fs::remove_file(&archive);
        let files = installed?;

        if let Ok(mut done) = self.refreshed.lock() {
            done.insert(target.clone());
        }
        info!(url = %url, dir = %target.display(), files = files.len(), "Downloaded dataset");
        Ok(files)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let http_err = |e: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        };

        info!(url = %url, "Downloading dataset");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::io(dest, e))?;

        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(http_err)? {
            bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::io(dest, e))?;
        }
        file.flush().await.map_err(|e| FetchError::io(dest, e))?;
        debug!(url = %url, bytes, "Download complete");
        Ok(())
    }
}
