//! Error types for dataset fetching and result storage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that make a suite's datasets unavailable.
///
/// Any of these is fatal for the suite that referenced the dataset.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed or returned an error status
    #[error("download of {url} failed: {message}")]
    Http { url: String, message: String },

    /// IO error
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive could not be read
    #[error("invalid zip archive {path}: {message}")]
    Zip { path: PathBuf, message: String },

    /// An archive entry would be written outside the extraction directory
    #[error("archive entry {0:?} escapes the extraction directory")]
    UnsafeEntry(String),

    /// A referenced local dataset does not exist
    #[error("dataset file not found: {0}")]
    MissingFile(PathBuf),

    /// Nothing to align after extraction
    #[error("no .seq files found in {0}")]
    NoSeqFiles(PathBuf),

    /// A `.seq` file is not in the alternating `>a` / `<b` line format
    #[error("malformed .seq file {path} at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

impl FetchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors reading or writing result files.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid results JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Http {
            url: "https://example.org/a.zip".to_string(),
            message: "404 Not Found".to_string(),
        };
        assert!(err.to_string().contains("https://example.org/a.zip"));
        assert!(err.to_string().contains("404"));

        let err = FetchError::UnsafeEntry("../../etc/passwd".to_string());
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn test_store_error_keeps_path() {
        let err = StoreError::io(
            "results/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("results/x.json"));
    }
}
