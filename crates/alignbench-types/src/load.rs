//! Loading suite configurations from YAML.

use std::path::Path;

use crate::config::Suite;
use crate::error::{ConfigError, Result};
use crate::validate::validate_suites;

/// Parse and validate suites from YAML text.
pub fn parse_suites(yaml: &str) -> Result<Vec<Suite>> {
    let suites: Vec<Suite> = serde_yaml::from_str(yaml)?;
    validate_suites(&suites)?;
    Ok(suites)
}

/// Read, parse and validate a suite configuration file.
pub fn load_suites(path: impl AsRef<Path>) -> Result<Vec<Suite>> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_suites(&yaml)
}

/// Serialize suites back to YAML.
pub fn to_yaml(suites: &[Suite]) -> Result<String> {
    Ok(serde_yaml::to_string(suites)?)
}
