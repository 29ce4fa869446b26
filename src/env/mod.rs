//! Environment classification
//!
//! Turns `.env`-style configuration into two disjoint, order-preserving buckets: SECRET
//! entries, which only ever reach the platform through its secret primitive, and PLAIN
//! entries, which are written into the deployment descriptor.

pub mod classifier;
pub mod parser;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub use classifier::{classify, SECRET_MARKERS};

pub const ENV_FILE_NAME: &str = ".env";

/// Key whose presence enables weave observability in the generated service
pub const WANDB_KEY: &str = "WANDB_API_KEY";

#[derive(Debug, Error)]
#[error("Malformed configuration at line {line}: expected KEY=VALUE, got '{content}'")]
pub struct EnvParseError {
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum EnvLoadError {
    #[error(transparent)]
    Parse(#[from] EnvParseError),

    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Secret,
    Plain,
}

#[derive(Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub key: String,
    pub value: String,
    pub classification: Classification,
}

impl EnvEntry {
    pub fn is_secret(&self) -> bool {
        self.classification == Classification::Secret
    }
}

impl fmt::Debug for EnvEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: &dyn fmt::Debug = if self.is_secret() {
            &"<redacted>"
        } else {
            &self.value
        };
        f.debug_struct("EnvEntry")
            .field("key", &self.key)
            .field("value", value)
            .field("classification", &self.classification)
            .finish()
    }
}

/// Classified entries, each bucket in input order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvBuckets {
    pub secrets: Vec<EnvEntry>,
    pub plain: Vec<EnvEntry>,
}

impl EnvBuckets {
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty() && self.plain.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.secrets.iter().chain(&self.plain).any(|e| e.key == key)
    }

    pub fn secret_keys(&self) -> Vec<&str> {
        self.secrets.iter().map(|e| e.key.as_str()).collect()
    }

    /// Whether the generated service should initialise weave
    pub fn observability_enabled(&self) -> bool {
        self.contains_key(WANDB_KEY)
    }
}

/// Parses and classifies `.env`-style text
pub fn classify_text(text: &str) -> Result<EnvBuckets, EnvParseError> {
    let pairs = parser::parse_env_lines(text)?;
    Ok(classifier::split(pairs))
}

/// Finds the `.env` file for a source file
///
/// An explicit path wins; otherwise `.env` next to the source file, then `.env` in the
/// current directory.
pub fn locate_env_file(explicit: Option<&Path>, source_file: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let beside_source = source_file
        .parent()
        .map(|dir| dir.join(ENV_FILE_NAME))
        .filter(|p| p.is_file());
    if beside_source.is_some() {
        return beside_source;
    }

    let cwd = PathBuf::from(ENV_FILE_NAME);
    cwd.is_file().then_some(cwd)
}

/// Loads and classifies the configuration for a source file; no file means no entries
pub fn load_for_source(
    explicit: Option<&Path>,
    source_file: &Path,
) -> Result<EnvBuckets, EnvLoadError> {
    let Some(path) = locate_env_file(explicit, source_file) else {
        info!("No .env file found, deploying without custom environment variables");
        return Ok(EnvBuckets::default());
    };

    let text = std::fs::read_to_string(&path).map_err(|source| EnvLoadError::Read {
        path: path.clone(),
        source,
    })?;
    let buckets = classify_text(&text)?;

    info!(
        path = %path.display(),
        secrets = buckets.secrets.len(),
        plain = buckets.plain.len(),
        "Loaded environment configuration"
    );
    debug!(secret_keys = ?buckets.secret_keys(), "Classified secret keys");

    Ok(buckets)
}
