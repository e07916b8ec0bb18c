//! Runtime configuration
//!
//! One explicit `Config` value built at startup and passed by reference into
//! the store client and fetcher. Nothing below `main` reads the environment.

use std::env;
use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// Environment variable names
const ENV_ENDPOINT: &str = "STORE_ENDPOINT";
const ENV_KEY_ID: &str = "STORE_KEY_ID";
const ENV_KEY: &str = "STORE_KEY";
const ENV_BUCKET: &str = "STORE_BUCKET";
const ENV_FILE_KEY: &str = "STORE_FILE_KEY";
const ENV_CACHE_DIR: &str = "CACHE_DIR";

/// Access key pair for the object store
#[derive(Clone)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

// Keep the secret out of logs and error chains
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Object store endpoint (scheme + host)
    pub endpoint: String,
    /// Optional access key pair; both halves or neither
    pub credentials: Option<Credentials>,
    /// Bucket holding the dataset
    pub bucket: String,
    /// Object key of the dataset file
    pub key: String,
    /// Root directory for the on-disk cache
    pub cache_dir: PathBuf,
}

impl Config {
    /// Build configuration from the process environment.
    ///
    /// All missing required variables are reported in a single error so a
    /// fresh setup fails once, not once per variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup (testable core)
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let required = [ENV_ENDPOINT, ENV_BUCKET, ENV_FILE_KEY];
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| get(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        let credentials = match (get(ENV_KEY_ID), get(ENV_KEY)) {
            (Some(key_id), Some(secret)) => Some(Credentials { key_id, secret }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "{} and {} must be set together",
                    ENV_KEY_ID,
                    ENV_KEY
                ))
            }
        };

        let cache_dir = get(ENV_CACHE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        Ok(Self {
            endpoint: get(ENV_ENDPOINT).unwrap(),
            credentials,
            bucket: get(ENV_BUCKET).unwrap(),
            key: get(ENV_FILE_KEY).unwrap(),
            cache_dir,
        })
    }
}

/// Platform cache directory fallback, e.g. `~/.cache/candleview` on Linux
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("candleview")
}
