//! Repository configuration stored at `.gitlet/config.json`
//!
//! Holds the remote table (name → location). Fetch looks a remote up once
//! per call; an unknown name is an error, there is no default remote.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::refs::validate_ref_name;

const CONFIG_FILE: &str = "config.json";

/// A configured remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Location of the remote: a filesystem path or an `http(s)://` URL
    pub url: String,
}

/// Per-repository configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    #[serde(default)]
    pub remotes: BTreeMap<String, RemoteConfig>,
}

impl RepoConfig {
    /// Load config from a `.gitlet` directory (missing file = empty config)
    pub fn load(git_dir: &Path) -> Result<Self> {
        let config_path = Self::config_path(git_dir);
        let data = match fs::read_to_string(&config_path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&data)?)
    }

    /// Save config into a `.gitlet` directory
    pub fn save(&self, git_dir: &Path) -> Result<()> {
        let config_path = Self::config_path(git_dir);
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }

    /// Look up a remote by name
    pub fn remote(&self, name: &str) -> Result<&RemoteConfig> {
        self.remotes
            .get(name)
            .ok_or_else(|| Error::RemoteNotFound(name.to_string()))
    }

    /// Register a new remote
    pub fn add_remote(&mut self, name: &str, url: &str) -> Result<()> {
        if name.contains('/') {
            return Err(Error::InvalidRefName(name.to_string()));
        }
        validate_ref_name(name)?;
        if self.remotes.contains_key(name) {
            return Err(Error::RemoteAlreadyExists(name.to_string()));
        }
        self.remotes.insert(
            name.to_string(),
            RemoteConfig {
                url: url.to_string(),
            },
        );
        Ok(())
    }

    fn config_path(git_dir: &Path) -> PathBuf {
        git_dir.join(CONFIG_FILE)
    }
}
