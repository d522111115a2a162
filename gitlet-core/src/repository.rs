//! Repository context
//!
//! A `Repository` is an explicit handle on one `.gitlet` directory. Nothing is
//! global, so a local and a remote repository can be open side by side in the
//! same process.
//!
//! Layout on disk:
//! ```text
//! {root}/.gitlet/
//!   config.json                   remote table
//!   objects/{hash}                content-addressed object store
//!   refs/heads/{name}             local branches
//!   refs/remotes/{remote}/{name}  remote-tracking branches
//!   FETCH_HEAD                    refs seen by the last fetch
//!   logs/fetch/                   fetch log entries
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::refs::RefStore;
use crate::storage::DiskObjectStore;

/// Name of the directory that marks a repository root
pub const GITLET_DIR: &str = ".gitlet";

/// Handle on a gitlet repository
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    git_dir: PathBuf,
    objects: DiskObjectStore,
    refs: RefStore,
}

impl Repository {
    /// Create a new repository in `path`
    pub fn init(path: &Path) -> Result<Self> {
        let git_dir = path.join(GITLET_DIR);
        if git_dir.exists() {
            return Err(Error::AlreadyInitialized(git_dir));
        }

        fs::create_dir_all(git_dir.join("objects"))?;
        fs::create_dir_all(git_dir.join("refs").join("heads"))?;
        fs::create_dir_all(git_dir.join("refs").join("remotes"))?;
        RepoConfig::default().save(&git_dir)?;

        tracing::info!(path = %path.display(), "initialized empty repository");
        Ok(Self::at(path.to_path_buf(), git_dir))
    }

    /// Open the repository at exactly `path`, which may be either the
    /// working directory or the `.gitlet` directory itself.
    pub fn open(path: &Path) -> Result<Self> {
        let nested = path.join(GITLET_DIR);
        if nested.is_dir() {
            return Ok(Self::at(path.to_path_buf(), nested));
        }
        if path.file_name().is_some_and(|n| n == GITLET_DIR) && path.is_dir() {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return Ok(Self::at(root, path.to_path_buf()));
        }
        Err(Error::RepositoryNotFound)
    }

    /// Find the repository containing `start`, checking `start` and then
    /// each ancestor directory.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = if start.is_absolute() {
            start.to_path_buf()
        } else {
            std::env::current_dir()?.join(start)
        };

        for dir in start.ancestors() {
            if dir.join(GITLET_DIR).is_dir() {
                tracing::debug!(root = %dir.display(), "found repository");
                return Ok(Self::at(dir.to_path_buf(), dir.join(GITLET_DIR)));
            }
        }
        Err(Error::RepositoryNotFound)
    }

    fn at(root: PathBuf, git_dir: PathBuf) -> Self {
        let objects = DiskObjectStore::open(git_dir.join("objects"));
        let refs = RefStore::open(git_dir.join("refs"));
        Self {
            root,
            git_dir,
            objects,
            refs,
        }
    }

    /// Working directory containing `.gitlet`
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `.gitlet` directory
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn objects(&self) -> &DiskObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Load the repository configuration
    pub fn config(&self) -> Result<RepoConfig> {
        RepoConfig::load(&self.git_dir)
    }

    pub fn save_config(&self, config: &RepoConfig) -> Result<()> {
        config.save(&self.git_dir)
    }

    /// Register a remote under `name`
    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut config = self.config()?;
        config.add_remote(name, url)?;
        self.save_config(&config)?;
        tracing::info!(remote = name, url, "added remote");
        Ok(())
    }
}
