//! Fetch: copy missing history from a remote into the local repository.
//!
//! A fetch runs Resolve → Enumerate → Transfer → UpdateRefs → Report. The
//! closure of every remote ref is computed in one walk, so objects shared by
//! several branches are transferred and counted once. Remote-tracking refs
//! are only touched after every object of the walk is stored; an error in
//! an earlier phase leaves all refs as they were.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::fetch_log::{FetchLog, FetchLogEntry};
use crate::graph;
use crate::object::ObjectId;
use crate::refs::RefNamespace;
use crate::remote::{connect, RemoteEndpoint};
use crate::repository::Repository;
use crate::storage::ObjectStore;

/// How a remote-tracking ref changed during a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefChange {
    /// The ref did not exist locally before
    New,
    /// The ref moved from `old`
    Updated { old: ObjectId },
}

/// One changed remote-tracking ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    /// Branch name on the remote
    pub name: String,
    /// Remote the branch belongs to
    pub remote: String,
    /// New value
    pub new: ObjectId,
    pub change: RefChange,
}

impl RefUpdate {
    /// Local short name such as `origin/master`
    pub fn tracking_name(&self) -> String {
        format!("{}/{}", self.remote, self.name)
    }
}

impl fmt::Display for RefUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.change {
            RefChange::New => "[new branch]",
            RefChange::Updated { .. } => "[updated]",
        };
        write!(f, "* {} {} -> {}", marker, self.name, self.tracking_name())
    }
}

/// Outcome of a fetch. Its `Display` form is the report text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    identifier: String,
    count: u64,
    updates: Vec<RefUpdate>,
}

impl FetchReport {
    /// Identifier of the remote that was fetched from
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Number of objects transferred
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Changed refs in report order (unchanged refs are omitted)
    pub fn updates(&self) -> &[RefUpdate] {
        &self.updates
    }
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "From {}", self.identifier)?;
        writeln!(f, "Count {}", self.count)?;
        for update in &self.updates {
            writeln!(f, "{}", update)?;
        }
        Ok(())
    }
}

/// Runs fetches into one local repository
pub struct FetchService<'a> {
    repo: &'a Repository,
}

impl<'a> FetchService<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self { repo }
    }

    /// Fetch every branch of the remote configured as `remote_name`.
    ///
    /// A name is required; there is no default remote.
    pub async fn fetch(&self, remote_name: Option<&str>) -> Result<FetchReport> {
        let remote_name = remote_name.ok_or(Error::Unsupported)?;

        let config = self.repo.config()?;
        let location = &config.remote(remote_name)?.url;
        let remote = connect(location, self.repo.root())?;

        self.fetch_from(remote_name, remote.as_ref()).await
    }

    /// Fetch from an already opened endpoint, tracking its refs under
    /// `remotes/<remote_name>/`.
    pub async fn fetch_from(
        &self,
        remote_name: &str,
        remote: &dyn RemoteEndpoint,
    ) -> Result<FetchReport> {
        let start_time = Instant::now();
        let namespace = RefNamespace::Remote(remote_name.to_string());
        let refs = self.repo.refs();

        // Enumerate
        let targets = remote.list_refs().await?;
        let mut prior: BTreeMap<&str, Option<ObjectId>> = BTreeMap::new();
        for name in targets.keys() {
            prior.insert(name.as_str(), refs.try_read(&namespace, name)?);
        }
        tracing::info!(remote = remote_name, refs = targets.len(), "enumerated remote refs");

        // Transfer
        let closure =
            graph::closure(targets.values().copied(), self.repo.objects(), remote).await?;
        // Closure order is children first; an interrupted transfer never
        // stores an object ahead of what it references
        for object in &closure.objects {
            self.repo.objects().put(object.kind, &object.payload).await?;
        }
        let count = closure.len() as u64;
        tracing::info!(remote = remote_name, count, pruned = closure.pruned, "transferred objects");

        // UpdateRefs
        let mut updates = Vec::new();
        for (name, new) in &targets {
            let old = prior.get(name.as_str()).copied().flatten();
            let change = match old {
                None => Some(RefChange::New),
                Some(old) if old != *new => Some(RefChange::Updated { old }),
                Some(_) => None,
            };

            if let Err(e) = refs.update(&namespace, name, old, *new) {
                tracing::warn!(remote = remote_name, branch = %name, error = %e, "ref update rejected");
                return Err(e);
            }

            if let Some(change) = change {
                updates.push(RefUpdate {
                    name: name.clone(),
                    remote: remote_name.to_string(),
                    new: *new,
                    change,
                });
            }
        }

        write_fetch_head(self.repo.git_dir(), remote.identifier(), &targets)?;

        let report = FetchReport {
            identifier: remote.identifier().to_string(),
            count,
            updates,
        };

        let entry = FetchLogEntry {
            remote: remote_name.to_string(),
            identifier: report.identifier.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            objects_transferred: count,
            changed_refs: report.updates.iter().map(RefUpdate::tracking_name).collect(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        if let Err(e) = FetchLog::new(self.repo.git_dir()).append(&entry) {
            tracing::warn!(error = %e, "failed to record fetch log entry");
        }

        tracing::info!(remote = remote_name, changed = report.updates.len(), "fetch complete");
        Ok(report)
    }
}

/// Find the repository containing `start` and fetch `remote_name` into it
pub async fn fetch(start: &Path, remote_name: Option<&str>) -> Result<FetchReport> {
    let repo = Repository::discover(start)?;
    FetchService::new(&repo).fetch(remote_name).await
}

/// Record the refs seen by this fetch in `FETCH_HEAD`
fn write_fetch_head(
    git_dir: &Path,
    identifier: &str,
    targets: &BTreeMap<String, ObjectId>,
) -> Result<()> {
    let mut contents = String::new();
    for (name, id) in targets {
        contents.push_str(&format!("{}\t\tbranch '{}' of {}\n", id, name, identifier));
    }
    let path = git_dir.join("FETCH_HEAD");
    let tmp_path = git_dir.join("FETCH_HEAD.tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, &path)?;
    Ok(())
}
