//! Reference storage
//!
//! Refs are small text files holding a hex object ID. Local branches live in
//! `refs/heads/<name>`, remote-tracking branches in
//! `refs/remotes/<remote>/<name>`. Every write goes through a `<ref>.lock`
//! file that is renamed over the ref, so readers see either the old or the
//! new value and two writers cannot interleave.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::object::ObjectId;

const LOCK_SUFFIX: &str = ".lock";

/// Namespace a ref lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefNamespace {
    /// Local branches (`heads/<name>`)
    Heads,
    /// Remote-tracking branches of one remote (`remotes/<remote>/<name>`)
    Remote(String),
}

impl RefNamespace {
    fn relative_dir(&self) -> PathBuf {
        match self {
            RefNamespace::Heads => PathBuf::from("heads"),
            RefNamespace::Remote(remote) => Path::new("remotes").join(remote),
        }
    }
}

impl fmt::Display for RefNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefNamespace::Heads => f.write_str("heads"),
            RefNamespace::Remote(remote) => write!(f, "remotes/{}", remote),
        }
    }
}

/// Check a ref (or remote) name: slash-separated components, none of them
/// empty, `.` or `..`, no backslashes or control characters, and no `.lock`
/// suffix.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.ends_with(LOCK_SUFFIX)
        && name.split('/').all(|c| {
            !c.is_empty()
                && c != "."
                && c != ".."
                && !c.contains('\\')
                && !c.chars().any(char::is_control)
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRefName(name.to_string()))
    }
}

/// Filesystem-backed ref store rooted at a repository's `refs` directory
#[derive(Debug)]
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory all refs live under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Qualified name such as `remotes/origin/master`
    pub fn full_name(namespace: &RefNamespace, name: &str) -> String {
        format!("{}/{}", namespace, name)
    }

    fn ref_path(&self, namespace: &RefNamespace, name: &str) -> Result<PathBuf> {
        if let RefNamespace::Remote(remote) = namespace {
            if remote.contains('/') {
                return Err(Error::InvalidRefName(remote.clone()));
            }
            validate_ref_name(remote)?;
        }
        validate_ref_name(name)?;
        self.check_conflict(namespace, name)?;
        Ok(self.root.join(namespace.relative_dir()).join(name))
    }

    /// `a` and `a/b` cannot both exist: one needs a file where the other
    /// needs a directory.
    fn check_conflict(&self, namespace: &RefNamespace, name: &str) -> Result<()> {
        let base = self.root.join(namespace.relative_dir());
        let conflict = |existing: &str| Error::RefConflict {
            name: Self::full_name(namespace, name),
            existing: Self::full_name(namespace, existing),
        };

        let path = base.join(name);
        if path.is_dir() {
            let mut nested = BTreeMap::new();
            collect_refs(&path, name, &mut nested)?;
            if let Some(existing) = nested.keys().next() {
                return Err(conflict(existing.as_str()));
            }
        }

        let components: Vec<&str> = name.split('/').collect();
        for depth in 1..components.len() {
            let ancestor = components[..depth].join("/");
            if base.join(&ancestor).is_file() {
                return Err(conflict(ancestor.as_str()));
            }
        }
        Ok(())
    }

    /// Read a ref, failing with `RefNotFound` if it does not exist
    pub fn read(&self, namespace: &RefNamespace, name: &str) -> Result<ObjectId> {
        self.try_read(namespace, name)?
            .ok_or_else(|| Error::RefNotFound(Self::full_name(namespace, name)))
    }

    /// Read a ref, returning `None` if it does not exist
    pub fn try_read(&self, namespace: &RefNamespace, name: &str) -> Result<Option<ObjectId>> {
        let path = self.ref_path(namespace, name)?;
        read_ref_file(&path)
    }

    /// Point a ref at `id`, replacing any previous value
    pub fn write(&self, namespace: &RefNamespace, name: &str, id: ObjectId) -> Result<()> {
        let path = self.ref_path(namespace, name)?;
        let lock = RefLock::acquire(&path)?;
        lock.commit(id)
    }

    /// Point a ref at `new` only if it currently holds `expected`
    /// (`None` meaning the ref must not exist yet).
    pub fn update(
        &self,
        namespace: &RefNamespace,
        name: &str,
        expected: Option<ObjectId>,
        new: ObjectId,
    ) -> Result<()> {
        let path = self.ref_path(namespace, name)?;
        let lock = RefLock::acquire(&path)?;

        let actual = read_ref_file(&path)?;
        if actual != expected {
            let show = |v: Option<ObjectId>| v.map(|id| id.to_hex()).unwrap_or_else(|| "(none)".to_string());
            return Err(Error::RefUpdateRejected {
                name: Self::full_name(namespace, name),
                expected: show(expected),
                actual: show(actual),
            });
        }
        tracing::debug!(name = %Self::full_name(namespace, name), %new, "updating ref");
        lock.commit(new)
    }

    /// All refs under a namespace, keyed by name relative to it
    pub fn list(&self, namespace: &RefNamespace) -> Result<BTreeMap<String, ObjectId>> {
        let mut refs = BTreeMap::new();
        let dir = self.root.join(namespace.relative_dir());
        collect_refs(&dir, "", &mut refs)?;
        Ok(refs)
    }
}

fn read_ref_file(path: &Path) -> Result<Option<ObjectId>> {
    // Leftover directory of refs that no longer exist
    if path.is_dir() {
        return Ok(None);
    }
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let hex = contents.trim();
    ObjectId::from_hex(hex)
        .map(Some)
        .map_err(|_| Error::Corrupt(format!("ref {:?} holds invalid hash '{}'", path, hex)))
}

fn collect_refs(dir: &Path, prefix: &str, refs: &mut BTreeMap<String, ObjectId>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let name = if prefix.is_empty() {
            file_name.clone()
        } else {
            format!("{}/{}", prefix, file_name)
        };

        if entry.file_type()?.is_dir() {
            collect_refs(&entry.path(), &name, refs)?;
        } else if !file_name.ends_with(LOCK_SUFFIX) {
            if let Some(id) = read_ref_file(&entry.path())? {
                refs.insert(name, id);
            }
        }
    }
    Ok(())
}

/// Exclusive write lock on one ref, released on drop unless committed
struct RefLock {
    target: PathBuf,
    lock_path: PathBuf,
    committed: bool,
}

impl RefLock {
    fn acquire(target: &Path) -> Result<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = target.as_os_str().to_owned();
        lock_name.push(LOCK_SUFFIX);
        let lock_path = PathBuf::from(lock_name);

        match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(_) => Ok(Self {
                target: target.to_path_buf(),
                lock_path,
                committed: false,
            }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(Error::Io(std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("unable to lock {:?}: another update is in progress", target),
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn commit(mut self, id: ObjectId) -> Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.lock_path)?;
        file.write_all(format!("{}\n", id.to_hex()).as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.lock_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
