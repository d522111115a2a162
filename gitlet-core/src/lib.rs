//! Gitlet Core Library
//!
//! Synchronization core of the gitlet version-control tool:
//! - Object model (Blob, Tree, Commit) with content-addressed IDs
//! - Object storage (one file per object, atomic writes)
//! - Ref storage for local and remote-tracking branches
//! - Commit graph reachability with pruning at known objects
//! - Remote endpoints (filesystem path, HTTP)
//! - Fetch orchestration, report and fetch log

pub mod config;
pub mod error;
pub mod fetch;
pub mod fetch_log;
pub mod graph;
pub mod object;
pub mod refs;
pub mod remote;
pub mod repository;
pub mod storage;

pub use config::{RemoteConfig, RepoConfig};
pub use error::{Error, Result};
pub use fetch::{fetch, FetchReport, FetchService, RefChange, RefUpdate};
pub use fetch_log::{FetchLog, FetchLogEntry};
pub use graph::{closure, Closure, FetchedObject};
pub use object::{Blob, Commit, Object, ObjectId, ObjectKind, Tree, TreeEntry};
pub use refs::{RefNamespace, RefStore};
pub use remote::{connect, HttpRemote, LocalPathRemote, RemoteEndpoint};
pub use repository::{Repository, GITLET_DIR};
pub use storage::{DiskObjectStore, MemoryObjectStore, ObjectSource, ObjectStore};
