//! Remote endpoints
//!
//! A remote is anything that can enumerate its branch refs and hand out
//! objects by hash. Fetch only talks to the `RemoteEndpoint` trait, so it
//! works the same whether the remote is another repository on this machine
//! or a server reached over HTTP.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::object::{unframe, ObjectId, ObjectKind};
use crate::refs::RefNamespace;
use crate::repository::Repository;
use crate::storage::{ObjectSource, ObjectStore};

/// A foreign repository that objects and refs can be fetched from
#[async_trait]
pub trait RemoteEndpoint: ObjectSource {
    /// Identifier printed on the report's `From` line
    fn identifier(&self) -> &str;

    /// All branch refs of the remote, sorted by name
    async fn list_refs(&self) -> Result<BTreeMap<String, ObjectId>>;
}

/// Open the endpoint for a configured remote location.
///
/// `http://` and `https://` locations are served over HTTP; anything else is
/// a filesystem path, resolved against `base` when relative.
pub fn connect(location: &str, base: &Path) -> Result<Box<dyn RemoteEndpoint>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpRemote::new(location)?))
    } else {
        Ok(Box::new(LocalPathRemote::open(location, base)?))
    }
}

/// Another repository on the same machine, read directly from its directories
pub struct LocalPathRemote {
    location: String,
    repo: Repository,
}

impl LocalPathRemote {
    pub fn open(location: &str, base: &Path) -> Result<Self> {
        let path = base.join(location);
        let repo = Repository::open(&path).map_err(|e| match e {
            Error::RepositoryNotFound => Error::RemoteNotFound(location.to_string()),
            other => other,
        })?;
        Ok(Self {
            location: location.to_string(),
            repo,
        })
    }
}

#[async_trait]
impl ObjectSource for LocalPathRemote {
    async fn fetch_object(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)> {
        self.repo.objects().get(id).await
    }
}

#[async_trait]
impl RemoteEndpoint for LocalPathRemote {
    fn identifier(&self) -> &str {
        &self.location
    }

    async fn list_refs(&self) -> Result<BTreeMap<String, ObjectId>> {
        self.repo.refs().list(&RefNamespace::Heads)
    }
}

/// Remote served over HTTP.
///
/// Wire contract:
/// - `GET {base}/refs` → JSON object mapping branch name to hex hash
/// - `GET {base}/objects/{hex}` → stored object bytes, 404 if absent
pub struct HttpRemote {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRemote {
    /// Create a client targeting `base_url` (e.g. `http://server:8080/repo`)
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()?;
        Ok(Self {
            base_url: base_url.to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ObjectSource for HttpRemote {
    async fn fetch_object(&self, id: ObjectId) -> Result<(ObjectKind, Bytes)> {
        let url = self.url(&format!("objects/{}", id.to_hex()));
        let resp = self.http.get(&url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::ObjectNotFound(id));
        }
        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "GET {} failed ({})",
                url,
                resp.status()
            )));
        }

        let raw = resp.bytes().await?;
        let actual = ObjectId::from_data(&raw);
        if actual != id {
            return Err(Error::ObjectIntegrity {
                expected: id,
                actual,
            });
        }
        let (kind, payload) = unframe(&raw)?;
        let offset = raw.len() - payload.len();
        Ok((kind, raw.slice(offset..)))
    }
}

#[async_trait]
impl RemoteEndpoint for HttpRemote {
    fn identifier(&self) -> &str {
        &self.base_url
    }

    async fn list_refs(&self) -> Result<BTreeMap<String, ObjectId>> {
        let url = self.url("refs");
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "GET {} failed ({})",
                url,
                resp.status()
            )));
        }

        let listed: BTreeMap<String, String> = resp.json().await?;
        listed
            .into_iter()
            .map(|(name, hex)| {
                ObjectId::from_hex(&hex)
                    .map(|id| (name.clone(), id))
                    .map_err(|_| Error::Corrupt(format!("remote ref {} holds invalid hash '{}'", name, hex)))
            })
            .collect()
    }
}
