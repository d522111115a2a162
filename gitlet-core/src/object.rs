//! Core object model for gitlet
//!
//! Implements content-addressable objects (Blob, Tree, Commit). Every object
//! is stored and hashed in a framed form, `"<kind> <len>\0" ++ payload`, so
//! the identifier depends on both the kind and the payload bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from already framed data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Compute the ObjectId an object of `kind` with `payload` is stored under
    pub fn for_object(kind: ObjectKind, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(header(kind, payload.len()));
        hasher.update(payload);
        Self(hasher.finalize().into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Abbreviated form used in human-facing output
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Object type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            other => Err(Error::Corrupt(format!("unknown object kind '{}'", other))),
        }
    }
}

fn header(kind: ObjectKind, len: usize) -> Vec<u8> {
    format!("{} {}\0", kind.as_str(), len).into_bytes()
}

/// Build the stored representation of an object
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let mut data = header(kind, payload.len());
    data.extend_from_slice(payload);
    data
}

/// Split a stored representation into its kind and payload
pub fn unframe(data: &[u8]) -> Result<(ObjectKind, &[u8])> {
    let nul = data
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error::Corrupt("missing object header".to_string()))?;
    let head = std::str::from_utf8(&data[..nul])
        .map_err(|_| Error::Corrupt("object header is not UTF-8".to_string()))?;
    let (kind, len) = head
        .split_once(' ')
        .ok_or_else(|| Error::Corrupt(format!("malformed object header '{}'", head)))?;
    let kind: ObjectKind = kind.parse()?;
    let len: usize = len
        .parse()
        .map_err(|_| Error::Corrupt(format!("bad object length '{}'", len)))?;

    let payload = &data[nul + 1..];
    if payload.len() != len {
        return Err(Error::Corrupt(format!(
            "object length mismatch: header says {}, found {}",
            len,
            payload.len()
        )));
    }
    Ok((kind, payload))
}

/// File content object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw content data
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        ObjectId::for_object(ObjectKind::Blob, &self.data)
    }
}

/// Directory tree entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Name of the entry
    pub name: String,
    /// Object ID (points to Blob or Tree)
    pub id: ObjectId,
    /// Entry type
    pub kind: ObjectKind,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, id: ObjectId, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            id,
            kind,
        }
    }
}

/// Directory object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    /// Sorted entries for deterministic hashing
    pub entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update an entry
    pub fn insert(&mut self, entry: TreeEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Get an entry
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Iterate over entries in name order
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.values()
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}

/// Commit object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Tree object ID for this commit
    pub tree_id: ObjectId,
    /// Parent commit IDs (empty for initial commit)
    pub parents: Vec<ObjectId>,
    /// Commit message
    pub message: String,
    /// Commit timestamp (Unix seconds)
    pub timestamp: i64,
}

impl Commit {
    pub fn new(tree_id: ObjectId, parents: Vec<ObjectId>, message: impl Into<String>, timestamp: i64) -> Self {
        Self {
            tree_id,
            parents,
            message: message.into(),
            timestamp,
        }
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }

    /// Check if this is an initial commit (no parents)
    pub fn is_initial(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Generic object that can be any type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    /// Get the object kind
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Encode the payload (without the frame header)
    pub fn payload(&self) -> Result<Vec<u8>> {
        match self {
            Object::Blob(blob) => Ok(blob.data.clone()),
            Object::Tree(tree) => tree.to_bytes(),
            Object::Commit(commit) => commit.to_bytes(),
        }
    }

    /// Get the object ID
    pub fn id(&self) -> Result<ObjectId> {
        Ok(ObjectId::for_object(self.kind(), &self.payload()?))
    }

    /// Parse a payload of the given kind
    pub fn decode(kind: ObjectKind, payload: &[u8]) -> Result<Self> {
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(Blob::new(payload.to_vec())),
            ObjectKind::Tree => Object::Tree(Tree::from_bytes(payload)?),
            ObjectKind::Commit => Object::Commit(Commit::from_bytes(payload)?),
        })
    }

    /// Hashes this object points at: tree and parents for a commit, entries
    /// for a tree, nothing for a blob.
    pub fn references(&self) -> Vec<ObjectId> {
        match self {
            Object::Blob(_) => Vec::new(),
            Object::Tree(tree) => tree.iter().map(|e| e.id).collect(),
            Object::Commit(commit) => {
                let mut refs = Vec::with_capacity(commit.parents.len() + 1);
                refs.push(commit.tree_id);
                refs.extend(commit.parents.iter().copied());
                refs
            }
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Object::Blob(blob)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Object::Tree(tree)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Object::Commit(commit)
    }
}
