//! Commit graph reachability
//!
//! Computes the set of objects reachable from a set of start hashes that the
//! local store does not have yet. The walk is iterative (explicit stack plus
//! visited set), so history depth is bounded by memory rather than by the
//! call stack. A hash already present locally is pruned together with
//! everything behind it: a local object implies its whole closure is local.
//!
//! Objects come back children first (post-order): a tree after its entries,
//! a commit after its tree and parents. Storing them in that order keeps the
//! pruning assumption true even when a fetch is interrupted halfway through.

use bytes::Bytes;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::object::{Object, ObjectId, ObjectKind};
use crate::storage::{ObjectSource, ObjectStore};

/// One object pulled from the source during a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub payload: Bytes,
}

/// Result of a closure computation
#[derive(Debug, Default)]
pub struct Closure {
    /// Missing objects, each one after every object it references
    pub objects: Vec<FetchedObject>,
    /// Number of visited hashes that were already known locally
    pub pruned: usize,
}

impl Closure {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// IDs of the missing objects
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().map(|o| o.id)
    }
}

enum Step {
    /// Visit a hash
    Enter(ObjectId),
    /// Every child of this object has been emitted
    Exit(FetchedObject),
}

/// Walk everything reachable from `start`, skipping what `local` already holds
/// and pulling the rest from `source`.
///
/// Each fetched object is hash-checked against the ID it was requested under.
pub async fn closure<L, S>(
    start: impl IntoIterator<Item = ObjectId>,
    local: &L,
    source: &S,
) -> Result<Closure>
where
    L: ObjectStore + ?Sized,
    S: ObjectSource + ?Sized,
{
    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut stack: Vec<Step> = start.into_iter().map(Step::Enter).collect();
    stack.reverse();

    let mut result = Closure::default();

    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Exit(object) => {
                tracing::debug!(object = %object.id, kind = %object.kind, "discovered missing object");
                result.objects.push(object);
                continue;
            }
            Step::Enter(id) => id,
        };
        if !visited.insert(id) {
            continue;
        }

        if known_locally(local, id).await? {
            tracing::debug!(object = %id, "pruned: already present locally");
            result.pruned += 1;
            continue;
        }

        let (kind, payload) = source.fetch_object(id).await?;
        let actual = ObjectId::for_object(kind, &payload);
        if actual != id {
            return Err(Error::ObjectIntegrity {
                expected: id,
                actual,
            });
        }

        let children = Object::decode(kind, &payload)?.references();
        stack.push(Step::Exit(FetchedObject { id, kind, payload }));
        for child in children.into_iter().rev() {
            if !visited.contains(&child) {
                stack.push(Step::Enter(child));
            }
        }
    }

    Ok(result)
}

/// A local object only counts as known when everything it references is
/// local too. An object stored without its children is walked again.
async fn known_locally<L: ObjectStore + ?Sized>(local: &L, id: ObjectId) -> Result<bool> {
    if !local.has(id).await? {
        return Ok(false);
    }
    let (kind, payload) = local.get(id).await?;
    for child in Object::decode(kind, &payload)?.references() {
        if !local.has(child).await? {
            tracing::warn!(object = %id, missing = %child, "local object is incomplete, fetching again");
            return Ok(false);
        }
    }
    Ok(true)
}
