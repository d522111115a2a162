//! End-to-end fetch tests between two on-disk repositories

use gitlet_core::{
    Blob, Commit, Error, FetchLog, FetchService, ObjectId, ObjectKind, ObjectStore, RefChange,
    RefNamespace, Repository, Tree, TreeEntry,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

/// A local repository with `origin` pointing at a separate remote repository.
struct Fixture {
    _local_dir: TempDir,
    _remote_dir: TempDir,
    local: Repository,
    remote: Repository,
    remote_path: String,
}

impl Fixture {
    fn new() -> Self {
        let local_dir = TempDir::new().unwrap();
        let remote_dir = TempDir::new().unwrap();
        let local = Repository::init(local_dir.path()).unwrap();
        let remote = Repository::init(remote_dir.path()).unwrap();
        let remote_path = remote_dir.path().to_str().unwrap().to_string();
        local.add_remote("origin", &remote_path).unwrap();
        Self {
            _local_dir: local_dir,
            _remote_dir: remote_dir,
            local,
            remote,
            remote_path,
        }
    }

    async fn fetch(&self) -> gitlet_core::Result<gitlet_core::FetchReport> {
        FetchService::new(&self.local).fetch(Some("origin")).await
    }

    fn tracking(&self, branch: &str) -> Option<ObjectId> {
        self.local
            .refs()
            .try_read(&RefNamespace::Remote("origin".into()), branch)
            .unwrap()
    }
}

/// Commit `files` (directory, file name, content) on top of `parents`.
/// Each directory becomes a subtree of the root tree.
async fn commit(
    repo: &Repository,
    files: &[(&str, &str, &str)],
    parents: Vec<ObjectId>,
    message: &str,
) -> ObjectId {
    let store = repo.objects();
    let mut dirs: BTreeMap<&str, Tree> = BTreeMap::new();
    for (dir, name, content) in files {
        let blob = store
            .put_object(&Blob::new(content.as_bytes().to_vec()).into())
            .await
            .unwrap();
        dirs.entry(*dir)
            .or_default()
            .insert(TreeEntry::new(*name, blob, ObjectKind::Blob));
    }

    let mut root = Tree::new();
    for (dir, tree) in dirs {
        let id = store.put_object(&tree.into()).await.unwrap();
        root.insert(TreeEntry::new(dir, id, ObjectKind::Tree));
    }
    let root_id = store.put_object(&root.into()).await.unwrap();
    store
        .put_object(&Commit::new(root_id, parents, message, 1_400_000_000).into())
        .await
        .unwrap()
}

fn set_branch(repo: &Repository, name: &str, id: ObjectId) {
    repo.refs().write(&RefNamespace::Heads, name, id).unwrap();
}

async fn first_commit(repo: &Repository) -> ObjectId {
    commit(repo, &[("1a", "filea", "filea")], vec![], "first").await
}

async fn second_commit(repo: &Repository, parent: ObjectId) -> ObjectId {
    commit(
        repo,
        &[("1a", "filea", "filea"), ("1b", "fileb", "fileb")],
        vec![parent],
        "second",
    )
    .await
}

fn assert_same_objects(local: &Repository, remote: &Repository, ids: &[ObjectId]) {
    for id in ids {
        let expected = std::fs::read(remote.objects().object_path(*id)).unwrap();
        let actual = std::fs::read(local.objects().object_path(*id)).unwrap();
        assert_eq!(actual, expected, "object {} differs", id);
    }
}

#[tokio::test]
async fn test_fetch_outside_repository() {
    let tmp = TempDir::new().unwrap();
    let err = gitlet_core::fetch(tmp.path(), None).await.unwrap_err();
    assert!(matches!(err, Error::RepositoryNotFound));
    assert_eq!(
        err.to_string(),
        "fatal: Not a gitlet repository (or any of the parent directories): .gitlet"
    );
}

#[tokio::test]
async fn test_fetch_unknown_remote() {
    let tmp = TempDir::new().unwrap();
    Repository::init(tmp.path()).unwrap();
    let err = gitlet_core::fetch(tmp.path(), Some("origin")).await.unwrap_err();
    assert!(matches!(err, Error::RemoteNotFound(ref name) if name == "origin"));
    assert_eq!(
        err.to_string(),
        "fatal: 'origin' does not appear to be a git repository"
    );
}

#[tokio::test]
async fn test_fetch_without_remote_name() {
    let tmp = TempDir::new().unwrap();
    Repository::init(tmp.path()).unwrap();
    let err = gitlet_core::fetch(tmp.path(), None).await.unwrap_err();
    assert!(matches!(err, Error::Unsupported));
    assert_eq!(err.to_string(), "unsupported");
}

#[tokio::test]
async fn test_fetch_single_commit() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "master", head);

    let report = fx.fetch().await.unwrap();
    assert_eq!(report.count(), 4);
    assert_eq!(
        report.to_string(),
        format!(
            "From {}\nCount 4\n* [new branch] master -> origin/master\n",
            fx.remote_path
        )
    );

    let ids = fx.remote.objects().list().await.unwrap();
    assert_eq!(ids.len(), 4);
    assert_same_objects(&fx.local, &fx.remote, &ids);
}

#[tokio::test]
async fn test_fetch_sets_tracking_ref_to_remote_value() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "master", head);

    fx.fetch().await.unwrap();

    assert_eq!(fx.tracking("master"), Some(head));
    let remote_file =
        std::fs::read_to_string(fx.remote.git_dir().join("refs/heads/master")).unwrap();
    let local_file =
        std::fs::read_to_string(fx.local.git_dir().join("refs/remotes/origin/master")).unwrap();
    assert_eq!(local_file, remote_file);
}

#[tokio::test]
async fn test_fetch_two_commits() {
    let fx = Fixture::new();
    let first = first_commit(&fx.remote).await;
    let second = second_commit(&fx.remote, first).await;
    set_branch(&fx.remote, "master", second);

    let report = fx.fetch().await.unwrap();
    assert_eq!(report.count(), 8);

    let ids = fx.remote.objects().list().await.unwrap();
    assert_eq!(ids.len(), 8);
    assert_same_objects(&fx.local, &fx.remote, &ids);
    assert_eq!(fx.local.objects().list().await.unwrap(), ids);
}

#[tokio::test]
async fn test_fetch_objects_only_reachable_from_other_branch() {
    let fx = Fixture::new();
    let first = first_commit(&fx.remote).await;
    let second = second_commit(&fx.remote, first).await;
    set_branch(&fx.remote, "master", first);
    set_branch(&fx.remote, "other", second);

    let report = fx.fetch().await.unwrap();
    assert_eq!(report.count(), 8);
    assert_eq!(fx.tracking("other"), Some(second));

    let ids = fx.remote.objects().list().await.unwrap();
    assert_same_objects(&fx.local, &fx.remote, &ids);
}

#[tokio::test]
async fn test_fetch_branches_sharing_a_commit() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    for branch in ["master", "other1", "other2"] {
        set_branch(&fx.remote, branch, head);
    }

    let report = fx.fetch().await.unwrap();
    assert_eq!(
        report.to_string(),
        format!(
            "From {}\n\
             Count 4\n\
             * [new branch] master -> origin/master\n\
             * [new branch] other1 -> origin/other1\n\
             * [new branch] other2 -> origin/other2\n",
            fx.remote_path
        )
    );
    for branch in ["master", "other1", "other2"] {
        assert_eq!(fx.tracking(branch), Some(head));
    }
}

#[tokio::test]
async fn test_fetch_is_idempotent() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "master", head);

    fx.fetch().await.unwrap();
    let again = fx.fetch().await.unwrap();

    assert_eq!(again.count(), 0);
    assert!(again.updates().is_empty());
    assert_eq!(again.to_string(), format!("From {}\nCount 0\n", fx.remote_path));
}

#[tokio::test]
async fn test_incremental_fetch_reports_update() {
    let fx = Fixture::new();
    let first = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "master", first);
    fx.fetch().await.unwrap();

    let second = second_commit(&fx.remote, first).await;
    set_branch(&fx.remote, "master", second);
    let report = fx.fetch().await.unwrap();

    // Only the new blob, subtree, root tree and commit travel
    assert_eq!(report.count(), 4);
    assert_eq!(report.updates().len(), 1);
    assert_eq!(report.updates()[0].change, RefChange::Updated { old: first });
    assert!(report
        .to_string()
        .ends_with("* [updated] master -> origin/master\n"));
    assert_eq!(fx.tracking("master"), Some(second));
}

#[tokio::test]
async fn test_fetch_relative_remote_location() {
    let local_dir = TempDir::new().unwrap();
    let local = Repository::init(local_dir.path()).unwrap();
    let remote_root = local_dir.path().join("sub/repo2");
    std::fs::create_dir_all(&remote_root).unwrap();
    let remote = Repository::init(&remote_root).unwrap();
    let head = first_commit(&remote).await;
    set_branch(&remote, "master", head);

    local.add_remote("origin", "sub/repo2").unwrap();

    // Fetch from a nested directory: discovery finds the local root
    let nested = local_dir.path().join("deep/dir");
    std::fs::create_dir_all(&nested).unwrap();
    let report = gitlet_core::fetch(&nested, Some("origin")).await.unwrap();
    assert!(report.to_string().starts_with("From sub/repo2\nCount 4\n"));
}

#[tokio::test]
async fn test_failed_transfer_leaves_refs_untouched() {
    let fx = Fixture::new();
    let good = first_commit(&fx.remote).await;
    let dangling_tree = ObjectId::new([0xab; 32]);
    let broken = fx
        .remote
        .objects()
        .put_object(&Commit::new(dangling_tree, vec![], "broken", 0).into())
        .await
        .unwrap();
    set_branch(&fx.remote, "good", good);
    set_branch(&fx.remote, "broken", broken);

    let err = fx.fetch().await.unwrap_err();
    assert!(matches!(err, Error::ObjectNotFound(id) if id == dangling_tree));

    assert!(fx
        .local
        .refs()
        .list(&RefNamespace::Remote("origin".into()))
        .unwrap()
        .is_empty());
    assert!(!fx.local.git_dir().join("FETCH_HEAD").exists());
    assert!(FetchLog::new(fx.local.git_dir()).all().unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_records_fetch_head_and_log() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "master", head);
    set_branch(&fx.remote, "other", head);

    fx.fetch().await.unwrap();

    let fetch_head = std::fs::read_to_string(fx.local.git_dir().join("FETCH_HEAD")).unwrap();
    assert_eq!(
        fetch_head,
        format!(
            "{head}\t\tbranch 'master' of {path}\n{head}\t\tbranch 'other' of {path}\n",
            head = head,
            path = fx.remote_path
        )
    );

    let entry = FetchLog::new(fx.local.git_dir()).all().unwrap().pop().unwrap();
    assert_eq!(entry.remote, "origin");
    assert_eq!(entry.identifier, fx.remote_path);
    assert_eq!(entry.objects_transferred, 4);
    assert_eq!(entry.changed_refs, vec!["origin/master", "origin/other"]);
}

#[tokio::test]
async fn test_fetch_empty_remote() {
    let fx = Fixture::new();
    let report = fx.fetch().await.unwrap();
    assert_eq!(report.to_string(), format!("From {}\nCount 0\n", fx.remote_path));
}

#[tokio::test]
async fn test_local_branches_are_not_touched() {
    let fx = Fixture::new();
    let local_head = first_commit(&fx.local).await;
    set_branch(&fx.local, "master", local_head);

    let remote_head = second_commit(&fx.remote, first_commit(&fx.remote).await).await;
    set_branch(&fx.remote, "master", remote_head);

    let report = fx.fetch().await.unwrap();
    // The first commit is already local, so only the second one travels
    assert_eq!(report.count(), 4);
    assert_eq!(
        fx.local.refs().read(&RefNamespace::Heads, "master").unwrap(),
        local_head
    );
    assert_eq!(fx.tracking("master"), Some(remote_head));
}

#[tokio::test]
async fn test_fetch_completes_commit_stored_without_its_tree() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "master", head);

    // State left by a transfer interrupted right after storing the commit
    let (kind, payload) = fx.remote.objects().get(head).await.unwrap();
    fx.local.objects().put(kind, &payload).await.unwrap();

    let report = fx.fetch().await.unwrap();
    assert_eq!(report.count(), 4);
    assert_eq!(fx.tracking("master"), Some(head));

    let ids = fx.remote.objects().list().await.unwrap();
    for id in &ids {
        assert!(fx.local.objects().has(*id).await.unwrap(), "{} missing locally", id);
    }
    assert_same_objects(&fx.local, &fx.remote, &ids);
}

#[tokio::test]
async fn test_leftover_nested_tracking_ref_conflicts() {
    let fx = Fixture::new();
    let head = first_commit(&fx.remote).await;
    set_branch(&fx.remote, "a", head);

    let origin = RefNamespace::Remote("origin".into());
    let stale = ObjectId::new([5u8; 32]);
    fx.local.refs().write(&origin, "a/b", stale).unwrap();

    let err = fx.fetch().await.unwrap_err();
    assert!(matches!(
        err,
        Error::RefConflict { ref existing, .. } if existing == "remotes/origin/a/b"
    ));
    assert_eq!(
        err.to_string(),
        "cannot lock ref 'remotes/origin/a': 'remotes/origin/a/b' exists"
    );

    assert_eq!(fx.tracking("a/b"), Some(stale));
    assert!(fx.local.objects().list().await.unwrap().is_empty());
    assert!(!fx.local.git_dir().join("FETCH_HEAD").exists());
}
