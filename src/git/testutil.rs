//! Fixture repositories for unit tests, built directly with git2 so
//! commit timestamps and parent lists are deterministic.

use std::collections::BTreeMap;

use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;

use super::repository::GitRepo;

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let repo = Repository::init(dir.path()).expect("init repository");
        Self { dir, repo }
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn open(&self) -> GitRepo {
        GitRepo::open(self.dir.path()).expect("open fixture repository")
    }

    fn signature(&self, seconds: i64) -> Signature<'static> {
        Signature::new("Test User", "test@example.com", &Time::new(seconds, 0))
            .expect("build signature")
    }

    /// Commits a single-file change on top of the first parent's tree
    /// (flat path, no directories). Does not move any ref.
    pub fn commit_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        seconds: i64,
        parents: &[Oid],
    ) -> Oid {
        let blob = self.repo.blob(content.as_bytes()).expect("write blob");
        let base_tree = parents.first().map(|&p| {
            let commit = self.repo.find_commit(p).expect("find parent");
            commit.tree().expect("parent tree")
        });
        let mut builder = self
            .repo
            .treebuilder(base_tree.as_ref())
            .expect("treebuilder");
        builder.insert(path, blob, 0o100644).expect("insert blob");
        let tree_id = builder.write().expect("write tree");
        self.commit_with_tree(tree_id, message, seconds, parents)
    }

    /// Commits a full tree described by (path, content) pairs; nested
    /// paths become subtrees. Does not move any ref.
    pub fn commit_tree(
        &self,
        files: &[(&str, &str)],
        message: &str,
        seconds: i64,
        parents: &[Oid],
    ) -> Oid {
        let tree_id = build_tree(&self.repo, files);
        self.commit_with_tree(tree_id, message, seconds, parents)
    }

    fn commit_with_tree(
        &self,
        tree_id: Oid,
        message: &str,
        seconds: i64,
        parents: &[Oid],
    ) -> Oid {
        let tree = self.repo.find_tree(tree_id).expect("find tree");
        let parent_commits: Vec<_> = parents
            .iter()
            .map(|&p| self.repo.find_commit(p).expect("find parent"))
            .collect();
        let parent_refs: Vec<_> = parent_commits.iter().collect();
        let sig = self.signature(seconds);
        self.repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .expect("create commit")
    }

    /// Points `refs/heads/<name>` at a commit.
    pub fn branch(&self, name: &str, target: Oid) {
        self.repo
            .reference(&format!("refs/heads/{name}"), target, true, "test")
            .expect("create branch");
    }

    /// Creates a lightweight tag.
    pub fn tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).expect("find object");
        self.repo
            .tag_lightweight(name, &object, true)
            .expect("create tag");
    }

    /// Points HEAD at a branch.
    pub fn set_head(&self, branch: &str) {
        self.repo
            .set_head(&format!("refs/heads/{branch}"))
            .expect("set HEAD");
    }
}

fn build_tree(repo: &Repository, files: &[(&str, &str)]) -> Oid {
    let mut blobs: Vec<(String, Oid)> = Vec::new();
    let mut dirs: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (path, content) in files {
        match path.split_once('/') {
            None => {
                let blob = repo.blob(content.as_bytes()).expect("write blob");
                blobs.push((path.to_string(), blob));
            }
            Some((dir, rest)) => dirs
                .entry(dir.to_string())
                .or_default()
                .push((rest.to_string(), content.to_string())),
        }
    }

    let mut builder = repo.treebuilder(None).expect("treebuilder");
    for (name, blob) in blobs {
        builder.insert(&name, blob, 0o100644).expect("insert blob");
    }
    for (dir, children) in dirs {
        let nested: Vec<(&str, &str)> = children
            .iter()
            .map(|(p, c)| (p.as_str(), c.as_str()))
            .collect();
        let subtree = build_tree(repo, &nested);
        builder.insert(&dir, subtree, 0o040000).expect("insert subtree");
    }
    builder.write().expect("write tree")
}
