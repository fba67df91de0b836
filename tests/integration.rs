//! Integration tests for the gitsql library API.
//!
//! Fixture repositories are built directly with git2 so timestamps and
//! parent order are deterministic.

use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;

use gitsql::{ConnectOptions, Connection, Error};

struct Fixture {
    dir: TempDir,
    repo: Repository,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let repo = Repository::init(dir.path()).expect("init repository");
        Self { dir, repo }
    }

    fn sig(&self, seconds: i64) -> Signature<'static> {
        Signature::new("Test User", "test@example.com", &Time::new(seconds, 0))
            .expect("build signature")
    }

    /// Commits a single file on top of the first parent's tree.
    fn commit(
        &self,
        path: &str,
        content: &str,
        message: &str,
        seconds: i64,
        parents: &[Oid],
    ) -> Oid {
        let blob = self.repo.blob(content.as_bytes()).expect("write blob");
        let base = parents.first().map(|&p| {
            self.repo
                .find_commit(p)
                .expect("find parent")
                .tree()
                .expect("parent tree")
        });
        let mut builder = self.repo.treebuilder(base.as_ref()).expect("treebuilder");
        builder.insert(path, blob, 0o100644).expect("insert blob");
        let tree_id = builder.write().expect("write tree");
        self.commit_tree(tree_id, message, seconds, parents)
    }

    /// Commits an empty tree.
    fn commit_empty(&self, message: &str, seconds: i64) -> Oid {
        let tree_id = self
            .repo
            .treebuilder(None)
            .expect("treebuilder")
            .write()
            .expect("write tree");
        self.commit_tree(tree_id, message, seconds, &[])
    }

    fn commit_tree(&self, tree_id: Oid, message: &str, seconds: i64, parents: &[Oid]) -> Oid {
        let tree = self.repo.find_tree(tree_id).expect("find tree");
        let parent_commits: Vec<_> = parents
            .iter()
            .map(|&p| self.repo.find_commit(p).expect("find parent"))
            .collect();
        let parent_refs: Vec<_> = parent_commits.iter().collect();
        let sig = self.sig(seconds);
        self.repo
            .commit(None, &sig, &sig, message, &tree, &parent_refs)
            .expect("create commit")
    }

    fn branch(&self, name: &str, target: Oid) {
        self.repo
            .reference(&format!("refs/heads/{name}"), target, true, "test")
            .expect("create branch");
    }

    fn tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).expect("find object");
        self.repo
            .tag_lightweight(name, &object, true)
            .expect("create tag");
    }

    fn set_head(&self, branch: &str) {
        self.repo
            .set_head(&format!("refs/heads/{branch}"))
            .expect("set HEAD");
    }

    fn connect(&self) -> Connection {
        Connection::open_with(ConnectOptions::new(self.dir.path())).expect("open connection")
    }
}

/// main: a <- b <- c, feature: b <- d. Four distinct reachable commits.
fn branched_fixture() -> (Fixture, [Oid; 4]) {
    let fx = Fixture::new();
    let a = fx.commit("f.txt", "one\n", "first", 1_700_000_000, &[]);
    let b = fx.commit("f.txt", "two\n", "second", 1_700_000_100, &[a]);
    let c = fx.commit("f.txt", "three\n", "third", 1_700_000_200, &[b]);
    let d = fx.commit("g.txt", "side\n", "feature work", 1_700_000_300, &[b]);
    fx.branch("main", c);
    fx.branch("feature", d);
    fx.set_head("main");
    (fx, [a, b, c, d])
}

#[test]
fn commits_scan_returns_each_reachable_commit_once() {
    let (fx, ids) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT id FROM commits")
        .expect("query commits");
    assert_eq!(result.row_count(), 4, "one row per reachable commit");

    let mut seen: Vec<String> = result
        .rows
        .iter()
        .map(|r| r[0].as_str().unwrap().to_string())
        .collect();
    seen.sort();
    let mut expected: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn commits_scan_orders_reverse_chronologically() {
    let (fx, ids) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT id, committed_at FROM commits")
        .expect("query commits");
    // d (newest) first, a (oldest) last.
    assert_eq!(result.rows[0][0].as_str().unwrap(), ids[3].to_string());
    assert_eq!(result.rows[3][0].as_str().unwrap(), ids[0].to_string());
}

#[test]
fn commits_with_pushed_ref_walks_only_that_history() {
    let (fx, ids) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT id FROM commits('feature')")
        .expect("query commits(feature)");
    let seen: Vec<&str> = result.rows.iter().map(|r| r[0].as_str().unwrap()).collect();
    // feature reaches d, b, a but not c.
    assert_eq!(seen.len(), 3);
    assert!(!seen.contains(&ids[2].to_string().as_str()));
}

#[test]
fn unknown_pushed_ref_yields_empty_result() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT id FROM commits WHERE at_ref = 'doesnotexist'")
        .expect("query with unknown ref predicate");
    assert!(result.is_empty());
}

#[test]
fn connection_ref_narrows_default_scans() {
    let (fx, _) = branched_fixture();
    let conn = Connection::open_with(
        ConnectOptions::new(fx.dir.path()).with_ref("feature"),
    )
    .expect("open with ref");

    let result = conn.query("SELECT id FROM commits").expect("query commits");
    assert_eq!(result.row_count(), 3);
}

#[test]
fn depth_bounds_the_walk_to_the_tips() {
    let (fx, _) = branched_fixture();
    let conn =
        Connection::open_with(ConnectOptions::new(fx.dir.path()).with_depth(1))
            .expect("open with depth");

    let result = conn.query("SELECT id FROM commits").expect("query commits");
    // Only the two branch tips at depth 1.
    assert_eq!(result.row_count(), 2);
}

#[test]
fn commit_parents_round_trips_parent_order() {
    let (fx, ids) = branched_fixture();
    // Merge with explicitly ordered parents (c, d).
    let merge = fx.commit(
        "f.txt",
        "merged\n",
        "merge feature",
        1_700_000_400,
        &[ids[2], ids[3]],
    );
    fx.branch("main", merge);
    let conn = fx.connect();

    let result = conn
        .query(&format!(
            "SELECT parent_id FROM commit_parents WHERE commit_id = '{merge}' ORDER BY parent_index"
        ))
        .expect("query commit_parents");
    let parents: Vec<&str> = result.rows.iter().map(|r| r[0].as_str().unwrap()).collect();
    assert_eq!(parents, vec![ids[2].to_string(), ids[3].to_string()]);
}

#[test]
fn root_commit_has_no_parent_rows() {
    let (fx, ids) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query(&format!(
            "SELECT parent_id FROM commit_parents WHERE commit_id = '{}'",
            ids[0]
        ))
        .expect("query commit_parents");
    assert!(result.is_empty());
}

#[test]
fn refs_table_lists_branches_and_tags() {
    let (fx, ids) = branched_fixture();
    fx.tag("v1.0", ids[2]);
    let conn = fx.connect();

    let result = conn
        .query("SELECT name, kind, target_commit_id FROM refs ORDER BY name")
        .expect("query refs");
    let names: Vec<&str> = result.rows.iter().map(|r| r[0].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["refs/heads/feature", "refs/heads/main", "refs/tags/v1.0"]
    );
    let kinds: Vec<&str> = result.rows.iter().map(|r| r[1].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["branch", "branch", "tag"]);
    assert_eq!(
        result.rows[2][2].as_str().unwrap(),
        ids[2].to_string(),
        "tag peels to its commit"
    );
}

#[test]
fn refs_pushdown_by_name() {
    let (fx, ids) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT target_commit_id FROM refs WHERE name = 'refs/heads/main'")
        .expect("query refs by name");
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0][0].as_str().unwrap(), ids[2].to_string());

    let result = conn
        .query("SELECT target_commit_id FROM refs WHERE name = 'feature'")
        .expect("query refs by shorthand");
    assert_eq!(result.row_count(), 1);
}

#[test]
fn files_lists_full_paths_for_a_commit() {
    let fx = Fixture::new();
    let blob_a = fx.repo.blob(b"fn main() {}\n").expect("blob");
    let mut inner = fx.repo.treebuilder(None).expect("treebuilder");
    inner.insert("lib.rs", blob_a, 0o100644).expect("insert");
    let inner_id = inner.write().expect("write tree");

    let blob_b = fx.repo.blob(b"# readme\n").expect("blob");
    let mut root = fx.repo.treebuilder(None).expect("treebuilder");
    root.insert("README.md", blob_b, 0o100644).expect("insert");
    root.insert("src", inner_id, 0o040000).expect("insert");
    let root_id = root.write().expect("write tree");
    let commit = fx.commit_tree(root_id, "layout", 1_700_000_000, &[]);
    fx.branch("main", commit);
    fx.set_head("main");
    let conn = fx.connect();

    let result = conn
        .query(&format!(
            "SELECT path, mode, size FROM files WHERE commit_id = '{commit}' ORDER BY path"
        ))
        .expect("query files");
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.rows[0][0].as_str().unwrap(), "README.md");
    assert_eq!(result.rows[0][1].as_str().unwrap(), "100644");
    assert_eq!(result.rows[0][2].as_i64().unwrap(), 9);
    assert_eq!(result.rows[1][0].as_str().unwrap(), "src/lib.rs");
}

#[test]
fn files_of_an_empty_tree_commit_returns_zero_rows() {
    let fx = Fixture::new();
    let commit = fx.commit_empty("empty", 1_700_000_000);
    fx.branch("main", commit);
    fx.set_head("main");
    let conn = fx.connect();

    let result = conn
        .query(&format!("SELECT path FROM files WHERE commit_id = '{commit}'"))
        .expect("query files");
    assert!(result.is_empty());
}

#[test]
fn files_pushdown_avoids_walking_unrelated_commits() {
    let fx = Fixture::new();
    let mut parents = Vec::new();
    let mut first = None;
    for i in 0..6 {
        let id = fx.commit(
            "f.txt",
            &format!("revision {i}\n"),
            &format!("commit {i}"),
            1_700_000_000 + i * 100,
            &parents,
        );
        first.get_or_insert(id);
        parents = vec![id];
    }
    fx.branch("main", parents[0]);
    fx.set_head("main");
    let conn = fx.connect();

    let target = first.unwrap();
    let result = conn
        .query(&format!("SELECT path FROM files WHERE commit_id = '{target}'"))
        .expect("query files");
    assert_eq!(result.row_count(), 1);

    let stats = conn.reader_stats();
    assert_eq!(
        stats.commits, 1,
        "equality on commit_id must load only that commit, got {stats:?}"
    );
}

#[test]
fn blame_attributes_lines_to_their_introducing_commits() {
    let fx = Fixture::new();
    let base = "l1\nl2\nl3\nl4\nl5\n";
    let a = fx.commit("f.txt", base, "create file", 1_700_000_000, &[]);
    let b = fx.commit(
        "f.txt",
        "l1\nl2-edited\nl3\nl4\nl5\n",
        "edit line 2",
        1_700_000_100,
        &[a],
    );
    let c = fx.commit(
        "f.txt",
        "l1\nl2-edited\nl3\nl4\nl5-edited\n",
        "edit line 5",
        1_700_000_200,
        &[b],
    );
    fx.branch("main", c);
    fx.set_head("main");
    let conn = fx.connect();

    let result = conn
        .query("SELECT line_no, commit_id, line_content FROM blame('f.txt') ORDER BY line_no")
        .expect("query blame");
    assert_eq!(result.row_count(), 5);

    let attribution: Vec<&str> = result.rows.iter().map(|r| r[1].as_str().unwrap()).collect();
    assert_eq!(attribution[0], a.to_string());
    assert_eq!(attribution[1], b.to_string());
    assert_eq!(attribution[2], a.to_string());
    assert_eq!(attribution[3], a.to_string());
    assert_eq!(attribution[4], c.to_string());
    assert_eq!(result.rows[4][2].as_str().unwrap(), "l5-edited");
}

#[test]
fn blame_at_an_explicit_commit() {
    let fx = Fixture::new();
    let a = fx.commit("f.txt", "x\ny\n", "create", 1_700_000_000, &[]);
    let b = fx.commit("f.txt", "x\ny-edited\n", "edit", 1_700_000_100, &[a]);
    fx.branch("main", b);
    fx.set_head("main");
    let conn = fx.connect();

    // Blaming at the first commit sees only its version.
    let result = conn
        .query(&format!(
            "SELECT commit_id FROM blame WHERE path = 'f.txt' AND at_commit = '{a}'"
        ))
        .expect("query blame at commit");
    assert_eq!(result.row_count(), 2);
    assert!(result
        .rows
        .iter()
        .all(|r| r[0].as_str().unwrap() == a.to_string()));
}

#[test]
fn blame_for_a_missing_path_is_empty() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT * FROM blame('no/such/file.rs')")
        .expect("query blame");
    assert!(result.is_empty());
}

#[test]
fn truncated_scan_leaves_the_connection_usable() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    // LIMIT abandons the cursor before exhaustion; its walk state must be
    // released and later queries must still work.
    let result = conn
        .query("SELECT id FROM commits LIMIT 1")
        .expect("truncated query");
    assert_eq!(result.row_count(), 1);

    let result = conn
        .query("SELECT COUNT(*) FROM commits")
        .expect("follow-up query");
    assert_eq!(result.rows[0][0].as_i64().unwrap(), 4);

    let result = conn
        .query("SELECT path FROM files LIMIT 1")
        .expect("truncated files query");
    assert_eq!(result.row_count(), 1);
}

#[test]
fn nonexistent_path_fails_at_open() {
    let err = Connection::open("gitsql:///nonexistent/path").unwrap_err();
    assert!(matches!(err, Error::RepositoryNotFound(_)));
}

#[test]
fn bad_connection_ref_fails_at_first_use() {
    let (fx, _) = branched_fixture();
    let conn = Connection::open_with(
        ConnectOptions::new(fx.dir.path()).with_ref("doesnotexist"),
    )
    .expect("open succeeds; the ref is resolved lazily");

    let err = conn.query("SELECT id FROM commits").unwrap_err();
    assert!(matches!(err, Error::RefNotFound(_)));
}

#[test]
fn write_statements_are_rejected() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    for sql in [
        "INSERT INTO commits (id) VALUES ('x')",
        "UPDATE refs SET name = 'x' WHERE 1 = 1",
        "DELETE FROM files WHERE 1 = 1",
        "DROP TABLE commits",
    ] {
        let err = conn.query(sql).unwrap_err();
        assert!(
            matches!(err, Error::UnsupportedOperation(_)),
            "expected rejection for {sql}"
        );
    }
}

#[test]
fn opening_by_url_selects_ref_and_depth() {
    let (fx, _) = branched_fixture();
    let url = format!(
        "gitsql://{}?ref=feature&depth=1",
        fx.dir.path().display()
    );
    let conn = Connection::open(&url).expect("open by url");

    let result = conn.query("SELECT id FROM commits").expect("query commits");
    assert_eq!(result.row_count(), 1, "depth=1 yields the feature tip only");
}

#[test]
fn author_columns_and_epoch_timestamps() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT author_name, author_email, authored_at FROM commits LIMIT 1")
        .expect("query commits");
    assert_eq!(result.rows[0][0].as_str().unwrap(), "Test User");
    assert_eq!(result.rows[0][1].as_str().unwrap(), "test@example.com");
    assert_eq!(result.rows[0][2].as_i64().unwrap(), 1_700_000_300);
}

#[test]
fn commit_date_formats_epoch_seconds() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT commit_date(0)")
        .expect("query commit_date");
    assert_eq!(
        result.rows[0][0].as_str().unwrap(),
        "1970-01-01T00:00:00Z"
    );
}

#[test]
fn json_array_output_keys_rows_by_column() {
    let (fx, _) = branched_fixture();
    let conn = fx.connect();

    let result = conn
        .query("SELECT short_id, summary FROM commits LIMIT 1")
        .expect("query commits");
    let json = result.to_json_array();
    assert_eq!(json.len(), 1);
    assert!(json[0].get("short_id").is_some());
    assert_eq!(json[0].get("summary").unwrap().as_str().unwrap(), "feature work");
}

#[test]
fn two_repositories_coexist_in_one_process() {
    let (fx_a, _) = branched_fixture();
    let fx_b = Fixture::new();
    let only = fx_b.commit("solo.txt", "alone\n", "solo", 1_700_000_000, &[]);
    fx_b.branch("main", only);
    fx_b.set_head("main");

    let conn_a = fx_a.connect();
    let conn_b = fx_b.connect();
    assert_eq!(
        conn_a
            .query("SELECT COUNT(*) FROM commits")
            .unwrap()
            .rows[0][0]
            .as_i64()
            .unwrap(),
        4
    );
    assert_eq!(
        conn_b
            .query("SELECT COUNT(*) FROM commits")
            .unwrap()
            .rows[0][0]
            .as_i64()
            .unwrap(),
        1
    );
}
