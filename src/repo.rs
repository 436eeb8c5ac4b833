//! Composition root. `Repository` is the single type CLI commands depend
//! on; it owns no state beyond the root path and re-derives ref/index state
//! fresh on every call, per the "Global state" design note in §9.

use std::path::{Path, PathBuf};

use crate::commit::{Ident, build_commit};
use crate::config::resolve_author;
use crate::digest::{Digest, ObjectKind, hash_framed};
use crate::error::{GitError, Result};
use crate::index::{self, IndexEntry};
use crate::merge::{self, MergeOutcome};
use crate::refs::{self, Head};
use crate::status::{self, Status};
use crate::store::ObjectStore;
use crate::tree::FileMode;
use crate::tree_builder::build_tree_from_index;
use crate::worktree::{dirty_paths, flatten_tree, materialize};

pub struct Repository {
    root: PathBuf,
    store: ObjectStore,
}

impl Repository {
    /// Initializes a new repository at `root`: `objects/`, `refs/heads/`,
    /// and `HEAD` symbolic to `refs/heads/main` with no backing file yet
    /// (Invariant R1).
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("objects")).map_err(GitError::io)?;
        std::fs::create_dir_all(root.join("refs").join("heads")).map_err(GitError::io)?;
        refs::set_head_symbolic(&root, "main")?;
        log::info!("initialized repository at {:?}", root);
        Ok(Repository {
            store: ObjectStore::new(&root),
            root,
        })
    }

    /// Opens a repository whose root is exactly `root` (no upward walk).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.join("objects").is_dir() || !root.join("HEAD").is_file() {
            return Err(GitError::NotARepository);
        }
        Ok(Repository {
            store: ObjectStore::new(&root),
            root,
        })
    }

    /// Walks upward from `start` until a directory containing both
    /// `objects/` and `HEAD` is found (the boundary helper noted in §9).
    pub fn discover(start: impl Into<PathBuf>) -> Result<Self> {
        let mut dir = start.into();
        loop {
            if dir.join("objects").is_dir() && dir.join("HEAD").is_file() {
                return Repository::open(dir);
            }
            if !dir.pop() {
                return Err(GitError::NotARepository);
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Stages `rel_path` (relative to the repo root): hashes its current
    /// bytes as a blob, writes the blob, and inserts/overwrites the index
    /// entry. Preserves the executable bit from the filesystem.
    pub fn stage_file(&self, rel_path: &str) -> Result<Digest> {
        let full = self.root.join(rel_path);
        let bytes = std::fs::read(&full).map_err(|e| GitError::io_at(&full, e))?;
        let (digest, framed) = hash_framed(ObjectKind::Blob, &bytes);
        self.store.write(&digest, &framed)?;

        let mode = file_mode_of(&full)?;
        index::add_entry(&self.root, rel_path, digest, mode)?;
        log::debug!("staged {rel_path} -> {digest}");
        Ok(digest)
    }

    pub fn unstage_file(&self, rel_path: &str) -> Result<()> {
        index::remove_entry(&self.root, rel_path)
    }

    pub fn head(&self) -> Result<Head> {
        refs::get_head(&self.root)
    }

    pub fn head_commit(&self) -> Result<Option<Digest>> {
        match self.head()? {
            Head::Branch { digest, .. } => Ok(digest),
            Head::Detached { digest } => Ok(Some(digest)),
        }
    }

    fn head_tree(&self) -> Result<Option<Digest>> {
        match self.head_commit()? {
            Some(commit_digest) => {
                let (_, content) = self.store.read(&commit_digest)?;
                Ok(Some(crate::commit::parse_commit(&content)?.tree))
            }
            None => Ok(None),
        }
    }

    /// Builds a tree from the current index, writes a commit whose parent
    /// is the current HEAD commit (0 or 1 parent), updates the current
    /// branch ref (or `HEAD` directly when detached), and returns the new
    /// commit digest (§4.14). An empty index yields the canonical empty
    /// tree — refusing "nothing to commit" is a CLI-level decision, not an
    /// engine invariant (§3's Invariant T2 note).
    pub fn commit(&self, message: &str) -> Result<Digest> {
        let index_map = index::read_index(&self.root)?;
        let tree = build_tree_from_index(&self.store, &index_map)?;

        let head = self.head()?;
        let parents: Vec<Digest> = match &head {
            Head::Branch { digest: Some(d), .. } => vec![*d],
            Head::Branch { digest: None, .. } => vec![],
            Head::Detached { digest } => vec![*digest],
        };

        let author = resolve_author(&self.root)?;
        let committer = author.clone();
        let (commit_digest, framed, _) =
            build_commit(tree, parents, author, committer, message.to_string());
        self.store.write(&commit_digest, &framed)?;

        match head {
            Head::Branch { name, .. } => {
                refs::update_ref(&self.root, &format!("refs/heads/{name}"), commit_digest)?;
            }
            Head::Detached { .. } => {
                refs::set_head_detached(&self.root, commit_digest)?;
            }
        }

        log::info!("created commit {commit_digest}");
        Ok(commit_digest)
    }

    pub fn create_branch(&self, name: &str, at: Digest) -> Result<()> {
        refs::create_branch(&self.root, name, at)
    }

    pub fn delete_branch(&self, name: &str) -> Result<()> {
        refs::delete_branch(&self.root, name)
    }

    pub fn list_branches(&self) -> Result<Vec<String>> {
        refs::list_branches(&self.root)
    }

    pub fn current_branch(&self) -> Result<Option<String>> {
        refs::current_branch(&self.root)
    }

    /// Checks out an existing branch: dirty-guard, materialize, replace
    /// index, then point `HEAD` at the branch symbolically (§4.13).
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        let target_digest = refs::resolve_ref(&self.root, &format!("refs/heads/{name}"))?
            .ok_or_else(|| GitError::InvalidRef(name.to_string()))?;
        self.checkout_to_tree_of(target_digest)?;
        refs::set_head_symbolic(&self.root, name)
    }

    /// Checks out a commit directly, leaving `HEAD` detached.
    pub fn checkout_detached(&self, digest: Digest) -> Result<()> {
        self.checkout_to_tree_of(digest)?;
        refs::set_head_detached(&self.root, digest)
    }

    fn checkout_to_tree_of(&self, commit_digest: Digest) -> Result<()> {
        let (_, content) = self.store.read(&commit_digest)?;
        let commit = crate::commit::parse_commit(&content)?;

        let current_index = index::read_index(&self.root)?;
        let dirty = dirty_paths(&self.root, &current_index)?;
        if !dirty.is_empty() {
            return Err(GitError::DirtyWorkingTree(dirty));
        }

        let target = flatten_tree(&self.store, commit.tree)?;
        materialize(&self.root, &self.store, &current_index, &target)?;
        index::write_index(&self.root, &target)
    }

    /// Merges `branch_name` into the branch currently checked out (fails if
    /// `HEAD` is detached — there is no branch ref to advance).
    pub fn merge_branch(&self, branch_name: &str) -> Result<MergeOutcome> {
        let current = self
            .current_branch()?
            .ok_or(GitError::InvalidRef("HEAD".to_string()))?;
        let ours = refs::resolve_ref(&self.root, &format!("refs/heads/{current}"))?
            .ok_or_else(|| GitError::InvalidRef(current.clone()))?;
        let theirs = refs::resolve_ref(&self.root, &format!("refs/heads/{branch_name}"))?
            .ok_or_else(|| GitError::InvalidRef(branch_name.to_string()))?;
        let committer = resolve_author(&self.root)?;

        merge::merge(
            &self.root,
            &self.store,
            &format!("refs/heads/{current}"),
            ours,
            theirs,
            branch_name,
            committer,
        )
    }

    pub fn status(&self) -> Result<Status> {
        let head_tree = self.head_tree()?;
        status::status(&self.root, &self.store, head_tree)
    }

    pub fn index(&self) -> Result<std::collections::BTreeMap<String, IndexEntry>> {
        index::read_index(&self.root)
    }
}

#[cfg(unix)]
fn file_mode_of(path: &Path) -> Result<FileMode> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path).map_err(|e| GitError::io_at(path, e))?;
    Ok(if meta.permissions().mode() & 0o111 != 0 {
        FileMode::Executable
    } else {
        FileMode::Regular
    })
}

#[cfg(not(unix))]
fn file_mode_of(_path: &Path) -> Result<FileMode> {
    Ok(FileMode::Regular)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(
            repo.head().unwrap(),
            Head::Branch {
                name: "main".into(),
                digest: None
            }
        );
    }

    #[test]
    fn discover_walks_up_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        let sub = dir.path().join("a/b/c");
        std::fs::create_dir_all(&sub).unwrap();

        let repo = Repository::discover(sub).unwrap();
        assert_eq!(repo.root(), dir.path());
    }

    #[test]
    fn stage_and_commit_dedup_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), "same content").unwrap();
        std::fs::write(dir.path().join("b.txt"), "same content").unwrap();

        let da = repo.stage_file("a.txt").unwrap();
        let db = repo.stage_file("b.txt").unwrap();
        assert_eq!(da, db);

        let commit_digest = repo.commit("initial").unwrap();
        assert_eq!(repo.head_commit().unwrap(), Some(commit_digest));
    }

    #[test]
    fn fast_forward_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        std::fs::write(dir.path().join("base.txt"), "base").unwrap();
        repo.stage_file("base.txt").unwrap();
        let c1 = repo.commit("base").unwrap();

        repo.create_branch("feature", c1).unwrap();
        repo.checkout_branch("feature").unwrap();
        std::fs::write(dir.path().join("feature.txt"), "feature work").unwrap();
        repo.stage_file("feature.txt").unwrap();
        let _c2 = repo.commit("feature work").unwrap();

        repo.checkout_branch("main").unwrap();
        assert!(!dir.path().join("feature.txt").is_file());

        let outcome = repo.merge_branch("feature").unwrap();
        assert!(matches!(outcome, MergeOutcome::FastForward { .. }));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("feature.txt")).unwrap(),
            "feature work"
        );
    }
}
