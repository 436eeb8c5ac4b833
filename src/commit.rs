//! Commit object build & parse (§4.5).
//!
//! A commit is UTF-8 text: a header block (`tree`, `parent` x0-2, `author`,
//! `committer`), a blank line, then the message. Invariant C1.

use chrono::Local;

use crate::digest::{Digest, ObjectKind, hash_framed, parse_framed};
use crate::error::{GitError, Result};

/// Author/committer identity: name, email, and the moment the commit was
/// authored, expressed the way git's commit header does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    /// `±HHMM`, e.g. `+0000`, `-0530`.
    pub tz_offset: String,
}

impl Ident {
    /// Builds an identity stamped with the current local time, per the
    /// timezone-sign convention noted in §9: offset is `+` when the
    /// minutes-behind-UTC measurement is `<= 0`.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Local::now();
        let timestamp = now.timestamp();
        let offset_seconds = now.offset().local_minus_utc();
        let tz_offset = format_offset(offset_seconds);
        Ident {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset,
        }
    }

    fn format_line(&self, field: &str) -> String {
        format!(
            "{} {} <{}> {} {}",
            field, self.name, self.email, self.timestamp, self.tz_offset
        )
    }

    fn parse_line(line: &str, field: &str) -> Result<Self> {
        let rest = line
            .strip_prefix(field)
            .ok_or_else(|| GitError::Corrupted(format!("expected {field} line")))?
            .trim_start();
        let (name_email, rest) = rest
            .rsplit_once('>')
            .ok_or_else(|| GitError::Corrupted("malformed ident line".into()))?;
        let (name, email) = name_email
            .split_once('<')
            .ok_or_else(|| GitError::Corrupted("malformed ident line".into()))?;
        let name = name.trim().to_string();
        let email = email.trim().to_string();
        let mut parts = rest.split_whitespace();
        let timestamp: i64 = parts
            .next()
            .ok_or_else(|| GitError::Corrupted("ident missing timestamp".into()))?
            .parse()
            .map_err(|_| GitError::Corrupted("ident timestamp is not a number".into()))?;
        let tz_offset = parts
            .next()
            .ok_or_else(|| GitError::Corrupted("ident missing timezone".into()))?
            .to_string();
        Ok(Ident {
            name,
            email,
            timestamp,
            tz_offset,
        })
    }
}

fn format_offset(offset_seconds: i32) -> String {
    let hours = offset_seconds / 3600;
    let minutes = offset_seconds.abs() % 3600 / 60;
    format!("{:+03}{:02}", hours, minutes)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub tree: Digest,
    pub parents: Vec<Digest>,
    pub author: Ident,
    pub committer: Ident,
    pub message: String,
}

/// Builds the commit text, frames and hashes it, and returns
/// `(digest, framed_bytes, commit)`. Parent lines are emitted in the given
/// order (merge commits: ours first, theirs second, per Invariant C1).
pub fn build_commit(
    tree: Digest,
    parents: Vec<Digest>,
    author: Ident,
    committer: Ident,
    message: String,
) -> (Digest, Vec<u8>, Commit) {
    let mut text = String::new();
    text.push_str(&format!("tree {}\n", tree.to_hex()));
    for parent in &parents {
        text.push_str(&format!("parent {}\n", parent.to_hex()));
    }
    text.push_str(&author.format_line("author"));
    text.push('\n');
    text.push_str(&committer.format_line("committer"));
    text.push('\n');
    text.push('\n');
    text.push_str(&message);
    if !message.ends_with('\n') {
        text.push('\n');
    }

    let (digest, framed) = hash_framed(ObjectKind::Commit, text.as_bytes());
    let commit = Commit {
        tree,
        parents,
        author,
        committer,
        message,
    };
    (digest, framed, commit)
}

/// Parses commit content (bytes after the framed header). Header lines are
/// consumed until the first blank line; everything after is the message,
/// trimmed of exactly one trailing newline (P9).
pub fn parse_commit(content: &[u8]) -> Result<Commit> {
    let text = std::str::from_utf8(content)
        .map_err(|_| GitError::Corrupted("commit is not valid UTF-8".into()))?;

    let mut tree: Option<Digest> = None;
    let mut parents = Vec::new();
    let mut author: Option<Ident> = None;
    let mut committer: Option<Ident> = None;

    let mut lines = text.split('\n');
    let mut message_start = text.len();
    let mut consumed = 0usize;

    for line in lines.by_ref() {
        consumed += line.len() + 1; // +1 for the '\n' split removed
        if line.is_empty() {
            message_start = consumed;
            break;
        }
        if let Some(hex) = line.strip_prefix("tree ") {
            tree = Some(Digest::from_hex(hex)?);
        } else if let Some(hex) = line.strip_prefix("parent ") {
            parents.push(Digest::from_hex(hex)?);
        } else if line.starts_with("author ") {
            author = Some(Ident::parse_line(line, "author")?);
        } else if line.starts_with("committer ") {
            committer = Some(Ident::parse_line(line, "committer")?);
        } else {
            return Err(GitError::Corrupted(format!("unexpected header line: {line}")));
        }
    }

    let tree = tree.ok_or_else(|| GitError::Corrupted("commit missing tree line".into()))?;
    let author = author.ok_or_else(|| GitError::Corrupted("commit missing author line".into()))?;
    let committer =
        committer.ok_or_else(|| GitError::Corrupted("commit missing committer line".into()))?;

    let mut message = text[message_start.min(text.len())..].to_string();
    if message.ends_with('\n') {
        message.pop();
    }

    Ok(Commit {
        tree,
        parents,
        author,
        committer,
        message,
    })
}

/// Parses a full framed commit object (header included).
pub fn parse_commit_framed(framed: &[u8]) -> Result<Commit> {
    let (kind, content) = parse_framed(framed)?;
    if kind != ObjectKind::Commit {
        return Err(GitError::Corrupted(format!(
            "expected commit object, got {}",
            kind.as_str()
        )));
    }
    parse_commit(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident() -> Ident {
        Ident {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            timestamp: 1697750400,
            tz_offset: "+0530".into(),
        }
    }

    #[test]
    fn round_trip_root_commit() {
        let tree = Digest::from_bytes([1; 32]);
        let (_, framed, _) = build_commit(tree, vec![], ident(), ident(), "Initial commit".into());
        let parsed = parse_commit_framed(&framed).unwrap();
        assert_eq!(parsed.tree, tree);
        assert!(parsed.parents.is_empty());
        assert_eq!(parsed.author, ident());
        assert_eq!(parsed.message, "Initial commit");
    }

    #[test]
    fn round_trip_merge_commit_preserves_parent_order() {
        let tree = Digest::from_bytes([2; 32]);
        let ours = Digest::from_bytes([3; 32]);
        let theirs = Digest::from_bytes([4; 32]);
        let (_, framed, _) = build_commit(
            tree,
            vec![ours, theirs],
            ident(),
            ident(),
            "Merge branch 'feature'".into(),
        );
        let parsed = parse_commit_framed(&framed).unwrap();
        assert_eq!(parsed.parents, vec![ours, theirs]);
    }

    #[test]
    fn message_trailing_newline_trimmed_once() {
        let tree = Digest::from_bytes([5; 32]);
        let (_, framed, _) = build_commit(tree, vec![], ident(), ident(), "line one\n\n".into());
        let parsed = parse_commit_framed(&framed).unwrap();
        // one trailing newline trimmed, the blank line inside the message stays
        assert_eq!(parsed.message, "line one\n");
    }

    #[test]
    fn single_tree_line_required() {
        let err = parse_commit(b"author A <a@b.c> 1 +0000\n\nmsg\n").unwrap_err();
        assert!(matches!(err, GitError::Corrupted(_)));
    }
}
