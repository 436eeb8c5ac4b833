//! Repository configuration and author identity resolution (§4.16).
//!
//! Priority order: `CVCS_AUTHOR_NAME`/`CVCS_AUTHOR_EMAIL` env vars, then
//! `<repo>/config`'s `user.name`/`user.email` keys, then a fixed fallback.
//! This mirrors the teacher's `~/.gitconfig`-reading approach but scopes it
//! to the repository and adds an env-var override slot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::commit::Ident;
use crate::error::{GitError, Result};

const FALLBACK_NAME: &str = "unknown";
const FALLBACK_EMAIL: &str = "unknown@localhost";

pub fn read_config(repo_root: &Path) -> Result<BTreeMap<String, String>> {
    let path = repo_root.join("config");
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(GitError::io_at(&path, e)),
    };

    let mut map = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Ok(map)
}

pub fn write_config_value(repo_root: &Path, key: &str, value: &str) -> Result<()> {
    let mut map = read_config(repo_root)?;
    map.insert(key.to_string(), value.to_string());

    let mut text = String::new();
    for (k, v) in &map {
        text.push_str(&format!("{k} = {v}\n"));
    }
    let path = repo_root.join("config");
    fs::write(&path, text).map_err(|e| GitError::io_at(&path, e))
}

/// Resolves author identity for a new commit, per the precedence in §4.16
/// (P15).
pub fn resolve_author(repo_root: &Path) -> Result<Ident> {
    let config = read_config(repo_root)?;

    let name = std::env::var("CVCS_AUTHOR_NAME")
        .ok()
        .or_else(|| config.get("user.name").cloned())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let email = std::env::var("CVCS_AUTHOR_EMAIL")
        .ok()
        .or_else(|| config.get("user.email").cloned())
        .unwrap_or_else(|| FALLBACK_EMAIL.to_string());

    Ok(Ident::now(name, email))
}
