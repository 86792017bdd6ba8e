use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{PipelineError, Result};

static VERSION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v\d+$").expect("valid version suffix regex"));

/// `2501.00001v2` -> `2501.00001`; legacy ids such as `cs/0101001v1` keep
/// their archive prefix.
pub fn strip_version(idstr: &str) -> String {
    VERSION_SUFFIX_RE.replace(idstr.trim(), "").into_owned()
}

/// Last path segment of an arXiv entry URL, version included.
pub fn id_from_entry_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    match trimmed.find("/abs/") {
        Some(pos) => trimmed[pos + 5..].to_string(),
        None => trimmed.rsplit('/').next().unwrap_or(trimmed).to_string(),
    }
}

/// Truncate on a char boundary, appending `...` when anything was cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

pub fn write_atomic<F>(path: &Path, write_fn: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> std::io::Result<()>,
{
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent).map_err(|err| PipelineError::io(parent, err))?;
    write_fn(&mut temp).map_err(|err| PipelineError::io(path, err))?;
    temp.flush().map_err(|err| PipelineError::io(path, err))?;
    temp.persist(path)
        .map_err(|err| PipelineError::io(path, err.error))?;
    Ok(())
}

pub fn write_atomic_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic(path, |file| file.write_all(bytes))
}

/// Pretty JSON with a trailing newline, written via temp file + rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut encoded =
        serde_json::to_vec_pretty(value).map_err(|err| PipelineError::json(path, err))?;
    encoded.push(b'\n');
    ensure_parent_dir(path)?;
    write_atomic_bytes(path, &encoded)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|err| PipelineError::io(path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| PipelineError::json(path, err))
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_version_handles_new_and_legacy_ids() {
        assert_eq!(strip_version("2501.00001v2"), "2501.00001");
        assert_eq!(strip_version("2501.00001"), "2501.00001");
        assert_eq!(strip_version("cs/0101001v1"), "cs/0101001");
    }

    #[test]
    fn id_from_entry_url_keeps_version() {
        assert_eq!(
            id_from_entry_url("http://arxiv.org/abs/2501.00001v1"),
            "2501.00001v1"
        );
        assert_eq!(
            id_from_entry_url("http://arxiv.org/abs/hep-th/9901001v3"),
            "hep-th/9901001v3"
        );
        assert_eq!(id_from_entry_url("2501.00002"), "2501.00002");
    }

    #[test]
    fn snippet_truncates_only_long_text() {
        assert_eq!(snippet("short", 200), "short");
        let long = "a".repeat(250);
        let cut = snippet(&long, 200);
        assert_eq!(cut.len(), 203);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn write_json_atomic_creates_parent_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("value.json");
        write_json_atomic(&path, &vec![1, 2, 3]).expect("write");
        let back: Vec<i32> = read_json(&path).expect("read");
        assert_eq!(back, vec![1, 2, 3]);
    }
}
