use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};

/// Copy every `*.json` in `data_dir` into `frontend_dir`. Returns how many
/// files were copied; individual copy failures are logged and skipped.
pub fn publish_artifacts(data_dir: &Path, frontend_dir: &Path) -> Result<usize> {
    info!(
        from = %data_dir.display(),
        to = %frontend_dir.display(),
        "copying data to frontend"
    );
    fs::create_dir_all(frontend_dir).map_err(|err| PipelineError::io(frontend_dir, err))?;

    let mut names: Vec<String> = fs::read_dir(data_dir)
        .map_err(|err| PipelineError::io(data_dir, err))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".json"))
        .collect();
    names.sort();

    if names.is_empty() {
        warn!(dir = %data_dir.display(), "no JSON files found in data directory");
        return Ok(0);
    }

    let mut copied = 0;
    for name in &names {
        match fs::copy(data_dir.join(name), frontend_dir.join(name)) {
            Ok(_) => {
                info!(file = %name, "copied to frontend");
                copied += 1;
            }
            Err(err) => error!(file = %name, error = %err, "copy failed"),
        }
    }
    info!(copied, total = names.len(), "data copy completed");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_only_json_files() {
        let data = tempfile::tempdir().expect("tempdir");
        let site = tempfile::tempdir().expect("tempdir");
        fs::write(data.path().join("papers.json"), "[]").unwrap();
        fs::write(data.path().join("metadata.json"), "{}").unwrap();
        fs::write(data.path().join("notes.txt"), "skip").unwrap();
        let frontend = site.path().join("public").join("data");

        let copied = publish_artifacts(data.path(), &frontend).expect("publish");
        assert_eq!(copied, 2);
        assert!(frontend.join("papers.json").is_file());
        assert!(frontend.join("metadata.json").is_file());
        assert!(!frontend.join("notes.txt").exists());
    }

    #[test]
    fn empty_data_dir_is_not_an_error() {
        let data = tempfile::tempdir().expect("tempdir");
        let site = tempfile::tempdir().expect("tempdir");
        assert_eq!(publish_artifacts(data.path(), site.path()).expect("publish"), 0);
    }

    #[test]
    fn missing_data_dir_is_an_error() {
        let site = tempfile::tempdir().expect("tempdir");
        let missing = site.path().join("nope");
        assert!(publish_artifacts(&missing, &site.path().join("out")).is_err());
    }
}
