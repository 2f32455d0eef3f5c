//! Boot-time expectation loading.
//!
//! `ExpectationSource` is the injection seam: the server consumes whatever
//! the source yields, the default source reads `*.json` files from a
//! directory once at startup, and tests plug in an in-memory source.

use crate::error::Result;
use crate::expectation::store::ExpectationStore;
use crate::expectation::types::Expectation;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub trait ExpectationSource {
    fn load_all(&self) -> Result<Vec<Expectation>>;
}

/// Reads every `*.json` file in a directory, one expectation per file.
/// Changes on disk after startup are not observed.
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExpectationSource for DirSource {
    fn load_all(&self) -> Result<Vec<Expectation>> {
        let mut expectations = Vec::new();
        let mut paths: Vec<PathBuf> = read_json_paths(&self.dir)?;
        // Deterministic load order regardless of directory iteration order.
        paths.sort();
        for path in paths {
            match parse_file(&path) {
                Ok(expectation) => expectations.push(expectation),
                Err(e) => {
                    // A broken file must not take the server down; skip it.
                    error!("skipping expectation file {}: {}", path.display(), e);
                }
            }
        }
        Ok(expectations)
    }
}

fn read_json_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        crate::error::Error::Config(format!(
            "cannot read expectations directory {}: {e}",
            dir.display()
        ))
    })?;
    let mut paths = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    Ok(paths)
}

fn parse_file(path: &Path) -> anyhow::Result<Expectation> {
    let contents = std::fs::read_to_string(path)?;
    let expectation: Expectation = serde_json::from_str(&contents)?;
    Ok(expectation)
}

/// Load everything a source yields into the store. Files that fail
/// validation are logged and skipped; the count of loaded expectations is
/// returned.
pub fn load_into(source: &dyn ExpectationSource, store: &ExpectationStore) -> Result<usize> {
    let mut loaded = 0;
    for expectation in source.load_all()? {
        match store.add(expectation) {
            Ok(id) => {
                loaded += 1;
                info!("loaded expectation {id}");
            }
            Err(e) => error!("rejected expectation at boot: {e}"),
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct InMemorySource(Vec<Expectation>);

    impl ExpectationSource for InMemorySource {
        fn load_all(&self) -> Result<Vec<Expectation>> {
            Ok(self.0.clone())
        }
    }

    fn expectation(value: serde_json::Value) -> Expectation {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_load_into_inserts_all_valid() {
        let source = InMemorySource(vec![
            expectation(json!({
                "request": {"url": {"isEqualTo": "/a"}},
                "response": {"body": "a"}
            })),
            expectation(json!({
                "request": {"url": {"isEqualTo": "/b"}},
                "response": {"body": "b"}
            })),
        ]);
        let store = ExpectationStore::new();
        assert_eq!(load_into(&source, &store).unwrap(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_into_skips_invalid_and_keeps_going() {
        let source = InMemorySource(vec![
            // No response and no proxy: rejected by validation.
            expectation(json!({"request": {"url": {"isEqualTo": "/bad"}}})),
            expectation(json!({
                "request": {"url": {"isEqualTo": "/good"}},
                "response": {"body": "ok"}
            })),
        ]);
        let store = ExpectationStore::new();
        assert_eq!(load_into(&source, &store).unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_dir_source_reads_json_files_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hello.json"),
            r#"{"request":{"url":{"isEqualTo":"/hello"}},"response":{"body":"hi"}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let source = DirSource::new(dir.path());
        let loaded = source.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded[0].response.as_ref().unwrap().body.as_deref(),
            Some("hi")
        );
    }

    #[test]
    fn test_dir_source_missing_directory_is_an_error() {
        let source = DirSource::new("/definitely/not/a/real/dir");
        assert!(source.load_all().is_err());
    }
}
