//! Content-addressed staging of script payloads
//!
//! Indirect content references ("assets") are resolved to text and written
//! to a deterministic, hash-keyed location on the execution target. Staging
//! identical content twice is a no-op, so retries and concurrent runs for
//! the same content race harmlessly; different content never collides
//! because the path includes the hash.

use crate::error::RemotingError;
use std::path::{Path, PathBuf};

/// Resolves an asset reference to its text content
pub trait ContentProvider: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, RemotingError>;
}

/// The bare asset name: everything after the first `::` qualifier
pub fn asset_name(reference: &str) -> &str {
    match reference.split_once("::") {
        Some((_, name)) => name,
        None => reference,
    }
}

/// Provider backed by a directory of asset files
pub struct DirContentProvider {
    root: PathBuf,
}

impl DirContentProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentProvider for DirContentProvider {
    fn resolve(&self, reference: &str) -> Result<String, RemotingError> {
        let path = self.root.join(asset_name(reference));
        std::fs::read_to_string(&path).map_err(|_| RemotingError::NotFound {
            reference: reference.to_string(),
        })
    }
}

/// Content-addressed cache on the execution target's filesystem
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache rooted under the system temp directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("converge-cache"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `reference` and stage its content, returning the concrete
    /// file path.
    ///
    /// The path is keyed by asset name and content hash:
    /// `<root>/<stem>/<hash>/<file-name>`. If the path already holds the
    /// content this is a no-op, which makes materialization idempotent.
    /// I/O failures are [`RemotingError::StagingFailed`] and fatal for the run.
    pub fn materialize(
        &self,
        reference: &str,
        provider: &dyn ContentProvider,
    ) -> Result<PathBuf, RemotingError> {
        let name = asset_name(reference);
        let text = provider.resolve(reference)?;
        let digest = blake3::hash(text.as_bytes()).to_hex();

        let dir = self.root.join(stem_of(name)).join(digest.as_str());
        let path = dir.join(name);
        if path.exists() {
            log::debug!(
                "content for '{reference}' already staged at {}",
                path.display()
            );
            return Ok(path);
        }

        std::fs::create_dir_all(&dir).map_err(|e| staging_failed(reference, e))?;
        std::fs::write(&path, &text).map_err(|e| staging_failed(reference, e))?;
        log::debug!(
            "staged {} bytes for '{reference}' at {}",
            text.len(),
            path.display()
        );
        Ok(path)
    }
}

fn staging_failed(reference: &str, source: std::io::Error) -> RemotingError {
    RemotingError::StagingFailed {
        asset: reference.to_string(),
        source,
    }
}

fn stem_of(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapProvider(BTreeMap<String, String>);

    impl MapProvider {
        fn with(reference: &str, text: &str) -> Self {
            let mut assets = BTreeMap::new();
            assets.insert(reference.to_string(), text.to_string());
            Self(assets)
        }
    }

    impl ContentProvider for MapProvider {
        fn resolve(&self, reference: &str) -> Result<String, RemotingError> {
            self.0
                .get(reference)
                .cloned()
                .ok_or_else(|| RemotingError::NotFound {
                    reference: reference.to_string(),
                })
        }
    }

    #[test]
    fn asset_name_strips_namespace_qualifier() {
        assert_eq!(asset_name("scripts::web.sh"), "web.sh");
        assert_eq!(asset_name("web.sh"), "web.sh");
        assert_eq!(asset_name("global::scripts::web.sh"), "scripts::web.sh");
    }

    #[test]
    fn identical_content_maps_to_the_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());
        let provider = MapProvider::with("scripts::web.sh", "echo hello");

        let first = cache.materialize("scripts::web.sh", &provider).unwrap();
        let second = cache.materialize("scripts::web.sh", &provider).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "echo hello");
    }

    #[test]
    fn restaging_performs_no_second_write() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());
        let provider = MapProvider::with("web.sh", "echo hello");

        let path = cache.materialize("web.sh", &provider).unwrap();
        // Tamper with the staged file; an idempotent second call must not
        // touch the already-present path.
        std::fs::write(&path, "tampered").unwrap();
        let again = cache.materialize("web.sh", &provider).unwrap();
        assert_eq!(path, again);
        assert_eq!(std::fs::read_to_string(&again).unwrap(), "tampered");
    }

    #[test]
    fn different_content_never_collides() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());

        let first = cache
            .materialize("web.sh", &MapProvider::with("web.sh", "echo one"))
            .unwrap();
        let second = cache
            .materialize("web.sh", &MapProvider::with("web.sh", "echo two"))
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "echo one");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "echo two");
    }

    #[test]
    fn unknown_reference_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::new(dir.path());
        let provider = MapProvider(BTreeMap::new());

        let err = cache.materialize("missing.sh", &provider).unwrap_err();
        assert!(matches!(err, RemotingError::NotFound { .. }));
    }

    #[test]
    fn dir_provider_reads_asset_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web.sh"), "echo hi").unwrap();
        let provider = DirContentProvider::new(dir.path());

        assert_eq!(provider.resolve("scripts::web.sh").unwrap(), "echo hi");
        assert!(matches!(
            provider.resolve("scripts::other.sh"),
            Err(RemotingError::NotFound { .. })
        ));
    }
}
