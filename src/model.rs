use std::fs;
use std::path::{Component, Path, PathBuf};

use log::info;

use crate::error::{EngineError, Result};

/// Read-only directory of bundled files, addressed by relative asset paths.
#[derive(Debug, Clone)]
pub struct AssetSource {
    root: PathBuf,
}

impl AssetSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `asset_path` under the root. Absolute paths and `..` are rejected.
    pub fn resolve(&self, asset_path: &str) -> Result<PathBuf> {
        let relative = Path::new(asset_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if asset_path.is_empty() || escapes {
            return Err(EngineError::config(format!(
                "invalid asset path '{}'",
                asset_path
            )));
        }
        Ok(self.root.join(relative))
    }

    pub fn read(&self, asset_path: &str) -> Result<Vec<u8>> {
        let path = self.resolve(asset_path)?;
        Ok(fs::read(path)?)
    }
}

/// Locates ggml model files on disk.
pub struct ModelManager {
    model_dir: PathBuf,
}

impl ModelManager {
    pub fn new() -> Self {
        let model_dir = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("models");

        Self { model_dir }
    }

    pub fn with_dir<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// Returns the path to the requested model.
    /// Accepts an existing file path, or a name like "small" resolved to
    /// `<model_dir>/ggml-small.bin`.
    pub fn locate(&self, model: &str) -> Result<PathBuf> {
        let direct = Path::new(model);
        if direct.is_file() {
            info!("Model located at: {:?}", direct);
            return Ok(direct.to_path_buf());
        }

        let model_path = self.model_dir.join(format!("ggml-{}.bin", model));
        if model_path.is_file() {
            info!("Model located at: {:?}", model_path);
            return Ok(model_path);
        }

        Err(EngineError::init_failed(format!(
            "model '{}' not found in {:?}",
            model, self.model_dir
        )))
    }

    /// The models directory viewed as an asset root.
    pub fn assets(&self) -> AssetSource {
        AssetSource::new(&self.model_dir)
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_by_name_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("ggml-tiny.en.bin");
        fs::write(&model, b"ggml").unwrap();

        let mgr = ModelManager::with_dir(dir.path());
        assert_eq!(mgr.locate("tiny.en").unwrap(), model);
        assert_eq!(mgr.locate(model.to_str().unwrap()).unwrap(), model);
        assert!(matches!(
            mgr.locate("large"),
            Err(EngineError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_asset_reads_and_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models/ggml-small.bin"), b"weights").unwrap();

        let assets = AssetSource::new(dir.path());
        assert_eq!(assets.read("models/ggml-small.bin").unwrap(), b"weights");
        assert!(matches!(assets.read("../etc/passwd"), Err(EngineError::Config(_))));
        assert!(matches!(assets.read("/etc/passwd"), Err(EngineError::Config(_))));
        assert!(matches!(assets.read("models/missing.bin"), Err(EngineError::Io(_))));
    }

    #[test]
    fn test_assets_rooted_at_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("q5")).unwrap();
        fs::write(dir.path().join("q5/ggml-base-q5_1.bin"), b"quantized").unwrap();

        let assets = ModelManager::with_dir(dir.path()).assets();
        assert_eq!(assets.read("q5/ggml-base-q5_1.bin").unwrap(), b"quantized");
        assert_eq!(
            assets.resolve("q5/ggml-base-q5_1.bin").unwrap(),
            dir.path().join("q5/ggml-base-q5_1.bin")
        );
    }
}
