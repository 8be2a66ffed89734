//! Model loading interface and the JSON model format.

use std::path::{Path, PathBuf};

use super::ModelTree;
use crate::util::Result;

/// Source of model trees. Implementations may block; the scene side runs
/// them on [`crate::scene::LoadWorker`] when rendering must continue.
pub trait ModelLoader: Send + Sync {
    /// Load and validate the model identified by `source`.
    fn load(&self, source: &str) -> Result<ModelTree>;
}

/// Loads models stored as JSON [`ModelTree`] documents.
#[derive(Debug, Clone, Default)]
pub struct JsonModelLoader {
    /// Relative sources are resolved against this directory.
    root: Option<PathBuf>,
}

impl JsonModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative sources against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let path = Path::new(source);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ModelLoader for JsonModelLoader {
    #[tracing::instrument(skip(self))]
    fn load(&self, source: &str) -> Result<ModelTree> {
        let path = self.resolve(source);
        let text = std::fs::read_to_string(&path)?;
        let mut tree: ModelTree = serde_json::from_str(&text)?;
        if tree.name.is_empty() {
            tree.name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.to_string());
        }
        tree.validate_materials()?;
        tracing::debug!(model = %tree.name, meshes = tree.mesh_count(), "model loaded");
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Error;
    use std::io::Write;

    const CUBE_JSON: &str = r#"{
        "root": {
            "name": "cube",
            "mesh": {
                "positions": [[0,0,0],[1,0,0],[0,1,0]],
                "indices": [0,1,2],
                "material": { "base_color": [1.0, 0.0, 0.0, 1.0], "roughness": 0.4 }
            }
        }
    }"#;

    #[test]
    fn test_load_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("chair.json")).unwrap();
        file.write_all(CUBE_JSON.as_bytes()).unwrap();

        let loader = JsonModelLoader::with_root(dir.path());
        let tree = loader.load("chair.json").unwrap();
        assert_eq!(tree.name, "chair");
        assert_eq!(tree.mesh_count(), 1);
    }

    #[test]
    fn test_load_rejects_invalid_material() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, CUBE_JSON.replace("0.4", "7.0")).unwrap();

        let err = JsonModelLoader::new().load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidMaterial(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = JsonModelLoader::new().load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
