use log::info;
use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "ridecast";

/// `<platform data dir>/ridecast`, if the platform has a data directory.
pub fn get_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(DATA_DIR_NAME))
}

/// The directory tree the client reads and writes under its data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirs {
    pub root: PathBuf,
    pub raw: PathBuf,
    pub feature_store: PathBuf,
    pub model_registry: PathBuf,
    pub predictions: PathBuf,
}

impl DataDirs {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            raw: root.join("raw"),
            feature_store: root.join("feature_store"),
            model_registry: root.join("model_registry"),
            predictions: root.join("predictions"),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.root,
            &self.raw,
            &self.feature_store,
            &self.model_registry,
            &self.predictions,
        ]
    }
}

pub async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::other(format!(
                    "Path exists but is not a directory: {}",
                    path.display()
                )));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating data directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}
