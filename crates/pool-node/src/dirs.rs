//! Data directory layout for a pool node.

use directories::ProjectDirs;
use eyre::{eyre, Result};
use std::{fs, path::PathBuf};

/// Returns the default project directories for the pool node.
pub fn default_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "peerpool", "peerpool")
}

/// Returns the default data directory path.
pub fn default_data_dir() -> Option<PathBuf> {
    default_project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Root, config, keystore and store paths for a single pool instance.
///
/// Unlike the node this crate is grounded on, a pool has no per-network
/// subdirectory: one pool operator runs one pool.
#[derive(Debug, Clone)]
pub struct DataDirs {
    pub root: PathBuf,
    pub keystore: PathBuf,
    pub store: PathBuf,
}

impl DataDirs {
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = root.unwrap_or_else(|| {
            default_data_dir().unwrap_or_else(|| PathBuf::from(".peerpool"))
        });
        let keystore = root.join("keystore");
        let store = root.join("db");

        for dir in [&root, &keystore] {
            fs::create_dir_all(dir)
                .map_err(|e| eyre!("failed to create directory {}: {e}", dir.display()))?;
        }

        Ok(Self { root, keystore, store })
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("pool.toml")
    }
}
