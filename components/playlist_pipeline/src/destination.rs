// components/playlist_pipeline/src/destination.rs
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Preference key holding the chosen output directory
pub const OUTPUT_DIR_KEY: &str = "output_dir";

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Asks the user for a directory. `None` means the user cancelled.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn pick_directory(&self) -> Option<PathBuf>;
}

/// Preferences kept as a flat JSON object in a single file
pub struct JsonPreferenceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(PipelineError::preferences),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PreferenceStore for JsonPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(&values).map_err(PipelineError::preferences)?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

/// Decides where a batch writes its files
pub struct DestinationResolver {
    preferences: Arc<dyn PreferenceStore>,
    picker: Arc<dyn DirectoryPicker>,
    default_dir: Option<PathBuf>,
}

impl DestinationResolver {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        picker: Arc<dyn DirectoryPicker>,
        default_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            preferences,
            picker,
            default_dir,
        }
    }

    /// Stored preference first, then the default location, then the picker.
    ///
    /// A picked directory is persisted before it is returned. The directory is
    /// created if it does not exist.
    pub async fn resolve(&self) -> Result<PathBuf> {
        let stored = self
            .preferences
            .get(OUTPUT_DIR_KEY)
            .await?
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let destination = match stored.or_else(|| self.default_dir.clone()) {
            Some(dir) => dir,
            None => {
                debug!("No output directory configured, asking the user");
                let picked = self
                    .picker
                    .pick_directory()
                    .await
                    .ok_or(PipelineError::DestinationUnavailable)?;
                let value = picked
                    .to_str()
                    .ok_or_else(|| PipelineError::preferences("directory is not valid UTF-8"))?;
                self.preferences.set(OUTPUT_DIR_KEY, value).await?;
                info!(dir = %picked.display(), "Saved output directory");
                picked
            }
        };

        tokio::fs::create_dir_all(&destination).await?;
        Ok(destination)
    }
}
