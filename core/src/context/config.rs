//! Settings persistence
//!
//! The persisted property set is [`OverlaySettings`], stored as pretty JSON in
//! `settings.json` beside the executable.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use albrt_types::OverlaySettings;
use tracing::{debug, info};

use super::error::ConfigError;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Directory containing the running executable
pub fn executable_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::ExecutableDir)?;
    Ok(exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Load/save for the persisted settings
pub trait ConfigStorage {
    fn load(&self) -> Result<OverlaySettings, ConfigError>;
    fn save(&self, settings: &OverlaySettings) -> Result<(), ConfigError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON File Storage
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `settings.json` next to the executable
    pub fn beside_executable() -> Result<Self, ConfigError> {
        Ok(Self::new(executable_dir()?.join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStorage for JsonFileStorage {
    fn load(&self) -> Result<OverlaySettings, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        let settings = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "settings loaded");
        Ok(settings)
    }

    fn save(&self, settings: &OverlaySettings) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(settings).map_err(ConfigError::Serialize)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        fs::write(&self.path, text).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-Memory Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Storage held in memory. Clones share the same slot, so a caller can keep a
/// clone to inspect what was saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    settings: Option<OverlaySettings>,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: OverlaySettings) -> Self {
        let storage = Self::new();
        storage.inner.borrow_mut().settings = Some(settings);
        storage
    }

    pub fn saved(&self) -> Option<OverlaySettings> {
        self.inner.borrow().settings.clone()
    }

    pub fn save_count(&self) -> usize {
        self.inner.borrow().saves
    }
}

impl ConfigStorage for MemoryStorage {
    fn load(&self) -> Result<OverlaySettings, ConfigError> {
        self.inner
            .borrow()
            .settings
            .clone()
            .ok_or_else(|| ConfigError::Read {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "nothing stored"),
            })
    }

    fn save(&self, settings: &OverlaySettings) -> Result<(), ConfigError> {
        let mut inner = self.inner.borrow_mut();
        inner.settings = Some(settings.clone());
        inner.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use albrt_types::MaskType;

    #[test]
    fn json_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested").join(SETTINGS_FILE_NAME));

        let settings = OverlaySettings {
            overlay_mask_type: MaskType::Slat,
            slat_slice_offset: 0.25,
            ..OverlaySettings::default()
        };
        storage.save(&settings).unwrap();

        let text = fs::read_to_string(storage.path()).unwrap();
        assert!(text.contains("\"overlayMaskType\": \"SLAT\""));
        assert_eq!(storage.load().unwrap(), settings);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join(SETTINGS_FILE_NAME));
        assert!(matches!(storage.load(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn memory_storage_counts_saves() {
        let storage = MemoryStorage::new();
        let handle = storage.clone();
        assert!(storage.load().is_err());

        storage.save(&OverlaySettings::default()).unwrap();

        assert_eq!(handle.save_count(), 1);
        assert_eq!(handle.saved(), Some(OverlaySettings::default()));
    }
}
