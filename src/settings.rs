use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::capture::Facing;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub room_key: String,
    pub facing: Facing,
    pub capture_mode: CaptureMode,
    pub captions_enabled: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            room_key: "lobby".into(),
            facing: Facing::User,
            capture_mode: CaptureMode::Photo,
            captions_enabled: true,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn user_settings(&self) -> Result<UserSettings> {
        let guard = self
            .data
            .read()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        Ok(guard.clone())
    }

    /// Applies `change` and writes the result to disk.
    pub fn update<F>(&self, change: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        change(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserSettings = serde_json::from_str(&contents)?;
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_settings_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("retrocam-settings-{}", Uuid::new_v4()))
            .join("settings.json")
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let store = SettingsStore::new(temp_settings_path()).unwrap();
        assert_eq!(store.user_settings().unwrap(), UserSettings::default());
    }

    #[test]
    fn test_update_persists_and_reloads() {
        let path = temp_settings_path();
        let store = SettingsStore::new(path.clone()).unwrap();
        store
            .update(|settings| {
                settings.room_key = "party".into();
                settings.capture_mode = CaptureMode::Video;
                settings.facing = Facing::Environment;
            })
            .unwrap();

        let reopened = SettingsStore::new(path.clone()).unwrap();
        let settings = reopened.user_settings().unwrap();
        assert_eq!(settings.room_key, "party");
        assert_eq!(settings.capture_mode, CaptureMode::Video);
        assert_eq!(settings.facing, Facing::Environment);
        assert!(settings.captions_enabled);

        fs::write(&path, r#"{"roomKey":"elsewhere"}"#).unwrap();
        store.reload().unwrap();
        let settings = store.user_settings().unwrap();
        assert_eq!(settings.room_key, "elsewhere");
        assert_eq!(settings.capture_mode, CaptureMode::Photo);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let path = temp_settings_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.user_settings().unwrap().room_key, "lobby");
    }
}
