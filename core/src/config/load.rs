use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

use super::types::{AppSettings, SettingsWarning};

pub const APP_DIR_NAME: &str = "hk3-launcher";
const SETTINGS_FILE: &str = "settings.toml";

/// `<config_dir>/hk3-launcher/settings.toml`.
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME).join(SETTINGS_FILE))
        .ok_or(SettingsError::NoConfigDir)
}

/// `<data_dir>/hk3-launcher`, falling back to the temp dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

/// Loads and saves [`AppSettings`] as TOML.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::new(default_settings_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Effective settings: the file plus environment overrides. Never fails;
    /// a missing or malformed file yields defaults. Problems are logged.
    pub fn load(&self) -> AppSettings {
        let (settings, warnings) = self.load_checked();
        warnings.iter().for_each(SettingsWarning::log);
        settings
    }

    /// Like [`load`](Self::load), but returns the problems instead of
    /// logging them. Used before the subscriber is installed.
    pub fn load_checked(&self) -> (AppSettings, Vec<SettingsWarning>) {
        let mut warnings = Vec::new();
        let mut settings = self.read_file(&mut warnings);
        apply_env_overrides(&mut settings);
        (settings, warnings)
    }

    /// The file contents only. Use this as the base for edits that are saved
    /// back, so environment overrides are not persisted.
    pub fn load_persisted(&self) -> AppSettings {
        let mut warnings = Vec::new();
        let settings = self.read_file(&mut warnings);
        warnings.iter().for_each(SettingsWarning::log);
        settings
    }

    fn read_file(&self, warnings: &mut Vec<SettingsWarning>) -> AppSettings {
        let mut settings = match std::fs::read_to_string(&self.path) {
            Ok(s) => match toml::from_str::<AppSettings>(&s) {
                Ok(settings) => settings,
                Err(e) => {
                    warnings.push(SettingsWarning::Malformed {
                        path: self.path.clone(),
                        error: e.to_string(),
                    });
                    AppSettings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
            Err(e) => {
                warnings.push(SettingsWarning::Unreadable {
                    path: self.path.clone(),
                    error: e.to_string(),
                });
                AppSettings::default()
            }
        };
        warnings.extend(settings.normalize());
        settings
    }

    /// Writes atomically: temp file in the same directory, then rename.
    pub fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let body = toml::to_string_pretty(settings).map_err(SettingsError::Serialize)?;
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("toml.tmp");
        {
            let mut file = std::fs::File::create(&tmp).map_err(io_err)?;
            file.write_all(body.as_bytes()).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
        }
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        tracing::debug!(target: "hk3.settings", path = %self.path.display(), "settings saved");
        Ok(())
    }
}

fn apply_env_overrides(settings: &mut AppSettings) {
    if let Ok(v) = std::env::var("HK3_LAUNCHER_PYTHON") {
        if !v.trim().is_empty() {
            settings.python_executable = v;
        }
    }
    if let Ok(v) = std::env::var("HK3_LAUNCHER_PROFILE") {
        if !v.trim().is_empty() {
            settings.profile = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::launch::Planner;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(tmp.path().join("nope.toml"));
        let s = store.load();
        assert_eq!(s.config_path, "configs/humankind3.yaml");
        assert_eq!(s.planner, Planner::Rules);
        assert!(s.encrypted_gemini_api_key.is_none());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "planner = [this is not toml").unwrap();
        let s = SettingsStore::new(path).load();
        assert_eq!(s.gemini_model, "gemini-2.5-flash");
    }

    #[test]
    fn test_load_problems_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = SettingsStore::new(tmp.path().join("absent.toml"));
        assert!(missing.load_checked().1.is_empty());

        let path = tmp.path().join("settings.toml");
        std::fs::write(&path, "planner = [broken").unwrap();
        let (settings, warnings) = SettingsStore::new(path.clone()).load_checked();
        assert_eq!(settings.planner, Planner::Rules);
        assert_eq!(warnings.len(), 1);
        assert!(
            matches!(&warnings[0], SettingsWarning::Malformed { path: p, .. } if *p == path),
            "{warnings:?}"
        );

        std::fs::write(&path, "gemini_interval_seconds = 0.0\n").unwrap();
        let (_, warnings) = SettingsStore::new(path).load_checked();
        assert_eq!(warnings, vec![SettingsWarning::InvalidInterval { value: 0.0 }]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.toml");
        std::fs::write(
            &path,
            "planner = \"Gemini\"\nfps_override = 30\ngemini_interval_seconds = -2.0\n",
        )
        .unwrap();
        let s = SettingsStore::new(path).load();
        assert_eq!(s.planner, Planner::Gemini);
        assert_eq!(s.fps_override, NonZeroU32::new(30));
        assert_eq!(s.gemini_interval_seconds, 1.5);
        assert!(s.assist_mode);
        assert_eq!(s.logging.level, "info");
    }

    #[test]
    fn test_save_then_load_keeps_credential_blob() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(tmp.path().join("nested").join("settings.toml"));
        let mut s = AppSettings::default();
        s.profile = "fullscreen".into();
        s.dry_run = true;
        s.encrypted_gemini_api_key = Some("b64blob==".into());
        store.save(&s).unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("profile = \"fullscreen\""));
        assert!(text.contains("[logging]"));
        assert_eq!(store.load().encrypted_gemini_api_key.as_deref(), Some("b64blob=="));
    }
}
