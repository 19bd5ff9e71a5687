use std::num::NonZeroU32;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::launch::{Planner, RunConfiguration};

/// Persisted launcher settings, one record per installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_config_path")]
    pub config_path: String,

    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_python_executable")]
    pub python_executable: String,

    #[serde(default)]
    pub planner: Planner,

    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    #[serde(default = "default_gemini_interval_seconds")]
    pub gemini_interval_seconds: f64,

    #[serde(default = "default_true")]
    pub gemini_send_vision: bool,

    #[serde(default = "default_true")]
    pub assist_mode: bool,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps_override: Option<NonZeroU32>,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_gemini_api_key: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_config_path() -> String {
    "configs/humankind3.yaml".to_string()
}

fn default_profile() -> String {
    "windowed".to_string()
}

fn default_python_executable() -> String {
    "python".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

pub(crate) fn default_gemini_interval_seconds() -> f64 {
    1.5
}

fn default_true() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            profile: default_profile(),
            python_executable: default_python_executable(),
            planner: Planner::default(),
            gemini_model: default_gemini_model(),
            gemini_interval_seconds: default_gemini_interval_seconds(),
            gemini_send_vision: true,
            assist_mode: true,
            debug_mode: false,
            fps_override: None,
            dry_run: false,
            encrypted_gemini_api_key: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppSettings {
    /// Snapshot for one run. The credential is the decrypted API key, if any.
    pub fn to_run_configuration(&self, credential: Option<String>) -> RunConfiguration {
        RunConfiguration {
            config_path: PathBuf::from(&self.config_path),
            profile: self.profile.clone(),
            interpreter: self.python_executable.clone(),
            planner: self.planner,
            model: self.gemini_model.clone(),
            interval_secs: self.gemini_interval_seconds,
            vision: self.gemini_send_vision,
            assist: self.assist_mode,
            debug: self.debug_mode,
            fps: self.fps_override,
            dry_run: self.dry_run,
            credential,
        }
    }

    /// Replaces values the worker would reject with their defaults.
    pub fn normalize(&mut self) -> Option<SettingsWarning> {
        let interval = self.gemini_interval_seconds;
        if !interval.is_finite() || interval <= 0.0 {
            self.gemini_interval_seconds = default_gemini_interval_seconds();
            return Some(SettingsWarning::InvalidInterval { value: interval });
        }
        None
    }
}

/// Something wrong with the settings file that was recovered from.
///
/// Loading happens before logging is set up, so these are returned to the
/// caller to report once a subscriber exists.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsWarning {
    Malformed { path: PathBuf, error: String },
    Unreadable { path: PathBuf, error: String },
    InvalidInterval { value: f64 },
}

impl SettingsWarning {
    pub fn log(&self) {
        match self {
            SettingsWarning::Malformed { path, error } => tracing::warn!(
                target: "hk3.settings",
                path = %path.display(),
                error = %error,
                "settings file is malformed, using defaults"
            ),
            SettingsWarning::Unreadable { path, error } => tracing::warn!(
                target: "hk3.settings",
                path = %path.display(),
                error = %error,
                "settings file is unreadable, using defaults"
            ),
            SettingsWarning::InvalidInterval { value } => tracing::warn!(
                target: "hk3.settings",
                interval = value,
                "gemini_interval_seconds must be positive, using default"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write launcher logs to a daily rolling file.
    #[serde(default = "default_true")]
    pub file: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Where saved session transcripts go.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: true,
            directory: None,
            transcript_dir: None,
        }
    }
}
