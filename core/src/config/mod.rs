mod load;
mod types;

pub use load::{app_data_dir, default_settings_path, SettingsStore, APP_DIR_NAME};
pub use types::{AppSettings, LoggingConfig, SettingsWarning};
