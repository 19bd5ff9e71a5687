use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },
}

#[derive(Debug, Error)]
#[error(
    "unable to locate repo root above {}; the launcher must live inside the repo folder tree",
    start.display()
)]
pub struct RepoRootNotFound {
    pub start: PathBuf,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("a process is already running")]
    AlreadyRunning,

    #[error("failed to spawn process: {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StopError {
    #[error("no process is running")]
    NotRunning,
}

/// Best-effort termination of one process in the tree did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unable to kill pid {pid}: {reason}")]
pub struct KillFailure {
    pub pid: u32,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io error: {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings serialize error")]
    Serialize(#[source] toml::ser::Error),

    #[error("settings directory could not be determined")]
    NoConfigDir,
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("credential store error: {0}")]
    KeyStore(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Command(String),
}
