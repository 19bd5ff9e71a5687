//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `hk3_launcher_core::api` instead of reaching into internal modules.

pub use crate::config::{
    app_data_dir, AppSettings, LoggingConfig, SettingsStore, SettingsWarning,
};
pub use crate::crash::{report_fatal, write_crash_record};
pub use crate::error::{
    CliError, ConfigError, KillFailure, LaunchError, RepoRootNotFound, SecretError, SettingsError,
    StopError,
};
pub use crate::launch::{LaunchPlanner, LaunchSpec, Planner, RunConfiguration, RunMode};
pub use crate::repo::{find_repo_root, RepoRootSource};
pub use crate::runner::{
    EventSink, ExitOutcome, LogChannel, LogEvent, ProcessInfo, ProcessSupervisor, SupervisorEvent,
    SupervisorState,
};
pub use crate::secret::{reveal, SecretProtector};
pub use crate::session::{
    CommandAvailability, RunOutcome, SessionController, SessionOptions, SessionUpdate, Transcript,
};
