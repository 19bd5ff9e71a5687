use std::num::NonZeroU32;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use hk3_launcher_core::api::{
    reveal, AppSettings, CliError, Planner, RepoRootSource, RunConfiguration, SessionController,
    SessionOptions, SettingsStore, SettingsWarning,
};
use hk3_launcher_core::repo::exe_dir;
use hk3_launcher_plugins::factory;

use crate::commands::cli::{Args, RunArgs};

/// Settings and paths shared by every command.
pub struct AppContext {
    pub store: SettingsStore,
    pub settings: AppSettings,
    pub repo_root: RepoRootSource,
    /// Problems found while loading, reported once logging is up.
    pub load_warnings: Vec<SettingsWarning>,
}

impl AppContext {
    pub fn load(args: &Args) -> Result<Self, CliError> {
        let store = match &args.settings {
            Some(path) => SettingsStore::new(path.clone()),
            None => SettingsStore::open_default()?,
        };
        let (settings, load_warnings) = store.load_checked();
        let repo_root = match &args.repo_root {
            Some(dir) => RepoRootSource::SearchFrom(dir.clone()),
            None => RepoRootSource::FromExe,
        };
        Ok(Self {
            store,
            settings,
            repo_root,
            load_warnings,
        })
    }

    /// Re-reads the settings file so edits made while the console is open
    /// apply to the next run.
    pub fn reload(&mut self) {
        self.settings = self.store.load();
    }

    pub fn transcript_dir(&self) -> PathBuf {
        if let Some(dir) = &self.settings.logging.transcript_dir {
            return dir.clone();
        }
        exe_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("logs")
    }

    pub fn session(&self) -> SessionController {
        factory::build_session(SessionOptions {
            repo_root: self.repo_root.clone(),
            log_dir: self.transcript_dir(),
        })
    }

    /// Snapshot for one run, with the stored credential decrypted.
    pub fn run_configuration(&self, overrides: &RunArgs) -> anyhow::Result<RunConfiguration> {
        let mut settings = self.settings.clone();
        if let Some(profile) = &overrides.profile {
            settings.profile = profile.clone();
        }
        if let Some(config) = &overrides.config {
            settings.config_path = config.clone();
        }
        if let Some(planner) = &overrides.planner {
            settings.planner = planner
                .parse::<Planner>()
                .map_err(|e| anyhow!(e))
                .context("invalid --planner")?;
        }
        if let Some(fps) = overrides.fps {
            settings.fps_override =
                Some(NonZeroU32::new(fps).ok_or_else(|| anyhow!("--fps must be positive"))?);
        }
        settings.dry_run |= overrides.dry_run;
        settings.debug_mode |= overrides.debug;

        let credential = match settings.encrypted_gemini_api_key.as_deref() {
            Some(blob) => {
                let protector = factory::build_protector();
                reveal(&*protector, Some(blob))
            }
            None => None,
        };
        Ok(settings.to_run_configuration(credential))
    }
}
