use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hk3_launcher_core::api::{ConfigError, LaunchPlanner, LaunchSpec, RunConfiguration, RunMode};

const CALIBRATION_MODULE: &str = "hk3_bot.calibration";
const AGENT_MODULE: &str = "hk3_bot.run";
const CREDENTIAL_ENV: &str = "GEMINI_API_KEY";

/// Builds the `python -m hk3_bot.*` invocation for the hk3 worker.
#[derive(Debug, Clone, Default)]
pub struct Hk3LaunchPlanner;

impl Hk3LaunchPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl LaunchPlanner for Hk3LaunchPlanner {
    fn name(&self) -> &str {
        "hk3"
    }

    fn plan(
        &self,
        config: &RunConfiguration,
        mode: RunMode,
        repo_root: &Path,
    ) -> Result<LaunchSpec, ConfigError> {
        let config_path = resolve_config_path(&config.config_path, repo_root)?;
        let config_arg = config_path.to_string_lossy().into_owned();

        let mut args: Vec<String> = Vec::new();
        match mode {
            RunMode::Calibration => {
                args.extend(["-m", CALIBRATION_MODULE].map(String::from));
                push_common(&mut args, &config_arg, &config.profile);
            }
            RunMode::Agent => {
                args.extend(["-m", AGENT_MODULE].map(String::from));
                push_common(&mut args, &config_arg, &config.profile);
                args.push("--planner".into());
                args.push(config.planner.as_str().into());
                if config.assist {
                    args.push("--assist".into());
                }
                if config.debug {
                    args.push("--debug".into());
                }
                if config.dry_run {
                    args.push("--dry-run".into());
                }
                if let Some(fps) = config.fps {
                    args.push("--fps".into());
                    args.push(fps.to_string());
                }
                if config.planner.is_model_assisted() {
                    args.push("--gemini-model".into());
                    args.push(config.model.clone());
                    args.push("--gemini-interval".into());
                    args.push(config.interval_secs.to_string());
                    if !config.vision {
                        args.push("--gemini-no-vision".into());
                    }
                }
            }
        }

        let mut envs = BTreeMap::new();
        envs.insert(
            "PYTHONPATH".to_string(),
            repo_root.join("src").to_string_lossy().into_owned(),
        );
        envs.insert("PYTHONIOENCODING".to_string(), "utf-8".to_string());
        envs.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        if let Some(key) = config.effective_credential() {
            envs.insert(CREDENTIAL_ENV.to_string(), key.to_string());
        }

        Ok(LaunchSpec {
            program: expand(&config.interpreter),
            args,
            envs,
            cwd: repo_root.to_path_buf(),
        })
    }
}

fn push_common(args: &mut Vec<String>, config_arg: &str, profile: &str) {
    args.push("--config".into());
    args.push(config_arg.to_string());
    args.push("--profile".into());
    args.push(profile.to_string());
}

/// Expands `~`, joins relative paths onto the repo root, and checks the file
/// exists.
fn resolve_config_path(raw: &Path, repo_root: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = PathBuf::from(expand(&raw.to_string_lossy()));
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        repo_root.join(expanded)
    };
    if !resolved.is_file() {
        return Err(ConfigError::NotFound { path: resolved });
    }
    Ok(resolved)
}

fn expand(raw: &str) -> String {
    shellexpand::tilde(raw).into_owned()
}
