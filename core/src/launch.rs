//! Launch inputs and the derived launch spec.
//!
//! `RunConfiguration` is the per-run snapshot the front end hands to the
//! session controller; a [`LaunchPlanner`] turns it into a [`LaunchSpec`].

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Decision strategy used by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Planner {
    /// Rule-based planner.
    #[default]
    Rules,
    /// Model-assisted planner.
    Gemini,
}

impl Planner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Planner::Rules => "rules",
            Planner::Gemini => "gemini",
        }
    }

    pub fn is_model_assisted(&self) -> bool {
        matches!(self, Planner::Gemini)
    }
}

impl fmt::Display for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Planner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules" => Ok(Planner::Rules),
            "gemini" => Ok(Planner::Gemini),
            other => Err(format!("unknown planner: {other}")),
        }
    }
}

impl TryFrom<String> for Planner {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Planner> for String {
    fn from(p: Planner) -> Self {
        p.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Calibration,
    Agent,
}

impl RunMode {
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Calibration => "calibration",
            RunMode::Agent => "agent",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    pub config_path: PathBuf,
    pub profile: String,
    pub interpreter: String,
    pub planner: Planner,
    pub model: String,
    pub interval_secs: f64,
    pub vision: bool,
    pub assist: bool,
    pub debug: bool,
    pub fps: Option<NonZeroU32>,
    pub dry_run: bool,
    pub credential: Option<String>,
}

impl RunConfiguration {
    /// The credential, if one is set and not blank.
    pub fn effective_credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

/// Everything needed to spawn the worker once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

/// Turns a run configuration into a concrete launch spec for one mode.
///
/// Implementations must be deterministic and must not touch the filesystem
/// beyond checking that the config file exists.
pub trait LaunchPlanner: Send + Sync {
    fn name(&self) -> &str;

    fn plan(
        &self,
        config: &RunConfiguration,
        mode: RunMode,
        repo_root: &Path,
    ) -> Result<LaunchSpec, ConfigError>;
}
