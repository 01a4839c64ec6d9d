//! Configuration for the stack engine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Search paths for component definitions, as a platform path list.
pub const ENV_COMPONENT_PATHS: &str = "RIGSTACK_COMPONENT_PATHS";
/// Failure policy override: `continue`, `skip_branch` or `abort`.
pub const ENV_FAILURE_POLICY: &str = "RIGSTACK_FAILURE_POLICY";

/// Top-level configuration. Every section has a usable default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
    pub registry: RegistryConfig,
    pub naming: NamingConfig,
}

impl Config {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Apply `RIGSTACK_*` environment overrides on top of this configuration.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var_os(key).map(|v| v.to_string_lossy().into_owned()))
    }

    fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(paths) = lookup(ENV_COMPONENT_PATHS) {
            for path in std::env::split_paths(&paths) {
                if !path.as_os_str().is_empty() && !self.registry.search_paths.contains(&path) {
                    self.registry.search_paths.push(path);
                }
            }
        }
        if let Some(policy) = lookup(ENV_FAILURE_POLICY) {
            self.build.failure_policy = match policy.trim().to_ascii_lowercase().as_str() {
                "continue" => FailurePolicy::Continue,
                "skip_branch" | "skip-branch" => FailurePolicy::SkipBranch,
                "abort" => FailurePolicy::Abort,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: ENV_FAILURE_POLICY,
                        value: policy,
                    })
                }
            };
        }
        Ok(self)
    }
}

/// What a build pass does after a component ends `Invalid` or `Failed`.
/// The pass result is false in every case.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep executing everything else in scope, descendants included.
    #[default]
    Continue,
    /// Skip the failed component's descendants; other branches still run.
    SkipBranch,
    /// Stop the pass at the first failure.
    Abort,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub failure_policy: FailurePolicy,
    /// Convert panics raised inside `run` into `RunFault` failures.
    pub catch_panics: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Continue,
            catch_panics: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub search_paths: Vec<PathBuf>,
    /// File extension of definition files, without the dot.
    pub extension: String,
    pub recursive: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            extension: "json".to_string(),
            recursive: true,
        }
    }
}

/// Naming convention used by [`ConventionNamer`](crate::host::ConventionNamer).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub separator: String,
    /// Zero-padding width for the uniqueness index.
    pub index_padding: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            index_padding: 0,
        }
    }
}
