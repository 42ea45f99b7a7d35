use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TutorError};
use crate::executor::InterpreterConfig;

pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_LOG_LEVEL: &str = "cg_tutor=info";
const DEFAULT_CONFIG_PATH: &str = "cg_tutor.toml";
const MAX_RETRIES_CAP: u32 = 10;

/// Main configuration structure loaded from cg_tutor.toml and environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub execution: ExecutionConfig,
    pub output: OutputConfig,
    pub log_level: String,
    /// Secrets and other values that only ever come from the environment
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Chat-completions endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub api_base: String,
    pub http_timeout_ms: u64,
    /// Extra model calls made when a reply carries no usable code block
    pub max_retries: u32,
}

/// How generated scripts are run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub python: String,
    pub python_args: Vec<String>,
    /// When set, scripts run through `conda run -n <env>`
    pub conda_env: Option<String>,
    pub work_dir: PathBuf,
    pub script_name: String,
    pub timeout_ms: u64,
    /// Image-guided scripts tend to be larger, so they get their own budget
    pub image_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub openai_api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            http_timeout_ms: 120_000,
            max_retries: 3,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            python: "python".to_string(),
            python_args: Vec::new(),
            conda_env: None,
            work_dir: PathBuf::from("./temp"),
            script_name: "test.py".to_string(),
            timeout_ms: 10_000,
            image_timeout_ms: 30_000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            execution: ExecutionConfig::default(),
            output: OutputConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl ExecutionConfig {
    /// Command prefix the script path is appended to
    pub fn interpreter(&self) -> InterpreterConfig {
        match self.conda_env.as_deref() {
            Some(env) if !env.trim().is_empty() => {
                let mut args = vec![
                    "run".to_string(),
                    "-n".to_string(),
                    env.to_string(),
                    self.python.clone(),
                ];
                args.extend(self.python_args.iter().cloned());
                InterpreterConfig {
                    program: "conda".to_string(),
                    args,
                }
            }
            _ => InterpreterConfig {
                program: self.python.clone(),
                args: self.python_args.clone(),
            },
        }
    }

    pub fn timeout(&self, with_image: bool) -> Duration {
        if with_image {
            Duration::from_millis(self.image_timeout_ms)
        } else {
            Duration::from_millis(self.timeout_ms)
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and environment variables.
    ///
    /// The file is `path`, else `CG_TUTOR_CONFIG`, else `cg_tutor.toml`. Only the
    /// implicit default may be missing. Callers apply their own overrides and
    /// then call [`Config::validate`].
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        load_env_file(std::env::var("CG_TUTOR_ENV_FILE").ok().as_deref())?;

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CG_TUTOR_CONFIG").ok().map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::read_file(&path, true)?,
            None => Self::read_file(Path::new(DEFAULT_CONFIG_PATH), false)?,
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file. A missing file yields defaults unless it was
    /// named explicitly; any other read error is reported.
    pub fn read_file(path: &Path, explicit: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(TutorError::Config {
                message: format!("cannot read config file {}: {}", path.display(), e),
            }),
        }
    }

    /// Apply env-first overrides. `lookup` resolves a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        self.runtime.openai_api_key = non_empty("OPENAI_API_KEY");

        if let Some(model) = non_empty("CG_TUTOR_MODEL") {
            self.model.name = model;
        }
        if let Some(base) = non_empty("CG_TUTOR_API_BASE") {
            self.model.api_base = base;
        }
        if let Some(ms) = non_empty("CG_TUTOR_HTTP_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.model.http_timeout_ms = ms;
        }
        if let Some(n) = non_empty("CG_TUTOR_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.model.max_retries = n;
        }
        if let Some(python) = non_empty("CG_TUTOR_PYTHON") {
            self.execution.python = python;
        }
        if let Some(env) = non_empty("CG_TUTOR_CONDA_ENV") {
            self.execution.conda_env = Some(env);
        }
        if let Some(dir) = non_empty("CG_TUTOR_WORK_DIR") {
            self.execution.work_dir = PathBuf::from(dir);
        }
        // Same shape as --timeout-ms: one value for both, image value can refine it
        if let Some(ms) = non_empty("CG_TUTOR_EXEC_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.execution.timeout_ms = ms;
            self.execution.image_timeout_ms = ms;
        }
        if let Some(ms) = non_empty("CG_TUTOR_IMAGE_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.execution.image_timeout_ms = ms;
        }
        if let Some(dir) = non_empty("CG_TUTOR_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
    }

    /// Validate the configuration, clamping soft limits in place
    pub fn validate(&mut self) -> Result<()> {
        if self.execution.timeout_ms == 0 || self.execution.image_timeout_ms == 0 {
            return Err(TutorError::Validation {
                message: "execution timeouts must be > 0".to_string(),
            });
        }
        if self.model.http_timeout_ms == 0 {
            return Err(TutorError::Validation {
                message: "http_timeout_ms must be > 0".to_string(),
            });
        }
        if self.execution.python.trim().is_empty() {
            return Err(TutorError::Validation {
                message: "python interpreter must not be empty".to_string(),
            });
        }
        if self.execution.script_name.contains(['/', '\\']) {
            return Err(TutorError::Validation {
                message: format!(
                    "script_name '{}' must be a bare file name",
                    self.execution.script_name
                ),
            });
        }
        if self.model.max_retries > MAX_RETRIES_CAP {
            tracing::warn!(
                "max_retries {} exceeds max {}, clamping",
                self.model.max_retries,
                MAX_RETRIES_CAP
            );
            self.model.max_retries = MAX_RETRIES_CAP;
        }
        if !self.model.api_base.starts_with("http://") && !self.model.api_base.starts_with("https://")
        {
            tracing::warn!(
                "API base '{}' doesn't start with http:// or https://",
                self.model.api_base
            );
        }
        Ok(())
    }
}

/// Load `explicit` as a dotenv file, or `./.env` when present.
/// A named file that cannot be loaded is an error.
fn load_env_file(explicit: Option<&str>) -> Result<()> {
    match explicit {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| TutorError::Config {
                message: format!("cannot load env file {}: {}", path, e),
            })?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}
