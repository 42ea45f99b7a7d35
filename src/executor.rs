//! Runs generated scripts with a local interpreter.
//!
//! There is no sandbox: the script runs with the caller's privileges inside the
//! work directory. The only limit is a wall-clock timeout, after which the
//! child is killed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

const OUTPUT_SNIPPET_CAP: usize = 2000;

/// Command prefix; the script path is appended as the final argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl InterpreterConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("cannot prepare {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("interpreter '{0}' not found")]
    InterpreterNotFound(String),
    #[error("spawn error: {0}")]
    Spawn(String),
    #[error("execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("script exited with {}: {}", exit_label(.code), truncate_snippet(.output.trim(), OUTPUT_SNIPPET_CAP))]
    Failed { code: Option<i32>, output: String },
}

impl ExecError {
    /// Interpreter output attached to the failure, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub script_path: PathBuf,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct CodeExecutor {
    interpreter: InterpreterConfig,
    work_dir: PathBuf,
    script_name: String,
    timeout: Duration,
}

impl CodeExecutor {
    pub fn new(interpreter: InterpreterConfig, work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter,
            work_dir: work_dir.into(),
            script_name: "test.py".to_string(),
            timeout,
        }
    }

    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Write the script into the work dir, creating it if needed
    pub async fn write_script(&self, script: &str) -> Result<PathBuf, ExecError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|source| ExecError::Io {
                path: self.work_dir.clone(),
                source,
            })?;
        let path = self.work_dir.join(&self.script_name);
        tokio::fs::write(&path, script)
            .await
            .map_err(|source| ExecError::Io {
                path: path.clone(),
                source,
            })?;
        tokio::fs::canonicalize(&path)
            .await
            .map_err(|source| ExecError::Io { path, source })
    }

    pub async fn run(&self, script: &str) -> Result<ExecutionReport, ExecError> {
        self.run_with_timeout(script, self.timeout).await
    }

    pub async fn run_with_timeout(
        &self,
        script: &str,
        timeout: Duration,
    ) -> Result<ExecutionReport, ExecError> {
        let script_path = self.write_script(script).await?;

        let mut cmd = Command::new(&self.interpreter.program);
        cmd.kill_on_drop(true)
            .args(&self.interpreter.args)
            .arg(&script_path)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        info!(
            "Running {} {} {}",
            self.interpreter.program,
            self.interpreter.args.join(" "),
            script_path.display()
        );
        let started = Instant::now();

        // Dropping the output future on timeout kills the child
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| map_spawn_err(e, &self.interpreter.program))?,
            Err(_) => {
                return Err(ExecError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };
        let elapsed = started.elapsed();
        let combined = combine_output(&output.stdout, &output.stderr);

        debug!(
            "Interpreter exited with {:?} after {}ms",
            output.status.code(),
            elapsed.as_millis()
        );

        if !output.status.success() {
            return Err(ExecError::Failed {
                code: output.status.code(),
                output: combined,
            });
        }

        Ok(ExecutionReport {
            script_path,
            exit_code: output.status.code(),
            output: combined,
            elapsed,
        })
    }
}

fn map_spawn_err(err: std::io::Error, program: &str) -> ExecError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ExecError::InterpreterNotFound(program.to_string())
    } else {
        ExecError::Spawn(err.to_string())
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.into_owned(),
        (true, false) => stderr.into_owned(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "signal".to_string(),
    }
}

fn truncate_snippet(input: &str, max: usize) -> String {
    if input.len() <= max {
        return input.to_string();
    }
    let mut start = input.len() - max;
    while !input.is_char_boundary(start) {
        start += 1;
    }
    // Tracebacks end with the interesting line, so keep the tail
    format!("...{}", &input[start..])
}
