//! One question in, one saved run out.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::clients::{ChatMessage, ChatModel};
use crate::config::Config;
use crate::error::PipelineError;
use crate::executor::{CodeExecutor, ExecutionReport};
use crate::extract::extract_python_code;
use crate::image::ImageAttachment;
use crate::prompts;
use crate::writer::{ArtifactSnapshot, ResultWriter, RunDraft, RunRecord, RunStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub image: Option<PathBuf>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<PathBuf>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// First line of the question, shortened for log lines
    pub fn preview(&self) -> String {
        let first = self.text.trim().lines().next().unwrap_or_default();
        if first.chars().count() > 60 {
            format!("{}...", first.chars().take(60).collect::<String>())
        } else {
            first.to_string()
        }
    }
}

/// Outcome of a batch; failures carry the question preview and the error text
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: Vec<RunRecord>,
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Pipeline<M: ChatModel> {
    model: M,
    executor: CodeExecutor,
    writer: ResultWriter,
    max_retries: u32,
    image_timeout: Duration,
}

impl<M: ChatModel> Pipeline<M> {
    pub fn new(model: M, executor: CodeExecutor, writer: ResultWriter) -> Self {
        let image_timeout = executor.timeout();
        Self {
            model,
            executor,
            writer,
            max_retries: 3,
            image_timeout,
        }
    }

    pub fn from_config(model: M, config: &Config) -> Self {
        let executor = CodeExecutor::new(
            config.execution.interpreter(),
            config.execution.work_dir.clone(),
            config.execution.timeout(false),
        )
        .with_script_name(config.execution.script_name.clone());
        Self::new(model, executor, ResultWriter::new(config.output.dir.clone()))
            .with_max_retries(config.model.max_retries)
            .with_image_timeout(config.execution.timeout(true))
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    /// Ask the model for code, re-asking while the reply has no usable code block.
    /// API errors are returned immediately.
    pub async fn generate_code(&self, messages: &[ChatMessage]) -> Result<String, PipelineError> {
        let attempts = self.max_retries + 1;
        for attempt in 1..=attempts {
            let reply = self.model.complete(messages).await?;
            if let Some(code) = extract_python_code(&reply) {
                info!(
                    "Extracted {} lines of code (attempt {}/{})",
                    code.lines().count(),
                    attempt,
                    attempts
                );
                return Ok(code);
            }
            if attempt < attempts {
                warn!(
                    "Code extraction failed. Retrying... ({} retries left)",
                    attempts - attempt
                );
            }
        }
        Err(PipelineError::NoCode { attempts })
    }

    pub async fn describe_image(&self, image: &ImageAttachment) -> Result<String, PipelineError> {
        info!(
            "Describing image {} ({})",
            image.path.display(),
            image.mime
        );
        let messages = prompts::build_image_description_prompt(image);
        let description = self.model.complete(&messages).await?;
        let description = description.trim().to_string();
        info!("Image description: {}", description);
        Ok(description)
    }

    pub async fn process_question(&self, question: &Question) -> Result<RunRecord, PipelineError> {
        info!("Processing question: {}", question.preview());

        let (messages, timeout) = match &question.image {
            Some(path) => {
                let image = ImageAttachment::from_path(path).map_err(|e| PipelineError::Image {
                    message: format!("cannot read {}: {}", path.display(), e),
                })?;
                let description = self.describe_image(&image).await?;
                (
                    prompts::build_image_code_prompt(&question.text, &description, &image),
                    self.image_timeout,
                )
            }
            None => (
                prompts::build_code_prompt(&question.text),
                self.executor.timeout(),
            ),
        };

        let code = self.generate_code(&messages).await?;

        let work_dir = self.executor.work_dir();
        let snapshot = ArtifactSnapshot::take(work_dir).await?;
        let result = self.executor.run_with_timeout(&code, timeout).await;
        let artifacts = snapshot.changed_since(work_dir).await?;

        match result {
            Ok(report) => {
                log_report(&report);
                let record = self
                    .save(question, &code, &report.output, &artifacts, RunStatus::Succeeded)
                    .await?;
                Ok(record)
            }
            Err(exec_err) => {
                let status = RunStatus::Failed {
                    error: exec_err.to_string(),
                };
                let output = exec_err.output().unwrap_or_default();
                if let Err(e) = self.save(question, &code, output, &artifacts, status).await {
                    warn!("Could not save failed run: {}", e);
                }
                Err(exec_err.into())
            }
        }
    }

    /// Process questions one after another; a failure never stops the batch
    pub async fn run_all(&self, questions: &[Question]) -> RunSummary {
        let mut summary = RunSummary::default();
        for question in questions {
            match self.process_question(question).await {
                Ok(record) => summary.completed.push(record),
                Err(e) => {
                    error!("Question \"{}\" failed: {}", question.preview(), e);
                    summary.failures.push((question.preview(), e.to_string()));
                }
            }
        }
        summary
    }

    async fn save(
        &self,
        question: &Question,
        code: &str,
        output: &str,
        artifacts: &[PathBuf],
        status: RunStatus,
    ) -> std::io::Result<RunRecord> {
        self.writer
            .write(RunDraft {
                question: &question.text,
                model: self.model.model_name(),
                image: question.image.as_deref(),
                script: code,
                execution_output: output,
                artifacts,
                status,
            })
            .await
    }
}

fn log_report(report: &ExecutionReport) {
    info!(
        "Script {} finished in {}ms",
        report.script_path.display(),
        report.elapsed.as_millis()
    );
    if !report.output.trim().is_empty() {
        info!("Execution output:\n{}", report.output.trim_end());
    }
}
