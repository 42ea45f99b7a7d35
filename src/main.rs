//! cg-tutor: ask an LLM for a Plotly visualization of a computer-graphics
//! exam question, run the generated script and keep the HTML it writes.
//!
//! Usage:
//!   cg-tutor                                  # built-in demo questions
//!   cg-tutor -q "Reflect the ray d=(1,-1,0) about n=(0,1,0)"
//!   cg-tutor --questions-file exam.txt --image figure.jpg

use std::path::PathBuf;

use anyhow::{Context, Result};
use cg_tutor::clients::OpenAiClient;
use cg_tutor::config::{Config, DEFAULT_LOG_LEVEL};
use cg_tutor::questions::{demo_questions, parse_questions};
use cg_tutor::{Pipeline, Question};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt, reload};

#[derive(Parser)]
#[command(name = "cg-tutor")]
#[command(about = "Generate and run Plotly visualizations for CG exam questions", long_about = None)]
struct Cli {
    /// Question text (repeatable)
    #[arg(short, long = "question")]
    questions: Vec<String>,

    /// File with questions separated by lines containing only `---`
    #[arg(long)]
    questions_file: Option<PathBuf>,

    /// Reference image sent along with every question
    #[arg(long)]
    image: Option<PathBuf>,

    /// Path to a TOML config file (defaults to cg_tutor.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    api_base: Option<String>,

    /// Python interpreter used to run generated scripts
    #[arg(long)]
    python: Option<String>,

    /// Run scripts through `conda run -n <ENV>`
    #[arg(long)]
    conda_env: Option<String>,

    /// Directory where generated scripts run
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Directory where runs are saved
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Execution timeout for generated scripts (with and without an image)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Execution timeout for image-guided scripts, overriding --timeout-ms
    #[arg(long)]
    image_timeout_ms: Option<u64>,

    /// Extra model calls when a reply contains no code block
    #[arg(long)]
    max_retries: Option<u32>,
}

impl Cli {
    /// CLI flags override file and environment settings
    fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model.name = model.clone();
        }
        if let Some(base) = &self.api_base {
            config.model.api_base = base.clone();
        }
        if let Some(python) = &self.python {
            config.execution.python = python.clone();
        }
        if let Some(env) = &self.conda_env {
            config.execution.conda_env = Some(env.clone());
        }
        if let Some(dir) = &self.work_dir {
            config.execution.work_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.execution.timeout_ms = ms;
            config.execution.image_timeout_ms = ms;
        }
        if let Some(ms) = self.image_timeout_ms {
            config.execution.image_timeout_ms = ms;
        }
        if let Some(n) = self.max_retries {
            config.model.max_retries = n;
        }
    }

    fn collect_questions(&self) -> Result<Vec<Question>> {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| !q.trim().is_empty())
            .map(Question::new)
            .collect();

        if let Some(path) = &self.questions_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read questions file {}", path.display()))?;
            questions.extend(parse_questions(&content));
        }

        if questions.is_empty() {
            questions = demo_questions();
        }

        if let Some(image) = &self.image {
            questions = questions
                .into_iter()
                .map(|q| q.with_image(image.clone()))
                .collect();
        }
        Ok(questions)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Subscriber goes up before the config loads so its warnings are not lost.
    // RUST_LOG wins; otherwise the configured level replaces the default below.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL)));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load_from(cli.config.as_deref()).map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    cli.apply(&mut config);
    config.validate()?;

    if !from_env {
        filter_handle
            .reload(EnvFilter::new(&config.log_level))
            .context("Failed to apply configured log level")?;
    }

    let questions = cli.collect_questions()?;
    info!(
        "Starting cg-tutor: model={}, questions={}, work_dir={}, output_dir={}",
        config.model.name,
        questions.len(),
        config.execution.work_dir.display(),
        config.output.dir.display()
    );

    let client = OpenAiClient::from_config(&config.model, config.runtime.openai_api_key.clone())
        .context("Failed to create model client")?;
    let pipeline = Pipeline::from_config(client, &config);

    let summary = pipeline.run_all(&questions).await;

    for record in &summary.completed {
        println!("ok     {}", record.run_dir.display());
        for artifact in &record.artifacts {
            println!("       {}", artifact.display());
        }
    }
    for (question, err) in &summary.failures {
        println!("failed {}: {}", question, err);
    }
    println!(
        "{} completed, {} failed",
        summary.completed.len(),
        summary.failures.len()
    );

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
