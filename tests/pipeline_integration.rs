//! End-to-end pipeline runs against a scripted model.
//!
//! Generated "scripts" are shell snippets executed with `sh`, so these tests do
//! not need a Python installation.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cg_tutor::clients::{ChatMessage, ChatModel, MessageContent, ModelError};
use cg_tutor::error::PipelineError;
use cg_tutor::executor::{CodeExecutor, ExecError, InterpreterConfig};
use cg_tutor::writer::ResultWriter;
use cg_tutor::{Pipeline, Question};

#[derive(Default)]
struct ScriptState {
    replies: VecDeque<Result<String, ModelError>>,
    requests: Vec<Vec<ChatMessage>>,
}

/// Replays canned replies in order and records every request
#[derive(Clone, Default)]
struct ScriptedModel {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedModel {
    fn replying<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ModelError>>,
    {
        let model = Self::default();
        model.state.lock().unwrap().replies = replies.into_iter().collect();
        model
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(messages.to_vec());
        state
            .replies
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn fenced(code: &str) -> Result<String, ModelError> {
    Ok(format!("Here is the script:\n```python\n{}\n```\n", code))
}

fn pipeline(model: ScriptedModel, work: &Path, out: &Path) -> Pipeline<ScriptedModel> {
    let executor = CodeExecutor::new(InterpreterConfig::new("sh"), work, Duration::from_secs(10));
    Pipeline::new(model, executor, ResultWriter::new(out))
}

fn run_dirs(out: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(out) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_mocked_response_writes_artifact() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([fenced(
        "echo 'projected P at (1,1,2)'\necho '<html>shadow</html>' > temp_1700000000.html",
    )]);

    let record = pipeline(model.clone(), work.path(), out.path())
        .process_question(&Question::new("Project P=(1,2,1) onto y=1"))
        .await?;

    let expected = record.run_dir.join("temp_1700000000.html");
    assert_eq!(record.artifacts, vec![expected.clone()]);
    assert_eq!(std::fs::read_to_string(&expected)?.trim(), "<html>shadow</html>");
    assert!(record.run_dir.starts_with(out.path()));

    // The script ran from the work dir under its fixed name
    assert!(work.path().join("test.py").exists());
    assert!(work.path().join("temp_1700000000.html").exists());

    let log = std::fs::read_to_string(&record.log_path)?;
    assert!(log.contains("projected P at (1,1,2)"));

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0][1].text().contains("Project P=(1,2,1) onto y=1"));
    Ok(())
}

#[tokio::test]
async fn test_model_failure_is_surfaced() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([Err(ModelError::Http {
        status: 401,
        body: "invalid api key".to_string(),
        hint: Some("auth"),
    })]);

    let err = pipeline(model.clone(), work.path(), out.path())
        .process_question(&Question::new("Q"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Model(ModelError::Http { status: 401, .. })
    ));
    assert!(err.to_string().contains("hint: auth"));
    // API errors are not retried and nothing is written
    assert_eq!(model.requests().len(), 1);
    assert!(run_dirs(out.path()).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_script_reports_error_and_saves_failed_run() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([fenced("if then fi (")]);

    let err = pipeline(model, work.path(), out.path())
        .process_question(&Question::new("Q"))
        .await
        .unwrap_err();

    match &err {
        PipelineError::Exec(ExecError::Failed { code, output }) => {
            assert_ne!(*code, Some(0));
            assert!(!output.trim().is_empty());
        }
        other => panic!("Expected execution failure, got {other:?}"),
    }

    let dirs = run_dirs(out.path());
    assert_eq!(dirs.len(), 1);
    let manifest: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dirs[0].join("manifest.json"))?)?;
    assert_eq!(manifest["status"], "failed");
    assert_eq!(
        std::fs::read_to_string(dirs[0].join("script.py"))?,
        "if then fi ("
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_code_block_is_retried() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([
        Ok("I would plot the shadow with Plotly.".to_string()),
        fenced("echo '<html/>' > temp_2.html"),
    ]);

    let record = pipeline(model.clone(), work.path(), out.path())
        .process_question(&Question::new("Q"))
        .await?;

    assert_eq!(model.requests().len(), 2);
    assert_eq!(record.artifacts.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_gives_up_after_max_retries() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying((0..5).map(|_| Ok("no code here".to_string())));

    let err = pipeline(model.clone(), work.path(), out.path())
        .with_max_retries(2)
        .process_question(&Question::new("Q"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoCode { attempts: 3 }));
    assert_eq!(model.requests().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_slow_script_times_out() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([fenced("sleep 5")]);
    let executor = CodeExecutor::new(
        InterpreterConfig::new("sh"),
        work.path(),
        Duration::from_millis(200),
    );

    let err = Pipeline::new(model, executor, ResultWriter::new(out.path()))
        .process_question(&Question::new("Q"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Exec(ExecError::Timeout { timeout_ms: 200 })
    ));
    Ok(())
}

#[tokio::test]
async fn test_unknown_interpreter() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([fenced("print(1)")]);
    let executor = CodeExecutor::new(
        InterpreterConfig::new("cg-tutor-no-such-python"),
        work.path(),
        Duration::from_secs(5),
    );

    let err = Pipeline::new(model, executor, ResultWriter::new(out.path()))
        .process_question(&Question::new("Q"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Exec(ExecError::InterpreterNotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_image_question_describes_image_first() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let image = work.path().join("figure.png");
    std::fs::write(&image, b"not really a png")?;

    let model = ScriptedModel::replying([
        Ok("  A cube floating above a grey plane.  ".to_string()),
        fenced("echo '<html>cube</html>' > temp_3.html"),
    ]);

    let record = pipeline(model.clone(), work.path(), out.path())
        .process_question(&Question::new("Where does the shadow fall?").with_image(&image))
        .await?;

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert!(matches!(requests[0][1].content, MessageContent::Parts(_)));
    let code_request = requests[1][1].text();
    assert!(code_request.contains("## Image Description:\nA cube floating above a grey plane."));
    assert!(code_request.contains("Where does the shadow fall?"));
    assert_eq!(record.image.as_deref(), Some(image.as_path()));
    assert_eq!(record.artifacts.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unreadable_image_fails_before_model_call() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::default();

    let err = pipeline(model.clone(), work.path(), out.path())
        .process_question(&Question::new("Q").with_image(work.path().join("missing.jpg")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Image { .. }));
    assert!(model.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_run_all_continues_after_failure() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let model = ScriptedModel::replying([
        Err(ModelError::Transport("connection reset".to_string())),
        fenced("echo '<html/>' > temp_4.html"),
    ]);

    let summary = pipeline(model, work.path(), out.path())
        .run_all(&[Question::new("first"), Question::new("second")])
        .await;

    assert_eq!(summary.completed.len(), 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, "first");
    assert!(summary.failures[0].1.contains("connection reset"));
    assert!(!summary.all_succeeded());
    Ok(())
}

#[tokio::test]
async fn test_only_new_artifacts_are_collected() -> Result<()> {
    let work = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    std::fs::write(work.path().join("temp_old.html"), "<html>old</html>")?;
    let model = ScriptedModel::replying([fenced("echo '<html>new</html>' > temp_new.html")]);

    let record = pipeline(model, work.path(), out.path())
        .process_question(&Question::new("Q"))
        .await?;

    assert_eq!(record.artifacts, vec![record.run_dir.join("temp_new.html")]);
    Ok(())
}
