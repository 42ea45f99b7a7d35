//! CodeExecutor against a real child process, using `sh` as the interpreter.

use std::time::Duration;

use anyhow::Result;
use cg_tutor::executor::{CodeExecutor, ExecError, InterpreterConfig};

fn sh_executor(work_dir: &std::path::Path, timeout: Duration) -> CodeExecutor {
    CodeExecutor::new(InterpreterConfig::new("sh"), work_dir, timeout)
}

#[tokio::test]
async fn run_creates_missing_nested_work_dir() -> Result<()> {
    let root = tempfile::tempdir()?;
    let work = root.path().join("nested").join("work");
    assert!(!work.exists());

    let executor = sh_executor(&work, Duration::from_secs(10));
    let report = executor
        .run("echo plotted > figure.html\necho done\necho warn >&2\n")
        .await?;

    assert!(work.is_dir());
    assert_eq!(report.script_path, work.canonicalize()?.join("test.py"));
    assert_eq!(report.exit_code, Some(0));
    assert!(report.output.contains("done"));
    assert!(report.output.contains("warn"));
    // cwd is the work dir, so relative writes land there
    assert_eq!(
        std::fs::read_to_string(work.join("figure.html"))?,
        "plotted\n"
    );
    Ok(())
}

#[tokio::test]
async fn run_uses_configured_script_name_and_timeout() -> Result<()> {
    let root = tempfile::tempdir()?;
    let executor = sh_executor(root.path(), Duration::from_millis(200)).with_script_name("gen.sh");
    assert_eq!(executor.timeout(), Duration::from_millis(200));

    let err = executor.run("sleep 5\n").await.unwrap_err();
    assert!(matches!(err, ExecError::Timeout { timeout_ms: 200 }));
    assert!(root.path().join("gen.sh").is_file());
    Ok(())
}

#[tokio::test]
async fn run_reports_non_zero_exit_with_output() -> Result<()> {
    let root = tempfile::tempdir()?;
    let executor = sh_executor(root.path(), Duration::from_secs(10));

    match executor.run("echo broken >&2\nexit 3\n").await {
        Err(ExecError::Failed { code, output }) => {
            assert_eq!(code, Some(3));
            assert!(output.contains("broken"));
        }
        other => panic!("Expected Failed, got {:?}", other.map(|r| r.exit_code)),
    }
    Ok(())
}
