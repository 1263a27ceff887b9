//! Agent subprocess runner.
//!
//! Runs exactly one external agent process for a bounded duration: the
//! prompt is written to the process's standard input (then closed, since
//! these agents read one full prompt and then begin work), and merged
//! stdout/stderr is streamed line by line. Every line is redacted, echoed
//! to the caller's terminal, appended to the log file and, when requested,
//! to a transcript file, in the order received.
//!
//! Stdout and stderr are read by dedicated tasks feeding a bounded channel
//! drained here, which preserves per-stream ordering at line granularity
//! and keeps the timeout path responsive.
//!
//! A failed or timed-out agent is a result, not an error: only
//! misconfiguration (empty command, executable not found, spawn failure)
//! surfaces as [`ExecError`]. There is no retry at this layer; agent runs
//! are expensive and non-idempotent.

use crate::security;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Hard failures that indicate misconfiguration, not agent misbehavior.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("empty agent command")]
    EmptyCommand,

    #[error("agent executable not found on PATH: {program}")]
    CommandNotFound { program: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to prepare log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One agent invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Full command line, program first.
    pub argv: Vec<String>,

    /// Prompt text written to the agent's standard input.
    pub prompt: String,

    /// Working directory the agent runs in.
    pub work_dir: PathBuf,

    /// Wall-clock bound; the process is killed when it elapses.
    pub timeout: Duration,

    /// Log file receiving every (redacted) output line.
    pub log_file: PathBuf,

    /// Optional transcript file receiving the same stream.
    pub transcript_file: Option<PathBuf>,

    /// Extra environment variables on top of the sanitized environment.
    pub env: Vec<(String, String)>,

    /// Echo output lines to this process's stdout as they arrive.
    pub echo: bool,
}

impl ExecRequest {
    pub fn new(
        argv: Vec<String>,
        prompt: String,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            argv,
            prompt,
            work_dir: work_dir.into(),
            timeout,
            log_file: log_file.into(),
            transcript_file: None,
            env: Vec::new(),
            echo: false,
        }
    }

    pub fn with_transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

/// Outcome of one agent invocation.
#[derive(Debug, Clone)]
pub struct ExecReport {
    /// True iff the process exited zero within the timeout and the streams
    /// were captured without error.
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub elapsed: Duration,
    pub log_file: PathBuf,
    pub transcript_file: Option<PathBuf>,
    /// Captured stream/infrastructure error, if any.
    pub error: Option<String>,
}

/// Run one agent process to completion or timeout.
pub async fn run_agent(req: ExecRequest) -> Result<ExecReport, ExecError> {
    let ExecRequest {
        argv,
        prompt,
        work_dir,
        timeout,
        log_file,
        transcript_file,
        env,
        echo,
    } = req;

    let program = argv.first().cloned().ok_or(ExecError::EmptyCommand)?;
    if which::which(&program).is_err() {
        return Err(ExecError::CommandNotFound { program });
    }

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ExecError::LogFile {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut log = tokio::fs::File::create(&log_file)
        .await
        .map_err(|source| ExecError::LogFile {
            path: log_file.clone(),
            source,
        })?;
    let mut transcript = match &transcript_file {
        Some(path) => Some(tokio::fs::File::create(path).await.map_err(|source| {
            ExecError::LogFile {
                path: path.clone(),
                source,
            }
        })?),
        None => None,
    };

    let mut cmd = Command::new(&program);
    cmd.args(&argv[1..])
        .current_dir(&work_dir)
        .env_clear()
        .envs(security::safe_env())
        .envs(env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program = %program, work_dir = %work_dir.display(), timeout_secs = timeout.as_secs(), "spawning agent");
    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.clone(),
        source,
    })?;

    // Readers first, so output is drained while the prompt is still being
    // written; otherwise a chatty agent could fill the pipes and deadlock.
    let (tx, mut rx) = mpsc::channel::<String>(256);
    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(stdout, tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(stderr, tx.clone());
    }
    drop(tx);

    // Feed the prompt and close stdin to signal end-of-input.
    let stdin_task = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move { stdin.write_all(prompt.as_bytes()).await })
    });

    let deadline = started + timeout;
    let mut timed_out = false;
    let mut stream_error: Option<String> = None;

    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(line)) => {
                let line = security::redact(&line);
                if echo {
                    println!("{line}");
                }
                if let Err(err) = write_line(&mut log, &line).await {
                    stream_error
                        .get_or_insert_with(|| format!("failed to append to log: {err}"));
                }
                if let Some(file) = transcript.as_mut() {
                    if let Err(err) = write_line(file, &line).await {
                        stream_error.get_or_insert_with(|| {
                            format!("failed to append to transcript: {err}")
                        });
                    }
                }
            }
            // Both pipes reached end-of-stream.
            Ok(None) => break,
            Err(_) => {
                timed_out = true;
                break;
            }
        }
    }

    let exit_code = if timed_out {
        warn!(timeout_secs = timeout.as_secs(), "agent timed out, killing process");
        let _ = child.start_kill();
        let _ = child.wait().await;
        None
    } else {
        match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(err)) => {
                stream_error.get_or_insert_with(|| format!("failed to reap agent: {err}"));
                None
            }
            Err(_) => {
                timed_out = true;
                let _ = child.start_kill();
                let _ = child.wait().await;
                None
            }
        }
    };

    if let Some(handle) = stdin_task {
        if let Ok(Err(err)) = handle.await {
            // Agents may exit without draining stdin; that is not a failure.
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                stream_error
                    .get_or_insert_with(|| format!("failed to write prompt to agent: {err}"));
            }
        }
    }

    let _ = log.flush().await;
    if let Some(file) = transcript.as_mut() {
        let _ = file.flush().await;
    }

    let elapsed = started.elapsed();
    let success = !timed_out && stream_error.is_none() && exit_code == Some(0);
    let error = if timed_out {
        Some(format!("timed out after {} seconds", timeout.as_secs()))
    } else {
        stream_error
    };
    debug!(
        ?exit_code,
        timed_out,
        elapsed_secs = elapsed.as_secs_f64(),
        "agent run finished"
    );

    Ok(ExecReport {
        success,
        exit_code,
        timed_out,
        elapsed,
        log_file,
        transcript_file,
        error,
    })
}

fn spawn_line_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    tx: mpsc::Sender<String>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

async fn write_line(file: &mut tokio::fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}

/// Convenience check used before a run is attempted at all.
pub fn provider_available(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn request(dir: &Path, script: &str, prompt: &str, timeout_secs: u64) -> ExecRequest {
        ExecRequest::new(
            sh(script),
            prompt.to_string(),
            dir,
            Duration::from_secs(timeout_secs),
            dir.join("logs/test.log"),
        )
    }

    #[tokio::test]
    async fn test_output_ordering_preserved() {
        let dir = tempdir().unwrap();
        let report = run_agent(request(
            dir.path(),
            "cat > /dev/null; echo L1; echo L2; echo L3",
            "ignored",
            30,
        ))
        .await
        .unwrap();

        assert!(report.success);
        assert_eq!(report.exit_code, Some(0));
        let log = std::fs::read_to_string(&report.log_file).unwrap();
        assert_eq!(log, "L1\nL2\nL3\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_not_error() {
        let dir = tempdir().unwrap();
        let report = run_agent(request(dir.path(), "cat > /dev/null; exit 3", "", 30))
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.exit_code, Some(3));
        assert!(!report.timed_out);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = tempdir().unwrap();
        let report = run_agent(request(dir.path(), "sleep 30", "", 1)).await.unwrap();
        assert!(!report.success);
        assert!(report.timed_out);
        assert!(report.exit_code.is_none());
        assert!(report.error.as_deref().unwrap_or("").contains("timed out"));
        // Killed at ~1s, well short of the 30s sleep.
        assert!(report.elapsed < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_prompt_reaches_stdin_and_transcript() {
        let dir = tempdir().unwrap();
        let req = request(dir.path(), "cat", "first line\nsecond line", 30)
            .with_transcript(dir.path().join("logs/test_transcript.jsonl"));
        let report = run_agent(req).await.unwrap();

        assert!(report.success);
        let log = std::fs::read_to_string(&report.log_file).unwrap();
        assert_eq!(log, "first line\nsecond line\n");
        let transcript =
            std::fs::read_to_string(report.transcript_file.as_ref().unwrap()).unwrap();
        assert_eq!(transcript, log);
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let dir = tempdir().unwrap();
        let report = run_agent(request(
            dir.path(),
            "cat > /dev/null; echo oops >&2; echo fine",
            "",
            30,
        ))
        .await
        .unwrap();
        let log = std::fs::read_to_string(&report.log_file).unwrap();
        assert!(log.contains("oops"));
        assert!(log.contains("fine"));
    }

    #[tokio::test]
    async fn test_streamed_lines_are_redacted() {
        let dir = tempdir().unwrap();
        let report = run_agent(request(
            dir.path(),
            "cat > /dev/null; echo key is sk-ant-REDACTED",
            "",
            30,
        ))
        .await
        .unwrap();
        let log = std::fs::read_to_string(&report.log_file).unwrap();
        assert!(log.contains("[REDACTED_ANTHROPIC_KEY]"));
        assert!(!log.contains("sk-ant-abcdef"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_hard_error() {
        let dir = tempdir().unwrap();
        let req = ExecRequest::new(
            vec!["definitely-not-a-real-binary-xyz".to_string()],
            String::new(),
            dir.path(),
            Duration::from_secs(5),
            dir.path().join("logs/test.log"),
        );
        match run_agent(req).await {
            Err(ExecError::CommandNotFound { program }) => {
                assert_eq!(program, "definitely-not-a-real-binary-xyz");
            }
            other => panic!("expected CommandNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_command_is_hard_error() {
        let dir = tempdir().unwrap();
        let req = ExecRequest::new(
            Vec::new(),
            String::new(),
            dir.path(),
            Duration::from_secs(5),
            dir.path().join("logs/test.log"),
        );
        assert!(matches!(run_agent(req).await, Err(ExecError::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_env_overrides_reach_child() {
        let dir = tempdir().unwrap();
        let req = request(dir.path(), "cat > /dev/null; echo \"var=$RK_TEST_VAR\"", "", 30)
            .with_env(vec![("RK_TEST_VAR".to_string(), "42".to_string())]);
        let report = run_agent(req).await.unwrap();
        let log = std::fs::read_to_string(&report.log_file).unwrap();
        assert_eq!(log, "var=42\n");
    }

    #[test]
    fn test_provider_available() {
        assert!(provider_available("sh"));
        assert!(!provider_available("definitely-not-a-real-binary-xyz"));
    }
}
