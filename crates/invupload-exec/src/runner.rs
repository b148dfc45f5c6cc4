//! Supervised execution of external commands using `tokio::process`

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use crate::error::ExecError;
use crate::progress::ProgressGuard;
use crate::result::{ProcessOutcome, ProcessState};
use crate::traits::ProgressRegistry;

/// Runs one external command and streams its output into a progress record
///
/// Report generation and upload scripts are both driven through this type.
/// The progress record is closed on every exit path, including errors and
/// the future being dropped.
#[derive(Debug, Clone)]
pub struct ShellProcess {
    command: Vec<String>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
    state: ProcessState,
}

impl ShellProcess {
    /// Create a process for the given argument vector
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            timeout: None,
            state: ProcessState::Idle,
        }
    }

    /// Variables added to the inherited environment
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Kill the child if it runs longer than `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Run the command, reporting into a progress record registered as `label`
    ///
    /// A non-zero exit is not an error; check [`ProcessOutcome::success`].
    ///
    /// # Errors
    /// Returns an error if the command is empty, cannot be spawned, its output
    /// cannot be read, or it exceeds the configured timeout.
    #[instrument(skip(self, registry), fields(command = ?self.command))]
    pub async fn run(
        &mut self,
        label: &str,
        registry: &dyn ProgressRegistry,
    ) -> Result<ProcessOutcome, ExecError> {
        debug!("starting process");
        let progress = ProgressGuard::new(registry.register(label));

        let result = match self.timeout {
            Some(limit) => match timeout(limit, self.supervise(&progress)).await {
                Ok(result) => result,
                Err(_) => {
                    error!(timeout = ?limit, "process timed out");
                    Err(ExecError::Timeout { timeout: limit })
                }
            },
            None => self.supervise(&progress).await,
        };

        if let Err(e) = &result {
            progress.set_status(match self.state {
                ProcessState::Running { pid } => format!("pid {pid} {e}"),
                _ => format!("failed: {e}"),
            });
        }

        self.state = match &result {
            Ok(outcome) if outcome.success() => ProcessState::Completed,
            _ => ProcessState::Failed,
        };

        match &result {
            Ok(outcome) => info!(
                pid = outcome.pid,
                status = %outcome.status,
                lines = outcome.lines,
                duration = ?outcome.duration,
                "process finished"
            ),
            Err(e) => error!(error = %e, "process supervision failed"),
        }

        result
    }

    async fn supervise(&mut self, progress: &ProgressGuard) -> Result<ProcessOutcome, ExecError> {
        let start = Instant::now();
        let mut child = self.spawn()?;
        let pid = child.id().unwrap_or_default();

        self.state = ProcessState::Running { pid };
        progress.set_status(format!("Running in pid {pid}"));

        let lines = forward_output(&mut child, progress).await?;

        let status = child
            .wait()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        let status_line = format!("pid {pid} {status}");
        progress.set_status(status_line.clone());

        Ok(ProcessOutcome {
            pid,
            code: status.code(),
            status: status_line,
            lines,
            duration: start.elapsed(),
        })
    }

    fn spawn(&self) -> Result<Child, ExecError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ExecError::ConfigError("empty command".to_string()))?;

        Command::new(program)
            .args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{program}: {e}")))
    }
}

/// Forward stdout and stderr lines until both streams are closed
async fn forward_output(child: &mut Child, progress: &ProgressGuard) -> Result<usize, ExecError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::IoError("stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::IoError("stderr not captured".to_string()))?;

    let mut stdout = RawLines::new(stdout);
    let mut stderr = RawLines::new(stderr);
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut count = 0;

    while stdout_open || stderr_open {
        let line = tokio::select! {
            line = stdout.next_line(), if stdout_open => {
                let line = line.map_err(|e| ExecError::IoError(e.to_string()))?;
                stdout_open = line.is_some();
                line
            }
            line = stderr.next_line(), if stderr_open => {
                let line = line.map_err(|e| ExecError::IoError(e.to_string()))?;
                stderr_open = line.is_some();
                line
            }
        };

        if let Some(line) = line {
            progress.write_line(line);
            count += 1;
        }
    }

    Ok(count)
}

/// Line reader that tolerates output which is not valid UTF-8
struct RawLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> RawLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, `None` at EOF
    ///
    /// Cancel safe: bytes read by an interrupted call stay in `buf` and the
    /// next call continues the same line.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgress;

    fn sh(script: &str) -> ShellProcess {
        ShellProcess::new(["sh", "-c", script])
    }

    #[tokio::test]
    async fn test_run_success() {
        let registry = MemoryProgress::new();
        let mut process = sh("echo one; echo two; echo three");

        let outcome = process.run("gen", &registry).await.unwrap();

        assert!(outcome.success());
        assert_eq!(outcome.lines, 3);
        assert_eq!(process.state(), ProcessState::Completed);

        let snapshot = registry.get("gen").unwrap().snapshot();
        assert_eq!(snapshot.lines, vec!["one", "two", "three"]);
        assert!(snapshot.closed);
        assert_eq!(snapshot.status, outcome.status);
        assert!(snapshot.status.starts_with(&format!("pid {}", outcome.pid)));
    }

    #[tokio::test]
    async fn test_run_failure_still_closes() {
        let registry = MemoryProgress::new();
        let mut process = sh("echo failing; exit 42");

        let outcome = process.run("upload", &registry).await.unwrap();

        assert!(!outcome.success());
        assert_eq!(outcome.code, Some(42));
        assert_eq!(process.state(), ProcessState::Failed);

        let snapshot = registry.get("upload").unwrap().snapshot();
        assert_eq!(snapshot.lines, vec!["failing"]);
        assert!(snapshot.closed);
    }

    #[tokio::test]
    async fn test_run_with_stderr() {
        let registry = MemoryProgress::new();
        let mut process = sh("echo error >&2");

        let outcome = process.run("err", &registry).await.unwrap();

        assert!(outcome.success());
        assert_eq!(registry.get("err").unwrap().snapshot().lines, vec!["error"]);
    }

    #[tokio::test]
    async fn test_run_passes_env() {
        let registry = MemoryProgress::new();
        let env = HashMap::from([("FILES".to_string(), "report.tar.xz".to_string())]);
        let mut process = sh("echo \"$FILES\"").with_env(env);

        process.run("env", &registry).await.unwrap();

        assert_eq!(
            registry.get("env").unwrap().snapshot().lines,
            vec!["report.tar.xz"]
        );
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let registry = MemoryProgress::new();
        let mut process = sh("echo started; sleep 5").with_timeout(Duration::from_millis(200));

        let result = process.run("slow", &registry).await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
        assert_eq!(process.state(), ProcessState::Failed);

        let snapshot = registry.get("slow").unwrap().snapshot();
        assert!(snapshot.closed);
        assert_eq!(snapshot.lines, vec!["started"]);
        assert!(snapshot.status.starts_with("pid "), "{}", snapshot.status);
        assert!(snapshot.status.contains("timed out"), "{}", snapshot.status);
    }

    #[tokio::test]
    async fn test_empty_command() {
        let registry = MemoryProgress::new();
        let mut process = ShellProcess::new(Vec::<String>::new());

        let result = process.run("empty", &registry).await;

        assert!(matches!(result, Err(ExecError::ConfigError(_))));
        assert!(registry.get("empty").unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_spawn_error_closes_progress() {
        let registry = MemoryProgress::new();
        let mut process = ShellProcess::new(["/nonexistent/invupload-command"]);

        let result = process.run("missing", &registry).await;

        assert!(matches!(result, Err(ExecError::SpawnError(_))));
        assert_eq!(process.state(), ProcessState::Failed);

        let snapshot = registry.get("missing").unwrap().snapshot();
        assert!(snapshot.closed);
        assert!(snapshot.status.starts_with("failed: "), "{}", snapshot.status);
    }

    #[tokio::test]
    async fn test_run_non_utf8_output() {
        let registry = MemoryProgress::new();
        let mut process =
            sh("printf 'caf\\351\\n'; printf 'crlf\\r\\n'; printf 'tail'; echo after >&2");

        let outcome = process.run("latin1", &registry).await.unwrap();

        assert!(outcome.success());
        assert_eq!(process.state(), ProcessState::Completed);

        let mut lines = registry.get("latin1").unwrap().snapshot().lines;
        lines.sort();
        assert_eq!(lines, vec!["after", "caf\u{FFFD}", "crlf", "tail"]);
    }
}
