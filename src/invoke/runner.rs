//! Process execution behind a trait so the run loop can be scripted in tests.

use crate::step::CommandSpec;
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout if non-empty, else stderr. Some tools print versions to stderr.
    pub fn text(&self) -> &str {
        if !self.stdout.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Executes external commands.
///
/// Spawn failures are returned as `io::Error`; a timeout is reported as
/// `io::ErrorKind::TimedOut`. A non-zero exit is *not* an error here: the
/// caller decides what it means.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cmd: &CommandSpec, limit: Duration) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Already root: `sudo` is not prepended.
    pub is_root: bool,
}

impl ProcessRunner {
    pub fn new(is_root: bool) -> Self {
        Self { is_root }
    }

    fn build(&self, cmd: &CommandSpec) -> Command {
        let mut command = if cmd.sudo && !self.is_root {
            // sudo resets the environment, so variables go through env(1).
            let mut c = Command::new("sudo");
            if !cmd.env_vars.is_empty() {
                c.arg("env");
                c.args(cmd.env_vars.iter().map(|(k, v)| format!("{}={}", k, v)));
            }
            c.arg(&cmd.program);
            c
        } else {
            let mut c = Command::new(&cmd.program);
            c.envs(cmd.env_vars.iter().cloned());
            c
        };
        command
            .args(&cmd.args)
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec, limit: Duration) -> io::Result<CommandOutput> {
        tracing::debug!(command = %cmd.display(), "Spawning");
        let mut child = self.build(cmd).spawn()?;
        let stdin = child.stdin.take();

        // Stdin is written while stdout/stderr are drained, both under the time limit.
        let feed = async move {
            if let (Some(input), Some(mut stdin)) = (cmd.stdin.as_deref(), stdin) {
                match stdin.write_all(input).await {
                    Ok(()) => {}
                    // The child exited without reading everything; its status decides.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                    Err(e) => return Err(e),
                }
                // Dropping closes the pipe so the interpreter sees EOF.
            }
            Ok(())
        };
        let finished = async move {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            output
        };

        let output = timeout(limit, finished)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "command timed out"))??;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runs_and_captures_stdout() {
        let runner = ProcessRunner::new(false);
        let output = runner
            .run(&CommandSpec::new("echo", ["hello"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let runner = ProcessRunner::new(false);
        let output = runner
            .run(&CommandSpec::shell("exit 3"), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.code, Some(3));
    }

    #[tokio::test]
    async fn test_stdin_is_piped() {
        let runner = ProcessRunner::new(false);
        let cmd = CommandSpec::new("bash", Vec::<String>::new()).stdin("echo from-stdin");
        let output = runner.run(&cmd, Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.stdout.trim(), "from-stdin");
    }

    #[tokio::test]
    async fn test_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(false);
        let cmd = CommandSpec::shell("echo \"$GREETING\" && pwd")
            .env("GREETING", "hi")
            .cwd(dir.path());
        let output = runner.run(&cmd, Duration::from_secs(5)).await.unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("hi"));
        assert!(lines.next().unwrap().ends_with(
            dir.path().file_name().unwrap().to_str().unwrap()
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let runner = ProcessRunner::new(false);
        let result = runner
            .run(
                &CommandSpec::new("definitely_not_a_real_program_12345", Vec::<String>::new()),
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = ProcessRunner::new(false);
        let result = runner
            .run(&CommandSpec::new("sleep", ["5"]), Duration::from_millis(50))
            .await;
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_large_script_with_large_output() {
        let runner = ProcessRunner::new(false);
        let mut script = String::from("head -c 300000 /dev/zero | tr '\\0' x\n");
        while script.len() < 256 * 1024 {
            script.push_str("# padding line to exceed the pipe buffer\n");
        }
        let cmd = CommandSpec::new("bash", Vec::<String>::new()).stdin(script);

        let output = tokio::time::timeout(
            Duration::from_secs(10),
            runner.run(&cmd, Duration::from_secs(5)),
        )
        .await
        .expect("runner exceeded its own time limit")
        .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.len(), 300_000);
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin_keeps_exit_status() {
        let runner = ProcessRunner::new(false);
        let cmd = CommandSpec::shell("exit 4").stdin(vec![b'x'; 1 << 20]);
        let output = runner.run(&cmd, Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.code, Some(4));
    }

    #[tokio::test]
    async fn test_timeout_applies_while_feeding_stdin() {
        let runner = ProcessRunner::new(false);
        let cmd = CommandSpec::shell("sleep 5").stdin(vec![b'x'; 1 << 20]);
        let result = tokio::time::timeout(
            Duration::from_secs(3),
            runner.run(&cmd, Duration::from_millis(200)),
        )
        .await
        .expect("runner exceeded its own time limit");
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_output_text_prefers_stdout() {
        let output = CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: "openjdk version \"21.0.2\"".to_string(),
        };
        assert!(output.text().contains("21.0.2"));
    }
}
