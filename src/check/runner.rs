//! External verifier invocation.
//!
//! A [`TestRunner`] knows how to build the command that tests a snapshot and
//! how to reduce that command's output to the string the classifier sees.
//! [`run_process`] drives the command to completion.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::TEST_OK;
use crate::error::{CheckError, Result};

/// Captured output of a finished test process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len());
        text.push_str(&self.stdout);
        text.push_str(&self.stderr);
        text
    }
}

/// Builds and interprets the test command for a snapshot.
pub trait TestRunner: Send + Sync {
    /// Command that tests the file at `snapshot`.
    fn command(&self, snapshot: &Path) -> Command;

    /// Text handed to the classifier.
    fn tests_output(&self, output: &ProcessOutput) -> String {
        output.combined()
    }
}

/// Runs `program args... <snapshot>`.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    program: OsString,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl TestRunner for CommandRunner {
    fn command(&self, snapshot: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(snapshot);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Reads the verdict from marker lines printed by a test harness.
///
/// The harness prints `<marker> OK` for passing tests and
/// `<marker> FAILED + <message>` for failing ones. The first failure message
/// becomes the output; if every marker line passed the output is the
/// sentinel. Without any marker line the raw combined output is used.
#[derive(Clone, Debug)]
pub struct MarkedOutputRunner<R> {
    inner: R,
    marker: String,
    sentinel: String,
}

const FAILED_PREFIX: &str = "FAILED + ";

impl<R: TestRunner> MarkedOutputRunner<R> {
    pub fn new(inner: R, marker: impl Into<String>) -> Self {
        Self {
            inner,
            marker: marker.into(),
            sentinel: TEST_OK.to_string(),
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }
}

impl<R: TestRunner> TestRunner for MarkedOutputRunner<R> {
    fn command(&self, snapshot: &Path) -> Command {
        self.inner.command(snapshot)
    }

    fn tests_output(&self, output: &ProcessOutput) -> String {
        let mut saw_marker = false;
        for line in output.stdout.lines() {
            let Some(rest) = line.split_once(self.marker.as_str()).map(|(_, rest)| rest) else {
                continue;
            };
            saw_marker = true;
            if let Some((_, message)) = rest.split_once(FAILED_PREFIX) {
                return message.to_string();
            }
        }
        if saw_marker {
            self.sentinel.clone()
        } else {
            output.combined()
        }
    }
}

/// Bounds on a single test process run.
#[derive(Clone, Copy, Debug)]
pub struct RunLimits {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Spawn `cmd` and block until it exits, is timed out, or is cancelled.
///
/// Stdout and stderr are drained on background threads so a chatty process
/// cannot stall on a full pipe. Output is only returned once the process
/// has exited and both streams are closed; a killed process yields an
/// error, never partial output. The timeout covers both phases, so a
/// background process still holding the pipes after the verifier exits
/// runs into it as well.
///
/// On unix the process leads its own process group and the whole group is
/// killed on timeout or cancellation.
pub fn run_process(
    mut cmd: Command,
    limits: &RunLimits,
    cancel: &CancellationToken,
) -> Result<ProcessOutput> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

    let mut child = cmd
        .spawn()
        .map_err(|e| CheckError::Execution(format!("failed to start '{}': {}", program, e)))?;
    tracing::debug!(pid = child.id(), program = %program, "test process started");

    let (tx, rx) = mpsc::channel();
    drain(child.stdout.take(), Stream::Stdout, tx.clone());
    drain(child.stderr.take(), Stream::Stderr, tx);
    let started = Instant::now();

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                check_budget(&mut child, started, limits, cancel)?;
                thread::sleep(limits.poll_interval);
            }
            Err(e) => {
                kill(&mut child);
                return Err(CheckError::Execution(format!("wait failed: {}", e)));
            }
        }
    };

    let (stdout, stderr) = collect(&rx, &mut child, started, limits, cancel)?;
    let output = ProcessOutput {
        stdout,
        stderr,
        exit_code: status.code(),
    };
    check_termination(status, &output)?;
    tracing::debug!(
        exit_code = ?output.exit_code,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "test process finished"
    );
    Ok(output)
}

/// Signal deaths have no exit code; those are crashes, not verdicts.
fn check_termination(status: ExitStatus, output: &ProcessOutput) -> Result<()> {
    if status.code().is_some() {
        return Ok(());
    }
    let stderr = output.stderr.trim();
    Err(CheckError::Execution(if stderr.is_empty() {
        format!("test process terminated abnormally ({})", status)
    } else {
        format!("test process terminated abnormally ({}): {}", status, stderr)
    }))
}

/// Kill the process (and its group) once cancellation or the timeout hits.
fn check_budget(
    child: &mut Child,
    started: Instant,
    limits: &RunLimits,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        kill(child);
        return Err(CheckError::Cancelled);
    }
    if let Some(timeout) = limits.timeout {
        if started.elapsed() >= timeout {
            kill(child);
            return Err(CheckError::Timeout(timeout));
        }
    }
    Ok(())
}

fn kill(child: &mut Child) {
    #[cfg(unix)]
    kill_group(child.id());
    if let Err(e) = child.kill() {
        tracing::warn!(pid = child.id(), error = %e, "failed to kill test process");
    }
    let _ = child.wait();
}

/// The child was spawned as a group leader, so its pid is the group id.
#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid = raw, error = %e, "failed to kill process group"),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(
    stream: Option<R>,
    kind: Stream,
    tx: Sender<(Stream, Vec<u8>)>,
) {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buffer);
        }
        let _ = tx.send((kind, buffer));
    });
}

/// Wait for both reader threads, still bounded by the run limits.
fn collect(
    rx: &Receiver<(Stream, Vec<u8>)>,
    child: &mut Child,
    started: Instant,
    limits: &RunLimits,
    cancel: &CancellationToken,
) -> Result<(String, String)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        check_budget(child, started, limits, cancel)?;
        match rx.recv_timeout(limits.poll_interval) {
            Ok((Stream::Stdout, bytes)) => stdout = Some(bytes),
            Ok((Stream::Stderr, bytes)) => stderr = Some(bytes),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let text =
        |bytes: Option<Vec<u8>>| String::from_utf8_lossy(&bytes.unwrap_or_default()).into_owned();
    Ok((text(stdout), text(stderr)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn test_combined_order() {
        let out = ProcessOutput {
            stdout: "out".into(),
            stderr: "err".into(),
            exit_code: Some(1),
        };
        assert_eq!(out.combined(), "outerr");
    }

    #[test]
    fn test_command_runner_appends_snapshot() {
        let runner = CommandRunner::new("python3").args(["-m", "unittest"]);
        let cmd = runner.command(Path::new("/tmp/task0_window.py"));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-m", "unittest", "/tmp/task0_window.py"]);
    }

    #[test]
    fn test_marked_output_all_ok() {
        let runner = MarkedOutputRunner::new(CommandRunner::new("true"), "#study");
        let out = output("noise\n#study test OK\n#study test OK\n");
        assert_eq!(runner.tests_output(&out), "OK");
    }

    #[test]
    fn test_marked_output_first_failure_wins() {
        let runner = MarkedOutputRunner::new(CommandRunner::new("true"), "#study");
        let out = output("#study test OK\n#study FAILED + expected 4\n#study FAILED + other\n");
        assert_eq!(runner.tests_output(&out), "expected 4");
    }

    #[test]
    fn test_marked_output_without_markers_is_raw() {
        let runner = MarkedOutputRunner::new(CommandRunner::new("true"), "#study");
        let out = ProcessOutput {
            stdout: "Traceback".into(),
            stderr: "boom".into(),
            exit_code: Some(1),
        };
        assert_eq!(runner.tests_output(&out), "Tracebackboom");
    }

    #[test]
    fn test_spawn_failure_is_execution_error() {
        let cmd = Command::new("/nonexistent/definitely-not-a-runner");
        let err = run_process(cmd, &RunLimits::default(), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CheckError::Execution(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_both_streams() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf OK; printf warn >&2; exit 3"]);
        let out = run_process(cmd, &RunLimits::default(), &CancellationToken::new()).unwrap();
        assert_eq!(out.stdout, "OK");
        assert_eq!(out.stderr, "warn");
        assert_eq!(out.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let limits = RunLimits {
            timeout: Some(Duration::from_millis(100)),
            ..RunLimits::default()
        };
        let started = Instant::now();
        let err = run_process(cmd, &limits, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CheckError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_process() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let token = CancellationToken::new();
        token.cancel();
        let err = run_process(cmd, &RunLimits::default(), &token).unwrap_err();
        assert!(matches!(err, CheckError::Cancelled));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_covers_background_holding_pipes() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 3 & printf OK"]);
        let limits = RunLimits {
            timeout: Some(Duration::from_millis(200)),
            ..RunLimits::default()
        };
        let started = Instant::now();
        let err = run_process(cmd, &limits, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CheckError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_background_exit_within_budget_is_collected() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "(sleep 0.1; printf late) & printf OK"]);
        let limits = RunLimits {
            timeout: Some(Duration::from_secs(5)),
            ..RunLimits::default()
        };
        let out = run_process(cmd, &limits, &CancellationToken::new()).unwrap();
        assert_eq!(out.stdout, "OKlate");
    }

    #[cfg(unix)]
    #[test]
    fn test_signal_death_is_execution_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "kill -9 $$"]);
        let err = run_process(cmd, &RunLimits::default(), &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, CheckError::Execution(_)));
    }
}
