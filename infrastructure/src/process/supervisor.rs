//! Agent Process Supervisor
//!
//! Runs one attempt of an agent task as a subprocess:
//!
//! ```text
//! spawn (own process group, PDEATHSIG, kill_on_drop)
//!   ├─ stdin  ← task input (optional)
//!   ├─ stdout → chunk observer + capped capture
//!   └─ stderr → capped capture (classification + diagnostics)
//! deadline / cancel → SIGTERM group → grace → SIGKILL group → reap
//! agent exit → drain stdout briefly → SIGKILL leftover group members
//! ```
//!
//! The supervisor keeps no state between calls.

use super::classify::{classify_exit, classify_spawn_error};
use async_trait::async_trait;
use quorum_gate_application::ports::agent_runner::{AgentRunner, OutputObserver};
use quorum_gate_domain::{AgentId, AgentOutcome, AgentTask, ErrorKind};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default grace window between SIGTERM and SIGKILL
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default cap on captured stdout/stderr (4 MiB each)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// Longest diagnostic kept on a failed outcome
const DIAGNOSTIC_CHARS: usize = 2_000;

const READ_CHUNK: usize = 8 * 1024;

/// How long to keep reading stdout after the agent itself has exited
const STDOUT_DRAIN: Duration = Duration::from_millis(500);

/// Supervisor tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub grace_period: Duration,
    pub max_output_bytes: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Runs agent tasks as supervised subprocesses
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}

/// How the wait loop ended
#[derive(Debug, Clone, Copy)]
enum Exit {
    /// `None` when waiting on the child failed
    Exited(Option<ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl AgentRunner for ProcessSupervisor {
    async fn run(
        &self,
        task: &AgentTask,
        cancel: &CancellationToken,
        observer: &dyn OutputObserver,
    ) -> AgentOutcome {
        let started = Instant::now();
        let agent_id = task.agent_id.clone();

        if let Some(name) = missing_required_env(task) {
            warn!("Agent {} not launched: {} is not set", agent_id, name);
            return AgentOutcome::failure(agent_id, ErrorKind::Authentication, started.elapsed())
                .with_diagnostic(format!("required environment variable {} is not set", name));
        }

        if cancel.is_cancelled() {
            return AgentOutcome::failure(agent_id, ErrorKind::Cancelled, started.elapsed());
        }

        let mut child = match build_command(task).spawn() {
            Ok(child) => child,
            Err(e) => {
                let kind = classify_spawn_error(&e);
                warn!("Failed to spawn agent {} ({}): {}", agent_id, task.command, e);
                return AgentOutcome::failure(agent_id, kind, started.elapsed())
                    .with_diagnostic(format!("failed to spawn {}: {}", task.command, e));
            }
        };
        debug!(
            "Spawned agent {} (pid {:?}): {} {:?}",
            agent_id,
            child.id(),
            task.command,
            task.args
        );

        if let (Some(mut stdin), Some(input)) = (child.stdin.take(), task.input.clone()) {
            let agent = agent_id.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!("Agent {} closed stdin early: {}", agent, e);
                }
                // Dropping stdin sends EOF
            });
        }

        // Armed from here on: dropping `run()` kills the whole group
        let mut group = ProcessGroup::of(&child);

        let max_bytes = self.config.max_output_bytes;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_capped(stderr, max_bytes)));
        let Some(mut stdout) = child.stdout.take() else {
            terminate(&mut child, &group, self.config.grace_period).await;
            group.kill();
            return AgentOutcome::failure(agent_id, ErrorKind::Unknown, started.elapsed())
                .with_diagnostic("stdout was not captured");
        };

        let deadline = tokio::time::Instant::now() + task.timeout;
        let mut capture = OutputCapture::new(max_bytes);
        let mut buf = vec![0u8; READ_CHUNK];
        let mut stdout_open = true;

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Exit::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break Exit::TimedOut,
                read = stdout.read(&mut buf), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => forward(&agent_id, &buf[..n], observer, &mut capture),
                    Err(e) => {
                        debug!("Agent {} stdout read failed: {}", agent_id, e);
                        stdout_open = false;
                    }
                },
                status = child.wait() => {
                    if let Err(e) = &status {
                        warn!("Failed to wait for agent {}: {}", agent_id, e);
                    }
                    break Exit::Exited(status.ok());
                }
            }
        };

        match exit {
            Exit::TimedOut | Exit::Cancelled => {
                let reaped = terminate(&mut child, &group, self.config.grace_period).await;
                debug!("Agent {} terminated: {:?}", agent_id, reaped);
            }
            // A background helper may still hold stdout after the agent exits
            Exit::Exited(_) if stdout_open => {
                let drained = tokio::time::timeout(STDOUT_DRAIN, async {
                    loop {
                        match stdout.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => forward(&agent_id, &buf[..n], observer, &mut capture),
                        }
                    }
                })
                .await;
                if drained.is_err() {
                    debug!("Agent {} exited but left stdout open", agent_id);
                }
            }
            Exit::Exited(_) => {}
        }

        // Leftover group members would keep the stderr pipe open
        group.kill();

        let stderr = match stderr_task {
            Some(handle) => {
                match tokio::time::timeout(self.config.grace_period, handle).await {
                    Ok(Ok(captured)) => captured.into_string(),
                    _ => String::new(),
                }
            }
            None => String::new(),
        };
        let stdout = capture.into_string();
        let elapsed = started.elapsed();

        match exit {
            Exit::TimedOut => {
                warn!("Agent {} timed out after {:?}", agent_id, task.timeout);
                AgentOutcome::failure(agent_id, ErrorKind::Timeout, elapsed)
                    .with_diagnostic(tail(if stdout.is_empty() {
                        stderr.as_str()
                    } else {
                        stdout.as_str()
                    }))
            }
            Exit::Cancelled => {
                info!("Agent {} cancelled", agent_id);
                AgentOutcome::failure(agent_id, ErrorKind::Cancelled, elapsed)
                    .with_diagnostic(tail(&stdout))
            }
            Exit::Exited(Some(status)) => settle(agent_id, status, stdout, &stderr, elapsed),
            Exit::Exited(None) => {
                AgentOutcome::failure(agent_id, ErrorKind::Unknown, elapsed)
                    .with_diagnostic(tail(&stderr))
            }
        }
    }
}

/// Map a normal process exit to an outcome.
fn settle(
    agent_id: AgentId,
    status: ExitStatus,
    stdout: String,
    stderr: &str,
    elapsed: Duration,
) -> AgentOutcome {
    let exit_code = status.code();

    if status.success() {
        if stdout.trim().is_empty() {
            warn!("Agent {} exited cleanly with no output", agent_id);
            return AgentOutcome::failure(agent_id, ErrorKind::EmptyOutput, elapsed)
                .with_exit_code(exit_code)
                .with_diagnostic(tail(stderr));
        }
        debug!("Agent {} succeeded in {:?}", agent_id, elapsed);
        return AgentOutcome::success(agent_id, stdout, elapsed);
    }

    let kind = classify_exit(stderr, &stdout, exit_code);
    warn!(
        "Agent {} exited with {:?}, classified as {}",
        agent_id, exit_code, kind
    );
    AgentOutcome::failure(agent_id, kind, elapsed)
        .with_exit_code(exit_code)
        .with_diagnostic(tail(if stderr.trim().is_empty() {
            stdout.as_str()
        } else {
            stderr
        }))
}

fn build_command(task: &AgentTask) -> Command {
    let mut cmd = Command::new(&task.command);
    cmd.args(&task.args)
        .envs(&task.env)
        .stdin(if task.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group so termination reaches grandchildren too
    #[cfg(unix)]
    cmd.process_group(0);

    // Linux: request kernel to send SIGTERM to child when parent dies.
    // This catches cases where Drop doesn't run (SIGKILL, OOM kill).
    #[cfg(target_os = "linux")]
    unsafe {
        cmd.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }

    cmd
}

/// First required variable that is unset or empty in both the task env and
/// the inherited environment.
fn missing_required_env(task: &AgentTask) -> Option<&str> {
    task.required_env
        .iter()
        .find(|name| {
            let in_task = task.env.get(*name).is_some_and(|v| !v.trim().is_empty());
            let inherited = std::env::var(name).is_ok_and(|v| !v.trim().is_empty());
            !in_task && !inherited
        })
        .map(String::as_str)
}

/// SIGTERM the process group, wait out the grace window, then SIGKILL.
///
/// Always reaps the child.
async fn terminate(
    child: &mut Child,
    group: &ProcessGroup,
    grace: Duration,
) -> Option<ExitStatus> {
    group.signal(Signal::Terminate);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        _ => {
            group.signal(Signal::Kill);
            if let Err(e) = child.start_kill() {
                debug!("start_kill failed: {}", e);
            }
            child.wait().await.ok()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Process group of one spawned agent.
///
/// `kill_on_drop` only reaches the direct child and `PR_SET_PDEATHSIG` is not
/// inherited across fork, so the group itself is SIGKILLed when this guard is
/// dropped. That covers a caller dropping `run()` mid-flight.
struct ProcessGroup {
    /// `None` once the group has been killed, or when no pid was available
    pgid: Option<i32>,
}

impl ProcessGroup {
    /// `process_group(0)` makes the child the leader, so its pid is the pgid.
    fn of(child: &Child) -> Self {
        Self {
            pgid: child.id().and_then(|pid| i32::try_from(pid).ok()),
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: Signal) {
        let Some(pgid) = self.pgid else {
            return;
        };
        let signo = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        // SAFETY: a negative pid addresses the process group created at spawn.
        unsafe {
            libc::kill(-pgid, signo);
        }
    }

    #[cfg(not(unix))]
    fn signal(&self, _signal: Signal) {}

    /// SIGKILL whatever is left of the group and disarm the guard.
    fn kill(&mut self) {
        self.signal(Signal::Kill);
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            debug!("Killing process group {:?} of a dropped agent run", self.pgid);
            self.kill();
        }
    }
}

fn forward(
    agent_id: &AgentId,
    chunk: &[u8],
    observer: &dyn OutputObserver,
    capture: &mut OutputCapture,
) {
    observer.on_chunk(agent_id, &String::from_utf8_lossy(chunk));
    capture.push(chunk);
}

/// Byte capture with a hard cap and a truncation marker.
struct OutputCapture {
    bytes: Vec<u8>,
    limit: usize,
    dropped: usize,
}

impl OutputCapture {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let take = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..take]);
        self.dropped += chunk.len() - take;
    }

    fn into_string(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!(
                "\n... (output truncated: {} bytes dropped)",
                self.dropped
            ));
        }
        text
    }
}

async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> OutputCapture {
    let mut capture = OutputCapture::new(limit);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => capture.push(&buf[..n]),
        }
    }
    capture
}

/// Last `DIAGNOSTIC_CHARS` characters of `text`, trimmed.
fn tail(text: &str) -> String {
    let text = text.trim();
    let count = text.chars().count();
    if count <= DIAGNOSTIC_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - DIAGNOSTIC_CHARS).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use quorum_gate_application::ports::agent_runner::NoOutputObserver;
    use quorum_gate_domain::{AgentId, AgentSpec, AgentStatus};
    use std::sync::Mutex;

    fn sh(agent: &str, script: &str) -> AgentSpec {
        AgentSpec::new(agent, "sh")
            .with_args(["-c", script])
            .with_timeout(Duration::from_secs(10))
    }

    fn task(spec: &AgentSpec) -> AgentTask {
        AgentTask::from_spec(spec, "SPEC-1", "plan", None)
    }

    fn quick_supervisor() -> ProcessSupervisor {
        ProcessSupervisor::new(SupervisorConfig {
            grace_period: Duration::from_millis(300),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        })
    }

    async fn run(supervisor: &ProcessSupervisor, task: &AgentTask) -> AgentOutcome {
        supervisor
            .run(task, &CancellationToken::new(), &NoOutputObserver)
            .await
    }

    #[derive(Default)]
    struct Collect(Mutex<String>);

    impl OutputObserver for Collect {
        fn on_chunk(&self, _agent_id: &AgentId, chunk: &str) {
            self.0.lock().unwrap().push_str(chunk);
        }
    }

    /// Wait for a shell to write a pid into `path`.
    async fn read_pid(path: &std::path::Path) -> i32 {
        for _ in 0..40 {
            if let Ok(text) = std::fs::read_to_string(path)
                && let Ok(pid) = text.trim().parse()
            {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("no pid written to {}", path.display());
    }

    fn process_alive(pid: i32) -> bool {
        // SAFETY: signal 0 only checks that the pid exists
        if unsafe { libc::kill(pid, 0) } != 0 {
            return false;
        }
        // Zombies answer signal 0 until their new parent reaps them
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    /// True once `pid` is gone, polling for up to three seconds.
    async fn exits_soon(pid: i32) -> bool {
        for _ in 0..60 {
            if !process_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_success_captures_stdout() {
        let outcome = run(&quick_supervisor(), &task(&sh("a", "echo approved"))).await;
        assert_eq!(outcome.status, AgentStatus::Success);
        assert_eq!(outcome.output_text.as_deref(), Some("approved\n"));
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.attempt_count, 1);
    }

    #[tokio::test]
    async fn test_blank_output_is_empty_output() {
        let outcome = run(&quick_supervisor(), &task(&sh("a", "echo '   '"))).await;
        assert_eq!(outcome.status, AgentStatus::PermanentFailure);
        assert_eq!(outcome.error_kind, Some(ErrorKind::EmptyOutput));
    }

    #[tokio::test]
    async fn test_rate_limit_exit_is_retryable() {
        let spec = sh("a", "echo 'Error: 429 Too Many Requests' >&2; exit 1");
        let outcome = run(&quick_supervisor(), &task(&spec)).await;
        assert_eq!(outcome.status, AgentStatus::RetryableFailure);
        assert_eq!(outcome.error_kind, Some(ErrorKind::RateLimited));
        assert_eq!(outcome.exit_code, Some(1));
        assert!(outcome.diagnostic.unwrap().contains("429"));
    }

    #[tokio::test]
    async fn test_auth_exit_is_permanent() {
        let spec = sh("a", "echo '401 Unauthorized' >&2; exit 2");
        let outcome = run(&quick_supervisor(), &task(&spec)).await;
        assert_eq!(outcome.status, AgentStatus::PermanentFailure);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Authentication));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output_visible() {
        let spec = sh("a", "echo partial; sleep 30").with_timeout(Duration::from_millis(300));
        let observer = Collect::default();
        let started = Instant::now();

        let outcome = quick_supervisor()
            .run(&task(&spec), &CancellationToken::new(), &observer)
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.status, AgentStatus::TimedOut);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(outcome.output_text, None);
        assert!(observer.0.lock().unwrap().contains("partial"));
        assert!(outcome.diagnostic.unwrap().contains("partial"));
    }

    #[tokio::test]
    async fn test_sigterm_ignoring_agent_is_killed_after_grace() {
        let spec = sh("a", "trap '' TERM; sleep 30 & wait").with_timeout(Duration::from_millis(200));
        let started = Instant::now();

        let outcome = run(&quick_supervisor(), &task(&spec)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.status, AgentStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_exit_with_lingering_child_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("helper.pid");
        let script = format!(
            "echo approved; sleep 30 & echo $! > '{}'; exit 0",
            pidfile.display()
        );
        let spec = sh("a", &script).with_timeout(Duration::from_secs(3));
        let started = Instant::now();

        let outcome = run(&quick_supervisor(), &task(&spec)).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(outcome.status, AgentStatus::Success);
        assert_eq!(outcome.output_text.as_deref(), Some("approved\n"));
        assert_eq!(outcome.exit_code, Some(0));

        let helper = read_pid(&pidfile).await;
        assert!(exits_soon(helper).await, "helper {helper} outlived its agent");
    }

    #[tokio::test]
    async fn test_dropped_run_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("helper.pid");
        let script = format!("sleep 60 & echo $! > '{}'; wait", pidfile.display());
        let spec = sh("a", &script);
        let supervisor = quick_supervisor();
        let task = task(&spec);

        let dropped =
            tokio::time::timeout(Duration::from_millis(300), run(&supervisor, &task)).await;
        assert!(dropped.is_err());

        let helper = read_pid(&pidfile).await;
        assert!(exits_soon(helper).await, "helper {helper} survived the dropped run");
    }

    #[tokio::test]
    async fn test_cancellation() {
        let spec = sh("a", "sleep 30");
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                token.cancel();
            })
        };
        let started = Instant::now();

        let outcome = quick_supervisor()
            .run(&task(&spec), &token, &NoOutputObserver)
            .await;
        canceller.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.status, AgentStatus::PermanentFailure);
        assert_eq!(outcome.error_kind, Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_required_env_refuses_launch() {
        // A missing binary would yield NotFound if it were spawned
        let spec = AgentSpec::new("a", "/nonexistent/quorum-gate-agent")
            .with_required_env("QUORUM_GATE_TEST_SURELY_UNSET_KEY");
        let outcome = run(&quick_supervisor(), &task(&spec)).await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Authentication));
        assert_eq!(outcome.status, AgentStatus::PermanentFailure);
    }

    #[tokio::test]
    async fn test_required_env_satisfied_by_task_env() {
        let spec = sh("a", "echo \"$QUORUM_GATE_TEST_KEY\"")
            .with_env("QUORUM_GATE_TEST_KEY", "sk-test")
            .with_required_env("QUORUM_GATE_TEST_KEY");
        let outcome = run(&quick_supervisor(), &task(&spec)).await;
        assert_eq!(outcome.output_text.as_deref(), Some("sk-test\n"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let spec = AgentSpec::new("a", "/nonexistent/quorum-gate-agent");
        let outcome = run(&quick_supervisor(), &task(&spec)).await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(outcome.status, AgentStatus::PermanentFailure);
    }

    #[tokio::test]
    async fn test_input_is_piped_to_stdin() {
        let spec = AgentSpec::new("a", "cat");
        let task = AgentTask::from_spec(&spec, "SPEC-1", "plan", Some("review me".into()));
        let outcome = run(&quick_supervisor(), &task).await;
        assert_eq!(outcome.output_text.as_deref(), Some("review me"));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let supervisor = ProcessSupervisor::new(SupervisorConfig {
            grace_period: Duration::from_millis(300),
            max_output_bytes: 1_000,
        });
        let spec = sh("a", "head -c 10000 /dev/zero | tr '\\0' a");
        let outcome = run(&supervisor, &task(&spec)).await;

        let text = outcome.output_text.unwrap();
        assert!(text.starts_with(&"a".repeat(1_000)));
        assert!(text.contains("output truncated: 9000 bytes dropped"));
    }

    #[test]
    fn test_capture_and_tail() {
        let mut capture = OutputCapture::new(4);
        capture.push(b"ab");
        capture.push(b"cdef");
        assert_eq!(capture.into_string(), "abcd\n... (output truncated: 2 bytes dropped)");

        let long = "x".repeat(DIAGNOSTIC_CHARS + 10);
        assert_eq!(tail(&long).len(), DIAGNOSTIC_CHARS);
        assert_eq!(tail("  short \n"), "short");
    }
}
