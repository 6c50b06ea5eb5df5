use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Shell-assigned process id. Distinct from the OS pid.
pub type Pid = i32;

pub const MIN_PRIORITY: i32 = -20;
pub const MAX_PRIORITY: i32 = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Failed,
    Terminated,
    Suspended,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessState::Completed | ProcessState::Failed | ProcessState::Terminated
        )
    }

    pub fn is_active(self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::Suspended)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::NotStarted => "NotStarted",
            ProcessState::Running => "Running",
            ProcessState::Completed => "Completed",
            ProcessState::Failed => "Failed",
            ProcessState::Terminated => "Terminated",
            ProcessState::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one process (or built-in) as seen by the shell.
///
/// `end_time` is only set once `state` is terminal, and `exit_code` only
/// means something for `Completed` and `Failed`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub parent_pid: Pid,
    pub os_pid: Option<u32>,
    pub state: ProcessState,
    pub exit_code: i32,
    pub start_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub command: String,
    pub arguments: Vec<String>,
    pub working_dir: PathBuf,
    /// Captured output of a synchronous run or a built-in.
    pub output: String,
}

impl ProcessInfo {
    pub fn new(pid: Pid, command: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            pid,
            parent_pid: std::process::id() as Pid,
            command: command.into(),
            arguments,
            start_time: Some(SystemTime::now()),
            ..Self::default()
        }
    }

    /// A synthetic record for a command that never ran.
    pub fn failed(pid: Pid, command: impl Into<String>, exit_code: i32) -> Self {
        let mut info = Self::new(pid, command, Vec::new());
        info.finish(ProcessState::Failed, exit_code);
        info
    }

    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    pub(crate) fn finish(&mut self, state: ProcessState, exit_code: i32) {
        self.state = state;
        self.exit_code = exit_code;
        if state.is_terminal() {
            self.end_time = Some(SystemTime::now());
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Wall time so far, or total wall time once finished.
    pub fn duration_ms(&self) -> Option<u64> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(SystemTime::now);
        let elapsed = end.duration_since(start).unwrap_or(Duration::ZERO);
        Some(elapsed.as_millis() as u64)
    }

    /// `command arg1 arg2`, as shown by `jobs`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a command should be run. Passed by reference and never mutated by the
/// shell.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOptions {
    /// Overrides the shell's current directory for this run.
    pub working_directory: Option<PathBuf>,
    /// Replaces the shell environment for this run when set.
    pub environment: Option<BTreeMap<String, String>>,
    /// When false the child inherits the host's stdio.
    pub capture_output: bool,
    pub merge_stderr: bool,
    /// 0 means unbounded.
    pub timeout_ms: u64,
    pub run_in_background: bool,
    pub priority: i32,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            working_directory: None,
            environment: None,
            capture_output: true,
            merge_stderr: false,
            timeout_ms: 0,
            run_in_background: false,
            priority: 0,
        }
    }
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_environment(mut self, environment: BTreeMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn with_merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.run_in_background = background;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority.clamp(MIN_PRIORITY, MAX_PRIORITY);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification() {
        assert!(ProcessState::Completed.is_terminal());
        assert!(ProcessState::Terminated.is_terminal());
        assert!(!ProcessState::Suspended.is_terminal());
        assert!(ProcessState::Suspended.is_active());
        assert!(!ProcessState::NotStarted.is_active());
    }

    #[test]
    fn test_end_time_only_when_terminal() {
        let mut info = ProcessInfo::new(1000, "sleep", vec!["1".into()]);
        info.finish(ProcessState::Running, 0);
        assert!(info.end_time.is_none());

        info.finish(ProcessState::Completed, 0);
        assert!(info.end_time.is_some());
        assert!(info.duration_ms().is_some());
    }

    #[test]
    fn test_command_line() {
        let info = ProcessInfo::new(1, "ls", vec!["-l".into(), "/tmp".into()]);
        assert_eq!(info.command_line(), "ls -l /tmp");
    }

    #[test]
    fn test_priority_is_clamped() {
        assert_eq!(ExecutionOptions::new().with_priority(-99).priority, -20);
        assert_eq!(ExecutionOptions::new().with_priority(50).priority, 19);
        assert_eq!(ExecutionOptions::new().with_priority(5).priority, 5);
    }

    #[test]
    fn test_default_options_capture() {
        let options = ExecutionOptions::default();
        assert!(options.capture_output);
        assert!(options.timeout().is_none());
        assert_eq!(
            options.with_timeout(250).timeout(),
            Some(Duration::from_millis(250))
        );
    }
}
