use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::process::ExitStatusExt;
use std::process::{ChildStderr, ChildStdin, ChildStdout, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::handle::ProcessHandle;
use super::io::ProcessIO;
use super::signal::{self, Signal};
use super::spawn::{SpawnProvider, SpawnRequest};
use super::types::{Pid, ProcessInfo, ProcessState};
use super::ProcessError;
use crate::memory::{MemoryManager, LARGE_CLASS};

/// Called with each chunk read from the child and whether it came from stderr.
pub type OutputCallback = Arc<dyn Fn(&[u8], bool) + Send + Sync>;
/// Called once when the process reaches a terminal state.
pub type CompletionCallback = Arc<dyn Fn(&ProcessInfo) + Send + Sync>;

const READ_CHUNK: usize = LARGE_CLASS;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared between a [`ManagedProcess`] and its monitor thread.
struct Shared {
    info: RwLock<ProcessInfo>,
    io: ProcessIO,
    handle: Mutex<Option<ProcessHandle>>,
    stdin: Mutex<Option<ChildStdin>>,
    running: AtomicBool,
    monitor_active: AtomicBool,
    done: Mutex<bool>,
    done_signal: Condvar,
    output_callback: RwLock<Option<OutputCallback>>,
    completion_callback: RwLock<Option<CompletionCallback>>,
}

impl Shared {
    fn state(&self) -> ProcessState {
        self.info.read().state
    }

    /// Moves to a terminal state once. Later calls lose and return false.
    fn finish(&self, state: ProcessState, exit_code: i32) -> bool {
        let snapshot = {
            let mut info = self.info.write();
            if info.state.is_terminal() {
                return false;
            }
            info.finish(state, exit_code);
            info.clone()
        };

        self.running.store(false, Ordering::Release);
        // A writer blocked on a full pipe keeps the lock; it sees EPIPE later.
        if let Some(mut stdin) = self.stdin.try_lock() {
            *stdin = None;
        }
        {
            let mut done = self.done.lock();
            *done = true;
            self.done_signal.notify_all();
        }

        info!(
            pid = snapshot.pid,
            state = %snapshot.state,
            exit_code = snapshot.exit_code,
            "process finished"
        );

        let callback = self.completion_callback.read().clone();
        if let Some(callback) = callback {
            callback(&snapshot);
        }
        true
    }

    fn deliver(&self, bytes: &[u8], from_stderr: bool, merge_stderr: bool) {
        let is_error = from_stderr && !merge_stderr;
        if is_error {
            self.io.append_stderr(bytes);
        } else {
            self.io.append_stdout(bytes);
        }

        let callback = self.output_callback.read().clone();
        if let Some(callback) = callback {
            callback(bytes, is_error);
        }
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        let pid = self.info.read().pid;
        match self.handle.lock().as_ref() {
            Some(handle) => handle.signal(signal),
            None => Err(ProcessError::NotRunning(pid)),
        }
    }

    fn try_reap(&self) -> Reap {
        let mut guard = self.handle.lock();
        let Some(handle) = guard.as_mut() else {
            return Reap::Lost;
        };
        match handle.try_wait() {
            Ok(Some(status)) => Reap::Exited(status),
            Ok(None) => Reap::Running,
            Err(e) => {
                warn!(error = %e, "reap failed");
                Reap::Lost
            }
        }
    }

    /// Blocking reap, used after SIGKILL.
    fn reap(&self) {
        if let Some(handle) = self.handle.lock().as_mut() {
            if let Err(e) = handle.wait() {
                debug!(error = %e, "wait after kill failed");
            }
        }
    }
}

enum Reap {
    Exited(ExitStatus),
    Running,
    Lost,
}

fn classify(status: ExitStatus) -> (ProcessState, i32) {
    match (status.code(), status.signal()) {
        (Some(0), _) => (ProcessState::Completed, 0),
        (Some(code), _) => (ProcessState::Failed, code),
        (None, Some(raw)) => {
            debug!(signal = signal::describe(raw), "child killed by signal");
            (ProcessState::Terminated, 128 + raw)
        }
        _ => (ProcessState::Failed, -1),
    }
}

enum Pipe {
    Stdout(ChildStdout),
    Stderr(ChildStderr),
}

impl Pipe {
    fn fd(&self) -> libc::c_int {
        match self {
            Pipe::Stdout(p) => p.as_raw_fd(),
            Pipe::Stderr(p) => p.as_raw_fd(),
        }
    }

    fn is_stderr(&self) -> bool {
        matches!(self, Pipe::Stderr(_))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Pipe::Stdout(p) => p.read(buf),
            Pipe::Stderr(p) => p.read(buf),
        }
    }
}

/// The per-process I/O thread: polls the pipes, reaps the child, enforces
/// the timeout.
struct Monitor {
    shared: Arc<Shared>,
    memory: Arc<MemoryManager>,
    pipes: Vec<Pipe>,
    poll_interval: Duration,
    deadline: Option<Instant>,
    merge_stderr: bool,
}

impl Monitor {
    fn run(mut self) {
        let mut heap_fallback = Vec::new();
        let mut leased = self.memory.lease(READ_CHUNK);
        let buffer: &mut [u8] = match leased.as_mut() {
            Some(block) => &mut block[..],
            None => {
                heap_fallback.resize(READ_CHUNK, 0);
                &mut heap_fallback[..]
            }
        };

        while self.shared.monitor_active.load(Ordering::Acquire) {
            self.pump(buffer, self.poll_interval);

            if matches!(self.check_exit(), Reap::Exited(_) | Reap::Lost) {
                break;
            }

            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                self.expire();
                break;
            }
        }

        self.shared.monitor_active.store(false, Ordering::Release);
    }

    /// Waits up to `timeout` for output and consumes whatever is ready.
    /// Returns whether any bytes were read.
    fn pump(&mut self, buffer: &mut [u8], timeout: Duration) -> bool {
        if self.pipes.is_empty() {
            if !timeout.is_zero() {
                thread::sleep(timeout);
            }
            return false;
        }

        let mut fds: Vec<libc::pollfd> = self
            .pipes
            .iter()
            .map(|p| libc::pollfd {
                fd: p.fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `fds` is a live, correctly sized pollfd array.
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ready <= 0 {
            // Timeout or EINTR: nothing to read this round.
            return false;
        }

        let mut read_any = false;
        let mut closed = vec![false; self.pipes.len()];
        let readable = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

        for (i, pollfd) in fds.iter().enumerate() {
            if pollfd.revents & readable == 0 {
                continue;
            }

            let pipe = &mut self.pipes[i];
            match pipe.read(buffer) {
                Ok(0) => closed[i] = true,
                Ok(n) => {
                    debug!(bytes = n, stderr = pipe.is_stderr(), "read chunk");
                    self.shared
                        .deliver(&buffer[..n], pipe.is_stderr(), self.merge_stderr);
                    read_any = true;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) => {}
                Err(e) => {
                    debug!(error = %e, "closing stream after read error");
                    closed[i] = true;
                }
            }
        }

        let mut index = 0;
        self.pipes.retain(|_| {
            let keep = !closed[index];
            index += 1;
            keep
        });

        read_any
    }

    fn check_exit(&mut self) -> Reap {
        match self.shared.try_reap() {
            Reap::Exited(status) => {
                self.drain_remaining();
                let (state, exit_code) = classify(status);
                self.shared.finish(state, exit_code);
                Reap::Exited(status)
            }
            Reap::Lost => {
                self.drain_remaining();
                self.shared.finish(ProcessState::Failed, -1);
                Reap::Lost
            }
            Reap::Running => Reap::Running,
        }
    }

    /// Picks up output still sitting in the pipes after the child exited.
    /// Does not block: a grandchild may still hold the write end open.
    fn drain_remaining(&mut self) {
        let mut buffer = [0u8; 1024];
        while self.pump(&mut buffer, Duration::ZERO) {}
    }

    fn expire(&mut self) {
        let pid = self.shared.info.read().pid;
        warn!(pid, "timeout exceeded, killing process");

        if let Err(e) = self.shared.signal(Signal::Kill) {
            warn!(pid, error = %e, "kill on timeout failed");
        }
        self.shared.reap();
        self.drain_remaining();
        self.shared.finish(ProcessState::Terminated, -1);
    }
}

/// A child process plus the thread that watches it.
///
/// Created `NotStarted`; [`start`](Self::start) spawns the OS process and the
/// monitor. The monitor observes the natural exit; [`terminate`](Self::terminate)
/// ends it early. Either way the completion callback fires exactly once.
pub struct ManagedProcess {
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
    memory: Arc<MemoryManager>,
    poll_interval: Duration,
}

impl ManagedProcess {
    pub fn new(
        pid: Pid,
        command: impl Into<String>,
        arguments: Vec<String>,
        memory: Arc<MemoryManager>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                info: RwLock::new(ProcessInfo::new(pid, command, arguments)),
                io: ProcessIO::new(),
                handle: Mutex::new(None),
                stdin: Mutex::new(None),
                running: AtomicBool::new(false),
                monitor_active: AtomicBool::new(false),
                done: Mutex::new(false),
                done_signal: Condvar::new(),
                output_callback: RwLock::new(None),
                completion_callback: RwLock::new(None),
            }),
            monitor: Mutex::new(None),
            started: AtomicBool::new(false),
            memory,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Wraps a record that already reached a terminal state without an OS
    /// process, such as a built-in run. Its `output` is readable as stdout.
    pub fn finished(info: ProcessInfo, memory: Arc<MemoryManager>) -> Self {
        let process = Self::new(info.pid, info.command.clone(), info.arguments.clone(), memory);
        process.shared.io.append_stdout(info.output.as_bytes());
        *process.shared.info.write() = info;
        *process.shared.done.lock() = true;
        process.started.store(true, Ordering::Release);
        process
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn pid(&self) -> Pid {
        self.shared.info.read().pid
    }

    pub fn start(&self, spawner: &dyn SpawnProvider, request: &SpawnRequest<'_>) -> bool {
        match self.try_start(spawner, request) {
            Ok(()) => true,
            Err(e) => {
                warn!(pid = self.pid(), error = %e, "start failed");
                false
            }
        }
    }

    pub fn try_start(
        &self,
        spawner: &dyn SpawnProvider,
        request: &SpawnRequest<'_>,
    ) -> Result<(), ProcessError> {
        let pid = self.pid();
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ProcessError::AlreadyStarted(pid));
        }

        let mut handle = match spawner.spawn(request) {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.finish(ProcessState::Failed, -1);
                return Err(e);
            }
        };

        let os_pid = handle.os_pid();
        let mut pipes = Vec::with_capacity(2);
        if let Some(stdout) = handle.take_stdout() {
            pipes.push(Pipe::Stdout(stdout));
        }
        if let Some(stderr) = handle.take_stderr() {
            pipes.push(Pipe::Stderr(stderr));
        }
        *self.shared.stdin.lock() = handle.take_stdin();
        *self.shared.handle.lock() = Some(handle);

        {
            let mut info = self.shared.info.write();
            info.state = ProcessState::Running;
            info.os_pid = Some(os_pid);
            info.working_dir = request.working_dir.to_path_buf();
            info.start_time = Some(SystemTime::now());
        }
        self.shared.running.store(true, Ordering::Release);
        self.shared.monitor_active.store(true, Ordering::Release);

        let monitor = Monitor {
            shared: Arc::clone(&self.shared),
            memory: Arc::clone(&self.memory),
            pipes,
            poll_interval: self.poll_interval,
            deadline: request.options.timeout().map(|t| Instant::now() + t),
            merge_stderr: request.options.merge_stderr,
        };

        let spawned = thread::Builder::new()
            .name(format!("monitor-{pid}"))
            .spawn(move || monitor.run());

        match spawned {
            Ok(join) => {
                *self.monitor.lock() = Some(join);
                info!(pid, os_pid, command = %request.command.executable, "process started");
                Ok(())
            }
            Err(e) => {
                self.shared.monitor_active.store(false, Ordering::Release);
                let _ = self.shared.signal(Signal::Kill);
                self.shared.reap();
                self.shared.finish(ProcessState::Failed, -1);
                Err(ProcessError::Io(e))
            }
        }
    }

    /// Ends the process with SIGKILL (`force`) or SIGTERM.
    ///
    /// Returns true if the process is now in a terminal state. A process that
    /// already finished counts as success; a failed signal leaves the state
    /// untouched and returns false.
    pub fn terminate(&self, force: bool) -> bool {
        let state = self.shared.state();
        if state.is_terminal() {
            return true;
        }
        if state == ProcessState::NotStarted {
            self.started.store(true, Ordering::Release);
            return self.shared.finish(ProcessState::Terminated, -1) || self.is_complete();
        }

        let pid = self.pid();
        if let Err(e) = self.shared.signal(Signal::termination(force)) {
            // The child may have exited on its own just now.
            if self.is_complete() {
                return true;
            }
            warn!(pid, error = %e, "terminate failed");
            return false;
        }
        if state == ProcessState::Suspended {
            let _ = self.shared.signal(Signal::Continue);
        }

        self.shared.finish(ProcessState::Terminated, -1);
        self.stop_monitor();

        if force {
            self.shared.reap();
        } else {
            let _ = self.shared.try_reap();
        }

        info!(pid, force, "process terminated");
        true
    }

    fn stop_monitor(&self) {
        self.shared.monitor_active.store(false, Ordering::Release);
        let join = self.monitor.lock().take();
        if let Some(join) = join {
            // A completion callback running on the monitor may land here.
            if join.thread().id() == thread::current().id() {
                return;
            }
            if join.join().is_err() {
                warn!(pid = self.pid(), "monitor thread panicked");
            }
        }
    }

    pub fn suspend(&self) -> bool {
        if self.shared.state() != ProcessState::Running {
            return false;
        }
        match self.shared.signal(Signal::Stop) {
            Ok(()) => {
                let mut info = self.shared.info.write();
                if info.state == ProcessState::Running {
                    info.state = ProcessState::Suspended;
                }
                true
            }
            Err(e) => {
                warn!(pid = self.pid(), error = %e, "suspend failed");
                false
            }
        }
    }

    pub fn resume(&self) -> bool {
        if self.shared.state() != ProcessState::Suspended {
            return false;
        }
        match self.shared.signal(Signal::Continue) {
            Ok(()) => {
                let mut info = self.shared.info.write();
                if info.state == ProcessState::Suspended {
                    info.state = ProcessState::Running;
                }
                true
            }
            Err(e) => {
                warn!(pid = self.pid(), error = %e, "resume failed");
                false
            }
        }
    }

    pub fn send_input(&self, text: &str) -> bool {
        match self.try_send_input(text) {
            Ok(()) => true,
            Err(e) => {
                debug!(pid = self.pid(), error = %e, "send input failed");
                false
            }
        }
    }

    pub fn try_send_input(&self, text: &str) -> Result<(), ProcessError> {
        let pid = self.pid();
        if !self.shared.state().is_active() {
            return Err(ProcessError::NotRunning(pid));
        }

        let mut stdin = self.shared.stdin.lock();
        let pipe = stdin.as_mut().ok_or(ProcessError::StdinUnavailable(pid))?;
        let written = pipe.write_all(text.as_bytes()).and_then(|()| pipe.flush());
        if let Err(e) = written {
            if e.kind() == io::ErrorKind::BrokenPipe {
                *stdin = None;
            }
            return Err(ProcessError::Io(e));
        }
        Ok(())
    }

    /// Closes the child's stdin so it sees end of input.
    pub fn close_input(&self) -> bool {
        self.shared.stdin.lock().take().is_some()
    }

    /// Consumes up to `max_bytes` of buffered output (0 for all).
    pub fn read_output(&self, max_bytes: usize) -> String {
        self.shared.io.take_output(max_bytes)
    }

    pub fn has_output(&self) -> bool {
        self.shared.io.has_data()
    }

    pub fn io(&self) -> &ProcessIO {
        &self.shared.io
    }

    pub fn get_info(&self) -> ProcessInfo {
        self.shared.info.read().clone()
    }

    pub fn state(&self) -> ProcessState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.shared.state().is_terminal()
    }

    /// Blocks until the process finishes or `timeout` passes. Returns whether
    /// it finished.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut done = self.shared.done.lock();
        while !*done {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .done_signal
                        .wait_until(&mut done, deadline)
                        .timed_out()
                    {
                        return *done;
                    }
                }
                None => self.shared.done_signal.wait(&mut done),
            }
        }
        true
    }

    pub fn set_output_callback(&self, callback: Option<OutputCallback>) {
        *self.shared.output_callback.write() = callback;
    }

    pub fn set_completion_callback(&self, callback: Option<CompletionCallback>) {
        *self.shared.completion_callback.write() = callback;
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.is_running() {
            self.terminate(true);
        }
        self.stop_monitor();
    }
}

impl std::fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("info", &*self.shared.info.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedCommand;
    use crate::process::spawn::UnixSpawner;
    use crate::process::types::ExecutionOptions;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn command(executable: &str, arguments: &[&str]) -> ParsedCommand {
        ParsedCommand {
            executable: executable.to_owned(),
            arguments: arguments.iter().map(|s| s.to_string()).collect(),
            ..ParsedCommand::default()
        }
    }

    fn environment() -> BTreeMap<String, String> {
        [("PATH".to_owned(), "/usr/bin:/bin".to_owned())].into()
    }

    fn start(parsed: &ParsedCommand, options: &ExecutionOptions) -> ManagedProcess {
        let process = ManagedProcess::new(
            1000,
            parsed.executable.clone(),
            parsed.arguments.clone(),
            Arc::new(MemoryManager::new()),
        )
        .with_poll_interval(Duration::from_millis(10));

        let env = environment();
        let request = SpawnRequest {
            command: parsed,
            options,
            working_dir: Path::new("/"),
            environment: &env,
        };
        assert!(process.start(&UnixSpawner::new(), &request));
        process
    }

    #[test]
    fn test_natural_exit_is_observed() {
        let process = start(&command("echo", &["hello"]), &ExecutionOptions::default());
        assert!(process.wait_for_completion(Some(Duration::from_secs(10))));

        let info = process.get_info();
        assert_eq!(info.state, ProcessState::Completed);
        assert_eq!(info.exit_code, 0);
        assert!(info.end_time.is_some());
        assert_eq!(process.io().get_stdout(), "hello\n");
        assert!(!process.is_running());
    }

    #[test]
    fn test_failure_exit_code() {
        let process = start(
            &command("sh", &["-c", "echo bad >&2; exit 3"]),
            &ExecutionOptions::default(),
        );
        assert!(process.wait_for_completion(Some(Duration::from_secs(10))));

        let info = process.get_info();
        assert_eq!(info.state, ProcessState::Failed);
        assert_eq!(info.exit_code, 3);
        assert_eq!(process.io().get_stderr(), "bad\n");
    }

    #[test]
    fn test_merge_stderr() {
        let options = ExecutionOptions::default().with_merge_stderr(true);
        let process = start(&command("sh", &["-c", "echo err >&2"]), &options);
        assert!(process.wait_for_completion(Some(Duration::from_secs(10))));

        assert_eq!(process.io().get_stdout(), "err\n");
        assert_eq!(process.io().stderr_size(), 0);
    }

    #[test]
    fn test_start_twice_fails() {
        let parsed = command("true", &[]);
        let options = ExecutionOptions::default();
        let process = start(&parsed, &options);

        let env = environment();
        let request = SpawnRequest {
            command: &parsed,
            options: &options,
            working_dir: Path::new("/"),
            environment: &env,
        };
        assert!(matches!(
            process.try_start(&UnixSpawner::new(), &request),
            Err(ProcessError::AlreadyStarted(1000))
        ));
    }

    #[test]
    fn test_force_terminate() {
        let process = start(&command("sleep", &["30"]), &ExecutionOptions::default());
        assert!(process.terminate(true));
        assert_eq!(process.state(), ProcessState::Terminated);
        assert!(!process.is_running());

        // Idempotent.
        assert!(process.terminate(true));
        assert!(process.terminate(false));
    }

    #[test]
    fn test_finished_record_is_terminal() {
        let mut info = ProcessInfo::new(1200, "echo", vec!["hi".into()]);
        info.finish(ProcessState::Completed, 0);
        info.output = "hi\n".into();

        let process = ManagedProcess::finished(info, Arc::new(MemoryManager::new()));
        assert!(process.is_complete());
        assert!(!process.is_running());
        assert!(process.wait_for_completion(Some(Duration::from_millis(10))));
        assert_eq!(process.get_info().state, ProcessState::Completed);
        assert_eq!(process.io().get_all_output(), "hi\n");
        assert!(process.terminate(true));
        assert_eq!(process.state(), ProcessState::Completed);
    }

    #[test]
    fn test_completion_callback_fires_once() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let process = ManagedProcess::new(
            7,
            "sleep",
            vec!["30".into()],
            Arc::new(MemoryManager::new()),
        );
        {
            let count = Arc::clone(&count);
            process.set_completion_callback(Some(Arc::new(move |info: &ProcessInfo| {
                assert_eq!(info.state, ProcessState::Terminated);
                count.fetch_add(1, Ordering::SeqCst);
            })));
        }

        let parsed = command("sleep", &["30"]);
        let options = ExecutionOptions::default();
        let env = environment();
        let request = SpawnRequest {
            command: &parsed,
            options: &options,
            working_dir: Path::new("/"),
            environment: &env,
        };
        assert!(process.start(&UnixSpawner::new(), &request));
        assert!(process.terminate(true));
        assert!(process.terminate(true));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suspend_and_resume() {
        let process = start(&command("sleep", &["30"]), &ExecutionOptions::default());

        assert!(!process.resume());
        assert!(process.suspend());
        assert_eq!(process.state(), ProcessState::Suspended);
        assert!(!process.suspend());
        assert!(process.resume());
        assert_eq!(process.state(), ProcessState::Running);

        assert!(process.terminate(true));
    }

    #[test]
    fn test_interactive_input() {
        let process = start(&command("cat", &[]), &ExecutionOptions::default());
        assert!(process.send_input("ping\n"));

        let deadline = Instant::now() + Duration::from_secs(10);
        while !process.has_output() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(process.read_output(0), "ping\n");
        assert!(!process.has_output());

        assert!(process.close_input());
        assert!(process.wait_for_completion(Some(Duration::from_secs(10))));
        assert_eq!(process.state(), ProcessState::Completed);
        assert!(!process.send_input("late\n"));
    }

    #[test]
    fn test_timeout_kills_process() {
        let options = ExecutionOptions::default().with_timeout(100);
        let process = start(&command("sleep", &["30"]), &options);

        assert!(process.wait_for_completion(Some(Duration::from_secs(10))));
        assert_eq!(process.state(), ProcessState::Terminated);
    }

    #[test]
    fn test_output_callback_sees_chunks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let process = ManagedProcess::new(9, "echo", vec![], Arc::new(MemoryManager::new()))
            .with_poll_interval(Duration::from_millis(10));
        {
            let seen = Arc::clone(&seen);
            process.set_output_callback(Some(Arc::new(move |bytes: &[u8], is_error: bool| {
                assert!(!is_error);
                seen.lock().extend_from_slice(bytes);
            })));
        }

        let parsed = command("echo", &["chunk"]);
        let options = ExecutionOptions::default();
        let env = environment();
        let request = SpawnRequest {
            command: &parsed,
            options: &options,
            working_dir: Path::new("/"),
            environment: &env,
        };
        assert!(process.start(&UnixSpawner::new(), &request));
        assert!(process.wait_for_completion(Some(Duration::from_secs(10))));

        assert_eq!(seen.lock().as_slice(), b"chunk\n");
    }

    #[test]
    fn test_spawn_failure_marks_failed() {
        let process = ManagedProcess::new(5, "nope", vec![], Arc::new(MemoryManager::new()));
        let parsed = command("definitely-not-a-command-xyz", &[]);
        let options = ExecutionOptions::default();
        let env = environment();
        let request = SpawnRequest {
            command: &parsed,
            options: &options,
            working_dir: Path::new("/"),
            environment: &env,
        };

        assert!(!process.start(&UnixSpawner::new(), &request));
        let info = process.get_info();
        assert_eq!(info.state, ProcessState::Failed);
        assert_eq!(info.exit_code, -1);
    }
}
