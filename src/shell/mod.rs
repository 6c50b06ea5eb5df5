use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

mod environment;
mod executor;
mod guard;
mod table;
pub mod tty;

pub use guard::ProcessGuard;
pub use table::{CleanupWorker, ProcessTable};
pub use tty::TerminalSettings;

use crate::core::commands::{CommandExecutor, Session};
use crate::core::config::ShellConfig;
use crate::core::env::Environment;
use crate::memory::MemoryManager;
use crate::parser::{CommandParser, ParsedCommand};
use crate::process::{
    CompletionCallback, ExecutionOptions, ManagedProcess, OutputCallback, Pid, ProcessInfo,
    SpawnProvider, SpawnRequest, UnixSpawner,
};

const FIRST_PID: Pid = 1000;
const DEFAULT_SHELL: &str = "/bin/sh";

/// Process table, built-ins and session state of one shell.
///
/// Every operation takes `&self`; the shell is meant to be shared between
/// a front end and the threads that drive it. The working directory is
/// session state passed to each spawn. The host process never `chdir`s.
pub struct Shell {
    table: Arc<ProcessTable>,
    cleanup: Mutex<CleanupWorker>,
    next_pid: AtomicI32,
    shell_path: RwLock<PathBuf>,
    current_directory: RwLock<PathBuf>,
    environment: Environment,
    terminal: Mutex<TerminalSettings>,
    memory: Arc<MemoryManager>,
    spawner: Box<dyn SpawnProvider>,
    parser: CommandParser,
    builtins: CommandExecutor,
    config: ShellConfig,
    exit_requested: Mutex<Option<i32>>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// Default configuration over a copy of the host environment.
    pub fn new() -> Self {
        Self::with_config(ShellConfig::default(), Environment::from_system())
    }

    pub fn with_config(config: ShellConfig, environment: Environment) -> Self {
        let table = Arc::new(ProcessTable::new());
        let cleanup = CleanupWorker::spawn(Arc::clone(&table), config.cleanup_interval);

        let current_directory = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let shell_path = initial_shell_path(&config, &environment);
        debug!(shell = %shell_path.display(), cwd = %current_directory.display(), "shell created");

        Self {
            table,
            cleanup: Mutex::new(cleanup),
            next_pid: AtomicI32::new(FIRST_PID),
            shell_path: RwLock::new(shell_path),
            current_directory: RwLock::new(current_directory),
            environment,
            terminal: Mutex::new(TerminalSettings::default()),
            memory: Arc::new(MemoryManager::new()),
            spawner: Box::new(UnixSpawner::new()),
            parser: CommandParser::new(),
            builtins: CommandExecutor::new(),
            config,
            exit_requested: Mutex::new(None),
        }
    }

    /// Shares an existing allocator with this shell.
    pub fn with_memory(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_spawner(mut self, spawner: Box<dyn SpawnProvider>) -> Self {
        self.spawner = spawner;
        self
    }

    fn allocate_pid(&self) -> Pid {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }

    fn parse(&self, command: &str) -> Option<ParsedCommand> {
        match self.parser.try_parse(command, &self.environment) {
            Ok(parsed) if parsed.is_valid() => Some(parsed),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "parse failed");
                None
            }
        }
    }

    /// Compound lines run as `shell_path -c <line>`.
    fn via_shell(&self, parsed: &ParsedCommand) -> ParsedCommand {
        ParsedCommand {
            executable: self.get_shell_path().to_string_lossy().into_owned(),
            arguments: vec!["-c".to_owned(), parsed.line.clone()],
            run_in_background: parsed.run_in_background,
            line: parsed.line.clone(),
            ..ParsedCommand::default()
        }
    }

    /// Spawns and registers a process. On failure the returned record is
    /// the Failed info of the process that never made it into the table.
    fn launch(
        &self,
        pid: Pid,
        parsed: &ParsedCommand,
        options: &ExecutionOptions,
        output_callback: Option<OutputCallback>,
        completion_callback: Option<CompletionCallback>,
    ) -> Result<Arc<ManagedProcess>, ProcessInfo> {
        let parsed = if parsed.requires_shell {
            self.via_shell(parsed)
        } else {
            parsed.clone()
        };

        let working_dir = self.spawn_directory(options);
        let environment = self.spawn_environment(options, &working_dir);

        let process = Arc::new(
            ManagedProcess::new(
                pid,
                parsed.executable.as_str(),
                parsed.arguments.clone(),
                Arc::clone(&self.memory),
            )
            .with_poll_interval(self.config.poll_interval),
        );
        process.set_output_callback(output_callback);
        process.set_completion_callback(completion_callback);

        let request = SpawnRequest {
            command: &parsed,
            options,
            working_dir: &working_dir,
            environment: &environment,
        };

        if let Err(e) = process.try_start(self.spawner.as_ref(), &request) {
            warn!(pid, command = %parsed.executable, error = %e, "spawn failed");
            let mut info = process.get_info();
            info.output = format!("{}: {e}\n", parsed.executable);
            return Err(info);
        }

        self.table.insert(Arc::clone(&process));
        Ok(process)
    }

    /// Runs `command` to completion and returns its final record, including
    /// captured output.
    ///
    /// Built-ins run in place. A background command (`options` or a trailing
    /// `&`) returns as soon as it is running and stays in the table.
    pub fn execute_sync(&self, command: &str, options: &ExecutionOptions) -> ProcessInfo {
        let pid = self.allocate_pid();
        let Some(parsed) = self.parse(command) else {
            return ProcessInfo::failed(pid, command.trim(), -1);
        };

        if self.is_builtin(&parsed) {
            return self.run_builtin(pid, &parsed);
        }

        let process = match self.launch(pid, &parsed, options, None, None) {
            Ok(process) => process,
            Err(info) => return info,
        };

        if options.run_in_background || parsed.run_in_background {
            info!(pid, "running in background");
            return process.get_info();
        }

        while !process.wait_for_completion(Some(self.config.sync_poll_interval)) {}

        self.table.remove(pid);
        let mut info = process.get_info();
        info.output = process.io().get_all_output();
        info
    }

    /// Starts `command` and returns its pid, or -1 if it could not be parsed
    /// or spawned.
    ///
    /// Built-ins finish before this returns; their output and completion are
    /// reported through the callbacks on the calling thread, and their final
    /// record stays queryable until the cleanup sweep drops it.
    pub fn execute_async(
        &self,
        command: &str,
        options: &ExecutionOptions,
        output_callback: Option<OutputCallback>,
        completion_callback: Option<CompletionCallback>,
    ) -> Pid {
        let Some(parsed) = self.parse(command) else {
            return -1;
        };
        let pid = self.allocate_pid();

        if self.is_builtin(&parsed) {
            let info = self.run_builtin(pid, &parsed);
            // Kept until the next sweep so the pid resolves like any other job.
            self.table
                .insert(Arc::new(ManagedProcess::finished(info.clone(), Arc::clone(&self.memory))));
            if let Some(callback) = output_callback.filter(|_| !info.output.is_empty()) {
                callback(info.output.as_bytes(), info.exit_code != 0);
            }
            if let Some(callback) = completion_callback {
                callback(&info);
            }
            return pid;
        }

        match self.launch(pid, &parsed, options, output_callback, completion_callback) {
            Ok(_) => pid,
            Err(_) => -1,
        }
    }

    /// Like [`execute_async`](Self::execute_async) without callbacks; the
    /// caller drives the process through `send_input` and `read_output`.
    pub fn execute_interactive(&self, command: &str, options: &ExecutionOptions) -> Pid {
        self.execute_async(command, options, None, None)
    }

    pub fn terminate_process(&self, pid: Pid, force: bool) -> bool {
        let Some(process) = self.table.get(pid) else {
            return false;
        };
        info!(pid, force, "terminate requested");
        process.terminate(force)
    }

    pub fn suspend_process(&self, pid: Pid) -> bool {
        self.table.get(pid).is_some_and(|p| p.suspend())
    }

    pub fn resume_process(&self, pid: Pid) -> bool {
        self.table.get(pid).is_some_and(|p| p.resume())
    }

    pub fn send_input(&self, pid: Pid, text: &str) -> bool {
        self.table.get(pid).is_some_and(|p| p.send_input(text))
    }

    /// Closes the process's stdin so it sees end of input.
    pub fn close_input(&self, pid: Pid) -> bool {
        self.table.get(pid).is_some_and(|p| p.close_input())
    }

    /// Drains up to `max_bytes` of buffered output; 0 drains everything.
    pub fn read_output(&self, pid: Pid, max_bytes: usize) -> String {
        self.table
            .get(pid)
            .map(|p| p.read_output(max_bytes))
            .unwrap_or_default()
    }

    pub fn has_output(&self, pid: Pid) -> bool {
        self.table.get(pid).is_some_and(|p| p.has_output())
    }

    /// Unknown pids yield a `NotStarted` record carrying only the pid.
    pub fn get_process_info(&self, pid: Pid) -> ProcessInfo {
        self.table.get(pid).map_or_else(
            || ProcessInfo {
                pid,
                ..ProcessInfo::default()
            },
            |p| p.get_info(),
        )
    }

    /// Snapshots of every tracked process, ordered by pid.
    pub fn get_all_processes(&self) -> Vec<ProcessInfo> {
        self.table.infos()
    }

    /// Blocks until `pid` finishes or `timeout` passes. Unknown pids count
    /// as finished.
    pub fn wait_for_process(&self, pid: Pid, timeout: Option<std::time::Duration>) -> bool {
        self.table
            .get(pid)
            .map_or(true, |p| p.wait_for_completion(timeout))
    }

    pub fn get_shell_path(&self) -> PathBuf {
        self.shell_path.read().clone()
    }

    /// Accepts only an existing executable file.
    pub fn set_shell_path(&self, path: &Path) -> bool {
        if !is_executable(path) {
            warn!(path = %path.display(), "rejected shell path");
            return false;
        }
        *self.shell_path.write() = path.to_path_buf();
        true
    }

    pub fn get_current_directory(&self) -> PathBuf {
        self.current_directory.read().clone()
    }

    /// Moves the session to `path` (relative paths resolve against the
    /// current one) and updates `PWD`.
    pub fn set_current_directory(&self, path: &Path) -> bool {
        match self.change_directory(path) {
            Ok(dir) => {
                let _ = self.environment.set("PWD", &dir.to_string_lossy());
                true
            }
            Err(e) => {
                debug!(error = %e, "set_current_directory failed");
                false
            }
        }
    }

    pub fn get_environment(&self) -> &Environment {
        &self.environment
    }

    /// Records the size and mirrors it into `COLUMNS`/`LINES` for children.
    pub fn set_terminal_size(&self, columns: u16, rows: u16) {
        let mut terminal = self.terminal.lock();
        terminal.columns = columns;
        terminal.rows = rows;
        let _ = self.environment.set("COLUMNS", &columns.to_string());
        let _ = self.environment.set("LINES", &rows.to_string());
    }

    pub fn terminal_size(&self) -> (u16, u16) {
        let terminal = self.terminal.lock();
        (terminal.columns, terminal.rows)
    }

    /// False when stdin is not a terminal or the attributes cannot be set.
    pub fn set_echo(&self, enable: bool) -> bool {
        match self.terminal.lock().set_echo(enable) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "set_echo failed");
                false
            }
        }
    }

    pub fn set_raw_mode(&self, raw: bool) -> bool {
        match self.terminal.lock().set_raw_mode(raw) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "set_raw_mode failed");
                false
            }
        }
    }

    /// Exit code recorded by the `exit` built-in, if it has run.
    pub fn exit_requested(&self) -> Option<i32> {
        *self.exit_requested.lock()
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn process_count(&self) -> usize {
        self.table.len()
    }

    /// Stops the cleanup worker, force-terminates whatever is still running
    /// and empties the table. Later calls do nothing.
    pub fn shutdown(&self) {
        self.cleanup.lock().stop();

        let processes = self.table.drain();
        let mut terminated = 0usize;
        for process in processes {
            if process.is_running() {
                process.terminate(true);
                terminated += 1;
            }
        }

        if terminated > 0 {
            info!(terminated, "shell shut down");
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn initial_shell_path(config: &ShellConfig, environment: &Environment) -> PathBuf {
    config
        .shell_path
        .clone()
        .or_else(|| environment.get("SHELL").map(PathBuf::from))
        .filter(|path| is_executable(path))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL))
}
