mod screen;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

pub use screen::Screen;

use crate::core::config::ShellConfig;
use crate::core::env::Environment;
use crate::input::History;
use crate::path::PathExpander;
use crate::process::{CompletionCallback, ExecutionOptions, OutputCallback, Pid, ProcessInfo};
use crate::shell::Shell;

/// Receives every chunk the terminal shows, including the empty string
/// on `clear`.
pub type TerminalOutputCallback = Arc<dyn Fn(&str) + Send + Sync>;

const DEFAULT_PROMPT: &str = "$ ";

#[derive(Default)]
struct Sink {
    screen: Mutex<Screen>,
    callback: RwLock<Option<TerminalOutputCallback>>,
}

impl Sink {
    fn emit(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.screen.lock().push(text);
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(text);
        }
    }
}

/// Per-command decoder that holds back a character cut by a read boundary.
#[derive(Default)]
struct Utf8Carry {
    pending: [Vec<u8>; 2],
}

impl Utf8Carry {
    fn decode(&mut self, bytes: &[u8], is_error: bool) -> String {
        let pending = &mut self.pending[usize::from(is_error)];
        pending.extend_from_slice(bytes);
        let ready = pending.len() - incomplete_tail(pending);
        let text = String::from_utf8_lossy(&pending[..ready]).into_owned();
        pending.drain(..ready);
        text
    }

    fn flush(&mut self) -> String {
        self.pending
            .iter_mut()
            .map(|pending| String::from_utf8_lossy(&std::mem::take(pending)).into_owned())
            .collect()
    }
}

/// Length of a trailing UTF-8 sequence whose continuation bytes are missing.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Front end over one [`Shell`]: history, prompt, collected output and the
/// foreground job.
///
/// Commands are started asynchronously; the last one still running is the
/// foreground job that [`send_input`](Self::send_input) talks to. Background
/// commands (a trailing `&` or background options) never become it.
pub struct Terminal {
    config: ShellConfig,
    environment: Environment,
    options: ExecutionOptions,
    shell: Option<Arc<Shell>>,
    history: History,
    sink: Arc<Sink>,
    prompt: String,
    custom_prompt: bool,
    working_directory: PathBuf,
    foreground: Option<Pid>,
}

impl Terminal {
    pub fn new(config: ShellConfig, environment: Environment) -> Self {
        Self {
            history: History::new(config.history_size),
            config,
            environment,
            options: ExecutionOptions::default(),
            shell: None,
            sink: Arc::new(Sink::default()),
            prompt: DEFAULT_PROMPT.to_owned(),
            custom_prompt: false,
            working_directory: PathBuf::new(),
            foreground: None,
        }
    }

    /// Options every command is started with.
    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates the shell and loads the history file, if one is configured.
    /// Calling it again while initialized does nothing.
    pub fn initialize(&mut self) -> io::Result<()> {
        if self.shell.is_some() {
            return Ok(());
        }

        if let Some(path) = &self.config.history_file {
            self.history = History::with_file(path.clone(), self.config.history_size)?;
        }

        let shell = Shell::with_config(self.config.clone(), self.environment.clone());
        self.working_directory = shell.get_current_directory();
        self.shell = Some(Arc::new(shell));
        self.update_prompt();
        debug!(cwd = %self.working_directory.display(), "terminal initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.shell.is_some()
    }

    pub fn shell(&self) -> Option<&Arc<Shell>> {
        self.shell.as_ref()
    }

    pub fn shutdown(&mut self) {
        if let Some(shell) = self.shell.take() {
            shell.shutdown();
        }
        self.foreground = None;
    }

    /// Runs `command`, returning its pid or -1 if it did not start.
    ///
    /// Blank commands are ignored and not recorded. `clear` and `history`
    /// act on the terminal itself.
    pub fn execute_command(&mut self, command: &str) -> Pid {
        let command = command.trim();
        if command.is_empty() {
            return -1;
        }
        self.add_to_history(command);

        match command {
            "clear" => {
                self.clear();
                return -1;
            }
            "history" => {
                let listing: String = self
                    .history
                    .entries()
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| format!("{} {entry}\n", i + 1))
                    .collect();
                self.sink.emit(&listing);
                return -1;
            }
            _ => {}
        }

        let Some(shell) = self.shell.clone() else {
            warn!("command issued before initialize");
            return -1;
        };

        let carry = Arc::new(Mutex::new(Utf8Carry::default()));
        let sink = Arc::clone(&self.sink);
        let decoder = Arc::clone(&carry);
        let on_output: OutputCallback = Arc::new(move |bytes: &[u8], is_error: bool| {
            let text = decoder.lock().decode(bytes, is_error);
            sink.emit(&text);
        });
        let sink = Arc::clone(&self.sink);
        let on_done: CompletionCallback = Arc::new(move |_info: &ProcessInfo| {
            let rest = carry.lock().flush();
            sink.emit(&rest);
        });

        let parsed = shell.parser().try_parse(command, shell.get_environment());
        let pid = shell.execute_async(command, &self.options, Some(on_output), Some(on_done));
        if pid < 0 {
            let message = match parsed {
                Err(e) => format!("cross-terminal: {e}\n"),
                Ok(parsed) => format!("cross-terminal: command not found: {}\n", parsed.executable),
            };
            self.sink.emit(&message);
        } else if shell.get_process_info(pid).is_active() {
            let background = self.options.run_in_background
                || parsed.as_ref().is_ok_and(|parsed| parsed.run_in_background);
            if background {
                self.sink.emit(&format!("[{pid}]\n"));
            } else {
                self.foreground = Some(pid);
            }
        }

        self.sync_working_directory();
        pid
    }

    /// Writes to the foreground job's stdin.
    pub fn send_input(&self, input: &str) -> bool {
        match (&self.shell, self.foreground) {
            (Some(shell), Some(pid)) => shell.send_input(pid, input),
            _ => false,
        }
    }

    pub fn foreground(&self) -> Option<Pid> {
        self.foreground
    }

    /// Blocks until the foreground job ends or `timeout` passes.
    pub fn wait_foreground(&mut self, timeout: Option<Duration>) -> bool {
        let finished = match (&self.shell, self.foreground) {
            (Some(shell), Some(pid)) => shell.wait_for_process(pid, timeout),
            _ => true,
        };
        self.update();
        finished
    }

    pub fn interrupt_foreground(&self, force: bool) -> bool {
        match (&self.shell, self.foreground) {
            (Some(shell), Some(pid)) => shell.terminate_process(pid, force),
            _ => false,
        }
    }

    /// Drops the collected output; history stays.
    pub fn clear(&mut self) {
        self.sink.screen.lock().clear();
        let callback = self.sink.callback.read().clone();
        if let Some(callback) = callback {
            callback("");
        }
    }

    pub fn resize(&self, columns: u16, rows: u16) {
        if let Some(shell) = &self.shell {
            shell.set_terminal_size(columns, rows);
        }
    }

    pub fn output(&self) -> String {
        self.sink.screen.lock().text().to_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.sink.screen.lock().lines()
    }

    pub fn line_count(&self) -> usize {
        self.sink.screen.lock().line_count()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.entries()
    }

    pub fn add_to_history(&mut self, command: &str) {
        if let Err(e) = self.history.add(command) {
            warn!(error = %e, "could not persist history entry");
        }
    }

    /// A custom prompt replaces the directory-derived one for good.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
        self.custom_prompt = true;
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_working_directory(&mut self, path: &Path) -> bool {
        let changed = self
            .shell
            .as_ref()
            .is_some_and(|shell| shell.set_current_directory(path));
        if changed {
            self.sync_working_directory();
        }
        changed
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn set_output_callback(&self, callback: Option<TerminalOutputCallback>) {
        *self.sink.callback.write() = callback;
    }

    /// Exit code requested by the `exit` built-in.
    pub fn exit_requested(&self) -> Option<i32> {
        self.shell.as_ref().and_then(|shell| shell.exit_requested())
    }

    /// Forgets the foreground job once it has finished.
    pub fn update(&mut self) {
        if let (Some(shell), Some(pid)) = (&self.shell, self.foreground) {
            let info = shell.get_process_info(pid);
            if !info.is_active() {
                debug!(pid, state = %info.state, "foreground job done");
                self.foreground = None;
            }
        }
        self.sync_working_directory();
    }

    fn sync_working_directory(&mut self) {
        let Some(shell) = &self.shell else {
            return;
        };
        let current = shell.get_current_directory();
        if current != self.working_directory {
            self.working_directory = current;
            self.update_prompt();
        }
    }

    fn update_prompt(&mut self) {
        if self.custom_prompt {
            return;
        }
        let home = self
            .shell
            .as_ref()
            .and_then(|shell| shell.get_environment().get("HOME"))
            .map(PathBuf::from);
        let short = PathExpander::with_home(home).shorten(&self.working_directory);
        self.prompt = format!("{short} $ ");
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal() -> Terminal {
        let environment = Environment::new();
        environment.set("PATH", "/usr/bin:/bin").unwrap();
        environment.set("HOME", "/nonexistent-home").unwrap();
        let mut terminal = Terminal::new(ShellConfig::default(), environment);
        terminal.initialize().unwrap();
        terminal
    }

    #[test]
    fn test_initialize() {
        let terminal = terminal();
        assert!(terminal.is_initialized());
        assert!(!terminal.prompt().is_empty());
        assert!(!terminal.working_directory().as_os_str().is_empty());
    }

    #[test]
    fn test_history_management() {
        let mut terminal = terminal();
        terminal.add_to_history("ls -la");
        terminal.add_to_history("cd /tmp");
        terminal.add_to_history("pwd");
        assert_eq!(terminal.history(), vec!["ls -la", "cd /tmp", "pwd"]);
    }

    #[test]
    fn test_blank_commands_are_not_recorded() {
        let mut terminal = terminal();
        assert_eq!(terminal.execute_command("   "), -1);
        assert!(terminal.history().is_empty());
    }

    #[test]
    fn test_custom_prompt_survives_cd() {
        let mut terminal = terminal();
        terminal.set_prompt("custom> ");
        terminal.execute_command("cd /");
        assert_eq!(terminal.prompt(), "custom> ");
        assert_eq!(terminal.working_directory(), Path::new("/"));
    }

    #[test]
    fn test_prompt_follows_directory() {
        let mut terminal = terminal();
        assert!(terminal.set_working_directory(Path::new("/")));
        assert_eq!(terminal.prompt(), "/ $ ");
    }

    #[test]
    fn test_builtin_output_and_clear() {
        let mut terminal = terminal();
        terminal.execute_command("echo hello");
        terminal.execute_command("pwd");
        assert!(terminal.output().starts_with("hello\n"));
        assert_eq!(terminal.line_count(), 2);

        terminal.clear();
        assert_eq!(terminal.output(), "");
        assert_eq!(terminal.line_count(), 0);
        assert!(!terminal.history().is_empty());
    }

    #[test]
    fn test_history_builtin_lists_entries() {
        let mut terminal = terminal();
        terminal.execute_command("echo a");
        terminal.execute_command("history");
        assert!(terminal.output().ends_with("1 echo a\n2 history\n"));
    }

    #[test]
    fn test_unknown_command_reports_error() {
        let mut terminal = terminal();
        assert_eq!(terminal.execute_command("no-such-binary-xyz"), -1);
        assert!(terminal.output().contains("command not found: no-such-binary-xyz"));
    }

    #[test]
    fn test_foreground_input_and_callback() {
        let mut terminal = terminal();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        terminal.set_output_callback(Some(Arc::new(move |text: &str| sink.lock().push_str(text))));

        let pid = terminal.execute_command("cat");
        assert!(pid > 0);
        assert_eq!(terminal.foreground(), Some(pid));
        assert!(terminal.send_input("echoed\n"));

        for _ in 0..200 {
            if seen.lock().contains("echoed") {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(seen.lock().as_str(), "echoed\n");

        assert!(terminal.interrupt_foreground(true));
        assert!(terminal.wait_foreground(Some(Duration::from_secs(5))));
        assert_eq!(terminal.foreground(), None);
    }

    #[test]
    fn test_resize_and_shutdown() {
        let mut terminal = terminal();
        terminal.resize(120, 40);
        assert_eq!(terminal.shell().map(|s| s.terminal_size()), Some((120, 40)));

        terminal.shutdown();
        assert!(!terminal.is_initialized());
        assert_eq!(terminal.execute_command("echo late"), -1);
    }

    #[test]
    fn test_background_job_is_not_foreground() {
        let mut terminal = terminal();
        let pid = terminal.execute_command("sleep 5 &");
        assert!(pid > 0);
        assert_eq!(terminal.foreground(), None);
        assert!(!terminal.send_input("ignored\n"));
        assert!(terminal.output().contains(&format!("[{pid}]")));

        assert!(terminal.shell().is_some_and(|shell| shell.terminate_process(pid, true)));
    }

    #[test]
    fn test_multibyte_char_across_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.txt");
        let mut content = "a".repeat(4095);
        content.push('é');
        std::fs::write(&path, &content).unwrap();

        let mut terminal = terminal();
        let pid = terminal.execute_command(&format!("cat {}", path.display()));
        assert!(pid > 0);

        for _ in 0..500 {
            if terminal.output().len() >= content.len() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(terminal.output(), content);
        assert!(!terminal.output().contains('\u{FFFD}'));
    }

    #[test]
    fn test_carry_holds_partial_sequence() {
        let mut carry = Utf8Carry::default();
        let bytes = "é€".as_bytes();

        assert_eq!(carry.decode(&bytes[..1], false), "");
        assert_eq!(carry.decode(&bytes[1..3], false), "é");
        assert_eq!(carry.decode(&bytes[3..4], false), "");
        assert_eq!(carry.decode(&bytes[4..], false), "€");

        // Streams are carried separately; a dangling lead byte is flushed lossily.
        assert_eq!(carry.decode(&bytes[..1], true), "");
        assert_eq!(carry.decode(b"x", false), "x");
        assert_eq!(carry.flush(), "\u{FFFD}");
    }
}
