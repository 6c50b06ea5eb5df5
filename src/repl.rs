use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use rustyline::config::Configurer;
use rustyline::{error::ReadlineError, history::FileHistory, Editor};
use tracing::debug;

use crate::core::config::{ConfigPaths, ShellConfig};
use crate::core::env::Environment;
use crate::error::ShellError;
use crate::flags::Flags;
use crate::highlight::SyntaxHighlighter;
use crate::input::ShellCompleter;
use crate::process::ExecutionOptions;
use crate::shell::{tty, Shell};
use crate::terminal::Terminal;

/// Host environment plus the rc file named by `--config` (or the default
/// one), with `--debug` forcing the log level.
pub fn load_settings(flags: &Flags) -> Result<(ShellConfig, Environment), ShellError> {
    let environment = Environment::from_system();
    let mut paths = ConfigPaths::new()?;
    if let Some(rc) = flags.get_value("config") {
        paths = paths.with_rc(PathBuf::from(rc));
    }

    let mut config = ShellConfig::load(&paths, &environment)?;
    if flags.is_set("debug") {
        config.log_level = "debug".to_owned();
    }
    Ok((config, environment))
}

/// Commands run with the host's stdio so full-screen programs work.
fn foreground_options() -> ExecutionOptions {
    ExecutionOptions::new().with_capture_output(false)
}

/// Interactive read-eval loop over a [`Terminal`].
pub struct Repl {
    editor: Editor<ShellCompleter, FileHistory>,
    terminal: Terminal,
    shell: Arc<Shell>,
    flags: Flags,
    highlighter: SyntaxHighlighter,
    foreground: Arc<AtomicI32>,
    resized: Arc<AtomicBool>,
}

impl Repl {
    pub fn new(flags: Flags, config: ShellConfig, environment: Environment) -> Result<Self, ShellError> {
        let mut terminal = Terminal::new(config, environment).with_options(foreground_options());
        terminal.initialize()?;
        terminal.set_output_callback(Some(Arc::new(|text: &str| {
            print!("{text}");
            let _ = io::stdout().flush();
        })));

        let shell = terminal
            .shell()
            .cloned()
            .ok_or(ShellError::NotInitialized)?;

        let mut editor = Editor::<ShellCompleter, FileHistory>::new()?;
        editor.set_helper(Some(ShellCompleter::new(Arc::clone(&shell))));
        editor.set_auto_add_history(true);
        for entry in terminal.history() {
            editor.add_history_entry(entry)?;
        }

        let foreground = Arc::new(AtomicI32::new(-1));
        let handler_shell = Arc::clone(&shell);
        let handler_foreground = Arc::clone(&foreground);
        let quiet = flags.is_set("quiet");
        ctrlc::set_handler(move || {
            let pid = handler_foreground.load(Ordering::Acquire);
            if pid > 0 {
                handler_shell.terminate_process(pid, false);
            } else if !quiet {
                println!("\nUse 'exit' to exit the shell");
            }
        })?;

        let resized = Arc::new(AtomicBool::new(true));
        signal_hook::flag::register(signal_hook::consts::SIGWINCH, Arc::clone(&resized))?;

        Ok(Self {
            editor,
            terminal,
            shell,
            flags,
            highlighter: SyntaxHighlighter::new(),
            foreground,
            resized,
        })
    }

    /// Runs one command to completion and returns its exit code.
    pub fn run_once(&self, command: &str) -> i32 {
        let info = self.shell.execute_sync(command, &foreground_options());
        if !info.output.is_empty() {
            print!("{}", info.output);
            let _ = io::stdout().flush();
        }
        info.exit_code
    }

    /// Reads lines until EOF or `exit`, returning the exit code.
    pub fn run(&mut self) -> Result<i32, ShellError> {
        if !self.flags.is_set("quiet") {
            println!("cross-terminal {}", env!("CARGO_PKG_VERSION"));
        }

        loop {
            self.apply_resize();
            let prompt = self.terminal.prompt().to_owned();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    self.run_line(&line);
                    if let Some(code) = self.terminal.exit_requested() {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    if !self.flags.is_set("quiet") {
                        println!("CTRL-C");
                    }
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    if !self.flags.is_set("quiet") {
                        println!("CTRL-D");
                    }
                    break;
                }
                Err(e) => {
                    if !self.flags.is_set("quiet") {
                        eprintln!("{}", self.highlighter.highlight_error(&format!("Error: {e}")));
                    }
                    continue;
                }
            }
        }
        Ok(0)
    }

    fn run_line(&mut self, line: &str) {
        let pid = self.terminal.execute_command(line);
        if pid <= 0 || self.terminal.foreground().is_none() {
            return;
        }

        self.foreground.store(pid, Ordering::Release);
        self.terminal.wait_foreground(None);
        self.foreground.store(-1, Ordering::Release);
    }

    fn apply_resize(&self) {
        if !self.resized.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some((columns, rows)) = tty::window_size() {
            debug!(columns, rows, "terminal resized");
            self.terminal.resize(columns, rows);
        }
    }
}
