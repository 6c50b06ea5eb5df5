use std::io;

use crate::process::ProcessError;

/// Columns, rows and line-discipline flags of the controlling terminal.
#[derive(Clone, Copy)]
pub struct TerminalSettings {
    pub columns: u16,
    pub rows: u16,
    pub echo: bool,
    pub raw_mode: bool,
    /// Attributes from before raw mode was entered.
    saved: Option<libc::termios>,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            columns: 80,
            rows: 24,
            echo: true,
            raw_mode: false,
            saved: None,
        }
    }
}

impl std::fmt::Debug for TerminalSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSettings")
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("echo", &self.echo)
            .field("raw_mode", &self.raw_mode)
            .finish()
    }
}

impl TerminalSettings {
    pub fn set_echo(&mut self, enable: bool) -> Result<(), ProcessError> {
        let mut term = get_attributes()?;
        if enable {
            term.c_lflag |= libc::ECHO;
        } else {
            term.c_lflag &= !libc::ECHO;
        }
        set_attributes(&term)?;
        self.echo = enable;
        Ok(())
    }

    pub fn set_raw_mode(&mut self, raw: bool) -> Result<(), ProcessError> {
        if raw == self.raw_mode {
            return Ok(());
        }

        if raw {
            let original = get_attributes()?;
            let mut term = original;
            // SAFETY: `term` is a valid termios obtained from tcgetattr.
            unsafe { libc::cfmakeraw(&mut term) };
            set_attributes(&term)?;
            self.saved = Some(original);
        } else if let Some(original) = self.saved.take() {
            set_attributes(&original)?;
        }

        self.raw_mode = raw;
        Ok(())
    }
}

fn ensure_tty() -> Result<(), ProcessError> {
    // SAFETY: isatty only inspects the descriptor.
    if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
        Ok(())
    } else {
        Err(ProcessError::Unsupported("stdin is not a terminal"))
    }
}

fn get_attributes() -> Result<libc::termios, ProcessError> {
    ensure_tty()?;
    let mut term = std::mem::MaybeUninit::<libc::termios>::uninit();
    // SAFETY: tcgetattr fully initializes `term` when it returns 0.
    if unsafe { libc::tcgetattr(libc::STDIN_FILENO, term.as_mut_ptr()) } != 0 {
        return Err(ProcessError::Io(io::Error::last_os_error()));
    }
    Ok(unsafe { term.assume_init() })
}

fn set_attributes(term: &libc::termios) -> Result<(), ProcessError> {
    // SAFETY: `term` points at a live termios.
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, term) } != 0 {
        return Err(ProcessError::Io(io::Error::last_os_error()));
    }
    Ok(())
}

/// Size of the terminal on stdout as `(columns, rows)`, if there is one.
pub fn window_size() -> Option<(u16, u16)> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ writes a winsize into the pointer we pass.
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size as *mut libc::winsize) };
    (rc == 0 && size.ws_col > 0).then_some((size.ws_col, size.ws_row))
}
