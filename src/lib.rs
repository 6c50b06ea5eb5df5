pub mod error;
pub mod flags;
pub mod logging;
pub mod repl;

pub mod core;
pub mod highlight;
pub mod input;
pub mod memory;
pub mod parser;
pub mod path;
pub mod process;
pub mod shell;
pub mod terminal;

pub use crate::core::env::Environment;
pub use crate::error::ShellError;
pub use crate::memory::MemoryManager;
pub use crate::process::{ExecutionOptions, ProcessInfo, ProcessState};
pub use crate::shell::Shell;
pub use crate::terminal::Terminal;
