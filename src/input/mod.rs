mod completer;
pub mod history;

pub use completer::{CommandCompleter, PathCompleter, ShellCompleter};
pub use history::History;
