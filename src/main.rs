use cross_terminal::error::ShellError;
use cross_terminal::flags::Flags;
use cross_terminal::logging::init_logging;
use cross_terminal::repl::{load_settings, Repl};
use std::env;

fn run() -> Result<i32, ShellError> {
    let mut flags = Flags::new();
    let args: Vec<String> = env::args().skip(1).collect();
    flags.parse(&args)?;

    if flags.is_set("help") {
        flags.print_help();
        return Ok(0);
    }

    if flags.is_set("version") {
        println!("cross-terminal {}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    let (config, environment) = load_settings(&flags)?;
    init_logging(&config.log_level)?;

    let command = flags.get_value("exec").cloned();
    let mut repl = Repl::new(flags, config, environment)?;
    match command {
        Some(command) => Ok(repl.run_once(&command)),
        None => repl.run(),
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("cross-terminal: {e}");
            1
        }
    };
    std::process::exit(code);
}
