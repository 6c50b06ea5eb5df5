use crate::error::ShellError;
use std::collections::BTreeMap;

/// Command-line switches of the `cross-terminal` binary.
#[derive(Debug, Clone)]
pub struct Flags {
    flags: BTreeMap<&'static str, Flag>,
}

#[derive(Debug, Clone)]
pub struct Flag {
    pub short: &'static str,
    pub long: &'static str,
    pub description: &'static str,
    pub takes_value: bool,
    pub value: Option<String>,
}

impl Flag {
    fn switch(short: &'static str, long: &'static str, description: &'static str) -> Self {
        Self {
            short,
            long,
            description,
            takes_value: false,
            value: None,
        }
    }

    fn option(short: &'static str, long: &'static str, description: &'static str) -> Self {
        Self {
            takes_value: true,
            ..Self::switch(short, long, description)
        }
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

impl Flags {
    pub fn new() -> Self {
        let mut flags = BTreeMap::new();

        flags.insert("help", Flag::switch("-h", "--help", "Print this help message"));
        flags.insert("version", Flag::switch("-v", "--version", "Show version information"));
        flags.insert("config", Flag::option("-c", "--config", "Read settings from this rc file"));
        flags.insert("quiet", Flag::switch("-q", "--quiet", "Suppress banners and warnings"));
        flags.insert("debug", Flag::switch("-d", "--debug", "Log at debug level"));
        flags.insert("exec", Flag::option("-x", "--exec", "Run one command and exit with its code"));

        Flags { flags }
    }

    pub fn parse(&mut self, args: &[String]) -> Result<(), ShellError> {
        let mut args = args.iter();
        while let Some(arg) = args.next() {
            let flag = self
                .flags
                .values_mut()
                .find(|flag| arg == flag.short || arg == flag.long)
                .ok_or_else(|| ShellError::FlagError(format!("Unknown flag {arg}")))?;

            flag.value = if flag.takes_value {
                let value = args
                    .next()
                    .ok_or_else(|| ShellError::FlagError(format!("Flag {arg} requires a value")))?;
                Some(value.clone())
            } else {
                Some("true".to_string())
            };
        }
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.flags
            .get(name)
            .and_then(|f| f.value.as_ref())
            .is_some()
    }

    pub fn get_value(&self, name: &str) -> Option<&String> {
        self.flags.get(name).and_then(|f| f.value.as_ref())
    }

    pub fn help_text(&self) -> String {
        let mut text = String::from("Usage: cross-terminal [OPTIONS]\n\nOptions:\n");
        for flag in self.flags.values() {
            let long = if flag.takes_value {
                format!("{} <value>", flag.long)
            } else {
                flag.long.to_string()
            };
            text.push_str(&format!("  {}, {:<18} {}\n", flag.short, long, flag.description));
        }
        text
    }

    pub fn print_help(&self) {
        print!("{}", self.help_text());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_switches_and_values() {
        let mut flags = Flags::new();
        flags
            .parse(&args(&["-d", "--config", "/tmp/rc", "-x", "echo hi"]))
            .unwrap();

        assert!(flags.is_set("debug"));
        assert!(!flags.is_set("quiet"));
        assert_eq!(flags.get_value("config").map(String::as_str), Some("/tmp/rc"));
        assert_eq!(flags.get_value("exec").map(String::as_str), Some("echo hi"));
    }

    #[test]
    fn test_missing_value() {
        let mut flags = Flags::new();
        assert!(matches!(
            flags.parse(&args(&["--exec"])),
            Err(ShellError::FlagError(_))
        ));
    }

    #[test]
    fn test_unknown_flag() {
        let mut flags = Flags::new();
        assert!(flags.parse(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_help_lists_every_flag() {
        let help = Flags::new().help_text();
        for long in ["--help", "--version", "--config", "--quiet", "--debug", "--exec"] {
            assert!(help.contains(long), "{long} missing");
        }
    }
}
