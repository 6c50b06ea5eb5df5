use super::{Command, CommandError, CommandOutput, Session};
use crate::process::Pid;

#[derive(Clone, Copy, Default)]
pub struct KillCommand;

impl KillCommand {
    fn parse(args: &[String]) -> Result<(Pid, bool), CommandError> {
        let usage = || CommandError::InvalidArguments("Usage: kill [-9|-KILL] <pid>".into());

        let (force, rest) = match args.first().map(String::as_str) {
            Some("-9" | "-KILL" | "-SIGKILL") => (true, &args[1..]),
            Some("-15" | "-TERM" | "-SIGTERM") => (false, &args[1..]),
            _ => (false, args),
        };

        match rest {
            [pid] => pid.parse().map(|pid| (pid, force)).map_err(|_| usage()),
            _ => Err(usage()),
        }
    }
}

impl Command for KillCommand {
    fn execute(&self, args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        let (pid, force) = Self::parse(args)?;
        if session.terminate_process(pid, force) {
            Ok(CommandOutput::empty())
        } else {
            Err(CommandError::Execution(format!("kill: ({pid}) - no such process")))
        }
    }

    fn usage(&self) -> &'static str {
        "kill [-9] <pid>  terminate a shell process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::testing::FakeSession;
    use crate::process::ProcessInfo;

    fn session() -> FakeSession {
        let mut session = FakeSession::new("/");
        session.jobs = vec![ProcessInfo::new(1000, "sleep", vec![])];
        session
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_kill_graceful_and_forced() {
        let session = session();
        KillCommand.execute(&args(&["1000"]), &session).unwrap();
        KillCommand.execute(&args(&["-9", "1000"]), &session).unwrap();

        assert_eq!(*session.terminated.lock(), vec![(1000, false), (1000, true)]);
    }

    #[test]
    fn test_kill_bad_arguments() {
        let session = session();
        for bad in [&[][..], &["abc"][..], &["-9"][..], &["1", "2"][..]] {
            assert!(matches!(
                KillCommand.execute(&args(bad), &session),
                Err(CommandError::InvalidArguments(_))
            ));
        }
    }

    #[test]
    fn test_kill_unknown_pid() {
        let session = session();
        assert!(matches!(
            KillCommand.execute(&args(&["4242"]), &session),
            Err(CommandError::Execution(_))
        ));
    }
}
