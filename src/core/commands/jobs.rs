use super::{Command, CommandError, CommandOutput, Session};

/// Lists the shell's process table as `[pid] State command`.
#[derive(Clone, Copy, Default)]
pub struct JobsCommand;

impl Command for JobsCommand {
    fn execute(&self, _args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        let mut jobs = session.jobs();
        jobs.sort_by_key(|job| job.pid);

        let text = jobs
            .iter()
            .map(|job| format!("[{}] {} {}\n", job.pid, job.state, job.command_line()))
            .collect::<String>();
        Ok(CommandOutput::text(text))
    }

    fn usage(&self) -> &'static str {
        "jobs  list shell processes"
    }
}
