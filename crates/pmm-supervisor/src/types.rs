use std::fmt;
use std::process::ExitStatus;

/// Whether a just-exited child gets relaunched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
	/// Run once, return the outcome.
	Never,
	/// Relaunch after every exit. Only returns through cancellation.
	Always,
	/// Relaunch until the child exits successfully.
	OnFailure,
}

impl RestartPolicy {
	pub fn should_restart(&self, outcome: &ExitOutcome) -> bool {
		match self {
			RestartPolicy::Never => false,
			RestartPolicy::Always => true,
			RestartPolicy::OnFailure => !outcome.success(),
		}
	}
}

/// A command to launch: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDef {
	pub program: String,
	pub args: Vec<String>,
	label: Option<String>,
}

impl ProcessDef {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			label: None,
		}
	}

	/// Runs `script` through `sh -c`.
	pub fn shell(script: impl Into<String>) -> Self {
		Self::new("sh").arg("-c").arg(script).label("shell script")
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	/// Overrides the name used in log lines.
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}
}

impl fmt::Display for ProcessDef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(label) = &self.label {
			return write!(f, "{}", label);
		}
		write!(f, "{}", self.program)?;
		for arg in &self.args {
			write!(f, " {}", arg)?;
		}
		Ok(())
	}
}

/// How a single launch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
	Exited(i32),
	Signaled(i32),
	/// The program could not be started at all.
	LaunchFailed,
}

impl ExitOutcome {
	pub fn success(&self) -> bool {
		matches!(self, ExitOutcome::Exited(0))
	}

	/// Exit code to propagate from the entrypoint.
	pub fn code(&self) -> i32 {
		match self {
			ExitOutcome::Exited(code) => *code,
			ExitOutcome::Signaled(signo) => 128 + signo,
			ExitOutcome::LaunchFailed => 127,
		}
	}
}

impl From<ExitStatus> for ExitOutcome {
	fn from(status: ExitStatus) -> Self {
		use std::os::unix::process::ExitStatusExt;
		match (status.code(), status.signal()) {
			(Some(code), _) => ExitOutcome::Exited(code),
			(None, Some(signo)) => ExitOutcome::Signaled(signo),
			(None, None) => ExitOutcome::Exited(-1),
		}
	}
}

impl fmt::Display for ExitOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ExitOutcome::Exited(code) => write!(f, "{}", code),
			ExitOutcome::Signaled(signo) => write!(f, "signal {}", signo),
			ExitOutcome::LaunchFailed => write!(f, "launch failure"),
		}
	}
}

/// Which child stream a relayed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
	Stdout,
	Stderr,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn never_does_not_restart() {
		assert!(!RestartPolicy::Never.should_restart(&ExitOutcome::Exited(0)));
		assert!(!RestartPolicy::Never.should_restart(&ExitOutcome::Exited(2)));
		assert!(!RestartPolicy::Never.should_restart(&ExitOutcome::LaunchFailed));
	}

	#[test]
	fn always_restarts() {
		assert!(RestartPolicy::Always.should_restart(&ExitOutcome::Exited(0)));
		assert!(RestartPolicy::Always.should_restart(&ExitOutcome::Signaled(9)));
	}

	#[test]
	fn on_failure_restarts_only_failures() {
		assert!(!RestartPolicy::OnFailure.should_restart(&ExitOutcome::Exited(0)));
		assert!(RestartPolicy::OnFailure.should_restart(&ExitOutcome::Exited(1)));
		assert!(RestartPolicy::OnFailure.should_restart(&ExitOutcome::Signaled(15)));
		assert!(RestartPolicy::OnFailure.should_restart(&ExitOutcome::LaunchFailed));
	}

	#[test]
	fn outcome_codes() {
		assert_eq!(ExitOutcome::Exited(3).code(), 3);
		assert_eq!(ExitOutcome::Signaled(15).code(), 143);
		assert_eq!(ExitOutcome::LaunchFailed.code(), 127);
		assert!(ExitOutcome::Exited(0).success());
		assert!(!ExitOutcome::Signaled(0).success());
	}

	#[test]
	fn process_def_display() {
		let def = ProcessDef::new("pmm-agent").arg("setup").arg("--help");
		assert_eq!(def.to_string(), "pmm-agent setup --help");
		assert_eq!(ProcessDef::shell("exit 0").to_string(), "shell script");
		assert_eq!(ProcessDef::shell("exit 0").args, vec!["-c", "exit 0"]);
	}
}
