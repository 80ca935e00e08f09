use nix::sys::signal::Signal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
	#[error("Both PMM_AGENT_PRERUN_FILE and PMM_AGENT_PRERUN_SCRIPT cannot be set.")]
	ConflictingPrerun,

	#[error("invalid truth value {value:?} for {var}")]
	InvalidBool { var: &'static str, value: String },

	#[error("invalid number of seconds {value:?} for {var}")]
	InvalidDuration { var: &'static str, value: String },

	#[error("failed to signal child: {0}")]
	Signal(#[from] nix::Error),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// The supervisor was asked to stop and its children have exited.
	#[error("terminated by {0}")]
	Terminated(Signal),
}

impl Error {
	/// Exit status the entrypoint should report for this error.
	pub fn exit_code(&self) -> i32 {
		match self {
			Error::Terminated(signal) => 128 + *signal as i32,
			_ => 1,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminated_exit_code_follows_shell_convention() {
		assert_eq!(Error::Terminated(Signal::SIGTERM).exit_code(), 143);
		assert_eq!(Error::Terminated(Signal::SIGINT).exit_code(), 130);
	}

	#[test]
	fn config_errors_exit_one() {
		assert_eq!(Error::ConflictingPrerun.exit_code(), 1);
		let err = Error::InvalidBool {
			var: "PMM_AGENT_SETUP",
			value: "maybe".into(),
		};
		assert_eq!(err.exit_code(), 1);
		assert!(err.to_string().contains("PMM_AGENT_SETUP"));
	}
}
