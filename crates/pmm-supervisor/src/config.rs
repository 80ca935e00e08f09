use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::ProcessDef;

pub const ENV_SETUP: &str = "PMM_AGENT_SETUP";
pub const ENV_SIDECAR: &str = "PMM_AGENT_SIDECAR";
pub const ENV_SIDECAR_SLEEP: &str = "PMM_AGENT_SIDECAR_SLEEP";
pub const ENV_PRERUN_FILE: &str = "PMM_AGENT_PRERUN_FILE";
pub const ENV_PRERUN_SCRIPT: &str = "PMM_AGENT_PRERUN_SCRIPT";

pub const DEFAULT_AGENT: &str = "pmm-agent";

fn default_sidecar_sleep() -> Duration {
	Duration::from_secs(1)
}

/// Hook run once while the agent is active in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerun {
	File(PathBuf),
	Script(String),
}

impl Prerun {
	pub fn process_def(&self) -> ProcessDef {
		match self {
			Prerun::File(path) => {
				let path = path.to_string_lossy().into_owned();
				ProcessDef::new(path.clone()).label(format!("prerun file {}", path))
			}
			Prerun::Script(script) => ProcessDef::shell(script.clone()).label("prerun shell script"),
		}
	}

	pub fn describe(&self) -> &'static str {
		match self {
			Prerun::File(_) => "Prerun file",
			Prerun::Script(_) => "Prerun shell script",
		}
	}
}

/// Entrypoint settings, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub setup: bool,
	pub sidecar: bool,
	pub sidecar_sleep: Duration,
	pub prerun: Option<Prerun>,
	pub agent: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			setup: false,
			sidecar: false,
			sidecar_sleep: default_sidecar_sleep(),
			prerun: None,
			agent: DEFAULT_AGENT.to_string(),
		}
	}
}

impl Config {
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds the config from an arbitrary variable source.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

		let prerun_file = get(ENV_PRERUN_FILE);
		let prerun_script = get(ENV_PRERUN_SCRIPT);
		let prerun = match (prerun_file, prerun_script) {
			(Some(_), Some(_)) => return Err(Error::ConflictingPrerun),
			(Some(file), None) => Some(Prerun::File(PathBuf::from(file))),
			(None, Some(script)) => Some(Prerun::Script(script)),
			(None, None) => None,
		};

		let setup = match get(ENV_SETUP) {
			Some(v) => parse_bool(ENV_SETUP, &v)?,
			None => false,
		};
		let sidecar = match get(ENV_SIDECAR) {
			Some(v) => parse_bool(ENV_SIDECAR, &v)?,
			None => false,
		};
		let sidecar_sleep = match get(ENV_SIDECAR_SLEEP) {
			Some(v) => parse_secs(ENV_SIDECAR_SLEEP, &v)?,
			None => default_sidecar_sleep(),
		};

		Ok(Self {
			setup,
			sidecar,
			sidecar_sleep,
			prerun,
			agent: DEFAULT_AGENT.to_string(),
		})
	}

	pub fn agent_run(&self) -> ProcessDef {
		ProcessDef::new(self.agent.clone()).arg("run")
	}

	pub fn agent_setup(&self) -> ProcessDef {
		ProcessDef::new(self.agent.clone()).arg("setup")
	}

	pub fn agent_setup_help(&self) -> ProcessDef {
		ProcessDef::new(self.agent.clone()).arg("setup").arg("--help")
	}
}

/// Accepts the same spellings as Python's `strtobool`.
pub fn parse_bool(var: &'static str, value: &str) -> Result<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
		"n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
		_ => Err(Error::InvalidBool {
			var,
			value: value.to_string(),
		}),
	}
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration> {
	value
		.trim()
		.parse::<u64>()
		.map(Duration::from_secs)
		.map_err(|_| Error::InvalidDuration {
			var,
			value: value.to_string(),
		})
}
