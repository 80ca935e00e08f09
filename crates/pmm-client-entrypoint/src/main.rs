use std::process::ExitCode;

use owo_colors::OwoColorize;
use pmm_supervisor::config::{
	ENV_PRERUN_FILE, ENV_PRERUN_SCRIPT, ENV_SETUP, ENV_SIDECAR, ENV_SIDECAR_SLEEP,
};
use pmm_supervisor::{entrypoint, signals, Config, OutputRelay, Supervisor, SupervisorConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
	let args: Vec<String> = std::env::args().skip(1).collect();
	if !args.is_empty() {
		print_usage();
		show_agent_help().await;
		return ExitCode::from(1);
	}

	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = match Config::from_env() {
		Ok(c) => c,
		Err(e) => {
			tracing::error!("{}", e);
			return ExitCode::from(1);
		}
	};

	let signals = match signals::listen() {
		Ok(s) => s,
		Err(e) => {
			tracing::error!("failed to install signal handlers: {}", e);
			return ExitCode::from(1);
		}
	};

	let mut supervisor = Supervisor::new(
		SupervisorConfig::new(config.sidecar_sleep),
		signals,
		OutputRelay::stdio(),
	);

	let code = match entrypoint::run(&config, &mut supervisor).await {
		Ok(code) => code,
		Err(e) => {
			tracing::error!("{}", e);
			e.exit_code()
		}
	};
	supervisor.shutdown().await;
	ExitCode::from(code as u8)
}

fn print_usage() {
	eprintln!("{} {}: PMM 2.x Client Docker container", "pmm-client-entrypoint".bold(), env!("CARGO_PKG_VERSION"));
	eprintln!();
	eprintln!("It runs pmm-agent as a supervised child process.");
	eprintln!("It is configured entirely by environment variables. Arguments or flags are not used.");
	eprintln!();
	eprintln!("{}", "environment".cyan().bold());
	eprintln!("  {}          If true, `pmm-agent setup` is called before `pmm-agent run`.", ENV_SETUP.bold());
	eprintln!("  {}        If true, setup and prerun failures do not stop the container", ENV_SIDECAR.bold());
	eprintln!("                             and `pmm-agent run` is restarted whenever it exits.");
	eprintln!("  {}  Seconds to wait before each restart (default 1).", ENV_SIDECAR_SLEEP.bold());
	eprintln!("  {}    If non-empty, runs given file with `pmm-agent run` running in the background.", ENV_PRERUN_FILE.bold());
	eprintln!("  {}  If non-empty, runs given shell script content with `pmm-agent run` running in the background.", ENV_PRERUN_SCRIPT.bold());
	eprintln!();
	eprintln!("Additionally, many environment variables are recognized by pmm-agent itself.");
	eprintln!("The following help text shows them as [PMM_AGENT_XXX].");
	eprintln!();
}

async fn show_agent_help() {
	let help = Config::default().agent_setup_help();
	let status = tokio::process::Command::new(&help.program)
		.args(&help.args)
		.status()
		.await;
	if let Err(e) = status {
		eprintln!("failed to run {}: {}", help, e);
	}
}
