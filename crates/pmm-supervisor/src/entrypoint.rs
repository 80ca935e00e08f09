//! Phase sequencing for the PMM client container: optional setup, optional
//! prerun hook, then the long-running `pmm-agent run`.

use crate::config::Config;
use crate::error::Result;
use crate::supervisor::Supervisor;
use crate::types::RestartPolicy;

/// Runs every configured phase and returns the exit code for the container.
///
/// Only returns `Ok` when the final phase is allowed to finish: sidecar mode
/// keeps restarting the agent until a termination signal arrives.
pub async fn run(config: &Config, supervisor: &mut Supervisor) -> Result<i32> {
	if config.setup {
		let setup = config.agent_setup();
		let outcome = if config.sidecar {
			supervisor
				.run_with_companion(&setup, RestartPolicy::OnFailure, &config.agent_run())
				.await?
		} else {
			supervisor.run_phase(&setup, RestartPolicy::Never).await?
		};
		tracing::info!("{} exited with {}.", setup, outcome);
		if !outcome.success() && !config.sidecar {
			return Ok(outcome.code());
		}
	}

	if let Some(prerun) = &config.prerun {
		let hook = prerun.process_def();
		let outcome = supervisor
			.run_with_companion(&hook, RestartPolicy::Never, &config.agent_run())
			.await?;
		tracing::info!("{} exited with {}.", prerun.describe(), outcome);
		if !outcome.success() {
			if !config.sidecar {
				return Ok(outcome.code());
			}
			tracing::warn!("continuing in sidecar mode despite prerun failure");
		}
	}

	let policy = if config.sidecar {
		RestartPolicy::Always
	} else {
		RestartPolicy::Never
	};
	let run = config.agent_run();
	let outcome = supervisor.run_phase(&run, policy).await?;
	tracing::info!("{} exited with {}.", run, outcome);
	Ok(outcome.code())
}
