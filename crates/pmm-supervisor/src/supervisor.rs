use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::error::{Error, Result};
use crate::output::OutputRelay;
use crate::signals::SignalReceiver;
use crate::types::*;

pub struct SupervisorConfig {
	/// Pause between an exit and the next launch.
	pub restart_delay: Duration,
	/// How many times a companion is polled after SIGTERM before SIGKILL.
	pub grace_polls: u32,
	pub poll_interval: Duration,
}

impl SupervisorConfig {
	pub fn new(restart_delay: Duration) -> Self {
		Self {
			restart_delay,
			grace_polls: 10,
			poll_interval: Duration::from_secs(1),
		}
	}
}

/// Runs commands as supervised children, relays termination signals to them
/// and restarts them according to a [`RestartPolicy`].
///
/// A supervisor owns its signal receiver. Nothing process-global is touched
/// by constructing one; the binary wires [`signals::listen`](crate::signals::listen)
/// in, tests inject their own channel.
pub struct Supervisor {
	config: SupervisorConfig,
	signals: SignalReceiver,
	relay: OutputRelay,
	launches: usize,
}

/// A launched OS process. Its output readers are detached and run until the
/// pipes close, which may be after the process itself has exited.
struct ChildProcess {
	label: String,
	pid: Option<u32>,
	child: Child,
	outcome: Option<ExitOutcome>,
}

impl ChildProcess {
	fn is_running(&self) -> bool {
		self.outcome.is_none()
	}

	/// Sends `signal` to the child's process group. A group that is already
	/// gone is not an error.
	fn signal(&self, signal: Signal) -> Result<()> {
		let Some(pid) = self.pid else {
			return Ok(());
		};
		match killpg(Pid::from_raw(pid as i32), signal) {
			Ok(()) | Err(Errno::ESRCH) => Ok(()),
			Err(e) => Err(Error::Signal(e)),
		}
	}

	fn try_wait(&mut self) -> Result<Option<ExitOutcome>> {
		if let Some(outcome) = self.outcome {
			return Ok(Some(outcome));
		}
		let outcome = self.child.try_wait()?.map(ExitOutcome::from);
		self.outcome = outcome;
		Ok(outcome)
	}

	async fn wait(&mut self) -> Result<ExitOutcome> {
		let outcome = ExitOutcome::from(self.child.wait().await?);
		self.outcome = Some(outcome);
		Ok(outcome)
	}
}

impl Supervisor {
	pub fn new(config: SupervisorConfig, signals: SignalReceiver, relay: OutputRelay) -> Self {
		Self {
			config,
			signals,
			relay,
			launches: 0,
		}
	}

	/// Number of launch attempts so far, failed spawns included.
	pub fn launches(&self) -> usize {
		self.launches
	}

	pub fn relay(&self) -> &OutputRelay {
		&self.relay
	}

	/// Flushes relayed output. Call once before the process exits.
	pub async fn shutdown(&mut self) {
		self.relay.close().await;
	}

	/// Runs `def` until `policy` says stop.
	///
	/// Returns the last outcome. With [`RestartPolicy::Always`] this only
	/// returns through [`Error::Terminated`].
	pub async fn run_phase(&mut self, def: &ProcessDef, policy: RestartPolicy) -> Result<ExitOutcome> {
		self.run_loop(def, policy, None).await
	}

	/// Runs `companion` in the background while `def` runs under `policy`,
	/// then stops the companion: SIGTERM, a grace period of polls, SIGKILL.
	///
	/// A companion that fails to start is logged and otherwise ignored.
	pub async fn run_with_companion(
		&mut self,
		def: &ProcessDef,
		policy: RestartPolicy,
		companion: &ProcessDef,
	) -> Result<ExitOutcome> {
		tracing::info!("Starting {} in background ...", companion);
		let mut background = self.launch(companion);

		let result = self.run_loop(def, policy, background.as_mut()).await;

		if let Some(mut child) = background {
			if child.is_running() {
				self.stop(&mut child).await?;
			}
		}
		result
	}

	async fn run_loop(
		&mut self,
		def: &ProcessDef,
		policy: RestartPolicy,
		mut companion: Option<&mut ChildProcess>,
	) -> Result<ExitOutcome> {
		loop {
			tracing::info!("Starting {} ...", def);
			let outcome = match self.launch(def) {
				Some(mut child) => {
					tokio::select! {
						res = child.wait() => res?,
						Some(signal) = self.signals.recv() => {
							return Err(forward(signal, Some(&mut child), companion.as_deref_mut()).await);
						}
					}
				}
				None => ExitOutcome::LaunchFailed,
			};

			if !policy.should_restart(&outcome) {
				return Ok(outcome);
			}

			tracing::warn!(
				"{} exited with {}, restarting in {}s",
				def,
				outcome,
				self.config.restart_delay.as_secs_f64()
			);
			tokio::select! {
				_ = tokio::time::sleep(self.config.restart_delay) => {}
				Some(signal) = self.signals.recv() => {
					return Err(forward(signal, None, companion.as_deref_mut()).await);
				}
			}
		}
	}

	fn launch(&mut self, def: &ProcessDef) -> Option<ChildProcess> {
		self.launches += 1;

		let mut cmd = Command::new(&def.program);
		cmd.args(&def.args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.process_group(0);

		let mut child = match cmd.spawn() {
			Ok(c) => c,
			Err(e) => {
				tracing::error!("failed to start {}: {}", def, e);
				return None;
			}
		};

		let pid = child.id();
		tracing::debug!("started {} (pid {:?})", def, pid);

		// a grandchild may keep the pipes open, so nothing waits on these
		if let Some(stdout) = child.stdout.take() {
			self.relay.attach(Stream::Stdout, stdout);
		}
		if let Some(stderr) = child.stderr.take() {
			self.relay.attach(Stream::Stderr, stderr);
		}

		Some(ChildProcess {
			label: def.to_string(),
			pid,
			child,
			outcome: None,
		})
	}

	async fn stop(&mut self, child: &mut ChildProcess) -> Result<()> {
		tracing::info!("Stopping {} ...", child.label);
		child.signal(Signal::SIGTERM)?;

		let mut pending = None;
		for _ in 0..self.config.grace_polls {
			if child.try_wait()?.is_some() {
				break;
			}
			tokio::select! {
				_ = tokio::time::sleep(self.config.poll_interval) => {}
				Some(signal) = self.signals.recv(), if pending.is_none() => {
					tracing::info!("forwarding {} to {}", signal, child.label);
					child.signal(signal)?;
					pending = Some(signal);
				}
			}
		}

		if child.try_wait()?.is_none() {
			tracing::warn!("Killing {} ...", child.label);
			child.signal(Signal::SIGKILL)?;
		}
		let outcome = child.wait().await?;
		tracing::debug!("{} stopped with {}", child.label, outcome);

		match pending {
			Some(signal) => Err(Error::Terminated(signal)),
			None => Ok(()),
		}
	}
}

/// Forwards `signal` once to every running child, waits for each to exit
/// and returns the termination error for the caller to propagate.
async fn forward(
	signal: Signal,
	foreground: Option<&mut ChildProcess>,
	companion: Option<&mut ChildProcess>,
) -> Error {
	let children: Vec<&mut ChildProcess> = foreground
		.into_iter()
		.chain(companion)
		.filter(|c| c.is_running())
		.collect();

	for child in &children {
		tracing::info!("forwarding {} to {} (pid {:?})", signal, child.label, child.pid);
		if let Err(e) = child.signal(signal) {
			tracing::error!("failed to forward {} to {}: {}", signal, child.label, e);
		}
	}
	for child in children {
		match child.wait().await {
			Ok(outcome) => tracing::info!("{} exited with {}.", child.label, outcome),
			Err(e) => tracing::error!("failed to wait for {}: {}", child.label, e),
		}
	}
	Error::Terminated(signal)
}
