use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

const ENTRYPOINT: &str = env!("CARGO_BIN_EXE_pmm-client-entrypoint");

/// Fake `pmm-agent` placed first on PATH. Every launch appends its arguments
/// to `$STUB_LOG`, so the log doubles as a launch counter.
const STUB_AGENT: &str = r#"#!/bin/sh
echo "$*" >> "$STUB_LOG"
case "$1" in
setup)
	[ "$2" = "--help" ] && { echo "usage: pmm-agent setup"; exit 0; }
	exit "${STUB_SETUP_CODE:-0}"
	;;
run)
	if [ -n "$STUB_RUN_FOREVER" ]; then
		trap 'echo term >> "$STUB_LOG"; exit 0' TERM
		echo ready >> "$STUB_LOG"
		while :; do sleep 0.1; done
	fi
	exit "${STUB_RUN_CODE:-0}"
	;;
esac
exit 64
"#;

fn entrypoint(dir: &Path) -> Command {
	let stub = dir.join("pmm-agent");
	if !stub.exists() {
		std::fs::write(&stub, STUB_AGENT).unwrap();
		std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();
	}
	let path = format!("{}:{}", dir.display(), std::env::var("PATH").unwrap_or_default());

	let mut cmd = Command::new(ENTRYPOINT);
	cmd.env_clear()
		.env("PATH", path)
		.env("STUB_LOG", dir.join("agent.log"))
		.stdin(Stdio::null());
	cmd
}

fn agent_log(dir: &Path) -> Vec<String> {
	std::fs::read_to_string(dir.join("agent.log"))
		.unwrap_or_default()
		.lines()
		.map(str::to_string)
		.collect()
}

#[test]
fn positional_argument_prints_usage_and_agent_help() {
	let dir = tempfile::tempdir().unwrap();
	let output = entrypoint(dir.path()).arg("--help").output().unwrap();

	assert_eq!(output.status.code(), Some(1));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("PMM_AGENT_PRERUN_SCRIPT"), "stderr was: {}", stderr);
	assert_eq!(agent_log(dir.path()), vec!["setup --help"]);
}

#[test]
fn conflicting_prerun_settings_launch_nothing() {
	let dir = tempfile::tempdir().unwrap();
	let output = entrypoint(dir.path())
		.env("PMM_AGENT_SETUP", "true")
		.env("PMM_AGENT_PRERUN_FILE", "/bin/true")
		.env("PMM_AGENT_PRERUN_SCRIPT", "exit 0")
		.output()
		.unwrap();

	assert_eq!(output.status.code(), Some(1));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("cannot be set"), "stderr was: {}", stderr);
	assert!(!dir.path().join("agent.log").exists());
}

#[test]
fn invalid_boolean_is_a_configuration_error() {
	let dir = tempfile::tempdir().unwrap();
	let output = entrypoint(dir.path())
		.env("PMM_AGENT_SETUP", "perhaps")
		.output()
		.unwrap();

	assert_eq!(output.status.code(), Some(1));
	assert!(!dir.path().join("agent.log").exists());
}

#[test]
fn failed_setup_exit_code_is_propagated() {
	let dir = tempfile::tempdir().unwrap();
	let output = entrypoint(dir.path())
		.env("PMM_AGENT_SETUP", "true")
		.env("PMM_AGENT_SIDECAR", "false")
		.env("STUB_SETUP_CODE", "3")
		.output()
		.unwrap();

	assert_eq!(output.status.code(), Some(3));
	assert_eq!(agent_log(dir.path()), vec!["setup"]);
}

#[test]
fn agent_exit_code_is_propagated() {
	let dir = tempfile::tempdir().unwrap();
	let output = entrypoint(dir.path())
		.env("STUB_RUN_CODE", "2")
		.output()
		.unwrap();

	assert_eq!(output.status.code(), Some(2));
	assert_eq!(agent_log(dir.path()), vec!["run"]);
}

#[test]
fn agent_output_is_relayed() {
	let dir = tempfile::tempdir().unwrap();
	let output = entrypoint(dir.path())
		.arg("--help")
		.output()
		.unwrap();
	// `setup --help` inherits our stdout directly
	assert!(String::from_utf8_lossy(&output.stdout).contains("usage: pmm-agent setup"));

	let output = entrypoint(dir.path())
		.env("PMM_AGENT_PRERUN_SCRIPT", "echo from-prerun; echo oops >&2")
		.output()
		.unwrap();
	assert_eq!(output.status.code(), Some(0));
	assert!(String::from_utf8_lossy(&output.stdout).contains("from-prerun"));
	assert!(String::from_utf8_lossy(&output.stderr).contains("oops"));
}

#[test]
fn sigterm_is_forwarded_once_in_sidecar_mode() {
	let dir = tempfile::tempdir().unwrap();
	let mut child = entrypoint(dir.path())
		.env("PMM_AGENT_SIDECAR", "true")
		.env("STUB_RUN_FOREVER", "1")
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.spawn()
		.unwrap();

	let deadline = Instant::now() + Duration::from_secs(10);
	while !agent_log(dir.path()).contains(&"ready".to_string()) {
		assert!(Instant::now() < deadline, "agent never started");
		std::thread::sleep(Duration::from_millis(50));
	}

	kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
	let status = child.wait().unwrap();

	assert_eq!(status.code(), Some(128 + Signal::SIGTERM as i32));
	assert_eq!(agent_log(dir.path()), vec!["run", "ready", "term"]);
}
