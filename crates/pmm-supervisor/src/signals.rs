//! Termination requests as a channel.
//!
//! [`listen`] subscribes to SIGINT and SIGTERM and feeds each delivery into
//! an mpsc channel. The receiver is handed to exactly one
//! [`Supervisor`](crate::Supervisor), which decides what to forward and to
//! whom. Tests build the channel themselves and inject signals directly.

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

pub type SignalReceiver = mpsc::UnboundedReceiver<Signal>;
pub type SignalSender = mpsc::UnboundedSender<Signal>;

pub fn channel() -> (SignalSender, SignalReceiver) {
	mpsc::unbounded_channel()
}

/// Starts relaying OS termination signals into a fresh channel.
pub fn listen() -> std::io::Result<SignalReceiver> {
	let mut sigint = signal(SignalKind::interrupt())?;
	let mut sigterm = signal(SignalKind::terminate())?;
	let (tx, rx) = channel();

	tokio::spawn(async move {
		loop {
			let received = tokio::select! {
				Some(()) = sigint.recv() => Signal::SIGINT,
				Some(()) = sigterm.recv() => Signal::SIGTERM,
				else => return,
			};
			tracing::debug!("received {}", received);
			if tx.send(received).is_err() {
				return;
			}
		}
	});

	Ok(rx)
}
