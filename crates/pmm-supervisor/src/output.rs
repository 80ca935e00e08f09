use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::types::Stream;

const RING_LINES: usize = 1024;
/// Lines queued ahead of the consumer before readers wait for it.
const QUEUE_LINES: usize = 1024;
/// Longer lines are split into chunks of this size.
const MAX_LINE_BYTES: usize = 64 * 1024;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One line of child output, trailing newline included when present.
/// Lines longer than 64 KiB arrive as several chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
	pub stream: Stream,
	pub bytes: Vec<u8>,
}

impl Line {
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.bytes).trim_end_matches('\n').to_string()
	}
}

/// Fans child stdout/stderr into one queue and re-emits each line on the
/// matching supervisor stream.
///
/// Any number of reader tasks push into the queue; a single consumer task
/// drains it, so lines are never interleaved mid-line and each stream keeps
/// its own order. The queue is bounded: when the supervisor's own output
/// stalls, readers stop reading and the children block on their pipes.
pub struct OutputRelay {
	sender: Option<mpsc::Sender<Line>>,
	consumer: Option<JoinHandle<()>>,
	ring: Arc<Mutex<VecDeque<Line>>>,
}

impl OutputRelay {
	/// Relays onto the supervisor's own stdout and stderr.
	pub fn stdio() -> Self {
		Self::new(tokio::io::stdout(), tokio::io::stderr())
	}

	pub fn new<O, E>(stdout: O, stderr: E) -> Self
	where
		O: AsyncWrite + Unpin + Send + 'static,
		E: AsyncWrite + Unpin + Send + 'static,
	{
		let (sender, receiver) = mpsc::channel(QUEUE_LINES);
		let ring = Arc::new(Mutex::new(VecDeque::with_capacity(RING_LINES)));
		let consumer = tokio::spawn(consume(receiver, stdout, stderr, Arc::clone(&ring)));
		Self {
			sender: Some(sender),
			consumer: Some(consumer),
			ring,
		}
	}

	/// Spawns a task that reads `reader` line by line into the queue.
	pub fn attach<R>(&self, stream: Stream, reader: R) -> Option<JoinHandle<()>>
	where
		R: AsyncRead + Unpin + Send + 'static,
	{
		let sender = self.sender.clone()?;
		Some(tokio::spawn(pipe_lines(stream, reader, sender)))
	}

	/// Most recent relayed lines, oldest first.
	pub async fn snapshot(&self) -> Vec<Line> {
		let ring = self.ring.lock().await;
		ring.iter().cloned().collect()
	}

	/// Stops accepting lines and waits for the queue to drain.
	///
	/// Readers still attached to a live pipe are abandoned after a short
	/// timeout.
	pub async fn close(&mut self) {
		self.sender.take();
		if let Some(consumer) = self.consumer.take() {
			if tokio::time::timeout(CLOSE_TIMEOUT, consumer).await.is_err() {
				tracing::debug!("output relay still busy at close, dropping remaining lines");
			}
		}
	}
}

async fn pipe_lines<R>(stream: Stream, reader: R, sender: mpsc::Sender<Line>)
where
	R: AsyncRead + Unpin,
{
	let mut reader = BufReader::new(reader);
	loop {
		let mut buf = Vec::new();
		let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
		match limited.read_until(b'\n', &mut buf).await {
			Ok(0) => break,
			Ok(_) => {
				if sender.send(Line { stream, bytes: buf }).await.is_err() {
					break;
				}
			}
			Err(e) => {
				tracing::debug!("read from child {:?} failed: {}", stream, e);
				break;
			}
		}
	}
}

async fn consume<O, E>(
	mut receiver: mpsc::Receiver<Line>,
	mut stdout: O,
	mut stderr: E,
	ring: Arc<Mutex<VecDeque<Line>>>,
) where
	O: AsyncWrite + Unpin,
	E: AsyncWrite + Unpin,
{
	while let Some(line) = receiver.recv().await {
		let result = match line.stream {
			Stream::Stdout => write_line(&mut stdout, &line.bytes).await,
			Stream::Stderr => write_line(&mut stderr, &line.bytes).await,
		};
		if let Err(e) = result {
			tracing::debug!("relay write to {:?} failed: {}", line.stream, e);
		}

		let mut ring = ring.lock().await;
		if ring.len() >= RING_LINES {
			ring.pop_front();
		}
		ring.push_back(line);
	}
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
	writer.write_all(bytes).await?;
	writer.flush().await
}
