//! # pmm-supervisor
//!
//! Process supervision for the PMM client container.
//!
//! Spawns `pmm-agent` (and optional setup/prerun helpers) as child processes,
//! relays SIGINT/SIGTERM to them, restarts them per [`RestartPolicy`] and
//! multiplexes their stdout/stderr back onto the supervisor's own streams.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pmm_supervisor::{signals, OutputRelay, ProcessDef, RestartPolicy, Supervisor, SupervisorConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), pmm_supervisor::Error> {
//! let mut sup = Supervisor::new(
//!     SupervisorConfig::new(Duration::from_secs(1)),
//!     signals::listen()?,
//!     OutputRelay::stdio(),
//! );
//!
//! let outcome = sup
//!     .run_phase(&ProcessDef::new("echo").arg("hello"), RestartPolicy::Never)
//!     .await?;
//! sup.shutdown().await;
//! std::process::exit(outcome.code());
//! # }
//! ```

pub mod config;
pub mod entrypoint;
pub mod error;
pub mod output;
pub mod signals;
pub mod supervisor;
pub mod types;

pub use config::{Config, Prerun};
pub use error::{Error, Result};
pub use output::{Line, OutputRelay};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use types::*;
