//! govrun-core: release governance engine.
//!
//! Models a release as a `ReleaseRun` aggregate moving through a fixed state
//! machine (`run`), evaluates proposed changes against a risk model and a
//! rule-based policy under the change governance protocol (`risk`, `policy`,
//! `governance`), executes the publishing phase's steps idempotently
//! (`executor`), and fans resulting domain events out to subscribers
//! (`events`, `broadcaster`). `usecases` wires these together into the
//! transaction scripts a caller (the CLI, a CI job, a bot) actually invokes;
//! `ports` defines the boundaries a caller must supply concrete adapters for.

pub mod broadcaster;
pub mod config;
pub mod digest;
pub mod error;
pub mod events;
pub mod executor;
pub mod governance;
pub mod metrics;
pub mod obs;
pub mod policy;
pub mod ports;
pub mod risk;
pub mod run;
pub mod storage;
pub mod telemetry;
pub mod testkit;
pub mod usecases;
pub mod value_types;

pub use error::{DomainError, Result};
pub use events::{DomainEventKind, RunEvent};
pub use metrics::METRICS;
pub use obs::RunSpan;
pub use run::{Actor, ActorType, ReleaseRun, RunState};
pub use telemetry::{init_tracing, init_tracing_from_env};

/// Crate version, exposed for diagnostics and CLI `--version` output.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
