//! rtx - dependency trust evaluation for multi-ecosystem projects
//!
//! rtx reconstructs a project's transitive dependency set from its manifests
//! and lockfiles, enriches each package with vulnerability advisories and
//! registry metadata, and derives a deterministic per-dependency risk
//! classification plus an aggregate exit code suitable for CI gating.
//!
//! # Architecture
//!
//! The crate follows a domain / application / infrastructure split:
//!
//! ```text
//! src/
//! ├── domain/trust/     # Entities and value objects (no I/O)
//! ├── application/      # Dependency set builder, signal deriver,
//! │                     # policy engine, orchestrator, reporting
//! ├── infrastructure/   # Advisory clients, registry clients, cache,
//! │                     # scanners, retry, diagnostics
//! ├── config/           # Typed configuration with TOML + env support
//! └── cli/              # clap surface and subcommands
//! ```
//!
//! # Configuration
//!
//! Settings live in `rtx.toml` under the `[rtx]` table and are overridable
//! per key through the environment:
//!
//! ```bash
//! RTX__HTTP__TIMEOUT_SECONDS=10
//! RTX__PROVIDERS__OSV__BATCH_SIZE=32
//! ```
//!
//! # Determinism
//!
//! For a fixed input and cache state, two runs produce byte-identical JSON
//! reports: the working set, merged advisories, reasons, and verdicts are
//! all sorted under total orders, and no wall-clock data is serialized.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use config::Config;
pub use logging::init_tracing;
