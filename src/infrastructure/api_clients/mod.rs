//! API clients for external advisory sources

pub mod ghsa;
pub mod osv;
pub mod traits;

pub use ghsa::{GhsaClient, GITHUB_SOURCE};
pub use osv::{OsvClient, OSV_SOURCE};
pub use traits::{AdvisoryProvider, BatchOutcome};
