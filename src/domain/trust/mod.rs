//! Trust evaluation domain model

pub mod entities;
pub mod value_objects;

pub use entities::{
    Advisory, CloseName, Dependency, Reason, ReleaseMetadata, SignalKind, TrustSignal, Verdict,
};
pub use value_objects::{Ecosystem, RiskLevel, Severity, Version, VersionRange};
