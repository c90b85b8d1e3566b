pub mod error;
pub mod model;
pub mod rules;
pub mod scope;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use error::DomainError;
pub use model::{Action, Artifact, Evidence, Finding, ProbeOutcome, Summary, TaskRecord, TaskStatus};
pub use scope::Scope;
