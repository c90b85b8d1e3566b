pub mod handler;

pub use handler::{ProbeHandler, ToolKind};
