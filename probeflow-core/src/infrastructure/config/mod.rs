// probeflow-core/src/infrastructure/config/mod.rs

pub mod rules;
pub mod scope;

pub use rules::{load_rules, parse_rules};
pub use scope::load_scope;
