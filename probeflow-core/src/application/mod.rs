// probeflow-core/src/application/mod.rs

pub mod planner;
pub mod reporter;
pub mod scheduler;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Cela permet au CLI de faire :
// `use probeflow_core::application::{build_plan, run_scheduler, render_reports};`
// sans avoir à connaître la structure interne des fichiers.

pub use planner::{build_plan, seed_layer_actions, write_next_steps};
pub use reporter::{CombinedModel, build_combined_model, render_reports};
pub use scheduler::{SchedulerConfig, run_scheduler};
