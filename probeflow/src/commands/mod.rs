// probeflow/src/commands/mod.rs

pub mod plan;
pub mod run;

use crate::cli::RunArgs;
use anyhow::{Context, bail};
use probeflow_core::domain::Scope;
use probeflow_core::domain::rules::Rule;
use probeflow_core::infrastructure::config::{load_rules, load_scope, parse_rules};

/// Rule set compiled into the binary, used when --rules is not given.
const DEFAULT_RULES: &str = include_str!("../../rules/default.yaml");

pub struct Preflight {
    pub scope: Scope,
    pub layers: Vec<u32>,
    pub rules: Vec<Rule>,
}

/// Everything that must hold before any state is written: the environment
/// gate, a valid scope, an in-scope target, parseable layers and rules.
pub fn preflight(args: &RunArgs) -> anyhow::Result<Preflight> {
    if std::env::var("AUTH_OK").as_deref() != Ok("1") {
        bail!("AUTH_OK=1 is required in the environment");
    }

    let scope = load_scope(&args.scope)
        .with_context(|| format!("Failed to load scope from {:?}", args.scope))?;
    scope.require_target(&args.target)?;

    let layers = parse_layers(&args.layers)?;

    let rules = match &args.rules {
        Some(path) => load_rules(path)
            .with_context(|| format!("Failed to load rules from {:?}", path))?,
        None => parse_rules(DEFAULT_RULES).context("Bundled default rules are invalid")?,
    };

    Ok(Preflight {
        scope,
        layers,
        rules,
    })
}

fn parse_layers(csv: &str) -> anyhow::Result<Vec<u32>> {
    let mut layers = Vec::new();
    for part in csv.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let layer: u32 = part
            .parse()
            .with_context(|| format!("Invalid --layers value '{part}'"))?;
        layers.push(layer);
    }
    Ok(layers)
}
