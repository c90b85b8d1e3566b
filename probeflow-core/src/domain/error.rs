// probeflow-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Rule syntax error: {0}")]
    #[diagnostic(
        code(probeflow::domain::rule_syntax),
        help("Each rule needs a 'match' string and a 'then.run' list.")
    )]
    RuleSyntax(String),

    #[error("Match expression rejected: {0}")]
    #[diagnostic(
        code(probeflow::domain::expression),
        help("Only and/or/not, ==/!=/in, constants, lists and field names are permitted.")
    )]
    ExpressionRejected(String),

    #[error("Target '{0}' is not listed in the scope targets")]
    #[diagnostic(code(probeflow::domain::scope))]
    TargetOutOfScope(String),

    #[error("Scope validation failed: {0}")]
    #[diagnostic(
        code(probeflow::domain::scope_invalid),
        help("The scope file must include targets[], allowed_tools[], and time_budget_minutes > 0.")
    )]
    ScopeInvalid(String),
}
