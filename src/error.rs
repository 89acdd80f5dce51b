use thiserror::Error;

use crate::card::Bound;

#[derive(Error, Debug)]
pub enum Error {
    #[error("scenario is inconsistent with the tree at node {node}: {reason}")]
    ScenarioInconsistency { node: usize, reason: String },

    #[error("malformed scenario: {0}")]
    MalformedScenario(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot loosen the declared upper bound from {old} to {new}")]
    BoundLoosening { old: Bound, new: Bound },

    #[error("task '{task}' requires '{requires}' to be declared first")]
    TaskOrder { task: &'static str, requires: &'static str },

    #[error("model checker failed: {0}")]
    ModelChecker(String),

    #[error("CEGIS got stale: counterexamples did not change the negative tree")]
    Stale,

    #[error("SAT backend failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
