//! Pipeline errors.
//!
//! [`PipelineError`] is fatal and stops the run. Raised during the visits,
//! it aborts the pass before anything is merged; raised while merging, it
//! may leave the pass partly applied to the graph. [`UnitError`] is local to
//! one unit: a pass collects them from every visit, merges in full, and then
//! reports them together.

use std::fmt;

use mutagraph_core::{BindError, GraphError, PropertyError};
use thiserror::Error;

use crate::phase::Phase;

/// Errors that stop a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("mutator {mutator} tried to split {unit} after entering the final phase")]
    IllegalSplit { mutator: String, unit: String },

    #[error("unresolved dependency: {0}")]
    UnresolvedDependency(#[from] BindError),

    #[error("{dependent} depends on undefined unit {target}")]
    UndefinedUnit { dependent: String, target: String },

    #[error("dependency cycle involving {0}")]
    DependencyCycle(String),

    #[error("mutator {0} is registered more than once")]
    DuplicateMutator(String),

    #[error("phase {phase} is reserved for built-in mutators (registering {mutator})")]
    ReservedPhase { phase: Phase, mutator: String },

    #[error("unit {0} already exists")]
    DuplicateUnit(String),

    #[error("unit {unit} renamed to both {first} and {second}")]
    RenameConflict {
        unit: String,
        first: String,
        second: String,
    },

    #[error("{unit} has no variation {variation} created by {mutator}")]
    UnknownVariation {
        mutator: String,
        unit: String,
        variation: String,
    },

    #[error("{replacer} replaces {target}, which has no variant with matching variations")]
    MissingReplacementTarget { replacer: String, target: String },

    #[error("mutator {mutator} failed on {unit}: {message}")]
    Mutator {
        mutator: String,
        unit: String,
        message: String,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("failed to fingerprint resolved graph: {0}")]
    Fingerprint(String),

    #[error("graph error: {0}")]
    Graph(GraphError),

    #[error("{} unit error(s) after {mutator}:\n{}", .errors.len(), format_unit_errors(.errors))]
    UnitErrors {
        mutator: String,
        errors: Vec<UnitError>,
    },
}

impl From<GraphError> for PipelineError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::CycleDetected(at) => PipelineError::DependencyCycle(at),
            GraphError::DuplicateUnit(name) => PipelineError::DuplicateUnit(name),
            other => PipelineError::Graph(other),
        }
    }
}

fn format_unit_errors(errors: &[UnitError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// What went wrong inside a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitErrorKind {
    /// A unit created by the module factory could not take its inherited
    /// or supplied properties.
    PropertyMerge(PropertyError),
    /// Appending or prepending configuration values failed for one field.
    ConfigurationValidation(PropertyError),
    /// Reported by a mutator about one of the unit's properties.
    Property { property: String, message: String },
}

impl fmt::Display for UnitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitErrorKind::PropertyMerge(err) => write!(f, "property merge: {err}"),
            UnitErrorKind::ConfigurationValidation(err) => {
                write!(f, "configuration validation: {err}")
            }
            UnitErrorKind::Property { property, message } => write!(f, "{property}: {message}"),
        }
    }
}

/// A unit-local error, reported after the pass that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{unit} ({mutator}): {kind}")]
pub struct UnitError {
    pub unit: String,
    pub mutator: String,
    pub kind: UnitErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_maps_to_dependency_cycle() {
        let err: PipelineError = GraphError::CycleDetected("lib#arm".into()).into();
        assert!(matches!(err, PipelineError::DependencyCycle(ref at) if at == "lib#arm"));
        let err: PipelineError = GraphError::DuplicateUnit("lib".into()).into();
        assert!(matches!(err, PipelineError::DuplicateUnit(_)));
    }

    #[test]
    fn unit_errors_list_every_unit() {
        let err = PipelineError::UnitErrors {
            mutator: "defaults".into(),
            errors: vec![
                UnitError {
                    unit: "a".into(),
                    mutator: "defaults".into(),
                    kind: UnitErrorKind::Property {
                        property: "srcs".into(),
                        message: "empty".into(),
                    },
                },
                UnitError {
                    unit: "b".into(),
                    mutator: "defaults".into(),
                    kind: UnitErrorKind::ConfigurationValidation(PropertyError::MissingProperty {
                        property: "cflags".into(),
                    }),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 unit error(s) after defaults"));
        assert!(text.contains("a (defaults): srcs: empty"));
        assert!(text.contains("b (defaults): configuration validation: cflags"));
    }
}
