//! Structural and type checks run before a graph is executed.
//!
//! Validation never mutates the graph and always accumulates every problem
//! rather than stopping at the first one.

pub mod validator;

pub use validator::GraphValidator;

use crate::error::FlowError;
use serde::{Deserialize, Serialize};

/// Outcome of validating a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub(crate) fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Whether any error mentions a cycle.
    pub fn has_cycle(&self) -> bool {
        self.errors.iter().any(|e| e.starts_with("Cycle detected"))
    }

    /// Convert into a `Result`, carrying the full error list on failure.
    pub fn into_result(self) -> Result<Vec<String>, FlowError> {
        if self.valid {
            Ok(self.warnings)
        } else {
            Err(FlowError::Validation(self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_flag_follows_errors() {
        assert!(ValidationResult::from_findings(vec![], vec!["w".into()]).valid);
        assert!(!ValidationResult::from_findings(vec!["e".into()], vec![]).valid);
    }

    #[test]
    fn test_into_result() {
        let ok = ValidationResult::from_findings(vec![], vec!["w".into()]);
        assert_eq!(ok.into_result().unwrap(), vec!["w".to_string()]);

        let bad = ValidationResult::from_findings(vec!["Cycle detected: A -> A".into()], vec![]);
        assert!(bad.has_cycle());
        assert!(matches!(bad.into_result(), Err(FlowError::Validation(errs)) if errs.len() == 1));
    }
}
