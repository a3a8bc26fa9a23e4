//! Structured errors for the conversion passes.
//!
//! Most code in this crate returns [anyhow::Result]. The variants below are
//! the failures that callers may want to tell apart, for example to report an
//! unsupported input instead of a bug. Use [anyhow::Error::downcast_ref] to
//! get them back out of an [anyhow::Error].

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The input uses a feature that has no lowering yet.
    #[error("unsupported feature in '{op}': {feature}")]
    UnsupportedFeature { op: String, feature: String },

    /// An operation was left in a dialect that the conversion target forbids.
    #[error("failed to legalize operation '{op}'{}", display_remarks(.remarks))]
    IllegalOperation { op: String, remarks: Vec<String> },

    /// A symbol reference could not be resolved.
    #[error("unresolved symbol reference '{0}'")]
    UnresolvedSymbol(String),

    /// The input violates an invariant that an earlier pass should establish.
    #[error("invalid input for '{op}': {reason}")]
    InvalidInput { op: String, reason: String },
}

fn display_remarks(remarks: &[String]) -> String {
    if remarks.is_empty() {
        "".to_string()
    } else {
        format!(": {}", remarks.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_operation_lists_remarks() {
        let err = ConversionError::IllegalOperation {
            op: "arith.constant".to_string(),
            remarks: vec!["unsupported bit width for dialect constant".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "failed to legalize operation 'arith.constant': unsupported bit width for dialect constant"
        );
        let err = ConversionError::IllegalOperation {
            op: "arith.addf".to_string(),
            remarks: vec![],
        };
        assert_eq!(err.to_string(), "failed to legalize operation 'arith.addf'");
    }
}
