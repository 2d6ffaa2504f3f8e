use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssignError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No eligible representatives for scope '{scope}'")]
    NoEligibleReps { scope: String },

    #[error("Infeasible assignment: {diagnostic}")]
    Infeasible { diagnostic: String },

    #[error(
        "Structural violation: child {child_id} on {child_rep} but parent {parent_id} on {parent_rep}"
    )]
    StructuralViolation {
        parent_id:  String,
        child_id:   String,
        parent_rep: String,
        child_rep:  String,
    },

    #[error("Incomplete assignment: {} account(s) unassigned, first {:?}", missing.len(), missing.first())]
    IncompleteAssignment { missing: Vec<String> },

    #[error("Account '{account_id}' assigned more than once")]
    DuplicateAssignment { account_id: String },

    #[error("Balance thresholds computed for scope '{expected}' used with scope '{actual}'")]
    ThresholdScopeMismatch { expected: String, actual: String },

    #[error("Solver {status}: {detail}")]
    Solver { status: String, detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AssignResult<T> = Result<T, AssignError>;
