use thiserror::Error;

use crate::catalog::DataError;
use crate::milp::solver::SolveStatus;

/// Model builder invariant violated. Always a programming error.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("objective was never set")]
    ObjectiveUnset,
    #[error("objective already set")]
    ObjectiveAlreadySet,
    #[error("`{0}` variables already created")]
    FamilyAlreadyCreated(&'static str),
    #[error("duplicate constraint name `{0}`")]
    DuplicateConstraint(String),
    /// Variable id and the constraint (or `objective`) referencing it.
    #[error("unknown variable #{0} referenced by `{1}`")]
    UnknownVariable(usize, String),
    #[error("`{0}` variables must be created before constraints")]
    MissingFamily(&'static str),
}

/// Refusal to turn a solver answer into a selection.
#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("solver finished with status {0}, no selection available")]
    NotOptimal(SolveStatus),
    #[error("solver returned no value for variable `{0}`")]
    MissingValue(String),
    #[error("solver returned a fractional value for integer variable `{0}`")]
    NonIntegral(String),
    #[error("solver assignment violates constraint `{0}`")]
    ConstraintViolated(String),
    /// Family name, entity count of the catalog, variable count of the model.
    #[error("catalog has {1} {0} entities but the model has {2} variables for them")]
    CatalogMismatch(&'static str, usize, usize),
}

/// Any failure of the one-call selection pipeline.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}
