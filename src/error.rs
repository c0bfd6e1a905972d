use thiserror::Error;

use crate::address::Address;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenError {
    #[error("No choice at address {0}")]
    AddressNotFound(Address),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Choice at {address} is {found}, expected {expected}")]
    TypeMismatch {
        address: Address,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Address {0} would be both a leaf and a prefix")]
    AddressConflict(Address),
    #[error("Address {0} was sampled more than once in one execution")]
    DuplicateAddress(Address),
    #[error("Constraint at {0} was never visited by the model")]
    UnvisitedConstraint(Address),
}

pub type Result<T> = std::result::Result<T, GenError>;

/// Fail with `DimensionMismatch` unless the two lengths agree.
pub fn ensure_len(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(GenError::DimensionMismatch { expected, found })
    }
}
