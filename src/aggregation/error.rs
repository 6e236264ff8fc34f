//! Aggregation error types
//!
//! Defines all errors that can occur while building, updating, merging or
//! decoding a time aggregator.

use crate::aggregation::unit::{Unit, UnitSet};
use thiserror::Error;

/// Errors that can occur in the aggregation layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Units were not given from coarsest to finest
    #[error("Invalid order of time units: units must go from coarsest to finest")]
    InvalidUnitOrder,

    /// No units were given at all
    #[error("At least one time unit is required")]
    NoUnits,

    /// The finest unit has no bounded array representation
    #[error("Unit {0} cannot be the finest unit of an aggregator")]
    UnboundedFinestUnit(Unit),

    /// The unit combination does not fit in a 64-bit period key
    #[error("Unit combination {0} does not fit in a 64-bit period key")]
    KeyTooWide(UnitSet),

    /// A calendar component falls outside the digits reserved for its unit
    #[error("Value {value} of unit {unit} is out of range")]
    ComponentOutOfRange {
        /// Unit whose component overflowed
        unit: Unit,
        /// Extracted value
        value: i64,
    },

    /// Merge attempted between aggregators with different units
    #[error("Units mismatch: expected {expected}, found {found}")]
    UnitsMismatch {
        /// Units of the receiving aggregator
        expected: UnitSet,
        /// Units of the merged aggregator
        found: UnitSet,
    },

    /// Period key does not decode back to the format-version seed
    #[error("Malformed period: {0}")]
    MalformedPeriod(u64),

    /// Unit flag or flag combination not present in the catalog
    #[error("Unknown unit flag: {0}")]
    UnknownUnit(i64),

    /// Binary buffer does not start with the expected signature
    #[error("Signature mismatch: expected \"TA\", found {0:?}")]
    SignatureMismatch(Vec<u8>),

    /// Header kind is not the finest unit of the header flags
    #[error("Header mismatch: kind {kind} is not the finest unit of {flags}")]
    HeaderMismatch {
        /// Finest unit stored in the header
        kind: Unit,
        /// Unit flags stored in the header
        flags: UnitSet,
    },

    /// The same period appears twice in one buffer
    #[error("Duplicate period in stream: {0}")]
    DuplicatePeriod(u64),

    /// Buffer ended in the middle of a record
    #[error("Truncated stream: needed {needed} bytes, {available} available")]
    TruncatedStream {
        /// Bytes required to complete the record
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },
}

/// Result type alias for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AggregationError::InvalidUnitOrder;
        assert_eq!(
            err.to_string(),
            "Invalid order of time units: units must go from coarsest to finest"
        );

        let err = AggregationError::UnitsMismatch {
            expected: UnitSet::from_units(&[Unit::Year, Unit::Month]),
            found: UnitSet::from_units(&[Unit::Year, Unit::Hour]),
        };
        assert_eq!(
            err.to_string(),
            "Units mismatch: expected year|month, found year|hour"
        );

        let err = AggregationError::SignatureMismatch(b"XY".to_vec());
        assert_eq!(
            err.to_string(),
            "Signature mismatch: expected \"TA\", found [88, 89]"
        );
    }
}
