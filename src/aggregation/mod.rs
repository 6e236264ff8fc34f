//! Tally Aggregation Engine
//!
//! This module provides calendar-bucketed counters:
//!
//! - **unit**: Calendar units, their flags and encoding metadata
//! - **period**: Decimal-packed period keys
//! - **counter**: Dense counter arrays for one period
//! - **engine**: The time aggregator tying periods to counters
//! - **entry**: Flattened entry and export views
//! - **codec**: Binary wire format
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   date → Period::pack(grouping units) → Aggregator → counter[finest unit]
//!
//! Wire:
//!   "TA" | kind | flags | (period | counters)*
//! ```
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use tally::aggregation::{TimeAggregator, Unit};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // hourly counters grouped by calendar month
//! let mut agg = TimeAggregator::new(&[Unit::Year, Unit::Month, Unit::Hour])?;
//!
//! let date = Utc.with_ymd_and_hms(2015, 11, 12, 23, 59, 59).unwrap();
//! agg.add(&date, 10)?;
//! assert_eq!(agg.get(&date), Some(10));
//!
//! let restored = TimeAggregator::from_bytes(&agg.marshal())?;
//! assert_eq!(restored, agg);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod counter;
pub mod engine;
pub mod entry;
pub mod error;
pub mod period;
pub mod unit;

// Re-export commonly used types
pub use codec::{Encoding, Header, HEADER_SIZE, SIGNATURE};
pub use counter::Aggregator;
pub use engine::TimeAggregator;
pub use entry::{Entry, PeriodSnapshot};
pub use error::{AggregationError, AggregationResult};
pub use period::{Components, Period, FORMAT_VERSION};
pub use unit::{Unit, UnitDefinition, UnitSet};
