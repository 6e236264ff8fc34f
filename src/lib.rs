//! # Tally
//!
//! Calendar-bucketed counters with a compact binary format.
//!
//! ## Features
//!
//! - **Period grouping**: counters keyed by any coarse-to-fine combination of
//!   calendar units (year, month, ISO week, day, hour, ...)
//! - **Dense counters**: one signed counter per value of the finest unit
//! - **Merging**: sum aggregators built from disjoint streams
//! - **Binary format**: little-endian, self-describing header, reads buffers
//!   written without one
//!
//! ## Modules
//!
//! - [`aggregation`]: Units, period keys and the time aggregator
//! - [`config`]: TOML configuration with environment overrides
//! - [`logging`]: Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use tally::{TimeAggregator, Unit};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut visits = TimeAggregator::new(&[Unit::Year, Unit::Hour])?;
//!
//! let now = Utc::now();
//! visits.add(&now, 1)?;
//! visits.add(&now, 1)?;
//!
//! assert_eq!(visits.get(&now), Some(2));
//! for entry in visits.entries()? {
//!     println!("{:?} = {}", entry.period, entry.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod config;
pub mod logging;

// Re-export top-level types for convenience
pub use aggregation::{
    AggregationError, AggregationResult, Aggregator, Entry, Period, PeriodSnapshot,
    TimeAggregator, Unit, UnitSet,
};

pub use config::{AggregatorConfig, Config, ConfigError, LoggingConfig};
