//! Time aggregator
//!
//! The [`TimeAggregator`] owns a sparse map from [`Period`] keys to dense
//! [`Aggregator`] arrays:
//! - Write path: date → Period::pack → Aggregator (created on first use) → counter
//! - Read path: date → Period::pack → Aggregator lookup → counter
//!
//! The aggregator is a plain value with no internal locking. Mutation goes
//! through `&mut self`; wrap it in a lock to share it between writers.

use crate::aggregation::codec::{self, Encoding, Header};
use crate::aggregation::counter::Aggregator;
use crate::aggregation::error::{AggregationError, AggregationResult};
use crate::aggregation::period::Period;
use crate::aggregation::unit::{Unit, UnitSet};
use chrono::{Datelike, Timelike};
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fmt;

/// Counters grouped by calendar periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeAggregator {
    /// Finest configured unit, indexes every aggregator
    kind: Unit,
    /// Every configured unit, finest included
    flags: UnitSet,
    /// Counters per period
    values: HashMap<Period, Aggregator>,
}

impl TimeAggregator {
    /// Create an empty aggregator for `units`, listed from coarsest to finest
    ///
    /// The last unit is the finest one and indexes the counter arrays; the
    /// others group counters into periods. `[Year, Month, Hour]` keeps 24
    /// hourly counters per calendar month.
    pub fn new(units: &[Unit]) -> AggregationResult<Self> {
        let kind = *units.last().ok_or(AggregationError::NoUnits)?;

        if units.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(AggregationError::InvalidUnitOrder);
        }

        Self::with_units(kind, UnitSet::from_units(units))
    }

    fn with_units(kind: Unit, flags: UnitSet) -> AggregationResult<Self> {
        if kind.definition().size.is_none() {
            return Err(AggregationError::UnboundedFinestUnit(kind));
        }
        Period::check_capacity(flags)?;

        Ok(Self {
            kind,
            flags,
            values: HashMap::new(),
        })
    }

    /// Finest configured unit
    pub fn kind(&self) -> Unit {
        self.kind
    }

    /// Every configured unit
    pub fn flags(&self) -> UnitSet {
        self.flags
    }

    /// Configured units, coarsest first
    pub fn units(&self) -> Vec<Unit> {
        self.flags.iter().collect()
    }

    /// Number of periods with an aggregator
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Aggregator of one period
    pub fn aggregator(&self, period: Period) -> Option<&Aggregator> {
        self.values.get(&period)
    }

    /// All periods and their aggregators, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (Period, &Aggregator)> {
        self.values.iter().map(|(period, aggregator)| (*period, aggregator))
    }

    /// All periods in ascending key order
    pub fn periods(&self) -> Vec<Period> {
        let mut periods: Vec<Period> = self.values.keys().copied().collect();
        periods.sort_unstable();
        periods
    }

    /// Add `delta` to the counter `date` falls in
    pub fn add<D: Datelike + Timelike>(&mut self, date: &D, delta: i64) -> AggregationResult<()> {
        let period = Period::pack(self.flags, date)?;

        let aggregator = match self.values.entry(period) {
            MapEntry::Occupied(entry) => entry.into_mut(),
            MapEntry::Vacant(entry) => {
                tracing::trace!(period = period.raw(), kind = %self.kind, "new period");
                entry.insert(Aggregator::new(self.kind)?)
            }
        };

        aggregator.add(date, delta);
        Ok(())
    }

    /// Counter `date` falls in
    ///
    /// Returns `None` when nothing was ever added to the period `date` belongs
    /// to, and `Some(0)` when data exists but nets to zero.
    pub fn get<D: Datelike + Timelike>(&self, date: &D) -> Option<i64> {
        let period = Period::pack(self.flags, date).ok()?;
        self.values.get(&period).map(|aggregator| aggregator.get(date))
    }

    /// Add every counter of `other` into this aggregator
    ///
    /// Periods missing here are copied, so later changes to `other` never show
    /// up in `self`. Fails without modifying anything if the units differ.
    pub fn sum(&mut self, other: &TimeAggregator) -> AggregationResult<()> {
        self.check_units(other)?;

        for (period, aggregator) in &other.values {
            match self.values.entry(*period) {
                MapEntry::Occupied(mut entry) => entry.get_mut().sum(aggregator),
                MapEntry::Vacant(entry) => {
                    entry.insert(aggregator.clone());
                }
            }
        }

        Ok(())
    }

    /// Like [`sum`](Self::sum), but takes ownership of `other` and moves its
    /// aggregators instead of copying them
    pub fn merge(&mut self, other: TimeAggregator) -> AggregationResult<()> {
        self.check_units(&other)?;

        for (period, aggregator) in other.values {
            match self.values.entry(period) {
                MapEntry::Occupied(mut entry) => entry.get_mut().sum(&aggregator),
                MapEntry::Vacant(entry) => {
                    entry.insert(aggregator);
                }
            }
        }

        Ok(())
    }

    fn check_units(&self, other: &TimeAggregator) -> AggregationResult<()> {
        if self.flags != other.flags {
            return Err(AggregationError::UnitsMismatch {
                expected: self.flags,
                found: other.flags,
            });
        }
        Ok(())
    }

    /// Serialize header and every period to the binary format
    pub fn marshal(&self) -> Vec<u8> {
        let record_len = codec::PERIOD_SIZE + self.kind.definition().size.unwrap_or(0) * 8;
        let mut buf = Vec::with_capacity(codec::HEADER_SIZE + self.values.len() * record_len);

        buf.extend_from_slice(&Header::new(self.kind, self.flags).to_bytes());
        for (period, aggregator) in &self.values {
            codec::write_record(&mut buf, *period, aggregator);
        }

        tracing::debug!(periods = self.values.len(), bytes = buf.len(), "marshaled aggregator");
        buf
    }

    /// Replace units and counters with the ones decoded from `bytes`
    ///
    /// On error `self` is left untouched.
    pub fn unmarshal(&mut self, bytes: &[u8]) -> AggregationResult<()> {
        *self = Self::from_bytes(bytes)?;
        Ok(())
    }

    /// Decode an aggregator from the binary format
    ///
    /// Accepts buffers with a header as well as header-less buffers, whose
    /// units are taken from the first period.
    ///
    /// A header-less buffer whose first period happens to start with the
    /// signature bytes is retried without a header when header decoding fails.
    pub fn from_bytes(bytes: &[u8]) -> AggregationResult<Self> {
        let aggregator = match Encoding::detect(bytes)? {
            Encoding::Header => match Self::decode(bytes, Encoding::Header) {
                Err(err) if codec::is_legacy(bytes) => {
                    tracing::debug!(error = %err, "header decoding failed, retrying without header");
                    Self::decode(bytes, Encoding::Legacy).map_err(|_| err)?
                }
                result => result?,
            },
            Encoding::Legacy => Self::decode(bytes, Encoding::Legacy)?,
        };

        tracing::debug!(
            periods = aggregator.values.len(),
            bytes = bytes.len(),
            "unmarshaled aggregator"
        );
        Ok(aggregator)
    }

    fn decode(bytes: &[u8], encoding: Encoding) -> AggregationResult<Self> {
        let mut input = bytes;

        let (mut decoded, fallback_kind) = match encoding {
            Encoding::Header => {
                let header = Header::read(&mut input)?;
                match header.units()? {
                    Some((kind, flags)) => (Some(Self::with_units(kind, flags)?), None),
                    None => {
                        tracing::warn!("aggregator header has no unit flags, using first period");
                        (None, Some(header.kind))
                    }
                }
            }
            Encoding::Legacy => {
                tracing::warn!("decoding header-less aggregator");
                (None, None)
            }
        };

        while let Some(period) = codec::read_period(&mut input)? {
            let aggregator = match decoded.as_mut() {
                Some(aggregator) => aggregator,
                None => {
                    let flags = period.units()?;
                    let kind = period.finest()?;
                    decoded.insert(Self::with_units(kind, flags)?)
                }
            };

            if period.units()? != aggregator.flags {
                return Err(AggregationError::MalformedPeriod(period.raw()));
            }
            period.unpack()?;

            let counters = Aggregator::deserialize(&mut input, aggregator.kind)?;
            if aggregator.values.insert(period, counters).is_some() {
                return Err(AggregationError::DuplicatePeriod(period.raw()));
            }
        }

        match decoded {
            Some(aggregator) => Ok(aggregator),
            None => {
                // header without flags and without records: the kind is all we have
                let kind = Unit::from_flag(fallback_kind.unwrap_or(0))?;
                Self::with_units(kind, UnitSet::from_units(&[kind]))
            }
        }
    }
}

impl fmt::Display for TimeAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for period in self.periods() {
            if let Some(aggregator) = self.values.get(&period) {
                let total: i64 = aggregator.values().iter().sum();
                let used = aggregator.non_zero().count();
                writeln!(f, "{}\t{} across {} {}s", period, total, used, self.kind)?;
            }
        }
        Ok(())
    }
}
