//! Dense counter arrays
//!
//! An [`Aggregator`] holds one signed counter per value of the finest unit
//! inside a single period, e.g. 24 hourly counters for one `year|month` key.

use crate::aggregation::codec::take;
use crate::aggregation::error::{AggregationError, AggregationResult};
use crate::aggregation::unit::Unit;
use chrono::{Datelike, Timelike};

/// Counters for every value of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregator {
    values: Vec<i64>,
    kind: Unit,
}

impl Aggregator {
    /// Create a zeroed aggregator for `kind`
    pub fn new(kind: Unit) -> AggregationResult<Self> {
        let size = kind
            .definition()
            .size
            .ok_or(AggregationError::UnboundedFinestUnit(kind))?;

        Ok(Self {
            values: vec![0; size],
            kind,
        })
    }

    /// Unit the counters are indexed by
    pub fn kind(&self) -> Unit {
        self.kind
    }

    /// Raw counters, one per value of the unit
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Add `delta` to the counter `date` falls in
    pub fn add<D: Datelike + Timelike>(&mut self, date: &D, delta: i64) {
        let idx = self.index(date);
        self.values[idx] = self.values[idx].wrapping_add(delta);
    }

    /// Counter `date` falls in
    pub fn get<D: Datelike + Timelike>(&self, date: &D) -> i64 {
        self.values[self.index(date)]
    }

    /// Add every counter of `other` into this aggregator
    ///
    /// Both aggregators must be indexed by the same unit.
    pub fn sum(&mut self, other: &Aggregator) {
        debug_assert_eq!(self.kind, other.kind);
        for (value, delta) in self.values.iter_mut().zip(&other.values) {
            *value = value.wrapping_add(*delta);
        }
    }

    /// Non-zero counters as `(component, count)`, component in the unit's
    /// natural numbering (months and days start at 1)
    pub fn non_zero(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        let offset = u64::from(self.kind.definition().zero_based);
        self.values
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != 0)
            .map(move |(idx, value)| (idx as u64 + offset, *value))
    }

    /// Serialized size in bytes
    pub fn encoded_len(&self) -> usize {
        self.values.len() * 8
    }

    /// Serialize the counters as little-endian `i64`s, no length prefix
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf
    }

    /// Append the serialized counters to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for value in &self.values {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Read the counters of a `kind` aggregator from the front of `input`
    ///
    /// Advances `input` past the consumed bytes.
    pub fn deserialize(input: &mut &[u8], kind: Unit) -> AggregationResult<Self> {
        let mut aggregator = Self::new(kind)?;
        let bytes = take(input, aggregator.encoded_len())?;

        for (value, chunk) in aggregator.values.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            *value = i64::from_le_bytes(word);
        }

        Ok(aggregator)
    }

    fn index<D: Datelike + Timelike>(&self, date: &D) -> usize {
        // the catalog guarantees every extracted value lands inside the array
        let def = self.kind.definition();
        let value = self.kind.extract(date);
        if def.zero_based {
            (value - 1) as usize
        } else {
            value as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_new_sizes() {
        assert_eq!(Aggregator::new(Unit::Hour).unwrap().values().len(), 24);
        assert_eq!(Aggregator::new(Unit::YearDay).unwrap().values().len(), 367);
        assert_eq!(
            Aggregator::new(Unit::Year),
            Err(AggregationError::UnboundedFinestUnit(Unit::Year))
        );
    }

    #[test]
    fn test_add_and_get() {
        let mut agg = Aggregator::new(Unit::Hour).unwrap();
        let late = Utc.with_ymd_and_hms(2015, 11, 12, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2015, 11, 12, 0, 0, 0).unwrap();

        agg.add(&late, 10);
        agg.add(&late, 5);
        agg.add(&early, -3);

        assert_eq!(agg.get(&late), 15);
        assert_eq!(agg.get(&early), -3);
        assert_eq!(agg.values()[23], 15);
        assert_eq!(agg.values()[0], -3);
    }

    #[test]
    fn test_zero_based_units_use_every_slot() {
        let mut months = Aggregator::new(Unit::Month).unwrap();
        let december = Utc.with_ymd_and_hms(2015, 12, 1, 0, 0, 0).unwrap();
        let january = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        months.add(&december, 1);
        months.add(&january, 2);
        assert_eq!(months.values()[11], 1);
        assert_eq!(months.values()[0], 2);

        let mut days = Aggregator::new(Unit::Day).unwrap();
        let last = NaiveDate::from_ymd_opt(2015, 1, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        days.add(&last, 7);
        assert_eq!(days.values()[30], 7);

        let mut yeardays = Aggregator::new(Unit::YearDay).unwrap();
        let leap_end = Utc.with_ymd_and_hms(2016, 12, 31, 23, 59, 59).unwrap();
        yeardays.add(&leap_end, 4);
        assert_eq!(yeardays.values()[365], 4);
    }

    #[test]
    fn test_sum() {
        let date = Utc.with_ymd_and_hms(2015, 11, 12, 5, 0, 0).unwrap();
        let mut a = Aggregator::new(Unit::Hour).unwrap();
        let mut b = Aggregator::new(Unit::Hour).unwrap();
        a.add(&date, 1);
        b.add(&date, 2);
        a.sum(&b);
        assert_eq!(a.get(&date), 3);
        assert_eq!(b.get(&date), 2);
    }

    #[test]
    fn test_non_zero_uses_natural_numbering() {
        let mut months = Aggregator::new(Unit::Month).unwrap();
        months.add(&Utc.with_ymd_and_hms(2015, 11, 1, 0, 0, 0).unwrap(), 9);
        assert_eq!(months.non_zero().collect::<Vec<_>>(), vec![(11, 9)]);

        let mut hours = Aggregator::new(Unit::Hour).unwrap();
        hours.add(&Utc.with_ymd_and_hms(2015, 11, 1, 0, 0, 0).unwrap(), 9);
        assert_eq!(hours.non_zero().collect::<Vec<_>>(), vec![(0, 9)]);
    }

    #[test]
    fn test_serialize_layout() {
        let mut agg = Aggregator::new(Unit::Weekday).unwrap();
        // 2015-11-01 is a Sunday
        agg.add(&Utc.with_ymd_and_hms(2015, 11, 1, 0, 0, 0).unwrap(), -2);

        let bytes = agg.serialize();
        assert_eq!(bytes.len(), 7 * 8);
        assert_eq!(&bytes[0..8], &(-2i64).to_le_bytes());
        assert!(bytes[8..].iter().all(|b| *b == 0));

        let mut input = bytes.as_slice();
        let restored = Aggregator::deserialize(&mut input, Unit::Weekday).unwrap();
        assert_eq!(restored, agg);
        assert!(input.is_empty());
    }

    #[test]
    fn test_deserialize_truncated() {
        let bytes = vec![0u8; 23 * 8 + 3];
        let mut input = bytes.as_slice();
        let err = Aggregator::deserialize(&mut input, Unit::Hour).unwrap_err();
        assert_eq!(
            err,
            AggregationError::TruncatedStream {
                needed: 192,
                available: 187
            }
        );
    }
}
