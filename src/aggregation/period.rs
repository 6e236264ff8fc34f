//! Period keys
//!
//! A [`Period`] packs the grouping components of a calendar date into one
//! decimal-structured `u64`:
//!
//! ```text
//!   1 | yyyy | mm | ... | fff
//!   ^   ^             ^   ^
//!   |   grouping units    flags of every unit, finest included
//!   format version
//! ```
//!
//! Each grouping unit occupies as many decimal digits as its `pad` reserves,
//! coarsest first, so ascending key order is chronological order within one
//! unit combination. The finest unit never gets a block of its own: its value
//! is the index into the aggregator's counter array.

use crate::aggregation::error::{AggregationError, AggregationResult};
use crate::aggregation::unit::{Unit, UnitSet};
use chrono::{Datelike, Timelike};
use std::collections::BTreeMap;
use std::fmt;

/// Leading marker of every packed key
pub const FORMAT_VERSION: u64 = 1;

/// Width of the trailing flag suffix (three decimal digits)
const FLAG_MODULUS: u64 = 1_000;

/// Unit name to component value
pub type Components = BTreeMap<&'static str, u64>;

/// A packed period key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period(u64);

impl Period {
    /// Wrap a raw key without validating it
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw key value
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Pack the grouping components of `date` for the given unit combination
    ///
    /// Fails with [`AggregationError::ComponentOutOfRange`] if a component does
    /// not fit in its unit's digits (negative years, years past 9999).
    pub fn pack<D: Datelike + Timelike>(units: UnitSet, date: &D) -> AggregationResult<Self> {
        let mut acc = FORMAT_VERSION;
        for unit in units.grouping() {
            let pad = unit.definition().pad;
            let value = unit.extract(date);
            if value < 0 || value as u64 >= pad {
                return Err(AggregationError::ComponentOutOfRange { unit, value });
            }
            acc = push_digits(acc, pad, value as u64).ok_or(AggregationError::KeyTooWide(units))?;
        }

        push_digits(acc, FLAG_MODULUS, u64::from(units.bits()))
            .map(Self)
            .ok_or(AggregationError::KeyTooWide(units))
    }

    /// Verify that every date packs into a `u64` for this unit combination
    pub fn check_capacity(units: UnitSet) -> AggregationResult<()> {
        let mut acc = FORMAT_VERSION;
        for unit in units.grouping() {
            let pad = unit.definition().pad;
            acc = push_digits(acc, pad, pad - 1).ok_or(AggregationError::KeyTooWide(units))?;
        }
        push_digits(acc, FLAG_MODULUS, FLAG_MODULUS - 1)
            .map(|_| ())
            .ok_or(AggregationError::KeyTooWide(units))
    }

    /// Raw flag suffix, unvalidated
    pub fn flags(self) -> u64 {
        self.0 % FLAG_MODULUS
    }

    /// Units encoded in the flag suffix
    pub fn units(self) -> AggregationResult<UnitSet> {
        match UnitSet::from_bits(self.flags()) {
            Ok(units) if !units.is_empty() => Ok(units),
            _ => Err(AggregationError::MalformedPeriod(self.0)),
        }
    }

    /// Finest unit encoded in the flag suffix
    pub fn finest(self) -> AggregationResult<Unit> {
        self.units()?
            .finest()
            .ok_or(AggregationError::MalformedPeriod(self.0))
    }

    /// Decode the grouping components and the unit flags of this key
    pub fn unpack(self) -> AggregationResult<(Components, UnitSet)> {
        let units = self.units()?;
        let mut rest = self.0 / FLAG_MODULUS;
        let mut components = Components::new();

        for unit in units.grouping().rev() {
            let def = unit.definition();
            components.insert(def.name, rest % def.pad);
            rest /= def.pad;
        }

        if rest != FORMAT_VERSION {
            return Err(AggregationError::MalformedPeriod(self.0));
        }

        Ok((components, units))
    }

    /// Component map of this key, e.g. `{"year": 2015, "month": 11}`
    pub fn to_map(self) -> AggregationResult<Components> {
        self.unpack().map(|(components, _)| components)
    }
}

fn push_digits(acc: u64, pad: u64, value: u64) -> Option<u64> {
    acc.checked_mul(pad)?.checked_add(value)
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unpack() {
            Ok((components, units)) if !components.is_empty() => {
                let parts: Vec<String> = units
                    .grouping()
                    .map(|unit| format!("{}={}", unit.name(), components[unit.name()]))
                    .collect();
                write!(f, "{}", parts.join(" "))
            }
            _ => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn units(list: &[Unit]) -> UnitSet {
        UnitSet::from_units(list)
    }

    #[test]
    fn test_pack_known_key() {
        let date = Utc.with_ymd_and_hms(2015, 11, 12, 23, 59, 59).unwrap();
        let period = Period::pack(units(&[Unit::Year, Unit::Month, Unit::Hour]), &date).unwrap();
        assert_eq!(period.raw(), 1_2015_11_067);
    }

    #[test]
    fn test_unpack_known_key() {
        let (components, flags) = Period::from_raw(1_2015_11_067).unpack().unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components["year"], 2015);
        assert_eq!(components["month"], 11);
        assert_eq!(flags, units(&[Unit::Year, Unit::Month, Unit::Hour]));
    }

    #[test]
    fn test_finest_only_key() {
        let date = Utc.with_ymd_and_hms(2015, 11, 12, 23, 59, 59).unwrap();
        let period = Period::pack(units(&[Unit::Hour]), &date).unwrap();
        assert_eq!(period.raw(), 1_064);
        assert_eq!(period.flags(), 64);
        assert!(period.to_map().unwrap().is_empty());
        assert_eq!(period.finest().unwrap(), Unit::Hour);
    }

    #[test]
    fn test_unpack_rejects_bad_seed() {
        let err = Period::from_raw(2_2015_11_067).unpack().unwrap_err();
        assert_eq!(err, AggregationError::MalformedPeriod(2_2015_11_067));

        // missing flag suffix
        assert!(Period::from_raw(1_2015_11_000).unpack().is_err());
        // unknown bits in the suffix
        assert!(Period::from_raw(1_2015_11_999).unpack().is_err());
    }

    #[test]
    fn test_pack_rejects_out_of_range_year() {
        let date = NaiveDate::from_ymd_opt(10_000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let err = Period::pack(units(&[Unit::Year, Unit::Hour]), &date).unwrap_err();
        assert_eq!(
            err,
            AggregationError::ComponentOutOfRange {
                unit: Unit::Year,
                value: 10_000
            }
        );
    }

    #[test]
    fn test_capacity() {
        assert!(Period::check_capacity(units(&[Unit::Year, Unit::Month, Unit::Day, Unit::Hour, Unit::Minute, Unit::Second])).is_ok());
        let every: UnitSet = Unit::all().iter().copied().collect();
        assert_eq!(
            Period::check_capacity(every),
            Err(AggregationError::KeyTooWide(every))
        );
    }

    #[test]
    fn test_roundtrip_across_dates_and_combinations() {
        let combinations = [
            vec![Unit::Year, Unit::Month, Unit::Hour],
            vec![Unit::Year, Unit::Week, Unit::Weekday],
            vec![Unit::Month, Unit::Day, Unit::Minute],
            vec![Unit::Year, Unit::YearDay, Unit::Hour, Unit::Second],
            vec![Unit::Year, Unit::Month, Unit::Day, Unit::Hour, Unit::Minute, Unit::Second],
        ];
        let start = Utc.with_ymd_and_hms(2011, 12, 25, 0, 0, 0).unwrap();

        for list in &combinations {
            let set = units(list);
            for step in 0..500 {
                let date = start + Duration::minutes(step * 1_237);
                let (components, flags) = Period::pack(set, &date).unwrap().unpack().unwrap();
                assert_eq!(flags, set);
                assert_eq!(components.len(), list.len() - 1);
                for unit in set.grouping() {
                    assert_eq!(components[unit.name()] as i64, unit.extract(&date));
                }
            }
        }
    }

    #[test]
    fn test_distinct_combinations_never_collide() {
        let date = Utc.with_ymd_and_hms(2015, 1, 1, 1, 1, 1).unwrap();
        let a = Period::pack(units(&[Unit::Year, Unit::Month]), &date).unwrap();
        let b = Period::pack(units(&[Unit::Year, Unit::Hour]), &date).unwrap();
        let c = Period::pack(units(&[Unit::Year, Unit::Day]), &date).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_key_order_is_chronological() {
        let set = units(&[Unit::Year, Unit::Month, Unit::Hour]);
        let earlier = Utc.with_ymd_and_hms(2014, 12, 31, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        assert!(Period::pack(set, &earlier).unwrap() < Period::pack(set, &later).unwrap());
    }

    #[test]
    fn test_display() {
        assert_eq!(Period::from_raw(1_2015_11_067).to_string(), "year=2015 month=11");
        assert_eq!(Period::from_raw(42).to_string(), "42");
    }
}
