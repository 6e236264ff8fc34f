//! Calendar units and their encoding metadata
//!
//! Every [`Unit`] is a distinct power-of-two flag, so a combination of units is
//! a bitmask ([`UnitSet`]). The flag value also fixes the coarse-to-fine order
//! used when packing and unpacking period keys.
//!
//! | unit    | flag | size | pad   | zero based |
//! |---------|------|------|-------|------------|
//! | year    | 1    | -    | 10^4  | no         |
//! | month   | 2    | 12   | 10^2  | yes        |
//! | week    | 4    | 53   | 10^2  | yes        |
//! | day     | 8    | 31   | 10^3  | yes        |
//! | yearday | 16   | 367  | 10^3  | yes        |
//! | weekday | 32   | 7    | 10^1  | no         |
//! | hour    | 64   | 24   | 10^2  | no         |
//! | minute  | 128  | 60   | 10^2  | no         |
//! | second  | 256  | 60   | 10^2  | no         |

use crate::aggregation::error::{AggregationError, AggregationResult};
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar granularity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum Unit {
    /// Calendar year
    Year = 1,
    /// Month of the year
    Month = 2,
    /// ISO week of the year
    Week = 4,
    /// Day of the month
    Day = 8,
    /// Day of the year
    YearDay = 16,
    /// Day of the week, Sunday first
    Weekday = 32,
    /// Hour of the day
    Hour = 64,
    /// Minute of the hour
    Minute = 128,
    /// Second of the minute
    Second = 256,
}

/// Encoding metadata for one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDefinition {
    /// Unit this definition describes
    pub unit: Unit,
    /// Counter array length, `None` for units that are never array-indexed
    pub size: Option<usize>,
    /// Decimal width reserved for the unit inside a period key
    pub pad: u64,
    /// Lowercase name used in component maps
    pub name: &'static str,
    /// Extracted values start at 1 and are shifted down before indexing
    pub zero_based: bool,
}

const DEFINITIONS: [UnitDefinition; 9] = [
    UnitDefinition {
        unit: Unit::Year,
        size: None,
        pad: 10_000,
        name: "year",
        zero_based: false,
    },
    UnitDefinition {
        unit: Unit::Month,
        size: Some(12),
        pad: 100,
        name: "month",
        zero_based: true,
    },
    UnitDefinition {
        unit: Unit::Week,
        size: Some(53),
        pad: 100,
        name: "week",
        zero_based: true,
    },
    UnitDefinition {
        unit: Unit::Day,
        size: Some(31),
        pad: 1_000,
        name: "day",
        zero_based: true,
    },
    UnitDefinition {
        unit: Unit::YearDay,
        size: Some(367),
        pad: 1_000,
        name: "yearday",
        zero_based: true,
    },
    UnitDefinition {
        unit: Unit::Weekday,
        size: Some(7),
        pad: 10,
        name: "weekday",
        zero_based: false,
    },
    UnitDefinition {
        unit: Unit::Hour,
        size: Some(24),
        pad: 100,
        name: "hour",
        zero_based: false,
    },
    UnitDefinition {
        unit: Unit::Minute,
        size: Some(60),
        pad: 100,
        name: "minute",
        zero_based: false,
    },
    UnitDefinition {
        unit: Unit::Second,
        size: Some(60),
        pad: 100,
        name: "second",
        zero_based: false,
    },
];

impl Unit {
    /// All units, coarsest first
    pub const ALL: [Unit; 9] = [
        Unit::Year,
        Unit::Month,
        Unit::Week,
        Unit::Day,
        Unit::YearDay,
        Unit::Weekday,
        Unit::Hour,
        Unit::Minute,
        Unit::Second,
    ];

    /// Get all units in canonical coarse-to-fine order
    pub fn all() -> &'static [Unit] {
        &Self::ALL
    }

    /// Flag value of this unit
    pub fn flag(self) -> u16 {
        self as u16
    }

    /// Look up a unit by its flag value
    pub fn from_flag(flag: i64) -> AggregationResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|unit| i64::from(unit.flag()) == flag)
            .ok_or(AggregationError::UnknownUnit(flag))
    }

    /// Encoding metadata for this unit
    pub fn definition(self) -> &'static UnitDefinition {
        // flags are consecutive powers of two, so the bit position is the table slot
        &DEFINITIONS[self.flag().trailing_zeros() as usize]
    }

    /// Name used in component maps and configuration
    pub fn name(self) -> &'static str {
        self.definition().name
    }

    /// Extract this unit's component from a calendar date
    pub fn extract<D: Datelike + Timelike>(self, date: &D) -> i64 {
        match self {
            Unit::Year => i64::from(date.year()),
            Unit::Month => i64::from(date.month()),
            Unit::Week => i64::from(date.iso_week().week()),
            Unit::Day => i64::from(date.day()),
            Unit::YearDay => i64::from(date.ordinal()),
            Unit::Weekday => i64::from(date.weekday().num_days_from_sunday()),
            Unit::Hour => i64::from(date.hour()),
            Unit::Minute => i64::from(date.minute()),
            Unit::Second => i64::from(date.second()),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|unit| unit.name() == needle)
            .ok_or_else(|| format!("unknown time unit: {}", s))
    }
}

/// A set of units, stored as the bitwise OR of their flags
///
/// Iteration always yields units coarsest first, which is the order period
/// keys are packed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UnitSet(u16);

impl UnitSet {
    /// Mask covering every known flag
    const ALL_BITS: u16 = 0x1FF;

    /// The empty set
    pub const EMPTY: UnitSet = UnitSet(0);

    /// Build a set from a list of units
    pub fn from_units(units: &[Unit]) -> Self {
        units.iter().copied().collect()
    }

    /// Build a set from a raw bitmask, rejecting unknown bits
    pub fn from_bits(bits: u64) -> AggregationResult<Self> {
        if bits & !u64::from(Self::ALL_BITS) != 0 {
            return Err(AggregationError::UnknownUnit(bits as i64));
        }
        Ok(Self(bits as u16))
    }

    /// Raw bitmask
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Check whether a unit is in the set
    pub fn contains(self, unit: Unit) -> bool {
        self.0 & unit.flag() != 0
    }

    /// Add a unit to the set
    pub fn insert(&mut self, unit: Unit) {
        self.0 |= unit.flag();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the units in the set, coarsest first
    pub fn iter(self) -> impl DoubleEndedIterator<Item = Unit> {
        Unit::ALL.into_iter().filter(move |unit| self.contains(*unit))
    }

    /// The finest unit in the set
    pub fn finest(self) -> Option<Unit> {
        self.iter().next_back()
    }

    /// Units in the set except the finest one, coarsest first
    pub fn grouping(self) -> impl DoubleEndedIterator<Item = Unit> {
        let finest = self.finest();
        self.iter().filter(move |unit| Some(*unit) != finest)
    }
}

impl FromIterator<Unit> for UnitSet {
    fn from_iter<I: IntoIterator<Item = Unit>>(iter: I) -> Self {
        let mut set = UnitSet::EMPTY;
        for unit in iter {
            set.insert(unit);
        }
        set
    }
}

impl fmt::Display for UnitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Unit::name).collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_definitions_match_units() {
        for unit in Unit::all() {
            let def = unit.definition();
            assert_eq!(def.unit, *unit);
            assert!(unit.flag().is_power_of_two());
        }
        assert_eq!(Unit::YearDay.definition().size, Some(367));
        assert_eq!(Unit::Year.definition().size, None);
    }

    #[test]
    fn test_pad_exceeds_largest_component() {
        for unit in Unit::all() {
            let def = unit.definition();
            assert_eq!(10u64.pow(def.pad.ilog10()), def.pad);
            if let Some(size) = def.size {
                let largest = (if def.zero_based { size } else { size - 1 }) as u64;
                assert!(def.pad > largest, "pad too narrow for {}", unit);
            }
        }
    }

    #[test]
    fn test_canonical_order_follows_flags() {
        let flags: Vec<u16> = Unit::all().iter().map(|u| u.flag()).collect();
        let mut sorted = flags.clone();
        sorted.sort_unstable();
        assert_eq!(flags, sorted);
        assert!(Unit::Year < Unit::Month && Unit::Minute < Unit::Second);
    }

    #[test]
    fn test_from_flag() {
        assert_eq!(Unit::from_flag(64).unwrap(), Unit::Hour);
        assert_eq!(
            Unit::from_flag(3),
            Err(AggregationError::UnknownUnit(3))
        );
    }

    #[test]
    fn test_extract() {
        // Sunday
        let date = Utc.with_ymd_and_hms(2015, 11, 1, 23, 1, 2).unwrap();
        assert_eq!(Unit::Year.extract(&date), 2015);
        assert_eq!(Unit::Month.extract(&date), 11);
        assert_eq!(Unit::Week.extract(&date), 44);
        assert_eq!(Unit::Day.extract(&date), 1);
        assert_eq!(Unit::YearDay.extract(&date), 305);
        assert_eq!(Unit::Weekday.extract(&date), 0);
        assert_eq!(Unit::Hour.extract(&date), 23);
        assert_eq!(Unit::Minute.extract(&date), 1);
        assert_eq!(Unit::Second.extract(&date), 2);
    }

    #[test]
    fn test_unit_parse_and_display() {
        assert_eq!("YearDay".parse::<Unit>().unwrap(), Unit::YearDay);
        assert_eq!(" hour ".parse::<Unit>().unwrap(), Unit::Hour);
        assert!("fortnight".parse::<Unit>().is_err());
        assert_eq!(Unit::Weekday.to_string(), "weekday");
    }

    #[test]
    fn test_unit_set_iterates_coarse_to_fine() {
        let set: UnitSet = [Unit::Hour, Unit::Year, Unit::Month].into_iter().collect();
        assert_eq!(set.bits(), 67);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Unit::Year, Unit::Month, Unit::Hour]
        );
        assert_eq!(set.finest(), Some(Unit::Hour));
        assert_eq!(
            set.grouping().collect::<Vec<_>>(),
            vec![Unit::Year, Unit::Month]
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_string(), "year|month|hour");
    }

    #[test]
    fn test_unit_set_from_bits() {
        assert_eq!(UnitSet::from_bits(65).unwrap(), UnitSet::from_units(&[Unit::Year, Unit::Hour]));
        assert!(UnitSet::from_bits(512).is_err());
        assert!(UnitSet::from_bits(0).unwrap().is_empty());
        assert_eq!(UnitSet::EMPTY.finest(), None);
        assert_eq!(UnitSet::EMPTY.to_string(), "none");
    }
}
