//! Flattened views of an aggregator

use crate::aggregation::engine::TimeAggregator;
use crate::aggregation::error::AggregationResult;
use crate::aggregation::period::Components;
use serde::Serialize;

/// One non-zero counter with the full set of components it belongs to
///
/// The components include the finest unit, numbered the natural way
/// (months and days start at 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub period: Components,
    pub value: i64,
}

/// Grouping components of one period and its raw counter array
///
/// Serializes as a two-element array, `[{"year": 2015}, [0, 0, ...]]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodSnapshot(pub Components, pub Vec<i64>);

impl TimeAggregator {
    /// Every non-zero counter, periods in ascending key order
    pub fn entries(&self) -> AggregationResult<Vec<Entry>> {
        let kind = self.kind();
        let mut entries = Vec::new();

        for period in self.periods() {
            let Some(aggregator) = self.aggregator(period) else {
                continue;
            };
            let components = period.to_map()?;

            for (component, value) in aggregator.non_zero() {
                let mut full = components.clone();
                full.insert(kind.name(), component);
                entries.push(Entry {
                    period: full,
                    value,
                });
            }
        }

        Ok(entries)
    }

    /// Components and raw counters of every period, in ascending key order
    pub fn export(&self) -> AggregationResult<Vec<PeriodSnapshot>> {
        self.periods()
            .into_iter()
            .filter_map(|period| self.aggregator(period).map(|agg| (period, agg)))
            .map(|(period, aggregator)| {
                Ok(PeriodSnapshot(period.to_map()?, aggregator.values().to_vec()))
            })
            .collect()
    }
}
