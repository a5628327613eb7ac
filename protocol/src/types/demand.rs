//! Buyer demands.
//!
//! A demand is either a list of record ranges or a list of values looked
//! up in one key column. OT variants wrap a demand in a phantom superset so
//! the seller only ever sees the superset.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{MAX_KEYWORD_LENGTH, MAX_QUERY_ITEMS};
use crate::error::PodError;

/// `count` consecutive records starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: u64,
    pub count: u64,
}

impl Range {
    pub const fn new(start: u64, count: u64) -> Self {
        Self { start, count }
    }

    /// One past the last record, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.count)
    }

    /// Record indices covered by this range. Empty on overflow.
    pub fn indices(&self) -> std::ops::Range<u64> {
        self.start..self.end().unwrap_or(self.start)
    }
}

/// A validated, non-empty list of ranges.
///
/// Order is preserved: decrypted output follows it. Overlap is allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSet {
    ranges: Vec<Range>,
}

impl RangeSet {
    /// Validate `ranges`: at least one range, every count positive, no
    /// overflow, and at most [`MAX_QUERY_ITEMS`] records in total.
    pub fn new(ranges: Vec<Range>) -> Result<Self, PodError> {
        if ranges.is_empty() {
            return Err(demand_error("range set is empty"));
        }
        let mut total: u64 = 0;
        for range in &ranges {
            if range.count == 0 {
                return Err(demand_error(format!(
                    "range starting at {} has zero count",
                    range.start
                )));
            }
            if range.end().is_none() {
                return Err(demand_error(format!(
                    "range {}+{} overflows",
                    range.start, range.count
                )));
            }
            total = total.saturating_add(range.count);
        }
        if total > MAX_QUERY_ITEMS as u64 {
            return Err(demand_error(format!(
                "{total} records demanded, limit is {MAX_QUERY_ITEMS}"
            )));
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Total number of records addressed, counting overlaps twice.
    pub fn total(&self) -> u64 {
        self.ranges.iter().map(|r| r.count).sum()
    }

    /// Distinct record indices addressed, ascending.
    pub fn distinct_indices(&self) -> BTreeSet<u64> {
        self.ranges.iter().flat_map(|r| r.indices()).collect()
    }

    /// Whether every record of `range` lies inside some range of this set.
    pub fn covers(&self, range: &Range) -> bool {
        let mut merged: Vec<(u64, u64)> = self
            .ranges
            .iter()
            .map(|r| (r.start, r.end().unwrap_or(r.start)))
            .collect();
        merged.sort_unstable();

        let end = match range.end() {
            Some(end) => end,
            None => return false,
        };
        let mut cursor = range.start;
        for (start, stop) in merged {
            if cursor >= end {
                break;
            }
            if start <= cursor && stop > cursor {
                cursor = stop;
            }
        }
        cursor >= end
    }
}

/// A range demand hidden inside a phantom superset (OT range variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhantomRanges {
    demands: RangeSet,
    phantoms: RangeSet,
}

impl PhantomRanges {
    /// Pair a demand with its phantom set. Every demanded record must fall
    /// inside the phantoms.
    pub fn new(demands: RangeSet, phantoms: RangeSet) -> Result<Self, PodError> {
        if let Some(uncovered) = demands.ranges().iter().find(|r| !phantoms.covers(r)) {
            return Err(demand_error(format!(
                "demand {}+{} is not covered by the phantom set",
                uncovered.start, uncovered.count
            )));
        }
        Ok(Self { demands, phantoms })
    }

    pub fn demands(&self) -> &RangeSet {
        &self.demands
    }

    pub fn phantoms(&self) -> &RangeSet {
        &self.phantoms
    }
}

/// Values looked up in a single key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    key_name: String,
    values: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(key_name: impl Into<String>, values: I) -> Result<Self, PodError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key_name = key_name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if key_name.is_empty() {
            return Err(demand_error("key name is empty"));
        }
        if values.is_empty() {
            return Err(demand_error(format!("no values for key {key_name:?}")));
        }
        if values.len() > MAX_QUERY_ITEMS {
            return Err(demand_error(format!(
                "{} values demanded, limit is {MAX_QUERY_ITEMS}",
                values.len()
            )));
        }
        if let Some(long) = values.iter().find(|v| v.len() > MAX_KEYWORD_LENGTH) {
            return Err(demand_error(format!(
                "value of {} bytes exceeds the {MAX_KEYWORD_LENGTH}-byte limit",
                long.len()
            )));
        }
        Ok(Self { key_name, values })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// A keyword demand hidden inside a phantom superset (OT keyword variant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhantomKeywords {
    demands: KeywordSet,
    phantoms: KeywordSet,
}

impl PhantomKeywords {
    pub fn new(demands: KeywordSet, phantoms: KeywordSet) -> Result<Self, PodError> {
        if demands.key_name() != phantoms.key_name() {
            return Err(demand_error(format!(
                "demand key {:?} differs from phantom key {:?}",
                demands.key_name(),
                phantoms.key_name()
            )));
        }
        if let Some(missing) = demands.values().iter().find(|v| !phantoms.contains(v)) {
            return Err(demand_error(format!(
                "demanded value {missing:?} is not in the phantom set"
            )));
        }
        Ok(Self { demands, phantoms })
    }

    pub fn demands(&self) -> &KeywordSet {
        &self.demands
    }

    pub fn phantoms(&self) -> &KeywordSet {
        &self.phantoms
    }
}

/// Everything a buyer session is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ranges(RangeSet),
    PhantomRanges(PhantomRanges),
    Keywords(KeywordSet),
    PhantomKeywords(PhantomKeywords),
}

impl Query {
    pub fn is_keyword(&self) -> bool {
        matches!(self, Query::Keywords(_) | Query::PhantomKeywords(_))
    }

    pub fn has_phantoms(&self) -> bool {
        matches!(self, Query::PhantomRanges(_) | Query::PhantomKeywords(_))
    }

    /// The ranges the buyer actually wants, for range queries.
    pub fn demanded_ranges(&self) -> Option<&RangeSet> {
        match self {
            Query::Ranges(set) => Some(set),
            Query::PhantomRanges(p) => Some(p.demands()),
            _ => None,
        }
    }

    /// The ranges revealed to the seller, for range queries.
    pub fn requested_ranges(&self) -> Option<&RangeSet> {
        match self {
            Query::Ranges(set) => Some(set),
            Query::PhantomRanges(p) => Some(p.phantoms()),
            _ => None,
        }
    }

    /// The keywords the buyer actually wants, for keyword queries.
    pub fn demanded_keywords(&self) -> Option<&KeywordSet> {
        match self {
            Query::Keywords(set) => Some(set),
            Query::PhantomKeywords(p) => Some(p.demands()),
            _ => None,
        }
    }

    /// The keywords revealed to the seller, for keyword queries.
    pub fn requested_keywords(&self) -> Option<&KeywordSet> {
        match self {
            Query::Keywords(set) => Some(set),
            Query::PhantomKeywords(p) => Some(p.phantoms()),
            _ => None,
        }
    }
}

impl From<RangeSet> for Query {
    fn from(set: RangeSet) -> Self {
        Query::Ranges(set)
    }
}

impl From<PhantomRanges> for Query {
    fn from(set: PhantomRanges) -> Self {
        Query::PhantomRanges(set)
    }
}

impl From<KeywordSet> for Query {
    fn from(set: KeywordSet) -> Self {
        Query::Keywords(set)
    }
}

impl From<PhantomKeywords> for Query {
    fn from(set: PhantomKeywords) -> Self {
        Query::PhantomKeywords(set)
    }
}

fn demand_error(reason: impl Into<String>) -> PodError {
    PodError::construction("demand", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ranges(pairs: &[(u64, u64)]) -> RangeSet {
        RangeSet::new(pairs.iter().map(|&(s, c)| Range::new(s, c)).collect()).unwrap()
    }

    #[test]
    fn range_set_validation() {
        assert!(RangeSet::new(vec![]).is_err());
        assert!(RangeSet::new(vec![Range::new(3, 0)]).is_err());
        assert!(RangeSet::new(vec![Range::new(u64::MAX, 2)]).is_err());
        let err = RangeSet::new(vec![Range::new(0, MAX_QUERY_ITEMS as u64 + 1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
    }

    #[test]
    fn distinct_indices_merge_overlaps() {
        let set = ranges(&[(5, 3), (0, 2), (6, 2)]);
        let indices: Vec<u64> = set.distinct_indices().into_iter().collect();
        assert_eq!(indices, vec![0, 1, 5, 6, 7]);
        assert_eq!(set.total(), 7);
    }

    #[test]
    fn coverage_spans_adjacent_ranges() {
        let phantoms = ranges(&[(4, 4), (0, 4)]);
        assert!(phantoms.covers(&Range::new(2, 4)));
        assert!(phantoms.covers(&Range::new(0, 8)));
        assert!(!phantoms.covers(&Range::new(6, 3)));

        let gapped = ranges(&[(0, 2), (3, 2)]);
        assert!(!gapped.covers(&Range::new(1, 3)));
    }

    #[test]
    fn phantom_ranges_must_cover_demands() {
        let demands = ranges(&[(0, 2), (5, 3), (10, 1)]);
        PhantomRanges::new(demands.clone(), ranges(&[(0, 14)])).unwrap();

        let err = PhantomRanges::new(demands, ranges(&[(0, 10)])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Construction);
        assert!(err.to_string().contains("10+1"));
    }

    #[test]
    fn keyword_set_validation() {
        assert!(KeywordSet::new("", ["a"]).is_err());
        assert!(KeywordSet::new("name", Vec::<String>::new()).is_err());
        let long = "x".repeat(MAX_KEYWORD_LENGTH + 1);
        assert!(KeywordSet::new("name", [long]).is_err());

        let set = KeywordSet::new("name", ["alice", "bob"]).unwrap();
        assert!(set.contains("bob"));
        assert!(!set.contains("carol"));
    }

    #[test]
    fn phantom_keywords_must_share_key_and_cover() {
        let demands = KeywordSet::new("name", ["alice"]).unwrap();
        let phantoms = KeywordSet::new("name", ["alice", "bob", "carol"]).unwrap();
        PhantomKeywords::new(demands.clone(), phantoms).unwrap();

        let other_key = KeywordSet::new("city", ["alice"]).unwrap();
        assert!(PhantomKeywords::new(demands.clone(), other_key).is_err());

        let missing = KeywordSet::new("name", ["bob"]).unwrap();
        assert!(PhantomKeywords::new(demands, missing).is_err());
    }

    #[test]
    fn query_views() {
        let demands = ranges(&[(1, 1)]);
        let phantoms = ranges(&[(0, 4)]);
        let query = Query::from(PhantomRanges::new(demands.clone(), phantoms.clone()).unwrap());
        assert!(query.has_phantoms());
        assert!(!query.is_keyword());
        assert_eq!(query.demanded_ranges(), Some(&demands));
        assert_eq!(query.requested_ranges(), Some(&phantoms));
        assert_eq!(query.requested_keywords(), None);

        let keywords = Query::from(KeywordSet::new("name", ["alice"]).unwrap());
        assert!(keywords.is_keyword());
        assert_eq!(keywords.demanded_keywords(), keywords.requested_keywords());
    }
}
