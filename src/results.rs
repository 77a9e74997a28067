//! Decoded search results.
//!
//! [`SearchResults`] is built once from the raw JSON a target returns and
//! never changes afterwards. Every known member is optional in the raw
//! payload and falls back to zero or empty.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// One matching document and its absolute rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Zero-based position in the full ordered match set.
    pub rank: u64,
    /// The stored fields returned by the server.
    pub data: Value,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchResult(rank={}, data={})", self.rank, self.data)
    }
}

/// A window of results returned by one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    raw: Value,
    total_docs: u64,
    offset: u64,
    size_requested: u64,
    check_at_least: i64,
    matches_lower_bound: u64,
    matches_estimated: u64,
    matches_upper_bound: u64,
    items: Vec<SearchResult>,
    info: Vec<Value>,
}

fn get_u64(raw: &Value, key: &str) -> u64 {
    raw.get(key).and_then(Value::as_u64).unwrap_or(0)
}

impl SearchResults {
    /// Decode a raw response payload.
    pub fn from_raw(raw: Value) -> Self {
        let offset = get_u64(&raw, "from");
        let items = raw
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .zip(offset..)
                    .map(|(data, rank)| SearchResult {
                        rank,
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let info = raw
            .get("info")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            total_docs: get_u64(&raw, "total_docs"),
            offset,
            size_requested: get_u64(&raw, "size_requested"),
            check_at_least: raw
                .get("check_at_least")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            matches_lower_bound: get_u64(&raw, "matches_lower_bound"),
            matches_estimated: get_u64(&raw, "matches_estimated"),
            matches_upper_bound: get_u64(&raw, "matches_upper_bound"),
            items,
            info,
            raw,
        }
    }

    /// The payload this was decoded from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Number of documents searched.
    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    /// Rank of the first item.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size_requested(&self) -> u64 {
        self.size_requested
    }

    /// The `check_at_least` value the server used.
    pub fn check_at_least(&self) -> i64 {
        self.check_at_least
    }

    pub fn matches_lower_bound(&self) -> u64 {
        self.matches_lower_bound
    }

    pub fn matches_estimated(&self) -> u64 {
        self.matches_estimated
    }

    pub fn matches_upper_bound(&self) -> u64 {
        self.matches_upper_bound
    }

    /// True when `matches_estimated` is guaranteed exact.
    pub fn estimate_is_exact(&self) -> bool {
        self.matches_lower_bound == self.matches_upper_bound
    }

    pub fn items(&self) -> &[SearchResult] {
        &self.items
    }

    /// Auxiliary information (term occurrence counts and the like).
    pub fn info(&self) -> &[Value] {
        &self.info
    }

    /// Number of items in this window (not the number of matches).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the requested window `[offset, offset + size_requested)`
    /// includes `rank`.
    pub fn window_contains(&self, rank: u64) -> bool {
        self.offset <= rank && rank < self.offset.saturating_add(self.size_requested)
    }

    /// The item at absolute rank `rank`.
    pub fn at_rank(&self, rank: u64) -> Result<&SearchResult> {
        rank.checked_sub(self.offset)
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| self.items.get(index))
            .ok_or(Error::IndexOutOfRange { rank })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a SearchResults {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for SearchResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SearchResults(offset={}, size_requested={}, check_at_least={}, \
             matches_lower_bound={}, matches_estimated={}, matches_upper_bound={}, items=[",
            self.offset,
            self.size_requested,
            self.check_at_least,
            self.matches_lower_bound,
            self.matches_estimated,
            self.matches_upper_bound,
        )?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", item)?;
        }
        f.write_str("]")?;
        if !self.info.is_empty() {
            write!(f, ", info={}", Value::Array(self.info.clone()))?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_payload_defaults() {
        let results = SearchResults::from_raw(json!({}));
        assert_eq!(results.offset(), 0);
        assert_eq!(results.size_requested(), 0);
        assert_eq!(results.check_at_least(), 0);
        assert_eq!(results.matches_lower_bound(), 0);
        assert_eq!(results.matches_estimated(), 0);
        assert_eq!(results.matches_upper_bound(), 0);
        assert!(results.items().is_empty());
        assert!(results.info().is_empty());
        assert!(results.estimate_is_exact());
    }

    #[test]
    fn test_non_object_payload_defaults() {
        let results = SearchResults::from_raw(Value::Null);
        assert!(results.is_empty());
        assert_eq!(results.total_docs(), 0);
    }

    #[test]
    fn test_ranks_start_at_offset() {
        let results = SearchResults::from_raw(json!({
            "from": 5,
            "size_requested": 3,
            "items": [{"id": ["a"]}, {"id": ["b"]}, {"id": ["c"]}],
        }));
        let ranks: Vec<u64> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![5, 6, 7]);
    }

    #[test]
    fn test_at_rank_bounds() {
        let results = SearchResults::from_raw(json!({
            "from": 5,
            "items": [{"id": ["a"]}, {"id": ["b"]}, {"id": ["c"]}],
        }));
        for rank in [5, 6, 7] {
            assert_eq!(results.at_rank(rank).unwrap().rank, rank);
        }
        assert_eq!(results.at_rank(6).unwrap().data, json!({"id": ["b"]}));
        for rank in [0, 4, 8, 100] {
            assert!(matches!(
                results.at_rank(rank),
                Err(Error::IndexOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_window_near_rank_limit() {
        let results = SearchResults::from_raw(json!({
            "from": u64::MAX - 1,
            "size_requested": 10,
            "items": [{"id": ["last"]}],
        }));
        assert!(results.window_contains(u64::MAX - 1));
        assert!(!results.window_contains(0));
        assert_eq!(results.at_rank(u64::MAX - 1).unwrap().data, json!({"id": ["last"]}));
        assert!(results.at_rank(u64::MAX).is_err());
    }

    #[test]
    fn test_inexact_estimate() {
        let results = SearchResults::from_raw(json!({
            "matches_lower_bound": 3,
            "matches_estimated": 5,
            "matches_upper_bound": 9,
        }));
        assert!(!results.estimate_is_exact());
    }

    #[test]
    fn test_display_is_deterministic() {
        let raw = json!({
            "from": 0,
            "size_requested": 10,
            "matches_lower_bound": 1,
            "matches_estimated": 1,
            "matches_upper_bound": 1,
            "items": [{"id": ["1"]}],
            "info": [{"type": "occur", "prefix": "t"}],
        });
        let a = SearchResults::from_raw(raw.clone()).to_string();
        let b = SearchResults::from_raw(raw).to_string();
        assert_eq!(a, b);
        assert!(a.starts_with("SearchResults(offset=0, size_requested=10, check_at_least=0,"));
        assert!(a.contains("SearchResult(rank=0, data={\"id\":[\"1\"]})"));
        assert!(a.contains("info=["));
    }
}
