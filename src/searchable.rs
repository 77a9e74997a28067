//! Lazy, sliceable views over search results.
//!
//! A [`Searchable`] owns a [`SearchDescriptor`], the target to run it
//! against, and the last window of results fetched for it. Nothing touches
//! the network until a result-dependent value is requested, and a request
//! the cached window already answers never touches it again.
//!
//! # States
//!
//! ```text
//!  Unexecuted ──fetch──▶ Cached(window) ──request outside window──▶ Cached(new window)
//!                             │
//!                             └──request inside window──▶ (no fetch)
//! ```
//!
//! A cached window goes stale when a requested rank lies outside
//! `[window.offset, window.offset + window.size_requested)`, when a larger
//! `check_at_least` is demanded than the window used, or when an exact count
//! is demanded and the window's estimate is not exact.
//!
//! # Slicing
//!
//! Slices carry absolute `(offset, size)` forward, so `view[a..b]` of
//! `all[c..d]` is the same view as `all[c + a..min(c + b, d)]`. Negative
//! bounds and steps other than 1 are rejected.

use serde_json::Value;
use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::query::Query;
use crate::results::{SearchResult, SearchResults};
use crate::search::{CountOptions, OrderKey, SearchDescriptor, EXACT_COUNT};
use crate::target::TargetRef;

/// Results fetched per request when no explicit size has been set.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// A `[start:stop:step]` selection, with Python-like optional bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>) -> Self {
        Self {
            start,
            stop,
            step: None,
        }
    }

    pub fn with_step(self, step: i64) -> Self {
        Self {
            step: Some(step),
            ..self
        }
    }
}

impl From<Range<i64>> for Slice {
    fn from(r: Range<i64>) -> Self {
        Slice::new(Some(r.start), Some(r.end))
    }
}

impl From<RangeFrom<i64>> for Slice {
    fn from(r: RangeFrom<i64>) -> Self {
        Slice::new(Some(r.start), None)
    }
}

impl From<RangeTo<i64>> for Slice {
    fn from(r: RangeTo<i64>) -> Self {
        Slice::new(None, Some(r.end))
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::default()
    }
}

/// A key selecting either one result or a sub-range of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKey {
    Index(i64),
    Slice(Slice),
}

impl From<i64> for ResultKey {
    fn from(index: i64) -> Self {
        ResultKey::Index(index)
    }
}

impl From<Slice> for ResultKey {
    fn from(slice: Slice) -> Self {
        ResultKey::Slice(slice)
    }
}

fn bound_from_json(value: Option<&Value>) -> Option<Option<i64>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(v) => v.as_i64().map(Some),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "non-integer number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Keys arriving as JSON (e.g. from a command line or an RPC layer).
///
/// Integers select one result; `{"start", "stop", "step"}` objects and
/// `[start, stop]` / `[start, stop, step]` arrays (members may be `null`)
/// select slices. Anything else is [`Error::InvalidKeyType`].
impl TryFrom<&Value> for ResultKey {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        let invalid = || Error::InvalidKeyType {
            found: json_type_name(value).to_string(),
        };
        match value {
            Value::Number(n) => n.as_i64().map(ResultKey::Index).ok_or_else(invalid),
            Value::Object(obj) => {
                if obj.keys().any(|k| !matches!(k.as_str(), "start" | "stop" | "step")) {
                    return Err(invalid());
                }
                Ok(ResultKey::Slice(Slice {
                    start: bound_from_json(obj.get("start")).ok_or_else(invalid)?,
                    stop: bound_from_json(obj.get("stop")).ok_or_else(invalid)?,
                    step: bound_from_json(obj.get("step")).ok_or_else(invalid)?,
                }))
            }
            Value::Array(parts) if parts.len() == 2 || parts.len() == 3 => {
                Ok(ResultKey::Slice(Slice {
                    start: bound_from_json(parts.first()).ok_or_else(invalid)?,
                    stop: bound_from_json(parts.get(1)).ok_or_else(invalid)?,
                    step: bound_from_json(parts.get(2)).ok_or_else(invalid)?,
                }))
            }
            _ => Err(invalid()),
        }
    }
}

/// What a [`ResultKey`] selected.
#[derive(Debug, Clone)]
pub enum Selection {
    Item(SearchResult),
    Slice(Searchable),
}

/// A lazily evaluated search with a cached result window.
#[derive(Clone)]
pub struct Searchable {
    target: Option<TargetRef>,
    search: SearchDescriptor,
    page_size: u64,
    window: Option<Arc<SearchResults>>,
}

impl fmt::Debug for Searchable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searchable")
            .field("target", &self.target.as_ref().map(|t| t.location()))
            .field("search", &self.search)
            .field("page_size", &self.page_size)
            .field("cached", &self.window.is_some())
            .finish()
    }
}

impl From<Query> for Searchable {
    fn from(query: Query) -> Self {
        Searchable::new(query)
    }
}

impl Searchable {
    /// Search for `query` against the query's own target.
    pub fn new(query: Query) -> Self {
        let target = query.target().cloned();
        Self::from_descriptor(SearchDescriptor::new(query.node().clone()), target)
    }

    pub fn from_descriptor(search: SearchDescriptor, target: Option<TargetRef>) -> Self {
        Self {
            target,
            search,
            page_size: DEFAULT_PAGE_SIZE,
            window: None,
        }
    }

    /// Set how many results to fetch per request when no size is set.
    /// Values below 1 are treated as 1.
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_target(mut self, target: TargetRef) -> Self {
        self.target = Some(target);
        self.window = None;
        self
    }

    pub fn descriptor(&self) -> &SearchDescriptor {
        &self.search
    }

    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Absolute rank of the first result in this view.
    pub fn offset(&self) -> u64 {
        self.search.offset()
    }

    /// Maximum number of results in this view, if bounded.
    pub fn size(&self) -> Option<u64> {
        self.search.size()
    }

    /// The last window fetched, if any.
    pub fn cached(&self) -> Option<&SearchResults> {
        self.window.as_deref()
    }

    /// The body that would be sent for this view as a whole.
    pub fn body(&self) -> Value {
        self.search.body()
    }

    // ==================== Derived views ====================

    /// Narrow this view. The cached window is kept, since it is still a
    /// valid answer for the same query.
    pub fn slice(&self, slice: impl Into<Slice>) -> Result<Searchable> {
        let slice = slice.into();
        if let Some(step) = slice.step {
            if step != 1 {
                return Err(Error::UnsupportedStep { step });
            }
        }
        let start = match slice.start {
            Some(start) if start < 0 => return Err(Error::NegativeIndex { index: start }),
            Some(start) => start as u64,
            None => 0,
        };
        let stop = match slice.stop {
            Some(stop) if stop < 0 => return Err(Error::NegativeIndex { index: stop }),
            Some(stop) => Some(stop as u64),
            None => None,
        };

        let offset = self
            .offset()
            .checked_add(start)
            .ok_or(Error::IndexOutOfRange { rank: u64::MAX })?;
        let size = match (stop, self.size()) {
            (None, None) => None,
            (None, Some(old)) => Some(old.saturating_sub(start)),
            (Some(stop), old) => {
                let new_stop = old.map_or(stop, |old| old.min(stop));
                Some(new_stop.saturating_sub(start))
            }
        };

        Ok(Searchable {
            search: self.search.with_range(offset, size),
            ..self.clone()
        })
    }

    pub fn check_at_least(&self, check_at_least: i64) -> Searchable {
        Searchable {
            search: self.search.check_at_least(check_at_least),
            ..self.clone()
        }
    }

    /// Order by a field, or by relevance with [`OrderKey::Relevance`].
    pub fn order_by(&self, key: OrderKey, ascending: Option<bool>) -> Searchable {
        self.derive(self.search.order_by(key, ascending))
    }

    pub fn request_occurrence(&self, prefix: &str, options: CountOptions) -> Searchable {
        self.derive(self.search.request_occurrence(prefix, options))
    }

    pub fn request_cooccurrence(&self, prefix: &str, options: CountOptions) -> Searchable {
        self.derive(self.search.request_cooccurrence(prefix, options))
    }

    /// A view whose results must be fetched afresh.
    fn derive(&self, search: SearchDescriptor) -> Searchable {
        Searchable {
            target: self.target.clone(),
            search,
            page_size: self.page_size,
            window: None,
        }
    }

    // ==================== Fetching ====================

    /// An exact-count demand is only met by an exact estimate, whatever the
    /// window was fetched with. A window fetched with an exact-count request
    /// meets any finite demand.
    fn window_satisfies(window: &SearchResults, check_at_least: i64) -> bool {
        if check_at_least == EXACT_COUNT {
            return window.estimate_is_exact();
        }
        if window.check_at_least() == EXACT_COUNT {
            return true;
        }
        check_at_least <= window.check_at_least()
    }

    /// Make sure the cached window covers `[offset, offset + size)` with at
    /// least the given `check_at_least`, fetching if it does not.
    fn ensure_window(&mut self, offset: u64, size: Option<u64>, check_at_least: i64) -> Result<()> {
        let target = self.target.clone().ok_or(Error::NoTarget)?;
        let size = size.unwrap_or(self.page_size);

        if let Some(window) = &self.window {
            let covered = offset >= window.offset()
                && offset.saturating_add(size)
                    <= window.offset().saturating_add(window.size_requested());
            if covered && Self::window_satisfies(window, check_at_least) {
                debug!(offset, size, "reusing cached result window");
                return Ok(());
            }
        }

        let body = self.search.build(Some(offset), Some(size), Some(check_at_least));
        trace!(location = target.location(), %body, "executing search");
        let raw = target.execute(&body)?;
        let results = SearchResults::from_raw(raw);
        debug!(
            offset = results.offset(),
            size_requested = results.size_requested(),
            items = results.len(),
            "fetched result window"
        );
        self.window = Some(Arc::new(results));
        Ok(())
    }

    /// Make sure match statistics are available at this view's
    /// `check_at_least`.
    fn ensure_stats(&mut self) -> Result<&SearchResults> {
        let check_at_least = self.search.check_at_least_value();
        let satisfied = self
            .window
            .as_ref()
            .is_some_and(|w| Self::window_satisfies(w, check_at_least));
        if !satisfied {
            self.ensure_window(self.offset(), self.size(), check_at_least)?;
        }
        self.window.as_deref().ok_or(Error::NoTarget)
    }

    /// Make sure the cached window holds absolute rank `rank`.
    ///
    /// Without an explicit size, the page of `page_size` results containing
    /// the rank is fetched; with one, the whole view is.
    fn ensure_contains(&mut self, rank: u64) -> Result<()> {
        let offset = self.offset();
        if rank < offset
            || self
                .size()
                .is_some_and(|size| offset.saturating_add(size) <= rank)
        {
            return Err(Error::IndexOutOfRange { rank });
        }
        if self.window.as_ref().is_some_and(|w| w.window_contains(rank)) {
            return Ok(());
        }
        let check_at_least = self.search.check_at_least_value();
        match self.size() {
            None => {
                let page = (rank - offset) / self.page_size;
                let page_offset = offset + page * self.page_size;
                self.ensure_window(page_offset, Some(self.page_size), check_at_least)
            }
            Some(size) => self.ensure_window(offset, Some(size), check_at_least),
        }
    }

    /// Fetch (if needed) and return the window for this view.
    pub fn results(&mut self) -> Result<Arc<SearchResults>> {
        let check_at_least = self.search.check_at_least_value();
        self.ensure_window(self.offset(), self.size(), check_at_least)?;
        self.window.clone().ok_or(Error::NoTarget)
    }

    // ==================== Result-dependent values ====================

    /// Number of documents searched.
    pub fn total_docs(&mut self) -> Result<u64> {
        Ok(self.ensure_stats()?.total_docs())
    }

    pub fn matches_lower_bound(&mut self) -> Result<u64> {
        Ok(self.ensure_stats()?.matches_lower_bound())
    }

    pub fn matches_estimated(&mut self) -> Result<u64> {
        Ok(self.ensure_stats()?.matches_estimated())
    }

    pub fn matches_upper_bound(&mut self) -> Result<u64> {
        Ok(self.ensure_stats()?.matches_upper_bound())
    }

    pub fn estimate_is_exact(&mut self) -> Result<bool> {
        Ok(self.ensure_stats()?.estimate_is_exact())
    }

    /// Exact number of results in this view.
    ///
    /// Unless the cached window already has an exact count, this runs a
    /// search with an exact-count `check_at_least`, which the server may
    /// find expensive. Use [`matches_estimated`](Self::matches_estimated)
    /// when a rough figure will do.
    pub fn len(&mut self) -> Result<u64> {
        let cached_exact = self
            .window
            .as_ref()
            .filter(|w| w.estimate_is_exact())
            .map(|w| w.matches_estimated());
        let total = match cached_exact {
            Some(total) => total,
            None => {
                self.ensure_window(self.offset(), self.size(), EXACT_COUNT)?;
                self.window
                    .as_ref()
                    .map(|w| w.matches_estimated())
                    .ok_or(Error::NoTarget)?
            }
        };

        let offset = self.offset();
        if total < offset {
            return Ok(0);
        }
        let total = total - offset;
        Ok(match self.size() {
            Some(size) if total > size => size,
            _ => total,
        })
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The result at position `index` within this view.
    pub fn get(&mut self, index: i64) -> Result<SearchResult> {
        if index < 0 {
            return Err(Error::NegativeIndex { index });
        }
        let index = index as u64;
        let rank = self
            .offset()
            .checked_add(index)
            .ok_or(Error::IndexOutOfRange { rank: u64::MAX })?;
        if self.size().is_some_and(|size| index >= size) {
            return Err(Error::IndexOutOfRange { rank });
        }
        self.ensure_contains(rank)?;
        let window = self.window.as_ref().ok_or(Error::NoTarget)?;
        window.at_rank(rank).cloned()
    }

    /// Select one result or a sub-view.
    pub fn select(&mut self, key: impl Into<ResultKey>) -> Result<Selection> {
        match key.into() {
            ResultKey::Index(index) => self.get(index).map(Selection::Item),
            ResultKey::Slice(slice) => self.slice(slice).map(Selection::Slice),
        }
    }

    /// Iterate over every result in this view, fetching page by page.
    pub fn iter(&mut self) -> ResultsIter<'_> {
        ResultsIter {
            searchable: self,
            index: 0,
            done: false,
        }
    }
}

/// Iterator over the results of a [`Searchable`].
///
/// Ends at the first index past the available results. Any other error is
/// yielded once and ends the iteration.
pub struct ResultsIter<'a> {
    searchable: &'a mut Searchable,
    index: i64,
    done: bool,
}

impl Iterator for ResultsIter<'_> {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.searchable.get(self.index) {
            Ok(result) => {
                self.index += 1;
                Some(Ok(result))
            }
            Err(Error::IndexOutOfRange { .. }) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
