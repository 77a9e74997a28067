use restpose::{
    CountOptions, Error, OrderKey, Query, ResultKey, SearchResults, Searchable, Selection, Slice,
    Target, TargetRef, EXACT_COUNT,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Replies with a canned payload and records every body it receives.
struct Canned {
    location: &'static str,
    reply: Value,
    bodies: Mutex<Vec<Value>>,
}

impl Canned {
    fn new(location: &'static str, reply: Value) -> Arc<Self> {
        Arc::new(Self {
            location,
            reply,
            bodies: Mutex::new(Vec::new()),
        })
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

impl Target for Canned {
    fn location(&self) -> &str {
        self.location
    }

    fn execute(&self, body: &Value) -> restpose::Result<Value> {
        self.bodies.lock().unwrap().push(body.clone());
        Ok(self.reply.clone())
    }
}

/// Fails every request, as a transport would.
struct Unreachable;

impl Target for Unreachable {
    fn location(&self) -> &str {
        "/coll/down"
    }

    fn execute(&self, _body: &Value) -> restpose::Result<Value> {
        Err(Error::Http {
            method: "POST".to_string(),
            path: "/coll/down/search".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        })
    }
}

fn bound(query: Query, target: &Arc<Canned>) -> Query {
    let target: TargetRef = target.clone();
    Query::with_target(query.node().clone(), Some(target))
}

#[test]
fn test_tag_query_end_to_end() {
    let target = Canned::new(
        "/coll/docs/type/blurb",
        json!({
            "matches_lower_bound": 1,
            "matches_estimated": 1,
            "matches_upper_bound": 1,
            "items": [{"id": ["1"]}],
            "from": 0
        }),
    );
    let query = bound(Query::field("tag", "is", json!("A tag")), &target);

    let mut view = query.search().slice(0..1).unwrap();
    let results: Arc<SearchResults> = view.results().unwrap();

    assert_eq!(results.len(), 1);
    let item = results.at_rank(0).unwrap();
    assert_eq!(item.rank, 0);
    assert_eq!(item.data, json!({"id": ["1"]}));
    assert!(results.estimate_is_exact());

    assert_eq!(
        target.bodies(),
        vec![json!({"query": {"field": ["tag", "is", "A tag"]}, "size": 1})]
    );
}

#[test]
fn test_combined_query_inherits_target() {
    let target = Canned::new("/coll/docs", json!({"items": []}));
    let text = bound(Query::field("text", "text", json!({"text": "hello"})), &target);
    let tag = Query::field("tag", "is", json!(["A tag"]));

    let mut view = text.filter(&tag).unwrap().search();
    assert_eq!(view.matches_estimated().unwrap(), 0);

    let sent = &target.bodies()[0];
    assert_eq!(
        sent["query"],
        json!({"and": [
            {"field": ["text", "text", {"text": "hello"}]},
            {"scale": {"query": {"field": ["tag", "is", ["A tag"]]}, "factor": 0.0}}
        ]})
    );
}

#[test]
fn test_len_sends_exact_count_request() {
    let target = Canned::new(
        "/coll/docs",
        json!({
            "from": 0,
            "size_requested": 20,
            "check_at_least": -1,
            "matches_lower_bound": 42,
            "matches_estimated": 42,
            "matches_upper_bound": 42,
            "items": []
        }),
    );
    let mut view = bound(Query::all(), &target).search().slice(40..).unwrap();
    assert_eq!(view.len().unwrap(), 2);
    assert_eq!(target.bodies()[0]["check_at_least"], json!(EXACT_COUNT));
    assert_eq!(target.bodies()[0]["from"], json!(40));
}

#[test]
fn test_estimates_do_not_force_exact_count() {
    let target = Canned::new(
        "/coll/docs",
        json!({
            "size_requested": 20,
            "matches_lower_bound": 10,
            "matches_estimated": 15,
            "matches_upper_bound": 30,
        }),
    );
    let mut view = bound(Query::all(), &target).search();
    assert_eq!(view.matches_lower_bound().unwrap(), 10);
    assert_eq!(view.matches_upper_bound().unwrap(), 30);
    assert!(!view.estimate_is_exact().unwrap());
    assert_eq!(target.bodies().len(), 1);
    assert!(target.bodies()[0].get("check_at_least").is_none());

    // The window's estimate is inexact, so an exact length needs another request.
    view.len().unwrap();
    assert_eq!(target.bodies().len(), 2);
    assert_eq!(target.bodies()[1]["check_at_least"], json!(-1));
}

#[test]
fn test_ordering_and_info_reach_the_wire() {
    let target = Canned::new("/coll/docs", json!({}));
    let mut view = bound(Query::all(), &target)
        .search()
        .order_by(OrderKey::Field("date".to_string()), Some(true))
        .request_cooccurrence(
            "t",
            CountOptions {
                result_limit: Some(10),
                ..Default::default()
            },
        );
    view.total_docs().unwrap();
    let body = &target.bodies()[0];
    assert_eq!(body["order_by"], json!([{"field": "date", "ascending": true}]));
    assert_eq!(body["info"][0]["cooccur"]["result_limit"], json!(10));
}

#[test]
fn test_transport_errors_pass_through() {
    let target: TargetRef = Arc::new(Unreachable);
    let mut view = Query::with_target(Query::all().node().clone(), Some(target)).search();
    let err = view.get(0).unwrap_err();
    assert!(matches!(err, Error::Http { status: 503, .. }));
    assert!(!err.is_usage());
    assert!(view.cached().is_none());
}

#[test]
fn test_dynamic_keys() {
    let target = Canned::new(
        "/coll/docs",
        json!({"size_requested": 20, "items": [{"id": ["a"]}, {"id": ["b"]}]}),
    );
    let mut view = bound(Query::all(), &target).search();

    let key = ResultKey::try_from(&json!(1)).unwrap();
    match view.select(key).unwrap() {
        Selection::Item(item) => assert_eq!(item.data, json!({"id": ["b"]})),
        other => panic!("unexpected selection: {other:?}"),
    }

    let key = ResultKey::try_from(&json!({"start": 1, "stop": null})).unwrap();
    match view.select(key).unwrap() {
        Selection::Slice(slice) => assert_eq!((slice.offset(), slice.size()), (1, None)),
        other => panic!("unexpected selection: {other:?}"),
    }

    assert!(matches!(
        ResultKey::try_from(&json!("first")),
        Err(Error::InvalidKeyType { .. })
    ));
}

#[test]
fn test_usage_errors_leave_view_untouched() {
    let target = Canned::new("/coll/docs", json!({}));
    let view = bound(Query::all(), &target).search().slice(5..15).unwrap();
    let err = view.slice(Slice::new(Some(0), Some(4)).with_step(2)).unwrap_err();
    assert!(err.is_usage());
    assert_eq!((view.offset(), view.size()), (5, Some(10)));
    assert!(target.bodies().is_empty());
}

#[test]
fn test_unbound_searchable_from_descriptor() {
    let mut view = Searchable::from_descriptor(
        restpose::SearchDescriptor::new(restpose::QueryNode::MatchNone),
        None,
    );
    assert!(matches!(view.total_docs(), Err(Error::NoTarget)));
    let target: TargetRef = Canned::new("/coll/docs", json!({"total_docs": 3}));
    let mut view = view.with_target(target);
    assert_eq!(view.total_docs().unwrap(), 3);
}
