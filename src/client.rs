//! HTTP facades for a RestPose server.
//!
//! [`Server`] is the entry point. [`Collection`] and [`DocumentType`] are
//! handles on paths below it; both are [`Target`]s, so queries built from
//! them run against their own `/search` endpoint.
//!
//! # Routes
//!
//! | Call | Route |
//! |------|-------|
//! | `Server::status` | `GET /status` |
//! | `Server::collections` | `GET /coll` |
//! | `Collection::status` / `delete` | `GET` / `DELETE /coll/<c>` |
//! | `Collection::config` / `set_config` | `GET` / `PUT /coll/<c>/config` |
//! | `add_doc` with type and id | `PUT /coll/<c>/type/<t>/id/<i>` |
//! | `add_doc` otherwise | `POST /coll/<c>[/type/<t>][/id/<i>]` |
//! | `get_doc` / `delete_doc` | `GET` / `DELETE /coll/<c>/type/<t>/id/<i>` |
//! | `Collection::checkpoint` | `POST /coll/<c>/checkpoint` |
//! | `Collection::checkpoints` | `GET /coll/<c>/checkpoint` |
//! | `search` | `POST <base>/search` |

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::checkpoint::CheckPoint;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::query::{MetaOp, Query, QueryNode};
use crate::resource::Resource;
use crate::results::SearchResults;
use crate::search::SearchDescriptor;
use crate::target::{Target, TargetRef};

/// Collection and document type names: lowercase ASCII letters, digits,
/// `_` and `-`.
fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// A connection to a RestPose server.
#[derive(Debug, Clone)]
pub struct Server {
    resource: Resource,
}

impl Server {
    pub const DEFAULT_URI: &'static str = "http://127.0.0.1:7777";

    pub fn new(uri: &str) -> Result<Self> {
        Ok(Self {
            resource: Resource::new(uri, Duration::from_secs(30))?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            resource: Resource::new(&config.server.uri, config.server.timeout())?,
        })
    }

    pub fn uri(&self) -> &str {
        self.resource.uri()
    }

    /// Server status, as reported by the server.
    pub fn status(&self) -> Result<Value> {
        self.resource.get("/status")
    }

    /// Names of the collections on the server.
    pub fn collections(&self) -> Result<Vec<String>> {
        let listing = self.resource.get("/coll")?;
        let mut names: Vec<String> = listing
            .as_object()
            .map(|obj| obj.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    pub fn collection(&self, name: &str) -> Result<Collection> {
        validate_name("collection", name)?;
        Ok(Collection {
            resource: self.resource.clone(),
            name: name.to_string(),
            basepath: format!("/coll/{}", name),
        })
    }
}

/// A document as stored by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    raw: Value,
}

impl StoredDocument {
    pub fn from_raw(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    fn member(&self, key: &str) -> Value {
        self.raw.get(key).cloned().unwrap_or_else(|| json!({}))
    }

    /// Stored field values, keyed by field name.
    pub fn data(&self) -> Value {
        self.member("data")
    }

    /// Indexed terms, with their wdf and positions.
    pub fn terms(&self) -> Value {
        self.member("terms")
    }

    /// Slot values, keyed by slot number.
    pub fn values(&self) -> Value {
        self.member("values")
    }
}

/// Builders for queries bound to a target, plus direct search.
pub trait QueryTarget: Target + Clone + Sized + 'static {
    /// This target as a shareable handle.
    fn as_target(&self) -> TargetRef {
        Arc::new(self.clone())
    }

    fn bind(&self, node: QueryNode) -> Query {
        Query::with_target(node, Some(self.as_target()))
    }

    fn query_all(&self) -> Query {
        self.bind(QueryNode::MatchAll)
    }

    fn query_none(&self) -> Query {
        self.bind(QueryNode::MatchNone)
    }

    /// A query on a field, with a field-type specific operator and value.
    fn query_field(&self, field: &str, operator: &str, value: Value) -> Query {
        self.bind(QueryNode::Field {
            field: field.to_string(),
            operator: operator.to_string(),
            value,
        })
    }

    /// Exact value match. A scalar value is wrapped into a one-element list.
    fn field_is(&self, field: &str, value: Value) -> Query {
        let value = match value {
            Value::Array(_) => value,
            scalar => Value::Array(vec![scalar]),
        };
        self.query_field(field, "is", value)
    }

    fn field_range(&self, field: &str, begin: Value, end: Value) -> Query {
        self.query_field(field, "range", json!([begin, end]))
    }

    /// Text search. `op` is one of `"or"`, `"and"`, `"phrase"` (the default)
    /// or `"near"`; `window` only applies to the proximity operators.
    fn field_text(&self, field: &str, text: &str, op: Option<&str>, window: Option<u64>) -> Query {
        let mut value = json!({"text": text, "op": op.unwrap_or("phrase")});
        if let Some(window) = window {
            value["window"] = json!(window);
        }
        self.query_field(field, "text", value)
    }

    /// Parse a structured query string; `op` defaults to `"and"`.
    fn field_parse(&self, field: &str, text: &str, op: Option<&str>) -> Query {
        self.query_field(field, "parse", json!({"text": text, "op": op.unwrap_or("and")}))
    }

    fn meta_query(&self, op: MetaOp, field: Option<&str>) -> Query {
        self.bind(QueryNode::Meta {
            op,
            field: field.map(str::to_string),
        })
    }

    /// Documents with the field present (any field when `None`).
    fn field_exists(&self, field: Option<&str>) -> Query {
        self.meta_query(MetaOp::Exists, field)
    }

    fn field_nonempty(&self, field: Option<&str>) -> Query {
        self.meta_query(MetaOp::NonEmpty, field)
    }

    fn field_empty(&self, field: Option<&str>) -> Query {
        self.meta_query(MetaOp::Empty, field)
    }

    /// Documents where indexing the field produced an error.
    fn field_has_error(&self, field: Option<&str>) -> Query {
        self.meta_query(MetaOp::Error, field)
    }

    /// Run a prebuilt search body.
    fn search(&self, body: &Value) -> Result<SearchResults> {
        Ok(SearchResults::from_raw(self.execute(body)?))
    }

    /// Run a single search for `query` with default paging.
    fn search_query(&self, query: &Query) -> Result<SearchResults> {
        self.search(&SearchDescriptor::new(query.node().clone()).body())
    }
}

/// A collection on the server.
#[derive(Debug, Clone)]
pub struct Collection {
    resource: Resource,
    name: String,
    basepath: String,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Result<Value> {
        self.resource.get(&self.basepath)
    }

    /// Delete the collection and everything in it.
    pub fn delete(&self) -> Result<Value> {
        self.resource.delete(&self.basepath)
    }

    pub fn config(&self) -> Result<Value> {
        self.resource.get(&format!("{}/config", self.basepath))
    }

    pub fn set_config(&self, config: &Value) -> Result<Value> {
        self.resource.put(&format!("{}/config", self.basepath), config)
    }

    pub fn doc_type(&self, name: &str) -> Result<DocumentType> {
        validate_name("type", name)?;
        Ok(DocumentType {
            resource: self.resource.clone(),
            name: name.to_string(),
            basepath: format!("{}/type/{}", self.basepath, name),
        })
    }

    /// Add or replace a document. Uses `PUT` when both type and id are
    /// known, `POST` otherwise (the server then takes them from the
    /// document itself).
    pub fn add_doc(&self, doc: &Value, doc_type: Option<&str>, doc_id: Option<&str>) -> Result<Value> {
        let mut path = self.basepath.clone();
        if let Some(doc_type) = doc_type {
            validate_name("type", doc_type)?;
            path.push_str("/type/");
            path.push_str(doc_type);
        }
        if let Some(doc_id) = doc_id {
            path.push_str("/id/");
            path.push_str(doc_id);
        }
        if doc_type.is_some() && doc_id.is_some() {
            self.resource.put(&path, doc)
        } else {
            self.resource.post(&path, Some(doc))
        }
    }

    pub fn get_doc(&self, doc_type: &str, doc_id: &str) -> Result<StoredDocument> {
        self.doc_type(doc_type)?.get_doc(doc_id)
    }

    pub fn delete_doc(&self, doc_type: &str, doc_id: &str) -> Result<Value> {
        self.doc_type(doc_type)?.delete_doc(doc_id)
    }

    /// Create a checkpoint. With `commit == false` the server is asked not to
    /// commit pending changes when the checkpoint is reached.
    pub fn checkpoint(&self, commit: bool) -> Result<CheckPoint> {
        let mut path = format!("{}/checkpoint", self.basepath);
        if !commit {
            path.push_str("?commit=false");
        }
        let reply = self.resource.post(&path, None)?;
        debug!(collection = %self.name, %reply, "created checkpoint");
        CheckPoint::from_created(self.resource.clone(), &self.basepath, &reply)
    }

    /// All checkpoints the server currently knows for this collection.
    pub fn checkpoints(&self) -> Result<Value> {
        self.resource.get(&format!("{}/checkpoint", self.basepath))
    }
}

impl Target for Collection {
    fn location(&self) -> &str {
        &self.basepath
    }

    fn execute(&self, body: &Value) -> Result<Value> {
        self.resource
            .post(&format!("{}/search", self.basepath), Some(body))
    }
}

impl QueryTarget for Collection {}

/// The documents of one type within a collection.
#[derive(Debug, Clone)]
pub struct DocumentType {
    resource: Resource,
    name: String,
    basepath: String,
}

impl DocumentType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add or replace a document of this type.
    pub fn add_doc(&self, doc: &Value, doc_id: Option<&str>) -> Result<Value> {
        match doc_id {
            Some(doc_id) => self
                .resource
                .put(&format!("{}/id/{}", self.basepath, doc_id), doc),
            None => self.resource.post(&self.basepath, Some(doc)),
        }
    }

    pub fn get_doc(&self, doc_id: &str) -> Result<StoredDocument> {
        let raw = self
            .resource
            .get(&format!("{}/id/{}", self.basepath, doc_id))?;
        Ok(StoredDocument::from_raw(raw))
    }

    pub fn delete_doc(&self, doc_id: &str) -> Result<Value> {
        self.resource
            .delete(&format!("{}/id/{}", self.basepath, doc_id))
    }
}

impl Target for DocumentType {
    fn location(&self) -> &str {
        &self.basepath
    }

    fn execute(&self, body: &Value) -> Result<Value> {
        self.resource
            .post(&format!("{}/search", self.basepath), Some(body))
    }
}

impl QueryTarget for DocumentType {}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Server {
        Server::new("http://127.0.0.1:7777/").unwrap()
    }

    #[test]
    fn test_name_validation() {
        let server = server();
        assert!(server.collection("my_coll-2").is_ok());
        for bad in ["", "My", "a b", "a/b", "caf\u{e9}"] {
            let err = server.collection(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidName { kind: "collection", .. }));
        }
        let coll = server.collection("c").unwrap();
        assert!(matches!(
            coll.doc_type("Blurb"),
            Err(Error::InvalidName { kind: "type", .. })
        ));
    }

    #[test]
    fn test_locations() {
        let coll = server().collection("docs").unwrap();
        assert_eq!(coll.location(), "/coll/docs");
        let blurb = coll.doc_type("blurb").unwrap();
        assert_eq!(blurb.location(), "/coll/docs/type/blurb");
    }

    #[test]
    fn test_field_is_wraps_scalars() {
        let coll = server().collection("docs").unwrap();
        assert_eq!(
            coll.field_is("tag", json!("A tag")).to_json(),
            json!({"field": ["tag", "is", ["A tag"]]})
        );
        assert_eq!(
            coll.field_is("num", json!(3)).to_json(),
            json!({"field": ["num", "is", [3]]})
        );
        assert_eq!(
            coll.field_is("tag", json!(["a", "b"])).to_json(),
            json!({"field": ["tag", "is", ["a", "b"]]})
        );
    }

    #[test]
    fn test_text_and_parse_defaults() {
        let coll = server().collection("docs").unwrap();
        assert_eq!(
            coll.field_text("text", "hello world", None, None).to_json(),
            json!({"field": ["text", "text", {"text": "hello world", "op": "phrase"}]})
        );
        assert_eq!(
            coll.field_text("text", "hello", Some("near"), Some(5)).to_json(),
            json!({"field": ["text", "text", {"text": "hello", "op": "near", "window": 5}]})
        );
        assert_eq!(
            coll.field_parse("text", "a OR b", None).to_json(),
            json!({"field": ["text", "parse", {"text": "a OR b", "op": "and"}]})
        );
        assert_eq!(
            coll.field_range("date", json!("2010-01-01"), json!("2011-01-01")).to_json(),
            json!({"field": ["date", "range", ["2010-01-01", "2011-01-01"]]})
        );
    }

    #[test]
    fn test_meta_queries() {
        let coll = server().collection("docs").unwrap();
        assert_eq!(
            coll.field_exists(None).to_json(),
            json!({"meta": ["exists", null]})
        );
        assert_eq!(
            coll.field_has_error(Some("date")).to_json(),
            json!({"meta": ["error", "date"]})
        );
    }

    #[test]
    fn test_queries_are_bound() {
        let coll = server().collection("docs").unwrap();
        let other = server().collection("other").unwrap();
        let a = coll.query_all();
        assert_eq!(a.target().map(|t| t.location()), Some("/coll/docs"));
        assert!(a.and_with(&coll.query_none()).is_ok());
        assert!(matches!(
            a.and_with(&other.query_all()),
            Err(Error::InconsistentTargets { .. })
        ));
    }

    #[test]
    fn test_stored_document_members() {
        let doc = StoredDocument::from_raw(json!({
            "data": {"id": ["1"], "text": ["Hello world"]},
            "terms": {"\\x00hello": {"wdf": 1}},
        }));
        assert_eq!(doc.data()["text"], json!(["Hello world"]));
        assert!(doc.terms().get("\\x00hello").is_some());
        assert_eq!(doc.values(), json!({}));
    }
}
