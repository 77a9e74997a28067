//! Query expression trees.
//!
//! A [`QueryNode`] is an immutable description of a boolean/weighted query.
//! A [`Query`] pairs a node with the (optional) [`Target`](crate::target::Target)
//! it should run against, and provides the combinators used to build larger
//! queries out of smaller ones.
//!
//! # Wire format
//!
//! | Node | JSON |
//! |------|------|
//! | `Field` | `{"field": [name, type, value]}` |
//! | `Meta` | `{"meta": [type, field-or-null]}` |
//! | `MatchAll` | `{"matchall": true}` |
//! | `MatchNone` | `{"matchnothing": true}` |
//! | `Combine` | `{"and": [...]}`, `{"or": [...]}`, `{"xor": [...]}`, `{"and_not": [...]}`, `{"and_maybe": [...]}` |
//! | `Scale` | `{"scale": {"query": ..., "factor": f}}` |
//! | `Raw` | the caller's structure, copied verbatim |
//!
//! # Example
//!
//! ```rust
//! use restpose::query::Query;
//! use serde_json::json;
//!
//! let tagged = Query::field("tag", "is", json!(["A tag"]));
//! let text = Query::field("text", "text", json!({"text": "hello"}));
//! let q = text.filter(&tagged).unwrap();
//! assert_eq!(
//!     q.to_json(),
//!     json!({"and": [
//!         {"field": ["text", "text", {"text": "hello"}]},
//!         {"scale": {"query": {"field": ["tag", "is", ["A tag"]]}, "factor": 0.0}}
//!     ]})
//! );
//! ```

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{Error, Result};
use crate::searchable::Searchable;
use crate::target::{resolve_target, TargetRef};

/// Boolean operator joining the children of a [`QueryNode::Combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineOp {
    /// Documents matching every child; weights summed.
    And,
    /// Documents matching any child; weights of matching children summed.
    Or,
    /// Documents matching an odd number of children.
    Xor,
    /// Documents matching the first child but none of the others; weights
    /// from the first child only.
    Not,
    /// Documents matching the first child, with extra weight from the others.
    AndMaybe,
}

impl CombineOp {
    /// The member name used for this operator on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CombineOp::And => "and",
            CombineOp::Or => "or",
            CombineOp::Xor => "xor",
            CombineOp::Not => "and_not",
            CombineOp::AndMaybe => "and_maybe",
        }
    }

    /// Whether the first operand is privileged.
    pub fn is_order_sensitive(&self) -> bool {
        matches!(self, CombineOp::Not | CombineOp::AndMaybe)
    }
}

/// Kind of a meta query (queries about field presence rather than content).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaOp {
    /// The field is present, even if empty.
    Exists,
    /// The field is present and has a value.
    NonEmpty,
    /// The field is present with no value.
    Empty,
    /// Indexing the field produced an error.
    Error,
}

impl MetaOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaOp::Exists => "exists",
            MetaOp::NonEmpty => "nonempty",
            MetaOp::Empty => "empty",
            MetaOp::Error => "error",
        }
    }
}

/// One node of a query expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A query on the value of a named field.
    Field {
        field: String,
        operator: String,
        value: Value,
    },
    /// A meta query; `field == None` means "any field".
    Meta { op: MetaOp, field: Option<String> },
    MatchAll,
    MatchNone,
    /// A boolean combination. Always has at least one child.
    Combine { op: CombineOp, children: Vec<QueryNode> },
    /// Weights of `query` multiplied by `factor`.
    Scale { query: Box<QueryNode>, factor: f64 },
    /// A pre-built structure supplied through [`RawQuery`].
    Raw(Map<String, Value>),
}

impl QueryNode {
    /// Build the JSON structure sent to the server.
    ///
    /// The result owns all of its data, so nothing done to the operands
    /// afterwards can change it.
    pub fn to_json(&self) -> Value {
        match self {
            QueryNode::Field {
                field,
                operator,
                value,
            } => json!({ "field": [field, operator, value] }),
            QueryNode::Meta { op, field } => json!({ "meta": [op.as_str(), field] }),
            QueryNode::MatchAll => json!({ "matchall": true }),
            QueryNode::MatchNone => json!({ "matchnothing": true }),
            QueryNode::Combine { op, children } => {
                let subqueries: Vec<Value> = children.iter().map(QueryNode::to_json).collect();
                let mut obj = Map::new();
                obj.insert(op.as_str().to_string(), Value::Array(subqueries));
                Value::Object(obj)
            }
            QueryNode::Scale { query, factor } => json!({
                "scale": { "query": query.to_json(), "factor": factor }
            }),
            QueryNode::Raw(map) => Value::Object(map.clone()),
        }
    }
}

impl Serialize for QueryNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A caller-built query structure, given as an ordered list of members.
///
/// Lets pre-built JSON be mixed into expression trees without going
/// through the typed builders.
pub trait RawQuery {
    fn entries(&self) -> Vec<(String, Value)>;
}

impl RawQuery for Map<String, Value> {
    fn entries(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl RawQuery for BTreeMap<String, Value> {
    fn entries(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl RawQuery for HashMap<String, Value> {
    fn entries(&self) -> Vec<(String, Value)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// A query expression, optionally bound to the target it searches.
#[derive(Clone)]
pub struct Query {
    node: QueryNode,
    target: Option<TargetRef>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("node", &self.node)
            .field("target", &self.target.as_ref().map(|t| t.location()))
            .finish()
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
            && self.target.as_ref().map(|t| t.location())
                == other.target.as_ref().map(|t| t.location())
    }
}

impl From<QueryNode> for Query {
    fn from(node: QueryNode) -> Self {
        Query::new(node)
    }
}

impl Query {
    /// Wrap a node with no target.
    pub fn new(node: QueryNode) -> Self {
        Self { node, target: None }
    }

    /// Wrap a node bound to a target.
    pub fn with_target(node: QueryNode, target: Option<TargetRef>) -> Self {
        Self { node, target }
    }

    /// A query on a field. `operator` is the server's query type for the
    /// field (`"is"`, `"range"`, `"text"`, `"parse"`, ...).
    pub fn field(field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        Self::new(QueryNode::Field {
            field: field.into(),
            operator: operator.into(),
            value,
        })
    }

    /// A meta query about `field`, or about any field when `None`.
    pub fn meta(op: MetaOp, field: Option<&str>) -> Self {
        Self::new(QueryNode::Meta {
            op,
            field: field.map(str::to_string),
        })
    }

    /// Matches every document.
    pub fn all() -> Self {
        Self::new(QueryNode::MatchAll)
    }

    /// Matches no documents.
    pub fn none() -> Self {
        Self::new(QueryNode::MatchNone)
    }

    /// Snapshot a caller-supplied structure into a query.
    pub fn raw<R: RawQuery + ?Sized>(raw: &R) -> Self {
        Self::new(QueryNode::Raw(raw.entries().into_iter().collect()))
    }

    /// Combine any number of queries with `op`.
    ///
    /// When `target` is `None` it is resolved from the operands: the first
    /// bound target wins, and conflicting bound targets are an error.
    pub fn combine<I>(op: CombineOp, queries: I, target: Option<TargetRef>) -> Result<Self>
    where
        I: IntoIterator<Item = Query>,
    {
        let queries: Vec<Query> = queries.into_iter().collect();
        if queries.is_empty() {
            return Err(Error::EmptyCombination { op: op.as_str() });
        }
        let target = match target {
            Some(t) => Some(t),
            None => resolve_target(queries.iter().map(|q| q.target.as_ref()))?,
        };
        let children = queries.into_iter().map(|q| q.node).collect();
        Ok(Self {
            node: QueryNode::Combine { op, children },
            target,
        })
    }

    fn binary(&self, op: CombineOp, other: &Query) -> Result<Self> {
        Self::combine(op, [self.clone(), other.clone()], None)
    }

    pub fn and_with(&self, other: &Query) -> Result<Self> {
        self.binary(CombineOp::And, other)
    }

    pub fn or_with(&self, other: &Query) -> Result<Self> {
        self.binary(CombineOp::Or, other)
    }

    pub fn xor_with(&self, other: &Query) -> Result<Self> {
        self.binary(CombineOp::Xor, other)
    }

    /// Documents matching `self` but not `other`.
    pub fn not_with(&self, other: &Query) -> Result<Self> {
        self.binary(CombineOp::Not, other)
    }

    /// Documents matching `self`, with additional weight from `other`.
    pub fn and_maybe(&self, other: &Query) -> Result<Self> {
        self.binary(CombineOp::AndMaybe, other)
    }

    /// Documents matching both queries, weighted by `self` alone.
    pub fn filter(&self, other: &Query) -> Result<Self> {
        let membership = other.scale_by(0.0)?;
        self.binary(CombineOp::And, &membership)
    }

    /// Multiply the weights of this query by `factor`.
    ///
    /// Nested scales are kept as written; no folding happens.
    pub fn scale_by(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() {
            return Err(Error::InvalidFactor { factor });
        }
        Ok(Self {
            node: QueryNode::Scale {
                query: Box::new(self.node.clone()),
                factor,
            },
            target: self.target.clone(),
        })
    }

    /// Divide the weights of this query by `divisor`.
    pub fn divide_by(&self, divisor: f64) -> Result<Self> {
        if divisor == 0.0 {
            return Err(Error::DivisionByZero);
        }
        self.scale_by(1.0 / divisor)
    }

    pub fn node(&self) -> &QueryNode {
        &self.node
    }

    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    pub fn to_json(&self) -> Value {
        self.node.to_json()
    }

    /// Start a lazily evaluated search for this query.
    pub fn search(&self) -> Searchable {
        Searchable::new(self.clone())
    }
}
