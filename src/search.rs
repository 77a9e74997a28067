//! Search descriptors: a query plus paging and display parameters.
//!
//! A [`SearchDescriptor`] is plain data. Every adjustment returns a new
//! descriptor, so a descriptor handed out to one caller can be narrowed or
//! extended by another without either noticing.
//!
//! # Wire body
//!
//! ```text
//! {
//!   "query": <query>,            always present
//!   "from": <u64>,               omitted when 0
//!   "size": <u64>,               omitted when unset
//!   "check_at_least": <i64>,     omitted when 0
//!   "order_by": [ ... ],         omitted when unset
//!   "info": [ ... ]              omitted when empty
//! }
//! ```

use serde_json::{json, Map, Value};

use crate::query::QueryNode;

/// `check_at_least` value asking the server for an exact match count.
///
/// Exact counts can be expensive; nothing in this crate sends it unless the
/// caller asked for an exact count.
pub const EXACT_COUNT: i64 = -1;

/// What to order results by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    /// Order by the value stored in a field.
    Field(String),
    /// Order by relevance weight.
    Relevance,
}

/// One element of an `order_by` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub key: OrderKey,
    pub ascending: Option<bool>,
}

impl OrderClause {
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        match &self.key {
            OrderKey::Field(name) => {
                obj.insert("field".to_string(), json!(name));
            }
            OrderKey::Relevance => {
                obj.insert("score".to_string(), json!("weight"));
            }
        }
        if let Some(ascending) = self.ascending {
            obj.insert("ascending".to_string(), json!(ascending));
        }
        Value::Object(obj)
    }
}

/// Kind of auxiliary term statistics requested alongside a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    /// Per-term occurrence counts.
    Occur,
    /// Per-pair co-occurrence counts.
    Cooccur,
}

impl InfoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoKind::Occur => "occur",
            InfoKind::Cooccur => "cooccur",
        }
    }
}

/// Options for occurrence and co-occurrence requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountOptions {
    /// Stop after checking this many matching documents. `None` = unlimited.
    pub doc_limit: Option<u64>,
    /// Return counts for at most this many terms. `None` = unlimited.
    pub result_limit: Option<u64>,
    /// Also return database term frequencies.
    pub get_termfreqs: bool,
    /// Term suffixes to ignore.
    pub stopwords: Vec<String>,
}

/// An auxiliary computation for the server to run over the matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoRequest {
    pub kind: InfoKind,
    pub prefix: String,
    pub options: CountOptions,
}

impl InfoRequest {
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            self.kind.as_str().to_string(),
            json!({
                "prefix": self.prefix,
                "doc_limit": self.options.doc_limit,
                "result_limit": self.options.result_limit,
                "get_termfreqs": self.options.get_termfreqs,
                "stopwords": self.options.stopwords,
            }),
        );
        Value::Object(obj)
    }
}

/// A query with paging and display parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDescriptor {
    query: QueryNode,
    offset: u64,
    size: Option<u64>,
    check_at_least: i64,
    order_by: Option<Vec<OrderClause>>,
    info: Vec<InfoRequest>,
}

impl SearchDescriptor {
    pub fn new(query: QueryNode) -> Self {
        Self {
            query,
            offset: 0,
            size: None,
            check_at_least: 0,
            order_by: None,
            info: Vec::new(),
        }
    }

    pub fn query(&self) -> &QueryNode {
        &self.query
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn check_at_least_value(&self) -> i64 {
        self.check_at_least
    }

    pub fn order(&self) -> Option<&[OrderClause]> {
        self.order_by.as_deref()
    }

    pub fn info(&self) -> &[InfoRequest] {
        &self.info
    }

    /// Build the wire body, with per-call overrides taking precedence over
    /// the descriptor's own values.
    pub fn build(
        &self,
        offset: Option<u64>,
        size: Option<u64>,
        check_at_least: Option<i64>,
    ) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.to_json());

        let offset = offset.unwrap_or(self.offset);
        if offset != 0 {
            body.insert("from".to_string(), json!(offset));
        }

        if let Some(size) = size.or(self.size) {
            body.insert("size".to_string(), json!(size));
        }

        let check_at_least = check_at_least.unwrap_or(self.check_at_least);
        if check_at_least != 0 {
            body.insert("check_at_least".to_string(), json!(check_at_least));
        }

        if let Some(order_by) = &self.order_by {
            let clauses: Vec<Value> = order_by.iter().map(OrderClause::to_json).collect();
            body.insert("order_by".to_string(), Value::Array(clauses));
        }

        if !self.info.is_empty() {
            let info: Vec<Value> = self.info.iter().map(InfoRequest::to_json).collect();
            body.insert("info".to_string(), Value::Array(info));
        }

        Value::Object(body)
    }

    /// The wire body with no overrides.
    pub fn body(&self) -> Value {
        self.build(None, None, None)
    }

    pub fn with_offset(&self, offset: u64) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    pub fn with_size(&self, size: Option<u64>) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }

    pub(crate) fn with_range(&self, offset: u64, size: Option<u64>) -> Self {
        Self {
            offset,
            size,
            ..self.clone()
        }
    }

    /// Set the minimum number of documents the server should check.
    /// [`EXACT_COUNT`] asks for an exact match count.
    pub fn check_at_least(&self, check_at_least: i64) -> Self {
        Self {
            check_at_least,
            ..self.clone()
        }
    }

    /// Replace the ordering with a single clause.
    pub fn order_by(&self, key: OrderKey, ascending: Option<bool>) -> Self {
        Self {
            order_by: Some(vec![OrderClause { key, ascending }]),
            ..self.clone()
        }
    }

    /// Ask for occurrence counts of terms starting with `prefix`.
    pub fn request_occurrence(&self, prefix: &str, options: CountOptions) -> Self {
        self.with_info(InfoKind::Occur, prefix, options)
    }

    /// Ask for co-occurrence counts of term pairs starting with `prefix`.
    pub fn request_cooccurrence(&self, prefix: &str, options: CountOptions) -> Self {
        self.with_info(InfoKind::Cooccur, prefix, options)
    }

    fn with_info(&self, kind: InfoKind, prefix: &str, options: CountOptions) -> Self {
        let mut info = self.info.clone();
        info.push(InfoRequest {
            kind,
            prefix: prefix.to_string(),
            options,
        });
        Self {
            info,
            ..self.clone()
        }
    }
}
