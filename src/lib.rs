//! # RestPose client
//!
//! A client for the RestPose document search server: build query trees,
//! describe searches, and page through results lazily.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │  Query   │──▶│   Search   │──▶│ Searchable │──▶│  Target  │──▶ POST …/search
//! │  (tree)  │   │ descriptor │   │  (paging)  │   │ (HTTP)   │
//! └──────────┘   └────────────┘   └─────┬──────┘   └──────────┘
//!                                       │
//!                                       ▼
//!                               ┌───────────────┐
//!                               │ SearchResults │
//!                               └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use restpose::{QueryTarget, Server};
//! use serde_json::json;
//!
//! # fn main() -> restpose::Result<()> {
//! let server = Server::new("http://127.0.0.1:7777")?;
//! let coll = server.collection("my_coll")?;
//! coll.add_doc(&json!({"text": "Hello world", "tag": "A tag"}), Some("blurb"), Some("1"))?;
//! coll.checkpoint(true)?.wait(&Default::default())?;
//!
//! let mut hits = coll.doc_type("blurb")?.field_is("tag", json!("A tag")).search();
//! println!("{} matches", hits.len()?);
//! for hit in hits.iter() {
//!     println!("{}", hit?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`query`] | Immutable query expression trees and combinators |
//! | [`search`] | Search descriptors (query plus paging and display options) |
//! | [`searchable`] | Lazy, sliceable result views with a cached window |
//! | [`results`] | Decoded search responses |
//! | [`target`] | The capability that executes searches |
//! | [`client`] | `Server`, `Collection` and `DocumentType` facades |
//! | [`checkpoint`] | Checkpoints and waiting for them |
//! | [`resource`] | Blocking JSON-over-HTTP transport |
//! | [`config`] | TOML client configuration |
//! | [`error`] | Error type |

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod resource;
pub mod results;
pub mod search;
pub mod searchable;
pub mod target;

pub use checkpoint::{CheckPoint, WaitPolicy};
pub use client::{Collection, DocumentType, QueryTarget, Server, StoredDocument};
pub use config::{load_config, ClientConfig};
pub use error::{Error, Result};
pub use query::{CombineOp, MetaOp, Query, QueryNode, RawQuery};
pub use results::{SearchResult, SearchResults};
pub use search::{CountOptions, OrderKey, SearchDescriptor, EXACT_COUNT};
pub use searchable::{ResultKey, Searchable, Selection, Slice};
pub use target::{Target, TargetRef};
