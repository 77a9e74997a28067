//! The capability that executes searches.
//!
//! A [`Target`] takes a fully built search body and returns the raw JSON the
//! server produced for it. [`Collection`](crate::client::Collection) and
//! [`DocumentType`](crate::client::DocumentType) are the HTTP-backed
//! implementations; tests plug in recording stubs.

use serde_json::Value;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Something a search body can be sent to.
///
/// Implementations must surface transport and server failures as errors;
/// the paging engine passes them through to the caller unchanged.
pub trait Target: Send + Sync {
    /// Identity of the searched resource (e.g. `"/coll/docs/type/blurb"`).
    ///
    /// Two targets with the same location are the same target for the
    /// purpose of combining queries.
    fn location(&self) -> &str;

    /// Run one search and return the raw response payload.
    fn execute(&self, body: &Value) -> Result<Value>;
}

/// Shared handle to a target, as bound to queries and searches.
pub type TargetRef = Arc<dyn Target>;

/// Pick the target for a combination of operands.
///
/// The first bound target wins; unbound operands are ignored. Two bound
/// operands with different locations are an error.
pub(crate) fn resolve_target<'a, I>(targets: I) -> Result<Option<TargetRef>>
where
    I: IntoIterator<Item = Option<&'a TargetRef>>,
{
    let mut found: Option<&TargetRef> = None;
    for target in targets.into_iter().flatten() {
        match found {
            None => found = Some(target),
            Some(existing) if existing.location() != target.location() => {
                return Err(Error::InconsistentTargets {
                    first: existing.location().to_string(),
                    second: target.location().to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(found.cloned())
}
