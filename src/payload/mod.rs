// src/payload/mod.rs

//! Rewrites over the opaque task payload.
//!
//! The payload is a plain JSON tree. Certain single-key objects act as
//! placeholders that must be resolved before submission:
//!
//! - `{"task-reference": "..."}` and `{"artifact-reference": "..."}` are
//!   resolved by the optimizer once dependency identifiers are known
//!   ([`references`]).
//! - `{"relative-datestamp": "..."}` is resolved to an absolute time at
//!   submission ([`timestamps`]).

pub mod references;
pub mod timestamps;

use serde_json::{Map, Value};

use crate::errors::Result;

pub use references::resolve_task_references;
pub use timestamps::{json_time_from_now, resolve_timestamps};

/// Rebuild `value`, giving `placeholder` the chance to replace every
/// single-key object whose key it recognises.
///
/// `placeholder` receives `(key, value)` of a single-key object and returns
/// `Some(replacement)` to substitute it, or `None` to recurse normally.
pub(crate) fn rewrite<F>(value: &Value, placeholder: &mut F) -> Result<Value>
where
    F: FnMut(&str, &Value) -> Result<Option<Value>>,
{
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| rewrite(v, placeholder))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    if let Some(replacement) = placeholder(key, inner)? {
                        return Ok(replacement);
                    }
                }
            }
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), rewrite(v, placeholder)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}
