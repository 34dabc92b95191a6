//! Reader-tag dispatch.
//!
//! Tag handlers turn the payload of a `#name value` form into another
//! [`Value`]. They live in two places: a process-global registry and a
//! per-deserializer registry that shadows it. The global table starts out
//! with the two handlers EDN itself specifies, `#inst` (RFC3339 timestamp)
//! and `#base64` (byte string).
//!
//! Lookup takes a shared lock only for the duration of the map read; the
//! handler itself always runs outside the lock, so handlers are free to
//! decode EDN recursively or register more tags.
//!
//! ```rust
//! use serde_edn::{Deserializer, Value};
//!
//! let mut de = Deserializer::from_str("#inc 41");
//! de.add_tag_fn("inc", |v: Value| match v {
//!     Value::Int(n) => Ok(Value::Int(n + 1)),
//!     other => Err(format!("#inc expects an integer, got {other}")),
//! });
//! assert_eq!(de.decode::<i64>().unwrap(), 42);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::value::Value;

/// A registered tag handler: payload value in, replacement value out.
pub type TagFn = dyn Fn(Value) -> std::result::Result<Value, String> + Send + Sync;

/// A set of tag handlers keyed by tag name (without the `#`).
#[derive(Clone, Default)]
pub struct TagRegistry {
    handlers: HashMap<String, Arc<TagFn>>,
}

impl TagRegistry {
    #[must_use]
    pub fn new() -> Self {
        TagRegistry::default()
    }

    /// Registers a handler, returning `true` when a previous handler for the
    /// same tag was replaced.
    pub fn add<F>(&mut self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler)).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<TagFn>> {
        self.handlers.get(name).cloned()
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

static GLOBAL_TAGS: Lazy<RwLock<TagRegistry>> = Lazy::new(|| {
    let mut registry = TagRegistry::new();
    registry.add("inst", |value| match value {
        Value::String(text) => {
            let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339(&text)
                .map_err(|e| e.to_string())?
                .with_timezone(&Utc);
            Ok(Value::Inst(parsed))
        }
        other => Err(format!("#inst expects a string, got {}", other.kind())),
    });
    registry.add("base64", |value| match value {
        Value::String(text) => base64::engine::general_purpose::STANDARD
            .decode(text.as_bytes())
            .map(Value::Bytes)
            .map_err(|e| e.to_string()),
        other => Err(format!("#base64 expects a string, got {}", other.kind())),
    });
    RwLock::new(registry)
});

/// Registers a handler in the process-global table, shared by every
/// deserializer that has no instance handler for the tag. Returns `true`
/// when it replaced a previous registration.
pub fn add_tag_fn<F>(name: impl Into<String>, handler: F) -> bool
where
    F: Fn(Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
{
    GLOBAL_TAGS.write().add(name, handler)
}

/// Instance-then-global lookup. The returned handler is called with the
/// lock already released.
pub(crate) fn resolve(instance: &TagRegistry, name: &str) -> Option<Arc<TagFn>> {
    if let Some(handler) = instance.get(name) {
        return Some(handler);
    }
    GLOBAL_TAGS.read().get(name)
}

/// Runs a handler, wrapping its failure with the tag name.
pub(crate) fn apply(handler: &TagFn, name: &str, payload: Value) -> Result<Value> {
    handler(payload).map_err(|message| Error::TagHandler {
        tag: name.to_string(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_inst_parses_rfc3339() {
        let registry = TagRegistry::new();
        let handler = resolve(&registry, "inst").expect("inst is built in");
        let out = apply(&*handler, "inst", Value::from("2015-08-29T21:28:34.311-00:00")).unwrap();
        match out {
            Value::Inst(dt) => assert_eq!(dt.timestamp_millis(), 1_440_883_714_311),
            other => panic!("expected instant, got {other:?}"),
        }
    }

    #[test]
    fn builtin_base64_decodes() {
        let registry = TagRegistry::new();
        let handler = resolve(&registry, "base64").expect("base64 is built in");
        let out = apply(&*handler, "base64", Value::from("SGVsbG8sIEVETiBmcmllbmRz")).unwrap();
        assert_eq!(out, Value::Bytes(b"Hello, EDN friends".to_vec()));
    }

    #[test]
    fn instance_shadows_global() {
        let mut registry = TagRegistry::new();
        registry.add("inst", |_| Ok(Value::Nil));
        let handler = resolve(&registry, "inst").unwrap();
        assert_eq!(apply(&*handler, "inst", Value::from("x")).unwrap(), Value::Nil);
    }

    #[test]
    fn handler_errors_carry_tag_name() {
        let registry = TagRegistry::new();
        let handler = resolve(&registry, "inst").unwrap();
        let err = apply(&*handler, "inst", Value::Int(3)).unwrap_err();
        assert!(err.to_string().contains("#inst"));
    }
}
