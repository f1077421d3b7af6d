//! Memory payloads
//!
//! A payload is what a memory object holds. JSON documents compare
//! structurally, text and numbers by value, and opaque values by identity
//! of the shared allocation.

use crate::error::{Error, Result};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Field of a behavior-state document that identifies the behavior.
pub const NAME_FIELD: &str = "NAME";

#[derive(Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Number(f64),
    /// Arbitrary shared value. Equal only to clones of the same allocation.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Payload {
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Json(Value::Number(n)) => n.as_f64(),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Opaque(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// The `NAME` of a behavior-state payload.
    ///
    /// Accepts a JSON object directly or JSON text that parses to one. The
    /// `NAME` must be a JSON string; `1` and `"1"` are different behaviors.
    pub fn behavior_key(&self) -> Result<String> {
        let parsed;
        let doc = match self {
            Self::Json(v) => v,
            Self::Text(s) => {
                parsed = serde_json::from_str::<Value>(s)
                    .map_err(|e| Error::PayloadFormat(format!("not a JSON document: {}", e)))?;
                &parsed
            }
            other => {
                return Err(Error::PayloadFormat(format!(
                    "expected a JSON behavior state, got {:?}",
                    other
                )))
            }
        };

        match doc.get(NAME_FIELD) {
            Some(Value::String(name)) => Ok(name.clone()),
            Some(Value::Null) | None => Err(Error::PayloadFormat(format!(
                "behavior state has no {} field",
                NAME_FIELD
            ))),
            Some(other) => Err(Error::PayloadFormat(format!(
                "behavior state {} must be a string, got {}",
                NAME_FIELD, other
            ))),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Json(v) => write!(f, "Json({})", v),
            Self::Text(s) => write!(f, "Text({:?})", s),
            Self::Number(n) => write!(f, "Number({})", n),
            Self::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Json(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for Payload {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}
