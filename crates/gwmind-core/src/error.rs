//! Error types for gwmind

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{field} set to {value}, clamped to {clamped}")]
    Bounds {
        field: &'static str,
        value: f64,
        clamped: f64,
    },

    #[error("codelet {codelet} has no memory named {name} at index {index}")]
    UnresolvedDependency {
        codelet: String,
        name: String,
        index: usize,
    },

    #[error("payload format error: {0}")]
    PayloadFormat(String),

    #[error("lock contention: {0}")]
    Contention(String),

    #[error("memory destroyed: {0}")]
    Destroyed(String),

    #[error("hook error: {codelet} - {message}")]
    Hook { codelet: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn bounds(field: &'static str, value: f64, clamped: f64) -> Self {
        Self::Bounds {
            field,
            value,
            clamped,
        }
    }

    pub fn hook(codelet: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            codelet: codelet.into(),
            message: message.into(),
        }
    }

    pub fn is_bounds(&self) -> bool {
        matches!(self, Self::Bounds { .. })
    }
}
