use std::fmt;

use thiserror::Error;

pub mod keys;
pub mod memory;
pub mod tree;
pub mod yaml;

pub use memory::MemoryStore;
pub use yaml::YamlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode store file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("value at '{path}' is not a {expected}")]
    UnexpectedType { path: String, expected: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Key-value backend addressed by dotted paths (`proposals.3.title`).
///
/// Every call is a discrete, synchronous operation; a successful `set` or
/// `delete` is durable once it returns.
pub trait Store: Send + Sync {
    /// Reads the scalar at `path`. Sections and missing paths read as `None`.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Lists the direct children of the section at `path`.
    fn keys(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Removes `path` and everything below it. Returns whether anything was there.
    fn delete(&self, path: &str) -> Result<bool, StoreError>;

    fn contains(&self, path: &str) -> Result<bool, StoreError>;

    fn get_bool(&self, path: &str) -> Result<Option<bool>, StoreError> {
        match self.get(path)? {
            None => Ok(None),
            Some(Value::Bool(v)) => Ok(Some(v)),
            Some(_) => Err(StoreError::UnexpectedType { path: path.to_owned(), expected: "boolean" }),
        }
    }

    fn get_int(&self, path: &str) -> Result<Option<i64>, StoreError> {
        match self.get(path)? {
            None => Ok(None),
            Some(Value::Int(v)) => Ok(Some(v)),
            Some(_) => Err(StoreError::UnexpectedType { path: path.to_owned(), expected: "integer" }),
        }
    }

    fn get_text(&self, path: &str) -> Result<Option<String>, StoreError> {
        match self.get(path)? {
            None => Ok(None),
            Some(Value::Text(v)) => Ok(Some(v)),
            // Bukkit writes numeric-looking strings unquoted.
            Some(Value::Int(v)) => Ok(Some(v.to_string())),
            Some(_) => Err(StoreError::UnexpectedType { path: path.to_owned(), expected: "string" }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters_reject_wrong_type() {
        let store = MemoryStore::new();
        store.set("a.b", Value::from("text")).unwrap();

        assert!(matches!(store.get_bool("a.b"), Err(StoreError::UnexpectedType { expected: "boolean", .. })));
        assert_eq!(store.get_text("a.b").unwrap().as_deref(), Some("text"));
        assert_eq!(store.get_int("a.missing").unwrap(), None);
    }

    #[test]
    fn test_text_getter_accepts_unquoted_numbers() {
        let store = MemoryStore::new();
        store.set("proposals.1.title", Value::Int(2024)).unwrap();

        assert_eq!(store.get_text("proposals.1.title").unwrap().as_deref(), Some("2024"));
    }
}
