//! Database error types

use std::fmt;
use thiserror::Error;

/// Columns the store keeps unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    Email,
    Username,
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Username => write!(f, "username"),
        }
    }
}

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Duplicate {key}: {value}")]
    Duplicate { key: UniqueKey, value: String },
}

impl DbError {
    /// True when the store rejected a write because `key` is already taken
    pub fn is_duplicate(&self, key: UniqueKey) -> bool {
        matches!(self, Self::Duplicate { key: k, .. } if *k == key)
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_matching() {
        let err = DbError::Duplicate {
            key: UniqueKey::Email,
            value: "a@x.com".to_string(),
        };
        assert!(err.is_duplicate(UniqueKey::Email));
        assert!(!err.is_duplicate(UniqueKey::Username));
        assert_eq!(err.to_string(), "Duplicate email: a@x.com");
    }
}
