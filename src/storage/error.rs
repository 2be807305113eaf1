use thiserror::Error;

/// Errors surfaced by repositories. Storage failures are passed through as-is.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("record must be a JSON object")]
    InvalidRecord,
    /// Writes refuse an empty filter rather than touching the whole table.
    #[error("empty criteria are not allowed for {0}")]
    EmptyCriteria(&'static str),
}

pub type DataResult<T> = Result<T, DataError>;

/// Column and table names are interpolated into SQL, so they must be plain identifiers.
pub fn validate_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn ensure_ident(ident: &str) -> DataResult<&str> {
    if validate_ident(ident) {
        Ok(ident)
    } else {
        Err(DataError::InvalidIdentifier(ident.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(validate_ident("created_at"));
        assert!(validate_ident("_x1"));
        assert!(!validate_ident("1abc"));
        assert!(!validate_ident("name; DROP TABLE users"));
        assert!(!validate_ident("a.b"));
        assert!(!validate_ident(""));
    }
}
