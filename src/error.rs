use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the engine pipeline.
///
/// Every stage surfaces the first error it hits; nothing downstream runs
/// after that. The variants carry the structured fields callers assert on,
/// and `kind()` gives the stable name the facade prefixes onto messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Lexical error with 1-based source position.
    #[error("{reason} at line {line}, column {column}")]
    Lex {
        line: usize,
        column: usize,
        reason: String,
    },

    /// Syntax error: what the parser wanted vs. what it saw.
    #[error("expected {expected}, found {found} at line {line}, column {column}")]
    Parse {
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },

    /// Name resolution failure: unknown table/column, ambiguous reference,
    /// or a GROUP BY violation.
    #[error("{0}")]
    Semantic(String),

    /// Incompatible value assignment.
    #[error("{0}")]
    Type(String),

    /// Primary key / unique / not-null / foreign key violation.
    #[error("{0}")]
    Constraint(String),

    /// Persistence failure. Carries the rendered message so the error type
    /// stays comparable in tests.
    #[error("{0}")]
    Io(String),
}

impl Error {
    /// Stable kind name, used by the facade to tag error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Lex { .. } => "LexError",
            Error::Parse { .. } => "ParseError",
            Error::Semantic(_) => "SemanticError",
            Error::Type(_) => "TypeError",
            Error::Constraint(_) => "ConstraintError",
            Error::Io(_) => "IOError",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Io(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_error_kinds() {
        let err = Error::Constraint("duplicate primary key 1".into());
        assert_eq!(err.kind(), "ConstraintError");
        assert_eq!(err.to_string(), "duplicate primary key 1");

        let err = Error::Parse {
            line: 1,
            column: 8,
            expected: "FROM".into(),
            found: "WHERE".into(),
        };
        assert_eq!(err.kind(), "ParseError");
        assert_eq!(
            err.to_string(),
            "expected FROM, found WHERE at line 1, column 8"
        );
    }
}
