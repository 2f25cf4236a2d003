/// Rejected input at the store or dispatch boundary.
///
/// Every variant maps to a 400-class response; none of them are retryable.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title is required")]
    EmptyTitle,

    #[error("invalid status: {0:?} (expected past, present or future)")]
    InvalidStatus(String),

    #[error("{0}")]
    MissingField(&'static str),

    #[error("invalid id: {0:?}")]
    InvalidId(String),
}

impl ValidationError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::EmptyTitle => "empty_title",
            Self::InvalidStatus(_) => "invalid_status",
            Self::MissingField(_) => "missing_field",
            Self::InvalidId(_) => "invalid_id",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(ValidationError::EmptyTitle.to_string(), "Title is required");
        assert_eq!(
            ValidationError::MissingField("ID is required").to_string(),
            "ID is required"
        );
        assert!(ValidationError::InvalidStatus("later".into())
            .to_string()
            .contains("\"later\""));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(ValidationError::EmptyTitle.error_kind(), "empty_title");
        assert_eq!(
            ValidationError::InvalidId("x".into()).error_kind(),
            "invalid_id"
        );
    }
}
