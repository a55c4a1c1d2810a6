#[derive(Debug, thiserror::Error)]
pub enum ExamError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid date for {field}: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error(
        "expiry date {explicit} does not match realization date + validity ({derived}); send one or make them agree"
    )]
    ExpiryMismatch {
        explicit: chrono::NaiveDate,
        derived: chrono::NaiveDate,
    },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("invalid text: {0}")]
    Text(#[from] exames_types::TextError),
    #[error("invalid email address: {0}")]
    Email(#[from] exames_types::EmailError),

    #[error("failed to read snapshot file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to create directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("snapshot schema mismatch at {path}: {message}")]
    SnapshotSchema { path: String, message: String },
    #[error("record store lock poisoned")]
    StorePoisoned,

    #[error("notification transport failed: {0}")]
    Transport(String),
}

impl ExamError {
    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExamError::InvalidInput(_)
                | ExamError::InvalidDate { .. }
                | ExamError::ExpiryMismatch { .. }
                | ExamError::DuplicateId { .. }
                | ExamError::Text(_)
                | ExamError::Email(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExamError::NotFound { .. })
    }
}

pub type ExamResult<T> = std::result::Result<T, ExamError>;
