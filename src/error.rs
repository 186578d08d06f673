//! Crate-wide error type.
//!
//! Every failure carries a kind (used by the HTTP layer to choose a status code
//! and by tests to assert on the failure class) and a process exit code
//! derived from that kind.

/// Failure classes surfaced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Raw input is missing a required field or a field has the wrong meaning/type.
    SchemaMismatch,
    /// A feature block or vector does not have the width the model was fit on.
    DimensionMismatch,
    /// A persisted artifact is absent, corrupt or incompatible.
    LoadError,
    /// A bootstrap statistic is undefined for the given sample.
    DegenerateResample,
    /// Bad user settings (ranges, counts, fractions).
    InvalidConfig,
    /// Not enough rows left to do the requested work.
    InsufficientData,
    /// File system or serialization failure outside of artifact loading.
    Io,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::SchemaMismatch | ErrorKind::InvalidConfig | ErrorKind::Io => 2,
            ErrorKind::InsufficientData => 3,
            ErrorKind::DimensionMismatch | ErrorKind::DegenerateResample => 4,
            ErrorKind::LoadError => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, message)
    }

    pub fn dimension(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DimensionMismatch, message)
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LoadError, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
