use sea_orm::error::DbErr;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("Printer unavailable: {0}")]
    PrinterUnavailable(String),

    #[error("Print failed: {0}")]
    PrintFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Process exit code for this error.
    /// This is the single source of truth for error-to-exit-code mapping.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) | Self::InvalidOperation(_) => 2,
            Self::NotFound(_) => 3,
            Self::DatabaseError(_) | Self::ConnectionError(_) | Self::QueryError(_) => 4,
            Self::TemplateError(_) => 5,
            Self::PrinterUnavailable(_) | Self::PrintFailed(_) => 6,
            Self::Io(_) | Self::Other(_) => 1,
        }
    }

    /// Whether the failure comes from data that is missing rather than broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// Type alias for backwards compatibility
pub type AppError = ServiceError;
