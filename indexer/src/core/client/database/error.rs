use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    Connection(String),

    #[error("Query failed during {operation}: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Unexpected value in {column}: {message}")]
    InvalidData { column: &'static str, message: String },

    #[error("Database error: {0}")]
    Other(String),
}

impl DatabaseError {
    pub(crate) fn query(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| DatabaseError::Query { operation, source }
    }
}
