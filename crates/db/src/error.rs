/// Failures that are specific to bringing the database up.
///
/// Query-level failures on request paths stay as plain `sqlx::Error`; this
/// type covers connection retry exhaustion and schema initialisation.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database unreachable after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to create {object}: {source}")]
    Integrity {
        object: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid database configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}
