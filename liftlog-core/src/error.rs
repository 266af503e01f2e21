use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiftlogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid table name: {0:?}")]
    InvalidTable(String),
}
