mod submissions;
mod subscribers;

pub use submissions::*;
pub use subscribers::*;

use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum PersistenceError {
    #[error("Subscriber already has an active subscription")]
    AlreadySubscribed,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Stored record is not valid: {0}")]
    CorruptRecord(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl std::fmt::Debug for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

const UNIQUE_VIOLATION: &str = "23505";

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
