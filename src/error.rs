use crate::models::TaskId;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Task text cannot be empty")]
    EmptyText,

    #[error("Due date {0} is in the past")]
    PastDueDate(NaiveDate),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown priority: {0}")]
    UnknownPriority(String),

    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Reorder expected a permutation of {expected} tasks, got {got} ids")]
    ReorderMismatch { expected: usize, got: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Errors the input layer reports back to the user.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyText
                | Error::PastDueDate(_)
                | Error::InvalidDate(_)
                | Error::UnknownCategory(_)
                | Error::UnknownPriority(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
