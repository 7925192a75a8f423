//! Error types for the taskdeck store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A referenced board/task/tag/comment does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Invalid input: empty required field, unknown enum value
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn board_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Board",
            key: id.to_string(),
        }
    }

    pub fn task_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Task",
            key: id.to_string(),
        }
    }

    pub fn tag_not_found(name: &str) -> Self {
        Self::NotFound {
            entity: "Tag",
            key: name.to_string(),
        }
    }

    pub fn comment_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Comment",
            key: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_entity_and_id() {
        assert_eq!(Error::task_not_found(5).to_string(), "Task not found: 5");
        assert_eq!(Error::board_not_found(12).to_string(), "Board not found: 12");
        assert_eq!(Error::tag_not_found("urgent").to_string(), "Tag not found: urgent");
    }
}
