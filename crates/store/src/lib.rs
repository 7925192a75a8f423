//! Persistence and lane ordering for taskdeck
//!
//! Boards own tasks organized into three lanes (todo/doing/done); tasks
//! carry tags and comments. Everything lives in one SQLite file. The
//! `Store` is the only writer surface: task creation and lane moves go
//! through the position allocator so per-lane ordering stays consistent.

mod error;
mod models;
mod position;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{
    Board, BoardStats, Comment, NewTask, Priority, Tag, Task, TaskStatus, TaskUpdate,
    TaskWithTags,
};
pub use store::Store;
