//! Command handlers and the daemon/direct backend switch
//!
//! Every board and task command goes through a [`Backend`]: when the
//! daemon is enabled and answers a ping, operations delegate over IPC;
//! otherwise the database is opened directly. Tag, comment, and search
//! commands always open the database directly.

use std::fs;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use taskdeck_ipc::{Client, RequestOp};
use taskdeck_store::{
    Board, NewTask, Priority, Store, Task, TaskStatus, TaskUpdate,
};

use crate::config::{self, Config};

pub enum Backend {
    Daemon(Client),
    Direct(Store),
}

impl Backend {
    /// Pick a backend: the daemon if it is enabled and answering,
    /// otherwise the database directly.
    pub async fn connect(config: &Config) -> Result<Self> {
        if config.daemon.enabled {
            let socket_path = config::get_socket_path(config)?;
            let client = Client::new(&socket_path);
            if client.ping().await? {
                return Ok(Self::Daemon(client));
            }
            tracing::debug!("Daemon not reachable, using the database directly");
        }
        Ok(Self::Direct(open_store(config)?))
    }

    pub async fn list_boards(&self, include_archived: bool) -> Result<Vec<Board>> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::BoardsList { include_archived })
                    .await?;
                decode(data, "boards")
            }
            Self::Direct(store) => Ok(store.list_boards(include_archived)?),
        }
    }

    pub async fn create_board(&self, name: &str, description: &str) -> Result<Board> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::BoardsCreate {
                        name: name.to_string(),
                        description: if description.is_empty() {
                            None
                        } else {
                            Some(description.to_string())
                        },
                    })
                    .await?;
                decode(data, "board")
            }
            Self::Direct(store) => Ok(store.create_board(name, description)?),
        }
    }

    pub async fn archive_board(&self, id: i64) -> Result<Board> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::BoardsUpdate {
                        id,
                        name: None,
                        description: None,
                        archived: Some(true),
                    })
                    .await?;
                decode(data, "board")
            }
            Self::Direct(store) => Ok(store.archive_board(id, true)?),
        }
    }

    pub async fn delete_board(&self, id: i64) -> Result<()> {
        match self {
            Self::Daemon(client) => {
                client.request(RequestOp::BoardsDelete { id }).await?;
                Ok(())
            }
            Self::Direct(store) => Ok(store.delete_board(id)?),
        }
    }

    pub async fn list_tasks(
        &self,
        board_id: Option<i64>,
        status: Option<TaskStatus>,
        include_archived: bool,
    ) -> Result<Vec<Task>> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::TasksList {
                        board_id,
                        status,
                        include_archived,
                    })
                    .await?;
                decode(data, "tasks")
            }
            Self::Direct(store) => Ok(store.list_tasks(board_id, status, include_archived)?),
        }
    }

    pub async fn get_task(&self, id: i64) -> Result<Task> {
        match self {
            Self::Daemon(client) => {
                let data = client.request(RequestOp::TasksGet { id }).await?;
                decode(data, "task")
            }
            Self::Direct(store) => Ok(store.get_task(id)?),
        }
    }

    pub async fn create_task(&self, new: NewTask) -> Result<Task> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::TasksCreate {
                        board_id: new.board_id,
                        title: new.title,
                        description: if new.description.is_empty() {
                            None
                        } else {
                            Some(new.description)
                        },
                        status: Some(new.status),
                        priority: Some(new.priority),
                        due_date: new.due_date,
                    })
                    .await?;
                decode(data, "task")
            }
            Self::Direct(store) => Ok(store.create_task(new)?),
        }
    }

    pub async fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::TasksUpdate {
                        id,
                        title: update.title,
                        description: update.description,
                        status: update.status,
                        priority: update.priority,
                        due_date: update.due_date,
                        archived: update.archived,
                    })
                    .await?;
                decode(data, "task")
            }
            Self::Direct(store) => Ok(store.update_task(id, update)?),
        }
    }

    pub async fn move_task(
        &self,
        id: i64,
        status: TaskStatus,
        position: Option<i64>,
    ) -> Result<Task> {
        match self {
            Self::Daemon(client) => {
                let data = client
                    .request(RequestOp::TasksMove {
                        id,
                        status,
                        position,
                    })
                    .await?;
                decode(data, "task")
            }
            Self::Direct(store) => Ok(store.move_task(id, status, position)?),
        }
    }

    pub async fn delete_task(&self, id: i64) -> Result<()> {
        match self {
            Self::Daemon(client) => {
                client.request(RequestOp::TasksDelete { id }).await?;
                Ok(())
            }
            Self::Direct(store) => Ok(store.delete_task(id)?),
        }
    }
}

/// Open the SQLite store at the configured path, creating parents.
pub fn open_store(config: &Config) -> Result<Store> {
    let db_path = config::get_db_path(config)?;
    if let Some(parent) = db_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }
    }
    Store::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

fn decode<T: DeserializeOwned>(mut data: serde_json::Value, key: &str) -> Result<T> {
    let field = data
        .get_mut(key)
        .map(serde_json::Value::take)
        .unwrap_or(serde_json::Value::Null);
    serde_json::from_value(field)
        .with_context(|| format!("Malformed daemon response: missing or invalid `{}`", key))
}

fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "[ ]",
        TaskStatus::Doing => "[~]",
        TaskStatus::Done => "[x]",
    }
}

fn print_task_line(task: &Task) {
    let priority = if task.priority != Priority::Medium {
        format!(" ({})", task.priority.as_str())
    } else {
        String::new()
    };
    let due = match task.due_date {
        Some(date) => format!(" due {}", date),
        None => String::new(),
    };
    println!(
        "  {} [{}] {}{}{}",
        status_icon(task.status),
        task.id,
        task.title,
        priority,
        due
    );
}

pub async fn boards(backend: &Backend) -> Result<()> {
    // Direct access gets the aggregated counts in one query; over the
    // wire they come from per-board task listings.
    let lines: Vec<(i64, String, usize)> = match backend {
        Backend::Direct(store) => store
            .board_stats()?
            .into_iter()
            .map(|s| (s.board.id, s.board.name, s.task_count as usize))
            .collect(),
        Backend::Daemon(_) => {
            let boards = backend.list_boards(false).await?;
            let mut lines = Vec::with_capacity(boards.len());
            for board in boards {
                let count = backend.list_tasks(Some(board.id), None, false).await?.len();
                lines.push((board.id, board.name, count));
            }
            lines
        }
    };

    if lines.is_empty() {
        println!("No boards found. Create one with: taskdeck board create <name>");
        return Ok(());
    }
    println!("Boards:");
    for (id, name, count) in &lines {
        println!("  [{}] {} ({} tasks)", id, name, count);
    }
    Ok(())
}

pub async fn board_create(backend: &Backend, name: &str, description: &str) -> Result<()> {
    let board = backend.create_board(name, description).await?;
    println!("Created board \"{}\" with ID {}", board.name, board.id);
    Ok(())
}

pub async fn board_archive(backend: &Backend, id: i64) -> Result<()> {
    let board = backend.archive_board(id).await?;
    println!("Archived board \"{}\"", board.name);
    Ok(())
}

pub async fn board_delete(backend: &Backend, id: i64) -> Result<()> {
    backend.delete_board(id).await?;
    println!("Deleted board {}", id);
    Ok(())
}

pub async fn list(
    backend: &Backend,
    board: Option<i64>,
    status: Option<TaskStatus>,
    include_archived: bool,
) -> Result<()> {
    let tasks = backend.list_tasks(board, status, include_archived).await?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    println!("Tasks:");
    for task in &tasks {
        print_task_line(task);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn add(
    backend: &Backend,
    title: &str,
    board: Option<i64>,
    description: Option<String>,
    priority: Option<Priority>,
    due: Option<NaiveDate>,
    status: Option<TaskStatus>,
) -> Result<()> {
    let board_id = match board {
        Some(id) => id,
        None => {
            // Default to the oldest live board, like the original CLI
            let boards = backend.list_boards(false).await?;
            boards
                .iter()
                .map(|b| b.id)
                .min()
                .context("No boards found. Create one with: taskdeck board create <name>")?
        }
    };

    let mut new = NewTask::new(board_id, title);
    if let Some(description) = description {
        new = new.with_description(description);
    }
    if let Some(priority) = priority {
        new = new.with_priority(priority);
    }
    if let Some(due) = due {
        new = new.with_due_date(due);
    }
    if let Some(status) = status {
        new = new.with_status(status);
    }

    let task = backend.create_task(new).await?;
    println!(
        "Created task \"{}\" (ID: {}) in board {}",
        task.title, task.id, task.board_id
    );
    Ok(())
}

/// The `todo`/`doing`/`done` shorthands: append-move into the lane.
pub async fn set_status(backend: &Backend, id: i64, status: TaskStatus) -> Result<()> {
    let task = backend.move_task(id, status, None).await?;
    println!("Marked task \"{}\" as {}", task.title, status.as_str());
    Ok(())
}

pub async fn move_task(
    backend: &Backend,
    id: i64,
    status: TaskStatus,
    position: Option<i64>,
) -> Result<()> {
    let task = backend.move_task(id, status, position).await?;
    match position {
        Some(p) => println!(
            "Moved task \"{}\" to {} at position {}",
            task.title,
            status.as_str(),
            p
        ),
        None => println!("Moved task \"{}\" to {}", task.title, status.as_str()),
    }
    Ok(())
}

pub async fn edit(
    backend: &Backend,
    id: i64,
    title: Option<String>,
    description: Option<String>,
    priority: Option<Priority>,
    due: Option<String>,
) -> Result<()> {
    // "none" clears the due date; anything else must parse as a date.
    let due_date = match due.as_deref() {
        None => None,
        Some("none") => Some(None),
        Some(raw) => {
            let date: NaiveDate = raw
                .parse()
                .with_context(|| format!("Invalid date: {} (expected YYYY-MM-DD or \"none\")", raw))?;
            Some(Some(date))
        }
    };

    let update = TaskUpdate {
        title,
        description,
        status: None,
        priority,
        due_date,
        position: None,
        archived: None,
    };
    if update.is_empty() {
        anyhow::bail!("Nothing to edit; pass at least one of --title/--description/--priority/--due");
    }

    let task = backend.update_task(id, update).await?;
    println!("Updated task \"{}\"", task.title);
    Ok(())
}

pub async fn archive(backend: &Backend, id: i64) -> Result<()> {
    let update = TaskUpdate {
        archived: Some(true),
        ..Default::default()
    };
    let task = backend.update_task(id, update).await?;
    println!("Archived task \"{}\"", task.title);
    Ok(())
}

pub async fn delete(backend: &Backend, id: i64) -> Result<()> {
    let task = backend.get_task(id).await?;
    backend.delete_task(id).await?;
    println!("Deleted task \"{}\"", task.title);
    Ok(())
}

pub fn tag(store: &Store, task_id: i64, name: &str) -> Result<()> {
    let tag = store.attach_tag(task_id, name)?;
    println!("Tagged task {} with \"{}\"", task_id, tag.name);
    Ok(())
}

pub fn untag(store: &Store, task_id: i64, name: &str) -> Result<()> {
    store.detach_tag(task_id, name)?;
    println!("Removed tag \"{}\" from task {}", name, task_id);
    Ok(())
}

pub fn comment(store: &Store, task_id: i64, content: &str) -> Result<()> {
    let comment = store.add_comment(task_id, content)?;
    println!("Added comment {} to task {}", comment.id, task_id);
    Ok(())
}

pub fn comments(store: &Store, task_id: i64) -> Result<()> {
    let comments = store.list_comments(task_id)?;
    if comments.is_empty() {
        println!("No comments on task {}.", task_id);
        return Ok(());
    }
    for comment in &comments {
        println!(
            "  [{}] {} ({})",
            comment.id,
            comment.content,
            comment.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub fn search(store: &Store, query: &str, board: Option<i64>) -> Result<()> {
    let tasks = store.list_tasks_with_tags(board)?;
    let results = taskdeck_fuzzy::fuzzy_search(tasks, query, |t| t.search_text());
    if results.is_empty() {
        println!("No tasks match \"{}\"", query);
        return Ok(());
    }
    for (task, m) in &results {
        println!(
            "  {:>6.1}  {} [{}] {}",
            m.score,
            status_icon(task.task.status),
            task.task.id,
            task.task.title
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_backend() -> Backend {
        Backend::Direct(Store::memory().unwrap())
    }

    #[tokio::test]
    async fn direct_backend_creates_and_lists() {
        let backend = direct_backend();
        let board = backend.create_board("Work", "").await.unwrap();
        backend
            .create_task(NewTask::new(board.id, "Fix bug"))
            .await
            .unwrap();

        let tasks = backend.list_tasks(Some(board.id), None, false).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Fix bug");
    }

    #[tokio::test]
    async fn direct_backend_moves_through_the_allocator() {
        let backend = direct_backend();
        let board = backend.create_board("Work", "").await.unwrap();
        let task = backend
            .create_task(NewTask::new(board.id, "a"))
            .await
            .unwrap();

        let moved = backend
            .move_task(task.id, TaskStatus::Done, None)
            .await
            .unwrap();
        assert_eq!(moved.status, TaskStatus::Done);
        assert_eq!(moved.position, 0);
    }

    #[tokio::test]
    async fn archive_goes_through_update() {
        let backend = direct_backend();
        let board = backend.create_board("Work", "").await.unwrap();
        let task = backend
            .create_task(NewTask::new(board.id, "a"))
            .await
            .unwrap();

        let update = TaskUpdate {
            archived: Some(true),
            ..Default::default()
        };
        let archived = backend.update_task(task.id, update).await.unwrap();
        assert!(archived.archived);
    }

    #[test]
    fn icons_match_the_lane() {
        assert_eq!(status_icon(TaskStatus::Todo), "[ ]");
        assert_eq!(status_icon(TaskStatus::Doing), "[~]");
        assert_eq!(status_icon(TaskStatus::Done), "[x]");
    }
}
