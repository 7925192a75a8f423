//! SQLite-backed repository for boards, tasks, tags, and comments
//!
//! A single `Mutex<Connection>` serializes all access; every mutation is
//! committed before the call returns, so reads from another process see it
//! immediately. Task ordering goes through the allocator in `position.rs`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{
    Board, BoardStats, Comment, NewTask, Tag, Task, TaskStatus, TaskUpdate, TaskWithTags,
};
use crate::position::next_position;
use crate::schema::{PRAGMAS, SCHEMA};

const BOARD_COLS: &str = "id, name, description, created_at, updated_at, archived";
const TASK_COLS: &str =
    "id, board_id, title, description, status, priority, due_date, position, created_at, updated_at, archived";

/// The on-disk store
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path`, creating parent
    /// directories and applying the schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// In-memory database for tests.
    pub fn memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn connection(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement; the connection
        // itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ========== Board Operations ==========

    pub fn create_board(&self, name: &str, description: &str) -> Result<Board> {
        if name.trim().is_empty() {
            return Err(Error::validation("Board name must not be empty"));
        }
        let conn = self.connection();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO boards (name, description, created_at, updated_at, archived)
             VALUES (?1, ?2, ?3, ?3, 0)",
            params![name, description, now],
        )?;
        fetch_board(&conn, conn.last_insert_rowid())
    }

    /// Get a board by id. Archived boards stay addressable until deleted.
    pub fn get_board(&self, id: i64) -> Result<Board> {
        fetch_board(&self.connection(), id)
    }

    pub fn update_board(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Board> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(Error::validation("Board name must not be empty"));
            }
        }
        let conn = self.connection();
        let existing = fetch_board(&conn, id)?;
        conn.execute(
            "UPDATE boards SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                name.unwrap_or(&existing.name),
                description.unwrap_or(&existing.description),
                Utc::now(),
                id
            ],
        )?;
        fetch_board(&conn, id)
    }

    /// Hard delete; cascades to the board's tasks and their comments and
    /// tag links.
    pub fn delete_board(&self, id: i64) -> Result<()> {
        let conn = self.connection();
        let changed = conn.execute("DELETE FROM boards WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::board_not_found(id));
        }
        Ok(())
    }

    /// Set the archived flag. Does not touch the board's tasks, and is
    /// idempotent apart from `updated_at`.
    pub fn archive_board(&self, id: i64, archived: bool) -> Result<Board> {
        let conn = self.connection();
        let changed = conn.execute(
            "UPDATE boards SET archived = ?1, updated_at = ?2 WHERE id = ?3",
            params![archived, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(Error::board_not_found(id));
        }
        fetch_board(&conn, id)
    }

    pub fn list_boards(&self, include_archived: bool) -> Result<Vec<Board>> {
        let conn = self.connection();
        let sql = if include_archived {
            format!("SELECT {BOARD_COLS} FROM boards ORDER BY name")
        } else {
            format!("SELECT {BOARD_COLS} FROM boards WHERE archived = 0 ORDER BY name")
        };
        let mut stmt = conn.prepare(&sql)?;
        let boards = stmt
            .query_map([], board_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(boards)
    }

    /// Non-archived boards with per-lane counts of their live tasks,
    /// most recently updated first.
    pub fn board_stats(&self) -> Result<Vec<BoardStats>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT
                b.id, b.name, b.description, b.created_at, b.updated_at, b.archived,
                COALESCE(SUM(CASE WHEN t.archived = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN t.status = 'todo' AND t.archived = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN t.status = 'doing' AND t.archived = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN t.status = 'done' AND t.archived = 0 THEN 1 ELSE 0 END), 0)
             FROM boards b
             LEFT JOIN tasks t ON t.board_id = b.id
             WHERE b.archived = 0
             GROUP BY b.id
             ORDER BY b.updated_at DESC",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(BoardStats {
                    board: board_from_row(row)?,
                    task_count: row.get(6)?,
                    todo_count: row.get(7)?,
                    doing_count: row.get(8)?,
                    done_count: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    // ========== Task Operations ==========

    /// Create a task, appending it to its lane. The whole
    /// read-max-then-insert runs in one transaction.
    pub fn create_task(&self, new: NewTask) -> Result<Task> {
        if new.title.trim().is_empty() {
            return Err(Error::validation("Task title must not be empty"));
        }
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        let board_exists = tx
            .query_row(
                "SELECT 1 FROM boards WHERE id = ?1",
                params![new.board_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !board_exists {
            return Err(Error::board_not_found(new.board_id));
        }
        let position = next_position(&tx, new.board_id, new.status, None)?;
        let now = Utc::now();
        tx.execute(
            "INSERT INTO tasks (board_id, title, description, status, priority, due_date, position, created_at, updated_at, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, 0)",
            params![
                new.board_id,
                new.title,
                new.description,
                new.status,
                new.priority,
                new.due_date,
                position,
                now
            ],
        )?;
        let task = fetch_task(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(task)
    }

    /// Get a task by id. Archived tasks stay addressable until deleted.
    pub fn get_task(&self, id: i64) -> Result<Task> {
        fetch_task(&self.connection(), id)
    }

    pub fn get_task_with_tags(&self, id: i64) -> Result<TaskWithTags> {
        let conn = self.connection();
        let task = fetch_task(&conn, id)?;
        let tags = tags_for_task(&conn, id)?;
        Ok(TaskWithTags { task, tags })
    }

    /// Apply the provided fields and refresh `updated_at`. A status change
    /// here does not renumber lanes; lane moves go through `move_task`.
    pub fn update_task(&self, id: i64, update: TaskUpdate) -> Result<Task> {
        if let Some(title) = &update.title {
            if title.trim().is_empty() {
                return Err(Error::validation("Task title must not be empty"));
            }
        }
        let conn = self.connection();
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(title) = update.title {
            sets.push("title = ?");
            values.push(Box::new(title));
        }
        if let Some(description) = update.description {
            sets.push("description = ?");
            values.push(Box::new(description));
        }
        if let Some(status) = update.status {
            sets.push("status = ?");
            values.push(Box::new(status));
        }
        if let Some(priority) = update.priority {
            sets.push("priority = ?");
            values.push(Box::new(priority));
        }
        if let Some(due_date) = update.due_date {
            sets.push("due_date = ?");
            values.push(Box::new(due_date));
        }
        if let Some(position) = update.position {
            sets.push("position = ?");
            values.push(Box::new(position));
        }
        if let Some(archived) = update.archived {
            sets.push("archived = ?");
            values.push(Box::new(archived));
        }
        sets.push("updated_at = ?");
        values.push(Box::new(Utc::now()));
        values.push(Box::new(id));

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let changed = conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(Error::task_not_found(id));
        }
        fetch_task(&conn, id)
    }

    /// Hard delete; cascades to comments and tag links. The vacated lane
    /// keeps its gap.
    pub fn delete_task(&self, id: i64) -> Result<()> {
        let conn = self.connection();
        let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::task_not_found(id));
        }
        Ok(())
    }

    /// Set the archived flag; idempotent apart from `updated_at`.
    pub fn archive_task(&self, id: i64, archived: bool) -> Result<Task> {
        let conn = self.connection();
        let changed = conn.execute(
            "UPDATE tasks SET archived = ?1, updated_at = ?2 WHERE id = ?3",
            params![archived, Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(Error::task_not_found(id));
        }
        fetch_task(&conn, id)
    }

    /// List tasks ordered by (status, position, created_at DESC).
    pub fn list_tasks(
        &self,
        board_id: Option<i64>,
        status: Option<TaskStatus>,
        include_archived: bool,
    ) -> Result<Vec<Task>> {
        let conn = self.connection();
        let mut sql = format!("SELECT {TASK_COLS} FROM tasks WHERE 1 = 1");
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if !include_archived {
            sql.push_str(" AND archived = 0");
        }
        if let Some(board_id) = board_id {
            sql.push_str(" AND board_id = ?");
            values.push(Box::new(board_id));
        }
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            values.push(Box::new(status));
        }
        sql.push_str(" ORDER BY status, position, created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params_from_iter(values), task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    /// Live tasks joined with their tags, for display and search.
    pub fn list_tasks_with_tags(&self, board_id: Option<i64>) -> Result<Vec<TaskWithTags>> {
        let tasks = self.list_tasks(board_id, None, false)?;
        let conn = self.connection();
        tasks
            .into_iter()
            .map(|task| {
                let tags = tags_for_task(&conn, task.id)?;
                Ok(TaskWithTags { task, tags })
            })
            .collect()
    }

    // ========== Tag Operations ==========

    /// Attach a tag by name, creating it (color "blue") on first use.
    /// Names are matched case-sensitively. Attaching twice is a no-op.
    pub fn attach_tag(&self, task_id: i64, name: &str) -> Result<Tag> {
        if name.trim().is_empty() {
            return Err(Error::validation("Tag name must not be empty"));
        }
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        fetch_task(&tx, task_id)?;
        let tag = match find_tag(&tx, name)? {
            Some(tag) => tag,
            None => {
                tx.execute(
                    "INSERT INTO tags (name, color) VALUES (?1, 'blue')",
                    params![name],
                )?;
                Tag {
                    id: tx.last_insert_rowid(),
                    name: name.to_string(),
                    color: "blue".to_string(),
                }
            }
        };
        tx.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task_id, tag.id],
        )?;
        tx.commit()?;
        Ok(tag)
    }

    /// Detach a tag from a task. The tag itself is never deleted, even
    /// when unreferenced.
    pub fn detach_tag(&self, task_id: i64, name: &str) -> Result<()> {
        let conn = self.connection();
        fetch_task(&conn, task_id)?;
        let tag = find_tag(&conn, name)?.ok_or_else(|| Error::tag_not_found(name))?;
        conn.execute(
            "DELETE FROM task_tags WHERE task_id = ?1 AND tag_id = ?2",
            params![task_id, tag.id],
        )?;
        Ok(())
    }

    pub fn list_tags_for_task(&self, task_id: i64) -> Result<Vec<Tag>> {
        let conn = self.connection();
        fetch_task(&conn, task_id)?;
        tags_for_task(&conn, task_id)
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.connection();
        let mut stmt = conn.prepare("SELECT id, name, color FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], tag_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }

    // ========== Comment Operations ==========

    pub fn add_comment(&self, task_id: i64, content: &str) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(Error::validation("Comment content must not be empty"));
        }
        let conn = self.connection();
        fetch_task(&conn, task_id)?;
        conn.execute(
            "INSERT INTO comments (task_id, content, created_at) VALUES (?1, ?2, ?3)",
            params![task_id, content, Utc::now()],
        )?;
        fetch_comment(&conn, conn.last_insert_rowid())
    }

    pub fn edit_comment(&self, id: i64, content: &str) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(Error::validation("Comment content must not be empty"));
        }
        let conn = self.connection();
        let changed = conn.execute(
            "UPDATE comments SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;
        if changed == 0 {
            return Err(Error::comment_not_found(id));
        }
        fetch_comment(&conn, id)
    }

    pub fn delete_comment(&self, id: i64) -> Result<()> {
        let conn = self.connection();
        let changed = conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(Error::comment_not_found(id));
        }
        Ok(())
    }

    /// Comments for a task, oldest first.
    pub fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>> {
        let conn = self.connection();
        fetch_task(&conn, task_id)?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, content, created_at FROM comments
             WHERE task_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let comments = stmt
            .query_map(params![task_id], comment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }
}

// ========== Row mapping and shared lookups ==========

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        archived: row.get(5)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        priority: row.get(5)?,
        due_date: row.get(6)?,
        position: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        archived: row.get(10)?,
    })
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        task_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn fetch_board(conn: &Connection, id: i64) -> Result<Board> {
    conn.query_row(
        &format!("SELECT {BOARD_COLS} FROM boards WHERE id = ?1"),
        params![id],
        board_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::board_not_found(id))
}

pub(crate) fn fetch_task(conn: &Connection, id: i64) -> Result<Task> {
    conn.query_row(
        &format!("SELECT {TASK_COLS} FROM tasks WHERE id = ?1"),
        params![id],
        task_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::task_not_found(id))
}

fn fetch_comment(conn: &Connection, id: i64) -> Result<Comment> {
    conn.query_row(
        "SELECT id, task_id, content, created_at FROM comments WHERE id = ?1",
        params![id],
        comment_from_row,
    )
    .optional()?
    .ok_or_else(|| Error::comment_not_found(id))
}

fn find_tag(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    Ok(conn
        .query_row(
            "SELECT id, name, color FROM tags WHERE name = ?1",
            params![name],
            tag_from_row,
        )
        .optional()?)
}

fn tags_for_task(conn: &Connection, task_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.color FROM tags t
         INNER JOIN task_tags tt ON tt.tag_id = t.id
         WHERE tt.task_id = ?1 ORDER BY t.name",
    )?;
    let tags = stmt
        .query_map(params![task_id], tag_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn store() -> Store {
        Store::memory().unwrap()
    }

    #[test]
    fn board_crud_round_trip() {
        let store = store();
        let board = store.create_board("Work", "day job").unwrap();
        assert_eq!(board.name, "Work");
        assert!(!board.archived);

        let updated = store.update_board(board.id, Some("Job"), None).unwrap();
        assert_eq!(updated.name, "Job");
        assert_eq!(updated.description, "day job");

        store.delete_board(board.id).unwrap();
        assert!(matches!(
            store.get_board(board.id),
            Err(Error::NotFound { entity: "Board", .. })
        ));
    }

    #[test]
    fn create_board_rejects_empty_name() {
        let store = store();
        assert!(matches!(
            store.create_board("  ", ""),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn create_task_requires_live_board() {
        let store = store();
        let err = store.create_task(NewTask::new(42, "orphan")).unwrap_err();
        assert_eq!(err.to_string(), "Board not found: 42");
    }

    #[test]
    fn create_task_applies_defaults() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.position, 0);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn update_task_touches_only_provided_fields() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store
            .create_task(NewTask::new(board.id, "Fix bug").with_description("crash"))
            .unwrap();

        let updated = store
            .update_task(
                task.id,
                TaskUpdate {
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.title, "Fix bug");
        assert_eq!(updated.description, "crash");
        assert!(updated.updated_at >= task.updated_at);
    }

    #[test]
    fn update_task_clears_due_date_with_inner_none() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let due = chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let task = store
            .create_task(NewTask::new(board.id, "Fix bug").with_due_date(due))
            .unwrap();
        assert_eq!(task.due_date, Some(due));

        let updated = store
            .update_task(
                task.id,
                TaskUpdate {
                    due_date: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.due_date, None);
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let store = store();
        let err = store
            .update_task(5, TaskUpdate::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Task not found: 5");
    }

    #[test]
    fn archive_task_is_idempotent() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();

        let once = store.archive_task(task.id, true).unwrap();
        let twice = store.archive_task(task.id, true).unwrap();
        assert!(once.archived && twice.archived);
        assert_eq!(once.title, twice.title);
        assert_eq!(once.position, twice.position);
        assert!(twice.updated_at >= once.updated_at);

        let restored = store.archive_task(task.id, false).unwrap();
        assert!(!restored.archived);
    }

    #[test]
    fn archived_tasks_hidden_from_default_listing_but_addressable() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        store.archive_task(task.id, true).unwrap();

        assert!(store.list_tasks(Some(board.id), None, false).unwrap().is_empty());
        assert_eq!(store.list_tasks(Some(board.id), None, true).unwrap().len(), 1);
        assert_eq!(store.get_task(task.id).unwrap().id, task.id);
    }

    #[test]
    fn archiving_board_does_not_archive_tasks() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        store.archive_board(board.id, true).unwrap();

        assert!(!store.get_task(task.id).unwrap().archived);
        assert!(store.list_boards(false).unwrap().is_empty());
        assert_eq!(store.list_boards(true).unwrap().len(), 1);
    }

    #[test]
    fn deleting_board_cascades_to_tasks_comments_and_links() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        store.add_comment(task.id, "looking into it").unwrap();
        store.attach_tag(task.id, "backend").unwrap();

        store.delete_board(board.id).unwrap();

        assert!(store.get_task(task.id).is_err());
        let conn = store.connection();
        let comments: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap();
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM task_tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!((comments, links), (0, 0));
        drop(conn);

        // Tags survive their last reference.
        assert_eq!(store.list_tags().unwrap().len(), 1);
    }

    #[test]
    fn attach_tag_auto_creates_and_is_case_sensitive() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();

        let tag = store.attach_tag(task.id, "backend").unwrap();
        assert_eq!(tag.color, "blue");

        // Same name reuses the tag; attaching twice is a no-op.
        let again = store.attach_tag(task.id, "backend").unwrap();
        assert_eq!(again.id, tag.id);
        assert_eq!(store.list_tags_for_task(task.id).unwrap().len(), 1);

        // Different case is a different tag.
        store.attach_tag(task.id, "Backend").unwrap();
        assert_eq!(store.list_tags().unwrap().len(), 2);
    }

    #[test]
    fn detach_tag_keeps_tag_row() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        store.attach_tag(task.id, "backend").unwrap();

        store.detach_tag(task.id, "backend").unwrap();
        assert!(store.list_tags_for_task(task.id).unwrap().is_empty());
        assert_eq!(store.list_tags().unwrap().len(), 1);

        let err = store.detach_tag(task.id, "missing").unwrap_err();
        assert_eq!(err.to_string(), "Tag not found: missing");
    }

    #[test]
    fn comments_list_oldest_first() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        let first = store.add_comment(task.id, "first").unwrap();
        let second = store.add_comment(task.id, "second").unwrap();

        let comments = store.list_comments(task.id).unwrap();
        assert_eq!(
            comments.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![first.id, second.id]
        );

        let edited = store.edit_comment(first.id, "first (edited)").unwrap();
        assert_eq!(edited.content, "first (edited)");
        assert_eq!(edited.created_at, first.created_at);

        store.delete_comment(second.id).unwrap();
        assert_eq!(store.list_comments(task.id).unwrap().len(), 1);
    }

    #[test]
    fn board_stats_count_live_tasks_per_lane() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        store.create_task(NewTask::new(board.id, "a")).unwrap();
        store.create_task(NewTask::new(board.id, "b")).unwrap();
        let doing = store
            .create_task(NewTask::new(board.id, "c").with_status(TaskStatus::Doing))
            .unwrap();
        let archived = store.create_task(NewTask::new(board.id, "d")).unwrap();
        store.archive_task(archived.id, true).unwrap();

        let stats = store.board_stats().unwrap();
        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!(s.board.id, board.id);
        assert_eq!(s.task_count, 3);
        assert_eq!(s.todo_count, 2);
        assert_eq!(s.doing_count, 1);
        assert_eq!(s.done_count, 0);
        assert_eq!(s.board.id, doing.board_id);
    }

    #[test]
    fn list_tasks_orders_by_status_then_position() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let t1 = store.create_task(NewTask::new(board.id, "a")).unwrap();
        let t2 = store
            .create_task(NewTask::new(board.id, "b").with_status(TaskStatus::Doing))
            .unwrap();
        let t3 = store.create_task(NewTask::new(board.id, "c")).unwrap();

        let tasks = store.list_tasks(Some(board.id), None, false).unwrap();
        // 'doing' sorts before 'todo' lexically; within a lane by position.
        assert_eq!(
            tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![t2.id, t1.id, t3.id]
        );
    }

    #[test]
    fn search_composite_includes_tags() {
        let store = store();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "Fix bug")).unwrap();
        store.attach_tag(task.id, "backend").unwrap();

        let with_tags = store.get_task_with_tags(task.id).unwrap();
        assert_eq!(with_tags.search_text(), "Fix bug backend");
    }
}
