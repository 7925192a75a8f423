//! Lane-scoped position allocation
//!
//! Positions within a (board, status) lane form a dense `0..n-1` sequence
//! as tasks are created and append-moved into it. Removing a task from a
//! lane (delete, archive, move-out) leaves a gap; vacated lanes are not
//! compacted. Every allocator operation runs in a single transaction so
//! read-max-then-write cannot race another writer.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{Task, TaskStatus};
use crate::store::{fetch_task, Store};

/// Next append position in a lane: MAX(position)+1 over live tasks, or 0
/// for an empty lane. `exclude` keeps a task being moved within its own
/// lane out of the accounting.
pub(crate) fn next_position(
    conn: &Connection,
    board_id: i64,
    status: TaskStatus,
    exclude: Option<i64>,
) -> Result<i64> {
    let max: Option<i64> = match exclude {
        Some(id) => conn.query_row(
            "SELECT MAX(position) FROM tasks
             WHERE board_id = ?1 AND status = ?2 AND archived = 0 AND id != ?3",
            params![board_id, status, id],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT MAX(position) FROM tasks
             WHERE board_id = ?1 AND status = ?2 AND archived = 0",
            params![board_id, status],
            |row| row.get(0),
        )?,
    };
    Ok(max.map_or(0, |m| m + 1))
}

impl Store {
    /// Move a task to a lane, optionally at an explicit position.
    ///
    /// Without a position the task is appended to the destination lane.
    /// With position `p`, live destination tasks at `>= p` are shifted up
    /// by one before the task is written with its new status and position.
    /// Shift and write happen in one transaction. The source lane keeps
    /// its gap.
    pub fn move_task(&self, id: i64, status: TaskStatus, position: Option<i64>) -> Result<Task> {
        let mut conn = self.connection();
        let tx = conn.transaction()?;
        let task = fetch_task(&tx, id)?;

        let position = match position {
            Some(p) => {
                let p = p.max(0);
                tx.execute(
                    "UPDATE tasks SET position = position + 1
                     WHERE board_id = ?1 AND status = ?2 AND archived = 0
                       AND position >= ?3 AND id != ?4",
                    params![task.board_id, status, p, id],
                )?;
                p
            }
            None => next_position(&tx, task.board_id, status, Some(id))?,
        };

        tx.execute(
            "UPDATE tasks SET status = ?1, position = ?2, updated_at = ?3 WHERE id = ?4",
            params![status, position, Utc::now(), id],
        )?;
        let moved = fetch_task(&tx, id)?;
        tx.commit()?;
        Ok(moved)
    }
}
