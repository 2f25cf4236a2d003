use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use timeboard_core::todo::{next_update_time, now, validate_title};
use timeboard_core::{Todo, TodoId, TodoStatus};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{self, format_timestamp};

const TABLE: &str = "todos";
const COLUMNS: &str = "id, title, description, status, created_at, updated_at";

pub struct TodoRepo {
    db: Database,
}

impl TodoRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Every todo, in storage (id) order.
    #[instrument(skip(self))]
    pub fn list_all(&self) -> Result<Vec<Todo>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM todos ORDER BY id"))?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_todo(row)?);
            }
            Ok(results)
        })
    }

    /// Look up a single todo.
    #[instrument(skip(self), fields(todo_id = %id))]
    pub fn get(&self, id: TodoId) -> Result<Option<Todo>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM todos WHERE id = ?1"))?;
            let mut rows = stmt.query([id.get()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_todo(row)?)),
                None => Ok(None),
            }
        })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM todos", [], |row| row.get(0))
                .map_err(StoreError::from)
        })
    }

    /// Insert a todo and return the persisted record.
    ///
    /// The title is trimmed; a blank title is rejected before touching the table.
    #[instrument(skip(self, description), fields(status = %status))]
    pub fn create(
        &self,
        title: &str,
        status: TodoStatus,
        description: &str,
    ) -> Result<Todo, StoreError> {
        let title = validate_title(title)?;
        let created_at = now();
        let stamp = format_timestamp(&created_at);

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO todos (title, description, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![title, description, status.as_str(), stamp, stamp],
            )?;
            let id = TodoId::from_raw(conn.last_insert_rowid());
            debug!(todo_id = %id, "todo created");

            Ok(Todo {
                id,
                title: title.to_string(),
                description: description.to_string(),
                status,
                created_at,
                updated_at: created_at,
            })
        })
    }

    /// Remove a todo permanently. Unknown ids are a no-op and still report success.
    #[instrument(skip(self), fields(todo_id = %id))]
    pub fn delete(&self, id: TodoId) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM todos WHERE id = ?1", [id.get()])?;
            debug!(affected, "todo delete");
            Ok(true)
        })
    }

    /// Move a todo to another column and refresh `updated_at`.
    ///
    /// Unknown ids are a no-op and still report success.
    #[instrument(skip(self), fields(todo_id = %id, status = %status))]
    pub fn set_status(&self, id: TodoId, status: TodoStatus) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let previous: Option<String> = conn
                .query_row(
                    "SELECT updated_at FROM todos WHERE id = ?1",
                    [id.get()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(previous) = previous else {
                debug!("set_status on unknown todo");
                return Ok(true);
            };

            let previous = row_helpers::parse_timestamp(&previous, TABLE, "updated_at")?;
            let updated_at = format_timestamp(&next_update_time(previous));
            conn.execute(
                "UPDATE todos SET status = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), updated_at, id.get()],
            )?;
            Ok(true)
        })
    }

    /// Same as [`set_status`](Self::set_status) for a status still in text form.
    /// Anything outside the three columns is rejected and nothing is written.
    pub fn set_status_str(&self, id: TodoId, status: &str) -> Result<bool, StoreError> {
        let status: TodoStatus = status.parse()?;
        self.set_status(id, status)
    }
}

fn row_to_todo(row: &rusqlite::Row<'_>) -> Result<Todo, StoreError> {
    let status: String = row_helpers::get(row, 3, TABLE, "status")?;
    let created_at: String = row_helpers::get(row, 4, TABLE, "created_at")?;
    let updated_at: String = row_helpers::get(row, 5, TABLE, "updated_at")?;

    Ok(Todo {
        id: TodoId::from_raw(row_helpers::get(row, 0, TABLE, "id")?),
        title: row_helpers::get(row, 1, TABLE, "title")?,
        description: row_helpers::get_opt(row, 2, TABLE, "description")?.unwrap_or_default(),
        status: row_helpers::parse_enum(&status, TABLE, "status")?,
        created_at: row_helpers::parse_timestamp(&created_at, TABLE, "created_at")?,
        updated_at: row_helpers::parse_timestamp(&updated_at, TABLE, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use timeboard_core::ValidationError;

    fn repo() -> TodoRepo {
        TodoRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn create_returns_persisted_record() {
        let repo = repo();
        let todo = repo.create("Buy milk", TodoStatus::Present, "").unwrap();
        assert_eq!(todo.id, TodoId::from_raw(1));
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.description, "");
        assert_eq!(todo.status, TodoStatus::Present);
        assert_eq!(todo.created_at, todo.updated_at);

        let all = repo.list_all().unwrap();
        assert_eq!(all, vec![todo]);
    }

    #[test]
    fn create_rejects_empty_title_and_leaves_count() {
        let repo = repo();
        repo.create("keep", TodoStatus::Past, "").unwrap();

        let err = repo.create("   ", TodoStatus::Present, "").unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyTitle)));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn ids_unique_and_not_reused_after_delete() {
        let repo = repo();
        let mut seen = HashSet::new();
        for i in 0..5 {
            let t = repo.create(&format!("t{i}"), TodoStatus::Future, "").unwrap();
            assert!(seen.insert(t.id));
        }
        let last = repo.list_all().unwrap().last().unwrap().id;
        repo.delete(last).unwrap();

        let fresh = repo.create("after delete", TodoStatus::Present, "").unwrap();
        assert!(!seen.contains(&fresh.id));
        assert!(fresh.id > last);
    }

    #[test]
    fn delete_removes_from_list() {
        let repo = repo();
        let a = repo.create("a", TodoStatus::Present, "").unwrap();
        let b = repo.create("b", TodoStatus::Present, "").unwrap();

        assert!(repo.delete(a.id).unwrap());
        let ids: Vec<TodoId> = repo.list_all().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[test]
    fn delete_unknown_id_is_noop_success() {
        let repo = repo();
        repo.create("a", TodoStatus::Present, "").unwrap();
        assert!(repo.delete(TodoId::from_raw(999)).unwrap());
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn set_status_changes_column_and_bumps_updated_at() {
        let repo = repo();
        let todo = repo.create("plan trip", TodoStatus::Present, "").unwrap();

        for status in [TodoStatus::Future, TodoStatus::Past, TodoStatus::Present] {
            let before = repo.get(todo.id).unwrap().unwrap();
            assert!(repo.set_status(todo.id, status).unwrap());

            let after = repo
                .list_all()
                .unwrap()
                .into_iter()
                .find(|t| t.id == todo.id)
                .unwrap();
            assert_eq!(after.status, status);
            assert!(after.updated_at > before.updated_at);
            assert_eq!(after.created_at, todo.created_at);
            assert!(after.updated_at >= after.created_at);
        }
    }

    #[test]
    fn set_status_unknown_id_is_noop_success() {
        let repo = repo();
        assert!(repo.set_status(TodoId::from_raw(42), TodoStatus::Past).unwrap());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn set_status_str_rejects_invalid_and_leaves_record() {
        let repo = repo();
        let todo = repo.create("x", TodoStatus::Present, "").unwrap();

        let err = repo.set_status_str(todo.id, "invalid").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::InvalidStatus(_))
        ));
        assert_eq!(repo.get(todo.id).unwrap().unwrap(), todo);

        assert!(repo.set_status_str(todo.id, "future").unwrap());
        assert_eq!(repo.get(todo.id).unwrap().unwrap().status, TodoStatus::Future);
    }

    #[test]
    fn null_description_reads_as_empty() {
        let repo = repo();
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO todos (title, description, status, created_at, updated_at)
                     VALUES ('legacy', NULL, 'past', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let todo = &repo.list_all().unwrap()[0];
        assert_eq!(todo.description, "");
        assert_eq!(todo.status, TodoStatus::Past);
    }

    #[test]
    fn corrupt_timestamp_surfaces_as_corrupt_row() {
        let repo = repo();
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO todos (title, status, created_at, updated_at)
                     VALUES ('bad', 'present', 'not-a-date', 'not-a-date')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let err = repo.list_all().unwrap_err();
        assert!(matches!(
            err,
            StoreError::CorruptRow { table: "todos", column: "created_at", .. }
        ));
    }

    #[test]
    fn rows_stamped_by_sqlite_default_are_readable() {
        let repo = repo();
        repo.db
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO todos (title, status, created_at, updated_at)
                     VALUES ('seeded', 'future', CURRENT_TIMESTAMP, '2026-01-01 00:00:00')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let todo = repo.list_all().unwrap().remove(0);
        assert_eq!(todo.title, "seeded");
        assert_eq!(
            format_timestamp(&todo.updated_at),
            "2026-01-01T00:00:00.000000Z"
        );

        assert!(repo.set_status(todo.id, TodoStatus::Past).unwrap());
        let updated = repo.get(todo.id).unwrap().unwrap();
        assert_eq!(updated.status, TodoStatus::Past);
        assert!(updated.updated_at > todo.updated_at);
        assert_eq!(updated.created_at, todo.created_at);
    }

    #[test]
    fn get_missing_is_none() {
        let repo = repo();
        assert!(repo.get(TodoId::from_raw(1)).unwrap().is_none());
    }
}
