//! SQLite persistence.
//!
//! One table per entity, one statement per operation. Dynamic fragments
//! (list filters, partial-update SET clauses) are assembled with
//! `QueryBuilder` and `push_bind` — values are always bound, never
//! interpolated into the SQL text.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{Category, ListQuery, NewTask, Priority, Task, TaskPatch, TaskStats};

/// Thin handle to the pool. Cloneable (pool is Arc inside).
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

/// How a list read is narrowed and ordered. Both filters are optional and
/// AND-combine; unrecognized query values never make it in here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub sort: TaskSort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskSort {
    /// high → medium → low, regardless of creation time.
    Priority,
    /// Ascending; tasks without a due date go last.
    DueDate,
    /// Creation time, newest first.
    #[default]
    CreatedAt,
}

impl TaskFilter {
    pub fn from_query(query: &ListQuery) -> TaskFilter {
        TaskFilter {
            completed: match query.status.as_deref() {
                Some("completed") => Some(true),
                Some("pending") => Some(false),
                _ => None,
            },
            priority: query.priority.as_deref().and_then(Priority::parse),
            sort: match query.sort.as_deref() {
                Some("priority") => TaskSort::Priority,
                Some("dueDate") => TaskSort::DueDate,
                _ => TaskSort::CreatedAt,
            },
        }
    }
}

impl Db {
    /// Open (or create) the database at the given URL.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Db { pool })
    }

    /// In-memory database for tests. Single connection: each `:memory:`
    /// connection is its own database.
    #[cfg(test)]
    pub(crate) async fn open_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let db = Db { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// One-shot schema bootstrap. Idempotent; runs at boot, outside
    /// request handling. The trigger refreshes `updated_at` on every row
    /// modification, independent of the application-level refresh.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS categories (
                id BLOB PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                color TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS todos (
                id BLOB PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                priority TEXT NOT NULL DEFAULT 'medium'
                    CHECK (priority IN ('low', 'medium', 'high')),
                due_date DATE,
                category_id BLOB REFERENCES categories(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        // Millisecond precision so an application-set timestamp in the
        // same second is never regressed below created_at.
        sqlx::query(
            "CREATE TRIGGER IF NOT EXISTS todos_refresh_updated_at
             AFTER UPDATE ON todos
             FOR EACH ROW
             BEGIN
                 UPDATE todos
                 SET updated_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = NEW.id;
             END",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Task operations ────────────────────────────────────────

    pub async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, sqlx::Error> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, title, description, completed, priority, due_date, \
             category_id, created_at, updated_at FROM todos",
        );

        let mut first = true;
        if let Some(completed) = filter.completed {
            qb.push(" WHERE completed = ").push_bind(completed);
            first = false;
        }
        if let Some(priority) = filter.priority {
            qb.push(if first { " WHERE " } else { " AND " });
            qb.push("priority = ").push_bind(priority);
        }

        match filter.sort {
            TaskSort::Priority => {
                qb.push(
                    " ORDER BY CASE priority \
                     WHEN 'high' THEN 1 WHEN 'medium' THEN 2 WHEN 'low' THEN 3 END",
                );
            }
            TaskSort::DueDate => {
                qb.push(" ORDER BY due_date ASC NULLS LAST");
            }
            TaskSort::CreatedAt => {
                qb.push(" ORDER BY created_at DESC");
            }
        }

        qb.build_query_as::<Task>().fetch_all(&self.pool).await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM todos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Persists with `completed = false` and identical created/updated
    /// timestamps; returns the stored row.
    pub async fn insert_task(&self, new: &NewTask) -> Result<Task, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Task>(
            "INSERT INTO todos \
             (id, title, description, completed, priority, due_date, category_id, created_at, updated_at) \
             VALUES (?, ?, ?, FALSE, ?, ?, ?, ?, ?) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.priority)
        .bind(new.due_date)
        .bind(new.category_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    /// Applies a sparse patch: only columns named by the patch change,
    /// `updated_at` always does. None if the id matched no row. Callers
    /// reject empty patches before getting here.
    pub async fn update_task(&self, id: Uuid, patch: &TaskPatch) -> Result<Option<Task>, sqlx::Error> {
        debug_assert!(!patch.is_empty());

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE todos SET updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(title) = &patch.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &patch.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(completed) = patch.completed {
            qb.push(", completed = ").push_bind(completed);
        }
        if let Some(priority) = patch.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(due_date) = patch.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(category_id) = patch.category_id {
            qb.push(", category_id = ").push_bind(category_id);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING *");

        qb.build_query_as::<Task>().fetch_optional(&self.pool).await
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One aggregate pass over all tasks. `pending` is derived from
    /// `total - completed` so the two can never drift apart.
    pub async fn task_stats(&self) -> Result<TaskStats, sqlx::Error> {
        let row: StatsRow = sqlx::query_as(
            "SELECT \
                COUNT(*) AS total, \
                COUNT(CASE WHEN completed THEN 1 END) AS completed, \
                COUNT(CASE WHEN priority = 'high' THEN 1 END) AS high_priority, \
                COUNT(CASE WHEN due_date < DATE('now') AND NOT completed THEN 1 END) AS overdue \
             FROM todos",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            total: row.total,
            completed: row.completed,
            pending: row.total - row.completed,
            high_priority: row.high_priority,
            overdue: row.overdue,
        })
    }

    // ── Category operations (the weak reference's other side) ──

    pub async fn insert_category(&self, name: &str, color: &str) -> Result<Category, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, color, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(color)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    completed: i64,
    high_priority: i64,
    overdue: i64,
}

// ── Tests ──────────────────────────────────────────────────────
