use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Result, Row, ToSql};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ApiToken, CreateTodo, TodoItem, UpdateTodo, UpdatedFields};
use crate::query::SortDirection;

pub type DbPool = Arc<Mutex<Connection>>;

/// Fixed-width UTC timestamps so that text order equals time order.
const CREATED_AT_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

const TODO_COLUMNS: &str = "owner_id, todo_id, name, due_date, done, created_at, attachment_url";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS api_tokens (
        id INTEGER PRIMARY KEY,
        owner_id TEXT NOT NULL,
        token_digest TEXT UNIQUE NOT NULL,
        name TEXT,
        created_at INTEGER DEFAULT (strftime('%s', 'now'))
    );

    CREATE TABLE IF NOT EXISTS todos (
        owner_id TEXT NOT NULL,
        todo_id TEXT NOT NULL,
        name TEXT NOT NULL,
        due_date TEXT NOT NULL,
        done INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        attachment_url TEXT,
        PRIMARY KEY (owner_id, todo_id)
    );

    CREATE INDEX IF NOT EXISTS todos_by_created_at
        ON todos (owner_id, created_at, todo_id);
";

pub fn init_db(path: impl AsRef<Path>) -> Result<DbPool> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn open_in_memory() -> Result<DbPool> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>, AppError> {
    pool.lock()
        .map_err(|_| AppError::StorageUnavailable("database lock poisoned".to_string()))
}

pub fn format_created_at(at: OffsetDateTime) -> Result<String, AppError> {
    Ok(at.to_offset(time::UtcOffset::UTC).format(CREATED_AT_FORMAT)?)
}

// API Token operations
pub fn create_api_token(
    pool: &DbPool,
    owner_id: &str,
    token_digest: &str,
    name: Option<&str>,
) -> Result<ApiToken, AppError> {
    let conn = lock(pool)?;
    conn.execute(
        "INSERT INTO api_tokens (owner_id, token_digest, name) VALUES (?1, ?2, ?3)",
        (owner_id, token_digest, name),
    )?;
    let id = conn.last_insert_rowid();

    let token = conn.query_row(
        "SELECT id, owner_id, name, created_at FROM api_tokens WHERE id = ?1",
        [id],
        |row| {
            Ok(ApiToken {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )?;

    Ok(token)
}

pub fn get_owner_by_token_digest(
    pool: &DbPool,
    token_digest: &str,
) -> Result<Option<String>, AppError> {
    let conn = lock(pool)?;
    let owner = conn
        .query_row(
            "SELECT owner_id FROM api_tokens WHERE token_digest = ?1",
            [token_digest],
            |row| row.get(0),
        )
        .optional()?;
    Ok(owner)
}

// Todo operations
fn todo_from_row(row: &Row<'_>) -> Result<TodoItem> {
    Ok(TodoItem {
        owner_id: row.get(0)?,
        todo_id: row.get(1)?,
        name: row.get(2)?,
        due_date: row.get(3)?,
        done: row.get::<_, i32>(4)? != 0,
        created_at: row.get(5)?,
        attachment_url: row.get(6)?,
    })
}

pub fn insert_todo(pool: &DbPool, todo: &TodoItem) -> Result<(), AppError> {
    let conn = lock(pool)?;
    insert_todo_internal(&conn, todo)
}

fn insert_todo_internal(conn: &Connection, todo: &TodoItem) -> Result<(), AppError> {
    conn.execute(
        &format!("INSERT INTO todos ({TODO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        (
            &todo.owner_id,
            &todo.todo_id,
            &todo.name,
            &todo.due_date,
            todo.done as i32,
            &todo.created_at,
            &todo.attachment_url,
        ),
    )?;
    Ok(())
}

/// Creation timestamp for a new item of `owner_id`: now, or one microsecond
/// past the owner's newest item when the clock has not moved beyond it.
fn next_created_at(conn: &Connection, owner_id: &str) -> Result<String, AppError> {
    let now = format_created_at(OffsetDateTime::now_utc())?;
    let newest: Option<String> = conn.query_row(
        "SELECT MAX(created_at) FROM todos WHERE owner_id = ?1",
        [owner_id],
        |row| row.get(0),
    )?;

    match newest {
        Some(newest) if newest >= now => {
            let parsed = PrimitiveDateTime::parse(&newest, CREATED_AT_FORMAT)
                .map_err(|e| AppError::Internal(format!("stored createdAt {newest:?}: {e}")))?;
            format_created_at(parsed.assume_utc() + Duration::MICROSECOND)
        }
        _ => Ok(now),
    }
}

pub fn create_todo(pool: &DbPool, owner_id: &str, req: &CreateTodo) -> Result<TodoItem, AppError> {
    let conn = lock(pool)?;
    let todo = TodoItem {
        owner_id: owner_id.to_string(),
        todo_id: Uuid::new_v4().to_string(),
        name: req.name.clone(),
        due_date: req.due_date.clone(),
        done: false,
        created_at: next_created_at(&conn, owner_id)?,
        attachment_url: None,
    };

    insert_todo_internal(&conn, &todo)?;
    Ok(todo)
}

pub fn get_todo(pool: &DbPool, owner_id: &str, todo_id: &str) -> Result<Option<TodoItem>, AppError> {
    let conn = lock(pool)?;
    let todo = conn
        .query_row(
            &format!("SELECT {TODO_COLUMNS} FROM todos WHERE owner_id = ?1 AND todo_id = ?2"),
            [owner_id, todo_id],
            todo_from_row,
        )
        .optional()?;
    Ok(todo)
}

/// Every item of the owner, oldest first.
pub fn list_todos(pool: &DbPool, owner_id: &str) -> Result<Vec<TodoItem>, AppError> {
    let conn = lock(pool)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE owner_id = ?1 ORDER BY created_at ASC, todo_id ASC"
    ))?;
    let todos = stmt
        .query_map([owner_id], todo_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(todos)
}

/// A point in the creation-time index of one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPosition {
    pub created_at: String,
    pub todo_id: String,
}

/// One bounded read of an owner's creation-time index.
#[derive(Debug, Clone)]
pub struct Scan<'a> {
    pub direction: SortDirection,
    /// Resume strictly after this position.
    pub after: Option<&'a IndexPosition>,
    /// Case-sensitive substring the name must contain.
    pub name_contains: Option<&'a str>,
    pub limit: usize,
}

pub fn scan_todos(pool: &DbPool, owner_id: &str, scan: &Scan<'_>) -> Result<Vec<TodoItem>, AppError> {
    let conn = lock(pool)?;

    let mut conditions = vec!["owner_id = ?1".to_string()];
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(owner_id.to_string())];

    let (comparison, order) = match scan.direction {
        SortDirection::Asc => (">", "ASC"),
        SortDirection::Desc => ("<", "DESC"),
    };

    if let Some(position) = scan.after {
        params.push(Box::new(position.created_at.clone()));
        params.push(Box::new(position.todo_id.clone()));
        conditions.push(format!(
            "(created_at, todo_id) {comparison} (?{}, ?{})",
            params.len() - 1,
            params.len()
        ));
    }

    if let Some(needle) = scan.name_contains {
        params.push(Box::new(needle.to_string()));
        conditions.push(format!("instr(name, ?{}) > 0", params.len()));
    }

    params.push(Box::new(i64::try_from(scan.limit).unwrap_or(i64::MAX)));
    let query = format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE {} ORDER BY created_at {order}, todo_id {order} LIMIT ?{}",
        conditions.join(" AND "),
        params.len()
    );

    let mut stmt = conn.prepare(&query)?;
    let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let todos = stmt
        .query_map(params_refs.as_slice(), todo_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(todos)
}

pub fn update_todo(
    pool: &DbPool,
    owner_id: &str,
    todo_id: &str,
    update: &UpdateTodo,
) -> Result<Option<UpdatedFields>, AppError> {
    let conn = lock(pool)?;
    let updated = conn
        .query_row(
            "UPDATE todos SET name = ?1, due_date = ?2, done = ?3
             WHERE owner_id = ?4 AND todo_id = ?5
             RETURNING name, due_date, done",
            (
                &update.name,
                &update.due_date,
                update.done as i32,
                owner_id,
                todo_id,
            ),
            |row| {
                Ok(UpdatedFields {
                    name: row.get(0)?,
                    due_date: row.get(1)?,
                    done: row.get::<_, i32>(2)? != 0,
                })
            },
        )
        .optional()?;
    Ok(updated)
}

pub fn set_attachment_url(
    pool: &DbPool,
    owner_id: &str,
    todo_id: &str,
    url: &str,
) -> Result<bool, AppError> {
    let conn = lock(pool)?;
    let rows = conn.execute(
        "UPDATE todos SET attachment_url = ?1 WHERE owner_id = ?2 AND todo_id = ?3",
        [url, owner_id, todo_id],
    )?;
    Ok(rows > 0)
}

pub fn delete_todo(pool: &DbPool, owner_id: &str, todo_id: &str) -> Result<bool, AppError> {
    let conn = lock(pool)?;
    let rows = conn.execute(
        "DELETE FROM todos WHERE owner_id = ?1 AND todo_id = ?2",
        [owner_id, todo_id],
    )?;
    Ok(rows > 0)
}
