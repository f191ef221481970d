//! Connection handling for the `SQLite` knowledge store.
//!
//! Lock acquisition with poison recovery, pragma setup, and translation of
//! `SQLite` failures into [`crate::Error`] variants.

use crate::Error;
use rusqlite::{Connection, ErrorCode, ffi};
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning. A panicking statement does
/// not leave an open transaction behind: rusqlite rolls back on drop.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("matgraph_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for the knowledge store.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers with a single writer
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds for locks instead of failing
/// - **`foreign_keys`**: enables cascading deletes of composition rows
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if foreign keys cannot be enabled.
pub fn configure_connection(conn: &Connection) -> crate::Result<()> {
    // journal_mode returns a row, which execute_batch would reject
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(storage_error("enable_foreign_keys"))
}

/// Returns a mapper from `rusqlite` errors to [`Error`] for `operation`.
///
/// Constraint violations become domain errors:
///
/// | Constraint | Error |
/// |------------|-------|
/// | `UNIQUE` / `PRIMARY KEY` | [`Error::Conflict`] |
/// | `FOREIGN KEY` / `CHECK` | [`Error::InvalidInput`] |
///
/// Everything else is [`Error::OperationFailed`].
pub fn storage_error(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| match &e {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            let detail = message.clone().unwrap_or_else(|| e.to_string());
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Error::Conflict(describe_unique_violation(&detail))
                },
                _ => Error::InvalidInput(detail),
            }
        },
        _ => Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        },
    }
}

/// Turns `UNIQUE constraint failed: kg_formula.code` into a readable message.
fn describe_unique_violation(detail: &str) -> String {
    if detail.contains("kg_intermediate_composition") {
        "raw material is already an ingredient of this intermediate".to_string()
    } else if let Some(table) = detail
        .split(": ")
        .nth(1)
        .and_then(|columns| columns.split('.').next())
        .filter(|_| detail.ends_with(".code"))
    {
        format!("code already exists in {}", table.trim_start_matches("kg_"))
    } else {
        detail.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let mut handles = vec![];

        for _ in 0..10 {
            let mutex_clone = Arc::clone(&mutex);
            handles.push(thread::spawn(move || {
                let mut guard = acquire_lock(&mutex_clone);
                *guard += 1;
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*acquire_lock(&mutex), 10);
    }

    #[test]
    fn test_configure_connection_enables_foreign_keys() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let foreign_keys: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE kg_formula (code TEXT UNIQUE); INSERT INTO kg_formula VALUES ('F-1');")
            .unwrap();
        let err = conn
            .execute("INSERT INTO kg_formula VALUES ('F-1')", [])
            .map_err(storage_error("insert_formula"))
            .unwrap_err();
        assert!(
            matches!(err, Error::Conflict(ref msg) if msg == "code already exists in formula"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn test_foreign_key_violation_maps_to_invalid_input() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();
        conn.execute_batch(
            "CREATE TABLE kg_formula (id INTEGER PRIMARY KEY);
             CREATE TABLE kg_performance (formula_id INTEGER REFERENCES kg_formula(id));",
        )
        .unwrap();
        let err = conn
            .execute("INSERT INTO kg_performance VALUES (5)", [])
            .map_err(storage_error("insert_performance"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if !msg.contains("insert_performance")));
    }

    #[test]
    fn test_other_errors_map_to_operation_failed() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .execute("SELECT * FROM missing_table", [])
            .map_err(storage_error("query"))
            .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "query"));
    }
}
