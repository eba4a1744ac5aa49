//! Tests for SqliteTransactionLog
//!
//! These tests verify:
//! - Table creation on first open and reuse on later opens
//! - Sequence assignment by the database
//! - Replay in sequence order
//! - Rejection of rows the event model cannot represent

use std::path::{Path, PathBuf};

use ledgerkv::txlog::{Event, EventKind, Replay, SqliteTransactionLog, TransactionLog};
use ledgerkv::LedgerError;
use rusqlite::{params, Connection};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_db() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("transactions.db");
    (temp_dir, db_path)
}

fn open_log(path: &Path) -> SqliteTransactionLog {
    SqliteTransactionLog::open(path, 16).unwrap()
}

fn collect_replay(log: &dyn TransactionLog) -> (Vec<Event>, Option<LedgerError>) {
    let Replay { events, errors } = log.replay().unwrap();
    let events: Vec<Event> = events.iter().collect();
    (events, errors.recv().ok())
}

fn row_count(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))
        .unwrap()
}

// =============================================================================
// Schema Tests
// =============================================================================

#[test]
fn test_open_creates_table() {
    let (_temp, db_path) = setup_temp_db();

    let log = open_log(&db_path);

    assert!(db_path.exists());
    assert_eq!(log.path(), db_path.as_path());
    assert_eq!(row_count(&db_path), 0);
}

#[test]
fn test_reopen_keeps_existing_rows() {
    let (_temp, db_path) = setup_temp_db();

    {
        let log = open_log(&db_path);
        log.start().unwrap();
        log.write_put("a", "1").unwrap();
        log.close().unwrap();
    }

    let _log = open_log(&db_path);
    assert_eq!(row_count(&db_path), 1);
}

#[test]
fn test_open_unreachable_path_is_medium_unavailable() {
    let temp_dir = TempDir::new().unwrap();
    // A regular file where a directory is expected
    let blocker = temp_dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let result = SqliteTransactionLog::open(&blocker.join("transactions.db"), 16);
    assert!(matches!(result, Err(LedgerError::MediumUnavailable(_))));
}

// =============================================================================
// Writing Tests
// =============================================================================

#[test]
fn test_write_assigns_sequences() {
    let (_temp, db_path) = setup_temp_db();

    let log = open_log(&db_path);
    log.start().unwrap();
    log.write_put("alpha", "1").unwrap();
    log.write_put("beta", "2").unwrap();
    log.write_delete("alpha").unwrap();
    log.close().unwrap();

    assert_eq!(log.last_sequence(), 3);

    let conn = Connection::open(&db_path).unwrap();
    let mut stmt = conn
        .prepare("SELECT sequence, event_type, key, value FROM transactions ORDER BY sequence")
        .unwrap();
    let rows: Vec<(i64, i64, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(
        rows,
        vec![
            (1, 2, "alpha".to_string(), "1".to_string()),
            (2, 2, "beta".to_string(), "2".to_string()),
            (3, 1, "alpha".to_string(), String::new()),
        ]
    );
}

#[test]
fn test_values_with_newlines_are_accepted() {
    let (_temp, db_path) = setup_temp_db();

    let log = open_log(&db_path);
    assert!(log.check("key", "line1\nline2").is_ok());
    assert!(matches!(log.check("", "v"), Err(LedgerError::InvalidKey(_))));

    log.start().unwrap();
    log.write_put("key", "line1\nline2").unwrap();
    log.close().unwrap();

    let log = open_log(&db_path);
    let (events, error) = collect_replay(&log);
    assert!(error.is_none());
    assert_eq!(events[0].value, "line1\nline2");
}

#[test]
fn test_failed_insert_reaches_error_stream() {
    let (_temp, db_path) = setup_temp_db();
    let log = open_log(&db_path);
    let errors = log.errors();
    log.start().unwrap();

    let conn = Connection::open(&db_path).unwrap();
    conn.execute_batch("DROP TABLE transactions").unwrap();
    drop(conn);

    log.write_put("lost", "value").unwrap();
    log.close().unwrap();

    let failures: Vec<LedgerError> = errors.iter().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], LedgerError::DurableWrite(_)));
    assert_eq!(log.last_sequence(), 0);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_round_trip() {
    let (_temp, db_path) = setup_temp_db();

    {
        let log = open_log(&db_path);
        log.start().unwrap();
        log.write_put("foo", "bar").unwrap();
        log.write_put("bob", "alice").unwrap();
        log.write_delete("foo").unwrap();
        log.close().unwrap();
    }

    let log = open_log(&db_path);
    let (events, error) = collect_replay(&log);

    assert!(error.is_none());
    let summary: Vec<(u64, EventKind, &str)> = events
        .iter()
        .map(|e| (e.sequence, e.kind, e.key.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, EventKind::Put, "foo"),
            (2, EventKind::Put, "bob"),
            (3, EventKind::Delete, "foo"),
        ]
    );
    assert_eq!(log.last_sequence(), 3);
}

#[test]
fn test_sequence_continues_after_restart() {
    let (_temp, db_path) = setup_temp_db();

    {
        let log = open_log(&db_path);
        log.start().unwrap();
        log.write_put("a", "1").unwrap();
        log.write_put("b", "2").unwrap();
        log.close().unwrap();
    }

    let log = open_log(&db_path);
    let (events, _) = collect_replay(&log);
    assert_eq!(events.len(), 2);

    log.start().unwrap();
    log.write_put("c", "3").unwrap();
    log.close().unwrap();

    assert_eq!(log.last_sequence(), 3);
}

#[test]
fn test_replay_rejects_unknown_event_type() {
    let (_temp, db_path) = setup_temp_db();
    let _ = open_log(&db_path);

    let conn = Connection::open(&db_path).unwrap();
    conn.execute(
        "INSERT INTO transactions (event_type, key, value) VALUES (?1, ?2, ?3)",
        params![2, "good", "row"],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO transactions (event_type, key, value) VALUES (?1, ?2, ?3)",
        params![9, "bad", "row"],
    )
    .unwrap();
    drop(conn);

    let log = open_log(&db_path);
    let (events, error) = collect_replay(&log);

    assert_eq!(events.len(), 1);
    assert!(matches!(error, Some(LedgerError::ReplayCorruption { line: 2, .. })));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_replay_after_start_is_rejected() {
    let (_temp, db_path) = setup_temp_db();
    let log = open_log(&db_path);
    log.start().unwrap();

    assert!(matches!(log.replay(), Err(LedgerError::LogState(_))));
    log.close().unwrap();
}

#[test]
fn test_write_before_start_is_rejected() {
    let (_temp, db_path) = setup_temp_db();
    let log = open_log(&db_path);

    assert!(matches!(log.write_put("k", "v"), Err(LedgerError::LogState(_))));
}

#[test]
fn test_close_is_idempotent() {
    let (_temp, db_path) = setup_temp_db();
    let log = open_log(&db_path);
    log.start().unwrap();
    log.write_put("k", "v").unwrap();

    log.close().unwrap();
    log.close().unwrap();

    assert_eq!(row_count(&db_path), 1);
}
