use recordkit::{
    open_db_in_memory, BehaviorError, ConfigError, Filter, SoftDeletable, SoftDeleteHooks,
    SoftDeleteOptions,
};
use rusqlite::types::Value;
use rusqlite::Connection;

fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            deleted_at INTEGER,
            archived_at INTEGER,
            updated_at INTEGER
         );",
    )
    .unwrap();
    conn
}

fn insert_post(conn: &Connection, title: &str) -> i64 {
    conn.execute("INSERT INTO posts (title) VALUES (?1);", [title])
        .unwrap();
    conn.last_insert_rowid()
}

fn deleted_at(conn: &Connection, id: i64) -> Option<i64> {
    conn.query_row("SELECT deleted_at FROM posts WHERE id = ?1;", [id], |row| {
        row.get(0)
    })
    .unwrap()
}

fn count_where(conn: &Connection, filter: &Filter) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM posts{};", filter.where_clause());
    conn.query_row(&sql, rusqlite::params_from_iter(filter.params()), |row| {
        row.get(0)
    })
    .unwrap()
}

#[derive(Default)]
struct CountingHooks {
    before_deletes: usize,
    after_deletes: usize,
    before_restores: usize,
    after_restores: usize,
}

impl SoftDeleteHooks for CountingHooks {
    fn before_soft_delete(&mut self, _conn: &Connection, _id: i64) -> Result<(), String> {
        self.before_deletes += 1;
        Ok(())
    }

    fn after_soft_delete(&mut self, _conn: &Connection, _id: i64) -> Result<(), String> {
        self.after_deletes += 1;
        Ok(())
    }

    fn before_restore(&mut self, _conn: &Connection, _id: i64) -> Result<(), String> {
        self.before_restores += 1;
        Ok(())
    }

    fn after_restore(&mut self, _conn: &Connection, _id: i64) -> Result<(), String> {
        self.after_restores += 1;
        Ok(())
    }
}

#[test]
fn marker_field_reflects_deleted_state() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "draft");

    assert!(!behavior.is_deleted(&conn, id).unwrap());
    behavior.soft_delete(&conn, id).unwrap();
    assert!(behavior.is_deleted(&conn, id).unwrap());
    assert!(deleted_at(&conn, id).is_some());
    assert!(SoftDeletable::deleted_value(deleted_at(&conn, id)));
}

#[test]
fn custom_marker_field_works() {
    let conn = setup();
    let behavior = SoftDeletable::declare_on(&conn, "posts", "archived_at").unwrap();
    let id = insert_post(&conn, "old news");

    behavior.soft_delete(&conn, id).unwrap();
    assert!(behavior.is_deleted(&conn, id).unwrap());
    // the default marker column is untouched
    assert_eq!(deleted_at(&conn, id), None);
}

#[test]
fn soft_delete_then_restore_round_trips() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "keeper");

    behavior.soft_delete(&conn, id).unwrap();
    behavior.restore(&conn, id).unwrap();

    assert_eq!(deleted_at(&conn, id), None);
    assert!(!behavior.is_deleted(&conn, id).unwrap());
    assert!(!behavior.is_really_deleted(&conn, id).unwrap());
}

#[test]
fn repeated_soft_delete_reruns_hooks_but_keeps_the_marker() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "twice");
    let mut hooks = CountingHooks::default();

    behavior.soft_delete_with(&conn, id, &mut hooks).unwrap();
    conn.execute(
        "UPDATE posts SET deleted_at = 12345 WHERE id = ?1;",
        [id],
    )
    .unwrap();

    behavior.soft_delete_with(&conn, id, &mut hooks).unwrap();

    assert_eq!(deleted_at(&conn, id), Some(12345));
    assert_eq!(hooks.before_deletes, 2);
    assert_eq!(hooks.after_deletes, 2);
}

#[test]
fn failing_before_hook_aborts_the_write() {
    struct RefusingHooks;
    impl SoftDeleteHooks for RefusingHooks {
        fn before_soft_delete(&mut self, _conn: &Connection, _id: i64) -> Result<(), String> {
            Err("not while the review is open".to_string())
        }
    }

    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "guarded");

    let err = behavior
        .soft_delete_with(&conn, id, &mut RefusingHooks)
        .unwrap_err();
    assert!(matches!(
        err,
        BehaviorError::HookAborted {
            hook: "before_soft_delete",
            ..
        }
    ));
    assert_eq!(deleted_at(&conn, id), None);
}

#[test]
fn failing_after_hook_reports_abort_with_the_write_persisted() {
    struct LateFailure;
    impl SoftDeleteHooks for LateFailure {
        fn after_soft_delete(&mut self, _conn: &Connection, _id: i64) -> Result<(), String> {
            Err("notification failed".to_string())
        }
    }

    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "half done");

    let err = behavior
        .soft_delete_with(&conn, id, &mut LateFailure)
        .unwrap_err();
    assert!(matches!(
        err,
        BehaviorError::HookAborted {
            hook: "after_soft_delete",
            ..
        }
    ));
    // the inner persistence write determines the data outcome
    assert!(deleted_at(&conn, id).is_some());
}

#[test]
fn restore_runs_its_own_hook_pair() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "phoenix");
    let mut hooks = CountingHooks::default();

    behavior.soft_delete_with(&conn, id, &mut hooks).unwrap();
    behavior.restore_with(&conn, id, &mut hooks).unwrap();

    assert_eq!(hooks.before_restores, 1);
    assert_eq!(hooks.after_restores, 1);
}

#[test]
fn really_delete_removes_the_row_physically() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    let id = insert_post(&conn, "gone");

    assert!(!behavior.is_really_deleted(&conn, id).unwrap());
    behavior.really_delete(&conn, id).unwrap();
    assert!(behavior.is_really_deleted(&conn, id).unwrap());

    let err = behavior.is_deleted(&conn, id).unwrap_err();
    assert!(matches!(err, BehaviorError::NotFound { .. }));
}

#[test]
fn touch_updates_the_modification_timestamp() {
    let conn = setup();
    let id = insert_post(&conn, "touched");
    conn.execute("UPDATE posts SET updated_at = 1 WHERE id = ?1;", [id])
        .unwrap();

    let touching = SoftDeletable::declare(&conn, "posts").unwrap();
    touching.soft_delete(&conn, id).unwrap();
    let touched: Option<i64> = conn
        .query_row("SELECT updated_at FROM posts WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .unwrap();
    assert_ne!(touched, Some(1));

    let quiet = SoftDeletable::declare_with(
        &conn,
        "posts",
        SoftDeleteOptions {
            touch: false,
            ..SoftDeleteOptions::default()
        },
    )
    .unwrap();
    conn.execute("UPDATE posts SET updated_at = 99 WHERE id = ?1;", [id])
        .unwrap();
    quiet.restore(&conn, id).unwrap();
    let untouched: Option<i64> = conn
        .query_row("SELECT updated_at FROM posts WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(untouched, Some(99));
}

#[test]
fn scopes_partition_rows_and_compose_with_other_filters() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    insert_post(&conn, "alpha");
    let beta = insert_post(&conn, "beta");
    insert_post(&conn, "gamma");
    behavior.soft_delete(&conn, beta).unwrap();

    assert_eq!(count_where(&conn, &behavior.active()), 2);
    assert_eq!(count_where(&conn, &behavior.without_deleted()), 2);
    assert_eq!(count_where(&conn, &behavior.soft_deleted()), 1);

    let deleted_betas = behavior.soft_deleted().and(Filter::expr_with(
        "title = ?",
        vec![Value::Text("beta".to_string())],
    ));
    assert_eq!(count_where(&conn, &deleted_betas), 1);

    let active_betas = behavior.active().and(Filter::expr_with(
        "title = ?",
        vec![Value::Text("beta".to_string())],
    ));
    assert_eq!(count_where(&conn, &active_betas), 0);
}

#[test]
fn bulk_destroy_routes_through_the_soft_transition() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    insert_post(&conn, "one");
    insert_post(&conn, "two");
    insert_post(&conn, "three");

    let mut hooks = CountingHooks::default();
    let transitioned = behavior
        .soft_delete_all(&conn, &Filter::all(), &mut hooks)
        .unwrap();

    assert_eq!(transitioned, 3);
    assert_eq!(hooks.before_deletes, 3);
    assert_eq!(count_where(&conn, &behavior.soft_deleted()), 3);
    // rows are still physically present
    assert_eq!(count_where(&conn, &Filter::all()), 3);
}

#[test]
fn bulk_really_destroy_removes_matching_rows() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();
    insert_post(&conn, "stays");
    let goes = insert_post(&conn, "goes");
    behavior.soft_delete(&conn, goes).unwrap();

    let removed = behavior
        .really_destroy_all(&conn, &behavior.soft_deleted())
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(count_where(&conn, &Filter::all()), 1);
}

#[test]
fn declaring_a_missing_field_fails_before_any_write() {
    let conn = setup();

    let err = SoftDeletable::declare_on(&conn, "posts", "removed_at").unwrap_err();
    assert!(matches!(err, ConfigError::MissingColumn { .. }));

    conn.execute_batch("CREATE TABLE bare (id INTEGER PRIMARY KEY, deleted_at INTEGER);")
        .unwrap();
    // default touch column is absent
    let err = SoftDeletable::declare(&conn, "bare").unwrap_err();
    assert!(matches!(err, ConfigError::MissingColumn { .. }));

    let quiet = SoftDeletable::declare_with(
        &conn,
        "bare",
        SoftDeleteOptions {
            touch: false,
            ..SoftDeleteOptions::default()
        },
    );
    assert!(quiet.is_ok());
}

#[test]
fn operations_on_missing_rows_report_not_found() {
    let conn = setup();
    let behavior = SoftDeletable::declare(&conn, "posts").unwrap();

    let err = behavior.soft_delete(&conn, 404).unwrap_err();
    assert!(matches!(err, BehaviorError::NotFound { id: 404, .. }));
    let err = behavior.restore(&conn, 404).unwrap_err();
    assert!(matches!(err, BehaviorError::NotFound { id: 404, .. }));
    let err = behavior.really_delete(&conn, 404).unwrap_err();
    assert!(matches!(err, BehaviorError::NotFound { id: 404, .. }));
}
