//! Tests for the prepared-statement binding and execution contract.

use mysql_session::testing::{self, MemoryHandle, MemoryLink, Reply};
use mysql_session::{Connection, Error, ServerError, Value};

fn scripted_conn() -> (Connection<MemoryLink>, MemoryHandle) {
    let link = MemoryLink::new();
    let handle = link.handle();
    (Connection::with_link(link), handle)
}

#[test]
fn test_bind_rejects_unknown_type_code_first() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(2, Reply::Affected(0));
    let mut stmt = conn.prepare("UPDATE t SET a = ? WHERE b = ?").unwrap();

    // Every check is violated at once; the unknown type code must win.
    let err = stmt
        .bind_param("x", &[Value::Int(1), Value::Int(2), Value::Int(3)])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidBinding(_)));
    assert!(err.to_string().contains("'x'"));
}

#[test]
fn test_bind_rejects_signature_value_mismatch_second() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(2, Reply::Affected(0));
    let mut stmt = conn.prepare("UPDATE t SET a = ? WHERE b = ?").unwrap();

    // Signature and value count disagree, and both disagree with the
    // required parameter count; the signature/value mismatch must win.
    let err = stmt
        .bind_param("iii", &[Value::Int(1)])
        .unwrap_err();
    match err {
        Error::ArityMismatch(msg) => {
            assert!(msg.contains("number of specified types (3)"));
            assert!(msg.contains("values (1)"));
        }
        other => panic!("expected arity mismatch, got {other:?}"),
    }
}

#[test]
fn test_bind_rejects_required_parameter_mismatch_third() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(2, Reply::Affected(0));
    let mut stmt = conn.prepare("UPDATE t SET a = ? WHERE b = ?").unwrap();

    let err = stmt
        .bind_param("iii", &[Value::Int(1), Value::Int(2), Value::Int(3)])
        .unwrap_err();
    match err {
        Error::ArityMismatch(msg) => {
            assert!(msg.contains("required parameters (2)"));
        }
        other => panic!("expected arity mismatch, got {other:?}"),
    }
}

#[test]
fn test_bind_forwards_only_after_validation() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(4, Reply::Affected(1));
    let mut stmt = conn.prepare("INSERT INTO t VALUES (?, ?, ?, ?)").unwrap();
    assert_eq!(stmt.param_count(), 4);

    stmt.bind_param(
        "idsb",
        &[
            Value::Int(7),
            Value::Double(0.5),
            Value::Text("seven".into()),
            Value::Blob(vec![0x07]),
        ],
    )
    .unwrap();
    assert!(stmt.execute().unwrap().is_none());
    assert_eq!(stmt.affected_rows(), 1);
}

#[test]
fn test_execute_seeded_row_lookup() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(
        1,
        Reply::Rows(testing::rows(
            &["id", "name"],
            vec![vec![Value::Int(42), Value::Text("arthur".into())]],
        )),
    );

    let mut stmt = conn.prepare("SELECT id, name FROM users WHERE id = ?").unwrap();
    stmt.bind_param("i", &[Value::Int(42)]).unwrap();

    let mut result = stmt.execute().unwrap().unwrap();
    assert_eq!(result.count(), 1);
    assert!(result.next());
    let row = result.current().unwrap();
    assert_eq!(row.get("id").and_then(Value::as_int), Some(42));
    assert_eq!(row.get("name").and_then(Value::as_str), Some("arthur"));
}

#[test]
fn test_execute_distinguishes_no_result_from_empty() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(0, Reply::Affected(5));
    handle.push_statement(0, Reply::Rows(Vec::new()));

    let mut update = conn.prepare("UPDATE t SET n = 0").unwrap();
    assert!(update.execute().unwrap().is_none());
    assert_eq!(update.affected_rows(), 5);

    let mut select = conn.prepare("SELECT n FROM t WHERE 0 = 1").unwrap();
    let result = select.execute().unwrap().unwrap();
    assert_eq!(result.count(), 0);
}

#[test]
fn test_statement_reusable_across_executions() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(
        1,
        Reply::Rows(testing::rows(&["n"], vec![vec![Value::Int(1)]])),
    );
    let mut stmt = conn.prepare("SELECT n FROM t WHERE id = ?").unwrap();

    stmt.bind_param("i", &[Value::Int(1)]).unwrap();
    assert_eq!(stmt.execute().unwrap().unwrap().count(), 1);

    stmt.bind_param("i", &[Value::Int(2)]).unwrap();
    assert_eq!(stmt.execute().unwrap().unwrap().count(), 1);
}

#[test]
fn test_execute_without_binding_is_a_server_error() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(1, Reply::Affected(0));
    let mut stmt = conn.prepare("SELECT n FROM t WHERE id = ?").unwrap();

    let err = stmt.execute().unwrap_err();
    assert_eq!(err.code(), Some(2031));
}

#[test]
fn test_prepare_error_carries_code_state_message() {
    let (mut conn, handle) = scripted_conn();
    handle.push_prepare_error(ServerError::new(
        1146,
        "42S02",
        "Table 'mydb.users' doesn't exist",
    ));

    let err = conn.prepare("SELECT * FROM users").unwrap_err();
    match err {
        Error::Prepare(server) => {
            assert_eq!(server.code, 1146);
            assert_eq!(server.state, "42S02");
            assert!(server.message.contains("doesn't exist"));
        }
        other => panic!("expected prepare error, got {other:?}"),
    }
}

#[test]
fn test_statement_invalid_after_connection_close() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(0, Reply::Affected(0));
    let mut stmt = conn.prepare("SELECT 1").unwrap();

    conn.close();

    assert!(matches!(stmt.execute(), Err(Error::InvalidHandle(_))));
    assert!(matches!(
        stmt.bind_param("", &[]),
        Err(Error::InvalidHandle(_))
    ));
}

#[test]
fn test_execute_surfaces_server_error() {
    let (mut conn, handle) = scripted_conn();
    handle.push_statement(
        0,
        Reply::Fail(ServerError::new(1062, "23000", "Duplicate entry '1' for key 'PRIMARY'")),
    );
    let mut stmt = conn.prepare("INSERT INTO t VALUES (1)").unwrap();

    let err = stmt.execute().unwrap_err();
    assert_eq!(err.code(), Some(1062));
    assert_eq!(err.sqlstate(), Some("23000"));
}
