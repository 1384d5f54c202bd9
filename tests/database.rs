//! End-to-end tests over the SQL surface: create, insert, select, errors,
//! and durability across reopen.

use btdb::database::Database;
use btdb::errors::Error;
use btdb::exec::Rows;
use btdb::store::values::Value;

fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    (dir, path)
}

fn collect(mut rows: Rows) -> (Vec<String>, Vec<Vec<Value>>) {
    let columns = rows.columns().to_vec();
    let mut out = Vec::new();
    let mut row = vec![Value::Int(0); columns.len()];
    while rows.next(&mut row).is_some() {
        out.push(row.clone());
    }
    (columns, out)
}

fn int(n: i64) -> Value {
    Value::Int(n)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

const CREATE_DEPT: &str =
    "CREATE TABLE dept (deptno INTEGER, dname TEXT, loc TEXT, PRIMARY KEY (deptno));";

fn dept_fixture(db: &mut Database) {
    db.query(CREATE_DEPT).unwrap();
    db.query("INSERT INTO dept VALUES (10, 'A', 'NY'), (20, 'B', 'SF'), (30, 'C', 'TOK');")
        .unwrap();
}

#[test]
fn create_insert_select() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();

    let created = db.query(CREATE_DEPT).unwrap();
    let (columns, rows) = collect(created);
    assert_eq!(columns, vec!["type", "name", "root", "sql"]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], text("table"));
    assert_eq!(rows[0][1], text("dept"));

    let inserted = db
        .query("INSERT INTO dept VALUES (10, 'A', 'NY'), (20, 'B', 'SF'), (30, 'C', 'TOK');")
        .unwrap();
    assert_eq!(inserted.affected(), 3);

    let (columns, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    assert_eq!(columns, vec!["deptno", "dname", "loc"]);
    assert_eq!(
        rows,
        vec![
            vec![int(10), text("A"), text("NY")],
            vec![int(20), text("B"), text("SF")],
            vec![int(30), text("C"), text("TOK")],
        ]
    );
}

#[test]
fn rows_come_back_in_key_order_regardless_of_insert_order() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query(CREATE_DEPT).unwrap();
    db.query("INSERT INTO dept VALUES (30, 'C', 'TOK'), (10, 'A', 'NY'), (20, 'B', 'SF');")
        .unwrap();

    let (_, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    let keys: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(keys, vec![&int(10), &int(20), &int(30)]);
}

#[test]
fn duplicate_primary_keys_are_rejected_and_harmless() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    dept_fixture(&mut db);

    let result = db.query("INSERT INTO dept VALUES (10, 'X', 'X');");
    assert!(matches!(result, Err(Error::DuplicateKey)), "{:?}", result);

    let (_, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    assert_eq!(
        rows,
        vec![
            vec![int(10), text("A"), text("NY")],
            vec![int(20), text("B"), text("SF")],
            vec![int(30), text("C"), text("TOK")],
        ]
    );
}

#[test]
fn data_survives_a_reopen() {
    let (_dir, path) = temp_db();
    {
        let mut db = Database::open_or_create(&path).unwrap();
        dept_fixture(&mut db);
        db.close().unwrap();
    }

    let mut db = Database::open_or_create(&path).unwrap();
    let (columns, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    assert_eq!(columns, vec!["deptno", "dname", "loc"]);
    assert_eq!(
        rows,
        vec![
            vec![int(10), text("A"), text("NY")],
            vec![int(20), text("B"), text("SF")],
            vec![int(30), text("C"), text("TOK")],
        ]
    );
}

#[test]
fn select_projects_into_declared_order_when_the_key_is_not_first() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query("CREATE TABLE emp (ename TEXT, empno INTEGER, job TEXT, PRIMARY KEY (empno));")
        .unwrap();
    db.query("INSERT INTO emp VALUES ('KING', 7839, 'PRESIDENT'), ('SMITH', 7369, 'CLERK');")
        .unwrap();

    let (columns, rows) = collect(db.query("SELECT * FROM emp;").unwrap());
    assert_eq!(columns, vec!["ename", "empno", "job"]);
    assert_eq!(
        rows,
        vec![
            vec![text("SMITH"), int(7369), text("CLERK")],
            vec![text("KING"), int(7839), text("PRESIDENT")],
        ]
    );
}

#[test]
fn composite_primary_keys_order_lexicographically() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query("CREATE TABLE grades (student TEXT, course TEXT, grade INTEGER, PRIMARY KEY (student, course));")
        .unwrap();
    db.query("INSERT INTO grades VALUES ('bob', 'math', 3), ('alice', 'physics', 5), ('alice', 'math', 4);")
        .unwrap();

    let (_, rows) = collect(db.query("SELECT * FROM grades;").unwrap());
    assert_eq!(
        rows,
        vec![
            vec![text("alice"), text("math"), int(4)],
            vec![text("alice"), text("physics"), int(5)],
            vec![text("bob"), text("math"), int(3)],
        ]
    );
}

#[test]
fn explicit_column_lists_permute_the_values() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query(CREATE_DEPT).unwrap();
    db.query("INSERT INTO dept (loc, deptno, dname) VALUES ('NY', 10, 'A');")
        .unwrap();

    let (_, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    assert_eq!(rows, vec![vec![int(10), text("A"), text("NY")]]);
}

#[test]
fn schema_violations_are_reported() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query(CREATE_DEPT).unwrap();

    // Unknown table.
    assert!(matches!(
        db.query("SELECT * FROM nope;"),
        Err(Error::Schema(_))
    ));
    assert!(matches!(
        db.query("INSERT INTO nope VALUES (1);"),
        Err(Error::Schema(_))
    ));
    // Unknown column in the list.
    assert!(matches!(
        db.query("INSERT INTO dept (deptno, nope, loc) VALUES (1, 'x', 'y');"),
        Err(Error::Schema(_))
    ));
    // A declared column missing from the list.
    assert!(matches!(
        db.query("INSERT INTO dept (deptno, dname) VALUES (1, 'x');"),
        Err(Error::Schema(_))
    ));
    // Arity mismatch.
    assert!(matches!(
        db.query("INSERT INTO dept VALUES (1, 'x');"),
        Err(Error::Schema(_))
    ));
    // Type mismatches both ways.
    assert!(matches!(
        db.query("INSERT INTO dept VALUES ('one', 'x', 'y');"),
        Err(Error::Schema(_))
    ));
    assert!(matches!(
        db.query("INSERT INTO dept VALUES (1, 2, 'y');"),
        Err(Error::Schema(_))
    ));
    // Redefining a table.
    assert!(matches!(db.query(CREATE_DEPT), Err(Error::Schema(_))));

    // Nothing above should have left partial rows behind.
    let (_, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    assert!(rows.is_empty());
}

#[test]
fn parse_level_errors_keep_their_kinds() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();

    assert!(matches!(
        db.query("SELECT * FROM dept"),
        Err(Error::Incomplete)
    ));
    assert!(matches!(
        db.query("INSERT INTO dept VALUES ('trailing"),
        Err(Error::Incomplete)
    ));
    assert!(matches!(
        db.query("UPDATE dept SET dname = 'x';"),
        Err(Error::NotImplemented(_))
    ));
    assert!(matches!(db.query("SELECT * FORM dept;"), Err(Error::Syntax(_))));
}

#[test]
fn escaped_quotes_round_trip() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query("CREATE TABLE notes (id INTEGER, body TEXT, PRIMARY KEY (id));")
        .unwrap();
    db.query("INSERT INTO notes VALUES (1, 'it''s fine');").unwrap();

    let (_, rows) = collect(db.query("SELECT * FROM notes;").unwrap());
    assert_eq!(rows, vec![vec![int(1), text("it's fine")]]);
}

#[test]
fn negative_keys_sort_before_positive_ones() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query("CREATE TABLE t (n INTEGER, tag TEXT, PRIMARY KEY (n));")
        .unwrap();
    db.query("INSERT INTO t VALUES (5, 'five'), (-3, 'minus three'), (0, 'zero');")
        .unwrap();

    let (_, rows) = collect(db.query("SELECT * FROM t;").unwrap());
    let keys: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
    assert_eq!(keys, vec![&int(-3), &int(0), &int(5)]);
}

/// Enough rows to split the table tree several times over, with the catalog
/// repointed to the moving root, then a reopen to prove it all landed on
/// disk.
#[test]
fn large_tables_split_and_survive_a_reopen() {
    const N: i64 = 500;

    let (_dir, path) = temp_db();
    {
        let mut db = Database::open_or_create(&path).unwrap();
        db.query("CREATE TABLE seq (n INTEGER, label TEXT, PRIMARY KEY (n));")
            .unwrap();

        // A fixed congruential shuffle, so the insert order stresses splits
        // on both edges without being different on every run.
        let mut keys: Vec<i64> = (1..=N).collect();
        let mut state: u64 = 987654321;
        for i in (1..keys.len()).rev() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            keys.swap(i, (state >> 33) as usize % (i + 1));
        }

        for n in keys {
            db.query(&format!("INSERT INTO seq VALUES ({}, 'row {}');", n, n))
                .unwrap();
        }
    }

    let mut db = Database::open_or_create(&path).unwrap();
    let (_, rows) = collect(db.query("SELECT * FROM seq;").unwrap());
    assert_eq!(rows.len(), N as usize);
    for (i, row) in rows.iter().enumerate() {
        let n = i as i64 + 1;
        assert_eq!(row[0], int(n));
        assert_eq!(row[1], text(&format!("row {}", n)));
    }
}

#[test]
fn several_tables_share_one_file() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query(CREATE_DEPT).unwrap();
    db.query("CREATE TABLE emp (empno INTEGER, ename TEXT, PRIMARY KEY (empno));")
        .unwrap();

    db.query("INSERT INTO dept VALUES (10, 'A', 'NY');").unwrap();
    db.query("INSERT INTO emp VALUES (7839, 'KING'), (7369, 'SMITH');")
        .unwrap();

    let (_, dept) = collect(db.query("SELECT * FROM dept;").unwrap());
    let (_, emp) = collect(db.query("SELECT * FROM emp;").unwrap());
    assert_eq!(dept, vec![vec![int(10), text("A"), text("NY")]]);
    assert_eq!(
        emp,
        vec![
            vec![int(7369), text("SMITH")],
            vec![int(7839), text("KING")],
        ]
    );
}

#[test]
fn a_foreign_file_is_refused() {
    let (_dir, path) = temp_db();
    std::fs::write(&path, b"#!/bin/sh\necho this is not a database\n").unwrap();
    assert!(matches!(
        Database::open_or_create(&path),
        Err(Error::InvalidFile(_))
    ));
}

#[test]
fn empty_select_yields_a_header_and_no_rows() {
    let (_dir, path) = temp_db();
    let mut db = Database::open_or_create(&path).unwrap();
    db.query(CREATE_DEPT).unwrap();

    let (columns, rows) = collect(db.query("SELECT * FROM dept;").unwrap());
    assert_eq!(columns, vec!["deptno", "dname", "loc"]);
    assert!(rows.is_empty());
}
