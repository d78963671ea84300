#![forbid(unsafe_code)]

use rusqlite::params;
use std::path::PathBuf;
use tg_core::ids::{RecordId, TableName};
use tg_core::{CellValue, Placement, Row, SchemaCatalog, Session, TableShape};
use tg_storage::{CreateRequest, MoveRequest, SqliteStore};

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("tg_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn table(name: &str) -> TableName {
    TableName::try_new(name).expect("table name")
}

fn open_store(test_name: &str) -> SqliteStore {
    let catalog = SchemaCatalog::new()
        .with_table(table("tl_page"), TableShape::tree())
        .with_table(table("tl_module"), TableShape::default().with_pid())
        .with_table(table("tl_style"), TableShape::ordered_list());
    let store = SqliteStore::open(temp_dir(test_name), catalog).expect("open store");
    store
        .connection()
        .execute_batch(
            r#"
            CREATE TABLE tl_page (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              pid INTEGER NOT NULL DEFAULT 0,
              sorting INTEGER NOT NULL DEFAULT 0,
              tstamp INTEGER NOT NULL DEFAULT 0,
              title TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE tl_module (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              pid INTEGER NOT NULL DEFAULT 0,
              name TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE tl_style (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              sorting INTEGER NOT NULL DEFAULT 0,
              selector TEXT NOT NULL DEFAULT ''
            );
            "#,
        )
        .expect("create tables");
    store
}

fn seed_page(store: &SqliteStore, pid: RecordId, sorting: i64, title: &str) -> RecordId {
    store
        .connection()
        .execute(
            "INSERT INTO tl_page(pid, sorting, title) VALUES (?1, ?2, ?3)",
            params![pid, sorting, title],
        )
        .expect("seed page");
    store.connection().last_insert_rowid()
}

fn create_page(store: &mut SqliteStore, placement: Placement, title: &str) -> RecordId {
    let mut fields = Row::new();
    fields.insert("title".to_string(), CellValue::text(title));
    store
        .create(
            &mut Session::new(1),
            CreateRequest {
                table: table("tl_page"),
                fields,
                placement: Some(placement),
            },
        )
        .expect("create page")
}

/// `(title, sorting)` of the children of `pid` in display order.
fn siblings(store: &SqliteStore, pid: RecordId) -> Vec<(String, i64)> {
    store
        .list_children(&table("tl_page"), pid, None)
        .expect("list children")
        .into_iter()
        .map(|row| {
            let title = row
                .get("title")
                .and_then(CellValue::as_str)
                .unwrap_or_default()
                .to_string();
            let sorting = row.get("sorting").and_then(CellValue::as_i64).unwrap_or(-1);
            (title, sorting)
        })
        .collect()
}

fn assert_unique_sortings(rows: &[(String, i64)]) {
    let mut sortings = rows.iter().map(|(_, sorting)| *sorting).collect::<Vec<_>>();
    sortings.dedup();
    assert_eq!(sortings.len(), rows.len(), "duplicate sorting in {rows:?}");
    assert!(
        sortings.windows(2).all(|pair| pair[0] < pair[1]),
        "not increasing: {rows:?}"
    );
}

#[test]
fn first_child_of_empty_parent_takes_first_step() {
    let mut store = open_store("first_child_of_empty_parent_takes_first_step");
    let id = create_page(&mut store, Placement::inside(0), "home");

    let row = store
        .get_record(&table("tl_page"), id)
        .expect("get")
        .expect("row exists");
    assert_eq!(row.get("pid"), Some(&CellValue::Integer(0)));
    assert_eq!(row.get("sorting"), Some(&CellValue::Integer(128)));
    assert!(row.get("tstamp").and_then(CellValue::as_i64).unwrap_or(0) > 0);
}

#[test]
fn insert_into_halves_even_minimum_without_touching_siblings() {
    let mut store = open_store("insert_into_halves_even_minimum_without_touching_siblings");
    seed_page(&store, 3, 128, "a");
    seed_page(&store, 3, 256, "b");

    create_page(&mut store, Placement::inside(3), "new");
    assert_eq!(
        siblings(&store, 3),
        vec![
            ("new".to_string(), 64),
            ("a".to_string(), 128),
            ("b".to_string(), 256),
        ]
    );
}

#[test]
fn insert_into_odd_minimum_rebalances_group() {
    let mut store = open_store("insert_into_odd_minimum_rebalances_group");
    seed_page(&store, 5, 1, "a");
    seed_page(&store, 5, 3, "b");
    let other = seed_page(&store, 6, 1, "elsewhere");

    create_page(&mut store, Placement::inside(5), "new");
    assert_eq!(
        siblings(&store, 5),
        vec![
            ("new".to_string(), 128),
            ("a".to_string(), 256),
            ("b".to_string(), 384),
        ]
    );

    let untouched = store
        .get_record(&table("tl_page"), other)
        .expect("get")
        .expect("row exists");
    assert_eq!(untouched.get("sorting"), Some(&CellValue::Integer(1)));
}

#[test]
fn insert_after_takes_midpoint_when_gap_allows() {
    let mut store = open_store("insert_after_takes_midpoint_when_gap_allows");
    let x = seed_page(&store, 0, 100, "x");
    seed_page(&store, 0, 102, "y");

    create_page(&mut store, Placement::after(x), "new");
    assert_eq!(
        siblings(&store, 0),
        vec![
            ("x".to_string(), 100),
            ("new".to_string(), 101),
            ("y".to_string(), 102),
        ]
    );
}

#[test]
fn insert_after_with_odd_gap_rebalances_and_keeps_slot_after_reference() {
    let mut store =
        open_store("insert_after_with_odd_gap_rebalances_and_keeps_slot_after_reference");
    let x = seed_page(&store, 0, 100, "x");
    seed_page(&store, 0, 101, "y");

    create_page(&mut store, Placement::after(x), "new");
    let rows = siblings(&store, 0);
    assert_eq!(
        rows,
        vec![
            ("x".to_string(), 128),
            ("new".to_string(), 256),
            ("y".to_string(), 384),
        ]
    );
    assert!(rows.iter().all(|(_, sorting)| sorting % 128 == 0));
}

#[test]
fn insert_after_last_sibling_appends_one_step() {
    let mut store = open_store("insert_after_last_sibling_appends_one_step");
    let parent = seed_page(&store, 0, 128, "root");
    let last = seed_page(&store, parent, 512, "last");

    let position = store
        .resolve_position(&table("tl_page"), None, Some(&Placement::after(last)))
        .expect("resolve");
    assert_eq!(position.pid, Some(parent));
    assert_eq!(position.sorting, Some(640));
}

#[test]
fn zero_or_missing_reference_goes_into_target() {
    let mut store = open_store("zero_or_missing_reference_goes_into_target");
    let root = store
        .resolve_position(&table("tl_page"), None, Some(&Placement::after(0)))
        .expect("resolve root");
    assert_eq!(root.pid, Some(0));
    assert_eq!(root.sorting, Some(128));

    let missing = store
        .resolve_position(&table("tl_page"), None, Some(&Placement::after(42)))
        .expect("resolve missing");
    assert_eq!(missing.pid, Some(42));
    assert_eq!(missing.sorting, Some(128));
}

#[test]
fn repeated_inserts_never_share_a_sorting_value() {
    let mut store = open_store("repeated_inserts_never_share_a_sorting_value");
    let first = create_page(&mut store, Placement::inside(0), "p0");
    let mut previous = first;
    for index in 1..12 {
        // Alternate between squeezing right after the first page and
        // appending, which exhausts gaps quickly.
        let placement = if index % 2 == 0 {
            Placement::after(first)
        } else {
            Placement::after(previous)
        };
        previous = create_page(&mut store, placement, &format!("p{index}"));
        create_page(&mut store, Placement::inside(0), &format!("head{index}"));
    }

    let rows = siblings(&store, 0);
    assert_eq!(rows.len(), 23);
    assert_unique_sortings(&rows);
}

#[test]
fn move_reorders_within_group() {
    let mut store = open_store("move_reorders_within_group");
    let a = seed_page(&store, 0, 128, "a");
    seed_page(&store, 0, 256, "b");
    let c = seed_page(&store, 0, 384, "c");

    let position = store
        .move_record(
            &mut Session::new(1),
            MoveRequest {
                table: table("tl_page"),
                id: c,
                placement: Placement::after(a),
            },
        )
        .expect("move");
    assert_eq!(position.sorting, Some(192));
    assert_eq!(
        siblings(&store, 0)
            .into_iter()
            .map(|(title, _)| title)
            .collect::<Vec<_>>(),
        vec!["a", "c", "b"]
    );
}

#[test]
fn parent_only_table_inherits_reference_parent() {
    let mut store = open_store("parent_only_table_inherits_reference_parent");
    store
        .connection()
        .execute("INSERT INTO tl_module(pid, name) VALUES (9, 'nav')", [])
        .expect("seed module");
    let reference = store.connection().last_insert_rowid();
    let modules = table("tl_module");

    let after = store
        .resolve_position(&modules, None, Some(&Placement::after(reference)))
        .expect("after");
    assert_eq!(after.pid, Some(9));
    assert_eq!(after.sorting, None);

    let into = store
        .resolve_position(&modules, None, Some(&Placement::inside(4)))
        .expect("into");
    assert_eq!(into.pid, Some(4));
    assert_eq!(into.sorting, None);
}

#[test]
fn flat_list_appends_and_places_after_own_slot() {
    let mut store = open_store("flat_list_appends_and_places_after_own_slot");
    let styles = table("tl_style");
    let mut session = Session::new(1);
    let mut ids = Vec::new();
    for selector in ["body", "h1", "p"] {
        let mut fields = Row::new();
        fields.insert("selector".to_string(), CellValue::text(selector));
        ids.push(
            store
                .create(
                    &mut session,
                    CreateRequest {
                        table: styles.clone(),
                        fields,
                        placement: Some(Placement::inside(999)),
                    },
                )
                .expect("create style"),
        );
    }
    let sorting_of = |store: &SqliteStore, id| {
        store
            .get_record(&styles, id)
            .expect("get")
            .and_then(|row| row.get("sorting").and_then(CellValue::as_i64))
    };
    assert_eq!(sorting_of(&store, ids[0]), Some(128));
    assert_eq!(sorting_of(&store, ids[1]), Some(256));
    assert_eq!(sorting_of(&store, ids[2]), Some(384));

    // The target is ignored; the record's own slot is the reference.
    let position = store
        .resolve_position(&styles, Some(ids[0]), Some(&Placement::after(ids[2])))
        .expect("resolve");
    assert_eq!(position.pid, None);
    assert_eq!(position.sorting, Some(192));
}
