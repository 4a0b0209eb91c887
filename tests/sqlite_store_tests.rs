#![cfg(feature = "sqlite-backend")]

use cascade_delete::{
    CascadeDeleter, CascadeError, CascadeStore, DeletePolicy, EntityId, StoreError,
    dry_run::DryRunStore, sqlite::SqliteStore,
};
use rusqlite::params;

const SCHEMA: &str = "
CREATE TABLE account (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE contact (
    id TEXT PRIMARY KEY,
    account_id TEXT REFERENCES account(id) ON DELETE RESTRICT,
    manager_id TEXT REFERENCES contact(id) ON DELETE RESTRICT
);
CREATE TABLE note (
    id TEXT PRIMARY KEY,
    account_id TEXT REFERENCES account(id) ON DELETE CASCADE
);
CREATE TABLE task (
    id TEXT PRIMARY KEY,
    account_id TEXT REFERENCES account(id) ON DELETE SET NULL,
    contact_id TEXT REFERENCES contact(id) ON DELETE RESTRICT
);
";

fn setup_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open sqlite");
    store
        .connection()
        .execute_batch(SCHEMA)
        .expect("create schema");
    store
}

fn insert_account(store: &SqliteStore) -> EntityId {
    let id = EntityId::new_v4();
    store
        .connection()
        .execute(
            "INSERT INTO account (id, name) VALUES (?1, ?2)",
            params![id.to_string(), "Contoso"],
        )
        .expect("insert account");
    id
}

fn insert_contact(store: &SqliteStore, account: EntityId, manager: Option<EntityId>) -> EntityId {
    let id = EntityId::new_v4();
    store
        .connection()
        .execute(
            "INSERT INTO contact (id, account_id, manager_id) VALUES (?1, ?2, ?3)",
            params![
                id.to_string(),
                account.to_string(),
                manager.map(|m| m.to_string())
            ],
        )
        .expect("insert contact");
    id
}

fn insert_row(store: &SqliteStore, table: &str, column: &str, target: EntityId) -> EntityId {
    let id = EntityId::new_v4();
    store
        .connection()
        .execute(
            &format!("INSERT INTO {table} (id, {column}) VALUES (?1, ?2)"),
            params![id.to_string(), target.to_string()],
        )
        .expect("insert row");
    id
}

#[test]
fn test_relationships_follow_foreign_keys() {
    let store = setup_store();
    let relationships = store
        .one_to_many_relationships("account")
        .expect("relationships");

    let described: Vec<(&str, &str, DeletePolicy)> = relationships
        .iter()
        .map(|r| {
            (
                r.dependent_entity.as_str(),
                r.dependent_lookup_field.as_str(),
                r.delete_policy,
            )
        })
        .collect();
    assert_eq!(
        described,
        vec![
            ("contact", "account_id", DeletePolicy::Restrict),
            ("note", "account_id", DeletePolicy::Cascade),
            ("task", "account_id", DeletePolicy::RemoveLink),
        ]
    );
}

#[test]
fn test_self_reference_is_reported_as_relationship() {
    let store = setup_store();
    let relationships = store
        .one_to_many_relationships("contact")
        .expect("relationships");
    assert!(relationships.iter().any(|r| r.dependent_entity == "contact"
        && r.dependent_lookup_field == "manager_id"
        && r.delete_policy == DeletePolicy::Restrict));
    assert!(relationships
        .iter()
        .any(|r| r.dependent_entity == "task" && r.dependent_lookup_field == "contact_id"));
}

#[test]
fn test_unknown_table_is_not_found() {
    let store = setup_store();
    let err = store
        .one_to_many_relationships("missing")
        .expect_err("unknown table");
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn test_lookup_pages_through_all_matches() {
    let store = setup_store().with_page_size(2);
    let account = insert_account(&store);
    let other = insert_account(&store);
    let mut expected: Vec<EntityId> = (0..5)
        .map(|_| insert_contact(&store, account, None))
        .collect();
    insert_contact(&store, other, None);

    let mut found = store
        .find_records_by_lookup("contact", "account_id", &[account])
        .expect("lookup");
    expected.sort_by_key(|id| id.to_string());
    found.sort_by_key(|id| id.to_string());
    assert_eq!(found, expected);
}

#[test]
fn test_lookup_with_no_ids_returns_nothing() {
    let store = setup_store();
    let found = store
        .find_records_by_lookup("contact", "account_id", &[])
        .expect("lookup");
    assert!(found.is_empty());
}

#[test]
fn test_lookup_on_unknown_column_is_query_error() {
    let store = setup_store();
    let err = store
        .find_records_by_lookup("contact", "no_such_column", &[EntityId::new_v4()])
        .expect_err("bad column");
    assert!(matches!(err, StoreError::Query(_)));
}

#[test]
fn test_bulk_delete_reports_per_record_faults() {
    let store = setup_store();
    let free = insert_account(&store);
    let referenced = insert_account(&store);
    insert_contact(&store, referenced, None);
    let missing = EntityId::new_v4();

    let responses = store
        .bulk_delete("account", &[free, referenced, missing])
        .expect("bulk delete");

    assert_eq!(responses.len(), 3);
    assert!(responses[0].fault.is_none());
    assert!(
        responses[1]
            .fault
            .as_deref()
            .expect("restrict fault")
            .contains("FOREIGN KEY")
    );
    assert_eq!(
        responses[2].fault.as_deref(),
        Some(format!("account record {missing} does not exist").as_str())
    );
    assert_eq!(store.count("account").expect("count"), 1);
}

#[test]
fn test_cascade_delete_clears_restrict_dependents() {
    let store = setup_store();
    let account = insert_account(&store);
    let manager = insert_contact(&store, account, None);
    let report = insert_contact(&store, account, Some(manager));
    let task = insert_row(&store, "task", "contact_id", report);
    let note = insert_row(&store, "note", "account_id", account);
    let linked = insert_row(&store, "task", "account_id", account);

    let deleter = CascadeDeleter::new(&store).with_batch_size(1).expect("batch size");
    let results = deleter.cascade_delete("account", &[account]).expect("cascade");

    assert!(results.iter().all(|r| r.is_success()), "{results:?}");
    let deleted: Vec<(&str, EntityId)> = results
        .iter()
        .map(|r| (r.entity_name.as_str(), r.record_id))
        .collect();
    assert!(deleted.contains(&("task", task)));
    assert!(deleted.contains(&("contact", report)));
    assert!(deleted.contains(&("contact", manager)));
    assert_eq!(deleted.last(), Some(&("account", account)));
    assert!(!deleted.iter().any(|(_, id)| *id == note || *id == linked));

    assert_eq!(store.count("account").expect("count"), 0);
    assert_eq!(store.count("contact").expect("count"), 0);
    assert_eq!(store.count("note").expect("count"), 0);
    let unlinked: Option<String> = store
        .connection()
        .query_row(
            "SELECT account_id FROM task WHERE id = ?1",
            params![linked.to_string()],
            |row| row.get(0),
        )
        .expect("linked task survives");
    assert_eq!(unlinked, None);
}

#[test]
fn test_dry_run_leaves_database_untouched() {
    let store = setup_store();
    let account = insert_account(&store);
    insert_contact(&store, account, None);

    let deleter = CascadeDeleter::new(DryRunStore::new(&store));
    let results = deleter.cascade_delete("account", &[account]).expect("dry run");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(store.count("account").expect("count"), 1);
    assert_eq!(store.count("contact").expect("count"), 1);
}

#[test]
fn test_cascade_on_unknown_table_is_metadata_failure() {
    let store = setup_store();
    let err = CascadeDeleter::new(&store)
        .cascade_delete("missing", &[EntityId::new_v4()])
        .expect_err("unknown table");
    assert!(matches!(
        err,
        CascadeError::MetadataUnavailable {
            source: StoreError::NotFound(_),
            ..
        }
    ));
}

#[test]
fn test_default_foreign_key_is_cleared_before_parent() {
    let store = SqliteStore::open_in_memory().expect("open sqlite");
    store
        .connection()
        .execute_batch(
            "CREATE TABLE account (id TEXT PRIMARY KEY);
             CREATE TABLE contact (id TEXT PRIMARY KEY, account_id TEXT REFERENCES account(id));
             CREATE TABLE invoice (id TEXT PRIMARY KEY, account_id TEXT REFERENCES account);",
        )
        .expect("create schema");
    let account = insert_account_id(&store);
    let contact = insert_row(&store, "contact", "account_id", account);
    let invoice = insert_row(&store, "invoice", "account_id", account);

    let relationships = store
        .one_to_many_relationships("account")
        .expect("relationships");
    assert!(
        relationships
            .iter()
            .all(|r| r.delete_policy == DeletePolicy::Restrict)
    );
    assert_eq!(relationships.len(), 2);

    let results = CascadeDeleter::new(&store)
        .cascade_delete("account", &[account])
        .expect("cascade");
    let deleted: Vec<(&str, EntityId)> = results
        .iter()
        .map(|r| (r.entity_name.as_str(), r.record_id))
        .collect();
    assert_eq!(
        deleted,
        vec![("contact", contact), ("invoice", invoice), ("account", account)]
    );
    assert!(results.iter().all(|r| r.is_success()), "{results:?}");
    assert_eq!(store.count("account").expect("count"), 0);
}

#[test]
fn test_foreign_key_to_unique_column_is_skipped() {
    let store = SqliteStore::open_in_memory().expect("open sqlite");
    store
        .connection()
        .execute_batch(
            "CREATE TABLE account (id TEXT PRIMARY KEY, code TEXT UNIQUE);
             CREATE TABLE contact (
                 id TEXT PRIMARY KEY,
                 account_id TEXT REFERENCES account(id) ON DELETE RESTRICT,
                 account_code TEXT REFERENCES account(code) ON DELETE RESTRICT
             );",
        )
        .expect("create schema");

    let relationships = store
        .one_to_many_relationships("account")
        .expect("relationships");
    let fields: Vec<&str> = relationships
        .iter()
        .map(|r| r.dependent_lookup_field.as_str())
        .collect();
    assert_eq!(fields, vec!["account_id"]);
}

fn insert_account_id(store: &SqliteStore) -> EntityId {
    let id = EntityId::new_v4();
    store
        .connection()
        .execute("INSERT INTO account (id) VALUES (?1)", params![id.to_string()])
        .expect("insert account");
    id
}
