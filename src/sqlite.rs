//! SQLite adapter. Relationship metadata comes from the foreign keys declared
//! on each table, so a cascade follows whatever `ON DELETE` policies the
//! schema carries. Record ids are stored as hyphenated UUID text in each
//! table's single-column primary key.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use tracing::debug;

use crate::{
    config::DEFAULT_PAGE_SIZE,
    errors::StoreError,
    model::{DeletePolicy, DeleteResponse, EntityId, RelationshipMetadata},
    store::CascadeStore,
};

pub struct SqliteStore {
    conn: Connection,
    page_size: usize,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection and turns foreign-key enforcement on.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StoreError::connection(e.to_string()))?;
        Ok(Self {
            conn,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
                params![table],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::query(e.to_string()))?;
        Ok(found.is_some())
    }

    pub fn count(&self, table: &str) -> Result<i64, StoreError> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |row| {
                row.get(0)
            })
            .map_err(|e| StoreError::query(e.to_string()))
    }

    fn table_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(|e| StoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut names = Vec::new();
        for name in rows {
            names.push(name.map_err(|e| StoreError::query(e.to_string()))?);
        }
        Ok(names)
    }

    fn primary_key(&self, table: &str) -> Result<String, StoreError> {
        if !self.table_exists(table)? {
            return Err(StoreError::not_found(table.to_string()));
        }
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) WHERE pk > 0 ORDER BY pk")
            .map_err(|e| StoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut columns = Vec::new();
        for column in rows {
            columns.push(column.map_err(|e| StoreError::query(e.to_string()))?);
        }
        match columns.as_slice() {
            [column] => Ok(column.clone()),
            [] => Err(StoreError::invalid_input(format!(
                "table {table} has no primary key"
            ))),
            _ => Err(StoreError::invalid_input(format!(
                "table {table} has a composite primary key"
            ))),
        }
    }

    /// Single-column foreign keys declared on `table`. `to` is `None` when
    /// the key names no column and so targets the primary key.
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT \"table\", \"from\", \"to\", on_delete FROM pragma_foreign_key_list(?1)
                 GROUP BY id HAVING COUNT(*) = 1 ORDER BY id",
            )
            .map_err(|e| StoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![table], |row| {
                Ok(ForeignKey {
                    referenced: row.get(0)?,
                    from: row.get(1)?,
                    to: row.get(2)?,
                    on_delete: row.get(3)?,
                })
            })
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key.map_err(|e| StoreError::query(e.to_string()))?);
        }
        Ok(keys)
    }
}

impl CascadeStore for SqliteStore {
    fn one_to_many_relationships(
        &self,
        entity: &str,
    ) -> Result<Vec<RelationshipMetadata>, StoreError> {
        let key = match self.primary_key(entity) {
            Ok(key) => Some(key),
            Err(StoreError::InvalidInput(_)) => None,
            Err(err) => return Err(err),
        };
        let mut relationships = Vec::new();
        for table in self.table_names()? {
            for foreign_key in self.foreign_keys(&table)? {
                if foreign_key.referenced != entity {
                    continue;
                }
                if !foreign_key.targets_key(key.as_deref()) {
                    debug!(
                        entity,
                        dependent = %table,
                        column = %foreign_key.from,
                        "skipping foreign key that does not reference the primary key"
                    );
                    continue;
                }
                relationships.push(RelationshipMetadata::new(
                    table.clone(),
                    foreign_key.from,
                    policy_from_sql(&foreign_key.on_delete),
                ));
            }
        }
        Ok(relationships)
    }

    fn find_records_by_lookup(
        &self,
        entity: &str,
        lookup_field: &str,
        referenced_ids: &[EntityId],
    ) -> Result<Vec<EntityId>, StoreError> {
        if referenced_ids.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.primary_key(entity)?;
        let placeholders = vec!["?"; referenced_ids.len()].join(", ");
        let sql = format!(
            "SELECT {key} FROM {table} WHERE {field} IN ({placeholders}) ORDER BY {key} LIMIT ? OFFSET ?",
            key = quote_ident(&key),
            table = quote_ident(entity),
            field = quote_ident(lookup_field),
        );
        debug!(entity, lookup_field, sql = %sql, "looking up dependent records");
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StoreError::query(e.to_string()))?;

        let mut found = Vec::new();
        let mut offset = 0usize;
        loop {
            let mut values: Vec<Value> = referenced_ids
                .iter()
                .map(|id| Value::Text(id.to_string()))
                .collect();
            values.push(Value::Integer(self.page_size as i64));
            values.push(Value::Integer(offset as i64));
            let rows = stmt
                .query_map(params_from_iter(values), |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::query(e.to_string()))?;
            let mut page = 0usize;
            for raw in rows {
                let raw = raw.map_err(|e| StoreError::query(e.to_string()))?;
                let id = raw.parse::<EntityId>().map_err(|e| {
                    StoreError::query(format!("{entity} key {raw} is not a uuid: {e}"))
                })?;
                found.push(id);
                page += 1;
            }
            if page < self.page_size {
                break;
            }
            offset += page;
        }
        Ok(found)
    }

    fn bulk_delete(
        &self,
        entity: &str,
        ids: &[EntityId],
    ) -> Result<Vec<DeleteResponse>, StoreError> {
        let key = self.primary_key(entity)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(entity),
            quote_ident(&key)
        );
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::execution(e.to_string()))?;
        let mut responses = Vec::with_capacity(ids.len());
        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| StoreError::execution(e.to_string()))?;
            for id in ids {
                let response = match stmt.execute(params![id.to_string()]) {
                    Ok(0) => {
                        DeleteResponse::fault(*id, format!("{entity} record {id} does not exist"))
                    }
                    Ok(_) => DeleteResponse::success(*id),
                    Err(err) => DeleteResponse::fault(*id, err.to_string()),
                };
                responses.push(response);
            }
        }
        tx.commit()
            .map_err(|e| StoreError::execution(e.to_string()))?;
        Ok(responses)
    }
}

struct ForeignKey {
    referenced: String,
    from: String,
    to: Option<String>,
    on_delete: String,
}

impl ForeignKey {
    fn targets_key(&self, key: Option<&str>) -> bool {
        match (self.to.as_deref(), key) {
            (None, Some(_)) => true,
            (Some(to), Some(key)) => to.eq_ignore_ascii_case(key),
            (_, None) => false,
        }
    }
}

/// SQLite checks `NO ACTION` keys like `RESTRICT` (at statement end, or at
/// commit when deferred), so both need their dependents deleted first.
fn policy_from_sql(on_delete: &str) -> DeletePolicy {
    match on_delete.to_ascii_uppercase().as_str() {
        "CASCADE" => DeletePolicy::Cascade,
        "SET NULL" | "SET DEFAULT" => DeletePolicy::RemoveLink,
        _ => DeletePolicy::Restrict,
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
