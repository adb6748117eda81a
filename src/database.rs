//! Opening a database and bringing its schema up to date.
//!
//! Migration is additive only: missing tables, columns, indexes and keyword
//! tables are created, nothing is ever dropped or retyped.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{RelmapError, Result};
use crate::manager::Scope;
use crate::schema::{Schema, TableDescriptor};

/// Opens the configured database and migrates it when its stored version
/// differs from the schema version, or when it has never been migrated.
pub fn open(settings: &Settings, schema: &Schema) -> Result<Connection> {
    let connection = match &settings.database {
        Some(path) => Connection::open(path)?,
        None => Connection::open_in_memory()?,
    };
    let version: i64 = connection.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version == 0 || version != i64::from(schema.version()) {
        info!(from = version, to = schema.version(), "migrating database");
        migrate(&connection, schema)?;
        connection.execute_batch(&format!("PRAGMA user_version = {}", schema.version()))?;
    }
    Ok(connection)
}

/// Creates whatever the registry describes but the store lacks, in one
/// transaction (or a savepoint, inside a caller's transaction). Returns the statements that were executed, so running it a
/// second time against the same store returns an empty list.
pub fn migrate(connection: &Connection, schema: &Schema) -> Result<Vec<String>> {
    let scope = Scope::begin(connection)?;
    let mut executed = Vec::new();
    for table in schema.tables() {
        // ------------- Table and columns -------------
        let columns = live_columns(connection, table.name())?;
        if columns.is_empty() {
            run(connection, create_table(table), &mut executed)?;
        } else {
            if let Some((live, _)) = columns.iter().find(|(_, pk)| *pk) {
                if !live.eq_ignore_ascii_case(table.primary_key().column()) {
                    warn!(
                        table = table.name(),
                        live = %live,
                        declared = table.primary_key().column(),
                        "primary key column differs from the stored one"
                    );
                }
            }
            for field in table.fields() {
                if !columns.iter().any(|(name, _)| name.eq_ignore_ascii_case(field.column())) {
                    let ddl = format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        table.name(),
                        field.column(),
                        field.data_type().affinity()
                    );
                    run(connection, ddl, &mut executed)?;
                }
            }
        }

        // ------------- Indexes -------------
        let indexes = live_indexes(connection, table.name())?;
        for index in table.indexes() {
            let present = indexes.iter().any(|live| {
                live.len() == index.columns().len()
                    && live.iter().zip(index.columns()).all(|(a, b)| a.eq_ignore_ascii_case(b))
            });
            if !present {
                let ddl = format!(
                    "CREATE {}INDEX {} ON {}({})",
                    if index.is_unique() { "UNIQUE " } else { "" },
                    index_name(table.name(), index.columns()),
                    table.name(),
                    index.columns().join(", ")
                );
                run(connection, ddl, &mut executed)?;
            }
        }

        // ------------- Keyword table -------------
        if table.has_search_index() && !table_exists(connection, &table.search_table())? {
            let ddl = format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING FTS4(tokenize=porter)",
                table.search_table()
            );
            info!(ddl = %ddl, "migrate");
            match connection.execute_batch(&ddl) {
                Ok(()) => executed.push(ddl),
                Err(e) => warn!(error = %e, table = table.name(), "keyword table not created"),
            }
        }
    }
    scope.commit()?;
    Ok(executed)
}

fn run(connection: &Connection, ddl: String, executed: &mut Vec<String>) -> Result<()> {
    info!(ddl = %ddl, "migrate");
    connection
        .execute_batch(&ddl)
        .map_err(|e| RelmapError::wrap(format!("Migration failed on {}", ddl), e))?;
    executed.push(ddl);
    Ok(())
}

fn create_table(table: &TableDescriptor) -> String {
    let pk = table.primary_key();
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", pk.column())];
    for field in table.value_fields() {
        columns.push(format!(
            "{} {}{}",
            field.column(),
            field.data_type().affinity(),
            if field.is_nullable() { "" } else { " NOT NULL" }
        ));
    }
    format!("CREATE TABLE {}({})", table.name(), columns.join(", "))
}

/// `Invoice_Item` with columns `invoice_id, line_no` becomes `InvoiceItemInvoiceIdLineNoIdx`.
pub(crate) fn index_name(table: &str, columns: &[String]) -> String {
    let mut name = camel(table);
    for column in columns {
        name.push_str(&camel(column));
    }
    name.push_str("Idx");
    name
}

fn camel(identifier: &str) -> String {
    let mut result = String::with_capacity(identifier.len());
    let mut upper = true;
    for c in identifier.chars() {
        if c.is_ascii_alphanumeric() {
            if upper {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    result
}

/// Column names of a stored table, flagged when part of the primary key.
fn live_columns(connection: &Connection, table: &str) -> Result<Vec<(String, bool)>> {
    let mut statement = connection.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = statement.query_map([], |row| {
        let name: String = row.get(1)?;
        let pk: i64 = row.get(5)?;
        Ok((name, pk > 0))
    })?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Column lists of every index on a stored table, in index order.
fn live_indexes(connection: &Connection, table: &str) -> Result<Vec<Vec<String>>> {
    let mut names = Vec::new();
    {
        let mut statement = connection.prepare(&format!("PRAGMA index_list({})", table))?;
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            names.push(row.get::<_, String>(1)?);
        }
    }
    let mut indexes = Vec::with_capacity(names.len());
    for name in names {
        let mut statement = connection.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let mut rows = statement.query([])?;
        let mut columns: Vec<(i64, String)> = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push((row.get(0)?, row.get::<_, Option<String>>(2)?.unwrap_or_default()));
        }
        columns.sort_by_key(|(seq, _)| *seq);
        indexes.push(columns.into_iter().map(|(_, c)| c).collect());
    }
    Ok(indexes)
}

fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
    let count: i64 = connection.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::schema::{FieldDescriptor, Table};

    #[derive(Default)]
    struct Product {
        id: i64,
        name: String,
        price: f64,
    }
    impl Entity for Product {
        const SEARCHABLE: bool = true;
        fn keywords(&self) -> String {
            self.name.clone()
        }
    }

    #[derive(Default)]
    struct Product2 {
        id: i64,
        name: String,
        price: f64,
        sku: Option<String>,
    }
    impl Entity for Product2 {}

    fn schema() -> Schema {
        let mut schema = Schema::new().with_version(1);
        schema
            .register_table(
                Table::<Product>::new("Product")
                    .primary_key("id", |p| p.id, |p, v| p.id = v)
                    .field(FieldDescriptor::new::<Product, String>("name", |p| p.name.clone(), |p, v| p.name = v).not_null())
                    .column("price", |p| p.price, |p, v| p.price = v)
                    .index(&["name"], true),
            )
            .expect("register");
        schema
    }

    #[test]
    fn index_names_are_camel_cased() {
        let columns = vec!["invoice_id".to_string(), "line_no".to_string()];
        assert_eq!(index_name("Invoice_Item", &columns), "InvoiceItemInvoiceIdLineNoIdx");
        assert_eq!(index_name("Product", &["name".to_string()]), "ProductNameIdx");
    }

    #[test]
    fn migrate_creates_everything_once() {
        let connection = Connection::open_in_memory().expect("db");
        let schema = schema();
        let first = migrate(&connection, &schema).expect("migrate");
        assert_eq!(
            first[0],
            "CREATE TABLE Product(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, price REAL)"
        );
        assert!(first.contains(&"CREATE UNIQUE INDEX ProductNameIdx ON Product(name)".to_string()));
        assert!(first.iter().any(|ddl| ddl.contains("Product_KW USING FTS4")));
        let second = migrate(&connection, &schema).expect("migrate again");
        assert!(second.is_empty(), "nothing left to do: {:?}", second);
    }

    #[test]
    fn migrate_adds_missing_columns() {
        let connection = Connection::open_in_memory().expect("db");
        migrate(&connection, &schema()).expect("migrate");

        let mut wider = Schema::new().with_version(2);
        wider
            .register_table(
                Table::<Product2>::new("Product")
                    .primary_key("id", |p| p.id, |p, v| p.id = v)
                    .column("name", |p| p.name.clone(), |p, v| p.name = v)
                    .column("price", |p| p.price, |p, v| p.price = v)
                    .column("sku", |p| p.sku.clone(), |p, v| p.sku = v),
            )
            .expect("register");
        let executed = migrate(&connection, &wider).expect("migrate wider");
        assert_eq!(executed, vec!["ALTER TABLE Product ADD COLUMN sku TEXT".to_string()]);
    }

    #[test]
    fn open_stamps_the_schema_version() {
        let settings = Settings::default();
        let connection = open(&settings, &schema()).expect("open");
        let version: i64 = connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("version");
        assert_eq!(version, 1);
        assert!(table_exists(&connection, "Product").expect("exists"));
    }
}
