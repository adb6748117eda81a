//! Relmap – maps trees of plain Rust values onto SQLite tables.
//!
//! An application describes its data once, as a [`Schema`]:
//! * A [`Table`] maps one [`Entity`] type onto one table. Each mapped field is a
//!   column reached through a pair of plain getter/setter functions.
//! * A [`ChildLink`] nests child tables under a parent. A child container holds
//!   a single value, a list, or a set that may span several tables (see
//!   [`child_variants!`]).
//! * An [`EntityLink`] records that a column of one table holds the id of a root
//!   entity elsewhere, and what happens to it when that root is deleted.
//!
//! The [`EntityManager`] then reads, writes and deletes whole entity trees,
//! each in one transaction, and answers id, field, link and keyword queries.
//!
//! ## Modules
//! * [`schema`] – The registry and its validation rules.
//! * [`datatype`] – [`DataType`] and the [`ColumnValue`] trait for field types.
//! * [`manager`] – Transactional entity persistence and queries.
//! * [`predicate`] – Builders for `WHERE` and `ORDER BY` fragments.
//! * [`database`] – Opening a store and migrating it to the schema.
//! * [`config`] – [`Settings`] from files and the environment.
//! * [`logging`] – Subscriber setup for the `tracing` events the crate emits.
//!
//! ## Quick Start
//! ```
//! use relmap::{Entity, EntityManager, Schema, Table, database};
//! use rusqlite::Connection;
//!
//! #[derive(Default)]
//! struct Customer { id: i64, name: String }
//! impl Entity for Customer {}
//!
//! let mut schema = Schema::new();
//! schema.register_table(
//!     Table::<Customer>::new("Customer")
//!         .primary_key("id", |c| c.id, |c, v| c.id = v)
//!         .column("name", |c| c.name.clone(), |c, v| c.name = v),
//! ).unwrap();
//!
//! let conn = Connection::open_in_memory().unwrap();
//! database::migrate(&conn, &schema).unwrap();
//!
//! let manager = EntityManager::new(&conn, &schema);
//! let mut alice = Customer { name: "Alice".into(), ..Default::default() };
//! let id = manager.write(&mut alice).unwrap().id().unwrap();
//! assert_eq!(alice.id, id);
//! assert_eq!(manager.read::<Customer>(id).unwrap().unwrap().name, "Alice");
//! ```

mod accessor;
pub mod config;
pub mod database;
pub mod datatype;
pub mod entity;
pub mod error;
pub mod logging;
pub mod manager;
pub mod predicate;
mod query;
pub mod schema;
mod search;

pub use config::Settings;
pub use datatype::{ColumnValue, DataType};
pub use entity::{Entity, Variant};
pub use error::{RelmapError, Result};
pub use manager::{EntityManager, EntityQuery, EntityRows, FieldQuery, FieldRow, FieldRows, WriteOutcome};
pub use predicate::{Direction, Literal, Literals, OrderBy, PredicateBuilder, WhereClause};
pub use query::JoinPath;
pub use schema::{
    Cardinality, ChildLink, EntityLink, FieldDescriptor, IndexDescriptor, LinkPolicy, Schema, Table,
    TableDefinition, TableDescriptor,
};
pub use search::KEYWORD_LIMIT;
