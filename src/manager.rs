//! Transactional read, write and delete of entity trees, plus the query surface.

use roaring::RoaringTreemap;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, MAIN_DB, Params, Row, Rows, Statement, Transaction, params, params_from_iter};
use std::any::{Any, TypeId, type_name};
use std::cell::Cell;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::datatype::{ColumnValue, DataType};
use crate::entity::{Entity, record_type};
use crate::error::{RelmapError, Result};
use crate::predicate::PredicateBuilder;
use crate::schema::{ChildLink, FieldDescriptor, LinkPolicy, Schema, TableDescriptor};
use crate::search::{self, KEYWORD_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The entity was stored under this primary key.
    Written(i64),
    /// The pre-write hook declined; nothing was touched.
    Skipped,
}

impl WriteOutcome {
    pub fn id(&self) -> Option<i64> {
        match self {
            WriteOutcome::Written(id) => Some(*id),
            WriteOutcome::Skipped => None,
        }
    }
}

/// A persisted row across all tables: ordered by table sequence, then by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct GlobalId {
    table: usize,
    id: i64,
}

fn materialize(table: &TableDescriptor, row: &Row<'_>) -> rusqlite::Result<Box<dyn Any>> {
    let mut record = (table.hooks.create)();
    for field in table.fields() {
        let value = row.get_ref(field.ordinal())?;
        field.assign(&mut *record, value).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(field.ordinal(), value.data_type(), Box::new(e))
        })?;
    }
    Ok(record)
}

fn downcast<T: Entity>(table: &TableDescriptor, record: Box<dyn Any>) -> Result<T> {
    record.downcast::<T>().map(|record| *record).map_err(|_| {
        RelmapError::schema(format!("Table {} does not hold {}", table.name(), type_name::<T>()))
    })
}

/// The unit of work behind a write or delete. It is a transaction, or a savepoint
/// when the caller already has one open. Dropping it without
/// [`commit`](Self::commit) rolls back.
pub(crate) struct Scope<'c> {
    connection: &'c Connection,
    transaction: Option<Transaction<'c>>,
    savepoint: bool,
}

impl<'c> Scope<'c> {
    pub(crate) fn begin(connection: &'c Connection) -> Result<Self> {
        if connection.is_autocommit() {
            let transaction = connection.unchecked_transaction()?;
            return Ok(Self { connection, transaction: Some(transaction), savepoint: false });
        }
        connection
            .execute_batch("SAVEPOINT relmap")
            .map_err(|e| RelmapError::wrap("Cannot open savepoint", e))?;
        Ok(Self { connection, transaction: None, savepoint: true })
    }
    pub(crate) fn commit(mut self) -> Result<()> {
        if let Some(transaction) = self.transaction.take() {
            return Ok(transaction.commit()?);
        }
        self.connection
            .execute_batch("RELEASE relmap")
            .map_err(|e| RelmapError::wrap("Cannot release savepoint", e))?;
        self.savepoint = false;
        Ok(())
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        if self.savepoint {
            if let Err(e) = self.connection.execute_batch("ROLLBACK TO relmap; RELEASE relmap") {
                warn!(error = %e, "savepoint rollback failed");
            }
        }
    }
}

/// Binds a [`Schema`] to a live connection.
///
/// The manager keeps no state between calls apart from settings. Writes and
/// deletes each run in one deferred transaction that covers the whole entity
/// tree, so a failure anywhere leaves the store as it was. Inside a caller's
/// transaction they run in a savepoint instead.
pub struct EntityManager<'c> {
    connection: &'c Connection,
    schema: &'c Schema,
    cache_statements: Cell<bool>,
    keyword_limit: usize,
}

impl<'c> EntityManager<'c> {
    pub fn new(connection: &'c Connection, schema: &'c Schema) -> Self {
        Self {
            connection,
            schema,
            cache_statements: Cell::new(true),
            keyword_limit: KEYWORD_LIMIT,
        }
    }
    pub fn with_settings(connection: &'c Connection, schema: &'c Schema, settings: &Settings) -> Self {
        let manager = Self::new(connection, schema);
        manager.set_statement_cache(settings.cache_statements);
        Self { keyword_limit: settings.keyword_limit, ..manager }
    }
    pub fn schema(&self) -> &'c Schema {
        self.schema
    }
    pub fn connection(&self) -> &'c Connection {
        self.connection
    }
    /// Turning the cache off also drops every statement cached so far.
    pub fn set_statement_cache(&self, enabled: bool) {
        self.cache_statements.set(enabled);
        if !enabled {
            self.connection.flush_prepared_statement_cache();
        }
    }
    pub fn predicate_builder<T: Entity>(&self) -> Result<PredicateBuilder<'c>> {
        Ok(PredicateBuilder::new(self.schema.table::<T>()?))
    }

    // ------------- Statements -------------
    fn with_statement<R>(&self, sql: &str, run: impl FnOnce(&mut Statement<'_>) -> Result<R>) -> Result<R> {
        debug!(sql, "statement");
        let prepare_failed = |e: rusqlite::Error| RelmapError::wrap(format!("Cannot prepare {}", sql), e);
        if self.cache_statements.get() {
            let mut statement = self.connection.prepare_cached(sql).map_err(prepare_failed)?;
            run(&mut *statement)
        } else {
            let mut statement = self.connection.prepare(sql).map_err(prepare_failed)?;
            run(&mut statement)
        }
    }
    fn execute(&self, sql: &str, params: impl Params) -> Result<usize> {
        self.with_statement(sql, |statement| Ok(statement.execute(params)?))
    }
    fn fetch(&self, table: &TableDescriptor, sql: &str, params: impl Params) -> Result<Vec<Box<dyn Any>>> {
        self.with_statement(sql, |statement| {
            let mut rows = statement.query(params)?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(materialize(table, row)?);
            }
            Ok(records)
        })
    }
    fn fetch_ids(&self, sql: &str, params: impl Params) -> Result<Vec<i64>> {
        self.with_statement(sql, |statement| {
            let ids = statement
                .query_map(params, |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
    }
    fn ensure_writable(&self) -> Result<()> {
        if self.connection.is_readonly(MAIN_DB)? {
            return Err(RelmapError::access("Connection is read-only"));
        }
        Ok(())
    }

    // ------------- Write -------------
    /// Inserts or updates `entity` and its whole child tree.
    ///
    /// Children that were persisted before but are no longer held by the entity
    /// are deleted, along with their own descendants. When the write fails, the
    /// keys it handed out to new records are reset to zero.
    pub fn write<T: Entity>(&self, entity: &mut T) -> Result<WriteOutcome> {
        let table = self.schema.table::<T>()?;
        self.ensure_writable()?;
        if !entity.before_write() {
            debug!(table = table.name(), "write skipped by hook");
            return Ok(WriteOutcome::Skipped);
        }
        let scope = Scope::begin(self.connection)?;
        let mut inserted = BTreeSet::new();
        let written = self.write_record(table, entity, None, &mut inserted).and_then(|id| {
            self.index_keywords(table, &*entity, id);
            scope.commit()?;
            Ok(id)
        });
        match written {
            Ok(id) => {
                debug!(table = table.name(), id, "written");
                Ok(WriteOutcome::Written(id))
            }
            Err(e) => {
                self.forget(table, entity, &inserted);
                Err(e)
            }
        }
    }

    fn write_record(
        &self,
        table: &TableDescriptor,
        record: &mut dyn Any,
        parent: Option<i64>,
        inserted: &mut BTreeSet<GlobalId>,
    ) -> Result<i64> {
        if let (Some(parent), Some(foreign_key)) = (parent, table.foreign_key()) {
            self.assign(foreign_key, record, parent)?;
        }
        let primary_key = table.primary_key();
        let mut id = primary_key.integer(record);
        let inserting = id == 0;
        let mut values: Vec<Value> = table
            .value_fields()
            .map(|f| f.value(record).unwrap_or(Value::Null))
            .collect();
        if inserting {
            let affected = self.execute(table.insert_query(), params_from_iter(values.iter()))?;
            if affected != 1 {
                return Err(RelmapError::access(format!("Insert into {} affected {} rows", table.name(), affected)));
            }
            id = self.connection.last_insert_rowid();
            self.assign(primary_key, record, id)?;
            inserted.insert(GlobalId { table: table.sequence(), id });
        } else {
            values.push(Value::Integer(id));
            let affected = self.execute(table.update_query(), params_from_iter(values.iter()))?;
            if affected != 1 {
                return Err(RelmapError::access(format!(
                    "Update of {} {} affected {} rows",
                    table.name(),
                    id,
                    affected
                )));
            }
        }
        for link in self.schema.children(table.entity()) {
            self.write_children(table, link, record, id, inserting, inserted)?;
        }
        Ok(id)
    }

    fn write_children(
        &self,
        table: &TableDescriptor,
        link: &ChildLink,
        record: &mut dyn Any,
        id: i64,
        inserting: bool,
        inserted: &mut BTreeSet<GlobalId>,
    ) -> Result<()> {
        // a fresh parent cannot have persisted children yet
        let mut orphans = BTreeSet::new();
        if !inserting {
            for child in link.children() {
                let child_table = self.schema.table_by_id(*child)?;
                let path = self.schema.resolve_join_path(*child, table.entity())?;
                for child_id in self.fetch_ids(path.select_ids_query(), [id])? {
                    orphans.insert(GlobalId { table: child_table.sequence(), id: child_id });
                }
            }
        }
        for child in link.accessor().children(record) {
            let child_table = self.schema.table_by_id(record_type(&*child))?;
            let child_id = self.write_record(child_table, child, Some(id), inserted)?;
            orphans.remove(&GlobalId { table: child_table.sequence(), id: child_id });
        }
        for orphan in orphans {
            let child_table = self.schema.table_by_sequence(orphan.table)?;
            debug!(table = child_table.name(), id = orphan.id, "deleting orphan");
            self.delete_record(child_table, orphan.id)?;
        }
        Ok(())
    }

    /// Resets the primary key of every record in the tree that was inserted by a
    /// write that got rolled back.
    fn forget(&self, table: &TableDescriptor, record: &mut dyn Any, inserted: &BTreeSet<GlobalId>) {
        if inserted.is_empty() {
            return;
        }
        let primary_key = table.primary_key();
        let key = GlobalId { table: table.sequence(), id: primary_key.integer(record) };
        if inserted.contains(&key) && self.assign(primary_key, record, 0).is_err() {
            warn!(table = table.name(), id = key.id, "primary key could not be reset");
        }
        for link in self.schema.children(table.entity()) {
            for child in link.accessor().children(record) {
                if let Ok(child_table) = self.schema.table_by_id(record_type(&*child)) {
                    self.forget(child_table, child, inserted);
                }
            }
        }
    }

    fn assign(&self, field: &FieldDescriptor, record: &mut dyn Any, value: i64) -> Result<()> {
        field
            .assign(record, ValueRef::Integer(value))
            .map_err(|e| RelmapError::access(format!("Cannot set {}: {}", field.column(), e)))
    }

    fn index_keywords(&self, table: &TableDescriptor, record: &dyn Any, id: i64) {
        if !table.has_search_index() {
            return;
        }
        let content = (table.hooks.keywords)(record).to_lowercase();
        if let Err(e) = self.execute(table.keyword_upsert_query(), params![id, content]) {
            warn!(error = %e, table = table.name(), id, "keyword index update failed");
        }
    }

    // ------------- Delete -------------
    /// Deletes the row, every descendant row and the keyword entry, and zeroes
    /// the foreign keys of rows linked to it with [`LinkPolicy::Unlink`].
    pub fn delete<T: Entity>(&self, id: i64) -> Result<()> {
        let table = self.schema.table::<T>()?;
        self.ensure_writable()?;
        let scope = Scope::begin(self.connection)?;
        self.delete_record(table, id)?;
        scope.commit()?;
        debug!(table = table.name(), id, "deleted");
        Ok(())
    }

    fn delete_record(&self, table: &TableDescriptor, id: i64) -> Result<()> {
        self.delete_descendants(table.entity(), table.entity(), id)?;
        self.execute(table.delete_by_id_query(), [id])?;
        for link in self.schema.entity_links(table.entity()) {
            if link.policy() == LinkPolicy::Unlink {
                let detail = self.schema.table_by_id(link.detail())?;
                self.execute(&detail.unlink_query(link.column()), [id])?;
            }
        }
        if table.has_search_index() {
            if let Err(e) = self.execute(table.keyword_delete_query(), [id]) {
                warn!(error = %e, table = table.name(), id, "keyword index delete failed");
            }
        }
        Ok(())
    }

    /// Deepest tables first, so no row outlives the parent its delete clause joins through.
    fn delete_descendants(&self, root: TypeId, current: TypeId, id: i64) -> Result<()> {
        for link in self.schema.children(current) {
            for child in link.children() {
                self.delete_descendants(root, *child, id)?;
                let path = self.schema.resolve_join_path(*child, root)?;
                self.execute(path.delete_query(), [id])?;
            }
        }
        Ok(())
    }

    // ------------- Read -------------
    pub fn read<T: Entity>(&self, id: i64) -> Result<Option<T>> {
        let table = self.schema.table::<T>()?;
        let mut records = self.fetch(table, table.select_by_id_query(), [id])?;
        match records.pop() {
            Some(record) => self.complete(table, record).map(Some),
            None => Ok(None),
        }
    }

    /// Attaches the child tree of a freshly selected root record and hands it out typed.
    fn complete<T: Entity>(&self, table: &TableDescriptor, mut record: Box<dyn Any>) -> Result<T> {
        let id = table.primary_key().integer(&*record);
        self.read_children(table, id, table, std::slice::from_mut(&mut record))?;
        (table.hooks.after_read)(&mut *record);
        downcast(table, record)
    }

    /// Fetches every descendant of `parent` below the root `root_id` with one join
    /// query per child table, then merges them onto `parents` sorted by key.
    fn read_children(
        &self,
        root: &TableDescriptor,
        root_id: i64,
        parent: &TableDescriptor,
        parents: &mut [Box<dyn Any>],
    ) -> Result<()> {
        for link in self.schema.children(parent.entity()) {
            for child in link.children() {
                let child_table = self.schema.table_by_id(*child)?;
                let path = self.schema.resolve_join_path(*child, root.entity())?;
                let mut rows = self.fetch(child_table, path.select_query(), [root_id])?;
                if rows.is_empty() {
                    continue;
                }
                self.read_children(root, root_id, child_table, &mut rows)?;
                for row in rows.iter_mut() {
                    (child_table.hooks.after_read)(&mut **row);
                }
                attach(link, parent, parents, child_table, rows);
            }
        }
        Ok(())
    }

    // ------------- Queries -------------
    /// Primary keys of the rows matching `clause`. `None` or an empty clause matches every row.
    pub fn query_ids<T: Entity>(&self, clause: Option<&str>, args: &[Value], order_by: Option<&str>) -> Result<Vec<i64>> {
        let table = self.schema.table::<T>()?;
        self.fetch_ids(&table.select_ids_where(clause, order_by), params_from_iter(args.iter()))
    }

    /// Every matching entity with its child tree.
    pub fn query<T: Entity>(&self, clause: Option<&str>, args: &[Value], order_by: Option<&str>) -> Result<Vec<T>> {
        let table = self.schema.table::<T>()?;
        let sql = table.select_where(clause, order_by);
        self.fetch(table, &sql, params_from_iter(args.iter()))?
            .into_iter()
            .map(|record| self.complete(table, record))
            .collect()
    }

    /// Like [`query`](Self::query), but materializes one entity at a time.
    pub fn query_cursor<T: Entity>(
        &self,
        clause: Option<&str>,
        args: &[Value],
        order_by: Option<&str>,
    ) -> Result<EntityQuery<'_, 'c, T>> {
        let table = self.schema.table::<T>()?;
        let statement = self.connection.prepare(&table.select_where(clause, order_by))?;
        Ok(EntityQuery {
            manager: self,
            table,
            statement,
            args: args.to_vec(),
            _entity: PhantomData,
        })
    }

    /// A narrow cursor over the id and the named fields of the matching rows.
    pub fn query_fields<T: Entity>(&self, clause: Option<&str>, args: &[Value], fields: &[&str]) -> Result<FieldQuery<'c>> {
        let table = self.schema.table::<T>()?;
        let selected = fields
            .iter()
            .map(|name| {
                table.find_field(name).ok_or_else(|| {
                    RelmapError::schema(format!("Table {} has no field {}", table.name(), name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let statement = self.connection.prepare(&table.select_fields_where(&selected, clause))?;
        Ok(FieldQuery {
            statement,
            fields: selected,
            args: args.to_vec(),
        })
    }

    /// Ids of `D` rows related to the `M` root `master_id` through any registered entity link,
    /// either on `D` itself or on one of its descendant tables.
    pub fn query_links<D: Entity, M: Entity>(&self, master_id: i64) -> Result<Vec<i64>> {
        let detail = self.schema.table::<D>()?;
        self.schema.table::<M>()?;
        let mut ids = RoaringTreemap::new();
        for link in self.schema.entity_links(TypeId::of::<M>()) {
            let holder = self.schema.table_by_id(link.detail())?;
            let sql = if holder.entity() == detail.entity() {
                holder.select_ids_by_column_query(link.column())
            } else if self.schema.is_ancestor(holder.entity(), detail.entity()) {
                self.schema
                    .resolve_join_path(holder.entity(), detail.entity())?
                    .select_ancestor_ids_query(holder, link.column())
            } else {
                continue;
            };
            for id in self.fetch_ids(&sql, [master_id])? {
                if let Ok(id) = u64::try_from(id) {
                    ids.insert(id);
                }
            }
        }
        Ok(ids.iter().filter_map(|id| i64::try_from(id).ok()).collect())
    }

    /// Ids of `T` rows whose keywords match `criteria`, most relevant first.
    pub fn query_keywords<T: Entity>(&self, criteria: &str) -> Result<Vec<i64>> {
        let table = self.schema.table::<T>()?;
        if !table.has_search_index() {
            return Err(RelmapError::schema(format!("Table {} has no keyword index", table.name())));
        }
        let scored = self.with_statement(table.keyword_match_query(), |statement| {
            let mut rows = statement.query([criteria.to_lowercase()])?;
            let mut scored = Vec::new();
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let matchinfo = search::parse(row.get_ref(1)?.as_blob().unwrap_or_default());
                scored.push((id, search::weight(&matchinfo)));
            }
            Ok(scored)
        })?;
        Ok(search::top(scored, self.keyword_limit))
    }
}

/// Merge-joins child rows onto their parents. Both sides are sorted by key first.
fn attach(
    link: &ChildLink,
    parent: &TableDescriptor,
    parents: &mut [Box<dyn Any>],
    child: &TableDescriptor,
    mut rows: Vec<Box<dyn Any>>,
) {
    let Some(foreign_key) = child.foreign_key() else {
        return;
    };
    let primary_key = child.primary_key();
    let parent_key = parent.primary_key();
    rows.sort_by_cached_key(|r| (foreign_key.integer(&**r), primary_key.integer(&**r)));
    parents.sort_by_cached_key(|p| parent_key.integer(&**p));
    let mut cursor = 0;
    for row in rows {
        let owner = foreign_key.integer(&*row);
        while cursor < parents.len() && parent_key.integer(&*parents[cursor]) < owner {
            cursor += 1;
        }
        match parents.get_mut(cursor) {
            Some(p) if parent_key.integer(&**p) == owner => {
                if link.accessor().append(&mut **p, row).is_err() {
                    warn!(table = child.name(), parent = owner, "child row does not fit its container");
                }
            }
            _ => warn!(table = child.name(), parent = owner, "child row without a parent"),
        }
    }
}

// ------------- Cursors -------------
/// A prepared entity query. Each call to [`iter`](Self::iter) runs it again.
pub struct EntityQuery<'m, 'c, T> {
    manager: &'m EntityManager<'c>,
    table: &'c TableDescriptor,
    statement: Statement<'c>,
    args: Vec<Value>,
    _entity: PhantomData<fn() -> T>,
}

impl<'m, 'c, T: Entity> EntityQuery<'m, 'c, T> {
    pub fn iter(&mut self) -> Result<EntityRows<'_, 'c, T>> {
        let rows = self.statement.query(params_from_iter(self.args.iter()))?;
        Ok(EntityRows {
            manager: self.manager,
            table: self.table,
            rows: Some(rows),
            _entity: PhantomData,
        })
    }
}

/// Forward-only entity iterator. The cursor is released on exhaustion, on the
/// first error, on [`close`](Self::close), or when dropped.
pub struct EntityRows<'q, 'c, T> {
    manager: &'q EntityManager<'c>,
    table: &'c TableDescriptor,
    rows: Option<Rows<'q>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> EntityRows<'_, '_, T> {
    pub fn close(&mut self) {
        self.rows = None;
    }
    pub fn is_closed(&self) -> bool {
        self.rows.is_none()
    }
}

impl<T: Entity> Iterator for EntityRows<'_, '_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        let rows = self.rows.as_mut()?;
        let step = match rows.next() {
            Ok(Some(row)) => Ok(Some(materialize(self.table, row))),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match step {
            Ok(Some(Ok(record))) => Some(self.manager.complete(self.table, record)),
            Ok(Some(Err(e))) | Err(e) => {
                self.rows = None;
                Some(Err(e.into()))
            }
            Ok(None) => {
                self.rows = None;
                None
            }
        }
    }
}

/// A prepared narrow query over selected fields plus the primary key.
pub struct FieldQuery<'c> {
    statement: Statement<'c>,
    fields: Vec<&'c FieldDescriptor>,
    args: Vec<Value>,
}

impl<'c> FieldQuery<'c> {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
    pub fn field(&self, index: usize) -> Option<&'c FieldDescriptor> {
        self.fields.get(index).copied()
    }
    pub fn field_type(&self, index: usize) -> Option<DataType> {
        self.field(index).map(FieldDescriptor::data_type)
    }
    pub fn iter(&mut self) -> Result<FieldRows<'_>> {
        let FieldQuery { statement, fields, args } = self;
        let rows = statement.query(params_from_iter(args.iter()))?;
        Ok(FieldRows { rows: Some(rows), width: fields.len() })
    }
}

/// Forward-only iterator over [`FieldRow`]s, released like [`EntityRows`].
pub struct FieldRows<'q> {
    rows: Option<Rows<'q>>,
    width: usize,
}

impl FieldRows<'_> {
    pub fn close(&mut self) {
        self.rows = None;
    }
    pub fn is_closed(&self) -> bool {
        self.rows.is_none()
    }
}

impl Iterator for FieldRows<'_> {
    type Item = Result<FieldRow>;

    fn next(&mut self) -> Option<Result<FieldRow>> {
        let rows = self.rows.as_mut()?;
        let width = self.width;
        let step = match rows.next() {
            Ok(Some(row)) => Ok(Some(read_field_row(row, width))),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        match step {
            Ok(Some(Ok(row))) => Some(Ok(row)),
            Ok(Some(Err(e))) | Err(e) => {
                self.rows = None;
                Some(Err(e.into()))
            }
            Ok(None) => {
                self.rows = None;
                None
            }
        }
    }
}

fn read_field_row(row: &Row<'_>, width: usize) -> rusqlite::Result<FieldRow> {
    let values = (0..width)
        .map(|i| row.get::<_, Value>(i))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(FieldRow { id: row.get(width)?, values })
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    id: i64,
    values: Vec<Value>,
}

impl FieldRow {
    pub fn id(&self) -> i64 {
        self.id
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
    /// Decodes a selected field the same way entity fields are decoded.
    pub fn get<V: ColumnValue>(&self, index: usize) -> Result<V> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| RelmapError::access(format!("No selected field at position {}", index)))?;
        V::from_value(ValueRef::from(value))
            .map_err(|e| RelmapError::access(format!("Field {} cannot be decoded: {}", index, e)))
    }
}
