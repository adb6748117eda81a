//! The schema registry: validated table descriptors plus the parent/child and
//! entity-to-entity links between them.
//!
//! A [`Schema`] is described once at startup and then shared by reference
//! with every [`EntityManager`](crate::manager::EntityManager). Registration
//! either succeeds completely or leaves the registry untouched.

use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::{FromSqlResult, Value, ValueRef};
use seahash::SeaHasher;
use std::any::{Any, TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasherDefault;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::accessor::{ChildAccessor, ContainerAccessor, FieldAccessor, ValueAccessor};
use crate::datatype::{ColumnValue, DataType};
use crate::entity::{self, Entity, Variant};
use crate::error::{RelmapError, Result};
use crate::query::{JoinPath, TableQueries};

// we will use a fast hashing algo for maps keyed by type identities
pub type TypeHasher = BuildHasherDefault<SeaHasher>;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    // generated statements leave names unquoted, so none of these may be used
    static ref KEYWORDS: HashSet<&'static str> = [
        "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
        "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
        "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
        "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
        "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
        "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
        "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
        "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
        "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
        "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
        "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
        "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
        "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
        "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
        "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
        "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
        "WHERE", "WINDOW", "WITH", "WITHOUT",
    ]
    .into_iter()
    .collect();
}

fn check_identifier(kind: &str, name: &str) -> Result<()> {
    if !IDENTIFIER.is_match(name) {
        return Err(RelmapError::schema(format!("Invalid {} name '{}'", kind, name)));
    }
    if KEYWORDS.contains(name.to_ascii_uppercase().as_str()) {
        return Err(RelmapError::schema(format!("The {} name '{}' is an SQL keyword", kind, name)));
    }
    Ok(())
}

// ------------- Field -------------
#[derive(Clone)]
pub struct FieldDescriptor {
    column: String,
    source: Option<String>,
    data_type: DataType,
    nullable: bool,
    accessor: Arc<dyn ValueAccessor>,
    ordinal: usize,
}

impl FieldDescriptor {
    /// A nullable field whose data type follows from the accessor's value type.
    pub fn new<T: Any, V: ColumnValue>(column: &str, get: fn(&T) -> V, set: fn(&mut T, V)) -> Self {
        Self {
            column: column.to_string(),
            source: None,
            data_type: V::DATA_TYPE,
            nullable: true,
            accessor: Arc::new(FieldAccessor::new(get, set)),
            ordinal: 0,
        }
    }
    /// The name the field has on the Rust side, usable in predicates instead of the column.
    pub fn source(mut self, name: &str) -> Self {
        self.source = Some(name.to_string());
        self
    }
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
    pub fn column(&self) -> &str {
        &self.column
    }
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref()
    }
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
    /// Position within the table's field list, which is also the column position in selects.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
    pub fn matches(&self, name: &str) -> bool {
        self.column.eq_ignore_ascii_case(name)
            || self.source.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(name))
    }
    pub(crate) fn value(&self, record: &dyn Any) -> Option<Value> {
        self.accessor.get(record)
    }
    pub(crate) fn integer(&self, record: &dyn Any) -> i64 {
        match self.accessor.get(record) {
            Some(Value::Integer(i)) => i,
            _ => 0,
        }
    }
    pub(crate) fn assign(&self, record: &mut dyn Any, value: ValueRef<'_>) -> FromSqlResult<()> {
        self.accessor.set(record, value)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("column", &self.column)
            .field("source", &self.source)
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

// ------------- Index -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    columns: Vec<String>,
    unique: bool,
}

impl IndexDescriptor {
    pub fn new(columns: &[&str], unique: bool) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
        }
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn is_unique(&self) -> bool {
        self.unique
    }
    fn leads_with(&self, column: &str) -> bool {
        self.columns.first().is_some_and(|c| c.eq_ignore_ascii_case(column))
    }
}

// ------------- Table -------------
#[derive(Clone, Copy)]
pub(crate) struct Hooks {
    pub(crate) searchable: bool,
    pub(crate) create: fn() -> Box<dyn Any>,
    pub(crate) before_write: fn(&mut dyn Any) -> bool,
    pub(crate) after_read: fn(&mut dyn Any),
    pub(crate) keywords: fn(&dyn Any) -> String,
}

impl Hooks {
    fn of<T: Entity>() -> Self {
        Self {
            searchable: T::SEARCHABLE,
            create: entity::create::<T>,
            before_write: entity::before_write::<T>,
            after_read: entity::after_read::<T>,
            keywords: entity::keywords::<T>,
        }
    }
}

/// An unvalidated table description, produced by [`Table`] and checked by
/// [`Schema::register_table`].
pub struct TableDefinition {
    name: String,
    entity: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    primary_key: Option<String>,
    foreign_key: Option<String>,
    indexes: Vec<IndexDescriptor>,
    hooks: Hooks,
}

/// Typed builder for a [`TableDefinition`], so accessors can be written as plain closures.
///
/// ```
/// use relmap::{Entity, Table};
///
/// #[derive(Default)]
/// struct Customer { id: i64, first_name: String }
/// impl Entity for Customer {}
///
/// let customer = Table::<Customer>::new("Customer")
///     .primary_key("id", |c| c.id, |c, v| c.id = v)
///     .column("first_name", |c| c.first_name.clone(), |c, v| c.first_name = v);
/// ```
pub struct Table<T> {
    definition: TableDefinition,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Table<T> {
    pub fn new(name: &str) -> Self {
        Self {
            definition: TableDefinition {
                name: name.to_string(),
                entity: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                fields: Vec::new(),
                primary_key: None,
                foreign_key: None,
                indexes: Vec::new(),
                hooks: Hooks::of::<T>(),
            },
            _entity: PhantomData,
        }
    }
    pub fn primary_key(self, column: &str, get: fn(&T) -> i64, set: fn(&mut T, i64)) -> Self {
        self.field(FieldDescriptor::new(column, get, set).not_null())
            .primary_key_column(column)
    }
    /// The column holding the parent's primary key. Only child tables have one.
    pub fn foreign_key(mut self, column: &str, get: fn(&T) -> i64, set: fn(&mut T, i64)) -> Self {
        self = self.field(FieldDescriptor::new(column, get, set));
        self.definition.foreign_key = Some(column.to_string());
        self
    }
    pub fn column<V: ColumnValue>(self, column: &str, get: fn(&T) -> V, set: fn(&mut T, V)) -> Self {
        self.field(FieldDescriptor::new(column, get, set))
    }
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.definition.fields.push(field);
        self
    }
    /// Marks an already declared column as the primary key.
    pub fn primary_key_column(mut self, column: &str) -> Self {
        self.definition.primary_key = Some(column.to_string());
        self
    }
    pub fn index(mut self, columns: &[&str], unique: bool) -> Self {
        self.definition.indexes.push(IndexDescriptor::new(columns, unique));
        self
    }
}

impl<T> From<Table<T>> for TableDefinition {
    fn from(table: Table<T>) -> Self {
        table.definition
    }
}

pub struct TableDescriptor {
    name: String,
    entity: TypeId,
    type_name: &'static str,
    fields: Vec<FieldDescriptor>,
    primary_key: usize,
    foreign_key: Option<usize>,
    indexes: Vec<IndexDescriptor>,
    has_search_index: bool,
    sequence: usize,
    pub(crate) hooks: Hooks,
    pub(crate) queries: TableQueries,
}

impl TableDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn entity(&self) -> TypeId {
        self.entity
    }
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
    pub fn primary_key(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key]
    }
    pub fn foreign_key(&self) -> Option<&FieldDescriptor> {
        self.foreign_key.map(|i| &self.fields[i])
    }
    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }
    pub fn has_search_index(&self) -> bool {
        self.has_search_index
    }
    /// Registration order, used to alias the table as `t<sequence>` in generated SQL.
    pub fn sequence(&self) -> usize {
        self.sequence
    }
    pub fn alias(&self) -> String {
        format!("t{}", self.sequence)
    }
    pub fn search_table(&self) -> String {
        format!("{}_KW", self.name)
    }
    /// Looks a field up by column name first, then by source name, ignoring case.
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.column.eq_ignore_ascii_case(name))
            .or_else(|| self.fields.iter().find(|f| f.matches(name)))
    }
    /// Every field except the primary key, in ordinal order. These are the bound
    /// parameters of the insert and update statements.
    pub fn value_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(move |f| f.ordinal != self.primary_key)
    }
    fn ensure_index(&mut self, column: &str) -> Result<()> {
        if !self.fields.iter().any(|f| f.column.eq_ignore_ascii_case(column)) {
            return Err(RelmapError::schema(format!(
                "Table {} does not have column {}",
                self.name, column
            )));
        }
        if !self.indexes.iter().any(|i| i.leads_with(column)) {
            self.indexes.push(IndexDescriptor::new(&[column], false));
        }
        Ok(())
    }
}

impl fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .field("primary_key", &self.primary_key().column)
            .field("foreign_key", &self.foreign_key().map(|f| &f.column))
            .field("indexes", &self.indexes)
            .field("has_search_index", &self.has_search_index)
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ------------- Links -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    List,
    Set,
}

#[derive(Clone)]
pub struct ChildLink {
    parent: TypeId,
    parent_name: &'static str,
    children: Vec<TypeId>,
    child_name: &'static str,
    cardinality: Cardinality,
    accessor: Arc<dyn ChildAccessor>,
}

impl ChildLink {
    pub fn single<P: Entity, V: Variant>(container: fn(&mut P) -> &mut Option<V>) -> Self {
        Self::with::<P, V, Option<V>>(Cardinality::Single, container)
    }
    /// Children keep their order. `V` must map to a single table; use
    /// [`set`](Self::set) for a container that mixes variants.
    pub fn list<P: Entity, V: Variant>(container: fn(&mut P) -> &mut Vec<V>) -> Self {
        Self::with::<P, V, Vec<V>>(Cardinality::List, container)
    }
    /// Like a list, but the order of the children carries no meaning.
    pub fn set<P: Entity, V: Variant>(container: fn(&mut P) -> &mut Vec<V>) -> Self {
        Self::with::<P, V, Vec<V>>(Cardinality::Set, container)
    }
    fn with<P: Entity, V: Variant, K: crate::accessor::Container<Item = V>>(
        cardinality: Cardinality,
        container: fn(&mut P) -> &mut K,
    ) -> Self {
        Self {
            parent: TypeId::of::<P>(),
            parent_name: type_name::<P>(),
            children: V::tables(),
            child_name: type_name::<V>(),
            cardinality,
            accessor: Arc::new(ContainerAccessor::new(container)),
        }
    }
    pub fn parent(&self) -> TypeId {
        self.parent
    }
    pub fn children(&self) -> &[TypeId] {
        &self.children
    }
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
    pub(crate) fn accessor(&self) -> &dyn ChildAccessor {
        self.accessor.as_ref()
    }
}

impl fmt::Debug for ChildLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChildLink({} -> {} {:?})", self.parent_name, self.child_name, self.cardinality)
    }
}

/// What happens to a detail row when the root it references is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    None,
    Unlink,
}

#[derive(Debug, Clone)]
pub struct EntityLink {
    detail: TypeId,
    detail_name: &'static str,
    master: TypeId,
    column: String,
    policy: LinkPolicy,
}

impl EntityLink {
    /// `column` on `D` holds the primary key of a `M` root.
    pub fn new<D: Entity, M: Entity>(column: &str, policy: LinkPolicy) -> Self {
        Self {
            detail: TypeId::of::<D>(),
            detail_name: type_name::<D>(),
            master: TypeId::of::<M>(),
            column: column.to_string(),
            policy,
        }
    }
    pub fn detail(&self) -> TypeId {
        self.detail
    }
    pub fn master(&self) -> TypeId {
        self.master
    }
    pub fn column(&self) -> &str {
        &self.column
    }
    pub fn policy(&self) -> LinkPolicy {
        self.policy
    }
}

// ------------- Schema -------------
#[derive(Default)]
pub struct Schema {
    version: u32,
    tables: HashMap<TypeId, TableDescriptor, TypeHasher>,
    order: Vec<TypeId>,
    children: HashMap<TypeId, Vec<ChildLink>, TypeHasher>,
    parents: HashMap<TypeId, TypeId, TypeHasher>,
    entity_links: HashMap<TypeId, Vec<EntityLink>, TypeHasher>,
    join_paths: Mutex<HashMap<(TypeId, TypeId), Arc<JoinPath>, TypeHasher>>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }
    /// Stored as `PRAGMA user_version` when the database is bootstrapped.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn register_table(&mut self, definition: impl Into<TableDefinition>) -> Result<()> {
        let definition = definition.into();
        let TableDefinition { name, entity, type_name, mut fields, primary_key, foreign_key, mut indexes, hooks } =
            definition;
        check_identifier("table", &name)?;
        if self.tables.contains_key(&entity) {
            return Ok(());
        }
        if let Some(other) = self.tables.values().find(|t| t.name.eq_ignore_ascii_case(&name)) {
            return Err(RelmapError::schema(format!(
                "Table {} is already registered for {}",
                name, other.type_name
            )));
        }
        if fields.is_empty() {
            return Err(RelmapError::schema(format!("Table {} has no fields", name)));
        }
        for (ordinal, field) in fields.iter_mut().enumerate() {
            check_identifier("column", &field.column)?;
            field.ordinal = ordinal;
        }
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.column.eq_ignore_ascii_case(&field.column)) {
                return Err(RelmapError::schema(format!(
                    "Table {} declares column {} twice",
                    name, field.column
                )));
            }
        }
        let position = |column: &str| fields.iter().position(|f| f.column.eq_ignore_ascii_case(column));
        let primary_key = primary_key
            .ok_or_else(|| RelmapError::schema(format!("Table {} does not define a primary key", name)))?;
        let primary_key = position(&primary_key).ok_or_else(|| {
            RelmapError::schema(format!("Primary key {} is not a field of table {}", primary_key, name))
        })?;
        if fields[primary_key].data_type != DataType::Int64 {
            return Err(RelmapError::schema(format!(
                "Primary key {}.{} must be Int64, not {}",
                name, fields[primary_key].column, fields[primary_key].data_type
            )));
        }
        let foreign_key = match foreign_key {
            Some(column) => {
                let index = position(&column).ok_or_else(|| {
                    RelmapError::schema(format!("Foreign key {} is not a field of table {}", column, name))
                })?;
                if index == primary_key || fields[index].data_type != DataType::Int64 {
                    return Err(RelmapError::schema(format!(
                        "Foreign key {}.{} must be an Int64 column other than the primary key",
                        name, column
                    )));
                }
                Some(index)
            }
            None => None,
        };
        for index in &indexes {
            if index.columns.is_empty() {
                return Err(RelmapError::schema(format!("Table {} declares an empty index", name)));
            }
            if let Some(missing) = index.columns.iter().find(|c| position(c).is_none()) {
                return Err(RelmapError::schema(format!(
                    "Index on table {} references unknown column {}",
                    name, missing
                )));
            }
        }
        if let Some(fk) = foreign_key {
            let column = fields[fk].column.clone();
            if !indexes.iter().any(|i| i.leads_with(&column)) {
                indexes.push(IndexDescriptor::new(&[&column], false));
            }
        }
        let sequence = self.tables.len();
        self.tables.insert(
            entity,
            TableDescriptor {
                name,
                entity,
                type_name,
                fields,
                primary_key,
                foreign_key,
                indexes,
                has_search_index: hooks.searchable,
                sequence,
                hooks,
                queries: TableQueries::default(),
            },
        );
        self.order.push(entity);
        Ok(())
    }

    pub fn register_child_link(&mut self, link: ChildLink) -> Result<()> {
        if !self.tables.contains_key(&link.parent) {
            return Err(RelmapError::schema(format!(
                "Parent table for {} is not registered",
                link.parent_name
            )));
        }
        if link.children.is_empty() {
            return Err(RelmapError::schema(format!("Child link {:?} has no child tables", link)));
        }
        // children are read back one table at a time, so only a set may mix variants
        if link.cardinality == Cardinality::List && link.children.len() > 1 {
            return Err(RelmapError::schema(format!(
                "Child link {:?} spans several tables and must be a set",
                link
            )));
        }
        for child in &link.children {
            let table = self.tables.get(child).ok_or_else(|| {
                RelmapError::schema(format!("Child table in {:?} is not registered", link))
            })?;
            if *child == link.parent || self.parents.contains_key(child) {
                return Err(RelmapError::schema(format!(
                    "Child link exists: {} already has a parent",
                    table.name
                )));
            }
            if table.foreign_key.is_none() {
                return Err(RelmapError::schema(format!(
                    "Child table {} does not define a foreign key",
                    table.name
                )));
            }
        }
        if link.children.iter().enumerate().any(|(i, c)| link.children[..i].contains(c)) {
            return Err(RelmapError::schema(format!("Child link {:?} repeats a child table", link)));
        }
        for child in &link.children {
            self.parents.insert(*child, link.parent);
        }
        self.children.entry(link.parent).or_default().push(link);
        Ok(())
    }

    pub fn register_entity_link(&mut self, link: EntityLink) -> Result<()> {
        let detail = self.tables.get_mut(&link.detail).ok_or_else(|| {
            RelmapError::schema(format!("Detail table for {} is not registered", link.detail_name))
        })?;
        detail.ensure_index(&link.column)?;
        self.entity_links.entry(link.master).or_default().push(link);
        Ok(())
    }

    pub fn table<T: Any>(&self) -> Result<&TableDescriptor> {
        self.table_by_id(TypeId::of::<T>())
            .map_err(|_| RelmapError::schema(format!("{} is not registered", type_name::<T>())))
    }
    pub fn table_by_id(&self, entity: TypeId) -> Result<&TableDescriptor> {
        self.tables
            .get(&entity)
            .ok_or_else(|| RelmapError::schema(format!("Type {:?} is not registered", entity)))
    }
    pub fn table_by_sequence(&self, sequence: usize) -> Result<&TableDescriptor> {
        self.order
            .get(sequence)
            .and_then(|entity| self.tables.get(entity))
            .ok_or_else(|| RelmapError::schema(format!("No table with sequence number {}", sequence)))
    }
    pub fn contains<T: Any>(&self) -> bool {
        self.tables.contains_key(&TypeId::of::<T>())
    }
    pub fn len(&self) -> usize {
        self.order.len()
    }
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.order.iter().filter_map(|entity| self.tables.get(entity))
    }
    pub fn children(&self, parent: TypeId) -> &[ChildLink] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn parent(&self, child: TypeId) -> Option<TypeId> {
        self.parents.get(&child).copied()
    }
    /// Links from detail tables that reference the `master` root.
    pub fn entity_links(&self, master: TypeId) -> &[EntityLink] {
        self.entity_links.get(&master).map(Vec::as_slice).unwrap_or(&[])
    }
    /// Whether `ancestor` is reachable from `table` by following parent edges.
    pub fn is_ancestor(&self, table: TypeId, ancestor: TypeId) -> bool {
        let mut current = table;
        while let Some(parent) = self.parent(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// The chain of tables from `from`'s parent up to and including `ancestor`,
    /// with its SQL text. `from == ancestor` yields the empty path.
    pub fn resolve_join_path(&self, from: TypeId, ancestor: TypeId) -> Result<Arc<JoinPath>> {
        if let Some(path) = self.join_paths.lock().ok().and_then(|c| c.get(&(from, ancestor)).cloned()) {
            return Ok(path);
        }
        let table = self.table_by_id(from)?;
        let mut path = Vec::new();
        let mut current = from;
        while current != ancestor {
            match self.parent(current) {
                Some(parent) => {
                    path.push(self.table_by_id(parent)?);
                    current = parent;
                }
                None => {
                    return Err(RelmapError::schema(format!(
                        "Table {} is not linked to {}",
                        table.name,
                        self.table_by_id(ancestor).map(|t| t.name.as_str()).unwrap_or("an unregistered type")
                    )));
                }
            }
        }
        let path = Arc::new(JoinPath::new(table, &path));
        if let Ok(mut cache) = self.join_paths.lock() {
            cache.insert((from, ancestor), path.clone());
        }
        Ok(path)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("version", &self.version)
            .field("tables", &self.tables().collect::<Vec<_>>())
            .finish()
    }
}
