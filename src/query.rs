//! SQL text for the registered tables.
//!
//! Per-table statements are built on first use and memoized on the
//! [`TableDescriptor`]. Join paths are built when the registry resolves a
//! `(table, ancestor)` pair and are cached there. Tables are aliased as
//! `t<sequence>` so that join chains never clash.

use std::any::TypeId;
use std::sync::OnceLock;

use crate::schema::{FieldDescriptor, TableDescriptor};

#[derive(Default)]
pub(crate) struct TableQueries {
    select: OnceLock<String>,
    select_from: OnceLock<String>,
    select_by_id: OnceLock<String>,
    insert: OnceLock<String>,
    update: OnceLock<String>,
    delete_by_id: OnceLock<String>,
    keyword_upsert: OnceLock<String>,
    keyword_delete: OnceLock<String>,
    keyword_match: OnceLock<String>,
}

fn placeholders(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("?{}", i)).collect()
}

impl TableDescriptor {
    /// `SELECT t0.id, t0.name, ...` over every field in ordinal order.
    pub fn select_clause(&self) -> &str {
        self.queries.select.get_or_init(|| {
            let alias = self.alias();
            let columns: Vec<String> = self
                .fields()
                .iter()
                .map(|f| format!("{}.{}", alias, f.column()))
                .collect();
            format!("SELECT {}", columns.join(", "))
        })
    }
    /// Full-row select without a filter, the base of predicate queries.
    pub fn select_query(&self) -> &str {
        self.queries
            .select_from
            .get_or_init(|| format!("{} FROM {} AS {}", self.select_clause(), self.name(), self.alias()))
    }
    pub fn select_by_id_query(&self) -> &str {
        self.queries.select_by_id.get_or_init(|| {
            format!(
                "{} WHERE {}.{} = ?1",
                self.select_query(),
                self.alias(),
                self.primary_key().column()
            )
        })
    }
    /// Binds every non-key field in ordinal order. The key is assigned by the store.
    pub fn insert_query(&self) -> &str {
        self.queries.insert.get_or_init(|| {
            let columns: Vec<&str> = self.value_fields().map(FieldDescriptor::column).collect();
            if columns.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", self.name())
            } else {
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    self.name(),
                    columns.join(", "),
                    placeholders(columns.len()).join(", ")
                )
            }
        })
    }
    /// Binds every non-key field in ordinal order, then the key.
    pub fn update_query(&self) -> &str {
        self.queries.update.get_or_init(|| {
            let pk = self.primary_key().column();
            let assignments: Vec<String> = self
                .value_fields()
                .zip(placeholders(self.fields().len()))
                .map(|(f, p)| format!("{} = {}", f.column(), p))
                .collect();
            if assignments.is_empty() {
                format!("UPDATE {} SET {} = {} WHERE {} = ?1", self.name(), pk, pk, pk)
            } else {
                format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    self.name(),
                    assignments.join(", "),
                    pk,
                    assignments.len() + 1
                )
            }
        })
    }
    pub fn delete_by_id_query(&self) -> &str {
        self.queries
            .delete_by_id
            .get_or_init(|| format!("DELETE FROM {} WHERE {} = ?1", self.name(), self.primary_key().column()))
    }
    pub fn keyword_upsert_query(&self) -> &str {
        self.queries
            .keyword_upsert
            .get_or_init(|| format!("REPLACE INTO {} (docid, content) VALUES (?1, ?2)", self.search_table()))
    }
    pub fn keyword_delete_query(&self) -> &str {
        self.queries
            .keyword_delete
            .get_or_init(|| format!("DELETE FROM {} WHERE docid = ?1", self.search_table()))
    }
    pub fn keyword_match_query(&self) -> &str {
        self.queries.keyword_match.get_or_init(|| {
            let kw = self.search_table();
            format!("SELECT docid, matchinfo({}, 'pcx') FROM {} WHERE content MATCH ?1", kw, kw)
        })
    }
    /// Primary keys of the rows whose `column` equals the bound value.
    pub fn select_ids_by_column_query(&self, column: &str) -> String {
        format!("SELECT {} FROM {} WHERE {} = ?1", self.primary_key().column(), self.name(), column)
    }
    /// Zeroes `column` wherever it references the bound id.
    pub fn unlink_query(&self, column: &str) -> String {
        format!("UPDATE {} SET {} = 0 WHERE {} = ?1", self.name(), column, column)
    }
    /// `SELECT <pk> FROM <table> WHERE <clause> [ORDER BY ...]`; an empty clause selects all rows.
    pub fn select_ids_where(&self, clause: Option<&str>, order_by: Option<&str>) -> String {
        let mut sql = format!(
            "SELECT {}.{} FROM {} AS {}",
            self.alias(),
            self.primary_key().column(),
            self.name(),
            self.alias()
        );
        append_filter(&mut sql, clause, order_by);
        sql
    }
    pub fn select_where(&self, clause: Option<&str>, order_by: Option<&str>) -> String {
        let mut sql = self.select_query().to_string();
        append_filter(&mut sql, clause, order_by);
        sql
    }
    /// The selected fields followed by the primary key.
    pub fn select_fields_where(&self, fields: &[&FieldDescriptor], clause: Option<&str>) -> String {
        let alias = self.alias();
        let mut columns: Vec<String> = fields.iter().map(|f| format!("{}.{}", alias, f.column())).collect();
        columns.push(format!("{}.{}", alias, self.primary_key().column()));
        let mut sql = format!("SELECT {} FROM {} AS {}", columns.join(", "), self.name(), alias);
        append_filter(&mut sql, clause, None);
        sql
    }
}

fn append_filter(sql: &mut String, clause: Option<&str>, order_by: Option<&str>) {
    let clause = clause.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("1");
    sql.push_str(" WHERE ");
    sql.push_str(clause);
    if let Some(order_by) = order_by.map(str::trim).filter(|o| !o.is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
}

// ------------- Join paths -------------
/// Statements that reach a descendant table's rows through its ancestors.
#[derive(Debug)]
pub struct JoinPath {
    table: TypeId,
    path: Vec<TypeId>,
    joins: String,
    filter: String,
    select: String,
    select_ids: String,
    delete_clause: String,
    delete: String,
}

impl JoinPath {
    /// `path` runs from the table's parent up to and including the ancestor.
    pub(crate) fn new(table: &TableDescriptor, path: &[&TableDescriptor]) -> Self {
        let alias = table.alias();
        let pk = table.primary_key().column();
        let foreign_key = |t: &TableDescriptor| t.foreign_key().map(FieldDescriptor::column).unwrap_or_default().to_string();

        // the ancestor itself is never joined, its key is compared to the last foreign key
        let mut joins = String::new();
        let mut last = table;
        let intermediate = path.split_last().map(|(_, rest)| rest).unwrap_or_default();
        for parent in intermediate {
            joins.push_str(&format!(
                " INNER JOIN {} AS {} ON {}.{} = {}.{}",
                parent.name(),
                parent.alias(),
                parent.alias(),
                parent.primary_key().column(),
                last.alias(),
                foreign_key(last)
            ));
            last = parent;
        }
        let filter = if path.is_empty() {
            format!("{}.{}", alias, pk)
        } else {
            format!("{}.{}", last.alias(), foreign_key(last))
        };
        let from_where = format!("FROM {} AS {}{} WHERE {} = ?1", table.name(), alias, joins, filter);

        let delete_clause = if path.is_empty() {
            format!("{} = ?1", pk)
        } else {
            let mut clause = foreign_key(table);
            for parent in intermediate {
                clause.push_str(&format!(
                    " IN (SELECT {} FROM {} WHERE {}",
                    parent.primary_key().column(),
                    parent.name(),
                    foreign_key(parent)
                ));
            }
            clause.push_str(" = ?1");
            clause.push_str(&")".repeat(intermediate.len()));
            clause
        };

        Self {
            table: table.entity(),
            path: path.iter().map(|t| t.entity()).collect(),
            select: format!("{} {}", table.select_clause(), from_where),
            select_ids: format!("SELECT {}.{} {}", alias, pk, from_where),
            delete: format!("DELETE FROM {} WHERE {}", table.name(), delete_clause),
            delete_clause,
            joins,
            filter,
        }
    }
    pub fn table(&self) -> TypeId {
        self.table
    }
    pub fn path(&self) -> &[TypeId] {
        &self.path
    }
    /// Full rows of the table belonging to one ancestor id.
    pub fn select_query(&self) -> &str {
        &self.select
    }
    /// Primary keys of the table belonging to one ancestor id.
    pub fn select_ids_query(&self) -> &str {
        &self.select_ids
    }
    pub fn delete_clause(&self) -> &str {
        &self.delete_clause
    }
    pub fn delete_query(&self) -> &str {
        &self.delete
    }
    /// Distinct ancestor ids of the rows whose `column` equals the bound value.
    pub fn select_ancestor_ids_query(&self, table: &TableDescriptor, column: &str) -> String {
        format!(
            "SELECT DISTINCT {} FROM {} AS {}{} WHERE {}.{} = ?1",
            self.filter,
            table.name(),
            table.alias(),
            self.joins,
            table.alias(),
            column
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::entity::Entity;
    use crate::schema::{ChildLink, Schema, Table};
    use std::any::TypeId;

    #[derive(Default)]
    struct Order {
        id: i64,
        name: String,
        lines: Vec<Line>,
    }
    impl Entity for Order {}

    #[derive(Default)]
    struct Line {
        id: i64,
        order_id: i64,
        qty: f64,
        notes: Vec<Note>,
    }
    impl Entity for Line {}

    #[derive(Default)]
    struct Note {
        id: i64,
        line_id: i64,
        text: String,
    }
    impl Entity for Note {}

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .register_table(
                Table::<Order>::new("Orders")
                    .primary_key("id", |o| o.id, |o, v| o.id = v)
                    .column("name", |o| o.name.clone(), |o, v| o.name = v),
            )
            .unwrap();
        schema
            .register_table(
                Table::<Line>::new("Line")
                    .primary_key("id", |l| l.id, |l, v| l.id = v)
                    .foreign_key("order_id", |l| l.order_id, |l, v| l.order_id = v)
                    .column("qty", |l| l.qty, |l, v| l.qty = v),
            )
            .unwrap();
        schema
            .register_table(
                Table::<Note>::new("Note")
                    .primary_key("id", |n| n.id, |n, v| n.id = v)
                    .foreign_key("line_id", |n| n.line_id, |n, v| n.line_id = v)
                    .column("text", |n| n.text.clone(), |n, v| n.text = v),
            )
            .unwrap();
        schema.register_child_link(ChildLink::list::<Order, Line>(|o| &mut o.lines)).unwrap();
        schema.register_child_link(ChildLink::list::<Line, Note>(|l| &mut l.notes)).unwrap();
        schema
    }

    #[test]
    fn table_statements() {
        let schema = schema();
        let line = schema.table::<Line>().unwrap();
        assert_eq!(line.select_clause(), "SELECT t1.id, t1.order_id, t1.qty");
        assert_eq!(line.select_by_id_query(), "SELECT t1.id, t1.order_id, t1.qty FROM Line AS t1 WHERE t1.id = ?1");
        assert_eq!(line.insert_query(), "INSERT INTO Line (order_id, qty) VALUES (?1, ?2)");
        assert_eq!(line.update_query(), "UPDATE Line SET order_id = ?1, qty = ?2 WHERE id = ?3");
        assert_eq!(line.delete_by_id_query(), "DELETE FROM Line WHERE id = ?1");
    }

    #[test]
    fn predicate_statements() {
        let schema = schema();
        let order = schema.table::<Order>().unwrap();
        assert_eq!(order.select_ids_where(None, None), "SELECT t0.id FROM Orders AS t0 WHERE 1");
        assert_eq!(
            order.select_where(Some("((name = 'x'))"), Some("name ASC")),
            "SELECT t0.id, t0.name FROM Orders AS t0 WHERE ((name = 'x')) ORDER BY name ASC"
        );
        let name = order.find_field("name").unwrap();
        assert_eq!(
            order.select_fields_where(&[name], Some("")),
            "SELECT t0.name, t0.id FROM Orders AS t0 WHERE 1"
        );
    }

    #[test]
    fn single_hop_join_path() {
        let schema = schema();
        let path = schema
            .resolve_join_path(TypeId::of::<Line>(), TypeId::of::<Order>())
            .unwrap();
        assert_eq!(path.path(), &[TypeId::of::<Order>()]);
        assert_eq!(
            path.select_query(),
            "SELECT t1.id, t1.order_id, t1.qty FROM Line AS t1 WHERE t1.order_id = ?1"
        );
        assert_eq!(path.select_ids_query(), "SELECT t1.id FROM Line AS t1 WHERE t1.order_id = ?1");
        assert_eq!(path.delete_query(), "DELETE FROM Line WHERE order_id = ?1");
    }

    #[test]
    fn multi_hop_join_path() {
        let schema = schema();
        let path = schema
            .resolve_join_path(TypeId::of::<Note>(), TypeId::of::<Order>())
            .unwrap();
        assert_eq!(
            path.select_query(),
            "SELECT t2.id, t2.line_id, t2.text FROM Note AS t2 \
             INNER JOIN Line AS t1 ON t1.id = t2.line_id WHERE t1.order_id = ?1"
        );
        assert_eq!(
            path.delete_clause(),
            "line_id IN (SELECT id FROM Line WHERE order_id = ?1)"
        );
        let note = schema.table::<Note>().unwrap();
        assert_eq!(
            path.select_ancestor_ids_query(note, "text"),
            "SELECT DISTINCT t1.order_id FROM Note AS t2 INNER JOIN Line AS t1 ON t1.id = t2.line_id WHERE t2.text = ?1"
        );
    }

    #[test]
    fn join_paths_are_cached_per_pair() {
        let schema = schema();
        let to_order = schema.resolve_join_path(TypeId::of::<Note>(), TypeId::of::<Order>()).unwrap();
        let to_line = schema.resolve_join_path(TypeId::of::<Note>(), TypeId::of::<Line>()).unwrap();
        assert_eq!(to_line.delete_clause(), "line_id = ?1");
        assert_ne!(to_order.delete_clause(), to_line.delete_clause());
        let again = schema.resolve_join_path(TypeId::of::<Note>(), TypeId::of::<Order>()).unwrap();
        assert!(std::sync::Arc::ptr_eq(&to_order, &again));
        let root = schema.resolve_join_path(TypeId::of::<Order>(), TypeId::of::<Order>()).unwrap();
        assert_eq!(root.delete_clause(), "id = ?1");
        assert!(schema.resolve_join_path(TypeId::of::<Order>(), TypeId::of::<Note>()).is_err());
    }
}
