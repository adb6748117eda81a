//! Structured WHERE and ORDER BY clauses for a single table.
//!
//! ```
//! # use relmap::{Entity, Schema, Table};
//! # #[derive(Default)]
//! # struct Note { id: i64, kind: String, modified: i64 }
//! # impl Entity for Note {}
//! # let mut schema = Schema::new();
//! # schema.register_table(Table::<Note>::new("Note")
//! #     .primary_key("id", |n| n.id, |n, v| n.id = v)
//! #     .column("type", |n| n.kind.clone(), |n, v| n.kind = v)
//! #     .column("modified", |n| n.modified, |n, v| n.modified = v)).unwrap();
//! use relmap::predicate::PredicateBuilder;
//!
//! let builder = PredicateBuilder::new(schema.table::<Note>().unwrap());
//! let mut clause = builder.where_clause();
//! clause.equal("type", "Regular").and().greater("modified", 111111).or().equal("type", "Deleted");
//! assert_eq!(
//!     clause.to_string(),
//!     "((type = 'Regular') AND (modified > 111111)) OR ((type = 'Deleted'))"
//! );
//! ```

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::{RelmapError, Result};
use crate::schema::TableDescriptor;

// ------------- Literals -------------
/// A value rendered inline into clause text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// An enumerated value, rendered as its quoted name.
    Enum(String),
}

impl Literal {
    pub fn name(name: impl Into<String>) -> Self {
        Literal::Enum(name.into())
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
    fn render(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Integer(i) => i.to_string(),
            Literal::Real(f) => f.to_string(),
            Literal::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Literal::Text(s) | Literal::Enum(s) => quote(s),
            Literal::Timestamp(t) => t.timestamp_millis().to_string(),
        }
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

macro_rules! literal_from {
    ($($ty:ty => $variant:ident($conv:expr)),+ $(,)?) => {
        $(
            impl From<$ty> for Literal {
                fn from(value: $ty) -> Self {
                    Literal::$variant($conv(value))
                }
            }
            impl From<$ty> for Literals {
                fn from(value: $ty) -> Self {
                    Literals(vec![Literal::from(value)])
                }
            }
        )+
    };
}

literal_from! {
    i64 => Integer(|v| v),
    i32 => Integer(i64::from),
    u32 => Integer(i64::from),
    f64 => Real(|v| v),
    bool => Bool(|v| v),
    String => Text(|v| v),
    &str => Text(String::from),
    &String => Text(String::clone),
    DateTime<Utc> => Timestamp(|v| v),
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}

/// One or more literals handed to a criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct Literals(pub Vec<Literal>);

impl From<Literal> for Literals {
    fn from(value: Literal) -> Self {
        Literals(vec![value])
    }
}
impl<T: Into<Literal>> From<Option<T>> for Literals {
    fn from(value: Option<T>) -> Self {
        Literals(vec![value.into()])
    }
}
impl<T: Into<Literal>> From<Vec<T>> for Literals {
    fn from(values: Vec<T>) -> Self {
        Literals(values.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Literal>, const N: usize> From<[T; N]> for Literals {
    fn from(values: [T; N]) -> Self {
        Literals(values.into_iter().map(Into::into).collect())
    }
}

// ------------- Criteria -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    Like,
    Less,
    Greater,
    Range,
    Set,
    /// A criterion that normalized away and renders nothing.
    Nop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    field: String,
    operator: Operator,
    values: Vec<Literal>,
    exclude: bool,
}

impl Criterion {
    fn new(field: String, operator: Operator, values: Vec<Literal>) -> Self {
        let (operator, values) = normalize(operator, values);
        Self { field, operator, values, exclude: false }
    }
    pub fn field(&self) -> &str {
        &self.field
    }
    pub fn operator(&self) -> Operator {
        self.operator
    }
    pub fn values(&self) -> &[Literal] {
        &self.values
    }
    pub fn is_excluded(&self) -> bool {
        self.exclude
    }

    fn render(&self) -> Option<String> {
        let field = &self.field;
        let not = if self.exclude { "NOT " } else { "" };
        let first = self.values.first()?;
        let text = match self.operator {
            Operator::Nop => return None,
            Operator::Equal if first.is_null() => format!("{} IS {}NULL", field, not),
            Operator::Equal => format!("{} {} {}", field, if self.exclude { "<>" } else { "=" }, first),
            Operator::Like => format!("{} {}LIKE {}", field, not, first),
            Operator::Less => format!("{} {} {}", field, if self.exclude { ">=" } else { "<" }, first),
            Operator::Greater => format!("{} {} {}", field, if self.exclude { "<=" } else { ">" }, first),
            Operator::Range => {
                let last = self.values.get(1)?;
                format!("{} {}BETWEEN {} AND {}", field, not, first, last)
            }
            Operator::Set => {
                let values: Vec<String> = self.values.iter().map(Literal::render).collect();
                format!("{} {}IN ({})", field, not, values.join(", "))
            }
        };
        Some(text)
    }
}

/// Rewrites degenerate criteria into the operator that expresses them directly.
fn normalize(operator: Operator, mut values: Vec<Literal>) -> (Operator, Vec<Literal>) {
    if values.is_empty() {
        return (Operator::Nop, values);
    }
    match operator {
        Operator::Equal if values.len() > 1 => (Operator::Set, values),
        Operator::Set if values.len() == 1 => (Operator::Equal, values),
        Operator::Range if values.len() == 1 => {
            if values[0].is_null() {
                (Operator::Nop, values)
            } else {
                (Operator::Greater, values)
            }
        }
        Operator::Range => {
            values.truncate(2);
            match (values[0].is_null(), values[1].is_null()) {
                (true, true) => (Operator::Nop, values),
                (true, false) => (Operator::Less, vec![values.remove(1)]),
                (false, true) => (Operator::Greater, vec![values.remove(0)]),
                (false, false) => (Operator::Range, values),
            }
        }
        Operator::Less | Operator::Greater if values[0].is_null() => (Operator::Nop, values),
        Operator::Like => match values[0] {
            Literal::Null => (Operator::Equal, vec![Literal::Null]),
            Literal::Text(_) => (operator, values),
            _ => (Operator::Nop, values),
        },
        _ => (operator, values),
    }
}

// ------------- Builders -------------
/// Entry point for clauses over one table, resolving names through its descriptor.
#[derive(Debug, Clone, Copy)]
pub struct PredicateBuilder<'s> {
    table: &'s TableDescriptor,
}

impl<'s> PredicateBuilder<'s> {
    pub fn new(table: &'s TableDescriptor) -> Self {
        Self { table }
    }
    pub fn table(&self) -> &'s TableDescriptor {
        self.table
    }
    pub fn where_clause(&self) -> WhereClause<'s> {
        WhereClause { table: self.table, groups: Vec::new(), chained: false }
    }
    pub fn order_by(&self) -> OrderBy<'s> {
        OrderBy { table: self.table, terms: Vec::new() }
    }
}

/// OR-groups of AND-ed criteria.
#[derive(Debug, Clone)]
pub struct WhereClause<'s> {
    table: &'s TableDescriptor,
    groups: Vec<Vec<Criterion>>,
    chained: bool,
}

/// The criterion just added. It can be negated before moving on.
pub struct CriterionHandle<'w, 's> {
    clause: &'w mut WhereClause<'s>,
}

impl<'w, 's> CriterionHandle<'w, 's> {
    pub fn exclude(self) -> Self {
        if let Some(criterion) = self.clause.groups.last_mut().and_then(|g| g.last_mut()) {
            criterion.exclude = !criterion.exclude;
        }
        self
    }
    /// The next criterion joins the same group.
    pub fn and(self) -> &'w mut WhereClause<'s> {
        self.clause
    }
    /// The next criterion starts a new group.
    pub fn or(self) -> &'w mut WhereClause<'s> {
        self.clause.chained = false;
        self.clause
    }
}

impl<'s> WhereClause<'s> {
    pub fn equal(&mut self, field: &str, values: impl Into<Literals>) -> CriterionHandle<'_, 's> {
        self.add(field, Operator::Equal, values.into().0)
    }
    pub fn like(&mut self, field: &str, pattern: impl Into<Literal>) -> CriterionHandle<'_, 's> {
        self.add(field, Operator::Like, vec![pattern.into()])
    }
    pub fn less(&mut self, field: &str, value: impl Into<Literal>) -> CriterionHandle<'_, 's> {
        self.add(field, Operator::Less, vec![value.into()])
    }
    pub fn greater(&mut self, field: &str, value: impl Into<Literal>) -> CriterionHandle<'_, 's> {
        self.add(field, Operator::Greater, vec![value.into()])
    }
    /// Inclusive on both ends. A null bound leaves that side open.
    pub fn range(
        &mut self,
        field: &str,
        from: impl Into<Literal>,
        to: impl Into<Literal>,
    ) -> CriterionHandle<'_, 's> {
        self.add(field, Operator::Range, vec![from.into(), to.into()])
    }
    pub fn set(&mut self, field: &str, values: impl Into<Literals>) -> CriterionHandle<'_, 's> {
        self.add(field, Operator::Set, values.into().0)
    }

    fn add(&mut self, field: &str, operator: Operator, values: Vec<Literal>) -> CriterionHandle<'_, 's> {
        let column = self
            .table
            .find_field(field)
            .map(|f| f.column().to_string())
            .unwrap_or_else(|| field.to_string());
        let criterion = Criterion::new(column, operator, values);
        match self.groups.last_mut() {
            Some(group) if self.chained => group.push(criterion),
            _ => self.groups.push(vec![criterion]),
        }
        self.chained = true;
        CriterionHandle { clause: self }
    }

    pub fn groups(&self) -> &[Vec<Criterion>] {
        &self.groups
    }
    pub fn is_empty(&self) -> bool {
        self.to_string().is_empty()
    }
    pub fn clear(&mut self) {
        self.groups.clear();
        self.chained = false;
    }
}

impl fmt::Display for WhereClause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self
            .groups
            .iter()
            .filter_map(|group| {
                let criteria: Vec<String> = group
                    .iter()
                    .filter_map(Criterion::render)
                    .map(|c| format!("({})", c))
                    .collect();
                (!criteria.is_empty()).then(|| format!("({})", criteria.join(" AND ")))
            })
            .collect();
        write!(f, "{}", groups.join(" OR "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    fn keyword(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderBy<'s> {
    table: &'s TableDescriptor,
    terms: Vec<(String, Direction)>,
}

impl OrderBy<'_> {
    /// Starts over with `field` as the leading sort key.
    pub fn order_by(&mut self, field: &str, direction: Direction) -> Result<&mut Self> {
        self.terms.clear();
        self.then_by(field, direction)
    }
    pub fn then_by(&mut self, field: &str, direction: Direction) -> Result<&mut Self> {
        let column = self
            .table
            .find_field(field)
            .ok_or_else(|| {
                RelmapError::schema(format!("Table {} has no field {}", self.table.name(), field))
            })?
            .column()
            .to_string();
        self.terms.push((column, direction));
        Ok(self)
    }
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for OrderBy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|(column, direction)| format!("{} {}", column, direction.keyword()))
            .collect();
        write!(f, "{}", terms.join(", "))
    }
}
