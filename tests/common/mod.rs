#![allow(dead_code)]

use chrono::{DateTime, Utc};
use relmap::{
    ChildLink, ColumnValue, DataType, Entity, EntityLink, FieldDescriptor, LinkPolicy, Literal, Schema, Settings,
    Table, child_variants, database,
};
use rusqlite::Connection;
use rusqlite::types::{FromSqlError, FromSqlResult, Value, ValueRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityType {
    #[default]
    Regular,
    Deleted,
}

impl EntityType {
    pub fn label(&self) -> Literal {
        Literal::name(format!("{:?}", self))
    }
}

impl ColumnValue for EntityType {
    const DATA_TYPE: DataType = DataType::Text;
    fn to_value(&self) -> Value {
        Value::Text(format!("{:?}", self))
    }
    fn from_value(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(EntityType::Regular),
            ValueRef::Text(b"Regular") => Ok(EntityType::Regular),
            ValueRef::Text(b"Deleted") => Ok(EntityType::Deleted),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Columns shared by every root entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Base {
    pub id: i64,
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub kind: EntityType,
}

impl Base {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }
    fn touch(&mut self) -> bool {
        if self.name.is_empty() {
            return false;
        }
        let now = Utc::now();
        if self.id == 0 {
            self.created = Some(now);
        }
        self.modified = Some(now);
        true
    }
}

pub trait Root: Entity {
    fn base(&self) -> &Base;
    fn base_mut(&mut self) -> &mut Base;
}

macro_rules! root {
    ($ty:ty) => {
        impl Root for $ty {
            fn base(&self) -> &Base {
                &self.base
            }
            fn base_mut(&mut self) -> &mut Base {
                &mut self.base
            }
        }
    };
}

fn root_table<T: Root>(name: &str) -> Table<T> {
    Table::<T>::new(name)
        .primary_key("id", |e| e.base().id, |e, v| e.base_mut().id = v)
        .field(FieldDescriptor::new::<T, String>("name", |e| e.base().name.clone(), |e, v| e.base_mut().name = v).not_null())
        .column("created", |e| e.base().created, |e, v| e.base_mut().created = v)
        .column("modified", |e| e.base().modified, |e, v| e.base_mut().modified = v)
        .column("type", |e| e.base().kind, |e, v| e.base_mut().kind = v)
        .index(&["name"], false)
        .index(&["modified"], false)
}

// ------------- Customer -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub base: Base,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub addresses: Vec<Address>,
}
root!(Customer);

impl Entity for Customer {
    fn before_write(&mut self) -> bool {
        self.base.touch()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub id: i64,
    pub customer_id: i64,
    pub street: String,
    pub city: String,
}
impl Entity for Address {}

// ------------- Inventory -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub base: Base,
    pub item_no: i32,
    pub description: Option<String>,
    pub price: f64,
    pub taxable: bool,
    pub image: Option<Vec<u8>>,
}
root!(Inventory);

impl Entity for Inventory {
    const SEARCHABLE: bool = true;
    fn keywords(&self) -> String {
        format!(
            "{} {} {}",
            self.base.name,
            self.description.as_deref().unwrap_or_default(),
            self.item_no
        )
    }
    fn before_write(&mut self) -> bool {
        self.base.touch()
    }
}

// ------------- Invoice -------------
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invoice {
    pub base: Base,
    pub customer_id: i64,
    pub items: Vec<InvoiceItem>,
    pub customer: Option<InvoiceCustomer>,
    pub payments: Vec<Payment>,
    pub reads: u32,
}
root!(Invoice);

impl Entity for Invoice {
    fn before_write(&mut self) -> bool {
        self.base.touch()
    }
    fn after_read(&mut self) {
        self.reads += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: i64,
    pub item_no: i32,
    pub name: String,
    pub price: f64,
    pub taxable: bool,
    pub qty: f64,
    pub invn_id: i64,
    pub attributes: Vec<InvoiceItemAttr>,
}
impl Entity for InvoiceItem {}

impl InvoiceItem {
    pub fn of(item: &Inventory, qty: f64) -> Self {
        Self {
            item_no: item.item_no,
            name: item.base.name.clone(),
            price: item.price,
            taxable: item.taxable,
            qty,
            invn_id: item.base.id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceItemAttr {
    pub id: i64,
    pub invoice_item_id: i64,
    pub name: String,
    pub value: Option<String>,
}
impl Entity for InvoiceItemAttr {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceCustomer {
    pub id: i64,
    pub invoice_id: i64,
    pub name: String,
    pub address: Option<String>,
}
impl Entity for InvoiceCustomer {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CashPayment {
    pub id: i64,
    pub invoice_id: i64,
    pub amount: f64,
}
impl Entity for CashPayment {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditPayment {
    pub id: i64,
    pub invoice_id: i64,
    pub amount: f64,
    pub card: String,
}
impl Entity for CreditPayment {}

#[derive(Debug, Clone, PartialEq)]
pub enum Payment {
    Cash(CashPayment),
    Credit(CreditPayment),
}
child_variants!(Payment { Cash(CashPayment), Credit(CreditPayment) });

impl Payment {
    pub fn amount(&self) -> f64 {
        match self {
            Payment::Cash(p) => p.amount,
            Payment::Credit(p) => p.amount,
        }
    }
}

// ------------- Registry -------------
pub fn schema() -> Schema {
    let mut schema = Schema::new().with_version(1);
    schema
        .register_table(
            root_table::<Customer>("Customer")
                .column("first_name", |c| c.first_name.clone(), |c, v| c.first_name = v)
                .field(
                    FieldDescriptor::new::<Customer, Option<String>>(
                        "last_name",
                        |c| c.last_name.clone(),
                        |c, v| c.last_name = v,
                    )
                    .source("lastName"),
                ),
        )
        .expect("customer");
    schema
        .register_table(
            Table::<Address>::new("Address")
                .primary_key("id", |a| a.id, |a, v| a.id = v)
                .foreign_key("customer_id", |a| a.customer_id, |a, v| a.customer_id = v)
                .column("street", |a| a.street.clone(), |a, v| a.street = v)
                .column("city", |a| a.city.clone(), |a, v| a.city = v),
        )
        .expect("address");
    schema
        .register_table(
            root_table::<Inventory>("Inventory")
                .column("item_no", |i| i.item_no, |i, v| i.item_no = v)
                .column("description", |i| i.description.clone(), |i, v| i.description = v)
                .column("price", |i| i.price, |i, v| i.price = v)
                .column("taxable", |i| i.taxable, |i, v| i.taxable = v)
                .column("image", |i| i.image.clone(), |i, v| i.image = v),
        )
        .expect("inventory");
    schema
        .register_table(
            root_table::<Invoice>("Invoice").column("customer_id", |i| i.customer_id, |i, v| i.customer_id = v),
        )
        .expect("invoice");
    schema
        .register_table(
            Table::<InvoiceItem>::new("InvoiceItem")
                .primary_key("id", |i| i.id, |i, v| i.id = v)
                .foreign_key("invoice_id", |i| i.invoice_id, |i, v| i.invoice_id = v)
                .column("item_no", |i| i.item_no, |i, v| i.item_no = v)
                .column("name", |i| i.name.clone(), |i, v| i.name = v)
                .column("price", |i| i.price, |i, v| i.price = v)
                .column("taxable", |i| i.taxable, |i, v| i.taxable = v)
                .column("qty", |i| i.qty, |i, v| i.qty = v)
                .column("invn_id", |i| i.invn_id, |i, v| i.invn_id = v),
        )
        .expect("invoice item");
    schema
        .register_table(
            Table::<InvoiceItemAttr>::new("InvoiceItemAttr")
                .primary_key("id", |a| a.id, |a, v| a.id = v)
                .foreign_key("invoice_item_id", |a| a.invoice_item_id, |a, v| a.invoice_item_id = v)
                .column("name", |a| a.name.clone(), |a, v| a.name = v)
                .column("value", |a| a.value.clone(), |a, v| a.value = v),
        )
        .expect("invoice item attribute");
    schema
        .register_table(
            Table::<InvoiceCustomer>::new("InvoiceCustomer")
                .primary_key("id", |c| c.id, |c, v| c.id = v)
                .foreign_key("invoice_id", |c| c.invoice_id, |c, v| c.invoice_id = v)
                .column("name", |c| c.name.clone(), |c, v| c.name = v)
                .column("address", |c| c.address.clone(), |c, v| c.address = v),
        )
        .expect("invoice customer");
    schema
        .register_table(
            Table::<CashPayment>::new("InvoiceCashPayment")
                .primary_key("id", |p| p.id, |p, v| p.id = v)
                .foreign_key("invoice_id", |p| p.invoice_id, |p, v| p.invoice_id = v)
                .column("amount", |p| p.amount, |p, v| p.amount = v),
        )
        .expect("cash payment");
    schema
        .register_table(
            Table::<CreditPayment>::new("InvoiceCreditPayment")
                .primary_key("id", |p| p.id, |p, v| p.id = v)
                .foreign_key("invoice_id", |p| p.invoice_id, |p, v| p.invoice_id = v)
                .column("amount", |p| p.amount, |p, v| p.amount = v)
                .column("card", |p| p.card.clone(), |p, v| p.card = v),
        )
        .expect("credit payment");

    schema
        .register_child_link(ChildLink::list::<Customer, Address>(|c| &mut c.addresses))
        .expect("addresses");
    schema
        .register_child_link(ChildLink::list::<Invoice, InvoiceItem>(|i| &mut i.items))
        .expect("items");
    schema
        .register_child_link(ChildLink::list::<InvoiceItem, InvoiceItemAttr>(|i| &mut i.attributes))
        .expect("attributes");
    schema
        .register_child_link(ChildLink::single::<Invoice, InvoiceCustomer>(|i| &mut i.customer))
        .expect("invoice customer");
    schema
        .register_child_link(ChildLink::set::<Invoice, Payment>(|i| &mut i.payments))
        .expect("payments");

    schema
        .register_entity_link(EntityLink::new::<Invoice, Customer>("customer_id", LinkPolicy::Unlink))
        .expect("invoice to customer");
    schema
        .register_entity_link(EntityLink::new::<InvoiceItem, Inventory>("invn_id", LinkPolicy::Unlink))
        .expect("invoice item to inventory");
    schema
}

/// An in-memory store migrated to [`schema`].
pub fn setup() -> (Connection, Schema) {
    relmap::logging::init("relmap=warn");
    let schema = schema();
    let connection = database::open(&Settings::default(), &schema).expect("db");
    (connection, schema)
}

pub fn customer(name: &str, first: &str, last: &str) -> Customer {
    Customer {
        base: Base::named(name),
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        addresses: Vec::new(),
    }
}

pub fn inventory(name: &str, description: &str, item_no: i32, price: f64) -> Inventory {
    Inventory {
        base: Base::named(name),
        item_no,
        description: Some(description.to_string()),
        price,
        taxable: true,
        image: None,
    }
}

/// Rows in `table`, straight from the store.
pub fn count(connection: &Connection, table: &str) -> i64 {
    connection
        .query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
        .expect("count")
}
