//! Capability objects that reach into type-erased records.
//!
//! The manager only ever sees `&mut dyn Any`; these accessors carry the
//! monomorphized getters, setters and container projections that were
//! supplied when the schema was described.

use rusqlite::types::{FromSqlError, FromSqlResult, Value, ValueRef};
use std::any::Any;

use crate::datatype::ColumnValue;
use crate::entity::Variant;

/// Gets and sets a single mapped field.
pub trait ValueAccessor: Send + Sync {
    /// `None` when the record is not of the type the accessor was built for.
    fn get(&self, record: &dyn Any) -> Option<Value>;
    fn set(&self, record: &mut dyn Any, value: ValueRef<'_>) -> FromSqlResult<()>;
}

/// Retrieves and appends the children held by one container field.
pub trait ChildAccessor: Send + Sync {
    fn children<'a>(&self, parent: &'a mut dyn Any) -> Vec<&'a mut dyn Any>;
    /// Moves `child` into the container, or gives it back if it does not fit.
    fn append(&self, parent: &mut dyn Any, child: Box<dyn Any>) -> Result<(), Box<dyn Any>>;
}

// ------------- Fields -------------
pub(crate) struct FieldAccessor<T, V> {
    get: fn(&T) -> V,
    set: fn(&mut T, V),
}

impl<T, V> FieldAccessor<T, V> {
    pub(crate) fn new(get: fn(&T) -> V, set: fn(&mut T, V)) -> Self {
        Self { get, set }
    }
}

impl<T: Any, V: ColumnValue> ValueAccessor for FieldAccessor<T, V> {
    fn get(&self, record: &dyn Any) -> Option<Value> {
        record.downcast_ref::<T>().map(|record| (self.get)(record).to_value())
    }
    fn set(&self, record: &mut dyn Any, value: ValueRef<'_>) -> FromSqlResult<()> {
        let record = record.downcast_mut::<T>().ok_or(FromSqlError::InvalidType)?;
        (self.set)(record, V::from_value(value)?);
        Ok(())
    }
}

// ------------- Containers -------------
/// A field that holds child values: `Option<V>` for a single child, `Vec<V>` for lists and sets.
pub trait Container: 'static {
    type Item: Variant;
    fn items_mut(&mut self) -> Vec<&mut Self::Item>;
    fn push(&mut self, item: Self::Item);
}

impl<V: Variant> Container for Option<V> {
    type Item = V;
    fn items_mut(&mut self) -> Vec<&mut V> {
        self.iter_mut().collect()
    }
    fn push(&mut self, item: V) {
        *self = Some(item);
    }
}

impl<V: Variant> Container for Vec<V> {
    type Item = V;
    fn items_mut(&mut self) -> Vec<&mut V> {
        self.iter_mut().collect()
    }
    fn push(&mut self, item: V) {
        Vec::push(self, item);
    }
}

pub(crate) struct ContainerAccessor<P, K> {
    container: fn(&mut P) -> &mut K,
}

impl<P, K> ContainerAccessor<P, K> {
    pub(crate) fn new(container: fn(&mut P) -> &mut K) -> Self {
        Self { container }
    }
}

impl<P: Any, K: Container> ChildAccessor for ContainerAccessor<P, K> {
    fn children<'a>(&self, parent: &'a mut dyn Any) -> Vec<&'a mut dyn Any> {
        match parent.downcast_mut::<P>() {
            Some(parent) => (self.container)(parent)
                .items_mut()
                .into_iter()
                .map(Variant::record_mut)
                .collect(),
            None => Vec::new(),
        }
    }
    fn append(&self, parent: &mut dyn Any, child: Box<dyn Any>) -> Result<(), Box<dyn Any>> {
        let Some(parent) = parent.downcast_mut::<P>() else {
            return Err(child);
        };
        let item = K::Item::from_record(child)?;
        (self.container)(parent).push(item);
        Ok(())
    }
}
