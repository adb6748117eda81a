use std::any::{Any, TypeId};

/// A plain data type that is mapped onto one table.
///
/// Every mapped type, root or child, implements this. The hooks and the
/// search capability are optional and default to doing nothing.
pub trait Entity: Any + Default {
    /// Whether rows of this type are mirrored into a `<table>_KW` full-text table.
    const SEARCHABLE: bool = false;

    /// Text indexed for keyword search. Only consulted when `SEARCHABLE` is set.
    fn keywords(&self) -> String {
        String::new()
    }

    /// Called before a top-level write. Returning `false` skips the write entirely.
    fn before_write(&mut self) -> bool {
        true
    }

    /// Called once a record and its children have been materialized.
    fn after_read(&mut self) {}
}

/// A value that can sit in a child container.
///
/// Every [`Entity`] is a single-table variant. Enums spanning several child
/// tables (a polymorphic set) implement this through [`child_variants!`](crate::child_variants).
pub trait Variant: Sized + 'static {
    /// The concrete tables values of this type can be stored in.
    fn tables() -> Vec<TypeId>;
    /// The record inside, as seen by the field accessors.
    fn record_mut(&mut self) -> &mut dyn Any;
    /// Wraps a freshly materialized record, or hands it back if no variant fits.
    fn from_record(record: Box<dyn Any>) -> Result<Self, Box<dyn Any>>;
}

impl<T: Entity> Variant for T {
    fn tables() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }
    fn record_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn from_record(record: Box<dyn Any>) -> Result<Self, Box<dyn Any>> {
        record.downcast::<T>().map(|record| *record)
    }
}

/// Implements [`Variant`] for an enum whose variants each wrap one entity type.
///
/// ```
/// use relmap::{child_variants, Entity};
///
/// #[derive(Default)]
/// struct Cash { id: i64, amount: f64 }
/// impl Entity for Cash {}
/// #[derive(Default)]
/// struct Credit { id: i64, amount: f64 }
/// impl Entity for Credit {}
///
/// enum Payment { Cash(Cash), Credit(Credit) }
/// child_variants!(Payment { Cash(Cash), Credit(Credit) });
/// ```
#[macro_export]
macro_rules! child_variants {
    ($name:ident { $($variant:ident($ty:ty)),+ $(,)? }) => {
        impl $crate::Variant for $name {
            fn tables() -> ::std::vec::Vec<::std::any::TypeId> {
                vec![$(::std::any::TypeId::of::<$ty>()),+]
            }
            fn record_mut(&mut self) -> &mut dyn ::std::any::Any {
                match self {
                    $($name::$variant(record) => record as &mut dyn ::std::any::Any,)+
                }
            }
            fn from_record(
                record: ::std::boxed::Box<dyn ::std::any::Any>,
            ) -> ::std::result::Result<Self, ::std::boxed::Box<dyn ::std::any::Any>> {
                $(
                    let record = match record.downcast::<$ty>() {
                        Ok(record) => return Ok($name::$variant(*record)),
                        Err(record) => record,
                    };
                )+
                Err(record)
            }
        }
    };
}

/// The identity of the concrete type behind a type-erased record.
pub(crate) fn record_type(record: &dyn Any) -> TypeId {
    record.type_id()
}

// monomorphized entry points stored on each table descriptor
pub(crate) fn create<T: Entity>() -> Box<dyn Any> {
    Box::new(T::default())
}
pub(crate) fn before_write<T: Entity>(record: &mut dyn Any) -> bool {
    record.downcast_mut::<T>().is_none_or(T::before_write)
}
pub(crate) fn after_read<T: Entity>(record: &mut dyn Any) {
    if let Some(record) = record.downcast_mut::<T>() {
        record.after_read();
    }
}
pub(crate) fn keywords<T: Entity>(record: &dyn Any) -> String {
    record.downcast_ref::<T>().map(T::keywords).unwrap_or_default()
}
