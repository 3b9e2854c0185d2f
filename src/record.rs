use std::any::{type_name, Any};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::csv_parse::RowMap;
use crate::error::{ConvertError, ConvertResult};
use crate::parse::parse_value;
use crate::schema::TableInfo;
use crate::types::{EnumValue, FieldType, Value};

/// A materialized row of any row type.
pub type AnyRow = Box<dyn Any + Send>;

/// Extraction of a concrete field type out of a parsed [`Value`].
/// On mismatch the value is handed back untouched.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, Value>;
}

macro_rules! from_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $t {
                #[inline]
                fn from_value(value: Value) -> Result<Self, Value> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

from_value! {
    String => String,
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    char => Char,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    TimeDelta => Duration,
    Uuid => Uuid,
    EnumValue => Enum,
}

impl<T: FromValue> FromValue for Option<T> {
    #[inline]
    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    #[inline]
    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }
}

/// How to allocate a row type and write its fields directly.
///
/// Field indices follow the declared field order of the owning [`TableInfo`].
pub trait RowLayout: Send + Sync {
    /// The name of the row type, for diagnostics.
    fn type_name(&self) -> &str;
    /// A zero-initialized row. No constructor or validation runs.
    fn allocate(&self) -> AnyRow;
    /// Stores `value` into field `field` of `row`. Errors describe a kind mismatch.
    fn assign(&self, row: &mut (dyn Any + Send), field: usize, value: Value) -> Result<(), String>;
    /// Reads field `field` back out of `row`.
    fn read(&self, row: &mut (dyn Any + Send), field: usize) -> Option<Value>;
}

type Setter<R> = Box<dyn Fn(&mut R, Value) -> Result<(), String> + Send + Sync>;
type Getter<R> = Box<dyn Fn(&mut R) -> Value + Send + Sync>;

/// Direct access to one field of `R`, built once when a table is defined.
pub(crate) struct Column<R> {
    set: Setter<R>,
    get: Getter<R>,
}

impl<R: 'static> Column<R> {
    pub(crate) fn new<T>(lens: fn(&mut R) -> &mut T) -> Self
    where
        T: FromValue + Into<Value> + Clone + 'static,
    {
        let set: Setter<R> = Box::new(move |row, value| {
            let value = T::from_value(value).map_err(|other| {
                format!("cannot store {} in {}", other.kind(), type_name::<T>())
            })?;
            *lens(row) = value;
            Ok(())
        });
        let get: Getter<R> = Box::new(move |row| lens(row).clone().into());
        Self { set, get }
    }
}

/// The layout of a Rust row type, `R::default()` being its zero value.
pub struct TypedLayout<R> {
    columns: Vec<Column<R>>,
}

impl<R> TypedLayout<R> {
    #[inline]
    pub(crate) fn new(columns: Vec<Column<R>>) -> Self {
        Self { columns }
    }
}

impl<R: Default + Send + 'static> RowLayout for TypedLayout<R> {
    #[inline]
    fn type_name(&self) -> &str {
        type_name::<R>()
    }
    #[inline]
    fn allocate(&self) -> AnyRow {
        Box::new(R::default())
    }
    fn assign(&self, row: &mut (dyn Any + Send), field: usize, value: Value) -> Result<(), String> {
        let row = row
            .downcast_mut::<R>()
            .ok_or_else(|| format!("row is not a {}", type_name::<R>()))?;
        let column = self
            .columns
            .get(field)
            .ok_or_else(|| format!("no field at index {}", field))?;
        (column.set)(row, value)
    }
    fn read(&self, row: &mut (dyn Any + Send), field: usize) -> Option<Value> {
        let row = row.downcast_mut::<R>()?;
        self.columns.get(field).map(|column| (column.get)(row))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// A row of a table known only at run time: one [`Value`] per declared field.
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    #[inline]
    pub fn get(&self, field: usize) -> Option<&Value> {
        self.values.get(field)
    }
}

/// The layout of [`Record`] rows for a dynamically described table.
#[derive(Clone, Debug)]
pub struct RecordLayout {
    type_name: String,
    zeros: Vec<Value>,
}

impl RecordLayout {
    pub fn new<'a, S, I>(type_name: S, types: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = &'a FieldType>,
    {
        let zeros = types.into_iter().map(Value::zero).collect();
        Self { type_name: type_name.into(), zeros }
    }
}

impl RowLayout for RecordLayout {
    #[inline]
    fn type_name(&self) -> &str {
        &self.type_name
    }
    #[inline]
    fn allocate(&self) -> AnyRow {
        Box::new(Record { values: self.zeros.clone() })
    }
    fn assign(&self, row: &mut (dyn Any + Send), field: usize, value: Value) -> Result<(), String> {
        let record = row
            .downcast_mut::<Record>()
            .ok_or_else(|| String::from("row is not a Record"))?;
        let slot = record
            .values
            .get_mut(field)
            .ok_or_else(|| format!("no field at index {}", field))?;
        *slot = value;
        Ok(())
    }
    fn read(&self, row: &mut (dyn Any + Send), field: usize) -> Option<Value> {
        row.downcast_mut::<Record>()?.values.get(field).cloned()
    }
}

/// Builds one row of `table` from a CSV row map.
///
/// Each field is looked up by its snake-case name first, then its canonical
/// name, parsed with its declared type and stored directly. The first missing
/// column or bad value fails the row.
pub fn materialize(table: &TableInfo, row: &RowMap, file: &str) -> ConvertResult<AnyRow> {
    let layout = table.layout();
    let mut record = layout.allocate();
    for (index, field) in table.fields().iter().enumerate() {
        let raw = field
            .aliases()
            .find_map(|alias| row.get(alias))
            .ok_or_else(|| ConvertError::MissingColumn {
                field: String::from(field.snake_name()),
                file: String::from(file),
            })?;
        let value = parse_value(field.ty(), raw)?;
        layout
            .assign(record.as_mut(), index, value)
            .map_err(|detail| ConvertError::FieldMismatch {
                table: String::from(table.name()),
                field: String::from(field.name()),
                detail,
            })?;
    }
    log::trace!("materialized {} row", layout.type_name());
    Ok(record)
}
