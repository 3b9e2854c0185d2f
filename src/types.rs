use std::{collections::HashMap, fmt::Display, sync::Arc};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
/// The declared type of a field. The set is closed: anything outside it is
/// carried as [`FieldType::Other`] and rejected when a value is parsed.
pub enum FieldType {
    /// Text, taken verbatim from the cell.
    String,
    /// `true`/`false`, or any integer (nonzero is `true`).
    Bool,
    /// A *signed* 8 bit integer. Equivalent to [`i8`].
    I8,
    /// A *unsigned* 8 bit integer. Equivalent to [`u8`].
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// A 32 bit floating point number. Equivalent to [`f32`].
    F32,
    /// A 64 bit floating point number. Equivalent to [`f64`].
    F64,
    /// A 96 bit base-10 decimal, see [`rust_decimal::Decimal`].
    Decimal,
    /// A single Unicode scalar value.
    Char,
    /// A date and time without offset.
    DateTime,
    /// A date and time with a fixed UTC offset.
    DateTimeOffset,
    /// A signed span of time.
    Duration,
    Uuid,
    /// Either no value or a value of the wrapped type.
    Nullable(Box<FieldType>),
    /// A value parsed by member name.
    Enum(Arc<EnumType>),
    /// A type the parser does not know how to handle.
    Other(String),
}

impl FieldType {
    /// Wraps this type in [`FieldType::Nullable`]. Already nullable types are returned as is.
    #[inline]
    pub fn nullable(self) -> Self {
        match self {
            Self::Nullable(_) => self,
            other => Self::Nullable(Box::new(other)),
        }
    }
    #[inline]
    pub const fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable(_))
    }
    /// Resolves a type token such as `int`, `u16`, `DateTime` or `Guid?`.
    /// Names in `enums` are resolved to [`FieldType::Enum`], unknown names to [`FieldType::Other`].
    pub fn from_token(token: &str, enums: &HashMap<String, Arc<EnumType>>) -> Self {
        let token = token.trim();
        if let Some(inner) = token.strip_suffix('?') {
            return Self::from_token(inner, enums).nullable();
        }
        if let Some(builtin) = Self::builtin(token) {
            return builtin;
        }
        match enums.get(token) {
            Some(e) => Self::Enum(Arc::clone(e)),
            None => Self::Other(String::from(token)),
        }
    }
    /// Resolves the name of a built-in, non-nullable type.
    pub fn builtin(token: &str) -> Option<Self> {
        let ty = match token {
            "string" | "String" | "str" => Self::String,
            "bool" | "Boolean" => Self::Bool,
            "sbyte" | "SByte" | "i8" => Self::I8,
            "byte" | "Byte" | "u8" => Self::U8,
            "short" | "Int16" | "i16" => Self::I16,
            "ushort" | "UInt16" | "u16" => Self::U16,
            "int" | "Int32" | "i32" => Self::I32,
            "uint" | "UInt32" | "u32" => Self::U32,
            "long" | "Int64" | "i64" => Self::I64,
            "ulong" | "UInt64" | "u64" => Self::U64,
            "float" | "Single" | "f32" => Self::F32,
            "double" | "Double" | "f64" => Self::F64,
            "decimal" | "Decimal" => Self::Decimal,
            "char" | "Char" => Self::Char,
            "DateTime" | "datetime" => Self::DateTime,
            "DateTimeOffset" | "datetimeoffset" => Self::DateTimeOffset,
            "TimeSpan" | "Duration" | "duration" => Self::Duration,
            "Guid" | "Uuid" | "uuid" => Self::Uuid,
            _ => return None,
        };
        Some(ty)
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::I8 => "sbyte",
            Self::U8 => "byte",
            Self::I16 => "short",
            Self::U16 => "ushort",
            Self::I32 => "int",
            Self::U32 => "uint",
            Self::I64 => "long",
            Self::U64 => "ulong",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::Decimal => "decimal",
            Self::Char => "char",
            Self::DateTime => "DateTime",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::Duration => "TimeSpan",
            Self::Uuid => "Guid",
            Self::Nullable(inner) => return write!(f, "{}?", inner),
            Self::Enum(e) => e.name.as_str(),
            Self::Other(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// An enumeration: a name and its members with their numeric values.
pub struct EnumType {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumType {
    /// Creates an enumeration whose members are numbered from zero in order.
    pub fn new<N, I, S>(name: N, members: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = members
            .into_iter()
            .enumerate()
            .map(|(i, m)| (m.into(), i as i64))
            .collect();
        Self { name: name.into(), members }
    }
    /// Case-sensitive lookup of a member by name.
    #[inline]
    pub fn lookup(&self, member: &str) -> Option<EnumValue> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(name, value)| EnumValue { member: name.clone(), value: *value })
    }
    /// The member holding the value zero, or an unnamed zero.
    pub fn zero(&self) -> EnumValue {
        let member = self
            .members
            .iter()
            .find(|(_, v)| *v == 0)
            .map(|(n, _)| n.clone())
            .unwrap_or_default();
        EnumValue { member, value: 0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
/// A parsed enumeration member.
pub struct EnumValue {
    pub member: String,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq)]
/// A typed field value. Which variant a cell becomes is decided by its [`FieldType`].
pub enum Value {
    /// No value, produced for blank nullable cells.
    Null,
    String(String),
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Char(char),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Duration(TimeDelta),
    Uuid(Uuid),
    Enum(EnumValue),
}

impl Value {
    /// The zero value of a type, what a freshly allocated row holds before assignment.
    pub fn zero(ty: &FieldType) -> Self {
        match ty {
            FieldType::String => Self::String(String::new()),
            FieldType::Bool => Self::Bool(false),
            FieldType::I8 => Self::I8(0),
            FieldType::U8 => Self::U8(0),
            FieldType::I16 => Self::I16(0),
            FieldType::U16 => Self::U16(0),
            FieldType::I32 => Self::I32(0),
            FieldType::U32 => Self::U32(0),
            FieldType::I64 => Self::I64(0),
            FieldType::U64 => Self::U64(0),
            FieldType::F32 => Self::F32(0.0),
            FieldType::F64 => Self::F64(0.0),
            FieldType::Decimal => Self::Decimal(Decimal::ZERO),
            FieldType::Char => Self::Char('\0'),
            FieldType::DateTime => Self::DateTime(DateTime::UNIX_EPOCH.naive_utc()),
            FieldType::DateTimeOffset => Self::DateTimeOffset(DateTime::UNIX_EPOCH.fixed_offset()),
            FieldType::Duration => Self::Duration(TimeDelta::zero()),
            FieldType::Uuid => Self::Uuid(Uuid::nil()),
            FieldType::Enum(e) => Self::Enum(e.zero()),
            FieldType::Nullable(_) | FieldType::Other(_) => Self::Null,
        }
    }
    /// A short name for the variant, used in mismatch messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::I8(_) => "sbyte",
            Self::U8(_) => "byte",
            Self::I16(_) => "short",
            Self::U16(_) => "ushort",
            Self::I32(_) => "int",
            Self::U32(_) => "uint",
            Self::I64(_) => "long",
            Self::U64(_) => "ulong",
            Self::F32(_) => "float",
            Self::F64(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Char(_) => "char",
            Self::DateTime(_) => "DateTime",
            Self::DateTimeOffset(_) => "DateTimeOffset",
            Self::Duration(_) => "TimeSpan",
            Self::Uuid(_) => "Guid",
            Self::Enum(_) => "enum",
        }
    }
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                #[inline]
                fn from(value: $t) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

value_from! {
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

impl<T: Into<Value>> From<Option<T>> for Value {
    #[inline]
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rarity() -> Arc<EnumType> {
        Arc::new(EnumType::new("Rarity", ["Common", "Rare", "Epic"]))
    }

    #[test]
    fn tokens_resolve_builtins_enums_and_nullables() {
        let mut enums = HashMap::new();
        enums.insert(String::from("Rarity"), rarity());
        assert_eq!(FieldType::from_token("int", &enums), FieldType::I32);
        assert_eq!(FieldType::from_token("Guid", &enums), FieldType::Uuid);
        assert_eq!(
            FieldType::from_token("long?", &enums),
            FieldType::Nullable(Box::new(FieldType::I64))
        );
        assert!(matches!(FieldType::from_token("Rarity?", &enums),
            FieldType::Nullable(inner) if matches!(*inner, FieldType::Enum(_))));
        assert_eq!(
            FieldType::from_token("Vector3", &enums),
            FieldType::Other(String::from("Vector3"))
        );
    }

    #[test]
    fn display_round_trips_through_tokens() {
        let enums = HashMap::new();
        for ty in [FieldType::U16, FieldType::Duration, FieldType::Decimal.nullable()] {
            assert_eq!(FieldType::from_token(&ty.to_string(), &enums), ty);
        }
    }

    #[test]
    fn nullable_does_not_nest() {
        let ty = FieldType::I32.nullable().nullable();
        assert_eq!(ty, FieldType::Nullable(Box::new(FieldType::I32)));
    }

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(&FieldType::String), Value::String(String::new()));
        assert_eq!(Value::zero(&FieldType::I32.nullable()), Value::Null);
        let rarity = rarity();
        assert_eq!(
            Value::zero(&FieldType::Enum(rarity)),
            Value::Enum(EnumValue { member: "Common".into(), value: 0 })
        );
    }

    #[test]
    fn options_become_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::I32(3));
    }
}
