//! A fixed-row binary table format and the [`TableBuilder`] that writes it.
//!
//! Each appended table becomes one section:
//!
//! | part | size |
//! |---|---|
//! | [`BinaryHeader`] | 16 |
//! | [`FieldEntry`] per field | 8 each |
//! | rows | `row_count * row_size` |
//! | string table | null terminated strings |
//! | padding | `0x40` up to a 32 byte boundary |
//!
//! All offsets are relative to the start of the section.

use std::io::{Read, Seek, SeekFrom, Write};

use binrw::prelude::*;
use binrw::{Endian, NullString};
use encoding_rs::{Encoding, UTF_8};

use crate::builder::TableBuilder;
use crate::error::{ConvertError, ConvertResult};
use crate::hash::calchash;
use crate::record::AnyRow;
use crate::schema::TableInfo;
use crate::string_table::StringTable;
use crate::types::{FieldType, Value};

/// [`FieldEntry::flags`] bit set when a cell starts with a presence byte.
pub const FLAG_NULLABLE: u8 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BinRead, BinWrite)]
/// The header of one table section.
pub struct BinaryHeader {
    /// The count of rows.
    pub row_count: u32,
    /// The count of fields, and of [`FieldEntry`] records that follow.
    pub field_count: u32,
    /// Offset to the first row.
    pub row_data_offset: u32,
    /// The bytesize of a **single** row. Always the sum of all cell sizes.
    pub row_size: u32,
}

impl BinaryHeader {
    /// The offset of the string table.
    #[inline]
    pub const fn string_offset(&self) -> u64 {
        self.row_data_offset as u64 + self.row_count as u64 * self.row_size as u64
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BinRead, BinWrite)]
/// Where and how one field is stored inside a row.
pub struct FieldEntry {
    /// The hash of the canonical field name, see [`calchash`].
    pub hash: u32,
    /// Offset of the cell from the start of the row.
    pub data_offset: u16,
    /// The [`TypeCode`] of the cell.
    pub type_code: u8,
    pub flags: u8,
}

impl FieldEntry {
    #[inline]
    pub const fn is_nullable(&self) -> bool {
        self.flags & FLAG_NULLABLE != 0
    }
    /// The byte size of the cell, presence byte included.
    #[inline]
    pub fn cell_size(&self) -> u16 {
        let size = TypeCode::from_u8(self.type_code).map_or(0, TypeCode::size);
        size + self.is_nullable() as u16
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
/// How a cell is encoded.
pub enum TypeCode {
    /// A `u32` offset into the string table.
    String,
    /// One byte, 0 or 1.
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// The 16 byte [`rust_decimal::Decimal::serialize`] form.
    Decimal,
    /// The scalar value as `u32`.
    Char,
    /// Microseconds since the Unix epoch as `i64`.
    DateTime,
    /// UTC microseconds since the Unix epoch as `i64`, then the offset in seconds as `i32`.
    DateTimeOffset,
    /// Microseconds as `i64`.
    Duration,
    /// The 16 RFC 4122 bytes.
    Uuid,
    /// The member's numeric value as `i64`.
    Enum,
}

impl TypeCode {
    const ALL: [Self; 19] = [
        Self::String,
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F32,
        Self::F64,
        Self::Decimal,
        Self::Char,
        Self::DateTime,
        Self::DateTimeOffset,
        Self::Duration,
        Self::Uuid,
        Self::Enum,
    ];
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
    /// The code of a non-nullable type. `None` for types with no encoding.
    pub fn of(ty: &FieldType) -> Option<Self> {
        let code = match ty {
            FieldType::String => Self::String,
            FieldType::Bool => Self::Bool,
            FieldType::I8 => Self::I8,
            FieldType::U8 => Self::U8,
            FieldType::I16 => Self::I16,
            FieldType::U16 => Self::U16,
            FieldType::I32 => Self::I32,
            FieldType::U32 => Self::U32,
            FieldType::I64 => Self::I64,
            FieldType::U64 => Self::U64,
            FieldType::F32 => Self::F32,
            FieldType::F64 => Self::F64,
            FieldType::Decimal => Self::Decimal,
            FieldType::Char => Self::Char,
            FieldType::DateTime => Self::DateTime,
            FieldType::DateTimeOffset => Self::DateTimeOffset,
            FieldType::Duration => Self::Duration,
            FieldType::Uuid => Self::Uuid,
            FieldType::Enum(_) => Self::Enum,
            FieldType::Nullable(_) | FieldType::Other(_) => return None,
        };
        Some(code)
    }
    /// The byte size of a cell of this type.
    #[inline]
    pub const fn size(self) -> u16 {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::String | Self::I32 | Self::U32 | Self::F32 | Self::Char => 4,
            Self::I64 | Self::U64 | Self::F64 | Self::DateTime | Self::Duration | Self::Enum => 8,
            Self::DateTimeOffset => 12,
            Self::Decimal | Self::Uuid => 16,
        }
    }
}

#[derive(Debug)]
struct TableSection {
    name: String,
    header: BinaryHeader,
    fields: Vec<FieldEntry>,
    rows: Vec<Vec<Value>>,
    strings: StringTable,
}

/// Writes appended tables in the fixed-row format described in the module docs.
#[derive(Debug)]
pub struct BinaryTableBuilder {
    endian: Endian,
    encoding: &'static Encoding,
    sections: Vec<TableSection>,
}

impl Default for BinaryTableBuilder {
    #[inline]
    fn default() -> Self {
        Self::new(Endian::Little)
    }
}

impl BinaryTableBuilder {
    /// A builder writing `endian` numbers and UTF-8 strings.
    #[inline]
    pub fn new(endian: Endian) -> Self {
        Self { endian, encoding: UTF_8, sections: vec![] }
    }
    /// Encodes strings with `encoding` instead of UTF-8.
    #[inline]
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }
    /// The names of the appended tables, in write order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }
    fn section_for(&mut self, table: &TableInfo) -> ConvertResult<&mut TableSection> {
        if let Some(pos) = self.sections.iter().position(|s| s.name == table.name()) {
            return Ok(&mut self.sections[pos]);
        }
        let mut fields = Vec::with_capacity(table.fields().len());
        let mut offset = 0u16;
        for field in table.fields() {
            let (inner, flags) = match field.ty() {
                FieldType::Nullable(inner) => (inner.as_ref(), FLAG_NULLABLE),
                other => (other, 0),
            };
            let code = TypeCode::of(inner)
                .ok_or_else(|| ConvertError::UnsupportedType(field.ty().to_string()))?;
            let entry = FieldEntry {
                hash: calchash(field.name()),
                data_offset: offset,
                type_code: code as u8,
                flags,
            };
            offset = offset.checked_add(entry.cell_size()).ok_or_else(|| {
                ConvertError::FieldMismatch {
                    table: String::from(table.name()),
                    field: String::from(field.name()),
                    detail: format!("row size exceeds {} bytes", u16::MAX),
                }
            })?;
            fields.push(entry);
        }
        let too_many = || ConvertError::MalformedInput(format!(
            "Too many fields in table \"{}\".",
            table.name()
        ));
        let field_count = u32::try_from(fields.len()).map_err(|_| too_many())?;
        let row_data_offset = field_count
            .checked_mul(8)
            .and_then(|size| size.checked_add(16))
            .ok_or_else(too_many)?;
        let header = BinaryHeader {
            row_count: 0,
            field_count,
            row_data_offset,
            row_size: offset as u32,
        };
        self.sections.push(TableSection {
            name: String::from(table.name()),
            header,
            fields,
            rows: vec![],
            strings: StringTable::new(self.encoding),
        });
        let last = self.sections.len() - 1;
        Ok(&mut self.sections[last])
    }
}

impl TableBuilder for BinaryTableBuilder {
    fn append_rows(&mut self, table: &TableInfo, rows: Vec<AnyRow>) -> ConvertResult<()> {
        let section = self.section_for(table)?;
        let layout = table.layout();
        for mut row in rows {
            let mut values = Vec::with_capacity(table.fields().len());
            for (index, field) in table.fields().iter().enumerate() {
                let value = layout.read(row.as_mut(), index).ok_or_else(|| {
                    ConvertError::FieldMismatch {
                        table: String::from(table.name()),
                        field: String::from(field.name()),
                        detail: format!("row is not a {}", layout.type_name()),
                    }
                })?;
                if let Value::String(text) = &value {
                    section.strings.push(text).ok_or_else(|| ConvertError::FieldMismatch {
                        table: String::from(table.name()),
                        field: String::from(field.name()),
                        detail: String::from("string table exceeds 32-bit offsets"),
                    })?;
                }
                values.push(value);
            }
            section.rows.push(values);
        }
        section.header.row_count = u32::try_from(section.rows.len()).map_err(|_| {
            ConvertError::MalformedInput(format!("Too many rows in table \"{}\".", table.name()))
        })?;
        Ok(())
    }

    fn write_to<W: Write + Seek>(&mut self, sink: &mut W) -> ConvertResult<()> {
        for section in &self.sections {
            section.write(sink, self.endian)?;
        }
        Ok(())
    }
}

impl TableSection {
    fn write<W: Write + Seek>(&self, writer: &mut W, endian: Endian) -> ConvertResult<()> {
        let base = writer.stream_position()?;
        writer.write_type(&self.header, endian)?;
        for field in &self.fields {
            writer.write_type(field, endian)?;
        }
        for row in &self.rows {
            for (field, value) in self.fields.iter().zip(row) {
                self.write_cell(writer, endian, field, value)?;
            }
        }
        let end = writer.stream_position()? - base;
        if end != self.header.string_offset() {
            let ioerr = std::io::Error::new(
                std::io::ErrorKind::InvalidData, "Row data and string offset don't match");
            return Err(ioerr.into());
        }
        self.strings.write(writer)?;
        let end = writer.stream_position()? - base;
        let padded = (end + 31) & !31;
        writer.write_all(&vec![0x40u8; (padded - end) as usize])?;
        Ok(())
    }

    fn write_cell<W: Write + Seek>(&self, writer: &mut W, endian: Endian,
        field: &FieldEntry, value: &Value) -> ConvertResult<()> {
        let mismatch = |detail: String| ConvertError::FieldMismatch {
            table: self.name.clone(),
            field: format!("0x{:X}", field.hash),
            detail,
        };
        let code = TypeCode::from_u8(field.type_code)
            .ok_or_else(|| mismatch(format!("unknown type code {}", field.type_code)))?;
        if field.is_nullable() {
            writer.write_ne(&(!value.is_null() as u8))?;
            if value.is_null() {
                writer.write_all(&vec![0u8; code.size() as usize])?;
                return Ok(());
            }
        }
        match (code, value) {
            (TypeCode::String, Value::String(s)) => {
                let off = self.strings.find(s)
                    .ok_or_else(|| mismatch(format!("\"{}\" missing from string table", s)))?;
                writer.write_type(&off, endian)?;
            }
            (TypeCode::Bool, Value::Bool(b)) => writer.write_ne(&(*b as u8))?,
            (TypeCode::I8, Value::I8(v)) => writer.write_ne(v)?,
            (TypeCode::U8, Value::U8(v)) => writer.write_ne(v)?,
            (TypeCode::I16, Value::I16(v)) => writer.write_type(v, endian)?,
            (TypeCode::U16, Value::U16(v)) => writer.write_type(v, endian)?,
            (TypeCode::I32, Value::I32(v)) => writer.write_type(v, endian)?,
            (TypeCode::U32, Value::U32(v)) => writer.write_type(v, endian)?,
            (TypeCode::I64, Value::I64(v)) => writer.write_type(v, endian)?,
            (TypeCode::U64, Value::U64(v)) => writer.write_type(v, endian)?,
            (TypeCode::F32, Value::F32(v)) => writer.write_type(v, endian)?,
            (TypeCode::F64, Value::F64(v)) => writer.write_type(v, endian)?,
            (TypeCode::Decimal, Value::Decimal(d)) => writer.write_ne(&d.serialize())?,
            (TypeCode::Char, Value::Char(c)) => writer.write_type(&(*c as u32), endian)?,
            (TypeCode::DateTime, Value::DateTime(dt)) => {
                writer.write_type(&dt.and_utc().timestamp_micros(), endian)?
            }
            (TypeCode::DateTimeOffset, Value::DateTimeOffset(dt)) => {
                writer.write_type(&dt.timestamp_micros(), endian)?;
                writer.write_type(&dt.offset().local_minus_utc(), endian)?;
            }
            (TypeCode::Duration, Value::Duration(d)) => {
                let micros = d.num_microseconds()
                    .ok_or_else(|| mismatch(format!("duration {} out of range", d)))?;
                writer.write_type(&micros, endian)?
            }
            (TypeCode::Uuid, Value::Uuid(id)) => writer.write_ne(id.as_bytes())?,
            (TypeCode::Enum, Value::Enum(e)) => writer.write_type(&e.value, endian)?,
            (code, other) => {
                return Err(mismatch(format!("cannot write {} as {:?}", other.kind(), code)))
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// The header and field table of one section, read back from a binary file.
pub struct BinaryLayout {
    pub header: BinaryHeader,
    pub fields: Vec<FieldEntry>,
}

impl BinaryLayout {
    /// Reads a section starting at the reader's position.
    pub fn read<R: Read + Seek>(reader: &mut R, endian: Endian) -> BinResult<Self> {
        let header: BinaryHeader = reader.read_type(endian)?;
        let mut fields = Vec::with_capacity(header.field_count as usize);
        for _ in 0..header.field_count {
            fields.push(reader.read_type(endian)?);
        }
        Ok(Self { header, fields })
    }
    /// Finds a field by canonical name.
    #[inline]
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        let hash = calchash(name);
        self.fields.iter().find(|f| f.hash == hash)
    }
    /// Offset of a cell from the start of the section.
    #[inline]
    pub fn cell_offset(&self, row: u32, field: &FieldEntry) -> u64 {
        self.header.row_data_offset as u64
            + row as u64 * self.header.row_size as u64
            + field.data_offset as u64
    }
    /// Reads the string at `offset` in the string table of the section at `base`.
    pub fn read_string<R: Read + Seek>(&self, reader: &mut R, base: u64, offset: u32,
        encoding: &'static Encoding) -> BinResult<String> {
        let oldpos = reader.stream_position()?;
        reader.seek(SeekFrom::Start(base + self.header.string_offset() + offset as u64))?;
        let info = NullString::read_ne(reader)?;
        let (dec, _, _) = encoding.decode(&info);
        reader.seek(SeekFrom::Start(oldpos))?;
        Ok(dec.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldInfo;
    use std::io::Cursor;

    #[derive(Debug, Default)]
    struct Item {
        id: i32,
        name: String,
        rarity: Option<i32>,
    }

    fn item_table() -> TableInfo {
        TableInfo::typed::<Item>("Item")
            .column(FieldInfo::new("Id", FieldType::I32), |r| &mut r.id)
            .column(FieldInfo::new("Name", FieldType::String), |r| &mut r.name)
            .column(FieldInfo::new("Rarity", FieldType::I32.nullable()), |r| &mut r.rarity)
            .build()
    }

    fn rows() -> Vec<AnyRow> {
        vec![
            Box::new(Item { id: 1, name: "Sword".into(), rarity: None }) as AnyRow,
            Box::new(Item { id: 2, name: "Shield".into(), rarity: Some(3) }),
        ]
    }

    #[test]
    fn writes_a_section() {
        let table = item_table();
        let mut builder = BinaryTableBuilder::new(Endian::Little);
        builder.append_rows(&table, rows()).unwrap();
        let mut out = Cursor::new(vec![]);
        builder.write_to(&mut out).unwrap();

        let data = out.into_inner();
        assert_eq!(data.len() % 32, 0);
        let mut rdr = Cursor::new(data);
        let layout = BinaryLayout::read(&mut rdr, Endian::Little).unwrap();
        assert_eq!(layout.header.row_count, 2);
        assert_eq!(layout.header.field_count, 3);
        assert_eq!(layout.header.row_data_offset, 16 + 24);
        assert_eq!(layout.header.row_size, 4 + 4 + 5);

        let rarity = *layout.field("Rarity").unwrap();
        assert!(rarity.is_nullable());
        rdr.set_position(layout.cell_offset(1, &rarity));
        let present: u8 = rdr.read_ne().unwrap();
        let value: i32 = rdr.read_le().unwrap();
        assert_eq!((present, value), (1, 3));
        rdr.set_position(layout.cell_offset(0, &rarity));
        let present: u8 = rdr.read_ne().unwrap();
        assert_eq!(present, 0);

        let name = *layout.field("Name").unwrap();
        rdr.set_position(layout.cell_offset(1, &name));
        let off: u32 = rdr.read_le().unwrap();
        let text = layout.read_string(&mut rdr, 0, off, UTF_8).unwrap();
        assert_eq!(text, "Shield");
    }

    #[test]
    fn big_endian_numbers() {
        let table = item_table();
        let mut builder = BinaryTableBuilder::new(Endian::Big);
        builder.append_rows(&table, rows()).unwrap();
        let mut out = Cursor::new(vec![]);
        builder.write_to(&mut out).unwrap();
        let data = out.into_inner();
        assert_eq!(&data[..4], &[0u8, 0, 0, 2]);
    }

    #[test]
    fn appending_twice_extends_the_table() {
        let table = item_table();
        let mut builder = BinaryTableBuilder::default();
        builder.append_rows(&table, rows()).unwrap();
        builder.append_rows(&table, rows()).unwrap();
        assert_eq!(builder.tables().collect::<Vec<_>>(), ["Item"]);
        assert_eq!(builder.sections[0].header.row_count, 4);
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let table = TableInfo::dynamic(
            "Odd",
            vec![FieldInfo::new("Pos", FieldType::Other("Vector3".into()))],
        );
        let mut builder = BinaryTableBuilder::default();
        let err = builder.append_rows(&table, vec![]).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedType(name) if name == "Vector3"));
    }

    #[test]
    fn oversized_rows_are_rejected() {
        let fields = (0..4100)
            .map(|i| FieldInfo::new(format!("Id{}", i), FieldType::Uuid))
            .collect();
        let table = TableInfo::dynamic("Wide", fields);
        let mut builder = BinaryTableBuilder::default();
        let err = builder.append_rows(&table, vec![]).unwrap_err();
        assert!(matches!(err, ConvertError::FieldMismatch { field, .. } if field == "Id4095"));
        assert_eq!(builder.tables().count(), 0);
    }

    #[test]
    fn foreign_rows_are_rejected() {
        let table = item_table();
        let mut builder = BinaryTableBuilder::default();
        let err = builder.append_rows(&table, vec![Box::new(7u8) as AnyRow]).unwrap_err();
        assert!(matches!(err, ConvertError::FieldMismatch { .. }));
    }

    #[test]
    fn type_codes_round_trip() {
        for code in TypeCode::ALL {
            assert_eq!(TypeCode::from_u8(code as u8), Some(code));
        }
        assert_eq!(TypeCode::from_u8(19), None);
    }
}
