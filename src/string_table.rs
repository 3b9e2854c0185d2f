use std::collections::HashMap;
use std::io::{Seek, Write};

use binrw::{BinResult, BinWriterExt, NullString};
use encoding_rs::Encoding;

#[derive(Clone, Debug)]
/// A string table containing unique, null terminated strings in insertion order.
pub struct StringTable {
    encoding: &'static Encoding,
    table: HashMap<String, u32>,
    data: Vec<Vec<u8>>,
    off: u32,
}

impl StringTable {
    /// Creates a brand new table. Does not allocate until one item is pushed.
    #[inline]
    #[must_use]
    pub fn new(encoding: &'static Encoding) -> Self {
        StringTable { encoding, table: HashMap::new(), data: vec![], off: 0 }
    }
    /// Pushes a string to the table and returns its offset. Strings already in the table are not stored twice.
    /// `None` if the table would outgrow 32-bit offsets.
    pub fn push<A: AsRef<str>>(&mut self, item: A) -> Option<u32> {
        let item = item.as_ref();
        if let Some(off) = self.table.get(item) {
            return Some(*off);
        }
        let (encoded, _, _) = self.encoding.encode(item);
        let off = self.off;
        self.off = u32::try_from(encoded.len())
            .ok()
            .and_then(|len| off.checked_add(len)?.checked_add(1))?;
        self.data.push(encoded.into_owned());
        self.table.insert(String::from(item), off);
        Some(off)
    }
    /// Attempts to find the offset via string.
    #[inline]
    pub fn find(&self, key: &str) -> Option<u32> {
        self.table.get(key).copied()
    }
    /// The byte size of the table once written.
    #[inline]
    pub fn len(&self) -> u32 {
        self.off
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.off == 0
    }
    /// Writes every string, null terminated, in offset order.
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> BinResult<()> {
        for item in &self.data {
            writer.write_ne(&NullString(item.clone()))?;
        }
        Ok(())
    }
}
