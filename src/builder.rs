use std::io::{Seek, Write};

use crate::error::ConvertResult;
use crate::record::AnyRow;
use crate::schema::TableInfo;

/// The sink a conversion hands its rows to.
///
/// The conversion calls [`TableBuilder::append_rows`] once per file with every
/// row in file order, then [`TableBuilder::write_to`] once with the output
/// file. The binary layout is entirely the builder's business.
pub trait TableBuilder {
    /// Accepts the rows of `table`. Each row is an instance of the table's row type.
    fn append_rows(&mut self, table: &TableInfo, rows: Vec<AnyRow>) -> ConvertResult<()>;
    /// Serializes everything appended so far into `sink`.
    fn write_to<W: Write + Seek>(&mut self, sink: &mut W) -> ConvertResult<()>;
}
