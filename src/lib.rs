//! Converts CSV tables into binary record files, driven by a [`Schema`].
//!
//! A file named `Item.csv` feeds the table `Item`: its header is matched
//! against the table's fields, every data line becomes one row of the table's
//! row type, and the rows go to a [`TableBuilder`] which writes `Item.bin`.
//!
//! ```no_run
//! use libcsvbin::{convert_file, BinaryTableBuilder, FieldInfo, FieldType, Schema, TableInfo};
//! use std::path::Path;
//!
//! #[derive(Default)]
//! struct Item {
//!     id: i32,
//!     name: String,
//!     rarity: Option<i32>,
//! }
//!
//! let schema = Schema::new().with_table(
//!     TableInfo::typed::<Item>("Item")
//!         .column(FieldInfo::new("Id", FieldType::I32), |r| &mut r.id)
//!         .column(FieldInfo::new("Name", FieldType::String), |r| &mut r.name)
//!         .column(FieldInfo::new("Rarity", FieldType::I32.nullable()), |r| &mut r.rarity)
//!         .build(),
//! );
//! let mut builder = BinaryTableBuilder::default();
//! convert_file(Path::new("csv/Item.csv"), Path::new("bin"), &schema, &mut builder)?;
//! # Ok::<(), libcsvbin::ConvertError>(())
//! ```

// Default mods and exports
pub mod binary;
pub mod builder;
pub mod config;
pub mod convert;
pub mod csv_parse;
pub mod error;
pub mod hash;
pub mod parse;
pub mod record;
pub mod schema;
pub mod string_table;
pub mod types;
pub use binrw::Endian;
pub use binrw;
pub use encoding_rs;
pub use binary::{BinaryLayout, BinaryTableBuilder};
pub use builder::TableBuilder;
pub use config::ConvertConfig;
pub use convert::{convert_directory, convert_file, convert_file_with_encoding, convert_reader, TableAssembler};
pub use csv_parse::{CsvReader, RowMap};
pub use error::{ConvertError, ConvertResult};
pub use parse::parse_value;
pub use record::{materialize, AnyRow, FromValue, Record, RowLayout};
pub use schema::{FieldInfo, Schema, TableDef, TableInfo};
pub use types::{EnumType, EnumValue, FieldType, Value};
// Feature only mods

#[cfg(feature = "serde")]
pub mod serde_impls;
