use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use encoding_rs::{Encoding, UTF_8};

use crate::builder::TableBuilder;
use crate::config::ConvertConfig;
use crate::csv_parse::CsvReader;
use crate::error::{ConvertError, ConvertResult};
use crate::record::{materialize, AnyRow};
use crate::schema::{Schema, TableInfo};

/// The table a CSV file feeds: its file name without extension.
pub fn table_name(path: &Path) -> ConvertResult<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConvertError::MalformedInput(format!("No table name in {}", path.display())))
}

/// Rows of one table, in file order, waiting for a builder.
#[derive(Debug)]
pub struct TableAssembler<'a> {
    table: &'a TableInfo,
    rows: Vec<AnyRow>,
}

impl<'a> TableAssembler<'a> {
    #[inline]
    pub fn new(table: &'a TableInfo) -> Self {
        Self { table, rows: vec![] }
    }
    #[inline]
    pub fn push(&mut self, row: AnyRow) {
        self.rows.push(row);
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
    /// Hands every row to `builder` in one call and returns how many there were.
    pub fn finish<B: TableBuilder>(self, builder: &mut B) -> ConvertResult<usize> {
        let count = self.rows.len();
        builder.append_rows(self.table, self.rows)?;
        Ok(count)
    }
}

/// Materializes every row `reader` yields into `table` and appends them to `builder`.
/// `file` names the source in errors. Returns the row count.
pub fn convert_reader<R, B>(table: &TableInfo, file: &str, mut reader: CsvReader<R>,
    builder: &mut B) -> ConvertResult<usize>
where
    R: BufRead,
    B: TableBuilder,
{
    let mut assembler = TableAssembler::new(table);
    while let Some(row) = reader.read_row_as_map()? {
        assembler.push(materialize(table, &row, file)?);
    }
    reader.close();
    assembler.finish(builder)
}

/// Converts one UTF-8 CSV file into `<output_dir>/<table>.bin` and returns the written path.
pub fn convert_file<B: TableBuilder>(input: &Path, output_dir: &Path, schema: &Schema,
    builder: &mut B) -> ConvertResult<PathBuf> {
    convert_file_with_encoding(input, output_dir, schema, builder, UTF_8)
}

/// Like [`convert_file`], decoding the CSV with `encoding`.
pub fn convert_file_with_encoding<B: TableBuilder>(input: &Path, output_dir: &Path,
    schema: &Schema, builder: &mut B, encoding: &'static Encoding) -> ConvertResult<PathBuf> {
    let name = table_name(input)?;
    let table = schema
        .table(name)
        .ok_or_else(|| ConvertError::UnknownTable(String::from(name)))?;
    log::debug!("converting {} as table {} ({})", input.display(), name, table.row_type());

    let reader = CsvReader::with_encoding(BufReader::new(File::open(input)?), encoding)?;
    let count = convert_reader(table, name, reader, builder)?;

    let output = output_dir.join(format!("{}.bin", name));
    let mut sink = BufWriter::new(File::create(&output)?);
    builder.write_to(&mut sink)?;
    sink.flush()?;
    log::debug!("wrote {} rows to {}", count, output.display());
    Ok(output)
}

/// Converts every table file in [`ConvertConfig::input_dir`], in file name
/// order, each with a fresh builder from `factory`. Stops at the first error.
pub fn convert_directory<B, F>(config: &ConvertConfig, schema: &Schema, mut factory: F)
    -> ConvertResult<Vec<PathBuf>>
where
    B: TableBuilder,
    F: FnMut() -> B,
{
    let encoding = config.encoding()?;
    fs::create_dir_all(&config.output_dir)?;
    let mut inputs = vec![];
    for entry in fs::read_dir(&config.input_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && !config.is_skipped(&entry.path()) {
            inputs.push(entry.path());
        }
    }
    inputs.sort();
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let mut builder = factory();
        outputs.push(convert_file_with_encoding(&input, &config.output_dir, schema,
            &mut builder, encoding)?);
    }
    Ok(outputs)
}
