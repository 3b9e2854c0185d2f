use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use encoding_rs::{Encoding, UTF_8};

use crate::error::{ConvertError, ConvertResult};

/// A single data line keyed by header name.
pub type RowMap = HashMap<String, String>;

const TRIM: &[char] = &[' ', '\t'];

/// A strict, unquoted, comma separated reader.
///
/// The first line is the header. Every following line yields exactly as many
/// values as the header has columns; short lines are padded with empty
/// strings and extra values are ignored. A blank line ends the data.
/// Lines end at `\n`, `\r\n` or a lone `\r`.
#[derive(Debug)]
pub struct CsvReader<R> {
    reader: Option<R>,
    header: Vec<String>,
    encoding: &'static Encoding,
    line: Vec<u8>,
}

impl CsvReader<BufReader<File>> {
    /// Opens the file at `path` as UTF-8.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConvertResult<Self> {
        Self::with_encoding(BufReader::new(File::open(path)?), UTF_8)
    }
}

impl<R: BufRead> CsvReader<R> {
    /// Reads the header of a UTF-8 stream.
    #[inline]
    pub fn new(reader: R) -> ConvertResult<Self> {
        Self::with_encoding(reader, UTF_8)
    }
    /// Reads the header of a stream in `encoding`, which must be ASCII compatible.
    /// A UTF-8 byte order mark on the header line is skipped.
    pub fn with_encoding(reader: R, encoding: &'static Encoding) -> ConvertResult<Self> {
        if !encoding.is_ascii_compatible() {
            return Err(ConvertError::UnsupportedEncoding(String::from(encoding.name())));
        }
        let mut result = Self {
            reader: Some(reader),
            header: vec![],
            encoding,
            line: vec![],
        };
        let line = result
            .next_line()?
            .ok_or_else(|| ConvertError::MalformedInput(String::from("Header is null.")))?;
        let line = line.strip_prefix('\u{feff}').unwrap_or(&line);
        let mut index = 0;
        while index < line.len() {
            let value = next_value(line, &mut index);
            if value.is_empty() {
                break;
            }
            result.header.push(String::from(value));
        }
        Ok(result)
    }
    /// The column names, in file order.
    #[inline]
    pub fn header(&self) -> &[String] {
        &self.header
    }
    /// Reads the next data line. `None` once the stream is exhausted or a
    /// blank line is reached.
    pub fn read_row(&mut self) -> ConvertResult<Option<Vec<String>>> {
        let line = match self.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.trim().is_empty() {
            return Ok(None);
        }
        let mut index = 0;
        let values = self
            .header
            .iter()
            .map(|_| String::from(next_value(&line, &mut index)))
            .collect();
        Ok(Some(values))
    }
    /// Like [`CsvReader::read_row`], keyed by header name.
    pub fn read_row_as_map(&mut self) -> ConvertResult<Option<RowMap>> {
        let values = match self.read_row()? {
            Some(values) => values,
            None => return Ok(None),
        };
        let mut map = RowMap::with_capacity(values.len());
        for (name, value) in self.header.iter().zip(values) {
            if map.insert(name.clone(), value).is_some() {
                return Err(ConvertError::MalformedInput(format!(
                    "Duplicate header column \"{}\".",
                    name
                )));
            }
        }
        Ok(Some(map))
    }
    /// Releases the underlying stream. Safe to call more than once.
    #[inline]
    pub fn close(&mut self) {
        self.reader = None;
    }
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
    fn next_line(&mut self) -> ConvertResult<Option<String>> {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Ok(None),
        };
        self.line.clear();
        let mut started = false;
        loop {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            started = true;
            match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(end) => {
                    let cr = buf[end] == b'\r';
                    self.line.extend_from_slice(&buf[..end]);
                    reader.consume(end + 1);
                    if cr && reader.fill_buf()?.first() == Some(&b'\n') {
                        reader.consume(1);
                    }
                    break;
                }
                None => {
                    let len = buf.len();
                    self.line.extend_from_slice(buf);
                    reader.consume(len);
                }
            }
        }
        if !started {
            return Ok(None);
        }
        let (text, _) = self.encoding.decode_without_bom_handling(&self.line);
        Ok(Some(text.into_owned()))
    }
}

/// Reads one value starting at `index`, leaving `index` past the comma that ended it.
fn next_value<'a>(line: &'a str, index: &mut usize) -> &'a str {
    let rest = &line[(*index).min(line.len())..];
    match rest.find(',') {
        Some(comma) => {
            *index += comma + 1;
            rest[..comma].trim_matches(TRIM)
        }
        None => {
            *index = line.len();
            rest.trim_matches(TRIM)
        }
    }
}
