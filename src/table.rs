//! Turning CSV and spreadsheet bytes into rows of JSON values.

use std::fmt::Display;
use std::io::{Read, Seek, SeekFrom};

use calamine::{Data, Reader, Xls, Xlsx};
use serde_json::{Number, Value};

use crate::errors::from_io;
use crate::request::FileType;
use crate::{ProxyError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub sheet_name: String,
    pub rows: Vec<Vec<Value>>,
}

pub fn read_table<R: Read + Seek>(
    mut reader: R,
    file_type: FileType,
    sheet: usize,
) -> Result<Table> {
    match file_type {
        FileType::Csv => {
            if sheet != 0 {
                return Err(ProxyError::SheetNotFound {
                    index: sheet,
                    count: 1,
                });
            }
            read_csv(reader)
        }
        FileType::Xls | FileType::Xlsx => {
            // workbooks are random access: fetch everything up front so
            // upstream failures surface here and not inside the parser
            let length = reader.seek(SeekFrom::End(0))?;
            reader.rewind()?;
            log::debug!("Opening {} workbook of {} bytes", file_type, length);

            if file_type == FileType::Xls {
                read_workbook::<_, Xls<_>>(reader, sheet)
            } else {
                read_workbook::<_, Xlsx<_>>(reader, sheet)
            }
        }
    }
}

fn read_csv<R: Read>(reader: R) -> Result<Table> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv.byte_records() {
        let record = record.map_err(csv_error)?;
        rows.push(
            record
                .iter()
                .map(|field| infer_cell(&String::from_utf8_lossy(field)))
                .collect(),
        );
    }
    log::debug!("Parsed {} CSV rows", rows.len());

    Ok(Table {
        sheet_name: String::new(),
        rows,
    })
}

fn read_workbook<RS, W>(reader: RS, sheet: usize) -> Result<Table>
where
    RS: Read + Seek,
    W: Reader<RS>,
    W::Error: Display,
{
    let mut workbook = W::new(reader).map_err(parse_error)?;
    let names = workbook.sheet_names();
    let sheet_name = names.get(sheet).cloned().ok_or(
        ProxyError::SheetNotFound {
            index: sheet,
            count: names.len(),
        },
    )?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(parse_error)?;
    let rows: Vec<Vec<Value>> = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    log::debug!("Parsed {} rows from sheet {:?}", rows.len(), sheet_name);

    Ok(Table { sheet_name, rows })
}

fn parse_error(err: impl Display) -> ProxyError {
    ProxyError::Parse(err.to_string())
}

fn csv_error(err: csv::Error) -> ProxyError {
    if !err.is_io_error() {
        return ProxyError::Parse(err.to_string());
    }
    match err.into_kind() {
        csv::ErrorKind::Io(err) => from_io(err),
        other => ProxyError::Parse(format!("{:?}", other)),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Int(value) => Value::from(*value),
        Data::Float(value) => Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string())),
        Data::String(value) => Value::String(value.clone()),
        Data::Bool(value) => Value::Bool(*value),
        Data::Empty => Value::String(String::new()),
        other => Value::String(other.to_string()),
    }
}

/// Integers and finite decimals become numbers, the rest stays text.
/// Zero-padded values such as `007` are identifiers and stay text too.
fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if looks_numeric(trimmed) {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::from(int);
        }
        if let Some(number) = trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
        {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

fn looks_numeric(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut chars = digits.chars();
    let zero_padded = matches!(
        (chars.next(), chars.next()),
        (Some('0'), Some(c)) if c.is_ascii_digit()
    );
    !zero_padded
        && digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || ".eE+-".contains(c))
}
