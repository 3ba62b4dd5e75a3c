//! Decoding uploaded bytes into a [`Dataset`]

use super::{Cell, Column, Dataset};
use crate::error::{PipelineError, Result};
use calamine::{open_workbook_auto_from_rs, open_workbook_from_rs, Data, Range, Reader, Xls, Xlsx};
use polars::prelude::{CsvEncoding, CsvParseOptions, CsvReadOptions, DataFrame, DataType, SerReader};
use serde::Serialize;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, warn};

const SNIFF_SEPARATORS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Recognised upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    /// Detect the format from a file name's extension
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" => Ok(FileFormat::Xlsx),
            "xls" => Ok(FileFormat::Xls),
            _ => Err(PipelineError::UnsupportedFormat(if ext.is_empty() {
                filename.to_string()
            } else {
                format!(".{}", ext)
            })),
        }
    }
}

/// Which decoding attempt produced the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Default reader options succeeded
    Strict,
    /// The default reader failed and the relaxed retry succeeded
    Relaxed,
}

/// Data loader for uploaded tabular files.
///
/// CSV cells are read as text and typed per column by [`Column::from_cells`],
/// so every row takes part in typing and no value is coerced away.
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field separator of the strict CSV attempt
    separator: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { separator: b',' }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    /// Decode `bytes` as `format`, retrying once with relaxed options
    pub fn load_bytes(&self, bytes: &[u8], format: FileFormat) -> Result<(Dataset, ParseMode)> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(PipelineError::EmptyDataset);
        }

        match format {
            FileFormat::Csv => self.load_csv(bytes),
            FileFormat::Xlsx | FileFormat::Xls => self.load_spreadsheet(bytes, format),
        }
    }

    fn load_csv(&self, bytes: &[u8]) -> Result<(Dataset, ParseMode)> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);

        let strict = read_text_frame(bytes, CsvParseOptions::default().with_separator(self.separator));

        match strict {
            Ok(df) => Ok((frame_to_dataset(&df)?, ParseMode::Strict)),
            Err(first) => {
                let separator = sniff_separator(bytes);
                warn!(
                    error = %first,
                    separator = %(separator as char).escape_default(),
                    "CSV parse failed, retrying with relaxed options"
                );

                let parse_options = CsvParseOptions::default()
                    .with_separator(separator)
                    .with_truncate_ragged_lines(true)
                    .with_encoding(CsvEncoding::LossyUtf8);
                let df = read_text_frame(bytes, parse_options)?;

                Ok((frame_to_dataset(&df)?, ParseMode::Relaxed))
            }
        }
    }

    fn load_spreadsheet(&self, bytes: &[u8], format: FileFormat) -> Result<(Dataset, ParseMode)> {
        let strict = match format {
            FileFormat::Xlsx => open_workbook_from_rs::<Xlsx<_>, _>(Cursor::new(bytes.to_vec()))
                .map_err(|e| e.to_string())
                .and_then(|mut wb| first_sheet(&mut wb)),
            FileFormat::Xls => open_workbook_from_rs::<Xls<_>, _>(Cursor::new(bytes.to_vec()))
                .map_err(|e| e.to_string())
                .and_then(|mut wb| first_sheet(&mut wb)),
            FileFormat::Csv => Err("not a spreadsheet".to_string()),
        };

        match strict {
            Ok(range) => Ok((range_to_dataset(&range)?, ParseMode::Strict)),
            Err(first) => {
                warn!(error = %first, "Spreadsheet parse failed, retrying with format detection");
                let range = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
                    .map_err(|e| e.to_string())
                    .and_then(|mut wb| first_sheet(&mut wb))
                    .map_err(PipelineError::DataError)?;
                Ok((range_to_dataset(&range)?, ParseMode::Relaxed))
            }
        }
    }
}

/// Read every field as text, header line included as the first row
fn read_text_frame(bytes: &[u8], parse_options: CsvParseOptions) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()?;
    Ok(df)
}

fn first_sheet<RS, R>(workbook: &mut R) -> std::result::Result<Range<Data>, String>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no worksheets".to_string())?
        .map_err(|e| e.to_string())
}

/// Pick the separator that occurs most often in the header line
fn sniff_separator(bytes: &[u8]) -> u8 {
    let header = bytes.split(|&b| b == b'\n').next().unwrap_or(bytes);
    SNIFF_SEPARATORS
        .iter()
        .copied()
        .map(|sep| (sep, header.iter().filter(|&&b| b == sep).count()))
        .filter(|&(_, count)| count > 0)
        .max_by_key(|&(_, count)| count)
        .map_or(b',', |(sep, _)| sep)
}

/// Blank headers become `Unnamed: <i>`; repeats get `.1`, `.2`, ... suffixes
fn normalize_headers(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for (i, name) in names.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 0;
        while out.contains(&candidate) {
            n += 1;
            candidate = format!("{}.{}", base, n);
        }
        out.push(candidate);
    }
    out
}

/// Build a dataset from an all-text frame whose first row is the header
fn frame_to_dataset(df: &DataFrame) -> Result<Dataset> {
    let mut header = Vec::with_capacity(df.width());
    let mut cells = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let text = column.as_materialized_series().cast(&DataType::String)?;
        let mut values = text.str()?.into_iter();
        header.push(values.next().flatten().unwrap_or_default().to_string());
        cells.push(
            values
                .map(|v| v.map_or(Cell::Missing, |s| Cell::Text(s.to_string())))
                .collect::<Vec<_>>(),
        );
    }

    let columns = normalize_headers(header)
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| Column::from_cells(name, cells))
        .collect();

    debug!(rows = df.height().saturating_sub(1), columns = df.width(), "Decoded CSV frame");
    Dataset::new(columns)
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(i) => Cell::Number { value: *i as f64, integer: true },
        Data::Float(f) => Cell::Number { value: *f, integer: f.fract() == 0.0 },
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

fn range_to_dataset(range: &Range<Data>) -> Result<Dataset> {
    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(row) => row
            .iter()
            .map(|d| match d {
                Data::Empty => String::new(),
                other => other.to_string(),
            })
            .collect(),
        None => return Dataset::new(Vec::new()),
    };

    let body: Vec<&[Data]> = rows.collect();
    let names = normalize_headers(header);

    let columns = names
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let cells = body
                .iter()
                .map(|row| row.get(i).map_or(Cell::Missing, spreadsheet_cell))
                .collect();
            Column::from_cells(name, cells)
        })
        .collect();

    Dataset::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnData;

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_filename("data.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_filename("book.xlsx").unwrap(), FileFormat::Xlsx);
        assert_eq!(FileFormat::from_filename("old.xls").unwrap(), FileFormat::Xls);
        assert!(matches!(
            FileFormat::from_filename("data.json"),
            Err(PipelineError::UnsupportedFormat(ext)) if ext == ".json"
        ));
        assert!(FileFormat::from_filename("noext").is_err());
    }

    #[test]
    fn test_load_csv() {
        let csv = b"a,b,label\n1,x,0\n2,,1\n3,z,1\n";
        let (ds, mode) = DataLoader::new().load_bytes(csv, FileFormat::Csv).unwrap();
        assert_eq!(mode, ParseMode::Strict);
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column_names(), vec!["a", "b", "label"]);
        assert_eq!(ds.numeric_column_names(), vec!["a", "label"]);
        assert!(ds.column("b").unwrap().is_missing(1));
    }

    #[test]
    fn test_load_csv_header_only_is_empty() {
        let (ds, _) = DataLoader::new().load_bytes(b"a,b\n", FileFormat::Csv).unwrap();
        assert_eq!(ds.n_rows(), 0);
    }

    #[test]
    fn test_blank_upload_is_empty() {
        let result = DataLoader::new().load_bytes(b"  \n", FileFormat::Csv);
        assert!(matches!(result, Err(PipelineError::EmptyDataset)));
    }

    #[test]
    fn test_na_markers_in_text_column() {
        let csv = b"score,name\nNA,a\n2.5,b\n4,c\n";
        let (ds, _) = DataLoader::new().load_bytes(csv, FileFormat::Csv).unwrap();
        let score = ds.column("score").unwrap();
        assert!(score.is_numeric());
        assert!(score.is_missing(0));
    }

    #[test]
    fn test_sniff_separator() {
        assert_eq!(sniff_separator(b"a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_separator(b"a\tb\n1\t2"), b'\t');
        assert_eq!(sniff_separator(b"single\n1"), b',');
    }

    #[test]
    fn test_normalize_headers() {
        let names = normalize_headers(vec!["a".into(), "".into(), "a".into(), "a".into()]);
        assert_eq!(names, vec!["a", "Unnamed: 1", "a.1", "a.2"]);
    }

    #[test]
    fn test_csv_typing_scans_every_row() {
        let mut csv = String::from("count,label\n");
        for i in 0..1500 {
            if i == 1200 {
                csv.push_str("2.5,b\n");
            } else {
                csv.push_str(&format!("{},a\n", i));
            }
        }
        let (ds, mode) = DataLoader::new().load_bytes(csv.as_bytes(), FileFormat::Csv).unwrap();
        assert_eq!(mode, ParseMode::Strict);
        assert_eq!(ds.n_rows(), 1500);

        let count = ds.column("count").unwrap();
        assert_eq!(count.null_count(), 0);
        match &count.data {
            ColumnData::Numeric { values, integer } => {
                assert!(!integer);
                assert_eq!(values[1200], Some(2.5));
                assert_eq!(values[1199], Some(1199.0));
            }
            other => panic!("expected numeric column, got {:?}", other),
        }
    }

    #[test]
    fn test_csv_blank_and_duplicate_headers() {
        let (ds, _) = DataLoader::new().load_bytes(b"a,,a\n1,2,3\n", FileFormat::Csv).unwrap();
        assert_eq!(ds.column_names(), vec!["a", "Unnamed: 1", "a.1"]);
        assert_eq!(ds.column("a.1").unwrap().json_value(0), serde_json::json!(3));
    }

    #[test]
    fn test_ragged_csv_uses_relaxed_parse() {
        let csv = b"a,b\n1,2\n3,4,5\n6,7\n";
        let (ds, mode) = DataLoader::new().load_bytes(csv, FileFormat::Csv).unwrap();
        assert_eq!(mode, ParseMode::Relaxed);
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column_names(), vec!["a", "b"]);
        assert_eq!(ds.column("b").unwrap().json_value(1), serde_json::json!(4));
    }

    #[test]
    fn test_custom_separator() {
        let loader = DataLoader::new().with_separator(b';');
        let (ds, mode) = loader.load_bytes(b"a;b\n1;x\n2;y\n", FileFormat::Csv).unwrap();
        assert_eq!(mode, ParseMode::Strict);
        assert_eq!(ds.column_names(), vec!["a", "b"]);
        assert_eq!(ds.numeric_column_names(), vec!["a"]);
    }

    fn workbook_bytes() -> Vec<u8> {
        use rust_xlsxwriter::Workbook;

        let mut workbook = Workbook::new();
        let data = workbook.add_worksheet();
        data.set_name("measurements").unwrap();
        for (col, name) in ["size", "color", "label"].iter().enumerate() {
            data.write_string(0, col as u16, *name).unwrap();
        }
        let rows = [(1.0, "red", "yes"), (2.5, "blue", "no"), (4.0, "red", "yes")];
        for (i, (size, color, label)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            data.write_number(row, 0, *size).unwrap();
            data.write_string(row, 1, *color).unwrap();
            data.write_string(row, 2, *label).unwrap();
        }

        let other = workbook.add_worksheet();
        other.set_name("notes").unwrap();
        other.write_string(0, 0, "ignored").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_load_xlsx_first_sheet() {
        let bytes = workbook_bytes();
        let (ds, mode) = DataLoader::new().load_bytes(&bytes, FileFormat::Xlsx).unwrap();

        assert_eq!(mode, ParseMode::Strict);
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.column_names(), vec!["size", "color", "label"]);
        assert_eq!(ds.numeric_column_names(), vec!["size"]);
        assert_eq!(ds.column("size").unwrap().json_value(1), serde_json::json!(2.5));
        assert_eq!(ds.suggested_target().as_deref(), Some("label"));
    }

    #[test]
    fn test_xlsx_bytes_under_xls_name_use_relaxed_parse() {
        let bytes = workbook_bytes();
        let (ds, mode) = DataLoader::new().load_bytes(&bytes, FileFormat::Xls).unwrap();
        assert_eq!(mode, ParseMode::Relaxed);
        assert_eq!(ds.n_rows(), 3);
    }

    #[test]
    fn test_garbage_spreadsheet_fails() {
        let result = DataLoader::new().load_bytes(b"definitely not a workbook", FileFormat::Xlsx);
        assert!(matches!(result, Err(PipelineError::DataError(_))));
    }

    #[test]
    fn test_spreadsheet_cells() {
        assert_eq!(spreadsheet_cell(&Data::Float(2.0)), Cell::Number { value: 2.0, integer: true });
        assert_eq!(spreadsheet_cell(&Data::Empty), Cell::Missing);
        let col = Column::from_cells(
            "v",
            vec![spreadsheet_cell(&Data::Int(1)), spreadsheet_cell(&Data::Float(2.5))],
        );
        assert_eq!(
            col.data,
            ColumnData::Numeric { values: vec![Some(1.0), Some(2.5)], integer: false }
        );
    }
}
