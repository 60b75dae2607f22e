use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use log::info;
use rust_xlsxwriter::{Format, Workbook};

use crate::frame::RawBatch;
use crate::pipeline::CycleReport;

/// Header of the label column in exported sheets
pub const DEFAULT_LABEL_COLUMN: &str = "Predicted Condition";

/// Worksheet that holds the labeled rows
pub const EXPORT_SHEET_NAME: &str = "Hasil Prediksi";

/// Suggested download name for an export
pub const DEFAULT_EXPORT_FILE: &str = "hasil_prediksi_stres.xlsx";

// Worksheet limits of the xlsx format, header row included
const MAX_SHEET_ROWS: usize = 1_048_576;
const MAX_SHEET_COLUMNS: usize = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),
    #[error("Spreadsheet read error: {0}")]
    XlsxRead(#[from] calamine::XlsxError),
    #[error("{rows} rows x {columns} columns do not fit in one worksheet")]
    SheetTooLarge { rows: usize, columns: usize },
    #[error("Label column '{0}' not found")]
    MissingLabelColumn(String),
}

/// Builds the export workbook: one sheet, a bold header row, then one
/// line per record. Features are written as numbers; keys, pass-through
/// columns and the canonical label as text.
fn build_workbook(report: &CycleReport, label_column: &str) -> Result<Workbook, ExportError> {
    let mut header = report.columns();
    header.push(label_column.to_string());
    let rows = report.len() + 1;
    if rows > MAX_SHEET_ROWS || header.len() > MAX_SHEET_COLUMNS {
        return Err(ExportError::SheetTooLarge {
            rows,
            columns: header.len(),
        });
    }

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(EXPORT_SHEET_NAME)?;

    for (col, name) in header.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &bold)?;
    }

    for (i, labeled) in report.records().iter().enumerate() {
        let row = (i + 1) as u32;
        let record = &labeled.record;
        let mut col: u16 = 0;
        for value in &record.features {
            worksheet.write_number(row, col, *value)?;
            col += 1;
        }
        for text in record.keys.iter().chain(&record.extras) {
            worksheet.write_string(row, col, text)?;
            col += 1;
        }
        worksheet.write_string(row, col, labeled.label.name())?;
    }
    Ok(workbook)
}

/// The labeled batch as xlsx bytes, for serving as a download.
pub fn export_to_vec(report: &CycleReport, label_column: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = build_workbook(report, label_column)?;
    Ok(workbook.save_to_buffer()?)
}

/// Writes the labeled batch as CSV: data columns then the label column,
/// one line per record. Labels are always the canonical names.
pub fn export_csv<W: Write>(report: &CycleReport, writer: W, label_column: &str) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = report.columns();
    header.push(label_column.to_string());
    writer.write_record(&header)?;

    for labeled in report.records() {
        let mut row = report.row_values(labeled);
        row.push(labeled.label.name().to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes an export file. A `.csv` extension selects CSV, anything else
/// gets an xlsx workbook.
pub fn export_to_path<P: AsRef<Path>>(report: &CycleReport, path: P, label_column: &str) -> Result<(), ExportError> {
    let path = path.as_ref();
    if is_csv(path) {
        let file = BufWriter::new(File::create(path)?);
        export_csv(report, file, label_column)?;
    } else {
        let mut workbook = build_workbook(report, label_column)?;
        workbook.save(path)?;
    }
    info!("Exported {} labeled rows to {:?}", report.len(), path);
    Ok(())
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Reads an xlsx export back from its `Hasil Prediksi` sheet: the data
/// columns as a raw batch, and the labels.
pub fn import_xlsx<R: Read + Seek>(reader: R, label_column: &str) -> Result<(RawBatch, Vec<String>), ExportError> {
    let mut workbook: Xlsx<R> = Xlsx::new(reader)?;
    let range = workbook.worksheet_range(EXPORT_SHEET_NAME)?;

    let mut lines = range.rows().map(|cells| cells.iter().map(cell_text).collect::<Vec<String>>());
    let headers = lines.next().unwrap_or_default();
    let batch = RawBatch::new(headers, lines.collect());
    split_labels(batch, label_column)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Reads a CSV export back: the data columns as a raw batch, and the labels.
pub fn import_csv<R: Read>(reader: R, label_column: &str) -> Result<(RawBatch, Vec<String>), ExportError> {
    split_labels(RawBatch::from_csv_reader(reader)?, label_column)
}

fn split_labels(batch: RawBatch, label_column: &str) -> Result<(RawBatch, Vec<String>), ExportError> {
    let column = batch
        .column_index(label_column)
        .ok_or_else(|| ExportError::MissingLabelColumn(label_column.to_string()))?;

    let headers = without(batch.headers(), column);
    let mut labels = Vec::with_capacity(batch.len());
    let mut rows = Vec::with_capacity(batch.len());
    for row in batch.rows() {
        labels.push(row.get(column).cloned().unwrap_or_default());
        rows.push(without(row, column));
    }
    Ok((RawBatch::new(headers, rows), labels))
}

fn without(values: &[String], column: usize) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != column)
        .map(|(_, v)| v.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_requires_label_column() {
        let result = import_csv("a,b\n1,2\n".as_bytes(), DEFAULT_LABEL_COLUMN);
        assert!(matches!(result, Err(ExportError::MissingLabelColumn(_))));
    }

    #[test]
    fn test_csv_extension_selects_csv() {
        assert!(is_csv(Path::new("out/hasil.CSV")));
        assert!(!is_csv(Path::new(DEFAULT_EXPORT_FILE)));
        assert!(!is_csv(Path::new("hasil")));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Float(98.0)), "98");
        assert_eq!(cell_text(&Data::Float(36.5)), "36.5");
        assert_eq!(cell_text(&Data::String("Tenang".into())), "Tenang");
        assert_eq!(cell_text(&Data::Empty), "");
    }

    #[test]
    fn test_import_splits_labels() {
        let text = "Temperature,Predicted Condition,SpO2\n36.5,Tenang,98\n37,Cemas,95\n";
        let (batch, labels) = import_csv(text.as_bytes(), DEFAULT_LABEL_COLUMN).unwrap();
        assert_eq!(labels, vec!["Tenang", "Cemas"]);
        assert_eq!(batch.headers(), &["Temperature".to_string(), "SpO2".to_string()]);
        assert_eq!(batch.cell(1, 1), Some("95"));
    }
}
