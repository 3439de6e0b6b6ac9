//! Spreadsheet import and export of gauges.
//!
//! Import reads the first worksheet of any workbook format calamine
//! understands (`.xlsx`, `.xls`, `.ods`). Export always writes `.xlsx`.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Serialize;

use crate::error::CoreError;
use crate::gauge::{DerivedFields, GaugeSnapshot};
use crate::types::Date;

/// Name of the worksheet written on export.
pub const EXPORT_SHEET_NAME: &str = "Gauges";

/// Export column headers, in order. They parse back through the import
/// header matcher, so an exported file can be re-imported unchanged.
pub const EXPORT_HEADERS: [&str; 10] = [
    "Gauge ID",
    "Gauge Type",
    "Max Capacity",
    "Produced Quantity",
    "Remaining Capacity",
    "Capacity Utilization (%)",
    "Last Calibration Date",
    "Calibration Frequency (months)",
    "Next Calibration Date",
    "Status",
];

/// Largest Excel serial day number accepted as a date (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// One parsed data row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRow {
    /// 1-based sheet row number, as shown in a spreadsheet application.
    pub row_number: u32,
    /// Normalized and validated gauge, or the reason the row was rejected.
    pub result: Result<GaugeSnapshot, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    GaugeId,
    GaugeType,
    MaxCapacity,
    ProducedQuantity,
    LastCalibrationDate,
    CalibrationFrequency,
}

impl Column {
    const REQUIRED: [Column; 5] = [
        Column::GaugeId,
        Column::MaxCapacity,
        Column::ProducedQuantity,
        Column::LastCalibrationDate,
        Column::CalibrationFrequency,
    ];

    fn label(self) -> &'static str {
        match self {
            Column::GaugeId => "Gauge ID",
            Column::GaugeType => "Gauge Type",
            Column::MaxCapacity => "Max Capacity",
            Column::ProducedQuantity => "Produced Quantity",
            Column::LastCalibrationDate => "Last Calibration Date",
            Column::CalibrationFrequency => "Calibration Frequency",
        }
    }

    /// Match a header cell after normalization.
    fn from_header(raw: &str) -> Option<Column> {
        let key: String = raw
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "gaugeid" | "id" | "gauge" | "gaugeno" | "gaugenumber" => Some(Column::GaugeId),
            "gaugetype" | "type" => Some(Column::GaugeType),
            "maxcapacity" | "maximumcapacity" | "capacity" | "max" => Some(Column::MaxCapacity),
            "producedquantity" | "produced" | "quantityproduced" | "quantity" => {
                Some(Column::ProducedQuantity)
            }
            "lastcalibrationdate" | "lastcalibration" | "lastcalibrated" | "calibrationdate" => {
                Some(Column::LastCalibrationDate)
            }
            "calibrationfrequency"
            | "calibrationfrequencymonths"
            | "frequency"
            | "frequencymonths"
            | "calibrationinterval"
            | "calibrationintervalmonths" => Some(Column::CalibrationFrequency),
            _ => None,
        }
    }
}

/// Parse the first worksheet of a workbook into gauge rows.
///
/// Fails as a whole only when the bytes are not a readable workbook, the
/// workbook has no sheets, or a required column is missing. Problems with
/// individual rows are reported per row in [`ImportRow::result`].
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<ImportRow>, CoreError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| CoreError::Validation(format!("Could not read workbook: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CoreError::validation("Workbook contains no worksheets"))?
        .map_err(|e| CoreError::Validation(format!("Could not read first worksheet: {e}")))?;

    let first_row = range.start().map(|(row, _)| row).unwrap_or(0);
    let mut rows = range.rows();

    let header = rows
        .next()
        .ok_or_else(|| CoreError::validation("Worksheet is empty"))?;

    let mut columns: HashMap<Column, usize> = HashMap::new();
    for (idx, cell) in header.iter().enumerate() {
        if let Some(column) = Column::from_header(&cell.to_string()) {
            columns.entry(column).or_insert(idx);
        }
    }

    let missing: Vec<&str> = Column::REQUIRED
        .iter()
        .filter(|c| !columns.contains_key(c))
        .map(|c| c.label())
        .collect();
    if !missing.is_empty() {
        return Err(CoreError::Validation(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let mut parsed = Vec::new();
    for (offset, cells) in rows.enumerate() {
        if cells.iter().all(is_blank) {
            continue;
        }
        // Header occupies `first_row`; data starts one below, 1-based.
        let row_number = first_row + offset as u32 + 2;
        parsed.push(ImportRow {
            row_number,
            result: parse_row(cells, &columns),
        });
    }

    Ok(parsed)
}

static EMPTY_CELL: Data = Data::Empty;

fn cell_at<'a>(cells: &'a [Data], columns: &HashMap<Column, usize>, column: Column) -> &'a Data {
    columns
        .get(&column)
        .and_then(|&idx| cells.get(idx))
        .unwrap_or(&EMPTY_CELL)
}

fn parse_row(cells: &[Data], columns: &HashMap<Column, usize>) -> Result<GaugeSnapshot, String> {
    let cell = |column: Column| cell_at(cells, columns, column);

    let gauge_id = cell_text(cell(Column::GaugeId));
    if gauge_id.is_empty() {
        return Err("Gauge ID is required".to_string());
    }

    let mut gauge = GaugeSnapshot {
        gauge_id,
        gauge_type: cell_text(cell(Column::GaugeType)),
        max_capacity: cell_number(cell(Column::MaxCapacity), Column::MaxCapacity)?,
        produced_quantity: cell_number(cell(Column::ProducedQuantity), Column::ProducedQuantity)?,
        last_calibration_date: cell_date(
            cell(Column::LastCalibrationDate),
            Column::LastCalibrationDate,
        )?,
        calibration_frequency: cell_months(
            cell(Column::CalibrationFrequency),
            Column::CalibrationFrequency,
        )?,
    };
    gauge.normalize();
    gauge.validate().map_err(|e| match e {
        CoreError::Validation(msg) => msg,
        other => other.to_string(),
    })?;
    Ok(gauge)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // Numeric ids typed into a sheet come back as floats.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_number(cell: &Data, column: Column) -> Result<f64, String> {
    match cell {
        Data::Int(i) => Ok(*i as f64),
        Data::Float(f) => Ok(*f),
        Data::String(s) if !s.trim().is_empty() => s
            .trim()
            .replace(',', "")
            .parse::<f64>()
            .map_err(|_| format!("{} must be a number, got '{}'", column.label(), s.trim())),
        Data::Empty | Data::String(_) => Err(format!("{} is required", column.label())),
        other => Err(format!("{} must be a number, got '{other}'", column.label())),
    }
}

fn cell_months(cell: &Data, column: Column) -> Result<i32, String> {
    let value = cell_number(cell, column)?;
    if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(format!(
            "{} must be a whole number of months, got {value}",
            column.label()
        ));
    }
    Ok(value as i32)
}

fn cell_date(cell: &Data, column: Column) -> Result<Date, String> {
    let invalid = || format!("{} is not a valid date: '{cell}'", column.label());
    match cell {
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).ok_or_else(invalid),
        Data::Float(f) => excel_serial_to_date(*f).ok_or_else(invalid),
        Data::Int(i) => excel_serial_to_date(*i as f64).ok_or_else(invalid),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            .ok_or_else(invalid),
        Data::String(s) if !s.trim().is_empty() => parse_text_date(s.trim()).ok_or_else(invalid),
        Data::Empty | Data::String(_) => Err(format!("{} is required", column.label())),
        _ => Err(invalid()),
    }
}

/// Convert an Excel serial day number (1900 date system) to a date.
///
/// Counts days from 1899-12-30, which absorbs Excel's phantom 1900-02-29 for
/// every serial from 61 (1900-03-01) onward. Any time-of-day fraction is
/// discarded.
fn excel_serial_to_date(serial: f64) -> Option<Date> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn parse_text_date(s: &str) -> Option<Date> {
    // ISO date-times: keep the date part.
    let candidate = match s.as_bytes().get(10) {
        Some(b'T' | b' ') => s.get(..10).unwrap_or(s),
        _ => s,
    };
    ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// A gauge together with its derived fields, as written to an export row.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub gauge: GaugeSnapshot,
    pub derived: DerivedFields,
}

fn xlsx_error(e: XlsxError) -> CoreError {
    CoreError::Internal(format!("Failed to write workbook: {e}"))
}

/// Write `rows` to an in-memory `.xlsx` workbook.
pub fn write_workbook(rows: &[ExportRow]) -> Result<Vec<u8>, CoreError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET_NAME).map_err(xlsx_error)?;

    for (col, title) in EXPORT_HEADERS.iter().enumerate() {
        let col = col as u16;
        sheet
            .write_string_with_format(0, col, *title, &header_format)
            .map_err(xlsx_error)?;
        sheet.set_column_width(col, 20).map_err(xlsx_error)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let r = u32::try_from(idx + 1)
            .map_err(|_| CoreError::validation("Too many rows to export"))?;
        let g = &row.gauge;
        let d = &row.derived;

        sheet.write_string(r, 0, g.gauge_id.as_str()).map_err(xlsx_error)?;
        sheet.write_string(r, 1, g.gauge_type.as_str()).map_err(xlsx_error)?;
        sheet.write_number(r, 2, g.max_capacity).map_err(xlsx_error)?;
        sheet.write_number(r, 3, g.produced_quantity).map_err(xlsx_error)?;
        sheet.write_number(r, 4, d.remaining_capacity).map_err(xlsx_error)?;
        sheet
            .write_number(r, 5, (d.capacity_utilization * 10.0).round() / 10.0)
            .map_err(xlsx_error)?;
        sheet
            .write_string(r, 6, g.last_calibration_date.to_string())
            .map_err(xlsx_error)?;
        sheet
            .write_number(r, 7, f64::from(g.calibration_frequency))
            .map_err(xlsx_error)?;
        sheet
            .write_string(r, 8, d.next_calibration_date.to_string())
            .map_err(xlsx_error)?;
        sheet.write_string(r, 9, d.status.as_str()).map_err(xlsx_error)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}
