//! Field parsers for raw spreadsheet cells
//!
//! Every parser takes one raw cell value plus a default and always returns a
//! value of the target type. Malformed input (embedded header text, wrong
//! types, unparseable dates) resolves to the default instead of an error, so
//! nothing from this class of problem ever crosses the ingestion boundary.
//!
//! Dates follow the Excel 1900 date system (serial 1 = 1900-01-01, with the
//! Lotus leap-year bug accounted for by the 1899-12-30 epoch).

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Cell Value
// ============================================================================

/// A raw cell value, independent of the workbook reader in use
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Empty cells and whitespace-only text count as blank
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value.and_time(chrono::NaiveTime::MIN))
    }
}

// ============================================================================
// Numbers
// ============================================================================

/// Check for a plain ASCII numeral: one optional leading sign, digits, and at
/// most one decimal point. Anything else (including CJK header text) is not
/// numeric.
pub fn is_plain_numeral(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let mut digits = 0usize;
    let mut points = 0usize;
    for ch in body.chars() {
        match ch {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return false,
        }
    }
    digits > 0 && points <= 1
}

/// Parse a numeric cell. Text only counts when it is a plain ASCII numeral.
pub fn parse_number(value: &CellValue, default: f64) -> f64 {
    match value {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if is_plain_numeral(trimmed) {
                trimmed.parse::<f64>().unwrap_or(default)
            } else {
                default
            }
        }
        _ => default,
    }
}

/// Parse an integer cell, truncating toward zero after the numeric parse
pub fn parse_integer(value: &CellValue, default: i64) -> i64 {
    let sentinel = f64::NAN;
    let number = parse_number(value, sentinel);
    if number.is_nan() || number.abs() >= i64::MAX as f64 {
        default
    } else {
        number.trunc() as i64
    }
}

// ============================================================================
// Text
// ============================================================================

/// Render a cell as text. Integral numbers drop the trailing `.0`.
pub fn cell_text(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        CellValue::Date(dt) => {
            if dt.time() == chrono::NaiveTime::MIN {
                dt.date().format("%Y-%m-%d").to_string()
            } else {
                dt.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
    }
}

/// Cell text with surrounding whitespace removed
pub fn parse_text(value: &CellValue) -> String {
    cell_text(value).trim().to_string()
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// Dates
// ============================================================================

/// Labels that appear in date columns of header rows
pub const HEADER_LABELS: &[&str] = &[
    "日期",
    "開始日期",
    "完成日期",
    "計劃開始日期",
    "計劃完成日期",
    "實際開始日期",
    "實際完成日期",
    "目標日期",
    "預計完成日期",
    "計劃開始",
    "計劃完成",
    "實際開始",
    "實際完成",
    "date",
    "start",
    "end",
    "start date",
    "end date",
    "target date",
    "n/a",
    "tbd",
    "-",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日", "%m/%d/%Y", "%Y%m%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Largest serial Excel accepts (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Convert an Excel serial number to a date (time of day is dropped)
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    excel_epoch().checked_add_signed(ChronoDuration::days(serial.trunc() as i64))
}

/// Convert an Excel serial number to a date-time
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let date = excel_serial_to_date(serial)?;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    date.and_time(chrono::NaiveTime::MIN)
        .checked_add_signed(ChronoDuration::seconds(seconds))
}

/// Convert a date to its Excel serial number
pub fn date_to_excel_serial(date: NaiveDate) -> f64 {
    (date - excel_epoch()).num_days() as f64
}

/// Remove parenthesized annotations such as a weekday name:
/// `2026/03/02 (一)` and `2026/03/02（Mon）` both become `2026/03/02`.
pub fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for ch in text.chars() {
        match ch {
            '(' | '（' => depth += 1,
            ')' | '）' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

pub fn is_header_label(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    HEADER_LABELS.iter().any(|label| *label == lowered)
}

/// Parse a date cell. Header labels and unparseable text yield `None`.
pub fn parse_date(value: &CellValue) -> Option<NaiveDate> {
    match value {
        CellValue::Date(dt) => Some(dt.date()),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => parse_date_text(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let cleaned = strip_annotations(text);
    if cleaned.is_empty() || is_header_label(&cleaned) {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(dt.date());
        }
    }
    None
}

// ============================================================================
// Percent Scale
// ============================================================================

/// Scale a percentage column was authored in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentScale {
    /// 0-1 fractions (cells formatted as `%`)
    Fraction,
    /// 0-100 numbers
    #[default]
    Percent,
}

impl PercentScale {
    /// Decide the scale of a whole column from its maximum value. An empty
    /// column is left alone.
    pub fn detect(values: &[f64]) -> Self {
        if values.is_empty() {
            return PercentScale::Percent;
        }
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max <= 1.0 {
            PercentScale::Fraction
        } else {
            PercentScale::Percent
        }
    }

    pub fn to_percent(self, value: f64) -> f64 {
        match self {
            PercentScale::Fraction => value * 100.0,
            PercentScale::Percent => value,
        }
    }

    /// Inverse of `to_percent`, used when writing back into the source column
    pub fn from_percent(self, value: f64) -> f64 {
        match self {
            PercentScale::Fraction => value / 100.0,
            PercentScale::Percent => value,
        }
    }
}

/// Detect the column scale and rescale every value to 0-100 in place
pub fn normalize_percent_column(values: &mut [f64]) -> PercentScale {
    let scale = PercentScale::detect(values);
    for value in values.iter_mut() {
        *value = scale.to_percent(*value);
    }
    scale
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn plain_numerals() {
        assert!(is_plain_numeral("42"));
        assert!(is_plain_numeral("-3.5"));
        assert!(is_plain_numeral("+0.25"));
        assert!(is_plain_numeral(".5"));
        assert!(!is_plain_numeral(""));
        assert!(!is_plain_numeral("."));
        assert!(!is_plain_numeral("1.2.3"));
        assert!(!is_plain_numeral("--1"));
        assert!(!is_plain_numeral("1-"));
        assert!(!is_plain_numeral("1e5"));
        assert!(!is_plain_numeral("５"));
    }

    #[test]
    fn parse_number_malformed_returns_default() {
        let inputs = [
            CellValue::Empty,
            CellValue::text(""),
            CellValue::text("實際完成百分比"),
            CellValue::text("12天"),
            CellValue::text("N/A"),
            CellValue::Bool(true),
            CellValue::from(date(2026, 1, 1)),
            CellValue::Number(f64::NAN),
        ];
        for input in &inputs {
            assert_eq!(parse_number(input, -1.0), -1.0, "input: {:?}", input);
            assert_eq!(parse_integer(input, -7), -7, "input: {:?}", input);
        }
    }

    #[test]
    fn parse_number_accepts_numbers_and_numerals() {
        assert_eq!(parse_number(&CellValue::Number(0.75), 0.0), 0.75);
        assert_eq!(parse_number(&CellValue::text(" 12.5 "), 0.0), 12.5);
        assert_eq!(parse_number(&CellValue::text("-3"), 0.0), -3.0);
    }

    #[test]
    fn parse_integer_truncates_toward_zero() {
        assert_eq!(parse_integer(&CellValue::Number(4.9), 0), 4);
        assert_eq!(parse_integer(&CellValue::Number(-4.9), 0), -4);
        assert_eq!(parse_integer(&CellValue::text("-2.7"), 0), -2);
    }

    #[test]
    fn cell_text_formats_integral_numbers() {
        assert_eq!(cell_text(&CellValue::Number(3.0)), "3");
        assert_eq!(cell_text(&CellValue::Number(3.25)), "3.25");
        assert_eq!(parse_text(&CellValue::text("  Mech  ")), "Mech");
        assert_eq!(cell_text(&CellValue::from(date(2026, 2, 3))), "2026-02-03");
    }

    #[test]
    fn parse_date_annotation_is_ignored() {
        let cases = [
            ("2026/03/02 (一)", "2026/03/02"),
            ("2026-03-02（Mon）", "2026-03-02"),
            ("2026/3/2(週一)", "2026/3/2"),
        ];
        for (annotated, plain) in cases {
            let with = parse_date(&CellValue::text(annotated));
            let without = parse_date(&CellValue::text(plain));
            assert_eq!(with, without, "annotated: {}", annotated);
            assert_eq!(with, Some(date(2026, 3, 2)));
        }
    }

    #[test]
    fn parse_date_header_labels_are_absent() {
        for label in ["計劃開始日期", "實際完成日期", "Date", "TBD", " - "] {
            assert_eq!(parse_date(&CellValue::text(label)), None, "label: {}", label);
        }
    }

    #[test]
    fn parse_date_unparseable_text_is_absent() {
        assert_eq!(parse_date(&CellValue::text("next week")), None);
        assert_eq!(parse_date(&CellValue::text("2026/13/40")), None);
        assert_eq!(parse_date(&CellValue::Bool(false)), None);
        assert_eq!(parse_date(&CellValue::Empty), None);
    }

    #[test]
    fn parse_date_accepts_serials_and_datetimes() {
        assert_eq!(parse_date(&CellValue::Number(46083.0)), Some(date(2026, 3, 2)));
        assert_eq!(parse_date(&CellValue::text("2026-03-02 08:30:00")), Some(date(2026, 3, 2)));
        assert_eq!(parse_date(&CellValue::text("2026年3月2日")), Some(date(2026, 3, 2)));
        assert_eq!(parse_date(&CellValue::Number(-5.0)), None);
    }

    #[test]
    fn excel_serial_round_trip() {
        let d = date(2026, 10, 14);
        assert_eq!(excel_serial_to_date(date_to_excel_serial(d)), Some(d));
        assert_eq!(date_to_excel_serial(date(1900, 3, 1)), 61.0);
    }

    #[test]
    fn excel_serial_keeps_time_of_day() {
        let dt = excel_serial_to_datetime(46083.5).unwrap();
        assert_eq!(dt.date(), date(2026, 3, 2));
        assert_eq!(dt.format("%H:%M").to_string(), "12:00");
    }

    #[test]
    fn percent_fraction_column_is_rescaled() {
        let mut values = vec![0.0, 0.5, 1.0];
        let scale = normalize_percent_column(&mut values);
        assert_eq!(scale, PercentScale::Fraction);
        assert_eq!(values, vec![0.0, 50.0, 100.0]);
        let max = values.iter().copied().fold(0.0, f64::max);
        assert!(max > 1.0 && max <= 100.0);
    }

    #[test]
    fn percent_normalization_is_idempotent() {
        let mut values = vec![10.0, 55.5, 100.0];
        let original = values.clone();
        assert_eq!(normalize_percent_column(&mut values), PercentScale::Percent);
        assert_eq!(values, original);

        let mut fractions = vec![0.2, 0.9];
        normalize_percent_column(&mut fractions);
        let once = fractions.clone();
        normalize_percent_column(&mut fractions);
        assert_eq!(fractions, once);
    }

    #[test]
    fn percent_all_zero_column_stays_zero() {
        let mut values = vec![0.0, 0.0];
        normalize_percent_column(&mut values);
        assert_eq!(values, vec![0.0, 0.0]);
    }

    #[test]
    fn percent_scale_inverse() {
        assert_eq!(PercentScale::Fraction.from_percent(45.0), 0.45);
        assert_eq!(PercentScale::Percent.from_percent(45.0), 45.0);
    }
}
