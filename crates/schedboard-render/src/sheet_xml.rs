//! Worksheet XML patching
//!
//! A worksheet part is split into three pieces: the bytes before the
//! `<sheetData>` body, the parsed rows, and the bytes after it. Only the rows
//! are re-serialized, so column widths, merged ranges, conditional
//! formatting, data validation and drawing anchors pass through untouched.
//!
//! Cells keep their `s` (style) attribute across writes. New text is written
//! as inline strings so the shared string table never changes.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use schedboard_core::fields::format_number;
use schedboard_ingest::ooxml::{cell_ref, parse_cell_ref};

use crate::RenderError;

/// Attribute list in document order, values unescaped
pub type Attrs = Vec<(String, String)>;

/// Row attributes copied onto appended rows along with cell styles
const ROW_STYLE_ATTRS: &[&str] = &["s", "customFormat", "ht", "customHeight"];

// ============================================================================
// External References
// ============================================================================

fn external_reference() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"'\[[^\[\]]+\][^']*'!|\[[^\[\]]+\][^!\[\]'+\-*/&=<>,;()^%\s]*!")
            .expect("external reference pattern")
    })
}

fn dimension_ref() -> &'static BytesRegex {
    static PATTERN: OnceLock<BytesRegex> = OnceLock::new();
    PATTERN.get_or_init(|| BytesRegex::new(r#"<dimension\s+ref="([^"]*)""#).expect("dimension pattern"))
}

/// Formula text that points into another workbook: `[1]Sheet1!A1`,
/// `'[Plan.xlsx]Bay 3'!B2`
pub fn is_external_reference(formula: &str) -> bool {
    external_reference().is_match(formula)
}

// ============================================================================
// Cell Model
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Formula {
    pub attrs: Attrs,
    pub text: String,
}

impl Formula {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Shared formula group index, for masters and children alike
    pub fn shared_index(&self) -> Option<&str> {
        if self.attr("t") == Some("shared") {
            self.attr("si")
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    /// `s` attribute: index into `cellXfs`
    pub style: Option<String>,
    /// `t` attribute: `s`, `str`, `inlineStr`, `b`, `e`, `n`, `d`
    pub kind: Option<String>,
    pub value: Option<String>,
    pub inline_text: Option<String>,
    pub formula: Option<Formula>,
    /// Any other attributes, kept verbatim
    pub attrs: Attrs,
}

impl Cell {
    pub fn has_value(&self) -> bool {
        self.value.is_some() || self.inline_text.is_some() || self.formula.is_some()
    }

    /// Stored as a string rather than a number
    pub fn is_text(&self) -> bool {
        matches!(self.kind.as_deref(), Some("s" | "str" | "inlineStr"))
    }

    /// Text content, resolving shared strings
    pub fn text<'a>(&'a self, shared: &'a [String]) -> Option<&'a str> {
        match self.kind.as_deref() {
            Some("s") => {
                let index = self.value.as_deref()?.trim().parse::<usize>().ok()?;
                shared.get(index).map(String::as_str)
            }
            Some("inlineStr") => self.inline_text.as_deref(),
            Some("str") if self.formula.is_none() => self.value.as_deref(),
            _ => None,
        }
    }

    /// A real formula, or text that starts with `=`
    pub fn is_formula(&self, shared: &[String]) -> bool {
        self.formula.is_some() || self.text(shared).is_some_and(|t| t.starts_with('='))
    }

    fn clear(&mut self) {
        self.kind = None;
        self.value = None;
        self.inline_text = None;
        self.formula = None;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub attrs: Attrs,
    pub cells: BTreeMap<u32, Cell>,
}

/// A value to place into a cell
#[derive(Clone, Debug, PartialEq)]
pub enum CellWrite {
    Text(String),
    Number(f64),
    Blank,
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextTarget {
    None,
    Value,
    Formula,
    Inline,
}

fn attrs_of(e: &BytesStart<'_>, part: &str) -> Result<Attrs, RenderError> {
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| RenderError::xml(part, source))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn take_attr(attrs: &mut Attrs, key: &str) -> Option<String> {
    let index = attrs.iter().position(|(k, _)| k == key)?;
    Some(attrs.remove(index).1)
}

fn start_cell(e: &BytesStart<'_>, row: u32, next_col: u32, part: &str) -> Result<(u32, Cell), RenderError> {
    let mut attrs = attrs_of(e, part)?;
    let col = take_attr(&mut attrs, "r")
        .and_then(|r| parse_cell_ref(&r))
        .filter(|(r, _)| *r == row)
        .map_or(next_col, |(_, c)| c);
    let cell = Cell {
        style: take_attr(&mut attrs, "s"),
        kind: take_attr(&mut attrs, "t"),
        attrs,
        ..Default::default()
    };
    Ok((col, cell))
}

/// One worksheet part, split around its cell data
#[derive(Clone, Debug)]
pub struct SheetXml {
    part: String,
    head: Vec<u8>,
    rows: BTreeMap<u32, Row>,
    tail: Vec<u8>,
    /// `<sheetData/>` in the source; the body is re-opened on output
    self_closing: bool,
}

impl SheetXml {
    pub fn parse(xml: &[u8], part: &str) -> Result<Self, RenderError> {
        let mut reader = XmlReader::from_reader(xml);
        let mut buf = Vec::new();

        let mut head: Option<Vec<u8>> = None;
        let mut tail: Option<Vec<u8>> = None;
        let mut self_closing = false;
        let mut rows = BTreeMap::new();
        let mut row: Option<(u32, Row)> = None;
        let mut cell: Option<(u32, Cell)> = None;
        let mut target = TextTarget::None;
        let mut next_row = 0u32;
        let mut next_col = 0u32;

        loop {
            let before = reader.buffer_position() as usize;
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| RenderError::xml(part, source))?;
            let after = reader.buffer_position() as usize;

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let empty = matches!(event, Event::Empty(_));
                    match e.local_name().as_ref() {
                        b"sheetData" if head.is_none() => {
                            if empty {
                                head = Some(xml[..before].to_vec());
                                tail = Some(xml[after..].to_vec());
                                self_closing = true;
                                break;
                            }
                            head = Some(xml[..after].to_vec());
                        }
                        b"row" if head.is_some() => {
                            let mut attrs = attrs_of(e, part)?;
                            let index = take_attr(&mut attrs, "r")
                                .and_then(|r| r.trim().parse::<u32>().ok())
                                .and_then(|r| r.checked_sub(1))
                                .unwrap_or(next_row);
                            take_attr(&mut attrs, "spans");
                            next_row = index + 1;
                            next_col = 0;
                            let parsed = Row {
                                attrs,
                                cells: BTreeMap::new(),
                            };
                            if empty {
                                rows.insert(index, parsed);
                            } else {
                                row = Some((index, parsed));
                            }
                        }
                        b"c" => {
                            if let Some((row_index, current)) = row.as_mut() {
                                let (col, parsed) = start_cell(e, *row_index, next_col, part)?;
                                next_col = col + 1;
                                if empty {
                                    current.cells.insert(col, parsed);
                                } else {
                                    cell = Some((col, parsed));
                                }
                            }
                        }
                        b"f" => {
                            if let Some((_, current)) = cell.as_mut() {
                                current.formula = Some(Formula {
                                    attrs: attrs_of(e, part)?,
                                    text: String::new(),
                                });
                                if !empty {
                                    target = TextTarget::Formula;
                                }
                            }
                        }
                        b"v" => {
                            if let Some((_, current)) = cell.as_mut() {
                                current.value = Some(String::new());
                                if !empty {
                                    target = TextTarget::Value;
                                }
                            }
                        }
                        b"is" => {
                            if let Some((_, current)) = cell.as_mut() {
                                current.inline_text = Some(String::new());
                            }
                        }
                        b"t" if !empty => {
                            if cell.as_ref().is_some_and(|(_, c)| c.inline_text.is_some()) {
                                target = TextTarget::Inline;
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(ref t) if target != TextTarget::None => {
                    let text = t.unescape().map_err(|source| RenderError::xml(part, source))?;
                    if let Some((_, current)) = cell.as_mut() {
                        let slot = match target {
                            TextTarget::Value => current.value.as_mut(),
                            TextTarget::Formula => current.formula.as_mut().map(|f| &mut f.text),
                            TextTarget::Inline => current.inline_text.as_mut(),
                            TextTarget::None => None,
                        };
                        if let Some(slot) = slot {
                            slot.push_str(&text);
                        }
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"v" | b"f" | b"t" => target = TextTarget::None,
                    b"c" => {
                        if let (Some((col, done)), Some((_, current))) = (cell.take(), row.as_mut()) {
                            current.cells.insert(col, done);
                        }
                    }
                    b"row" => {
                        if let Some((index, done)) = row.take() {
                            rows.insert(index, done);
                        }
                    }
                    b"sheetData" => {
                        tail = Some(xml[before..].to_vec());
                        break;
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let (Some(head), Some(tail)) = (head, tail) else {
            return Err(RenderError::MalformedSheet(part.to_string()));
        };
        Ok(Self {
            part: part.to_string(),
            head,
            rows,
            tail,
            self_closing,
        })
    }

    pub fn part(&self) -> &str {
        &self.part
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.rows.get(&row)?.cells.get(&col)
    }

    pub fn is_formula(&self, row: u32, col: u32, shared: &[String]) -> bool {
        self.cell(row, col).is_some_and(|c| c.is_formula(shared))
    }

    pub fn holds_text(&self, row: u32, col: u32) -> bool {
        self.cell(row, col).is_some_and(Cell::is_text)
    }

    /// Last row holding any value
    pub fn last_value_row(&self) -> Option<u32> {
        self.rows
            .iter()
            .rev()
            .find(|(_, row)| row.cells.values().any(Cell::has_value))
            .map(|(index, _)| *index)
    }

    /// `(min_row, min_col, max_row, max_col)` over every cell element
    fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (row, data) in &self.rows {
            for col in data.cells.keys() {
                bounds = Some(match bounds {
                    None => (*row, *col, *row, *col),
                    Some((r0, c0, r1, c1)) => (r0.min(*row), c0.min(*col), r1.max(*row), c1.max(*col)),
                });
            }
        }
        bounds
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Replace a cell's value. The style is kept; any formula is dropped.
    pub fn set(&mut self, row: u32, col: u32, write: CellWrite) {
        let exists = self.cell(row, col).is_some();
        let blank = matches!(&write, CellWrite::Blank) || matches!(&write, CellWrite::Text(s) if s.is_empty());
        if blank && !exists {
            return;
        }
        let cell = self.rows.entry(row).or_default().cells.entry(col).or_default();
        cell.clear();
        match write {
            CellWrite::Text(text) if !text.is_empty() => {
                cell.kind = Some("inlineStr".to_string());
                cell.inline_text = Some(text);
            }
            CellWrite::Number(n) => cell.value = Some(format_number(n)),
            CellWrite::Text(_) | CellWrite::Blank => {}
        }
    }

    /// Remove a cell's value, keeping its style. Returns whether anything
    /// was removed.
    pub fn blank(&mut self, row: u32, col: u32) -> bool {
        match self.rows.get_mut(&row).and_then(|r| r.cells.get_mut(&col)) {
            Some(cell) if cell.has_value() => {
                cell.clear();
                true
            }
            _ => false,
        }
    }

    /// Give `to` the row formatting and per-column cell styles of `from`
    pub fn copy_row_style(&mut self, from: u32, to: u32, cols: u32) {
        let Some(template) = self.rows.get(&from).cloned() else {
            return;
        };
        let target = self.rows.entry(to).or_default();
        for (key, value) in &template.attrs {
            if ROW_STYLE_ATTRS.contains(&key.as_str()) && !target.attrs.iter().any(|(k, _)| k == key) {
                target.attrs.push((key.clone(), value.clone()));
            }
        }
        for col in 0..cols {
            if let Some(style) = template.cells.get(&col).and_then(|c| c.style.clone()) {
                target.cells.entry(col).or_default().style = Some(style);
            }
        }
    }

    /// Replace formulas that reference another workbook with their cached
    /// value. Cells of a stripped shared-formula group go with their master.
    pub fn strip_external_formulas(&mut self, shared: &[String]) -> usize {
        let groups: HashSet<String> = self
            .rows
            .values()
            .flat_map(|r| r.cells.values())
            .filter_map(|c| c.formula.as_ref())
            .filter(|f| is_external_reference(&f.text))
            .filter_map(|f| f.shared_index().map(str::to_string))
            .collect();

        let mut stripped = 0;
        for cell in self.rows.values_mut().flat_map(|r| r.cells.values_mut()) {
            let external = match &cell.formula {
                Some(f) => {
                    is_external_reference(&f.text) || f.shared_index().is_some_and(|si| groups.contains(si))
                }
                None => cell
                    .text(shared)
                    .is_some_and(|t| t.starts_with('=') && is_external_reference(t)),
            };
            if !external {
                continue;
            }
            if cell.formula.take().is_some() {
                if cell.kind.as_deref() == Some("str") {
                    cell.kind = Some("inlineStr".to_string());
                    cell.inline_text = Some(cell.value.take().unwrap_or_default());
                }
            } else {
                cell.clear();
            }
            stripped += 1;
        }
        stripped
    }

    /// Widen the `<dimension>` range to cover every cell
    pub fn update_dimension(&mut self) {
        let Some((mut r0, mut c0, mut r1, mut c1)) = self.bounds() else {
            return;
        };
        let Some(found) = dimension_ref().captures(&self.head).and_then(|caps| caps.get(1)) else {
            return;
        };
        let range = found.range();
        let existing = String::from_utf8_lossy(found.as_bytes()).into_owned();
        for corner in existing.split(':').filter_map(parse_cell_ref) {
            r0 = r0.min(corner.0);
            c0 = c0.min(corner.1);
            r1 = r1.max(corner.0);
            c1 = c1.max(corner.1);
        }
        let updated = if (r0, c0) == (r1, c1) {
            cell_ref(r0, c0)
        } else {
            format!("{}:{}", cell_ref(r0, c0), cell_ref(r1, c1))
        };
        if updated != existing {
            let mut head = self.head[..range.start].to_vec();
            head.extend_from_slice(updated.as_bytes());
            head.extend_from_slice(&self.head[range.end..]);
            self.head = head;
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = String::new();
        for (index, row) in &self.rows {
            write_row(&mut body, *index, row);
        }

        let mut out = Vec::with_capacity(self.head.len() + body.len() + self.tail.len() + 24);
        out.extend_from_slice(&self.head);
        if self.self_closing {
            out.extend_from_slice(b"<sheetData>");
        }
        out.extend_from_slice(body.as_bytes());
        if self.self_closing {
            out.extend_from_slice(b"</sheetData>");
        }
        out.extend_from_slice(&self.tail);
        out
    }
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn write_row(out: &mut String, index: u32, row: &Row) {
    out.push_str("<row");
    push_attr(out, "r", &(index + 1).to_string());
    for (key, value) in &row.attrs {
        push_attr(out, key, value);
    }
    if row.cells.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for (col, cell) in &row.cells {
        write_cell(out, index, *col, cell);
    }
    out.push_str("</row>");
}

fn write_cell(out: &mut String, row: u32, col: u32, cell: &Cell) {
    out.push_str("<c");
    push_attr(out, "r", &cell_ref(row, col));
    if let Some(style) = &cell.style {
        push_attr(out, "s", style);
    }
    if let Some(kind) = &cell.kind {
        push_attr(out, "t", kind);
    }
    for (key, value) in &cell.attrs {
        push_attr(out, key, value);
    }
    if !cell.has_value() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(formula) = &cell.formula {
        out.push_str("<f");
        for (key, value) in &formula.attrs {
            push_attr(out, key, value);
        }
        if formula.text.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&escape(formula.text.as_str()));
            out.push_str("</f>");
        }
    }
    if let Some(value) = &cell.value {
        out.push_str("<v>");
        out.push_str(&escape(value.as_str()));
        out.push_str("</v>");
    }
    if let Some(text) = &cell.inline_text {
        let padded = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
        out.push_str(if padded { "<is><t xml:space=\"preserve\">" } else { "<is><t>" });
        out.push_str(&escape(text.as_str()));
        out.push_str("</t></is>");
    }
    out.push_str("</c>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C3"/><sheetViews><sheetView workbookViewId="0"/></sheetViews><cols><col min="1" max="1" width="30" customWidth="1"/></cols><sheetData><row r="1" spans="1:3"><c r="A1" s="2" t="s"><v>0</v></c><c r="B1" s="3"><v>0.5</v></c></row><row r="3" ht="20" customHeight="1"><c r="A3" s="4" t="inlineStr"><is><t>Rail &amp; track</t></is></c><c r="B3"><f>B1*2</f><v>1</v></c><c r="C3" s="5"/></row></sheetData><mergeCells count="1"><mergeCell ref="A5:C5"/></mergeCells></worksheet>"#;

    fn shared() -> Vec<String> {
        vec!["項目".to_string(), "=A1".to_string()]
    }

    #[test]
    fn untouched_parts_survive_verbatim() {
        let sheet = SheetXml::parse(SHEET.as_bytes(), "xl/worksheets/sheet1.xml").unwrap();
        let out = String::from_utf8(sheet.to_bytes()).unwrap();
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(out.contains(r#"<cols><col min="1" max="1" width="30" customWidth="1"/></cols><sheetData>"#));
        assert!(out.ends_with(r#"</sheetData><mergeCells count="1"><mergeCell ref="A5:C5"/></mergeCells></worksheet>"#));
        assert!(out.contains(r#"<c r="A3" s="4" t="inlineStr"><is><t>Rail &amp; track</t></is></c>"#));
        assert!(out.contains(r#"<c r="B3"><f>B1*2</f><v>1</v></c>"#));
        assert!(out.contains(r#"<row r="3" ht="20" customHeight="1">"#));
    }

    #[test]
    fn reparse_is_stable() {
        let sheet = SheetXml::parse(SHEET.as_bytes(), "sheet").unwrap();
        let once = sheet.to_bytes();
        let twice = SheetXml::parse(&once, "sheet").unwrap().to_bytes();
        assert_eq!(String::from_utf8(once).unwrap(), String::from_utf8(twice).unwrap());
    }

    #[test]
    fn set_keeps_style() {
        let mut sheet = SheetXml::parse(SHEET.as_bytes(), "sheet").unwrap();
        sheet.set(0, 1, CellWrite::Number(0.75));
        sheet.set(2, 2, CellWrite::Text("night shift".into()));
        let b1 = sheet.cell(0, 1).unwrap();
        assert_eq!(b1.style.as_deref(), Some("3"));
        assert_eq!(b1.value.as_deref(), Some("0.75"));
        let c3 = sheet.cell(2, 2).unwrap();
        assert_eq!(c3.style.as_deref(), Some("5"));
        assert_eq!(c3.text(&[]), Some("night shift"));
    }

    #[test]
    fn blank_writes_do_not_create_cells() {
        let mut sheet = SheetXml::parse(SHEET.as_bytes(), "sheet").unwrap();
        sheet.set(9, 9, CellWrite::Blank);
        sheet.set(9, 8, CellWrite::Text(String::new()));
        assert!(sheet.cell(9, 9).is_none());
        assert!(sheet.cell(9, 8).is_none());
        assert!(sheet.blank(0, 1));
        assert!(!sheet.blank(0, 1));
        assert_eq!(sheet.cell(0, 1).unwrap().style.as_deref(), Some("3"));
    }

    #[test]
    fn formula_sniffing() {
        let shared = shared();
        let sheet = SheetXml::parse(SHEET.as_bytes(), "sheet").unwrap();
        assert!(sheet.is_formula(2, 1, &shared));
        assert!(!sheet.is_formula(0, 0, &shared));
        assert!(!sheet.is_formula(0, 1, &shared));

        let text_formula = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>1</v></c></row></sheetData></worksheet>"#;
        let sheet = SheetXml::parse(text_formula.as_bytes(), "sheet").unwrap();
        assert!(sheet.is_formula(0, 0, &shared));
    }

    #[test]
    fn external_reference_detection() {
        assert!(is_external_reference("[1]Sheet1!A1"));
        assert!(is_external_reference("SUM('[Plan 2026.xlsx]Bay 3'!B2:B9)"));
        assert!(is_external_reference("=[Other.xlsx]EQ!$C$4+1"));
        assert!(!is_external_reference("B1*2"));
        assert!(!is_external_reference("SUM(軟體時程!E7:E20)"));
        assert!(!is_external_reference("Table1[Done]+Sheet2!A1"));
    }

    #[test]
    fn external_formulas_become_cached_values() {
        let xml = r#"<worksheet><sheetData><row r="1"><c r="A1"><f t="shared" ref="A1:A2" si="0">[1]Data!B1</f><v>4</v></c><c r="B1"><f>A1+1</f><v>5</v></c></row><row r="2"><c r="A2"><f t="shared" si="0"/><v>6</v></c><c r="B2" t="str"><f>[2]Names!A1</f><v>Lin</v></c></row></sheetData></worksheet>"#;
        let mut sheet = SheetXml::parse(xml.as_bytes(), "sheet").unwrap();
        assert_eq!(sheet.strip_external_formulas(&[]), 3);

        let a1 = sheet.cell(0, 0).unwrap();
        assert!(a1.formula.is_none());
        assert_eq!(a1.value.as_deref(), Some("4"));
        assert!(sheet.cell(1, 0).unwrap().formula.is_none());
        assert_eq!(sheet.cell(1, 1).unwrap().text(&[]), Some("Lin"));
        // same-workbook formulas stay
        assert_eq!(sheet.cell(0, 1).unwrap().formula.as_ref().map(|f| f.text.as_str()), Some("A1+1"));
    }

    #[test]
    fn appended_rows_copy_style_and_widen_dimension() {
        let mut sheet = SheetXml::parse(SHEET.as_bytes(), "sheet").unwrap();
        sheet.copy_row_style(2, 5, 3);
        sheet.set(5, 0, CellWrite::Text("new".into()));
        sheet.update_dimension();

        assert_eq!(sheet.cell(5, 0).unwrap().style.as_deref(), Some("4"));
        assert_eq!(sheet.cell(5, 2).unwrap().style.as_deref(), Some("5"));
        assert!(sheet.cell(5, 1).is_none(), "unstyled template cell");
        let out = String::from_utf8(sheet.to_bytes()).unwrap();
        assert!(out.contains(r#"<dimension ref="A1:C6"/>"#));
        assert!(out.contains(r#"<row r="6" ht="20" customHeight="1">"#));
        assert_eq!(sheet.last_value_row(), Some(5));
    }

    #[test]
    fn rows_without_references_are_numbered() {
        let xml = r#"<worksheet><sheetData><row><c><v>1</v></c><c><v>2</v></c></row><row><c t="inlineStr"><is><t> x </t></is></c></row></sheetData></worksheet>"#;
        let sheet = SheetXml::parse(xml.as_bytes(), "sheet").unwrap();
        assert_eq!(sheet.cell(0, 1).unwrap().value.as_deref(), Some("2"));
        let out = String::from_utf8(sheet.to_bytes()).unwrap();
        assert!(out.contains(r#"<c r="A2" t="inlineStr"><is><t xml:space="preserve"> x </t></is></c>"#));
    }

    #[test]
    fn self_closing_sheet_data() {
        let xml = r#"<worksheet><dimension ref="A1"/><sheetData/><pageMargins left="0.7"/></worksheet>"#;
        let mut sheet = SheetXml::parse(xml.as_bytes(), "sheet").unwrap();
        sheet.set(1, 1, CellWrite::Number(3.0));
        sheet.update_dimension();
        let out = String::from_utf8(sheet.to_bytes()).unwrap();
        assert_eq!(
            out,
            r#"<worksheet><dimension ref="A1:B2"/><sheetData><row r="2"><c r="B2"><v>3</v></c></row></sheetData><pageMargins left="0.7"/></worksheet>"#
        );
    }

    #[test]
    fn missing_sheet_data_is_an_error() {
        let err = SheetXml::parse(b"<worksheet/>", "xl/worksheets/sheet9.xml").unwrap_err();
        assert!(matches!(err, RenderError::MalformedSheet(part) if part == "xl/worksheets/sheet9.xml"));
    }
}
