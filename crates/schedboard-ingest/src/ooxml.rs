//! OOXML package access
//!
//! calamine yields cell values only. Fill colours (a hierarchy signal),
//! embedded layout images and the raw worksheet parts needed by the writer
//! are read straight from the zip package:
//!
//! - `xl/workbook.xml` + `xl/_rels/workbook.xml.rels` → sheet name to part path
//! - `xl/styles.xml` → `cellXfs` index → solid fill colour, with `indexed`
//!   colours looked up in the palette and `theme` colours in `xl/theme/*`
//! - `xl/worksheets/sheetN.xml` → cell style indices
//! - sheet rels → drawing → drawing rels → `xl/media/*`

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use schedboard_core::hierarchy::Rgb;
use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const STYLES_PART: &str = "xl/styles.xml";
pub const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

#[derive(Debug, Error)]
pub enum OoxmlError {
    #[error("invalid zip package: {0}")]
    Zip(#[from] ZipError),

    #[error("invalid XML in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("cannot read part {part}: {source}")]
    Io {
        part: String,
        #[source]
        source: std::io::Error,
    },

    #[error("package has no part {0}")]
    MissingPart(String),
}

fn xml_error(part: &str) -> impl FnOnce(quick_xml::Error) -> OoxmlError + '_ {
    move |source| OoxmlError::Xml {
        part: part.to_string(),
        source,
    }
}

// ============================================================================
// Cell References
// ============================================================================

/// Parse an A1-style reference into 0-based (row, col). `$` anchors are
/// ignored.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let cleaned: String = cell_ref.chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .try_fold(0u32, |acc, c| {
            acc.checked_mul(26)?
                .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        })?
        .checked_sub(1)?;
    let row = digits.parse::<u32>().ok()?.checked_sub(1)?;
    Some((row, col))
}

/// Column letters for a 0-based column index
pub fn column_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1-style reference for a 0-based coordinate
pub fn cell_ref(row: u32, col: u32) -> String {
    format!("{}{}", column_letters(col), row + 1)
}

// ============================================================================
// Part Paths
// ============================================================================

/// Relationship part for a package part:
/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target relative to the part that owns it
pub fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match base_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// ============================================================================
// Relationships
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Full relationship type URI
    pub rel_type: String,
    /// Target resolved to a package path (left as-is for external targets)
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Match on the last segment of the type URI (`worksheet`, `drawing`, ...)
    pub fn is_kind(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

fn parse_relationships(xml: &[u8], part: &str, base_part: &str) -> Result<Vec<Relationship>, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error(part))? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = String::new();
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut external = false;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value().map_err(xml_error(part))?.to_string();
                    match attr.key.local_name().as_ref() {
                        b"Id" => id = value,
                        b"Type" => rel_type = value,
                        b"Target" => target = value,
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }
                let target = if external {
                    target
                } else {
                    resolve_target(base_part, &target)
                };
                rels.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

// ============================================================================
// Workbook Parts
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    /// Worksheet part path, e.g. `xl/worksheets/sheet1.xml`
    pub path: String,
}

fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, String)>, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error(WORKBOOK_PART))? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = String::new();
                let mut rid = String::new();
                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"name" => name = attr.unescape_value().map_err(xml_error(WORKBOOK_PART))?.to_string(),
                        b"id" => rid = attr.unescape_value().map_err(xml_error(WORKBOOK_PART))?.to_string(),
                        _ => {}
                    }
                }
                sheets.push((name, rid));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(sheets)
}

// ============================================================================
// Fill Colours
// ============================================================================

/// The legacy 64-entry palette behind `indexed` colours, as `0xRRGGBB`
const DEFAULT_PALETTE: [u32; 64] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993366, 0x333399, 0x333333,
];

const fn palette_rgb(value: u32) -> Rgb {
    Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

/// A `fgColor` as written, before palette or theme lookup
#[derive(Clone, Copy, Debug, PartialEq)]
enum ColorRef {
    Rgb(Rgb),
    Indexed(usize),
    Theme { index: usize, tint: f64 },
}

impl ColorRef {
    fn from_attrs(e: &quick_xml::events::BytesStart<'_>) -> Option<Self> {
        let mut rgb = None;
        let mut indexed = None;
        let mut theme = None;
        let mut tint = 0.0;
        for attr in e.attributes().flatten() {
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            match attr.key.local_name().as_ref() {
                b"rgb" => rgb = Rgb::from_hex(&value),
                b"indexed" => indexed = value.trim().parse::<usize>().ok(),
                b"theme" => theme = value.trim().parse::<usize>().ok(),
                b"tint" => tint = value.trim().parse::<f64>().unwrap_or(0.0),
                _ => {}
            }
        }
        rgb.map(ColorRef::Rgb)
            .or_else(|| theme.map(|index| ColorRef::Theme { index, tint }))
            .or_else(|| indexed.map(ColorRef::Indexed))
    }
}

/// Lighten (positive) or darken (negative) each channel by `tint`
fn apply_tint(rgb: Rgb, tint: f64) -> Rgb {
    let shade = |c: u8| {
        let c = f64::from(c);
        let v = if tint < 0.0 { c * (1.0 + tint) } else { c + (255.0 - c) * tint };
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgb::new(shade(rgb.r), shade(rgb.g), shade(rgb.b))
}

/// Fill colours of `styles.xml`, one per `cellXfs` entry
#[derive(Clone, Debug, Default, PartialEq)]
struct StyleFills {
    xf_fills: Vec<Option<ColorRef>>,
    /// `<indexedColors>` override of the default palette
    indexed: Vec<Option<Rgb>>,
}

impl StyleFills {
    fn indexed_color(&self, index: usize) -> Option<Rgb> {
        if self.indexed.is_empty() {
            DEFAULT_PALETTE.get(index).map(|v| palette_rgb(*v))
        } else {
            self.indexed.get(index).copied().flatten()
        }
    }

    /// Concrete colours; `theme` is the colour scheme in theme index order
    fn resolve(&self, theme: &[Rgb]) -> Vec<Option<Rgb>> {
        self.xf_fills
            .iter()
            .map(|color| {
                let resolved = match (*color)? {
                    ColorRef::Rgb(rgb) => Some(rgb),
                    ColorRef::Indexed(index) => self.indexed_color(index),
                    ColorRef::Theme { index, tint } => theme.get(index).map(|rgb| apply_tint(*rgb, tint)),
                };
                if resolved.is_none() {
                    debug!(color = ?color, "fill colour not resolvable; ignored as a hierarchy signal");
                }
                resolved
            })
            .collect()
    }
}

fn parse_style_fills(xml: &[u8]) -> Result<StyleFills, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut fills: Vec<Option<ColorRef>> = Vec::new();
    let mut styles = StyleFills::default();
    let mut in_fills = false;
    let mut in_cell_xfs = false;
    let mut in_indexed = false;
    let mut current_fill: Option<Option<ColorRef>> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error(STYLES_PART))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"fills" => in_fills = !is_empty,
                    b"cellXfs" => in_cell_xfs = !is_empty,
                    b"indexedColors" => in_indexed = !is_empty,
                    b"fill" if in_fills => {
                        if is_empty {
                            fills.push(None);
                        } else {
                            current_fill = Some(None);
                        }
                    }
                    b"fgColor" if in_fills => {
                        if let Some(fill) = current_fill.as_mut() {
                            *fill = ColorRef::from_attrs(e);
                        }
                    }
                    b"rgbColor" if in_indexed => {
                        let rgb = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.local_name().as_ref() == b"rgb")
                            .and_then(|a| a.unescape_value().ok())
                            .and_then(|v| Rgb::from_hex(&v));
                        styles.indexed.push(rgb);
                    }
                    b"xf" if in_cell_xfs => {
                        let fill_id = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.local_name().as_ref() == b"fillId")
                            .and_then(|a| a.unescape_value().ok())
                            .and_then(|v| v.parse::<usize>().ok())
                            .unwrap_or(0);
                        styles.xf_fills.push(fills.get(fill_id).copied().flatten());
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"fills" => in_fills = false,
                b"cellXfs" => in_cell_xfs = false,
                b"indexedColors" => in_indexed = false,
                b"fill" => {
                    if let Some(fill) = current_fill.take() {
                        fills.push(fill);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(styles)
}

/// Theme colour scheme, reordered to the indices `theme="N"` refers to:
/// light 1, dark 1, light 2, dark 2, accents 1-6, hyperlink, followed link
fn parse_theme_colors(xml: &[u8], part: &str) -> Result<Vec<Rgb>, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut scheme = Vec::new();
    let mut in_scheme = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error(part))? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"clrScheme" => in_scheme = true,
                name @ (b"srgbClr" | b"sysClr") if in_scheme => {
                    let key: &[u8] = if name == b"srgbClr" { b"val" } else { b"lastClr" };
                    let rgb = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.local_name().as_ref() == key)
                        .and_then(|a| a.unescape_value().ok())
                        .and_then(|v| Rgb::from_hex(&v))
                        .unwrap_or(Rgb::new(0, 0, 0));
                    scheme.push(rgb);
                }
                _ => {}
            },
            Event::End(ref e) if e.local_name().as_ref() == b"clrScheme" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if scheme.len() >= 4 {
        scheme.swap(0, 1);
        scheme.swap(2, 3);
    }
    Ok(scheme)
}

/// `(row, col, xf index)` for every styled cell in a worksheet
fn parse_cell_styles(xml: &[u8], part: &str) -> Result<Vec<(u32, u32, usize)>, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut styles = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error(part))? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                let mut pos = None;
                let mut xf = None;
                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"r" => pos = attr.unescape_value().ok().and_then(|v| parse_cell_ref(&v)),
                        b"s" => xf = attr.unescape_value().ok().and_then(|v| v.parse::<usize>().ok()),
                        _ => {}
                    }
                }
                if let (Some((row, col)), Some(xf)) = (pos, xf) {
                    styles.push((row, col, xf));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(styles)
}

/// Relationship ids of pictures in a drawing part, in drawing order
fn parse_drawing_embeds(xml: &[u8], part: &str) -> Result<Vec<String>, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut embeds = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error(part))? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"blip" => {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"embed" {
                        embeds.push(attr.unescape_value().map_err(xml_error(part))?.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(embeds)
}

/// Text of each `<si>` entry in the shared string table
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, OoxmlError> {
    let mut reader = XmlReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error(SHARED_STRINGS_PART))? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(ref t) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape().map_err(xml_error(SHARED_STRINGS_PART))?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

// ============================================================================
// Package
// ============================================================================

/// Solid fill colour per styled cell, keyed by 0-based (row, col)
pub type FillMap = HashMap<(u32, u32), Rgb>;

/// A picture embedded in a sheet's drawing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutImage {
    /// Media part path, e.g. `xl/media/image1.png`
    pub part: String,
    pub bytes: Vec<u8>,
}

impl LayoutImage {
    /// File extension of the media part
    pub fn extension(&self) -> &str {
        self.part.rsplit_once('.').map_or("", |(_, ext)| ext)
    }
}

/// Read access to the parts of an xlsx package
pub struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    pub fn open(bytes: &'a [u8]) -> Result<Self, OoxmlError> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(bytes))?,
        })
    }

    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn has_part(&self, part: &str) -> bool {
        self.archive.file_names().any(|name| name == part)
    }

    pub fn read_part(&mut self, part: &str) -> Result<Vec<u8>, OoxmlError> {
        self.read_optional(part)?
            .ok_or_else(|| OoxmlError::MissingPart(part.to_string()))
    }

    pub fn read_optional(&mut self, part: &str) -> Result<Option<Vec<u8>>, OoxmlError> {
        let mut file = match self.archive.by_name(part) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes).map_err(|source| OoxmlError::Io {
            part: part.to_string(),
            source,
        })?;
        Ok(Some(bytes))
    }

    /// Relationships owned by `part`; a part without a rels file has none
    pub fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>, OoxmlError> {
        let rels_part = rels_path_for(part);
        match self.read_optional(&rels_part)? {
            Some(xml) => parse_relationships(&xml, &rels_part, part),
            None => Ok(Vec::new()),
        }
    }

    /// Sheets in workbook order with their worksheet part paths
    pub fn sheets(&mut self) -> Result<Vec<SheetEntry>, OoxmlError> {
        let workbook = self.read_part(WORKBOOK_PART)?;
        let rels = self.relationships(WORKBOOK_PART)?;
        let by_id: HashMap<&str, &Relationship> = rels.iter().map(|r| (r.id.as_str(), r)).collect();

        Ok(parse_workbook_sheets(&workbook)?
            .into_iter()
            .filter_map(|(name, rid)| {
                let rel = by_id.get(rid.as_str())?;
                Some(SheetEntry {
                    name,
                    path: rel.target.clone(),
                })
            })
            .collect())
    }

    pub fn sheet_path(&mut self, name: &str) -> Result<Option<String>, OoxmlError> {
        Ok(self.sheets()?.into_iter().find(|s| s.name == name).map(|s| s.path))
    }

    /// Shared string table; empty when the package has none
    pub fn shared_strings(&mut self) -> Result<Vec<String>, OoxmlError> {
        match self.read_optional(SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings(&xml),
            None => Ok(Vec::new()),
        }
    }

    /// Colour scheme of the workbook theme; empty when there is none
    fn theme_colors(&mut self) -> Result<Vec<Rgb>, OoxmlError> {
        let Some(theme) = self.relationships(WORKBOOK_PART)?.into_iter().find(|r| r.is_kind("theme") && !r.external)
        else {
            return Ok(Vec::new());
        };
        match self.read_optional(&theme.target)? {
            Some(xml) => parse_theme_colors(&xml, &theme.target),
            None => Ok(Vec::new()),
        }
    }

    /// Solid fill colours of every cell in the worksheet part
    pub fn fill_map(&mut self, sheet_part: &str) -> Result<FillMap, OoxmlError> {
        let Some(styles) = self.read_optional(STYLES_PART)? else {
            return Ok(FillMap::new());
        };
        let theme = self.theme_colors()?;
        let xf_fills = parse_style_fills(&styles)?.resolve(&theme);
        let sheet = self.read_part(sheet_part)?;

        let mut fills = FillMap::new();
        for (row, col, xf) in parse_cell_styles(&sheet, sheet_part)? {
            if let Some(Some(rgb)) = xf_fills.get(xf) {
                fills.insert((row, col), *rgb);
            }
        }
        Ok(fills)
    }

    /// Pictures anchored in the worksheet's drawings
    pub fn images(&mut self, sheet_part: &str) -> Result<Vec<LayoutImage>, OoxmlError> {
        let mut images = Vec::new();
        let drawings: Vec<_> = self
            .relationships(sheet_part)?
            .into_iter()
            .filter(|r| r.is_kind("drawing") && !r.external)
            .collect();

        for drawing in drawings {
            let xml = self.read_part(&drawing.target)?;
            let rels = self.relationships(&drawing.target)?;
            for embed in parse_drawing_embeds(&xml, &drawing.target)? {
                let Some(rel) = rels.iter().find(|r| r.id == embed && r.is_kind("image") && !r.external) else {
                    continue;
                };
                if let Some(bytes) = self.read_optional(&rel.target)? {
                    images.push(LayoutImage {
                        part: rel.target.clone(),
                        bytes,
                    });
                }
            }
        }
        Ok(images)
    }
}
