//! Streaming worksheet reader: `<sheetData>` → [`Worksheet`] rows.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use renamer_model::{
    CellContent, CellRef, CellValue, Worksheet, EXCEL_MAX_COLS, EXCEL_MAX_ROWS,
};

use crate::XlsxError;

/// Tracks row and column positions inside `<sheetData>`, filling in omitted `r` attributes.
///
/// Writers may drop `r` on `<row>` and `<c>`; Excel then places each row after the previous one
/// and each cell after the previous cell of the row. Positions past the sheet bounds are
/// rejected, whether written or inferred.
#[derive(Debug, Default)]
pub(crate) struct CellCursor {
    row: u32,
    next_row: u32,
    next_col: u32,
}

impl CellCursor {
    pub(crate) fn enter_row(&mut self, e: &BytesStart<'_>) -> Result<u32, XlsxError> {
        let row = match attr(e, b"r")? {
            Some(r) => {
                let n: u32 = r
                    .trim()
                    .parse()
                    .map_err(|_| XlsxError::Invalid(format!("invalid row number: {r}")))?;
                if n == 0 || n > EXCEL_MAX_ROWS {
                    return Err(XlsxError::Invalid(format!("row number out of range: {n}")));
                }
                n - 1
            }
            None if self.next_row < EXCEL_MAX_ROWS => self.next_row,
            None => {
                return Err(XlsxError::Invalid(format!(
                    "row after row {EXCEL_MAX_ROWS} has no room"
                )))
            }
        };
        self.row = row;
        self.next_row = row + 1;
        self.next_col = 0;
        Ok(row)
    }

    pub(crate) fn enter_cell(&mut self, e: &BytesStart<'_>) -> Result<CellRef, XlsxError> {
        let at = match attr(e, b"r")? {
            Some(r) => CellRef::from_a1(&r)
                .map_err(|err| XlsxError::Invalid(format!("invalid cell reference {r:?}: {err}")))?,
            None if self.next_col < EXCEL_MAX_COLS => CellRef::new(self.row, self.next_col),
            None => {
                return Err(XlsxError::Invalid(format!(
                    "row {}: cell after the last column has no room",
                    self.row + 1
                )))
            }
        };
        self.next_col = at.col + 1;
        Ok(at)
    }
}

pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, XlsxError> {
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    Formula,
    Value,
    Inline,
}

#[derive(Debug)]
struct PendingCell {
    at: CellRef,
    cell_type: Option<String>,
    formula: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

/// Decode one worksheet part. `shared_strings` resolves `t="s"` cells.
pub fn read_worksheet(
    name: &str,
    xml: &str,
    shared_strings: &[String],
) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new(name);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut cursor = CellCursor::default();
    let mut in_sheet_data = false;
    let mut cell: Option<PendingCell> = None;
    let mut target = TextTarget::None;
    // Depth of `<rPh>` nesting inside an inline string; phonetic text is not displayed.
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = true,
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = false,
            Event::Start(e) | Event::Empty(e)
                if in_sheet_data && e.local_name().as_ref() == b"row" =>
            {
                cursor.enter_row(&e)?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                cell = Some(PendingCell {
                    at: cursor.enter_cell(&e)?,
                    cell_type: attr(&e, b"t")?,
                    formula: None,
                    value: None,
                    inline: None,
                });
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                cursor.enter_cell(&e)?;
            }
            Event::Start(e) => {
                if let Some(pending) = cell.as_mut() {
                    match e.local_name().as_ref() {
                        b"f" => {
                            pending.formula = Some(String::new());
                            target = TextTarget::Formula;
                        }
                        b"v" => {
                            pending.value = Some(String::new());
                            target = TextTarget::Value;
                        }
                        b"is" => pending.inline = Some(String::new()),
                        b"rPh" => phonetic_depth += 1,
                        b"t" if pending.inline.is_some() && phonetic_depth == 0 => {
                            target = TextTarget::Inline;
                        }
                        _ => {}
                    }
                }
            }
            Event::Empty(e) => {
                if let Some(pending) = cell.as_mut() {
                    match e.local_name().as_ref() {
                        b"f" => pending.formula = Some(String::new()),
                        b"v" => pending.value = Some(String::new()),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if let Some(pending) = cell.as_mut() {
                    let slot = match target {
                        TextTarget::Formula => pending.formula.as_mut(),
                        TextTarget::Value => pending.value.as_mut(),
                        TextTarget::Inline => pending.inline.as_mut(),
                        TextTarget::None => None,
                    };
                    if let Some(slot) = slot {
                        slot.push_str(&t.unescape()?);
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"f" | b"v" | b"t" => target = TextTarget::None,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"c" if in_sheet_data => {
                    target = TextTarget::None;
                    if let Some(pending) = cell.take() {
                        let at = pending.at;
                        if let Some(content) = finish_cell(pending, shared_strings)? {
                            sheet.set_cell(at, content);
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet)
}

fn finish_cell(
    cell: PendingCell,
    shared_strings: &[String],
) -> Result<Option<CellContent>, XlsxError> {
    let value = decode_value(&cell, shared_strings)?;
    Ok(match cell.formula {
        Some(formula) => Some(CellContent::Formula {
            formula,
            cached: value,
        }),
        None if value.is_empty() => None,
        None => Some(CellContent::Value { value }),
    })
}

fn decode_value(cell: &PendingCell, shared_strings: &[String]) -> Result<CellValue, XlsxError> {
    let at = cell.at;
    let raw = cell.value.as_deref();
    Ok(match (cell.cell_type.as_deref(), raw) {
        (Some("inlineStr"), _) => cell
            .inline
            .clone()
            .map(CellValue::String)
            .unwrap_or_default(),
        (_, None) | (_, Some("")) => CellValue::Empty,
        (Some("s"), Some(raw)) => {
            let idx: usize = raw.trim().parse().map_err(|_| {
                XlsxError::Invalid(format!("{at}: invalid shared string index {raw:?}"))
            })?;
            let text = shared_strings.get(idx).ok_or_else(|| {
                XlsxError::Invalid(format!(
                    "{at}: shared string index {idx} out of range ({} strings)",
                    shared_strings.len()
                ))
            })?;
            CellValue::String(text.clone())
        }
        (Some("b"), Some(raw)) => CellValue::Boolean(raw.trim() == "1"),
        (Some("e"), Some(raw)) => CellValue::Error(raw.to_string()),
        (Some("str") | Some("d"), Some(raw)) => CellValue::String(raw.to_string()),
        (_, Some(raw)) => match raw.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => {
                log::warn!("{at}: non-numeric value {raw:?} kept as text");
                CellValue::String(raw.to_string())
            }
        },
    })
}
