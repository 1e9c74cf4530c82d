//! In-place worksheet patching: replace the text of selected `<f>` elements and copy every other
//! event through unchanged.

use std::collections::HashMap;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use renamer_model::CellRef;

use crate::read::CellCursor;
use crate::XlsxError;

/// Replace the formula text of each cell in `formulas`, keyed by position.
///
/// Attributes on `<f>` (shared/array metadata) are kept. Cells that are not listed, and `<f>`
/// elements outside `<sheetData>` cells, are written back as they were read.
pub fn patch_worksheet_formulas(
    xml: &str,
    formulas: &HashMap<CellRef, String>,
) -> Result<Vec<u8>, XlsxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();

    let mut cursor = CellCursor::default();
    let mut in_sheet_data = false;
    // Replacement text for the cell currently open, if it has one.
    let mut pending: Option<&str> = None;
    let mut in_formula = false;
    let mut patched = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match &event {
            Event::Eof => break,
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = true,
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = false,
            Event::Start(e) | Event::Empty(e)
                if in_sheet_data && e.local_name().as_ref() == b"row" =>
            {
                cursor.enter_row(e)?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                let at = cursor.enter_cell(e)?;
                pending = formulas.get(&at).map(String::as_str);
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                cursor.enter_cell(e)?;
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"c" => pending = None,
            _ => {}
        }

        match (&event, pending) {
            (Event::Start(e), Some(text)) if e.local_name().as_ref() == b"f" => {
                writer.write_event(event.borrow())?;
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
                in_formula = true;
                patched += 1;
            }
            (Event::Empty(e), Some(text)) if e.local_name().as_ref() == b"f" => {
                let end = e.to_end().into_owned();
                writer.write_event(Event::Start(e.borrow()))?;
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
                writer.write_event(Event::End(end))?;
                patched += 1;
            }
            (Event::End(e), _) if in_formula && e.local_name().as_ref() == b"f" => {
                in_formula = false;
                writer.write_event(event.borrow())?;
            }
            (Event::Text(_) | Event::CData(_), _) if in_formula => {}
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    if patched != formulas.len() {
        return Err(XlsxError::Invalid(format!(
            "expected to patch {} formulas, found {patched}",
            formulas.len()
        )));
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1"><f>Data!A1*2</f><v>4</v></c><c r="B1"><f>Data!B1</f><v>1</v></c></row>
    <row><c><f t="shared" ref="A2:A3" si="0">Data!C1&amp;"x"</f><v>0</v></c><c t="s"><v>0</v></c></row>
  </sheetData>
</worksheet>"#;

    #[test]
    fn replaces_only_listed_formulas() {
        let mut formulas = HashMap::new();
        formulas.insert(CellRef::new(0, 0), "'Q1.01 Data'!A1*2".to_string());
        formulas.insert(CellRef::new(1, 0), "'Q1.01 Data'!C1&\"x\"".to_string());

        let out = String::from_utf8(patch_worksheet_formulas(SHEET, &formulas).unwrap()).unwrap();

        assert!(out.contains(r#"<c r="A1"><f>'Q1.01 Data'!A1*2</f><v>4</v></c>"#), "{out}");
        assert!(out.contains(r#"<c r="B1"><f>Data!B1</f><v>1</v></c>"#), "{out}");
        assert!(
            out.contains(r#"<f t="shared" ref="A2:A3" si="0">'Q1.01 Data'!C1&amp;"x"</f>"#),
            "{out}"
        );
    }

    #[test]
    fn no_patches_is_byte_identical() {
        let out = patch_worksheet_formulas(SHEET, &HashMap::new()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), SHEET);
    }

    #[test]
    fn unmatched_patch_is_reported() {
        let mut formulas = HashMap::new();
        formulas.insert(CellRef::new(9, 9), "1".to_string());
        let err = patch_worksheet_formulas(SHEET, &formulas).unwrap_err();
        assert!(matches!(err, XlsxError::Invalid(_)));
    }
}
