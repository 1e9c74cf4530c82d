//! `xl/workbook.xml`: sheet entries and defined names, read and patched in place.

use std::collections::HashMap;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use renamer_model::DefinedName;

use crate::openxml::local_name;
use crate::XlsxError;

/// One `<sheet>` entry of the workbook part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookSheetInfo {
    pub name: String,
    pub sheet_id: u32,
    /// Relationship id (`r:id`) pointing at the worksheet part.
    pub rel_id: String,
}

/// Everything the renamer needs from `xl/workbook.xml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookMetadata {
    pub sheets: Vec<WorkbookSheetInfo>,
    pub defined_names: Vec<DefinedName>,
}

pub fn parse_workbook_metadata(workbook_xml: &str) -> Result<WorkbookMetadata, XlsxError> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut meta = WorkbookMetadata::default();
    // Defined name whose text is being collected.
    let mut current: Option<DefinedName> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                meta.sheets.push(parse_sheet_element(&e)?);
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                current = Some(parse_defined_name_element(&e)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"definedName" => {
                meta.defined_names.push(parse_defined_name_element(&e)?);
            }
            Event::Text(t) => {
                if let Some(name) = current.as_mut() {
                    name.refers_to.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(name) = current.as_mut() {
                    let text = std::str::from_utf8(&t)
                        .map_err(|_| XlsxError::Utf8("xl/workbook.xml".to_string()))?;
                    name.refers_to.push_str(text);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                if let Some(name) = current.take() {
                    meta.defined_names.push(name);
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if meta.sheets.is_empty() {
        return Err(XlsxError::Invalid("workbook has no sheets".to_string()));
    }
    Ok(meta)
}

fn parse_sheet_element(e: &BytesStart<'_>) -> Result<WorkbookSheetInfo, XlsxError> {
    let mut name = None;
    let mut sheet_id = None;
    let mut rel_id = None;

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"name" => name = Some(attr.unescape_value()?.into_owned()),
            b"sheetId" => {
                let v = attr.unescape_value()?;
                sheet_id = Some(
                    v.trim()
                        .parse::<u32>()
                        .map_err(|_| XlsxError::Invalid(format!("invalid sheetId: {v}")))?,
                );
            }
            key if local_name(key) == b"id" => rel_id = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }

    Ok(WorkbookSheetInfo {
        name: name.ok_or(XlsxError::MissingAttr("name"))?,
        sheet_id: sheet_id.ok_or(XlsxError::MissingAttr("sheetId"))?,
        rel_id: rel_id.ok_or(XlsxError::MissingAttr("r:id"))?,
    })
}

fn parse_defined_name_element(e: &BytesStart<'_>) -> Result<DefinedName, XlsxError> {
    let mut name = None;
    let mut local_sheet_id = None;
    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"name" => name = Some(attr.unescape_value()?.into_owned()),
            b"localSheetId" => local_sheet_id = attr.unescape_value()?.trim().parse().ok(),
            _ => {}
        }
    }
    let mut defined = DefinedName::new(name.ok_or(XlsxError::MissingAttr("name"))?, "");
    defined.local_sheet_id = local_sheet_id;
    Ok(defined)
}

/// Changes to apply to `xl/workbook.xml`.
///
/// Keys are positions: `sheet_names` by index of `<sheet>` element, `defined_names` by index of
/// `<definedName>` element, both in document order.
#[derive(Debug, Default)]
pub struct WorkbookPatch {
    pub sheet_names: HashMap<usize, String>,
    pub defined_names: HashMap<usize, String>,
}

impl WorkbookPatch {
    pub fn is_empty(&self) -> bool {
        self.sheet_names.is_empty() && self.defined_names.is_empty()
    }
}

/// Rewrite sheet `name` attributes and defined name text; every other event is copied through.
pub fn patch_workbook_xml(workbook_xml: &str, patch: &WorkbookPatch) -> Result<Vec<u8>, XlsxError> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len()));
    let mut buf = Vec::new();

    let mut sheet_idx = 0usize;
    let mut defined_idx = 0usize;
    // Inside a `<definedName>` whose text is being replaced.
    let mut replacing = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                let renamed = match patch.sheet_names.get(&sheet_idx) {
                    Some(new_name) => Some(with_name_attr(e, new_name)?),
                    None => None,
                };
                sheet_idx += 1;
                match (renamed, &event) {
                    (Some(start), Event::Start(_)) => writer.write_event(Event::Start(start))?,
                    (Some(start), _) => writer.write_event(Event::Empty(start))?,
                    (None, _) => writer.write_event(event.borrow())?,
                }
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"definedName" => {
                writer.write_event(event.borrow())?;
                if let Some(text) = patch.defined_names.get(&defined_idx) {
                    writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(
                        text.as_str(),
                    ))))?;
                    replacing = true;
                }
                defined_idx += 1;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"definedName" => {
                match patch.defined_names.get(&defined_idx) {
                    Some(text) => {
                        let end = e.to_end().into_owned();
                        writer.write_event(Event::Start(e.borrow()))?;
                        writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(
                            text.as_str(),
                        ))))?;
                        writer.write_event(Event::End(end))?;
                    }
                    None => writer.write_event(event.borrow())?,
                }
                defined_idx += 1;
            }
            Event::End(ref e) if e.local_name().as_ref() == b"definedName" => {
                replacing = false;
                writer.write_event(event.borrow())?;
            }
            Event::Text(_) | Event::CData(_) if replacing => {}
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn with_name_attr(e: &BytesStart<'_>, new_name: &str) -> Result<BytesStart<'static>, XlsxError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(tag);
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"name" {
            out.push_attribute(("name", new_name));
        } else {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="R&amp;D" sheetId="4" state="hidden" r:id="rId2"/>
  </sheets>
  <definedNames>
    <definedName name="Totals">Data!$A$1:$A$3</definedName>
    <definedName name="_xlnm.Print_Area" localSheetId="1">'R&amp;D'!$A$1:$B$2</definedName>
  </definedNames>
</workbook>"#;

    #[test]
    fn parses_sheets_and_defined_names() {
        let meta = parse_workbook_metadata(WORKBOOK).unwrap();
        assert_eq!(
            meta.sheets,
            vec![
                WorkbookSheetInfo {
                    name: "Data".into(),
                    sheet_id: 1,
                    rel_id: "rId1".into(),
                },
                WorkbookSheetInfo {
                    name: "R&D".into(),
                    sheet_id: 4,
                    rel_id: "rId2".into(),
                },
            ]
        );
        assert_eq!(meta.defined_names.len(), 2);
        assert_eq!(meta.defined_names[0].refers_to, "Data!$A$1:$A$3");
        assert_eq!(meta.defined_names[1].local_sheet_id, Some(1));
        assert_eq!(meta.defined_names[1].refers_to, "'R&D'!$A$1:$B$2");
    }

    #[test]
    fn missing_sheet_id_is_an_error() {
        let xml = r#"<workbook><sheets><sheet name="A" r:id="rId1"/></sheets></workbook>"#;
        let err = parse_workbook_metadata(xml).unwrap_err();
        assert!(matches!(err, XlsxError::MissingAttr("sheetId")));
    }

    #[test]
    fn workbook_without_sheets_is_invalid() {
        let err = parse_workbook_metadata("<workbook><sheets/></workbook>").unwrap_err();
        assert!(matches!(err, XlsxError::Invalid(_)));
    }

    #[test]
    fn patch_rewrites_only_targeted_entries() {
        let mut patch = WorkbookPatch::default();
        patch.sheet_names.insert(1, "R&D 2024".to_string());
        patch
            .defined_names
            .insert(1, "'R&D 2024'!$A$1:$B$2".to_string());

        let out = patch_workbook_xml(WORKBOOK, &patch).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains(r#"<sheet name="Data" sheetId="1" r:id="rId1"/>"#), "{out}");
        assert!(
            out.contains(r#"<sheet name="R&amp;D 2024" sheetId="4" state="hidden" r:id="rId2"/>"#),
            "{out}"
        );
        assert!(out.contains("<definedName name=\"Totals\">Data!$A$1:$A$3</definedName>"));

        let meta = parse_workbook_metadata(&out).unwrap();
        assert_eq!(meta.sheets[1].name, "R&D 2024");
        assert_eq!(meta.defined_names[1].refers_to, "'R&D 2024'!$A$1:$B$2");
    }

    #[test]
    fn empty_patch_is_byte_identical() {
        let out = patch_workbook_xml(WORKBOOK, &WorkbookPatch::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), WORKBOOK);
    }
}
