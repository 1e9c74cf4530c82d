use std::collections::HashMap;

use renamer_model::{CellRef, Workbook, Worksheet};

use crate::openxml::{
    parse_relationships, rels_part_name, resolve_target, Relationship, REL_TYPE_CHARTSHEET,
    REL_TYPE_SHARED_STRINGS, REL_TYPE_WORKSHEET,
};
use crate::package::{XlsxPackage, XlsxPackageLimits};
use crate::patch::patch_worksheet_formulas;
use crate::read::read_worksheet;
use crate::shared_strings::parse_shared_strings;
use crate::sheet_metadata::{
    parse_workbook_metadata, patch_workbook_xml, WorkbookPatch, WorkbookSheetInfo,
};
use crate::XlsxError;

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// A decoded `.xlsx` workbook that remembers where each sheet came from.
///
/// Edit [`XlsxDocument::workbook`] freely; [`XlsxDocument::to_bytes`] diffs it against the state
/// at load time and patches only sheet titles, defined names and formula text. Adding, removing or
/// reordering sheets is not supported.
///
/// Chartsheets load as empty sheets: their titles take part in renaming but they have no cells.
#[derive(Debug, Clone)]
pub struct XlsxDocument {
    pub workbook: Workbook,
    package: XlsxPackage,
    sheet_parts: Vec<Option<String>>,
    original: Workbook,
}

impl XlsxDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: XlsxPackageLimits) -> Result<Self, XlsxError> {
        let package = XlsxPackage::from_bytes_limited(bytes, limits)?;

        let workbook_xml = package
            .part_str(WORKBOOK_PART)?
            .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
        let meta = parse_workbook_metadata(workbook_xml)?;

        let rels_name = rels_part_name(WORKBOOK_PART);
        let rels = parse_relationships(
            package
                .part(&rels_name)
                .ok_or_else(|| XlsxError::MissingPart(rels_name.clone()))?,
        )?;

        let shared_strings = match rels
            .iter()
            .find(|rel| rel.type_uri == REL_TYPE_SHARED_STRINGS && !rel.is_external())
        {
            Some(rel) => {
                let part = resolve_target(WORKBOOK_PART, &rel.target);
                match package.part_str(&part)? {
                    Some(xml) => parse_shared_strings(xml)?,
                    None => {
                        log::warn!("shared strings part {part} is referenced but missing");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let mut workbook = Workbook::new();
        workbook.defined_names = meta.defined_names;
        let mut sheet_parts = Vec::with_capacity(meta.sheets.len());
        for info in &meta.sheets {
            let Some(part) = worksheet_part(info, &rels)? else {
                log::debug!("sheet {:?} is a chartsheet; no cells to read", info.name);
                workbook.sheets.push(Worksheet::new(&info.name));
                sheet_parts.push(None);
                continue;
            };
            let xml = package
                .part_str(&part)?
                .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;
            let sheet = read_worksheet(&info.name, xml, &shared_strings)?;
            log::debug!(
                "read sheet {:?} from {part} ({} formulas)",
                info.name,
                sheet.formula_cells().count()
            );
            workbook.sheets.push(sheet);
            sheet_parts.push(Some(part));
        }

        Ok(Self {
            original: workbook.clone(),
            workbook,
            package,
            sheet_parts,
        })
    }

    /// Worksheet part name for each sheet, in tab order. `None` for chartsheets.
    pub fn sheet_parts(&self) -> &[Option<String>] {
        &self.sheet_parts
    }

    pub fn package(&self) -> &XlsxPackage {
        &self.package
    }

    /// Encode the workbook, patching the parts whose content changed since load.
    pub fn to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut package = self.package.clone();
        self.patch_package(&mut package)?;
        package.write_to_bytes()
    }

    fn patch_package(&self, package: &mut XlsxPackage) -> Result<(), XlsxError> {
        if self.workbook.sheets.len() != self.original.sheets.len() {
            return Err(XlsxError::Invalid(
                "sheets cannot be added or removed when patching an xlsx document".to_string(),
            ));
        }
        if self.workbook.defined_names.len() != self.original.defined_names.len() {
            return Err(XlsxError::Invalid(
                "defined names cannot be added or removed when patching an xlsx document"
                    .to_string(),
            ));
        }

        let mut wb_patch = WorkbookPatch::default();
        for (idx, (now, before)) in self
            .workbook
            .sheets
            .iter()
            .zip(&self.original.sheets)
            .enumerate()
        {
            if now.name != before.name {
                wb_patch.sheet_names.insert(idx, now.name.clone());
            }
        }
        for (idx, (now, before)) in self
            .workbook
            .defined_names
            .iter()
            .zip(&self.original.defined_names)
            .enumerate()
        {
            if now.refers_to != before.refers_to {
                wb_patch.defined_names.insert(idx, now.refers_to.clone());
            }
        }
        if !wb_patch.is_empty() {
            let xml = package
                .part_str(WORKBOOK_PART)?
                .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
            let patched = patch_workbook_xml(xml, &wb_patch)?;
            package.set_part(WORKBOOK_PART, patched);
        }

        for ((now, before), part) in self
            .workbook
            .sheets
            .iter()
            .zip(&self.original.sheets)
            .zip(&self.sheet_parts)
        {
            let changed = changed_formulas(now, before)?;
            // Sheets without a part have no formulas at load time, so `changed` is empty for them.
            let Some(part) = part.as_ref().filter(|_| !changed.is_empty()) else {
                continue;
            };
            let xml = package
                .part_str(part)?
                .ok_or_else(|| XlsxError::MissingPart(part.clone()))?;
            let patched = patch_worksheet_formulas(xml, &changed)?;
            log::debug!("patched {} formulas in {part}", changed.len());
            package.set_part(part.clone(), patched);
        }

        Ok(())
    }
}

/// Cell part for a sheet: `Some` for worksheets, `None` for chartsheets.
fn worksheet_part(
    info: &WorkbookSheetInfo,
    rels: &[Relationship],
) -> Result<Option<String>, XlsxError> {
    let rel = rels.iter().find(|rel| rel.id == info.rel_id).ok_or_else(|| {
        XlsxError::Invalid(format!(
            "sheet {:?} references unknown relationship {}",
            info.name, info.rel_id
        ))
    })?;
    match rel.type_uri.as_str() {
        REL_TYPE_WORKSHEET => Ok(Some(resolve_target(WORKBOOK_PART, &rel.target))),
        REL_TYPE_CHARTSHEET => Ok(None),
        other => Err(XlsxError::Invalid(format!(
            "sheet {:?} is neither a worksheet nor a chartsheet ({other})",
            info.name
        ))),
    }
}

/// Formula cells whose text differs from the loaded state.
fn changed_formulas(
    now: &Worksheet,
    before: &Worksheet,
) -> Result<HashMap<CellRef, String>, XlsxError> {
    let original: HashMap<CellRef, &str> = before.formula_cells().collect();
    let mut changed = HashMap::new();
    for (at, formula) in now.formula_cells() {
        match original.get(&at) {
            Some(old) if *old == formula => {}
            Some(_) => {
                changed.insert(at, formula.to_string());
            }
            None => {
                return Err(XlsxError::Invalid(format!(
                    "{at} in sheet {:?} was not a formula cell when loaded",
                    now.name
                )))
            }
        }
    }
    Ok(changed)
}
