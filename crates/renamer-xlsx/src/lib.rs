//! `.xlsx` support for the sheet renamer.
//!
//! [`XlsxDocument`] decodes a workbook into a [`renamer_model::Workbook`] and writes it back by
//! patching the original package: sheet titles in `xl/workbook.xml`, defined name text, and the
//! `<f>` text of formula cells that changed. Every other part is copied through byte-for-byte.

mod document;
pub mod openxml;
mod package;
mod patch;
mod read;
mod shared_strings;
mod sheet_metadata;

pub use document::XlsxDocument;
pub use openxml::{parse_relationships, rels_part_name, resolve_target, Relationship};
pub use package::{
    XlsxError, XlsxPackage, XlsxPackageLimits, MAX_XLSX_PACKAGE_PART_BYTES,
    MAX_XLSX_PACKAGE_TOTAL_BYTES,
};
pub use patch::patch_worksheet_formulas;
pub use read::read_worksheet;
pub use shared_strings::parse_shared_strings;
pub use sheet_metadata::{
    parse_workbook_metadata, patch_workbook_xml, WorkbookMetadata, WorkbookPatch,
    WorkbookSheetInfo,
};

/// Rename the sheets of an `.xlsx` file in one step.
pub fn rename_xlsx_sheets(
    bytes: &[u8],
    mapping: &renamer_model::RenameMapping,
) -> Result<(Vec<u8>, renamer_model::RenameSummary), RenameXlsxError> {
    let mut doc = XlsxDocument::from_bytes(bytes)?;
    let summary = doc.workbook.rename_sheets(mapping)?;
    Ok((doc.to_bytes()?, summary))
}

#[derive(Debug, thiserror::Error)]
pub enum RenameXlsxError {
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
    #[error(transparent)]
    Rename(#[from] renamer_model::RenameError),
}
