//! `renamer-model` holds the in-memory workbook model and the sheet renaming engine.
//!
//! The engine renames every worksheet of a [`Workbook`] according to a [`RenameMapping`] and
//! rewrites each sheet-qualified formula reference (`Data!A1`, `'Q1 Data'!A1`) so formulas keep
//! resolving after the rename. File formats live in other crates; this crate never touches bytes.
//!
//! ```
//! use renamer_model::{build_default_mapping, CellRef, Workbook};
//!
//! let mut wb = Workbook::new();
//! wb.add_sheet("Data");
//! wb.add_sheet("Summary");
//! wb.sheets[1].set_formula_a1("A1", "SUM(Data!A1:A3)").unwrap();
//!
//! let mapping = build_default_mapping(wb.sheet_names(), "Q1");
//! wb.rename_sheets(&mapping).unwrap();
//!
//! assert_eq!(wb.sheet_names(), ["Q1.01 Data", "Q1.02 Summary"]);
//! assert_eq!(
//!     wb.sheets[1].formula(CellRef::new(0, 0)),
//!     Some("SUM('Q1.01 Data'!A1:A3)")
//! );
//! ```

mod address;
mod cell;
pub mod formula_rewrite;
mod mapping;
mod names;
pub mod reference;
mod rename;
mod sheet_name;
mod value;
mod workbook;
mod worksheet;

pub use address::{A1ParseError, CellRef, EXCEL_MAX_COLS, EXCEL_MAX_ROWS};
pub use cell::{Cell, CellContent};
pub use formula_rewrite::{
    format_sheet_reference, rewrite_sheet_names_in_formula, sheet_name_needs_quotes,
    FormulaRewriter,
};
pub use mapping::{build_default_mapping, MappingEntry, RenameMapping};
pub use names::DefinedName;
pub use reference::{SheetReference, SheetReferenceMatcher};
pub use rename::{rename_sheets, RenameError, RenameSummary};
pub use sheet_name::{
    sanitize_sheet_name, validate_sheet_name, SheetNameError, EXCEL_MAX_SHEET_NAME_LEN,
    FORBIDDEN_SHEET_NAME_CHARS,
};
pub use value::CellValue;
pub use workbook::Workbook;
pub use worksheet::{Row, Worksheet};
