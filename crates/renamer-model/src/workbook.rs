use serde::{Deserialize, Serialize};

use crate::{rename_sheets, DefinedName, RenameError, RenameMapping, RenameSummary, Worksheet};

/// A workbook: ordered worksheets plus workbook-level defined names.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    /// Worksheets in tab order.
    #[serde(default)]
    pub sheets: Vec<Worksheet>,

    /// Defined names (named ranges / constants / formulas).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defined_names: Vec<DefinedName>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty worksheet, returning its index.
    pub fn add_sheet(&mut self, name: impl Into<String>) -> usize {
        self.sheets.push(Worksheet::new(name));
        self.sheets.len() - 1
    }

    /// Sheet titles in tab order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Find a sheet by exact title.
    pub fn sheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Total number of formula cells across all sheets.
    pub fn formula_count(&self) -> usize {
        self.sheets.iter().map(|s| s.formula_cells().count()).sum()
    }

    /// Rename sheets and rewrite formula references; see [`rename_sheets`].
    pub fn rename_sheets(
        &mut self,
        mapping: &RenameMapping,
    ) -> Result<RenameSummary, RenameError> {
        rename_sheets(self, mapping)
    }
}
