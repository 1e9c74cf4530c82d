use serde::{Deserialize, Serialize};

/// A workbook- or sheet-scoped defined name (named range / constant / formula).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DefinedName {
    pub name: String,
    /// Index of the owning sheet for sheet-scoped names (`localSheetId` in `.xlsx`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_sheet_id: Option<u32>,
    /// Definition formula, stored without a leading `=`.
    pub refers_to: String,
}

impl DefinedName {
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_sheet_id: None,
            refers_to: refers_to.into(),
        }
    }
}
