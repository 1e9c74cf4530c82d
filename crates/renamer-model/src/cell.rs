use serde::{Deserialize, Serialize};

use crate::CellValue;

/// What a cell holds: a literal value, or a formula plus its last cached result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellContent {
    Value { value: CellValue },
    Formula {
        /// Formula text as stored by the source format (`.xlsx` omits the leading `=`).
        formula: String,
        #[serde(default)]
        cached: CellValue,
    },
}

/// A single stored cell within a [`crate::Row`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// 0-indexed column.
    pub col: u32,
    pub content: CellContent,
}

impl Cell {
    /// Create a plain-value cell.
    pub fn value(col: u32, value: impl Into<CellValue>) -> Self {
        Self {
            col,
            content: CellContent::Value {
                value: value.into(),
            },
        }
    }

    /// Create a formula cell with an empty cached value.
    pub fn formula(col: u32, formula: impl Into<String>) -> Self {
        Self {
            col,
            content: CellContent::Formula {
                formula: formula.into(),
                cached: CellValue::Empty,
            },
        }
    }

    /// Formula text, if this is a formula cell.
    pub fn formula_text(&self) -> Option<&str> {
        match &self.content {
            CellContent::Formula { formula, .. } => Some(formula),
            CellContent::Value { .. } => None,
        }
    }

    /// Literal value, or the cached result for formula cells.
    pub fn current_value(&self) -> &CellValue {
        match &self.content {
            CellContent::Value { value } => value,
            CellContent::Formula { cached, .. } => cached,
        }
    }

    pub(crate) fn formula_mut(&mut self) -> Option<&mut String> {
        match &mut self.content {
            CellContent::Formula { formula, .. } => Some(formula),
            CellContent::Value { .. } => None,
        }
    }
}
