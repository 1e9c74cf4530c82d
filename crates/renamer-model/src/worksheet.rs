use serde::{Deserialize, Serialize};

use crate::{Cell, CellContent, CellRef};

/// An ordered run of stored cells sharing a row index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// 0-indexed row.
    pub index: u32,
    /// Cells in ascending column order.
    #[serde(default)]
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }
}

/// A worksheet: a title plus a sparse grid of rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    /// Sheet (tab) title.
    pub name: String,
    /// Rows in ascending index order.
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Look up a stored cell.
    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        let row = self.rows.iter().find(|r| r.index == at.row)?;
        row.cells.iter().find(|c| c.col == at.col)
    }

    /// Formula text stored at `at`, if any.
    pub fn formula(&self, at: CellRef) -> Option<&str> {
        self.cell(at).and_then(Cell::formula_text)
    }

    /// Insert or replace the content at `at`, keeping rows and cells ordered.
    pub fn set_cell(&mut self, at: CellRef, content: CellContent) {
        let row_pos = match self.rows.binary_search_by_key(&at.row, |r| r.index) {
            Ok(pos) => pos,
            Err(pos) => {
                self.rows.insert(pos, Row::new(at.row));
                pos
            }
        };
        let row = &mut self.rows[row_pos];
        match row.cells.binary_search_by_key(&at.col, |c| c.col) {
            Ok(pos) => row.cells[pos].content = content,
            Err(pos) => row.cells.insert(
                pos,
                Cell {
                    col: at.col,
                    content,
                },
            ),
        }
    }

    /// Convenience for building sheets in tests and importers.
    pub fn set_formula_a1(
        &mut self,
        a1: &str,
        formula: impl Into<String>,
    ) -> Result<(), crate::A1ParseError> {
        let at = CellRef::from_a1(a1)?;
        self.set_cell(
            at,
            CellContent::Formula {
                formula: formula.into(),
                cached: Default::default(),
            },
        );
        Ok(())
    }

    /// Iterate every formula cell with its position, in row-major order.
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellRef, &str)> {
        self.rows.iter().flat_map(|row| {
            row.cells.iter().filter_map(move |cell| {
                cell.formula_text()
                    .map(|f| (CellRef::new(row.index, cell.col), f))
            })
        })
    }

    pub(crate) fn formula_cells_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.rows
            .iter_mut()
            .flat_map(|row| row.cells.iter_mut().filter_map(Cell::formula_mut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellValue;

    #[test]
    fn set_cell_keeps_rows_and_columns_sorted() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_cell(
            CellRef::new(4, 2),
            CellContent::Value {
                value: CellValue::Number(1.0),
            },
        );
        sheet.set_formula_a1("B1", "Data!C5+1").unwrap();
        sheet.set_formula_a1("A1", "1").unwrap();

        let rows: Vec<u32> = sheet.rows.iter().map(|r| r.index).collect();
        assert_eq!(rows, vec![0, 4]);
        let cols: Vec<u32> = sheet.rows[0].cells.iter().map(|c| c.col).collect();
        assert_eq!(cols, vec![0, 1]);

        let formulas: Vec<_> = sheet.formula_cells().collect();
        assert_eq!(
            formulas,
            vec![(CellRef::new(0, 0), "1"), (CellRef::new(0, 1), "Data!C5+1")]
        );
    }

    #[test]
    fn set_cell_replaces_existing_content() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_formula_a1("A1", "1+1").unwrap();
        sheet.set_formula_a1("A1", "2+2").unwrap();
        assert_eq!(sheet.formula(CellRef::new(0, 0)), Some("2+2"));
        assert_eq!(sheet.rows[0].cells.len(), 1);
    }
}
