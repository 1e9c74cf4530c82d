use std::borrow::Cow;

use serde::Serialize;

use crate::{FormulaRewriter, RenameMapping, Workbook};

/// Errors raised by [`rename_sheets`].
#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    /// The mapping's keys are not exactly the workbook's current sheet titles.
    #[error(
        "rename mapping does not match the workbook's sheets (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    MappingMismatch {
        /// Sheet titles with no mapping entry.
        missing: Vec<String>,
        /// Mapping keys that are not sheet titles.
        unexpected: Vec<String>,
    },
    #[error("failed to compile sheet reference pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// What a successful rename changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenameSummary {
    /// Sheets whose title differs from before.
    pub sheets_renamed: usize,
    /// Formula cells whose text changed.
    pub formulas_rewritten: usize,
    /// Defined names whose formula changed.
    pub defined_names_rewritten: usize,
}

/// Rename every sheet of `workbook` per `mapping` and rewrite formula references to match.
///
/// The mapping must contain exactly one entry per current sheet title. Every fallible step (mapping
/// validation, matcher compilation) runs before the first mutation, so on error the workbook is
/// left untouched.
///
/// Formulas are rewritten against the *original* titles. Duplicate new titles are not detected;
/// see [`RenameMapping::collisions`].
pub fn rename_sheets(
    workbook: &mut Workbook,
    mapping: &RenameMapping,
) -> Result<RenameSummary, RenameError> {
    let new_titles = staged_titles(workbook, mapping)?;
    let rewriter = FormulaRewriter::new(mapping)?;

    let mut summary = RenameSummary::default();

    for (sheet, new_title) in workbook.sheets.iter_mut().zip(new_titles) {
        if sheet.name != new_title {
            summary.sheets_renamed += 1;
        }
        sheet.name = new_title;
    }

    for sheet in &mut workbook.sheets {
        for formula in sheet.formula_cells_mut() {
            if apply(&rewriter, formula) {
                summary.formulas_rewritten += 1;
            }
        }
    }

    for name in &mut workbook.defined_names {
        if apply(&rewriter, &mut name.refers_to) {
            summary.defined_names_rewritten += 1;
        }
    }

    Ok(summary)
}

fn apply(rewriter: &FormulaRewriter<'_>, formula: &mut String) -> bool {
    let rewritten = match rewriter.rewrite(formula) {
        Cow::Borrowed(_) => return false,
        Cow::Owned(rewritten) => rewritten,
    };
    let changed = rewritten != *formula;
    *formula = rewritten;
    changed
}

/// New titles in sheet order, or a mismatch error listing both directions of the difference.
fn staged_titles(
    workbook: &Workbook,
    mapping: &RenameMapping,
) -> Result<Vec<String>, RenameError> {
    let mut titles = Vec::with_capacity(workbook.sheets.len());
    let mut missing = Vec::new();
    for sheet in &workbook.sheets {
        match mapping.get(&sheet.name) {
            Some(new_title) => titles.push(new_title.to_string()),
            None => missing.push(sheet.name.clone()),
        }
    }

    let unexpected: Vec<String> = mapping
        .old_names()
        .filter(|old| !workbook.sheets.iter().any(|s| s.name == *old))
        .map(str::to_string)
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        Ok(titles)
    } else {
        Err(RenameError::MappingMismatch {
            missing,
            unexpected,
        })
    }
}
