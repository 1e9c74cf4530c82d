//! Rewriting sheet references inside formula text.

use std::borrow::Cow;

use regex::Captures;

use crate::{RenameError, RenameMapping, SheetReferenceMatcher};

/// Returns `true` if `name` must be wrapped in quotes when used as a formula reference.
///
/// Quotes are required for names containing whitespace or any of `- + ( ) [ ]`.
pub fn sheet_name_needs_quotes(name: &str) -> bool {
    name.chars()
        .any(|c| c.is_whitespace() || matches!(c, '-' | '+' | '(' | ')' | '[' | ']'))
}

/// Format `name` as a reference prefix, e.g. `Data!` or `'Q1.01 Data'!`.
pub fn format_sheet_reference(name: &str) -> String {
    if sheet_name_needs_quotes(name) {
        format!("'{name}'!")
    } else {
        format!("{name}!")
    }
}

/// Rewrites sheet references according to a [`RenameMapping`].
///
/// The matcher is compiled once from the mapping's original titles, so a single rewriter can be
/// reused for every formula in a workbook.
#[derive(Debug)]
pub struct FormulaRewriter<'m> {
    mapping: &'m RenameMapping,
    matcher: SheetReferenceMatcher,
}

impl<'m> FormulaRewriter<'m> {
    pub fn new(mapping: &'m RenameMapping) -> Result<Self, RenameError> {
        let matcher = SheetReferenceMatcher::compile(mapping.old_names())?;
        Ok(Self { mapping, matcher })
    }

    pub fn matcher(&self) -> &SheetReferenceMatcher {
        &self.matcher
    }

    /// Rewrite every reference to a mapped sheet in `formula`.
    ///
    /// Each match (including its own quotes and the trailing `!`) is replaced by the new name,
    /// re-quoted if needed. References to names missing from the mapping are left as they are.
    /// Returns the input unchanged (borrowed) when nothing matched.
    pub fn rewrite<'f>(&self, formula: &'f str) -> Cow<'f, str> {
        let Some(regex) = self.matcher.regex() else {
            return Cow::Borrowed(formula);
        };
        regex.replace_all(formula, |caps: &Captures<'_>| {
            match self.mapping.get(&caps["name"]) {
                Some(new_name) => format_sheet_reference(new_name),
                None => caps[0].to_string(),
            }
        })
    }
}

/// One-shot form of [`FormulaRewriter::rewrite`].
///
/// Not idempotent in general: with a cyclic mapping (`A -> B`, `B -> A`) a second pass undoes the
/// first.
pub fn rewrite_sheet_names_in_formula(
    formula: &str,
    mapping: &RenameMapping,
) -> Result<String, RenameError> {
    let rewriter = FormulaRewriter::new(mapping)?;
    Ok(rewriter.rewrite(formula).into_owned())
}
