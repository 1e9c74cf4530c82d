//! Sheet title constraints.
//!
//! [`sanitize_sheet_name`] is the only transformation the rename engine applies to proposed
//! titles. [`validate_sheet_name`] is an opt-in check for callers that want to reject titles the
//! `.xlsx` format would refuse; the engine itself never calls it.

/// Hard limit on the length of a sheet title, in characters.
pub const EXCEL_MAX_SHEET_NAME_LEN: usize = 31;

/// Characters that may not appear anywhere in a sheet title.
pub const FORBIDDEN_SHEET_NAME_CHARS: [char; 7] = ['\\', '/', '?', '*', '[', ']', ':'];

/// Truncate `name` to at most [`EXCEL_MAX_SHEET_NAME_LEN`] characters.
///
/// Truncation is silent and keeps the leftmost characters. No other normalization happens:
/// forbidden characters pass through unchanged.
pub fn sanitize_sheet_name(name: &str) -> String {
    match name.char_indices().nth(EXCEL_MAX_SHEET_NAME_LEN) {
        Some((cut, _)) => name[..cut].to_string(),
        None => name.to_string(),
    }
}

/// Reasons a sheet title is rejected by [`validate_sheet_name`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SheetNameError {
    #[error("sheet name cannot be blank")]
    Empty,
    #[error("sheet name cannot exceed {max} characters (got {len})")]
    TooLong { len: usize, max: usize },
    #[error("sheet name contains invalid character `{0}`")]
    InvalidCharacter(char),
    #[error("sheet name cannot begin or end with an apostrophe")]
    LeadingOrTrailingApostrophe,
}

/// Check `name` against the `.xlsx` title rules.
pub fn validate_sheet_name(name: &str) -> Result<(), SheetNameError> {
    if name.trim().is_empty() {
        return Err(SheetNameError::Empty);
    }

    let len = name.chars().count();
    if len > EXCEL_MAX_SHEET_NAME_LEN {
        return Err(SheetNameError::TooLong {
            len,
            max: EXCEL_MAX_SHEET_NAME_LEN,
        });
    }

    if let Some(ch) = name.chars().find(|c| FORBIDDEN_SHEET_NAME_CHARS.contains(c)) {
        return Err(SheetNameError::InvalidCharacter(ch));
    }

    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(SheetNameError::LeadingOrTrailingApostrophe);
    }

    Ok(())
}
