use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::session::ExportedFile;

/// Archive name used when the caller does not pick one.
pub const DEFAULT_ARCHIVE_NAME: &str = "modified_excel_files.zip";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Zip the renamed workbooks, one entry per file.
///
/// Entries keep the original file names; repeated names get a ` (2)`, ` (3)`, ... suffix before the
/// extension.
pub fn bundle_outputs<'a>(
    files: impl IntoIterator<Item = &'a ExportedFile>,
) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

    let mut used = HashSet::new();
    for file in files {
        let entry = unique_entry_name(&file.file_name, &mut used);
        log::debug!("adding {entry} to archive ({} bytes)", file.bytes.len());
        zip.start_file(entry.as_str(), options)?;
        zip.write_all(&file.bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

pub(crate) fn unique_entry_name(file_name: &str, used: &mut HashSet<String>) -> String {
    // Only the final path component goes into the archive.
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("workbook.xlsx");

    if used.insert(base.to_ascii_lowercase()) {
        return base.to_string();
    }
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };
    (2..)
        .map(|n| match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        })
        .find(|candidate| used.insert(candidate.to_ascii_lowercase()))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_numbered() {
        let mut used = HashSet::new();
        assert_eq!(unique_entry_name("dir/Budget.xlsx", &mut used), "Budget.xlsx");
        assert_eq!(unique_entry_name("other/budget.xlsx", &mut used), "budget (2).xlsx");
        assert_eq!(unique_entry_name("Budget.xlsx", &mut used), "Budget (3).xlsx");
        assert_eq!(unique_entry_name("README", &mut used), "README");
        assert_eq!(unique_entry_name("README", &mut used), "README (2)");
    }
}
