//! Batch sheet renaming for `.xlsx` workbooks.
//!
//! A [`RenameSession`] holds every workbook being processed together with its prefix and
//! per-sheet overrides. Each file is renamed independently through [`renamer_xlsx::XlsxDocument`],
//! and successful outputs can be bundled into a single zip archive.

mod archive;
pub mod cli;
mod session;

pub use archive::{bundle_outputs, ArchiveError, DEFAULT_ARCHIVE_NAME};
pub use session::{BatchExport, ExportError, ExportedFile, FileId, RenameSession};
