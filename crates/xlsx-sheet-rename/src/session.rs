use std::collections::BTreeMap;

use renamer_model::{
    build_default_mapping, validate_sheet_name, RenameError, RenameMapping, RenameSummary,
    SheetNameError,
};
use renamer_xlsx::{XlsxDocument, XlsxError};
use serde::Serialize;

use crate::archive::{bundle_outputs, ArchiveError};

/// Stable handle for a file added to a [`RenameSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FileId(u32);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("{file}: not a readable .xlsx workbook: {source}")]
    MalformedInput {
        file: String,
        #[source]
        source: XlsxError,
    },
    #[error("{file}: {source}")]
    Rename {
        file: String,
        #[source]
        source: RenameError,
    },
    #[error("{file}: invalid sheet name {name:?}: {source}")]
    InvalidName {
        file: String,
        name: String,
        #[source]
        source: SheetNameError,
    },
    #[error("{file}: more than one sheet would be named {names:?}")]
    NameCollision { file: String, names: Vec<String> },
    #[error("{file}: has no sheet named {sheet:?}")]
    UnknownSheet { file: String, sheet: String },
    #[error("{file}: failed to write renamed workbook: {source}")]
    Encode {
        file: String,
        #[source]
        source: XlsxError,
    },
    #[error("unknown file id {0}")]
    UnknownFile(FileId),
}

impl ExportError {
    /// Name of the file the error belongs to, if it belongs to one.
    pub fn file(&self) -> Option<&str> {
        match self {
            ExportError::MalformedInput { file, .. }
            | ExportError::Rename { file, .. }
            | ExportError::InvalidName { file, .. }
            | ExportError::NameCollision { file, .. }
            | ExportError::UnknownSheet { file, .. }
            | ExportError::Encode { file, .. } => Some(file),
            ExportError::UnknownFile(_) => None,
        }
    }
}

/// A renamed workbook ready to be written out.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub mapping: RenameMapping,
    pub summary: RenameSummary,
    pub bytes: Vec<u8>,
}

/// Result of [`RenameSession::export_all`].
#[derive(Debug)]
pub struct BatchExport {
    /// One outcome per file, in the order files were added.
    pub outcomes: Vec<(FileId, Result<ExportedFile, ExportError>)>,
    /// Zip archive of every successful output; `None` when nothing succeeded.
    pub archive: Option<Vec<u8>>,
}

impl BatchExport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExportError> {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().err())
    }
}

#[derive(Debug)]
struct SessionFile {
    name: String,
    bytes: Vec<u8>,
    /// Sheet titles read at load time; `None` when the file did not decode.
    titles: Option<Vec<String>>,
    prefix: String,
    overrides: BTreeMap<String, String>,
}

/// The set of workbooks being renamed together, with each file's prefix and per-sheet edits.
///
/// Files never share state: a malformed or rejected file only affects its own outcome. Exports
/// always start from the bytes given to [`RenameSession::add_file`], so exporting twice produces
/// the same output.
#[derive(Debug, Default)]
pub struct RenameSession {
    files: BTreeMap<FileId, SessionFile>,
    next_id: u32,
}

impl RenameSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workbook. Decoding problems are reported when the file is exported.
    pub fn add_file(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> FileId {
        let name = name.into();
        let titles = match XlsxDocument::from_bytes(&bytes) {
            Ok(doc) => Some(
                doc.workbook
                    .sheet_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            ),
            Err(err) => {
                log::warn!("{name}: could not read workbook: {err}");
                None
            }
        };

        let id = FileId(self.next_id);
        self.next_id += 1;
        self.files.insert(
            id,
            SessionFile {
                name,
                bytes,
                titles,
                prefix: String::new(),
                overrides: BTreeMap::new(),
            },
        );
        id
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    pub fn file_name(&self, id: FileId) -> Result<&str, ExportError> {
        Ok(&self.file(id)?.name)
    }

    /// Current sheet titles of the file, in tab order.
    pub fn sheet_names(&self, id: FileId) -> Result<&[String], ExportError> {
        let file = self.file(id)?;
        match &file.titles {
            Some(titles) => Ok(titles),
            None => Err(malformed(file)),
        }
    }

    pub fn set_prefix(&mut self, id: FileId, prefix: impl Into<String>) -> Result<(), ExportError> {
        self.file_mut(id)?.prefix = prefix.into();
        Ok(())
    }

    /// Override the proposed new title for one sheet.
    pub fn set_sheet_name(
        &mut self,
        id: FileId,
        old_name: &str,
        new_name: impl Into<String>,
    ) -> Result<(), ExportError> {
        let file = self.file_mut(id)?;
        let known = match &file.titles {
            Some(titles) => titles.iter().any(|t| t == old_name),
            None => return Err(malformed(file)),
        };
        if !known {
            return Err(ExportError::UnknownSheet {
                file: file.name.clone(),
                sheet: old_name.to_string(),
            });
        }
        file.overrides.insert(old_name.to_string(), new_name.into());
        Ok(())
    }

    /// Default mapping for the file's prefix with per-sheet overrides applied.
    pub fn proposed_mapping(&self, id: FileId) -> Result<RenameMapping, ExportError> {
        let file = self.file(id)?;
        let titles = file.titles.as_ref().ok_or_else(|| malformed(file))?;
        Ok(build_default_mapping(titles, &file.prefix).with_overrides(&file.overrides))
    }

    /// Rename one file and encode the result.
    pub fn export(&self, id: FileId) -> Result<ExportedFile, ExportError> {
        let file = self.file(id)?;
        let mapping = self.proposed_mapping(id)?;

        for new_name in mapping.new_names() {
            validate_sheet_name(new_name).map_err(|source| ExportError::InvalidName {
                file: file.name.clone(),
                name: new_name.to_string(),
                source,
            })?;
        }
        let collisions = mapping.collisions();
        if !collisions.is_empty() {
            return Err(ExportError::NameCollision {
                file: file.name.clone(),
                names: collisions.into_iter().map(str::to_string).collect(),
            });
        }

        let mut doc =
            XlsxDocument::from_bytes(&file.bytes).map_err(|source| ExportError::MalformedInput {
                file: file.name.clone(),
                source,
            })?;
        let summary = doc
            .workbook
            .rename_sheets(&mapping)
            .map_err(|source| ExportError::Rename {
                file: file.name.clone(),
                source,
            })?;
        let bytes = doc.to_bytes().map_err(|source| ExportError::Encode {
            file: file.name.clone(),
            source,
        })?;

        log::info!(
            "{}: renamed {} sheets, rewrote {} formulas",
            file.name,
            summary.sheets_renamed,
            summary.formulas_rewritten
        );
        Ok(ExportedFile {
            file_name: file.name.clone(),
            mapping,
            summary,
            bytes,
        })
    }

    /// Export every file independently and bundle the successes into one zip archive.
    pub fn export_all(&self) -> Result<BatchExport, ArchiveError> {
        let outcomes: Vec<_> = self.file_ids().map(|id| (id, self.export(id))).collect();

        let successes: Vec<&ExportedFile> = outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.as_ref().ok())
            .collect();
        let archive = if successes.is_empty() {
            None
        } else {
            Some(bundle_outputs(successes)?)
        };

        Ok(BatchExport { outcomes, archive })
    }

    fn file(&self, id: FileId) -> Result<&SessionFile, ExportError> {
        self.files.get(&id).ok_or(ExportError::UnknownFile(id))
    }

    fn file_mut(&mut self, id: FileId) -> Result<&mut SessionFile, ExportError> {
        self.files.get_mut(&id).ok_or(ExportError::UnknownFile(id))
    }
}

fn malformed(file: &SessionFile) -> ExportError {
    match XlsxDocument::from_bytes(&file.bytes) {
        Err(source) => ExportError::MalformedInput {
            file: file.name.clone(),
            source,
        },
        Ok(_) => ExportError::MalformedInput {
            file: file.name.clone(),
            source: XlsxError::Invalid("workbook could not be read when it was added".into()),
        },
    }
}
