use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use renamer_model::{RenameMapping, RenameSummary};
use serde::Serialize;

use crate::archive::{unique_entry_name, DEFAULT_ARCHIVE_NAME};
use crate::session::{ExportError, ExportedFile, FileId, RenameSession};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "sheet-rename",
    about = "Rename worksheets in .xlsx workbooks and rewrite formulas that reference them."
)]
pub struct Args {
    /// Workbooks to rename (.xlsx only).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Prefix every sheet title as `<PREFIX>.<NN> <title>`.
    #[arg(long)]
    prefix: Option<String>,

    /// Explicit new title for a sheet, as `OLD=NEW` (repeatable). Applies to every file that has
    /// a sheet named OLD and wins over `--prefix`.
    #[arg(long = "rename", value_name = "OLD=NEW", value_parser = parse_rename)]
    renames: Vec<(String, String)>,

    /// Write each renamed workbook into this directory under its original file name.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Bundle all renamed workbooks into one zip archive. Only written when every file succeeds.
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = DEFAULT_ARCHIVE_NAME)]
    zip: Option<PathBuf>,

    /// Print the proposed mapping for each file without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn parse_rename(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((old, new)) if !old.is_empty() => Ok((old.to_string(), new.to_string())),
        _ => Err(format!("expected OLD=NEW, got {input:?}")),
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum JsonOutcome<'a> {
    Renamed {
        mapping: &'a RenameMapping,
        summary: RenameSummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    Proposed {
        mapping: RenameMapping,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Serialize)]
struct JsonFile<'a> {
    file: &'a str,
    #[serde(flatten)]
    outcome: JsonOutcome<'a>,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    dry_run: bool,
    files: Vec<JsonFile<'a>>,
    archive: Option<String>,
}

/// Per-file result collected before reporting.
enum Outcome {
    Renamed {
        exported: ExportedFile,
        output: Option<PathBuf>,
    },
    Proposed(RenameMapping),
    Failed(String),
}

pub fn run() -> Result<bool> {
    run_with_args(Args::parse())
}

/// Run the CLI. Returns `Ok(false)` when at least one file failed.
pub fn run_with_args(args: Args) -> Result<bool> {
    let mut session = RenameSession::new();
    // (display name, session id or load error) in argument order.
    let mut inputs: Vec<(String, Result<FileId, String>)> = Vec::new();

    for path in &args.files {
        let display = path.display().to_string();
        if !has_xlsx_extension(path) {
            inputs.push((display, Err("unsupported file type (expected .xlsx)".to_string())));
            continue;
        }
        let loaded = std::fs::read(path)
            .with_context(|| format!("read {display}"))
            .map(|bytes| session.add_file(file_name_of(path), bytes));
        inputs.push((display, loaded.map_err(|err| format!("{err:#}"))));
    }

    let ids: Vec<FileId> = inputs.iter().filter_map(|(_, id)| id.clone().ok()).collect();
    for id in &ids {
        if let Some(prefix) = &args.prefix {
            session.set_prefix(*id, prefix.as_str())?;
        }
    }
    for (old, new) in &args.renames {
        let mut applied = false;
        for id in &ids {
            let has_sheet = session
                .sheet_names(*id)
                .is_ok_and(|names| names.iter().any(|n| n == old));
            if has_sheet {
                session.set_sheet_name(*id, old, new.as_str())?;
                applied = true;
            }
        }
        if !applied {
            log::warn!("no input has a sheet named {old:?}; --rename {old}={new} ignored");
        }
    }

    if let Some(dir) = &args.out_dir {
        if !args.dry_run {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
        }
    }

    let mut batch = if args.dry_run {
        None
    } else {
        Some(session.export_all()?)
    };
    let mut exports: HashMap<FileId, Result<ExportedFile, ExportError>> = batch
        .as_mut()
        .map(|batch| std::mem::take(&mut batch.outcomes).into_iter().collect())
        .unwrap_or_default();

    let mut outcomes: Vec<(String, Outcome)> = Vec::with_capacity(inputs.len());
    let mut used_names = HashSet::new();
    for (display, loaded) in inputs {
        let id = match loaded {
            Ok(id) => id,
            Err(err) => {
                outcomes.push((display, Outcome::Failed(err)));
                continue;
            }
        };

        if args.dry_run {
            let outcome = match session.proposed_mapping(id) {
                Ok(mapping) => Outcome::Proposed(mapping),
                Err(err) => Outcome::Failed(err.to_string()),
            };
            outcomes.push((display, outcome));
            continue;
        }

        let exported = match exports.remove(&id) {
            Some(Ok(exported)) => exported,
            Some(Err(err)) => {
                outcomes.push((display, Outcome::Failed(err.to_string())));
                continue;
            }
            None => {
                let err = ExportError::UnknownFile(id);
                outcomes.push((display, Outcome::Failed(err.to_string())));
                continue;
            }
        };
        let output = match &args.out_dir {
            Some(dir) => {
                let path = dir.join(unique_entry_name(&exported.file_name, &mut used_names));
                std::fs::write(&path, &exported.bytes)
                    .with_context(|| format!("write {}", path.display()))?;
                Some(path)
            }
            None => None,
        };
        outcomes.push((display, Outcome::Renamed { exported, output }));
    }

    let all_ok = outcomes
        .iter()
        .all(|(_, outcome)| !matches!(outcome, Outcome::Failed(_)));

    let archive_path = if args.dry_run {
        None
    } else {
        // With no destination at all, fall back to the default archive in the working directory.
        args.zip.clone().or_else(|| {
            args.out_dir
                .is_none()
                .then(|| PathBuf::from(DEFAULT_ARCHIVE_NAME))
        })
    };
    let archive = batch.and_then(|batch| batch.archive);
    let archive_written = match (archive_path, archive) {
        (Some(path), Some(bytes)) if all_ok => {
            std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
            Some(path)
        }
        (Some(path), _) => {
            log::warn!("not writing {}: some files failed", path.display());
            None
        }
        (None, _) => None,
    };

    match args.format {
        OutputFormat::Text => print_text(&outcomes, archive_written.as_deref()),
        OutputFormat::Json => print_json(args.dry_run, &outcomes, archive_written.as_deref())?,
    }

    Ok(all_ok)
}

fn print_text(outcomes: &[(String, Outcome)], archive: Option<&Path>) {
    for (file, outcome) in outcomes {
        match outcome {
            Outcome::Renamed { exported, output } => {
                let s = exported.summary;
                println!(
                    "ok    {file}: {} sheets renamed, {} formulas rewritten, {} defined names rewritten",
                    s.sheets_renamed, s.formulas_rewritten, s.defined_names_rewritten
                );
                if let Some(output) = output {
                    println!("      -> {}", output.display());
                }
            }
            Outcome::Proposed(mapping) => {
                println!("plan  {file}:");
                for (old, new) in mapping.iter() {
                    println!("      {old} -> {new}");
                }
            }
            Outcome::Failed(err) => println!("FAIL  {file}: {err}"),
        }
    }
    if let Some(path) = archive {
        println!("archive: {}", path.display());
    }
}

fn print_json(dry_run: bool, outcomes: &[(String, Outcome)], archive: Option<&Path>) -> Result<()> {
    let files = outcomes
        .iter()
        .map(|(file, outcome)| JsonFile {
            file: file.as_str(),
            outcome: match outcome {
                Outcome::Renamed { exported, output } => JsonOutcome::Renamed {
                    mapping: &exported.mapping,
                    summary: exported.summary,
                    output: output.as_ref().map(|p| p.to_string_lossy().into_owned()),
                },
                Outcome::Proposed(mapping) => JsonOutcome::Proposed {
                    mapping: mapping.clone(),
                },
                Outcome::Failed(error) => JsonOutcome::Failed {
                    error: error.clone(),
                },
            },
        })
        .collect();

    let report = JsonReport {
        dry_run,
        files,
        archive: archive.map(|p| p.to_string_lossy().into_owned()),
    };

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, &report)?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn has_xlsx_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
