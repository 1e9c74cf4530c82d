mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::{workbook_bytes, zip_entries};
use renamer_model::CellRef;
use renamer_xlsx::XlsxDocument;

fn sheet_rename(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sheet-rename"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("spawn sheet-rename")
}

fn write_inputs(dir: &Path) {
    std::fs::write(
        dir.join("east.xlsx"),
        workbook_bytes(&[("Data", &[]), ("Summary", &["SUM(Data!A1:A3)"])]),
    )
    .unwrap();
    std::fs::write(
        dir.join("west.xlsx"),
        workbook_bytes(&[("Data", &[]), ("Notes", &["Data!A1"])]),
    )
    .unwrap();
}

#[test]
fn renames_into_out_dir_and_zip() {
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());

    let output = sheet_rename(
        tmp.path(),
        &[
            "east.xlsx",
            "west.xlsx",
            "--prefix",
            "Q1",
            "--rename",
            "Notes=Remarks",
            "--out-dir",
            "out",
            "--zip",
            "bundle.zip",
        ],
    );
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let east = std::fs::read(tmp.path().join("out/east.xlsx")).unwrap();
    let doc = XlsxDocument::from_bytes(&east).unwrap();
    assert_eq!(doc.workbook.sheet_names(), vec!["Q1.01 Data", "Q1.02 Summary"]);
    assert_eq!(
        doc.workbook.sheets[1].formula(CellRef::new(1, 1)),
        Some("SUM('Q1.01 Data'!A1:A3)")
    );

    let west = std::fs::read(tmp.path().join("out/west.xlsx")).unwrap();
    let doc = XlsxDocument::from_bytes(&west).unwrap();
    assert_eq!(doc.workbook.sheet_names(), vec!["Q1.01 Data", "Remarks"]);

    let bundle = std::fs::read(tmp.path().join("bundle.zip")).unwrap();
    let names: Vec<String> = zip_entries(&bundle).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["east.xlsx", "west.xlsx"]);
}

#[test]
fn any_failure_exits_nonzero_and_skips_archive() {
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());
    std::fs::write(tmp.path().join("notes.csv"), "a,b\n").unwrap();

    let output = sheet_rename(
        tmp.path(),
        &["east.xlsx", "notes.csv", "--prefix", "Q1", "--zip", "bundle.zip"],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(!tmp.path().join("bundle.zip").exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok    east.xlsx"), "{stdout}");
    assert!(stdout.contains("FAIL  notes.csv"), "{stdout}");
}

#[test]
fn default_archive_name_is_used_without_destination() {
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());

    let output = sheet_rename(tmp.path(), &["west.xlsx", "--prefix", "W"]);
    assert!(output.status.success());

    let bundle = std::fs::read(tmp.path().join("modified_excel_files.zip")).unwrap();
    assert_eq!(zip_entries(&bundle).len(), 1);
}

#[test]
fn dry_run_json_reports_mapping_without_writing() {
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());

    let output = sheet_rename(
        tmp.path(),
        &[
            "east.xlsx",
            "--prefix",
            "Q1",
            "--dry-run",
            "--format",
            "json",
            "--out-dir",
            "out",
        ],
    );
    assert!(output.status.success());
    assert!(!tmp.path().join("out").exists());
    assert!(!tmp.path().join("modified_excel_files.zip").exists());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["files"][0]["file"], "east.xlsx");
    assert_eq!(report["files"][0]["status"], "proposed");
    assert_eq!(
        report["files"][0]["mapping"],
        serde_json::json!([
            {"old_name": "Data", "new_name": "Q1.01 Data"},
            {"old_name": "Summary", "new_name": "Q1.02 Summary"},
        ])
    );
}

#[test]
fn undecodable_workbook_blocks_archive_but_not_other_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());
    std::fs::write(tmp.path().join("broken.xlsx"), b"not a zip").unwrap();

    let output = sheet_rename(
        tmp.path(),
        &[
            "east.xlsx",
            "broken.xlsx",
            "--prefix",
            "Q1",
            "--out-dir",
            "out",
            "--zip",
            "bundle.zip",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(!tmp.path().join("bundle.zip").exists());
    assert!(tmp.path().join("out/east.xlsx").exists());
    assert!(!tmp.path().join("out/broken.xlsx").exists());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FAIL  broken.xlsx"), "{stdout}");
}
