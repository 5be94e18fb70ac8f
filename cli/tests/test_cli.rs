//! FILENAME: tests/test_cli.rs
//! Runs the tab2pbi binary against workbooks written to a temp directory.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const WORKBOOK: &str = r#"<?xml version='1.0' encoding='utf-8' ?>
<workbook version='18.1'>
  <datasources>
    <datasource name='Sample' caption='Sample Data'>
      <column name='[Profit Ratio]' caption='Profit Ratio' datatype='real' role='measure'>
        <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])' />
      </column>
    </datasource>
  </datasources>
</workbook>
"#;

fn tab2pbi(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tab2pbi"))
        .args(args)
        .output()
        .unwrap()
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_converts_file_and_writes_log() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.twb");
    std::fs::write(&input, WORKBOOK).unwrap();
    let output_dir = dir.path().join("out");
    let log_file = dir.path().join("logs").join("session.log");
    let report = dir.path().join("report.json");

    let output = tab2pbi(&[
        path_arg(&input),
        "--output-dir",
        path_arg(&output_dir),
        "--log-file",
        path_arg(&log_file),
        "--report",
        path_arg(&report),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK"));
    assert!(stdout.contains("1 succeeded, 0 failed"));

    let measures =
        std::fs::read_to_string(output_dir.join("sample").join("sample_measures.dax")).unwrap();
    assert!(measures.contains("DIVIDE(SUM(Sales[Profit]), SUM(Sales[Sales]), 0)"));

    let log = std::fs::read_to_string(&log_file).unwrap();
    assert!(log.lines().next().unwrap().starts_with("1|INFO|"));
    assert!(report.is_file());
}

#[test]
fn test_custom_table_name() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sample.twb");
    std::fs::write(&input, WORKBOOK).unwrap();
    let output_dir = dir.path().join("out");

    let output = tab2pbi(&[
        path_arg(&input),
        "--output-dir",
        path_arg(&output_dir),
        "--table",
        "Orders",
        "--verbosity",
        "error",
    ]);
    assert!(output.status.success());

    let measures =
        std::fs::read_to_string(output_dir.join("sample").join("sample_measures.dax")).unwrap();
    assert!(measures.contains("DIVIDE(SUM(Orders[Profit]), SUM(Orders[Sales]), 0)"));
}

#[test]
fn test_failed_file_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("budget.xlsx");
    std::fs::write(&input, b"PK").unwrap();

    let output = tab2pbi(&[
        path_arg(&input),
        "--output-dir",
        path_arg(&dir.path().join("out")),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("FAIL"));
}

#[test]
fn test_unknown_verbosity_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = tab2pbi(&[path_arg(dir.path()), "--verbosity", "loud"]);
    assert_eq!(output.status.code(), Some(2));
}
