use std::fs::File;
use std::io::Write;

use notch_config::load_samples_csv;
use rstest::rstest;
use tempfile::tempdir;

fn write_csv(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.csv");
    let mut f = File::create(&path).unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn csv_samples_keep_file_order() {
    let (_dir, path) = write_csv(&["raw", "1020", "1022", "1023", "0", "5", "10"]);
    let samples = load_samples_csv(&path).unwrap();
    assert_eq!(samples, vec![1020, 1022, 1023, 0, 5, 10]);
}

#[rstest]
fn csv_tolerates_padding_around_values() {
    let (_dir, path) = write_csv(&["raw", " 12 ", "13"]);
    assert_eq!(load_samples_csv(&path).unwrap(), vec![12, 13]);
}

#[rstest]
#[case::wrong_name(&["value", "1"])]
#[case::extra_column(&["raw,pin", "1,0"])]
fn csv_with_wrong_header_errors(#[case] lines: &[&str]) {
    let (_dir, path) = write_csv(lines);
    let err = load_samples_csv(&path).expect_err("should error on bad header");
    assert!(format!("{err}").contains("header 'raw'"));
}

#[rstest]
fn csv_with_non_numeric_errors_with_line_number() {
    let (_dir, path) = write_csv(&["raw", "100", "abc"]);
    let err = load_samples_csv(&path).expect_err("should error on non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}

#[rstest]
fn header_only_file_yields_no_samples() {
    let (_dir, path) = write_csv(&["raw"]);
    assert!(load_samples_csv(&path).unwrap().is_empty());
}

#[rstest]
fn missing_file_names_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.csv");
    let err = load_samples_csv(&path).expect_err("missing file");
    assert!(format!("{err}").contains("absent.csv"));
}
