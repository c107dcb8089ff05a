mod common;

use std::fs;

use assert_matches::assert_matches;

use maf_eset::config::default_columns;
use maf_eset::error::EsetError;
use maf_eset::maf::{self, COUNTS};

use common::{Observation, gzip, maf_text, write_maf_gz};

fn observation(case_id: &'static str, start: u64) -> Observation<'static> {
    Observation {
        case_id,
        chromosome: "chr7",
        start,
        reference: "G",
        alternate: "A",
        ref_count: 20,
        alt_count: 3,
        existing_variation: "",
    }
}

#[test]
fn load_skips_comments_and_selects_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.maf.gz");
    write_maf_gz(&path, &[observation("c1", 10), observation("c1", 20)]);

    let table = maf::load(&path, &default_columns()).unwrap();

    assert_eq!(table.shape(), (2, default_columns().len()));
    assert_eq!(table.columns(), default_columns().as_slice());
    let start = table.column_index("Start_Position").unwrap();
    assert_eq!(table.rows()[1][start], "20");
    assert!(table.column_index("Hugo_Symbol").is_none());
}

#[test]
fn load_accepts_uncompressed_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.maf");
    fs::write(&path, maf_text(&[observation("c1", 10)])).unwrap();

    let table = maf::load(&path, &default_columns()).unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn load_fails_on_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.maf.gz");
    fs::write(&path, gzip(b"#version 2.4\nChromosome\tcase_id\nchr1\tc1\n")).unwrap();

    let err = maf::load(&path, &default_columns()).unwrap_err();
    assert_matches!(err, EsetError::MissingColumns { columns, .. } if columns.contains(&"t_ref_count".to_string()));
}

#[test]
fn combine_keeps_file_then_row_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.maf.gz");
    let second = dir.path().join("b.maf.gz");
    write_maf_gz(&first, &[observation("c1", 1), observation("c1", 2)]);
    write_maf_gz(&second, &[observation("c2", 3)]);

    let table = maf::combine(&[first, second], &default_columns()).unwrap();
    let start = table.column_index("Start_Position").unwrap();
    let starts: Vec<&str> = table.rows().iter().map(|row| row[start].as_str()).collect();
    assert_eq!(starts, vec!["1", "2", "3"]);
}

#[test]
fn combine_fails_fast_when_any_file_lacks_columns() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("a.maf.gz");
    let bad = dir.path().join("b.maf.gz");
    write_maf_gz(&good, &[observation("c1", 1)]);
    fs::write(&bad, gzip(b"Chromosome\nchr1\n")).unwrap();

    let err = maf::combine(&[good, bad], &default_columns()).unwrap_err();
    assert_matches!(err, EsetError::MissingColumns { .. });
}

#[test]
fn prepare_adds_counts_and_feature_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.maf.gz");
    let obs = observation("c1", 42);
    write_maf_gz(&path, &[obs]);

    let table = maf::prepare(&[path], &default_columns()).unwrap();

    assert_eq!(table.columns()[0], COUNTS);
    assert_eq!(table.rows()[0][0], "20:3");
    assert_eq!(table.features()[0].as_str(), "chr7.42.42.+.G.G.A");
    assert!(table.column_index("featurename").is_none());
    assert!(table.column_index("Chromosome").is_some());
}

#[test]
fn feature_keys_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("a.maf.gz");
    let second = dir.path().join("b.maf.gz");
    write_maf_gz(&first, &[observation("c1", 42)]);
    write_maf_gz(&second, &[observation("c9", 42)]);

    let table = maf::prepare(&[first, second], &default_columns()).unwrap();
    assert_eq!(table.features()[0], table.features()[1]);
}

#[test]
fn maf_files_in_lists_gz_files_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write_maf_gz(&dir.path().join("b.maf.gz"), &[observation("c1", 1)]);
    write_maf_gz(&dir.path().join("a.maf.gz"), &[observation("c1", 1)]);
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let files = maf::maf_files_in(dir.path()).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.maf.gz".to_string(), "b.maf.gz".to_string()]);
}
