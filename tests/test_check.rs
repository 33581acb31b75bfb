use std::fs;
use std::path::PathBuf;

use heavy_file_sort::error::{FormatError, SortError};
use heavy_file_sort::sort::Sort;

mod common;

#[test]
fn test_check_sorted() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let lines = common::expected_order(&common::random_lines(1000, 23));
    common::write_lines(&input_path, &lines)?;

    let heavy_file_sort = Sort::new(input_path.clone(), PathBuf::new());
    assert!(heavy_file_sort.check()?);
    fs::remove_file(input_path)?;
    Ok(())
}

#[test]
fn test_check_not_sorted() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let mut lines = common::expected_order(&common::random_lines(1000, 29));
    lines.swap(10, 900);
    common::write_lines(&input_path, &lines)?;

    let heavy_file_sort = Sort::new(input_path.clone(), PathBuf::new());
    assert!(!heavy_file_sort.check()?);
    fs::remove_file(input_path)?;
    Ok(())
}

#[test]
fn test_check_sort_output() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    common::write_lines(&input_path, &common::random_lines(2000, 31))?;

    assert!(!Sort::new(input_path.clone(), PathBuf::new()).check()?);

    let mut heavy_file_sort = Sort::new(input_path.clone(), output_path.clone());
    heavy_file_sort.with_tasks(4);
    heavy_file_sort.with_chunk_size_bytes(4096);
    heavy_file_sort.sort()?;

    assert!(Sort::new(output_path.clone(), PathBuf::new()).check()?);
    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_check_collation() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    fs::write(&input_path, "2. banana\n5. Banana\n1. CHERRY\n1. cherry\n")?;
    assert!(Sort::new(input_path.clone(), PathBuf::new()).check()?);

    fs::write(&input_path, "5. Banana\n2. banana\n")?;
    assert!(!Sort::new(input_path.clone(), PathBuf::new()).check()?);
    fs::remove_file(input_path)?;
    Ok(())
}

#[test]
fn test_check_malformed() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    fs::write(&input_path, "1. a\n2. b\nabc. hello\n")?;

    let error = Sort::new(input_path.clone(), PathBuf::new()).check().unwrap_err();
    match error.downcast_ref::<SortError>() {
        Some(SortError::Format { line_number, source: FormatError::InvalidKey { line }, .. }) => {
            assert_eq!(*line_number, 3);
            assert_eq!(line, "abc. hello");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    fs::remove_file(input_path)?;
    Ok(())
}

#[test]
fn test_check_invalid_utf8() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    fs::write(&input_path, b"1. a\r\n2. \xff\r\n")?;

    let error = Sort::new(input_path.clone(), PathBuf::new()).check().unwrap_err();
    match error.downcast_ref::<SortError>() {
        Some(SortError::Format { line_number, source: FormatError::InvalidUtf8 { line }, .. }) => {
            assert_eq!(*line_number, 2);
            assert_eq!(line, "2. \u{fffd}");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    fs::remove_file(input_path)?;
    Ok(())
}

#[test]
fn test_check_custom_line_terminator() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    fs::write(&input_path, "1. a;2. b;3. c")?;

    let mut heavy_file_sort = Sort::new(input_path.clone(), PathBuf::new());
    heavy_file_sort.with_endl(';');
    assert!(heavy_file_sort.check()?);

    heavy_file_sort.with_endl('\u{013b}');
    assert!(heavy_file_sort.check().is_err());
    fs::remove_file(input_path)?;
    Ok(())
}
