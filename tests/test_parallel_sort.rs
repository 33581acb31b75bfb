use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use heavy_file_sort::progress::{Phase, Progress, ProgressHook};
use heavy_file_sort::sort::Sort;

mod common;

#[test]
fn test_parallel_sort() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let output_path = common::temp_file_name("./target/parallel-results/");
    let tmp = tempfile::tempdir()?;

    let lines = common::random_lines(10_000, 7);
    common::write_lines(&input_path, &lines)?;

    let mut heavy_file_sort = Sort::new(input_path.clone(), output_path.clone());
    heavy_file_sort.with_tasks(15);
    heavy_file_sort.with_chunk_size_bytes(16 * 1024);
    heavy_file_sort.with_batch_records(100);
    heavy_file_sort.with_flush_records(1000);
    heavy_file_sort.with_tmp_dir(tmp.path().to_path_buf());
    heavy_file_sort.sort()?;

    let output = common::read_lines(&output_path)?;
    assert_eq!(output.len(), lines.len());
    assert_eq!(output, common::expected_order(&lines));
    assert!(Sort::new(output_path.clone(), Default::default()).check()?);
    assert!(common::is_empty_dir(tmp.path())?);

    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_derived_chunk_size() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let output_path = common::temp_file_name("./target/parallel-results/");
    let tmp = tempfile::tempdir()?;

    let lines = common::random_lines(5_000, 11);
    common::write_lines(&input_path, &lines)?;

    // 4 tasks, about 8 chunks
    let mut heavy_file_sort = Sort::new(input_path.clone(), output_path.clone());
    heavy_file_sort.with_tasks(4);
    heavy_file_sort.with_tmp_dir(tmp.path().to_path_buf());
    heavy_file_sort.sort()?;

    assert_eq!(common::read_lines(&output_path)?, common::expected_order(&lines));
    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_sorted_input_is_unchanged() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let first_path = common::temp_file_name("./target/parallel-results/");
    let second_path = common::temp_file_name("./target/parallel-results/");
    let tmp = tempfile::tempdir()?;

    common::write_lines(&input_path, &common::random_lines(3_000, 3))?;

    let mut first = Sort::new(input_path.clone(), first_path.clone());
    first.with_tasks(3);
    first.with_chunk_size_bytes(4096);
    first.with_tmp_dir(tmp.path().to_path_buf());
    first.sort()?;

    let mut second = Sort::new(first_path.clone(), second_path.clone());
    second.with_tasks(2);
    second.with_chunk_size_bytes(1000);
    second.with_batch_records(7);
    second.with_tmp_dir(tmp.path().to_path_buf());
    second.sort()?;

    assert_eq!(fs::read(&first_path)?, fs::read(&second_path)?);
    fs::remove_file(input_path)?;
    fs::remove_file(first_path)?;
    fs::remove_file(second_path)?;
    Ok(())
}

#[test]
fn test_single_task() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let output_path = common::temp_file_name("./target/parallel-results/");
    let tmp = tempfile::tempdir()?;

    let lines = common::random_lines(2_000, 5);
    common::write_lines(&input_path, &lines)?;

    let mut heavy_file_sort = Sort::new(input_path.clone(), output_path.clone());
    heavy_file_sort.with_tasks(1);
    heavy_file_sort.with_chunk_size_bytes(2048);
    heavy_file_sort.with_tmp_dir(tmp.path().to_path_buf());
    heavy_file_sort.sort()?;

    assert_eq!(common::read_lines(&output_path)?, common::expected_order(&lines));
    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_progress_hook() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/parallel-results/");
    let output_path = common::temp_file_name("./target/parallel-results/");
    let tmp = tempfile::tempdir()?;

    common::write_lines(&input_path, &common::random_lines(10_000, 13))?;

    let seen: Arc<Mutex<Vec<Progress>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let hook: ProgressHook = Arc::new(move |progress: &Progress| {
        seen_clone.lock().unwrap().push(progress.clone());
    });

    let mut heavy_file_sort = Sort::new(input_path.clone(), output_path.clone());
    heavy_file_sort.with_tasks(2);
    heavy_file_sort.with_chunk_size_bytes(32 * 1024);
    heavy_file_sort.with_tmp_dir(tmp.path().to_path_buf());
    heavy_file_sort.with_progress_hook(Duration::ZERO, hook);
    heavy_file_sort.sort()?;

    let seen = seen.lock().unwrap();
    let first = seen.first().unwrap();
    assert_eq!(first.phase(), Phase::Sorting);
    assert_eq!(first.records(), 10_000);
    assert!(first.chunks() > 1);
    let last = seen.last().unwrap();
    assert_eq!(last.phase(), Phase::Merging);
    assert_eq!(last.records(), 10_000);
    // the merge reports every 4096 records when the interval is zero
    assert!(seen.iter().filter(|p| p.phase() == Phase::Merging).count() >= 3);

    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}
