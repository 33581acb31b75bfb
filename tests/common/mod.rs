use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use heavy_file_sort::record::Record;

const WORDS: [&str; 12] = [
    "apple", "Banana", "cherry", "Date", "elderberry", "FIG", "grape", "honeydew", "Kiwi", "lemon", "mango", "nectarine",
];

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    let parallel_results_dir_path = PathBuf::from_str("./target/parallel-results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }

    if !parallel_results_dir_path.exists() {
        fs::create_dir_all(&parallel_results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create parallel results directory: {:?}", parallel_results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn read_lines(path: &Path) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), anyhow::Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// Random records with repeated texts in mixed case and repeated keys
#[allow(dead_code)]
pub fn random_lines(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let key: i64 = rng.gen_range(-50..1000);
            let words = rng.gen_range(1..4);
            let text: Vec<String> = (0..words)
                .map(|_| {
                    let word = WORDS[rng.gen_range(0..WORDS.len())];
                    if rng.gen_bool(0.3) { word.to_uppercase() } else { word.to_string() }
                })
                .collect();
            format!("{}. {}", key, text.join(" "))
        })
        .collect()
}

/// What the sort is expected to produce: a stable sort of the input records
#[allow(dead_code)]
pub fn expected_order(lines: &[String]) -> Vec<String> {
    let mut records: Vec<Record> = lines.iter().map(|l| Record::parse(l).unwrap()).collect();
    records.sort_by(Record::compare);
    records.iter().map(|r| r.to_string()).collect()
}

#[allow(dead_code)]
pub fn is_empty_dir(path: &Path) -> Result<bool, anyhow::Error> {
    Ok(fs::read_dir(path)?.next().is_none())
}
