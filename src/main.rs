use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use data_encoding::HEXLOWER;
use log::LevelFilter;
use simple_logger::SimpleLogger;

use heavy_file_sort::sort::Sort;

#[derive(Parser)]
#[command(name = "heavy-file-sort")]
#[command(about = "Sort a file of numbered text records that does not fit in memory")]
#[command(version)]
struct Args {
    #[arg(short, long, default_value = "input.txt", help = "File to sort")]
    input: PathBuf,

    #[arg(short, long, help = "Sorted output, a new result-<random>.txt by default")]
    output: Option<PathBuf>,

    #[arg(short, long, help = "Only check whether this file is sorted")]
    check: Option<PathBuf>,

    #[arg(long, help = "Directory for intermediate files, the system temp dir by default")]
    tmp_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 0, help = "Number of tasks, all cores by default")]
    tasks: usize,

    #[arg(short, long, help = "Verbose output")]
    verbose: bool,
}

fn default_output() -> PathBuf {
    PathBuf::from(format!("result-{}.txt", HEXLOWER.encode(&rand::random::<[u8; 8]>())))
}

fn main() -> Result<()> {
    let raw_args: Vec<String> = std::env::args().collect();
    if raw_args.len() == 2 && raw_args[1].eq_ignore_ascii_case("help") {
        Args::command().print_help()?;
        println!();
        return Ok(());
    }
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    SimpleLogger::new().with_level(level).init()?;
    let start_time = Instant::now();

    if let Some(path) = args.check {
        log::info!("Checking if file is sorted: {}", path.display());
        let sorted = Sort::new(path, PathBuf::new()).check()?;
        println!("{}", if sorted { "File is sorted." } else { "File has unsorted records." });
        return Ok(());
    }

    let output = match args.output {
        Some(output) => output,
        None => {
            let output = default_output();
            log::info!("Output file path is not provided, using: {}", output.display());
            output
        }
    };

    let mut heavy_file_sort = Sort::new(args.input.clone(), output.clone());
    heavy_file_sort.with_tasks(args.tasks);
    if let Some(tmp_dir) = args.tmp_dir {
        heavy_file_sort.with_tmp_dir(tmp_dir);
    }
    heavy_file_sort.sort()?;

    println!(
        "Sorted {} into {}, elapsed time: {:.2?}",
        args.input.display(),
        output.display(),
        start_time.elapsed()
    );
    Ok(())
}
