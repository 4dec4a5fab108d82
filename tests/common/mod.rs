use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::HEXLOWER;

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
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

/// Write `lines` numbered lines of varying length, each terminated by '\n'
#[allow(dead_code)]
pub fn create_input(dir: &str, lines: usize) -> Result<(PathBuf, Vec<String>), anyhow::Error> {
    let path = temp_file_name(dir);
    let mut writer = BufWriter::new(File::create(&path)?);
    let mut content = Vec::with_capacity(lines);
    for i in 0..lines {
        let line = format!("{:08}\t{}", i, "x".repeat(i % 97));
        writeln!(writer, "{}", line)?;
        content.push(line);
    }
    writer.flush()?;
    Ok((path, content))
}

#[allow(dead_code)]
pub fn sorted(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    lines
}
