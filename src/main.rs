use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use text_file_shuffle::shuffle::Shuffle;

const USAGE: &str = "Usage: text-file-shuffle /path/to/input.txt /path/to/output.txt";

fn parse_args(args: &[OsString]) -> Option<(PathBuf, PathBuf)> {
    match args {
        [input, output] => {
            let input = PathBuf::from(input);
            if input.exists() {
                Some((input, PathBuf::from(output)))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let (input, output) = match parse_args(&args) {
        Some(paths) => paths,
        None => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
    };

    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let text_file_shuffle = Shuffle::new(vec![input], output);
    match text_file_shuffle.shuffle() {
        Ok(report) => {
            log::info!("Shuffled {} lines using {} shards", report.lines(), report.shards());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{:?}", e);
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
