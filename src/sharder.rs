use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{anyhow, Context};

use crate::config::Config;
use crate::shard::{Shard, ShardWriter};

/// Number of shards needed so that on average a shard holds at most `max_shard_size_bytes`.
/// Always at least one, also for empty input.
pub fn shard_count(total_bytes: u64, max_shard_size_bytes: u64) -> usize {
    if max_shard_size_bytes == 0 {
        return 1;
    }
    let whole = total_bytes / max_shard_size_bytes;
    let partial = u64::from(total_bytes % max_shard_size_bytes != 0);
    let count = whole + partial;
    count.max(1) as usize
}

pub(crate) fn total_bytes(input_files: &[PathBuf]) -> Result<u64, anyhow::Error> {
    let mut total = 0;
    for path in input_files {
        let metadata = path.metadata()
            .with_context(|| anyhow!("path: {}", path.display()))?;
        total += metadata.len();
    }
    Ok(total)
}

/// Stream the input files once, in order, and deal line `i` to shard `i mod shards`.
/// A final line without a delimiter gets one so that lines stay separate after shuffling.
pub(crate) struct Sharder<'a> {
    config: &'a Config,
    shards: usize,
}

impl<'a> Sharder<'a> {
    pub(crate) fn new(config: &'a Config, shards: usize) -> Sharder<'a> {
        Sharder {
            config,
            shards: shards.max(1),
        }
    }

    pub(crate) fn shard(&self, input_files: &[PathBuf]) -> Result<(Vec<Shard>, usize), anyhow::Error> {
        log::info!("Sharding with {} shards", self.shards);
        let endl = self.config.endl();
        let mut writers = (0..self.shards)
            .map(|index| ShardWriter::new(index, self.config))
            .collect::<Result<Vec<ShardWriter>, anyhow::Error>>()?;

        let mut n: usize = 0;
        let mut line = Vec::new();
        for path in input_files {
            let file = File::open(path)
                .with_context(|| anyhow!("path: {}", path.display()))?;
            let mut reader = BufReader::new(file);
            loop {
                line.clear();
                let bytes = reader.read_until(endl, &mut line)
                    .with_context(|| anyhow!("path: {}, line: {}", path.display(), n))?;
                if bytes == 0 {
                    break;
                }
                if line.last() != Some(&endl) {
                    line.push(endl);
                }
                writers[n % self.shards].append(&line)?;
                n += 1;
            }
        }
        log::info!("Finished sharding {} lines", n);

        let shards = writers.into_iter()
            .map(ShardWriter::finish)
            .collect::<Result<Vec<Shard>, anyhow::Error>>()?;
        Ok((shards, n))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::config::test_config;
    use crate::shard::tests::read_all;
    use crate::sharder::{shard_count, Sharder};

    fn write_input(content: &str) -> Result<PathBuf, anyhow::Error> {
        let file = tempfile::Builder::new()
            .prefix("sharder-input-")
            .tempfile()?;
        let (_file, path) = file.keep()?;
        fs::write(&path, content)?;
        Ok(path)
    }

    #[test]
    fn test_shard_count() {
        assert_eq!(shard_count(0, 100), 1);
        assert_eq!(shard_count(1, 100), 1);
        assert_eq!(shard_count(100, 100), 1);
        assert_eq!(shard_count(101, 100), 2);
        assert_eq!(shard_count(12, 6), 2);
        assert_eq!(shard_count(12, 5), 3);
        assert_eq!(shard_count(1_000_000, 1), 1_000_000);
        assert_eq!(shard_count(500, 0), 1);
    }

    #[test]
    fn test_round_robin() -> Result<(), anyhow::Error> {
        let path = write_input("a\nb\nc\nd\ne\nf\n")?;
        let config = test_config(6);
        let (shards, lines) = Sharder::new(&config, 2).shard(&[path.clone()])?;
        assert_eq!(lines, 6);
        assert_eq!(shards.len(), 2);

        let mut contents = Vec::new();
        for shard in shards {
            assert_eq!(shard.lines(), 3);
            let mut reader = shard.into_reader(b'\n')?;
            contents.push(read_all(&mut reader)?);
        }
        assert_eq!(contents[0], vec!["a\n", "c\n", "e\n"]);
        assert_eq!(contents[1], vec!["b\n", "d\n", "f\n"]);
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_round_robin_across_files() -> Result<(), anyhow::Error> {
        let first = write_input("a\nb\nc\n")?;
        let second = write_input("d\ne\n")?;
        let config = test_config(4);
        let (shards, lines) = Sharder::new(&config, 2).shard(&[first.clone(), second.clone()])?;
        assert_eq!(lines, 5);
        let counts: Vec<usize> = shards.iter().map(|s| s.lines()).collect();
        assert_eq!(counts, vec![3, 2]);
        fs::remove_file(first)?;
        fs::remove_file(second)?;
        Ok(())
    }

    #[test]
    fn test_missing_final_delimiter() -> Result<(), anyhow::Error> {
        let path = write_input("a\nb")?;
        let config = test_config(1024);
        let (mut shards, lines) = Sharder::new(&config, 1).shard(&[path.clone()])?;
        assert_eq!(lines, 2);
        let shard = shards.remove(0);
        assert_eq!(shard.bytes(), 4);
        let mut reader = shard.into_reader(b'\n')?;
        assert_eq!(read_all(&mut reader)?, vec!["a\n", "b\n"]);
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_more_shards_than_lines() -> Result<(), anyhow::Error> {
        let path = write_input("a\n")?;
        let config = test_config(1);
        let (shards, lines) = Sharder::new(&config, 2).shard(&[path.clone()])?;
        assert_eq!(lines, 1);
        let counts: Vec<usize> = shards.iter().map(|s| s.lines()).collect();
        assert_eq!(counts, vec![1, 0]);
        fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn test_missing_input() {
        let config = test_config(1024);
        let result = Sharder::new(&config, 1).shard(&[PathBuf::from("./no/such/input.txt")]);
        assert!(result.is_err());
    }
}
