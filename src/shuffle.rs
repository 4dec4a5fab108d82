use std::cmp::max;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool_builder::ThreadPoolBuilder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rlimit::{getrlimit, Resource, setrlimit};

use crate::config::Config;
use crate::phase::Phase;
use crate::shard::Shard;
use crate::shard_pool::ShardPool;
use crate::sharder::{shard_count, total_bytes, Sharder};
use crate::shuffle_command::{Failure, ShuffleCommand, ShuffledShards};

/// 100 MiB
pub const DEFAULT_MAX_SHARD_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Outcome of a completed shuffle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffleReport {
    shard_lines: Vec<usize>,
    lines: usize,
}

impl ShuffleReport {
    /// Number of shards the input was split into
    pub fn shards(&self) -> usize {
        self.shard_lines.len()
    }

    /// Line count of each shard, by shard index
    pub fn shard_lines(&self) -> &Vec<usize> {
        &self.shard_lines
    }

    /// Lines written to the output
    pub fn lines(&self) -> usize {
        self.lines
    }
}

/// Shuffle the lines of text files that may be much larger than available memory.
///
/// The input is dealt round robin into shards of roughly `max_shard_size_bytes`, each shard
/// is shuffled in memory, and the output is produced by repeatedly picking a random shard and
/// taking its next line. The result is always a permutation of the input lines. Within a shard
/// the order is uniformly random, across shards it is only an approximation of a uniform
/// shuffle since lines of one shard are emitted in the order that shard was shuffled into.
/// With a single shard the shuffle is uniform.
///
/// # Examples
/// ```no_run
/// use std::path::PathBuf;
/// use text_file_shuffle::shuffle::Shuffle;
///
/// fn shuffle_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut text_file_shuffle = Shuffle::new(vec![input], output);
///     text_file_shuffle.with_tmp_dir(tmp);
///     text_file_shuffle.with_max_shard_size_mb(64);
///     text_file_shuffle.with_tasks(4);
///     let report = text_file_shuffle.shuffle()?;
///     println!("shuffled {} lines using {} shards", report.lines(), report.shards());
///     Ok(())
/// }
/// ```
pub struct Shuffle {
    input_files: Vec<PathBuf>,
    output: PathBuf,
    tmp: PathBuf,
    tasks: usize,
    max_shard_size_bytes: u64,
    endl: char,
    seed: Option<u64>,
}

impl Shuffle {
    /// Create a default Shuffle definition.
    ///
    /// * intermediate shards are created in std::env::temp_dir()
    /// * shards hold up to 100 MiB of input on average
    /// * shards are shuffled using all system cores
    /// * default end line is '\n'
    /// * the random generator is seeded from system entropy
    ///
    /// The Shuffle implementation will increase the file descriptor rlimit to accommodate all
    /// shards being open at the same time
    pub fn new(input_files: Vec<PathBuf>, output: PathBuf) -> Shuffle {
        Shuffle {
            input_files,
            output,
            tmp: std::env::temp_dir(),
            tasks: 0,
            max_shard_size_bytes: DEFAULT_MAX_SHARD_SIZE_BYTES,
            endl: '\n',
            seed: None,
        }
    }

    /// Set directory for shard files. By default use std::env::temp_dir()
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the number of tasks shuffling shards. The default is zero which will result in using
    /// all system cores
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// The input is split into ceil(input size / max_shard_size_bytes) shards. Each shard must fit
    /// in memory while it is shuffled.
    pub fn with_max_shard_size_bytes(&mut self, max_shard_size_bytes: u64) {
        self.max_shard_size_bytes = max_shard_size_bytes;
    }

    /// Same as [Shuffle::with_max_shard_size_bytes] in MiB
    pub fn with_max_shard_size_mb(&mut self, max_shard_size_mb: u64) {
        self.max_shard_size_bytes = max_shard_size_mb * 1024 * 1024;
    }

    /// Set line ending char - ASCII only, not supporting CRLF
    pub fn with_endl(&mut self, endl: char) {
        self.endl = endl
    }

    /// Make the shuffle reproducible
    pub fn with_seed(&mut self, seed: u64) {
        self.seed = Some(seed)
    }

    /// Shuffle the input files into the output file, overwriting it. Shard files are removed on
    /// every exit path, on failure the output may be incomplete.
    pub fn shuffle(&self) -> Result<ShuffleReport, anyhow::Error> {
        let config = self.create_config()?;
        let mut phase = Phase::Init;

        let total = total_bytes(&self.input_files)?;
        let shards = shard_count(total, config.max_shard_size_bytes());
        log::info!("Input size: {} bytes, max shard size: {} bytes, shards: {}", total, config.max_shard_size_bytes(), shards);

        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let new_soft = max((shards + 256) as u64, current_soft);
        if new_soft > current_hard {
            return Err(anyhow!("{} shards exceed the open files hard limit {}, increase max shard size", shards, current_hard));
        }
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;

        let result = Self::internal_shuffle(&self.input_files, &self.output, &config, shards, &mut phase);
        if result.is_err() {
            log::error!("Shuffle aborted in phase {}", phase);
        }

        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let restored = Self::set_rlimits(current_soft, current_hard);
        Self::keep_run_error(result, restored)
    }

    /// A failed run reports its own error, a restore failure only surfaces after a successful run
    fn keep_run_error(
        result: Result<ShuffleReport, anyhow::Error>,
        restored: Result<(), anyhow::Error>,
    ) -> Result<ShuffleReport, anyhow::Error> {
        match (result, restored) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore_error)) => {
                log::error!("Failed to restore rlimit after aborted shuffle: {:?}", restore_error);
                Err(e)
            }
        }
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    fn create_config(&self) -> Result<Config, anyhow::Error> {
        if self.max_shard_size_bytes == 0 {
            return Err(anyhow!("max shard size must be greater than 0"));
        }
        if !self.endl.is_ascii() {
            return Err(anyhow!("end line must be an ASCII char, got {:?}", self.endl));
        }

        let mut tasks = self.tasks;
        if self.tasks == 0 {
            tasks = num_cpus::get();
        }

        Ok(
            Config::new(
                self.tmp.clone(),
                "shard-".to_string(),
                ".unshuffled".to_string(),
                tasks,
                self.max_shard_size_bytes,
                self.endl as u8,
                self.seed,
            )
        )
    }

    fn internal_shuffle(input_files: &[PathBuf], output: &Path, config: &Config, shards: usize, phase: &mut Phase) -> Result<ShuffleReport, anyhow::Error> {
        let mut rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        phase.advance(Phase::Sharding)?;
        let (shards, lines_read) = Sharder::new(config, shards).shard(input_files)?;

        phase.advance(Phase::Shuffling)?;
        let shards = Self::shuffle_shards(shards, config, &mut rng)?;
        let shard_lines: Vec<usize> = shards.iter().map(|shard| shard.lines()).collect();

        phase.advance(Phase::Interleaving)?;
        let readers = shards.into_iter()
            .map(|shard| shard.into_reader(config.endl()))
            .collect::<Result<Vec<_>, anyhow::Error>>()?;
        let mut pool = ShardPool::new(readers);
        let lines = Self::write_output(&mut pool, output, &mut rng)?;
        if lines != lines_read {
            return Err(anyhow!("Read {} lines but wrote {}", lines_read, lines));
        }

        phase.advance(Phase::Done)?;
        Ok(
            ShuffleReport {
                shard_lines,
                lines,
            }
        )
    }

    fn shuffle_shards<R: Rng>(shards: Vec<Shard>, config: &Config, rng: &mut R) -> Result<Vec<Shard>, anyhow::Error> {
        log::info!("Start parallel shard shuffle, tasks: {}", config.tasks());
        let shuffled: ShuffledShards = Arc::new(Mutex::new((0..shards.len()).map(|_| None).collect()));
        let failure: Failure = Arc::new(Mutex::new(None));

        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let mut shuffling_pool = thread_pool_builder
            .with_name("shuffling".to_string())
            .with_tasks(config.tasks())
            .with_queue_size(config.queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()?;

        for shard in shards {
            let seed: u64 = rng.gen();
            let shuffle_command = Box::new(
                ShuffleCommand::new(shard, seed, config.endl(), shuffled.clone(), failure.clone())
            );
            shuffling_pool.submit(shuffle_command);
        }

        log::info!("Shutting down shuffling pool");
        shuffling_pool.shutdown();
        shuffling_pool.join()?;

        if let Some(e) = failure.lock().map_err(|e| anyhow!("failure lock poisoned: {}", e))?.take() {
            return Err(e);
        }

        let mut shuffled = shuffled.lock().map_err(|e| anyhow!("shuffled shards lock poisoned: {}", e))?;
        let result = std::mem::take(&mut *shuffled)
            .into_iter()
            .enumerate()
            .map(|(index, shard)| shard.ok_or_else(|| anyhow!("Shard {} was not shuffled", index)))
            .collect::<Result<Vec<Shard>, anyhow::Error>>()?;
        log::info!("Finish parallel shard shuffle");
        Ok(result)
    }

    fn write_output<R: Rng>(pool: &mut ShardPool, output: &Path, rng: &mut R) -> Result<usize, anyhow::Error> {
        let output_file = File::create(output)
            .with_context(|| anyhow!("path: {}", output.display()))?;

        log::info!("Interleaving {} shards into {}", pool.len(), output.display());
        let mut writer = BufWriter::new(output_file);
        let lines = pool.drain_into(&mut writer, rng)
            .with_context(|| anyhow!("path: {}", output.display()))?;
        log::info!("Wrote {} lines to {}", lines, output.display());
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use crate::shuffle::{Shuffle, ShuffleReport};

    fn report() -> ShuffleReport {
        ShuffleReport {
            shard_lines: vec![2, 1],
            lines: 3,
        }
    }

    #[test]
    fn test_restore_failure_keeps_run_error() {
        let result = Shuffle::keep_run_error(Err(anyhow!("write failed")), Err(anyhow!("setrlimit failed")));
        assert_eq!(result.unwrap_err().to_string(), "write failed");
    }

    #[test]
    fn test_restore_failure_after_success() {
        let result = Shuffle::keep_run_error(Ok(report()), Err(anyhow!("setrlimit failed")));
        assert_eq!(result.unwrap_err().to_string(), "setrlimit failed");
    }

    #[test]
    fn test_restore_success() -> Result<(), anyhow::Error> {
        assert_eq!(Shuffle::keep_run_error(Ok(report()), Ok(()))?, report());
        let result = Shuffle::keep_run_error(Err(anyhow!("read failed")), Ok(()));
        assert_eq!(result.unwrap_err().to_string(), "read failed");
        Ok(())
    }
}
