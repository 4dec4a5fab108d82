use std::path::PathBuf;

#[derive(Clone, Debug)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    tasks: usize,
    queue_size: usize,
    max_shard_size_bytes: u64,
    endl: u8,
    seed: Option<u64>,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tmp_suffix: String,
        tasks: usize,
        max_shard_size_bytes: u64,
        endl: u8,
        seed: Option<u64>,
    ) -> Config {
        let queue_size = 4096;
        Config {
            tmp,
            tmp_prefix,
            tmp_suffix,
            tasks,
            queue_size,
            max_shard_size_bytes,
            endl,
            seed,
        }
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn max_shard_size_bytes(&self) -> u64 {
        self.max_shard_size_bytes
    }

    pub(crate) fn endl(&self) -> u8 {
        self.endl
    }

    pub(crate) fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[cfg(test)]
pub(crate) fn test_config(max_shard_size_bytes: u64) -> Config {
    Config::new(
        std::env::temp_dir(),
        "shard-".to_string(),
        ".test".to_string(),
        2,
        max_shard_size_bytes,
        b'\n',
        Some(7),
    )
}
