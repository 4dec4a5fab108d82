//! This crate implements a shuffle algorithm for text files that are too large to fit in memory.
//!
//! The motivation is data preparation, where records of a file of several gigabytes need to be
//! presented in random order, for example before sampling or splitting a data set.
//!
//! The shuffle runs in three phases:
//! * sharding - the input is read once and line `i` is written to shard `i mod N` where
//! N = ceil(input size / max shard size)
//! * shuffling - each shard is loaded into memory, its lines are permuted uniformly at random and
//! written back. Shards are shuffled concurrently using all available CPU cores
//! * interleaving - a shard is picked uniformly at random and its next line is written to the
//! output, exhausted shards are dropped until no shards remain
//!
//! Memory usage is bounded by the shard size times the number of shuffling tasks. The result is
//! always a permutation of the input. It is a uniform shuffle of the whole file only when the
//! input fits in a single shard, with more shards it is an approximation.
//!
//! # Examples
//! ```no_run
//! use std::path::PathBuf;
//! use text_file_shuffle::shuffle::Shuffle;
//!
//! fn shuffle_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut text_file_shuffle = Shuffle::new(vec![input], output);
//!
//!     // set the directory for shard files. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory with enough free space to hold a copy of the input.
//!     text_file_shuffle.with_tmp_dir(tmp);
//!
//!     // each shard is held in memory while it is shuffled
//!     text_file_shuffle.with_max_shard_size_mb(256);
//!
//!     // use a seed to make the shuffle reproducible
//!     text_file_shuffle.with_seed(1234);
//!
//!     text_file_shuffle.shuffle()?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod shard;
pub(crate) mod shard_pool;
pub(crate) mod shuffle_command;

pub mod phase;
pub mod sharder;
pub mod shuffle;
