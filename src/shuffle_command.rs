use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::anyhow;
use command_executor::command::Command;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::shard::Shard;

pub(crate) type ShuffledShards = Arc<Mutex<Vec<Option<Shard>>>>;
pub(crate) type Failure = Arc<Mutex<Option<anyhow::Error>>>;

/// Shuffle one shard on a worker thread and hand it back through `shuffled` at its index.
/// The shard is only published once its rewrite is complete.
pub(crate) struct ShuffleCommand {
    shard: Mutex<Option<Shard>>,
    seed: u64,
    endl: u8,
    shuffled: ShuffledShards,
    failure: Failure,
}

impl ShuffleCommand {
    pub(crate) fn new(shard: Shard, seed: u64, endl: u8, shuffled: ShuffledShards, failure: Failure) -> ShuffleCommand {
        ShuffleCommand {
            shard: Mutex::new(Some(shard)),
            seed,
            endl,
            shuffled,
            failure,
        }
    }

    fn shuffle(&self) -> Result<(), anyhow::Error> {
        let mut shard = self.shard
            .lock()
            .map_err(|e| anyhow!("shard lock poisoned: {}", e))?
            .take()
            .ok_or_else(|| anyhow!("shard already shuffled"))?;
        log::info!("Shuffling shard {}, lines: {}, bytes: {}, thread: {}",
            shard.index(),
            shard.lines(),
            shard.bytes(),
            thread::current().name().unwrap_or("unnamed")
        );
        let mut rng = StdRng::seed_from_u64(self.seed);
        shard.shuffle_in_place(&mut rng, self.endl)?;

        let index = shard.index();
        let mut shuffled = self.shuffled
            .lock()
            .map_err(|e| anyhow!("shuffled shards lock poisoned: {}", e))?;
        shuffled[index] = Some(shard);
        Ok(())
    }
}

impl Command for ShuffleCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        if let Err(e) = self.shuffle() {
            log::error!("Shuffle failed: {:?}", e);
            if let Ok(mut failure) = self.failure.lock() {
                if failure.is_none() {
                    *failure = Some(e);
                }
            }
        }
        Ok(())
    }
}
