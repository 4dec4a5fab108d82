use std::io::Write;

use anyhow::Context;
use rand::Rng;

use crate::shard::ShardReader;

/// The shards that still have lines to give. The pool only shrinks.
pub(crate) struct ShardPool {
    readers: Vec<ShardReader>,
}

impl ShardPool {
    pub(crate) fn new(readers: Vec<ShardReader>) -> ShardPool {
        ShardPool {
            readers,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.readers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Draw shards uniformly at random until one yields a line. Exhausted shards are removed with
    /// swap_remove and their temp files released. Returns false when the pool is empty.
    pub(crate) fn next_line<R: Rng + ?Sized>(&mut self, rng: &mut R, line: &mut Vec<u8>) -> Result<bool, anyhow::Error> {
        while !self.is_empty() {
            let index = rng.gen_range(0..self.readers.len());
            if self.readers[index].read_line(line)? {
                return Ok(true);
            }
            let exhausted = self.readers.swap_remove(index);
            log::info!("Closing shard {}, remaining: {}", exhausted.index(), self.readers.len());
        }
        Ok(false)
    }

    /// Interleave all remaining lines into `writer`, returning the number of lines written
    pub(crate) fn drain_into<W: Write, R: Rng + ?Sized>(&mut self, writer: &mut W, rng: &mut R) -> Result<usize, anyhow::Error> {
        let mut written: usize = 0;
        let mut line = Vec::new();
        while self.next_line(rng, &mut line)? {
            writer.write_all(&line)
                .with_context(|| format!("Failed to write line {}", written))?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}
