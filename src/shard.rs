use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use anyhow::{anyhow, Context};
use rand::seq::SliceRandom;
use rand::Rng;
use tempfile::{Builder, NamedTempFile};

use crate::config::Config;

pub(crate) fn create_tmp_file(config: &Config) -> Result<NamedTempFile, anyhow::Error> {
    Builder::new()
        .prefix(config.tmp_prefix())
        .suffix(config.tmp_suffix())
        .tempfile_in(config.tmp())
        .with_context(|| format!("Failed to create new temp file in {}", config.tmp().display()))
}

/// Uniform random permutation of `lines`, every ordering equally likely
pub(crate) fn permute<T, R: Rng + ?Sized>(lines: &mut [T], rng: &mut R) {
    lines.shuffle(rng);
}

/// A shard while it is being filled by the sharder. Lines are appended in arrival order.
#[derive(Debug)]
pub(crate) struct ShardWriter {
    index: usize,
    writer: BufWriter<NamedTempFile>,
    lines: usize,
    bytes: u64,
}

impl ShardWriter {
    pub(crate) fn new(index: usize, config: &Config) -> Result<ShardWriter, anyhow::Error> {
        let file = create_tmp_file(config)?;
        Ok(
            ShardWriter {
                index,
                writer: BufWriter::new(file),
                lines: 0,
                bytes: 0,
            }
        )
    }

    /// `line` must include its delimiter
    pub(crate) fn append(&mut self, line: &[u8]) -> Result<(), anyhow::Error> {
        self.writer.write_all(line)
            .with_context(|| format!("Failed to write to shard {}", self.index))?;
        self.lines += 1;
        self.bytes += line.len() as u64;
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<Shard, anyhow::Error> {
        let index = self.index;
        let file = self.writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("Failed to flush shard {}", index))?;
        Ok(
            Shard {
                index,
                file,
                lines: self.lines,
                bytes: self.bytes,
            }
        )
    }
}

/// A fully written shard. The backing temp file is removed when the shard is dropped.
#[derive(Debug)]
pub(crate) struct Shard {
    index: usize,
    file: NamedTempFile,
    lines: usize,
    bytes: u64,
}

impl Shard {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn lines(&self) -> usize {
        self.lines
    }

    pub(crate) fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Load the shard into memory, permute its lines and rewrite it in place. The shard is left
    /// positioned at its first line.
    pub(crate) fn shuffle_in_place<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        endl: u8,
    ) -> Result<(), anyhow::Error> {
        let size = usize::try_from(self.bytes)
            .with_context(|| {
                format!("Shard {} of {} bytes exceeds addressable memory", self.index, self.bytes)
            })?;

        let mut buffer: Vec<u8> = Vec::new();
        buffer.try_reserve_exact(size)
            .map_err(|e| {
                anyhow!("Shard {} of {} bytes does not fit in memory: {}", self.index, self.bytes, e)
            })?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read shard {}", self.index))?;

        let mut lines: Vec<&[u8]> = Vec::new();
        lines.try_reserve_exact(self.lines)
            .map_err(|e| {
                anyhow!("Shard {} with {} lines does not fit in memory: {}", self.index, self.lines, e)
            })?;
        lines.extend(buffer.split_inclusive(|b| *b == endl));
        if lines.len() != self.lines {
            return Err(
                anyhow!("Shard {} expected {} lines, found {}", self.index, self.lines, lines.len())
            );
        }

        permute(&mut lines, rng);

        self.file.as_file().set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        let mut writer = BufWriter::new(self.file.as_file_mut());
        for line in &lines {
            writer.write_all(line)?;
        }
        writer.flush()
            .with_context(|| format!("Failed to rewrite shard {}", self.index))?;
        drop(writer);
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    pub(crate) fn into_reader(mut self, endl: u8) -> Result<ShardReader, anyhow::Error> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(
            ShardReader {
                index: self.index,
                reader: BufReader::new(self.file),
                endl,
            }
        )
    }
}

/// Sequential forward reader over a shuffled shard
#[derive(Debug)]
pub(crate) struct ShardReader {
    index: usize,
    reader: BufReader<NamedTempFile>,
    endl: u8,
}

impl ShardReader {
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Replace the contents of `line` with the next line. Returns false once the shard is exhausted.
    pub(crate) fn read_line(&mut self, line: &mut Vec<u8>) -> Result<bool, anyhow::Error> {
        line.clear();
        let bytes = self.reader.read_until(self.endl, line)
            .with_context(|| format!("Failed to read shard {}", self.index))?;
        Ok(bytes > 0)
    }
}
