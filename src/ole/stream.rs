//! Read access to a single embedded stream.
//!
//! Streams below the small-stream cutoff are copied into memory up front by
//! walking the small-block chain. Larger streams walk their big-block chain
//! once to build a sorted table of contiguous runs; later reads binary-search
//! that table and go straight to the host byte source.

use super::consts::*;
use super::fat::{BigBlockTable, SmallBlockTable};
use super::source::ByteSource;
use super::tree::Entry;
use crate::common::{DocfileError, Result};
use smallvec::SmallVec;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A stretch of physically consecutive blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    /// Offset of the run's first byte within the stream
    stream_offset: u64,
    /// Host offset of the same byte
    host_offset: u64,
}

#[derive(Debug)]
enum Backing<'a, S> {
    Short(Vec<u8>),
    Long {
        source: &'a S,
        runs: SmallVec<[Run; 4]>,
    },
}

/// A read-only, seekable view of one stream.
///
/// Borrows the [`Docfile`](super::Docfile) it was opened from.
#[derive(Debug)]
pub struct StreamReader<'a, S> {
    backing: Backing<'a, S>,
    size: u64,
    pos: u64,
}

impl<'a, S: ByteSource> StreamReader<'a, S> {
    /// Copy a small-block stream into memory.
    pub(crate) fn short(
        big: &BigBlockTable<S>,
        small: &SmallBlockTable,
        entry: &Entry,
    ) -> Result<Self> {
        let size = entry.size as usize;
        let mut data = Vec::with_capacity(size);
        if size > 0 {
            let mut block = [0u8; SMALL_BLOCK_SIZE];
            for index in small.fat().chain(entry.first_block) {
                small.read_block(big, index?, &mut block)?;
                let take = (size - data.len()).min(SMALL_BLOCK_SIZE);
                data.extend_from_slice(&block[..take]);
                if data.len() == size {
                    break;
                }
            }
        }
        if data.len() < size {
            return Err(DocfileError::CorruptedFile(format!(
                "small block chain holds {} of {size} bytes",
                data.len()
            )));
        }
        Ok(StreamReader {
            backing: Backing::Short(data),
            size: size as u64,
            pos: 0,
        })
    }

    /// Map a big-block stream into a table of contiguous host runs.
    pub(crate) fn long(big: &'a BigBlockTable<S>, entry: &Entry) -> Result<Self> {
        let size = entry.size as u64;
        let needed = size.div_ceil(BIG_BLOCK_SIZE as u64) as usize;
        let mut runs: SmallVec<[Run; 4]> = SmallVec::new();
        let mut mapped = 0usize;
        if needed > 0 {
            for block in big.fat().chain(entry.first_block).take(needed) {
                let block = block?;
                let host = BigBlockTable::<S>::block_offset(block);
                if host >= big.file_len() {
                    return Err(DocfileError::CorruptedFile(format!(
                        "stream block {block} lies past the end of the file"
                    )));
                }
                let stream_offset = (mapped * BIG_BLOCK_SIZE) as u64;
                let contiguous = runs
                    .last()
                    .is_some_and(|r| r.host_offset + (stream_offset - r.stream_offset) == host);
                if !contiguous {
                    runs.push(Run {
                        stream_offset,
                        host_offset: host,
                    });
                }
                mapped += 1;
            }
        }
        if mapped < needed {
            return Err(DocfileError::CorruptedFile(format!(
                "big block chain holds {mapped} of {needed} blocks"
            )));
        }
        Ok(StreamReader {
            backing: Backing::Long {
                source: big.source(),
                runs,
            },
            size,
            pos: 0,
        })
    }

    /// Stream length in bytes
    #[inline]
    pub fn len(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the stream was read through the small-block table
    #[inline]
    pub fn is_short(&self) -> bool {
        matches!(self.backing, Backing::Short(_))
    }

    /// Number of contiguous host runs backing a long stream (zero for short streams)
    pub fn run_count(&self) -> usize {
        match &self.backing {
            Backing::Short(_) => 0,
            Backing::Long { runs, .. } => runs.len(),
        }
    }

    /// Read at `offset` without moving the cursor.
    ///
    /// Reads are truncated at the end of the stream; reading at or past the
    /// end returns `Ok(0)`. Host data ending before the stream does is an
    /// [`io::ErrorKind::UnexpectedEof`] error.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min((self.size - offset) as usize);
        match &self.backing {
            Backing::Short(data) => {
                let start = offset as usize;
                buf[..want].copy_from_slice(&data[start..start + want]);
                Ok(want)
            },
            Backing::Long { source, runs } => {
                let mut done = 0;
                while done < want {
                    let pos = offset + done as u64;
                    let index = runs.partition_point(|r| r.stream_offset <= pos) - 1;
                    let run = runs[index];
                    let run_end = runs.get(index + 1).map_or(self.size, |r| r.stream_offset);
                    let chunk = (want - done).min((run_end - pos) as usize);
                    let host = run.host_offset + (pos - run.stream_offset);
                    let n = source.read_at(host, &mut buf[done..done + chunk])?;
                    if n == 0 {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("stream data ends at host offset {host}"),
                        ));
                    }
                    done += n;
                }
                Ok(done)
            },
        }
    }

    /// Read the whole stream into a vector.
    pub fn read_to_vec(&self) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; self.size as usize];
        let mut filled = 0;
        while filled < data.len() {
            let n = self.read_at(filled as u64, &mut data[filled..])?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream data ends before its declared size",
                ));
            }
            filled += n;
        }
        Ok(data)
    }
}

impl<S: ByteSource> Read for StreamReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: ByteSource> Seek for StreamReader<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(d) => self.size.checked_add_signed(d),
            SeekFrom::Current(d) => self.pos.checked_add_signed(d),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            },
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

/// Streams are read-only: every write fails with [`DocfileError::ReadOnly`].
impl<S: ByteSource> Write for StreamReader<'_, S> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(DocfileError::ReadOnly.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(DocfileError::ReadOnly.into())
    }
}
