use crate::ole::source::ByteSource;
use std::io;
use tracing::trace;

/// Size of the cache window; a multiple of the big block size
pub(crate) const CACHE_WINDOW_SIZE: usize = 4096;

/// A single aligned window of the host source kept in memory.
///
/// On a miss the window moves to the aligned range containing the requested
/// bytes and is refilled with one read.
#[derive(Debug)]
pub(crate) struct CacheWindow {
    buf: Box<[u8; CACHE_WINDOW_SIZE]>,
    /// Host offset of `buf[0]`
    start: u64,
    /// Number of valid bytes in `buf`
    filled: usize,
}

impl CacheWindow {
    pub(crate) fn new() -> Self {
        Self {
            buf: Box::new([0u8; CACHE_WINDOW_SIZE]),
            start: 0,
            filled: 0,
        }
    }

    #[inline]
    fn covers(&self, offset: u64, len: usize) -> bool {
        offset >= self.start && offset + len as u64 <= self.start + self.filled as u64
    }

    /// Copy `out.len()` bytes at host `offset` into `out`.
    ///
    /// The range must not straddle a window boundary, which holds for any
    /// block-aligned read of at most one block.
    pub(crate) fn read<S: ByteSource + ?Sized>(
        &mut self,
        source: &S,
        offset: u64,
        out: &mut [u8],
    ) -> io::Result<()> {
        if !self.covers(offset, out.len()) {
            let start = offset - offset % CACHE_WINDOW_SIZE as u64;
            trace!(offset, window = start, "block cache miss");
            self.filled = 0;
            let mut filled = 0;
            while filled < CACHE_WINDOW_SIZE {
                match source.read_at(start + filled as u64, &mut self.buf[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                    Err(e) => return Err(e),
                }
            }
            self.start = start;
            self.filled = filled;
            if !self.covers(offset, out.len()) {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("block at offset {offset} extends past end of file"),
                ));
            }
        }
        let at = (offset - self.start) as usize;
        out.copy_from_slice(&self.buf[at..at + out.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        data: Vec<u8>,
        reads: Cell<usize>,
    }

    impl ByteSource for CountingSource {
        fn len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            self.data.read_at(offset, buf)
        }
    }

    #[test]
    fn test_window_serves_neighbouring_blocks() {
        let source = CountingSource {
            data: (0..10_000u32).map(|v| v as u8).collect(),
            reads: Cell::new(0),
        };
        let mut cache = CacheWindow::new();
        let mut block = [0u8; 512];

        cache.read(&source, 512, &mut block).unwrap();
        assert_eq!(block[0], (512u32 % 256) as u8);
        let after_first = source.reads.get();
        cache.read(&source, 3584, &mut block).unwrap();
        assert_eq!(source.reads.get(), after_first);

        cache.read(&source, 4096, &mut block).unwrap();
        assert!(source.reads.get() > after_first);
        assert_eq!(block[1], 1);
    }

    #[test]
    fn test_short_tail_is_an_error() {
        let source = vec![0u8; 4096 + 100];
        let mut cache = CacheWindow::new();
        let mut block = [0u8; 512];
        let err = cache.read(&source, 4096, &mut block).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
