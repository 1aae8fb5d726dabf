//! Random-access reading over a forward-only, chunked byte source.
//!
//! [`BufferedChunkStream`] keeps every byte it has pulled so far in an
//! append-only buffer and only asks its [`ChunkSource`] for more when a
//! `read` or `seek` needs bytes that have not arrived yet. Parsers that want
//! `Read + Seek` can therefore work directly on an HTTP response body.

use std::io::{self, Read, Seek, SeekFrom};

use crate::{ProxyError, Result};

/// A single-pass producer of byte chunks.
///
/// `Ok(None)` signals exhaustion and must keep doing so on every later call.
/// Failures are reported through `Err` instead of a normal exhaustion.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

impl<I> ChunkSource for I
where
    I: Iterator<Item = Result<Vec<u8>>>,
{
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.next().transpose()
    }
}

pub struct BufferedChunkStream<S: ChunkSource> {
    source: S,
    buffer: Vec<u8>,
    cursor: usize,
    exhausted: bool,
    chunks_pulled: usize,
}

impl<S: ChunkSource> BufferedChunkStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            cursor: 0,
            exhausted: false,
            chunks_pulled: 0,
        }
    }

    /// Current cursor position.
    pub fn tell(&self) -> u64 {
        self.cursor as u64
    }

    /// Number of bytes pulled from the source so far.
    pub fn materialized_len(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn chunks_pulled(&self) -> usize {
        self.chunks_pulled
    }

    /// Reads `size` bytes from the cursor, or everything left when `size` is
    /// `None`. A shorter result means the source ran out.
    pub fn read(&mut self, size: Option<usize>) -> Result<Vec<u8>> {
        let start = self.cursor;
        let goal = match size {
            None => {
                self.load_all()?;
                self.buffer.len()
            }
            Some(size) => {
                let goal = start.checked_add(size).ok_or_else(|| {
                    ProxyError::InvalidArgument(format!(
                        "reading {} bytes from {} overflows",
                        size, start
                    ))
                })?;
                self.load_until(goal)?;
                goal.min(self.buffer.len())
            }
        };

        if start >= goal {
            return Ok(Vec::new());
        }
        self.cursor = goal;
        Ok(self.buffer[start..goal].to_vec())
    }

    /// Moves the cursor and returns its new position.
    ///
    /// `SeekFrom::End` materializes the whole source since the end is not
    /// known before exhaustion. The other modes never pull.
    pub fn seek(&mut self, position: SeekFrom) -> Result<u64> {
        let target = match position {
            SeekFrom::Start(offset) => usize::try_from(offset).map_err(|_| {
                ProxyError::InvalidArgument(format!(
                    "position {} is out of range",
                    offset
                ))
            })?,
            SeekFrom::Current(offset) => offset_from(self.cursor, offset)?,
            SeekFrom::End(offset) => {
                self.load_all()?;
                offset_from(self.buffer.len(), offset)?
            }
        };
        self.cursor = target;
        Ok(self.tell())
    }

    fn load_all(&mut self) -> Result<()> {
        while self.pull()? {}
        log::trace!(
            "source exhausted after {} chunks, {} bytes",
            self.chunks_pulled,
            self.buffer.len()
        );
        Ok(())
    }

    fn load_until(&mut self, goal: usize) -> Result<()> {
        while self.buffer.len() < goal && self.pull()? {}
        Ok(())
    }

    /// Appends the next chunk, returning `false` once the source is done.
    fn pull(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        match self.source.next_chunk()? {
            Some(chunk) => {
                self.chunks_pulled += 1;
                self.buffer.extend_from_slice(&chunk);
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }
}

fn offset_from(base: usize, offset: i64) -> Result<usize> {
    let target = if offset >= 0 {
        usize::try_from(offset)
            .ok()
            .and_then(|offset| base.checked_add(offset))
    } else {
        usize::try_from(offset.unsigned_abs())
            .ok()
            .and_then(|offset| base.checked_sub(offset))
    };
    target.ok_or_else(|| {
        ProxyError::InvalidArgument(format!(
            "cannot move {} bytes from position {}",
            offset, base
        ))
    })
}

impl<S: ChunkSource> Read for BufferedChunkStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = BufferedChunkStream::read(self, Some(buf.len()))?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

impl<S: ChunkSource> Seek for BufferedChunkStream<S> {
    fn seek(&mut self, position: SeekFrom) -> io::Result<u64> {
        Ok(BufferedChunkStream::seek(self, position)?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.tell())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Yields fixed chunks and counts how often it was asked.
    struct CountingSource {
        chunks: Vec<Vec<u8>>,
        pulls: Rc<Cell<usize>>,
    }

    impl ChunkSource for CountingSource {
        fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
            self.pulls.set(self.pulls.get() + 1);
            if self.chunks.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.chunks.remove(0)))
            }
        }
    }

    fn abcdefghij() -> (BufferedChunkStream<CountingSource>, Rc<Cell<usize>>)
    {
        let pulls = Rc::new(Cell::new(0));
        let source = CountingSource {
            chunks: vec![b"ABCD".to_vec(), b"EFGH".to_vec(), b"IJ".to_vec()],
            pulls: pulls.clone(),
        };
        (BufferedChunkStream::new(source), pulls)
    }

    #[test]
    fn bounded_read_pulls_one_chunk() {
        let (mut stream, pulls) = abcdefghij();
        assert_eq!(stream.read(Some(3)).unwrap(), b"ABC");
        assert_eq!(stream.tell(), 3);
        assert_eq!(pulls.get(), 1);
        assert_eq!(stream.materialized_len(), 4);
    }

    #[test]
    fn sequential_reads_cross_chunks() {
        let (mut stream, pulls) = abcdefghij();
        stream.read(Some(3)).unwrap();
        assert_eq!(stream.read(Some(6)).unwrap(), b"DEFGHI");
        assert_eq!(stream.tell(), 9);
        assert_eq!(pulls.get(), 3);
        assert!(!stream.is_exhausted());
    }

    #[test]
    fn seek_to_end_materializes_everything() {
        let (mut stream, _) = abcdefghij();
        assert_eq!(stream.seek(SeekFrom::End(0)).unwrap(), 10);
        assert_eq!(stream.tell(), 10);
        assert_eq!(stream.chunks_pulled(), 3);
        assert!(stream.is_exhausted());
    }

    #[test]
    fn start_seek_then_read() {
        let (mut stream, pulls) = abcdefghij();
        stream.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(pulls.get(), 0);
        assert_eq!(stream.read(Some(4)).unwrap(), b"CDEF");
        assert_eq!(stream.tell(), 6);
    }

    #[test]
    fn unbounded_read_returns_everything() {
        let (mut stream, _) = abcdefghij();
        assert_eq!(stream.read(None).unwrap(), b"ABCDEFGHIJ");
        assert_eq!(stream.tell(), 10);
    }

    #[test]
    fn oversized_read_is_short() {
        let (mut stream, _) = abcdefghij();
        assert_eq!(stream.read(Some(100)).unwrap(), b"ABCDEFGHIJ");
        assert_eq!(stream.tell(), 10);
    }

    #[test]
    fn reads_after_exhaustion_are_empty() {
        let (mut stream, pulls) = abcdefghij();
        stream.read(None).unwrap();
        let pulls_at_end = pulls.get();

        for size in [0, 1, 5, 100] {
            assert!(stream.read(Some(size)).unwrap().is_empty());
            assert_eq!(stream.tell(), 10);
        }
        assert!(stream.read(None).unwrap().is_empty());
        assert_eq!(pulls.get(), pulls_at_end);
    }

    #[test]
    fn repeated_reads_shrink_to_nothing() {
        let (mut stream, _) = abcdefghij();
        let lengths: Vec<usize> = (0..4)
            .map(|_| stream.read(Some(4)).unwrap().len())
            .collect();
        assert_eq!(lengths, vec![4, 4, 2, 0]);
    }

    #[test]
    fn forward_seek_past_materialized_region_fills_gap() {
        let (mut stream, pulls) = abcdefghij();
        stream.read(Some(1)).unwrap();
        stream.seek(SeekFrom::Start(7)).unwrap();
        assert_eq!(stream.materialized_len(), 4);
        assert_eq!(pulls.get(), 1);

        assert_eq!(stream.read(Some(2)).unwrap(), b"HI");
        assert_eq!(stream.tell(), 9);
    }

    #[test]
    fn seek_beyond_end_reads_nothing() {
        let (mut stream, _) = abcdefghij();
        stream.seek(SeekFrom::Start(50)).unwrap();
        assert!(stream.read(Some(5)).unwrap().is_empty());
        assert_eq!(stream.tell(), 50);
        assert_eq!(stream.materialized_len(), 10);
    }

    #[test]
    fn seek_relative_to_end() {
        let (mut stream, _) = abcdefghij();
        assert_eq!(stream.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert_eq!(stream.read(None).unwrap(), b"HIJ");
    }

    #[test]
    fn negative_positions_are_rejected() {
        let (mut stream, _) = abcdefghij();
        stream.read(Some(2)).unwrap();

        let err = stream.seek(SeekFrom::Current(-3)).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
        assert_eq!(stream.tell(), 2);

        let err = stream.seek(SeekFrom::End(-11)).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
        assert_eq!(stream.tell(), 2);
    }

    #[test]
    fn overflowing_read_is_rejected_before_pulling() {
        let (mut stream, pulls) = abcdefghij();
        stream.seek(SeekFrom::Start(1)).unwrap();
        let err = stream.read(Some(usize::MAX)).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
        assert_eq!(pulls.get(), 0);
    }

    #[rstest]
    #[case(0, 3)]
    #[case(2, 4)]
    #[case(3, 5)]
    #[case(6, 4)]
    #[case(9, 1)]
    fn seek_read_matches_full_slice(#[case] position: u64, #[case] len: usize) {
        let (mut full, _) = abcdefghij();
        let everything = full.read(None).unwrap();

        let (mut stream, _) = abcdefghij();
        stream.seek(SeekFrom::Start(position)).unwrap();
        let bytes = stream.read(Some(len)).unwrap();

        let start = position as usize;
        assert_eq!(bytes, &everything[start..start + len]);
        assert_eq!(stream.tell(), position + len as u64);
    }

    #[test]
    fn materialized_length_never_shrinks() {
        let (mut stream, _) = abcdefghij();
        let mut watermark = 0;
        let mut check = |stream: &BufferedChunkStream<CountingSource>| {
            assert!(stream.materialized_len() >= watermark);
            watermark = stream.materialized_len();
        };

        stream.read(Some(1)).unwrap();
        check(&stream);
        stream.seek(SeekFrom::Start(0)).unwrap();
        check(&stream);
        stream.read(Some(6)).unwrap();
        check(&stream);
        stream.seek(SeekFrom::End(0)).unwrap();
        check(&stream);
        stream.seek(SeekFrom::Start(1)).unwrap();
        check(&stream);
        assert_eq!(stream.materialized_len(), 10);
    }

    #[test]
    fn iterator_source_failure_propagates() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"ABCD".to_vec()),
            Err(ProxyError::UpstreamStatus(502)),
        ];
        let mut stream = BufferedChunkStream::new(chunks.into_iter());

        assert_eq!(stream.read(Some(2)).unwrap(), b"AB");
        let err = stream.read(Some(4)).unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamStatus(502)));
        assert_eq!(stream.tell(), 2);
        assert_eq!(stream.materialized_len(), 4);
    }

    #[test]
    fn io_traits_round_trip_through_std() {
        let (mut stream, _) = abcdefghij();
        let mut buf = [0u8; 3];
        Read::read_exact(&mut stream, &mut buf).unwrap();
        assert_eq!(&buf, b"ABC");

        Seek::seek(&mut stream, SeekFrom::Current(2)).unwrap();
        let mut rest = Vec::new();
        Read::read_to_end(&mut stream, &mut rest).unwrap();
        assert_eq!(rest, b"FGHIJ");

        Seek::rewind(&mut stream).unwrap();
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn io_errors_carry_the_source_failure() {
        let chunks: Vec<Result<Vec<u8>>> = vec![Err(ProxyError::TooLarge {
            length: 20,
            limit: 10,
        })];
        let mut stream = BufferedChunkStream::new(chunks.into_iter());
        let mut buf = [0u8; 4];
        let err = Read::read(&mut stream, &mut buf).unwrap_err();
        assert!(matches!(
            crate::errors::from_io(err),
            ProxyError::TooLarge { length: 20, .. }
        ));
    }
}
