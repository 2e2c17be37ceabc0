//! Line-interleaved buffers.
//!
//! A logical byte range is striped over several segments: line `i`
//! (`line_size` bytes) lives in segment `i % n` at offset
//! `(i / n) * line_size`. Callers must hand in buffers that are large
//! enough; violating that panics on the slice bounds.

use alloc::vec;
use alloc::vec::Vec;

pub trait InterleavedBuffer {
    fn line_size(&self) -> usize;
    fn segment_count(&self) -> usize;
    fn segment(&self, index: usize) -> &[u8];
    fn segment_mut(&mut self, index: usize) -> &mut [u8];

    /// Makes a line written through `segment_mut` durable before the next
    /// one is touched. Ordinary memory has nothing to do.
    fn flush_line(&mut self, _segment: usize, _offset: usize, _len: usize) {}

    /// Bytes the whole buffer can hold. Lines are striped whole, so only
    /// lines that fit in every segment count.
    fn capacity(&self) -> usize {
        let line_size = self.line_size();
        if line_size == 0 {
            return 0;
        }
        let lines = (0..self.segment_count())
            .map(|i| self.segment(i).len() / line_size)
            .min()
            .unwrap_or(0);
        lines * line_size * self.segment_count()
    }
}

fn line_location(
    line: usize,
    line_size: usize,
    segment_count: usize,
) -> (usize, usize) {
    (line % segment_count, (line / segment_count) * line_size)
}

/// Copies the first `byte_count` logical bytes of SRC into DST.
pub fn read_interleaved<B: InterleavedBuffer + ?Sized>(
    dst: &mut [u8],
    src: &B,
    byte_count: usize,
) {
    let line_size = src.line_size();
    let segment_count = src.segment_count();
    for (line, chunk) in dst[..byte_count].chunks_mut(line_size).enumerate()
    {
        let (segment, offset) =
            line_location(line, line_size, segment_count);
        chunk.copy_from_slice(
            &src.segment(segment)[offset..offset + chunk.len()],
        );
    }
}

/// Copies the first `byte_count` bytes of SRC into the logical range of
/// DST, flushing every line before moving on.
pub fn write_interleaved<B: InterleavedBuffer + ?Sized>(
    src: &[u8],
    dst: &mut B,
    byte_count: usize,
) {
    let line_size = dst.line_size();
    let segment_count = dst.segment_count();
    for (line, chunk) in src[..byte_count].chunks(line_size).enumerate() {
        let (segment, offset) =
            line_location(line, line_size, segment_count);
        dst.segment_mut(segment)[offset..offset + chunk.len()]
            .copy_from_slice(chunk);
        dst.flush_line(segment, offset, chunk.len());
    }
}

/// Zeroes the first `byte_count` logical bytes of DST.
pub fn clear_interleaved<B: InterleavedBuffer + ?Sized>(
    dst: &mut B,
    byte_count: usize,
) {
    let line_size = dst.line_size();
    let segment_count = dst.segment_count();
    let mut remaining = byte_count;
    let mut line = 0;
    while remaining > 0 {
        let len = remaining.min(line_size);
        let (segment, offset) =
            line_location(line, line_size, segment_count);
        dst.segment_mut(segment)[offset..offset + len].fill(0);
        dst.flush_line(segment, offset, len);
        remaining -= len;
        line += 1;
    }
}

/// Interleaved buffer in ordinary memory.
#[derive(Debug, Clone)]
pub struct MemorySegments {
    line_size: usize,
    segments: Vec<Vec<u8>>,
}

impl MemorySegments {
    pub fn new(
        line_size: usize,
        segment_count: usize,
        segment_size: usize,
    ) -> Self {
        Self {
            line_size,
            segments: vec![vec![0; segment_size]; segment_count],
        }
    }

    /// A single segment; no interleaving at all.
    pub fn flat(size: usize) -> Self {
        Self::new(size.max(1), 1, size)
    }
}

impl InterleavedBuffer for MemorySegments {
    fn line_size(&self) -> usize {
        self.line_size
    }
    fn segment_count(&self) -> usize {
        self.segments.len()
    }
    fn segment(&self, index: usize) -> &[u8] {
        &self.segments[index]
    }
    fn segment_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.segments[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSegments {
        inner: MemorySegments,
        flushed: Vec<(usize, usize, usize)>,
    }

    impl InterleavedBuffer for RecordingSegments {
        fn line_size(&self) -> usize {
            self.inner.line_size()
        }
        fn segment_count(&self) -> usize {
            self.inner.segment_count()
        }
        fn segment(&self, index: usize) -> &[u8] {
            self.inner.segment(index)
        }
        fn segment_mut(&mut self, index: usize) -> &mut [u8] {
            self.inner.segment_mut(index)
        }
        fn flush_line(&mut self, segment: usize, offset: usize, len: usize) {
            self.flushed.push((segment, offset, len));
        }
    }

    #[test]
    fn round_trip_all_shapes() {
        for line_size in [1usize, 4, 64] {
            for segment_count in [1usize, 2, 4] {
                let max = line_size * segment_count * 3 + 7;
                let segment_size = (max / segment_count) + line_size * 2;
                let src: Vec<u8> =
                    (0..max).map(|i| (i * 7 + 3) as u8).collect();
                for byte_count in 0..=max {
                    let mut buffer = MemorySegments::new(
                        line_size,
                        segment_count,
                        segment_size,
                    );
                    write_interleaved(&src, &mut buffer, byte_count);
                    let mut dst = vec![0xAAu8; byte_count];
                    read_interleaved(&mut dst, &buffer, byte_count);
                    assert!(dst[..] == src[..byte_count]);
                }
            }
        }
    }

    #[test]
    fn lines_go_round_robin() {
        let mut buffer = MemorySegments::new(2, 2, 4);
        write_interleaved(&[1, 2, 3, 4, 5, 6, 7], &mut buffer, 7);
        assert!(buffer.segment(0) == [1, 2, 5, 6]);
        assert!(buffer.segment(1) == [3, 4, 7, 0]);
    }

    #[test]
    fn every_line_is_flushed_in_order() {
        let mut buffer = RecordingSegments {
            inner: MemorySegments::new(4, 2, 8),
            flushed: Vec::new(),
        };
        write_interleaved(&[0x55; 10], &mut buffer, 10);
        assert!(buffer.flushed == [(0, 0, 4), (1, 0, 4), (0, 4, 2)]);
    }

    #[test]
    fn clear_only_touches_the_range() {
        let mut buffer = MemorySegments::new(2, 2, 4);
        write_interleaved(&[9; 8], &mut buffer, 8);
        clear_interleaved(&mut buffer, 5);
        assert!(buffer.segment(0) == [0, 0, 0, 9]);
        assert!(buffer.segment(1) == [0, 0, 9, 9]);
    }

    #[test]
    fn capacity_counts_whole_lines_only() {
        // 200 bytes hold three 64-byte lines; the last 8 bytes are unusable.
        let mut buffer = MemorySegments::new(64, 2, 200);
        assert!(buffer.capacity() == 384);
        let src: Vec<u8> = (0..384).map(|i| i as u8).collect();
        write_interleaved(&src, &mut buffer, 384);
        let mut dst = vec![0u8; 384];
        read_interleaved(&mut dst, &buffer, 384);
        assert!(dst == src);

        assert!(MemorySegments::new(0, 2, 200).capacity() == 0);
        assert!(MemorySegments::new(4, 0, 200).capacity() == 0);
        assert!(MemorySegments::flat(100).capacity() == 100);
    }

    #[test]
    #[should_panic]
    fn short_destination_panics() {
        let buffer = MemorySegments::new(4, 2, 8);
        let mut dst = [0u8; 3];
        read_interleaved(&mut dst, &buffer, 4);
    }
}
