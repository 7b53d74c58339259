//! Byte-stream ring over a mmap'd region, carrying the same length-prefixed
//! frame wire format `conduit_ring::frame` uses over TCP.
//!
//! One [`RingWriter`]/[`RingReader`] pair per direction of a client: `c2s`
//! has a writer in the client process and a reader in the server process,
//! `s2c` the reverse. Both sides map the same file independently — there is
//! exactly one writer and one reader per ring, so this is the same SPSC
//! contract `conduit_ring::Ring<T>` enforces, re-expressed over raw bytes
//! since the payload crosses a process boundary instead of living in one
//! address space.

use std::path::Path;
use std::sync::atomic::Ordering;

use conduit_ring::{Backoff, FrameError, FrameParser};

use crate::layout::RingHeader;
use crate::region::open_or_create;

pub(crate) struct RingWriter {
    mmap: memmap2::MmapMut,
    capacity: u64,
    max_frame: usize,
    scratch: Vec<u8>,
}

impl RingWriter {
    pub(crate) fn open(path: &Path, capacity: usize, max_frame: usize) -> std::io::Result<Self> {
        let (mut mmap, fresh) = open_or_create(path, RingHeader::region_size(capacity))?;
        if fresh {
            RingHeader::init(&mut mmap, capacity);
        }
        Ok(Self {
            mmap,
            capacity: capacity as u64,
            max_frame,
            scratch: Vec::new(),
        })
    }

    fn header(&self) -> &RingHeader {
        RingHeader::from_bytes(&self.mmap)
    }

    /// Encodes and writes one frame if there is room. Returns `Ok(false)`
    /// without touching the ring if it is too full right now.
    pub(crate) fn try_write_frame(&mut self, payload: &[u8]) -> Result<bool, FrameError> {
        self.scratch.clear();
        FrameParser::encode(self.max_frame, payload, &mut self.scratch)?;
        let len = self.scratch.len() as u64;

        let header = self.header();
        let producer = header.producer_cursor.load(Ordering::Relaxed);
        let consumer = header.consumer_cursor.load(Ordering::Acquire);
        let used = producer - consumer;
        if self.capacity - used < len {
            return Ok(false);
        }

        let start = (producer % self.capacity) as usize;
        let payload_area = RingHeader::payload_mut(&mut self.mmap);
        let cap = self.capacity as usize;
        let first = (cap - start).min(self.scratch.len());
        payload_area[start..start + first].copy_from_slice(&self.scratch[..first]);
        if first < self.scratch.len() {
            payload_area[..self.scratch.len() - first].copy_from_slice(&self.scratch[first..]);
        }

        self.header().producer_cursor.store(producer + len, Ordering::Release);
        Ok(true)
    }

    /// Writes one frame, bounded-spinning then yielding until there is
    /// room. Backs off to an async sleep once the spin budget is spent,
    /// since there is no OS-level park primitive shared across processes.
    pub(crate) async fn write_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        let mut backoff = Backoff::new();
        loop {
            if self.try_write_frame(payload)? {
                return Ok(());
            }
            if backoff.is_completed() {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            } else {
                backoff.snooze();
            }
        }
    }
}

pub(crate) struct RingReader {
    mmap: memmap2::MmapMut,
    capacity: u64,
    parser: FrameParser,
    scratch: Vec<u8>,
}

impl RingReader {
    pub(crate) fn open(path: &Path, capacity: usize, max_frame: usize) -> std::io::Result<Self> {
        let (mut mmap, fresh) = open_or_create(path, RingHeader::region_size(capacity))?;
        if fresh {
            RingHeader::init(&mut mmap, capacity);
        }
        Ok(Self {
            mmap,
            capacity: capacity as u64,
            parser: FrameParser::new(max_frame),
            scratch: Vec::new(),
        })
    }

    fn header(&self) -> &RingHeader {
        RingHeader::from_bytes(&self.mmap)
    }

    /// Drains whatever bytes are currently available, invoking `on_frame`
    /// for each complete frame decoded. Returns `Err` if the parser hits a
    /// terminal decode error (a corrupted or incompatible peer).
    pub(crate) fn poll_frames(
        &mut self,
        mut on_frame: impl FnMut(&[u8]),
    ) -> Result<(), FrameError> {
        let header = self.header();
        let producer = header.producer_cursor.load(Ordering::Acquire);
        let consumer = header.consumer_cursor.load(Ordering::Relaxed);
        let available = (producer - consumer) as usize;
        if available == 0 {
            return Ok(());
        }

        self.scratch.clear();
        self.scratch.resize(available, 0);
        let start = (consumer % self.capacity) as usize;
        let payload_area = RingHeader::payload(&self.mmap);
        let cap = self.capacity as usize;
        let first = (cap - start).min(available);
        self.scratch[..first].copy_from_slice(&payload_area[start..start + first]);
        if first < available {
            self.scratch[first..].copy_from_slice(&payload_area[..available - first]);
        }

        let mut decode_error = None;
        let ok = self
            .parser
            .feed(&self.scratch, |frame| on_frame(frame), |e| decode_error = Some(e));
        self.header()
            .consumer_cursor
            .store(consumer + available as u64, Ordering::Release);
        if !ok {
            if let Some(err) = decode_error {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reads_back_frames_through_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.ring");
        let mut writer = RingWriter::open(&path, 1024, 256).unwrap();
        let mut reader = RingReader::open(&path, 1024, 256).unwrap();

        assert!(writer.try_write_frame(b"hello").unwrap());
        assert!(writer.try_write_frame(b"world").unwrap());

        let mut seen = Vec::new();
        reader.poll_frames(|f| seen.push(f.to_vec())).unwrap();
        assert_eq!(seen, vec![b"hello".to_vec(), b"world".to_vec()]);
    }

    #[test]
    fn wraps_around_the_end_of_the_payload_area() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrap.ring");
        let mut writer = RingWriter::open(&path, 32, 256).unwrap();
        let mut reader = RingReader::open(&path, 32, 256).unwrap();

        for _ in 0..3 {
            assert!(writer.try_write_frame(b"0123456789").unwrap());
            let mut seen = Vec::new();
            reader.poll_frames(|f| seen.push(f.to_vec())).unwrap();
            assert_eq!(seen, vec![b"0123456789".to_vec()]);
        }
    }
}
