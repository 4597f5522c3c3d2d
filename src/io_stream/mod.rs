//! Block-oriented stream over a CORSIKA byte source.
//!
//! # Positions
//! The cursor counts blocks, not bytes: block `n` lives in record `n / 21`
//! at slot `n % 21`.  One record is buffered at a time, so consecutive reads
//! from the same record touch the source once.
//!
//! # Sources
//! Plain files and in-memory buffers are seekable.  Decompressed sources and
//! arbitrary readers are forward-only; on those [`RawStream::seek_to`] fails
//! with [`CorsikaError::Unsupported`].
//!
//! # Truncation
//! A partially written trailing record is a [`FormatError::Truncated`] on a
//! seekable source.  On a forward-only source it is logged and treated as
//! end-of-stream.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, warn};

use crate::block::{Block, BlockKind, Layout, BLOCKS_PER_RECORD};
use crate::codec::{open_decoder, Compression};
use crate::config::ReaderConfig;
use crate::error::{CorsikaError, FormatError, Result};
use crate::particle::{ParticleRecord, ParticleRecords};

/// Bytes inspected to detect compression and the record layout.
const HEAD_LEN: usize = 8;

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

enum Source {
    Seekable(Box<dyn ReadSeek>),
    Streaming(Box<dyn Read>),
}

/// A record held in memory.
struct Record {
    index:   u64,
    payload: Vec<u8>,
}

pub struct RawStream {
    source:      Option<Source>,
    layout:      Layout,
    compression: Compression,
    record:      Option<Record>,
    /// Block handed back by [`RawStream::unread`]; returned by the next read.
    pushback:    Option<Block>,
    /// Next block to read.
    position:    u64,
    /// Forward-only sources: index of the next record in the byte stream.
    next_record: u64,
    /// Forward-only sources: record index where the data ran out.
    end_record:  Option<u64>,
}

impl RawStream {
    // ── Construction ─────────────────────────────────────────────────────────

    /// Open a file, detecting compression and layout.
    ///
    /// `thinned` forces the layout; a file whose record marker says
    /// otherwise is rejected with [`FormatError::ThinningMismatch`].
    pub fn open<P: AsRef<Path>>(path: P, thinned: Option<bool>) -> Result<Self> {
        Self::open_with_config(path, &ReaderConfig::default().thinned(thinned))
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening CORSIKA stream {}", path.display());
        let file = File::open(path)?;
        Self::from_seekable_with_config(file, config)
    }

    /// Wrap a seekable source.  Compressed content is still detected, in
    /// which case the resulting stream is forward-only.
    pub fn from_seekable<R: Read + Seek + 'static>(reader: R, thinned: Option<bool>) -> Result<Self> {
        Self::from_seekable_with_config(reader, &ReaderConfig::default().thinned(thinned))
    }

    pub fn from_seekable_with_config<R: Read + Seek + 'static>(
        mut reader: R,
        config:     &ReaderConfig,
    ) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut head = [0u8; HEAD_LEN];
        let n = read_fully(&mut reader, &mut head)?;
        let compression = config.compression.unwrap_or_else(|| Compression::detect(&head[..n]));
        reader.seek(SeekFrom::Start(0))?;

        if compression.is_compressed() {
            let decoded = open_decoder(compression, reader)?;
            return Self::streaming(decoded, compression, config.thinned);
        }
        let layout = Layout::detect(&head[..n], config.thinned)?;
        Ok(Self::with_source(Source::Seekable(Box::new(reader)), layout, compression))
    }

    /// Wrap a forward-only source such as a pipe or socket.
    pub fn from_reader<R: Read + 'static>(reader: R, thinned: Option<bool>) -> Result<Self> {
        Self::from_reader_with_config(reader, &ReaderConfig::default().thinned(thinned))
    }

    pub fn from_reader_with_config<R: Read + 'static>(
        mut reader: R,
        config:     &ReaderConfig,
    ) -> Result<Self> {
        let mut head = [0u8; HEAD_LEN];
        let n = read_fully(&mut reader, &mut head)?;
        let compression = config.compression.unwrap_or_else(|| Compression::detect(&head[..n]));
        let rejoined = Cursor::new(head[..n].to_vec()).chain(reader);

        let source: Box<dyn Read> = if compression.is_compressed() {
            open_decoder(compression, rejoined)?
        } else {
            Box::new(rejoined)
        };
        Self::streaming(source, compression, config.thinned)
    }

    fn streaming(mut reader: Box<dyn Read>, compression: Compression, thinned: Option<bool>) -> Result<Self> {
        let mut head = [0u8; HEAD_LEN];
        let n = read_fully(&mut reader, &mut head)?;
        let layout = Layout::detect(&head[..n], thinned)?;
        let rejoined = Cursor::new(head[..n].to_vec()).chain(reader);
        Ok(Self::with_source(Source::Streaming(Box::new(rejoined)), layout, compression))
    }

    fn with_source(source: Source, layout: Layout, compression: Compression) -> Self {
        debug!(
            "detected layout: thinned={} marker={} bytes compression={}",
            layout.thinned,
            layout.marker_width.bytes(),
            compression.name(),
        );
        Self {
            source: Some(source),
            layout,
            compression,
            record:      None,
            pushback:    None,
            position:    0,
            next_record: 0,
            end_record:  None,
        }
    }

    // ── Properties ───────────────────────────────────────────────────────────

    #[inline]
    pub fn layout(&self) -> Layout { self.layout }

    #[inline]
    pub fn is_thinned(&self) -> bool { self.layout.thinned }

    #[inline]
    pub fn compression(&self) -> Compression { self.compression }

    pub fn is_seekable(&self) -> bool {
        matches!(self.source, Some(Source::Seekable(_)))
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Block index the next [`next_block`](Self::next_block) call returns.
    #[inline]
    pub fn next_position(&self) -> u64 { self.position }

    // ── Cursor ───────────────────────────────────────────────────────────────

    /// Move the cursor to block `position`.  Positions past the end are
    /// accepted; the next read then reports end-of-stream.
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        match self.source {
            None => Err(CorsikaError::ClosedStream),
            Some(Source::Streaming(_)) => Err(CorsikaError::Unsupported(
                "seek on a forward-only stream".to_string(),
            )),
            Some(Source::Seekable(_)) => {
                self.pushback = None;
                self.position = position;
                Ok(())
            }
        }
    }

    /// Read the block at the cursor and advance past it.  `Ok(None)` marks
    /// end-of-stream.  On error the cursor does not move.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        if self.source.is_none() {
            return Err(CorsikaError::ClosedStream);
        }
        if let Some(block) = self.pushback.take() {
            if block.position() == self.position {
                self.position += 1;
                return Ok(Some(block));
            }
        }
        let position = self.position;
        let record_index = position / BLOCKS_PER_RECORD as u64;
        let slot = (position % BLOCKS_PER_RECORD as u64) as usize;

        let buffered = matches!(&self.record, Some(r) if r.index == record_index);
        if !buffered {
            self.record = None;
            match self.load_record(record_index)? {
                Some(record) => self.record = Some(record),
                None => return Ok(None),
            }
        }
        let payload = match &self.record {
            Some(r) => &r.payload,
            None    => return Ok(None),
        };

        let size = self.layout.block_bytes();
        let bytes = payload[slot * size..(slot + 1) * size].to_vec();
        let block = Block::new(position, self.layout.thinned, bytes)?;
        self.position += 1;
        Ok(Some(block))
    }

    /// Lazily iterate particles from block `start` until the first block
    /// that is neither particle data nor padding.
    pub fn particles(&mut self, start: u64) -> Result<RawParticles<'_>> {
        if self.next_position() != start {
            self.seek_to(start)?;
        }
        Ok(RawParticles::new(self, None))
    }

    /// Release the source.  Further reads fail with
    /// [`CorsikaError::ClosedStream`].  Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            debug!("closed CORSIKA stream at block {}", self.position);
        }
        self.record = None;
        self.pushback = None;
    }

    /// Hand back the block just read; the cursor moves back onto it.
    pub(crate) fn unread(&mut self, block: Block) {
        self.position = block.position();
        self.pushback = Some(block);
    }

    // ── Record I/O ───────────────────────────────────────────────────────────

    fn load_record(&mut self, index: u64) -> Result<Option<Record>> {
        let layout = self.layout;
        let first_block = index * BLOCKS_PER_RECORD as u64;
        match self.source.as_mut() {
            None => Err(CorsikaError::ClosedStream),
            Some(Source::Seekable(reader)) => {
                let offset = match layout.record_offset(first_block) {
                    Some(offset) => offset,
                    None         => return Ok(None),
                };
                reader.seek(SeekFrom::Start(offset))?;
                match read_record(reader, layout, first_block)? {
                    RecordRead::Complete(payload) => Ok(Some(Record { index, payload })),
                    RecordRead::End => Ok(None),
                    RecordRead::Partial { got, expected } => Err(FormatError::Truncated {
                        position: first_block,
                        got,
                        expected,
                    }.into()),
                }
            }
            Some(Source::Streaming(reader)) => {
                if self.end_record.map_or(false, |end| index >= end) {
                    return Ok(None);
                }
                if index != self.next_record {
                    return Err(CorsikaError::Unsupported(format!(
                        "record {index} requested but forward-only stream is at record {}",
                        self.next_record
                    )));
                }
                match read_record(reader, layout, first_block)? {
                    RecordRead::Complete(payload) => {
                        self.next_record += 1;
                        Ok(Some(Record { index, payload }))
                    }
                    RecordRead::End => {
                        self.end_record = Some(index);
                        Ok(None)
                    }
                    RecordRead::Partial { got, expected } => {
                        warn!(
                            "truncated record at block {first_block} ({got} of {expected} bytes); \
                             treating as end of stream"
                        );
                        self.end_record = Some(index);
                        Ok(None)
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RawStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStream")
            .field("layout", &self.layout)
            .field("compression", &self.compression)
            .field("seekable", &self.is_seekable())
            .field("open", &self.is_open())
            .field("position", &self.position)
            .finish()
    }
}

enum RecordRead {
    Complete(Vec<u8>),
    End,
    Partial { got: usize, expected: usize },
}

/// Read one framed record and check both markers.
fn read_record<R: Read + ?Sized>(reader: &mut R, layout: Layout, first_block: u64) -> Result<RecordRead> {
    let width = layout.marker_width.bytes();
    let payload_len = layout.record_payload_bytes();
    let expected = layout.record_bytes();

    let mut buf = vec![0u8; expected];
    let got = read_fully(reader, &mut buf)?;
    if got == 0 {
        return Ok(RecordRead::End);
    }
    if got < expected {
        return Ok(RecordRead::Partial { got, expected });
    }

    let leading  = layout.marker_width.read(&buf[..width]);
    let trailing = layout.marker_width.read(&buf[width + payload_len..]);
    if leading != payload_len as u64 {
        return Err(FormatError::BadRecordMarker { marker: leading }.into());
    }
    if trailing != leading {
        return Err(FormatError::MarkerMismatch { position: first_block, leading, trailing }.into());
    }
    buf.truncate(width + payload_len);
    buf.drain(..width);
    Ok(RecordRead::Complete(buf))
}

/// Fill `buf` as far as the source allows.  Returns the byte count read.
fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ── Particle iteration ───────────────────────────────────────────────────────

/// Lazy, forward-only particle iterator over consecutive blocks.
///
/// Unbounded iterators stop at the first header, trailer or LONG block;
/// bounded ones read up to `end` and skip every non-particle block.
pub struct RawParticles<'a> {
    stream:  &'a mut RawStream,
    end:     Option<u64>,
    pending: std::vec::IntoIter<ParticleRecord>,
    done:    bool,
}

impl<'a> RawParticles<'a> {
    pub(crate) fn new(stream: &'a mut RawStream, end: Option<u64>) -> Self {
        Self { stream, end, pending: Vec::new().into_iter(), done: false }
    }

    fn refill(&mut self) -> Result<bool> {
        loop {
            if self.end.map_or(false, |end| self.stream.next_position() >= end) {
                return Ok(false);
            }
            let block = match self.stream.next_block()? {
                Some(b) => b,
                None    => return Ok(false),
            };
            match block.kind() {
                BlockKind::ParticleData => {
                    let records: Vec<ParticleRecord> = ParticleRecords::new(&block).collect();
                    if !records.is_empty() {
                        self.pending = records.into_iter();
                        return Ok(true);
                    }
                }
                BlockKind::Control => {}
                _ if self.end.is_some() => {}
                _ => {
                    // Leave the terminating block for the next reader.
                    self.stream.unread(block);
                    return Ok(false);
                }
            }
        }
    }
}

impl Iterator for RawParticles<'_> {
    type Item = Result<ParticleRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(p) = self.pending.next() {
            return Some(Ok(p));
        }
        if self.done {
            return None;
        }
        match self.refill() {
            Ok(true) => self.pending.next().map(Ok),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
