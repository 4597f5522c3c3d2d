//! Event-oriented reader over a [`RawStream`].
//!
//! # Sequential reading
//! [`ShowerFile::next_shower`] walks the blocks after the run header:
//!
//! ```text
//! RUNH → { EVTH → (LONG | particles | padding)* → EVTE }* → RUNE
//! ```
//!
//! Padding blocks are skipped anywhere.  Every other block out of place is
//! a [`FormatError`]; nothing is silently dropped.  On a seekable source
//! the reader is left at the offending block, so repeating the call
//! reports the same error.
//!
//! # Random access
//! Seekable sources are indexed on first use (one forward scan, cached).
//! Showers loaded through the index keep their particles on disk until
//! [`ShowerFile::particles`] walks them.  Forward-only sources decode
//! particles while reading.

use std::io::Read;
use std::path::Path;

use log::{debug, info};

use crate::block::{describe_head, Block, BlockKind, Layout, WORD_SIZE};
use crate::config::ReaderConfig;
use crate::error::{CorsikaError, FormatError, Result};
use crate::header::{EventHeader, EventTrailer, RunHeader, RunTrailer};
use crate::index::FileIndex;
use crate::io_stream::{RawParticles, RawStream};
use crate::longitudinal::{LongitudinalBlock, LongitudinalProfile};
use crate::particle::{GroundParticles, ParticleOptions, ParticleRecord, ParticleRecords};
use crate::shower::{ParticleSource, Shower};

pub struct ShowerFile {
    stream:            Option<RawStream>,
    config:            ReaderConfig,
    layout:            Layout,
    run_header:        Option<RunHeader>,
    run_trailer:       Option<RunTrailer>,
    index:             Option<FileIndex>,
    current:           Option<Shower>,
    /// Next block for sequential reading.
    cursor:            u64,
    first_event_block: u64,
    events_read:       usize,
}

impl ShowerFile {
    // ── Opening ──────────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P, thinned: Option<bool>) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default().thinned(thinned))
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> Result<Self> {
        let stream = RawStream::open_with_config(path, &config)?;
        Self::from_stream(stream, config)
    }

    /// Read from a forward-only source.  Random access is unavailable.
    pub fn from_reader<R: Read + 'static>(reader: R, thinned: Option<bool>) -> Result<Self> {
        let config = ReaderConfig::default().thinned(thinned);
        let stream = RawStream::from_reader_with_config(reader, &config)?;
        Self::from_stream(stream, config)
    }

    /// Take over an open stream.  The first block must be a run header.
    pub fn from_stream(mut stream: RawStream, config: ReaderConfig) -> Result<Self> {
        if stream.is_seekable() {
            stream.seek_to(0)?;
        }
        let first = match stream.next_block()? {
            Some(b) => b,
            None => return Err(FormatError::NotCorsika("file holds no blocks".to_string()).into()),
        };
        if !first.is(BlockKind::RunHeader) {
            return Err(FormatError::NotCorsika(format!(
                "first block is {} starting with {}, expected RUNH",
                first.kind().name(),
                describe_head(&first.bytes()[..WORD_SIZE]),
            )).into());
        }
        let run_header = RunHeader::decode(&first)?;
        debug!(
            "opened run {} (CORSIKA {}, {} observation levels)",
            run_header.run_number, run_header.version, run_header.n_observation_levels,
        );

        let mut file = Self {
            layout:            stream.layout(),
            stream:            Some(stream),
            config,
            run_header:        Some(run_header),
            run_trailer:       None,
            index:             None,
            current:           None,
            cursor:            first.position() + 1,
            first_event_block: first.position() + 1,
            events_read:       0,
        };
        if file.config.scan_on_open && file.is_seekable() {
            file.index()?;
        }
        Ok(file)
    }

    /// Whether `path` opens as a CORSIKA file.  Never fails.
    pub fn is_valid<P: AsRef<Path>>(path: P) -> bool {
        match Self::open(path.as_ref(), None) {
            Ok(_)  => true,
            Err(e) => {
                debug!("{} is not a valid CORSIKA file: {e}", path.as_ref().display());
                false
            }
        }
    }

    // ── State ────────────────────────────────────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.stream.as_ref().map_or(false, RawStream::is_open)
    }

    pub fn is_thinned(&self) -> bool {
        self.layout.thinned
    }

    pub fn is_seekable(&self) -> bool {
        self.stream.as_ref().map_or(false, RawStream::is_seekable)
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn run_header(&self) -> Result<&RunHeader> {
        self.run_header.as_ref().ok_or(CorsikaError::NotOpen)
    }

    /// Run trailer, once sequential reading has reached it.
    pub fn run_trailer(&self) -> Option<&RunTrailer> {
        self.run_trailer.as_ref()
    }

    pub fn current_shower(&self) -> Result<&Shower> {
        if !self.is_open() {
            return Err(CorsikaError::NotOpen);
        }
        self.current.as_ref().ok_or(CorsikaError::NoCurrentShower)
    }

    // ── Index ────────────────────────────────────────────────────────────────

    /// Event index, scanning the file on first use.
    pub fn index(&mut self) -> Result<&FileIndex> {
        let max = self.config.max_header_search_blocks;
        let stream = self.stream.as_mut().ok_or(CorsikaError::NotOpen)?;
        ensure_index(&mut self.index, stream, max)
    }

    /// Install an index built earlier for the same file.
    pub fn set_index(&mut self, index: FileIndex) {
        self.index = Some(index);
    }

    /// Number of events in the run.
    ///
    /// Forward-only sources learn the count only by reading up to the run
    /// trailer; before that this fails with [`CorsikaError::Unsupported`].
    pub fn n_events(&mut self) -> Result<usize> {
        let max = self.config.max_header_search_blocks;
        let stream = self.stream.as_mut().ok_or(CorsikaError::NotOpen)?;
        if stream.is_seekable() {
            return Ok(ensure_index(&mut self.index, stream, max)?.len());
        }
        if self.run_trailer.is_some() {
            Ok(self.events_read)
        } else {
            Err(CorsikaError::Unsupported(
                "event count of a forward-only stream before its run trailer".to_string(),
            ))
        }
    }

    // ── Random access ────────────────────────────────────────────────────────

    /// Make event `ordinal` (zero-based) the current shower.  Sequential
    /// reading resumes after it.
    pub fn find_event(&mut self, ordinal: usize) -> Result<&Shower> {
        let max = self.config.max_header_search_blocks;
        let stream = self.stream.as_mut().ok_or(CorsikaError::NotOpen)?;
        if !stream.is_seekable() {
            return Err(CorsikaError::Unsupported(
                "random access on a forward-only stream".to_string(),
            ));
        }
        let index = ensure_index(&mut self.index, stream, max)?;
        let (header_pos, trailer_pos) = index.event_span(ordinal)
            .ok_or(CorsikaError::IndexOutOfRange { index: ordinal, len: index.len() })?;
        let long_pos = index.longitudinal_position(ordinal);

        let saved = stream.next_position();
        let shower = match load_indexed(stream, header_pos, trailer_pos, long_pos) {
            Ok(s)  => s,
            Err(e) => {
                stream.seek_to(saved)?;
                return Err(e);
            }
        };
        debug!("found event {} at block {header_pos}", shower.event_number());

        self.cursor = trailer_pos + 1;
        self.run_trailer = None;
        self.events_read = ordinal + 1;
        stream.seek_to(self.cursor)?;
        Ok(&*self.current.insert(shower))
    }

    /// Like [`find_event`](Self::find_event), keyed by the event number
    /// written in the event header.
    pub fn find_event_by_number(&mut self, event_number: u32) -> Result<&Shower> {
        if !self.is_open() {
            return Err(CorsikaError::NotOpen);
        }
        if !self.is_seekable() {
            return Err(CorsikaError::Unsupported(
                "random access on a forward-only stream".to_string(),
            ));
        }
        let ordinal = self.index()?
            .ordinal_of(event_number)
            .ok_or(CorsikaError::EventNotFound(event_number))?;
        self.find_event(ordinal)
    }

    // ── Sequential reading ───────────────────────────────────────────────────

    /// Read the next shower.  `Ok(None)` once the run trailer was read.
    pub fn next_shower(&mut self) -> Result<Option<&Shower>> {
        let stream = self.stream.as_mut().ok_or(CorsikaError::NotOpen)?;
        if self.run_trailer.is_some() {
            return Ok(None);
        }
        let seekable = stream.is_seekable();
        if seekable && stream.next_position() != self.cursor {
            stream.seek_to(self.cursor)?;
        }

        match read_event(stream, !seekable) {
            Ok(EventRead::Shower(shower, next)) => {
                self.cursor = next;
                self.events_read += 1;
                Ok(Some(&*self.current.insert(shower)))
            }
            Ok(EventRead::RunEnd(trailer, next)) => {
                debug!("run trailer after {} events", self.events_read);
                self.cursor = next;
                self.run_trailer = Some(trailer);
                Ok(None)
            }
            Err(e) => {
                let offending = e.as_format().and_then(FormatError::position);
                match offending {
                    Some(pos) if seekable => {
                        self.cursor = pos;
                        stream.seek_to(pos)?;
                    }
                    _ if !seekable => self.cursor = stream.next_position(),
                    _ => {}
                }
                Err(e)
            }
        }
    }

    /// Iterate showers.  Seekable sources restart at the first event;
    /// forward-only sources continue where they are.
    pub fn events(&mut self) -> Events<'_> {
        if self.is_seekable() {
            self.cursor = self.first_event_block;
            self.run_trailer = None;
            self.events_read = 0;
        }
        Events { file: self, done: false }
    }

    /// Particles of the current shower, decoded lazily.
    pub fn particles(&mut self) -> Result<ShowerParticles<'_>> {
        let stream = self.stream.as_mut().ok_or(CorsikaError::NotOpen)?;
        let shower = self.current.as_ref().ok_or(CorsikaError::NoCurrentShower)?;
        match &shower.particles {
            ParticleSource::Materialized(v) => Ok(ShowerParticles::Materialized(v.iter())),
            ParticleSource::Deferred { first_block, end_block } => {
                stream.seek_to(*first_block)?;
                Ok(ShowerParticles::Deferred(RawParticles::new(stream, Some(*end_block))))
            }
        }
    }

    /// Ground particles of the current shower at one observation level, with
    /// history and muon-information records attached instead of yielded.
    ///
    /// A level beyond the run's observation levels falls back to level 1.
    pub fn ground_particles(
        &mut self,
        mut options: ParticleOptions,
    ) -> Result<GroundParticles<ShowerParticles<'_>>> {
        let levels = self.run_header()?.n_observation_levels;
        if options.observation_level > levels {
            info!(
                "observation level {} requested but the run has {levels}; using level 1",
                options.observation_level,
            );
            options.observation_level = 1;
        }
        Ok(GroundParticles::new(self.particles()?, options))
    }

    /// Load the current shower's particles into memory.
    pub fn materialize(&mut self) -> Result<&Shower> {
        let particles = self.particles()?.collect::<Result<Vec<_>>>()?;
        let shower = self.current.as_mut().ok_or(CorsikaError::NoCurrentShower)?;
        shower.particles = ParticleSource::Materialized(particles);
        Ok(&*shower)
    }

    /// Release the source and every cached value.  Calling it again is a
    /// no-op.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.run_header = None;
        self.run_trailer = None;
        self.index = None;
        self.current = None;
    }
}

impl std::fmt::Debug for ShowerFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShowerFile")
            .field("stream", &self.stream)
            .field("run", &self.run_header.as_ref().map(|h| h.run_number))
            .field("cursor", &self.cursor)
            .field("events_read", &self.events_read)
            .finish()
    }
}

// ── Iterators ────────────────────────────────────────────────────────────────

/// Shower iterator returned by [`ShowerFile::events`].  Stops for good after
/// the run trailer or the first error.
pub struct Events<'a> {
    file: &'a mut ShowerFile,
    done: bool,
}

impl Iterator for Events<'_> {
    type Item = Result<Shower>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.file.next_shower() {
            Ok(Some(shower)) => Some(Ok(shower.clone())),
            Ok(None) => {
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

pub enum ShowerParticles<'a> {
    Materialized(std::slice::Iter<'a, ParticleRecord>),
    Deferred(RawParticles<'a>),
}

impl Iterator for ShowerParticles<'_> {
    type Item = Result<ParticleRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ShowerParticles::Materialized(it) => it.next().copied().map(Ok),
            ShowerParticles::Deferred(it)     => it.next(),
        }
    }
}

// ── Internals ────────────────────────────────────────────────────────────────

fn ensure_index<'a>(
    slot:   &'a mut Option<FileIndex>,
    stream: &mut RawStream,
    max:    u64,
) -> Result<&'a FileIndex> {
    let index = match slot.take() {
        Some(index) => index,
        None        => FileIndex::scan(stream, max)?,
    };
    Ok(slot.insert(index))
}

enum EventRead {
    Shower(Shower, u64),
    RunEnd(RunTrailer, u64),
}

/// An event whose trailer has not been seen yet.
struct PendingEvent {
    header_position: u64,
    header:          EventHeader,
    long_blocks:     Vec<LongitudinalBlock>,
    particles:       Vec<ParticleRecord>,
}

impl PendingEvent {
    fn finish(self, trailer: EventTrailer, trailer_position: u64, materialized: bool) -> Shower {
        let longitudinal = if self.long_blocks.is_empty() {
            None
        } else {
            Some(LongitudinalProfile::assemble(&self.long_blocks))
        };
        let particles = if materialized {
            ParticleSource::Materialized(self.particles)
        } else {
            ParticleSource::Deferred {
                first_block: self.header_position + 1,
                end_block:   trailer_position,
            }
        };
        Shower::new(self.header, trailer, longitudinal, particles)
    }
}

fn unexpected(block: &Block, state: &'static str) -> CorsikaError {
    FormatError::UnexpectedBlock { position: block.position(), found: block.kind(), state }.into()
}

fn unterminated(event: &PendingEvent, block: &Block) -> CorsikaError {
    FormatError::UnterminatedEvent {
        header_position: event.header_position,
        position:        block.position(),
        found:           block.kind(),
    }.into()
}

/// Read blocks up to and including the next event trailer or run trailer.
fn read_event(stream: &mut RawStream, materialize: bool) -> Result<EventRead> {
    let mut open: Option<PendingEvent> = None;
    loop {
        let block = match stream.next_block()? {
            Some(b) => b,
            None    => return Err(FormatError::MissingRunTrailer.into()),
        };
        let pos = block.position();
        match block.kind() {
            BlockKind::Control => {}
            BlockKind::RunHeader => return Err(unexpected(&block, "reading events")),
            BlockKind::EventHeader => {
                if let Some(event) = &open {
                    return Err(unterminated(event, &block));
                }
                open = Some(PendingEvent {
                    header_position: pos,
                    header:          EventHeader::decode(&block)?,
                    long_blocks:     Vec::new(),
                    particles:       Vec::new(),
                });
            }
            BlockKind::Longitudinal => {
                let event = open.as_mut().ok_or_else(|| unexpected(&block, "no event is open"))?;
                event.long_blocks.push(LongitudinalBlock::decode(&block)?);
            }
            BlockKind::ParticleData => {
                let event = open.as_mut().ok_or_else(|| unexpected(&block, "no event is open"))?;
                if materialize {
                    event.particles.extend(ParticleRecords::new(&block));
                }
            }
            BlockKind::EventTrailer => {
                let event = open.take().ok_or_else(|| unexpected(&block, "no event is open"))?;
                let trailer = EventTrailer::decode(&block)?;
                return Ok(EventRead::Shower(event.finish(trailer, pos, materialize), pos + 1));
            }
            BlockKind::RunTrailer => {
                if let Some(event) = &open {
                    return Err(unterminated(event, &block));
                }
                return Ok(EventRead::RunEnd(RunTrailer::decode(&block)?, pos + 1));
            }
        }
    }
}

/// Next block, treating end-of-stream as an error.
fn required_block(stream: &mut RawStream) -> Result<Block> {
    let position = stream.next_position();
    stream.next_block()?
        .ok_or_else(|| FormatError::UnexpectedEnd { position }.into())
}

/// Assemble an indexed event without touching its particle blocks.
fn load_indexed(
    stream:      &mut RawStream,
    header_pos:  u64,
    trailer_pos: u64,
    long_pos:    Option<u64>,
) -> Result<Shower> {
    stream.seek_to(header_pos)?;
    let header = EventHeader::decode(&required_block(stream)?)?;

    let longitudinal = match long_pos {
        Some(pos) => Some(read_profile(stream, pos)?),
        None      => None,
    };

    stream.seek_to(trailer_pos)?;
    let trailer = EventTrailer::decode(&required_block(stream)?)?;

    Ok(Shower::new(header, trailer, longitudinal, ParticleSource::Deferred {
        first_block: header_pos + 1,
        end_block:   trailer_pos,
    }))
}

/// Read the profile starting at `first`, following its block count.
fn read_profile(stream: &mut RawStream, first: u64) -> Result<LongitudinalProfile> {
    stream.seek_to(first)?;
    let head = LongitudinalBlock::decode(&required_block(stream)?)?;
    let n_blocks = head.n_blocks.max(1) as usize;

    let mut blocks = Vec::with_capacity(n_blocks);
    blocks.push(head);
    while blocks.len() < n_blocks {
        let block = required_block(stream)?;
        if block.is(BlockKind::Control) {
            continue;
        }
        blocks.push(LongitudinalBlock::decode(&block)?);
    }
    Ok(LongitudinalProfile::assemble(&blocks))
}
