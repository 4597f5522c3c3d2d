//! Fixed-size CORSIKA blocks and the on-disk record layout.
//!
//! # Layout
//! A block is 273 little-endian `f32` words (39 particles × 7 words) in an
//! unthinned run, or 312 words (39 × 8) when thinning weights are written.
//! 21 blocks form one Fortran unformatted record, framed by a leading and a
//! trailing record-length marker:
//!
//! ```text
//! [marker][block 0][block 1] … [block 20][marker]
//! ```
//!
//! Markers are 4 bytes on 32-bit Fortran builds and 8 bytes on 64-bit ones.
//! Both carry the payload length (22932 or 26208 bytes).
//!
//! # Classification
//! The first word of a header or trailer block holds a four-character
//! sentinel.  Blocks with no sentinel are particle data, unless every byte
//! is zero, which marks padding at the end of a record.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::FormatError;

// ── Layout constants ─────────────────────────────────────────────────────────

pub const WORD_SIZE:            usize = 4;
pub const PARTICLES_PER_BLOCK:  usize = 39;
pub const BLOCKS_PER_RECORD:    usize = 21;
pub const WORDS_PER_PARTICLE_UNTHINNED: usize = 7;
pub const WORDS_PER_PARTICLE_THINNED:   usize = 8;

pub const BLOCK_WORDS_UNTHINNED: usize = PARTICLES_PER_BLOCK * WORDS_PER_PARTICLE_UNTHINNED;
pub const BLOCK_WORDS_THINNED:   usize = PARTICLES_PER_BLOCK * WORDS_PER_PARTICLE_THINNED;

/// Record payload length in bytes, as stored in the record markers.
pub const RECORD_PAYLOAD_UNTHINNED: usize = BLOCK_WORDS_UNTHINNED * WORD_SIZE * BLOCKS_PER_RECORD;
pub const RECORD_PAYLOAD_THINNED:   usize = BLOCK_WORDS_THINNED   * WORD_SIZE * BLOCKS_PER_RECORD;

// ── Sentinels ────────────────────────────────────────────────────────────────

pub const SENTINEL_RUN_HEADER:   &[u8; 4] = b"RUNH";
pub const SENTINEL_EVENT_HEADER: &[u8; 4] = b"EVTH";
pub const SENTINEL_LONGITUDINAL: &[u8; 4] = b"LONG";
pub const SENTINEL_EVENT_TRAILER:&[u8; 4] = b"EVTE";
pub const SENTINEL_RUN_TRAILER:  &[u8; 4] = b"RUNE";

/// Largest magnitude a particle description word can plausibly take.
const MAX_DESCRIPTION: f32 = 1.0e8;

// ── Layout ───────────────────────────────────────────────────────────────────

/// Width of the Fortran record-length markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerWidth {
    Bits32,
    Bits64,
}

impl MarkerWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            MarkerWidth::Bits32 => 4,
            MarkerWidth::Bits64 => 8,
        }
    }

    pub fn read(self, buf: &[u8]) -> u64 {
        match self {
            MarkerWidth::Bits32 => LittleEndian::read_u32(buf) as u64,
            MarkerWidth::Bits64 => LittleEndian::read_u64(buf),
        }
    }
}

/// Thinning flag plus marker width.  Fixed for the lifetime of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    pub thinned:      bool,
    pub marker_width: MarkerWidth,
}

impl Layout {
    pub const fn new(thinned: bool, marker_width: MarkerWidth) -> Self {
        Self { thinned, marker_width }
    }

    /// Detect the layout from the first 8 bytes of a file.
    ///
    /// The leading record marker is read both as a 32-bit and as a 64-bit
    /// little-endian integer; whichever equals a known payload length
    /// decides the layout.  When `requested` forces a thinning mode that the
    /// marker contradicts, detection fails with
    /// [`FormatError::ThinningMismatch`].
    pub fn detect(head: &[u8], requested: Option<bool>) -> Result<Self, FormatError> {
        if head.len() < 8 {
            return Err(FormatError::NotCorsika(format!(
                "file too short for a record marker ({} bytes)", head.len()
            )));
        }
        let len32 = LittleEndian::read_u32(&head[..4]) as u64;
        let len64 = LittleEndian::read_u64(&head[..8]);

        let thinned = if Self::is_payload(len64, true) || Self::is_payload(len32, true) {
            true
        } else if Self::is_payload(len64, false) || Self::is_payload(len32, false) {
            false
        } else {
            return Err(FormatError::BadRecordMarker { marker: len32 });
        };

        if let Some(requested) = requested {
            if requested != thinned {
                return Err(FormatError::ThinningMismatch { requested, detected: thinned });
            }
        }

        let marker_width = if Self::is_payload(len64, thinned) {
            MarkerWidth::Bits64
        } else {
            MarkerWidth::Bits32
        };
        Ok(Self { thinned, marker_width })
    }

    fn is_payload(marker: u64, thinned: bool) -> bool {
        let expected = if thinned { RECORD_PAYLOAD_THINNED } else { RECORD_PAYLOAD_UNTHINNED };
        marker == expected as u64
    }

    #[inline]
    pub fn words_per_particle(&self) -> usize {
        if self.thinned { WORDS_PER_PARTICLE_THINNED } else { WORDS_PER_PARTICLE_UNTHINNED }
    }

    #[inline]
    pub fn block_words(&self) -> usize {
        PARTICLES_PER_BLOCK * self.words_per_particle()
    }

    #[inline]
    pub fn block_bytes(&self) -> usize {
        self.block_words() * WORD_SIZE
    }

    #[inline]
    pub fn record_payload_bytes(&self) -> usize {
        self.block_bytes() * BLOCKS_PER_RECORD
    }

    /// Record size on disk, markers included.
    #[inline]
    pub fn record_bytes(&self) -> usize {
        self.record_payload_bytes() + 2 * self.marker_width.bytes()
    }

    /// Byte offset of the record holding block `position`.  `None` when the
    /// offset does not fit in a file offset.
    pub fn record_offset(&self, position: u64) -> Option<u64> {
        (position / BLOCKS_PER_RECORD as u64)
            .checked_mul(self.record_bytes() as u64)
            .filter(|&offset| offset <= i64::MAX as u64)
    }
}

// ── BlockKind ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    RunHeader,
    EventHeader,
    ParticleData,
    Longitudinal,
    EventTrailer,
    RunTrailer,
    /// All-zero padding.
    Control,
}

impl BlockKind {
    pub fn name(self) -> &'static str {
        match self {
            BlockKind::RunHeader    => "RUNH",
            BlockKind::EventHeader  => "EVTH",
            BlockKind::ParticleData => "particle data",
            BlockKind::Longitudinal => "LONG",
            BlockKind::EventTrailer => "EVTE",
            BlockKind::RunTrailer   => "RUNE",
            BlockKind::Control      => "control",
        }
    }

    pub fn is_header_or_trailer(self) -> bool {
        matches!(
            self,
            BlockKind::RunHeader | BlockKind::EventHeader
                | BlockKind::EventTrailer | BlockKind::RunTrailer
        )
    }
}

/// Classify a raw block from its content alone.
pub fn classify(buffer: &[u8]) -> Result<BlockKind, FormatError> {
    classify_at(buffer, 0)
}

pub(crate) fn classify_at(buffer: &[u8], position: u64) -> Result<BlockKind, FormatError> {
    if buffer.len() < WORD_SIZE {
        return Err(FormatError::Truncated { position, got: buffer.len(), expected: WORD_SIZE });
    }
    let head: &[u8] = &buffer[..4];
    let kind = match head {
        h if h == SENTINEL_RUN_HEADER    => BlockKind::RunHeader,
        h if h == SENTINEL_EVENT_HEADER  => BlockKind::EventHeader,
        h if h == SENTINEL_LONGITUDINAL  => BlockKind::Longitudinal,
        h if h == SENTINEL_EVENT_TRAILER => BlockKind::EventTrailer,
        h if h == SENTINEL_RUN_TRAILER   => BlockKind::RunTrailer,
        _ if buffer.iter().all(|&b| b == 0) => BlockKind::Control,
        h => {
            if looks_like_sentinel(h) {
                return Err(FormatError::UnknownSentinel {
                    position,
                    sentinel: describe_head(h),
                });
            }
            BlockKind::ParticleData
        }
    };
    Ok(kind)
}

/// Four capital letters that do not decode to a particle description.
fn looks_like_sentinel(head: &[u8]) -> bool {
    if !head.iter().all(|b| b.is_ascii_uppercase()) {
        return false;
    }
    let value = LittleEndian::read_f32(head);
    value.fract() != 0.0 || value.abs() >= MAX_DESCRIPTION
}

/// Leading bytes for messages: quoted when printable ASCII, hex otherwise.
pub(crate) fn describe_head(head: &[u8]) -> String {
    if head.iter().all(u8::is_ascii_graphic) {
        format!("\"{}\"", head.iter().map(|&b| b as char).collect::<String>())
    } else {
        format!("0x{}", hex::encode(head))
    }
}

// ── Block ────────────────────────────────────────────────────────────────────

/// One decoded block.  Produced fresh by every read; owns its bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    position: u64,
    kind:     BlockKind,
    thinned:  bool,
    data:     Vec<u8>,
}

impl Block {
    /// Classify `data` and wrap it.  `data` must hold exactly one block.
    pub fn new(position: u64, thinned: bool, data: Vec<u8>) -> Result<Self, FormatError> {
        let layout = Layout::new(thinned, MarkerWidth::Bits32);
        if data.len() != layout.block_bytes() {
            return Err(FormatError::Truncated {
                position,
                got:      data.len(),
                expected: layout.block_bytes(),
            });
        }
        let kind = classify_at(&data, position)?;
        Ok(Self { position, kind, thinned, data })
    }

    /// Block index within the stream.
    #[inline]
    pub fn position(&self) -> u64 { self.position }

    #[inline]
    pub fn kind(&self) -> BlockKind { self.kind }

    #[inline]
    pub fn is_thinned(&self) -> bool { self.thinned }

    #[inline]
    pub fn bytes(&self) -> &[u8] { &self.data }

    #[inline]
    pub fn len_words(&self) -> usize { self.data.len() / WORD_SIZE }

    /// Word `index` as a float.  Out-of-range indices read as zero.
    #[inline]
    pub fn word(&self, index: usize) -> f32 {
        let start = index * WORD_SIZE;
        match self.data.get(start..start + WORD_SIZE) {
            Some(w) => LittleEndian::read_f32(w),
            None    => 0.0,
        }
    }

    /// Word `index` truncated to an unsigned integer.
    #[inline]
    pub fn word_u32(&self, index: usize) -> u32 {
        self.word(index) as u32
    }

    /// `count` consecutive words starting at `start`.
    pub fn words(&self, start: usize, count: usize) -> Vec<f32> {
        (start..start + count).map(|i| self.word(i)).collect()
    }

    pub fn is(&self, kind: BlockKind) -> bool {
        self.kind == kind
    }

    /// Fail with [`FormatError::UnexpectedBlock`] unless this block is `kind`.
    pub(crate) fn expect_kind(&self, kind: BlockKind, state: &'static str) -> Result<(), FormatError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(FormatError::UnexpectedBlock { position: self.position, found: self.kind, state })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{block_bytes, sentinel_block};

    #[test]
    fn payload_sizes() {
        assert_eq!(RECORD_PAYLOAD_UNTHINNED, 22932);
        assert_eq!(RECORD_PAYLOAD_THINNED, 26208);
        assert_eq!(BLOCK_WORDS_UNTHINNED, 273);
        assert_eq!(BLOCK_WORDS_THINNED, 312);
    }

    #[test]
    fn detect_all_layouts() {
        for thinned in [false, true] {
            let payload = if thinned { RECORD_PAYLOAD_THINNED } else { RECORD_PAYLOAD_UNTHINNED };

            let mut head = [0u8; 8];
            head[..4].copy_from_slice(&(payload as u32).to_le_bytes());
            head[4..].copy_from_slice(b"RUNH");
            let l = Layout::detect(&head, None).unwrap();
            assert_eq!(l, Layout::new(thinned, MarkerWidth::Bits32));

            let head = (payload as u64).to_le_bytes();
            let l = Layout::detect(&head, None).unwrap();
            assert_eq!(l, Layout::new(thinned, MarkerWidth::Bits64));
        }
    }

    #[test]
    fn detect_rejects_forced_mismatch() {
        let mut head = [0u8; 8];
        head[..4].copy_from_slice(&(RECORD_PAYLOAD_UNTHINNED as u32).to_le_bytes());
        head[4..].copy_from_slice(b"RUNH");
        match Layout::detect(&head, Some(true)) {
            Err(FormatError::ThinningMismatch { requested: true, detected: false }) => {}
            other => panic!("unexpected {other:?}"),
        }
        assert!(Layout::detect(&head, Some(false)).is_ok());
    }

    #[test]
    fn detect_rejects_garbage() {
        assert!(matches!(
            Layout::detect(b"GARBAGE!", None),
            Err(FormatError::BadRecordMarker { .. })
        ));
        assert!(matches!(Layout::detect(b"abc", None), Err(FormatError::NotCorsika(_))));
    }

    #[test]
    fn record_offsets() {
        let l = Layout::new(false, MarkerWidth::Bits32);
        assert_eq!(l.record_bytes(), 22940);
        assert_eq!(l.record_offset(0), Some(0));
        assert_eq!(l.record_offset(20), Some(0));
        assert_eq!(l.record_offset(21), Some(22940));
        assert_eq!(l.record_offset(45), Some(2 * 22940));
        assert_eq!(l.record_offset(u64::MAX), None);
    }

    #[test]
    fn classify_sentinels() {
        assert_eq!(classify(&sentinel_block(b"RUNH", false)).unwrap(), BlockKind::RunHeader);
        assert_eq!(classify(&sentinel_block(b"EVTH", false)).unwrap(), BlockKind::EventHeader);
        assert_eq!(classify(&sentinel_block(b"LONG", true)).unwrap(),  BlockKind::Longitudinal);
        assert_eq!(classify(&sentinel_block(b"EVTE", false)).unwrap(), BlockKind::EventTrailer);
        assert_eq!(classify(&sentinel_block(b"RUNE", true)).unwrap(),  BlockKind::RunTrailer);
        assert_eq!(classify(&vec![0u8; 1092]).unwrap(), BlockKind::Control);
    }

    #[test]
    fn classify_particles_and_unknown_sentinels() {
        let mut words = vec![0.0f32; BLOCK_WORDS_UNTHINNED];
        words[0] = 5011.0;
        assert_eq!(classify(&block_bytes(&words)).unwrap(), BlockKind::ParticleData);

        match classify(&sentinel_block(b"ABCD", false)) {
            Err(FormatError::UnknownSentinel { sentinel, .. }) => assert_eq!(sentinel, "\"ABCD\""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn block_words_and_kind_check() {
        let mut words = vec![0.0f32; BLOCK_WORDS_UNTHINNED];
        words[0] = 1001.0;
        words[5] = 12.5;
        let block = Block::new(7, false, block_bytes(&words)).unwrap();
        assert_eq!(block.position(), 7);
        assert_eq!(block.len_words(), 273);
        assert_eq!(block.word(5), 12.5);
        assert_eq!(block.word(10_000), 0.0);
        assert!(block.expect_kind(BlockKind::ParticleData, "test").is_ok());
        assert!(matches!(
            block.expect_kind(BlockKind::EventHeader, "test"),
            Err(FormatError::UnexpectedBlock { position: 7, found: BlockKind::ParticleData, .. })
        ));
    }

    #[test]
    fn block_rejects_wrong_size() {
        assert!(matches!(
            Block::new(0, true, vec![0u8; 1092]),
            Err(FormatError::Truncated { expected: 1248, .. })
        ));
    }
}
