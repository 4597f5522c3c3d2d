//! Block-position index of one run.
//!
//! Built by a single forward scan of a seekable stream and cached by the
//! reader.  The index can be serialized to JSON and reused for the same
//! file, avoiding the scan on later opens.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::block::BlockKind;
use crate::error::{CorsikaError, FormatError, Result};
use crate::header::RunHeader;
use crate::io_stream::RawStream;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileIndex {
    pub run_number:     u32,
    pub run_header:     u64,
    pub run_trailer:    u64,
    /// Block position of each event header, in file order.
    pub event_headers:  Vec<u64>,
    pub event_trailers: Vec<u64>,
    /// First LONG block of each event.  Empty when the run has none.
    pub longitudinal:   Vec<u64>,
    /// Event number → ordinal.
    pub event_numbers:  HashMap<u32, usize>,
}

impl FileIndex {
    /// Scan `stream` from its first block to the run trailer.  The cursor is
    /// restored afterwards, whether or not the scan succeeds.
    pub fn scan(stream: &mut RawStream, max_header_search_blocks: u64) -> Result<Self> {
        if !stream.is_seekable() {
            return Err(CorsikaError::Unsupported(
                "event index requires a seekable stream".to_string(),
            ));
        }
        let saved = stream.next_position();
        stream.seek_to(0)?;
        let result = Self::scan_blocks(stream, max_header_search_blocks);
        stream.seek_to(saved)?;

        if let Ok(index) = &result {
            debug!(
                "indexed run {}: {} events, {} with longitudinal blocks",
                index.run_number,
                index.len(),
                index.longitudinal.len(),
            );
        }
        result
    }

    fn scan_blocks(stream: &mut RawStream, max_header_search_blocks: u64) -> Result<Self> {
        let mut index = FileIndex::default();
        let mut run_header_seen = false;
        let mut event_has_long = false;

        loop {
            let block = match stream.next_block()? {
                Some(b) => b,
                None    => return Err(FormatError::MissingRunTrailer.into()),
            };
            let pos = block.position();
            match block.kind() {
                BlockKind::RunHeader => {
                    index.run_number = RunHeader::decode(&block)?.run_number;
                    index.run_header = pos;
                    run_header_seen = true;
                }
                BlockKind::EventHeader => {
                    index.event_numbers.insert(block.word_u32(1), index.event_headers.len());
                    index.event_headers.push(pos);
                    event_has_long = false;
                }
                BlockKind::Longitudinal if !event_has_long => {
                    index.longitudinal.push(pos);
                    event_has_long = true;
                }
                BlockKind::EventTrailer => index.event_trailers.push(pos),
                BlockKind::RunTrailer => {
                    index.run_trailer = pos;
                    break;
                }
                _ => {}
            }
            if !run_header_seen && pos + 1 >= max_header_search_blocks {
                return Err(FormatError::MissingRunHeader(max_header_search_blocks).into());
            }
        }

        if index.event_headers.len() != index.event_trailers.len() {
            return Err(FormatError::EventCountMismatch {
                headers:  index.event_headers.len(),
                trailers: index.event_trailers.len(),
            }.into());
        }
        if !index.longitudinal.is_empty() && index.longitudinal.len() != index.event_headers.len() {
            return Err(FormatError::LongitudinalMismatch {
                longitudinal: index.longitudinal.len(),
                events:       index.event_headers.len(),
            }.into());
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.event_headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_headers.is_empty()
    }

    /// Header and trailer positions of event `ordinal`.
    pub fn event_span(&self, ordinal: usize) -> Option<(u64, u64)> {
        Some((*self.event_headers.get(ordinal)?, *self.event_trailers.get(ordinal)?))
    }

    pub fn longitudinal_position(&self, ordinal: usize) -> Option<u64> {
        self.longitudinal.get(ordinal).copied()
    }

    pub fn ordinal_of(&self, event_number: u32) -> Option<usize> {
        self.event_numbers.get(&event_number).copied()
    }

    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Layout, MarkerWidth};
    use crate::test_support::{records, sentinel_block, tagged_block};
    use std::io::Cursor;

    fn stream(blocks: &[Vec<u8>]) -> RawStream {
        let layout = Layout::new(false, MarkerWidth::Bits32);
        RawStream::from_seekable(Cursor::new(records(layout, blocks)), None).unwrap()
    }

    fn event(number: f32, with_long: bool) -> Vec<Vec<u8>> {
        let mut blocks = vec![tagged_block(b"EVTH", false, &[(1, number)])];
        if with_long {
            blocks.push(sentinel_block(b"LONG", false));
            blocks.push(sentinel_block(b"LONG", false));
        }
        blocks.push(tagged_block(b"EVTE", false, &[(1, number)]));
        blocks
    }

    #[test]
    fn scan_records_positions() {
        let mut blocks = vec![tagged_block(b"RUNH", false, &[(1, 17.0)])];
        blocks.extend(event(5.0, true));
        blocks.extend(event(9.0, true));
        blocks.push(sentinel_block(b"RUNE", false));

        let mut s = stream(&blocks);
        s.seek_to(3).unwrap();
        let index = FileIndex::scan(&mut s, 400).unwrap();
        assert_eq!(s.next_position(), 3);

        assert_eq!(index.run_number, 17);
        assert_eq!(index.len(), 2);
        assert_eq!(index.event_span(0), Some((1, 4)));
        assert_eq!(index.event_span(1), Some((5, 8)));
        assert_eq!(index.longitudinal, vec![2, 6]);
        assert_eq!(index.ordinal_of(9), Some(1));
        assert_eq!(index.ordinal_of(6), None);
        assert_eq!(index.run_trailer, 9);

        let restored = FileIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, index);
    }

    #[test]
    fn scan_requires_run_trailer() {
        let mut blocks = vec![sentinel_block(b"RUNH", false)];
        blocks.extend(event(1.0, false));
        let err = FileIndex::scan(&mut stream(&blocks), 400).unwrap_err();
        assert!(matches!(err, CorsikaError::Format(FormatError::MissingRunTrailer)));
    }

    #[test]
    fn scan_detects_dangling_header() {
        let blocks = vec![
            sentinel_block(b"RUNH", false),
            sentinel_block(b"EVTH", false),
            sentinel_block(b"RUNE", false),
        ];
        let err = FileIndex::scan(&mut stream(&blocks), 400).unwrap_err();
        assert!(matches!(
            err,
            CorsikaError::Format(FormatError::EventCountMismatch { headers: 1, trailers: 0 })
        ));
    }

    #[test]
    fn scan_checks_longitudinal_count() {
        let mut blocks = vec![sentinel_block(b"RUNH", false)];
        blocks.extend(event(1.0, true));
        blocks.extend(event(2.0, false));
        blocks.push(sentinel_block(b"RUNE", false));
        let err = FileIndex::scan(&mut stream(&blocks), 400).unwrap_err();
        assert!(matches!(
            err,
            CorsikaError::Format(FormatError::LongitudinalMismatch { longitudinal: 1, events: 2 })
        ));
    }

    #[test]
    fn scan_gives_up_without_run_header() {
        let mut blocks = Vec::new();
        blocks.extend(event(1.0, false));
        blocks.push(sentinel_block(b"RUNE", false));
        let err = FileIndex::scan(&mut stream(&blocks), 2).unwrap_err();
        assert!(matches!(err, CorsikaError::Format(FormatError::MissingRunHeader(2))));
    }
}
