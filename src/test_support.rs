//! Synthetic block and record builders for unit tests.

use byteorder::{ByteOrder, LittleEndian};

use crate::block::{Layout, BLOCKS_PER_RECORD};

pub fn block_bytes(words: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; words.len() * 4];
    LittleEndian::write_f32_into(words, &mut out);
    out
}

pub fn block_words(thinned: bool) -> Vec<f32> {
    vec![0.0; if thinned { 312 } else { 273 }]
}

/// A block whose first word is `tag` and whose other words are set from `fields`.
pub fn tagged_block(tag: &[u8; 4], thinned: bool, fields: &[(usize, f32)]) -> Vec<u8> {
    let mut words = block_words(thinned);
    for &(i, v) in fields {
        words[i] = v;
    }
    let mut bytes = block_bytes(&words);
    bytes[..4].copy_from_slice(tag);
    bytes
}

pub fn sentinel_block(tag: &[u8; 4], thinned: bool) -> Vec<u8> {
    tagged_block(tag, thinned, &[])
}

/// Particle block from `(description, px, py, pz, x, y, t, weight)` tuples.
pub fn particle_block(thinned: bool, particles: &[[f32; 8]]) -> Vec<u8> {
    let mut words = block_words(thinned);
    let stride = if thinned { 8 } else { 7 };
    for (i, p) in particles.iter().enumerate() {
        words[i * stride..(i + 1) * stride].copy_from_slice(&p[..stride]);
    }
    block_bytes(&words)
}

/// Frame `blocks` into Fortran records, padding the last one with zero blocks.
pub fn records(layout: Layout, blocks: &[Vec<u8>]) -> Vec<u8> {
    let payload = layout.record_payload_bytes() as u64;
    let marker: Vec<u8> = match layout.marker_width.bytes() {
        4 => (payload as u32).to_le_bytes().to_vec(),
        _ => payload.to_le_bytes().to_vec(),
    };
    let mut out = Vec::new();
    for chunk in blocks.chunks(BLOCKS_PER_RECORD) {
        out.extend_from_slice(&marker);
        for b in chunk {
            out.extend_from_slice(b);
        }
        for _ in chunk.len()..BLOCKS_PER_RECORD {
            out.extend(std::iter::repeat(0u8).take(layout.block_bytes()));
        }
        out.extend_from_slice(&marker);
    }
    out
}
