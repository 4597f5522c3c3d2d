//! Synthetic CORSIKA files for integration tests.

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub const PARTICLES_PER_BLOCK: usize = 39;
pub const BLOCKS_PER_RECORD:   usize = 21;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Particle sub-record `(description, px, py, pz, x, y, t, weight)`.
pub fn particle(corsika_id: u32, level: u32, pz: f32, weight: f32) -> [f32; 8] {
    [(corsika_id * 1000 + level) as f32, 0.0, 0.0, pz, 100.0, -100.0, 50.0, weight]
}

pub struct Fixture {
    thinned:  bool,
    marker64: bool,
    blocks:   Vec<Vec<u8>>,
}

impl Fixture {
    pub fn new(thinned: bool) -> Self {
        Self { thinned, marker64: false, blocks: Vec::new() }
    }

    pub fn marker64(mut self) -> Self {
        self.marker64 = true;
        self
    }

    fn words(&self) -> usize {
        if self.thinned { 312 } else { 273 }
    }

    fn stride(&self) -> usize {
        if self.thinned { 8 } else { 7 }
    }

    pub fn tagged(mut self, tag: &[u8; 4], fields: &[(usize, f32)]) -> Self {
        let mut words = vec![0.0f32; self.words()];
        for &(i, v) in fields {
            words[i] = v;
        }
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes[..4].copy_from_slice(tag);
        self.blocks.push(bytes);
        self
    }

    pub fn run_header(self, run_number: u32) -> Self {
        self.tagged(b"RUNH", &[(1, run_number as f32), (3, 7.75), (4, 1.0), (5, 0.0)])
    }

    pub fn event_header(self, number: u32, primary: u32, energy: f32) -> Self {
        self.tagged(b"EVTH", &[(1, number as f32), (2, primary as f32), (3, energy), (10, 0.3)])
    }

    pub fn event_trailer(self, number: u32, n_muons: f32) -> Self {
        self.tagged(b"EVTE", &[(1, number as f32), (5, n_muons)])
    }

    pub fn run_trailer(self, run_number: u32, events: u32) -> Self {
        self.tagged(b"RUNE", &[(1, run_number as f32), (2, events as f32)])
    }

    /// One LONG block holding `depths.len()` entries.
    pub fn longitudinal(self, number: u32, depths: &[f32]) -> Self {
        let mut fields = vec![(1, number as f32), (4, (depths.len() * 100 + 1) as f32), (5, 1.0)];
        for (i, d) in depths.iter().enumerate() {
            fields.push((13 + i * 10, *d));
            fields.push((13 + i * 10 + 7, 1000.0));
        }
        self.tagged(b"LONG", &fields)
    }

    /// Particle blocks, 39 records each; the last one zero-padded.
    pub fn particles(mut self, records: &[[f32; 8]]) -> Self {
        let stride = self.stride();
        for chunk in records.chunks(PARTICLES_PER_BLOCK) {
            let mut words = vec![0.0f32; self.words()];
            for (i, p) in chunk.iter().enumerate() {
                words[i * stride..(i + 1) * stride].copy_from_slice(&p[..stride]);
            }
            self.blocks.push(words.iter().flat_map(|w| w.to_le_bytes()).collect());
        }
        self
    }

    /// An all-zero block.
    pub fn control(mut self) -> Self {
        self.blocks.push(vec![0u8; self.words() * 4]);
        self
    }

    /// A complete event: header, particles, trailer.
    pub fn event(self, number: u32, primary: u32, records: &[[f32; 8]]) -> Self {
        self.event_header(number, primary, 1.0e6 * number as f32)
            .particles(records)
            .event_trailer(number, records.len() as f32)
    }

    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Framed records, padded to a whole record.
    pub fn bytes(&self) -> Vec<u8> {
        let block_bytes = self.words() * 4;
        let payload = block_bytes * BLOCKS_PER_RECORD;
        let marker: Vec<u8> = if self.marker64 {
            (payload as u64).to_le_bytes().to_vec()
        } else {
            (payload as u32).to_le_bytes().to_vec()
        };

        let mut out = Vec::new();
        for chunk in self.blocks.chunks(BLOCKS_PER_RECORD) {
            out.extend_from_slice(&marker);
            for b in chunk {
                out.extend_from_slice(b);
            }
            out.resize(out.len() + (BLOCKS_PER_RECORD - chunk.len()) * block_bytes, 0);
            out.extend_from_slice(&marker);
        }
        out
    }

    pub fn write(&self) -> NamedTempFile {
        write_temp(&self.bytes())
    }

    pub fn gzip(&self) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        enc.write_all(&self.bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[cfg(feature = "bzip2")]
    pub fn bzip2(&self) -> Vec<u8> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::fast());
        enc.write_all(&self.bytes()).unwrap();
        enc.finish().unwrap()
    }

    pub fn zstd(&self) -> Vec<u8> {
        zstd::encode_all(&self.bytes()[..], 3).unwrap()
    }
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// A run of `n` events whose particle counts vary, so events straddle
/// record boundaries.
pub fn multi_event_run(thinned: bool, n: u32) -> Fixture {
    let mut fixture = Fixture::new(thinned).run_header(1234);
    for number in 1..=n {
        let count = (number as usize * 23) % 97 + 1;
        let records: Vec<[f32; 8]> = (0..count)
            .map(|i| particle(if i % 2 == 0 { 6 } else { 3 }, 1, 1.0 + i as f32, 2.0))
            .collect();
        fixture = fixture.event(number, 14, &records);
    }
    fixture.run_trailer(1234, n)
}
