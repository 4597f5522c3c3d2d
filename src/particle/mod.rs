//! Particle sub-records of a particle-data block.
//!
//! Each block carries 39 fixed-width sub-records:
//!
//! | word | content                                   |
//! |------|-------------------------------------------|
//! | 0    | description `id × 1000 + generation × 10 + level` |
//! | 1–3  | px, py, pz (GeV)                          |
//! | 4–5  | x, y at the observation level (cm)        |
//! | 6    | time (ns) or z (cm)                       |
//! | 7    | thinning weight (thinned runs only)       |
//!
//! A description of zero is padding and never yields a record.

pub mod species;
pub mod view;

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockKind, PARTICLES_PER_BLOCK, WORDS_PER_PARTICLE_THINNED,
                   WORDS_PER_PARTICLE_UNTHINNED};
pub use species::{decode_nucleus_code, encode_nucleus_code, DecodedCode};
pub use view::{GroundParticles, ParticleOptions, ShowerParticle};

/// Description word of a padding sub-record.
pub const PADDING_DESCRIPTION: f32 = 0.0;

const NUCLEUS_DESCRIPTION:   f32 = 100_000.0;
const CHERENKOV_DESCRIPTION: f32 = 9_900_000.0;

/// Muon additional-information records (CORSIKA ids 75 and 76).
const MUON_INFO_IDS: [u32; 2] = [75, 76];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub description: f32,
    pub px:          f32,
    pub py:          f32,
    pub pz:          f32,
    pub x:           f32,
    pub y:           f32,
    pub t_or_z:      f32,
    /// Present only in thinned runs.
    pub weight:      Option<f32>,
}

impl ParticleRecord {
    fn from_words(w: &[f32], thinned: bool) -> Self {
        Self {
            description: w[0],
            px:          w[1],
            py:          w[2],
            pz:          w[3],
            x:           w[4],
            y:           w[5],
            t_or_z:      w[6],
            weight:      if thinned { Some(w[7]) } else { None },
        }
    }

    #[inline]
    pub fn is_padding(&self) -> bool {
        self.description == PADDING_DESCRIPTION
    }

    /// CORSIKA particle id, sign of the description dropped.
    pub fn corsika_code(&self) -> u32 {
        (self.description / 1000.0).trunc().abs() as u32
    }

    pub fn hadronic_generation(&self) -> u32 {
        ((self.description.abs() as u32) % 1000) / 10
    }

    /// One-based observation level.
    pub fn observation_level(&self) -> u32 {
        (self.description.abs() as u32) % 10
    }

    pub fn is_particle(&self) -> bool {
        self.description > 0.0 && self.description < NUCLEUS_DESCRIPTION
    }

    pub fn is_nucleus(&self) -> bool {
        self.description >= NUCLEUS_DESCRIPTION && self.description < CHERENKOV_DESCRIPTION
    }

    pub fn is_cherenkov(&self) -> bool {
        self.description >= CHERENKOV_DESCRIPTION
    }

    /// Mother/grandmother records written with the EHISTORY option carry a
    /// negative description.
    pub fn is_history(&self) -> bool {
        self.description < 0.0
    }

    pub fn is_muon_info(&self) -> bool {
        MUON_INFO_IDS.contains(&self.corsika_code())
    }

    pub fn species(&self) -> DecodedCode {
        decode_nucleus_code(self.corsika_code())
    }

    pub fn pdg_code(&self) -> i32 {
        species::pdg_code(self.corsika_code())
    }

    pub fn name(&self) -> String {
        species::name(self.corsika_code())
    }

    /// Rest mass in GeV.
    pub fn mass(&self) -> f64 {
        species::mass(self.corsika_code())
    }

    pub fn momentum(&self) -> f64 {
        let (px, py, pz) = (self.px as f64, self.py as f64, self.pz as f64);
        (px * px + py * py + pz * pz).sqrt()
    }

    pub fn total_energy(&self) -> f64 {
        let p = self.momentum();
        let m = self.mass();
        (p * p + m * m).sqrt()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.total_energy() - self.mass()
    }

    /// Thinning weight; 1 in unthinned runs.
    pub fn weight(&self) -> f32 {
        self.weight.unwrap_or(1.0)
    }

    pub fn is_thinned(&self) -> bool {
        self.weight.is_some()
    }
}

// ── Block decoding ───────────────────────────────────────────────────────────

/// Lazy iterator over the non-padding sub-records of one block.
pub struct ParticleRecords<'a> {
    block: &'a Block,
    next:  usize,
}

impl<'a> ParticleRecords<'a> {
    pub fn new(block: &'a Block) -> Self {
        // Header and padding blocks carry no particles.
        let next = if block.is(BlockKind::ParticleData) { 0 } else { PARTICLES_PER_BLOCK };
        Self { block, next }
    }
}

impl Iterator for ParticleRecords<'_> {
    type Item = ParticleRecord;

    fn next(&mut self) -> Option<ParticleRecord> {
        let thinned = self.block.is_thinned();
        let stride = if thinned { WORDS_PER_PARTICLE_THINNED } else { WORDS_PER_PARTICLE_UNTHINNED };
        while self.next < PARTICLES_PER_BLOCK {
            let words = self.block.words(self.next * stride, stride);
            self.next += 1;
            let record = ParticleRecord::from_words(&words, thinned);
            if !record.is_padding() {
                return Some(record);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(PARTICLES_PER_BLOCK - self.next))
    }
}

/// All non-padding particles of `block`, in order.
pub fn decode_particle_subblocks(block: &Block) -> Vec<ParticleRecord> {
    ParticleRecords::new(block).collect()
}
