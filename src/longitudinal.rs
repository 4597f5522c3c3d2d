//! Longitudinal particle profiles written as LONG blocks.
//!
//! A profile is spread over one or more consecutive LONG blocks right after
//! the event header.  The first block's steps-and-blocks word encodes
//! `steps × 100 + blocks`.

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockKind};
use crate::error::FormatError;
use crate::header::Cutoffs;

pub const ENTRIES_PER_BLOCK: usize = 26;
const WORDS_PER_ENTRY:       usize = 10;
const FIRST_ENTRY_WORD:      usize = 13;

/// Particle counts crossing one atmospheric depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LongitudinalEntry {
    /// Slant depth in g/cm².
    pub depth:     f32,
    pub gammas:    f32,
    pub positrons: f32,
    pub electrons: f32,
    pub mu_plus:   f32,
    pub mu_minus:  f32,
    pub hadrons:   f32,
    pub charged:   f32,
    pub nuclei:    f32,
    pub cherenkov: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongitudinalBlock {
    pub event_number:               u32,
    pub particle_id:                u32,
    pub total_energy:               f32,
    pub n_steps:                    u32,
    pub n_blocks:                   u32,
    /// One-based index of this block within the profile.
    pub block_index:                u32,
    pub first_interaction_altitude: f32,
    pub zenith:                     f32,
    pub azimuth:                    f32,
    pub cutoffs:                    Cutoffs,
    pub entries:                    Vec<LongitudinalEntry>,
}

impl LongitudinalBlock {
    pub fn decode(block: &Block) -> Result<Self, FormatError> {
        block.expect_kind(BlockKind::Longitudinal, "decoding a longitudinal block")?;
        let steps_and_blocks = block.word_u32(4);
        let entries = (0..ENTRIES_PER_BLOCK)
            .map(|i| {
                let e = block.words(FIRST_ENTRY_WORD + i * WORDS_PER_ENTRY, WORDS_PER_ENTRY);
                LongitudinalEntry {
                    depth:     e[0],
                    gammas:    e[1],
                    positrons: e[2],
                    electrons: e[3],
                    mu_plus:   e[4],
                    mu_minus:  e[5],
                    hadrons:   e[6],
                    charged:   e[7],
                    nuclei:    e[8],
                    cherenkov: e[9],
                }
            })
            .collect();
        Ok(Self {
            event_number:               block.word_u32(1),
            particle_id:                block.word_u32(2),
            total_energy:               block.word(3),
            n_steps:                    steps_and_blocks / 100,
            n_blocks:                   steps_and_blocks % 100,
            block_index:                block.word_u32(5),
            first_interaction_altitude: block.word(6),
            zenith:                     block.word(7),
            azimuth:                    block.word(8),
            cutoffs: Cutoffs {
                hadron:   block.word(9),
                muon:     block.word(10),
                electron: block.word(11),
                photon:   block.word(12),
            },
            entries,
        })
    }
}

/// A full profile assembled from every LONG block of one event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LongitudinalProfile {
    pub entries: Vec<LongitudinalEntry>,
}

impl LongitudinalProfile {
    /// Concatenate the entries of `blocks`.  Within each block, entries stop
    /// at the first zero depth, except for the very first entry of the
    /// profile which may legitimately sit at depth zero.
    pub fn assemble(blocks: &[LongitudinalBlock]) -> Self {
        let mut entries = Vec::new();
        for block in blocks {
            for entry in &block.entries {
                if !entries.is_empty() && entry.depth == 0.0 {
                    break;
                }
                entries.push(*entry);
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.depth).collect()
    }

    pub fn charged(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.charged).collect()
    }

    pub fn gammas(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.gammas).collect()
    }

    /// Electrons plus positrons.
    pub fn electrons(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.electrons + e.positrons).collect()
    }

    pub fn muons(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.mu_plus + e.mu_minus).collect()
    }

    pub fn hadrons(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.hadrons).collect()
    }

    pub fn nuclei(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.nuclei).collect()
    }

    pub fn cherenkov(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.cherenkov).collect()
    }
}
