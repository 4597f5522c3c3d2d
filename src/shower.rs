//! One simulated air shower: event header, trailer, optional longitudinal
//! profile and its particles.

use serde::Serialize;

use crate::header::{EventHeader, EventTrailer};
use crate::longitudinal::LongitudinalProfile;
use crate::particle::{species, ParticleRecord};

/// Where a shower's particles live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParticleSource {
    /// Decoded while the shower was read.
    Materialized(Vec<ParticleRecord>),
    /// Still on disk, between two block positions (end exclusive).
    Deferred { first_block: u64, end_block: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shower {
    pub header:       EventHeader,
    pub trailer:      EventTrailer,
    pub longitudinal: Option<LongitudinalProfile>,
    pub particles:    ParticleSource,
}

impl Shower {
    pub fn new(
        header:       EventHeader,
        trailer:      EventTrailer,
        longitudinal: Option<LongitudinalProfile>,
        particles:    ParticleSource,
    ) -> Self {
        Self { header, trailer, longitudinal, particles }
    }

    pub fn event_number(&self) -> u32 {
        self.header.event_number
    }

    /// CORSIKA id of the primary particle.
    pub fn primary(&self) -> u32 {
        self.header.particle_id
    }

    pub fn primary_pdg(&self) -> i32 {
        species::pdg_code(self.primary())
    }

    /// Primary energy in GeV.
    pub fn energy(&self) -> f32 {
        self.header.total_energy
    }

    pub fn zenith(&self) -> f32 {
        self.header.zenith
    }

    /// Azimuth of the momentum, measured from the magnetic north.
    pub fn azimuth(&self) -> f32 {
        self.header.azimuth
    }

    /// Muons at the observation level, weighted when the run is thinned.
    pub fn muon_number(&self) -> f32 {
        if self.header.is_thinned() && self.trailer.weighted_muons > 0.0 {
            self.trailer.weighted_muons
        } else {
            self.trailer.n_muons
        }
    }

    pub fn particle_number(&self) -> f32 {
        self.trailer.n_particles
    }

    /// Height of the first interaction in cm.
    pub fn first_interaction_height(&self) -> f32 {
        self.header.z_first.abs()
    }

    pub fn em_energy_cutoff(&self) -> f32 {
        self.header.cutoffs.electron
    }

    pub fn muon_energy_cutoff(&self) -> f32 {
        self.header.cutoffs.muon
    }

    pub fn thinning_radius(&self) -> f32 {
        self.header.thinning.max_radius
    }

    pub fn array_rotation(&self) -> f32 {
        self.header.array_rotation
    }

    pub fn high_energy_model(&self) -> u32 {
        self.header.models.high_energy
    }

    pub fn low_energy_model(&self) -> u32 {
        self.header.models.low_energy
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.particles, ParticleSource::Materialized(_))
    }

    /// Particles already in memory, if any.
    pub fn materialized_particles(&self) -> Option<&[ParticleRecord]> {
        match &self.particles {
            ParticleSource::Materialized(v) => Some(v),
            ParticleSource::Deferred { .. } => None,
        }
    }
}
