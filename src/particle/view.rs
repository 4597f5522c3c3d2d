//! Observation-level view of a shower's particles.
//!
//! Raw particle blocks interleave three kinds of auxiliary records with the
//! particles that reached the ground:
//!
//! * EHISTORY mother and grandmother records (negative description),
//! * muon additional-information records (ids 75 and 76),
//! * particles of other observation levels.
//!
//! [`GroundParticles`] folds the first two into the particle that follows
//! them and drops everything that does not belong to the selected level.

use serde::{Deserialize, Serialize};

use super::species::PDG_UNDEFINED;
use super::ParticleRecord;
use crate::error::Result;

const PDG_DECAYED_MUON:      i32 = 9_900_013;
const PDG_DECAYED_ANTI_MUON: i32 = -9_900_013;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParticleOptions {
    /// One-based observation level to keep.
    pub observation_level:    u32,
    /// Keep decayed-muon production records (ids 95 and 96).
    pub keep_muon_production: bool,
}

impl Default for ParticleOptions {
    fn default() -> Self {
        Self { observation_level: 1, keep_muon_production: true }
    }
}

/// A ground particle with the auxiliary records written just before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShowerParticle {
    pub particle:    ParticleRecord,
    /// Set together with `grandparent` only.
    pub parent:      Option<ParticleRecord>,
    pub grandparent: Option<ParticleRecord>,
    pub muon_info:   Option<ParticleRecord>,
}

#[derive(Default)]
struct Pending {
    parent:      Option<ParticleRecord>,
    grandparent: Option<ParticleRecord>,
    muon_info:   Option<ParticleRecord>,
}

impl Pending {
    fn attach(&mut self, particle: ParticleRecord) -> ShowerParticle {
        let pending = std::mem::take(self);
        let (parent, grandparent) = match (pending.parent, pending.grandparent) {
            (Some(p), Some(g)) => (Some(p), Some(g)),
            _                  => (None, None),
        };
        ShowerParticle { particle, parent, grandparent, muon_info: pending.muon_info }
    }
}

/// Adaptor over any raw particle iterator.  Errors from the inner iterator
/// are passed through and end nothing by themselves.
pub struct GroundParticles<I> {
    inner:   I,
    options: ParticleOptions,
    pending: Pending,
}

impl<I> GroundParticles<I>
where
    I: Iterator<Item = Result<ParticleRecord>>,
{
    pub fn new(inner: I, options: ParticleOptions) -> Self {
        Self { inner, options, pending: Pending::default() }
    }

    pub fn options(&self) -> ParticleOptions {
        self.options
    }

    fn keeps(&self, record: &ParticleRecord) -> bool {
        let pdg = record.pdg_code();
        if pdg == PDG_UNDEFINED {
            return false;
        }
        if !self.options.keep_muon_production
            && (pdg == PDG_DECAYED_MUON || pdg == PDG_DECAYED_ANTI_MUON)
        {
            return false;
        }
        record.observation_level() == self.options.observation_level
    }
}

impl<I> Iterator for GroundParticles<I>
where
    I: Iterator<Item = Result<ParticleRecord>>,
{
    type Item = Result<ShowerParticle>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.inner.next()? {
                Ok(r)  => r,
                Err(e) => return Some(Err(e)),
            };
            if record.is_history() {
                // The first history record is the mother; later ones overwrite
                // the grandmother.
                if self.pending.parent.is_none() {
                    self.pending.parent = Some(record);
                } else {
                    self.pending.grandparent = Some(record);
                }
                continue;
            }
            if record.is_muon_info() && self.pending.muon_info.is_none() {
                self.pending.muon_info = Some(record);
                continue;
            }
            if !self.keeps(&record) {
                self.pending = Pending::default();
                continue;
            }
            return Some(Ok(self.pending.attach(record)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CorsikaError;

    fn record(description: f32) -> ParticleRecord {
        ParticleRecord {
            description,
            px:     0.0,
            py:     0.0,
            pz:     1.0,
            x:      0.0,
            y:      0.0,
            t_or_z: 0.0,
            weight: None,
        }
    }

    fn view(descriptions: &[f32], options: ParticleOptions) -> Vec<ShowerParticle> {
        let records: Vec<Result<ParticleRecord>> =
            descriptions.iter().map(|&d| Ok(record(d))).collect();
        GroundParticles::new(records.into_iter(), options)
            .map(|p| p.unwrap())
            .collect()
    }

    #[test]
    fn history_and_muon_info_attach_to_next_particle() {
        let out = view(&[-8_021.0, -14_011.0, 75_001.0, 6_031.0, 1_001.0], ParticleOptions::default());
        assert_eq!(out.len(), 2);

        let mu = &out[0];
        assert_eq!(mu.particle.corsika_code(), 6);
        assert_eq!(mu.parent.unwrap().corsika_code(), 8);
        assert_eq!(mu.grandparent.unwrap().corsika_code(), 14);
        assert_eq!(mu.muon_info.unwrap().corsika_code(), 75);

        let gamma = &out[1];
        assert!(gamma.parent.is_none() && gamma.grandparent.is_none() && gamma.muon_info.is_none());
    }

    #[test]
    fn lone_parent_is_not_attached() {
        let out = view(&[-8_021.0, 6_031.0], ParticleOptions::default());
        assert_eq!(out.len(), 1);
        assert!(out[0].parent.is_none());
    }

    #[test]
    fn rejected_particle_drops_pending_records() {
        let opts = ParticleOptions::default();
        // Level-2 muon is filtered out together with its history.
        let out = view(&[-8_021.0, -14_011.0, 6_032.0, 5_001.0], opts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].particle.corsika_code(), 5);
        assert!(out[0].parent.is_none());

        // Undefined ids and Cherenkov bunches are never yielded.
        assert!(view(&[4_001.0, 9_900_001.0], opts).is_empty());
    }

    #[test]
    fn observation_level_and_muon_production() {
        let records = [6_001.0, 6_002.0, 95_001.0, 96_002.0];
        let level2 = ParticleOptions { observation_level: 2, keep_muon_production: true };
        let codes: Vec<u32> = view(&records, level2).iter().map(|p| p.particle.corsika_code()).collect();
        assert_eq!(codes, vec![6, 96]);

        let no_production = ParticleOptions { observation_level: 1, keep_muon_production: false };
        let codes: Vec<u32> = view(&records, no_production).iter().map(|p| p.particle.corsika_code()).collect();
        assert_eq!(codes, vec![6]);
    }

    #[test]
    fn errors_pass_through() {
        let records = vec![Ok(record(6_001.0)), Err(CorsikaError::ClosedStream), Ok(record(1_001.0))];
        let out: Vec<_> = GroundParticles::new(records.into_iter(), ParticleOptions::default()).collect();
        assert_eq!(out.len(), 3);
        assert!(matches!(out[1], Err(CorsikaError::ClosedStream)));
    }
}
