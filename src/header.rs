//! Typed run/event header and trailer blocks.
//!
//! Word indices below are zero-based; word 0 holds the sentinel.
//! Energies are in GeV, lengths in cm, angles in radians.

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockKind};
use crate::error::FormatError;

const MAX_OBSERVATION_LEVELS: usize = 10;
const MAX_RANDOM_SEQUENCES:   usize = 10;
const MAX_REUSE:              usize = 20;

/// Kinetic-energy cutoffs per particle family.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cutoffs {
    pub hadron:   f32,
    pub muon:     f32,
    pub electron: f32,
    pub photon:   f32,
}

impl Cutoffs {
    fn decode(block: &Block, first: usize) -> Self {
        Self {
            hadron:   block.word(first),
            muon:     block.word(first + 1),
            electron: block.word(first + 2),
            photon:   block.word(first + 3),
        }
    }
}

fn observation_heights(block: &Block, count_word: usize) -> (u32, Vec<f32>) {
    let n = block.word_u32(count_word);
    let kept = (n as usize).min(MAX_OBSERVATION_LEVELS);
    (n, block.words(count_word + 1, kept))
}

// ── Run header ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    pub run_number:           u32,
    /// Start date as written by CORSIKA (yymmdd).
    pub date:                 u32,
    pub version:              f32,
    pub n_observation_levels: u32,
    pub observation_heights:  Vec<f32>,
    pub spectral_slope:       f32,
    pub energy_min:           f32,
    pub energy_max:           f32,
    pub egs4_flag:            bool,
    pub nkg_flag:             bool,
    pub cutoffs:              Cutoffs,
}

impl RunHeader {
    pub fn decode(block: &Block) -> Result<Self, FormatError> {
        block.expect_kind(BlockKind::RunHeader, "decoding a run header")?;
        let (n_observation_levels, observation_heights) = observation_heights(block, 4);
        Ok(Self {
            run_number:     block.word_u32(1),
            date:           block.word_u32(2),
            version:        block.word(3),
            n_observation_levels,
            observation_heights,
            spectral_slope: block.word(15),
            energy_min:     block.word(16),
            energy_max:     block.word(17),
            egs4_flag:      block.word(18) != 0.0,
            nkg_flag:       block.word(19) != 0.0,
            cutoffs:        Cutoffs::decode(block, 20),
        })
    }
}

// ── Event header ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomSequence {
    pub seed:     u32,
    pub calls:    u32,
    pub billions: u32,
}

/// Hadronic interaction model switches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelFlags {
    pub low_energy:            u32,
    pub high_energy:           u32,
    pub sibyll_interaction:    u32,
    pub sibyll_cross_section:  u32,
    pub qgsjet_interaction:    u32,
    pub qgsjet_cross_section:  u32,
    pub dpmjet_interaction:    u32,
    pub dpmjet_cross_section:  u32,
    pub venus_cross_section:   u32,
    pub charm:                 u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThinningParameters {
    pub energy_fraction_hadronic: f32,
    pub energy_fraction_em:       f32,
    pub max_weight_hadronic:      f32,
    pub max_weight_em:            f32,
    /// Radius of the thinning-free core region.
    pub max_radius:               f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CherenkovParameters {
    pub bunch_size:      f32,
    pub n_detectors_x:   u32,
    pub n_detectors_y:   u32,
    pub grid_spacing_x:  f32,
    pub grid_spacing_y:  f32,
    pub detector_size_x: f32,
    pub detector_size_y: f32,
    pub output_to_file:  bool,
    pub bandwidth_min:   f32,
    pub bandwidth_max:   f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHeader {
    pub event_number:         u32,
    /// CORSIKA id of the primary.
    pub particle_id:          u32,
    pub total_energy:         f32,
    /// Starting altitude in g/cm².
    pub starting_altitude:    f32,
    pub first_target:         u32,
    /// Height of the first interaction; negative when tracking starts at
    /// the margin of the atmosphere.
    pub z_first:              f32,
    pub momentum:             [f32; 3],
    pub zenith:               f32,
    pub azimuth:              f32,
    pub random_sequences:     Vec<RandomSequence>,
    pub run_number:           u32,
    pub date:                 u32,
    pub version:              f32,
    pub n_observation_levels: u32,
    pub observation_heights:  Vec<f32>,
    pub spectral_slope:       f32,
    pub energy_min:           f32,
    pub energy_max:           f32,
    pub cutoffs:              Cutoffs,
    pub nflain:               u32,
    pub nfldif:               u32,
    pub nflpi0:               u32,
    pub nflpif:               u32,
    pub nflche:               u32,
    pub nfragm:               u32,
    /// Earth magnetic field, horizontal and vertical components (µT).
    pub magnetic_field:       [f32; 2],
    pub egs4_flag:            bool,
    pub nkg_flag:             bool,
    pub models:               ModelFlags,
    pub cherenkov_flag:       u32,
    pub neutrino_flag:        u32,
    pub curved_flag:          u32,
    pub computer:             u32,
    pub theta_range:          [f32; 2],
    pub phi_range:            [f32; 2],
    pub cherenkov:            CherenkovParameters,
    /// Rotation of the detector array against magnetic north.
    pub array_rotation:       f32,
    pub muon_additional_info: bool,
    pub multiple_scattering_step: f32,
    pub n_reuse:              u32,
    pub core_x:               Vec<f32>,
    pub core_y:               Vec<f32>,
    pub muon_multiple_scattering: u32,
    pub nkg_radial_range:     f32,
    pub thinning:             ThinningParameters,
    pub inner_angle:          f32,
    pub outer_angle:          f32,
    pub transition_energy:    f32,
    pub skimming_incidence:   u32,
    pub skimming_altitude:    f32,
    pub starting_height:      f32,
}

impl EventHeader {
    pub fn decode(block: &Block) -> Result<Self, FormatError> {
        block.expect_kind(BlockKind::EventHeader, "decoding an event header")?;
        let w  = |i: usize| block.word(i);
        let wu = |i: usize| block.word_u32(i);

        let n_sequences = (wu(12) as usize).min(MAX_RANDOM_SEQUENCES);
        let random_sequences = (0..n_sequences)
            .map(|i| RandomSequence {
                seed:     wu(13 + 3 * i),
                calls:    wu(14 + 3 * i),
                billions: wu(15 + 3 * i),
            })
            .collect();

        let (n_observation_levels, observation_heights) = observation_heights(block, 46);

        let n_reuse = wu(97);
        let n_cores = (n_reuse as usize).min(MAX_REUSE);

        Ok(Self {
            event_number:      wu(1),
            particle_id:       wu(2),
            total_energy:      w(3),
            starting_altitude: w(4),
            first_target:      wu(5),
            z_first:           w(6),
            momentum:          [w(7), w(8), w(9)],
            zenith:            w(10),
            azimuth:           w(11),
            random_sequences,
            run_number:        wu(43),
            date:              wu(44),
            version:           w(45),
            n_observation_levels,
            observation_heights,
            spectral_slope:    w(57),
            energy_min:        w(58),
            energy_max:        w(59),
            cutoffs:           Cutoffs::decode(block, 60),
            nflain:            wu(64),
            nfldif:            wu(65),
            nflpi0:            wu(66),
            nflpif:            wu(67),
            nflche:            wu(68),
            nfragm:            wu(69),
            magnetic_field:    [w(70), w(71)],
            egs4_flag:         w(72) != 0.0,
            nkg_flag:          w(73) != 0.0,
            models: ModelFlags {
                low_energy:           wu(74),
                high_energy:          wu(75),
                sibyll_interaction:   wu(138),
                sibyll_cross_section: wu(139),
                qgsjet_interaction:   wu(140),
                qgsjet_cross_section: wu(141),
                dpmjet_interaction:   wu(142),
                dpmjet_cross_section: wu(143),
                venus_cross_section:  wu(144),
                charm:                wu(158),
            },
            cherenkov_flag:    wu(76),
            neutrino_flag:     wu(77),
            curved_flag:       wu(78),
            computer:          wu(79),
            theta_range:       [w(80), w(81)],
            phi_range:         [w(82), w(83)],
            cherenkov: CherenkovParameters {
                bunch_size:      w(84),
                n_detectors_x:   wu(85),
                n_detectors_y:   wu(86),
                grid_spacing_x:  w(87),
                grid_spacing_y:  w(88),
                detector_size_x: w(89),
                detector_size_y: w(90),
                output_to_file:  w(91) != 0.0,
                bandwidth_min:   w(95),
                bandwidth_max:   w(96),
            },
            array_rotation:    w(92),
            muon_additional_info: w(93) != 0.0,
            multiple_scattering_step: w(94),
            n_reuse,
            core_x:            block.words(98, n_cores),
            core_y:            block.words(118, n_cores),
            muon_multiple_scattering: wu(145),
            nkg_radial_range:  w(146),
            thinning: ThinningParameters {
                energy_fraction_hadronic: w(147),
                energy_fraction_em:       w(148),
                max_weight_hadronic:      w(149),
                max_weight_em:            w(150),
                max_radius:               w(151),
            },
            inner_angle:        w(152),
            outer_angle:        w(153),
            transition_energy:  w(154),
            skimming_incidence: wu(155),
            skimming_altitude:  w(156),
            starting_height:    w(157),
        })
    }

    /// Whether thinning was active for this event.
    pub fn is_thinned(&self) -> bool {
        self.thinning.energy_fraction_hadronic > 0.0 || self.thinning.energy_fraction_em > 0.0
    }
}

// ── Event trailer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrailer {
    pub event_number:       u32,
    pub n_photons:          f32,
    pub n_electrons:        f32,
    pub n_hadrons:          f32,
    pub n_muons:            f32,
    pub n_particles:        f32,
    /// NKG lateral distributions (8 × 21 words).
    pub nkg_lateral:        Vec<f32>,
    /// NKG electron numbers and ages per level (8 × 10 words).
    pub nkg_levels:         Vec<f32>,
    /// Longitudinal fit parameters of the charged-particle profile.
    pub longitudinal_fit:   [f32; 6],
    pub chi2:               f32,
    pub weighted_photons:   f32,
    pub weighted_electrons: f32,
    pub weighted_hadrons:   f32,
    pub weighted_muons:     f32,
}

impl EventTrailer {
    pub fn decode(block: &Block) -> Result<Self, FormatError> {
        block.expect_kind(BlockKind::EventTrailer, "decoding an event trailer")?;
        let w = |i: usize| block.word(i);
        Ok(Self {
            event_number:       block.word_u32(1),
            n_photons:          w(2),
            n_electrons:        w(3),
            n_hadrons:          w(4),
            n_muons:            w(5),
            n_particles:        w(6),
            nkg_lateral:        block.words(7, 168),
            nkg_levels:         block.words(175, 80),
            longitudinal_fit:   [w(255), w(256), w(257), w(258), w(259), w(260)],
            chi2:               w(261),
            weighted_photons:   w(262),
            weighted_electrons: w(263),
            weighted_hadrons:   w(264),
            weighted_muons:     w(265),
        })
    }
}

// ── Run trailer ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunTrailer {
    pub run_number:       u32,
    pub events_processed: u32,
}

impl RunTrailer {
    pub fn decode(block: &Block) -> Result<Self, FormatError> {
        block.expect_kind(BlockKind::RunTrailer, "decoding a run trailer")?;
        Ok(Self {
            run_number:       block.word_u32(1),
            events_processed: block.word_u32(2),
        })
    }
}
