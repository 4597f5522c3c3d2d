//! CORSIKA particle ids, PDG codes, names and masses.
//!
//! Nuclei use the extended PDG scheme `1000ZZZAAA`.

use serde::{Deserialize, Serialize};

/// First CORSIKA id used for nuclei (`A × 100 + Z`).
pub const NUCLEUS_MIN: u32 = 100;
/// First CORSIKA id used for Cherenkov photon bunches.
pub const CHERENKOV_MIN: u32 = 9900;

pub const PDG_UNDEFINED:     i32 = 0;
pub const PDG_NUCLEUS_BASE:  i32 = 1_000_000_000;
const PDG_CHARGE_FACTOR:     i32 = 1000;

const PROTON_MASS_MEV: f64 = 938.271998;

/// A CORSIKA id split into particle type, mass number and charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedCode {
    pub particle_type: u32,
    /// Mass number A; zero for anything but a nucleus.
    pub atomic_number: u32,
    /// Charge Z; zero for anything but a nucleus.
    pub charge:        u32,
}

impl DecodedCode {
    pub fn is_nucleus(&self) -> bool {
        self.atomic_number > 0
    }
}

pub fn decode_nucleus_code(code: u32) -> DecodedCode {
    if (NUCLEUS_MIN..CHERENKOV_MIN).contains(&code) {
        DecodedCode { particle_type: code, atomic_number: code / 100, charge: code % 100 }
    } else {
        DecodedCode { particle_type: code, atomic_number: 0, charge: 0 }
    }
}

/// Inverse of [`decode_nucleus_code`] for nuclei.  `charge` must be below 100.
pub fn encode_nucleus_code(atomic_number: u32, charge: u32) -> u32 {
    atomic_number * 100 + charge
}

/// PDG code of a nucleus with charge `z` and mass number `a`.
pub fn nucleus_pdg(charge: u32, atomic_number: u32) -> i32 {
    PDG_NUCLEUS_BASE + PDG_CHARGE_FACTOR * charge as i32 + atomic_number as i32
}

// ── Particle table ───────────────────────────────────────────────────────────

struct Species {
    corsika:  u32,
    pdg:      i32,
    name:     &'static str,
    /// MeV; zero for massless or unlisted.
    mass_mev: f64,
}

const fn sp(corsika: u32, pdg: i32, name: &'static str, mass_mev: f64) -> Species {
    Species { corsika, pdg, name, mass_mev }
}

const ELECTRON: f64 = 0.510998902;
const MUON:     f64 = 105.658357;
const PION_0:   f64 = 134.9766;
const PION_PM:  f64 = 139.57018;
const KAON_0:   f64 = 497.672;
const KAON_PM:  f64 = 493.677;
const ETA:      f64 = 547.30;
const NEUTRON:  f64 = 939.56533;
const LAMBDA:   f64 = 1115.683;
const SIGMA_0:  f64 = 1192.642;
const SIGMA_P:  f64 = 1189.37;
const SIGMA_M:  f64 = 1197.449;
const XI_0:     f64 = 1314.83;
const XI_M:     f64 = 1321.31;
const OMEGA_M:  f64 = 1672.45;
const RHO_0:    f64 = 775.49;
const RHO_PM:   f64 = 775.11;
const OMEGA:    f64 = 782.65;
const DELTA:    f64 = 1232.0;

static TABLE: &[Species] = &[
    sp(1,  22,     "gamma",            0.0),
    sp(2,  -11,    "e+",               ELECTRON),
    sp(3,  11,     "e-",               ELECTRON),
    sp(5,  -13,    "mu+",              MUON),
    sp(6,  13,     "mu-",              MUON),
    sp(7,  111,    "pi0",              PION_0),
    sp(8,  211,    "pi+",              PION_PM),
    sp(9,  -211,   "pi-",              PION_PM),
    sp(10, 130,    "kaon0L",           KAON_0),
    sp(11, 321,    "kaon+",            KAON_PM),
    sp(12, -321,   "kaon-",            KAON_PM),
    sp(13, 2112,   "neutron",          NEUTRON),
    sp(14, 2212,   "proton",           PROTON_MASS_MEV),
    sp(15, -2212,  "anti_proton",      PROTON_MASS_MEV),
    sp(16, 310,    "kaon0S",           KAON_0),
    sp(17, 221,    "eta",              ETA),
    sp(18, 3122,   "lambda",           LAMBDA),
    sp(19, 3222,   "sigma+",           SIGMA_P),
    sp(20, 3212,   "sigma0",           SIGMA_0),
    sp(21, 3112,   "sigma-",           SIGMA_M),
    sp(22, 3322,   "xi0",              XI_0),
    sp(23, 3312,   "xi-",              XI_M),
    sp(24, 3332,   "omega-",           OMEGA_M),
    sp(25, -2112,  "anti_neutron",     NEUTRON),
    sp(26, -3122,  "anti_lambda",      LAMBDA),
    sp(27, -3222,  "anti_sigma+",      SIGMA_P),
    sp(28, -3212,  "anti_sigma0",      SIGMA_0),
    sp(29, -3112,  "anti_sigma-",      SIGMA_M),
    sp(30, -3322,  "anti_xi0",         XI_0),
    sp(31, -3312,  "anti_xi-",         XI_M),
    sp(32, -3332,  "anti_omega-",      OMEGA_M),
    sp(50, 223,    "omega_meson",      OMEGA),
    sp(51, 113,    "rho_zero",         RHO_0),
    sp(52, 213,    "rho_plus",         RHO_PM),
    sp(53, -213,   "rho_minus",        RHO_PM),
    sp(54, 2224,   "delta_plus_plus",  DELTA),
    sp(55, 2214,   "delta_plus",       DELTA),
    sp(56, 2114,   "delta_zero",       DELTA),
    sp(57, 1114,   "delta_minus",      DELTA),
    sp(66, 12,     "nu_e",             0.0),
    sp(67, -12,    "anti_nu_e",        0.0),
    sp(68, 14,     "nu_mu",            0.0),
    sp(69, -14,    "anti_nu_mu",       0.0),
    sp(71, 221,    "eta",              ETA),
    sp(72, 221,    "eta",              ETA),
    sp(73, 221,    "eta",              ETA),
    sp(74, 221,    "eta",              ETA),
    sp(95, -9900013, "decayed mu+",    MUON),
    sp(96, 9900013,  "decayed mu-",    MUON),
];

static ELEMENTS: &[&str] = &[
    "neutron", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe",
];

fn lookup(corsika: u32) -> Option<&'static Species> {
    TABLE.iter().find(|s| s.corsika == corsika)
}

/// PDG code for a CORSIKA id.  Unknown ids and Cherenkov bunches map to
/// [`PDG_UNDEFINED`].
pub fn pdg_code(corsika: u32) -> i32 {
    let decoded = decode_nucleus_code(corsika);
    if decoded.is_nucleus() {
        return nucleus_pdg(decoded.charge, decoded.atomic_number);
    }
    lookup(corsika).map_or(PDG_UNDEFINED, |s| s.pdg)
}

/// Human-readable name, e.g. `"mu-"` or `"Fe 56"`.
pub fn name(corsika: u32) -> String {
    let decoded = decode_nucleus_code(corsika);
    if decoded.is_nucleus() {
        let z = decoded.charge as usize;
        return match ELEMENTS.get(z) {
            Some(element) => format!("{element} {}", decoded.atomic_number),
            None          => format!("N({z}) {}", decoded.atomic_number),
        };
    }
    match lookup(corsika) {
        Some(s) => s.name.to_string(),
        None if corsika >= CHERENKOV_MIN => "cherenkov".to_string(),
        None => "Undefined".to_string(),
    }
}

/// Rest mass in GeV.  Nuclei are approximated as A proton masses; unknown
/// ids have zero mass.
pub fn mass(corsika: u32) -> f64 {
    let decoded = decode_nucleus_code(corsika);
    let mev = if decoded.is_nucleus() {
        decoded.atomic_number as f64 * PROTON_MASS_MEV
    } else {
        lookup(corsika).map_or(0.0, |s| s.mass_mev)
    };
    mev * 1.0e-3
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_iron() {
        let d = decode_nucleus_code(5626);
        assert_eq!(d, DecodedCode { particle_type: 5626, atomic_number: 56, charge: 26 });
        assert!(d.is_nucleus());
        assert_eq!(pdg_code(5626), 1_000_026_056);
        assert_eq!(name(5626), "Fe 56");
        assert!((mass(5626) - 56.0 * 0.938271998).abs() < 1e-9);
    }

    #[test]
    fn non_nuclei_have_no_mass_number() {
        for code in [1, 6, 14, 99, 9900, 9901] {
            let d = decode_nucleus_code(code);
            assert_eq!((d.atomic_number, d.charge), (0, 0));
        }
    }

    #[test]
    fn pdg_table() {
        assert_eq!(pdg_code(1), 22);
        assert_eq!(pdg_code(5), -13);
        assert_eq!(pdg_code(6), 13);
        assert_eq!(pdg_code(14), 2212);
        assert_eq!(pdg_code(73), 221);
        assert_eq!(pdg_code(96), 9900013);
        assert_eq!(pdg_code(4), PDG_UNDEFINED);
        assert_eq!(pdg_code(9900), PDG_UNDEFINED);
        assert_eq!(name(6), "mu-");
        assert_eq!(name(9900), "cherenkov");
        assert_eq!(name(4), "Undefined");
        assert_eq!(name(14), "proton");
        assert_eq!(name(11), "kaon+");
        assert_eq!(name(18), "lambda");
        assert_eq!(name(3035), "N(35) 30");
        assert!((mass(6) - 0.105658357).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn nucleus_code_roundtrip(a in 1u32..99, z in 0u32..100) {
            let code = encode_nucleus_code(a, z);
            let d = decode_nucleus_code(code);
            prop_assert_eq!(d.atomic_number, a);
            prop_assert_eq!(d.charge, z);
            prop_assert_eq!(encode_nucleus_code(d.atomic_number, d.charge), code);
        }
    }
}
