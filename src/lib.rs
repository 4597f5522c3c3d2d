//! Reader for CORSIKA air-shower simulation output.
//!
//! [`ShowerFile`] is the event-level entry point; [`RawStream`] exposes the
//! underlying fixed-size blocks.

pub mod error;
pub mod block;
pub mod header;
pub mod particle;
pub mod longitudinal;
pub mod codec;
pub mod config;
pub mod io_stream;
pub mod index;
pub mod shower;
pub mod file;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{CorsikaError, FormatError, Result};
pub use block::{classify, Block, BlockKind, Layout, MarkerWidth};
pub use header::{EventHeader, EventTrailer, RunHeader, RunTrailer};
pub use particle::{decode_nucleus_code, decode_particle_subblocks, encode_nucleus_code,
                   DecodedCode, GroundParticles, ParticleOptions, ParticleRecord, ShowerParticle};
pub use longitudinal::LongitudinalProfile;
pub use codec::Compression;
pub use config::ReaderConfig;
pub use io_stream::RawStream;
pub use index::FileIndex;
pub use shower::{ParticleSource, Shower};
pub use file::{Events, ShowerFile, ShowerParticles};
