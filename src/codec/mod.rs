//! Transparent decompression of compressed CORSIKA files.
//!
//! # Detection
//! The container is identified from its leading signature bytes only; file
//! extensions are never consulted.  A file without a known signature is
//! read as plain CORSIKA output.
//!
//! # Seekability
//! Every decompressed source is a forward-only byte stream.  Random access
//! into compressed input is never attempted.

use std::io::{self, BufReader, Read};

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

use crate::error::{CorsikaError, Result};

// ── Signatures ───────────────────────────────────────────────────────────────

pub const GZIP_MAGIC:  [u8; 2] = [0x1f, 0x8b];
pub const BZIP2_MAGIC: [u8; 3] = *b"BZh";
pub const ZSTD_MAGIC:  [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Bytes needed to recognise any supported signature.
pub const MAGIC_LEN: usize = 4;

// ── Compression ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
    Zstd,
}

impl Compression {
    /// Identify the container from its first bytes.
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else if head.starts_with(&BZIP2_MAGIC) {
            Compression::Bzip2
        } else if head.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None  => "none",
            Compression::Gzip  => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Zstd  => "zstd",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"           => Some(Compression::None),
            "gzip" | "gz"    => Some(Compression::Gzip),
            "bzip2" | "bz2"  => Some(Compression::Bzip2),
            "zstd" | "zst"   => Some(Compression::Zstd),
            _                => None,
        }
    }

    #[inline]
    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Wrap `reader` in the streaming decoder for `compression`.
pub fn open_decoder<'a, R: Read + 'a>(compression: Compression, reader: R) -> Result<Box<dyn Read + 'a>> {
    match compression {
        Compression::None => Ok(Box::new(reader)),
        Compression::Gzip => Ok(Box::new(MultiGzDecoder::new(BufReader::new(reader)))),
        Compression::Zstd => {
            let decoder = zstd::Decoder::new(reader)
                .map_err(|e| decompression_error(Compression::Zstd, e))?;
            Ok(Box::new(decoder))
        }
        Compression::Bzip2 => open_bzip2(reader),
    }
}

#[cfg(feature = "bzip2")]
fn open_bzip2<'a, R: Read + 'a>(reader: R) -> Result<Box<dyn Read + 'a>> {
    Ok(Box::new(bzip2::read::MultiBzDecoder::new(BufReader::new(reader))))
}

#[cfg(not(feature = "bzip2"))]
fn open_bzip2<'a, R: Read + 'a>(_reader: R) -> Result<Box<dyn Read + 'a>> {
    Err(CorsikaError::Unsupported(
        "bzip2 input requires the `bzip2` feature".to_string(),
    ))
}

fn decompression_error(compression: Compression, e: io::Error) -> CorsikaError {
    CorsikaError::Io(io::Error::new(
        e.kind(),
        format!("{} decoder: {e}", compression.name()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn detect_signatures() {
        assert_eq!(Compression::detect(&[0x1f, 0x8b, 0x08, 0x00]), Compression::Gzip);
        assert_eq!(Compression::detect(b"BZh9"), Compression::Bzip2);
        assert_eq!(Compression::detect(&ZSTD_MAGIC), Compression::Zstd);
        assert_eq!(Compression::detect(&[0x94, 0x59, 0x00, 0x00]), Compression::None);
        assert_eq!(Compression::detect(&[]), Compression::None);
    }

    #[test]
    fn names() {
        for c in [Compression::None, Compression::Gzip, Compression::Bzip2, Compression::Zstd] {
            assert_eq!(Compression::from_name(c.name()), Some(c));
        }
        assert_eq!(Compression::from_name("GZ"), Some(Compression::Gzip));
        assert_eq!(Compression::from_name("lz4"), None);
    }

    #[test]
    fn gzip_and_zstd_decode() {
        let data = b"RUNH and some payload".to_vec();

        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&data).unwrap();
        let gz = gz.finish().unwrap();
        assert_eq!(Compression::detect(&gz), Compression::Gzip);
        let mut out = Vec::new();
        open_decoder(Compression::Gzip, &gz[..]).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        let zst = zstd::encode_all(&data[..], 3).unwrap();
        assert_eq!(Compression::detect(&zst), Compression::Zstd);
        let mut out = Vec::new();
        open_decoder(Compression::Zstd, &zst[..]).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[cfg(feature = "bzip2")]
    #[test]
    fn bzip2_decode() {
        let data = b"RUNH and some payload".to_vec();
        let mut bz = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        bz.write_all(&data).unwrap();
        let bz = bz.finish().unwrap();
        assert_eq!(Compression::detect(&bz), Compression::Bzip2);

        let mut out = Vec::new();
        open_decoder(Compression::Bzip2, &bz[..]).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
