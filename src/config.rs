//! Reader options, loadable from TOML.
//!
//! ```toml
//! # corsika.toml
//! thinned = true
//! compression = "gzip"
//! scan_on_open = false
//! max_header_search_blocks = 400
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::codec::Compression;
use crate::error::{CorsikaError, Result};

/// Blocks searched for the run header before a scan gives up.
pub const DEFAULT_MAX_HEADER_SEARCH_BLOCKS: u64 = 400;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Force the thinned (`Some(true)`) or unthinned layout.  `None` detects
    /// it from the first record marker.
    pub thinned: Option<bool>,

    /// Force a decompressor.  `None` detects it from the signature bytes.
    pub compression: Option<Compression>,

    /// Build the event index while opening instead of on first use.
    pub scan_on_open: bool,

    pub max_header_search_blocks: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            thinned:                  None,
            compression:              None,
            scan_on_open:             false,
            max_header_search_blocks: DEFAULT_MAX_HEADER_SEARCH_BLOCKS,
        }
    }
}

impl ReaderConfig {
    pub fn thinned(mut self, thinned: Option<bool>) -> Self {
        self.thinned = thinned;
        self
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorsikaError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CorsikaError::Config(format!("Failed to parse TOML configuration: {e}")))
    }
}
