// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Instrument sample loading and caching.
//!
//! This module provides:
//! - The instrument table mapping instrument IDs to sample files
//! - Decoding of sample files into interleaved stereo 16-bit PCM at the engine rate
//! - A lazy, per-instrument cache of decoded samples shared read-only by the mixers

mod cache;
mod loader;

use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

pub use cache::{CacheError, SampleCache};
pub use loader::{SampleError, SampleLoader};

use crate::audio::CHANNELS;

/// Identifies a percussion sound in the instrument table.
pub type InstrumentId = u8;

/// Decoded sample data. Immutable once loaded.
pub struct Sample {
    /// Interleaved stereo samples.
    data: Vec<i16>,
    /// Sample rate of the data.
    sample_rate: u32,
}

impl Sample {
    /// Creates a sample from interleaved stereo data.
    pub fn new(data: Vec<i16>, sample_rate: u32) -> Sample {
        Sample { data, sample_rate }
    }

    /// The interleaved stereo samples.
    pub fn data(&self) -> &[i16] {
        &self.data
    }

    /// Number of whole stereo frames.
    pub fn frames(&self) -> usize {
        self.data.len() / CHANNELS as usize
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Maps instrument IDs to the sample files that voice them.
#[derive(Clone, Debug, Default)]
pub struct InstrumentTable {
    paths: Vec<PathBuf>,
}

impl InstrumentTable {
    /// Creates a table from paths indexed by instrument ID. Relative paths are
    /// resolved against `base_path`.
    pub fn new<P: AsRef<Path>>(paths: &[P], base_path: &Path) -> InstrumentTable {
        InstrumentTable {
            paths: paths
                .iter()
                .map(|path| {
                    let path = path.as_ref();
                    if path.is_absolute() {
                        path.to_path_buf()
                    } else {
                        base_path.join(path)
                    }
                })
                .collect(),
        }
    }

    /// Gets the sample file for the given instrument.
    pub fn path(&self, instrument: InstrumentId) -> Option<&Path> {
        self.paths.get(instrument as usize).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterates over (instrument, path) entries.
    pub fn iter(&self) -> impl Iterator<Item = (InstrumentId, &Path)> {
        self.paths
            .iter()
            .enumerate()
            .map(|(id, path)| (id as InstrumentId, path.as_path()))
    }
}
