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
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, warn};

use super::{InstrumentId, InstrumentTable, Sample, SampleError, SampleLoader};

enum Entry {
    Loaded(Arc<Sample>),
    /// The load failed. The instrument stays silent until the cache is rebuilt.
    Failed,
}

/// Lazily loads and retains decoded samples per instrument.
///
/// Owned by the mixing thread. Loaded samples are shared read-only through [`Arc`].
pub struct SampleCache {
    loader: SampleLoader,
    table: InstrumentTable,
    entries: HashMap<InstrumentId, Entry>,
}

impl SampleCache {
    /// Creates an empty cache over the given instrument table.
    pub fn new(table: InstrumentTable, sample_rate: u32) -> SampleCache {
        SampleCache {
            loader: SampleLoader::new(sample_rate),
            table,
            entries: HashMap::new(),
        }
    }

    /// Gets the sample for an instrument, loading it on first use. Returns None
    /// if the instrument is unknown or its file failed to load.
    pub fn get(&mut self, instrument: InstrumentId) -> Option<Arc<Sample>> {
        if !self.entries.contains_key(&instrument) {
            let entry = match self.load(instrument) {
                Ok(sample) => Entry::Loaded(Arc::new(sample)),
                Err(e) => {
                    error!(instrument, err = %e, "Failed to load instrument sample");
                    Entry::Failed
                }
            };
            self.entries.insert(instrument, entry);
        }

        match self.entries.get(&instrument) {
            Some(Entry::Loaded(sample)) => Some(sample.clone()),
            _ => None,
        }
    }

    /// Loads an instrument without touching the cache.
    pub fn load(&self, instrument: InstrumentId) -> Result<Sample, CacheError> {
        let path = self
            .table
            .path(instrument)
            .ok_or(CacheError::UnknownInstrument(instrument))?;
        Ok(self.loader.load(path)?)
    }

    /// Places an already decoded sample into the cache.
    pub fn insert(&mut self, instrument: InstrumentId, sample: Sample) {
        self.entries
            .insert(instrument, Entry::Loaded(Arc::new(sample)));
    }

    /// Loads every instrument in the table, returning the ones that failed.
    pub fn preload(&mut self) -> Vec<InstrumentId> {
        let ids: Vec<InstrumentId> = self.table.iter().map(|(id, _)| id).collect();
        let failed: Vec<InstrumentId> = ids
            .into_iter()
            .filter(|&id| self.get(id).is_none())
            .collect();
        if !failed.is_empty() {
            warn!(?failed, "Some instruments could not be loaded");
        }
        failed
    }

    pub fn table(&self) -> &InstrumentTable {
        &self.table
    }
}

/// Errors looking up an instrument's sample.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("No instrument with ID {0} in the instrument table")]
    UnknownInstrument(InstrumentId),

    #[error(transparent)]
    Sample(#[from] SampleError),
}
