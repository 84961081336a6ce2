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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

use crate::samples::{InstrumentId, InstrumentTable};
use crate::sequencer::N_TRACKS;

mod audio;
mod error;
mod sequencer;
mod serial;

pub use audio::Audio;
pub use error::ConfigError;
pub use sequencer::Sequencer;
pub use serial::{Serial, DEFAULT_PORTS};

/// The configuration for the whole drum machine.
#[derive(Deserialize, Clone, Debug)]
pub struct Machine {
    /// The audio output.
    audio: Option<Audio>,

    /// The serial link to the controller hardware.
    serial: Option<Serial>,

    /// Tempo, volume and timing.
    sequencer: Option<Sequencer>,

    /// Sample files, indexed by instrument ID.
    instruments: Vec<PathBuf>,

    /// The instrument each track starts with.
    tracks: Option<Vec<InstrumentId>>,

    /// Relative instrument paths are resolved against this.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Machine {
    /// Parse the configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Machine, ConfigError> {
        let mut machine = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Machine>()?;
        machine.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        machine.validate()?;
        Ok(machine)
    }

    /// Parse the configuration from a YAML string.
    pub fn from_yaml(yaml: &str, base_path: &Path) -> Result<Machine, ConfigError> {
        let mut machine = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Machine>()?;
        machine.base_path = base_path.to_path_buf();
        machine.validate()?;
        Ok(machine)
    }

    /// Checks everything that can be checked up front.
    fn validate(&self) -> Result<(), ConfigError> {
        let sequencer = self.sequencer();
        sequencer.bpm()?;
        sequencer.track_volume()?;
        sequencer.tick()?;
        let serial = self.serial();
        serial.read_timeout()?;
        serial.settle_delay()?;
        self.track_instruments()?;
        if self.audio().sample_rate() == 0 {
            return Err(ConfigError::Invalid {
                field: "audio.sample_rate",
                reason: "sample rate must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    pub fn serial(&self) -> Serial {
        self.serial.clone().unwrap_or_default()
    }

    pub fn sequencer(&self) -> Sequencer {
        self.sequencer.clone().unwrap_or_default()
    }

    /// The instrument table with paths resolved against the config file.
    pub fn instrument_table(&self) -> InstrumentTable {
        InstrumentTable::new(&self.instruments, &self.base_path)
    }

    /// The instrument each track starts with. Defaults to instrument N on track N.
    pub fn track_instruments(&self) -> Result<[InstrumentId; N_TRACKS], ConfigError> {
        match &self.tracks {
            None => Ok(std::array::from_fn(|track| track as InstrumentId)),
            Some(tracks) => {
                tracks
                    .as_slice()
                    .try_into()
                    .map_err(|_| ConfigError::Invalid {
                        field: "tracks",
                        reason: format!(
                            "expected {} tracks but {} were given",
                            N_TRACKS,
                            tracks.len()
                        ),
                    })
            }
        }
    }
}

/// Parses an optional duration string, falling back to the default.
pub(crate) fn parse_duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Duration::from)
            .map_err(|_| ConfigError::Duration {
                field,
                value: value.clone(),
            }),
        None => Ok(default),
    }
}
