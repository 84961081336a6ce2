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
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::channel::DEFAULT_CAPACITY;
use crate::sequencer::{DEFAULT_BPM, DEFAULT_TRACK_VOLUME};

const DEFAULT_TICK: Duration = Duration::from_millis(5);

/// A YAML representation of the sequencer settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sequencer {
    /// Starting tempo (default: 120)
    bpm: Option<u8>,

    /// Volume every track mixes its hits at, 0.0 to 1.0 (default: 0.75)
    track_volume: Option<f32>,

    /// How often the mixing thread wakes up (default: 5ms)
    tick: Option<String>,

    /// How many actions can be queued for the mixing thread (default: 64)
    action_capacity: Option<usize>,
}

impl Sequencer {
    pub fn bpm(&self) -> Result<u8, ConfigError> {
        match self.bpm.unwrap_or(DEFAULT_BPM) {
            0 => Err(ConfigError::Invalid {
                field: "sequencer.bpm",
                reason: "tempo must be at least 1".to_string(),
            }),
            bpm => Ok(bpm),
        }
    }

    pub fn track_volume(&self) -> Result<f32, ConfigError> {
        let volume = self.track_volume.unwrap_or(DEFAULT_TRACK_VOLUME);
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::Invalid {
                field: "sequencer.track_volume",
                reason: format!("{} is outside of 0.0 to 1.0", volume),
            });
        }
        Ok(volume)
    }

    pub fn tick(&self) -> Result<Duration, ConfigError> {
        let tick = parse_duration("sequencer.tick", &self.tick, DEFAULT_TICK)?;
        if tick.is_zero() {
            return Err(ConfigError::Invalid {
                field: "sequencer.tick",
                reason: "tick must be longer than zero".to_string(),
            });
        }
        Ok(tick)
    }

    pub fn action_capacity(&self) -> usize {
        self.action_capacity.unwrap_or(DEFAULT_CAPACITY).max(1)
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Sequencer {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let sequencer = Sequencer::default();
        assert_eq!(sequencer.bpm().unwrap(), 120);
        assert_eq!(sequencer.track_volume().unwrap(), 0.75);
        assert_eq!(sequencer.tick().unwrap(), Duration::from_millis(5));
        assert_eq!(sequencer.action_capacity(), 64);
    }

    #[test]
    fn test_deserialize() {
        let sequencer = parse(
            r#"
            bpm: 95
            track_volume: 0.5
            tick: 2ms
            action_capacity: 8
        "#,
        );
        assert_eq!(sequencer.bpm().unwrap(), 95);
        assert_eq!(sequencer.track_volume().unwrap(), 0.5);
        assert_eq!(sequencer.tick().unwrap(), Duration::from_millis(2));
        assert_eq!(sequencer.action_capacity(), 8);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse("bpm: 0").bpm().is_err());
        assert!(parse("track_volume: 1.5").track_volume().is_err());
        assert!(parse("tick: 0ms").tick().is_err());
        assert_eq!(parse("action_capacity: 0").action_capacity(), 1);
    }
}
