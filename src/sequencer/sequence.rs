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
use std::fmt;

use super::{N_TRACKS, N_TRACK_SUBDIVISIONS};
use crate::samples::InstrumentId;

/// A single track of the step sequencer.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    muted: bool,
    volume: f32,
    instrument_id: InstrumentId,
    active_trigger_count: usize,
    triggers: [bool; N_TRACK_SUBDIVISIONS],
}

impl Track {
    /// Creates an empty, unmuted track.
    pub fn new(instrument_id: InstrumentId, volume: f32) -> Track {
        Track {
            muted: false,
            volume,
            instrument_id,
            active_trigger_count: 0,
            triggers: [false; N_TRACK_SUBDIVISIONS],
        }
    }

    /// A track is heard when it has at least one trigger and isn't muted.
    pub fn is_active(&self) -> bool {
        self.active_trigger_count > 0 && !self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument_id
    }

    pub fn active_trigger_count(&self) -> usize {
        self.active_trigger_count
    }

    pub fn is_triggered(&self, subdivision: usize) -> bool {
        self.triggers.get(subdivision).copied().unwrap_or(false)
    }

    /// Subdivisions with a trigger set, in bar order.
    pub fn triggered(&self) -> impl Iterator<Item = usize> + '_ {
        self.triggers
            .iter()
            .enumerate()
            .filter(|(_, triggered)| **triggered)
            .map(|(subdivision, _)| subdivision)
    }

    /// Flips a trigger and returns its new state.
    pub(super) fn toggle_trigger(&mut self, subdivision: usize) -> bool {
        let trigger = &mut self.triggers[subdivision];
        *trigger = !*trigger;
        if *trigger {
            self.active_trigger_count += 1;
        } else {
            self.active_trigger_count -= 1;
        }
        *trigger
    }

    /// Flips the mute and returns the new state.
    pub(super) fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub(super) fn set_instrument_id(&mut self, instrument_id: InstrumentId) {
        self.instrument_id = instrument_id;
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &triggered in self.triggers.iter() {
            write!(f, "{}", if triggered { 'X' } else { '_' })?;
        }
        write!(f, " instrument {}", self.instrument_id)?;
        if self.muted {
            write!(f, " (muted)")?;
        }
        Ok(())
    }
}

/// The live tempo and trigger state of every track.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    bpm: u8,
    tracks: [Track; N_TRACKS],
}

impl Sequence {
    /// Creates an empty sequence with the given instrument on each track.
    pub fn new(bpm: u8, instruments: [InstrumentId; N_TRACKS], volume: f32) -> Sequence {
        Sequence {
            bpm,
            tracks: instruments.map(|instrument| Track::new(instrument, volume)),
        }
    }

    pub fn bpm(&self) -> u8 {
        self.bpm
    }

    pub(super) fn set_bpm(&mut self, bpm: u8) {
        self.bpm = bpm;
    }

    pub fn tracks(&self) -> &[Track; N_TRACKS] {
        &self.tracks
    }

    pub fn track(&self, track: usize) -> Option<&Track> {
        self.tracks.get(track)
    }

    pub(super) fn track_mut(&mut self, track: usize) -> Option<&mut Track> {
        self.tracks.get_mut(track)
    }

    /// Number of tracks that are currently heard.
    pub fn active_track_count(&self) -> usize {
        self.tracks.iter().filter(|track| track.is_active()).count()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BPM: {}", self.bpm)?;
        for (i, track) in self.tracks.iter().enumerate() {
            writeln!(f, "Track {}: {}", i, track)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_trigger_count_follows_triggers() {
        let mut track = Track::new(0, 0.75);
        assert!(!track.is_active());

        assert!(track.toggle_trigger(0));
        assert!(track.toggle_trigger(15));
        assert_eq!(track.active_trigger_count(), 2);
        assert!(track.is_active());
        assert_eq!(track.triggered().collect::<Vec<_>>(), vec![0, 15]);

        assert!(!track.toggle_trigger(0));
        assert_eq!(track.active_trigger_count(), 1);
        assert!(!track.is_triggered(0));
        assert!(track.is_triggered(15));
        assert!(!track.is_triggered(99));
    }

    #[test]
    fn test_muted_track_is_inactive() {
        let mut track = Track::new(0, 0.75);
        track.toggle_trigger(3);
        assert!(track.toggle_mute());
        assert!(!track.is_active());
        assert!(!track.toggle_mute());
        assert!(track.is_active());
    }

    #[test]
    fn test_display() {
        let mut sequence = Sequence::new(120, [0, 1, 2, 3, 4], 0.75);
        sequence.track_mut(1).unwrap().toggle_trigger(4);
        sequence.track_mut(1).unwrap().toggle_mute();
        let display = sequence.to_string();
        assert!(display.starts_with("BPM: 120\n"));
        assert!(display.contains("Track 1: ____X___________ instrument 1 (muted)"));
    }
}
