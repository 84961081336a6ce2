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

//! The step sequencer.
//!
//! The [`Sequencer`] owns the live [`Sequence`], every track's loop buffer and the
//! sample cache. It's driven entirely from the mixing thread, one [`Action`] at a time.

mod sequence;
mod stats;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub use sequence::{Sequence, Track};
pub use stats::LoopingStatistics;

use crate::audio::CHANNELS;
use crate::mixer::{self, LoopBuffer, TrackMix};
use crate::protocol::Action;
use crate::samples::{InstrumentId, Sample, SampleCache};

/// Number of tracks in a sequence.
pub const N_TRACKS: usize = 5;

/// Number of subdivisions in a bar. Each is a sixteenth note.
pub const N_TRACK_SUBDIVISIONS: usize = 16;

pub const BEATS_PER_BAR: usize = 4;

pub const DEFAULT_BPM: u8 = 120;

pub const DEFAULT_TRACK_VOLUME: f32 = 0.75;

/// What the caller needs to do after an action was applied.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing audible changed.
    Unchanged,
    /// The master mix changed and should be published.
    Remix,
    /// Playback was paused (true) or resumed (false).
    Paused(bool),
    /// Play this sample once, outside the loop.
    Audition(Arc<Sample>),
}

/// Errors constructing a sequencer.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("invalid tempo of {0} bpm")]
    InvalidBpm(u8),
}

/// Applies actions to the sequence and keeps every track's loop buffer in step.
pub struct Sequencer {
    sequence: Sequence,
    stats: LoopingStatistics,
    mixes: Vec<TrackMix>,
    samples: SampleCache,
    /// The instrument each track starts with, restored by [`Action::ClearAll`].
    instruments: [InstrumentId; N_TRACKS],
    track_volume: f32,
    selected_track: usize,
    paused: bool,
}

impl Sequencer {
    /// Creates a sequencer with an empty sequence.
    pub fn new(
        bpm: u8,
        instruments: [InstrumentId; N_TRACKS],
        track_volume: f32,
        samples: SampleCache,
        sample_rate: u32,
    ) -> Result<Sequencer, SequencerError> {
        let stats =
            LoopingStatistics::from_bpm(bpm, sample_rate).ok_or(SequencerError::InvalidBpm(bpm))?;

        Ok(Sequencer {
            sequence: Sequence::new(bpm, instruments, track_volume),
            stats,
            mixes: (0..N_TRACKS).map(|_| TrackMix::new(&stats)).collect(),
            samples,
            instruments,
            track_volume,
            selected_track: 0,
            paused: false,
        })
    }

    /// Applies a single action.
    pub fn apply(&mut self, action: Action) -> Outcome {
        debug!(%action, "Applying action");
        match action {
            Action::ToggleTrackBeat { track, beat } => self.toggle_beat(track as usize, beat as usize),
            Action::ToggleTrackMute { track } => self.toggle_mute(track as usize),
            Action::TogglePause => {
                self.paused = !self.paused;
                info!(paused = self.paused, "Toggled pause");
                Outcome::Paused(self.paused)
            }
            Action::SelectTrack { track } => {
                if (track as usize) < N_TRACKS {
                    self.selected_track = track as usize;
                    info!(track, "Selected track");
                } else {
                    warn!(track, "Ignoring selection of unknown track");
                }
                Outcome::Unchanged
            }
            Action::SampleInstrument { instrument } => match self.samples.get(instrument) {
                Some(sample) => Outcome::Audition(sample),
                None => {
                    error!(instrument, "Instrument unavailable, can't audition it");
                    Outcome::Unchanged
                }
            },
            Action::SetBpm { bpm } => self.set_bpm(bpm),
            Action::ChangeTrackInstrument { track, instrument } => {
                self.change_instrument(track as usize, instrument)
            }
            Action::ClearAll => {
                self.clear();
                Outcome::Remix
            }
            Action::Noop => Outcome::Unchanged,
        }
    }

    fn toggle_beat(&mut self, track: usize, beat: usize) -> Outcome {
        if beat >= N_TRACK_SUBDIVISIONS {
            warn!(track, beat, "Ignoring toggle of unknown beat");
            return Outcome::Unchanged;
        }
        let Some(state) = self.sequence.track_mut(track) else {
            warn!(track, beat, "Ignoring toggle on unknown track");
            return Outcome::Unchanged;
        };

        let on = state.toggle_trigger(beat);
        let instrument = state.instrument_id();
        let volume = state.volume();
        info!(track, beat, on, "Toggled beat");

        match self.samples.get(instrument) {
            Some(sample) => {
                let offset = self.stats.subdivision_offset(beat);
                if on {
                    self.mixes[track].add(sample.data(), offset, volume);
                } else {
                    self.mixes[track].erase(sample.data(), offset, volume);
                }
            }
            None => error!(track, beat, instrument, "Skipping mix of unavailable instrument"),
        }
        Outcome::Remix
    }

    fn toggle_mute(&mut self, track: usize) -> Outcome {
        match self.sequence.track_mut(track) {
            Some(state) => {
                let muted = state.toggle_mute();
                info!(track, muted, "Toggled mute");
                Outcome::Remix
            }
            None => {
                warn!(track, "Ignoring mute of unknown track");
                Outcome::Unchanged
            }
        }
    }

    fn set_bpm(&mut self, bpm: u8) -> Outcome {
        let Some(stats) = LoopingStatistics::from_bpm(bpm, self.stats.sample_rate()) else {
            warn!(bpm, current = self.sequence.bpm(), "Rejecting invalid tempo");
            return Outcome::Unchanged;
        };
        if stats == self.stats {
            return Outcome::Unchanged;
        }

        self.stats = stats;
        self.sequence.set_bpm(bpm);
        info!(%stats, "Tempo changed, rebuilding tracks");

        // Offsets move with the subdivision width, so every track starts over.
        for track in 0..N_TRACKS {
            self.rebuild(track);
        }
        Outcome::Remix
    }

    fn change_instrument(&mut self, track: usize, instrument: InstrumentId) -> Outcome {
        let Some(state) = self.sequence.track_mut(track) else {
            warn!(track, instrument, "Ignoring instrument change on unknown track");
            return Outcome::Unchanged;
        };
        let old = state.instrument_id();
        if old == instrument {
            return Outcome::Unchanged;
        }
        state.set_instrument_id(instrument);
        let volume = state.volume();
        let triggered: Vec<usize> = state.triggered().collect();
        info!(track, old, instrument, "Changed track instrument");

        let old_sample = self.samples.get(old);
        let new_sample = self.samples.get(instrument);
        if new_sample.is_none() {
            error!(track, instrument, "Skipping mix of unavailable instrument");
        }

        let mix = &mut self.mixes[track];
        for beat in triggered {
            let offset = self.stats.subdivision_offset(beat);
            if let Some(sample) = &old_sample {
                mix.erase(sample.data(), offset, volume);
            }
            if let Some(sample) = &new_sample {
                mix.add(sample.data(), offset, volume);
            }
        }
        Outcome::Remix
    }

    /// Resets every track to its starting instrument with no triggers.
    fn clear(&mut self) {
        self.sequence = Sequence::new(self.sequence.bpm(), self.instruments, self.track_volume);
        for mix in self.mixes.iter_mut() {
            mix.reset(&self.stats);
        }
        info!("Cleared all tracks");
    }

    /// Remixes a track's buffer from scratch at the current statistics.
    fn rebuild(&mut self, track: usize) {
        let mix = &mut self.mixes[track];
        mix.reset(&self.stats);

        let Some(state) = self.sequence.track(track) else {
            return;
        };
        if state.active_trigger_count() == 0 {
            return;
        }
        let Some(sample) = self.samples.get(state.instrument_id()) else {
            error!(
                track,
                instrument = state.instrument_id(),
                "Skipping mix of unavailable instrument"
            );
            return;
        };
        for beat in state.triggered() {
            mix.add(sample.data(), self.stats.subdivision_offset(beat), state.volume());
        }
    }

    /// Composites the active tracks into a master buffer.
    pub fn master_mix(&self) -> LoopBuffer {
        let active: Vec<&[i16]> = self
            .sequence
            .tracks()
            .iter()
            .zip(self.mixes.iter())
            .filter(|(track, _)| track.is_active())
            .map(|(_, mix)| mix.buffer())
            .collect();

        let len = self.stats.bar_length_frames() * CHANNELS as usize;
        LoopBuffer::new(mixer::master_mix(len, &active), self.stats)
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn stats(&self) -> &LoopingStatistics {
        &self.stats
    }

    /// The loop buffer for a single track.
    pub fn track_mix(&self, track: usize) -> Option<&TrackMix> {
        self.mixes.get(track)
    }

    /// The track that hardware actions are currently aimed at.
    pub fn selected_track(&self) -> usize {
        self.selected_track
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::samples::{InstrumentTable, Sample};

    const RATE: u32 = 44100;

    /// A short decaying hit with distinct channels.
    fn hit(frames: usize, peak: i16) -> Sample {
        let data = (0..frames)
            .flat_map(|i| {
                let value = (peak as i32 * (frames - i) as i32 / frames as i32) as i16;
                [value, -value]
            })
            .collect();
        Sample::new(data, RATE)
    }

    fn sequencer() -> Sequencer {
        let mut cache = SampleCache::new(InstrumentTable::default(), RATE);
        cache.insert(0, hit(1000, 20000));
        cache.insert(1, hit(3000, 12000));
        cache.insert(2, hit(500, 30000));
        Sequencer::new(120, [0, 1, 2, 0, 1], DEFAULT_TRACK_VOLUME, cache, RATE).unwrap()
    }

    fn beat(track: u8, beat: u8) -> Action {
        Action::ToggleTrackBeat { track, beat }
    }

    #[test]
    fn test_zero_bpm_rejected() {
        let cache = SampleCache::new(InstrumentTable::default(), RATE);
        assert!(matches!(
            Sequencer::new(0, [0; N_TRACKS], 0.75, cache, RATE),
            Err(SequencerError::InvalidBpm(0))
        ));

        let mut sequencer = sequencer();
        let before = *sequencer.stats();
        assert!(matches!(
            sequencer.apply(Action::SetBpm { bpm: 0 }),
            Outcome::Unchanged
        ));
        assert_eq!(sequencer.sequence().bpm(), 120);
        assert_eq!(*sequencer.stats(), before);
    }

    #[test]
    fn test_beat_on_then_off_is_silent() {
        let mut sequencer = sequencer();
        assert!(matches!(sequencer.apply(beat(0, 0)), Outcome::Remix));
        assert!(!sequencer.track_mix(0).unwrap().is_silent());
        assert!(!sequencer.master_mix().is_silent());

        sequencer.apply(beat(0, 0));
        assert!(sequencer.track_mix(0).unwrap().is_silent());
        assert!(sequencer.master_mix().is_silent());
        assert_eq!(sequencer.sequence().track(0).unwrap().active_trigger_count(), 0);
    }

    #[test]
    fn test_beat_lands_on_subdivision() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(0, 4));

        let offset = sequencer.stats().subdivision_offset(4) * 2;
        let buffer = sequencer.track_mix(0).unwrap().buffer();
        assert!(buffer[..offset].iter().all(|&s| s == 0));
        assert_eq!(buffer[offset], (20000.0 * 0.75) as i16);
        assert_eq!(buffer[offset + 1], (-20000.0 * 0.75) as i16);
    }

    #[test]
    fn test_bpm_change_keeps_relative_placement() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(0, 0));
        let at_120 = sequencer.track_mix(0).unwrap().buffer().to_vec();

        assert!(matches!(
            sequencer.apply(Action::SetBpm { bpm: 60 }),
            Outcome::Remix
        ));
        let at_60 = sequencer.track_mix(0).unwrap().buffer().to_vec();
        let slow = LoopingStatistics::from_bpm(60, RATE).unwrap();
        assert_eq!(at_60.len(), slow.bar_length_frames() * 2);
        assert!(at_60.len() > at_120.len() * 3 / 2);
        assert_eq!(&at_60[..2000], &at_120[..2000]);
        assert_eq!(sequencer.master_mix().stats().bpm(), 60);

        sequencer.apply(Action::SetBpm { bpm: 120 });
        assert_eq!(sequencer.track_mix(0).unwrap().buffer(), at_120.as_slice());
        assert_eq!(sequencer.master_mix().samples().len(), at_120.len());
    }

    #[test]
    fn test_bpm_change_moves_later_beats() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(2, 8));
        sequencer.apply(Action::SetBpm { bpm: 90 });

        let stats = *sequencer.stats();
        let buffer = sequencer.track_mix(2).unwrap().buffer();
        let offset = stats.subdivision_offset(8) * 2;
        assert!(buffer[..offset].iter().all(|&s| s == 0));
        assert_ne!(buffer[offset], 0);
        assert_eq!(buffer.len(), stats.bar_length_frames() * 2);
    }

    #[test]
    fn test_mute_only_active_track_silences_master() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(1, 0));
        sequencer.apply(beat(1, 8));
        assert!(!sequencer.master_mix().is_silent());

        assert!(matches!(
            sequencer.apply(Action::ToggleTrackMute { track: 1 }),
            Outcome::Remix
        ));
        assert_eq!(sequencer.sequence().active_track_count(), 0);
        assert!(sequencer.master_mix().is_silent());

        // The track keeps its buffer while muted.
        assert!(!sequencer.track_mix(1).unwrap().is_silent());
        sequencer.apply(Action::ToggleTrackMute { track: 1 });
        assert!(!sequencer.master_mix().is_silent());
    }

    #[test]
    fn test_master_normalizes_by_active_tracks() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(0, 0));
        let solo = sequencer.master_mix().samples()[0];

        // Track 3 plays instrument 0 too, on a different beat.
        sequencer.apply(beat(3, 1));
        let duo = sequencer.master_mix().samples()[0];
        assert_eq!(duo, (solo as f32 * 0.5) as i16);
    }

    #[test]
    fn test_change_instrument_remixes_triggers() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(0, 0));
        sequencer.apply(beat(0, 6));
        sequencer.apply(Action::ChangeTrackInstrument {
            track: 0,
            instrument: 2,
        });
        assert_eq!(sequencer.sequence().track(0).unwrap().instrument_id(), 2);

        // Same as building the track with instrument 2 from the start.
        let mut expected = self::sequencer();
        expected.apply(beat(2, 0));
        expected.apply(beat(2, 6));
        assert_eq!(
            sequencer.track_mix(0).unwrap().buffer(),
            expected.track_mix(2).unwrap().buffer()
        );
    }

    #[test]
    fn test_change_instrument_to_same_is_unchanged() {
        let mut sequencer = sequencer();
        assert!(matches!(
            sequencer.apply(Action::ChangeTrackInstrument {
                track: 0,
                instrument: 0
            }),
            Outcome::Unchanged
        ));
    }

    #[test]
    fn test_unavailable_instrument_is_skipped() {
        let mut sequencer = sequencer();
        sequencer.apply(Action::ChangeTrackInstrument {
            track: 4,
            instrument: 9,
        });
        assert!(matches!(sequencer.apply(beat(4, 0)), Outcome::Remix));
        let track = sequencer.sequence().track(4).unwrap();
        assert!(track.is_active());
        assert!(sequencer.track_mix(4).unwrap().is_silent());

        sequencer.apply(beat(4, 0));
        assert!(sequencer.track_mix(4).unwrap().is_silent());
    }

    #[test]
    fn test_clear_all() {
        let mut sequencer = sequencer();
        sequencer.apply(beat(0, 0));
        sequencer.apply(beat(2, 3));
        sequencer.apply(Action::ToggleTrackMute { track: 2 });
        sequencer.apply(Action::ChangeTrackInstrument {
            track: 0,
            instrument: 1,
        });
        sequencer.apply(Action::SetBpm { bpm: 100 });

        assert!(matches!(sequencer.apply(Action::ClearAll), Outcome::Remix));
        let master = sequencer.master_mix();
        assert!(master.is_silent());
        assert_eq!(master.stats().bpm(), 100);
        for (i, track) in sequencer.sequence().tracks().iter().enumerate() {
            assert_eq!(track.active_trigger_count(), 0);
            assert!(!track.is_muted());
            assert!(sequencer.track_mix(i).unwrap().is_silent());
        }
        assert_eq!(sequencer.sequence().track(0).unwrap().instrument_id(), 0);
    }

    #[test]
    fn test_out_of_range_actions_are_ignored() {
        let mut sequencer = sequencer();
        assert!(matches!(sequencer.apply(beat(5, 0)), Outcome::Unchanged));
        assert!(matches!(sequencer.apply(beat(0, 16)), Outcome::Unchanged));
        assert!(matches!(
            sequencer.apply(Action::ToggleTrackMute { track: 200 }),
            Outcome::Unchanged
        ));
        assert!(matches!(
            sequencer.apply(Action::ChangeTrackInstrument {
                track: 5,
                instrument: 1
            }),
            Outcome::Unchanged
        ));
        assert!(matches!(sequencer.apply(Action::Noop), Outcome::Unchanged));
        assert!(sequencer.master_mix().is_silent());
    }

    #[test]
    fn test_select_track() {
        let mut sequencer = sequencer();
        sequencer.apply(Action::SelectTrack { track: 3 });
        assert_eq!(sequencer.selected_track(), 3);
        sequencer.apply(Action::SelectTrack { track: 9 });
        assert_eq!(sequencer.selected_track(), 3);
    }

    #[test]
    fn test_pause_and_audition() {
        let mut sequencer = sequencer();
        assert!(matches!(
            sequencer.apply(Action::TogglePause),
            Outcome::Paused(true)
        ));
        assert!(sequencer.is_paused());
        assert!(matches!(
            sequencer.apply(Action::TogglePause),
            Outcome::Paused(false)
        ));

        match sequencer.apply(Action::SampleInstrument { instrument: 1 }) {
            Outcome::Audition(sample) => assert_eq!(sample.frames(), 3000),
            other => panic!("expected an audition, got {:?}", other),
        }
        assert!(matches!(
            sequencer.apply(Action::SampleInstrument { instrument: 42 }),
            Outcome::Unchanged
        ));
    }

    #[test]
    fn test_random_toggles_keep_counts_and_unmix() {
        let mut rng = StdRng::seed_from_u64(1234);
        let mut sequencer = sequencer();
        let mut toggled = Vec::new();

        for _ in 0..200 {
            let action = beat(rng.gen_range(0..N_TRACKS as u8), rng.gen_range(0..16));
            sequencer.apply(action);
            toggled.push(action);
        }
        for track in sequencer.sequence().tracks() {
            assert_eq!(track.active_trigger_count(), track.triggered().count());
        }

        // Undo everything in reverse.
        for action in toggled.into_iter().rev() {
            sequencer.apply(action);
        }
        for i in 0..N_TRACKS {
            assert!(sequencer.track_mix(i).unwrap().is_silent(), "track {} not silent", i);
        }
    }
}
