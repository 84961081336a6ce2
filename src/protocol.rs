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

//! The control wire protocol.
//!
//! Every message is framed as:
//!
//! ```text
//! [START_MARKER] [MSG_TYPE] [PAYLOAD_LEN] [PAYLOAD_LEN bytes of payload]
//! ```
//!
//! Framing is length prefixed, so message types this side doesn't understand can be
//! skipped. They decode to [`Action::Noop`].

mod decoder;

use std::fmt;

use tracing::warn;

pub use decoder::{DecodeError, FrameDecoder};

use crate::samples::InstrumentId;

/// Marks the beginning of every frame.
pub const START_MARKER: u8 = 0xAA;

/// The message types carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    SequenceData = 1,
    PausePlay = 2,
    Sample = 3,
    MuteTrack = 4,
    BpmSelect = 5,
    ChangeTrackInstrumentId = 6,
    ClearAll = 7,
}

impl MessageType {
    /// The minimum payload length this message type requires.
    pub fn payload_len(&self) -> usize {
        match self {
            MessageType::SequenceData | MessageType::ChangeTrackInstrumentId => 2,
            MessageType::Sample | MessageType::MuteTrack | MessageType::BpmSelect => 1,
            MessageType::PausePlay | MessageType::ClearAll => 0,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => MessageType::SequenceData,
            2 => MessageType::PausePlay,
            3 => MessageType::Sample,
            4 => MessageType::MuteTrack,
            5 => MessageType::BpmSelect,
            6 => MessageType::ChangeTrackInstrumentId,
            7 => MessageType::ClearAll,
            unknown => return Err(unknown),
        })
    }
}

/// A decoded control command, consumed exactly once by the sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    ToggleTrackBeat { track: u8, beat: u8 },
    ToggleTrackMute { track: u8 },
    TogglePause,
    /// Changes which track subsequent hardware actions target. Never sent on the wire.
    SelectTrack { track: u8 },
    SampleInstrument { instrument: InstrumentId },
    SetBpm { bpm: u8 },
    ChangeTrackInstrument { track: u8, instrument: InstrumentId },
    ClearAll,
    Noop,
}

impl Action {
    /// Converts a framed message into an action. Unknown types and payloads that are
    /// too short become [`Action::Noop`]. Extra payload bytes are ignored.
    pub fn from_message(msg_type: u8, payload: &[u8]) -> Action {
        let msg_type = match MessageType::try_from(msg_type) {
            Ok(msg_type) => msg_type,
            Err(_) => return Action::Noop,
        };
        if payload.len() < msg_type.payload_len() {
            warn!(
                ?msg_type,
                len = payload.len(),
                "Payload too short for message type, ignoring"
            );
            return Action::Noop;
        }

        match msg_type {
            MessageType::SequenceData => Action::ToggleTrackBeat {
                track: payload[0],
                beat: payload[1],
            },
            MessageType::PausePlay => Action::TogglePause,
            MessageType::Sample => Action::SampleInstrument {
                instrument: payload[0],
            },
            MessageType::MuteTrack => Action::ToggleTrackMute { track: payload[0] },
            MessageType::BpmSelect => Action::SetBpm { bpm: payload[0] },
            MessageType::ChangeTrackInstrumentId => Action::ChangeTrackInstrument {
                track: payload[0],
                instrument: payload[1],
            },
            MessageType::ClearAll => Action::ClearAll,
        }
    }

    /// Encodes the action as a wire frame. Actions with no wire form return None.
    pub fn encode(&self) -> Option<Vec<u8>> {
        let (msg_type, payload): (MessageType, Vec<u8>) = match *self {
            Action::ToggleTrackBeat { track, beat } => {
                (MessageType::SequenceData, vec![track, beat])
            }
            Action::ToggleTrackMute { track } => (MessageType::MuteTrack, vec![track]),
            Action::TogglePause => (MessageType::PausePlay, vec![]),
            Action::SampleInstrument { instrument } => (MessageType::Sample, vec![instrument]),
            Action::SetBpm { bpm } => (MessageType::BpmSelect, vec![bpm]),
            Action::ChangeTrackInstrument { track, instrument } => (
                MessageType::ChangeTrackInstrumentId,
                vec![track, instrument],
            ),
            Action::ClearAll => (MessageType::ClearAll, vec![]),
            Action::SelectTrack { .. } | Action::Noop => return None,
        };

        let mut frame = Vec::with_capacity(3 + payload.len());
        frame.push(START_MARKER);
        frame.push(msg_type as u8);
        frame.push(payload.len() as u8);
        frame.extend_from_slice(&payload);
        Some(frame)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ToggleTrackBeat { track, beat } => {
                write!(f, "toggle beat {} on track {}", beat, track)
            }
            Action::ToggleTrackMute { track } => write!(f, "toggle mute on track {}", track),
            Action::TogglePause => write!(f, "toggle pause"),
            Action::SelectTrack { track } => write!(f, "select track {}", track),
            Action::SampleInstrument { instrument } => {
                write!(f, "sample instrument {}", instrument)
            }
            Action::SetBpm { bpm } => write!(f, "set bpm {}", bpm),
            Action::ChangeTrackInstrument { track, instrument } => {
                write!(f, "change track {} to instrument {}", track, instrument)
            }
            Action::ClearAll => write!(f, "clear all"),
            Action::Noop => write!(f, "noop"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_layout() {
        assert_eq!(
            Action::ToggleTrackBeat { track: 2, beat: 15 }.encode(),
            Some(vec![0xAA, 1, 2, 2, 15])
        );
        assert_eq!(Action::TogglePause.encode(), Some(vec![0xAA, 2, 0]));
        assert_eq!(
            Action::ChangeTrackInstrument {
                track: 4,
                instrument: 9
            }
            .encode(),
            Some(vec![0xAA, 6, 2, 4, 9])
        );
        assert_eq!(Action::ClearAll.encode(), Some(vec![0xAA, 7, 0]));
        assert_eq!(Action::SelectTrack { track: 1 }.encode(), None);
        assert_eq!(Action::Noop.encode(), None);
    }

    #[test]
    fn test_unknown_type_is_noop() {
        assert_eq!(Action::from_message(0, &[]), Action::Noop);
        assert_eq!(Action::from_message(8, &[1, 2, 3]), Action::Noop);
        assert_eq!(Action::from_message(0xFF, &[]), Action::Noop);
    }

    #[test]
    fn test_short_payload_is_noop() {
        assert_eq!(Action::from_message(1, &[3]), Action::Noop);
        assert_eq!(Action::from_message(5, &[]), Action::Noop);
        assert_eq!(Action::from_message(6, &[0]), Action::Noop);
    }

    #[test]
    fn test_extra_payload_is_ignored() {
        assert_eq!(
            Action::from_message(5, &[140, 1, 2]),
            Action::SetBpm { bpm: 140 }
        );
        assert_eq!(Action::from_message(7, &[1]), Action::ClearAll);
    }

    #[test]
    fn test_message_type_conversion() {
        for value in 1..=7u8 {
            let msg_type = MessageType::try_from(value).unwrap();
            assert_eq!(msg_type as u8, value);
        }
        assert_eq!(MessageType::try_from(0), Err(0));
    }
}
