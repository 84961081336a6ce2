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
use std::io::{self, Read};

use tracing::{debug, trace, warn};

use super::{Action, START_MARKER};

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("transport closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// The outcome of a single transport read.
enum ByteRead {
    Byte(u8),
    TimedOut,
}

/// Extracts framed actions from a byte transport.
///
/// The transport is expected to return [`io::ErrorKind::TimedOut`] (or
/// [`io::ErrorKind::WouldBlock`]) when a read stalls. Bytes that don't start a
/// frame are discarded, and a stall in the middle of a frame abandons it. A
/// marker repeated where the message type belongs starts the frame over.
pub struct FrameDecoder<R> {
    reader: R,
}

impl<R: Read> FrameDecoder<R> {
    pub fn new(reader: R) -> FrameDecoder<R> {
        FrameDecoder { reader }
    }

    /// Reads until the next complete frame and returns its action.
    ///
    /// Returns `Ok(None)` whenever the transport stalls, whether idle or mid-frame,
    /// so the caller can check whether it should keep going.
    pub fn next_action(&mut self) -> Result<Option<Action>, DecodeError> {
        let mut discarded = 0usize;
        loop {
            match self.read_byte()? {
                ByteRead::TimedOut => {
                    if discarded > 0 {
                        debug!(discarded, "Discarded bytes while looking for a frame");
                    }
                    return Ok(None);
                }
                ByteRead::Byte(START_MARKER) => break,
                ByteRead::Byte(byte) => {
                    trace!(byte, "Discarding byte outside of frame");
                    discarded += 1;
                }
            }
        }
        if discarded > 0 {
            debug!(discarded, "Resynchronized on start marker");
        }

        // A repeated marker starts the frame over. No message type uses the
        // marker's value.
        let msg_type = loop {
            match self.read_byte()? {
                ByteRead::Byte(START_MARKER) => trace!("Repeated start marker"),
                ByteRead::Byte(byte) => break byte,
                ByteRead::TimedOut => {
                    warn!("Timed out reading frame header, abandoning frame");
                    return Ok(None);
                }
            }
        };
        let mut len = [0u8; 1];
        if !self.fill(&mut len)? {
            warn!(msg_type, "Timed out reading frame header, abandoning frame");
            return Ok(None);
        }
        let [len] = len;

        let mut payload = vec![0u8; len as usize];
        if !self.fill(&mut payload)? {
            warn!(msg_type, len, "Timed out reading frame payload, abandoning frame");
            return Ok(None);
        }

        let action = Action::from_message(msg_type, &payload);
        if action == Action::Noop {
            debug!(msg_type, len, "Ignoring unrecognized message");
        }
        Ok(Some(action))
    }

    /// Fills the buffer completely. Returns false if the transport stalled first.
    fn fill(&mut self, buf: &mut [u8]) -> Result<bool, DecodeError> {
        for slot in buf.iter_mut() {
            match self.read_byte()? {
                ByteRead::Byte(byte) => *slot = byte,
                ByteRead::TimedOut => return Ok(false),
            }
        }
        Ok(true)
    }

    fn read_byte(&mut self) -> Result<ByteRead, DecodeError> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Err(DecodeError::Closed),
                Ok(_) => return Ok(ByteRead::Byte(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Ok(ByteRead::TimedOut)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
