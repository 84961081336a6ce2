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
use std::io;

use tracing::{info, span, warn, Level};

use super::DriverError;
use crate::channel::ActionSender;
use crate::protocol::Action;

const BEAT: &str = "beat";
const MUTE: &str = "mute";
const PAUSE: &str = "pause";
const SELECT: &str = "select";
const SAMPLE: &str = "sample";
const BPM: &str = "bpm";
const INSTRUMENT: &str = "instrument";
const CLEAR: &str = "clear";
const QUIT: &str = "quit";

/// A line of keyboard input.
#[derive(Debug, PartialEq)]
enum Command {
    Action(Action),
    Quit,
}

/// Parses a command line. Returns None for anything that isn't a command.
fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_lowercase();
    let args: Option<Vec<u8>> = words.map(|word| word.parse::<u8>().ok()).collect();
    let args = args?;

    let action = match (command.as_str(), args.as_slice()) {
        (BEAT, &[track, beat]) => Action::ToggleTrackBeat { track, beat },
        (MUTE, &[track]) => Action::ToggleTrackMute { track },
        (PAUSE, &[]) => Action::TogglePause,
        (SELECT, &[track]) => Action::SelectTrack { track },
        (SAMPLE, &[instrument]) => Action::SampleInstrument { instrument },
        (BPM, &[bpm]) => Action::SetBpm { bpm },
        (INSTRUMENT, &[track, instrument]) => Action::ChangeTrackInstrument { track, instrument },
        (CLEAR, &[]) => Action::ClearAll,
        (QUIT, &[]) => return Some(Command::Quit),
        _ => return None,
    };
    Some(Command::Action(action))
}

/// A driver that reads commands from the keyboard, for running without the
/// controller hardware.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and handles one line. Returns false once there's nothing left
    /// to read or the user quit.
    fn monitor_io<R, W>(actions: &ActionSender, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <track> <beat>, {} <track>, {}, {} <track>, {} <instrument>, {} <bpm>, {} <track> <instrument>, {}, {}): ",
            BEAT, MUTE, PAUSE, SELECT, SAMPLE, BPM, INSTRUMENT, CLEAR, QUIT,
        )?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            info!("Keyboard input closed.");
            return Ok(false);
        }

        match parse_command(&input) {
            Some(Command::Action(action)) => Ok(actions.push(action)),
            Some(Command::Quit) => {
                info!("Quitting.");
                actions.running().stop();
                Ok(false)
            }
            None => {
                warn!(input = input.trim(), "Unrecognized input");
                Ok(true)
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_actions(&self, actions: ActionSender) -> Result<(), DriverError> {
        let span = span!(Level::INFO, "keyboard driver");
        let _enter = span.enter();

        info!("Keyboard driver started.");
        while actions.is_running() {
            if !Self::monitor_io(&actions, io::stdin().lock(), io::stdout())? {
                break;
            }
        }
        Ok(())
    }
}
