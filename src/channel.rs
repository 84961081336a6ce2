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

//! The action channel between the control driver and the mixing thread.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;

use crate::protocol::Action;
use crate::shutdown::RunningFlag;

pub const DEFAULT_CAPACITY: usize = 64;

/// How long the producer backs off when the channel is full.
const RETRY_INTERVAL: Duration = Duration::from_micros(500);

/// Creates a bounded action channel. There is exactly one sender and one receiver.
pub fn action_channel(capacity: usize, running: RunningFlag) -> (ActionSender, ActionReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (ActionSender { tx, running }, ActionReceiver { rx })
}

/// The producing half of the action channel.
pub struct ActionSender {
    tx: Sender<Action>,
    running: RunningFlag,
}

impl ActionSender {
    /// Queues an action without ever blocking on the consumer. While the channel is
    /// full this retries for as long as the process is running.
    ///
    /// Returns false if the action couldn't be delivered because the process is
    /// shutting down or the receiver is gone.
    pub fn push(&self, action: Action) -> bool {
        let mut action = action;
        let mut warned = false;
        loop {
            match self.tx.try_send(action) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(returned)) => {
                    if !self.running.is_running() {
                        return false;
                    }
                    if !warned {
                        warn!(%returned, "Action channel full, retrying");
                        warned = true;
                    }
                    action = returned;
                    spin_sleep::sleep(RETRY_INTERVAL);
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_running()
    }

    /// The running flag this sender observes.
    pub fn running(&self) -> &RunningFlag {
        &self.running
    }
}

/// The consuming half of the action channel.
pub struct ActionReceiver {
    rx: Receiver<Action>,
}

impl ActionReceiver {
    /// Takes every action that is currently queued, in the order they were pushed.
    pub fn drain(&self) -> impl Iterator<Item = Action> + '_ {
        self.rx.try_iter()
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn beat(track: u8, beat: u8) -> Action {
        Action::ToggleTrackBeat { track, beat }
    }

    #[test]
    fn test_fifo() {
        let (tx, rx) = action_channel(8, RunningFlag::new());
        for i in 0..8 {
            assert!(tx.push(beat(0, i)));
        }
        let drained: Vec<Action> = rx.drain().collect();
        assert_eq!(drained, (0..8).map(|i| beat(0, i)).collect::<Vec<_>>());
        assert_eq!(rx.drain().count(), 0);
    }

    #[test]
    fn test_full_channel_retries_until_drained() {
        let (tx, rx) = action_channel(2, RunningFlag::new());
        let producer = thread::spawn(move || {
            for i in 0..16 {
                assert!(tx.push(beat(1, i)));
            }
        });

        let mut received = Vec::new();
        while received.len() < 16 {
            received.extend(rx.drain());
            thread::sleep(Duration::from_millis(1));
        }
        producer.join().unwrap();
        assert_eq!(received, (0..16).map(|i| beat(1, i)).collect::<Vec<_>>());
    }

    #[test]
    fn test_full_channel_gives_up_on_shutdown() {
        let running = RunningFlag::new();
        let (tx, _rx) = action_channel(1, running.clone());
        assert!(tx.push(Action::ClearAll));

        let producer = thread::spawn(move || tx.push(Action::TogglePause));
        thread::sleep(Duration::from_millis(10));
        running.stop();
        assert!(!producer.join().unwrap());
    }

    #[test]
    fn test_disconnected() {
        let (tx, rx) = action_channel(1, RunningFlag::new());
        drop(rx);
        assert!(!tx.push(Action::ClearAll));
    }
}
