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
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::channel::ActionSender;

pub mod keyboard;
pub mod serial;

pub use serial::SerialError;

/// Errors that stop a driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serial(#[from] SerialError),
}

/// A source of actions. A driver runs on its own thread and is the only producer
/// on the action channel.
pub trait Driver: Send + Sync + 'static {
    /// Pushes actions until the running flag is cleared or the driver has nothing
    /// more to give.
    fn monitor_actions(&self, actions: ActionSender) -> Result<(), DriverError>;
}

/// Runs a driver on the producer thread.
pub struct Controller {
    handle: JoinHandle<Result<(), DriverError>>,
}

impl Controller {
    /// Starts the driver. If it fails, the running flag is cleared since there's
    /// no way left to control the machine.
    pub fn start(driver: Arc<dyn Driver>, actions: ActionSender) -> Controller {
        let handle = thread::spawn(move || {
            let running = actions.running().clone();
            let result = driver.monitor_actions(actions);
            if let Err(e) = &result {
                error!(err = %e, "Driver failed, shutting down.");
                running.stop();
            }
            result
        });
        Controller { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits up to the grace period for the driver to stop. A driver stuck on a
    /// blocking read (stdin) is left behind and None is returned.
    pub fn join(self, grace: Duration) -> Option<Result<(), DriverError>> {
        let deadline = Instant::now() + grace;
        while !self.handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("Driver didn't stop in time, leaving it behind.");
                return None;
            }
            thread::sleep(Duration::from_millis(10));
        }

        match self.handle.join() {
            Ok(result) => {
                info!("Driver stopped.");
                Some(result)
            }
            Err(_) => {
                error!("Driver thread panicked.");
                None
            }
        }
    }
}
