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

//! Wires the drum machine together.
//!
//! Three threads make up a running machine: the driver thread pushing actions, the
//! mixing thread that owns the sequencer, and the audio output pulling from the
//! loop player. They share the running flag, the action channel between the first
//! two and the player slots between the last two.

use std::error::Error;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, span, warn, Level};

use crate::audio::{self, LoopPlayer};
use crate::channel::{action_channel, ActionReceiver};
use crate::clock::Ticker;
use crate::config::Machine;
use crate::controller::{Controller, Driver, DriverError};
use crate::samples::SampleCache;
use crate::sequencer::{Outcome, Sequencer};
use crate::shutdown::RunningFlag;

/// How long to wait for the driver to notice shutdown.
const DRIVER_GRACE: Duration = Duration::from_secs(2);

/// The mixing loop. Owns the sequencer and publishes its master mix.
pub struct Mixer {
    sequencer: Sequencer,
    player: LoopPlayer,
    actions: ActionReceiver,
}

impl Mixer {
    pub fn new(sequencer: Sequencer, player: LoopPlayer, actions: ActionReceiver) -> Mixer {
        Mixer {
            sequencer,
            player,
            actions,
        }
    }

    /// Applies every queued action, then publishes at most one new mix.
    /// Returns true if a mix was published.
    pub fn step(&mut self) -> bool {
        let mut dirty = false;
        let mut published = false;

        for action in self.actions.drain() {
            match self.sequencer.apply(action) {
                Outcome::Unchanged => {}
                Outcome::Remix => dirty = true,
                Outcome::Paused(true) => self.player.set_paused(true),
                Outcome::Paused(false) => {
                    // The bar restarts from the downbeat with whatever changed while paused.
                    self.player.publish(self.sequencer.master_mix());
                    self.player.set_paused(false);
                    dirty = false;
                    published = true;
                }
                Outcome::Audition(sample) => self.player.audition(sample),
            }
        }

        if dirty && !self.sequencer.is_paused() {
            self.player.publish(self.sequencer.master_mix());
            published = true;
        }
        published
    }

    /// Runs until the running flag is cleared, stepping once per tick.
    pub fn run(mut self, tick: Duration, running: RunningFlag) {
        let span = span!(Level::INFO, "mixer");
        let _enter = span.enter();

        info!(stats = %self.sequencer.stats(), "Mixer started.");
        let mut ticker = Ticker::new(tick);
        while running.is_running() {
            if self.step() {
                debug!(active = self.sequencer.sequence().active_track_count(), "Published mix");
            }
            let skipped = ticker.wait();
            if skipped > 0 {
                warn!(skipped, "Mixer fell behind");
            }
        }
        info!("Mixer stopped.");
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }
}

/// A running drum machine.
pub struct Engine {
    running: RunningFlag,
    controller: Controller,
    mixer: JoinHandle<()>,
    output: JoinHandle<()>,
}

impl Engine {
    /// Loads the instruments and starts every thread.
    pub fn start(
        machine: &Machine,
        device: Arc<dyn audio::Device>,
        driver: Arc<dyn Driver>,
        running: RunningFlag,
    ) -> Result<Engine, Box<dyn Error>> {
        let sample_rate = machine.audio().sample_rate();
        let settings = machine.sequencer();

        let mut samples = SampleCache::new(machine.instrument_table(), sample_rate);
        // Failures are logged and those instruments stay silent.
        samples.preload();

        let sequencer = Sequencer::new(
            settings.bpm()?,
            machine.track_instruments()?,
            settings.track_volume()?,
            samples,
            sample_rate,
        )?;
        let (player, reader) = LoopPlayer::new(sequencer.master_mix());
        let (tx, rx) = action_channel(settings.action_capacity(), running.clone());
        let tick = settings.tick()?;

        info!(%device, stats = %sequencer.stats(), "Starting drum machine.");

        let output = {
            let running = running.clone();
            thread::spawn(move || {
                if let Err(e) = device.play(reader, running.clone()) {
                    error!(err = %e, "Audio output failed, shutting down.");
                    running.stop();
                }
            })
        };
        let mixer = {
            let running = running.clone();
            let mixer = Mixer::new(sequencer, player, rx);
            thread::spawn(move || mixer.run(tick, running))
        };
        let controller = Controller::start(driver, tx);

        Ok(Engine {
            running,
            controller,
            mixer,
            output,
        })
    }

    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    /// Blocks until the running flag is cleared, then joins every thread.
    /// Returns the driver's error if it failed.
    pub fn join(self) -> Result<(), DriverError> {
        self.running.wait();

        let driver = self.controller.join(DRIVER_GRACE);
        if self.mixer.join().is_err() {
            error!("Mixer thread panicked.");
        }
        if self.output.join().is_err() {
            error!("Audio output thread panicked.");
        }
        info!("Drum machine stopped.");

        driver.unwrap_or(Ok(()))
    }
}
