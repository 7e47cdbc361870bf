// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! The sensor worker.
//!
//! A [`Controller`] owns the transport and runs the whole
//! Initializing/Running cycle on one thread. Other threads talk to it only
//! through a [`ControlHandle`], which raises the reinitialize or stop flags.

use crate::config::{self, ConfigStore, OperatingConfig, SensorParams};
use crate::error::{Error, Result};
use crate::event::{self, SensorEvent};
use crate::nmea::{self, SentenceSink};
use crate::signal::Signal;
use crate::status::{Status, StatusSink};
use crate::transport::Transport;
use log::{debug, error, info, trace, warn};
use signal_hook::{
    consts::{SIGHUP, SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{io, path::Path, sync::Arc, thread, time::Duration};

/// Pause after a poll that produced no event
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Running,
    /// Terminal
    Faulted,
}

/// Host side of a running controller. Cheap to clone and safe to use from
/// any thread; it never touches the transport.
#[derive(Clone)]
pub struct ControlHandle {
    store: Arc<dyn ConfigStore + Send + Sync>,
    reinit: Signal,
    stop: Signal,
}

impl ControlHandle {
    /// Persist new parameters; the worker picks them up on its next iteration
    pub fn change_config(&self, params: &SensorParams) -> Result<()> {
        self.store.save(params)?;
        info!("configuration changed, reinitializing");
        self.reinit.set();
        Ok(())
    }

    /// Re-read the configuration and reinitialize the sensor
    pub fn request_restart(&self) {
        info!("restart requested");
        self.reinit.set();
    }

    pub fn request_stop(&self) {
        self.stop.set();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_set()
    }

    /// SIGINT and SIGTERM stop the worker, SIGHUP restarts it
    pub fn on_signal(&self, signal: i32) {
        match signal {
            SIGHUP => self.request_restart(),
            SIGINT | SIGTERM => {
                info!("signal {} received, stopping", signal);
                self.request_stop();
            }
            other => debug!("ignoring signal {}", other),
        }
    }
}

/// Deliver SIGINT, SIGTERM and SIGHUP to `handle` from a background thread
pub fn spawn_signal_listener(handle: ControlHandle) -> io::Result<thread::JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                handle.on_signal(signal);
            }
        })
}

pub struct Controller<T, S, St> {
    transport: T,
    store: Arc<dyn ConfigStore + Send + Sync>,
    sink: S,
    status: St,
    state: ConnectionState,
    config: Option<OperatingConfig>,
    reinit: Signal,
    stop: Signal,
    idle_delay: Duration,
    device_exists: fn(&Path) -> bool,
}

impl<T, S, St> Controller<T, S, St>
where
    T: Transport,
    S: SentenceSink,
    St: StatusSink,
{
    pub fn new(
        transport: T,
        store: Arc<dyn ConfigStore + Send + Sync>,
        sink: S,
        status: St,
    ) -> Self {
        Self {
            transport,
            store,
            sink,
            status,
            state: ConnectionState::Uninitialized,
            config: None,
            reinit: Signal::new(),
            stop: Signal::new(),
            idle_delay: DEFAULT_IDLE_DELAY,
            device_exists: Path::exists,
        }
    }

    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Replace the device node check used during validation
    pub fn with_device_check(mut self, exists: fn(&Path) -> bool) -> Self {
        self.device_exists = exists;
        self
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            store: Arc::clone(&self.store),
            reinit: self.reinit.clone(),
            stop: self.stop.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration of the current session
    pub fn config(&self) -> Option<&OperatingConfig> {
        self.config.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn status(&self) -> &St {
        &self.status
    }

    /// Loop until a stop is requested or a fatal error occurs.
    ///
    /// The transport is closed on return.
    pub fn run(&mut self) -> Result<()> {
        while !self.stop.is_set() {
            self.tick()?;
        }
        info!("stop requested, shutting down");
        self.transport.close();
        Ok(())
    }

    /// One loop iteration: (re)initialize if needed, then handle at most one
    /// event. A fatal error moves the controller to
    /// [`ConnectionState::Faulted`]; later calls return [`Error::Faulted`].
    pub fn tick(&mut self) -> Result<()> {
        if self.state == ConnectionState::Faulted {
            return Err(Error::Faulted);
        }

        let requested = self.reinit.take();
        if requested || self.state == ConnectionState::Uninitialized {
            if let Err(e) = self.initialize() {
                return Err(self.fault(e));
            }
        } else if self.transport.was_reset() {
            if let Err(e) = self.recover_from_reset() {
                return Err(self.fault(e));
            }
        }

        match self.transport.poll_event() {
            Ok(Some(event)) => self.process(event),
            Ok(None) => thread::sleep(self.idle_delay),
            Err(e) => {
                warn!("sensor read failed: {}", e);
                thread::sleep(self.idle_delay);
            }
        }
        Ok(())
    }

    fn enter(&mut self, state: ConnectionState) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
        match state {
            ConnectionState::Initializing => self.status.update(Status::Initializing),
            ConnectionState::Running => self.status.update(Status::Running),
            _ => {}
        }
    }

    fn initialize(&mut self) -> Result<()> {
        self.enter(ConnectionState::Initializing);
        if self.transport.is_open() {
            debug!("releasing the previous sensor session");
        }
        self.transport.close();
        self.config = None;

        let params = self.store.load()?;
        let config = config::validate_with(&params, self.device_exists)?;
        self.transport
            .open(&config.transport_params())
            .map_err(Error::TransportOpen)?;
        enable_reports(&mut self.transport, &config)?;

        info!(
            "sensor running, {} ms interval, talker {}",
            config.interval_ms, config.talker
        );
        self.config = Some(config);
        self.enter(ConnectionState::Running);
        Ok(())
    }

    /// The sensor reset itself: enable reports again, keep the transport
    fn recover_from_reset(&mut self) -> Result<()> {
        info!("sensor reset detected, enabling reports again");
        self.enter(ConnectionState::Initializing);
        let config = self.config.as_ref().ok_or(Error::Faulted)?;
        enable_reports(&mut self.transport, config)?;
        self.enter(ConnectionState::Running);
        Ok(())
    }

    fn fault(&mut self, err: Error) -> Error {
        error!("{}", err);
        self.transport.close();
        self.state = ConnectionState::Faulted;
        self.status.update(Status::Error(err.to_string()));
        err
    }

    fn process(&mut self, event: SensorEvent) {
        let Some(measurement) = event::convert(&event) else {
            trace!("ignoring {:?}", event);
            return;
        };
        let Some(config) = &self.config else {
            return;
        };
        for sentence in nmea::encode(
            &measurement,
            &config.sentences,
            config.talker,
            config.priority,
        ) {
            self.sink.emit(&sentence);
        }
    }
}

fn enable_reports<T: Transport>(transport: &mut T, config: &OperatingConfig) -> Result<()> {
    transport
        .enable_orientation_report(config.interval_ms)
        .map_err(Error::ReportEnable)?;
    transport
        .enable_magnetometer_report(config.interval_ms)
        .map_err(Error::ReportEnable)?;
    transport
        .set_calibration_mask(config.calibration_mask())
        .map_err(Error::ReportEnable)?;
    Ok(())
}
