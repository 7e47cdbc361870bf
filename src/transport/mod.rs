// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! The sensor transport boundary.
//!
//! [`Transport`] is everything the lifecycle controller needs from the
//! device: open it, enable the two reports, configure calibration, learn
//! about hub resets and read one event at a time.

mod bno08x;
pub mod mock;

pub use bno08x::Bno08xTransport;
pub use mock::MockTransport;

use crate::constants::{CAL_ACCEL, CAL_GYRO, CAL_MAG};
use crate::event::SensorEvent;
use std::{io, path::PathBuf};

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Operation requires an open transport
    #[error("transport is not open")]
    NotOpen,

    /// Device node could not be opened or configured
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The sensor did not answer during setup
    #[error("sensor did not respond")]
    Unresponsive,

    /// The sensor did not confirm a request
    #[error("sensor rejected {0}")]
    Rejected(&'static str),

    /// Bus level failure while talking to the sensor
    #[error("communication error: {0}")]
    Comm(String),
}

/// Hardware parameters for [`Transport::open`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParams {
    pub interrupt_pin: u32,
    pub reset_pin: u32,
    /// `None` selects the SPI driver's own chip select
    pub chip_select_pin: Option<u32>,
    pub clock_hz: u32,
    pub device_path: PathBuf,
    pub gpio_chip: PathBuf,
}

/// Which motion engine self-calibration routines run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationMask(u8);

impl CalibrationMask {
    /// Accelerometer and gyroscope always, magnetometer on request
    pub fn new(dynamic_magnetometer: bool) -> Self {
        let mut bits = CAL_ACCEL | CAL_GYRO;
        if dynamic_magnetometer {
            bits |= CAL_MAG;
        }
        CalibrationMask(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn magnetometer(self) -> bool {
        self.0 & CAL_MAG != 0
    }
}

/// A device connection owned by the polling worker
pub trait Transport {
    /// Open the device with the given parameters and bring it to a known state
    fn open(&mut self, params: &TransportParams) -> Result<(), TransportError>;

    /// Enable the rotation vector report
    fn enable_orientation_report(&mut self, interval_ms: u16) -> Result<(), TransportError>;

    /// Enable the calibrated magnetic field report
    fn enable_magnetometer_report(&mut self, interval_ms: u16) -> Result<(), TransportError>;

    /// Configure self-calibration
    fn set_calibration_mask(&mut self, mask: CalibrationMask) -> Result<(), TransportError>;

    /// True once after the sensor reset itself
    fn was_reset(&mut self) -> bool;

    /// Read at most one event; `Ok(None)` when nothing is pending
    fn poll_event(&mut self) -> Result<Option<SensorEvent>, TransportError>;

    /// Release the device. Closing a closed transport is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_mask() {
        assert_eq!(CalibrationMask::new(false).bits(), CAL_ACCEL | CAL_GYRO);
        assert_eq!(
            CalibrationMask::new(true).bits(),
            CAL_ACCEL | CAL_GYRO | CAL_MAG
        );
        assert!(CalibrationMask::new(true).magnetometer());
        assert!(!CalibrationMask::new(false).magnetometer());
    }
}
