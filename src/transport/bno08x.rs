// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use super::{CalibrationMask, Transport, TransportError, TransportParams};
use crate::driver::{DriverError, SpiBno08x};
use crate::event::SensorEvent;
use log::{debug, info};
use std::fmt::Debug;

/// [`Transport`] over a BNO08x on a Linux SPI bus
#[derive(Default)]
pub struct Bno08xTransport {
    imu: Option<SpiBno08x>,
}

impl Bno08xTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn imu(&mut self) -> Result<&mut SpiBno08x, TransportError> {
        self.imu.as_mut().ok_or(TransportError::NotOpen)
    }
}

fn comm_error<E: Debug>(err: DriverError<E>) -> TransportError {
    match err {
        DriverError::InvalidChipId(_) => TransportError::Unresponsive,
        DriverError::CommError(e) => TransportError::Comm(format!("{:?}", e)),
    }
}

fn confirmed(ok: bool, what: &'static str) -> Result<(), TransportError> {
    if ok {
        Ok(())
    } else {
        Err(TransportError::Rejected(what))
    }
}

impl Transport for Bno08xTransport {
    fn open(&mut self, params: &TransportParams) -> Result<(), TransportError> {
        self.close();
        let mut imu = SpiBno08x::new_spi(
            &params.device_path.to_string_lossy(),
            &params.gpio_chip.to_string_lossy(),
            params.interrupt_pin,
            params.reset_pin,
            params.chip_select_pin,
            params.clock_hz,
        )?;
        imu.init().map_err(comm_error)?;
        info!("BNO08x ready on {}", params.device_path.display());
        self.imu = Some(imu);
        Ok(())
    }

    fn enable_orientation_report(&mut self, interval_ms: u16) -> Result<(), TransportError> {
        let ok = self
            .imu()?
            .enable_rotation_vector(interval_ms)
            .map_err(comm_error)?;
        confirmed(ok, "rotation vector report")
    }

    fn enable_magnetometer_report(&mut self, interval_ms: u16) -> Result<(), TransportError> {
        let ok = self
            .imu()?
            .enable_magnetic_field(interval_ms)
            .map_err(comm_error)?;
        confirmed(ok, "magnetic field report")
    }

    fn set_calibration_mask(&mut self, mask: CalibrationMask) -> Result<(), TransportError> {
        let ok = self
            .imu()?
            .configure_calibration(mask.bits())
            .map_err(comm_error)?;
        confirmed(ok, "calibration configuration")
    }

    fn was_reset(&mut self) -> bool {
        self.imu.as_mut().is_some_and(|imu| imu.take_reset())
    }

    fn poll_event(&mut self) -> Result<Option<SensorEvent>, TransportError> {
        let report = self.imu()?.poll_report().map_err(comm_error)?;
        Ok(report.map(|r| SensorEvent::classify(&r)))
    }

    fn close(&mut self) {
        if self.imu.take().is_some() {
            // dropping the driver releases the spidev handle and GPIO lines
            debug!("BNO08x transport closed");
        }
    }

    fn is_open(&self) -> bool {
        self.imu.is_some()
    }
}
