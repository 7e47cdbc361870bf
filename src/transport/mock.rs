// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mock transport for testing

use super::{CalibrationMask, Transport, TransportError, TransportParams};
use crate::event::SensorEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A call made on the mock, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(TransportParams),
    EnableOrientation(u16),
    EnableMagnetometer(u16),
    SetCalibration(CalibrationMask),
    Close,
}

/// Scriptable transport for unit testing. Clones share state, so a test can
/// keep one handle while the controller owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    open: bool,
    calls: Vec<Call>,
    reads: VecDeque<Result<SensorEvent, TransportError>>,
    reset_pending: bool,
    fail_open: bool,
    fail_enable: bool,
    fail_calibration: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for `poll_event`
    pub fn push_event(&self, event: SensorEvent) {
        self.inner.lock().reads.push_back(Ok(event));
    }

    /// Queue a failed read for `poll_event`
    pub fn push_read_error(&self, detail: &str) {
        self.inner
            .lock()
            .reads
            .push_back(Err(TransportError::Comm(detail.to_string())));
    }

    /// Make the next `was_reset` report a sensor reset
    pub fn trigger_reset(&self) {
        self.inner.lock().reset_pending = true;
    }

    pub fn fail_open(&self, fail: bool) {
        self.inner.lock().fail_open = fail;
    }

    pub fn fail_enable(&self, fail: bool) {
        self.inner.lock().fail_enable = fail;
    }

    pub fn fail_calibration(&self, fail: bool) {
        self.inner.lock().fail_calibration = fail;
    }

    /// All calls recorded so far
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Number of queued reads not yet consumed
    pub fn pending_reads(&self) -> usize {
        self.inner.lock().reads.len()
    }
}

impl Transport for MockTransport {
    fn open(&mut self, params: &TransportParams) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Open(params.clone()));
        if inner.fail_open {
            return Err(TransportError::Unresponsive);
        }
        inner.open = true;
        Ok(())
    }

    fn enable_orientation_report(&mut self, interval_ms: u16) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::EnableOrientation(interval_ms));
        if !inner.open {
            return Err(TransportError::NotOpen);
        }
        if inner.fail_enable {
            return Err(TransportError::Rejected("rotation vector report"));
        }
        Ok(())
    }

    fn enable_magnetometer_report(&mut self, interval_ms: u16) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::EnableMagnetometer(interval_ms));
        if !inner.open {
            return Err(TransportError::NotOpen);
        }
        if inner.fail_enable {
            return Err(TransportError::Rejected("magnetic field report"));
        }
        Ok(())
    }

    fn set_calibration_mask(&mut self, mask: CalibrationMask) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::SetCalibration(mask));
        if !inner.open {
            return Err(TransportError::NotOpen);
        }
        if inner.fail_calibration {
            return Err(TransportError::Rejected("calibration configuration"));
        }
        Ok(())
    }

    fn was_reset(&mut self) -> bool {
        std::mem::take(&mut self.inner.lock().reset_pending)
    }

    fn poll_event(&mut self) -> Result<Option<SensorEvent>, TransportError> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(TransportError::NotOpen);
        }
        inner.reads.pop_front().transpose()
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        if inner.open {
            inner.calls.push(Call::Close);
            inner.open = false;
        }
    }

    fn is_open(&self) -> bool {
        self.inner.lock().open
    }
}
