// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor event classification and angle conversion.
//!
//! The hub reports many kinds of input reports on one channel. Only the
//! rotation vector and the calibrated magnetic field are rendered; everything
//! else classifies as [`SensorEvent::Other`] and is dropped.

use crate::constants::{SENSOR_REPORTID_MAGNETIC_FIELD, SENSOR_REPORTID_ROTATION_VECTOR};
use crate::reports::InputReport;
use std::f64::consts::PI;

const RAD_TO_DEG: f64 = 180.0 / PI;

/// One event read from the sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    /// Fused orientation in radians
    RotationVector { roll: f32, pitch: f32, yaw: f32 },
    /// Calibrated magnetic field; only the accuracy code is carried
    MagneticFieldCalibrated { accuracy: u8 },
    /// A report this crate does not render
    Other { report_id: u8 },
}

impl SensorEvent {
    /// Classify a raw input report by its report id
    pub fn classify(report: &InputReport) -> Self {
        match report.report_id {
            SENSOR_REPORTID_ROTATION_VECTOR => {
                let [roll, pitch, yaw] = quaternion_to_euler(report.quaternion());
                SensorEvent::RotationVector { roll, pitch, yaw }
            }
            SENSOR_REPORTID_MAGNETIC_FIELD => SensorEvent::MagneticFieldCalibrated {
                accuracy: report.accuracy(),
            },
            report_id => SensorEvent::Other { report_id },
        }
    }
}

/// Converted, bounded values ready for encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    /// Roll and pitch in signed degrees, heading in [0, 360)
    Attitude { roll: f64, pitch: f64, heading: f64 },
    /// Magnetometer calibration accuracy code, as reported
    MagneticAccuracy(u8),
}

/// Convert an event to its rendered units, `None` if nothing is rendered
pub fn convert(event: &SensorEvent) -> Option<Measurement> {
    match *event {
        SensorEvent::RotationVector { roll, pitch, yaw } => Some(Measurement::Attitude {
            roll: rad_to_deg(roll as f64),
            pitch: rad_to_deg(pitch as f64),
            heading: heading_from_yaw(rad_to_deg(yaw as f64)),
        }),
        SensorEvent::MagneticFieldCalibrated { accuracy } => {
            Some(Measurement::MagneticAccuracy(accuracy))
        }
        SensorEvent::Other { .. } => None,
    }
}

#[inline]
pub fn rad_to_deg(rad: f64) -> f64 {
    rad * RAD_TO_DEG
}

/// Compass bearing from a signed yaw in degrees
#[inline]
pub fn heading_from_yaw(yaw_deg: f64) -> f64 {
    if yaw_deg < 0.0 {
        yaw_deg + 360.0
    } else {
        yaw_deg
    }
}

/// Unit quaternion [i, j, k, real] to [roll, pitch, yaw] in radians
pub fn quaternion_to_euler(q: [f32; 4]) -> [f32; 3] {
    let [qi, qj, qk, qr] = q;
    let sqr = qr * qr;
    let sqi = qi * qi;
    let sqj = qj * qj;
    let sqk = qk * qk;

    let yaw = (2.0 * (qi * qj + qk * qr)).atan2(sqi - sqj - sqk + sqr);
    let sin_pitch = -2.0 * (qi * qk - qj * qr) / (sqi + sqj + sqk + sqr);
    let pitch = sin_pitch.clamp(-1.0, 1.0).asin();
    let roll = (2.0 * (qj * qk + qi * qr)).atan2(-sqi - sqj + sqk + sqr);

    [roll, pitch, yaw]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_1_SQRT_2;

    #[test]
    fn test_heading_from_yaw_boundaries() {
        assert_eq!(heading_from_yaw(-180.0), 180.0);
        assert_eq!(heading_from_yaw(0.0), 0.0);
        assert!((heading_from_yaw(-0.1) - 359.9).abs() < 1e-9);
        assert_eq!(heading_from_yaw(90.0), 90.0);
    }

    #[test]
    fn test_heading_range() {
        let mut yaw = -180.0;
        while yaw < 180.0 {
            let heading = heading_from_yaw(yaw);
            assert!((0.0..360.0).contains(&heading), "yaw {} -> {}", yaw, heading);
            let expected = if yaw >= 0.0 { yaw } else { yaw + 360.0 };
            assert_eq!(heading, expected);
            yaw += 0.25;
        }
    }

    #[test]
    fn test_rad_to_deg() {
        assert!((rad_to_deg(PI) - 180.0).abs() < 1e-12);
        assert!((rad_to_deg(-PI / 2.0) + 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_quaternion_identity() {
        let [roll, pitch, yaw] = quaternion_to_euler([0.0, 0.0, 0.0, 1.0]);
        assert!(roll.abs() < 1e-6);
        assert!(pitch.abs() < 1e-6);
        assert!(yaw.abs() < 1e-6);
    }

    #[test]
    fn test_quaternion_yaw_quarter_turn() {
        let [roll, pitch, yaw] = quaternion_to_euler([0.0, 0.0, FRAC_1_SQRT_2, FRAC_1_SQRT_2]);
        assert!(roll.abs() < 1e-6);
        assert!(pitch.abs() < 1e-6);
        assert!((yaw - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_quaternion_roll_quarter_turn() {
        let [roll, _, yaw] = quaternion_to_euler([FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2]);
        assert!((roll - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!(yaw.abs() < 1e-6);
    }

    #[test]
    fn test_classify() {
        let rotation = InputReport {
            report_id: SENSOR_REPORTID_ROTATION_VECTOR,
            sequence: 0,
            status: 3,
            data: [0, 0, 0, 16384, 0, 0],
        };
        assert!(matches!(
            SensorEvent::classify(&rotation),
            SensorEvent::RotationVector { .. }
        ));

        let mag = InputReport {
            report_id: SENSOR_REPORTID_MAGNETIC_FIELD,
            status: 0x0E,
            ..rotation
        };
        assert_eq!(
            SensorEvent::classify(&mag),
            SensorEvent::MagneticFieldCalibrated { accuracy: 2 }
        );

        let gravity = InputReport {
            report_id: 0x06,
            ..rotation
        };
        assert_eq!(
            SensorEvent::classify(&gravity),
            SensorEvent::Other { report_id: 0x06 }
        );
    }

    #[test]
    fn test_convert() {
        let event = SensorEvent::RotationVector {
            roll: 0.0,
            pitch: 0.0,
            yaw: -std::f32::consts::FRAC_PI_2,
        };
        let Some(Measurement::Attitude { heading, .. }) = convert(&event) else {
            panic!("expected attitude");
        };
        assert!((heading - 270.0).abs() < 1e-4);

        assert_eq!(
            convert(&SensorEvent::MagneticFieldCalibrated { accuracy: 3 }),
            Some(Measurement::MagneticAccuracy(3))
        );
        assert_eq!(convert(&SensorEvent::Other { report_id: 1 }), None);
    }
}
