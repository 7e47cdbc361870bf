// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Constants for the BNO08x sensor hub and the NMEA output.
//!
//! Protocol values come from the SH-2 reference manual and the SHTP
//! specification. Only the subset this crate speaks is kept here.

/// Buffer sizes
pub const PACKET_SEND_BUF_LEN: usize = 256;
pub const PACKET_RECV_BUF_LEN: usize = 2048;
pub const NUM_CHANNELS: usize = 6;

// =============================================================================
// SHTP Communication Channels
// =============================================================================

/// SHTP command channel (advertisement, error list)
pub const CHANNEL_COMMAND: u8 = 0;
/// Executable channel (reset, on, sleep)
pub const CHANNEL_EXECUTABLE: u8 = 1;
/// Sensor hub control channel
pub const CHANNEL_HUB_CONTROL: u8 = 2;
/// Input sensor reports (non-wake)
pub const CHANNEL_SENSOR_REPORTS: u8 = 3;

/// Advertisement response
pub const CMD_RESP_ADVERTISEMENT: u8 = 0;
/// Error list response
pub const CMD_RESP_ERROR_LIST: u8 = 1;

// =============================================================================
// Sensor Hub (SHUB) Protocol Constants
// =============================================================================

/// Command response
pub const SHUB_COMMAND_RESP: u8 = 0xF1;
/// Command request
pub const SHUB_COMMAND_REQ: u8 = 0xF2;
/// Report ID for Product ID response
pub const SHUB_PROD_ID_RESP: u8 = 0xF8;
/// Report ID for Product ID request
pub const SHUB_PROD_ID_REQ: u8 = 0xF9;
/// Timestamp rebase, precedes input reports
pub const SHUB_TIMESTAMP_REBASE: u8 = 0xFA;
/// Base timestamp, precedes input reports
pub const SHUB_BASE_TIMESTAMP: u8 = 0xFB;
/// Get feature response
pub const SHUB_GET_FEATURE_RESP: u8 = 0xFC;
/// Set feature command
pub const SHUB_REPORT_SET_FEATURE_CMD: u8 = 0xFD;

// =============================================================================
// Sensor Report IDs
// =============================================================================

/// Accelerometer (m/s^2 including gravity)
pub const SENSOR_REPORTID_ACCELEROMETER: u8 = 0x01;
/// Gyroscope calibrated (rad/s)
pub const SENSOR_REPORTID_GYROSCOPE: u8 = 0x02;
/// Magnetic field calibrated (uTesla): Q point 4
pub const SENSOR_REPORTID_MAGNETIC_FIELD: u8 = 0x03;
/// Linear acceleration (m/s^2 minus gravity)
pub const SENSOR_REPORTID_LINEAR_ACCEL: u8 = 0x04;
/// Unit quaternion rotation vector, Q point 14, with heading accuracy (radians)
/// Q point 12
pub const SENSOR_REPORTID_ROTATION_VECTOR: u8 = 0x05;
/// Gravity vector
pub const SENSOR_REPORTID_GRAVITY: u8 = 0x06;
/// Gyroscope uncalibrated (rad/s)
pub const SENSOR_REPORTID_GYROSCOPE_UNCALIB: u8 = 0x07;
/// Game rotation vector
pub const SENSOR_REPORTID_ROTATION_VECTOR_GAME: u8 = 0x08;
/// Geomagnetic rotation vector
pub const SENSOR_REPORTID_ROTATION_VECTOR_GEOMAGNETIC: u8 = 0x09;

/// Q point of the rotation vector quaternion components
pub const Q_ROTATION_VECTOR: usize = 14;

/// The two low bits of an input report status byte carry the accuracy
pub const REPORT_STATUS_ACCURACY_MASK: u8 = 0x03;

// =============================================================================
// Executable channel / initialization
// =============================================================================

/// Reset complete response
pub const EXECUTABLE_DEVICE_RESP_RESET_COMPLETE: u8 = 1;

/// Unsolicited flag
pub const SH2_INIT_UNSOLICITED: u8 = 0x80;
/// Initialize command
pub const SH2_CMD_INITIALIZE: u8 = 4;
/// System initialization
pub const SH2_INIT_SYSTEM: u8 = 1;
/// Startup initialization (unsolicited)
pub const SH2_STARTUP_INIT_UNSOLICITED: u8 = SH2_CMD_INITIALIZE | SH2_INIT_UNSOLICITED;

// =============================================================================
// Motion engine calibration
// =============================================================================

/// Configure/query motion engine calibration
pub const SH2_CMD_ME_CALIBRATE: u8 = 7;
/// ME calibration subcommand: configure
pub const SH2_ME_CAL_CONFIG: u8 = 0x00;

/// Calibration mask bit: accelerometer
pub const CAL_ACCEL: u8 = 0x01;
/// Calibration mask bit: gyroscope
pub const CAL_GYRO: u8 = 0x02;
/// Calibration mask bit: magnetometer
pub const CAL_MAG: u8 = 0x04;

// =============================================================================
// NMEA output
// =============================================================================

/// Source tag attached to every emitted sentence
pub const NMEA_SOURCE: &str = "bno08x";
/// Default talker identifier
pub const NMEA_DEFAULT_TALKER: &str = "II";

/// Convert Q-point fixed-point value to f32
#[inline]
pub fn q_to_f32(q_val: i16, q_point: usize) -> f32 {
    (q_val as f32) / ((1u32 << q_point) as f32)
}

/// Length in bytes of an input report, including its 4 byte preamble.
///
/// Returns `None` for report ids whose layout is unknown, which ends parsing
/// of the remaining packet.
pub fn input_report_len(report_id: u8) -> Option<usize> {
    match report_id {
        SHUB_BASE_TIMESTAMP | SHUB_TIMESTAMP_REBASE => Some(5),
        SENSOR_REPORTID_ACCELEROMETER
        | SENSOR_REPORTID_GYROSCOPE
        | SENSOR_REPORTID_MAGNETIC_FIELD
        | SENSOR_REPORTID_LINEAR_ACCEL
        | SENSOR_REPORTID_GRAVITY => Some(10),
        SENSOR_REPORTID_ROTATION_VECTOR_GAME => Some(12),
        SENSOR_REPORTID_ROTATION_VECTOR | SENSOR_REPORTID_ROTATION_VECTOR_GEOMAGNETIC => Some(14),
        SENSOR_REPORTID_GYROSCOPE_UNCALIB => Some(16),
        _ => None,
    }
}

/// Describe an SHTP error list code
pub fn shtp_error_to_str(code: u8) -> &'static str {
    match code {
        0 => "no error",
        1 => "hub read cargo length exceeded",
        2 => "host write shorter than header",
        3 => "host write longer than max cargo",
        4 => "host write header length too small",
        5 => "fragmented cargo start not supported",
        6 => "fragmented cargo continuation not supported",
        7 => "unrecognized control channel command",
        8 => "unrecognized advertisement parameter",
        9 => "write to unrecognized channel",
        10 => "advertisement request while response pending",
        11 => "write before advertisement complete",
        12 => "error list truncated",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q_to_f32() {
        assert!((q_to_f32(16384, 14) - 1.0).abs() < 0.001);
        assert!((q_to_f32(-16384, 14) + 1.0).abs() < 0.001);
        assert!((q_to_f32(8192, 14) - 0.5).abs() < 0.001);
        assert!((q_to_f32(16, 4) - 1.0).abs() < 0.001);
        assert!(q_to_f32(0, 12).abs() < 0.001);
    }

    #[test]
    fn test_channel_constants() {
        let channels = [
            CHANNEL_COMMAND,
            CHANNEL_EXECUTABLE,
            CHANNEL_HUB_CONTROL,
            CHANNEL_SENSOR_REPORTS,
        ];
        for (i, &a) in channels.iter().enumerate() {
            assert!(a < NUM_CHANNELS as u8);
            for &b in channels.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_calibration_bits_disjoint() {
        assert_eq!(CAL_ACCEL & CAL_GYRO, 0);
        assert_eq!(CAL_ACCEL & CAL_MAG, 0);
        assert_eq!(CAL_GYRO & CAL_MAG, 0);
    }

    #[test]
    fn test_input_report_lengths() {
        assert_eq!(input_report_len(SENSOR_REPORTID_ROTATION_VECTOR), Some(14));
        assert_eq!(input_report_len(SENSOR_REPORTID_MAGNETIC_FIELD), Some(10));
        assert_eq!(input_report_len(SHUB_BASE_TIMESTAMP), Some(5));
        assert_eq!(input_report_len(0x42), None);
    }

    #[test]
    fn test_buffer_sizes() {
        assert!(PACKET_RECV_BUF_LEN > PACKET_SEND_BUF_LEN);
    }
}
