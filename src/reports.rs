// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor report parsing for the BNO08x driver.
//!
//! An SHTP packet on the sensor report channel carries a base timestamp
//! followed by one or more input reports. Each input report starts with a
//! four byte preamble (report id, sequence, status, delay) followed by
//! little-endian Q-point values.

use crate::constants::{
    input_report_len, q_to_f32, Q_ROTATION_VECTOR, REPORT_STATUS_ACCURACY_MASK,
    SHUB_BASE_TIMESTAMP, SHUB_TIMESTAMP_REBASE,
};
use log::trace;

/// Bytes preceding the Q-point values of an input report
const INPUT_REPORT_PREAMBLE: usize = 4;

/// One raw input report as read from the sensor hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputReport {
    pub report_id: u8,
    pub sequence: u8,
    pub status: u8,
    /// Raw Q-point values; unused trailing slots are zero
    pub data: [i16; 6],
}

impl InputReport {
    /// Accuracy code carried by the status byte (0 unreliable .. 3 high)
    pub fn accuracy(&self) -> u8 {
        self.status & REPORT_STATUS_ACCURACY_MASK
    }

    /// Rotation quaternion [i, j, k, real] for rotation vector reports
    pub fn quaternion(&self) -> [f32; 4] {
        [
            q_to_f32(self.data[0], Q_ROTATION_VECTOR),
            q_to_f32(self.data[1], Q_ROTATION_VECTOR),
            q_to_f32(self.data[2], Q_ROTATION_VECTOR),
            q_to_f32(self.data[3], Q_ROTATION_VECTOR),
        ]
    }
}

/// Helper functions for parsing report data from raw bytes
pub struct ReportParser;

impl ReportParser {
    /// Read a u8 at the cursor position and advance cursor
    #[inline]
    pub fn read_u8(msg: &[u8], cursor: &mut usize) -> u8 {
        let val = msg[*cursor];
        *cursor += 1;
        val
    }

    /// Read an i16 (little-endian) at the cursor position and advance cursor
    #[inline]
    pub fn read_i16(msg: &[u8], cursor: &mut usize) -> i16 {
        let val = i16::from_le_bytes([msg[*cursor], msg[*cursor + 1]]);
        *cursor += 2;
        val
    }

    /// Parse every input report in a sensor report channel payload.
    ///
    /// `payload` starts after the SHTP header. Timestamp records are skipped,
    /// parsing stops at the first report id with an unknown layout or at a
    /// truncated report.
    pub fn parse_input_reports(payload: &[u8]) -> Vec<InputReport> {
        let mut reports = Vec::new();
        let mut cursor = 0;

        while cursor < payload.len() {
            let report_id = payload[cursor];
            let Some(len) = input_report_len(report_id) else {
                trace!("unknown report 0x{:X} at {}", report_id, cursor);
                break;
            };
            if cursor + len > payload.len() {
                trace!("truncated report 0x{:X}", report_id);
                break;
            }
            if report_id == SHUB_BASE_TIMESTAMP || report_id == SHUB_TIMESTAMP_REBASE {
                cursor += len;
                continue;
            }
            reports.push(Self::parse_input_report(&payload[cursor..cursor + len]));
            cursor += len;
        }

        reports
    }

    /// Parse a single input report whose length was already checked
    fn parse_input_report(msg: &[u8]) -> InputReport {
        let mut pos = 0;
        let report_id = Self::read_u8(msg, &mut pos);
        let sequence = Self::read_u8(msg, &mut pos);
        let status = Self::read_u8(msg, &mut pos);
        let _delay = Self::read_u8(msg, &mut pos);

        let mut data = [0i16; 6];
        let values = (msg.len() - INPUT_REPORT_PREAMBLE) / 2;
        for slot in data.iter_mut().take(values) {
            *slot = Self::read_i16(msg, &mut pos);
        }

        InputReport {
            report_id,
            sequence,
            status,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SENSOR_REPORTID_MAGNETIC_FIELD, SENSOR_REPORTID_ROTATION_VECTOR};

    fn rotation_report(seq: u8, q: [i16; 5]) -> Vec<u8> {
        let mut msg = vec![SENSOR_REPORTID_ROTATION_VECTOR, seq, 0x03, 0];
        for v in q {
            msg.extend_from_slice(&v.to_le_bytes());
        }
        msg
    }

    #[test]
    fn test_parse_rotation_vector() {
        let mut payload = vec![SHUB_BASE_TIMESTAMP, 0, 0, 0, 0];
        payload.extend(rotation_report(7, [0, 0, 11585, 11585, 2048]));

        let reports = ReportParser::parse_input_reports(&payload);
        assert_eq!(reports.len(), 1);
        let r = reports[0];
        assert_eq!(r.report_id, SENSOR_REPORTID_ROTATION_VECTOR);
        assert_eq!(r.sequence, 7);
        let q = r.quaternion();
        assert!((q[2] - 0.7071).abs() < 0.001);
        assert!((q[3] - 0.7071).abs() < 0.001);
        assert_eq!(r.data[4], 2048);
    }

    #[test]
    fn test_parse_multiple_reports() {
        let mut payload = vec![SHUB_BASE_TIMESTAMP, 0, 0, 0, 0];
        payload.extend(rotation_report(1, [0, 0, 0, 16384, 0]));
        payload.extend([SENSOR_REPORTID_MAGNETIC_FIELD, 2, 0x02, 0]);
        for v in [320i16, -160, 16] {
            payload.extend_from_slice(&v.to_le_bytes());
        }

        let reports = ReportParser::parse_input_reports(&payload);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].report_id, SENSOR_REPORTID_MAGNETIC_FIELD);
        assert_eq!(reports[1].accuracy(), 2);
        assert_eq!(reports[1].data[..3], [320, -160, 16]);
    }

    #[test]
    fn test_parse_stops_on_truncated_report() {
        let mut payload = vec![SHUB_BASE_TIMESTAMP, 0, 0, 0, 0];
        payload.extend(&rotation_report(1, [0, 0, 0, 16384, 0])[..8]);
        assert!(ReportParser::parse_input_reports(&payload).is_empty());
    }

    #[test]
    fn test_parse_stops_on_unknown_report() {
        let mut payload = vec![0x42, 0, 0, 0];
        payload.extend(rotation_report(1, [0, 0, 0, 16384, 0]));
        assert!(ReportParser::parse_input_reports(&payload).is_empty());
    }
}
