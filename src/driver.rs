// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! BNO08x sensor hub driver.
//!
//! Speaks SH-2 over an SHTP [`SensorInterface`]: brings the hub out of reset,
//! enables input reports, configures motion engine calibration and hands input
//! reports to the caller one at a time. Resets the hub performs on its own
//! after initialization are latched so the caller can restore its
//! configuration.

use crate::{
    constants::{
        shtp_error_to_str, CHANNEL_COMMAND, CHANNEL_EXECUTABLE, CHANNEL_HUB_CONTROL,
        CHANNEL_SENSOR_REPORTS, CMD_RESP_ADVERTISEMENT, CMD_RESP_ERROR_LIST, CAL_ACCEL, CAL_GYRO,
        CAL_MAG, EXECUTABLE_DEVICE_RESP_RESET_COMPLETE, NUM_CHANNELS, PACKET_RECV_BUF_LEN,
        PACKET_SEND_BUF_LEN, SENSOR_REPORTID_MAGNETIC_FIELD, SENSOR_REPORTID_ROTATION_VECTOR,
        SH2_CMD_ME_CALIBRATE, SH2_INIT_SYSTEM, SH2_ME_CAL_CONFIG, SH2_STARTUP_INIT_UNSOLICITED,
        SHUB_COMMAND_REQ, SHUB_COMMAND_RESP, SHUB_GET_FEATURE_RESP, SHUB_PROD_ID_REQ,
        SHUB_PROD_ID_RESP, SHUB_REPORT_SET_FEATURE_CMD,
    },
    interface::{
        delay::delay_ms,
        gpio::{GpiodIn, GpiodOut},
        spidev::SpiDevice,
        SensorInterface, SpiControlLines, SpiInterface, PACKET_HEADER_LENGTH,
    },
    reports::{InputReport, ReportParser},
};
use log::{debug, trace, warn};

use std::{collections::VecDeque, io, time::Instant};

/// Number of report ids tracked for enable confirmation
const MAX_REPORT_ID: usize = 16;
/// How long to wait for a get-feature or command response
const RESPONSE_TIMEOUT_MS: u128 = 2000;

/// The concrete driver used on Linux hosts
pub type SpiBno08x = BNO08x<SpiInterface<SpiDevice, GpiodOut, GpiodIn, GpiodOut>>;

/// Driver-level errors
#[derive(Debug)]
pub enum DriverError<E> {
    /// Communications error
    CommError(E),
    /// The hub never answered the product id request
    InvalidChipId(u8),
}

/// BNO08x IMU driver
pub struct BNO08x<SI> {
    pub(crate) sensor_interface: SI,
    /// Each communication channel with the device has its own sequence number
    sequence_numbers: [u8; NUM_CHANNELS],
    /// Sequence number for SH-2 command requests
    command_sequence: u8,
    /// Buffer for building and sending packets to the sensor hub
    packet_send_buf: [u8; PACKET_SEND_BUF_LEN],
    /// Buffer for packets received from the sensor hub
    packet_recv_buf: [u8; PACKET_RECV_BUF_LEN],

    /// `init` completed; resets seen from now on are unsolicited
    initialized: bool,
    /// Reset complete seen on the executable channel
    device_reset: bool,
    /// Unsolicited reset latched until taken
    reset_detected: bool,
    /// Has the product ID been verified
    prod_id_verified: bool,
    /// Have we received the full advertisement
    advert_received: bool,
    last_error_received: Option<u8>,

    /// Which reports the hub confirmed as enabled
    report_enabled: [bool; MAX_REPORT_ID],
    /// Status of the last ME calibration command, 0 is success
    calibration_status: Option<u8>,

    /// Input reports read but not yet handed out
    pending_reports: VecDeque<InputReport>,
}

impl<SI> BNO08x<SI> {
    /// Create a new BNO08x driver with the given sensor interface
    pub fn new_with_interface(sensor_interface: SI) -> Self {
        Self {
            sensor_interface,
            sequence_numbers: [0; NUM_CHANNELS],
            command_sequence: 0,
            packet_send_buf: [0; PACKET_SEND_BUF_LEN],
            packet_recv_buf: [0; PACKET_RECV_BUF_LEN],
            initialized: false,
            device_reset: false,
            reset_detected: false,
            prod_id_verified: false,
            advert_received: false,
            last_error_received: None,
            report_enabled: [false; MAX_REPORT_ID],
            calibration_status: None,
            pending_reports: VecDeque::new(),
        }
    }

    /// Returns previously consumed sensor interface instance.
    pub fn free(self) -> SI {
        self.sensor_interface
    }

    /// Check if a report is enabled
    pub fn is_report_enabled(&self, report_id: u8) -> bool {
        self.report_enabled
            .get(report_id as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Last error code the hub reported in an error list
    pub fn last_error(&self) -> Option<u8> {
        self.last_error_received
    }

    /// Returns true once if the hub reset itself since the last call.
    pub fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_detected)
    }
}

impl SpiBno08x {
    /// Create a new BNO08x driver using SPI
    ///
    /// # Arguments
    /// * `spidevice` - Path to the SPI device (e.g., "/dev/spidev1.0")
    /// * `gpiochip` - Path to the GPIO chip holding the control lines
    /// * `hintn_pin` - GPIO line offset of the interrupt
    /// * `reset_pin` - GPIO line offset of reset
    /// * `cs_pin` - GPIO line offset of chip select, `None` for the spidev
    ///   chip select
    /// * `clock_hz` - SPI clock rate
    pub fn new_spi(
        spidevice: &str,
        gpiochip: &str,
        hintn_pin: u32,
        reset_pin: u32,
        cs_pin: Option<u32>,
        clock_hz: u32,
    ) -> io::Result<Self> {
        let chip = gpiod::Chip::new(gpiochip)?;
        let hintn = GpiodIn::new(&chip, hintn_pin)?;
        let reset = GpiodOut::new(&chip, reset_pin, true)?;
        let csn = cs_pin
            .map(|pin| GpiodOut::new(&chip, pin, true))
            .transpose()?;

        let spi = SpiDevice::new(spidevice, clock_hz, csn.is_some())?;
        debug!(
            "opened {} at {} Hz, {} int={} rst={} cs={:?}",
            spidevice, clock_hz, gpiochip, hintn_pin, reset_pin, cs_pin
        );

        Ok(BNO08x::new_with_interface(SpiInterface::new(
            SpiControlLines {
                spi,
                csn,
                hintn,
                reset,
            },
        )))
    }
}

impl<SI, SE> BNO08x<SI>
where
    SI: SensorInterface<SensorError = SE>,
    SE: core::fmt::Debug,
{
    /// Initialize the BNO08x sensor.
    ///
    /// The BNO080 starts up with all sensors disabled, waiting for the
    /// application to configure it.
    pub fn init(&mut self) -> Result<(), DriverError<SE>> {
        trace!("driver init");
        self.initialized = false;
        self.reset_detected = false;
        self.prod_id_verified = false;
        self.report_enabled = [false; MAX_REPORT_ID];
        self.pending_reports.clear();

        self.sensor_interface
            .setup()
            .map_err(DriverError::CommError)?;

        // Section 5.1.1.1: on startup the hub sends its advertisement and a
        // reset complete, unsolicited.
        delay_ms(250);
        trace!("Eating advertisement response");
        self.handle_one_message(20);
        delay_ms(250);
        trace!("Eating reset response");
        self.handle_one_message(20);

        self.verify_product_id()?;
        delay_ms(100);
        // anything queued so far belongs to the startup sequence
        self.pending_reports.clear();
        self.initialized = true;
        debug!(
            "hub ready (advertisement {}, reset {})",
            self.advert_received, self.device_reset
        );
        Ok(())
    }

    /// Enable reporting of the rotation vector (fused quaternion).
    ///
    /// Returns true if the report was successfully enabled.
    pub fn enable_rotation_vector(
        &mut self,
        millis_between_reports: u16,
    ) -> Result<bool, DriverError<SE>> {
        self.enable_report(SENSOR_REPORTID_ROTATION_VECTOR, millis_between_reports)
    }

    /// Enable reporting of the calibrated magnetic field.
    ///
    /// Returns true if the report was successfully enabled.
    pub fn enable_magnetic_field(
        &mut self,
        millis_between_reports: u16,
    ) -> Result<bool, DriverError<SE>> {
        self.enable_report(SENSOR_REPORTID_MAGNETIC_FIELD, millis_between_reports)
    }

    /// Enable a sensor report with the specified update interval.
    ///
    /// Returns true if the hub confirmed the feature within the timeout.
    pub fn enable_report(
        &mut self,
        report_id: u8,
        millis_between_reports: u16,
    ) -> Result<bool, DriverError<SE>> {
        trace!("enable_report 0x{:X}", report_id);
        if report_id as usize >= MAX_REPORT_ID {
            return Ok(false);
        }
        self.report_enabled[report_id as usize] = false;

        let interval = ((millis_between_reports as u32) * 1000).to_le_bytes();
        let cmd_body: [u8; 17] = [
            SHUB_REPORT_SET_FEATURE_CMD,
            report_id,
            0, // feature flags
            0, // LSB change sensitivity
            0, // MSB change sensitivity
            interval[0], // report interval, microseconds
            interval[1],
            interval[2],
            interval[3],
            0, // batch interval
            0,
            0,
            0,
            0, // sensor-specific config
            0,
            0,
            0,
        ];
        self.send_packet(CHANNEL_HUB_CONTROL, &cmd_body)?;

        let enabled = self.wait_until(RESPONSE_TIMEOUT_MS, |hub| {
            hub.report_enabled[report_id as usize]
        });
        debug!("Report 0x{:X} is enabled: {}", report_id, enabled);
        Ok(enabled)
    }

    /// Configure which motion engine calibration routines run.
    ///
    /// `mask` combines `CAL_ACCEL`, `CAL_GYRO` and `CAL_MAG`. Returns true if
    /// the hub acknowledged the command with a success status.
    pub fn configure_calibration(&mut self, mask: u8) -> Result<bool, DriverError<SE>> {
        trace!("configure_calibration 0x{:X}", mask);
        let seq = self.command_sequence;
        self.command_sequence = self.command_sequence.wrapping_add(1);
        self.calibration_status = None;

        let cmd_body: [u8; 12] = [
            SHUB_COMMAND_REQ,
            seq,
            SH2_CMD_ME_CALIBRATE,
            u8::from(mask & CAL_ACCEL != 0),
            u8::from(mask & CAL_GYRO != 0),
            u8::from(mask & CAL_MAG != 0),
            SH2_ME_CAL_CONFIG,
            0, // planar accelerometer
            0, // on table
            0,
            0,
            0,
        ];
        self.send_packet(CHANNEL_HUB_CONTROL, &cmd_body)?;

        self.wait_until(RESPONSE_TIMEOUT_MS, |hub| hub.calibration_status.is_some());
        debug!("calibration status {:?}", self.calibration_status);
        Ok(self.calibration_status == Some(0))
    }

    /// Return the next input report, reading one packet from the hub if none
    /// is queued. `Ok(None)` means the hub has nothing to say right now.
    pub fn poll_report(&mut self) -> Result<Option<InputReport>, DriverError<SE>> {
        if let Some(report) = self.pending_reports.pop_front() {
            return Ok(Some(report));
        }
        if !self.sensor_interface.data_ready() {
            return Ok(None);
        }
        let received_len = self.receive_packet_with_timeout(0)?;
        if received_len > 0 {
            self.dispatch_packet(received_len);
        }
        Ok(self.pending_reports.pop_front())
    }

    /// Handle one message and return the count of messages handled (0 or 1)
    pub fn handle_one_message(&mut self, max_ms: usize) -> u32 {
        match self.receive_packet_with_timeout(max_ms) {
            Ok(received_len) if received_len > 0 => {
                self.dispatch_packet(received_len);
                1
            }
            Ok(_) => 0,
            Err(e) => {
                trace!("handle1 err {:?}", e);
                0
            }
        }
    }

    /// Poll incoming packets until `done` holds or `timeout_ms` elapses
    fn wait_until(&mut self, timeout_ms: u128, done: impl Fn(&Self) -> bool) -> bool {
        let start = Instant::now();
        while !done(&*self) && start.elapsed().as_millis() < timeout_ms {
            self.handle_one_message(250);
        }
        done(&*self)
    }

    fn dispatch_packet(&mut self, received_len: usize) {
        if let Err(e) = self.handle_received_packet(received_len) {
            warn!("{}", e)
        }
    }

    fn handle_cmd_resp_error_list(&mut self, received_len: usize) {
        let payload = &self.packet_recv_buf[PACKET_HEADER_LENGTH..received_len];
        for &err in payload.iter().skip(1) {
            if err != 0 {
                warn!("hub error {}: {}", err, shtp_error_to_str(err));
                self.last_error_received = Some(err);
            }
        }
    }

    fn note_reset(&mut self) {
        self.device_reset = true;
        if self.initialized {
            warn!("sensor hub reset itself");
            self.reset_detected = true;
            self.report_enabled = [false; MAX_REPORT_ID];
            self.pending_reports.clear();
        }
    }

    /// Handle a received packet and dispatch to appropriate handler
    pub fn handle_received_packet(&mut self, received_len: usize) -> Result<(), String> {
        if received_len < PACKET_HEADER_LENGTH {
            return Err(format!(
                "Packet length of {} was ignored. Shorter than header length of {}",
                received_len, PACKET_HEADER_LENGTH
            ));
        }
        let rec_len = received_len.min(PACKET_RECV_BUF_LEN);
        let chan_num = self.packet_recv_buf[2];
        let report_id: u8 = if rec_len > PACKET_HEADER_LENGTH {
            self.packet_recv_buf[4]
        } else {
            0
        };

        match chan_num {
            CHANNEL_COMMAND => match report_id {
                CMD_RESP_ADVERTISEMENT => {
                    self.advert_received = true;
                }
                CMD_RESP_ERROR_LIST => {
                    self.handle_cmd_resp_error_list(rec_len);
                }
                _ => return Err(format!("unknown cmd: {}", report_id)),
            },
            CHANNEL_EXECUTABLE => match report_id {
                EXECUTABLE_DEVICE_RESP_RESET_COMPLETE => {
                    trace!("resp_reset");
                    self.note_reset();
                }
                _ => return Err(format!("unknown exe: {}", report_id)),
            },
            CHANNEL_HUB_CONTROL => {
                let msg = &self.packet_recv_buf[..rec_len];
                match report_id {
                    SHUB_COMMAND_RESP if rec_len > 9 => {
                        let command = msg[6];
                        let status = msg[9];
                        trace!("CMD_RESP: 0x{:X} status {}", command, status);
                        if command == SH2_STARTUP_INIT_UNSOLICITED {
                            self.note_reset();
                        } else if command == SH2_CMD_ME_CALIBRATE {
                            self.calibration_status = Some(status);
                        } else if command != SH2_INIT_SYSTEM {
                            trace!("unhandled command response 0x{:X}", command);
                        }
                    }
                    SHUB_PROD_ID_RESP if rec_len > 7 => {
                        trace!("PID_RESP {}.{}", msg[6], msg[7]);
                        self.prod_id_verified = true;
                    }
                    SHUB_GET_FEATURE_RESP if rec_len > 5 => {
                        let feature = msg[5] as usize;
                        trace!("feat resp: {}", feature);
                        if feature < MAX_REPORT_ID {
                            self.report_enabled[feature] = true;
                        }
                    }
                    _ => {
                        return Err(format!(
                            "unknown hbc: 0x{:X} {:x?}",
                            report_id,
                            &msg[..PACKET_HEADER_LENGTH]
                        ))
                    }
                }
            }
            CHANNEL_SENSOR_REPORTS => {
                let reports = ReportParser::parse_input_reports(
                    &self.packet_recv_buf[PACKET_HEADER_LENGTH..rec_len],
                );
                self.pending_reports.extend(reports);
            }
            _ => {
                return Err(format!("unknown chan 0x{:X}", chan_num));
            }
        }
        Ok(())
    }

    /// Prepare a packet for sending, in our send buffer
    fn prep_send_packet(&mut self, channel: u8, body_data: &[u8]) -> usize {
        let packet_length = body_data.len() + PACKET_HEADER_LENGTH;
        let length_bytes = (packet_length as u16).to_le_bytes();
        let packet_header = [
            length_bytes[0],
            length_bytes[1],
            channel,
            self.sequence_numbers[channel as usize],
        ];
        self.sequence_numbers[channel as usize] =
            self.sequence_numbers[channel as usize].wrapping_add(1);

        self.packet_send_buf[..PACKET_HEADER_LENGTH].copy_from_slice(&packet_header);
        self.packet_send_buf[PACKET_HEADER_LENGTH..packet_length].copy_from_slice(body_data);

        packet_length
    }

    /// Send packet from our packet send buf, handling whatever comes back
    fn send_packet(&mut self, channel: u8, body_data: &[u8]) -> Result<usize, DriverError<SE>> {
        let packet_length = self.prep_send_packet(channel, body_data);

        let rc = self
            .sensor_interface
            .send_and_receive_packet(
                &self.packet_send_buf[..packet_length],
                &mut self.packet_recv_buf,
            )
            .map_err(DriverError::CommError)?;
        if rc > 0 {
            self.dispatch_packet(rc);
        }
        Ok(packet_length)
    }

    /// Read one packet into the receive buffer
    fn receive_packet_with_timeout(&mut self, max_ms: usize) -> Result<usize, DriverError<SE>> {
        self.packet_recv_buf[0] = 0;
        self.packet_recv_buf[1] = 0;
        self.sensor_interface
            .read_with_timeout(&mut self.packet_recv_buf, max_ms)
            .map_err(DriverError::CommError)
    }

    /// Verify that the sensor answers the product id request
    fn verify_product_id(&mut self) -> Result<(), DriverError<SE>> {
        trace!("request PID...");
        let cmd_body: [u8; 2] = [
            SHUB_PROD_ID_REQ, // request product ID
            0,                // reserved
        ];
        self.send_packet(CHANNEL_HUB_CONTROL, &cmd_body)?;

        // process all incoming messages until we get a product id (or no more data)
        while !self.prod_id_verified {
            if self.handle_one_message(150) < 1 {
                break;
            }
        }

        if !self.prod_id_verified {
            return Err(DriverError::InvalidChipId(0));
        }
        Ok(())
    }
}
