// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! SHTP over SPI with HINTN/RSTN control lines and an optional GPIO chip
//! select.

use super::{InterfaceError, SensorCommon, SensorInterface, PACKET_HEADER_LENGTH};
use crate::interface::delay::delay_ms;
use crate::interface::gpio::{InputPin, OutputPin};
use crate::interface::spidev::Transfer;
use log::{debug, trace};

/// Milliseconds to wait for HINTN after a hardware reset (datasheet: ~120 ms)
const WAKE_TIMEOUT_MS: usize = 200;

/// Encapsulates all the lines required to operate this sensor
/// - SPI: clock, MISO and MOSI through spidev
/// - CSN: chip select, `None` when the spidev driver handles it
/// - HINTN: Hardware Interrupt. Sensor uses this to indicate it had data available for read
/// - RSTN: Reset the device
pub struct SpiControlLines<SPI, CSN, IN, RSTN> {
    pub spi: SPI,
    pub csn: Option<CSN>,
    pub hintn: IN,
    pub reset: RSTN,
}

/// This combines the SPI peripheral and associated control pins
pub struct SpiInterface<SPI, CSN, IN, RSTN> {
    spi: SPI,
    csn: Option<CSN>,
    hintn: IN,
    reset: RSTN,
    received_packet_count: usize,
}

impl<SPI, CSN, IN, RSTN, CommE, PinE> SpiInterface<SPI, CSN, IN, RSTN>
where
    SPI: Transfer<Error = CommE>,
    CSN: OutputPin<Error = PinE>,
    IN: InputPin<Error = PinE>,
    RSTN: OutputPin<Error = PinE>,
    CommE: core::fmt::Debug,
    PinE: core::fmt::Debug,
{
    pub fn new(lines: SpiControlLines<SPI, CSN, IN, RSTN>) -> Self {
        Self {
            spi: lines.spi,
            csn: lines.csn,
            hintn: lines.hintn,
            reset: lines.reset,
            received_packet_count: 0,
        }
    }

    /// Number of non-empty packets read since construction
    pub fn received_packet_count(&self) -> usize {
        self.received_packet_count
    }

    /// Is the sensor indicating it has data available
    /// "In SPI and I2C mode the HOST_INTN signal is used by the BNO080 to
    /// indicate to the application processor that the BNO080 needs attention."
    fn hintn_signaled(&self) -> bool {
        self.hintn.is_low().unwrap_or(false)
    }

    /// Wait for sensor to signal HINTN, polling once per millisecond
    fn wait_for_sensor_awake(&mut self, max_ms: usize) -> bool {
        for _ in 0..max_ms {
            if self.hintn_signaled() {
                return true;
            }
            delay_ms(1);
        }
        self.hintn_signaled()
    }

    fn select(&mut self) -> Result<(), InterfaceError<CommE, PinE>> {
        if let Some(csn) = self.csn.as_mut() {
            csn.set_low().map_err(InterfaceError::Pin)?;
        }
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), InterfaceError<CommE, PinE>> {
        if let Some(csn) = self.csn.as_mut() {
            csn.set_high().map_err(InterfaceError::Pin)?;
        }
        Ok(())
    }

    /// Run `op` with chip select asserted, always releasing it afterwards
    fn selected<T>(
        &mut self,
        op: impl FnOnce(&mut SPI) -> Result<T, CommE>,
    ) -> Result<T, InterfaceError<CommE, PinE>> {
        self.select()?;
        let rc = op(&mut self.spi).map_err(InterfaceError::Comm);
        self.deselect()?;
        rc
    }
}

impl<SPI, CSN, IN, RSTN, CommE, PinE> SensorInterface for SpiInterface<SPI, CSN, IN, RSTN>
where
    SPI: Transfer<Error = CommE>,
    CSN: OutputPin<Error = PinE>,
    IN: InputPin<Error = PinE>,
    RSTN: OutputPin<Error = PinE>,
    CommE: core::fmt::Debug,
    PinE: core::fmt::Debug,
{
    type SensorError = InterfaceError<CommE, PinE>;

    fn setup(&mut self) -> Result<(), Self::SensorError> {
        self.deselect()?;
        // Note: This assumes that WAK/PS0 is set to high already
        self.reset.set_high().map_err(InterfaceError::Pin)?;

        debug!("reset cycle");
        self.reset.set_low().map_err(InterfaceError::Pin)?;
        delay_ms(2);
        self.reset.set_high().map_err(InterfaceError::Pin)?;

        if !self.wait_for_sensor_awake(WAKE_TIMEOUT_MS) {
            debug!("sensor not ready after reset");
            return Err(InterfaceError::SensorUnresponsive);
        }

        Ok(())
    }

    fn data_ready(&self) -> bool {
        self.hintn_signaled()
    }

    fn read_packet(&mut self, recv_buf: &mut [u8]) -> Result<usize, Self::SensorError> {
        // Note: HINTN cannot always be used to detect data ready.
        // As soon as host selects CSN, HINTN resets
        let mut header = [0u8; PACKET_HEADER_LENGTH];
        self.selected(|spi| spi.transfer(&mut header))?;
        let packet_len = SensorCommon::parse_packet_header(&header);
        if packet_len <= PACKET_HEADER_LENGTH {
            return Ok(0);
        }
        if packet_len > recv_buf.len() {
            return Err(InterfaceError::PacketTooLarge(packet_len));
        }

        recv_buf[..packet_len].fill(0);
        self.selected(|spi| spi.transfer(&mut recv_buf[..packet_len]))?;
        let read_len = SensorCommon::parse_packet_header(&recv_buf[..PACKET_HEADER_LENGTH]);
        trace!("read packet len {} chan {}", read_len, recv_buf[2]);

        if read_len > 0 {
            self.received_packet_count += 1;
        }
        Ok(read_len.min(packet_len))
    }

    fn send_and_receive_packet(
        &mut self,
        send_buf: &[u8],
        recv_buf: &mut [u8],
    ) -> Result<usize, Self::SensorError> {
        // peek at the length of whatever the hub has queued
        let mut header = [0u8; PACKET_HEADER_LENGTH];
        self.selected(|spi| spi.transfer(&mut header))?;
        let pending_len = SensorCommon::parse_packet_header(&header);

        let total_len = pending_len.max(send_buf.len());
        if total_len > recv_buf.len() {
            return Err(InterfaceError::PacketTooLarge(total_len));
        }
        recv_buf[..total_len].fill(0);
        recv_buf[..send_buf.len()].copy_from_slice(send_buf);
        self.selected(|spi| spi.transfer(&mut recv_buf[..total_len]))?;

        let read_len = SensorCommon::parse_packet_header(&recv_buf[..PACKET_HEADER_LENGTH]);
        if read_len > 0 {
            self.received_packet_count += 1;
        }
        Ok(read_len.min(total_len))
    }

    fn read_with_timeout(
        &mut self,
        recv_buf: &mut [u8],
        max_ms: usize,
    ) -> Result<usize, Self::SensorError> {
        if self.wait_for_sensor_awake(max_ms) {
            return self.read_packet(recv_buf);
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeBus {
        replies: VecDeque<Vec<u8>>,
        written: Vec<Vec<u8>>,
    }

    impl Transfer for FakeBus {
        type Error = ();
        fn transfer(&mut self, words: &mut [u8]) -> Result<(), ()> {
            self.written.push(words.to_vec());
            let reply = self.replies.pop_front().unwrap_or_default();
            for (i, w) in words.iter_mut().enumerate() {
                *w = reply.get(i).copied().unwrap_or(0);
            }
            Ok(())
        }
    }

    struct FakeLine(Rc<Cell<bool>>);

    impl InputPin for FakeLine {
        type Error = ();
        fn is_high(&self) -> Result<bool, ()> {
            Ok(self.0.get())
        }
    }

    impl OutputPin for FakeLine {
        type Error = ();
        fn set_low(&mut self) -> Result<(), ()> {
            self.0.set(false);
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), ()> {
            self.0.set(true);
            Ok(())
        }
    }

    fn interface(
        bus: FakeBus,
        hintn_high: bool,
    ) -> (SpiInterface<FakeBus, FakeLine, FakeLine, FakeLine>, Rc<Cell<bool>>) {
        let csn = Rc::new(Cell::new(true));
        let lines = SpiControlLines {
            spi: bus,
            csn: Some(FakeLine(csn.clone())),
            hintn: FakeLine(Rc::new(Cell::new(hintn_high))),
            reset: FakeLine(Rc::new(Cell::new(true))),
        };
        (SpiInterface::new(lines), csn)
    }

    #[test]
    fn test_read_packet_two_phase() {
        let packet = vec![0x06, 0x00, 3, 1, 0xAA, 0xBB];
        let bus = FakeBus {
            replies: VecDeque::from(vec![packet[..4].to_vec(), packet.clone()]),
            ..Default::default()
        };
        let (mut spi, csn) = interface(bus, false);
        let mut buf = [0u8; 32];
        let len = spi.read_packet(&mut buf).unwrap();
        assert_eq!(len, 6);
        assert_eq!(&buf[..6], packet.as_slice());
        assert_eq!(spi.received_packet_count(), 1);
        // chip select released after the transfer
        assert!(csn.get());
    }

    #[test]
    fn test_read_packet_empty_header() {
        let bus = FakeBus::default();
        let (mut spi, _) = interface(bus, false);
        let mut buf = [0u8; 32];
        assert_eq!(spi.read_packet(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_packet_too_large() {
        let bus = FakeBus {
            replies: VecDeque::from(vec![vec![0x00, 0x01, 3, 0]]),
            ..Default::default()
        };
        let (mut spi, _) = interface(bus, false);
        let mut buf = [0u8; 32];
        assert!(matches!(
            spi.read_packet(&mut buf),
            Err(InterfaceError::PacketTooLarge(256))
        ));
    }

    #[test]
    fn test_data_ready_follows_hintn() {
        let (spi, _) = interface(FakeBus::default(), false);
        assert!(spi.data_ready());
        let (spi, _) = interface(FakeBus::default(), true);
        assert!(!spi.data_ready());
    }
}
