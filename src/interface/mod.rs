// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hardware interface layer: the SHTP packet transport between the driver and
//! the sensor hub.

pub mod delay;
pub mod gpio;
pub mod spi;
pub mod spidev;

pub use spi::{SpiControlLines, SpiInterface};

/// Length of the SHTP header: two length bytes, channel, sequence number
pub const PACKET_HEADER_LENGTH: usize = 4;

/// The continuation bit in the MSB of the SHTP length field
const PACKET_CONTINUATION_BIT: u16 = 0x8000;

/// Errors raised by an interface implementation
#[derive(Debug)]
pub enum InterfaceError<CommE, PinE> {
    /// Sensor communication error
    Comm(CommE),
    /// Pin setting error
    Pin(PinE),
    /// The sensor is not responding
    SensorUnresponsive,
    /// The sensor announced a packet larger than the receive buffer
    PacketTooLarge(usize),
}

/// A packet-level connection to the sensor hub
pub trait SensorInterface {
    type SensorError;

    /// Bring the sensor out of reset and wait until it is ready
    fn setup(&mut self) -> Result<(), Self::SensorError>;

    /// Is the sensor signalling that a packet is waiting
    fn data_ready(&self) -> bool;

    /// Read a full packet, returning its length (0 if none)
    fn read_packet(&mut self, recv_buf: &mut [u8]) -> Result<usize, Self::SensorError>;

    /// Full duplex exchange: write `send_buf` while reading whatever the
    /// sensor has queued into `recv_buf`
    fn send_and_receive_packet(
        &mut self,
        send_buf: &[u8],
        recv_buf: &mut [u8],
    ) -> Result<usize, Self::SensorError>;

    /// Wait up to `max_ms` for the sensor to signal data, then read a packet
    fn read_with_timeout(
        &mut self,
        recv_buf: &mut [u8],
        max_ms: usize,
    ) -> Result<usize, Self::SensorError>;
}

/// Helpers shared by interface implementations
pub struct SensorCommon;

impl SensorCommon {
    /// Decode the packet length from an SHTP header
    pub fn parse_packet_header(packet: &[u8]) -> usize {
        if packet.len() < PACKET_HEADER_LENGTH {
            return 0;
        }
        let raw = u16::from_le_bytes([packet[0], packet[1]]);
        // 0xFFFF reads back when nothing drives MISO
        if raw == u16::MAX {
            return 0;
        }
        (raw & !PACKET_CONTINUATION_BIT) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_packet_header() {
        assert_eq!(SensorCommon::parse_packet_header(&[0x14, 0x00, 3, 7]), 20);
        assert_eq!(SensorCommon::parse_packet_header(&[0x00, 0x01, 2, 0]), 256);
    }

    #[test]
    fn test_parse_packet_header_continuation() {
        assert_eq!(SensorCommon::parse_packet_header(&[0x14, 0x80, 3, 7]), 20);
    }

    #[test]
    fn test_parse_packet_header_idle_bus() {
        assert_eq!(SensorCommon::parse_packet_header(&[0xFF, 0xFF, 0xFF, 0xFF]), 0);
        assert_eq!(SensorCommon::parse_packet_header(&[0x14]), 0);
    }
}
