// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! spidev-backed SPI bus

use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};
use std::{io, path::Path};

/// Blocking full-duplex transfer
pub trait Transfer {
    /// Error type
    type Error;

    /// Sends `words` to the slave and overwrites them with the received words
    fn transfer(&mut self, words: &mut [u8]) -> Result<(), Self::Error>;
}

pub struct SpiDevice {
    spi: Spidev,
}

impl SpiDevice {
    /// Open `path` in SPI mode 3 at `clock_hz`.
    ///
    /// With `manual_cs` the kernel leaves chip select alone so a GPIO line can
    /// drive it.
    pub fn new<P: AsRef<Path>>(path: P, clock_hz: u32, manual_cs: bool) -> io::Result<SpiDevice> {
        let mut spi = Spidev::open(path)?;
        let mut mode = SpiModeFlags::SPI_MODE_3;
        if manual_cs {
            mode |= SpiModeFlags::SPI_NO_CS;
        }
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(clock_hz)
            .mode(mode)
            .lsb_first(false)
            .build();
        spi.configure(&options)?;

        Ok(SpiDevice { spi })
    }
}

impl Transfer for SpiDevice {
    type Error = io::Error;

    fn transfer(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let mut rx_buf = vec![0_u8; words.len()];
        {
            let mut transfer = SpidevTransfer::read_write(words, &mut rx_buf);
            self.spi.transfer(&mut transfer)?;
        }
        words.copy_from_slice(&rx_buf);
        Ok(())
    }
}
