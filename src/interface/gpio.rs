// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! GPIO lines through the Linux character device (gpiod)

use gpiod::{Chip, Input, Lines, Options, Output};
use std::io;

/// Consumer label shown by `gpioinfo` for the lines we hold
const GPIO_CONSUMER: &str = "bno08x-nmea";

pub trait OutputPin {
    /// Error type
    type Error;

    /// Drives the pin low
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Drives the pin high
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

pub trait InputPin {
    /// Error type
    type Error;

    /// Is the input pin high?
    fn is_high(&self) -> Result<bool, Self::Error>;

    /// Is the input pin low?
    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// A single requested output line. The line is released on drop.
pub struct GpiodOut {
    output: Lines<Output>,
}

impl GpiodOut {
    pub fn new(chip: &Chip, pin: u32, initial: bool) -> io::Result<GpiodOut> {
        let opts = Options::output([pin])
            .values([initial])
            .consumer(GPIO_CONSUMER);

        Ok(GpiodOut {
            output: chip.request_lines(opts)?,
        })
    }
}

impl OutputPin for GpiodOut {
    type Error = io::Error;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.output.set_values([false])
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.output.set_values([true])
    }
}

/// A single requested input line. The line is released on drop.
pub struct GpiodIn {
    input: Lines<Input>,
}

impl GpiodIn {
    pub fn new(chip: &Chip, pin: u32) -> io::Result<GpiodIn> {
        let opts = Options::input([pin]).consumer(GPIO_CONSUMER);

        Ok(GpiodIn {
            input: chip.request_lines(opts)?,
        })
    }
}

impl InputPin for GpiodIn {
    type Error = io::Error;

    fn is_high(&self) -> Result<bool, Self::Error> {
        let values = self.input.get_values([false])?;
        Ok(values[0])
    }
}
