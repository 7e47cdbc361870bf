// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! BNO08x orientation as NMEA 0183 sentences.
//!
//! The [`lifecycle::Controller`] brings the sensor up over a [`Transport`],
//! recovers from sensor resets and reconfiguration, and turns every rotation
//! vector and magnetometer accuracy report into checksummed XDR/HDM
//! sentences handed to a [`SentenceSink`].

pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod event;
pub mod interface;
pub mod lifecycle;
pub mod nmea;
pub mod reports;
pub mod signal;
pub mod status;
pub mod transport;

pub use config::{
    validate, validate_with, AppConfig, ConfigError, ConfigStore, MemoryConfigStore,
    OperatingConfig, SensorParams, TomlConfigStore,
};
pub use constants::*;
pub use driver::{DriverError, SpiBno08x, BNO08x};
pub use error::{Error, Result};
pub use event::{Measurement, SensorEvent};
pub use lifecycle::{ConnectionState, ControlHandle, Controller};
pub use nmea::{RenderedSentence, SentenceSink, SentenceToggles, TalkerId};
pub use signal::Signal;
pub use status::{LogStatusSink, Status, StatusSink};
pub use transport::{Bno08xTransport, MockTransport, Transport, TransportError, TransportParams};
