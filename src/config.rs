// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operating parameters: raw values as stored, validation into an
//! [`OperatingConfig`], and the persistent configuration store.
//!
//! Validation runs before every initialization. Each field is checked
//! independently and every failure is logged; the first one is returned.
//! Values are never clamped.

use crate::constants::NMEA_DEFAULT_TALKER;
use crate::nmea::{SentenceToggles, TalkerId};
use crate::transport::{CalibrationMask, TransportParams};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/bno08x-nmea.toml";

const DEV_PREFIX: &str = "/dev/";

pub const INTERVAL_MS_MIN: i64 = 100;
pub const INTERVAL_MS_MAX: i64 = 1000;
pub const PIN_MAX: i64 = 27;
pub const CLOCK_HZ_MIN: i64 = 100_000;
pub const CLOCK_HZ_MAX: i64 = 3_000_000;
pub const PRIORITY_MAX: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A parameter is missing, malformed or outside its bound
    #[error("{field} = {value:?} is invalid, expected {bound}")]
    OutOfRange {
        field: &'static str,
        value: String,
        bound: String,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    /// Name of the offending parameter, if the error is about one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::OutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }
}

fn default_interval_ms() -> i64 {
    250
}

fn default_spi_device() -> String {
    "/dev/spidev0.0".to_string()
}

fn default_gpio_chip() -> String {
    "gpiochip0".to_string()
}

fn default_interrupt_pin() -> i64 {
    25
}

fn default_reset_pin() -> i64 {
    24
}

fn default_chip_select_pin() -> i64 {
    -1
}

fn default_spi_clock_hz() -> i64 {
    1_000_000
}

fn default_talker_id() -> String {
    NMEA_DEFAULT_TALKER.to_string()
}

fn default_priority() -> i64 {
    10
}

fn enabled() -> bool {
    true
}

/// Sensor parameters as stored, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorParams {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: i64,
    #[serde(default = "default_spi_device")]
    pub spi_device: String,
    #[serde(default = "default_gpio_chip")]
    pub gpio_chip: String,
    #[serde(default = "default_interrupt_pin")]
    pub interrupt_pin: i64,
    #[serde(default = "default_reset_pin")]
    pub reset_pin: i64,
    /// -1 uses the SPI driver's chip select
    #[serde(default = "default_chip_select_pin")]
    pub chip_select_pin: i64,
    #[serde(default = "default_spi_clock_hz")]
    pub spi_clock_hz: i64,
    #[serde(default = "default_talker_id")]
    pub talker_id: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "enabled")]
    pub hdm: bool,
    #[serde(default = "enabled")]
    pub xdr_hdm: bool,
    #[serde(default = "enabled")]
    pub roll: bool,
    #[serde(default = "enabled")]
    pub pitch: bool,
    #[serde(default = "enabled")]
    pub dynamic_mag_calibration: bool,
}

impl Default for SensorParams {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            spi_device: default_spi_device(),
            gpio_chip: default_gpio_chip(),
            interrupt_pin: default_interrupt_pin(),
            reset_pin: default_reset_pin(),
            chip_select_pin: default_chip_select_pin(),
            spi_clock_hz: default_spi_clock_hz(),
            talker_id: default_talker_id(),
            priority: default_priority(),
            hdm: true,
            xdr_hdm: true,
            roll: true,
            pitch: true,
            dynamic_mag_calibration: true,
        }
    }
}

/// Describes one editable parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub default: &'static str,
}

pub const PARAMETERS: &[ParamDescriptor] = &[
    ParamDescriptor {
        name: "interval_ms",
        description: "report interval in milliseconds (100..1000)",
        default: "250",
    },
    ParamDescriptor {
        name: "spi_device",
        description: "spidev device node",
        default: "/dev/spidev0.0",
    },
    ParamDescriptor {
        name: "gpio_chip",
        description: "GPIO chip, with or without /dev/",
        default: "gpiochip0",
    },
    ParamDescriptor {
        name: "interrupt_pin",
        description: "GPIO line of the sensor HINTN output (0..27)",
        default: "25",
    },
    ParamDescriptor {
        name: "reset_pin",
        description: "GPIO line of the sensor RSTN input (0..27)",
        default: "24",
    },
    ParamDescriptor {
        name: "chip_select_pin",
        description: "GPIO line used as chip select, -1 for the SPI driver's own",
        default: "-1",
    },
    ParamDescriptor {
        name: "spi_clock_hz",
        description: "SPI clock rate in Hz (100000..3000000)",
        default: "1000000",
    },
    ParamDescriptor {
        name: "talker_id",
        description: "two uppercase letters prefixed to every sentence",
        default: NMEA_DEFAULT_TALKER,
    },
    ParamDescriptor {
        name: "priority",
        description: "source priority attached to every sentence (0..100)",
        default: "10",
    },
    ParamDescriptor {
        name: "hdm",
        description: "write HDM sentences",
        default: "true",
    },
    ParamDescriptor {
        name: "xdr_hdm",
        description: "write the heading as XDR HDM as well, to run alongside another compass",
        default: "true",
    },
    ParamDescriptor {
        name: "roll",
        description: "write XDR ROLL sentences",
        default: "true",
    },
    ParamDescriptor {
        name: "pitch",
        description: "write XDR PITCH sentences",
        default: "true",
    },
    ParamDescriptor {
        name: "dynamic_mag_calibration",
        description: "run dynamic magnetometer calibration",
        default: "true",
    },
];

/// Validated, immutable snapshot of the sensor parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatingConfig {
    pub interval_ms: u16,
    pub spi_device: PathBuf,
    /// Resolved device node of the GPIO chip
    pub gpio_chip: PathBuf,
    pub interrupt_pin: u32,
    pub reset_pin: u32,
    pub chip_select_pin: Option<u32>,
    pub spi_clock_hz: u32,
    pub talker: TalkerId,
    pub priority: u8,
    pub sentences: SentenceToggles,
    pub dynamic_mag_calibration: bool,
}

impl OperatingConfig {
    pub fn transport_params(&self) -> TransportParams {
        TransportParams {
            interrupt_pin: self.interrupt_pin,
            reset_pin: self.reset_pin,
            chip_select_pin: self.chip_select_pin,
            clock_hz: self.spi_clock_hz,
            device_path: self.spi_device.clone(),
            gpio_chip: self.gpio_chip.clone(),
        }
    }

    pub fn calibration_mask(&self) -> CalibrationMask {
        CalibrationMask::new(self.dynamic_mag_calibration)
    }
}

#[derive(Default)]
struct Checker {
    errors: Vec<ConfigError>,
}

impl Checker {
    fn fail(&mut self, field: &'static str, value: impl Display, bound: impl Into<String>) {
        let err = ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            bound: bound.into(),
        };
        warn!("{}", err);
        self.errors.push(err);
    }

    fn range(&mut self, field: &'static str, value: i64, min: i64, max: i64) -> i64 {
        if !(min..=max).contains(&value) {
            self.fail(field, value, format!("{}..={}", min, max));
        }
        value
    }

    fn device(
        &mut self,
        field: &'static str,
        value: &str,
        candidates: &[PathBuf],
        exists: &impl Fn(&Path) -> bool,
    ) -> PathBuf {
        if value.is_empty() {
            self.fail(field, value, "a non-empty device path");
            return PathBuf::new();
        }
        match candidates.iter().find(|p| exists(p)) {
            Some(path) => path.clone(),
            None => {
                self.fail(field, value, "an existing device node");
                PathBuf::from(value)
            }
        }
    }
}

fn gpio_chip_candidates(id: &str) -> Vec<PathBuf> {
    if id.starts_with(DEV_PREFIX) {
        vec![PathBuf::from(id)]
    } else {
        vec![Path::new(DEV_PREFIX).join(id), PathBuf::from(id)]
    }
}

/// Validate against the real filesystem
pub fn validate(raw: &SensorParams) -> Result<OperatingConfig, ConfigError> {
    validate_with(raw, |p| p.exists())
}

/// Validate, using `exists` for the device node checks
pub fn validate_with(
    raw: &SensorParams,
    exists: impl Fn(&Path) -> bool,
) -> Result<OperatingConfig, ConfigError> {
    let mut check = Checker::default();

    let interval_ms = check.range(
        "interval_ms",
        raw.interval_ms,
        INTERVAL_MS_MIN,
        INTERVAL_MS_MAX,
    );
    let spi_device = check.device(
        "spi_device",
        &raw.spi_device,
        &[PathBuf::from(&raw.spi_device)],
        &exists,
    );
    let gpio_chip = check.device(
        "gpio_chip",
        &raw.gpio_chip,
        &gpio_chip_candidates(&raw.gpio_chip),
        &exists,
    );
    let interrupt_pin = check.range("interrupt_pin", raw.interrupt_pin, 0, PIN_MAX);
    let reset_pin = check.range("reset_pin", raw.reset_pin, 0, PIN_MAX);
    let chip_select_pin = match raw.chip_select_pin {
        -1 => None,
        pin if (0..=PIN_MAX).contains(&pin) => Some(pin),
        pin => {
            check.fail("chip_select_pin", pin, format!("-1 or 0..={}", PIN_MAX));
            None
        }
    };
    let spi_clock_hz = check.range(
        "spi_clock_hz",
        raw.spi_clock_hz,
        CLOCK_HZ_MIN,
        CLOCK_HZ_MAX,
    );
    let priority = check.range("priority", raw.priority, 0, PRIORITY_MAX);
    let talker = TalkerId::new(&raw.talker_id);
    if talker.is_none() {
        check.fail("talker_id", &raw.talker_id, "exactly two uppercase letters");
    }

    if let Some(first) = check.errors.into_iter().next() {
        return Err(first);
    }
    let talker = talker.ok_or_else(|| ConfigError::OutOfRange {
        field: "talker_id",
        value: raw.talker_id.clone(),
        bound: "exactly two uppercase letters".into(),
    })?;

    // every value below was range checked
    Ok(OperatingConfig {
        interval_ms: interval_ms as u16,
        spi_device,
        gpio_chip,
        interrupt_pin: interrupt_pin as u32,
        reset_pin: reset_pin as u32,
        chip_select_pin: chip_select_pin.map(|p| p as u32),
        spi_clock_hz: spi_clock_hz as u32,
        talker,
        priority: priority as u8,
        sentences: SentenceToggles {
            hdm: raw.hdm,
            xdr_hdm: raw.xdr_hdm,
            roll: raw.roll,
            pitch: raw.pitch,
        },
        dynamic_mag_calibration: raw.dynamic_mag_calibration,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `host:port` receiving one datagram per sentence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_target: Option<String>,
    pub stdout: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            udp_target: None,
            stdout: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter, overridden by RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// The daemon's configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorParams,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Persistent parameter storage. `load` is called at the start of every
/// initialization, `save` when parameters are edited.
pub trait ConfigStore {
    fn load(&self) -> Result<SensorParams, ConfigError>;
    fn save(&self, params: &SensorParams) -> Result<(), ConfigError>;
}

/// Stores the `[sensor]` table of a TOML file. Other tables are kept as is.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Whole file, with defaults for anything missing
    pub fn load_app(&self) -> Result<AppConfig, ConfigError> {
        match self.read()? {
            Some(text) => toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            }),
            None => {
                debug!("{} not found, using defaults", self.path.display());
                Ok(AppConfig::default())
            }
        }
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<SensorParams, ConfigError> {
        Ok(self.load_app()?.sensor)
    }

    fn save(&self, params: &SensorParams) -> Result<(), ConfigError> {
        let mut table = match self.read()? {
            Some(text) => text
                .parse::<toml::Table>()
                .map_err(|source| ConfigError::Parse {
                    path: self.path.clone(),
                    source,
                })?,
            None => toml::Table::new(),
        };
        table.insert("sensor".to_string(), toml::Value::try_from(params)?);
        let text = toml::to_string_pretty(&table)?;

        let tmp = self.path.with_extension("toml.tmp");
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };
        fs::write(&tmp, text).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!("saved sensor parameters to {}", self.path.display());
        Ok(())
    }
}

/// Parameters held in memory only
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    params: Mutex<SensorParams>,
}

impl MemoryConfigStore {
    pub fn new(params: SensorParams) -> Self {
        Self {
            params: Mutex::new(params),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<SensorParams, ConfigError> {
        Ok(self.params.lock().clone())
    }

    fn save(&self, params: &SensorParams) -> Result<(), ConfigError> {
        *self.params.lock() = params.clone();
        Ok(())
    }
}
