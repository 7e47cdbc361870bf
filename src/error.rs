// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Errors that end a controller run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Parameters failed validation or could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open sensor: {0}")]
    TransportOpen(#[source] TransportError),

    /// A report or the calibration mode could not be enabled
    #[error("cannot enable sensor reports: {0}")]
    ReportEnable(#[source] TransportError),

    /// The controller already stopped on a fatal error
    #[error("controller is faulted")]
    Faulted,
}

pub type Result<T> = std::result::Result<T, Error>;
