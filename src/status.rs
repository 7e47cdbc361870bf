// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Operator facing status of the sensor worker.

use log::info;
use parking_lot::Mutex;
use std::{fmt, sync::Arc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Initializing,
    Running,
    /// Worker stopped on a fatal condition
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Initializing => f.write_str("initializing"),
            Status::Running => f.write_str("running"),
            Status::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Receives status changes from the controller
pub trait StatusSink {
    fn update(&mut self, status: Status);
}

impl StatusSink for Vec<Status> {
    fn update(&mut self, status: Status) {
        self.push(status);
    }
}

/// Logs status changes and keeps the latest one for other threads to read
#[derive(Debug, Clone, Default)]
pub struct LogStatusSink {
    last: Arc<Mutex<Option<Status>>>,
}

impl LogStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<Status> {
        self.last.lock().clone()
    }
}

impl StatusSink for LogStatusSink {
    fn update(&mut self, status: Status) {
        match &status {
            // the controller logs the cause of an error itself
            Status::Error(_) => {}
            other => info!("status: {}", other),
        }
        *self.last.lock() = Some(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_keeps_last() {
        let mut sink = LogStatusSink::new();
        let reader = sink.clone();
        assert_eq!(reader.last(), None);
        sink.update(Status::Initializing);
        sink.update(Status::Running);
        assert_eq!(reader.last(), Some(Status::Running));
    }

    #[test]
    fn test_display() {
        assert_eq!(Status::Running.to_string(), "running");
        assert_eq!(
            Status::Error("bad interval".into()).to_string(),
            "error: bad interval"
        );
    }
}
