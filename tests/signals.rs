// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Process signals reach the controller through the listener thread.

use bno08x_nmea::{
    lifecycle::spawn_signal_listener, ConnectionState, Controller, MemoryConfigStore,
    MockTransport, RenderedSentence, SensorParams, Status, Transport,
};
use signal_hook::{consts::SIGTERM, low_level::raise};
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

#[test]
fn test_sigterm_stops_running_controller() {
    let mock = MockTransport::new();
    let mut ctl = Controller::new(
        mock.clone(),
        Arc::new(MemoryConfigStore::new(SensorParams::default())),
        Vec::<RenderedSentence>::new(),
        Vec::<Status>::new(),
    )
    .with_idle_delay(Duration::from_millis(1))
    .with_device_check(|_| true);
    let handle = ctl.handle();
    spawn_signal_listener(handle.clone()).unwrap();

    let worker = thread::spawn(move || {
        let rc = ctl.run();
        (rc, ctl.state())
    });
    let start = Instant::now();
    while !mock.is_open() && start.elapsed() < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(mock.is_open());

    raise(SIGTERM).unwrap();
    let (rc, state) = worker.join().unwrap();

    assert!(rc.is_ok());
    assert!(handle.stop_requested());
    assert_eq!(state, ConnectionState::Running);
    assert!(!mock.is_open());
}
