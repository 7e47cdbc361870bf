// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! Controller behaviour against the scriptable mock transport.

use bno08x_nmea::{
    transport::mock::Call, ConnectionState, Controller, Error, MemoryConfigStore, MockTransport,
    RenderedSentence, SensorEvent, SensorParams, Status, TomlConfigStore, Transport, NMEA_SOURCE,
};
use std::{
    f32::consts::FRAC_PI_2,
    sync::{Arc, Once},
    thread,
    time::Duration,
};

static INIT: Once = Once::new();

fn init_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

type TestController = Controller<MockTransport, Vec<RenderedSentence>, Vec<Status>>;

fn controller_with(mock: &MockTransport, params: SensorParams) -> TestController {
    init_logger();
    Controller::new(
        mock.clone(),
        Arc::new(MemoryConfigStore::new(params)),
        Vec::new(),
        Vec::new(),
    )
    .with_idle_delay(Duration::ZERO)
    .with_device_check(|_| true)
}

fn running(mock: &MockTransport) -> TestController {
    let mut ctl = controller_with(mock, SensorParams::default());
    ctl.tick().unwrap();
    assert_eq!(ctl.state(), ConnectionState::Running);
    mock.clear_calls();
    ctl
}

fn errors(ctl: &TestController) -> usize {
    ctl.status()
        .iter()
        .filter(|s| matches!(s, Status::Error(_)))
        .count()
}

fn bodies(ctl: &TestController) -> Vec<String> {
    ctl.sink().iter().map(|s| s.body().to_string()).collect()
}

#[test]
fn test_reset_recovery_keeps_transport() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);

    mock.trigger_reset();
    ctl.tick().unwrap();

    assert_eq!(ctl.state(), ConnectionState::Running);
    let calls = mock.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], Call::EnableOrientation(250));
    assert_eq!(calls[1], Call::EnableMagnetometer(250));
    assert!(matches!(calls[2], Call::SetCalibration(_)));
    assert!(mock.is_open());
}

#[test]
fn test_reset_recovery_failure_faults() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);

    mock.fail_enable(true);
    mock.trigger_reset();
    assert!(matches!(ctl.run(), Err(Error::ReportEnable(_))));

    assert_eq!(ctl.state(), ConnectionState::Faulted);
    assert_eq!(errors(&ctl), 1);
    let calls = mock.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Open(_))));
    assert_eq!(calls.last(), Some(&Call::Close));
}

#[test]
fn test_restart_request_reopens() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);

    ctl.handle().request_restart();
    ctl.tick().unwrap();

    let calls = mock.calls();
    assert_eq!(calls[0], Call::Close);
    assert!(matches!(calls[1], Call::Open(_)));
    assert_eq!(calls[2], Call::EnableOrientation(250));
    assert_eq!(ctl.state(), ConnectionState::Running);
}

#[test]
fn test_config_change_applies_on_next_tick() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bno08x-nmea.toml");
    std::fs::write(&path, "[output]\nstdout = false\n").unwrap();

    let mock = MockTransport::new();
    let mut ctl = Controller::new(
        mock.clone(),
        Arc::new(TomlConfigStore::new(&path)),
        Vec::<RenderedSentence>::new(),
        Vec::<Status>::new(),
    )
    .with_idle_delay(Duration::ZERO)
    .with_device_check(|_| true);
    ctl.tick().unwrap();
    mock.clear_calls();

    let params = SensorParams {
        interval_ms: 500,
        talker_id: "HC".to_string(),
        chip_select_pin: 8,
        ..SensorParams::default()
    };
    ctl.handle().change_config(&params).unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().contains("stdout = false"));

    ctl.tick().unwrap();
    let calls = mock.calls();
    assert_eq!(calls[0], Call::Close);
    match &calls[1] {
        Call::Open(p) => assert_eq!(p.chip_select_pin, Some(8)),
        other => panic!("expected open, got {:?}", other),
    }
    assert_eq!(calls[2], Call::EnableOrientation(500));
    assert_eq!(ctl.config().unwrap().talker.as_str(), "HC");
}

#[test]
fn test_invalid_config_faults_once() {
    let mock = MockTransport::new();
    let params = SensorParams {
        interval_ms: 50,
        ..SensorParams::default()
    };
    let mut ctl = controller_with(&mock, params);

    match ctl.run() {
        Err(Error::Config(e)) => assert_eq!(e.field(), Some("interval_ms")),
        other => panic!("unexpected {:?}", other.err()),
    }
    assert_eq!(ctl.state(), ConnectionState::Faulted);
    assert_eq!(errors(&ctl), 1);
    assert!(mock.calls().is_empty());
    assert!(matches!(ctl.tick(), Err(Error::Faulted)));
    assert_eq!(errors(&ctl), 1);
}

#[test]
fn test_invalid_config_after_edit_faults() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);

    let params = SensorParams {
        talker_id: "ii".to_string(),
        ..SensorParams::default()
    };
    ctl.handle().change_config(&params).unwrap();
    assert!(matches!(ctl.tick(), Err(Error::Config(_))));

    // the old session was released before validation
    assert_eq!(mock.calls(), vec![Call::Close]);
    assert_eq!(ctl.state(), ConnectionState::Faulted);
}

#[test]
fn test_open_failure_faults() {
    let mock = MockTransport::new();
    mock.fail_open(true);
    let mut ctl = controller_with(&mock, SensorParams::default());
    assert!(matches!(ctl.run(), Err(Error::TransportOpen(_))));
    assert_eq!(errors(&ctl), 1);
}

#[test]
fn test_calibration_failure_faults() {
    let mock = MockTransport::new();
    mock.fail_calibration(true);
    let mut ctl = controller_with(&mock, SensorParams::default());
    assert!(matches!(ctl.tick(), Err(Error::ReportEnable(_))));
    assert_eq!(mock.calls().last(), Some(&Call::Close));
}

#[test]
fn test_transient_read_error_continues() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);

    mock.push_read_error("short packet");
    mock.push_event(SensorEvent::MagneticFieldCalibrated { accuracy: 2 });
    ctl.tick().unwrap();
    assert_eq!(ctl.state(), ConnectionState::Running);
    assert!(ctl.sink().is_empty());

    ctl.tick().unwrap();
    assert_eq!(bodies(&ctl), vec!["IIXDR,G,2,,MAG_ACC"]);
    assert!(mock.calls().is_empty());
}

#[test]
fn test_other_reports_dropped() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);
    mock.push_event(SensorEvent::Other { report_id: 0x01 });
    ctl.tick().unwrap();
    assert!(ctl.sink().is_empty());
    assert_eq!(mock.pending_reads(), 0);
}

#[test]
fn test_rotation_vector_end_to_end() {
    let mock = MockTransport::new();
    mock.push_event(SensorEvent::RotationVector {
        roll: 0.0,
        pitch: 0.0,
        yaw: FRAC_PI_2,
    });
    let mut ctl = controller_with(&mock, SensorParams::default());
    ctl.tick().unwrap();

    assert_eq!(
        bodies(&ctl),
        vec![
            "IIXDR,A,0.0,D,ROLL",
            "IIXDR,A,0.0,D,PITCH",
            "IIHDM,090.0,M",
            "IIXDR,A,90.0,D,HDM",
        ]
    );
    for sentence in ctl.sink() {
        assert_eq!(sentence.priority(), 10);
        assert_eq!(sentence.source(), NMEA_SOURCE);
        let line = sentence.to_line();
        assert!(line.starts_with('$'));
        assert!(line.ends_with(&format!("*{:02X}", sentence.checksum())));
    }
}

#[test]
fn test_toggles_gate_sentences() {
    let mock = MockTransport::new();
    let params = SensorParams {
        hdm: false,
        xdr_hdm: false,
        pitch: false,
        ..SensorParams::default()
    };
    let mut ctl = controller_with(&mock, params);
    mock.push_event(SensorEvent::RotationVector {
        roll: 0.1,
        pitch: 0.2,
        yaw: 0.3,
    });
    mock.push_event(SensorEvent::MagneticFieldCalibrated { accuracy: 3 });
    ctl.tick().unwrap();
    ctl.tick().unwrap();
    assert_eq!(bodies(&ctl), vec!["IIXDR,A,5.7,D,ROLL"]);
}

#[test]
fn test_stop_closes_transport() {
    let mock = MockTransport::new();
    let mut ctl = running(&mock);
    ctl.handle().request_stop();
    ctl.run().unwrap();
    assert_eq!(mock.calls(), vec![Call::Close]);
    assert!(!mock.is_open());
}

#[test]
fn test_stop_from_another_thread() {
    let mock = MockTransport::new();
    let mut ctl = controller_with(&mock, SensorParams::default())
        .with_idle_delay(Duration::from_millis(1));
    let handle = ctl.handle();

    let worker = thread::spawn(move || {
        let rc = ctl.run();
        (rc, ctl.state())
    });
    thread::sleep(Duration::from_millis(50));
    handle.request_stop();
    let (rc, state) = worker.join().unwrap();

    assert!(rc.is_ok());
    assert_eq!(state, ConnectionState::Running);
    assert!(!mock.is_open());
}
