// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

use bno08x_nmea::{
    config::{OutputConfig, DEFAULT_CONFIG_PATH},
    lifecycle::spawn_signal_listener,
    nmea::{FanoutSink, UdpSink, WriterSink},
    validate, AppConfig, Bno08xTransport, Controller, LogStatusSink, TomlConfigStore,
};
use clap::Parser;
use log::{error, info, warn};
use std::{io, path::PathBuf, process::ExitCode, sync::Arc};

/// Stream BNO08x roll, pitch and heading as NMEA 0183
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

fn build_sink(output: &OutputConfig) -> io::Result<FanoutSink> {
    let mut sink = FanoutSink::new();
    if let Some(target) = &output.udp_target {
        let udp = UdpSink::new(target)?;
        info!("sending sentences to udp://{}", udp.target());
        sink.push(Box::new(udp));
    }
    if output.stdout {
        sink.push(Box::new(WriterSink::new(io::stdout())));
    }
    if sink.is_empty() {
        warn!("no output configured, sentences are discarded");
    }
    Ok(sink)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_config {
        return match toml::to_string_pretty(&AppConfig::default()) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let store = TomlConfigStore::new(&args.config);
    let app = match store.load_app() {
        Ok(app) => app,
        Err(e) => {
            env_logger::init();
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&app.logging.level))
        .init();

    if args.check {
        return match validate(&app.sensor) {
            Ok(_) => {
                info!("{}: configuration is valid", args.config.display());
                ExitCode::SUCCESS
            }
            // each failing field was already logged
            Err(_) => ExitCode::FAILURE,
        };
    }

    let sink = match build_sink(&app.output) {
        Ok(sink) => sink,
        Err(e) => {
            error!("cannot set up output: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut controller = Controller::new(
        Bno08xTransport::new(),
        Arc::new(store),
        sink,
        LogStatusSink::new(),
    );

    if let Err(e) = spawn_signal_listener(controller.handle()) {
        error!("cannot install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    match controller.run() {
        Ok(()) => ExitCode::SUCCESS,
        // the controller logged the cause
        Err(_) => ExitCode::FAILURE,
    }
}
