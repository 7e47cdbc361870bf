// Copyright 2025 Au-Zone Technologies Inc.
// SPDX-License-Identifier: Apache-2.0

//! NMEA 0183 sentence encoding and output sinks.
//!
//! Roll, pitch and the duplicate heading go out as transducer measurements
//! (`XDR`), the primary heading as magnetic heading (`HDM`):
//!
//! ```text
//! $IIXDR,A,12.3,D,ROLL*hh
//! $IIXDR,A,-4.0,D,PITCH*hh
//! $IIHDM,090.0,M*hh
//! $IIXDR,A,90.0,D,HDM*hh
//! $IIXDR,G,3,,MAG_ACC*hh
//! ```

use crate::constants::NMEA_SOURCE;
use crate::event::Measurement;
use log::{trace, warn};
use std::{
    fmt,
    io::{self, Write},
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
};

/// Two uppercase ASCII letters identifying the sending subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TalkerId([u8; 2]);

impl TalkerId {
    /// Returns `None` unless `id` is exactly two uppercase ASCII letters
    pub fn new(id: &str) -> Option<Self> {
        match id.as_bytes() {
            &[a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => {
                Some(TalkerId([a, b]))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        // both bytes are ASCII letters
        std::str::from_utf8(&self.0).unwrap_or("II")
    }
}

impl fmt::Display for TalkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which sentences are produced for an attitude measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceToggles {
    pub hdm: bool,
    pub xdr_hdm: bool,
    pub roll: bool,
    pub pitch: bool,
}

impl SentenceToggles {
    pub fn all() -> Self {
        Self {
            hdm: true,
            xdr_hdm: true,
            roll: true,
            pitch: true,
        }
    }

    /// Any heading output enabled
    pub fn heading(&self) -> bool {
        self.hdm || self.xdr_hdm
    }
}

/// A finished sentence with its bus metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSentence {
    body: String,
    talker: TalkerId,
    priority: u8,
    source: &'static str,
}

impl RenderedSentence {
    fn new(talker: TalkerId, priority: u8, body: String) -> Self {
        Self {
            body,
            talker,
            priority,
            source: NMEA_SOURCE,
        }
    }

    /// Sentence text between `$` and `*`
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn talker(&self) -> TalkerId {
        self.talker
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn checksum(&self) -> u8 {
        checksum(&self.body)
    }

    /// Complete sentence with checksum, without line terminator
    pub fn to_line(&self) -> String {
        format!("${}*{:02X}", self.body, self.checksum())
    }
}

impl fmt::Display for RenderedSentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}*{:02X}", self.body, self.checksum())
    }
}

/// XOR of every byte of the sentence body
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// One decimal, halves away from zero, never negative zero
fn round_tenth(value: f64) -> f64 {
    // + 0.0 turns a negative zero positive
    (value * 10.0).round() / 10.0 + 0.0
}

/// Heading rounded like every other field, wrapped so it never renders as 360.0
fn rendered_heading(heading: f64) -> f64 {
    let heading = round_tenth(heading);
    if heading >= 360.0 {
        0.0
    } else {
        heading
    }
}

fn xdr_angle(talker: TalkerId, value: f64, name: &str) -> String {
    format!("{}XDR,A,{:.1},D,{}", talker, round_tenth(value), name)
}

/// Render the sentences for one measurement.
///
/// Pure in its inputs: the same measurement, toggles, talker and priority
/// always give byte-identical sentences.
pub fn encode(
    measurement: &Measurement,
    toggles: &SentenceToggles,
    talker: TalkerId,
    priority: u8,
) -> Vec<RenderedSentence> {
    let mut out = Vec::with_capacity(4);
    match *measurement {
        Measurement::Attitude {
            roll,
            pitch,
            heading,
        } => {
            if toggles.roll {
                out.push(xdr_angle(talker, roll, "ROLL"));
            }
            if toggles.pitch {
                out.push(xdr_angle(talker, pitch, "PITCH"));
            }
            let heading = rendered_heading(heading);
            if toggles.hdm {
                out.push(format!("{}HDM,{:05.1},M", talker, heading));
            }
            if toggles.xdr_hdm {
                out.push(xdr_angle(talker, heading, "HDM"));
            }
        }
        Measurement::MagneticAccuracy(accuracy) => {
            if toggles.heading() {
                out.push(format!("{}XDR,G,{},,MAG_ACC", talker, accuracy));
            }
        }
    }
    out.into_iter()
        .map(|body| RenderedSentence::new(talker, priority, body))
        .collect()
}

/// Where rendered sentences go. Emitting never blocks the caller for long and
/// never fails it; sinks log their own delivery problems.
pub trait SentenceSink {
    fn emit(&mut self, sentence: &RenderedSentence);
}

impl SentenceSink for Vec<RenderedSentence> {
    fn emit(&mut self, sentence: &RenderedSentence) {
        self.push(sentence.clone());
    }
}

impl<S: SentenceSink + ?Sized> SentenceSink for Box<S> {
    fn emit(&mut self, sentence: &RenderedSentence) {
        (**self).emit(sentence)
    }
}

/// One UDP datagram per sentence
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    /// Bind an ephemeral local port and send to `target` (`host:port`)
    pub fn new(target: &str) -> io::Result<Self> {
        let target = target.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve", target),
            )
        })?;
        let bind = if target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl SentenceSink for UdpSink {
    fn emit(&mut self, sentence: &RenderedSentence) {
        let line = format!("{}\r\n", sentence);
        if let Err(e) = self.socket.send_to(line.as_bytes(), self.target) {
            warn!("UDP send to {} failed: {}", self.target, e);
        }
    }
}

/// Line-per-sentence output on any writer, e.g. stdout
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SentenceSink for WriterSink<W> {
    fn emit(&mut self, sentence: &RenderedSentence) {
        let rc = write!(self.writer, "{}\r\n", sentence).and_then(|_| self.writer.flush());
        if let Err(e) = rc {
            warn!("sentence write failed: {}", e);
        }
    }
}

/// Forward every sentence to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn SentenceSink + Send>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn SentenceSink + Send>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SentenceSink for FanoutSink {
    fn emit(&mut self, sentence: &RenderedSentence) {
        trace!(
            "{} (prio {}, {})",
            sentence,
            sentence.priority(),
            sentence.source()
        );
        for sink in self.sinks.iter_mut() {
            sink.emit(sentence);
        }
    }
}
