//! Frame fan-out: deliver each rendered frame to every enabled destination
//! as one OSC datagram carrying the RGB byte sequence.
//!
//! A destination either takes the whole frame (`copy_mode`) or an inclusive
//! `start_led..=end_led` slice clipped to the strip; a slice that clips to
//! nothing emits nothing. Sends go through the `FrameSink` seam so tests
//! capture frames in-process while production pushes them out a UDP socket.
//! A failing destination is logged and skipped; one unplugged controller
//! must not dim the rest of the rig.

use core_color::Rgb;
use core_events::DATAGRAM_SEND_FAILURES;
use core_osc::{OscArg, OscMessage};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering::Relaxed;
use tracing::{debug, warn};

/// One configured output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub addr: SocketAddr,
    /// Send the whole frame instead of a slice.
    pub copy_mode: bool,
    pub start_led: usize,
    /// Inclusive upper bound, clipped to the strip at emit time.
    pub end_led: usize,
    pub enabled: bool,
}

/// Transport seam: production uses `UdpSink`; tests swap in a capture.
pub trait FrameSink {
    fn send(&mut self, payload: &[u8], dest: SocketAddr) -> io::Result<()>;
}

/// An unconnected UDP socket shared by all destinations. Owned by the
/// render thread; nothing else touches it.
pub struct UdpSink {
    socket: UdpSocket,
}

impl UdpSink {
    pub fn bind() -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        // Never let a saturated send buffer stall the frame loop.
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }
}

impl FrameSink for UdpSink {
    fn send(&mut self, payload: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.socket.send_to(payload, dest).map(|_| ())
    }
}

/// Per-frame distributor over the destination table.
pub struct FanOut<S: FrameSink> {
    sink: S,
    destinations: Vec<Destination>,
    output_address: String,
}

impl<S: FrameSink> FanOut<S> {
    pub fn new(sink: S, destinations: Vec<Destination>, output_address: impl Into<String>) -> Self {
        Self {
            sink,
            destinations,
            output_address: output_address.into(),
        }
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Emit one frame to every enabled destination. Returns how many
    /// datagrams were actually sent.
    pub fn emit(&mut self, frame: &[Rgb]) -> usize {
        let mut sent = 0;
        for dest in &self.destinations {
            if !dest.enabled {
                continue;
            }
            let Some(slice) = select_slice(frame, dest) else {
                continue;
            };
            let message =
                OscMessage::new(self.output_address.clone(), vec![OscArg::Blob(to_bytes(slice))]);
            match self.sink.send(&message.encode(), dest.addr) {
                Ok(()) => {
                    sent += 1;
                    debug!(
                        target: "output.fanout",
                        addr = %dest.addr,
                        leds = slice.len(),
                        "frame sent"
                    );
                }
                Err(error) => {
                    DATAGRAM_SEND_FAILURES.fetch_add(1, Relaxed);
                    warn!(target: "output.fanout", addr = %dest.addr, %error, "send failed");
                }
            }
        }
        sent
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// The portion of `frame` a destination receives, or `None` when its slice
/// clips to nothing.
fn select_slice<'a>(frame: &'a [Rgb], dest: &Destination) -> Option<&'a [Rgb]> {
    if dest.copy_mode {
        return Some(frame);
    }
    if frame.is_empty() || dest.start_led >= frame.len() || dest.start_led > dest.end_led {
        return None;
    }
    let end = dest.end_led.min(frame.len() - 1);
    Some(&frame[dest.start_led..=end])
}

fn to_bytes(slice: &[Rgb]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(slice.len() * 3);
    for led in slice {
        bytes.extend_from_slice(&[led.r, led.g, led.b]);
    }
    bytes
}
