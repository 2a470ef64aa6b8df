//! Wheel encoder edge counting.
//!
//! Edges arrive asynchronously (pin-change interrupt, or another task) and
//! are accumulated in [`EncoderTicks`], one atomic counter per wheel. The
//! sampling cycle drains both counters with a single `swap(0)` each, so no
//! edge is lost or counted twice between frames.
//!
//! ```rust
//! use rover_io::encoder::{EncoderCounter, EncoderTicks, Wheel};
//!
//! static TICKS: EncoderTicks = EncoderTicks::new();
//!
//! // In the interrupt handler:
//! TICKS.record(Wheel::Left);
//! TICKS.record(Wheel::Left);
//! TICKS.record(Wheel::Right);
//!
//! // At the frame boundary:
//! let mut counter = EncoderCounter::new(&TICKS);
//! let ticks = counter.drain();
//! assert_eq!((ticks.left, ticks.right), (2, 1));
//! assert_eq!(counter.drain().left, 0);
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use log::trace;

use crate::config::EncoderPins;
use crate::frame::WheelTicks;
use crate::traits::PortBus;

/// Which wheel an edge belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wheel {
    /// Left wheel.
    Left,
    /// Right wheel.
    Right,
}

/// Edge accumulators shared between the edge source and the sampling cycle.
///
/// `const`-constructible so it can live in a `static` reachable from an
/// interrupt handler.
#[derive(Debug, Default)]
pub struct EncoderTicks {
    left: AtomicU32,
    right: AtomicU32,
}

impl EncoderTicks {
    /// Both counters at zero.
    pub const fn new() -> Self {
        Self {
            left: AtomicU32::new(0),
            right: AtomicU32::new(0),
        }
    }

    fn counter(&self, wheel: Wheel) -> &AtomicU32 {
        match wheel {
            Wheel::Left => &self.left,
            Wheel::Right => &self.right,
        }
    }

    /// Records one edge. Safe to call from interrupt context.
    #[inline]
    pub fn record(&self, wheel: Wheel) {
        self.counter(wheel).fetch_add(1, Ordering::Relaxed);
    }

    /// Records `edges` edges at once.
    #[inline]
    pub fn record_many(&self, wheel: Wheel, edges: u32) {
        self.counter(wheel).fetch_add(edges, Ordering::Relaxed);
    }

    /// Edges recorded since the last drain, without resetting.
    pub fn pending(&self, wheel: Wheel) -> u32 {
        self.counter(wheel).load(Ordering::Relaxed)
    }

    /// Takes and resets both counters.
    pub fn drain(&self) -> (u32, u32) {
        (
            self.left.swap(0, Ordering::Relaxed),
            self.right.swap(0, Ordering::Relaxed),
        )
    }
}

/// Frame-boundary view of an [`EncoderTicks`].
#[derive(Debug)]
pub struct EncoderCounter<'t> {
    ticks: &'t EncoderTicks,
    total_left: u64,
    total_right: u64,
}

impl<'t> EncoderCounter<'t> {
    /// Creates a counter over shared accumulators.
    pub fn new(ticks: &'t EncoderTicks) -> Self {
        Self {
            ticks,
            total_left: 0,
            total_right: 0,
        }
    }

    /// The shared accumulators, for wiring an edge source.
    pub fn ticks(&self) -> &'t EncoderTicks {
        self.ticks
    }

    /// Edges since the previous drain. Never negative.
    pub fn drain(&mut self) -> WheelTicks {
        let (left, right) = self.ticks.drain();
        self.total_left += u64::from(left);
        self.total_right += u64::from(right);
        WheelTicks::new(saturate(left), saturate(right))
    }

    /// Edges drained since construction, per wheel.
    pub fn totals(&self) -> (u64, u64) {
        (self.total_left, self.total_right)
    }
}

fn saturate(edges: u32) -> i32 {
    i32::try_from(edges).unwrap_or(i32::MAX)
}

/// Polled rising-edge detector for boards without encoder interrupts.
///
/// Each call samples both encoder lines and records a tick for every
/// low-to-high transition since the previous call. Edges faster than the
/// poll rate are missed.
#[derive(Debug)]
pub struct EdgeCapture {
    pins: EncoderPins,
    last: Option<(bool, bool)>,
}

impl EdgeCapture {
    /// Creates a detector; the first poll only records the initial levels.
    pub fn new(pins: EncoderPins) -> Self {
        Self { pins, last: None }
    }

    /// Samples both lines and records rising edges. Returns the edges found.
    pub fn poll<B: PortBus>(&mut self, bus: &mut B, ticks: &EncoderTicks) -> u32 {
        let left = bus.read_pin(self.pins.left);
        let right = bus.read_pin(self.pins.right);
        let mut edges = 0;
        if let Some((prev_left, prev_right)) = self.last {
            if left && !prev_left {
                ticks.record(Wheel::Left);
                edges += 1;
            }
            if right && !prev_right {
                ticks.record(Wheel::Right);
                edges += 1;
            }
        }
        self.last = Some((left, right));
        if edges > 0 {
            trace!("encoder: {edges} edge(s) captured");
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{mega2560, MockPortBus};

    #[test]
    fn drain_resets() {
        let ticks = EncoderTicks::new();
        let mut counter = EncoderCounter::new(&ticks);
        ticks.record_many(Wheel::Left, 5);
        ticks.record(Wheel::Right);

        assert_eq!(counter.drain(), WheelTicks::new(5, 1));
        assert_eq!(counter.drain(), WheelTicks::new(0, 0));
        assert_eq!(counter.drain(), WheelTicks::new(0, 0));
        assert_eq!(counter.totals(), (5, 1));
    }

    #[test]
    fn pending_does_not_consume() {
        let ticks = EncoderTicks::new();
        ticks.record(Wheel::Right);
        assert_eq!(ticks.pending(Wheel::Right), 1);
        assert_eq!(ticks.pending(Wheel::Right), 1);
        assert_eq!(ticks.drain(), (0, 1));
    }

    #[test]
    fn huge_counts_saturate() {
        let ticks = EncoderTicks::new();
        ticks.record_many(Wheel::Left, u32::MAX);
        let mut counter = EncoderCounter::new(&ticks);
        assert_eq!(counter.drain().left, i32::MAX);
    }

    #[test]
    fn edge_capture_counts_rising_edges() {
        let pins = mega2560::pin_map().encoders;
        let mut bus = MockPortBus::mega2560();
        let ticks = EncoderTicks::new();
        let mut capture = EdgeCapture::new(pins);

        // Initial high level is not an edge.
        bus.set_input_pin(pins.left, true);
        assert_eq!(capture.poll(&mut bus, &ticks), 0);

        for _ in 0..3 {
            bus.set_input_pin(pins.left, false);
            bus.set_input_pin(pins.right, false);
            capture.poll(&mut bus, &ticks);
            bus.set_input_pin(pins.left, true);
            bus.set_input_pin(pins.right, true);
            capture.poll(&mut bus, &ticks);
        }
        // Held high: no new edge.
        capture.poll(&mut bus, &ticks);

        assert_eq!(ticks.drain(), (3, 3));
    }

    #[cfg(feature = "std")]
    #[test]
    fn concurrent_recording_loses_nothing() {
        use std::sync::Arc;
        use std::thread;

        let ticks = Arc::new(EncoderTicks::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ticks = Arc::clone(&ticks);
                thread::spawn(move || {
                    let wheel = if i % 2 == 0 { Wheel::Left } else { Wheel::Right };
                    for _ in 0..10_000 {
                        ticks.record(wheel);
                    }
                })
            })
            .collect();

        let mut left = 0u64;
        let mut right = 0u64;
        let mut counter = EncoderCounter::new(&ticks);
        while handles.iter().any(|h| !h.is_finished()) {
            let t = counter.drain();
            left += t.left as u64;
            right += t.right as u64;
        }
        for h in handles {
            h.join().unwrap();
        }
        let t = counter.drain();
        left += t.left as u64;
        right += t.right as u64;

        assert_eq!((left, right), (20_000, 20_000));
    }
}
