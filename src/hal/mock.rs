//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the bus and timing traits so the
//! handshake, charge-time and debounce logic can be exercised on desktop.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockPortBus`] | [`PortBus`] | Register file with scripted inputs and an event log |
//! | [`MockSampleBus`] | [`SampleBus`] | Fixed, failing, or time-driven channels |
//! | [`MockDelay`] | [`DelayNs`] | Advances a shared [`MockTimeline`] instead of sleeping |
//! | [`MockClock`] | [`Clock`] | Controllable millisecond clock |
//!
//! # Example
//!
//! ```rust
//! use rover_io::hal::{MockPortBus, BusEvent};
//! use rover_io::traits::{PinAssignment, PortBus, PortId};
//!
//! let port = PortId(0);
//! let mut bus = MockPortBus::new().with_port(port, 8);
//! bus.queue_reads(port, &[0x01, 0x02]);
//!
//! assert_eq!(bus.read(port), 0x01);
//! assert_eq!(bus.read(port), 0x02);
//! assert_eq!(bus.read(port), 0x00); // falls back to the static input
//!
//! bus.write_pin(PinAssignment::new(port, 3), true);
//! assert_eq!(bus.events.last(), Some(&BusEvent::Store { port, value: 0x08 }));
//! ```
//!
//! [`PortBus`]: crate::traits::PortBus
//! [`SampleBus`]: crate::traits::SampleBus
//! [`Clock`]: crate::traits::Clock

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;

use embedded_hal::delay::DelayNs;

use crate::error::ChannelUnavailable;
use crate::traits::{Bits, Clock, PinAssignment, PortBus, PortId, SampleBus, SampleChannel};

// ============================================================================
// Port Bus Mock
// ============================================================================

/// One observable bus operation, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// `read` returned `value`.
    Read {
        /// Port read.
        port: PortId,
        /// Pin levels returned.
        value: Bits,
    },
    /// The output latch became `value`.
    Store {
        /// Port written.
        port: PortId,
        /// New latch.
        value: Bits,
    },
}

#[derive(Debug)]
struct MockPort {
    id: PortId,
    width: u8,
    latch: Bits,
    input: Bits,
    outputs: Bits,
    scripted: VecDeque<Bits>,
}

impl MockPort {
    fn width_mask(&self) -> Bits {
        if self.width >= 16 {
            Bits::MAX
        } else {
            (1 << self.width) - 1
        }
    }
}

/// Input change applied whenever a store leaves `pin` at `level`.
#[derive(Debug, Clone, Copy)]
struct StoreTrigger {
    pin: PinAssignment,
    level: bool,
    target: PortId,
    input: Bits,
}

/// Mock register file.
///
/// Each port has an output latch, externally driven input levels and an
/// output-direction mask. `read` returns latch bits for outputs and input
/// bits elsewhere. Scripted values queued with
/// [`queue_reads`](Self::queue_reads) replace the input levels for one read
/// each. Store triggers model a chip reacting to a strobe, e.g. a data bus
/// that only becomes valid while RD is asserted.
///
/// Unknown ports panic, mirroring the "fatal at runtime" contract.
#[derive(Debug, Default)]
pub struct MockPortBus {
    ports: Vec<MockPort>,
    triggers: Vec<StoreTrigger>,
    /// Every read and store, in order.
    pub events: Vec<BusEvent>,
}

impl MockPortBus {
    /// Creates a bus with no ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a port of the given width (all bits inputs, everything low).
    pub fn with_port(mut self, port: PortId, width: u8) -> Self {
        self.ports.retain(|p| p.id != port);
        self.ports.push(MockPort {
            id: port,
            width,
            latch: 0,
            input: 0,
            outputs: 0,
            scripted: VecDeque::new(),
        });
        self
    }

    /// A bus with every ATmega2560 port and PWM register of the robot board,
    /// output directions set per the manifest.
    pub fn mega2560() -> Self {
        use super::mega2560::{output_masks, ports};

        let mut bus = ports::DIGITAL
            .iter()
            .chain(ports::PWM.iter())
            .fold(Self::new(), |bus, &(port, width)| bus.with_port(port, width));
        for (port, mask) in output_masks() {
            bus = bus.with_outputs(port, mask);
        }
        for &(port, _) in ports::PWM.iter() {
            bus = bus.with_outputs(port, 0xFF);
        }
        bus
    }

    /// Marks the bits in `mask` as outputs: reads return their latch value.
    pub fn with_outputs(mut self, port: PortId, mask: Bits) -> Self {
        self.port_mut(port).outputs |= mask;
        self
    }

    /// Sets the externally driven levels of a port.
    pub fn set_input(&mut self, port: PortId, bits: Bits) {
        let p = self.port_mut(port);
        p.input = bits & p.width_mask();
    }

    /// Drives a single input line.
    pub fn set_input_pin(&mut self, pin: PinAssignment, high: bool) {
        let p = self.port_mut(pin.port);
        if high {
            p.input |= pin.mask();
        } else {
            p.input &= !pin.mask();
        }
    }

    /// Queues values returned by the next reads of `port`, one per read.
    pub fn queue_reads(&mut self, port: PortId, values: &[Bits]) {
        self.port_mut(port).scripted.extend(values.iter().copied());
    }

    /// After any store that leaves `pin` at `level`, set `target`'s input
    /// levels to `input`.
    pub fn on_store(&mut self, pin: PinAssignment, level: bool, target: PortId, input: Bits) {
        self.triggers.push(StoreTrigger {
            pin,
            level,
            target,
            input,
        });
    }

    /// Current output latch without logging a read.
    pub fn latch_of(&self, port: PortId) -> Bits {
        self.port(port).latch
    }

    /// Level of a single latch bit.
    pub fn latch_pin(&self, pin: PinAssignment) -> bool {
        self.port(pin.port).latch & pin.mask() != 0
    }

    /// All latch values stored to `port`, in order.
    pub fn stores_to(&self, port: PortId) -> Vec<Bits> {
        self.events
            .iter()
            .filter_map(|e| match *e {
                BusEvent::Store { port: p, value } if p == port => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Number of reads of `port`.
    pub fn reads_of(&self, port: PortId) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BusEvent::Read { port: p, .. } if *p == port))
            .count()
    }

    /// Forgets the event log.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn port(&self, port: PortId) -> &MockPort {
        match self.ports.iter().find(|p| p.id == port) {
            Some(p) => p,
            None => panic!("mock bus has no {port}"),
        }
    }

    fn port_mut(&mut self, port: PortId) -> &mut MockPort {
        match self.ports.iter_mut().find(|p| p.id == port) {
            Some(p) => p,
            None => panic!("mock bus has no {port}"),
        }
    }
}

impl PortBus for MockPortBus {
    fn width(&self, port: PortId) -> Option<u8> {
        self.ports.iter().find(|p| p.id == port).map(|p| p.width)
    }

    fn read(&mut self, port: PortId) -> Bits {
        let p = self.port_mut(port);
        let input = p.scripted.pop_front().unwrap_or(p.input);
        let value = ((p.latch & p.outputs) | (input & !p.outputs)) & p.width_mask();
        self.events.push(BusEvent::Read { port, value });
        value
    }

    fn latch(&self, port: PortId) -> Bits {
        self.port(port).latch
    }

    fn store(&mut self, port: PortId, bits: Bits) {
        let p = self.port_mut(port);
        p.latch = bits & p.width_mask();
        let value = p.latch;
        self.events.push(BusEvent::Store { port, value });

        let fired: Vec<StoreTrigger> = self
            .triggers
            .iter()
            .filter(|t| t.pin.port == port && ((value & t.pin.mask() != 0) == t.level))
            .copied()
            .collect();
        for t in fired {
            self.set_input(t.target, t.input);
        }
    }
}

// ============================================================================
// Timing Mocks
// ============================================================================

/// Shared simulated time in nanoseconds.
///
/// Clones observe the same instant, so a [`MockDelay`] can advance the time a
/// [`MockSampleBus`] curve is evaluated at.
#[derive(Debug, Clone, Default)]
pub struct MockTimeline(Rc<Cell<u64>>);

impl MockTimeline {
    /// Creates a timeline at t = 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in nanoseconds.
    pub fn now_ns(&self) -> u64 {
        self.0.get()
    }

    /// Current time in whole microseconds.
    pub fn now_us(&self) -> u64 {
        self.0.get() / 1_000
    }

    /// Moves time forward.
    pub fn advance_ns(&self, ns: u64) {
        self.0.set(self.0.get() + ns);
    }
}

impl Clock for MockTimeline {
    fn now_ms(&self) -> u64 {
        self.0.get() / 1_000_000
    }
}

/// Delay that advances a [`MockTimeline`] instead of blocking.
///
/// # Example
///
/// ```rust
/// use embedded_hal::delay::DelayNs;
/// use rover_io::hal::MockDelay;
///
/// let mut delay = MockDelay::new();
/// delay.delay_us(5);
/// delay.delay_ns(250);
/// assert_eq!(delay.timeline().now_ns(), 5_250);
/// assert_eq!(delay.calls, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    timeline: MockTimeline,
    /// Number of `delay_ns` calls.
    pub calls: usize,
}

impl MockDelay {
    /// Creates a delay on a fresh timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a delay driving an existing timeline.
    pub fn on(timeline: MockTimeline) -> Self {
        Self { timeline, calls: 0 }
    }

    /// Handle to the driven timeline.
    pub fn timeline(&self) -> MockTimeline {
        self.timeline.clone()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.timeline.advance_ns(u64::from(ns));
    }
}

/// Mock clock for testing.
///
/// Provides a controllable time source for testing time-dependent behavior.
///
/// # Example
///
/// ```rust
/// use rover_io::hal::MockClock;
/// use rover_io::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self { current_ms: 0 }
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the given duration.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}

// ============================================================================
// Sample Bus Mock
// ============================================================================

type Curve = Box<dyn FnMut(u64) -> u16>;

enum Behavior {
    Fixed(u16),
    Unavailable,
    Curve(Curve),
}

/// Mock sampled channels.
///
/// Channels that were never configured read as unavailable. Curves receive
/// the current [`MockTimeline`] time in microseconds.
///
/// # Example
///
/// ```rust
/// use rover_io::hal::MockSampleBus;
/// use rover_io::traits::{SampleBus, SampleChannel};
///
/// let mut bus = MockSampleBus::new();
/// bus.set(SampleChannel::timed(51), 1000);
/// bus.set_unavailable(SampleChannel::timed(12));
///
/// assert_eq!(bus.sample(SampleChannel::timed(51)), Ok(1000));
/// assert!(bus.sample(SampleChannel::timed(12)).is_err());
/// assert!(bus.sample(SampleChannel::analog(3)).is_err());
/// assert_eq!(bus.reads.len(), 3);
/// ```
#[derive(Default)]
pub struct MockSampleBus {
    channels: Vec<(SampleChannel, Behavior)>,
    timeline: MockTimeline,
    /// Every channel sampled, in order.
    pub reads: Vec<SampleChannel>,
}

impl core::fmt::Debug for MockSampleBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MockSampleBus")
            .field("channels", &self.channels.len())
            .field("reads", &self.reads)
            .finish()
    }
}

impl MockSampleBus {
    /// Creates a bus with no configured channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates curves against `timeline`.
    pub fn with_timeline(mut self, timeline: MockTimeline) -> Self {
        self.timeline = timeline;
        self
    }

    /// Channel always returns `value`.
    pub fn set(&mut self, channel: SampleChannel, value: u16) {
        self.replace(channel, Behavior::Fixed(value));
    }

    /// Channel always fails.
    pub fn set_unavailable(&mut self, channel: SampleChannel) {
        self.replace(channel, Behavior::Unavailable);
    }

    /// Channel returns `curve(now_us)`.
    pub fn set_curve(&mut self, channel: SampleChannel, curve: impl FnMut(u64) -> u16 + 'static) {
        self.replace(channel, Behavior::Curve(Box::new(curve)));
    }

    /// Channel follows an RC charge curve `full_scale * (1 - e^-(t-start)/tau)`.
    ///
    /// Reads before `start_us` return 0.
    #[cfg(feature = "std")]
    pub fn set_rc_curve(&mut self, channel: SampleChannel, start_us: u64, tau_us: f32, full_scale: u16) {
        self.set_curve(channel, move |now_us| {
            if now_us < start_us {
                return 0;
            }
            let t = (now_us - start_us) as f32;
            let v = f32::from(full_scale) * (1.0 - (-t / tau_us).exp());
            v as u16
        });
    }

    fn replace(&mut self, channel: SampleChannel, behavior: Behavior) {
        self.channels.retain(|(c, _)| *c != channel);
        self.channels.push((channel, behavior));
    }
}

impl SampleBus for MockSampleBus {
    fn sample(&mut self, channel: SampleChannel) -> Result<u16, ChannelUnavailable> {
        self.reads.push(channel);
        let now_us = self.timeline.now_us();
        match self.channels.iter_mut().find(|(c, _)| *c == channel) {
            Some((_, Behavior::Fixed(v))) => Ok(*v),
            Some((_, Behavior::Curve(f))) => Ok(f(now_us)),
            Some((_, Behavior::Unavailable)) | None => Err(ChannelUnavailable { channel }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PortId = PortId(7);

    #[test]
    fn read_mixes_outputs_and_inputs() {
        let mut bus = MockPortBus::new().with_port(P, 8).with_outputs(P, 0x0F);
        bus.store(P, 0xFF);
        bus.set_input(P, 0xA0);
        assert_eq!(bus.read(P), 0xAF);
    }

    #[test]
    fn store_is_masked_to_width() {
        let mut bus = MockPortBus::new().with_port(P, 6);
        bus.store(P, 0xFF);
        assert_eq!(bus.latch_of(P), 0x3F);
    }

    #[test]
    fn trigger_fires_on_matching_level() {
        let strobe = PinAssignment::new(P, 7);
        let data = PortId(8);
        let mut bus = MockPortBus::new().with_port(P, 8).with_port(data, 8);
        bus.on_store(strobe, false, data, 0x5A);

        bus.write_pin(strobe, true);
        assert_eq!(bus.read(data), 0x00);

        bus.write_pin(strobe, false);
        assert_eq!(bus.read(data), 0x5A);
    }

    #[test]
    fn event_log_and_helpers() {
        let mut bus = MockPortBus::new().with_port(P, 8);
        bus.write(P, 0x01, 0x01);
        bus.write(P, 0x02, 0x02);
        bus.read(P);
        assert_eq!(bus.stores_to(P), vec![0x01, 0x03]);
        assert_eq!(bus.reads_of(P), 1);

        bus.clear_events();
        assert!(bus.events.is_empty());
    }

    #[test]
    #[should_panic(expected = "mock bus has no")]
    fn unknown_port_panics() {
        let mut bus = MockPortBus::new();
        bus.read(PortId(1));
    }

    #[test]
    fn curve_follows_timeline() {
        let timeline = MockTimeline::new();
        let mut delay = MockDelay::on(timeline.clone());
        let ch = SampleChannel::analog(0);
        let mut bus = MockSampleBus::new().with_timeline(timeline);
        bus.set_curve(ch, |t| t as u16);

        assert_eq!(bus.sample(ch), Ok(0));
        delay.delay_us(42);
        assert_eq!(bus.sample(ch), Ok(42));
    }

    #[cfg(feature = "std")]
    #[test]
    fn rc_curve_rises_monotonically() {
        let timeline = MockTimeline::new();
        let mut delay = MockDelay::on(timeline.clone());
        let ch = SampleChannel::analog(15);
        let mut bus = MockSampleBus::new().with_timeline(timeline);
        bus.set_rc_curve(ch, 0, 100.0, 1023);

        let mut last = 0;
        for _ in 0..10 {
            delay.delay_us(50);
            let v = bus.sample(ch).unwrap();
            assert!(v >= last);
            last = v;
        }
        assert!(last > 1000);
    }

    #[test]
    fn timeline_clock() {
        let timeline = MockTimeline::new();
        timeline.advance_ns(3_500_000);
        assert_eq!(timeline.now_ms(), 3);
        assert_eq!(timeline.now_us(), 3_500);
    }
}
