//! Hardware abstraction traits for register-level I/O, sampled channels and time.
//!
//! This module defines the seams that let rover-io run against real
//! registers, `embedded-hal` pin banks, or the desktop mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`PortBus`] | Fixed-width digital ports with masked read-modify-write |
//! | [`SampleBus`] | Analog / RC-timed channels that may fail per read |
//! | [`Clock`] | Millisecond time source for frames and debounce |
//!
//! Blocking delays come from [`embedded_hal::delay::DelayNs`].
//!
//! # Example
//!
//! ```rust
//! use rover_io::hal::MockPortBus;
//! use rover_io::traits::{PortBus, PortId};
//!
//! let port = PortId(2);
//! let mut bus = MockPortBus::new().with_port(port, 8);
//!
//! bus.write(port, 0b0000_1111, 0xFF);
//! bus.write(port, 0b0000_0011, 0x00);
//! assert_eq!(bus.latch(port), 0b0000_1100);
//! ```

use crate::error::ChannelUnavailable;

/// Raw bit pattern of one port. Ports are at most 16 bits wide.
pub type Bits = u16;

/// Widest port a [`PortBus`] may report.
pub const MAX_PORT_WIDTH: u8 = 16;

/// Stable handle naming one fixed-width register on a [`PortBus`].
///
/// Handles are opaque to the core; the backend decides what each number
/// means (an AVR `PORTx`, a PWM compare register, a pin bank row).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortId(pub u8);

impl core::fmt::Display for PortId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "port#{}", self.0)
    }
}

/// One digital line: a single bit of a port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinAssignment {
    /// Port holding the line.
    pub port: PortId,
    /// Bit index within the port (0 = LSB).
    pub bit: u8,
}

impl PinAssignment {
    /// Creates a pin assignment.
    pub const fn new(port: PortId, bit: u8) -> Self {
        Self { port, bit }
    }

    /// Single-bit mask for this line.
    ///
    /// Bits beyond [`MAX_PORT_WIDTH`] yield an empty mask; configuration
    /// validation rejects such pins before they reach a driver.
    #[inline]
    pub const fn mask(&self) -> Bits {
        if self.bit < MAX_PORT_WIDTH {
            1 << self.bit
        } else {
            0
        }
    }
}

/// Electrical sense of a driven or sensed line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Polarity {
    /// Asserted when the line is high.
    #[default]
    ActiveHigh,
    /// Asserted when the line is low.
    ActiveLow,
}

impl Polarity {
    /// Electrical level that represents `asserted`.
    #[inline]
    pub const fn level(self, asserted: bool) -> bool {
        match self {
            Polarity::ActiveHigh => asserted,
            Polarity::ActiveLow => !asserted,
        }
    }

    /// Whether an observed electrical level means "asserted".
    #[inline]
    pub const fn is_asserted(self, level: bool) -> bool {
        self.level(level)
    }
}

/// Fixed-width digital I/O registers.
///
/// Implementors expose the pin levels (`read`), the output latch (`latch`)
/// and a raw latch store (`store`). The provided [`write`](Self::write) is
/// the only way drivers change outputs, so the masked read-modify-write
/// lives in exactly one place:
///
/// ```text
/// latch' = (latch & !mask) | (value & mask)
/// ```
///
/// # Implementation Notes
///
/// - `width` returns `None` for handles the backend does not know. Startup
///   validation uses it; drivers never see an unknown handle afterwards.
/// - An unknown handle reaching `read`/`latch`/`store` at runtime is a
///   programming error and may panic.
/// - Timing between stores is significant for the ADC handshake and the
///   capacitive cycle; backends must apply each store immediately.
pub trait PortBus {
    /// Width in bits of `port`, or `None` if the handle is unknown.
    fn width(&self, port: PortId) -> Option<u8>;

    /// Current electrical levels of the port's pins.
    fn read(&mut self, port: PortId) -> Bits;

    /// Current output latch of the port.
    fn latch(&self, port: PortId) -> Bits;

    /// Replaces the whole output latch.
    fn store(&mut self, port: PortId, bits: Bits);

    /// Sets the bits selected by `mask` to the matching bits of `value`,
    /// leaving every other latch bit unchanged.
    fn write(&mut self, port: PortId, mask: Bits, value: Bits) {
        let current = self.latch(port);
        self.store(port, (current & !mask) | (value & mask));
    }

    /// Drives every bit in `mask` high.
    fn set_bits(&mut self, port: PortId, mask: Bits) {
        self.write(port, mask, mask);
    }

    /// Drives every bit in `mask` low.
    fn clear_bits(&mut self, port: PortId, mask: Bits) {
        self.write(port, mask, 0);
    }

    /// Electrical level of a single line.
    fn read_pin(&mut self, pin: PinAssignment) -> bool {
        self.read(pin.port) & pin.mask() != 0
    }

    /// Drives a single line to `high`.
    fn write_pin(&mut self, pin: PinAssignment, high: bool) {
        let mask = pin.mask();
        self.write(pin.port, mask, if high { mask } else { 0 });
    }

    /// Asserts or de-asserts a line according to its polarity.
    fn assert_pin(&mut self, pin: PinAssignment, polarity: Polarity, asserted: bool) {
        self.write_pin(pin, polarity.level(asserted));
    }
}

/// How a [`SampleChannel`] is converted into a number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChannelKind {
    /// On-chip ADC input (`index` is the mux channel).
    Analog,
    /// RC-timed digital line (`index` is the board pin); the value is the
    /// discharge time in microseconds.
    Timed,
}

/// A sampled input line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleChannel {
    /// Conversion method.
    pub kind: ChannelKind,
    /// Channel or pin number, meaning depends on `kind`.
    pub index: u8,
}

impl SampleChannel {
    /// An on-chip analog input.
    pub const fn analog(index: u8) -> Self {
        Self {
            kind: ChannelKind::Analog,
            index,
        }
    }

    /// An RC-timed digital line.
    pub const fn timed(index: u8) -> Self {
        Self {
            kind: ChannelKind::Timed,
            index,
        }
    }
}

impl core::fmt::Display for SampleChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            ChannelKind::Analog => write!(f, "A{}", self.index),
            ChannelKind::Timed => write!(f, "D{}", self.index),
        }
    }
}

/// Per-channel sample source (reflectance sensors, capacitive sample line).
///
/// Unlike [`PortBus`], a single read may fail, e.g. an RC-timed sensor that
/// never discharges or an ADC conversion that reports a fault.
pub trait SampleBus {
    /// Reads one sample from `channel`.
    fn sample(&mut self, channel: SampleChannel) -> Result<u16, ChannelUnavailable>;
}

/// Direction of wheel travel.
///
/// # Default
///
/// Defaults to [`Stopped`](Self::Stopped).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Driving forward.
    Forward,
    /// Driving in reverse.
    Reverse,
    /// No drive applied.
    #[default]
    Stopped,
}

impl Direction {
    /// Returns the direction as a lowercase string.
    ///
    /// ```
    /// use rover_io::Direction;
    ///
    /// assert_eq!(Direction::Forward.as_str(), "forward");
    /// assert_eq!(Direction::Stopped.as_str(), "stopped");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Stopped => "stopped",
        }
    }

    /// Direction implied by a signed speed.
    pub fn from_speed(speed: f32) -> Self {
        if speed > 0.0 {
            Direction::Forward
        } else if speed < 0.0 {
            Direction::Reverse
        } else {
            Direction::Stopped
        }
    }

    /// `+1`, `-1` or `0`.
    #[inline]
    pub const fn sign(&self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
            Direction::Stopped => 0,
        }
    }
}

/// Time source trait for `no_std` compatibility.
///
/// Provides monotonic time in milliseconds for frame timestamps and
/// debounce windows.
///
/// # Example
///
/// ```rust
/// use rover_io::traits::Clock;
/// use rover_io::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RegisterFile {
        latch: [Bits; 4],
        stores: usize,
    }

    impl RegisterFile {
        fn new() -> Self {
            Self {
                latch: [0; 4],
                stores: 0,
            }
        }
    }

    impl PortBus for RegisterFile {
        fn width(&self, port: PortId) -> Option<u8> {
            (usize::from(port.0) < self.latch.len()).then_some(8)
        }

        fn read(&mut self, port: PortId) -> Bits {
            self.latch[usize::from(port.0)]
        }

        fn latch(&self, port: PortId) -> Bits {
            self.latch[usize::from(port.0)]
        }

        fn store(&mut self, port: PortId, bits: Bits) {
            self.latch[usize::from(port.0)] = bits;
            self.stores += 1;
        }
    }

    // =========================================================================
    // PortBus Default Methods Tests
    // =========================================================================

    #[test]
    fn write_only_touches_masked_bits() {
        let mut bus = RegisterFile::new();
        bus.latch[1] = 0b1010_1010;

        bus.write(PortId(1), 0b0000_1111, 0b0101_0101);

        assert_eq!(bus.latch[1], 0b1010_0101);
    }

    #[test]
    fn set_and_clear_bits() {
        let mut bus = RegisterFile::new();
        bus.set_bits(PortId(0), 0b1100_0000);
        assert_eq!(bus.latch[0], 0b1100_0000);

        bus.clear_bits(PortId(0), 0b0100_0000);
        assert_eq!(bus.latch[0], 0b1000_0000);
    }

    #[test]
    fn write_pin_and_read_pin() {
        let mut bus = RegisterFile::new();
        let pin = PinAssignment::new(PortId(2), 5);

        bus.write_pin(pin, true);
        assert!(bus.read_pin(pin));
        assert_eq!(bus.latch[2], 0b0010_0000);

        bus.write_pin(pin, false);
        assert!(!bus.read_pin(pin));
    }

    #[test]
    fn assert_pin_honours_polarity() {
        let mut bus = RegisterFile::new();
        let pin = PinAssignment::new(PortId(3), 7);

        bus.assert_pin(pin, Polarity::ActiveLow, true);
        assert_eq!(bus.latch[3], 0);

        bus.assert_pin(pin, Polarity::ActiveLow, false);
        assert_eq!(bus.latch[3], 0b1000_0000);
    }

    #[test]
    fn repeated_identical_writes_still_store() {
        let mut bus = RegisterFile::new();
        bus.write(PortId(0), 0x01, 0x01);
        bus.write(PortId(0), 0x01, 0x01);
        assert_eq!(bus.stores, 2);
        assert_eq!(bus.latch[0], 0x01);
    }

    // =========================================================================
    // Line Type Tests
    // =========================================================================

    #[test]
    fn pin_mask() {
        assert_eq!(PinAssignment::new(PortId(0), 0).mask(), 0x0001);
        assert_eq!(PinAssignment::new(PortId(0), 15).mask(), 0x8000);
        assert_eq!(PinAssignment::new(PortId(0), 16).mask(), 0);
    }

    #[test]
    fn polarity_levels() {
        assert!(Polarity::ActiveHigh.level(true));
        assert!(!Polarity::ActiveHigh.level(false));
        assert!(!Polarity::ActiveLow.level(true));
        assert!(Polarity::ActiveLow.is_asserted(false));
    }

    #[test]
    fn sample_channel_display() {
        assert_eq!(format!("{}", SampleChannel::analog(15)), "A15");
        assert_eq!(format!("{}", SampleChannel::timed(51)), "D51");
    }

    // =========================================================================
    // Direction Tests
    // =========================================================================

    #[test]
    fn direction_default() {
        assert_eq!(Direction::default(), Direction::Stopped);
    }

    #[test]
    fn direction_from_speed() {
        assert_eq!(Direction::from_speed(0.4), Direction::Forward);
        assert_eq!(Direction::from_speed(-0.1), Direction::Reverse);
        assert_eq!(Direction::from_speed(0.0), Direction::Stopped);
        assert_eq!(Direction::from_speed(f32::NAN), Direction::Stopped);
    }

    #[test]
    fn direction_sign() {
        assert_eq!(Direction::Forward.sign(), 1);
        assert_eq!(Direction::Reverse.sign(), -1);
        assert_eq!(Direction::Stopped.sign(), 0);
    }
}
