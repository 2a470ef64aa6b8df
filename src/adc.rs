//! Waveform ADC driver: RD/INT/CS handshake against a parallel 8-bit converter.
//!
//! # Protocol
//!
//! ```text
//! IDLE → ASSERT_CS → AWAIT_CONVERSION → ASSERT_RD → DEASSERT_RD → DEASSERT_CS → IDLE
//!                          │
//!                          └─ INT not asserted within budget → ConversionTimeout
//! ```
//!
//! The data bus is latched while RD is asserted, after the configured access
//! time. CS and RD are released on every exit path, including unwinding, by
//! the handshake guard.
//!
//! # Example
//!
//! ```rust
//! use rover_io::adc::WaveformAdcDriver;
//! use rover_io::config::AdcConfig;
//! use rover_io::hal::{mega2560, MockDelay, MockPortBus};
//!
//! let pins = mega2560::pin_map().adc;
//! let mut bus = MockPortBus::mega2560();
//! let mut delay = MockDelay::new();
//! let mut adc = WaveformAdcDriver::new(pins, AdcConfig::default());
//! adc.init(&mut bus);
//!
//! // INT reads low (asserted) immediately; data bus reads 0x2A.
//! bus.set_input(pins.data.port, 0x2A);
//! assert_eq!(adc.read_sample(&mut bus, &mut delay), Ok(0x2A));
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::config::{AdcConfig, AdcPins};
use crate::error::ConversionTimeout;
use crate::traits::PortBus;

/// Position in the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AdcHandshakeState {
    /// No handshake in flight; CS and RD released.
    #[default]
    Idle,
    /// Chip select being asserted.
    AssertCs,
    /// Polling INT for end of conversion.
    AwaitConversion,
    /// RD asserted, data bus being latched.
    AssertRd,
    /// Releasing RD.
    DeassertRd,
    /// Releasing CS.
    DeassertCs,
}

/// Running totals since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdcStats {
    /// Completed handshakes.
    pub conversions: u32,
    /// Handshakes abandoned on timeout.
    pub timeouts: u32,
}

/// Driver for the external parallel ADC.
///
/// One instance per converter. `&mut self` on [`read_sample`] keeps a
/// second handshake from starting while one is in flight.
///
/// [`read_sample`]: Self::read_sample
#[derive(Debug)]
pub struct WaveformAdcDriver {
    pins: AdcPins,
    config: AdcConfig,
    state: AdcHandshakeState,
    stats: AdcStats,
}

impl WaveformAdcDriver {
    /// Creates a driver. Call [`init`](Self::init) before the first sample.
    pub fn new(pins: AdcPins, config: AdcConfig) -> Self {
        Self {
            pins,
            config,
            state: AdcHandshakeState::Idle,
            stats: AdcStats::default(),
        }
    }

    /// Releases CS and RD so the converter starts in a known state.
    pub fn init<B: PortBus>(&mut self, bus: &mut B) {
        bus.assert_pin(self.pins.rd, self.config.rd_polarity, false);
        bus.assert_pin(self.pins.cs, self.config.cs_polarity, false);
        self.state = AdcHandshakeState::Idle;
    }

    /// Current handshake state. Always `Idle` between calls.
    #[inline]
    pub fn state(&self) -> AdcHandshakeState {
        self.state
    }

    /// Conversion and timeout counters.
    #[inline]
    pub fn stats(&self) -> AdcStats {
        self.stats
    }

    /// Runs one complete handshake and returns the latched sample.
    ///
    /// # Errors
    ///
    /// [`ConversionTimeout`] if INT does not assert within the configured
    /// budget. CS and RD are released before returning.
    pub fn read_sample<B: PortBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
    ) -> Result<u8, ConversionTimeout> {
        let interval = self.config.poll_interval_us.max(1);
        let timeout = self.config.conversion_timeout_us;

        self.state = AdcHandshakeState::AssertCs;
        let mut handshake = Handshake::begin(bus, self.pins, self.config);

        // Poll at t=0, after every interval, and once more at the timeout.
        self.state = AdcHandshakeState::AwaitConversion;
        let mut polls = 0;
        let mut waited = 0u32;
        loop {
            polls += 1;
            if handshake.conversion_done() {
                break;
            }
            if waited >= timeout {
                drop(handshake);
                self.state = AdcHandshakeState::Idle;
                self.stats.timeouts = self.stats.timeouts.wrapping_add(1);
                warn!("waveform adc: INT not asserted after {waited}us ({polls} polls)");
                return Err(ConversionTimeout { polls });
            }
            let step = interval.min(timeout - waited);
            delay.delay_us(step);
            waited += step;
        }

        self.state = AdcHandshakeState::AssertRd;
        handshake.assert_rd();
        delay.delay_ns(self.config.data_access_ns);
        let sample = handshake.latch_data();

        self.state = AdcHandshakeState::DeassertRd;
        handshake.release_rd();

        self.state = AdcHandshakeState::DeassertCs;
        handshake.finish();

        self.state = AdcHandshakeState::Idle;
        self.stats.conversions = self.stats.conversions.wrapping_add(1);
        debug!("waveform adc: sample {sample} after {polls} polls");
        Ok(sample)
    }
}

/// Bus borrow for the duration of one handshake; releases RD and CS on drop.
struct Handshake<'b, B: PortBus> {
    bus: &'b mut B,
    pins: AdcPins,
    config: AdcConfig,
    finished: bool,
}

impl<'b, B: PortBus> Handshake<'b, B> {
    fn begin(bus: &'b mut B, pins: AdcPins, config: AdcConfig) -> Self {
        bus.assert_pin(pins.cs, config.cs_polarity, true);
        Self {
            bus,
            pins,
            config,
            finished: false,
        }
    }

    fn conversion_done(&mut self) -> bool {
        let level = self.bus.read_pin(self.pins.int);
        self.config.int_polarity.is_asserted(level)
    }

    fn assert_rd(&mut self) {
        self.bus
            .assert_pin(self.pins.rd, self.config.rd_polarity, true);
    }

    fn latch_data(&mut self) -> u8 {
        let raw = self.bus.read(self.pins.data.port);
        // Data mask is validated to at most 8 contiguous bits.
        self.pins.data.extract(raw) as u8
    }

    fn release_rd(&mut self) {
        self.bus
            .assert_pin(self.pins.rd, self.config.rd_polarity, false);
    }

    fn finish(mut self) {
        self.bus
            .assert_pin(self.pins.cs, self.config.cs_polarity, false);
        self.finished = true;
    }
}

impl<B: PortBus> Drop for Handshake<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            self.bus
                .assert_pin(self.pins.rd, self.config.rd_polarity, false);
            self.bus
                .assert_pin(self.pins.cs, self.config.cs_polarity, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{mega2560, BusEvent, MockDelay, MockPortBus};

    fn setup() -> (WaveformAdcDriver, AdcPins, MockPortBus, MockDelay) {
        let pins = mega2560::pin_map().adc;
        let mut bus = MockPortBus::mega2560();
        let mut adc = WaveformAdcDriver::new(pins, AdcConfig::default());
        adc.init(&mut bus);
        (adc, pins, bus, MockDelay::new())
    }

    #[test]
    fn init_releases_lines() {
        let (_, pins, bus, _) = setup();
        // Active low: released = high.
        assert!(bus.latch_pin(pins.cs));
        assert!(bus.latch_pin(pins.rd));
    }

    #[test]
    fn sample_latched_inside_rd_window() {
        let (mut adc, pins, mut bus, mut delay) = setup();
        // Bus only carries data while RD is low.
        bus.set_input(pins.data.port, 0xEE);
        bus.on_store(pins.rd, false, pins.data.port, 0b1011_0010);
        bus.on_store(pins.rd, true, pins.data.port, 0xEE);
        bus.clear_events();

        assert_eq!(adc.read_sample(&mut bus, &mut delay), Ok(178));

        let rd_mask = pins.rd.mask();
        let ctrl = pins.rd.port;
        let rd_low = bus
            .events
            .iter()
            .position(|e| matches!(e, BusEvent::Store { port, value } if *port == ctrl && value & rd_mask == 0))
            .unwrap();
        let data_read = bus
            .events
            .iter()
            .position(|e| matches!(e, BusEvent::Read { port, .. } if *port == pins.data.port))
            .unwrap();
        let rd_high = bus
            .events
            .iter()
            .rposition(|e| matches!(e, BusEvent::Store { port, value } if *port == ctrl && value & rd_mask != 0))
            .unwrap();
        assert!(rd_low < data_read);
        assert!(data_read < rd_high);
    }

    #[test]
    fn timeout_releases_lines_and_returns_idle() {
        let (mut adc, pins, mut bus, mut delay) = setup();
        bus.set_input_pin(pins.int, true); // never asserted

        let err = adc.read_sample(&mut bus, &mut delay).unwrap_err();
        assert_eq!(err.polls, AdcConfig::default().poll_budget());
        assert_eq!(adc.state(), AdcHandshakeState::Idle);
        assert!(bus.latch_pin(pins.cs));
        assert!(bus.latch_pin(pins.rd));
        assert_eq!(adc.stats().timeouts, 1);
        assert_eq!(adc.stats().conversions, 0);
    }

    #[test]
    fn timeout_never_strobes_rd() {
        let (mut adc, pins, mut bus, mut delay) = setup();
        bus.set_input_pin(pins.int, true);
        bus.clear_events();

        let _ = adc.read_sample(&mut bus, &mut delay);

        assert!(bus
            .stores_to(pins.rd.port)
            .iter()
            .all(|latch| latch & pins.rd.mask() != 0));
        assert_eq!(bus.reads_of(pins.data.port), 0);
    }

    #[test]
    fn poll_interval_drives_delay() {
        let pins = mega2560::pin_map().adc;
        let mut bus = MockPortBus::mega2560();
        let mut delay = MockDelay::new();
        let config = AdcConfig::default()
            .with_poll_interval_us(5)
            .with_conversion_timeout_us(15)
            .with_data_access_ns(0);
        let mut adc = WaveformAdcDriver::new(pins, config);
        adc.init(&mut bus);
        bus.set_input_pin(pins.int, true);

        assert_eq!(
            adc.read_sample(&mut bus, &mut delay),
            Err(ConversionTimeout { polls: 4 })
        );
        // Polls at 0, 5, 10 and 15: the whole timeout is waited out.
        assert_eq!(delay.timeline().now_us(), 15);
    }

    #[test]
    fn int_asserted_at_timeout_is_not_a_timeout() {
        let pins = mega2560::pin_map().adc;
        let mut bus = MockPortBus::mega2560();
        let mut delay = MockDelay::new();
        let config = AdcConfig::default()
            .with_poll_interval_us(5)
            .with_conversion_timeout_us(15);
        let mut adc = WaveformAdcDriver::new(pins, config);
        adc.init(&mut bus);
        let busy = pins.int.mask();
        bus.queue_reads(pins.int.port, &[busy, busy, busy]);
        bus.set_input_pin(pins.int, false);
        bus.set_input(pins.data.port, 0x5A);

        assert_eq!(adc.read_sample(&mut bus, &mut delay), Ok(0x5A));
        assert_eq!(delay.timeline().now_us(), 15);
    }

    #[test]
    fn last_wait_is_clamped_to_timeout() {
        let pins = mega2560::pin_map().adc;
        let mut bus = MockPortBus::mega2560();
        let mut delay = MockDelay::new();
        let config = AdcConfig::default()
            .with_poll_interval_us(4)
            .with_conversion_timeout_us(10)
            .with_data_access_ns(0);
        let mut adc = WaveformAdcDriver::new(pins, config);
        adc.init(&mut bus);
        bus.set_input_pin(pins.int, true);

        // Polls at 0, 4, 8 and 10.
        assert_eq!(
            adc.read_sample(&mut bus, &mut delay),
            Err(ConversionTimeout { polls: 4 })
        );
        assert_eq!(delay.timeline().now_us(), 10);
        assert_eq!(config.poll_budget(), 4);
    }

    #[test]
    fn active_high_polarity() {
        use crate::traits::Polarity;

        let pins = mega2560::pin_map().adc;
        let mut bus = MockPortBus::mega2560();
        let mut delay = MockDelay::new();
        let mut adc =
            WaveformAdcDriver::new(pins, AdcConfig::default().with_polarity(Polarity::ActiveHigh));
        adc.init(&mut bus);
        assert!(!bus.latch_pin(pins.cs));

        bus.set_input_pin(pins.int, true);
        bus.set_input(pins.data.port, 7);
        assert_eq!(adc.read_sample(&mut bus, &mut delay), Ok(7));
        assert!(!bus.latch_pin(pins.cs));
        assert!(!bus.latch_pin(pins.rd));
    }
}
