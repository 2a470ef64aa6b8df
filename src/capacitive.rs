//! Capacitive contact detection by charge-time measurement.
//!
//! A cycle discharges the sense capacitor, releases it, starts charging
//! through the sense electrode and steps the sample line until it reaches
//! the threshold. A touching finger (or obstacle) adds capacitance and
//! changes the time to threshold; charge times strictly below
//! `contact_below_us` are reported as contact.
//!
//! ```text
//! IDLE → DISCHARGE (settle_us) → CHARGE → SAMPLE ─┬─ sample ≥ threshold → reading
//!                                                 └─ timeout_us elapsed → timed-out reading
//! ```
//!
//! Elapsed time is the sum of the delay steps taken, so a cycle is bounded
//! by `timeout_us` even when the sample line never moves.

use embedded_hal::delay::DelayNs;
use log::{trace, warn};

use crate::config::{CapacitiveConfig, CapacitivePins};
use crate::traits::{PinAssignment, Polarity, PortBus, SampleBus};

/// Position in the measurement cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CapacitiveCycleState {
    /// Both lines released.
    #[default]
    Idle,
    /// Capacitor shorted for the settle interval.
    Discharge,
    /// Charge line asserted, timing started.
    Charge,
    /// Stepping the sample line.
    Sample,
}

/// Result of one measurement cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContactReading {
    /// Contact verdict.
    pub contact: bool,
    /// Measured charge time; `timeout_us` when the cycle timed out.
    pub charge_time_us: u32,
    /// The sample line never reached the threshold.
    pub timed_out: bool,
}

impl ContactReading {
    fn timed_out(timeout_us: u32) -> Self {
        Self {
            contact: false,
            charge_time_us: timeout_us,
            timed_out: true,
        }
    }
}

/// Charge/discharge contact sensor on one capacitive triplet.
#[derive(Debug)]
pub struct CapacitiveHitSensor {
    pins: CapacitivePins,
    config: CapacitiveConfig,
    state: CapacitiveCycleState,
}

impl CapacitiveHitSensor {
    /// Creates a sensor. Call [`init`](Self::init) before the first cycle.
    pub fn new(pins: CapacitivePins, config: CapacitiveConfig) -> Self {
        Self {
            pins,
            config,
            state: CapacitiveCycleState::Idle,
        }
    }

    /// Releases both the charge and discharge lines.
    pub fn init<B: PortBus>(&mut self, bus: &mut B) {
        bus.assert_pin(self.pins.charge, self.config.charge_polarity, false);
        bus.assert_pin(self.pins.discharge, self.config.discharge_polarity, false);
        self.state = CapacitiveCycleState::Idle;
    }

    /// Current cycle state. Always `Idle` between calls.
    #[inline]
    pub fn state(&self) -> CapacitiveCycleState {
        self.state
    }

    /// Runs one complete discharge/charge/sample cycle.
    ///
    /// Never fails: a timeout is a valid no-contact reading, and a sample
    /// line that cannot be read is reported the same way.
    pub fn measure<B, S, D>(&mut self, bus: &mut B, samples: &mut S, delay: &mut D) -> ContactReading
    where
        B: PortBus,
        S: SampleBus,
        D: DelayNs,
    {
        let cfg = self.config;

        self.state = CapacitiveCycleState::Discharge;
        bus.assert_pin(self.pins.charge, cfg.charge_polarity, false);
        bus.assert_pin(self.pins.discharge, cfg.discharge_polarity, true);
        delay.delay_us(cfg.settle_us);
        bus.assert_pin(self.pins.discharge, cfg.discharge_polarity, false);

        self.state = CapacitiveCycleState::Charge;
        let charging = ChargeGuard::start(bus, self.pins.charge, cfg.charge_polarity);

        self.state = CapacitiveCycleState::Sample;
        let step_us = cfg.sample_step_us.max(1);
        let mut elapsed = 0u32;
        let reading = loop {
            match samples.sample(self.pins.sample) {
                Ok(v) if v >= cfg.threshold => {
                    break ContactReading {
                        contact: elapsed < cfg.contact_below_us,
                        charge_time_us: elapsed,
                        timed_out: false,
                    };
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("capacitive: {e}, reporting no contact");
                    break ContactReading::timed_out(cfg.timeout_us);
                }
            }
            if elapsed >= cfg.timeout_us {
                break ContactReading::timed_out(cfg.timeout_us);
            }
            let step = step_us.min(cfg.timeout_us - elapsed);
            delay.delay_us(step);
            elapsed += step;
        };
        drop(charging);

        self.state = CapacitiveCycleState::Idle;
        trace!(
            "capacitive: {}us contact={} timed_out={}",
            reading.charge_time_us,
            reading.contact,
            reading.timed_out
        );
        reading
    }
}

/// Holds the charge line asserted; releases it on drop.
struct ChargeGuard<'b, B: PortBus> {
    bus: &'b mut B,
    pin: PinAssignment,
    polarity: Polarity,
}

impl<'b, B: PortBus> ChargeGuard<'b, B> {
    fn start(bus: &'b mut B, pin: PinAssignment, polarity: Polarity) -> Self {
        bus.assert_pin(pin, polarity, true);
        Self { bus, pin, polarity }
    }
}

impl<B: PortBus> Drop for ChargeGuard<'_, B> {
    fn drop(&mut self) {
        self.bus.assert_pin(self.pin, self.polarity, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{mega2560, MockDelay, MockPortBus, MockSampleBus, MockTimeline};

    struct Rig {
        sensor: CapacitiveHitSensor,
        pins: CapacitivePins,
        bus: MockPortBus,
        samples: MockSampleBus,
        delay: MockDelay,
        timeline: MockTimeline,
    }

    fn rig(config: CapacitiveConfig) -> Rig {
        let pins = mega2560::pin_map().capacitive;
        let timeline = MockTimeline::new();
        let mut bus = MockPortBus::mega2560();
        let mut sensor = CapacitiveHitSensor::new(pins, config);
        sensor.init(&mut bus);
        Rig {
            sensor,
            pins,
            bus,
            samples: MockSampleBus::new().with_timeline(timeline.clone()),
            delay: MockDelay::on(timeline.clone()),
            timeline,
        }
    }

    /// Sample line jumps to full scale `cross_us` after charging starts.
    fn step_at(r: &mut Rig, charge_start_us: u64, cross_us: u64) {
        r.samples.set_curve(r.pins.sample, move |now| {
            if now >= charge_start_us + cross_us {
                1023
            } else {
                0
            }
        });
    }

    fn measure(r: &mut Rig) -> ContactReading {
        r.sensor.measure(&mut r.bus, &mut r.samples, &mut r.delay)
    }

    #[test]
    fn fast_charge_is_contact() {
        let cfg = CapacitiveConfig::default().with_sample_step_us(1);
        let mut r = rig(cfg);
        step_at(&mut r, u64::from(cfg.settle_us), 250);

        let reading = measure(&mut r);
        assert_eq!(
            reading,
            ContactReading {
                contact: true,
                charge_time_us: 250,
                timed_out: false
            }
        );
        assert_eq!(r.sensor.state(), CapacitiveCycleState::Idle);
    }

    #[test]
    fn slow_charge_is_no_contact() {
        let cfg = CapacitiveConfig::default();
        let mut r = rig(cfg);
        step_at(&mut r, u64::from(cfg.settle_us), 800);

        let reading = measure(&mut r);
        assert!(!reading.contact);
        assert!(!reading.timed_out);
        assert_eq!(reading.charge_time_us, 800);
    }

    #[test]
    fn crossing_exactly_at_threshold_is_no_contact() {
        let cfg = CapacitiveConfig::default();
        let mut r = rig(cfg);
        step_at(&mut r, u64::from(cfg.settle_us), u64::from(cfg.contact_below_us));

        let reading = measure(&mut r);
        assert_eq!(reading.charge_time_us, cfg.contact_below_us);
        assert!(!reading.contact);
    }

    #[test]
    fn never_crossing_times_out() {
        let cfg = CapacitiveConfig::default();
        let mut r = rig(cfg);
        r.samples.set(r.pins.sample, 0);

        let reading = measure(&mut r);
        assert_eq!(reading, ContactReading::timed_out(cfg.timeout_us));
        // settle + full charge budget, nothing more.
        assert_eq!(
            r.timeline.now_us(),
            u64::from(cfg.settle_us + cfg.timeout_us)
        );
    }

    #[test]
    fn timeout_not_a_multiple_of_step_stays_bounded() {
        let cfg = CapacitiveConfig::default()
            .with_settle_us(0)
            .with_sample_step_us(4)
            .with_timeout_us(10)
            .with_contact_below_us(5);
        let mut r = rig(cfg);
        r.samples.set(r.pins.sample, 0);

        let reading = measure(&mut r);
        assert!(reading.timed_out);
        assert_eq!(reading.charge_time_us, 10);
        assert_eq!(r.timeline.now_us(), 10);
        // Reads at 0, 4, 8 and 10.
        assert_eq!(r.samples.reads.len(), 4);
    }

    #[test]
    fn unreadable_sample_line_is_no_contact() {
        let cfg = CapacitiveConfig::default();
        let mut r = rig(cfg);
        r.samples.set_unavailable(r.pins.sample);

        let reading = measure(&mut r);
        assert!(reading.timed_out);
        assert!(!reading.contact);
        assert!(!r.bus.latch_pin(r.pins.charge));
    }

    #[test]
    fn lines_released_after_cycle() {
        let cfg = CapacitiveConfig::default();
        let mut r = rig(cfg);
        step_at(&mut r, u64::from(cfg.settle_us), 100);

        measure(&mut r);
        assert!(!r.bus.latch_pin(r.pins.charge));
        assert!(!r.bus.latch_pin(r.pins.discharge));
    }

    #[test]
    fn discharge_precedes_charge() {
        let cfg = CapacitiveConfig::default();
        let mut r = rig(cfg);
        r.samples.set(r.pins.sample, 1023);
        r.bus.clear_events();

        measure(&mut r);
        let port = r.pins.charge.port;
        let dis = r.pins.discharge.mask();
        let chg = r.pins.charge.mask();
        let stores = r.bus.stores_to(port);
        let dis_on = stores.iter().position(|v| v & dis != 0).unwrap();
        let chg_on = stores.iter().position(|v| v & chg != 0).unwrap();
        assert!(dis_on < chg_on);
        // Never both at once.
        assert!(stores.iter().all(|v| v & (dis | chg) != (dis | chg)));
    }

    #[test]
    fn zero_sample_step_still_terminates() {
        let cfg = CapacitiveConfig::default()
            .with_settle_us(0)
            .with_sample_step_us(0)
            .with_timeout_us(10);
        let mut r = rig(cfg);
        r.samples.set(r.pins.sample, 0);

        let reading = measure(&mut r);
        assert_eq!(reading, ContactReading::timed_out(10));
        // Stepped at 1us: reads at 0..=10.
        assert_eq!(r.samples.reads.len(), 11);
        assert_eq!(r.timeline.now_us(), 10);
    }

    #[cfg(feature = "std")]
    #[test]
    fn charge_time_grows_with_time_constant() {
        let cfg = CapacitiveConfig::default().with_sample_step_us(1);
        let mut last = 0;
        for tau in [50.0, 150.0, 400.0, 900.0] {
            let mut r = rig(cfg);
            let start = r.timeline.now_us() + u64::from(cfg.settle_us);
            r.samples.set_rc_curve(r.pins.sample, start, tau, 1023);
            let reading = measure(&mut r);
            assert!(reading.charge_time_us >= last);
            last = reading.charge_time_us;
        }
        assert!(last > 0);
    }
}
