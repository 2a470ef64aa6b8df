//! The acquisition and actuation core.
//!
//! [`RobotCore`] owns the buses, validates the configuration against them
//! at construction, drives every output to its safe state and then serves
//! two roles:
//!
//! - **Acquisition**: [`sample`](RobotCore::sample) runs one full sampling
//!   cycle and returns an immutable [`SensorFrame`]. It never fails.
//! - **Actuation**: [`drive`](RobotCore::drive),
//!   [`set_motor`](RobotCore::set_motor), [`set_relays`](RobotCore::set_relays)
//!   and [`stop_all`](RobotCore::stop_all) are the command sink.
//!
//! # Example
//!
//! ```rust
//! use rover_io::{DriveCommand, RobotConfig, RobotCore};
//! use rover_io::encoder::EncoderTicks;
//! use rover_io::hal::{mega2560, MockDelay, MockPortBus, MockSampleBus, MockTimeline};
//!
//! static TICKS: EncoderTicks = EncoderTicks::new();
//!
//! let timeline = MockTimeline::new();
//! let config = RobotConfig::new(mega2560::pin_map());
//! let mut core = RobotCore::new(
//!     &config,
//!     MockPortBus::mega2560(),
//!     MockSampleBus::new().with_timeline(timeline.clone()),
//!     MockDelay::on(timeline.clone()),
//!     timeline,
//!     &TICKS,
//! )
//! .unwrap();
//!
//! let frame = core.sample();
//! assert_eq!(frame.sequence, 1);
//! core.drive(DriveCommand::straight(0.4));
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::actuator::{DriveCommand, MotorActuator, MotorCommand, RelayActuator, RelayCommand};
use crate::adc::WaveformAdcDriver;
use crate::capacitive::CapacitiveHitSensor;
use crate::config::RobotConfig;
use crate::encoder::{EdgeCapture, EncoderCounter, EncoderTicks};
use crate::error::ConfigError;
use crate::frame::{SensorFrame, WaveformSample};
use crate::reflectance::ReflectanceArrayScanner;
use crate::switches::ContactSwitchPanel;
use crate::traits::{Clock, PortBus, SampleBus};

/// Which drive motor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Left motor.
    Left,
    /// Right motor.
    Right,
}

/// Sensor acquisition and actuator control over one set of buses.
pub struct RobotCore<'t, B, S, D, C>
where
    B: PortBus,
    S: SampleBus,
    D: DelayNs,
    C: Clock,
{
    bus: B,
    samples: S,
    delay: D,
    clock: C,

    adc: WaveformAdcDriver,
    capacitive: CapacitiveHitSensor,
    reflectance: ReflectanceArrayScanner,
    switches: ContactSwitchPanel,
    encoders: EncoderCounter<'t>,
    edge_capture: EdgeCapture,

    left_motor: MotorActuator,
    right_motor: MotorActuator,
    relays: RelayActuator,

    sequence: u32,
}

impl<'t, B, S, D, C> RobotCore<'t, B, S, D, C>
where
    B: PortBus,
    S: SampleBus,
    D: DelayNs,
    C: Clock,
{
    /// Validates `config` against `bus` and drives every output to its safe
    /// state: motors stopped, relays released, ADC and capacitive lines
    /// inactive.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; nothing is written to the bus in that case.
    pub fn new(
        config: &RobotConfig,
        mut bus: B,
        samples: S,
        delay: D,
        clock: C,
        ticks: &'t EncoderTicks,
    ) -> Result<Self, ConfigError> {
        if let Err(e) = config.validate(&bus) {
            warn!("robot core: configuration rejected: {e}");
            return Err(e);
        }
        let pins = &config.pins;

        let mut adc = WaveformAdcDriver::new(pins.adc, config.adc);
        let mut capacitive = CapacitiveHitSensor::new(pins.capacitive, config.capacitive);
        let mut left_motor = MotorActuator::new(pins.left_motor, config.motors);
        let mut right_motor = MotorActuator::new(pins.right_motor, config.motors);
        let mut relays = RelayActuator::new(pins.relays, config.relays);

        left_motor.init(&mut bus);
        right_motor.init(&mut bus);
        relays.init(&mut bus);
        adc.init(&mut bus);
        capacitive.init(&mut bus);

        info!("robot core: configuration validated, outputs in safe state");

        Ok(Self {
            bus,
            samples,
            delay,
            clock,
            adc,
            capacitive,
            reflectance: ReflectanceArrayScanner::new(pins.reflectance),
            switches: ContactSwitchPanel::new(pins.switches, config.switches),
            encoders: EncoderCounter::new(ticks),
            edge_capture: EdgeCapture::new(pins.encoders),
            left_motor,
            right_motor,
            relays,
            sequence: 0,
        })
    }

    // ========================================================================
    // Acquisition
    // ========================================================================

    /// Runs one sampling cycle.
    ///
    /// Order: reflectance scan, switch poll, capacitive cycle, ADC
    /// handshake, encoder drain. Channel, conversion and charge failures
    /// are carried as sentinels in the frame.
    pub fn sample(&mut self) -> SensorFrame {
        let timestamp_ms = self.clock.now_ms();

        let reflectance = self.reflectance.scan(&mut self.samples);
        let switches = self.switches.poll(&mut self.bus, timestamp_ms);
        let contact = self
            .capacitive
            .measure(&mut self.bus, &mut self.samples, &mut self.delay);
        let waveform = match self.adc.read_sample(&mut self.bus, &mut self.delay) {
            Ok(v) => WaveformSample::valid(v),
            Err(_) => WaveformSample::invalid(),
        };
        let encoder = self.encoders.drain();

        self.sequence = self.sequence.wrapping_add(1);
        SensorFrame {
            sequence: self.sequence,
            timestamp_ms,
            reflectance,
            encoder,
            switches,
            contact,
            waveform,
        }
    }

    /// Samples the encoder lines once for boards without encoder
    /// interrupts. Call faster than the edge rate; edges land in the next
    /// frame.
    pub fn poll_encoders(&mut self) -> u32 {
        self.edge_capture
            .poll(&mut self.bus, self.encoders.ticks())
    }

    // ========================================================================
    // Actuation
    // ========================================================================

    /// Applies a speed to both motors.
    pub fn drive(&mut self, cmd: DriveCommand) {
        self.left_motor.apply(&mut self.bus, cmd.left);
        self.right_motor.apply(&mut self.bus, cmd.right);
    }

    /// Applies a speed to one motor.
    pub fn set_motor(&mut self, side: Side, cmd: MotorCommand) {
        let motor = match side {
            Side::Left => &mut self.left_motor,
            Side::Right => &mut self.right_motor,
        };
        motor.apply(&mut self.bus, cmd);
    }

    /// Drives both relays.
    pub fn set_relays(&mut self, cmd: RelayCommand) {
        self.relays.apply(&mut self.bus, cmd);
    }

    /// Motors stopped with enable released, relays released.
    pub fn stop_all(&mut self) {
        self.left_motor.stop(&mut self.bus);
        self.right_motor.stop(&mut self.bus);
        self.relays.apply(&mut self.bus, RelayCommand::OFF);
        info!("robot core: all outputs stopped");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// One motor's actuator state.
    pub fn motor(&self, side: Side) -> &MotorActuator {
        match side {
            Side::Left => &self.left_motor,
            Side::Right => &self.right_motor,
        }
    }

    /// Last relay command.
    pub fn relays(&self) -> RelayCommand {
        self.relays.state()
    }

    /// The waveform ADC driver, for its counters.
    pub fn adc(&self) -> &WaveformAdcDriver {
        &self.adc
    }

    /// Frames produced so far.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The port bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable port bus, for test harnesses and simulators.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Mutable sample bus, for test harnesses and simulators.
    pub fn samples_mut(&mut self) -> &mut S {
        &mut self.samples
    }

    /// Stops every output and hands the buses back.
    pub fn release(mut self) -> (B, S, D, C) {
        self.stop_all();
        (self.bus, self.samples, self.delay, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{mega2560, MockDelay, MockPortBus, MockSampleBus, MockTimeline};
    use crate::traits::{Direction, PinAssignment, PortId};

    type Core<'t> = RobotCore<'t, MockPortBus, MockSampleBus, MockDelay, MockTimeline>;

    fn core(ticks: &EncoderTicks) -> Core<'_> {
        let timeline = MockTimeline::new();
        let config = RobotConfig::new(mega2560::pin_map());
        RobotCore::new(
            &config,
            MockPortBus::mega2560(),
            MockSampleBus::new().with_timeline(timeline.clone()),
            MockDelay::on(timeline.clone()),
            timeline,
            ticks,
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config_without_touching_bus() {
        let ticks = EncoderTicks::new();
        let timeline = MockTimeline::new();
        let mut config = RobotConfig::new(mega2560::pin_map());
        config.pins.relays.k2 = PinAssignment::new(PortId(99), 0);

        let result = RobotCore::new(
            &config,
            MockPortBus::mega2560(),
            MockSampleBus::new(),
            MockDelay::on(timeline.clone()),
            timeline,
            &ticks,
        );
        assert!(matches!(result, Err(ConfigError::UnknownPort { role: "relays.k2", .. })));
    }

    #[test]
    fn construction_drives_safe_state() {
        let ticks = EncoderTicks::new();
        let core = core(&ticks);
        let pins = mega2560::pin_map();
        let bus = core.bus();

        assert_eq!(bus.latch(pins.left_motor.pwm), 0);
        assert_eq!(bus.latch(pins.right_motor.pwm), 0);
        assert!(!bus.latch_pin(pins.left_motor.enable));
        assert!(!bus.latch_pin(pins.right_motor.enable));
        assert!(!bus.latch_pin(pins.relays.k1));
        assert!(!bus.latch_pin(pins.relays.k2));
        assert!(bus.latch_pin(pins.adc.cs));
        assert!(bus.latch_pin(pins.adc.rd));
        assert!(!bus.latch_pin(pins.capacitive.charge));
    }

    #[test]
    fn frames_are_sequenced_and_timestamped() {
        let ticks = EncoderTicks::new();
        let mut core = core(&ticks);

        let a = core.sample();
        let b = core.sample();
        assert_eq!((a.sequence, b.sequence), (1, 2));
        assert!(b.timestamp_ms >= a.timestamp_ms);
        assert_eq!(core.sequence(), 2);
    }

    #[test]
    fn failures_become_sentinels() {
        let ticks = EncoderTicks::new();
        let mut core = core(&ticks);
        let pins = mega2560::pin_map();
        // No sample channels configured, INT never asserts.
        core.bus_mut().set_input_pin(pins.adc.int, true);

        let frame = core.sample();
        assert_eq!(frame.reflectance.available(), 0);
        assert!(!frame.waveform.valid);
        assert!(frame.contact.timed_out);
        assert!(!frame.contact.contact);
    }

    #[test]
    fn encoder_ticks_drained_per_frame() {
        let ticks = EncoderTicks::new();
        let mut core = core(&ticks);

        ticks.record_many(crate::encoder::Wheel::Left, 4);
        assert_eq!(core.sample().encoder.left, 4);
        assert_eq!(core.sample().encoder.left, 0);
    }

    #[test]
    fn polled_encoder_edges_reach_frame() {
        let ticks = EncoderTicks::new();
        let mut core = core(&ticks);
        let right = mega2560::pin_map().encoders.right;

        core.poll_encoders();
        core.bus_mut().set_input_pin(right, true);
        assert_eq!(core.poll_encoders(), 1);
        assert_eq!(core.sample().encoder.right, 1);
    }

    #[test]
    fn command_sink() {
        let ticks = EncoderTicks::new();
        let mut core = core(&ticks);
        let pins = mega2560::pin_map();

        core.drive(DriveCommand::spin(1.0));
        assert_eq!(core.motor(Side::Left).direction(), Direction::Forward);
        assert_eq!(core.motor(Side::Right).direction(), Direction::Reverse);
        assert_eq!(core.bus().latch(pins.right_motor.pwm), 255);

        core.set_motor(Side::Left, MotorCommand::stop());
        assert_eq!(core.motor(Side::Left).duty(), 0);
        assert_eq!(core.motor(Side::Right).duty(), 255);

        core.set_relays(RelayCommand::new(false, true));
        assert!(core.bus().latch_pin(pins.relays.k2));

        core.stop_all();
        assert_eq!(core.relays(), RelayCommand::OFF);
        assert!(!core.motor(Side::Right).is_enabled());
        assert_eq!(core.bus().latch(pins.right_motor.pwm), 0);
    }

    #[test]
    fn release_stops_outputs() {
        let ticks = EncoderTicks::new();
        let mut core = core(&ticks);
        let pins = mega2560::pin_map();
        core.drive(DriveCommand::straight(0.5));

        let (bus, ..) = core.release();
        assert_eq!(bus.latch(pins.left_motor.pwm), 0);
    }
}
