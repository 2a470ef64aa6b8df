//! Pin map and timing configuration.
//!
//! The core never reads process-wide pin tables. A [`RobotConfig`] is built
//! once (in code, or parsed from JSON with the `serde-json-core` feature),
//! validated against the bus at startup, and handed to each component.
//!
//! # Example
//!
//! ```rust
//! use rover_io::config::{AdcConfig, RobotConfig, SwitchConfig};
//! use rover_io::hal::{mega2560, MockPortBus};
//!
//! let config = RobotConfig::new(mega2560::pin_map())
//!     .with_adc(AdcConfig::default().with_conversion_timeout_us(40))
//!     .with_switches(SwitchConfig::default().with_debounce_ms(30));
//!
//! let bus = MockPortBus::mega2560();
//! assert!(config.validate(&bus).is_ok());
//! ```

use heapless::Vec as HVec;

use crate::error::ConfigError;
use crate::traits::{Bits, PinAssignment, Polarity, PortBus, PortId, SampleChannel, MAX_PORT_WIDTH};

/// Number of reflectance sensors on the line array.
pub const REFLECTANCE_CHANNELS: usize = 16;

/// Widest data bus the waveform ADC can present.
pub const ADC_DATA_BITS: u32 = 8;

/// Upper bound on distinct line claims checked for overlap.
const MAX_CLAIMS: usize = 32;

// ============================================================================
// Pin Map
// ============================================================================

/// Parallel data bus: a contiguous group of bits on one port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusAssignment {
    /// Port carrying the bus.
    pub port: PortId,
    /// Bits carrying data, contiguous, LSB of the sample at the lowest set bit.
    pub mask: Bits,
}

impl BusAssignment {
    /// Creates a bus assignment.
    pub const fn new(port: PortId, mask: Bits) -> Self {
        Self { port, mask }
    }

    /// Extracts the right-aligned bus value from a raw port reading.
    #[inline]
    pub const fn extract(&self, raw: Bits) -> Bits {
        if self.mask == 0 {
            0
        } else {
            (raw & self.mask) >> self.mask.trailing_zeros()
        }
    }

    const fn is_contiguous(&self) -> bool {
        if self.mask == 0 {
            return false;
        }
        let shifted = self.mask >> self.mask.trailing_zeros();
        shifted & shifted.wrapping_add(1) == 0
    }
}

/// Lines of one H-bridge channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorPins {
    /// PWM compare register (a whole port).
    pub pwm: PortId,
    /// Direction line.
    pub dir: PinAssignment,
    /// Driver enable line.
    pub enable: PinAssignment,
}

/// Relay coil lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayPins {
    /// Relay K1.
    pub k1: PinAssignment,
    /// Relay K2.
    pub k2: PinAssignment,
}

/// Bump switch lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchPins {
    /// Front left bumper.
    pub top_left: PinAssignment,
    /// Front right bumper.
    pub top_right: PinAssignment,
    /// Rear left bumper.
    pub bottom_left: PinAssignment,
    /// Rear right bumper.
    pub bottom_right: PinAssignment,
}

impl SwitchPins {
    /// Lines in frame order: top-left, top-right, bottom-left, bottom-right.
    pub const fn as_array(&self) -> [PinAssignment; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }
}

/// Capacitive contact triplet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapacitivePins {
    /// Analog line sampling the capacitor voltage.
    pub sample: SampleChannel,
    /// Line that discharges the capacitor.
    pub discharge: PinAssignment,
    /// Line that charges the capacitor.
    pub charge: PinAssignment,
}

/// Waveform ADC handshake lines and data bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdcPins {
    /// 8-bit parallel data bus.
    pub data: BusAssignment,
    /// Read strobe (output).
    pub rd: PinAssignment,
    /// Conversion-complete flag (input).
    pub int: PinAssignment,
    /// Chip select (output).
    pub cs: PinAssignment,
}

/// Wheel encoder lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderPins {
    /// Left wheel encoder.
    pub left: PinAssignment,
    /// Right wheel encoder.
    pub right: PinAssignment,
}

/// Every logical line of the robot mapped to a physical port/bit or channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinMap {
    /// Left drive motor.
    pub left_motor: MotorPins,
    /// Right drive motor.
    pub right_motor: MotorPins,
    /// Relays K1/K2.
    pub relays: RelayPins,
    /// Bump switches.
    pub switches: SwitchPins,
    /// Capacitive contact triplet.
    pub capacitive: CapacitivePins,
    /// Waveform ADC.
    pub adc: AdcPins,
    /// Reflectance sensors, physical left-to-right order.
    pub reflectance: [SampleChannel; REFLECTANCE_CHANNELS],
    /// Wheel encoders.
    pub encoders: EncoderPins,
}

// ============================================================================
// Component Configs
// ============================================================================

/// Waveform ADC handshake timing and line polarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdcConfig {
    /// Delay between INT polls in microseconds.
    pub poll_interval_us: u32,
    /// Maximum wait for INT in microseconds.
    pub conversion_timeout_us: u32,
    /// Wait after asserting RD before latching the bus (nanoseconds).
    pub data_access_ns: u32,
    /// Chip select sense.
    pub cs_polarity: Polarity,
    /// Read strobe sense.
    pub rd_polarity: Polarity,
    /// Conversion flag sense.
    pub int_polarity: Polarity,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            poll_interval_us: 1,
            conversion_timeout_us: 20,
            data_access_ns: 200,
            cs_polarity: Polarity::ActiveLow,
            rd_polarity: Polarity::ActiveLow,
            int_polarity: Polarity::ActiveLow,
        }
    }
}

impl AdcConfig {
    /// Set the INT poll interval
    pub fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }

    /// Set the conversion timeout
    pub fn with_conversion_timeout_us(mut self, us: u32) -> Self {
        self.conversion_timeout_us = us;
        self
    }

    /// Set the RD-to-data access delay
    pub fn with_data_access_ns(mut self, ns: u32) -> Self {
        self.data_access_ns = ns;
        self
    }

    /// Set all three handshake polarities
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.cs_polarity = polarity;
        self.rd_polarity = polarity;
        self.int_polarity = polarity;
        self
    }

    /// Number of INT polls before a timeout: one at the start, one after
    /// each interval, the last interval cut short at the timeout.
    pub fn poll_budget(&self) -> u32 {
        self.conversion_timeout_us
            .div_ceil(self.poll_interval_us.max(1))
            .saturating_add(1)
    }
}

/// Capacitive charge-time measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapacitiveConfig {
    /// Discharge hold time in microseconds.
    pub settle_us: u32,
    /// Time between sample-line reads in microseconds.
    pub sample_step_us: u32,
    /// Give up after this much charge time (microseconds).
    pub timeout_us: u32,
    /// Sample value that counts as "charged".
    pub threshold: u16,
    /// Charge times strictly below this declare contact (microseconds).
    pub contact_below_us: u32,
    /// Discharge line sense.
    pub discharge_polarity: Polarity,
    /// Charge line sense.
    pub charge_polarity: Polarity,
}

impl Default for CapacitiveConfig {
    fn default() -> Self {
        Self {
            settle_us: 1_000,
            sample_step_us: 4,
            timeout_us: 4_000,
            // ~63% of a 10-bit full scale: one RC time constant.
            threshold: 647,
            contact_below_us: 600,
            discharge_polarity: Polarity::ActiveHigh,
            charge_polarity: Polarity::ActiveHigh,
        }
    }
}

impl CapacitiveConfig {
    /// Set the discharge hold time
    pub fn with_settle_us(mut self, us: u32) -> Self {
        self.settle_us = us;
        self
    }

    /// Set the sampling step
    pub fn with_sample_step_us(mut self, us: u32) -> Self {
        self.sample_step_us = us;
        self
    }

    /// Set the charge timeout
    pub fn with_timeout_us(mut self, us: u32) -> Self {
        self.timeout_us = us;
        self
    }

    /// Set the "charged" sample threshold
    pub fn with_threshold(mut self, threshold: u16) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the contact decision threshold
    pub fn with_contact_below_us(mut self, us: u32) -> Self {
        self.contact_below_us = us;
        self
    }
}

/// Bump switch debouncing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchConfig {
    /// A raw level must hold this long before it becomes the stable state.
    pub debounce_ms: u32,
    /// Switch line sense (pull-ups make pressed = low).
    pub polarity: Polarity,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 20,
            polarity: Polarity::ActiveLow,
        }
    }
}

impl SwitchConfig {
    /// Set the debounce window
    pub fn with_debounce_ms(mut self, ms: u32) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Set the switch polarity
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }
}

/// What the enable line does when a motor is commanded to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IdlePolicy {
    /// De-assert enable: the bridge floats and the wheel coasts.
    #[default]
    Coast,
    /// Keep enable asserted with zero duty.
    Hold,
}

/// H-bridge drive policy, shared by both motors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorConfig {
    /// Enable-line behaviour at zero speed.
    pub idle: IdlePolicy,
    /// Direction-line level that means forward.
    pub forward_level: bool,
    /// Enable line sense.
    pub enable_polarity: Polarity,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            idle: IdlePolicy::Coast,
            forward_level: true,
            enable_polarity: Polarity::ActiveHigh,
        }
    }
}

impl MotorConfig {
    /// Set the idle policy
    pub fn with_idle(mut self, idle: IdlePolicy) -> Self {
        self.idle = idle;
        self
    }

    /// Set the direction level that means forward
    pub fn with_forward_level(mut self, high: bool) -> Self {
        self.forward_level = high;
        self
    }
}

/// Relay coil drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayConfig {
    /// Coil line sense.
    pub polarity: Polarity,
}

// ============================================================================
// Robot Config
// ============================================================================

/// Complete configuration consumed by [`RobotCore`](crate::RobotCore).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RobotConfig {
    /// Physical line assignments.
    pub pins: PinMap,
    /// Waveform ADC timing.
    #[cfg_attr(feature = "serde", serde(default))]
    pub adc: AdcConfig,
    /// Capacitive contact measurement.
    #[cfg_attr(feature = "serde", serde(default))]
    pub capacitive: CapacitiveConfig,
    /// Bump switch debouncing.
    #[cfg_attr(feature = "serde", serde(default))]
    pub switches: SwitchConfig,
    /// Motor drive policy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub motors: MotorConfig,
    /// Relay drive.
    #[cfg_attr(feature = "serde", serde(default))]
    pub relays: RelayConfig,
}

impl RobotConfig {
    /// Configuration with default timings for the given pin map.
    pub fn new(pins: PinMap) -> Self {
        Self {
            pins,
            adc: AdcConfig::default(),
            capacitive: CapacitiveConfig::default(),
            switches: SwitchConfig::default(),
            motors: MotorConfig::default(),
            relays: RelayConfig::default(),
        }
    }

    /// Set ADC configuration
    pub fn with_adc(mut self, adc: AdcConfig) -> Self {
        self.adc = adc;
        self
    }

    /// Set capacitive configuration
    pub fn with_capacitive(mut self, capacitive: CapacitiveConfig) -> Self {
        self.capacitive = capacitive;
        self
    }

    /// Set switch configuration
    pub fn with_switches(mut self, switches: SwitchConfig) -> Self {
        self.switches = switches;
        self
    }

    /// Set motor configuration
    pub fn with_motors(mut self, motors: MotorConfig) -> Self {
        self.motors = motors;
        self
    }

    /// Set relay configuration
    pub fn with_relays(mut self, relays: RelayConfig) -> Self {
        self.relays = relays;
        self
    }

    /// Checks the whole configuration against the ports `bus` exposes.
    ///
    /// Rejects unknown ports, bits outside a port, malformed ADC data masks,
    /// any two lines sharing a bit (PWM registers claim their whole port),
    /// duplicate sampled channels and out-of-range timings.
    pub fn validate<B: PortBus + ?Sized>(&self, bus: &B) -> Result<(), ConfigError> {
        self.validate_timing()?;

        let pins = &self.pins;
        let mut claims = Claims::default();

        let motors = [
            (
                &pins.left_motor,
                ["left_motor.pwm", "left_motor.dir", "left_motor.enable"],
            ),
            (
                &pins.right_motor,
                ["right_motor.pwm", "right_motor.dir", "right_motor.enable"],
            ),
        ];
        for (motor, [pwm_role, dir_role, en_role]) in motors {
            let width = port_width(bus, pwm_role, motor.pwm)?;
            claims.claim(pwm_role, motor.pwm, full_mask(width))?;
            claims.claim_pin(bus, dir_role, motor.dir)?;
            claims.claim_pin(bus, en_role, motor.enable)?;
        }

        claims.claim_pin(bus, "relays.k1", pins.relays.k1)?;
        claims.claim_pin(bus, "relays.k2", pins.relays.k2)?;

        claims.claim_pin(bus, "switches.top_left", pins.switches.top_left)?;
        claims.claim_pin(bus, "switches.top_right", pins.switches.top_right)?;
        claims.claim_pin(bus, "switches.bottom_left", pins.switches.bottom_left)?;
        claims.claim_pin(bus, "switches.bottom_right", pins.switches.bottom_right)?;

        claims.claim_pin(bus, "capacitive.discharge", pins.capacitive.discharge)?;
        claims.claim_pin(bus, "capacitive.charge", pins.capacitive.charge)?;

        let data = pins.adc.data;
        let width = port_width(bus, "adc.data", data.port)?;
        if !data.is_contiguous()
            || data.mask.count_ones() > ADC_DATA_BITS
            || data.mask & !full_mask(width) != 0
        {
            return Err(ConfigError::InvalidMask {
                role: "adc.data",
                mask: data.mask,
            });
        }
        claims.claim("adc.data", data.port, data.mask)?;
        claims.claim_pin(bus, "adc.rd", pins.adc.rd)?;
        claims.claim_pin(bus, "adc.int", pins.adc.int)?;
        claims.claim_pin(bus, "adc.cs", pins.adc.cs)?;

        claims.claim_pin(bus, "encoders.left", pins.encoders.left)?;
        claims.claim_pin(bus, "encoders.right", pins.encoders.right)?;

        for (i, channel) in pins.reflectance.iter().enumerate() {
            if pins.reflectance[..i].contains(channel) {
                return Err(ConfigError::DuplicateChannel {
                    role: "reflectance",
                    channel: *channel,
                });
            }
        }
        if pins.reflectance.contains(&pins.capacitive.sample) {
            return Err(ConfigError::DuplicateChannel {
                role: "capacitive.sample",
                channel: pins.capacitive.sample,
            });
        }

        Ok(())
    }

    fn validate_timing(&self) -> Result<(), ConfigError> {
        let adc = &self.adc;
        if adc.poll_interval_us == 0 {
            return Err(ConfigError::InvalidTiming("adc poll interval is zero"));
        }
        if adc.conversion_timeout_us < adc.poll_interval_us {
            return Err(ConfigError::InvalidTiming(
                "adc timeout shorter than poll interval",
            ));
        }

        let cap = &self.capacitive;
        if cap.sample_step_us == 0 {
            return Err(ConfigError::InvalidTiming("capacitive sample step is zero"));
        }
        if cap.timeout_us < cap.sample_step_us {
            return Err(ConfigError::InvalidTiming(
                "capacitive timeout shorter than sample step",
            ));
        }
        if cap.contact_below_us > cap.timeout_us {
            return Err(ConfigError::InvalidTiming(
                "contact threshold beyond capacitive timeout",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

#[derive(Default)]
struct Claims {
    entries: HVec<(&'static str, PortId, Bits), MAX_CLAIMS>,
}

impl Claims {
    fn claim(&mut self, role: &'static str, port: PortId, mask: Bits) -> Result<(), ConfigError> {
        if let Some(&(first, _, _)) = self
            .entries
            .iter()
            .find(|(_, p, m)| *p == port && m & mask != 0)
        {
            return Err(ConfigError::PinConflict {
                first,
                second: role,
                port,
            });
        }
        self.entries
            .push((role, port, mask))
            .map_err(|_| ConfigError::TooManyLines { role })
    }

    fn claim_pin<B: PortBus + ?Sized>(
        &mut self,
        bus: &B,
        role: &'static str,
        pin: PinAssignment,
    ) -> Result<(), ConfigError> {
        let width = port_width(bus, role, pin.port)?;
        if pin.bit >= width {
            return Err(ConfigError::BitOutOfRange {
                role,
                port: pin.port,
                bit: pin.bit,
                width,
            });
        }
        self.claim(role, pin.port, pin.mask())
    }
}

fn port_width<B: PortBus + ?Sized>(
    bus: &B,
    role: &'static str,
    port: PortId,
) -> Result<u8, ConfigError> {
    match bus.width(port) {
        Some(w) if (1..=MAX_PORT_WIDTH).contains(&w) => Ok(w),
        _ => Err(ConfigError::UnknownPort { role, port }),
    }
}

fn full_mask(width: u8) -> Bits {
    if width >= MAX_PORT_WIDTH {
        Bits::MAX
    } else {
        (1 << width) - 1
    }
}

// ============================================================================
// Tests
// ============================================================================
