//! H-bridge motor channels and relay coils.
//!
//! # Motor drive
//!
//! A [`MotorCommand`] carries a signed speed in `[-1.0, 1.0]`. The sign
//! selects the direction line, the magnitude becomes a duty on the PWM
//! compare register scaled to its width:
//!
//! ```text
//! duty = round(|speed| × (2^width − 1))
//! ```
//!
//! Reversing always passes through zero duty before the direction line
//! changes. Zero speed applies the configured [`IdlePolicy`].
//!
//! ```rust
//! use rover_io::actuator::{MotorActuator, MotorCommand};
//! use rover_io::config::MotorConfig;
//! use rover_io::hal::{mega2560, MockPortBus};
//! use rover_io::traits::{Direction, PortBus};
//!
//! let pins = mega2560::pin_map().left_motor;
//! let mut bus = MockPortBus::mega2560();
//! let mut motor = MotorActuator::new(pins, MotorConfig::default());
//! motor.init(&mut bus);
//!
//! motor.apply(&mut bus, MotorCommand::new(-0.5));
//! assert_eq!(motor.direction(), Direction::Reverse);
//! assert_eq!(bus.latch(pins.pwm), 128);
//! ```

use log::{debug, info};

use crate::config::{IdlePolicy, MotorConfig, MotorPins, RelayConfig, RelayPins};
use crate::traits::{Bits, Direction, PortBus, MAX_PORT_WIDTH};

// ============================================================================
// Commands
// ============================================================================

/// Signed normalized motor speed.
///
/// Out-of-range values clamp to `[-1.0, 1.0]`; NaN is treated as stop.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorCommand {
    speed: f32,
}

impl MotorCommand {
    /// Creates a command, clamping the speed.
    pub fn new(speed: f32) -> Self {
        let speed = if speed.is_nan() {
            0.0
        } else {
            speed.clamp(-1.0, 1.0)
        };
        Self { speed }
    }

    /// Zero speed.
    pub const fn stop() -> Self {
        Self { speed: 0.0 }
    }

    /// Forward at `magnitude` (sign ignored).
    pub fn forward(magnitude: f32) -> Self {
        Self::new(magnitude.abs())
    }

    /// Reverse at `magnitude` (sign ignored).
    pub fn reverse(magnitude: f32) -> Self {
        Self::new(-magnitude.abs())
    }

    /// Clamped signed speed.
    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Absolute speed in `[0.0, 1.0]`.
    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.speed.abs()
    }

    /// Direction implied by the sign.
    #[inline]
    pub fn direction(&self) -> Direction {
        Direction::from_speed(self.speed)
    }

    /// Duty for a register with `max_duty` full scale.
    pub fn duty(&self, max_duty: Bits) -> Bits {
        let scaled = self.magnitude() * f32::from(max_duty) + 0.5;
        // Float-to-int casts saturate.
        (scaled as Bits).min(max_duty)
    }
}

/// Both drive motors at once.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveCommand {
    /// Left motor.
    pub left: MotorCommand,
    /// Right motor.
    pub right: MotorCommand,
}

impl DriveCommand {
    /// Independent left/right speeds.
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left: MotorCommand::new(left),
            right: MotorCommand::new(right),
        }
    }

    /// Both wheels at the same speed.
    pub fn straight(speed: f32) -> Self {
        Self::new(speed, speed)
    }

    /// Turn in place; positive spins clockwise (left forward, right reverse).
    pub fn spin(speed: f32) -> Self {
        Self::new(speed, -speed)
    }

    /// Both wheels stopped.
    pub const fn stop() -> Self {
        Self {
            left: MotorCommand::stop(),
            right: MotorCommand::stop(),
        }
    }
}

/// Which relay coil.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relay {
    /// Relay K1.
    K1,
    /// Relay K2.
    K2,
}

/// Desired relay states; `true` energises the coil.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayCommand {
    /// Relay K1.
    pub k1: bool,
    /// Relay K2.
    pub k2: bool,
}

impl RelayCommand {
    /// Both relays released.
    pub const OFF: Self = Self {
        k1: false,
        k2: false,
    };

    /// Creates a command.
    pub const fn new(k1: bool, k2: bool) -> Self {
        Self { k1, k2 }
    }
}

// ============================================================================
// Motor
// ============================================================================

/// One H-bridge channel: PWM duty, direction line, enable line.
#[derive(Debug)]
pub struct MotorActuator {
    pins: MotorPins,
    config: MotorConfig,
    direction: Direction,
    duty: Bits,
    enabled: bool,
}

impl MotorActuator {
    /// Creates an actuator. Call [`init`](Self::init) before the first command.
    pub fn new(pins: MotorPins, config: MotorConfig) -> Self {
        Self {
            pins,
            config,
            direction: Direction::Stopped,
            duty: 0,
            enabled: false,
        }
    }

    /// Drives the channel to its safe state: zero duty, enable released,
    /// direction line at forward.
    pub fn init<B: PortBus>(&mut self, bus: &mut B) {
        bus.store(self.pins.pwm, 0);
        self.duty = 0;
        self.set_enable(bus, false);
        bus.write_pin(self.pins.dir, self.config.forward_level);
        self.direction = Direction::Stopped;
    }

    /// Applies a speed command.
    pub fn apply<B: PortBus>(&mut self, bus: &mut B, cmd: MotorCommand) {
        let duty = cmd.duty(self.max_duty(bus));
        if duty == 0 {
            self.idle(bus);
            return;
        }

        let direction = cmd.direction();
        if direction != self.direction {
            if self.duty != 0 {
                self.set_duty(bus, 0);
            }
            let level = match direction {
                Direction::Reverse => !self.config.forward_level,
                Direction::Forward | Direction::Stopped => self.config.forward_level,
            };
            bus.write_pin(self.pins.dir, level);
            debug!("motor {}: direction {}", self.pins.pwm, direction.as_str());
            self.direction = direction;
        }
        self.set_enable(bus, true);
        self.set_duty(bus, duty);
    }

    /// Zero duty and enable released, regardless of the idle policy.
    pub fn stop<B: PortBus>(&mut self, bus: &mut B) {
        self.set_duty(bus, 0);
        self.set_enable(bus, false);
        self.direction = Direction::Stopped;
    }

    /// Direction currently driven; `Stopped` at zero duty.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Duty last written to the compare register.
    #[inline]
    pub fn duty(&self) -> Bits {
        self.duty
    }

    /// Whether the enable line is asserted.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn idle<B: PortBus>(&mut self, bus: &mut B) {
        self.set_duty(bus, 0);
        let hold = self.config.idle == IdlePolicy::Hold;
        if self.direction != Direction::Stopped {
            info!(
                "motor {}: idle ({})",
                self.pins.pwm,
                if hold { "hold" } else { "coast" }
            );
        }
        self.set_enable(bus, hold);
        self.direction = Direction::Stopped;
    }

    fn max_duty<B: PortBus>(&self, bus: &B) -> Bits {
        match bus.width(self.pins.pwm) {
            Some(w) if w >= MAX_PORT_WIDTH => Bits::MAX,
            Some(w) if w > 0 => (1 << w) - 1,
            // Unreachable after validation.
            _ => u8::MAX.into(),
        }
    }

    fn set_duty<B: PortBus>(&mut self, bus: &mut B, duty: Bits) {
        bus.store(self.pins.pwm, duty);
        self.duty = duty;
    }

    fn set_enable<B: PortBus>(&mut self, bus: &mut B, on: bool) {
        bus.assert_pin(self.pins.enable, self.config.enable_polarity, on);
        self.enabled = on;
    }
}

// ============================================================================
// Relays
// ============================================================================

/// The two relay coils.
#[derive(Debug)]
pub struct RelayActuator {
    pins: RelayPins,
    config: RelayConfig,
    state: RelayCommand,
}

impl RelayActuator {
    /// Creates an actuator. Call [`init`](Self::init) before the first command.
    pub fn new(pins: RelayPins, config: RelayConfig) -> Self {
        Self {
            pins,
            config,
            state: RelayCommand::OFF,
        }
    }

    /// Releases both coils.
    pub fn init<B: PortBus>(&mut self, bus: &mut B) {
        self.apply(bus, RelayCommand::OFF);
    }

    /// Drives both coils to the commanded states.
    pub fn apply<B: PortBus>(&mut self, bus: &mut B, cmd: RelayCommand) {
        self.set(bus, Relay::K1, cmd.k1);
        self.set(bus, Relay::K2, cmd.k2);
    }

    /// Drives one coil.
    pub fn set<B: PortBus>(&mut self, bus: &mut B, relay: Relay, on: bool) {
        let (pin, slot) = match relay {
            Relay::K1 => (self.pins.k1, &mut self.state.k1),
            Relay::K2 => (self.pins.k2, &mut self.state.k2),
        };
        bus.assert_pin(pin, self.config.polarity, on);
        *slot = on;
    }

    /// Last commanded states.
    pub fn state(&self) -> RelayCommand {
        self.state
    }
}
