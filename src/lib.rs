//! # rover-io
//!
//! Timing-sensitive sensor acquisition and actuation core for a small
//! wheeled robot: a parallel waveform ADC behind an RD/INT/CS handshake, a
//! capacitive contact sensor, a 16-element reflectance line array, two
//! wheel encoders, four bump switches, two H-bridge motors and two relays.
//!
//! ## Features
//!
//! - **Bus abstraction**: every line goes through [`PortBus`] (masked
//!   read-modify-write on fixed-width ports) or [`SampleBus`] (analog and
//!   RC-timed channels)
//! - **Bounded protocols**: ADC conversion and capacitive charge waits are
//!   poll budgets, with drop guards releasing CS/RD/charge on every exit
//! - **Never-failing frames**: unavailable readings become sentinels in the
//!   [`SensorFrame`] instead of aborting the cycle
//! - **Interrupt-safe encoders**: atomic edge accumulators drained once per
//!   frame
//! - **Validated configuration**: the pin map is checked against the bus
//!   before any line is driven
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Bus, clock and line-polarity abstractions
//! - `config` - Pin map, timing tables and validation
//! - `adc`, `capacitive`, `reflectance`, `encoder`, `switches`, `actuator` -
//!   One component per sensor or actuator group
//! - `frame` - The per-cycle snapshot
//! - `robot` - [`RobotCore`], which owns the buses and ties it together
//! - `hal` - Backends (mock for testing, `embedded-hal` pin bank, board manifest)
//!
//! ## Example
//!
//! ```rust
//! use rover_io::{DriveCommand, RelayCommand, RobotConfig, RobotCore};
//! use rover_io::encoder::EncoderTicks;
//! use rover_io::hal::{mega2560, MockDelay, MockPortBus, MockSampleBus, MockTimeline};
//!
//! static TICKS: EncoderTicks = EncoderTicks::new();
//!
//! let timeline = MockTimeline::new();
//! let mut samples = MockSampleBus::new().with_timeline(timeline.clone());
//! for (i, ch) in mega2560::pin_map().reflectance.iter().enumerate() {
//!     samples.set(*ch, if i == 7 || i == 8 { 1000 } else { 0 });
//! }
//!
//! let config = RobotConfig::new(mega2560::pin_map());
//! let mut core = RobotCore::new(
//!     &config,
//!     MockPortBus::mega2560(),
//!     samples,
//!     MockDelay::on(timeline.clone()),
//!     timeline,
//!     &TICKS,
//! )?;
//!
//! let frame = core.sample();
//! assert_eq!(frame.reflectance.weighted_position(), Some(7_500));
//!
//! core.drive(DriveCommand::straight(0.5));
//! core.set_relays(RelayCommand::new(true, false));
//! core.stop_all();
//! # Ok::<(), rover_io::ConfigError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// H-bridge motors and relays.
pub mod actuator;
/// RD/INT/CS handshake driver for the external waveform ADC.
pub mod adc;
/// Charge-time capacitive contact sensor.
pub mod capacitive;
/// Pin map, timing configuration and startup validation.
pub mod config;
/// Wheel encoder edge accumulation.
pub mod encoder;
/// Error taxonomy.
pub mod error;
/// Per-cycle sensor snapshot.
pub mod frame;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Reflectance line-sensor array.
pub mod reflectance;
/// The acquisition and actuation core.
pub mod robot;
/// Debounced bump switches.
pub mod switches;
/// Core traits for hardware abstraction.
pub mod traits;

/// JSON configuration loading (serde-json-core).
#[cfg(feature = "serde-json-core")]
pub mod parsing;

// Re-exports for convenience
pub use actuator::{DriveCommand, MotorCommand, Relay, RelayCommand};
pub use capacitive::ContactReading;
pub use config::{PinMap, RobotConfig};
pub use error::{ChannelUnavailable, ConfigError, ConversionTimeout, Error, Result};
pub use frame::{SensorFrame, SwitchStates, WaveformSample, WheelTicks};
pub use reflectance::ReflectanceVector;
pub use robot::{RobotCore, Side};
pub use traits::{
    Bits, Clock, Direction, PinAssignment, Polarity, PortBus, PortId, SampleBus, SampleChannel,
};

#[cfg(feature = "serde-json-core")]
pub use parsing::{parse_pin_map, parse_robot_config};
