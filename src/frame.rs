//! Per-cycle sensor snapshot.
//!
//! A [`SensorFrame`] is assembled once per sampling cycle by
//! [`RobotCore::sample`](crate::RobotCore::sample) and never mutated
//! afterwards. Every field is always populated: unavailable readings are
//! carried as sentinels (`None`, `valid: false`, `timed_out: true`) rather
//! than failing the frame.

use crate::capacitive::ContactReading;
use crate::reflectance::ReflectanceVector;
use crate::traits::Direction;

/// Encoder edges counted for each wheel since the previous frame.
///
/// The counter produces non-negative values; [`signed`](Self::signed)
/// applies commanded directions for odometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WheelTicks {
    /// Left wheel edges.
    pub left: i32,
    /// Right wheel edges.
    pub right: i32,
}

impl WheelTicks {
    /// Creates a tick pair.
    pub const fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// Negates the ticks of any wheel commanded in reverse.
    ///
    /// The encoders are single-channel, so direction cannot be observed;
    /// a stopped wheel keeps its (coasting) ticks positive.
    pub fn signed(self, left: Direction, right: Direction) -> Self {
        let apply = |ticks: i32, dir: Direction| match dir {
            Direction::Reverse => -ticks,
            Direction::Forward | Direction::Stopped => ticks,
        };
        Self {
            left: apply(self.left, left),
            right: apply(self.right, right),
        }
    }

    /// Sum of both wheels.
    pub fn total(&self) -> i64 {
        i64::from(self.left) + i64::from(self.right)
    }
}

/// Debounced bump-switch states; `true` means pressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchStates {
    /// Front left.
    pub top_left: bool,
    /// Front right.
    pub top_right: bool,
    /// Rear left.
    pub bottom_left: bool,
    /// Rear right.
    pub bottom_right: bool,
}

impl SwitchStates {
    /// Builds states from frame order: top-left, top-right, bottom-left, bottom-right.
    pub const fn from_array(s: [bool; 4]) -> Self {
        Self {
            top_left: s[0],
            top_right: s[1],
            bottom_left: s[2],
            bottom_right: s[3],
        }
    }

    /// States in frame order.
    pub const fn as_array(&self) -> [bool; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_left,
            self.bottom_right,
        ]
    }

    /// Any switch pressed.
    pub const fn any(&self) -> bool {
        self.top_left || self.top_right || self.bottom_left || self.bottom_right
    }
}

/// One waveform ADC sample with its validity flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WaveformSample {
    /// Converted value; 0 when invalid.
    pub value: u8,
    /// False when the conversion timed out.
    pub valid: bool,
}

impl WaveformSample {
    /// A successfully converted sample.
    pub const fn valid(value: u8) -> Self {
        Self { value, valid: true }
    }

    /// The sentinel for a failed conversion.
    pub const fn invalid() -> Self {
        Self {
            value: 0,
            valid: false,
        }
    }

    /// The value if valid.
    pub const fn get(&self) -> Option<u8> {
        if self.valid {
            Some(self.value)
        } else {
            None
        }
    }
}

/// Immutable snapshot of every sensor for one sampling cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorFrame {
    /// Increments by one per frame, wrapping.
    pub sequence: u32,
    /// Clock time at the start of the cycle.
    pub timestamp_ms: u64,
    /// Line sensors, left to right.
    pub reflectance: ReflectanceVector,
    /// Encoder edges since the previous frame.
    pub encoder: WheelTicks,
    /// Debounced switches.
    pub switches: SwitchStates,
    /// Capacitive contact cycle result.
    pub contact: ContactReading,
    /// Waveform ADC sample.
    pub waveform: WaveformSample,
}
