//! Error taxonomy for the acquisition and actuation core.
//!
//! | Error | Raised by | Policy |
//! |-------|-----------|--------|
//! | [`ConfigError`] | startup validation | fatal, never recovered |
//! | [`ConversionTimeout`] | [`WaveformAdcDriver`] | frame carries an invalid sample |
//! | [`ChannelUnavailable`] | [`SampleBus`] reads | frame carries `None` for the channel |
//!
//! A capacitive cycle that never crosses its threshold is not an error; it
//! is the steady-state "no contact" reading.
//!
//! All variants are `Copy` so they pass through the sampling cycle without
//! allocation.
//!
//! [`WaveformAdcDriver`]: crate::adc::WaveformAdcDriver
//! [`SampleBus`]: crate::traits::SampleBus

use core::fmt;

use crate::traits::{PortId, SampleChannel};

/// Top-level error: every fallible operation in the crate converts into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Pin map or timing configuration is invalid.
    Config(ConfigError),
    /// The external ADC did not signal end of conversion in time.
    Conversion(ConversionTimeout),
    /// A sampled channel could not be read.
    Channel(ChannelUnavailable),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Conversion(e) => write!(f, "adc: {e}"),
            Self::Channel(e) => write!(f, "sample: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Invalid or missing pin mapping / timing. Detected at startup.
///
/// `role` names the logical line, e.g. `"left_motor.dir"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The bus does not know this port handle.
    UnknownPort {
        /// Logical line.
        role: &'static str,
        /// Offending handle.
        port: PortId,
    },
    /// Bit index lies outside the port's width.
    BitOutOfRange {
        /// Logical line.
        role: &'static str,
        /// Port holding the line.
        port: PortId,
        /// Offending bit.
        bit: u8,
        /// Width reported by the bus.
        width: u8,
    },
    /// A bus mask is empty or wider than the port / data path.
    InvalidMask {
        /// Logical bus.
        role: &'static str,
        /// Offending mask.
        mask: u16,
    },
    /// Two logical lines claim the same physical bit.
    PinConflict {
        /// First claimant.
        first: &'static str,
        /// Second claimant.
        second: &'static str,
        /// Shared port.
        port: PortId,
    },
    /// The same sampled channel appears twice.
    DuplicateChannel {
        /// Logical line of the second occurrence.
        role: &'static str,
        /// Shared channel.
        channel: SampleChannel,
    },
    /// A timing or threshold parameter is out of range.
    InvalidTiming(&'static str),
    /// More lines than the overlap check can track.
    TooManyLines {
        /// First line that did not fit.
        role: &'static str,
    },
    /// Serialized configuration could not be parsed.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPort { role, port } => write!(f, "{role}: unknown {port}"),
            Self::BitOutOfRange {
                role,
                port,
                bit,
                width,
            } => write!(f, "{role}: bit {bit} outside {width}-bit {port}"),
            Self::InvalidMask { role, mask } => write!(f, "{role}: invalid mask {mask:#06x}"),
            Self::PinConflict {
                first,
                second,
                port,
            } => write!(f, "{first} and {second} overlap on {port}"),
            Self::DuplicateChannel { role, channel } => {
                write!(f, "{role}: channel {channel} already assigned")
            }
            Self::InvalidTiming(what) => write!(f, "invalid timing: {what}"),
            Self::TooManyLines { role } => write!(f, "{role}: too many lines to check"),
            Self::Malformed => write!(f, "malformed configuration"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// INT never asserted within the configured conversion timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTimeout {
    /// INT polls performed before giving up.
    pub polls: u32,
}

impl fmt::Display for ConversionTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conversion timed out after {} polls", self.polls)
    }
}

impl From<ConversionTimeout> for Error {
    fn from(e: ConversionTimeout) -> Self {
        Self::Conversion(e)
    }
}

/// A reflectance or sample line read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelUnavailable {
    /// Channel that failed.
    pub channel: SampleChannel,
}

impl fmt::Display for ChannelUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel {} unavailable", self.channel)
    }
}

impl From<ChannelUnavailable> for Error {
    fn from(e: ChannelUnavailable) -> Self {
        Self::Channel(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
#[cfg(feature = "std")]
impl std::error::Error for ConversionTimeout {}
#[cfg(feature = "std")]
impl std::error::Error for ChannelUnavailable {}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
