//! Reflectance line-sensor array.
//!
//! The sixteen channels are read in configured (physical left-to-right)
//! order. A channel that cannot be read leaves `None` in its slot; the scan
//! itself never fails.

use log::debug;

use crate::config::REFLECTANCE_CHANNELS;
use crate::traits::{SampleBus, SampleChannel};

/// Spacing between sensors in [`ReflectanceVector::weighted_position`] units.
pub const POSITION_SCALE: u32 = 1000;

/// One reading per sensor, left to right. `None` marks an unavailable channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReflectanceVector(pub [Option<u16>; REFLECTANCE_CHANNELS]);

impl Default for ReflectanceVector {
    fn default() -> Self {
        Self([None; REFLECTANCE_CHANNELS])
    }
}

impl ReflectanceVector {
    /// Builds a vector with every channel available.
    pub fn from_values(values: [u16; REFLECTANCE_CHANNELS]) -> Self {
        Self(values.map(Some))
    }

    /// Reading of sensor `index`, `None` if unavailable or out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<u16> {
        self.0.get(index).copied().flatten()
    }

    /// Iterates over all sixteen slots in order.
    pub fn iter(&self) -> impl Iterator<Item = Option<u16>> + '_ {
        self.0.iter().copied()
    }

    /// Number of channels that produced a reading.
    pub fn available(&self) -> usize {
        self.0.iter().filter(|v| v.is_some()).count()
    }

    /// True when every channel produced a reading.
    pub fn is_complete(&self) -> bool {
        self.available() == REFLECTANCE_CHANNELS
    }

    /// Weighted line position over the available channels.
    ///
    /// Returns `0` under the leftmost sensor up to `15 * POSITION_SCALE`
    /// under the rightmost, or `None` when no available channel sees
    /// anything.
    pub fn weighted_position(&self) -> Option<u32> {
        let (weighted, total) = self
            .0
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i as u64, u64::from(v))))
            .fold((0u64, 0u64), |(w, t), (i, v)| {
                (w + v * i * u64::from(POSITION_SCALE), t + v)
            });
        if total == 0 {
            return None;
        }
        Some((weighted / total) as u32)
    }
}

/// Scanner over the configured reflectance channels.
#[derive(Debug)]
pub struct ReflectanceArrayScanner {
    channels: [SampleChannel; REFLECTANCE_CHANNELS],
    dropouts: u32,
}

impl ReflectanceArrayScanner {
    /// Creates a scanner over `channels`, left to right.
    pub fn new(channels: [SampleChannel; REFLECTANCE_CHANNELS]) -> Self {
        Self {
            channels,
            dropouts: 0,
        }
    }

    /// Reads every channel once, in order.
    pub fn scan<S: SampleBus>(&mut self, bus: &mut S) -> ReflectanceVector {
        let mut out = ReflectanceVector::default();
        let mut missing = 0u32;
        for (slot, &channel) in out.0.iter_mut().zip(self.channels.iter()) {
            match bus.sample(channel) {
                Ok(v) => *slot = Some(v),
                Err(e) => {
                    debug!("reflectance: {e}");
                    missing += 1;
                }
            }
        }
        if missing > 0 {
            self.dropouts = self.dropouts.wrapping_add(missing);
            debug!("reflectance: {missing} of {REFLECTANCE_CHANNELS} channels unavailable");
        }
        out
    }

    /// Channel reads that failed since construction.
    pub fn dropouts(&self) -> u32 {
        self.dropouts
    }

    /// Configured channel order.
    pub fn channels(&self) -> &[SampleChannel; REFLECTANCE_CHANNELS] {
        &self.channels
    }
}
