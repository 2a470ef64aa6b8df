//! Trait definitions for hardware abstraction.
//!
//! These abstractions let rover-io run on a microcontroller's register file,
//! on an `embedded-hal` pin bank, or against the desktop mocks in
//! [`crate::hal::mock`].
//!
//! # Hardware Abstraction
//!
//! - [`PortBus`]: fixed-width digital ports with masked read-modify-write
//! - [`SampleBus`]: analog and RC-timed channels (fallible per read)
//! - [`Clock`]: millisecond time source
//!
//! Blocking delays use [`embedded_hal::delay::DelayNs`] directly.

pub mod hardware;

pub use hardware::*;
